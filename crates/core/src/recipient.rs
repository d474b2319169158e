use backpack_common::sha256_hex;

/// The recipient identity published in an assertion, classified by the shape
/// of the field rather than by probing its runtime type.
///
/// Issuers either publish the identity in the clear or as `algo$digest` with
/// the salt disclosed alongside it in the assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientId {
    Plain(String),
    SaltedHash {
        algorithm: String,
        digest: String,
        salt: String,
    },
}

const KNOWN_HASH_ALGORITHMS: &[&str] = &["sha256", "md5"];

impl RecipientId {
    /// Classifies an assertion's recipient field. `salt` is the assertion's
    /// disclosed salt, if any.
    pub fn from_assertion(recipient: &str, salt: Option<&str>) -> Self {
        if let Some((algorithm, digest)) = recipient.split_once('$') {
            let algorithm = algorithm.to_ascii_lowercase();
            if KNOWN_HASH_ALGORITHMS.contains(&algorithm.as_str()) {
                return Self::SaltedHash {
                    algorithm,
                    digest: digest.to_ascii_lowercase(),
                    salt: salt.unwrap_or_default().to_string(),
                };
            }
        }

        Self::Plain(recipient.trim().to_ascii_lowercase())
    }

    /// Whether this recipient corresponds to any of the session's verified
    /// identities. Total function: unsupported hash algorithms and malformed
    /// digests simply never match. Callers treat a non-match as a
    /// security-relevant rejection and must not echo the identities tried.
    pub fn matches(&self, verified_identities: &[String]) -> bool {
        match self {
            Self::Plain(identity) => verified_identities
                .iter()
                .any(|candidate| candidate.trim().eq_ignore_ascii_case(identity)),
            Self::SaltedHash {
                algorithm,
                digest,
                salt,
            } => {
                // Only sha256 is recomputable here; other published
                // conventions are rejected rather than guessed at.
                if algorithm != "sha256" {
                    return false;
                }
                verified_identities.iter().any(|candidate| {
                    let salted = format!("{}{}", candidate.trim().to_ascii_lowercase(), salt);
                    sha256_hex(salted.as_bytes()) == *digest
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identities(emails: &[&str]) -> Vec<String> {
        emails.iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn plain_recipient_matches_case_insensitively() {
        let recipient = RecipientId::from_assertion("Alice@Example.COM", None);
        assert!(recipient.matches(&identities(&["alice@example.com"])));
        assert!(!recipient.matches(&identities(&["bob@example.com"])));
        assert!(!recipient.matches(&[]));
    }

    #[test]
    fn salted_hash_recipient_matches() {
        let salt = "f00dbabe";
        let digest = backpack_common::sha256_hex(format!("alice@example.com{}", salt).as_bytes());
        let published = format!("sha256${}", digest);

        let recipient = RecipientId::from_assertion(&published, Some(salt));
        assert!(recipient.matches(&identities(&["alice@example.com"])));
        assert!(recipient.matches(&identities(&["ALICE@example.com"])));
        assert!(!recipient.matches(&identities(&["bob@example.com"])));
    }

    #[test]
    fn unsupported_hash_algorithm_never_matches() {
        let recipient = RecipientId::from_assertion("md5$d41d8cd98f00b204e9800998ecf8427e", Some("s"));
        assert!(matches!(recipient, RecipientId::SaltedHash { .. }));
        assert!(!recipient.matches(&identities(&["alice@example.com"])));
    }

    #[test]
    fn missing_salt_hashes_identity_alone() {
        let digest = backpack_common::sha256_hex(b"alice@example.com");
        let recipient = RecipientId::from_assertion(&format!("sha256${}", digest), None);
        assert!(recipient.matches(&identities(&["alice@example.com"])));
    }

    #[test]
    fn dollar_sign_without_known_algorithm_is_plain() {
        let recipient = RecipientId::from_assertion("weird$identity", None);
        assert_eq!(recipient, RecipientId::Plain("weird$identity".to_string()));
    }
}
