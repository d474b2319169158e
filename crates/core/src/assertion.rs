use serde::{Deserialize, Serialize};
use serde_json::Value;

use backpack_common::blake3_hex;

use crate::BackpackError;

/// A hosted badge assertion as published by an issuer.
///
/// The full document is retained as parsed JSON; typed accessors expose the
/// fields the pipeline cares about. An assertion is never persisted directly,
/// it is only consumed to produce or validate a [`crate::Badge`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Assertion {
    raw: Value,
}

impl Assertion {
    /// Parses an assertion document fetched from an issuer. The document must
    /// be a JSON object carrying at least `recipient` and `badge`.
    pub fn parse(text: &str) -> Result<Self, BackpackError> {
        let raw: Value = serde_json::from_str(text)
            .map_err(|e| BackpackError::InvalidAssertionFormat(e.to_string()))?;

        if !raw.is_object() {
            return Err(BackpackError::InvalidAssertionFormat(
                "assertion is not a JSON object".to_string(),
            ));
        }

        let assertion = Self { raw };
        if assertion.recipient().map_or(true, str::is_empty) {
            return Err(BackpackError::InvalidAssertionFormat(
                "assertion has no recipient".to_string(),
            ));
        }
        if assertion.badge().is_none() {
            return Err(BackpackError::InvalidAssertionFormat(
                "assertion has no badge reference".to_string(),
            ));
        }

        Ok(assertion)
    }

    pub fn recipient(&self) -> Option<&str> {
        self.raw.get("recipient").and_then(Value::as_str)
    }

    pub fn salt(&self) -> Option<&str> {
        self.raw.get("salt").and_then(Value::as_str)
    }

    /// The badge class reference: either a URL string or an embedded
    /// descriptor object.
    pub fn badge(&self) -> Option<&Value> {
        match self.raw.get("badge") {
            Some(v) if v.is_string() || v.is_object() => Some(v),
            _ => None,
        }
    }

    /// The full assertion payload, frozen into the badge record at award
    /// time. Optional issuer fields (evidence, expiry, issue date) ride along
    /// here rather than being projected out.
    pub fn body(&self) -> &Value {
        &self.raw
    }

    /// Canonical form of the payload: compact encoding with object keys in
    /// sorted order, so re-fetches of logically identical documents (differing
    /// whitespace or key order) render identically.
    pub fn canonical_body(&self) -> String {
        let mut out = String::new();
        write_canonical(&self.raw, &mut out);
        out
    }

    /// Content fingerprint of the canonical payload, the dedup key for badges.
    pub fn fingerprint(&self) -> String {
        blake3_hex(self.canonical_body().as_bytes())
    }

    /// Structural re-validation performed by the award engine. Parsing already
    /// enforces these fields, but the engine does not trust its callers to
    /// have gone through [`Assertion::parse`].
    pub fn validate(&self) -> Result<(), BackpackError> {
        if self.recipient().map_or(true, str::is_empty) {
            return Err(BackpackError::InvalidAssertion(
                "missing recipient".to_string(),
            ));
        }
        if self.badge().is_none() {
            return Err(BackpackError::InvalidAssertion(
                "missing badge reference".to_string(),
            ));
        }
        Ok(())
    }
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            // Sorted explicitly so the fingerprint does not depend on the
            // map backend serde_json was built with.
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_requires_recipient_and_badge() {
        assert!(Assertion::parse(r#"{"badge": "https://issuer.test/badge"}"#).is_err());
        assert!(Assertion::parse(r#"{"recipient": "a@example.com"}"#).is_err());
        assert!(Assertion::parse("[1, 2]").is_err());
        assert!(Assertion::parse("not json").is_err());

        let a = Assertion::parse(
            r#"{"recipient": "a@example.com", "badge": "https://issuer.test/badge"}"#,
        )
        .unwrap();
        assert_eq!(a.recipient(), Some("a@example.com"));
    }

    #[test]
    fn fingerprint_ignores_whitespace_and_key_order() {
        let a = Assertion::parse(
            r#"{"recipient":"a@example.com","badge":"https://issuer.test/badge","evidence":"https://issuer.test/work"}"#,
        )
        .unwrap();
        let b = Assertion::parse(
            "{\n  \"evidence\": \"https://issuer.test/work\",\n  \"badge\": \"https://issuer.test/badge\",\n  \"recipient\": \"a@example.com\"\n}",
        )
        .unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn fingerprint_differs_per_recipient() {
        let a = Assertion::parse(r#"{"recipient":"a@example.com","badge":"https://b.test"}"#)
            .unwrap();
        let b = Assertion::parse(r#"{"recipient":"b@example.com","badge":"https://b.test"}"#)
            .unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn canonical_body_nests_deterministically() {
        let a = Assertion::parse(
            r#"{"recipient":"a@example.com","badge":{"name":"Tester","criteria":"https://issuer.test/criteria"}}"#,
        )
        .unwrap();
        assert_eq!(
            a.canonical_body(),
            r#"{"badge":{"criteria":"https://issuer.test/criteria","name":"Tester"},"recipient":"a@example.com"}"#
        );
    }
}
