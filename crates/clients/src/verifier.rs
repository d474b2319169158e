use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use backpack_common::{define_module_client, ModuleClient};

/// Typed failure from the identity verifier, carrying the verifier's error
/// class and response body.
#[derive(Debug, Error, Serialize, Deserialize)]
#[error("identity verification failed ({error_type}): {body}")]
pub struct VerifierError {
    pub error_type: String,
    pub body: String,
}

#[derive(Debug, Deserialize)]
struct VerifierResponse {
    status: String,
    email: Option<String>,
    reason: Option<String>,
}

define_module_client! {
    (struct VerifierClient, "verifier")
    client_type: reqwest::Client,
    env: ["VERIFIER_URL"],
    setup: async {
        reqwest::Client::new()
    }
}

impl VerifierClient {
    /// Exchanges an identity assertion token for a verified identity string.
    /// The verifier is the sole source of verified identities; this client
    /// adds nothing on top of its verdict.
    pub async fn verify(&self, assertion: &str, audience: &str) -> Result<String, VerifierError> {
        let url = std::env::var("VERIFIER_URL").unwrap_or_default();

        let response = self
            .get_client()
            .post(&url)
            .json(&json!({ "assertion": assertion, "audience": audience }))
            .send()
            .await
            .map_err(|e| VerifierError {
                error_type: "unreachable".to_string(),
                body: e.to_string(),
            })?;

        let body = response.text().await.map_err(|e| VerifierError {
            error_type: "unreachable".to_string(),
            body: e.to_string(),
        })?;

        let parsed: VerifierResponse =
            serde_json::from_str(&body).map_err(|_| VerifierError {
                error_type: "invalid-response".to_string(),
                body: body.clone(),
            })?;

        match (parsed.status.as_str(), parsed.email) {
            ("okay", Some(email)) => Ok(email.trim().to_ascii_lowercase()),
            _ => Err(VerifierError {
                error_type: "verification-failed".to_string(),
                body: parsed.reason.unwrap_or(body),
            }),
        }
    }
}
