use std::time::Duration;

use reqwest::redirect::Policy;

use crate::{Assertion, BackpackError};

pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const MAX_REDIRECTS: usize = 3;
pub const MAX_ASSERTION_BYTES: usize = 256 * 1024;

/// Bounded-time, bounded-size retrieval of hosted assertion documents.
///
/// Issuers are untrusted: the redirect chain is capped, the response body is
/// size-limited, and nothing is retried. A failed fetch is terminal for the
/// upload attempt; re-invoking the whole pipeline is the caller's policy.
#[derive(Clone)]
pub struct AssertionFetcher {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl AssertionFetcher {
    pub fn new() -> Self {
        Self::with_limits(FETCH_TIMEOUT, MAX_ASSERTION_BYTES)
    }

    pub fn with_limits(timeout: Duration, max_body_bytes: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .build()
            .expect("failed to build http client");

        Self {
            client,
            max_body_bytes,
        }
    }

    pub async fn fetch(&self, url: &str) -> Result<Assertion, BackpackError> {
        tracing::debug!("[AssertionFetcher::fetch] retrieving assertion from {}", url);

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BackpackError::UnreachableIssuer(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackpackError::UnreachableIssuer(format!(
                "issuer responded with status {}",
                status
            )));
        }

        if let Some(length) = response.content_length() {
            if length as usize > self.max_body_bytes {
                return Err(BackpackError::InvalidAssertionFormat(
                    "assertion document too large".to_string(),
                ));
            }
        }

        // Stream the body so a chunked response without a Content-Length
        // header cannot buffer past the cap before being rejected.
        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| BackpackError::UnreachableIssuer(e.to_string()))?
        {
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(BackpackError::InvalidAssertionFormat(
                    "assertion document too large".to_string(),
                ));
            }
            body.extend_from_slice(&chunk);
        }

        let text = std::str::from_utf8(&body).map_err(|_| {
            BackpackError::InvalidAssertionFormat("assertion document is not UTF-8".to_string())
        })?;

        Assertion::parse(text)
    }
}

impl Default for AssertionFetcher {
    fn default() -> Self {
        Self::new()
    }
}
