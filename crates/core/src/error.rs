use thiserror::Error;

/// Failure taxonomy for the badge acquisition pipeline.
///
/// `RecipientMismatch` and `Forbidden` are security-relevant: their display
/// strings are deliberately generic and callers log them under the `audit`
/// tracing target instead of the transient-failure path.
#[derive(Debug, Error)]
pub enum BackpackError {
    #[error("uploaded file is empty")]
    EmptyUpload,

    #[error("uploaded file is not a baked badge image: {0}")]
    MalformedImage(String),

    #[error("could not reach the badge issuer: {0}")]
    UnreachableIssuer(String),

    #[error("issuer returned an invalid assertion document: {0}")]
    InvalidAssertionFormat(String),

    #[error("this badge was not awarded to the logged-in user")]
    RecipientMismatch,

    #[error("assertion is structurally invalid: {0}")]
    InvalidAssertion(String),

    #[error("storage failure: {0}")]
    Storage(String),

    #[error("forbidden")]
    Forbidden,
}

impl BackpackError {
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }

    /// Whether this failure must be routed to the audit log.
    pub fn is_security(&self) -> bool {
        matches!(self, Self::RecipientMismatch | Self::Forbidden)
    }
}

impl From<sqlx::Error> for BackpackError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
