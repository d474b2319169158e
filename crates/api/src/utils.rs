use anyhow::anyhow;
use axum::extract::Request;
use axum::http::{header, StatusCode};
use tracing_subscriber::EnvFilter;

use crate::response::AppError;

/// Pulls the bearer token out of the Authorization header. The token must be
/// a single `Bearer <value>` pair; anything else is rejected before the
/// decryption step ever sees it.
pub fn extract_bearer_token(req: &Request) -> Result<String, AppError> {
    let unauthorized = |msg: &'static str| AppError::new(StatusCode::UNAUTHORIZED, anyhow!(msg));

    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or_else(|| unauthorized("missing authorization header"))?
        .to_str()
        .map_err(|_| unauthorized("invalid authorization header"))?;

    header_value
        .trim()
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty() && !token.contains(char::is_whitespace))
        .map(str::to_string)
        .ok_or_else(|| unauthorized("invalid authorization header"))
}

/// Log filtering defaults to `info` (which includes the audit target) and is
/// overridable per-target through RUST_LOG.
pub fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with_auth(value: &str) -> Request {
        axum::http::Request::builder()
            .header(header::AUTHORIZATION, value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn bearer_token_extracted() {
        let req = request_with_auth("Bearer abc123");
        assert_eq!(extract_bearer_token(&req).unwrap(), "abc123");
    }

    #[test]
    fn missing_header_rejected() {
        let req = axum::http::Request::builder().body(Body::empty()).unwrap();
        assert!(extract_bearer_token(&req).is_err());
    }

    #[test]
    fn malformed_header_rejected() {
        assert!(extract_bearer_token(&request_with_auth("Basic abc123")).is_err());
        assert!(extract_bearer_token(&request_with_auth("Bearer")).is_err());
        assert!(extract_bearer_token(&request_with_auth("Bearer ")).is_err());
        assert!(extract_bearer_token(&request_with_auth("Bearer two tokens")).is_err());
    }
}
