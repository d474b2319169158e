use anyhow::anyhow;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use backpack_common::{encrypt, get_current_timestamp, EnvVars};

use crate::middleware::{ensure_account, AuthenticatedRequest};
use crate::response::{AppError, AppSuccess};
use crate::{ApiServerEnv, GlobalState};

pub fn auth_routes() -> Router<GlobalState> {
    Router::new().route("/auth/login", post(login))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Identity assertion token produced by the user's identity provider.
    pub assertion: String,
}

/// Exchanges an identity assertion for a bearer token. The black-box
/// verifier is the sole authority on which email the assertion proves.
async fn login(
    State(state): State<GlobalState>,
    Json(payload): Json<LoginRequest>,
) -> Result<AppSuccess, AppError> {
    let env = ApiServerEnv::load();

    let email = state
        .verifier
        .verify(&payload.assertion, &env.audience)
        .await
        .map_err(|e| {
            tracing::warn!(target: "audit", "[/auth/login] verification failed: {}", e);
            AppError::new(StatusCode::UNAUTHORIZED, anyhow!("identity verification failed"))
        })?;

    let user = ensure_account(&state.db, &email)
        .await?
        .ok_or_else(|| AppError::new(StatusCode::UNAUTHORIZED, anyhow!("[/auth/login] no account")))?;

    let token_payload = AuthenticatedRequest {
        email: user.email.clone(),
        timestamp: get_current_timestamp(),
        audience: env.audience.clone(),
    };
    let token = encrypt(&serde_json::to_string(&token_payload)?, &env.secret_salt)?;

    Ok(AppSuccess::new(
        StatusCode::OK,
        "Logged in successfully",
        json!({
            "token": token,
            "email": user.email,
        }),
    ))
}
