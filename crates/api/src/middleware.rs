use anyhow::anyhow;
use axum::body::Body;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::{extract::Request, response::Response};
use serde::{Deserialize, Serialize};

use backpack_common::{decrypt, get_current_timestamp, EnvVars};
use backpack_core::User;
use backpack_database::{QueryCriteria, SqlxCrud, SqlxFilterQuery};

use backpack_clients::PostgresClient;

use crate::env::ApiServerEnv;
use crate::response::AppError;
use crate::utils::extract_bearer_token;

/// How long a login token stays valid.
const TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

/// Payload sealed inside a bearer token at login time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedRequest {
    pub email: String,
    pub timestamp: i64,
    pub audience: String,
}

/// Decrypts the bearer token and stashes the verified email in request
/// extensions. An invalid or expired token degrades to the empty identity;
/// `ensure_account` then refuses to resolve it.
pub async fn authenticate(mut req: Request, next: Next) -> Result<Response<Body>, AppError> {
    let env = ApiServerEnv::load();
    let email = extract_bearer_token(&req)
        .and_then(|token| {
            decrypt(&token, &env.get_env_var("SECRET_SALT"))
                .map_err(|e| AppError::new(StatusCode::UNAUTHORIZED, anyhow!(e)))
        })
        .and_then(|decrypted| {
            serde_json::from_str::<AuthenticatedRequest>(&decrypted)
                .map_err(|e| AppError::new(StatusCode::UNAUTHORIZED, anyhow!(e)))
        })
        .and_then(|authenticated_request| {
            if authenticated_request.timestamp < get_current_timestamp() - TOKEN_TTL_SECS {
                return Err(AppError::new(
                    StatusCode::UNAUTHORIZED,
                    anyhow!("authenticate expired"),
                ));
            }
            Ok(authenticated_request.email.trim().to_ascii_lowercase())
        })
        .unwrap_or_default();

    req.extensions_mut().insert(email);
    Ok(next.run(req).await)
}

/// Resolves the session email to a backpack account, creating the row on
/// first verified login. The empty identity (no/invalid token) resolves to
/// `None`.
pub async fn ensure_account(
    db: &PostgresClient,
    email: &str,
) -> Result<Option<User>, AppError> {
    if email.is_empty() {
        return Ok(None);
    }

    let existing = User::find_one_by_criteria(
        QueryCriteria::new().add_valued_filter("email", "=", email.to_string()),
        db.pool(),
    )
    .await?;
    if existing.is_some() {
        return Ok(existing);
    }

    match User::new(email).create(db.pool()).await {
        Ok(user) => Ok(Some(user)),
        // A concurrent first login can win the unique-email race; fall back
        // to the winner's row.
        Err(_) => {
            let user = User::find_one_by_criteria(
                QueryCriteria::new().add_valued_filter("email", "=", email.to_string()),
                db.pool(),
            )
            .await?;
            Ok(user)
        }
    }
}
