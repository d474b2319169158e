use anyhow::anyhow;
use axum::extract::{Extension, Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{middleware, Router};
use serde_json::json;
use sqlx::types::Uuid;

use backpack_core::{extract_badge, reconcile, Badge, BadgeGroup, BackpackError, RecipientId};
use backpack_database::{OrderDirection, QueryCriteria, SqlxFilterQuery};

use crate::middleware::{authenticate, ensure_account};
use crate::response::{AppError, AppSuccess};
use crate::GlobalState;

pub fn backpack_routes() -> Router<GlobalState> {
    Router::new()
        .route("/backpack/upload",
            post(upload)
            .route_layer(middleware::from_fn(authenticate))
        )

        .route("/backpack/badges",
            get(list_badges)
            .route_layer(middleware::from_fn(authenticate))
        )

        .route("/backpack/groups",
            get(list_groups)
            .route_layer(middleware::from_fn(authenticate))
        )

        .route("/backpack/badge/{badge_id}",
            delete(destroy_badge)
            .route_layer(middleware::from_fn(authenticate))
        )
}

/// The badge acquisition pipeline: extract the assertion URL from the baked
/// image, fetch the hosted assertion, match its recipient against the
/// session identity, and award. Success and idempotent re-award both report
/// success; any stage failure aborts with no partial writes.
async fn upload(
    State(state): State<GlobalState>,
    Extension(email): Extension<String>,
    mut multipart: Multipart,
) -> Result<AppSuccess, AppError> {
    let user = ensure_account(&state.db, &email)
        .await?
        .ok_or_else(|| AppError::new(StatusCode::UNAUTHORIZED, anyhow!("[/backpack/upload] not logged in")))?;

    let mut file_bytes: Option<Vec<u8>> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::new(StatusCode::BAD_REQUEST, anyhow!(e)))?
    {
        if field.name() == Some("badge_image") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::new(StatusCode::BAD_REQUEST, anyhow!(e)))?;
            file_bytes = Some(bytes.to_vec());
            break;
        }
    }
    let file_bytes = file_bytes.ok_or_else(|| {
        AppError::new(StatusCode::BAD_REQUEST, anyhow!("[/backpack/upload] missing badge_image field"))
    })?;

    let extracted = extract_badge(&file_bytes).map_err(AppError::from_backpack)?;
    let assertion = state
        .fetcher
        .fetch(&extracted.assertion_url)
        .await
        .map_err(AppError::from_backpack)?;

    let verified_identities = vec![user.email.clone()];
    let recipient = RecipientId::from_assertion(
        assertion.recipient().unwrap_or_default(),
        assertion.salt(),
    );
    if !recipient.matches(&verified_identities) {
        return Err(AppError::from_backpack(BackpackError::RecipientMismatch));
    }

    let badge = state
        .award
        .award(&assertion, &extracted.assertion_url, &extracted.image, &user.email)
        .await
        .map_err(AppError::from_backpack)?;

    Ok(AppSuccess::new(
        StatusCode::OK,
        "Badge added to backpack",
        json!({
            "badge_id": badge.id,
            "body_hash": badge.body_hash,
            "image_path": badge.image_path,
        }),
    ))
}

async fn list_badges(
    State(state): State<GlobalState>,
    Extension(email): Extension<String>,
) -> Result<AppSuccess, AppError> {
    let user = ensure_account(&state.db, &email)
        .await?
        .ok_or_else(|| AppError::new(StatusCode::UNAUTHORIZED, anyhow!("[/backpack/badges] not logged in")))?;

    let badges = Badge::find_by_criteria(
        QueryCriteria::new()
            .add_valued_filter("email", "=", user.email.clone())
            .order_by("created_at", OrderDirection::Desc),
        state.db.pool(),
    )
    .await?;

    Ok(AppSuccess::new(
        StatusCode::OK,
        "Badges fetched successfully",
        json!({ "badges": badges }),
    ))
}

/// Read-only view of the user's groups with each group's badge-id list
/// filtered against the live badge index. Dangling ids are expected after
/// badge deletion and are dropped from the view, never from the record.
async fn list_groups(
    State(state): State<GlobalState>,
    Extension(email): Extension<String>,
) -> Result<AppSuccess, AppError> {
    let user = ensure_account(&state.db, &email)
        .await?
        .ok_or_else(|| AppError::new(StatusCode::UNAUTHORIZED, anyhow!("[/backpack/groups] not logged in")))?;

    let owned_badges = Badge::find_by_criteria(
        QueryCriteria::new().add_valued_filter("email", "=", user.email.clone()),
        state.db.pool(),
    )
    .await?;

    let groups = BadgeGroup::find_by_criteria(
        QueryCriteria::new()
            .add_valued_filter("user_id", "=", user.id)
            .order_by("created_at", OrderDirection::Asc),
        state.db.pool(),
    )
    .await?;

    let views: Vec<serde_json::Value> = groups
        .iter()
        .map(|group| {
            let (valid_ids, badges) = reconcile(group, &owned_badges);
            json!({
                "group_id": group.id,
                "name": group.name,
                "url": group.url,
                "badge_ids": valid_ids,
                "badges": badges,
            })
        })
        .collect();

    Ok(AppSuccess::new(
        StatusCode::OK,
        "Groups fetched successfully",
        json!({ "groups": views }),
    ))
}

async fn destroy_badge(
    State(state): State<GlobalState>,
    Extension(email): Extension<String>,
    Path(badge_id): Path<Uuid>,
) -> Result<AppSuccess, AppError> {
    let user = ensure_account(&state.db, &email)
        .await?
        .ok_or_else(|| AppError::new(StatusCode::UNAUTHORIZED, anyhow!("[/backpack/badge] not logged in")))?;

    state
        .award
        .destroy(&badge_id, &user.email)
        .await
        .map_err(AppError::from_backpack)?;

    Ok(AppSuccess::new(
        StatusCode::OK,
        "Badge deleted successfully",
        json!(()),
    ))
}
