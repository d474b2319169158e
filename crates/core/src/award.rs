use sqlx::types::Uuid;

use crate::{Assertion, Badge, BackpackError};

/// Result of a conditional badge insert.
#[derive(Debug, Clone)]
pub enum InsertOutcome {
    Inserted(Badge),
    /// The `(body_hash, email)` row already existed; carries the winner.
    Existing(Badge),
}

/// Persistence seam for badge records. The Postgres implementation lives in
/// the clients crate; tests substitute an in-memory double.
#[async_trait::async_trait]
pub trait BadgeStore: Send + Sync {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<Badge>, BackpackError>;

    async fn find_by_hash_and_owner(
        &self,
        body_hash: &str,
        email: &str,
    ) -> Result<Option<Badge>, BackpackError>;

    /// Inserts the badge unless a row with the same `(body_hash, email)`
    /// already exists, in which case the existing row is returned. This is
    /// the primitive that makes concurrent identical uploads race-safe.
    async fn insert_unique(&self, badge: Badge) -> Result<InsertOutcome, BackpackError>;

    async fn destroy(&self, badge: Badge) -> Result<(), BackpackError>;
}

/// Blob storage seam for image bytes.
#[async_trait::async_trait]
pub trait ImageStore: Send + Sync {
    async fn store(&self, bytes: &[u8], extension: &str) -> Result<String, BackpackError>;
}

/// The transactional core of the pipeline: fingerprint, dedup, persist.
///
/// Per upload attempt the stages are Extracted -> Fetched -> Matched ->
/// Deduped-or-Created -> Stored; a terminal failure at any stage aborts the
/// attempt with no partial record writes. The engine trusts that the caller
/// already matched the assertion's recipient against the session identities.
#[derive(Clone)]
pub struct AwardEngine<S, I> {
    store: S,
    images: I,
}

impl<S: BadgeStore, I: ImageStore> AwardEngine<S, I> {
    pub fn new(store: S, images: I) -> Self {
        Self { store, images }
    }

    /// Awards a validated assertion to `recipient_email`, deduplicating by
    /// content fingerprint. Re-uploading the same badge is a no-op success
    /// that returns the existing record.
    pub async fn award(
        &self,
        assertion: &Assertion,
        source_url: &str,
        image_bytes: &[u8],
        recipient_email: &str,
    ) -> Result<Badge, BackpackError> {
        assertion.validate()?;

        let email = recipient_email.trim().to_ascii_lowercase();
        let body_hash = assertion.fingerprint();

        if let Some(existing) = self.store.find_by_hash_and_owner(&body_hash, &email).await? {
            tracing::info!(
                "[AwardEngine::award] duplicate upload of badge {}, returning existing record {}",
                body_hash,
                existing.id
            );
            return Ok(existing);
        }

        // Image bytes must be durable before the record that references them
        // is written. A failure between the two leaves orphaned bytes, never
        // an orphaned record.
        let image_path = self.images.store(image_bytes, "png").await?;

        let badge = Badge::new(&body_hash, assertion.body().clone(), image_path, source_url, &email);
        match self.store.insert_unique(badge).await? {
            InsertOutcome::Inserted(badge) => {
                tracing::info!("[AwardEngine::award] created badge {} ({})", badge.id, body_hash);
                Ok(badge)
            }
            InsertOutcome::Existing(badge) => {
                // Lost a race against a concurrent identical upload; that
                // upload's row is the winner and this attempt reports the
                // same success.
                tracing::info!(
                    "[AwardEngine::award] concurrent upload already created badge {}",
                    badge.id
                );
                Ok(badge)
            }
        }
    }

    /// Destroys a badge. Only the badge's current recipient may delete it;
    /// anything else (including an unknown id) is `Forbidden` with no
    /// mutation.
    pub async fn destroy(&self, badge_id: &Uuid, caller_email: &str) -> Result<(), BackpackError> {
        let badge = match self.store.find_by_id(badge_id).await? {
            Some(badge) => badge,
            None => {
                tracing::warn!(target: "audit", "[AwardEngine::destroy] delete of unknown badge {}", badge_id);
                return Err(BackpackError::Forbidden);
            }
        };

        if !badge.email.eq_ignore_ascii_case(caller_email.trim()) {
            tracing::warn!(target: "audit", "[AwardEngine::destroy] non-owner delete of badge {}", badge_id);
            return Err(BackpackError::Forbidden);
        }

        self.store.destroy(badge).await
    }
}
