#[cfg(test)]
mod test {
    use std::sync::{Arc, Mutex};

    use serde_json::json;
    use sqlx::types::Uuid;

    use backpack_core::{
        Assertion, AwardEngine, Badge, BackpackError, BadgeStore, ImageStore, InsertOutcome,
        RecipientId,
    };

    /// In-memory stand-in for the Postgres badge store. `insert_unique`
    /// checks and inserts under one lock, mirroring the database's unique
    /// index on `(body_hash, email)`.
    #[derive(Clone, Default)]
    struct MemoryBadgeStore {
        badges: Arc<Mutex<Vec<Badge>>>,
    }

    impl MemoryBadgeStore {
        fn count(&self) -> usize {
            self.badges.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl BadgeStore for MemoryBadgeStore {
        async fn find_by_id(&self, id: &Uuid) -> Result<Option<Badge>, BackpackError> {
            Ok(self.badges.lock().unwrap().iter().find(|b| b.id == *id).cloned())
        }

        async fn find_by_hash_and_owner(
            &self,
            body_hash: &str,
            email: &str,
        ) -> Result<Option<Badge>, BackpackError> {
            Ok(self
                .badges
                .lock()
                .unwrap()
                .iter()
                .find(|b| b.body_hash == body_hash && b.email == email)
                .cloned())
        }

        async fn insert_unique(&self, badge: Badge) -> Result<InsertOutcome, BackpackError> {
            let mut badges = self.badges.lock().unwrap();
            if let Some(existing) = badges
                .iter()
                .find(|b| b.body_hash == badge.body_hash && b.email == badge.email)
            {
                return Ok(InsertOutcome::Existing(existing.clone()));
            }
            badges.push(badge.clone());
            Ok(InsertOutcome::Inserted(badge))
        }

        async fn destroy(&self, badge: Badge) -> Result<(), BackpackError> {
            self.badges.lock().unwrap().retain(|b| b.id != badge.id);
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct MemoryImageStore {
        stored: Arc<Mutex<Vec<usize>>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl ImageStore for MemoryImageStore {
        async fn store(&self, bytes: &[u8], extension: &str) -> Result<String, BackpackError> {
            if self.fail {
                return Err(BackpackError::storage("blob storage unavailable"));
            }
            let mut stored = self.stored.lock().unwrap();
            stored.push(bytes.len());
            Ok(format!("images/uploads/{}.{}", stored.len(), extension))
        }
    }

    fn assertion_for(email: &str) -> Assertion {
        Assertion::parse(
            &json!({
                "recipient": email,
                "badge": "https://issuer.test/badges/tester",
                "evidence": "https://issuer.test/work"
            })
            .to_string(),
        )
        .unwrap()
    }

    fn engine() -> (AwardEngine<MemoryBadgeStore, MemoryImageStore>, MemoryBadgeStore, MemoryImageStore) {
        let store = MemoryBadgeStore::default();
        let images = MemoryImageStore::default();
        (AwardEngine::new(store.clone(), images.clone()), store, images)
    }

    const SOURCE_URL: &str = "https://issuer.test/assertions/1";
    const IMAGE: &[u8] = b"fake png bytes";

    #[tokio::test]
    async fn award_creates_badge() {
        let (engine, store, _) = engine();
        let assertion = assertion_for("alice@example.com");

        let badge = engine
            .award(&assertion, SOURCE_URL, IMAGE, "alice@example.com")
            .await
            .unwrap();

        assert_eq!(badge.email, "alice@example.com");
        assert_eq!(badge.body_hash, assertion.fingerprint());
        assert_eq!(badge.source_url, SOURCE_URL);
        assert_eq!(store.count(), 1);
    }

    #[tokio::test]
    async fn repeated_award_is_idempotent() {
        let (engine, store, images) = engine();
        let assertion = assertion_for("alice@example.com");

        let first = engine
            .award(&assertion, SOURCE_URL, IMAGE, "alice@example.com")
            .await
            .unwrap();
        for _ in 0..3 {
            let again = engine
                .award(&assertion, SOURCE_URL, IMAGE, "alice@example.com")
                .await
                .unwrap();
            assert_eq!(again.id, first.id);
        }

        assert_eq!(store.count(), 1);
        // Image bytes were stored exactly once.
        assert_eq!(images.stored.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn same_content_different_recipient_gets_its_own_badge() {
        let (engine, store, _) = engine();

        // Same badge class, but the assertion embeds the recipient, so the
        // fingerprints differ.
        let a = assertion_for("alice@example.com");
        let b = assertion_for("bob@example.com");

        let badge_a = engine.award(&a, SOURCE_URL, IMAGE, "alice@example.com").await.unwrap();
        let badge_b = engine.award(&b, SOURCE_URL, IMAGE, "bob@example.com").await.unwrap();

        assert_ne!(badge_a.id, badge_b.id);
        assert_eq!(store.count(), 2);
    }

    #[tokio::test]
    async fn concurrent_awards_resolve_to_one_badge() {
        let (engine, store, _) = engine();
        let assertion = assertion_for("alice@example.com");

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = engine.clone();
            let assertion = assertion.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .award(&assertion, SOURCE_URL, IMAGE, "alice@example.com")
                    .await
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().id);
        }

        assert_eq!(store.count(), 1);
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn mismatched_recipient_never_reaches_award() {
        let (engine, store, _) = engine();
        let assertion = assertion_for("alice@example.com");

        let verified = vec!["bob@example.com".to_string()];
        let recipient = RecipientId::from_assertion(
            assertion.recipient().unwrap(),
            assertion.salt(),
        );
        assert!(!recipient.matches(&verified));

        // The caller treats a non-match as a rejection; award is not invoked
        // and no badge exists.
        drop(engine);
        assert_eq!(store.count(), 0);
    }

    #[tokio::test]
    async fn image_storage_failure_leaves_no_record() {
        let store = MemoryBadgeStore::default();
        let images = MemoryImageStore { fail: true, ..Default::default() };
        let engine = AwardEngine::new(store.clone(), images);

        let assertion = assertion_for("alice@example.com");
        let err = engine
            .award(&assertion, SOURCE_URL, IMAGE, "alice@example.com")
            .await
            .unwrap_err();

        assert!(matches!(err, BackpackError::Storage(_)));
        assert_eq!(store.count(), 0);
    }

    #[tokio::test]
    async fn structurally_invalid_assertion_rejected() {
        let (engine, store, _) = engine();

        // Bypass parse-time checks by building from a raw value with an
        // empty recipient.
        let assertion: Assertion =
            serde_json::from_value(json!({"recipient": "", "badge": "https://issuer.test/b"}))
                .unwrap();

        let err = engine
            .award(&assertion, SOURCE_URL, IMAGE, "alice@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, BackpackError::InvalidAssertion(_)));
        assert_eq!(store.count(), 0);
    }

    #[tokio::test]
    async fn only_the_owner_may_destroy() {
        let (engine, store, _) = engine();
        let assertion = assertion_for("alice@example.com");
        let badge = engine
            .award(&assertion, SOURCE_URL, IMAGE, "alice@example.com")
            .await
            .unwrap();

        let err = engine.destroy(&badge.id, "mallory@example.com").await.unwrap_err();
        assert!(matches!(err, BackpackError::Forbidden));
        assert_eq!(store.count(), 1);

        engine.destroy(&badge.id, "alice@example.com").await.unwrap();
        assert_eq!(store.count(), 0);
    }

    #[tokio::test]
    async fn destroying_unknown_badge_is_forbidden() {
        let (engine, _, _) = engine();
        let err = engine.destroy(&Uuid::new_v4(), "alice@example.com").await.unwrap_err();
        assert!(matches!(err, BackpackError::Forbidden));
    }
}
