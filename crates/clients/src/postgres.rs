use sqlx::types::Uuid;
use sqlx::PgPool;

use backpack_common::{define_module_client, ModuleClient};
use backpack_core::{Badge, BackpackError, BadgeStore, InsertOutcome};
use backpack_database::{init_databases, QueryCriteria, SqlxCrud, SqlxFilterQuery, SqlxSchema};

init_databases!(
    default: [
        backpack_core::User,
        backpack_core::Badge,
        backpack_core::BadgeGroup,
    ]
);

define_module_client! {
    (struct PostgresClient, "postgres")
    client_type: &'static PgPool,
    env: ["DATABASE_URL"],
    setup: async {
        connect(false, true).await
    }
}

impl PostgresClient {
    pub fn pool(&self) -> &'static PgPool {
        *self.get_client()
    }
}

#[async_trait::async_trait]
impl BadgeStore for PostgresClient {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<Badge>, BackpackError> {
        let badge = Badge::find_one_by_criteria(
            QueryCriteria::new().add_valued_filter("id", "=", *id),
            self.pool(),
        )
        .await?;
        Ok(badge)
    }

    async fn find_by_hash_and_owner(
        &self,
        body_hash: &str,
        email: &str,
    ) -> Result<Option<Badge>, BackpackError> {
        let badge = Badge::find_one_by_criteria(
            QueryCriteria::new()
                .add_valued_filter("body_hash", "=", body_hash.to_string())
                .add_valued_filter("email", "=", email.to_string()),
            self.pool(),
        )
        .await?;
        Ok(badge)
    }

    async fn insert_unique(&self, badge: Badge) -> Result<InsertOutcome, BackpackError> {
        let sql = format!(
            "INSERT INTO \"badges\" (\"id\", \"body_hash\", \"body\", \"image_path\", \"source_url\", \"email\", \"created_at\", \"updated_at\") \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (\"body_hash\", \"email\") DO NOTHING \
             RETURNING {}",
            Badge::select_columns()
        );

        let inserted: Option<Badge> = badge
            .bind_insert(sqlx::query_as(&sql))
            .fetch_optional(self.pool())
            .await?;

        match inserted {
            Some(row) => Ok(InsertOutcome::Inserted(Badge::from_row(row))),
            // The unique index swallowed the insert: a concurrent identical
            // upload won the race. Surface the winner.
            None => {
                let existing = self
                    .find_by_hash_and_owner(&badge.body_hash, &badge.email)
                    .await?
                    .ok_or_else(|| {
                        BackpackError::storage("conflicting badge row disappeared mid-insert")
                    })?;
                Ok(InsertOutcome::Existing(existing))
            }
        }
    }

    async fn destroy(&self, badge: Badge) -> Result<(), BackpackError> {
        badge.delete(self.pool()).await?;
        Ok(())
    }
}
