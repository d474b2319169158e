use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::postgres::PgArguments;
use sqlx::types::{Json, Uuid};
use sqlx::{FromRow, Postgres};

use backpack_common::get_current_timestamp;
use backpack_database::{SqlxCrud, SqlxFilterQuery, SqlxSchema};

/// A badge earned by a recipient, frozen at award time.
///
/// `body_hash` is the content fingerprint of the canonical assertion body;
/// `(body_hash, email)` is the dedup key enforced by a unique index, which is
/// what lets concurrent identical uploads resolve to exactly one row. Badges
/// are immutable after creation and destroyed only by their owner.
#[derive(Debug, Serialize, Deserialize, Clone, FromRow)]
pub struct Badge {
    pub id: Uuid,

    pub body_hash: String,
    pub body: Json<Value>,

    pub image_path: String,
    pub source_url: String,

    /// The recipient identity this badge instance is attached to.
    pub email: String,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Badge {
    pub fn new(
        body_hash: impl Into<String>,
        body: Value,
        image_path: impl Into<String>,
        source_url: impl Into<String>,
        email: &str,
    ) -> Self {
        let now = get_current_timestamp();
        Self {
            id: Uuid::new_v4(),
            body_hash: body_hash.into(),
            body: Json(body),
            image_path: image_path.into(),
            source_url: source_url.into(),
            email: email.trim().to_ascii_lowercase(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl SqlxSchema for Badge {
    type Id = Uuid;
    type Row = Badge;

    const TABLE_NAME: &'static str = "badges";
    const ID_COLUMN_NAME: &'static str = "id";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "body_hash",
        "body",
        "image_path",
        "source_url",
        "email",
        "created_at",
        "updated_at",
    ];
    const INDEXES_SQL: &'static [&'static str] = &[
        // The conditional-insert primitive the award engine relies on.
        "CREATE UNIQUE INDEX IF NOT EXISTS badges_body_hash_email_idx ON \"badges\" (\"body_hash\", \"email\");",
        "CREATE INDEX IF NOT EXISTS badges_email_idx ON \"badges\" (\"email\");",
    ];

    fn get_id_value(&self) -> Self::Id {
        self.id
    }

    fn from_row(row: Self::Row) -> Self {
        row
    }

    fn create_table_sql() -> String {
        r#"
        CREATE TABLE IF NOT EXISTS "badges" (
            "id" UUID PRIMARY KEY,
            "body_hash" TEXT NOT NULL,
            "body" JSONB NOT NULL,
            "image_path" TEXT NOT NULL,
            "source_url" TEXT NOT NULL,
            "email" TEXT NOT NULL,
            "created_at" BIGINT NOT NULL,
            "updated_at" BIGINT NOT NULL
        );
        "#
        .to_string()
    }

    fn drop_table_sql() -> String {
        "DROP TABLE IF EXISTS \"badges\" CASCADE;".to_string()
    }

    fn insert_sql() -> String {
        format!(
            "INSERT INTO \"badges\" (\"id\", \"body_hash\", \"body\", \"image_path\", \"source_url\", \"email\", \"created_at\", \"updated_at\") \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            Self::select_columns()
        )
    }

    // Badges never update in place, so no updated_at trigger.
    fn trigger_sql() -> String {
        String::new()
    }
}

impl SqlxFilterQuery for Badge {}

impl SqlxCrud for Badge {
    fn bind_insert<'q>(
        &self,
        query: sqlx::query::QueryAs<'q, Postgres, Self::Row, PgArguments>,
    ) -> sqlx::query::QueryAs<'q, Postgres, Self::Row, PgArguments> {
        query
            .bind(self.id)
            .bind(self.body_hash.clone())
            .bind(self.body.clone())
            .bind(self.image_path.clone())
            .bind(self.source_url.clone())
            .bind(self.email.clone())
            .bind(self.created_at)
            .bind(self.updated_at)
    }
}
