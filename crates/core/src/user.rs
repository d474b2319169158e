use serde::{Deserialize, Serialize};
use sqlx::postgres::PgArguments;
use sqlx::types::Uuid;
use sqlx::{FromRow, Postgres};

use backpack_common::get_current_timestamp;
use backpack_database::{SqlxCrud, SqlxFilterQuery, SqlxSchema};

/// A backpack account, identified by its verified email. The core pipeline
/// never mutates users; a row is created at the auth boundary on first
/// verified login.
#[derive(Debug, Serialize, Deserialize, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,

    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    pub fn new(email: &str) -> Self {
        let now = get_current_timestamp();
        Self {
            id: Uuid::new_v4(),
            email: email.trim().to_ascii_lowercase(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl SqlxSchema for User {
    type Id = Uuid;
    type Row = User;

    const TABLE_NAME: &'static str = "users";
    const ID_COLUMN_NAME: &'static str = "id";
    const COLUMNS: &'static [&'static str] = &["id", "email", "created_at", "updated_at"];
    const INDEXES_SQL: &'static [&'static str] =
        &["CREATE UNIQUE INDEX IF NOT EXISTS users_email_idx ON \"users\" (\"email\");"];

    fn get_id_value(&self) -> Self::Id {
        self.id
    }

    fn from_row(row: Self::Row) -> Self {
        row
    }

    fn create_table_sql() -> String {
        r#"
        CREATE TABLE IF NOT EXISTS "users" (
            "id" UUID PRIMARY KEY,
            "email" TEXT NOT NULL,
            "created_at" BIGINT NOT NULL,
            "updated_at" BIGINT NOT NULL
        );
        "#
        .to_string()
    }

    fn drop_table_sql() -> String {
        "DROP TABLE IF EXISTS \"users\" CASCADE;".to_string()
    }

    fn insert_sql() -> String {
        format!(
            "INSERT INTO \"users\" (\"id\", \"email\", \"created_at\", \"updated_at\") \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            Self::select_columns()
        )
    }

    fn trigger_sql() -> String {
        String::new()
    }
}

impl SqlxFilterQuery for User {}

impl SqlxCrud for User {
    fn bind_insert<'q>(
        &self,
        query: sqlx::query::QueryAs<'q, Postgres, Self::Row, PgArguments>,
    ) -> sqlx::query::QueryAs<'q, Postgres, Self::Row, PgArguments> {
        query
            .bind(self.id)
            .bind(self.email.clone())
            .bind(self.created_at)
            .bind(self.updated_at)
    }
}
