use serde::{Deserialize, Serialize};
use sqlx::postgres::PgArguments;
use sqlx::types::{Json, Uuid};
use sqlx::{FromRow, Postgres};

use backpack_common::get_current_timestamp;
use backpack_database::{SqlxCrud, SqlxFilterQuery, SqlxSchema};

use crate::Badge;

/// A named, ordered grouping of badge ids owned by a user.
///
/// The `badges` list may reference ids the user no longer owns (deleted or
/// transferred badges). Dangling references are expected and non-fatal:
/// consumers filter through [`reconcile`] at read time, and the stored list
/// is never pruned back.
#[derive(Debug, Serialize, Deserialize, Clone, FromRow)]
pub struct BadgeGroup {
    pub id: Uuid,
    pub user_id: Uuid,

    pub url: String,
    pub name: String,
    pub badges: Json<Vec<Uuid>>,

    pub created_at: i64,
    pub updated_at: i64,
}

impl BadgeGroup {
    pub fn new(user_id: Uuid, name: impl Into<String>, url: impl Into<String>) -> Self {
        let now = get_current_timestamp();
        Self {
            id: Uuid::new_v4(),
            user_id,
            url: url.into(),
            name: name.into(),
            badges: Json(Vec::new()),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Filters a group's badge-id list against the user's live badges.
///
/// Returns the surviving ids (group order preserved) and the matching badge
/// records. Pure function; neither the group nor the badge index is mutated.
pub fn reconcile(group: &BadgeGroup, owned_badges: &[Badge]) -> (Vec<Uuid>, Vec<Badge>) {
    let mut valid_ids = Vec::new();
    let mut badges = Vec::new();

    for badge_id in group.badges.iter() {
        if let Some(badge) = owned_badges.iter().find(|b| b.id == *badge_id) {
            valid_ids.push(*badge_id);
            badges.push(badge.clone());
        }
    }

    (valid_ids, badges)
}

impl SqlxSchema for BadgeGroup {
    type Id = Uuid;
    type Row = BadgeGroup;

    const TABLE_NAME: &'static str = "badge_groups";
    const ID_COLUMN_NAME: &'static str = "id";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "user_id",
        "url",
        "name",
        "badges",
        "created_at",
        "updated_at",
    ];
    const INDEXES_SQL: &'static [&'static str] = &[
        "CREATE INDEX IF NOT EXISTS badge_groups_user_id_idx ON \"badge_groups\" (\"user_id\");",
    ];

    fn get_id_value(&self) -> Self::Id {
        self.id
    }

    fn from_row(row: Self::Row) -> Self {
        row
    }

    fn create_table_sql() -> String {
        r#"
        CREATE TABLE IF NOT EXISTS "badge_groups" (
            "id" UUID PRIMARY KEY,
            "user_id" UUID NOT NULL,
            "url" TEXT NOT NULL,
            "name" TEXT NOT NULL,
            "badges" JSONB NOT NULL,
            "created_at" BIGINT NOT NULL,
            "updated_at" BIGINT NOT NULL
        );
        "#
        .to_string()
    }

    fn drop_table_sql() -> String {
        "DROP TABLE IF EXISTS \"badge_groups\" CASCADE;".to_string()
    }

    fn insert_sql() -> String {
        format!(
            "INSERT INTO \"badge_groups\" (\"id\", \"user_id\", \"url\", \"name\", \"badges\", \"created_at\", \"updated_at\") \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            Self::select_columns()
        )
    }

    fn trigger_sql() -> String {
        r#"
        DROP TRIGGER IF EXISTS set_badge_groups_updated_at ON "badge_groups";
        CREATE TRIGGER set_badge_groups_updated_at BEFORE UPDATE ON "badge_groups"
        FOR EACH ROW EXECUTE FUNCTION set_updated_at_unix_timestamp()
        "#
        .to_string()
    }
}

impl SqlxFilterQuery for BadgeGroup {}

impl SqlxCrud for BadgeGroup {
    fn bind_insert<'q>(
        &self,
        query: sqlx::query::QueryAs<'q, Postgres, Self::Row, PgArguments>,
    ) -> sqlx::query::QueryAs<'q, Postgres, Self::Row, PgArguments> {
        query
            .bind(self.id)
            .bind(self.user_id)
            .bind(self.url.clone())
            .bind(self.name.clone())
            .bind(self.badges.clone())
            .bind(self.created_at)
            .bind(self.updated_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn badge_for(email: &str) -> Badge {
        Badge::new(
            backpack_common::blake3_hex(email.as_bytes()),
            json!({"recipient": email, "badge": "https://issuer.test/badge"}),
            "images/uploads/x.png",
            "https://issuer.test/assertion",
            email,
        )
    }

    #[test]
    fn reconcile_keeps_group_order_and_drops_dangling_ids() {
        let owned = vec![badge_for("a@example.com"), badge_for("a2@example.com")];
        let mut group = BadgeGroup::new(Uuid::new_v4(), "favorites", "favorites");
        group.badges = Json(vec![owned[1].id, Uuid::new_v4(), owned[0].id]);

        let (valid_ids, badges) = reconcile(&group, &owned);
        assert_eq!(valid_ids, vec![owned[1].id, owned[0].id]);
        assert_eq!(badges.len(), 2);
        assert_eq!(badges[0].id, owned[1].id);

        // The stored list keeps its stale reference.
        assert_eq!(group.badges.len(), 3);
    }

    #[test]
    fn reconcile_of_empty_group_is_empty() {
        let group = BadgeGroup::new(Uuid::new_v4(), "empty", "empty");
        let (valid_ids, badges) = reconcile(&group, &[badge_for("a@example.com")]);
        assert!(valid_ids.is_empty());
        assert!(badges.is_empty());
    }
}
