use sqlx::{postgres::PgArguments, Error as SqlxError, Executor, FromRow, Postgres};

/// Trait to define the schema of a database object for PostgreSQL.
pub trait SqlxSchema: Send + Sync + Unpin + Clone + std::fmt::Debug {
    /// The type of the primary key for this database object.
    type Id: Send + Sync + for<'q> sqlx::Encode<'q, Postgres> + sqlx::Type<Postgres> + Clone;

    /// The intermediate type that implements FromRow, used for fetching from the database.
    type Row: for<'r> FromRow<'r, sqlx::postgres::PgRow> + Send + Unpin;

    const TABLE_NAME: &'static str;
    const ID_COLUMN_NAME: &'static str;
    const COLUMNS: &'static [&'static str];
    const INDEXES_SQL: &'static [&'static str];

    // Default utility methods to access consts
    fn id_column_name() -> &'static str { Self::ID_COLUMN_NAME }
    fn table_name() -> &'static str { Self::TABLE_NAME }
    fn columns() -> &'static [&'static str] { Self::COLUMNS }
    fn indexes_sql() -> &'static [&'static str] { Self::INDEXES_SQL }

    /// Retrieves the value of the primary key for an instance of the object.
    fn get_id_value(&self) -> Self::Id;

    /// Converts the intermediate Row type to the Self type.
    fn from_row(row: Self::Row) -> Self;

    // SQL generation methods, implemented per model.
    fn create_table_sql() -> String;
    fn drop_table_sql() -> String;
    fn insert_sql() -> String;
    fn trigger_sql() -> String;

    /// Quoted column list for SELECT statements.
    fn select_columns() -> String {
        Self::COLUMNS
            .iter()
            .map(|c| format!("\"{}\"", c))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Trait for create/delete operations for PostgreSQL.
///
/// Rows in this system are immutable after creation (badges are frozen at
/// award time, users are created once at first login), so there is no
/// update surface.
#[async_trait::async_trait]
pub trait SqlxCrud: SqlxSchema + SqlxFilterQuery + Sized {
    /// Binds the struct fields to an insert query.
    fn bind_insert<'q>(&self, query: sqlx::query::QueryAs<'q, Postgres, Self::Row, PgArguments>)
        -> sqlx::query::QueryAs<'q, Postgres, Self::Row, PgArguments>;

    /// Creates a new record in the database.
    async fn create<'e, E>(self, executor: E) -> Result<Self, SqlxError>
    where
        E: Executor<'e, Database = Postgres> + Send,
        Self: Send,
    {
        let sql = Self::insert_sql();
        let row = self.bind_insert(sqlx::query_as(&sql)).fetch_one(executor).await?;
        Ok(Self::from_row(row))
    }

    /// Deletes a record from the database by its primary key.
    async fn delete<'e, E>(self, executor: E) -> Result<u64, SqlxError>
    where
        E: Executor<'e, Database = Postgres> + Send,
        Self: Send,
    {
        let sql = format!(
            "DELETE FROM \"{}\" WHERE \"{}\" = $1",
            Self::TABLE_NAME,
            Self::ID_COLUMN_NAME
        );
        sqlx::query(&sql)
            .bind(self.get_id_value())
            .execute(executor)
            .await
            .map(|result| result.rows_affected())
    }
}

/// Specifies the direction for ordering query results.
#[derive(Debug, Clone, Copy)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

// --- Filtering Structures and Trait ---

/// A trait to allow for boxing of different types that can be encoded as sqlx arguments.
/// This is a helper for the `QueryCriteria` struct to store argument values of different types.
pub trait AsSqlxArg: Send + Sync {
    fn add_to_args(&self, args: &mut PgArguments) -> Result<(), SqlxError>;
}

/// A blanket implementation of AsSqlxArg for any type that meets the bounds.
/// This allows us to store any value that can be encoded for Postgres.
impl<T> AsSqlxArg for T
where
    T: for<'a> sqlx::Encode<'a, Postgres> + sqlx::Type<Postgres> + Send + Sync + Clone + 'static,
{
    fn add_to_args(&self, args: &mut PgArguments) -> Result<(), SqlxError> {
        use sqlx::Arguments;
        args.add(self.clone()).map_err(SqlxError::Encode)
    }
}

/// Represents a single filter condition for a database query.
pub struct FilterCondition {
    pub column: &'static str,
    pub operator: &'static str,
    /// Holds the value for the condition's placeholder, if any.
    pub value: Option<Box<dyn AsSqlxArg>>,
}

/// Represents the complete criteria for a filtered database query.
/// This struct holds all the components needed to build a dynamic SQL query;
/// [`QueryCriteria::build_clauses`] renders them into SQL text plus a bound
/// argument list.
#[derive(Default)]
pub struct QueryCriteria {
    pub conditions: Vec<FilterCondition>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub order_by: Vec<(&'static str, OrderDirection)>,
}

impl QueryCriteria {
    /// Creates a new, empty `QueryCriteria` builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a filter condition that may or may not have a value.
    pub fn add_filter<V>(mut self, column: &'static str, operator: &'static str, value: Option<V>) -> Self
    where
        V: for<'a> ::sqlx::Encode<'a, Postgres> + ::sqlx::Type<Postgres> + Send + Sync + Clone + 'static,
    {
        self.conditions.push(FilterCondition {
            column,
            operator,
            value: value.map(|v| Box::new(v) as Box<dyn AsSqlxArg>),
        });
        self
    }

    /// A convenience method for `add_filter` that requires a value.
    pub fn add_valued_filter<V>(self, column: &'static str, operator: &'static str, value: V) -> Self
    where
        V: for<'a> ::sqlx::Encode<'a, Postgres> + ::sqlx::Type<Postgres> + Send + Sync + Clone + 'static,
    {
        self.add_filter(column, operator, Some(value))
    }

    /// Sets the LIMIT for the query.
    pub fn limit(mut self, limit_val: i64) -> Self {
        self.limit = Some(limit_val);
        self
    }

    /// Sets the OFFSET for the query.
    pub fn offset(mut self, offset_val: i64) -> Self {
        self.offset = Some(offset_val);
        self
    }

    /// Adds an ORDER BY clause.
    pub fn order_by(mut self, column: &'static str, direction: OrderDirection) -> Self {
        self.order_by.push((column, direction));
        self
    }

    /// Renders the criteria into WHERE/ORDER BY/LIMIT/OFFSET clauses appended
    /// to `base_sql`, together with the bound argument list.
    pub fn build_clauses(&self, base_sql: String) -> Result<(String, PgArguments), SqlxError> {
        let mut sql = base_sql;
        let mut args = PgArguments::default();
        let mut placeholder_idx = 1usize;

        if !self.conditions.is_empty() {
            sql.push_str(" WHERE ");
            for (i, condition) in self.conditions.iter().enumerate() {
                if i > 0 {
                    sql.push_str(" AND ");
                }
                match &condition.value {
                    Some(value) => {
                        value.add_to_args(&mut args)?;
                        sql.push_str(&format!(
                            "\"{}\" {} ${}",
                            condition.column, condition.operator, placeholder_idx
                        ));
                        placeholder_idx += 1;
                    }
                    None => {
                        sql.push_str(&format!("\"{}\" {}", condition.column, condition.operator));
                    }
                }
            }
        }

        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            let order = self
                .order_by
                .iter()
                .map(|(col, dir)| format!("\"{}\" {}", col, dir.as_sql()))
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&order);
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        Ok((sql, args))
    }
}

/// Trait for finding records based on dynamic filter criteria.
#[async_trait::async_trait]
pub trait SqlxFilterQuery: SqlxSchema + Sized {
    /// Finds records based on the provided criteria.
    async fn find_by_criteria<'e, E>(
        criteria: QueryCriteria,
        executor: E,
    ) -> Result<Vec<Self>, SqlxError>
    where
        E: Executor<'e, Database = Postgres> + Send,
        Self: Send,
    {
        let base = format!("SELECT {} FROM \"{}\"", Self::select_columns(), Self::TABLE_NAME);
        let (sql, args) = criteria.build_clauses(base)?;
        let rows: Vec<Self::Row> = sqlx::query_as_with(&sql, args).fetch_all(executor).await?;
        Ok(rows.into_iter().map(Self::from_row).collect())
    }

    /// Finds a single optional record based on the provided criteria.
    /// If multiple records match, this default implementation takes the first one returned by find_by_criteria.
    /// For more control, ensure criteria include ordering and LIMIT 1.
    async fn find_one_by_criteria<'e, E>(
        mut criteria: QueryCriteria, // Take ownership to potentially add LIMIT 1
        executor: E,
    ) -> Result<Option<Self>, SqlxError>
    where
        E: Executor<'e, Database = Postgres> + Send,
        Self: Send,
    {
        if criteria.limit.is_none() {
            criteria = criteria.limit(1);
        };
        let mut results = Self::find_by_criteria(criteria, executor).await?;
        Ok(results.pop()) // Returns None if empty, or the single element.
    }

    /// Deletes records based on the provided criteria.
    async fn delete_by_criteria<'e, E>(
        criteria: QueryCriteria,
        executor: E,
    ) -> Result<u64, SqlxError>
    where
        E: Executor<'e, Database = Postgres> + Send,
        Self: Send,
    {
        let base = format!("DELETE FROM \"{}\"", Self::TABLE_NAME);
        let (sql, args) = criteria.build_clauses(base)?;
        let result = sqlx::query_with(&sql, args).execute(executor).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_clauses_renders_placeholders_in_order() {
        let criteria = QueryCriteria::new()
            .add_valued_filter("email", "=", "a@example.com".to_string())
            .add_valued_filter("body_hash", "=", "abc".to_string())
            .order_by("created_at", OrderDirection::Desc)
            .limit(1);

        let (sql, _args) = criteria
            .build_clauses("SELECT * FROM \"badges\"".to_string())
            .unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM \"badges\" WHERE \"email\" = $1 AND \"body_hash\" = $2 ORDER BY \"created_at\" DESC LIMIT 1"
        );
    }

    #[test]
    fn build_clauses_supports_valueless_conditions() {
        let criteria = QueryCriteria::new().add_filter::<String>("deleted_at", "IS NULL", None);
        let (sql, _args) = criteria
            .build_clauses("SELECT * FROM \"badges\"".to_string())
            .unwrap();
        assert_eq!(sql, "SELECT * FROM \"badges\" WHERE \"deleted_at\" IS NULL");
    }
}
