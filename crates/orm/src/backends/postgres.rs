//! PostgreSQL Document Store
//!
//! Every collection is a table `(id TEXT PRIMARY KEY, doc JSONB, seq BIGSERIAL)`.
//! Filters are translated to JSONB path expressions; all values and field
//! paths are bound as parameters. Unique indexes are expression indexes on
//! the text value of the field.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgQueryResult, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};

use super::core::{Document, DocumentStore, GroupBucket, ID_FIELD};
use super::filter::{Filter, FindQuery, SortOrder};
use crate::error::{OrmError, OrmResult};
use crate::security::{escape_identifier, validate_collection_name, validate_field_path};

const UNIQUE_VIOLATION: &str = "23505";
const UNDEFINED_TABLE: &str = "42P01";

/// Pool settings for the PostgreSQL store
#[derive(Debug, Clone)]
pub struct PostgresStoreConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub idle_timeout_seconds: Option<u64>,
}

impl Default for PostgresStoreConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            acquire_timeout_seconds: 30,
            idle_timeout_seconds: Some(600),
        }
    }
}

/// Bind parameter
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    TextArray(Vec<String>),
    Json(JsonValue),
    BigInt(i64),
}

/// A SQL statement with its positional parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl Statement {
    fn push(&mut self, sql: &str) {
        self.sql.push_str(sql);
    }

    /// Add a parameter and return its placeholder
    fn bind(&mut self, param: SqlParam) -> String {
        self.params.push(param);
        format!("${}", self.params.len())
    }

    /// Placeholder for a field path, as `text[]`
    fn bind_path(&mut self, field: &str) -> String {
        let segments = field.split('.').map(str::to_string).collect();
        format!("{}::text[]", self.bind(SqlParam::TextArray(segments)))
    }

    fn into_query(self) -> (String, Vec<SqlParam>) {
        (self.sql, self.params)
    }
}

/// Escape LIKE wildcards so user input matches literally
fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Append the SQL condition for `filter` to `stmt`
fn push_condition(stmt: &mut Statement, filter: &Filter) {
    match filter {
        Filter::All => stmt.push("TRUE"),
        Filter::Eq(field, JsonValue::Null) => {
            let path = stmt.bind_path(field);
            stmt.push(&format!("COALESCE(doc #> {}, 'null'::jsonb) = 'null'::jsonb", path));
        }
        Filter::Eq(field, value) => {
            let path = stmt.bind_path(field);
            let value = stmt.bind(SqlParam::Json(value.clone()));
            stmt.push(&format!("(doc #> {}) = {}::jsonb", path, value));
        }
        Filter::Ne(field, value) => {
            // missing fields compare as NULL, which must count as different
            stmt.push("(");
            push_condition(stmt, &Filter::Eq(field.clone(), value.clone()));
            stmt.push(") IS NOT TRUE");
        }
        Filter::In(field, values) => {
            if values.is_empty() {
                stmt.push("FALSE");
                return;
            }
            let ors = values
                .iter()
                .map(|v| Filter::Eq(field.clone(), v.clone()))
                .collect();
            push_condition(stmt, &Filter::Or(ors));
        }
        Filter::Gt(field, value) => push_comparison(stmt, field, ">", value),
        Filter::Gte(field, value) => push_comparison(stmt, field, ">=", value),
        Filter::Lt(field, value) => push_comparison(stmt, field, "<", value),
        Filter::Lte(field, value) => push_comparison(stmt, field, "<=", value),
        Filter::Contains(field, needle) => {
            let path = stmt.bind_path(field);
            let pattern = stmt.bind(SqlParam::Text(escape_like(needle)));
            stmt.push(&format!(
                "(jsonb_typeof(doc #> {path}) = 'string' AND (doc #>> {path}) ILIKE {pattern})",
                path = path,
                pattern = pattern
            ));
        }
        Filter::Exists(field, present) => {
            let path = stmt.bind_path(field);
            let op = if *present { "<>" } else { "=" };
            stmt.push(&format!("COALESCE(doc #> {}, 'null'::jsonb) {} 'null'::jsonb", path, op));
        }
        Filter::And(filters) | Filter::Or(filters) => {
            let (joiner, empty) = match filter {
                Filter::And(_) => (" AND ", "TRUE"),
                _ => (" OR ", "FALSE"),
            };
            if filters.is_empty() {
                stmt.push(empty);
                return;
            }
            stmt.push("(");
            for (i, inner) in filters.iter().enumerate() {
                if i > 0 {
                    stmt.push(joiner);
                }
                stmt.push("(");
                push_condition(stmt, inner);
                stmt.push(")");
            }
            stmt.push(")");
        }
    }
}

fn push_comparison(stmt: &mut Statement, field: &str, op: &str, value: &JsonValue) {
    let path = stmt.bind_path(field);
    let value = stmt.bind(SqlParam::Json(value.clone()));
    stmt.push(&format!(
        "(jsonb_typeof(doc #> {path}) = jsonb_typeof({value}::jsonb) AND (doc #> {path}) {op} {value}::jsonb)",
        path = path,
        value = value,
        op = op
    ));
}

fn table(collection: &str) -> OrmResult<String> {
    validate_collection_name(collection)?;
    Ok(escape_identifier(collection))
}

/// DDL for a collection table
pub fn create_table_sql(collection: &str) -> OrmResult<String> {
    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} (id TEXT PRIMARY KEY, doc JSONB NOT NULL, seq BIGSERIAL)",
        table(collection)?
    ))
}

/// DDL for a unique expression index on one field
pub fn create_unique_index_sql(collection: &str, field: &str) -> OrmResult<String> {
    let table = table(collection)?;
    validate_field_path(field)?;
    let mut index_name = format!("{}_{}_key", collection, field.replace('.', "_"));
    index_name.truncate(63);
    let path = field.split('.').collect::<Vec<_>>().join(",");
    Ok(format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} ((doc #>> '{{{}}}'))",
        escape_identifier(&index_name),
        table,
        path
    ))
}

/// SELECT for a find query
pub fn select_sql(collection: &str, query: &FindQuery) -> OrmResult<Statement> {
    let mut stmt = Statement::default();
    stmt.push(&format!("SELECT doc FROM {} WHERE ", table(collection)?));
    push_condition(&mut stmt, &query.filter);

    stmt.push(" ORDER BY ");
    for (field, order) in &query.sort {
        let path = stmt.bind_path(field);
        let direction = match order {
            SortOrder::Asc => "ASC NULLS FIRST",
            SortOrder::Desc => "DESC NULLS LAST",
        };
        stmt.push(&format!("(doc #> {}) {}, ", path, direction));
    }
    stmt.push("seq ASC");

    if let Some(limit) = query.limit {
        let limit = stmt.bind(SqlParam::BigInt(i64::try_from(limit).unwrap_or(i64::MAX)));
        stmt.push(&format!(" LIMIT {}", limit));
    }
    if query.skip > 0 {
        let skip = stmt.bind(SqlParam::BigInt(i64::try_from(query.skip).unwrap_or(i64::MAX)));
        stmt.push(&format!(" OFFSET {}", skip));
    }
    Ok(stmt)
}

/// SELECT COUNT(*)
pub fn count_sql(collection: &str, filter: &Filter) -> OrmResult<Statement> {
    let mut stmt = Statement::default();
    stmt.push(&format!("SELECT COUNT(*) AS count FROM {} WHERE ", table(collection)?));
    push_condition(&mut stmt, filter);
    Ok(stmt)
}

/// Grouping aggregate
pub fn group_sql(
    collection: &str,
    filter: &Filter,
    group_field: &str,
    sum_field: Option<&str>,
) -> OrmResult<Statement> {
    let table = table(collection)?;
    let mut stmt = Statement::default();
    let group_path = stmt.bind_path(group_field);
    let total = match sum_field {
        Some(field) => {
            let path = stmt.bind_path(field);
            format!(
                "COALESCE(SUM(CASE WHEN jsonb_typeof(doc #> {path}) = 'number' \
                 THEN (doc #>> {path})::double precision \
                 WHEN jsonb_typeof(doc #> {path}) = 'string' AND (doc #>> {path}) ~ '^-?[0-9]+(\\.[0-9]+)?$' \
                 THEN (doc #>> {path})::double precision ELSE 0 END), 0)::double precision",
                path = path
            )
        }
        None => "0::double precision".to_string(),
    };
    stmt.push(&format!(
        "SELECT COALESCE(doc #> {}, 'null'::jsonb) AS key, COUNT(*) AS count, {} AS total FROM {} WHERE ",
        group_path, total, table
    ));
    push_condition(&mut stmt, filter);
    stmt.push(" GROUP BY 1 ORDER BY 1");
    Ok(stmt)
}

/// Merge into the first match and return the new document
pub fn update_one_sql(collection: &str, filter: &Filter, changes: Document) -> OrmResult<Statement> {
    let table = table(collection)?;
    let mut stmt = Statement::default();
    let changes = stmt.bind(SqlParam::Json(JsonValue::Object(changes)));
    stmt.push(&format!(
        "UPDATE {table} SET doc = doc || {changes}::jsonb WHERE id = (SELECT id FROM {table} WHERE ",
        table = table,
        changes = changes
    ));
    push_condition(&mut stmt, filter);
    stmt.push(" ORDER BY seq LIMIT 1) RETURNING doc");
    Ok(stmt)
}

/// Merge into every match
pub fn update_many_sql(collection: &str, filter: &Filter, changes: Document) -> OrmResult<Statement> {
    let mut stmt = Statement::default();
    let changes = stmt.bind(SqlParam::Json(JsonValue::Object(changes)));
    stmt.push(&format!(
        "UPDATE {} SET doc = doc || {}::jsonb WHERE ",
        table(collection)?,
        changes
    ));
    push_condition(&mut stmt, filter);
    Ok(stmt)
}

/// Remove top-level keys from every match that has any of them
pub fn unset_sql(collection: &str, filter: &Filter, fields: &[String]) -> OrmResult<Statement> {
    let mut stmt = Statement::default();
    let keys = stmt.bind(SqlParam::TextArray(fields.to_vec()));
    stmt.push(&format!(
        "UPDATE {table} SET doc = doc - {keys}::text[] WHERE doc ?| {keys}::text[] AND ",
        table = table(collection)?,
        keys = keys
    ));
    push_condition(&mut stmt, filter);
    Ok(stmt)
}

/// Rename one top-level key
pub fn rename_sql(collection: &str, from: &str, to: &str) -> OrmResult<Statement> {
    let mut stmt = Statement::default();
    let from = stmt.bind(SqlParam::Text(from.to_string()));
    let to = stmt.bind(SqlParam::Text(to.to_string()));
    stmt.push(&format!(
        "UPDATE {table} SET doc = (doc - {from}::text) || jsonb_build_object({to}::text, doc -> {from}::text) \
         WHERE doc ? {from}::text",
        table = table(collection)?,
        from = from,
        to = to
    ));
    Ok(stmt)
}

/// Delete the first match
pub fn delete_one_sql(collection: &str, filter: &Filter) -> OrmResult<Statement> {
    let table = table(collection)?;
    let mut stmt = Statement::default();
    stmt.push(&format!(
        "DELETE FROM {table} WHERE id = (SELECT id FROM {table} WHERE ",
        table = table
    ));
    push_condition(&mut stmt, filter);
    stmt.push(" ORDER BY seq LIMIT 1)");
    Ok(stmt)
}

/// Delete every match
pub fn delete_many_sql(collection: &str, filter: &Filter) -> OrmResult<Statement> {
    let mut stmt = Statement::default();
    stmt.push(&format!("DELETE FROM {} WHERE ", table(collection)?));
    push_condition(&mut stmt, filter);
    Ok(stmt)
}

fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: Vec<SqlParam>,
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            SqlParam::Text(value) => query.bind(value),
            SqlParam::TextArray(values) => query.bind(values),
            SqlParam::Json(value) => query.bind(sqlx::types::Json(value)),
            SqlParam::BigInt(value) => query.bind(value),
        };
    }
    query
}

fn error_code(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) => db.code().map(|c| c.into_owned()),
        _ => None,
    }
}

fn is_undefined_table(err: &sqlx::Error) -> bool {
    error_code(err).as_deref() == Some(UNDEFINED_TABLE)
}

fn map_store_error(collection: &str, err: sqlx::Error) -> OrmError {
    if error_code(&err).as_deref() == Some(UNIQUE_VIOLATION) {
        let key = match &err {
            sqlx::Error::Database(db) => db.constraint().unwrap_or("unique index").to_string(),
            _ => "unique index".to_string(),
        };
        return OrmError::DuplicateKey {
            collection: collection.to_string(),
            key,
        };
    }
    OrmError::Database(format!("{} (collection '{}')", err, collection))
}

fn row_document(row: &PgRow) -> OrmResult<Document> {
    let sqlx::types::Json(value): sqlx::types::Json<JsonValue> = row.try_get("doc")?;
    match value {
        JsonValue::Object(map) => Ok(map),
        other => Err(OrmError::Serialization(format!(
            "Stored document is not an object: {}",
            other
        ))),
    }
}

/// [`DocumentStore`] backed by PostgreSQL JSONB tables
#[derive(Debug, Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// Wrap an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect using the given pool settings
    pub async fn connect(database_url: &str, config: PostgresStoreConfig) -> OrmResult<Self> {
        if !database_url.starts_with("postgresql://") && !database_url.starts_with("postgres://") {
            return Err(OrmError::Configuration(
                "Invalid PostgreSQL URL scheme (expected postgres:// or postgresql://)".to_string(),
            ));
        }

        let mut options = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds));
        if let Some(idle) = config.idle_timeout_seconds {
            options = options.idle_timeout(Duration::from_secs(idle));
        }

        let pool = options
            .connect(database_url)
            .await
            .map_err(|e| OrmError::Database(format!("Failed to connect to PostgreSQL: {}", e)))?;
        tracing::debug!(max_connections = config.max_connections, "PostgreSQL pool ready");
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn execute(&self, stmt: Statement) -> Result<PgQueryResult, sqlx::Error> {
        let (sql, params) = stmt.into_query();
        tracing::debug!(target: "strata::store", sql = %sql, "execute");
        bind_all(sqlx::query(&sql), params).execute(&self.pool).await
    }

    async fn fetch_all(&self, stmt: Statement) -> Result<Vec<PgRow>, sqlx::Error> {
        let (sql, params) = stmt.into_query();
        tracing::debug!(target: "strata::store", sql = %sql, "fetch");
        bind_all(sqlx::query(&sql), params).fetch_all(&self.pool).await
    }

    /// Run a write; a missing table means nothing matched
    async fn write(&self, collection: &str, stmt: Statement) -> OrmResult<u64> {
        match self.execute(stmt).await {
            Ok(result) => Ok(result.rows_affected()),
            Err(e) if is_undefined_table(&e) => Ok(0),
            Err(e) => Err(map_store_error(collection, e)),
        }
    }

    /// Run a read; a missing table reads as empty
    async fn read(&self, collection: &str, stmt: Statement) -> OrmResult<Vec<PgRow>> {
        match self.fetch_all(stmt).await {
            Ok(rows) => Ok(rows),
            Err(e) if is_undefined_table(&e) => Ok(Vec::new()),
            Err(e) => Err(map_store_error(collection, e)),
        }
    }

    async fn create_table(&self, collection: &str) -> OrmResult<()> {
        let sql = create_table_sql(collection)?;
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| map_store_error(collection, e))?;
        Ok(())
    }

    async fn try_insert(&self, collection: &str, id: &str, document: &Document) -> Result<(), sqlx::Error> {
        let sql = format!(
            "INSERT INTO {} (id, doc) VALUES ($1, $2::jsonb)",
            escape_identifier(collection)
        );
        sqlx::query(&sql)
            .bind(id.to_string())
            .bind(sqlx::types::Json(JsonValue::Object(document.clone())))
            .execute(&self.pool)
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    fn backend_name(&self) -> &'static str {
        "postgresql"
    }

    async fn ensure_collection(&self, collection: &str, unique_fields: &[String]) -> OrmResult<()> {
        self.create_table(collection).await?;
        for field in unique_fields {
            let sql = create_unique_index_sql(collection, field)?;
            sqlx::query(&sql)
                .execute(&self.pool)
                .await
                .map_err(|e| map_store_error(collection, e))?;
        }
        Ok(())
    }

    async fn drop_collection(&self, collection: &str) -> OrmResult<bool> {
        let table = table(collection)?;
        let existed: bool = sqlx::query("SELECT to_regclass($1) IS NOT NULL AS present")
            .bind(table.clone())
            .fetch_one(&self.pool)
            .await?
            .try_get("present")?;
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
            .execute(&self.pool)
            .await
            .map_err(|e| map_store_error(collection, e))?;
        Ok(existed)
    }

    async fn insert_one(&self, collection: &str, document: Document) -> OrmResult<()> {
        validate_collection_name(collection)?;
        let id = match document.get(ID_FIELD) {
            Some(JsonValue::String(s)) => s.clone(),
            Some(JsonValue::Null) | None => {
                return Err(OrmError::Validation(format!(
                    "Document inserted into '{}' has no {}",
                    collection, ID_FIELD
                )))
            }
            Some(other) => other.to_string(),
        };

        match self.try_insert(collection, &id, &document).await {
            Ok(()) => Ok(()),
            Err(e) if is_undefined_table(&e) => {
                self.create_table(collection).await?;
                self.try_insert(collection, &id, &document)
                    .await
                    .map_err(|e| map_store_error(collection, e))
            }
            Err(e) => Err(map_store_error(collection, e)),
        }
    }

    async fn find(&self, collection: &str, query: &FindQuery) -> OrmResult<Vec<Document>> {
        let rows = self.read(collection, select_sql(collection, query)?).await?;
        rows.iter().map(row_document).collect()
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        mut changes: Document,
    ) -> OrmResult<Option<Document>> {
        changes.remove(ID_FIELD);
        let rows = self
            .read(collection, update_one_sql(collection, filter, changes)?)
            .await?;
        rows.first().map(row_document).transpose()
    }

    async fn update_many(&self, collection: &str, filter: &Filter, mut changes: Document) -> OrmResult<u64> {
        changes.remove(ID_FIELD);
        self.write(collection, update_many_sql(collection, filter, changes)?).await
    }

    async fn unset_fields(&self, collection: &str, filter: &Filter, fields: &[String]) -> OrmResult<u64> {
        if fields.is_empty() {
            return Ok(0);
        }
        self.write(collection, unset_sql(collection, filter, fields)?).await
    }

    async fn rename_field(&self, collection: &str, from: &str, to: &str) -> OrmResult<u64> {
        self.write(collection, rename_sql(collection, from, to)?).await
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> OrmResult<bool> {
        Ok(self.write(collection, delete_one_sql(collection, filter)?).await? > 0)
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> OrmResult<u64> {
        self.write(collection, delete_many_sql(collection, filter)?).await
    }

    async fn count(&self, collection: &str, filter: &Filter) -> OrmResult<u64> {
        let rows = self.read(collection, count_sql(collection, filter)?).await?;
        let count: i64 = match rows.first() {
            Some(row) => row.try_get("count")?,
            None => 0,
        };
        Ok(count.max(0) as u64)
    }

    async fn group_by(
        &self,
        collection: &str,
        filter: &Filter,
        group_field: &str,
        sum_field: Option<&str>,
    ) -> OrmResult<Vec<GroupBucket>> {
        let rows = self
            .read(collection, group_sql(collection, filter, group_field, sum_field)?)
            .await?;
        rows.iter()
            .map(|row| {
                let sqlx::types::Json(key): sqlx::types::Json<JsonValue> = row.try_get("key")?;
                let count: i64 = row.try_get("count")?;
                let sum: f64 = row.try_get("total")?;
                Ok(GroupBucket {
                    key,
                    count: count.max(0) as u64,
                    sum,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_table_and_index_ddl() {
        assert_eq!(
            create_table_sql("users").unwrap(),
            "CREATE TABLE IF NOT EXISTS \"users\" (id TEXT PRIMARY KEY, doc JSONB NOT NULL, seq BIGSERIAL)"
        );
        assert_eq!(
            create_unique_index_sql("strata_migrations", "id").unwrap(),
            "CREATE UNIQUE INDEX IF NOT EXISTS \"strata_migrations_id_key\" ON \"strata_migrations\" ((doc #>> '{id}'))"
        );
        assert!(create_table_sql("users; drop").is_err());
        assert!(create_unique_index_sql("users", "email') --").is_err());
    }

    #[test]
    fn test_select_binds_every_value() {
        let query = FindQuery::new(Filter::all_of(vec![
            Filter::eq("role", "admin"),
            Filter::contains("email", "50%_off"),
        ]))
        .sort_by("createdAt", SortOrder::Desc)
        .skip(10)
        .limit(5);

        let stmt = select_sql("users", &query).unwrap();
        assert!(stmt.sql.starts_with("SELECT doc FROM \"users\" WHERE (("));
        assert!(stmt.sql.contains("(doc #> $1::text[]) = $2::jsonb"));
        assert!(stmt.sql.contains("ILIKE $4"));
        assert!(stmt.sql.contains("ORDER BY (doc #> $5::text[]) DESC NULLS LAST, seq ASC"));
        assert!(stmt.sql.ends_with("LIMIT $6 OFFSET $7"));
        assert_eq!(stmt.params.len(), 7);
        assert_eq!(stmt.params[1], SqlParam::Json(json!("admin")));
        assert_eq!(stmt.params[3], SqlParam::Text("%50\\%\\_off%".to_string()));
        assert_eq!(stmt.params[5], SqlParam::BigInt(5));
        assert_eq!(stmt.params[6], SqlParam::BigInt(10));
        assert!(!stmt.sql.contains("admin"));
    }

    #[test]
    fn test_nested_paths_and_null_semantics() {
        let stmt = count_sql("users", &Filter::eq("profile.city", JsonValue::Null)).unwrap();
        assert!(stmt.sql.contains("COALESCE(doc #> $1::text[], 'null'::jsonb) = 'null'::jsonb"));
        assert_eq!(
            stmt.params[0],
            SqlParam::TextArray(vec!["profile".to_string(), "city".to_string()])
        );

        let stmt = count_sql("users", &Filter::In("role".into(), vec![])).unwrap();
        assert!(stmt.sql.ends_with("WHERE FALSE"));

        let stmt = count_sql("users", &Filter::Or(vec![])).unwrap();
        assert!(stmt.sql.ends_with("WHERE FALSE"));
    }

    #[test]
    fn test_group_sql_with_and_without_sum() {
        let stmt = group_sql("files", &Filter::All, "mimeType", Some("sizeBytes")).unwrap();
        assert!(stmt.sql.contains("COUNT(*) AS count"));
        assert!(stmt.sql.contains("(doc #>> $2::text[])::double precision"));
        assert!(stmt.sql.contains("jsonb_typeof(doc #> $2::text[]) = 'string'"));
        assert!(stmt.sql.ends_with("WHERE TRUE GROUP BY 1 ORDER BY 1"));
        assert_eq!(stmt.params.len(), 2);

        let stmt = group_sql("users", &Filter::All, "role", None).unwrap();
        assert!(stmt.sql.contains("0::double precision AS total"));
        assert_eq!(stmt.params.len(), 1);
    }

    #[test]
    fn test_mutation_statements() {
        let mut changes = Document::new();
        changes.insert("isVerified".into(), json!(true));

        let stmt = update_one_sql("users", &Filter::by_id("u1"), changes.clone()).unwrap();
        assert!(stmt.sql.starts_with("UPDATE \"users\" SET doc = doc || $1::jsonb WHERE id = (SELECT id"));
        assert!(stmt.sql.ends_with("ORDER BY seq LIMIT 1) RETURNING doc"));

        let stmt = unset_sql("users", &Filter::All, &["name".to_string()]).unwrap();
        assert!(stmt.sql.contains("doc - $1::text[] WHERE doc ?| $1::text[] AND TRUE"));

        let stmt = rename_sql("users", "name", "fullName").unwrap();
        assert_eq!(stmt.params.len(), 2);
        assert!(stmt.sql.contains("jsonb_build_object($2::text, doc -> $1::text)"));

        let stmt = delete_one_sql("files", &Filter::by_id("f1")).unwrap();
        assert!(stmt.sql.starts_with("DELETE FROM \"files\" WHERE id = (SELECT id FROM \"files\""));

        let stmt = delete_many_sql("files", &Filter::ne("isPublic", true)).unwrap();
        assert!(stmt.sql.ends_with("IS NOT TRUE"));
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("abc"), "%abc%");
        assert_eq!(escape_like("a_b%c\\"), "%a\\_b\\%c\\\\%");
    }
}
