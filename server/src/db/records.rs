//! Database operations for the records table.
//!
//! Every resource lives in the same table, keyed by `resource` and the
//! generated `id`. Attributes are stored as JSONB without identifier keys.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tandem_engine::{Attributes, REMOTE_ID_KEY};

/// A stored record row from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRow {
    pub id: i64,
    pub attributes: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for ResourceRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(ResourceRow {
            id: row.try_get("id")?,
            attributes: row.try_get("attributes")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl ResourceRow {
    /// Wire representation: the attributes plus `id`.
    ///
    /// Returns `None` if the stored attributes are not a JSON object.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        let mut object = self.attributes.as_object()?.clone();
        object.insert(REMOTE_ID_KEY.to_string(), serde_json::Value::from(self.id));
        Some(serde_json::Value::Object(object))
    }
}

const COLUMNS: &str = "id, attributes, created_at, updated_at";

/// Insert a record and return it with its generated id.
pub async fn insert_record(
    pool: &PgPool,
    resource: &str,
    attributes: &Attributes,
) -> Result<ResourceRow, sqlx::Error> {
    sqlx::query_as::<_, ResourceRow>(&format!(
        "INSERT INTO records (resource, attributes) VALUES ($1, $2) RETURNING {COLUMNS}"
    ))
    .bind(resource)
    .bind(serde_json::Value::Object(attributes.clone()))
    .fetch_one(pool)
    .await
}

/// Get a record by resource and id.
pub async fn get_record(
    pool: &PgPool,
    resource: &str,
    id: i64,
) -> Result<Option<ResourceRow>, sqlx::Error> {
    sqlx::query_as::<_, ResourceRow>(&format!(
        "SELECT {COLUMNS} FROM records WHERE resource = $1 AND id = $2"
    ))
    .bind(resource)
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// List records of a resource, in insertion order.
///
/// Each filter pair matches when the attribute's text form equals the value,
/// so `moons=95` matches both `95` and `"95"`.
pub async fn list_records(
    pool: &PgPool,
    resource: &str,
    filter: &[(String, String)],
) -> Result<Vec<ResourceRow>, sqlx::Error> {
    let mut query = QueryBuilder::<Postgres>::new(format!(
        "SELECT {COLUMNS} FROM records WHERE resource = "
    ));
    query.push_bind(resource.to_string());
    for (key, value) in filter {
        query
            .push(" AND attributes ->> ")
            .push_bind(key.clone())
            .push(" = ")
            .push_bind(value.clone());
    }
    query.push(" ORDER BY id");

    query.build_query_as::<ResourceRow>().fetch_all(pool).await
}

/// Overwrite every attribute of a record.
pub async fn replace_record(
    pool: &PgPool,
    resource: &str,
    id: i64,
    attributes: &Attributes,
) -> Result<Option<ResourceRow>, sqlx::Error> {
    sqlx::query_as::<_, ResourceRow>(&format!(
        r#"
        UPDATE records SET attributes = $3, updated_at = now()
        WHERE resource = $1 AND id = $2
        RETURNING {COLUMNS}
        "#
    ))
    .bind(resource)
    .bind(id)
    .bind(serde_json::Value::Object(attributes.clone()))
    .fetch_optional(pool)
    .await
}

/// Overwrite only the given attributes of a record.
pub async fn merge_record(
    pool: &PgPool,
    resource: &str,
    id: i64,
    attributes: &Attributes,
) -> Result<Option<ResourceRow>, sqlx::Error> {
    sqlx::query_as::<_, ResourceRow>(&format!(
        r#"
        UPDATE records SET attributes = attributes || $3, updated_at = now()
        WHERE resource = $1 AND id = $2
        RETURNING {COLUMNS}
        "#
    ))
    .bind(resource)
    .bind(id)
    .bind(serde_json::Value::Object(attributes.clone()))
    .fetch_optional(pool)
    .await
}

/// Delete a record. Returns false if nothing matched.
pub async fn delete_record(pool: &PgPool, resource: &str, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM records WHERE resource = $1 AND id = $2")
        .bind(resource)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
