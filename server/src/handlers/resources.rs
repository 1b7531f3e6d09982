//! Resource handlers - the REST contract `RestStore` speaks.
//!
//! Request bodies may carry `id` (PUT does) or `__id`; neither is stored as an
//! attribute. Responses always carry the record's `id`.

use crate::db::{self, ResourceRow};
use crate::error::{AppError, Result};
use serde_json::Value;
use sqlx::PgPool;
use std::collections::BTreeMap;
use tandem_engine::{Attributes, Payload};

/// Check a resource name is a plain path segment.
pub fn validate_resource(resource: &str) -> Result<()> {
    let valid = !resource.is_empty()
        && resource
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "invalid resource name '{resource}'"
        )))
    }
}

/// Parse a record id path segment.
pub fn parse_id(raw: &str) -> Result<i64> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("invalid record id '{raw}'")))
}

/// Attributes of a request body, identifiers removed.
pub fn body_attributes(body: Value) -> Result<Attributes> {
    if !body.is_object() {
        return Err(AppError::BadRequest(
            "request body must be a JSON object".to_string(),
        ));
    }
    Ok(Payload::try_from(body)?.attributes)
}

fn render(row: &ResourceRow) -> Result<Value> {
    row.to_json().ok_or_else(|| {
        AppError::Internal(format!("record {} has non-object attributes", row.id))
    })
}

fn not_found(resource: &str, id: i64) -> AppError {
    AppError::NotFound(format!("{resource}/{id}"))
}

/// POST /{resource}
pub async fn create_record(pool: &PgPool, resource: &str, body: Value) -> Result<Value> {
    validate_resource(resource)?;
    let attributes = body_attributes(body)?;

    let row = db::insert_record(pool, resource, &attributes).await?;
    tracing::info!(resource, id = row.id, created_at = %row.created_at, "record created");
    render(&row)
}

/// GET /{resource}?attr=value
pub async fn list_records(
    pool: &PgPool,
    resource: &str,
    filter: BTreeMap<String, String>,
) -> Result<Value> {
    validate_resource(resource)?;
    let filter: Vec<(String, String)> = filter.into_iter().collect();

    let rows = db::list_records(pool, resource, &filter).await?;
    let records = rows.iter().map(render).collect::<Result<Vec<_>>>()?;
    Ok(Value::Array(records))
}

/// GET /{resource}/{id}
pub async fn show_record(pool: &PgPool, resource: &str, raw_id: &str) -> Result<Value> {
    validate_resource(resource)?;
    let id = parse_id(raw_id)?;

    let row = db::get_record(pool, resource, id)
        .await?
        .ok_or_else(|| not_found(resource, id))?;
    render(&row)
}

/// PUT /{resource}/{id}
pub async fn replace_record(
    pool: &PgPool,
    resource: &str,
    raw_id: &str,
    body: Value,
) -> Result<Value> {
    validate_resource(resource)?;
    let id = parse_id(raw_id)?;
    let attributes = body_attributes(body)?;

    let row = db::replace_record(pool, resource, id, &attributes)
        .await?
        .ok_or_else(|| not_found(resource, id))?;
    tracing::debug!(resource, id, updated_at = %row.updated_at, "record replaced");
    render(&row)
}

/// PATCH /{resource}/{id}
pub async fn patch_record(
    pool: &PgPool,
    resource: &str,
    raw_id: &str,
    body: Value,
) -> Result<Value> {
    validate_resource(resource)?;
    let id = parse_id(raw_id)?;
    let attributes = body_attributes(body)?;

    let row = db::merge_record(pool, resource, id, &attributes)
        .await?
        .ok_or_else(|| not_found(resource, id))?;
    tracing::debug!(resource, id, updated_at = %row.updated_at, "record patched");
    render(&row)
}

/// DELETE /{resource}/{id}
pub async fn delete_record(pool: &PgPool, resource: &str, raw_id: &str) -> Result<Value> {
    validate_resource(resource)?;
    let id = parse_id(raw_id)?;

    if !db::delete_record(pool, resource, id).await? {
        return Err(not_found(resource, id));
    }
    tracing::info!(resource, id, "record deleted");
    Ok(Value::Object(Attributes::new()))
}
