//! Resource endpoint routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::handlers;
use crate::AppState;

/// Create resource routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/{resource}", get(index_handler).post(create_handler))
        .route(
            "/{resource}/{id}",
            get(show_handler)
                .put(replace_handler)
                .patch(patch_handler)
                .delete(delete_handler),
        )
}

/// POST /{resource} - Create a record.
async fn create_handler(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>)> {
    let record = handlers::create_record(&state.pool, &resource, body).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /{resource} - List records, filtered by query parameters.
async fn index_handler(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Query(filter): Query<BTreeMap<String, String>>,
) -> Result<Json<Value>> {
    let records = handlers::list_records(&state.pool, &resource, filter).await?;
    Ok(Json(records))
}

/// GET /{resource}/{id} - Fetch one record.
async fn show_handler(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
) -> Result<Json<Value>> {
    let record = handlers::show_record(&state.pool, &resource, &id).await?;
    Ok(Json(record))
}

/// PUT /{resource}/{id} - Replace a record's attributes.
async fn replace_handler(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>> {
    let record = handlers::replace_record(&state.pool, &resource, &id, body).await?;
    Ok(Json(record))
}

/// PATCH /{resource}/{id} - Merge attributes into a record.
async fn patch_handler(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>> {
    let record = handlers::patch_record(&state.pool, &resource, &id, body).await?;
    Ok(Json(record))
}

/// DELETE /{resource}/{id} - Remove a record.
async fn delete_handler(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
) -> Result<Json<Value>> {
    let body = handlers::delete_record(&state.pool, &resource, &id).await?;
    Ok(Json(body))
}
