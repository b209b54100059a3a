//! HTTP handlers (SPEC_FULL §6, C11): a thin axum surface over
//! [`imgcache_core::Engine`]'s public operations.
//!
//! Grounded on the teacher's `server/src/api.rs` handler shape (one
//! function per route, `State(ctx)` extraction, `Json`/tuple responses) —
//! re-pointed at the image engine instead of the codebase index.

use crate::error::ApiError;
use crate::AppState;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use imgcache_core::{Format, Interpolation, RequestParams};
use serde::Deserialize;
use serde_json::json;

/// Query-string parameters accepted by `GET /images/:id` (SPEC_FULL C11).
#[derive(Debug, Deserialize)]
pub struct RenditionQuery {
    #[serde(rename = "t")]
    pub format: Option<String>,
    #[serde(rename = "q")]
    pub quality: Option<u32>,
    #[serde(rename = "w")]
    pub width: Option<u32>,
    #[serde(rename = "h")]
    pub height: Option<u32>,
    #[serde(rename = "mb")]
    pub max_bytes: Option<String>,
    #[serde(rename = "i")]
    pub interpolation: Option<String>,
    #[serde(rename = "preset")]
    pub preset: Option<String>,
}

fn build_request(
    id: u64,
    query: RenditionQuery,
    engine: &imgcache_core::Engine,
) -> Result<RequestParams, ApiError> {
    let format = query.format.map(|s| s.parse::<Format>()).transpose()?;
    let interpolation = query.interpolation.map(|s| s.parse::<Interpolation>()).transpose()?;
    let max_bytes = query
        .max_bytes
        .map(|s| s.parse::<imgcache_core::Size>())
        .transpose()
        .map_err(|e| imgcache_core::Error::invalid_params(e))?
        .map(|s| s.as_u64());

    let mut req = RequestParams {
        id,
        format,
        quality: query.quality,
        width: query.width,
        height: query.height,
        max_bytes,
        interpolation,
    };

    if let Some(name) = &query.preset {
        let preset = engine
            .get_preset(name)
            .ok_or_else(|| imgcache_core::Error::invalid_params(format!("unknown preset '{name}'")))?;
        req = preset.apply(req);
    }

    Ok(req)
}

/// `GET /images/:id?t=&q=&w=&h=&mb=&i=&preset=` — produces or serves a
/// cached rendition.
pub async fn get_image(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Query(query): Query<RenditionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let req = build_request(id, query, &state.engine)?;
    let path = state.engine.get(req)?;
    let bytes = tokio::fs::read(&path).await.map_err(|e| imgcache_core::Error::internal(e.to_string()))?;
    let content_type = match path.extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    };
    Ok(([("content-type", content_type)], bytes))
}

/// `POST /images` — multipart upload of a new original, returns its id.
pub async fn add_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut data: Option<Vec<u8>> = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        Into::<ApiError>::into(imgcache_core::Error::invalid_params(format!("bad multipart body: {e}")))
    })? {
        let bytes = field.bytes().await.map_err(|e| {
            Into::<ApiError>::into(imgcache_core::Error::invalid_params(format!(
                "failed reading upload: {e}"
            )))
        })?;
        data = Some(bytes.to_vec());
    }
    let data = data
        .ok_or_else(|| Into::<ApiError>::into(imgcache_core::Error::invalid_params("no file in upload")))?;
    let id = state.engine.add(&data)?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

/// `DELETE /images/:id` — removes the original and all derived cache entries.
pub async fn delete_image(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, ApiError> {
    state.engine.delete(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /images` — lists all original ids.
pub async fn list_images(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let ids = state.engine.ids()?;
    Ok(Json(json!({ "ids": ids })))
}

/// `GET /stat` — aggregate counters across originals and the cache.
pub async fn get_stat(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let stat = state.engine.stat()?;
    Ok(Json(json!({
        "originals_count": stat.originals_count,
        "originals_bytes": stat.originals_bytes,
        "cache_items": stat.cache_items,
        "cache_capacity": stat.cache_capacity,
        "cache_bytes": stat.cache_bytes,
        "hits": stat.hits,
        "misses": stat.misses,
        "evictions": stat.evictions,
    })))
}

/// `GET /stat/:id` — per-id counters.
pub async fn get_stat_id(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, ApiError> {
    let stat = state.engine.stat_id(id)?;
    Ok(Json(json!({
        "original_bytes": stat.original_bytes,
        "cache_entries": stat.cache_entries,
        "cache_bytes": stat.cache_bytes,
    })))
}

/// `GET /health` — liveness probe, matching the teacher's `/health` route.
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}
