//! API Handlers
//!
//! HTTP request handlers for the proxy and its management endpoints.

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

use crate::cache::CacheStore;
use crate::error::{Error, Result};
use crate::models::{
    ClearResponse, HealthResponse, MutationRequest, StatsResponse, SyncResponse, QUEUED_HEADER,
};
use crate::queue::{OfflineQueue, PendingOperation, RequestOutcome};
use crate::transport::{HttpMethod, Transport};

/// Prefix under which requests are forwarded upstream
const API_PREFIX: &str = "/api";

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Response cache for proxied GETs
    pub cache: Arc<CacheStore<Value>>,
    /// Mutation queue for proxied writes
    pub queue: Arc<OfflineQueue>,
    /// Upstream client used for reads
    pub transport: Arc<dyn Transport>,
}

impl AppState {
    pub fn new(
        cache: Arc<CacheStore<Value>>,
        queue: Arc<OfflineQueue>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            cache,
            queue,
            transport,
        }
    }
}

/// Handler for /api/*path
///
/// GETs are served through the cache; every other method goes through the
/// offline queue.
pub async fn proxy_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let method = HttpMethod::from_str(method.as_str()).map_err(Error::InvalidRequest)?;
    let url = upstream_url(&uri);

    if method == HttpMethod::Get {
        let key = format!("GET:{}", url);
        let transport = state.transport.clone();
        let value = state
            .cache
            .cache_wrap(&key, None, || async move {
                transport.request(HttpMethod::Get, &url, None).await
            })
            .await?;
        return Ok(Json(value).into_response());
    }

    let request =
        MutationRequest::from_parts(method, url, &headers, &body).map_err(Error::InvalidRequest)?;

    let outcome = state
        .queue
        .perform_request(request.method, &request.url, request.body, request.optimistic)
        .await?;

    match outcome {
        RequestOutcome::Completed(value) => Ok(Json(value).into_response()),
        queued => {
            let mut response = (StatusCode::ACCEPTED, Json(queued.into_value())).into_response();
            response
                .headers_mut()
                .insert(QUEUED_HEADER, HeaderValue::from_static("true"));
            Ok(response)
        }
    }
}

/// Path and query of `uri` with the `/api` prefix removed.
fn upstream_url(uri: &Uri) -> String {
    let path = uri.path().strip_prefix(API_PREFIX).unwrap_or(uri.path());
    let path = if path.is_empty() { "/" } else { path };
    match uri.query() {
        Some(query) => format!("{}?{}", path, query),
        None => path.to_string(),
    }
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let pending = state.queue.pending_operation_count().await;
    Json(StatsResponse::new(
        state.cache.stats(),
        pending,
        state.queue.is_online(),
        state.queue.is_syncing(),
    ))
}

/// Handler for POST /sync
pub async fn sync_handler(State(state): State<AppState>) -> Json<SyncResponse> {
    Json(SyncResponse::new(state.queue.sync_pending_operations().await))
}

/// Handler for GET /queue
pub async fn queue_handler(State(state): State<AppState>) -> Result<Json<Vec<PendingOperation>>> {
    Ok(Json(state.queue.pending_operations().await?))
}

/// Handler for DELETE /cache
pub async fn clear_all_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    state.cache.clear_all();
    Json(ClearResponse::new("Cache cleared", None))
}

/// Handler for DELETE /cache/:key
///
/// Returns 404 when the key was not in memory. The durable copy is removed
/// either way.
pub async fn clear_key_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> (StatusCode, Json<ClearResponse>) {
    if state.cache.clear(&key) {
        (
            StatusCode::OK,
            Json(ClearResponse::new(format!("Key '{}' cleared", key), Some(1))),
        )
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(ClearResponse::new(format!("Key '{}' not cached", key), Some(0))),
        )
    }
}

/// Handler for DELETE /cache/prefix/:prefix
pub async fn clear_prefix_handler(
    State(state): State<AppState>,
    Path(prefix): Path<String>,
) -> Json<ClearResponse> {
    let removed = state.cache.clear_by_prefix(&prefix);
    Json(ClearResponse::new(
        format!("Entries with prefix '{}' cleared", prefix),
        Some(removed),
    ))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
