//! API Routes
//!
//! Configures the Axum router with the proxy and management endpoints.

use axum::{
    routing::{any, delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_all_handler, clear_key_handler, clear_prefix_handler, health_handler, proxy_handler,
    queue_handler, stats_handler, sync_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/*path", any(proxy_handler))
        .route("/stats", get(stats_handler))
        .route("/sync", post(sync_handler))
        .route("/queue", get(queue_handler))
        .route("/cache", delete(clear_all_handler))
        .route("/cache/:key", delete(clear_key_handler))
        .route("/cache/prefix/:prefix", delete(clear_prefix_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStore;
    use crate::config::StoreConfig;
    use crate::connectivity::Connectivity;
    use crate::error::TransportError;
    use crate::queue::OfflineQueue;
    use crate::storage::MemoryBackend;
    use crate::transport::{HttpMethod, Transport};
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::util::ServiceExt;

    struct EchoTransport;

    #[async_trait]
    impl Transport for EchoTransport {
        async fn request(
            &self,
            method: HttpMethod,
            url: &str,
            _body: Option<&Value>,
        ) -> Result<Value, TransportError> {
            Ok(json!({ "method": method.as_str(), "url": url }))
        }
    }

    fn create_test_app() -> Router {
        let config = StoreConfig::default();
        let transport: Arc<dyn Transport> = Arc::new(EchoTransport);
        let queue = OfflineQueue::new(
            &config,
            Some(Arc::new(MemoryBackend::new())),
            transport.clone(),
            Connectivity::new(true),
        );
        let state = AppState::new(
            Arc::new(CacheStore::memory_only(&config)),
            Arc::new(queue),
            transport,
        );
        create_router(state)
    }

    async fn send(app: Router, method: &str, uri: &str) -> StatusCode {
        app.oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
        .status()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        assert_eq!(send(create_test_app(), "GET", "/health").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        assert_eq!(send(create_test_app(), "GET", "/stats").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_proxy_get_endpoint() {
        assert_eq!(send(create_test_app(), "GET", "/api/docs/1").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_proxy_delete_endpoint() {
        assert_eq!(send(create_test_app(), "DELETE", "/api/docs/1").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_clear_missing_key_not_found() {
        assert_eq!(
            send(create_test_app(), "DELETE", "/cache/nonexistent").await,
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_unsupported_method_rejected() {
        assert_eq!(
            send(create_test_app(), "TRACE", "/api/docs").await,
            StatusCode::BAD_REQUEST
        );
    }
}
