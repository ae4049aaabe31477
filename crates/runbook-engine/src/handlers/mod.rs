//! HTTP handlers for the runbook engine.
//!
//! Thin JSON wrappers over [`ExecutionService`](crate::services::ExecutionService).

pub mod blocks;
pub mod executions;
pub mod health;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub use health::{api_health, health_check};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let health_routes = Router::new()
        .route("/health", get(health_check))
        .route("/api/health", get(api_health))
        .with_state(state.clone());

    let block_routes = Router::new()
        .route("/api/blocks/execute", post(blocks::execute))
        .with_state(state.executions.clone());

    let execution_routes = Router::new()
        .route(
            "/api/runbooks/{runbook_id}/execute",
            post(executions::start),
        )
        .route("/api/executions", get(executions::list))
        .route("/api/executions/clear", delete(executions::clear))
        .route("/api/executions/{job_id}", get(executions::get))
        .route(
            "/api/executions/{job_id}/control",
            post(executions::control),
        )
        .with_state(state.executions);

    Router::new()
        .merge(health_routes)
        .merge(block_routes)
        .merge(execution_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use http_body_util::BodyExt;
    use runbook_tools::{Executors, ExecutorSettings, NoSecrets};
    use serde_json::Value;
    use std::sync::Arc;
    use tokio::sync::Notify;
    use tower::ServiceExt;

    use crate::services::ExecutionService;
    use crate::state::AppState;
    use crate::store::{MemoryStore, Stores};

    pub fn app() -> (Arc<MemoryStore>, Router) {
        let store = Arc::new(MemoryStore::new());
        let executors =
            Arc::new(Executors::new(ExecutorSettings::default(), Arc::new(NoSecrets)).unwrap());
        let service = ExecutionService::new(
            Stores::shared(store.clone()),
            executors,
            Arc::new(Notify::new()),
        );
        (store, super::router(AppState::new(service, None)))
    }

    pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }
}
