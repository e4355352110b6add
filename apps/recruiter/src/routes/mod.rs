pub mod candidates;
pub mod health;
pub mod messages;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Chat gateway
        .route("/api/v1/messages", post(messages::handle_message))
        // Ingestion pipeline
        .route("/api/v1/candidates", post(candidates::handle_upsert_candidate))
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::build_router;
    use crate::dispatch::WorkerPool;
    use crate::state::AppState;
    use crate::testkit::{self, Harness};

    pub fn router(harness: &Harness, authorized: &[&str]) -> Router {
        build_router(AppState {
            config: Arc::new(testkit::test_config(authorized)),
            engine: harness.engine.clone(),
            workers: WorkerPool::new(2),
            candidates: harness.store.clone(),
        })
    }

    pub async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }
}
