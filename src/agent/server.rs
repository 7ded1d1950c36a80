//! Agent HTTP endpoints.

use axum::{
    Json, Router,
    extract::State,
    http::{Method, header},
    routing::get,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::agent::MetricsSnapshot;
use crate::collector::METRICS_PATH;
use crate::storage::MetricsPayload;

/// Create the agent router: `GET /metrics` and `GET /healthz`.
///
/// `/metrics` allows cross-origin reads so browser dashboards can poll a node
/// directly.
pub fn create_agent_router(snapshot: MetricsSnapshot) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route(METRICS_PATH, get(metrics_handler).layer(cors))
        .route("/healthz", get(healthz_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(snapshot)
}

async fn metrics_handler(State(snapshot): State<MetricsSnapshot>) -> Json<MetricsPayload> {
    Json(snapshot.get())
}

async fn healthz_handler() -> &'static str {
    "ok"
}
