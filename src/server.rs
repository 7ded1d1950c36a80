//! Web server module for nodewatch.
//!
//! Read-only JSON/CSV views over the sample store. Handlers take a snapshot
//! from the [`SampleReader`] and serialize it after the store lock is released,
//! so queries never wait on a collection round.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};

use crate::export::{self, ExportError};
use crate::storage::{Breach, NodeSpec, NodeStatus, Sample, SampleReader};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub reader: SampleReader,
    /// Configured nodes, in configuration order.
    pub nodes: Arc<[Arc<NodeSpec>]>,
}

impl AppState {
    pub fn new(reader: SampleReader, nodes: impl IntoIterator<Item = Arc<NodeSpec>>) -> Self {
        Self {
            reader,
            nodes: nodes.into_iter().collect(),
        }
    }
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Query parameters for the latest API.
#[derive(Debug, Deserialize)]
pub struct LatestQueryParams {
    pub group: Option<String>,
}

/// Query parameters for the history API.
#[derive(Debug, Deserialize)]
pub struct HistoryQueryParams {
    pub node: Option<String>,
}

/// One `/api/latest` entry: the sample plus its classification.
#[derive(Serialize)]
struct LatestRow<'a> {
    #[serde(flatten)]
    sample: &'a Sample,
    group: &'a str,
    status: NodeStatus,
    breaches: Vec<Breach>,
}

/// Create the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    let app_state = Arc::new(state);

    Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/api/latest", get(latest_handler))
        .route("/api/history", get(history_handler))
        .route("/api/groups", get(groups_handler))
        .route("/export/csv", get(export_csv_handler))
        .route("/export/json", get(export_json_handler))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

/// Liveness probe.
async fn healthz_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Latest sample of every node that has one, in configuration order.
async fn latest_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LatestQueryParams>,
) -> Response {
    let latest = state.reader.latest();
    let group = params.group.filter(|g| !g.is_empty());

    let rows: Vec<LatestRow<'_>> = state
        .nodes
        .iter()
        .filter(|node| group.as_deref().is_none_or(|g| node.group == g))
        .filter_map(|node| latest.get(&node.name))
        .map(|sample| LatestRow {
            sample,
            group: &sample.node().group,
            status: sample.status(),
            breaches: sample.breaches(),
        })
        .collect();

    Json(rows).into_response()
}

/// One node's history, or the full mapping when `node` is absent or empty.
async fn history_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryQueryParams>,
) -> Response {
    match params.node.filter(|n| !n.is_empty()) {
        Some(node) => Json(state.reader.history(&node)).into_response(),
        None => Json(state.reader.history_all()).into_response(),
    }
}

/// Sorted, de-duplicated group labels.
async fn groups_handler(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    let groups: BTreeSet<&str> = state.nodes.iter().map(|n| n.group.as_str()).collect();
    Json(groups.into_iter().map(str::to_owned).collect())
}

async fn export_csv_handler(State(state): State<Arc<AppState>>) -> Response {
    match export::to_csv(&state.nodes, &state.reader.history_all()) {
        Ok(body) => (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=metrics.csv",
                ),
            ],
            body,
        )
            .into_response(),
        Err(e) => export_failed(e),
    }
}

async fn export_json_handler(State(state): State<Arc<AppState>>) -> Response {
    match export::to_json(&state.reader.history_all()) {
        Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(e) => export_failed(e),
    }
}

fn export_failed(err: ExportError) -> Response {
    tracing::error!(error = %err, "Export failed");
    (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", err)).into_response()
}
