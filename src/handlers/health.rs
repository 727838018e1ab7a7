use axum::{Json, extract::State};
use serde::Serialize;
use std::sync::Arc;

use super::translate::SERVICE_VERSION;
use crate::metrics::MetricsSnapshot;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub service: &'static str,
    pub version: &'static str,
    #[serde(flatten)]
    pub metrics: MetricsSnapshot,
}

// health handler
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        service: "Colloquial Translation API",
        version: SERVICE_VERSION,
        metrics: state.analytics.snapshot(),
    })
}
