use axum::{
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::error;

use crate::state::AppState;

// Prometheus text exposition for this instance
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.analytics.render_prometheus() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
