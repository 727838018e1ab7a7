use axum::{
    Router,
    http::{HeaderName, HeaderValue},
    routing::get,
};
use std::sync::Arc;
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};

use crate::handlers::{
    health_handler, method_not_allowed, metrics_handler, preflight_handler, translate_handler,
};
use crate::state::AppState;

// Applied to every response, errors included
pub const SECURITY_HEADERS: [(&str, &str); 8] = [
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("x-xss-protection", "1; mode=block"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    ("access-control-allow-origin", "*"),
    ("access-control-allow-methods", "POST, GET, OPTIONS"),
    ("access-control-allow-headers", "Content-Type, Authorization"),
    ("strict-transport-security", "max-age=31536000; includeSubDomains"),
];

/// Build the gateway router: the translate endpoint (also mounted at `/`)
/// and the Prometheus scrape endpoint.
pub fn build_router(state: Arc<AppState>) -> Router {
    let translate = get(health_handler)
        .post(translate_handler)
        .options(preflight_handler)
        .fallback(method_not_allowed);

    let mut router = Router::new()
        .route("/", translate.clone())
        .route("/api/translate", translate)
        .route("/metrics", get(metrics_handler))
        .with_state(state);

    for (name, value) in SECURITY_HEADERS {
        router = router.layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        ));
    }

    router.layer(TraceLayer::new_for_http())
}
