mod health;
mod methods;
mod metrics;
mod translate;

pub use health::{HealthResponse, health_handler};
pub use methods::{ALLOWED_METHODS, method_not_allowed, preflight_handler};
pub use metrics::metrics_handler;
pub use translate::{SERVICE_VERSION, dialect_key, translate_handler, validate};
