pub mod config;
pub mod error;
pub mod fingerprint;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod rate_limit;
pub mod routes;
pub mod sanitize;
pub mod state;
pub mod upstream;
