use anyhow::{Context, Result};
use clap::Parser; // for cli
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use dialect_gateway::config::Args;
use dialect_gateway::routes::build_router;
use dialect_gateway::state::AppState;

// this is main async function with tokio
#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored when the variables are already set)
    let _ = dotenvy::dotenv();

    // parse cli arguments (env fallback for every flag)
    let args = Args::parse();

    let filter = EnvFilter::from_default_env().add_directive("dialect_gateway=info".parse()?);
    if args.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    // creating shared state
    let state = Arc::new(AppState::from_args(&args)?);
    let app = build_router(state);

    let addr = args.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Gateway running on http://{}", addr);
    info!("Forwarding to {} (model {})", args.upstream_url, args.model);
    info!(
        "Rate limit: {} requests per {} seconds ({} for local clients)",
        args.rate_limit, args.rate_window, args.local_rate_limit
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}
