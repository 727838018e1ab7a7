use anyhow::{Context, Result};

use crate::config::Args;
use crate::metrics::Analytics;
use crate::rate_limit::RateLimiter;
use crate::upstream::GeminiClient;

// app's shared state, built once at startup and handed to every handler
pub struct AppState {
    pub upstream: GeminiClient,
    pub rate_limiter: RateLimiter,
    pub analytics: Analytics,
}

impl AppState {
    pub fn new(upstream: GeminiClient, rate_limiter: RateLimiter, analytics: Analytics) -> Self {
        Self {
            upstream,
            rate_limiter,
            analytics,
        }
    }

    pub fn from_args(args: &Args) -> Result<Self> {
        let upstream = GeminiClient::new(
            &args.upstream_url,
            &args.model,
            &args.api_key,
            args.upstream_timeout(),
        )
        .context("Failed to build upstream HTTP client")?;

        let rate_limiter = RateLimiter::new(args.rate_limit, args.local_rate_limit, args.rate_window());
        let analytics =
            Analytics::new(args.metrics_every).context("Failed to register metrics")?;

        Ok(Self::new(upstream, rate_limiter, analytics))
    }
}
