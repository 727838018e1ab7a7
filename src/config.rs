use clap::Parser;
use std::time::Duration;

// CLI argument structure. Every flag can also come from the environment (or .env)
#[derive(Parser, Debug, Clone)]
#[command(name = "dialect-gateway")]
#[command(about = "Rate limited proxy that rephrases text in a requested dialect")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    // Interface to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    // Gemini API key, never sent to clients
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub api_key: String,

    // Base URL of the generative language API
    #[arg(long, env = "GEMINI_BASE_URL", default_value = "https://generativelanguage.googleapis.com/v1beta")]
    pub upstream_url: String,

    // Model used for rephrasing
    #[arg(long, env = "GEMINI_MODEL", default_value = "gemini-1.5-flash-latest")]
    pub model: String,

    // Upstream request timeout in seconds
    #[arg(long, env = "UPSTREAM_TIMEOUT", default_value_t = 30)]
    pub upstream_timeout: u64,

    // Rate limit max requests per window for public clients
    #[arg(long, env = "RATE_LIMIT", default_value_t = 20)]
    pub rate_limit: u32,

    // Rate limit for loopback / private network clients
    #[arg(long, env = "LOCAL_RATE_LIMIT", default_value_t = 30)]
    pub local_rate_limit: u32,

    // Rate limit window in seconds
    #[arg(long, env = "RATE_WINDOW", default_value_t = 60)]
    pub rate_window: u64,

    // Log a metrics snapshot every N completed requests (0 disables)
    #[arg(long, env = "METRICS_EVERY", default_value_t = 100)]
    pub metrics_every: u64,

    // Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

impl Args {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout)
    }
}
