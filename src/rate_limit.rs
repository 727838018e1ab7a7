use dashmap::DashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

// Rate limit entry - tracks requests per client key within one window
#[derive(Debug, Clone)]
pub struct ClientWindow {
    pub client_id: String,
    pub request_count: u32,
    pub window_start: Instant,
    pub user_agent: String,
}

// Outcome of a single rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub limited: bool,
    pub current_usage: u32,
    pub limit: u32,
    pub retry_after: u64,
}

impl RateDecision {
    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.current_usage)
    }
}

/// Per-client fixed-window request counter.
///
/// State is held in process memory only, so limits are enforced per instance.
pub struct RateLimiter {
    windows: DashMap<String, ClientWindow>,
    standard_limit: u32, // public clients
    local_limit: u32,    // loopback / private network clients
    window: Duration,
}

impl RateLimiter {
    pub fn new(standard_limit: u32, local_limit: u32, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            standard_limit,
            local_limit,
            window,
        }
    }

    pub fn check(&self, client_key: &str, user_agent: &str) -> RateDecision {
        self.check_at(client_key, user_agent, Instant::now())
    }

    /// Record one request for `client_key` at `now` and decide whether it is over the limit.
    pub fn check_at(&self, client_key: &str, user_agent: &str, now: Instant) -> RateDecision {
        let window = self.window;

        // expired windows are dropped before the lookup
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.window_start) <= window);

        let mut entry = self
            .windows
            .entry(client_key.to_string())
            .or_insert_with(|| ClientWindow {
                client_id: client_key.to_string(),
                request_count: 0,
                window_start: now,
                user_agent: if user_agent.is_empty() {
                    "unknown".to_string()
                } else {
                    user_agent.to_string()
                },
            });

        if now.saturating_duration_since(entry.window_start) > window {
            entry.request_count = 0;
            entry.window_start = now;
        }

        entry.request_count = entry.request_count.saturating_add(1);
        let limit = self.limit_for(client_key);

        RateDecision {
            limited: entry.request_count > limit,
            current_usage: entry.request_count,
            limit,
            retry_after: window.as_secs(),
        }
    }

    pub fn limit_for(&self, client_key: &str) -> u32 {
        if is_local_address(client_key) {
            self.local_limit
        } else {
            self.standard_limit
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}

// Loopback and private-network addresses get the more generous limit
pub fn is_local_address(key: &str) -> bool {
    let Ok(ip) = key.trim().parse::<IpAddr>() else {
        return false;
    };

    match ip {
        IpAddr::V4(v4) => v4.is_loopback() || v4.is_private(),
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return mapped.is_loopback() || mapped.is_private();
            }
            // fc00::/7 unique local
            v6.is_loopback() || (v6.segments()[0] & 0xfe00) == 0xfc00
        }
    }
}
