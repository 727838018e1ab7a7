use dashmap::DashMap;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use serde::Serialize;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use sysinfo::{ProcessRefreshKind, System};

const TOP_DIALECTS: usize = 5;
const TOP_COUNTRIES: usize = 10;

// Prometheus collectors mirrored from the analytics counters
struct Collectors {
    requests: IntCounter,
    errors: IntCounter,
    outcomes: IntCounterVec,
    latency: Histogram,
    upstream_latency: Histogram,
    active: IntGauge,
}

impl Collectors {
    fn register(registry: &Registry) -> prometheus::Result<Self> {
        let requests = IntCounter::with_opts(Opts::new(
            "translate_requests_total",
            "Completed translation requests",
        ))?;
        let errors = IntCounter::with_opts(Opts::new(
            "translate_errors_total",
            "Translation requests that failed after reaching the upstream call",
        ))?;
        let outcomes = IntCounterVec::new(
            Opts::new("translate_responses_total", "Responses by HTTP status"),
            &["status"],
        )?;
        let latency = Histogram::with_opts(HistogramOpts::new(
            "translate_request_latency_seconds",
            "End to end latency of completed translation requests",
        ))?;
        let upstream_latency = Histogram::with_opts(HistogramOpts::new(
            "translate_upstream_latency_seconds",
            "Latency of calls to the generative language service",
        ))?;
        let active = IntGauge::with_opts(Opts::new(
            "translate_active_connections",
            "Translation requests currently in flight",
        ))?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(errors.clone()))?;
        registry.register(Box::new(outcomes.clone()))?;
        registry.register(Box::new(latency.clone()))?;
        registry.register(Box::new(upstream_latency.clone()))?;
        registry.register(Box::new(active.clone()))?;

        Ok(Self {
            requests,
            errors,
            outcomes,
            latency,
            upstream_latency,
            active,
        })
    }
}

/// Process-local request analytics.
///
/// Counters are best-effort: nothing is shared between instances and
/// everything resets on restart.
pub struct Analytics {
    started_at: Instant,
    request_count: AtomicU64,
    error_count: AtomicU64,
    total_latency_ms: AtomicU64,
    active_connections: AtomicI64,
    dialect_usage: DashMap<String, u64>,
    country_stats: DashMap<String, u64>,
    snapshot_every: u64,
    last_snapshot: AtomicU64,
    registry: Registry,
    collectors: Collectors,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestStats {
    pub total: u64,
    pub errors: u64,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryUsage {
    pub rss_bytes: u64,
    pub virtual_bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Performance {
    pub avg_latency_ms: u64,
    pub active_connections: i64,
    pub memory_usage: MemoryUsage,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub status: &'static str,
    pub uptime: u64,
    pub requests: RequestStats,
    pub performance: Performance,
    pub popular_dialects: Vec<(String, u64)>,
    pub global_usage: Vec<(String, u64)>,
}

impl Analytics {
    pub fn new(snapshot_every: u64) -> prometheus::Result<Self> {
        let registry = Registry::new();
        let collectors = Collectors::register(&registry)?;

        Ok(Self {
            started_at: Instant::now(),
            request_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            total_latency_ms: AtomicU64::new(0),
            active_connections: AtomicI64::new(0),
            dialect_usage: DashMap::new(),
            country_stats: DashMap::new(),
            snapshot_every,
            last_snapshot: AtomicU64::new(0),
            registry,
            collectors,
        })
    }

    /// Mark a request as in flight until the returned guard is dropped.
    pub fn track_connection(&self) -> ConnectionGuard<'_> {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.collectors.active.inc();
        ConnectionGuard { analytics: self }
    }

    pub fn record_success(&self, dialect_key: &str, country: &str, latency: Duration) {
        *self.dialect_usage.entry(dialect_key.to_string()).or_insert(0) += 1;
        *self.country_stats.entry(country.to_string()).or_insert(0) += 1;
        self.record_completed(latency, 200);
    }

    /// Count a request that reached the upstream call and failed with `status`.
    pub fn record_failure(&self, latency: Duration, status: u16) {
        self.record_completed(latency, status);
    }

    // Per-status counts only cover completed requests, like the other counters
    fn record_completed(&self, latency: Duration, status: u16) {
        // errors first so total never reads lower than errors
        if status >= 400 {
            self.error_count.fetch_add(1, Ordering::Relaxed);
            self.collectors.errors.inc();
        }
        self.total_latency_ms
            .fetch_add(latency.as_millis() as u64, Ordering::Relaxed);
        self.request_count.fetch_add(1, Ordering::Relaxed);

        self.collectors.requests.inc();
        self.collectors.latency.observe(latency.as_secs_f64());
        self.observe_status(status);
    }

    pub fn observe_upstream(&self, latency: Duration) {
        self.collectors.upstream_latency.observe(latency.as_secs_f64());
    }

    fn observe_status(&self, status: u16) {
        let status = status.to_string();
        self.collectors
            .outcomes
            .with_label_values(&[status.as_str()])
            .inc();
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    pub fn active_connections(&self) -> i64 {
        self.active_connections.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total = self.request_count();
        let errors = self.error_count().min(total);
        let latency = self.total_latency_ms.load(Ordering::Relaxed);

        let success_rate = if total > 0 {
            let pct = (total - errors) as f64 / total as f64 * 100.0;
            (pct * 100.0).round() / 100.0
        } else {
            100.0
        };

        MetricsSnapshot {
            status: "healthy",
            uptime: self.started_at.elapsed().as_secs(),
            requests: RequestStats {
                total,
                errors,
                success_rate,
            },
            performance: Performance {
                avg_latency_ms: if total > 0 { latency / total } else { 0 },
                active_connections: self.active_connections(),
                memory_usage: memory_usage(),
            },
            popular_dialects: top_n(&self.dialect_usage, TOP_DIALECTS),
            global_usage: top_n(&self.country_stats, TOP_COUNTRIES),
        }
    }

    /// Prometheus text exposition of this instance's collectors.
    pub fn render_prometheus(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    // Emit a snapshot on every Nth completed request
    fn maybe_log_snapshot(&self) {
        let completed = self.request_count();
        if self.snapshot_every == 0 || completed == 0 || completed % self.snapshot_every != 0 {
            return;
        }

        // one snapshot per milestone, even if several guards drop after it
        let last = self.last_snapshot.load(Ordering::Relaxed);
        if last == completed
            || self
                .last_snapshot
                .compare_exchange(last, completed, Ordering::AcqRel, Ordering::Relaxed)
                .is_err()
        {
            return;
        }

        match serde_json::to_string(&self.snapshot()) {
            Ok(snapshot) => tracing::info!(target: "metrics", completed, %snapshot, "metrics snapshot"),
            Err(e) => tracing::warn!(error = %e, "failed to serialize metrics snapshot"),
        }
    }
}

/// Decrements the active connection gauge however the request ends.
pub struct ConnectionGuard<'a> {
    analytics: &'a Analytics,
}

impl Drop for ConnectionGuard<'_> {
    fn drop(&mut self) {
        self.analytics
            .active_connections
            .fetch_sub(1, Ordering::Relaxed);
        self.analytics.collectors.active.dec();
        self.analytics.maybe_log_snapshot();
    }
}

fn top_n(table: &DashMap<String, u64>, n: usize) -> Vec<(String, u64)> {
    let mut entries: Vec<(String, u64)> = table
        .iter()
        .map(|e| (e.key().clone(), *e.value()))
        .collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.truncate(n);
    entries
}

fn memory_usage() -> MemoryUsage {
    let Ok(pid) = sysinfo::get_current_pid() else {
        return MemoryUsage {
            rss_bytes: 0,
            virtual_bytes: 0,
        };
    };

    let mut system = System::new();
    system.refresh_process_specifics(pid, ProcessRefreshKind::new().with_memory());

    system
        .process(pid)
        .map(|p| MemoryUsage {
            rss_bytes: p.memory(),
            virtual_bytes: p.virtual_memory(),
        })
        .unwrap_or(MemoryUsage {
            rss_bytes: 0,
            virtual_bytes: 0,
        })
}
