//! Prometheus-compatible metrics endpoint
//!
//! Exposes sync and detection counters in Prometheus format.
//! Default endpoint: http://localhost:9090/metrics

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use parking_lot::RwLock;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{info, debug};

/// Metrics registry for the sync guard
#[derive(Debug)]
pub struct Metrics {
    // Tracked remote entities
    pub entities_tracked: AtomicU64,

    // Snapshot intake
    pub snapshots_applied: AtomicU64,
    pub snapshots_dropped: AtomicU64,
    pub samples_skipped: AtomicU64,

    // Detection
    pub movement_violations: AtomicU64,
    pub casts_validated: AtomicU64,
    pub casts_rejected: AtomicU64,
    pub signals_dropped: AtomicU64,

    // Render tick timing (microseconds)
    pub tick_time_us: AtomicU64,
    pub tick_time_p95_us: AtomicU64,
    pub tick_time_p99_us: AtomicU64,
    pub tick_time_max_us: AtomicU64,
    pub tick_count: AtomicU64,

    start_time: Instant,

    // Rolling tick times for percentile calculation (VecDeque for O(1) pop_front)
    tick_history: RwLock<VecDeque<u64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            entities_tracked: AtomicU64::new(0),
            snapshots_applied: AtomicU64::new(0),
            snapshots_dropped: AtomicU64::new(0),
            samples_skipped: AtomicU64::new(0),
            movement_violations: AtomicU64::new(0),
            casts_validated: AtomicU64::new(0),
            casts_rejected: AtomicU64::new(0),
            signals_dropped: AtomicU64::new(0),
            tick_time_us: AtomicU64::new(0),
            tick_time_p95_us: AtomicU64::new(0),
            tick_time_p99_us: AtomicU64::new(0),
            tick_time_max_us: AtomicU64::new(0),
            tick_count: AtomicU64::new(0),
            start_time: Instant::now(),
            tick_history: RwLock::new(VecDeque::with_capacity(1000)),
        }
    }

    #[inline]
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a render tick time and update percentiles
    pub fn record_tick_time(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.tick_time_us.store(us, Ordering::Relaxed);
        self.tick_count.fetch_add(1, Ordering::Relaxed);

        let mut history = self.tick_history.write();
        history.push_back(us);

        // Keep last 1000 samples
        while history.len() > 1000 {
            history.pop_front();
        }

        if history.len() >= 10 {
            let mut sorted: Vec<u64> = history.iter().copied().collect();
            sorted.sort_unstable();

            let p95_idx = (sorted.len() as f32 * 0.95) as usize;
            let p99_idx = (sorted.len() as f32 * 0.99) as usize;

            self.tick_time_p95_us.store(sorted[p95_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_p99_us.store(sorted[p99_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_max_us.store(sorted.last().copied().unwrap_or(0), Ordering::Relaxed);
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-format metrics output
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(2048);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        metric!("sync_guard_entities_tracked", "Remote entities being reconciled", "gauge",
            self.entities_tracked.load(Ordering::Relaxed));

        metric!("sync_guard_snapshots_applied_total", "Snapshots applied", "counter",
            self.snapshots_applied.load(Ordering::Relaxed));
        metric!("sync_guard_snapshots_dropped_total", "Snapshots dropped (stale, malformed, disabled)", "counter",
            self.snapshots_dropped.load(Ordering::Relaxed));
        metric!("sync_guard_samples_skipped_total", "Movement samples skipped for malformed timing", "counter",
            self.samples_skipped.load(Ordering::Relaxed));

        metric!("sync_guard_movement_violations_total", "Movement speed violations", "counter",
            self.movement_violations.load(Ordering::Relaxed));
        metric!("sync_guard_casts_validated_total", "Ability casts validated", "counter",
            self.casts_validated.load(Ordering::Relaxed));
        metric!("sync_guard_casts_rejected_total", "Ability casts rejected", "counter",
            self.casts_rejected.load(Ordering::Relaxed));
        metric!("sync_guard_signals_dropped_total", "Cheat signals dropped on a full bus", "counter",
            self.signals_dropped.load(Ordering::Relaxed));

        metric!("sync_guard_tick_time_microseconds", "Last render tick time", "gauge",
            self.tick_time_us.load(Ordering::Relaxed));
        metric!("sync_guard_tick_time_p95_microseconds", "95th percentile render tick time", "gauge",
            self.tick_time_p95_us.load(Ordering::Relaxed));
        metric!("sync_guard_tick_time_p99_microseconds", "99th percentile render tick time", "gauge",
            self.tick_time_p99_us.load(Ordering::Relaxed));
        metric!("sync_guard_tick_time_max_microseconds", "Maximum render tick time", "gauge",
            self.tick_time_max_us.load(Ordering::Relaxed));
        metric!("sync_guard_tick_count", "Render ticks processed", "counter",
            self.tick_count.load(Ordering::Relaxed));
        metric!("sync_guard_uptime_seconds", "Uptime in seconds", "counter",
            self.uptime_seconds());

        output
    }

    /// Generate JSON format metrics
    pub fn to_json(&self) -> String {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        serde_json::json!({
            "entities": {
                "tracked": load(&self.entities_tracked),
            },
            "snapshots": {
                "applied": load(&self.snapshots_applied),
                "dropped": load(&self.snapshots_dropped),
                "samples_skipped": load(&self.samples_skipped),
            },
            "detection": {
                "movement_violations": load(&self.movement_violations),
                "casts_validated": load(&self.casts_validated),
                "casts_rejected": load(&self.casts_rejected),
                "signals_dropped": load(&self.signals_dropped),
            },
            "performance": {
                "tick_time_us": load(&self.tick_time_us),
                "tick_time_p95_us": load(&self.tick_time_p95_us),
                "tick_time_p99_us": load(&self.tick_time_p99_us),
                "tick_time_max_us": load(&self.tick_time_max_us),
                "tick_count": load(&self.tick_count),
            },
            "uptime_seconds": self.uptime_seconds(),
        })
        .to_string()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Start the metrics HTTP server
pub async fn start_metrics_server(metrics: Arc<Metrics>, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Metrics server listening on http://{}/metrics", addr);

    loop {
        let (mut socket, peer) = listener.accept().await?;
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 1024];

            match socket.read(&mut buffer).await {
                Ok(n) if n > 0 => {
                    let request = String::from_utf8_lossy(&buffer[..n]);
                    let response = render_response(&metrics, &request);

                    if let Err(e) = socket.write_all(response.as_bytes()).await {
                        debug!("Failed to write metrics response to {}: {}", peer, e);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Failed to read from metrics socket {}: {}", peer, e);
                }
            }
        });
    }
}

fn render_response(metrics: &Metrics, request: &str) -> String {
    let ok = |content_type: &str, body: &str| {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            content_type,
            body.len(),
            body
        )
    };

    // Longest prefix first: "/metrics/json" also starts with "/metrics"
    if request.starts_with("GET /metrics/json") || request.starts_with("GET /json") {
        ok("application/json", &metrics.to_json())
    } else if request.starts_with("GET /metrics") {
        ok("text/plain; version=0.0.4", &metrics.to_prometheus())
    } else if request.starts_with("GET /health") || request.starts_with("GET / ") {
        ok("text/plain", "OK")
    } else {
        "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = Metrics::new();
        assert_eq!(metrics.entities_tracked.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.tick_count.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_record_tick_time() {
        let metrics = Metrics::new();

        for i in 0..100 {
            metrics.record_tick_time(Duration::from_micros(100 + i * 10));
        }

        assert_eq!(metrics.tick_count.load(Ordering::Relaxed), 100);
        assert!(metrics.tick_time_p95_us.load(Ordering::Relaxed) > 0);
        assert_eq!(metrics.tick_time_max_us.load(Ordering::Relaxed), 1090);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = Metrics::new();
        metrics.entities_tracked.store(12, Ordering::Relaxed);
        Metrics::incr(&metrics.casts_rejected);

        let output = metrics.to_prometheus();

        assert!(output.contains("sync_guard_entities_tracked 12"));
        assert!(output.contains("sync_guard_casts_rejected_total 1"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_json_format() {
        let metrics = Metrics::new();
        metrics.movement_violations.store(3, Ordering::Relaxed);

        let parsed: serde_json::Value = serde_json::from_str(&metrics.to_json()).unwrap();
        assert_eq!(parsed["detection"]["movement_violations"], 3);
        assert_eq!(parsed["entities"]["tracked"], 0);
    }

    #[test]
    fn test_routing() {
        let metrics = Metrics::new();
        assert!(render_response(&metrics, "GET /metrics HTTP/1.1").contains("sync_guard_tick_count"));
        assert!(render_response(&metrics, "GET /metrics/json HTTP/1.1").contains("application/json"));
        assert!(render_response(&metrics, "GET /health HTTP/1.1").ends_with("OK"));
        assert!(render_response(&metrics, "GET /nope HTTP/1.1").starts_with("HTTP/1.1 404"));
    }
}
