//! Metrics collection utilities.
//!
//! Aggregates global and per-service call statistics with latency
//! percentiles for observability.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::events::FailureKind;

/// Aggregated metrics across all services.
#[derive(Debug, Clone)]
pub struct GlobalStats {
    pub started_at: DateTime<Utc>,
    pub total_calls: u64,
    pub successes: u64,
    pub failures: u64,
    pub average_latency: Option<Duration>,
    pub p95_latency: Option<Duration>,
}

impl Default for GlobalStats {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            total_calls: 0,
            successes: 0,
            failures: 0,
            average_latency: None,
            p95_latency: None,
        }
    }
}

/// Service-scoped metrics snapshot.
#[derive(Debug, Clone)]
pub struct ServiceStats {
    pub service: String,
    pub total_calls: u64,
    pub successes: u64,
    pub failures: u64,
    pub failures_by_kind: HashMap<FailureKind, u64>,
    /// Attempts across all calls, retries included.
    pub total_attempts: u64,
    pub average_latency: Option<Duration>,
    pub p95_latency: Option<Duration>,
    pub consecutive_failures: u32,
    pub last_status: Option<u16>,
}

impl ServiceStats {
    fn from_accumulator(service: &str, acc: &ServiceAccumulator) -> Self {
        let (avg, p95) = acc.latency_stats();
        Self {
            service: service.to_string(),
            total_calls: acc.total_calls,
            successes: acc.successes,
            failures: acc.failures,
            failures_by_kind: acc.failures_by_kind.clone(),
            total_attempts: acc.total_attempts,
            average_latency: avg,
            p95_latency: p95,
            consecutive_failures: acc.consecutive_failures,
            last_status: acc.last_status,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub global: GlobalStats,
    pub services: Vec<ServiceStats>,
}

impl MetricsSnapshot {
    pub fn service(&self, name: &str) -> Option<&ServiceStats> {
        self.services.iter().find(|stats| stats.service == name)
    }
}

#[derive(Debug)]
struct ServiceAccumulator {
    total_calls: u64,
    successes: u64,
    failures: u64,
    failures_by_kind: HashMap<FailureKind, u64>,
    total_attempts: u64,
    latencies: VecDeque<Duration>,
    max_window: usize,
    consecutive_failures: u32,
    last_status: Option<u16>,
}

impl ServiceAccumulator {
    fn new(max_window: usize) -> Self {
        Self {
            total_calls: 0,
            successes: 0,
            failures: 0,
            failures_by_kind: HashMap::new(),
            total_attempts: 0,
            latencies: VecDeque::with_capacity(max_window),
            max_window,
            consecutive_failures: 0,
            last_status: None,
        }
    }

    fn record(&mut self, outcome: Result<u16, FailureKind>, attempts: u32, latency: Duration) {
        self.total_calls += 1;
        self.total_attempts += u64::from(attempts);

        match outcome {
            Ok(status) => {
                self.successes += 1;
                self.consecutive_failures = 0;
                self.last_status = Some(status);
            }
            Err(kind) => {
                self.failures += 1;
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                *self.failures_by_kind.entry(kind).or_default() += 1;
            }
        }

        if self.latencies.len() == self.max_window {
            self.latencies.pop_front();
        }
        self.latencies.push_back(latency);
    }

    fn latency_stats(&self) -> (Option<Duration>, Option<Duration>) {
        if self.latencies.is_empty() {
            return (None, None);
        }
        let mut samples: Vec<_> = self.latencies.iter().cloned().collect();
        samples.sort_unstable();
        let avg = samples.iter().map(|d| d.as_secs_f64()).sum::<f64>() / samples.len() as f64;
        (Some(Duration::from_secs_f64(avg)), Some(percentile_95(&samples)))
    }
}

fn percentile_95(sorted: &[Duration]) -> Duration {
    let idx = ((sorted.len() as f64 * 0.95).ceil() as usize).saturating_sub(1);
    sorted[idx]
}

#[derive(Debug)]
struct MetricsState {
    global: GlobalStats,
    max_window: usize,
    services: HashMap<String, ServiceAccumulator>,
}

impl MetricsState {
    fn new(max_window: usize) -> Self {
        Self {
            global: GlobalStats::default(),
            max_window,
            services: HashMap::new(),
        }
    }

    fn record(
        &mut self,
        service: &str,
        outcome: Result<u16, FailureKind>,
        attempts: u32,
        latency: Duration,
    ) {
        self.global.total_calls += 1;
        if outcome.is_ok() {
            self.global.successes += 1;
        } else {
            self.global.failures += 1;
        }

        self.global.average_latency = Some(match self.global.average_latency {
            Some(avg) => {
                Duration::from_secs_f64(avg.as_secs_f64() * 0.9 + latency.as_secs_f64() * 0.1)
            }
            None => latency,
        });

        let max_window = self.max_window;
        self.services
            .entry(service.to_string())
            .or_insert_with(|| ServiceAccumulator::new(max_window))
            .record(outcome, attempts, latency);

        let mut samples: Vec<_> = self
            .services
            .values()
            .flat_map(|acc| acc.latencies.iter())
            .cloned()
            .collect();
        samples.sort_unstable();
        if !samples.is_empty() {
            self.global.p95_latency = Some(percentile_95(&samples));
        }
    }
}

/// Thread-safe metrics collector shared by every service it is attached to.
#[derive(Clone, Debug)]
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsState>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MetricsState::new(128))),
        }
    }

    pub fn with_window(window: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MetricsState::new(window.max(16)))),
        }
    }

    pub fn record_success(&self, service: &str, status: u16, attempts: u32, latency: Duration) {
        self.state().record(service, Ok(status), attempts, latency);
    }

    pub fn record_failure(&self, service: &str, kind: FailureKind, attempts: u32, latency: Duration) {
        self.state().record(service, Err(kind), attempts, latency);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let guard = self.state();
        let services = guard
            .services
            .iter()
            .map(|(service, acc)| ServiceStats::from_accumulator(service, acc))
            .collect();
        MetricsSnapshot {
            global: guard.global.clone(),
            services,
        }
    }

    // A panic mid-update leaves counters usable; keep serving them.
    fn state(&self) -> MutexGuard<'_, MetricsState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
