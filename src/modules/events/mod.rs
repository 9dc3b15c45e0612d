//! Event system for service calls.
//!
//! Every observable step of a service (setup, dispatch, completion, failure)
//! is published as a [`ServiceEvent`]. Handlers turn them into log lines,
//! metrics, or anything else a caller registers.

use chrono::{DateTime, Utc};
use log::Level;
use std::sync::Arc;
use std::time::Duration;

use super::metrics::MetricsCollector;

/// Service came up without a base URL and will reject every call.
#[derive(Debug, Clone)]
pub struct DisabledEvent {
    pub service: String,
    pub timestamp: DateTime<Utc>,
}

/// Service came up pointing at `base_url`.
#[derive(Debug, Clone)]
pub struct EnabledEvent {
    pub service: String,
    pub base_url: String,
    pub timestamp: DateTime<Utc>,
}

/// A call is about to be dispatched. `url` is already log-safe.
#[derive(Debug, Clone)]
pub struct RequestEvent {
    pub service: String,
    pub url: String,
    pub do_not_track: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CompletedEvent {
    pub service: String,
    pub status: u16,
    pub attempts: u32,
    pub latency: Duration,
    pub timestamp: DateTime<Utc>,
}

/// Classification of a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Disabled,
    HttpStatus,
    Transport,
    Parse,
    InvalidHeader,
}

#[derive(Debug, Clone)]
pub struct FailedEvent {
    pub service: String,
    pub kind: FailureKind,
    /// Rendered error, identical to what the caller receives.
    pub message: String,
    pub attempts: u32,
    pub latency: Duration,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum ServiceEvent {
    Disabled(DisabledEvent),
    Enabled(EnabledEvent),
    Request(RequestEvent),
    Completed(CompletedEvent),
    Failed(FailedEvent),
}

impl ServiceEvent {
    pub fn service(&self) -> &str {
        match self {
            ServiceEvent::Disabled(event) => &event.service,
            ServiceEvent::Enabled(event) => &event.service,
            ServiceEvent::Request(event) => &event.service,
            ServiceEvent::Completed(event) => &event.service,
            ServiceEvent::Failed(event) => &event.service,
        }
    }

    pub fn level(&self) -> Level {
        match self {
            ServiceEvent::Disabled(_) => Level::Warn,
            ServiceEvent::Enabled(_) => Level::Info,
            ServiceEvent::Request(_) => Level::Debug,
            ServiceEvent::Completed(_) => Level::Trace,
            ServiceEvent::Failed(_) => Level::Error,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ServiceEvent::Disabled(event) => format!("{} service disabled", event.service),
            ServiceEvent::Enabled(event) => {
                format!("using {} service at {}", event.service, event.base_url)
            }
            ServiceEvent::Request(event) => format!("{}: {}", event.service, event.url),
            ServiceEvent::Completed(event) => format!(
                "{} returned status {} after {} attempt(s) in {}ms",
                event.service,
                event.status,
                event.attempts,
                event.latency.as_millis()
            ),
            ServiceEvent::Failed(event) => event.message.clone(),
        }
    }
}

/// Trait implemented by event handlers.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &ServiceEvent);
}

/// Dispatcher that broadcasts events to registered handlers.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self { handlers: Vec::new() }
    }

    pub fn register_handler(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn dispatch(&self, event: ServiceEvent) {
        for handler in &self.handlers {
            handler.handle(&event);
        }
    }
}

/// Logs events through the `log` crate, using the service name as target.
#[derive(Debug)]
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn handle(&self, event: &ServiceEvent) {
        let level = event.level();
        if log::log_enabled!(target: event.service(), level) {
            log::log!(target: event.service(), level, "{}", event.message());
        }
    }
}

/// Metrics handler that feeds the metrics collector.
#[derive(Clone, Debug)]
pub struct MetricsHandler {
    metrics: MetricsCollector,
}

impl MetricsHandler {
    pub fn new(metrics: MetricsCollector) -> Self {
        Self { metrics }
    }
}

impl EventHandler for MetricsHandler {
    fn handle(&self, event: &ServiceEvent) {
        match event {
            ServiceEvent::Completed(done) => {
                self.metrics
                    .record_success(&done.service, done.status, done.attempts, done.latency);
            }
            ServiceEvent::Failed(failed) => {
                self.metrics
                    .record_failure(&failed.service, failed.kind, failed.attempts, failed.latency);
            }
            _ => {}
        }
    }
}
