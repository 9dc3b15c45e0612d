//! Cross-cutting services module
//!
//! Observability shared by every service: the event bus that drives logging
//! and the optional metrics collector.

pub mod events;
pub mod metrics;

// Re-export commonly used types
pub use events::{
    CompletedEvent, DisabledEvent, EnabledEvent, EventDispatcher, EventHandler, FailedEvent,
    FailureKind, LoggingHandler, MetricsHandler, RequestEvent, ServiceEvent,
};
pub use metrics::{GlobalStats, MetricsCollector, MetricsSnapshot, ServiceStats};
