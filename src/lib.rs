//! # http-json-service
//!
//! Uniform outbound calls to external JSON-over-HTTP services.
//!
//! Each remote service is described once by a [`ServiceConfiguration`] and an
//! optional [`ServiceEndpoint`] that supplies per-call URLs, query parameters
//! and headers. [`JsonService`] turns that into a callable executor with:
//!
//! - per-attempt timeouts and transparent retries
//! - one keep-alive connection pool per service
//! - do-not-track redaction of everything that gets logged
//! - a single tagged result for every outcome
//!
//! ## Example
//!
//! ```no_run
//! use http_json_service::{
//!     CallContext, DynamicEndpoint, JsonService, ServiceConfiguration, ServiceSettings,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = ServiceSettings::from_json(r#"{ "url": "http://localhost:4200", "retries": 1 }"#)?;
//!     let config = ServiceConfiguration::new("pip", &settings)?;
//!     let endpoint = DynamicEndpoint::builder(config)
//!         .url(|req| format!("http://localhost:4200/{}", req.path.as_deref().unwrap_or("")))
//!         .parameters(|req, _| req.params.clone())
//!         .build();
//!
//!     let service = JsonService::setup(endpoint)?;
//!     let request = CallContext::new()
//!         .with_path("21.5/-77.2")
//!         .with_header("dnt", "1");
//!
//!     match service.call(&request).await {
//!         Ok(response) => println!("{}", response.body),
//!         Err(err) => eprintln!("lookup failed: {err}"),
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod modules;
pub mod service;

pub use crate::config::{
    ConfigurationError,
    ConfigurationResult,
    ServiceConfiguration,
    ServiceProfile,
    ServiceSettings,
};

pub use crate::service::{
    JsonService,
    JsonServiceBuilder,
    ResponseMetadata,
    ServiceCall,
    ServiceError,
    ServiceResponse,
    ServiceResult,
};

pub use crate::service::endpoint::{
    CallContext,
    DynamicEndpoint,
    DynamicEndpointBuilder,
    HeaderSource,
    Headers,
    Parameters,
    ServiceEndpoint,
};

pub use crate::service::privacy::{DO_NOT_TRACK_HEADERS, is_do_not_track, synthesize_url};

pub use crate::modules::{
    EventDispatcher,
    EventHandler,
    FailureKind,
    LoggingHandler,
    MetricsCollector,
    MetricsHandler,
    MetricsSnapshot,
    ServiceEvent,
    ServiceStats,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
