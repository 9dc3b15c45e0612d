//! Service configuration module
//!
//! Provides the per-endpoint settings shared by every call to a service:
//! - Serde-backed settings blob (`url`, `timeout`, `retries`)
//! - Validated, immutable `ServiceConfiguration`
//! - Profiles selecting default timeout and logging verbosity

pub mod settings;

pub use settings::{
    ConfigurationError, ConfigurationResult, ServiceConfiguration, ServiceProfile,
    ServiceSettings, DEFAULT_RETRIES,
};
