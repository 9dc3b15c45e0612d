//! Endpoint capability interface.
//!
//! A [`ServiceEndpoint`] decides, per call, which URL to hit and which query
//! parameters and headers to send. The executor never looks inside the
//! caller's context values beyond asking a [`HeaderSource`] whether a header
//! key is present.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::ServiceConfiguration;

/// Query parameters in the order they should be sent.
pub type Parameters = Vec<(String, String)>;

/// Extra request headers keyed by name.
pub type Headers = HashMap<String, String>;

/// Anything that can answer whether it carries a given header key.
///
/// Lookups are case-sensitive for plain maps. `http::HeaderMap` normalizes
/// names, so every casing matches there.
pub trait HeaderSource {
    fn has_header(&self, name: &str) -> bool;
}

impl HeaderSource for HashMap<String, String> {
    fn has_header(&self, name: &str) -> bool {
        self.contains_key(name)
    }
}

impl HeaderSource for http::HeaderMap {
    fn has_header(&self, name: &str) -> bool {
        self.contains_key(name)
    }
}

/// General purpose request/response context for callers that do not have a
/// request type of their own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallContext {
    pub headers: HashMap<String, String>,
    pub params: Parameters,
    pub path: Option<String>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl HeaderSource for CallContext {
    fn has_header(&self, name: &str) -> bool {
        self.headers.has_header(name)
    }
}

/// Per-endpoint behaviour layered over a [`ServiceConfiguration`].
///
/// Every hook has a default: the URL is the configured base URL, and no
/// parameters or headers are added. `response` is `None` when the service is
/// invoked through the single-context entry point.
pub trait ServiceEndpoint: Send + Sync {
    type Request: HeaderSource + Sync + ?Sized;
    type Response: Sync + ?Sized;

    fn configuration(&self) -> &ServiceConfiguration;

    fn url(&self, _request: &Self::Request) -> String {
        self.configuration().url().to_string()
    }

    fn parameters(
        &self,
        _request: &Self::Request,
        _response: Option<&Self::Response>,
    ) -> Parameters {
        Parameters::new()
    }

    fn headers(&self, _request: &Self::Request, _response: Option<&Self::Response>) -> Headers {
        Headers::new()
    }
}

impl ServiceEndpoint for ServiceConfiguration {
    type Request = CallContext;
    type Response = CallContext;

    fn configuration(&self) -> &ServiceConfiguration {
        self
    }
}

impl<E: ServiceEndpoint + ?Sized> ServiceEndpoint for Arc<E> {
    type Request = E::Request;
    type Response = E::Response;

    fn configuration(&self) -> &ServiceConfiguration {
        (**self).configuration()
    }

    fn url(&self, request: &Self::Request) -> String {
        (**self).url(request)
    }

    fn parameters(&self, request: &Self::Request, response: Option<&Self::Response>) -> Parameters {
        (**self).parameters(request, response)
    }

    fn headers(&self, request: &Self::Request, response: Option<&Self::Response>) -> Headers {
        (**self).headers(request, response)
    }
}

type UrlFn = Arc<dyn Fn(&CallContext) -> String + Send + Sync>;
type ParametersFn = Arc<dyn Fn(&CallContext, Option<&CallContext>) -> Parameters + Send + Sync>;
type HeadersFn = Arc<dyn Fn(&CallContext, Option<&CallContext>) -> Headers + Send + Sync>;

/// Endpoint assembled from closures over [`CallContext`].
///
/// ```
/// use http_json_service::{DynamicEndpoint, ServiceConfiguration, ServiceSettings};
///
/// let config = ServiceConfiguration::new("pip", &ServiceSettings::new().with_url("http://pip:4200"))?;
/// let endpoint = DynamicEndpoint::builder(config)
///     .parameters(|req, _| req.params.clone())
///     .headers(|_, _| [("x-client".to_string(), "api".to_string())].into())
///     .build();
/// # Ok::<(), http_json_service::ConfigurationError>(())
/// ```
#[derive(Clone)]
pub struct DynamicEndpoint {
    config: ServiceConfiguration,
    url: Option<UrlFn>,
    parameters: Option<ParametersFn>,
    headers: Option<HeadersFn>,
}

impl DynamicEndpoint {
    pub fn builder(config: ServiceConfiguration) -> DynamicEndpointBuilder {
        DynamicEndpointBuilder {
            endpoint: DynamicEndpoint {
                config,
                url: None,
                parameters: None,
                headers: None,
            },
        }
    }
}

impl fmt::Debug for DynamicEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicEndpoint")
            .field("config", &self.config)
            .field("custom_url", &self.url.is_some())
            .field("custom_parameters", &self.parameters.is_some())
            .field("custom_headers", &self.headers.is_some())
            .finish()
    }
}

impl ServiceEndpoint for DynamicEndpoint {
    type Request = CallContext;
    type Response = CallContext;

    fn configuration(&self) -> &ServiceConfiguration {
        &self.config
    }

    fn url(&self, request: &CallContext) -> String {
        match &self.url {
            Some(resolve) => resolve(request),
            None => self.config.url().to_string(),
        }
    }

    fn parameters(&self, request: &CallContext, response: Option<&CallContext>) -> Parameters {
        self.parameters
            .as_ref()
            .map(|build| build(request, response))
            .unwrap_or_default()
    }

    fn headers(&self, request: &CallContext, response: Option<&CallContext>) -> Headers {
        self.headers
            .as_ref()
            .map(|build| build(request, response))
            .unwrap_or_default()
    }
}

/// Fluent builder for [`DynamicEndpoint`].
pub struct DynamicEndpointBuilder {
    endpoint: DynamicEndpoint,
}

impl DynamicEndpointBuilder {
    pub fn url<F>(mut self, resolve: F) -> Self
    where
        F: Fn(&CallContext) -> String + Send + Sync + 'static,
    {
        self.endpoint.url = Some(Arc::new(resolve));
        self
    }

    pub fn parameters<F>(mut self, build: F) -> Self
    where
        F: Fn(&CallContext, Option<&CallContext>) -> Parameters + Send + Sync + 'static,
    {
        self.endpoint.parameters = Some(Arc::new(build));
        self
    }

    pub fn headers<F>(mut self, build: F) -> Self
    where
        F: Fn(&CallContext, Option<&CallContext>) -> Headers + Send + Sync + 'static,
    {
        self.endpoint.headers = Some(Arc::new(build));
        self
    }

    pub fn build(self) -> DynamicEndpoint {
        self.endpoint
    }
}
