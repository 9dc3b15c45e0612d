//! JSON service executor.
//!
//! [`JsonService::setup`] binds a [`ServiceEndpoint`] once and decides, for the
//! lifetime of the executor, whether the service is enabled. Enabled services
//! share one keep-alive connection pool across every call; disabled services
//! reject each call without touching the network.
//!
//! Every call ends in exactly one [`ServiceResult`]:
//! - 2xx with a JSON content type: the parsed body
//! - 2xx with anything else: [`ServiceError::Parse`]
//! - non-2xx once retries are exhausted: [`ServiceError::HttpStatus`]
//! - no response at all: [`ServiceError::Transport`] with the raw client error
//!
//! When the caller's request carries a do-not-track header, only the bare base
//! URL plus a `[do_not_track]` marker appears in logs and error messages.

pub mod endpoint;
pub mod privacy;
mod transport;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use http::header::{HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::config::{ConfigurationResult, ServiceConfiguration};
use crate::modules::events::{
    CompletedEvent, DisabledEvent, EnabledEvent, EventDispatcher, EventHandler, FailedEvent,
    FailureKind, LoggingHandler, MetricsHandler, RequestEvent, ServiceEvent,
};
use crate::modules::metrics::MetricsCollector;

use endpoint::{HeaderSource, ServiceEndpoint};
use privacy::dnt_marker;
use transport::{Exchange, OutboundRequest, TransportFailure};

/// Outcome of one service call.
pub type ServiceResult = Result<ServiceResponse, ServiceError>;

/// Call failures. `Display` renders the message that is also error-logged.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{name} service disabled")]
    Disabled { name: String },
    #[error("{url}{} returned status {status}: {body}", dnt_marker(.do_not_track))]
    HttpStatus {
        url: String,
        do_not_track: bool,
        status: u16,
        body: String,
    },
    #[error("{url}{}: {}", dnt_marker(.do_not_track), describe_chain(.source))]
    Transport {
        url: String,
        do_not_track: bool,
        source: reqwest::Error,
    },
    #[error("{url}{} could not parse response: {body}", dnt_marker(.do_not_track))]
    Parse {
        url: String,
        do_not_track: bool,
        body: String,
    },
    #[error("invalid header '{0}'")]
    InvalidHeader(String),
}

impl ServiceError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ServiceError::Disabled { .. } => FailureKind::Disabled,
            ServiceError::HttpStatus { .. } => FailureKind::HttpStatus,
            ServiceError::Transport { .. } => FailureKind::Transport,
            ServiceError::Parse { .. } => FailureKind::Parse,
            ServiceError::InvalidHeader(_) => FailureKind::InvalidHeader,
        }
    }

    /// Remote status for [`ServiceError::HttpStatus`].
    pub fn status(&self) -> Option<u16> {
        match self {
            ServiceError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Underlying client error for [`ServiceError::Transport`], e.g. to check
    /// `is_connect()` or `is_timeout()`.
    pub fn transport_error(&self) -> Option<&reqwest::Error> {
        match self {
            ServiceError::Transport { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, ServiceError::Disabled { .. })
    }
}

/// Renders an error followed by its causes.
fn describe_chain(error: &reqwest::Error) -> String {
    let mut rendered = error.to_string();
    let mut cause = std::error::Error::source(error);
    while let Some(inner) = cause {
        rendered.push_str(": ");
        rendered.push_str(&inner.to_string());
        cause = inner.source();
    }
    rendered
}

/// Timing details of a successful call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseMetadata {
    /// Dispatch to completion, retries included.
    pub response_time: Duration,
    pub attempts: u32,
}

/// Parsed JSON body of a successful call.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceResponse {
    pub body: Value,
    /// Present when the service profile reports response times.
    pub metadata: Option<ResponseMetadata>,
}

impl ServiceResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.body)
    }

    pub fn into_body(self) -> Value {
        self.body
    }
}

enum Mode {
    Disabled,
    Enabled { client: reqwest::Client },
}

/// Request executor bound to one endpoint.
pub struct JsonService<E: ServiceEndpoint> {
    endpoint: E,
    mode: Mode,
    events: Arc<EventDispatcher>,
}

impl<E: ServiceEndpoint> JsonService<E> {
    /// Sets up a service with the default `log`-backed handler.
    pub fn setup(endpoint: E) -> ConfigurationResult<Self> {
        JsonServiceBuilder::new(endpoint).build()
    }

    pub fn builder(endpoint: E) -> JsonServiceBuilder<E> {
        JsonServiceBuilder::new(endpoint)
    }

    pub fn name(&self) -> &str {
        self.endpoint.configuration().name()
    }

    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self.mode, Mode::Enabled { .. })
    }

    /// Calls the service with a request context only; endpoint hooks receive
    /// `None` as the response context.
    pub async fn call(&self, request: &E::Request) -> ServiceResult {
        self.execute(request, None).await
    }

    pub async fn call_with_response(
        &self,
        request: &E::Request,
        response: &E::Response,
    ) -> ServiceResult {
        self.execute(request, Some(response)).await
    }

    async fn execute(&self, request: &E::Request, response: Option<&E::Response>) -> ServiceResult {
        let config = self.endpoint.configuration();
        let client = match &self.mode {
            Mode::Disabled => {
                return Err(ServiceError::Disabled {
                    name: config.name().to_string(),
                });
            }
            Mode::Enabled { client } => client,
        };

        let do_not_track = privacy::is_do_not_track(request);

        let mut headers = transport::convert_headers(&self.endpoint.headers(request, response))
            .map_err(|name| self.fail(ServiceError::InvalidHeader(name), 0, Duration::ZERO))?;
        if do_not_track {
            headers.insert(HeaderName::from_static("dnt"), HeaderValue::from_static("1"));
        }

        let url = self.endpoint.url(request);
        let parameters = self.endpoint.parameters(request, response);
        let logged_url = if do_not_track {
            config.url().to_string()
        } else {
            privacy::synthesize_url(&url, &parameters)
        };

        if config.profile().logs_requests() {
            self.events.dispatch(ServiceEvent::Request(RequestEvent {
                service: config.name().to_string(),
                url: logged_url.clone(),
                do_not_track,
                timestamp: chrono::Utc::now(),
            }));
        }

        let outbound = OutboundRequest {
            url: &url,
            headers,
            query: &parameters,
            timeout: config.timeout(),
            retries: config.retries(),
        };

        let started = Instant::now();
        let outcome = transport::send_with_retries(client, &outbound).await;
        let elapsed = started.elapsed();

        match outcome {
            Ok(exchange) => self.complete(exchange, logged_url, do_not_track, elapsed),
            Err(TransportFailure::Status {
                status,
                body,
                attempts,
            }) => Err(self.fail(
                ServiceError::HttpStatus {
                    url: logged_url,
                    do_not_track,
                    status: status.as_u16(),
                    body,
                },
                attempts,
                elapsed,
            )),
            Err(TransportFailure::Transport { error, attempts }) => {
                let source = if do_not_track { error.without_url() } else { error };
                Err(self.fail(
                    ServiceError::Transport {
                        url: logged_url,
                        do_not_track,
                        source,
                    },
                    attempts,
                    elapsed,
                ))
            }
        }
    }

    fn complete(
        &self,
        exchange: Exchange,
        logged_url: String,
        do_not_track: bool,
        elapsed: Duration,
    ) -> ServiceResult {
        let parsed = if exchange.is_json() {
            serde_json::from_str::<Value>(&exchange.body).ok()
        } else {
            None
        };

        let Some(body) = parsed else {
            return Err(self.fail(
                ServiceError::Parse {
                    url: logged_url,
                    do_not_track,
                    body: exchange.body,
                },
                exchange.attempts,
                elapsed,
            ));
        };

        let config = self.endpoint.configuration();
        self.events.dispatch(ServiceEvent::Completed(CompletedEvent {
            service: config.name().to_string(),
            status: exchange.status.as_u16(),
            attempts: exchange.attempts,
            latency: elapsed,
            timestamp: chrono::Utc::now(),
        }));

        let metadata = config
            .profile()
            .reports_response_time()
            .then_some(ResponseMetadata {
                response_time: elapsed,
                attempts: exchange.attempts,
            });

        Ok(ServiceResponse { body, metadata })
    }

    fn fail(&self, error: ServiceError, attempts: u32, latency: Duration) -> ServiceError {
        self.events.dispatch(ServiceEvent::Failed(FailedEvent {
            service: self.name().to_string(),
            kind: error.kind(),
            message: error.to_string(),
            attempts,
            latency,
            timestamp: chrono::Utc::now(),
        }));
        error
    }
}

/// Object-safe view of a service, for holding services with different
/// endpoints behind one type.
#[async_trait]
pub trait ServiceCall: Send + Sync {
    type Request: HeaderSource + Sync + ?Sized;
    type Response: Sync + ?Sized;

    fn name(&self) -> &str;

    async fn call(&self, request: &Self::Request) -> ServiceResult;

    async fn call_with_response(
        &self,
        request: &Self::Request,
        response: &Self::Response,
    ) -> ServiceResult;
}

#[async_trait]
impl<E: ServiceEndpoint> ServiceCall for JsonService<E> {
    type Request = E::Request;
    type Response = E::Response;

    fn name(&self) -> &str {
        self.endpoint.configuration().name()
    }

    async fn call(&self, request: &Self::Request) -> ServiceResult {
        self.execute(request, None).await
    }

    async fn call_with_response(
        &self,
        request: &Self::Request,
        response: &Self::Response,
    ) -> ServiceResult {
        self.execute(request, Some(response)).await
    }
}

/// Fluent builder for [`JsonService`].
pub struct JsonServiceBuilder<E: ServiceEndpoint> {
    endpoint: E,
    logging: bool,
    handlers: Vec<Arc<dyn EventHandler>>,
    metrics: Option<MetricsCollector>,
    user_agent: Option<String>,
    client: Option<reqwest::Client>,
}

impl<E: ServiceEndpoint> JsonServiceBuilder<E> {
    pub fn new(endpoint: E) -> Self {
        Self {
            endpoint,
            logging: true,
            handlers: Vec::new(),
            metrics: None,
            user_agent: None,
            client: None,
        }
    }

    /// Registers an extra event handler, scoped to this service.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Drops the default `log` handler.
    pub fn without_logging(mut self) -> Self {
        self.logging = false;
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Uses an existing client (and its pool) instead of building one.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn build(self) -> ConfigurationResult<JsonService<E>> {
        let mut events = EventDispatcher::new();
        if self.logging {
            events.register_handler(Arc::new(LoggingHandler));
        }
        if let Some(metrics) = self.metrics {
            events.register_handler(Arc::new(MetricsHandler::new(metrics)));
        }
        for handler in self.handlers {
            events.register_handler(handler);
        }

        let config = self.endpoint.configuration();
        let mode = if config.is_enabled() {
            let client = match self.client {
                Some(client) => client,
                None => build_client(config, self.user_agent.as_deref())?,
            };
            events.dispatch(ServiceEvent::Enabled(EnabledEvent {
                service: config.name().to_string(),
                base_url: config.url().to_string(),
                timestamp: chrono::Utc::now(),
            }));
            Mode::Enabled { client }
        } else {
            events.dispatch(ServiceEvent::Disabled(DisabledEvent {
                service: config.name().to_string(),
                timestamp: chrono::Utc::now(),
            }));
            Mode::Disabled
        };

        Ok(JsonService {
            endpoint: self.endpoint,
            mode,
            events: Arc::new(events),
        })
    }
}

fn build_client(
    config: &ServiceConfiguration,
    user_agent: Option<&str>,
) -> ConfigurationResult<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .connect_timeout(config.timeout());

    if let Some(agent) = user_agent {
        builder = builder.user_agent(agent);
    }

    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceSettings;
    use crate::service::endpoint::CallContext;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(log::Level, String)>>);

    impl EventHandler for Recorder {
        fn handle(&self, event: &ServiceEvent) {
            self.0.lock().unwrap().push((event.level(), event.message()));
        }
    }

    fn disabled_service(recorder: Arc<Recorder>) -> JsonService<ServiceConfiguration> {
        let config = ServiceConfiguration::new("foo", &ServiceSettings::new()).unwrap();
        JsonService::builder(config)
            .without_logging()
            .with_handler(recorder)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn disabled_service_rejects_every_call() {
        let recorder = Arc::new(Recorder::default());
        let service = disabled_service(recorder.clone());

        assert!(!service.is_enabled());
        assert_eq!(
            recorder.0.lock().unwrap().as_slice(),
            &[(log::Level::Warn, "foo service disabled".to_string())]
        );

        let request = CallContext::new().with_header("dnt", "1");
        let err = service.call(&request).await.unwrap_err();
        assert!(err.is_disabled());
        assert_eq!(err.to_string(), "foo service disabled");

        let err = service
            .call_with_response(&CallContext::new(), &CallContext::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "foo service disabled");
        assert_eq!(recorder.0.lock().unwrap().len(), 1, "calls are not logged");
    }

    #[tokio::test]
    async fn invalid_endpoint_header_is_reported_before_dispatch() {
        let config =
            ServiceConfiguration::new("foo", &ServiceSettings::new().with_url("http://127.0.0.1:9"))
                .unwrap();
        let endpoint = endpoint::DynamicEndpoint::builder(config)
            .headers(|_, _| [("bad header".to_string(), "x".to_string())].into())
            .build();
        let recorder = Arc::new(Recorder::default());
        let metrics = MetricsCollector::new();
        let service = JsonService::builder(endpoint)
            .without_logging()
            .with_handler(recorder.clone())
            .with_metrics(metrics.clone())
            .build()
            .unwrap();

        let err = service.call(&CallContext::new()).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidHeader(ref name) if name == "bad header"));
        assert_eq!(err.kind(), FailureKind::InvalidHeader);

        let errors: Vec<_> = recorder
            .0
            .lock()
            .unwrap()
            .iter()
            .filter(|(level, _)| *level == log::Level::Error)
            .map(|(_, message)| message.clone())
            .collect();
        assert_eq!(errors, vec!["invalid header 'bad header'".to_string()]);

        let snapshot = metrics.snapshot();
        let stats = snapshot.service("foo").unwrap();
        assert_eq!(stats.failures_by_kind[&FailureKind::InvalidHeader], 1);
        assert_eq!(stats.total_attempts, 0);
    }

    #[test]
    fn error_messages_carry_marker_only_for_do_not_track() {
        let tracked = ServiceError::HttpStatus {
            url: "http://localhost/some_endpoint?a=b".into(),
            do_not_track: false,
            status: 400,
            body: "a bad request was made".into(),
        };
        let untracked = ServiceError::Parse {
            url: "http://localhost/".into(),
            do_not_track: true,
            body: "not json".into(),
        };

        assert_eq!(
            tracked.to_string(),
            "http://localhost/some_endpoint?a=b returned status 400: a bad request was made"
        );
        assert_eq!(tracked.status(), Some(400));
        assert_eq!(
            untracked.to_string(),
            "http://localhost/ [do_not_track] could not parse response: not json"
        );
        assert!(untracked.transport_error().is_none());
    }

    #[test]
    fn response_body_deserializes() {
        let response = ServiceResponse {
            body: serde_json::json!([1, 2, 3]),
            metadata: None,
        };
        let values: Vec<u32> = response.json().unwrap();
        assert_eq!(values, vec![1, 2, 3]);
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn service_is_shareable_across_tasks() {
        assert_send_sync::<JsonService<ServiceConfiguration>>();
        assert_send_sync::<JsonService<endpoint::DynamicEndpoint>>();
    }
}
