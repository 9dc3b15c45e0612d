#![allow(dead_code)]

use std::net::TcpListener;
use std::sync::{Arc, Mutex};

use http_json_service::{
    CallContext, DynamicEndpoint, EventHandler, JsonService, ServiceConfiguration, ServiceEvent,
    ServiceSettings,
};
use log::Level;

/// Captures every event as the `(level, message)` pair the log handler emits.
#[derive(Default)]
pub struct Recorder(Mutex<Vec<(Level, String)>>);

impl Recorder {
    pub fn messages(&self, level: Level) -> Vec<String> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|(lvl, _)| *lvl == level)
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn has(&self, level: Level, message: &str) -> bool {
        self.messages(level).iter().any(|logged| logged == message)
    }

    pub fn has_errors(&self) -> bool {
        !self.messages(Level::Error).is_empty()
    }
}

impl EventHandler for Recorder {
    fn handle(&self, event: &ServiceEvent) {
        self.0.lock().unwrap().push((event.level(), event.message()));
    }
}

pub fn config(url: &str) -> ServiceConfiguration {
    ServiceConfiguration::new("foo", &ServiceSettings::new().with_url(url)).unwrap()
}

pub fn recorded(endpoint: DynamicEndpoint) -> (JsonService<DynamicEndpoint>, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let service = JsonService::builder(endpoint)
        .with_handler(recorder.clone())
        .build()
        .unwrap();
    (service, recorder)
}

/// Address that refuses connections.
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

pub fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

pub fn merged_params(req: &CallContext, res: Option<&CallContext>) -> Vec<(String, String)> {
    let mut merged = req.params.clone();
    if let Some(res) = res {
        merged.extend(res.params.iter().cloned());
    }
    merged
}

pub fn dnt_request() -> CallContext {
    CallContext::new().with_header("dnt", "1")
}

pub fn req_res_contexts() -> (CallContext, CallContext) {
    (
        CallContext::new().with_param("req_param", "req_param value"),
        CallContext::new().with_param("res_param", "res_param value"),
    )
}
