//! Reqwest-backed GET transport with transparent retries.
//!
//! Each attempt gets the full per-attempt timeout. Only the last attempt's
//! outcome is reported; callers never observe intermediate failures.

use std::collections::HashMap;
use std::time::Duration;

use http::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use reqwest::Client;

/// Statuses worth another attempt; anything else non-2xx fails immediately.
const RETRYABLE_STATUSES: [u16; 10] = [408, 413, 429, 500, 502, 503, 504, 521, 522, 524];

const JSON_MIME: &str = "application/json";

/// Fully assembled outbound call.
pub(crate) struct OutboundRequest<'a> {
    pub url: &'a str,
    pub headers: HeaderMap,
    pub query: &'a [(String, String)],
    pub timeout: Duration,
    pub retries: u32,
}

/// Successful (2xx) exchange.
#[derive(Debug)]
pub(crate) struct Exchange {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: String,
    pub attempts: u32,
}

impl Exchange {
    /// Compares the media type only; parameters such as `charset` are ignored.
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .and_then(|value| value.split(';').next())
            .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(JSON_MIME))
    }
}

#[derive(Debug)]
pub(crate) enum TransportFailure {
    Status {
        status: StatusCode,
        body: String,
        attempts: u32,
    },
    Transport {
        error: reqwest::Error,
        attempts: u32,
    },
}

pub(crate) async fn send_with_retries(
    client: &Client,
    request: &OutboundRequest<'_>,
) -> Result<Exchange, TransportFailure> {
    let mut headers = request.headers.clone();
    headers.insert(ACCEPT, HeaderValue::from_static(JSON_MIME));

    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let can_retry = attempt <= request.retries;

        let response = match client
            .get(request.url)
            .headers(headers.clone())
            .query(request.query)
            .timeout(request.timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(error) if can_retry && is_retryable_error(&error) => continue,
            Err(error) => {
                return Err(TransportFailure::Transport {
                    error,
                    attempts: attempt,
                });
            }
        };

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let body = match response.text().await {
            Ok(body) => body,
            Err(error) if can_retry && is_retryable_error(&error) => continue,
            Err(error) => {
                return Err(TransportFailure::Transport {
                    error,
                    attempts: attempt,
                });
            }
        };

        if status.is_success() {
            return Ok(Exchange {
                status,
                content_type,
                body,
                attempts: attempt,
            });
        }

        if can_retry && is_retryable_status(status) {
            continue;
        }

        return Err(TransportFailure::Status {
            status,
            body,
            attempts: attempt,
        });
    }
}

/// Converts endpoint-supplied headers; returns the offending name on failure.
pub(crate) fn convert_headers(headers: &HashMap<String, String>) -> Result<HeaderMap, String> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| name.clone())?;
        let header_value = HeaderValue::from_str(value).map_err(|_| name.clone())?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

fn is_retryable_status(status: StatusCode) -> bool {
    RETRYABLE_STATUSES.contains(&status.as_u16())
}

fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout() || error.is_request()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange(content_type: Option<&str>) -> Exchange {
        Exchange {
            status: StatusCode::OK,
            content_type: content_type.map(str::to_string),
            body: String::new(),
            attempts: 1,
        }
    }

    #[test]
    fn json_detection_ignores_parameters_and_case() {
        assert!(exchange(Some("application/json")).is_json());
        assert!(exchange(Some("application/json; charset=utf-8")).is_json());
        assert!(exchange(Some("Application/JSON")).is_json());
        assert!(!exchange(Some("text/plain")).is_json());
        assert!(!exchange(Some("application/jsonp")).is_json());
        assert!(!exchange(None).is_json());
    }

    #[test]
    fn only_transient_statuses_are_retried() {
        assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::from_u16(524).unwrap()));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
    }

    #[test]
    fn header_conversion_reports_bad_names() {
        let good = HashMap::from([("header1".to_string(), "header1 value".to_string())]);
        let converted = convert_headers(&good).unwrap();
        assert_eq!(converted["header1"], "header1 value");

        let bad = HashMap::from([("bad header".to_string(), "v".to_string())]);
        assert_eq!(convert_headers(&bad).unwrap_err(), "bad header");
    }
}
