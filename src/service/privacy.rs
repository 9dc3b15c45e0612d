//! Do-not-track detection and log-safe URL rendering.

use url::form_urlencoded;

use super::endpoint::HeaderSource;

/// Header keys that signal do-not-track. Presence is enough; the value is
/// never inspected.
pub const DO_NOT_TRACK_HEADERS: [&str; 3] = ["DNT", "dnt", "do_not_track"];

pub fn is_do_not_track<S: HeaderSource + ?Sized>(headers: &S) -> bool {
    DO_NOT_TRACK_HEADERS
        .iter()
        .any(|name| headers.has_header(name))
}

/// Renders the URL as it would be requested, for logging only. The transport
/// builds its own query string.
pub fn synthesize_url(url: &str, parameters: &[(String, String)]) -> String {
    if parameters.is_empty() {
        return url.to_string();
    }

    let query = parameters
        .iter()
        .map(|(key, value)| format!("{}={}", encode_component(key), encode_component(value)))
        .collect::<Vec<_>>()
        .join("&");

    format!("{url}?{query}")
}

/// Suffix appended to the logged URL of do-not-track calls.
pub(crate) fn dnt_marker(do_not_track: &bool) -> &'static str {
    if *do_not_track { " [do_not_track]" } else { "" }
}

// form encoding writes spaces as '+' and escapes literal '+', so every '+'
// left in the output stands for a space.
fn encode_component(raw: &str) -> String {
    form_urlencoded::byte_serialize(raw.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::endpoint::CallContext;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn detects_each_signal_header() {
        for name in DO_NOT_TRACK_HEADERS {
            let context = CallContext::new().with_header(name, "0");
            assert!(is_do_not_track(&context), "{name} should signal do-not-track");
        }
    }

    #[test]
    fn other_casings_do_not_signal() {
        let context = CallContext::new()
            .with_header("Dnt", "1")
            .with_header("DO_NOT_TRACK", "1");
        assert!(!is_do_not_track(&context));
        assert!(!is_do_not_track(&CallContext::new()));
    }

    #[test]
    fn url_without_parameters_has_no_query() {
        assert_eq!(
            synthesize_url("http://localhost:1234/some_endpoint", &[]),
            "http://localhost:1234/some_endpoint"
        );
    }

    #[test]
    fn parameters_are_percent_encoded_in_order() {
        let url = synthesize_url(
            "http://localhost:1234/some_endpoint",
            &pairs(&[("param1", "param1 value"), ("param2", "param2 value")]),
        );
        assert_eq!(
            url,
            "http://localhost:1234/some_endpoint?param1=param1%20value&param2=param2%20value"
        );
    }

    #[test]
    fn reserved_characters_do_not_split_pairs() {
        let url = synthesize_url("http://h/", &pairs(&[("text", "a&b=c+d"), ("naïve key", "x")]));
        assert_eq!(url, "http://h/?text=a%26b%3Dc%2Bd&na%C3%AFve%20key=x");
    }

    #[test]
    fn marker_only_for_do_not_track() {
        assert_eq!(dnt_marker(&true), " [do_not_track]");
        assert_eq!(dnt_marker(&false), "");
    }
}
