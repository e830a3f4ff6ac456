//! Outbound HTTP request client
//!
//! Two interchangeable strategies behind one trait: an in-process reqwest
//! session with a browser-shaped baseline header set, and delegation to an
//! external helper binary that performs the request with a browser TLS
//! fingerprint (needed to get past the dashboard's bot-detection
//! checkpoint) and prints a JSON envelope to stdout.

mod direct;
mod helper;

pub use direct::DirectClient;
pub use helper::HelperClient;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single outbound request, serializable as the helper wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSpec {
    pub url: String,
    pub method: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub cookie: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl RequestSpec {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            headers: HashMap::new(),
            cookie: String::new(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "POST".to_string(),
            headers: HashMap::new(),
            cookie: String::new(),
            body: Some(body.into()),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = cookie.into();
        self
    }
}

/// Response envelope shared by both client strategies.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl HttpResponse {
    /// Parse the body as JSON.
    pub fn json(&self) -> Result<serde_json::Value, RequestError> {
        serde_json::from_str(&self.body)
            .map_err(|e| RequestError::BadBody(format!("invalid JSON body: {e}")))
    }
}

/// Errors from either client strategy.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("failed to spawn helper: {0}")]
    HelperSpawn(#[from] std::io::Error),

    #[error("helper exited with {code:?}: {stderr}")]
    HelperFailed { code: Option<i32>, stderr: String },

    #[error("helper printed malformed envelope: {0}")]
    HelperEnvelope(String),

    #[error("{0}")]
    BadBody(String),
}

/// Issues outbound HTTP requests without ever blocking the caller's
/// scheduling thread; callers suspend only at the await point.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn request(&self, spec: RequestSpec) -> Result<HttpResponse, RequestError>;
}

/// Baseline headers sent with every dashboard request. Caller-supplied
/// headers win on conflict.
pub(crate) fn baseline_headers() -> Vec<(&'static str, &'static str)> {
    vec![
        ("accept", "*/*"),
        ("accept-language", "en-US,en;q=0.9"),
        ("dnt", "1"),
        ("priority", "u=1, i"),
        ("referer", "https://www.cursor.com/settings"),
        (
            "sec-ch-ua",
            "\"Google Chrome\";v=\"131\", \"Chromium\";v=\"131\", \"Not_A Brand\";v=\"24\"",
        ),
        ("sec-ch-ua-mobile", "?0"),
        ("sec-ch-ua-platform", "\"Linux\""),
        ("sec-fetch-dest", "empty"),
        ("sec-fetch-mode", "cors"),
        ("sec-fetch-site", "same-origin"),
    ]
}

pub(crate) const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/133.0.0.0 Safari/537.36";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_spec_serializes_for_helper() {
        let spec = RequestSpec::get("https://www.cursor.com/api/usage?user=u1")
            .with_cookie("session=abc")
            .with_header("content-type", "application/json");
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["url"], "https://www.cursor.com/api/usage?user=u1");
        assert_eq!(json["method"], "GET");
        assert_eq!(json["cookie"], "session=abc");
        assert_eq!(json["headers"]["content-type"], "application/json");
        // Absent body must be omitted, not null
        assert!(json.get("body").is_none());
    }

    #[test]
    fn test_post_spec_carries_body() {
        let spec = RequestSpec::post("https://cursor.com/api/dashboard/teams", "{}");
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["method"], "POST");
        assert_eq!(json["body"], "{}");
    }

    #[test]
    fn test_response_json_parses_body() {
        let resp = HttpResponse {
            status: 200,
            body: r#"{"ok":true}"#.to_string(),
            headers: HashMap::new(),
        };
        assert_eq!(resp.json().unwrap()["ok"], true);

        let bad = HttpResponse {
            status: 200,
            body: "<html>checkpoint</html>".to_string(),
            headers: HashMap::new(),
        };
        assert!(matches!(bad.json(), Err(RequestError::BadBody(_))));
    }
}
