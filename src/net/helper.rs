//! Delegated request strategy via an external helper process
//!
//! Wire contract: the full request description is passed as a single JSON
//! argument; the helper prints `{status, body, headers}` JSON on stdout
//! and diagnostics on stderr. Exit code 0 with well-formed stdout is the
//! only success shape. Stderr chatter alone is never a failure.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use super::{baseline_headers, HttpClient, HttpResponse, RequestError, RequestSpec};

/// Client that shells out to a browser-impersonating helper binary.
pub struct HelperClient {
    helper_path: PathBuf,
}

/// Raw envelope as printed by the helper. Header values may arrive either
/// as plain strings or as string arrays (Go's `http.Header` shape).
#[derive(Debug, Deserialize)]
struct HelperEnvelope {
    status: u16,
    body: String,
    #[serde(default)]
    headers: serde_json::Value,
}

impl HelperClient {
    pub fn new(helper_path: impl Into<PathBuf>) -> Self {
        Self {
            helper_path: helper_path.into(),
        }
    }

    fn normalize_headers(raw: &serde_json::Value) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        if let Some(map) = raw.as_object() {
            for (name, value) in map {
                let flattened = match value {
                    serde_json::Value::String(s) => Some(s.clone()),
                    serde_json::Value::Array(values) => values
                        .first()
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string()),
                    _ => None,
                };
                if let Some(flattened) = flattened {
                    headers.insert(name.clone(), flattened);
                }
            }
        }
        headers
    }
}

#[async_trait]
impl HttpClient for HelperClient {
    async fn request(&self, spec: RequestSpec) -> Result<HttpResponse, RequestError> {
        let mut spec = spec;
        // The helper applies its own browser defaults; ours still travel so
        // both strategies present the same request shape.
        for (name, value) in baseline_headers() {
            spec.headers
                .entry(name.to_string())
                .or_insert_with(|| value.to_string());
        }

        let payload = serde_json::to_string(&spec)
            .map_err(|e| RequestError::HelperEnvelope(e.to_string()))?;

        tracing::debug!(url = %spec.url, helper = %self.helper_path.display(), "delegating request to helper");

        let output = Command::new(&self.helper_path)
            .arg(&payload)
            .output()
            .await?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            tracing::debug!(target: "cursorbar::helper", "{}", stderr.trim());
        }

        if !output.status.success() {
            return Err(RequestError::HelperFailed {
                code: output.status.code(),
                stderr: stderr.trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let envelope: HelperEnvelope = serde_json::from_str(stdout.trim())
            .map_err(|e| RequestError::HelperEnvelope(format!("{e}: {}", stdout.trim())))?;

        Ok(HttpResponse {
            status: envelope.status,
            body: envelope.body,
            headers: Self::normalize_headers(&envelope.headers),
        })
    }
}
