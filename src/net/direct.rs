//! In-process request strategy backed by a reqwest session

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;

use super::{baseline_headers, HttpClient, HttpResponse, RequestError, RequestSpec, USER_AGENT};

/// Direct session-based client.
pub struct DirectClient {
    client: reqwest::Client,
}

impl DirectClient {
    pub fn new() -> Result<Self, RequestError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }

    fn merged_headers(spec: &RequestSpec) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in baseline_headers() {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.insert(name, value);
            }
        }
        // Caller values win on conflict
        for (name, value) in &spec.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.insert(name, value);
            }
        }
        if !spec.cookie.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&spec.cookie) {
                headers.insert(reqwest::header::COOKIE, value);
            }
        }
        headers
    }
}

#[async_trait]
impl HttpClient for DirectClient {
    async fn request(&self, spec: RequestSpec) -> Result<HttpResponse, RequestError> {
        let method = Method::from_bytes(spec.method.as_bytes()).unwrap_or(Method::GET);
        let headers = Self::merged_headers(&spec);

        let mut builder = self.client.request(method, &spec.url).headers(headers);
        if let Some(body) = &spec.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.to_string(), v.to_string()))
            })
            .collect();
        let body = response.text().await?;

        Ok(HttpResponse {
            status,
            body,
            headers,
        })
    }
}
