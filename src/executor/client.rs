use std::time::Instant;

use anyhow::{Context, Result};
use reqwest::{header::HeaderMap, Client};
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::models::{Envelope, ExecutorOptions, HttpRequest, TransportError};

/// Sends one request per call. Non-2xx statuses are ordinary envelopes; only
/// transport failures are errors. No retries.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: Client,
    options: ExecutorOptions,
}

impl HttpExecutor {
    pub fn new(mut options: ExecutorOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(options.timeout)
            .build()
            .context("building HTTP client")?;

        if let Some(base) = options.base_url.as_mut() {
            if !base.path().ends_with('/') {
                let path = format!("{}/", base.path());
                base.set_path(&path);
            }
        }

        Ok(Self { client, options })
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.options.base_url.as_ref()
    }

    /// Absolute URLs pass through; relative ones are appended to the base URL.
    pub fn resolve_url(&self, url: &str) -> Result<Url, TransportError> {
        match Url::parse(url) {
            Ok(absolute) => Ok(absolute),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = self.options.base_url.as_ref().ok_or_else(|| {
                    TransportError::InvalidUrl {
                        url: url.to_string(),
                        reason: "relative url requires a base url".to_string(),
                    }
                })?;
                base.join(url.trim_start_matches('/'))
                    .map_err(|err| TransportError::InvalidUrl {
                        url: url.to_string(),
                        reason: err.to_string(),
                    })
            }
            Err(err) => Err(TransportError::InvalidUrl {
                url: url.to_string(),
                reason: err.to_string(),
            }),
        }
    }

    pub async fn execute(&self, request: &HttpRequest) -> Result<Envelope, TransportError> {
        let url = self.resolve_url(&request.url)?;
        let mut request_builder = self.client.request(request.method.into(), url.clone());

        for (name, value) in &self.options.default_headers {
            let overridden = request
                .headers
                .iter()
                .any(|(own, _)| own.eq_ignore_ascii_case(name));
            if !overridden {
                request_builder = request_builder.header(name, value);
            }
        }
        for (name, value) in &request.headers {
            request_builder = request_builder.header(name, value);
        }
        if let Some(body) = &request.body {
            request_builder = request_builder.json(body);
        }

        debug!(method = %request.method, url = %url, "sending request");
        let start = Instant::now();
        let response = request_builder
            .send()
            .await
            .map_err(|err| self.transport_error(err, &url))?;

        let status = response.status();
        let headers = collect_headers(response.headers());
        let bytes = response
            .bytes()
            .await
            .map_err(|err| self.transport_error(err, &url))?;
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        debug!(
            status = status.as_u16(),
            bytes = bytes.len(),
            duration_ms,
            "received response"
        );

        Ok(Envelope::from_parts(
            status.as_u16(),
            status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            decode_body(&bytes),
            bytes.len(),
            duration_ms,
        ))
    }

    fn transport_error(&self, err: reqwest::Error, url: &Url) -> TransportError {
        let url = url.to_string();
        if err.is_timeout() {
            TransportError::Timeout {
                url,
                timeout_ms: self.options.timeout.as_millis() as u64,
            }
        } else if err.is_connect() {
            TransportError::Connect {
                url,
                reason: root_cause(&err),
            }
        } else {
            TransportError::Request {
                url,
                reason: root_cause(&err),
            }
        }
    }
}

fn root_cause(err: &(dyn std::error::Error + 'static)) -> String {
    let mut current = err;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string()
}

/// JSON when possible, text otherwise, hex for binary; empty bodies are `null`.
pub(crate) fn decode_body(bytes: &[u8]) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    if let Ok(value) = serde_json::from_slice(bytes) {
        return value;
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => Value::String(text.to_string()),
        Err(_) => Value::String(hex::encode(bytes)),
    }
}

fn collect_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or_default().to_string(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn executor(base: Option<&str>) -> HttpExecutor {
        HttpExecutor::new(ExecutorOptions {
            base_url: base.map(|b| Url::parse(b).unwrap()),
            ..ExecutorOptions::default()
        })
        .unwrap()
    }

    #[test]
    fn collect_headers_preserves_values() {
        let mut map = HeaderMap::new();
        map.insert("X-Test", "value".parse().unwrap());
        map.insert("content-type", "application/json".parse().unwrap());

        let headers = collect_headers(&map);
        assert!(headers
            .iter()
            .any(|(name, value)| name == "x-test" && value == "value"));
        assert!(headers
            .iter()
            .any(|(name, value)| name == "content-type" && value == "application/json"));
    }

    #[test]
    fn resolve_url_appends_relative_paths_to_base() {
        let exec = executor(Some("http://localhost:3000/api"));
        assert_eq!(
            exec.resolve_url("users/admin").unwrap().as_str(),
            "http://localhost:3000/api/users/admin"
        );
        assert_eq!(
            exec.resolve_url("/movies/search?title=Blue Moon").unwrap().as_str(),
            "http://localhost:3000/api/movies/search?title=Blue%20Moon"
        );
        assert_eq!(
            exec.resolve_url("https://other.test/x").unwrap().as_str(),
            "https://other.test/x"
        );
    }

    #[test]
    fn resolve_url_requires_base_for_relative_paths() {
        let err = executor(None).resolve_url("users").unwrap_err();
        assert!(matches!(err, TransportError::InvalidUrl { .. }));
    }

    #[test]
    fn decode_body_handles_each_shape() {
        assert_eq!(decode_body(b""), Value::Null);
        assert_eq!(decode_body(b" \n"), Value::Null);
        assert_eq!(decode_body(br#"{"ok":true}"#), json!({"ok": true}));
        assert_eq!(decode_body(b"Forbidden"), json!("Forbidden"));
        assert_eq!(decode_body(&[0, 159, 146, 150]), json!("009f9296"));
    }
}
