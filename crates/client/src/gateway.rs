//! The single outbound HTTP channel.
//!
//! Every API call goes through [`Gateway::send`], which owns one response
//! interceptor chain. The chain always contains [`ErrorRouteInterceptor`]
//! (HTTP failure status → error page); the session store adds its token
//! refresh interceptor. For every call, all `on_success` hooks run on a 2xx
//! response and all `on_error` hooks run on a failure, in registration order,
//! before the caller sees the result.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::config::{ClientConfig, ErrorRoutes};
use crate::navigation::Navigator;

pub use reqwest::Method;

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the configured base address (e.g. `/auth/login`).
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Parsed JSON body; `Null` when empty, a JSON string when not JSON.
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// A top-level string field of the body.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.body.get(name).and_then(Value::as_str)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, GatewayError> {
        serde_json::from_value(self.body.clone()).map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GatewayError {
    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {status}")]
    Status { status: u16, body: Value },

    /// The response could not be inspected: its body was unreadable, or did
    /// not have the expected shape.
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl GatewayError {
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Wire-level request execution.
///
/// Returns a response for *every* HTTP status; only transport failures and
/// unreadable response bodies are errors at this layer.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, GatewayError>;
}

/// `reqwest`-backed transport with a fixed base address and timeout.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

fn transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Network(e.to_string())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, GatewayError> {
        let mut builder = self
            .client
            .request(request.method.clone(), self.url(&request.path))
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| GatewayError::Network(format!("invalid header name '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| GatewayError::Network(format!("invalid header value: {}", e)))?;
            builder = builder.header(name, value);
        }

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await.map_err(transport_error)?;
        let status = resp.status().as_u16();
        let text = resp.text().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout
            } else {
                GatewayError::Decode(format!("HTTP {} body could not be read: {}", status, e))
            }
        })?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        Ok(ApiResponse { status, body })
    }
}

/// Hook into every response passing through the gateway.
#[async_trait]
pub trait ResponseInterceptor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn on_success(&self, _response: &ApiResponse) {}

    async fn on_error(&self, _error: &GatewayError) {}
}

/// Routes 404/403/401 failures to their error pages.
///
/// Everything else is left to the caller untouched.
pub struct ErrorRouteInterceptor {
    navigator: Arc<dyn Navigator>,
    routes: ErrorRoutes,
}

impl ErrorRouteInterceptor {
    pub fn new(navigator: Arc<dyn Navigator>, routes: ErrorRoutes) -> Self {
        Self { navigator, routes }
    }
}

#[async_trait]
impl ResponseInterceptor for ErrorRouteInterceptor {
    fn name(&self) -> &'static str {
        "error-routes"
    }

    async fn on_error(&self, error: &GatewayError) {
        match error {
            GatewayError::Status { status, .. } => match self.routes.for_status(*status) {
                Some(route) => {
                    tracing::warn!(status, route, "request failed; routing to error page");
                    self.navigator.push(route);
                }
                None => tracing::debug!(status, "request failed; passed to caller"),
            },
            GatewayError::Decode(reason) => {
                tracing::warn!(%reason, "failed response could not be inspected");
            }
            GatewayError::Timeout | GatewayError::Network(_) => {
                tracing::debug!(error = %error, "transport failure; passed to caller");
            }
        }
    }
}

struct GatewayInner {
    transport: Arc<dyn Transport>,
    interceptors: RwLock<Vec<Arc<dyn ResponseInterceptor>>>,
}

/// Shared handle to the outbound channel; clones share the interceptor chain.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

impl Gateway {
    /// Gateway with the error-page interceptor installed.
    pub fn new(transport: Arc<dyn Transport>, navigator: Arc<dyn Navigator>, routes: ErrorRoutes) -> Self {
        let gateway = Self {
            inner: Arc::new(GatewayInner {
                transport,
                interceptors: RwLock::new(Vec::new()),
            }),
        };
        gateway.use_interceptor(Arc::new(ErrorRouteInterceptor::new(navigator, routes)));
        gateway
    }

    /// Gateway over `reqwest` using the configured base address and timeout.
    pub fn from_config(config: &ClientConfig, navigator: Arc<dyn Navigator>) -> Result<Self, GatewayError> {
        let transport = ReqwestTransport::new(config.api_url.clone(), config.request_timeout)?;
        Ok(Self::new(
            Arc::new(transport),
            navigator,
            config.error_routes.clone(),
        ))
    }

    /// Append an interceptor to the chain.
    pub fn use_interceptor(&self, interceptor: Arc<dyn ResponseInterceptor>) {
        tracing::debug!(interceptor = interceptor.name(), "response interceptor installed");
        self.inner
            .interceptors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(interceptor);
    }

    pub fn interceptor_names(&self) -> Vec<&'static str> {
        self.chain().iter().map(|i| i.name()).collect()
    }

    fn chain(&self) -> Vec<Arc<dyn ResponseInterceptor>> {
        self.inner
            .interceptors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Send `request` and run the interceptor chain on the outcome.
    ///
    /// Non-2xx responses become [`GatewayError::Status`].
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, GatewayError> {
        let result = match self.inner.transport.execute(&request).await {
            Ok(resp) if resp.is_success() => Ok(resp),
            Ok(resp) => Err(GatewayError::Status {
                status: resp.status,
                body: resp.body,
            }),
            Err(e) => Err(e),
        };

        tracing::debug!(
            method = %request.method,
            path = %request.path,
            ok = result.is_ok(),
            "gateway call finished"
        );

        let chain = self.chain();
        match &result {
            Ok(resp) => {
                for interceptor in &chain {
                    interceptor.on_success(resp).await;
                }
            }
            Err(error) => {
                for interceptor in &chain {
                    interceptor.on_error(error).await;
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn header_lookup_ignores_case() {
        let req = ApiRequest::get("/users").with_header("Authorization", "Bearer t");
        assert_eq!(req.header("authorization"), Some("Bearer t"));
        assert_eq!(req.header("cookie"), None);
    }

    #[test]
    fn joins_base_and_path_with_one_slash() {
        let t = ReqwestTransport::new("http://localhost:8080/", Duration::from_millis(1000)).unwrap();
        assert_eq!(t.url("/auth/login"), "http://localhost:8080/auth/login");
        assert_eq!(t.url("events"), "http://localhost:8080/events");
    }

    #[test]
    fn typed_body_decoding_reports_shape_errors() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Event {
            id: i64,
        }

        let ok = ApiResponse::new(200, json!({"id": 3}));
        assert_eq!(ok.json::<Event>().unwrap(), Event { id: 3 });

        let bad = ApiResponse::new(200, json!({"id": "three"}));
        assert!(matches!(bad.json::<Event>(), Err(GatewayError::Decode(_))));
    }

    #[test]
    fn only_status_failures_carry_a_status() {
        let err = GatewayError::Status {
            status: 404,
            body: Value::Null,
        };
        assert_eq!(err.status(), Some(404));
        assert_eq!(GatewayError::Timeout.status(), None);
    }
}
