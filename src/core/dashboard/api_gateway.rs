/*!
Thin JSON gateway to the OmniPing engine.

The gateway performs the HTTP verbs against the engine's resource paths,
normalizes failures into [`RequestError`] and reports every transport status
transition to an injected [`TransportObserver`]. It never touches indicator
state itself; the observer (the polling controller in practice) owns that.

## Indicator reporting

- `Err` before every attempt
- `On` when the engine answers 2xx
- `Bad` when the engine answers with any other status
- nothing further when no response arrives, leaving `Err` in place

## Dependencies

- `isahc`: HTTP client (behind the `http-gateway` feature)
- `serde_json`: request/response bodies
*/

use crate::core::dashboard::debug_logger::DebugLogger;
use crate::core::dashboard::types::{RequestError, ServerIndicator};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

#[cfg(feature = "http-gateway")]
use isahc::config::Configurable;
#[cfg(feature = "http-gateway")]
use isahc::{AsyncReadResponseExt, HttpClient, Request};

/// HTTP verbs the engine API understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVerb::Get => "GET",
            HttpVerb::Post => "POST",
            HttpVerb::Put => "PUT",
            HttpVerb::Delete => "DELETE",
        }
    }
}

/// Logical engine resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Status,
    Engine,
    Report,
    Config,
    SaveConfig,
}

/// Path segments under the base path for each logical resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointPaths {
    pub status: String,
    pub engine: String,
    pub report: String,
    pub config: String,
    pub save_config: String,
}

impl Default for EndpointPaths {
    fn default() -> Self {
        Self {
            status: "version".to_string(),
            engine: "engine".to_string(),
            report: "run".to_string(),
            config: "tests".to_string(),
            save_config: "setup".to_string(),
        }
    }
}

impl EndpointPaths {
    pub fn path(&self, endpoint: Endpoint) -> &str {
        match endpoint {
            Endpoint::Status => &self.status,
            Endpoint::Engine => &self.engine,
            Endpoint::Report => &self.report,
            Endpoint::Config => &self.config,
            Endpoint::SaveConfig => &self.save_config,
        }
    }
}

/// Raw transport response
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status_code: u16,
    /// Reason phrase for the status code, may be empty
    pub reason: String,
    pub body: Vec<u8>,
}

/// HTTP transport abstraction for dependency injection and testing
#[async_trait::async_trait]
pub trait ApiTransport: Send + Sync {
    /// Send one request; `Err` means no response was received
    async fn send(
        &self,
        verb: HttpVerb,
        url: String,
        body: Option<Vec<u8>>,
        timeout_ms: u32,
    ) -> Result<TransportResponse, String>;
}

/// Receives server reachability transitions from the gateway
pub trait TransportObserver: Send + Sync {
    fn transport_status(&self, indicator: ServerIndicator);
}

/// Production transport using isahc
#[cfg(feature = "http-gateway")]
pub struct IsahcTransport {
    client: HttpClient,
}

#[cfg(feature = "http-gateway")]
impl IsahcTransport {
    pub fn new() -> Result<Self, RequestError> {
        let client = HttpClient::new().map_err(|e| {
            RequestError::Transport(format!("Failed to create HTTP client: {}", e))
        })?;
        Ok(Self { client })
    }
}

#[cfg(feature = "http-gateway")]
#[async_trait::async_trait]
impl ApiTransport for IsahcTransport {
    async fn send(
        &self,
        verb: HttpVerb,
        url: String,
        body: Option<Vec<u8>>,
        timeout_ms: u32,
    ) -> Result<TransportResponse, String> {
        let mut builder = Request::builder()
            .method(verb.as_str())
            .uri(url.as_str())
            .timeout(std::time::Duration::from_millis(timeout_ms as u64))
            .header("Accept", "application/json");
        if body.is_some() {
            builder = builder.header("Content-type", "application/json");
        }

        let request = builder
            .body(body.unwrap_or_default())
            .map_err(|e| format!("Request creation failed: {}", e))?;

        let mut response = self
            .client
            .send_async(request)
            .await
            .map_err(|e| format!("Request failed: {}", e))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| format!("Failed to read response body: {}", e))?;

        Ok(TransportResponse {
            status_code: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            body,
        })
    }
}

/// JSON gateway over an [`ApiTransport`]
pub struct ApiGateway {
    transport: Box<dyn ApiTransport>,
    base_url: String,
    endpoints: EndpointPaths,
    timeout_ms: u32,
    observer: Option<Arc<dyn TransportObserver>>,
    logger: DebugLogger,
}

impl ApiGateway {
    /// Gateway over the production transport
    ///
    /// `base_url` is the server root plus the API base path, for example
    /// `http://localhost:8080/omniping`.
    #[cfg(feature = "http-gateway")]
    pub fn new(base_url: &str) -> Result<Self, RequestError> {
        Ok(Self::with_transport(base_url, Box::new(IsahcTransport::new()?)))
    }

    #[cfg(not(feature = "http-gateway"))]
    pub fn new(_base_url: &str) -> Result<Self, RequestError> {
        Err(RequestError::Transport(
            "built without the http-gateway feature".to_string(),
        ))
    }

    /// Gateway over a caller supplied transport (tests, other runtimes)
    pub fn with_transport(base_url: &str, transport: Box<dyn ApiTransport>) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            endpoints: EndpointPaths::default(),
            timeout_ms: 5000,
            observer: None,
            logger: DebugLogger::new(),
        }
    }

    pub fn with_endpoints(mut self, endpoints: EndpointPaths) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn TransportObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn set_observer(&mut self, observer: Arc<dyn TransportObserver>) {
        self.observer = Some(observer);
    }

    pub fn url_for(&self, endpoint: Endpoint) -> String {
        format!(
            "{}/{}",
            self.base_url,
            self.endpoints.path(endpoint).trim_start_matches('/')
        )
    }

    pub async fn get<T: DeserializeOwned>(&self, endpoint: Endpoint) -> Result<T, RequestError> {
        self.request(HttpVerb::Get, endpoint, None).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: Endpoint,
        data: &B,
    ) -> Result<T, RequestError> {
        self.request(HttpVerb::Post, endpoint, Some(Self::to_value(data)?))
            .await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: Endpoint,
        data: &B,
    ) -> Result<T, RequestError> {
        self.request(HttpVerb::Put, endpoint, Some(Self::to_value(data)?))
            .await
    }

    pub async fn delete<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: Endpoint,
        data: &B,
    ) -> Result<T, RequestError> {
        self.request(HttpVerb::Delete, endpoint, Some(Self::to_value(data)?))
            .await
    }

    /// Generic request: JSON body for every verb except GET
    pub async fn request<T: DeserializeOwned>(
        &self,
        verb: HttpVerb,
        endpoint: Endpoint,
        data: Option<Value>,
    ) -> Result<T, RequestError> {
        self.notify(ServerIndicator::Err);

        let url = self.url_for(endpoint);
        let body = match (verb, data) {
            (HttpVerb::Get, _) => None,
            (_, data) => Some(
                serde_json::to_vec(&data.unwrap_or(Value::Null)).map_err(|e| {
                    RequestError::Transport(format!("Payload serialization failed: {}", e))
                })?,
            ),
        };

        let correlation_id = format!("req_{}", uuid::Uuid::new_v4());
        self.logger
            .request_start(verb.as_str(), &url, correlation_id.clone());
        let started = Instant::now();

        let response = match self
            .transport
            .send(verb, url.clone(), body, self.timeout_ms)
            .await
        {
            Ok(response) => response,
            Err(err) => {
                self.logger.request_end(
                    verb.as_str(),
                    &url,
                    None,
                    started.elapsed().as_millis() as u64,
                    correlation_id,
                );
                self.logger.error("ApiGateway", "transport_error", &err);
                return Err(RequestError::Transport(err));
            }
        };

        self.logger.request_end(
            verb.as_str(),
            &url,
            Some(response.status_code),
            started.elapsed().as_millis() as u64,
            correlation_id,
        );

        if !(200..300).contains(&response.status_code) {
            self.notify(ServerIndicator::Bad);
            return Err(Self::server_error(&response));
        }

        self.notify(ServerIndicator::On);
        serde_json::from_slice(&response.body)
            .map_err(|e| RequestError::MalformedResponse(e.to_string()))
    }

    fn to_value<B: Serialize + ?Sized>(data: &B) -> Result<Value, RequestError> {
        serde_json::to_value(data)
            .map_err(|e| RequestError::Transport(format!("Payload serialization failed: {}", e)))
    }

    /// Prefer the engine's JSON `message`, fall back to the reason phrase
    fn server_error(response: &TransportResponse) -> RequestError {
        let message = serde_json::from_slice::<Value>(&response.body)
            .ok()
            .and_then(|body| {
                body.get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| response.reason.clone());

        RequestError::Server {
            status_code: response.status_code,
            message,
        }
    }

    fn notify(&self, indicator: ServerIndicator) {
        if let Some(observer) = &self.observer {
            observer.transport_status(indicator);
        }
    }
}
