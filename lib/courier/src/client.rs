//! HTTP client implementation using hyper-util.

use std::any::Any;
use std::collections::HashMap;
use std::error::Error as _;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, OnceLock};
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use serde::de::DeserializeOwned;
use tower::ServiceExt;
use tower::util::BoxCloneService;
use tower_service::Service;
use tracing::debug;

use crate::{Error, Request, RequestBuilder, Response, Result, config::ClientConfig, connector::https_connector};

// ============================================================================
// Type-Erased Service for Middleware Composition
// ============================================================================

/// Type-erased service for middleware composition.
///
/// This type allows storing and composing arbitrary Tower layers without
/// exposing complex generic types to users.
pub type BoxedService = BoxCloneService<Request, Response, Error>;

/// Future type for Tower Service implementation.
pub type ServiceFuture = Pin<Box<dyn Future<Output = Result<Response>> + Send + 'static>>;

/// Thread-safe wrapper for `BoxedService`.
///
/// `BoxCloneService` is `Send` but not `Sync`; the mutex only guards the
/// clone taken for each call, so callers never wait on each other's requests.
#[derive(Clone)]
pub(crate) struct SyncService {
    inner: Arc<Mutex<BoxedService>>,
}

impl SyncService {
    pub(crate) fn new(service: BoxedService) -> Self {
        Self {
            inner: Arc::new(Mutex::new(service)),
        }
    }

    pub(crate) fn call(&self, request: Request) -> ServiceFuture {
        // Lock, clone the service, and release the lock immediately
        let service = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();

        Box::pin(service.oneshot(request))
    }
}

// ============================================================================
// Public Client
// ============================================================================

/// HTTP client using hyper-util with connection pooling and TLS.
///
/// Every round trip is bounded by a deadline covering the response headers and
/// the full body: the request's own timeout when it has a non-zero one,
/// otherwise [`ClientConfig::timeout`].
///
/// # Example
///
/// ```ignore
/// use courier::{HyperClient, Method, RequestBuilder};
///
/// let client = HyperClient::new();
///
/// let mut builder = RequestBuilder::new();
/// builder
///     .set_base_url("https://jsonplaceholder.typicode.com/todos/1")
///     .set_method(Method::Get);
///
/// let response = client.send(&builder).await?;
/// println!("{}", response.text());
/// ```
#[derive(Clone)]
pub struct HyperClient {
    inner: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    config: ClientConfig,
}

impl std::fmt::Debug for HyperClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HyperClient {
    /// Create a new client with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    /// Create a new client with custom configuration.
    #[must_use]
    pub fn with_config(config: ClientConfig) -> Self {
        let connector = https_connector(&config);

        let inner = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_idle_per_host)
            .build(connector);

        Self { inner, config }
    }

    /// Get the client configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Perform one round trip and buffer the response, whatever its status.
    ///
    /// # Errors
    ///
    /// - `C:02` when the URL or a header cannot form a valid request; the
    ///   request is attached to the error.
    /// - `C:03` on connection, TLS or timeout failures.
    /// - `C:04` when the response body cannot be read.
    pub async fn execute(&self, request: Request) -> Result<Response> {
        let deadline = request
            .timeout()
            .filter(|timeout| !timeout.is_zero())
            .unwrap_or(self.config.timeout);
        let hyper_request = match Self::build_hyper_request(&request) {
            Ok(hyper_request) => hyper_request,
            Err(err) => return Err(err.with_request(request)),
        };

        let round_trip = async {
            let response = self
                .inner
                .request(hyper_request)
                .await
                .map_err(Self::map_hyper_error)?;

            let status = response.status().as_u16();
            let response_headers = Self::extract_headers(response.headers());

            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|e| Error::read_body(e.to_string()))?
                .to_bytes();

            Ok::<_, Error>(Response::new(status, response_headers, body))
        };

        tokio::time::timeout(deadline, round_trip)
            .await
            .map_err(|_| Error::timeout(deadline))?
    }

    /// Standalone send: resolve `builder` with its query and execute it.
    ///
    /// # Errors
    ///
    /// Same as [`HyperClient::execute`]. Any status is returned as a response.
    pub async fn send(&self, builder: &RequestBuilder) -> Result<Response> {
        self.execute(builder.build()).await
    }

    /// Standalone send followed by the response dispatch of [`courier_core::deliver`].
    ///
    /// # Errors
    ///
    /// Transport errors, a status >= 400, or a PDF body sent to a destination
    /// that is not binary.
    pub async fn send_into<T>(&self, builder: &RequestBuilder, destination: &mut T) -> Result<()>
    where
        T: DeserializeOwned + Any,
    {
        let response = self.send(builder).await?;
        courier_core::deliver(&response, destination)
    }

    /// Build a hyper request from a courier request.
    fn build_hyper_request(request: &Request) -> Result<http::Request<Full<Bytes>>> {
        let mut builder = http::Request::builder()
            .method(http::Method::from(request.method()))
            .uri(request.url());

        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let body = request.body().cloned().map_or_else(Full::default, Full::new);
        let hyper_request = builder
            .body(body)
            .map_err(|e| Error::invalid_request(e.to_string()))?;

        if hyper_request.uri().scheme().is_none() || hyper_request.uri().host().is_none() {
            return Err(Error::invalid_request(format!(
                "URL must be absolute: {:?}",
                request.url()
            )));
        }

        Ok(hyper_request)
    }

    /// Extract response headers as a `HashMap`.
    fn extract_headers(headers: &http::HeaderMap) -> HashMap<String, String> {
        headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.to_string(), v.to_string()))
            })
            .collect()
    }

    #[allow(clippy::needless_pass_by_value)]
    fn map_hyper_error(err: hyper_util::client::legacy::Error) -> Error {
        let mut msg = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            msg.push_str(": ");
            msg.push_str(&cause.to_string());
            source = cause.source();
        }
        debug!(error = %msg, connect = err.is_connect(), "transport failure");

        let lower = msg.to_ascii_lowercase();
        if lower.contains("ssl") || lower.contains("tls") || lower.contains("certificate") {
            return Error::tls(msg);
        }

        Error::connection(msg)
    }
}

impl Default for HyperClient {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tower Service Implementation
// ============================================================================

impl Service<Request> for HyperClient {
    type Response = Response;
    type Error = Error;
    type Future = ServiceFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let client = self.clone();
        Box::pin(async move { client.execute(request).await })
    }
}

/// Standalone send with a process-wide default client.
///
/// # Errors
///
/// Same as [`HyperClient::send`].
///
/// # Example
///
/// ```ignore
/// let mut builder = courier::RequestBuilder::new();
/// builder.set_base_url("https://example.com/health");
/// let response = courier::send(&builder).await?;
/// ```
pub async fn send(builder: &RequestBuilder) -> Result<Response> {
    static DEFAULT: OnceLock<HyperClient> = OnceLock::new();
    DEFAULT.get_or_init(HyperClient::new).send(builder).await
}
