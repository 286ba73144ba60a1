//! Access-log middleware.
//!
//! Every call produces one `info` line `[METHOD] URL (STATUS) ELAPSED ms`,
//! where STATUS is the status code and its reason (`200 OK`) or the literal
//! `408 timeout` when no response was received.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use tower::{Layer, Service, ServiceExt};
use tracing::{Instrument, Level, debug, info, span};

use crate::{Error, Method, Request, Response, Result};

/// Layer that adds the access log.
///
/// # Example
///
/// ```ignore
/// use courier::middleware::LoggingLayer;
/// use tower::ServiceBuilder;
///
/// let service = ServiceBuilder::new()
///     .layer(LoggingLayer::new())
///     .service(client);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingLayer {
    level: LogLevel,
}

/// Log level for the logging middleware.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogLevel {
    /// Also log the outgoing headers at debug level.
    Debug,
    /// Access line only.
    #[default]
    Info,
}

impl LoggingLayer {
    /// Create a new logging layer with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a logging layer that also logs request headers.
    #[must_use]
    pub fn debug() -> Self {
        Self {
            level: LogLevel::Debug,
        }
    }
}

impl<S> Layer<S> for LoggingLayer {
    type Service = Logging<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Logging {
            inner,
            level: self.level,
        }
    }
}

/// Service that logs one access line per call.
#[derive(Debug, Clone)]
pub struct Logging<S> {
    inner: S,
    level: LogLevel,
}

/// Render the access line of a call.
///
/// `response` is `None` when the call failed before a response arrived.
#[must_use]
pub fn access_line(method: Method, url: &str, response: Option<&Response>, elapsed_ms: u64) -> String {
    let status = response.map_or_else(|| "408 timeout".to_string(), Response::status_text);
    format!("[{method}] {url} ({status}) {elapsed_ms} ms")
}

impl<S> Service<Request> for Logging<S>
where
    S: Service<Request, Response = Response, Error = Error> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let method = request.method();
        let url = request.url().to_string();
        let level = self.level;

        let span = span!(Level::INFO, "http_request", %method, %url);

        let inner = self.inner.clone();
        Box::pin(
            async move {
                if matches!(level, LogLevel::Debug) {
                    let headers: Vec<(&str, &str)> = request
                        .headers()
                        .iter()
                        .map(|(name, value)| {
                            if name.eq_ignore_ascii_case("authorization") {
                                (name.as_str(), "<redacted>")
                            } else {
                                (name.as_str(), value.as_str())
                            }
                        })
                        .collect();
                    debug!(?headers, "sending request");
                }

                let start = Instant::now();
                let result = inner.oneshot(request).await;

                // Saturating conversion to u64 (truncates after ~584 million years)
                let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

                info!("{}", access_line(method, &url, result.as_ref().ok(), elapsed_ms));
                if let Err(err) = &result {
                    debug!(error = %err, "request failed without response");
                }

                result
            }
            .instrument(span),
        )
    }
}
