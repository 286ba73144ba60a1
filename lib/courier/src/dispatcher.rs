//! Context-bound dispatcher.
//!
//! A [`Dispatcher`] is configured once with a base URL, default headers and a
//! timeout, then issues calls relative to that base through a tower stack that
//! logs every call and attaches the bearer token of its [`TokenStore`].
//!
//! # Example
//!
//! ```ignore
//! use std::collections::HashMap;
//! use courier::Dispatcher;
//!
//! #[derive(Debug, Default, serde::Deserialize)]
//! struct Todo {
//!     id: u64,
//!     title: String,
//! }
//!
//! let dispatcher = Dispatcher::new("https://jsonplaceholder.typicode.com", HashMap::new(), 10);
//! dispatcher.set_access_token("token").await;
//!
//! let mut todo = Todo::default();
//! dispatcher.get("/todos/1", &mut todo).await?;
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tower::ServiceBuilder;
use tower::util::BoxCloneService;
use tower_service::Service;
use tracing::debug;

use crate::client::SyncService;
use crate::middleware::{BearerAuthLayer, LoggingLayer};
use crate::{
    DispatcherConfig, Error, HyperClient, Method, Request, RequestBuilder, Response, Result,
    TokenRefresher, TokenStore,
};

/// Issues HTTP calls relative to a configured base URL.
///
/// Cheap to clone; clones share the request template, the tokens and the
/// connection pool.
#[derive(Clone)]
pub struct Dispatcher {
    config: Arc<DispatcherConfig>,
    template: Arc<Mutex<RequestBuilder>>,
    tokens: TokenStore,
    stack: SyncService,
    transport: SyncService,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Create a dispatcher for `base_url` with default `headers` and a
    /// per-call timeout in seconds.
    ///
    /// A timeout of `0` falls back to the transport timeout of
    /// [`ClientConfig::default`](crate::ClientConfig::default).
    #[must_use]
    pub fn new(base_url: impl Into<String>, headers: HashMap<String, String>, timeout_secs: u64) -> Self {
        Self::with_config(
            DispatcherConfig::builder(base_url)
                .headers(headers)
                .timeout(Duration::from_secs(timeout_secs))
                .build(),
        )
    }

    /// Create a dispatcher over a [`HyperClient`] built from `config.client`.
    #[must_use]
    pub fn with_config(config: DispatcherConfig) -> Self {
        let client = HyperClient::with_config(config.client.clone());
        Self::with_transport(config, client)
    }

    /// Create a dispatcher over any transport service.
    ///
    /// Timeouts are enforced by the transport, so a custom transport is
    /// expected to honor [`Request::timeout`].
    #[must_use]
    pub fn with_transport<S>(config: DispatcherConfig, transport: S) -> Self
    where
        S: Service<Request, Response = Response, Error = Error> + Clone + Send + 'static,
        S::Future: Send + 'static,
    {
        let tokens = TokenStore::default();
        let stack = ServiceBuilder::new()
            .layer(LoggingLayer::new())
            .layer(BearerAuthLayer::new(tokens.clone()))
            .service(transport.clone());

        let mut template = RequestBuilder::new();
        template.set_base_url(config.base_url.clone());

        Self {
            config: Arc::new(config),
            template: Arc::new(Mutex::new(template)),
            tokens,
            stack: SyncService::new(BoxCloneService::new(stack)),
            transport: SyncService::new(BoxCloneService::new(transport)),
        }
    }

    /// Configuration of this dispatcher.
    #[must_use]
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Shared token storage.
    #[must_use]
    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Snapshot of the shared request template.
    ///
    /// The template starts with the base URL only; the configured headers are
    /// applied on top of it at each call.
    #[must_use]
    pub fn request(&self) -> RequestBuilder {
        self.template
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Modify the shared request template, e.g. to add query parameters sent
    /// with every later call.
    pub fn update_request(&self, update: impl FnOnce(&mut RequestBuilder)) {
        let mut template = self.template.lock().unwrap_or_else(PoisonError::into_inner);
        update(&mut template);
    }

    /// Replace the access token.
    pub async fn set_access_token(&self, token: impl Into<String>) {
        self.tokens.set_access_token(token).await;
    }

    /// Replace the refresh token.
    pub async fn set_refresh_token(&self, token: impl Into<String>) {
        self.tokens.set_refresh_token(token).await;
    }

    /// Replace both tokens.
    pub async fn set_auth(&self, access_token: impl Into<String>, refresh_token: impl Into<String>) {
        self.tokens.set_auth(access_token, refresh_token).await;
    }

    /// Current access token, empty when unauthenticated.
    pub async fn access_token(&self) -> String {
        self.tokens.access_token().await
    }

    /// Install the refresher used when a call is answered `401`.
    pub async fn set_refresher(&self, refresher: impl TokenRefresher + 'static) {
        self.tokens.set_refresher(refresher).await;
    }

    /// Refresh the access token now and return it.
    ///
    /// Without a refresher the current token is returned unchanged.
    ///
    /// # Errors
    ///
    /// Propagates the refresher's error.
    pub async fn revalidate_token(&self) -> Result<String> {
        let (_, generation) = self.tokens.snapshot().await;
        self.tokens.refresh(generation).await
    }

    /// Call `path` with `method` and dispatch the response into `destination`.
    ///
    /// The URL is `base_url + path + sep + query`, where `sep` is `&` when the
    /// base URL holds a `?` and `?` otherwise. The payload, when present, is
    /// sent as JSON. The shared template is only read: neither the method nor
    /// the payload is written back to it.
    ///
    /// # Errors
    ///
    /// - `C:01` when the payload cannot be serialized; nothing is sent.
    /// - `C:02`, `C:03` or `C:04` from the transport.
    /// - A [`Status`](crate::ErrorKind::Status) error for a status >= 400,
    ///   after the body was decoded into `destination` when possible.
    /// - A [`Destination`](crate::ErrorKind::Destination) error when a PDF
    ///   body meets a destination that is neither `Vec<u8>` nor `Bytes`.
    pub async fn make_request<P, T>(
        &self,
        method: Method,
        path: &str,
        payload: Option<&P>,
        destination: &mut T,
    ) -> Result<()>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned + Any,
    {
        let mut builder = self.request();
        builder.set_method(method);
        if let Some(payload) = payload {
            builder.set_body(courier_core::to_json(payload)?);
        }

        let mut request = builder.resolve(path);
        for (key, value) in &self.config.headers {
            request.replace_header(key, value.clone());
        }
        request.set_timeout(Some(builder.timeout().unwrap_or(self.config.timeout)));
        debug!(%method, url = request.url(), "dispatching");

        let response = self.stack.call(request).await?;
        courier_core::deliver(&response, destination)
    }

    /// `GET path`.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::make_request`].
    pub async fn get<T: DeserializeOwned + Any>(&self, path: &str, destination: &mut T) -> Result<()> {
        self.make_request(Method::Get, path, None::<&()>, destination).await
    }

    /// `POST path` with a JSON payload.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::make_request`].
    pub async fn post<P, T>(&self, path: &str, payload: &P, destination: &mut T) -> Result<()>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned + Any,
    {
        self.make_request(Method::Post, path, Some(payload), destination).await
    }

    /// `PUT path` with a JSON payload.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::make_request`].
    pub async fn put<P, T>(&self, path: &str, payload: &P, destination: &mut T) -> Result<()>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned + Any,
    {
        self.make_request(Method::Put, path, Some(payload), destination).await
    }

    /// `DELETE path`.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::make_request`].
    pub async fn delete<T: DeserializeOwned + Any>(&self, path: &str, destination: &mut T) -> Result<()> {
        self.make_request(Method::Delete, path, None::<&()>, destination).await
    }

    /// `PATCH path` with a JSON payload.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::make_request`].
    pub async fn patch<P, T>(&self, path: &str, payload: &P, destination: &mut T) -> Result<()>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned + Any,
    {
        self.make_request(Method::Patch, path, Some(payload), destination).await
    }

    /// Standalone send of `builder` on this dispatcher's transport.
    ///
    /// Neither the base URL, the configured headers, the bearer token nor the
    /// access log apply. Any status is returned as a response.
    ///
    /// # Errors
    ///
    /// Transport errors only.
    pub async fn send(&self, builder: &RequestBuilder) -> Result<Response> {
        self.transport.call(builder.build()).await
    }

    /// Standalone send followed by the same response dispatch as
    /// [`Dispatcher::make_request`].
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
}
