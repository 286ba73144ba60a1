//! Bearer token authentication middleware.
//!
//! Reads the current access token from a [`TokenStore`] and sets
//! `Authorization: Bearer <token>` on each request, replacing any
//! authorization header already present. Nothing is added while the token is
//! empty.
//!
//! When a request that carried a token comes back `401`, the store is asked
//! to refresh and the request is sent once more with the new token. If the
//! refresh fails or yields the same token, the original `401` is returned.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tower::{Layer, Service, ServiceExt};
use tracing::{debug, warn};

use crate::{Error, Request, Response, Result, TokenStore};

/// Layer that adds bearer token authentication to requests.
///
/// # Example
///
/// ```ignore
/// use courier::{TokenStore, middleware::BearerAuthLayer};
/// use tower::ServiceBuilder;
///
/// let service = ServiceBuilder::new()
///     .layer(BearerAuthLayer::new(TokenStore::default()))
///     .service(client);
/// ```
#[derive(Debug, Clone)]
pub struct BearerAuthLayer {
    tokens: TokenStore,
}

impl BearerAuthLayer {
    /// Create a new bearer auth layer reading tokens from `tokens`.
    #[must_use]
    pub fn new(tokens: TokenStore) -> Self {
        Self { tokens }
    }
}

impl<S> Layer<S> for BearerAuthLayer {
    type Service = BearerAuth<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BearerAuth {
            inner,
            tokens: self.tokens.clone(),
        }
    }
}

/// Service that adds bearer token authentication to requests.
#[derive(Debug, Clone)]
pub struct BearerAuth<S> {
    inner: S,
    tokens: TokenStore,
}

fn authorize(request: &mut Request, token: &str) {
    request.replace_header("Authorization", format!("Bearer {token}"));
}

impl<S> Service<Request> for BearerAuth<S>
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

    fn call(&mut self, mut request: Request) -> Self::Future {
        let inner = self.inner.clone();
        let tokens = self.tokens.clone();

        Box::pin(async move {
            let (token, generation) = tokens.snapshot().await;
            if token.is_empty() {
                return inner.oneshot(request).await;
            }

            authorize(&mut request, &token);
            let retry = request.clone();
            let response = inner.clone().oneshot(request).await?;
            if response.status() != 401 {
                return Ok(response);
            }

            let fresh = match tokens.refresh(generation).await {
                Ok(fresh) => fresh,
                Err(err) => {
                    warn!(error = %err, "token refresh failed");
                    return Ok(response);
                }
            };
            if fresh.is_empty() || fresh == token {
                debug!("no new access token, keeping the 401 response");
                return Ok(response);
            }

            let mut retry = retry;
            authorize(&mut retry, &fresh);
            debug!("retrying with the refreshed access token");
            inner.oneshot(retry).await
        })
    }
}
