//! Tower middleware layers for the courier dispatcher.
//!
//! A [`Dispatcher`](crate::Dispatcher) sends its context-bound calls through
//! this stack, outermost first:
//!
//! - [`LoggingLayer`] - one access line per call, using `tracing`
//! - [`BearerAuthLayer`] - `Authorization: Bearer <token>` from the shared
//!   [`TokenStore`](crate::TokenStore), with refresh and a single retry on `401`
//!
//! Both layers work on any `Service<Request, Response = Response, Error = Error>`
//! and can be composed by hand around a [`HyperClient`](crate::HyperClient).
//!
//! # Example
//!
//! ```ignore
//! use courier::{HyperClient, TokenStore};
//! use courier::middleware::{BearerAuthLayer, LoggingLayer, ServiceBuilder};
//!
//! let service = ServiceBuilder::new()
//!     .layer(LoggingLayer::new())
//!     .layer(BearerAuthLayer::new(TokenStore::default()))
//!     .service(HyperClient::new());
//! ```

mod bearer_auth;
mod logging;

pub use bearer_auth::{BearerAuth, BearerAuthLayer};
pub use logging::{LogLevel, Logging, LoggingLayer, access_line};

// Re-export tower types for convenience
pub use tower::{Layer, ServiceBuilder};
