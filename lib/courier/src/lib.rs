//! Fluent HTTP request building and dispatching for Rust.
//!
//! Two ways to send requests:
//!
//! - **Standalone**: configure a [`RequestBuilder`] and hand it to
//!   [`send`], [`HyperClient::send`] or [`Dispatcher::send`]; the raw
//!   [`Response`] comes back whatever its status.
//! - **Context-bound**: a [`Dispatcher`] holds a base URL, default headers, a
//!   timeout and bearer tokens, and decodes responses into caller-supplied
//!   destinations with [`Dispatcher::make_request`] and its `get`/`post`/
//!   `put`/`delete`/`patch` shortcuts.
//!
//! # Example
//!
//! ```ignore
//! use std::collections::HashMap;
//! use courier::prelude::*;
//!
//! #[derive(Debug, Default, Deserialize)]
//! struct Todo {
//!     id: u64,
//!     title: String,
//! }
//!
//! let dispatcher = Dispatcher::new("https://jsonplaceholder.typicode.com", HashMap::new(), 10);
//!
//! let mut todo = Todo::default();
//! dispatcher.get("/todos/1", &mut todo).await?;
//!
//! let mut builder = RequestBuilder::new();
//! builder
//!     .set_base_url("https://jsonplaceholder.typicode.com/todos")
//!     .set_query([("userId", "1")]);
//! let response = courier::send(&builder).await?;
//! ```

mod auth;
mod client;
mod config;
mod connector;
mod dispatcher;
pub mod middleware;
pub mod prelude;

// Re-export client types
pub use auth::{AuthContext, RefreshFuture, TokenPair, TokenRefresher, TokenStore};
pub use client::{BoxedService, HyperClient, ServiceFuture, send};
pub use config::{ClientConfig, ClientConfigBuilder, DispatcherConfig, DispatcherConfigBuilder};
pub use dispatcher::Dispatcher;

// Re-export tower for middleware composition
pub use tower;

// Re-export core types
pub use courier_core::{
    Error, ErrorKind, INTERNAL_STATUS, Method, Request, RequestBuilder, Response,
    Result, deliver, encode_query, fill_binary, from_json, to_form, to_json,
};

// Re-export http types for status codes and headers
pub use courier_core::{StatusCode, header};
