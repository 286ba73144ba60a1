//! Core types for the courier fluent HTTP client.
//!
//! This crate provides the transport-agnostic types used by courier:
//! - [`Method`] - HTTP method enum
//! - [`RequestBuilder`] and [`Request`] - fluent request configuration and its resolved form
//! - [`Response`] - buffered HTTP response
//! - [`Error`], [`ErrorKind`] and [`Result`] - error handling
//! - [`deliver`] - filling a caller-supplied destination from a response
//! - [`StatusCode`] - HTTP status codes (re-exported from `http` crate)
//! - [`header`] - HTTP header names (re-exported from `http` crate)

mod body;
mod destination;
mod error;
mod method;
pub mod prelude;
mod request;
mod response;

pub use body::{encode_query, from_json, to_form, to_json};
pub use destination::{deliver, fill_binary};
pub use error::{Error, ErrorKind, INTERNAL_STATUS, Result};
pub use method::Method;
pub use request::{Request, RequestBuilder};
pub use response::Response;

// Re-export http crate types for status codes and headers
pub use http::{StatusCode, header};
