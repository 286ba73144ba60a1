//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types and functions
//! for easy glob importing:
//!
//! ```ignore
//! use courier::prelude::*;
//! ```

pub use crate::{
    ClientConfig, Dispatcher, DispatcherConfig, Error, ErrorKind, HyperClient, Method,
    Request, RequestBuilder, Response, Result, StatusCode, TokenPair, TokenRefresher, from_json,
    header, to_json,
};
pub use serde::{Deserialize, Serialize};
