//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types and functions
//! for easy glob importing:
//!
//! ```ignore
//! use courier_core::prelude::*;
//! ```

pub use crate::{
    Error, ErrorKind, Method, Request, RequestBuilder, Response, Result, deliver,
    from_json, to_form, to_json,
};
