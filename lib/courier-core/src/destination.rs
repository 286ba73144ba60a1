//! Filling caller-supplied destinations from a response.
//!
//! A PDF response is copied byte for byte into a binary destination. Any other
//! response is decoded as JSON. A decode failure on a successful status only
//! produces a warning, and the destination keeps its previous value. A status
//! of 400 or more is always reported as an error, after the decode attempt.

use std::any::{Any, type_name};

use bytes::Bytes;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::{Error, Response, Result};

/// Content type whose body is delivered as raw bytes.
const PDF: &str = "application/pdf";

/// Dispatches `response` into `destination`.
///
/// # Errors
///
/// Returns a [`Status`](crate::ErrorKind::Status) error carrying the response
/// when its status is 400 or more, and a
/// [`Destination`](crate::ErrorKind::Destination) error when a PDF body is
/// delivered to anything other than `Vec<u8>` or [`Bytes`].
pub fn deliver<T>(response: &Response, destination: &mut T) -> Result<()>
where
    T: DeserializeOwned + Any,
{
    if response.content_type() == Some(PDF) {
        return fill_binary(destination, response.body());
    }

    if response.body().is_empty() {
        debug!(status = response.status(), "empty response body, nothing to decode");
    } else {
        match crate::from_json::<T>(response.body()) {
            Ok(value) => *destination = value,
            Err(err) => warn!(
                status = response.status(),
                error = %err.message(),
                "cannot decode response body into `{}`",
                type_name::<T>()
            ),
        }
    }

    if response.status() >= 400 {
        return Err(Error::http(response.status(), response.text()).with_response(response.clone()));
    }
    Ok(())
}

/// Copies a binary body into `destination`.
///
/// # Errors
///
/// Fails when `destination` is neither `Vec<u8>` nor [`Bytes`].
pub fn fill_binary<T: Any>(destination: &mut T, body: &Bytes) -> Result<()> {
    let slot: &mut dyn Any = destination;
    if let Some(buffer) = slot.downcast_mut::<Vec<u8>>() {
        *buffer = body.to_vec();
    } else if let Some(bytes) = slot.downcast_mut::<Bytes>() {
        bytes.clone_from(body);
    } else {
        return Err(Error::destination(type_name::<T>()));
    }
    Ok(())
}
