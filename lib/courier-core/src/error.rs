//! Error types for courier.
//!
//! Every failure is carried by a single [`Error`] value holding a status code,
//! a message and, when available, the request and response involved. Internal
//! failures use status 500 and a fixed diagnostic code (see [`ErrorKind::code`]);
//! remote failures mirror the status returned by the server.

use std::time::Duration;

use derive_more::{Display, Error};

use crate::{Request, Response};

/// Status used for failures that never produced a remote status.
pub const INTERNAL_STATUS: u16 = 500;

// ============================================================================
// Error Kind
// ============================================================================

/// Category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ErrorKind {
    /// The request payload could not be serialized.
    #[display("serialization")]
    Serialization,
    /// The transport rejected the request (malformed URL, header or method).
    #[display("invalid request")]
    InvalidRequest,
    /// Network/connection errors (refused, DNS, reset).
    #[display("connection")]
    Connection,
    /// TLS/SSL errors.
    #[display("tls")]
    Tls,
    /// No response arrived before the deadline.
    #[display("timeout")]
    Timeout,
    /// The response body could not be read.
    #[display("read body")]
    ReadBody,
    /// The server answered with a status >= 400.
    #[display("status")]
    Status,
    /// A body could not be decoded into the requested type.
    #[display("deserialization")]
    Deserialization,
    /// The destination cannot receive the response body.
    #[display("destination")]
    Destination,
    /// Built by the caller through [`Error::new`].
    #[display("custom")]
    Custom,
}

impl ErrorKind {
    /// Diagnostic code attached to the failures raised while dispatching.
    #[must_use]
    pub const fn code(self) -> Option<&'static str> {
        match self {
            Self::Serialization => Some("C:01"),
            Self::InvalidRequest => Some("C:02"),
            Self::Connection | Self::Tls | Self::Timeout => Some("C:03"),
            Self::ReadBody => Some("C:04"),
            Self::Status => Some("Status code >= 400"),
            Self::Deserialization | Self::Destination | Self::Custom => None,
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

/// Main error type for courier operations.
///
/// Immutable once built. Only [`Error::new`] and remote status failures carry
/// a request or a response, so callers must not assume [`Error::request`] or
/// [`Error::response`] are populated.
#[derive(Debug, Display, Error)]
#[display("HTTP error {status}: {message}")]
pub struct Error {
    kind: ErrorKind,
    status: u16,
    message: String,
    request: Option<Box<Request>>,
    response: Option<Box<Response>>,
}

/// Result type alias using [`crate::Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an error with every detail, for caller-level custom errors.
    #[must_use]
    pub fn new(
        status: u16,
        message: impl Into<String>,
        request: Option<Request>,
        response: Option<Response>,
    ) -> Self {
        Self {
            kind: ErrorKind::Custom,
            status,
            message: message.into(),
            request: request.map(Box::new),
            response: response.map(Box::new),
        }
    }

    fn quick(kind: ErrorKind, status: u16, message: impl Into<String>) -> Self {
        Self {
            kind,
            status,
            message: message.into(),
            request: None,
            response: None,
        }
    }

    /// Create a payload serialization error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::quick(ErrorKind::Serialization, INTERNAL_STATUS, message)
    }

    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::quick(ErrorKind::InvalidRequest, INTERNAL_STATUS, message)
    }

    /// Create a connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::quick(ErrorKind::Connection, INTERNAL_STATUS, message)
    }

    /// Create a TLS error.
    #[must_use]
    pub fn tls(message: impl Into<String>) -> Self {
        Self::quick(ErrorKind::Tls, INTERNAL_STATUS, message)
    }

    /// Create a timeout error.
    #[must_use]
    pub fn timeout(after: Duration) -> Self {
        Self::quick(
            ErrorKind::Timeout,
            INTERNAL_STATUS,
            format!("request timed out after {after:?}"),
        )
    }

    /// Create a body read error.
    #[must_use]
    pub fn read_body(message: impl Into<String>) -> Self {
        Self::quick(ErrorKind::ReadBody, INTERNAL_STATUS, message)
    }

    /// Create an error for a remote status >= 400.
    ///
    /// The message is the raw response body text.
    #[must_use]
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::quick(ErrorKind::Status, status, message)
    }

    /// Create a JSON deserialization error with path context.
    #[must_use]
    pub fn json_deserialization(path: impl AsRef<str>, message: impl AsRef<str>) -> Self {
        let (path, message) = (path.as_ref(), message.as_ref());
        let message = if path.is_empty() || path == "." {
            format!("JSON deserialization error: {message}")
        } else {
            format!("JSON deserialization error at '{path}': {message}")
        };
        Self::quick(ErrorKind::Deserialization, INTERNAL_STATUS, message)
    }

    /// Create an error for a destination that cannot take a binary body.
    #[must_use]
    pub fn destination(type_name: &str) -> Self {
        Self::quick(
            ErrorKind::Destination,
            INTERNAL_STATUS,
            format!("destination `{type_name}` cannot receive a binary body, use `Vec<u8>` or `Bytes`"),
        )
    }

    /// Attach the response that produced this error.
    #[must_use]
    pub fn with_response(mut self, response: Response) -> Self {
        self.response = Some(Box::new(response));
        self
    }

    /// Attach the request that produced this error.
    #[must_use]
    pub fn with_request(mut self, request: Request) -> Self {
        self.request = Some(Box::new(request));
        self
    }

    /// Category of the failure.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Diagnostic code of the failure, see [`ErrorKind::code`].
    #[must_use]
    pub const fn code(&self) -> Option<&'static str> {
        self.kind.code()
    }

    /// HTTP status code: the remote status, or 500 for internal failures.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        self.status
    }

    /// Error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Request that produced the error, if it was recorded.
    #[must_use]
    pub fn request(&self) -> Option<&Request> {
        self.request.as_deref()
    }

    /// Response that produced the error, if it was recorded.
    #[must_use]
    pub fn response(&self) -> Option<&Response> {
        self.response.as_deref()
    }

    /// Returns `true` if this is a timeout error.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.kind == ErrorKind::Timeout
    }

    /// Returns `true` if this is a connection error.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        self.kind == ErrorKind::Connection
    }

    /// Returns `true` if the server answered with a 4xx status.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.kind == ErrorKind::Status && (400..500).contains(&self.status)
    }

    /// Returns `true` if the server answered with a 5xx status.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.kind == ErrorKind::Status && (500..600).contains(&self.status)
    }

    /// Returns `true` if this is a 404 Not Found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.is_client_error() && self.status == 404
    }

    /// Returns `true` if this is a 401 Unauthorized error.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.is_client_error() && self.status == 401
    }

    /// Try to decode the body of the recorded response as JSON.
    ///
    /// Returns `None` when no response was recorded.
    ///
    /// # Example
    ///
    /// ```ignore
    /// #[derive(Debug, Deserialize)]
    /// struct ApiError {
    ///     code: String,
    ///     message: String,
    /// }
    ///
    /// if let Err(e) = dispatcher.get("/users/42", &mut user).await {
    ///     if let Some(Ok(api_error)) = e.decode_body::<ApiError>() {
    ///         println!("API error: {} - {}", api_error.code, api_error.message);
    ///     }
    /// }
    /// ```
    pub fn decode_body<T: serde::de::DeserializeOwned>(&self) -> Option<Result<T>> {
        self.response().map(|response| crate::from_json(response.body()))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use bytes::Bytes;

    use super::*;
    use crate::Method;

    #[test]
    fn error_display() {
        let err = Error::http(404, "Not Found");
        assert_eq!(err.to_string(), "HTTP error 404: Not Found");

        let err = Error::connection("failed to connect");
        assert_eq!(err.to_string(), "HTTP error 500: failed to connect");

        let err = Error::json_deserialization("user.address.city", "missing field `city`");
        insta::assert_snapshot!(err.to_string(), @"HTTP error 500: JSON deserialization error at 'user.address.city': missing field `city`");
    }

    #[test]
    fn error_codes() {
        assert_eq!(Error::serialization("boom").code(), Some("C:01"));
        assert_eq!(Error::invalid_request("bad uri").code(), Some("C:02"));
        assert_eq!(Error::connection("refused").code(), Some("C:03"));
        assert_eq!(Error::tls("bad certificate").code(), Some("C:03"));
        assert_eq!(Error::timeout(Duration::from_secs(1)).code(), Some("C:03"));
        assert_eq!(Error::read_body("reset").code(), Some("C:04"));
        assert_eq!(Error::http(418, "teapot").code(), Some("Status code >= 400"));
        assert_eq!(Error::new(409, "conflict", None, None).code(), None);
    }

    #[test]
    fn internal_errors_use_status_500() {
        for err in [
            Error::serialization("boom"),
            Error::invalid_request("bad uri"),
            Error::connection("refused"),
            Error::read_body("reset"),
            Error::timeout(Duration::from_millis(100)),
        ] {
            assert_eq!(err.status_code(), 500, "{err}");
            assert!(err.request().is_none());
            assert!(err.response().is_none());
        }
    }

    #[test]
    fn error_status() {
        let err = Error::http(404, "Not Found");
        assert_eq!(err.status_code(), 404);
        assert!(err.is_client_error());
        assert!(err.is_not_found());
        assert!(!err.is_server_error());

        let err = Error::http(500, "Internal Server Error");
        assert!(!err.is_client_error());
        assert!(err.is_server_error());

        let err = Error::timeout(Duration::from_secs(1));
        assert!(err.is_timeout());
        assert!(!err.is_server_error());
        assert!(!err.is_connection());

        assert!(Error::http(401, "").is_unauthorized());
        assert!(Error::connection("refused").is_connection());
    }

    #[test]
    fn full_constructor_keeps_request_and_response() {
        let mut builder = crate::RequestBuilder::new();
        builder.set_base_url("https://api.example.com").set_method(Method::Post);
        let request = builder.build();
        let response = Response::new(409, HashMap::new(), Bytes::from("conflict"));

        let err = Error::new(409, "already exists", Some(request), Some(response));

        assert_eq!(err.kind(), ErrorKind::Custom);
        assert_eq!(err.message(), "already exists");
        assert_eq!(err.request().map(Request::method), Some(Method::Post));
        assert_eq!(err.response().map(Response::status), Some(409));
    }

    #[test]
    fn error_decode_body() {
        #[derive(Debug, PartialEq, serde::Deserialize)]
        struct ApiError {
            error: String,
        }

        let body = Bytes::from(r#"{"error": "not found"}"#);
        let err = Error::http(404, r#"{"error": "not found"}"#)
            .with_response(Response::new(404, HashMap::new(), body));

        let decoded = err
            .decode_body::<ApiError>()
            .expect("should have body")
            .expect("should decode");
        assert_eq!(
            decoded,
            ApiError {
                error: "not found".to_string()
            }
        );

        assert!(Error::http(404, "Not Found").decode_body::<ApiError>().is_none());
    }
}
