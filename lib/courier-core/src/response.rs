//! HTTP response handling.
//!
//! [`Response`] provides access to status, headers, and body with JSON/text deserialization.
//!
//! # Example
//!
//! ```ignore
//! let user: User = response.json()?;
//! ```

use std::collections::HashMap;

use bytes::Bytes;

use crate::request::find_header;

/// HTTP response with status, headers, and a fully buffered body.
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    headers: HashMap<String, String>,
    body: Bytes,
}

impl Response {
    /// Creates a new response.
    #[must_use]
    pub fn new(status: u16, headers: HashMap<String, String>, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Status code followed by its canonical reason, e.g. `200 OK`.
    #[must_use]
    pub fn status_text(&self) -> String {
        let reason = http::StatusCode::from_u16(self.status)
            .ok()
            .and_then(|status| status.canonical_reason());
        match reason {
            Some(reason) => format!("{} {reason}", self.status),
            None => self.status.to_string(),
        }
    }

    /// Response headers.
    #[must_use]
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Single header value by name, ignoring ASCII case.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Value of the `Content-Type` header, if any.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }

    /// Response body.
    #[must_use]
    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    /// Status is 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Status is 3xx.
    #[must_use]
    pub const fn is_redirection(&self) -> bool {
        self.status >= 300 && self.status < 400
    }

    /// Status is 4xx.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        self.status >= 400 && self.status < 500
    }

    /// Status is 5xx.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        self.status >= 500 && self.status < 600
    }

    /// Deserialize the response body as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> crate::Result<T> {
        crate::from_json(&self.body)
    }

    /// Get the response body as text, replacing invalid UTF-8 sequences.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_basic() {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());

        let response = Response::new(200, headers, Bytes::from(r#"{"id":1}"#));

        assert_eq!(response.status(), 200);
        assert_eq!(response.header("Content-Type"), Some("application/json"));
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert_eq!(response.content_type(), Some("application/json"));
        assert!(response.is_success());
        assert!(!response.is_client_error());
        assert!(!response.is_server_error());
    }

    #[test]
    fn response_status_checks() {
        let response = Response::new(301, HashMap::new(), Bytes::new());
        assert!(response.is_redirection());

        let response = Response::new(404, HashMap::new(), Bytes::new());
        assert!(response.is_client_error());

        let response = Response::new(500, HashMap::new(), Bytes::new());
        assert!(response.is_server_error());
    }

    #[test]
    fn response_status_text() {
        assert_eq!(Response::new(200, HashMap::new(), Bytes::new()).status_text(), "200 OK");
        assert_eq!(
            Response::new(404, HashMap::new(), Bytes::new()).status_text(),
            "404 Not Found"
        );
        assert_eq!(Response::new(599, HashMap::new(), Bytes::new()).status_text(), "599");
    }

    #[test]
    fn response_json() {
        #[derive(Debug, PartialEq, serde::Deserialize)]
        struct User {
            id: u64,
            name: String,
        }

        let body = Bytes::from(r#"{"id":1,"name":"test"}"#);
        let response = Response::new(200, HashMap::new(), body);

        let user: User = response.json().expect("deserialize");
        assert_eq!(
            user,
            User {
                id: 1,
                name: "test".to_string()
            }
        );
    }

    #[test]
    fn response_text() {
        let response = Response::new(200, HashMap::new(), Bytes::from("Hello, World!"));
        assert_eq!(response.text(), "Hello, World!");

        let response = Response::new(200, HashMap::new(), Bytes::from_static(b"ok\xff"));
        assert_eq!(response.text(), "ok\u{fffd}");
    }
}
