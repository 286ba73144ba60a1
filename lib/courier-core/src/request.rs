//! HTTP request building.
//!
//! [`RequestBuilder`] accumulates the base URL, method, headers, query, body
//! and timeout of a request through chainable setters. Every setter mutates the
//! builder in place and returns it again, so calls can be chained or issued one
//! by one. Nothing is validated here: a malformed URL or header only surfaces
//! when the request is sent.
//!
//! # Example
//!
//! ```
//! use courier_core::{Method, RequestBuilder};
//!
//! let mut builder = RequestBuilder::new();
//! builder
//!     .set_base_url("https://api.example.com/search")
//!     .set_method(Method::Get)
//!     .set_header("Accept", "application/json")
//!     .set_query([("q", "rust")]);
//!
//! let request = builder.build();
//! assert_eq!(request.url(), "https://api.example.com/search?q=rust");
//! ```

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use bytes::Bytes;
use tracing::warn;

use crate::{Method, encode_query};

/// A resolved HTTP request, ready for the transport.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: String,
    headers: HashMap<String, String>,
    body: Option<Bytes>,
    timeout: Option<Duration>,
}

impl Request {
    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Request URL, exactly as it will be handed to the transport.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Request headers.
    #[must_use]
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Single header value by name, ignoring ASCII case.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Sets a header, replacing every header with the same name whatever its case.
    pub fn replace_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|key, _| !key.eq_ignore_ascii_case(name));
        self.headers.insert(name.to_string(), value.into());
    }

    /// Request body.
    #[must_use]
    pub const fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Deadline for the whole round trip, if the request carries one.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Sets the deadline for the whole round trip.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }
}

/// Fluent builder accumulating the configuration of a request.
#[derive(Debug, Clone, Default)]
pub struct RequestBuilder {
    base_url: String,
    method: Method,
    headers: HashMap<String, String>,
    query: BTreeMap<String, Vec<String>>,
    body: Option<Bytes>,
    timeout: Option<Duration>,
}

impl RequestBuilder {
    /// Creates an empty `GET` builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL.
    pub fn set_base_url(&mut self, base_url: impl Into<String>) -> &mut Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the HTTP method.
    pub fn set_method(&mut self, method: Method) -> &mut Self {
        self.method = method;
        self
    }

    /// Sets a header, overwriting any previous value for the same key.
    ///
    /// The key is stored verbatim, without case normalization.
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Replaces all headers.
    pub fn set_headers<K, V>(&mut self, headers: impl IntoIterator<Item = (K, V)>) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.headers = headers
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        self
    }

    /// Sets a header to the JSON text of `value`.
    ///
    /// If `value` cannot be serialized the header is left untouched and the
    /// failure is only logged.
    pub fn set_header_json<T: serde::Serialize + ?Sized>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> &mut Self {
        let key = key.into();
        match serde_json::to_string(value) {
            Ok(json) => {
                self.headers.insert(key, json);
            }
            Err(err) => warn!(header = %key, error = %err, "header value is not serializable, left unset"),
        }
        self
    }

    /// Replaces the query with one value per key.
    pub fn set_query<K, V>(&mut self, query: impl IntoIterator<Item = (K, V)>) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.query = BTreeMap::new();
        for (key, value) in query {
            self.query.insert(key.into(), vec![value.into()]);
        }
        self
    }

    /// Appends a value to a query key, keeping the values already present.
    pub fn add_query(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.query.entry(key.into()).or_default().push(value.into());
        self
    }

    /// Sets the raw body.
    pub fn set_body(&mut self, body: impl Into<Bytes>) -> &mut Self {
        self.body = Some(body.into());
        self
    }

    /// Sets the body from a string.
    pub fn set_body_string(&mut self, body: impl Into<String>) -> &mut Self {
        self.body = Some(Bytes::from(body.into()));
        self
    }

    /// Sets the body to the JSON encoding of `value`.
    ///
    /// If `value` cannot be serialized the previous body is kept and the
    /// failure is only logged. No `Content-Type` header is set.
    pub fn set_body_json<T: serde::Serialize + ?Sized>(&mut self, value: &T) -> &mut Self {
        match crate::to_json(value) {
            Ok(body) => self.body = Some(body),
            Err(err) => warn!(error = %err, "JSON body is not serializable, body left unchanged"),
        }
        self
    }

    /// Sets the body to the URL-encoded form of `value`.
    ///
    /// If `value` cannot be serialized the previous body is kept and the
    /// failure is only logged. No `Content-Type` header is set.
    pub fn set_body_form<T: serde::Serialize + ?Sized>(&mut self, value: &T) -> &mut Self {
        match crate::to_form(value) {
            Ok(body) => self.body = Some(body),
            Err(err) => warn!(error = %err, "form body is not serializable, body left unchanged"),
        }
        self
    }

    /// Sets the body to URL-encoded `key=value` pairs, sorted by key.
    ///
    /// The caller is responsible for the matching
    /// `Content-Type: application/x-www-form-urlencoded` header.
    pub fn set_body_form_data<K, V>(&mut self, fields: impl IntoIterator<Item = (K, V)>) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let fields: BTreeMap<String, String> = fields
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        self.set_body_form(&fields)
    }

    /// Sets the deadline of the whole round trip.
    pub fn set_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = Some(timeout);
        self
    }

    /// Base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Headers.
    #[must_use]
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Single header value by exact key.
    #[must_use]
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    /// Query parameters.
    #[must_use]
    pub fn query(&self) -> &BTreeMap<String, Vec<String>> {
        &self.query
    }

    /// Encoded query string, without the leading `?`.
    #[must_use]
    pub fn encoded_query(&self) -> String {
        encode_query(&self.query)
    }

    /// Body.
    #[must_use]
    pub const fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Timeout.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Resolves the builder for a standalone send.
    ///
    /// The base URL is used as is, followed by the encoded query when there is
    /// one.
    #[must_use]
    pub fn build(&self) -> Request {
        let query = self.encoded_query();
        let url = if query.is_empty() {
            self.base_url.clone()
        } else {
            format!("{}{}{query}", self.base_url, self.separator())
        };
        self.to_request(url)
    }

    /// Resolves the builder for a call on `path`.
    ///
    /// The URL is `base_url + path + separator + query`. The separator is `&`
    /// when the base URL already holds a `?` and `?` otherwise; it is always
    /// present, even for an empty query. A `?` inside `path` is not detected.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Request {
        let url = format!(
            "{}{path}{}{}",
            self.base_url,
            self.separator(),
            self.encoded_query()
        );
        self.to_request(url)
    }

    fn separator(&self) -> char {
        if self.base_url.contains('?') { '&' } else { '?' }
    }

    fn to_request(&self, url: String) -> Request {
        Request {
            method: self.method,
            url,
            headers: self.headers.clone(),
            body: self.body.clone(),
            timeout: self.timeout,
        }
    }
}

pub(crate) fn find_header<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

#[cfg(test)]
mod tests {
    use assert2::check;

    use super::*;
    use crate::body::tests::Refuses;

    #[test]
    fn builder_defaults() {
        let builder = RequestBuilder::new();
        assert_eq!(builder.method(), Method::Get);
        assert_eq!(builder.base_url(), "");
        assert!(builder.headers().is_empty());
        assert!(builder.query().is_empty());
        assert!(builder.body().is_none());
        assert!(builder.timeout().is_none());
    }

    #[test]
    fn set_headers_replaces_everything() {
        let mut builder = RequestBuilder::new();
        builder.set_header("X-Old", "1").set_header("Accept", "text/plain");

        let headers = HashMap::from([
            ("Accept".to_string(), "application/json".to_string()),
            ("X-Trace".to_string(), "abc".to_string()),
        ]);
        builder.set_headers(headers.clone());

        assert_eq!(builder.headers(), &headers);
    }

    #[test]
    fn set_header_overwrites_same_key_and_keeps_case() {
        let mut builder = RequestBuilder::new();
        builder
            .set_header("X-Custom", "first")
            .set_header("X-Custom", "second")
            .set_header("x-custom", "lower");

        check!(builder.header("X-Custom") == Some("second"));
        check!(builder.header("x-custom") == Some("lower"));
        check!(builder.headers().len() == 2);
    }

    #[test]
    fn set_header_json_serializes_value() {
        let mut builder = RequestBuilder::new();
        builder.set_header_json("X-Data", &HashMap::from([("key", "value")]));

        assert_eq!(builder.header("X-Data"), Some(r#"{"key":"value"}"#));
    }

    #[test]
    fn set_header_json_failure_leaves_header_unset() {
        let mut builder = RequestBuilder::new();
        builder.set_header_json("X-Data", &Refuses);

        assert!(builder.header("X-Data").is_none());
    }

    #[test]
    fn set_body_json_failure_keeps_previous_body() {
        let mut builder = RequestBuilder::new();
        builder.set_body_string("previous").set_body_json(&Refuses);

        assert_eq!(builder.body(), Some(&Bytes::from("previous")));
    }

    #[test]
    fn set_body_json_serializes_value() {
        let mut builder = RequestBuilder::new();
        builder.set_body_json(&serde_json::json!({"name": "John", "active": true}));

        let body: serde_json::Value =
            serde_json::from_slice(builder.body().expect("body")).expect("json");
        assert_eq!(body["name"], "John");
        assert_eq!(body["active"], true);
        assert!(builder.header("Content-Type").is_none());
    }

    #[test]
    fn set_body_form_data_encodes_sorted_pairs() {
        let mut builder = RequestBuilder::new();
        builder.set_body_form_data([("username", "john"), ("password", "s3cr&t")]);

        assert_eq!(
            builder.body(),
            Some(&Bytes::from("password=s3cr%26t&username=john"))
        );
        assert!(builder.header("Content-Type").is_none());
    }

    #[test]
    fn set_query_replaces_and_add_query_appends() {
        let mut builder = RequestBuilder::new();
        builder.add_query("stale", "1");
        builder.set_query([("page", "2"), ("q", "rust lang")]);
        builder.add_query("tag", "a").add_query("tag", "b");

        assert!(!builder.query().contains_key("stale"));
        assert_eq!(builder.encoded_query(), "page=2&q=rust+lang&tag=a&tag=b");
    }

    #[test]
    fn build_without_query_uses_base_url_verbatim() {
        let mut builder = RequestBuilder::new();
        builder
            .set_base_url("https://example.com")
            .set_method(Method::Post)
            .set_body_string("{}")
            .set_timeout(Duration::from_secs(5));

        let request = builder.build();
        assert_eq!(request.url(), "https://example.com");
        assert_eq!(request.method(), Method::Post);
        assert_eq!(request.body(), Some(&Bytes::from("{}")));
        assert_eq!(request.timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn build_appends_query() {
        let mut builder = RequestBuilder::new();
        builder
            .set_base_url("https://example.com/search?lang=en")
            .set_query([("key", "value")]);

        assert_eq!(
            builder.build().url(),
            "https://example.com/search?lang=en&key=value"
        );
    }

    #[test]
    fn resolve_always_appends_separator() {
        let mut builder = RequestBuilder::new();
        builder.set_base_url("https://api.example.com");

        insta::assert_snapshot!(builder.resolve("/todos/1").url(), @"https://api.example.com/todos/1?");
    }

    #[test]
    fn resolve_uses_ampersand_when_base_url_has_query() {
        let mut builder = RequestBuilder::new();
        builder
            .set_base_url("https://api.example.com/v1?key=abc")
            .set_query([("page", "1")]);

        assert_eq!(
            builder.resolve("/todos").url(),
            "https://api.example.com/v1?key=abc/todos&page=1"
        );
    }

    #[test]
    fn resolve_does_not_detect_question_mark_in_path() {
        let mut builder = RequestBuilder::new();
        builder
            .set_base_url("https://api.example.com")
            .set_query([("page", "1")]);

        assert_eq!(
            builder.resolve("/todos?done=true").url(),
            "https://api.example.com/todos?done=true?page=1"
        );
    }

    #[test]
    fn request_header_lookup_ignores_case() {
        let mut builder = RequestBuilder::new();
        builder.set_header("Content-Type", "application/json");
        let mut request = builder.build();

        assert_eq!(request.header("content-type"), Some("application/json"));

        request.replace_header("content-type", "text/plain");
        assert_eq!(request.headers().len(), 1);
        assert_eq!(request.header("Content-Type"), Some("text/plain"));
    }
}
