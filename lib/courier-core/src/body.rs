//! Body and query serialization utilities.

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::Result;

/// Serialize a value to JSON bytes.
///
/// # Errors
///
/// Returns a serialization error (`C:01`) if JSON serialization fails.
///
/// # Example
///
/// ```
/// use courier_core::to_json;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct User { name: String }
///
/// let user = User { name: "Alice".to_string() };
/// let bytes = to_json(&user).expect("serialize");
/// assert_eq!(bytes.as_ref(), br#"{"name":"Alice"}"#);
/// ```
pub fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(Into::into)
}

/// Serialize a value to form URL-encoded bytes.
///
/// Uses `serde_html_form` which supports `Vec<T>` for repeated form fields
/// (e.g., `tags=a&tags=b&tags=c`).
///
/// # Errors
///
/// Returns a serialization error if form serialization fails.
///
/// # Example
///
/// ```
/// use courier_core::to_form;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Login { username: String, password: String }
///
/// let login = Login { username: "alice".to_string(), password: "secret".to_string() };
/// let bytes = to_form(&login).expect("serialize");
/// assert_eq!(bytes.as_ref(), b"username=alice&password=secret");
/// ```
pub fn to_form<T: serde::Serialize + ?Sized>(value: &T) -> Result<Bytes> {
    serde_html_form::to_string(value)
        .map(|s| Bytes::from(s.into_bytes()))
        .map_err(|e| crate::Error::serialization(e.to_string()))
}

/// Encode query parameters as `key=value` pairs joined by `&`.
///
/// Keys come out sorted, values of a repeated key keep their insertion order.
/// Spaces are encoded as `+`.
///
/// # Example
///
/// ```
/// use std::collections::BTreeMap;
/// use courier_core::encode_query;
///
/// let mut query = BTreeMap::new();
/// query.insert("q".to_string(), vec!["rust lang".to_string()]);
/// query.insert("page".to_string(), vec!["1".to_string()]);
/// assert_eq!(encode_query(&query), "page=1&q=rust+lang");
/// ```
#[must_use]
pub fn encode_query(query: &BTreeMap<String, Vec<String>>) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, values) in query {
        for value in values {
            serializer.append_pair(key, value);
        }
    }
    serializer.finish()
}

/// Deserialize JSON bytes to a value with path-aware error messages.
///
/// Uses `serde_path_to_error` to provide detailed error messages that include
/// the exact path to the field that failed to deserialize.
///
/// # Errors
///
/// Returns a deserialization error whose message includes the path to the
/// problematic field (e.g., "user.address.city").
///
/// # Example
///
/// ```
/// use courier_core::from_json;
/// use serde::Deserialize;
///
/// #[derive(Debug, PartialEq, Deserialize)]
/// struct User { name: String }
///
/// let bytes = br#"{"name":"Alice"}"#;
/// let user: User = from_json(bytes).expect("deserialize");
/// assert_eq!(user, User { name: "Alice".to_string() });
/// ```
pub fn from_json<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
        crate::Error::json_deserialization(e.path().to_string(), e.inner().to_string())
    })
}
