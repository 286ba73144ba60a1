//! HTTP method types.

use std::str::FromStr;

use derive_more::Display;

/// HTTP request method.
///
/// Only the verbs below can be configured on a request, so an unknown verb is
/// rejected when it is parsed rather than when the request is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display)]
pub enum Method {
    /// GET method - retrieve a resource.
    #[default]
    #[display("GET")]
    Get,
    /// POST method - create a resource.
    #[display("POST")]
    Post,
    /// PUT method - replace a resource.
    #[display("PUT")]
    Put,
    /// DELETE method - remove a resource.
    #[display("DELETE")]
    Delete,
    /// PATCH method - partially update a resource.
    #[display("PATCH")]
    Patch,
    /// HEAD method - retrieve headers only.
    #[display("HEAD")]
    Head,
    /// OPTIONS method - retrieve allowed methods.
    #[display("OPTIONS")]
    Options,
}

impl FromStr for Method {
    type Err = crate::Error;

    fn from_str(verb: &str) -> Result<Self, Self::Err> {
        match verb.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            "PATCH" => Ok(Self::Patch),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            _ => Err(crate::Error::invalid_request(format!(
                "unsupported HTTP method: {verb}"
            ))),
        }
    }
}

impl From<Method> for http::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => Self::GET,
            Method::Post => Self::POST,
            Method::Put => Self::PUT,
            Method::Delete => Self::DELETE,
            Method::Patch => Self::PATCH,
            Method::Head => Self::HEAD,
            Method::Options => Self::OPTIONS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_display() {
        assert_eq!(Method::Get.to_string(), "GET");
        assert_eq!(Method::Post.to_string(), "POST");
        assert_eq!(Method::Put.to_string(), "PUT");
        assert_eq!(Method::Delete.to_string(), "DELETE");
        assert_eq!(Method::Patch.to_string(), "PATCH");
        assert_eq!(Method::Head.to_string(), "HEAD");
        assert_eq!(Method::Options.to_string(), "OPTIONS");
    }

    #[test]
    fn method_default_is_get() {
        assert_eq!(Method::default(), Method::Get);
    }

    #[test]
    fn method_parse_known_verbs() {
        assert_eq!("GET".parse::<Method>().expect("GET"), Method::Get);
        assert_eq!("patch".parse::<Method>().expect("patch"), Method::Patch);
        assert_eq!("Delete".parse::<Method>().expect("Delete"), Method::Delete);
    }

    #[test]
    fn method_parse_unknown_verb() {
        let err = "BREW".parse::<Method>().expect_err("unknown verb");
        assert_eq!(err.kind(), crate::ErrorKind::InvalidRequest);
        assert!(err.message().contains("BREW"));
    }

    #[test]
    fn method_into_http() {
        assert_eq!(http::Method::from(Method::Get), http::Method::GET);
        assert_eq!(http::Method::from(Method::Post), http::Method::POST);
        assert_eq!(http::Method::from(Method::Patch), http::Method::PATCH);
    }
}
