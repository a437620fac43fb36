//! HTTP request/response types and the transport seam.
//!
//! # Design
//! Requests and responses are plain data. The invoker builds `HttpRequest`
//! values and parses `HttpResponse` values; a `Transport` does the actual
//! round trip in between. The client ships with a blocking `ureq` transport
//! (see `transport`), and tests substitute a recording one.
//!
//! Non-2xx statuses are data, not transport failures: CKAN reports missing
//! records and permission problems as 4xx responses that still carry a JSON
//! envelope.

use crate::error::TransportFailure;

/// HTTP method for a request. CKAN actions only use GET and POST.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// Fully built URL, query string included.
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// First header value with the given (case-insensitive) name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// Executes one request. Implementations must be safe to share across
/// threads; the client holds exactly one for its whole lifetime.
pub trait Transport: Send + Sync {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportFailure>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportFailure> {
        (**self).execute(request)
    }
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportFailure> {
        (**self).execute(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case() {
        let req = HttpRequest {
            method: HttpMethod::Get,
            url: "http://ckan.test".to_string(),
            headers: vec![("Authorization".to_string(), "secret".to_string())],
            body: None,
        };
        assert_eq!(req.header("authorization"), Some("secret"));
        assert_eq!(req.header("content-type"), None);
    }
}
