//! URL construction and the two request entry points.
//!
//! # Design
//! Mirrors the build/parse split of the request types: `build_get` and
//! `build_post` produce plain `HttpRequest` values, `parse_response` turns an
//! `HttpResponse` into a typed result, and `get`/`post` run the round trip
//! through the configured `Transport` in between. Every catalog operation
//! goes through `get` or `post`; nothing else touches the transport.

use serde::de::DeserializeOwned;
use tracing::debug;
use url::form_urlencoded;

use crate::config::ClientConfig;
use crate::envelope::Codec;
use crate::error::{CkanError, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport};

pub const AUTHORIZATION: &str = "Authorization";
pub const CONTENT_TYPE: &str = "content-type";
pub const APPLICATION_JSON: &str = "application/json";

/// Executes CKAN action calls for one client.
#[derive(Debug)]
pub struct Invoker<T> {
    config: ClientConfig,
    codec: Codec,
    transport: T,
}

impl<T: Transport> Invoker<T> {
    pub fn new(config: ClientConfig, transport: T) -> Self {
        Self {
            config,
            codec: Codec::new(),
            transport,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    /// `catalog_url + path`, then `?k=v&k=v` with every key and value
    /// form-url-encoded on its own.
    pub fn build_url(&self, path: &str, params: &[(&str, &str)]) -> Result<String> {
        if !path.is_empty() && !path.starts_with('/') {
            return Err(CkanError::UrlBuild {
                path: path.to_string(),
                reason: "path must start with '/'".to_string(),
            });
        }

        let mut url = format!("{}{}", self.config.catalog_url(), path);
        for (i, (key, value)) in params.iter().enumerate() {
            url.push(if i == 0 { '?' } else { '&' });
            url.extend(form_urlencoded::byte_serialize(key.as_bytes()));
            url.push('=');
            url.extend(form_urlencoded::byte_serialize(value.as_bytes()));
        }
        Ok(url)
    }

    /// GET request; `Authorization` is attached only when a token is set.
    pub fn build_get(&self, path: &str, params: &[(&str, &str)]) -> Result<HttpRequest> {
        let url = self.build_url(path, params)?;
        let mut headers = Vec::new();
        if let Some(token) = self.config.token() {
            headers.push((AUTHORIZATION.to_string(), token.to_string()));
        }
        Ok(HttpRequest {
            method: HttpMethod::Get,
            url,
            headers,
            body: None,
        })
    }

    /// POST request; `Authorization` is always attached, empty when no token
    /// is configured. Write operations reject a missing token before this.
    pub fn build_post(
        &self,
        path: &str,
        body: String,
        content_type: &str,
        params: &[(&str, &str)],
    ) -> Result<HttpRequest> {
        let url = self.build_url(path, params)?;
        let token = self.config.token().unwrap_or_default();
        Ok(HttpRequest {
            method: HttpMethod::Post,
            url,
            headers: vec![
                (CONTENT_TYPE.to_string(), content_type.to_string()),
                (AUTHORIZATION.to_string(), token.to_string()),
            ],
            body: Some(body),
        })
    }

    /// Decode the envelope in `response` regardless of its HTTP status.
    pub fn parse_response<R: DeserializeOwned>(&self, response: &HttpResponse, url: &str) -> Result<R> {
        debug!(status = response.status, bytes = response.body.len(), "received response");
        self.codec.decode_result(&response.body, url)
    }

    pub fn get<R: DeserializeOwned>(&self, path: &str, params: &[(&str, &str)]) -> Result<R> {
        let request = self.build_get(path, params)?;
        debug!(url = %request.url, "getting");
        self.execute(request)
    }

    pub fn post<R: DeserializeOwned>(
        &self,
        path: &str,
        body: String,
        content_type: &str,
        params: &[(&str, &str)],
    ) -> Result<R> {
        let request = self.build_post(path, body, content_type, params)?;
        debug!(url = %request.url, bytes = request.body.as_ref().map_or(0, String::len), "posting");
        self.execute(request)
    }

    fn execute<R: DeserializeOwned>(&self, request: HttpRequest) -> Result<R> {
        let url = request.url.clone();
        let response = self
            .transport
            .execute(request)
            .map_err(|source| CkanError::Transport {
                url: url.clone(),
                source,
            })?;
        self.parse_response(&response, &url)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::error::TransportFailure;

    /// Replays one canned response and remembers the request it got.
    struct Canned {
        reply: std::result::Result<(u16, &'static str), &'static str>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl Canned {
        fn ok(status: u16, body: &'static str) -> Self {
            Self {
                reply: Ok((status, body)),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing(reason: &'static str) -> Self {
            Self {
                reply: Err(reason),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl Transport for Canned {
        fn execute(&self, request: HttpRequest) -> std::result::Result<HttpResponse, TransportFailure> {
            self.seen.lock().unwrap().push(request);
            match self.reply {
                Ok((status, body)) => Ok(HttpResponse {
                    status,
                    headers: Vec::new(),
                    body: body.to_string(),
                }),
                Err(reason) => Err(reason.into()),
            }
        }
    }

    fn invoker(token: Option<&str>, transport: Canned) -> Invoker<Canned> {
        let mut config = ClientConfig::new("http://ckan.test/").unwrap();
        if let Some(token) = token {
            config = config.with_token(token);
        }
        Invoker::new(config, transport)
    }

    #[test]
    fn build_url_without_params() {
        let inv = invoker(None, Canned::ok(200, ""));
        assert_eq!(
            inv.build_url("/api/3/action/package_list", &[]).unwrap(),
            "http://ckan.test/api/3/action/package_list"
        );
    }

    #[test]
    fn build_url_encodes_each_key_and_value() {
        let inv = invoker(None, Canned::ok(200, ""));
        let url = inv
            .build_url("/api/3/action/tag_list", &[("query", "acqua & aria"), ("all fields", "True")])
            .unwrap();
        assert_eq!(
            url,
            "http://ckan.test/api/3/action/tag_list?query=acqua+%26+aria&all+fields=True"
        );
    }

    #[test]
    fn build_url_rejects_relative_path() {
        let inv = invoker(None, Canned::ok(200, ""));
        let err = inv.build_url("api/3", &[]).unwrap_err();
        assert!(matches!(err, CkanError::UrlBuild { .. }));
    }

    #[test]
    fn get_without_token_has_no_authorization() {
        let inv = invoker(None, Canned::ok(200, ""));
        let req = inv.build_get("/api/3/action/package_list", &[]).unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert!(req.header(AUTHORIZATION).is_none());
        assert!(req.body.is_none());
    }

    #[test]
    fn get_with_token_sends_authorization() {
        let inv = invoker(Some("tok"), Canned::ok(200, ""));
        let req = inv.build_get("/api/3/action/package_list", &[]).unwrap();
        assert_eq!(req.header(AUTHORIZATION), Some("tok"));
    }

    #[test]
    fn post_always_sends_authorization() {
        let inv = invoker(None, Canned::ok(200, ""));
        let req = inv
            .build_post("/api/3/action/package_create", "{}".to_string(), APPLICATION_JSON, &[])
            .unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.header(AUTHORIZATION), Some(""));
        assert_eq!(req.header(CONTENT_TYPE), Some(APPLICATION_JSON));
        assert_eq!(req.body.as_deref(), Some("{}"));
    }

    #[test]
    fn get_decodes_result() {
        let inv = invoker(None, Canned::ok(200, r#"{"success":true,"result":["a"]}"#));
        let names: Vec<String> = inv.get("/api/3/action/package_list", &[("limit", "1")]).unwrap();
        assert_eq!(names, vec!["a"]);
        let seen = inv.transport.seen.lock().unwrap();
        assert_eq!(seen[0].url, "http://ckan.test/api/3/action/package_list?limit=1");
    }

    #[test]
    fn error_envelope_on_404_is_remote_error() {
        let inv = invoker(
            None,
            Canned::ok(404, r#"{"success":false,"error":{"message":"Not found","__type":"Not Found Error"}}"#),
        );
        let err = inv
            .get::<serde_json::Value>("/api/3/action/package_show", &[("id", "missing")])
            .unwrap_err();
        match err {
            CkanError::Remote { url, .. } => {
                assert_eq!(url, "http://ckan.test/api/3/action/package_show?id=missing")
            }
            other => panic!("expected Remote, got {other:?}"),
        }
    }

    #[test]
    fn transport_failure_carries_url() {
        let inv = invoker(None, Canned::failing("connection refused"));
        let err = inv.get::<Vec<String>>("/api/3/action/package_list", &[]).unwrap_err();
        match err {
            CkanError::Transport { url, source } => {
                assert_eq!(url, "http://ckan.test/api/3/action/package_list");
                assert_eq!(source.to_string(), "connection refused");
            }
            other => panic!("expected Transport, got {other:?}"),
        }
    }

    #[test]
    fn html_body_is_decode_error() {
        let inv = invoker(None, Canned::ok(502, "<html>Bad Gateway</html>"));
        let err = inv.get::<Vec<String>>("/api/3/action/package_list", &[]).unwrap_err();
        assert!(matches!(err, CkanError::Decode { body, .. } if body.contains("Bad Gateway")));
    }
}
