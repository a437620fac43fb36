//! Blocking `ureq` transport.

use std::fmt;

use ureq::{Agent, Proxy};

use crate::config::ClientConfig;
use crate::error::{CkanError, Result, TransportFailure};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport};

/// Upper bound for a response body. `package_search` pages with many
/// resources can get large.
const MAX_BODY_BYTES: u64 = 256 * 1024 * 1024;

/// Default transport: one shared `ureq::Agent` configured from `ClientConfig`.
///
/// Status codes are returned as data so the envelope codec can report CKAN's
/// own error message for 4xx/5xx answers.
#[derive(Clone)]
pub struct UreqTransport {
    agent: Agent,
}

impl UreqTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let proxy = match config.proxy() {
            Some(proxy) => Some(
                Proxy::new(&format!("http://{proxy}"))
                    .map_err(|e| CkanError::Configuration(format!("invalid proxy {proxy}: {e}")))?,
            ),
            None => None,
        };

        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .proxy(proxy)
            .timeout_global(config.timeout())
            .build()
            .new_agent();

        Ok(Self { agent })
    }
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport").finish_non_exhaustive()
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: HttpRequest) -> std::result::Result<HttpResponse, TransportFailure> {
        let mut response = match request.method {
            HttpMethod::Get => {
                let mut builder = self.agent.get(request.url.as_str());
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                builder.call()?
            }
            HttpMethod::Post => {
                let mut builder = self.agent.post(request.url.as_str());
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                builder.send(request.body.as_deref().unwrap_or("").as_bytes())?
            }
        };

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), value.to_str().unwrap_or("").to_string()))
            .collect();
        let body = response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_BYTES)
            .read_to_string()?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::config::ProxyConfig;

    const BODY: &str = r#"{"success":true,"result":["via-proxy"]}"#;

    /// Read one HTTP head and return its lines, start line first.
    fn read_head(reader: &mut impl BufRead) -> Vec<String> {
        let mut lines = Vec::new();
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).unwrap() == 0 {
                break;
            }
            let line = line.trim_end().to_string();
            if line.is_empty() {
                break;
            }
            lines.push(line);
        }
        lines
    }

    /// Proxy for a single connection. A `CONNECT` is acknowledged and the
    /// tunnelled request is answered directly; a plain forward request is
    /// answered as is. Returns the port and the start lines it saw.
    fn one_shot_proxy() -> (u16, thread::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut writer = stream;
            let mut seen = vec![read_head(&mut reader)[0].clone()];
            if seen[0].starts_with("CONNECT ") {
                writer
                    .write_all(b"HTTP/1.1 200 Connection established\r\n\r\n")
                    .unwrap();
                seen.push(read_head(&mut reader)[0].clone());
            }
            write!(
                writer,
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                BODY.len(),
                BODY
            )
            .unwrap();
            writer.flush().unwrap();
            seen
        });
        (port, handle)
    }

    #[test]
    fn requests_go_through_the_proxy() {
        let (port, proxy) = one_shot_proxy();
        // Nothing listens on the target port, so only the proxy can answer.
        let config = ClientConfig::new("http://127.0.0.1:9")
            .unwrap()
            .with_proxy(ProxyConfig::new("127.0.0.1", port))
            .with_timeout(Duration::from_secs(5));
        let transport = UreqTransport::new(&config).unwrap();

        let response = transport
            .execute(HttpRequest {
                method: HttpMethod::Get,
                url: "http://127.0.0.1:9/api/3/action/package_list".to_string(),
                headers: Vec::new(),
                body: None,
            })
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, BODY);

        let seen = proxy.join().unwrap();
        assert!(seen.iter().any(|line| line.contains("127.0.0.1:9")), "{seen:?}");
        assert!(
            seen.last().unwrap().contains("/api/3/action/package_list"),
            "{seen:?}"
        );
    }

    #[test]
    fn builds_with_proxy_and_timeout() {
        let config = ClientConfig::new("http://ckan.test")
            .unwrap()
            .with_proxy(ProxyConfig::new("localhost", 3128))
            .with_timeout(Duration::from_secs(3));
        assert!(UreqTransport::new(&config).is_ok());
    }

    #[test]
    fn unreachable_host_is_transport_failure() {
        // Port 9 (discard) on localhost is closed on any sane test machine.
        let config = ClientConfig::new("http://127.0.0.1:9")
            .unwrap()
            .with_timeout(Duration::from_secs(2));
        let transport = UreqTransport::new(&config).unwrap();
        let result = transport.execute(HttpRequest {
            method: HttpMethod::Get,
            url: "http://127.0.0.1:9/api/3/action/package_list".to_string(),
            headers: Vec::new(),
            body: None,
        });
        assert!(result.is_err());
    }
}
