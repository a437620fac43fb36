//! Client configuration.

use std::env;
use std::fmt;
use std::time::Duration;

use crate::error::{CkanError, Result};

/// Catalog base URL, e.g. `http://dati.trentino.it`.
pub const ENV_URL: &str = "CKAN_URL";
/// API token sent in the `Authorization` header.
pub const ENV_TOKEN: &str = "CKAN_TOKEN";
/// Proxy as `host:port`.
pub const ENV_PROXY: &str = "CKAN_PROXY";
/// Global request timeout in whole seconds.
pub const ENV_TIMEOUT_SECS: &str = "CKAN_TIMEOUT_SECS";

/// HTTP proxy used for every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
}

impl ProxyConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse `host:port`.
    pub fn parse(text: &str) -> Result<Self> {
        let (host, port) = text
            .rsplit_once(':')
            .ok_or_else(|| CkanError::Configuration(format!("proxy must be host:port, got {text:?}")))?;
        if host.is_empty() {
            return Err(CkanError::Configuration(format!("proxy host is empty in {text:?}")));
        }
        let port = port
            .parse()
            .map_err(|_| CkanError::Configuration(format!("invalid proxy port in {text:?}")))?;
        Ok(Self::new(host, port))
    }
}

impl fmt::Display for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Immutable settings shared by every call of one client.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    catalog_url: String,
    token: Option<String>,
    proxy: Option<ProxyConfig>,
    timeout: Option<Duration>,
}

impl ClientConfig {
    /// Configuration for `catalog_url` with no token, proxy or timeout.
    /// Trailing slashes are stripped.
    pub fn new(catalog_url: &str) -> Result<Self> {
        let catalog_url = catalog_url.trim().trim_end_matches('/');
        if catalog_url.is_empty() {
            return Err(CkanError::Configuration("invalid ckan catalog url".to_string()));
        }
        Ok(Self {
            catalog_url: catalog_url.to_string(),
            token: None,
            proxy: None,
            timeout: None,
        })
    }

    /// Read `CKAN_URL`, `CKAN_TOKEN`, `CKAN_PROXY` and `CKAN_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        let url = env::var(ENV_URL)
            .map_err(|_| CkanError::Configuration(format!("{ENV_URL} is not set")))?;
        let mut config = Self::new(&url)?;

        if let Ok(token) = env::var(ENV_TOKEN) {
            if !token.is_empty() {
                config = config.with_token(token);
            }
        }
        if let Ok(proxy) = env::var(ENV_PROXY) {
            config = config.with_proxy(ProxyConfig::parse(&proxy)?);
        }
        if let Ok(secs) = env::var(ENV_TIMEOUT_SECS) {
            let secs: u64 = secs.parse().map_err(|_| {
                CkanError::Configuration(format!("{ENV_TIMEOUT_SECS} must be a number, got {secs:?}"))
            })?;
            config = config.with_timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Whole-request deadline handed to the transport.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn catalog_url(&self) -> &str {
        &self.catalog_url
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn proxy(&self) -> Option<&ProxyConfig> {
        self.proxy.as_ref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("catalog_url", &self.catalog_url)
            .field("token", &self.token.as_ref().map(|_| "*****MASKED*****"))
            .field("proxy", &self.proxy)
            .field("timeout", &self.timeout)
            .finish()
    }
}
