//! Error types for the CKAN client.
//!
//! # Design
//! Every failure surfaces as one `CkanError` variant carrying enough context
//! (request URL, raw body or underlying cause) to diagnose it without
//! re-running the call. `Remote` is the expected failure mode: the catalog
//! answered with a well-formed envelope whose `success` flag is false.

use thiserror::Error;

use crate::envelope::ErrorInfo;

/// Boxed cause reported by a [`Transport`](crate::http::Transport).
pub type TransportFailure = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned by every `CkanClient` operation.
#[derive(Debug, Error)]
pub enum CkanError {
    /// The operation needs something the client was not configured with,
    /// e.g. a write without an API token.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Query parameters could not be encoded into a URL.
    #[error("could not build url for path {path}: {reason}")]
    UrlBuild { path: String, reason: String },

    /// Connection, timeout or stream-read failure.
    #[error("transport failure for {url}")]
    Transport {
        url: String,
        #[source]
        source: TransportFailure,
    },

    /// The body was not JSON or did not match the envelope shape.
    #[error("couldn't interpret json returned by the server: {source}")]
    Decode {
        body: String,
        #[source]
        source: serde_json::Error,
    },

    /// The catalog answered with `success: false`.
    #[error("catalog reported an error for {url}: {error}")]
    Remote { url: String, error: ErrorInfo },

    /// Malformed or sentinel timestamp.
    #[error("invalid timestamp: {0}")]
    Parse(String),

    /// Local pre-flight check failed before any request was sent.
    #[error("validation failed: {0}")]
    Validation(String),

    /// An outbound payload could not be serialized.
    #[error("couldn't serialize payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CkanError>;
