//! Response envelope decoding and posting-side JSON encoding.
//!
//! # Design
//! Every CKAN action answers with `{help, success, error, result}`. The
//! `Codec` decodes that envelope tolerantly (unknown fields are ignored) and
//! turns it into either the typed `result` or a `CkanError`. When `success`
//! is false the `result` is never looked at, even if the server filled it.
//!
//! Outbound payloads go through `Codec::encode_for_posting`, which drops every
//! JSON null: CKAN tends to choke on null-heavy create/update bodies. Payload
//! types are separate from the read-side types (see `types`), so stripping
//! server-maintained fields happens by projection, not here.
//!
//! Field mapping lives in the serde derives, so a `Codec` holds no mapper,
//! only its diagnostics policy: how much of an undecodable body is kept in
//! `CkanError::Decode`. It is built once per client and only read
//! afterwards, so one instance is shared by all concurrent calls.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{CkanError, Result};

/// The wire wrapper around every action result.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Envelope<T> {
    #[serde(default)]
    pub help: Option<String>,
    pub success: bool,
    #[serde(default, deserialize_with = "lenient_error")]
    pub error: Option<ErrorInfo>,
    #[serde(default = "Option::default")]
    pub result: Option<T>,
}

/// Error detail reported by the catalog when `success` is false.
///
/// Validation failures carry per-field message lists next to `__type`; they
/// are kept in `others`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ErrorInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(rename = "__type", default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(flatten)]
    pub others: BTreeMap<String, Value>,
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.error_type, &self.message) {
            (Some(kind), Some(message)) => write!(f, "{kind}: {message}")?,
            (Some(kind), None) => write!(f, "{kind}")?,
            (None, Some(message)) => write!(f, "{message}")?,
            (None, None) => write!(f, "unknown error")?,
        }
        if !self.others.is_empty() {
            let details = serde_json::to_string(&self.others).map_err(|_| fmt::Error)?;
            write!(f, " {details}")?;
        }
        Ok(())
    }
}

impl ErrorInfo {
    /// Read whatever a catalog put under `error`. Object members land in
    /// their fields or in `others`; any other value becomes the message.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => {
                let mut info = Self::default();
                for (key, value) in map {
                    match value {
                        Value::String(message) if key == "message" => info.message = Some(message),
                        Value::String(kind) if key == "__type" => info.error_type = Some(kind),
                        value => {
                            info.others.insert(key, value);
                        }
                    }
                }
                info
            }
            Value::String(message) => Self {
                message: Some(message),
                ..Self::default()
            },
            other => Self {
                message: Some(other.to_string()),
                ..Self::default()
            },
        }
    }
}

fn lenient_error<'de, D>(deserializer: D) -> std::result::Result<Option<ErrorInfo>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Value> = Option::deserialize(deserializer)?;
    Ok(raw.map(ErrorInfo::from_value))
}

/// Bytes of an undecodable body kept in `CkanError::Decode` by default.
pub const DEFAULT_ERROR_BODY_LIMIT: usize = 64 * 1024;

/// Read/post JSON codec shared by every operation of one client.
#[derive(Debug, Clone)]
pub struct Codec {
    error_body_limit: usize,
}

impl Default for Codec {
    fn default() -> Self {
        Self {
            error_body_limit: DEFAULT_ERROR_BODY_LIMIT,
        }
    }
}

impl Codec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `limit` bytes of the body in `Decode` errors.
    pub fn with_error_body_limit(mut self, limit: usize) -> Self {
        self.error_body_limit = limit;
        self
    }

    pub fn error_body_limit(&self) -> usize {
        self.error_body_limit
    }

    /// Decode a raw body as an envelope around `T`.
    pub fn decode<T: DeserializeOwned>(&self, body: &str) -> Result<Envelope<T>> {
        serde_json::from_str(body).map_err(|source| self.decode_error(body, source))
    }

    fn decode_error(&self, body: &str, source: serde_json::Error) -> CkanError {
        let mut end = self.error_body_limit.min(body.len());
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        CkanError::Decode {
            body: body[..end].to_string(),
            source,
        }
    }

    /// Decode a raw body and unwrap its `result` as `T`.
    ///
    /// `url` is kept in a `Remote` error for diagnosis. The envelope is read
    /// loosely first so that a failure report is never masked by a `result`
    /// that does not fit `T`.
    pub fn decode_result<T: DeserializeOwned>(&self, body: &str, url: &str) -> Result<T> {
        let envelope = self.decode::<Value>(body)?;
        if !envelope.success {
            return Err(CkanError::Remote {
                url: url.to_string(),
                error: envelope.error.unwrap_or_default(),
            });
        }
        let result = envelope.result.ok_or_else(|| {
            self.decode_error(body, <serde_json::Error as serde::de::Error>::missing_field("result"))
        })?;
        serde_json::from_value(result).map_err(|source| self.decode_error(body, source))
    }

    /// Serialize a create/update payload, omitting every null value.
    pub fn encode_for_posting<P: Serialize>(&self, payload: &P) -> Result<String> {
        let mut value = serde_json::to_value(payload)?;
        prune_nulls(&mut value);
        Ok(serde_json::to_string(&value)?)
    }
}

fn prune_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(prune_nulls);
        }
        Value::Array(items) => items.iter_mut().for_each(prune_nulls),
        _ => {}
    }
}
