//! CKAN timestamp codec.
//!
//! CKAN emits timestamps like `1970-01-01T01:00:00.000010`: UTC implied, no
//! zone suffix, microsecond precision. Some instances drop the fractional
//! part (`2013-12-17T00:00:00`) and some leak Python's `"None"` instead of a
//! JSON null.

use chrono::{NaiveDateTime, SubsecRound};

use crate::error::{CkanError, Result};

/// Sentinel string some catalogs send in place of a null timestamp.
pub const NONE: &str = "None";

const PARSE_PATTERN: &str = "%Y-%m-%dT%H:%M:%S%.f";
const FORMAT_PATTERN: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Parse a CKAN timestamp, keeping microsecond precision.
///
/// Fails on a missing or empty value and on the [`NONE`] sentinel.
pub fn parse_timestamp(text: Option<&str>) -> Result<NaiveDateTime> {
    let text = text.ok_or_else(|| CkanError::Parse("found null timestamp".to_string()))?;
    if text.is_empty() {
        return Err(CkanError::Parse("found empty timestamp".to_string()));
    }
    if text == NONE {
        return Err(CkanError::Parse(format!("found timestamp with '{NONE}' inside")));
    }

    let normalized = text.trim().replacen(' ', "T", 1);
    let parsed = NaiveDateTime::parse_from_str(&normalized, PARSE_PATTERN)
        .map_err(|e| CkanError::Parse(format!("{text}: {e}")))?;
    Ok(parsed.trunc_subsecs(6))
}

/// Format a timestamp the way CKAN expects it: always six fractional digits.
///
/// `parse_timestamp(format_timestamp(t))` reproduces `t` to the microsecond.
pub fn format_timestamp(ts: Option<&NaiveDateTime>) -> Result<String> {
    let ts = ts.ok_or_else(|| CkanError::Parse("found null timestamp".to_string()))?;
    Ok(ts.trunc_subsecs(6).format(FORMAT_PATTERN).to_string())
}

/// Serde adapter for optional timestamp fields.
///
/// Null, empty and `"None"` all read as `None`; `None` is written as null and
/// is normally skipped with `skip_serializing_if`.
pub mod optional {
    use chrono::NaiveDateTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ts) => {
                let text = super::format_timestamp(Some(ts)).map_err(serde::ser::Error::custom)?;
                serializer.serialize_str(&text)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref() {
            None | Some("") | Some(super::NONE) => Ok(None),
            Some(text) => super::parse_timestamp(Some(text))
                .map(Some)
                .map_err(de::Error::custom),
        }
    }
}
