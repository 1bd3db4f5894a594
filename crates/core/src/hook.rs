//! Hook outcome records and the stream payload decoder.
//!
//! A producer publishes one JSON payload per delivery attempt:
//!
//! ```json
//! {"status": "failed", "created": "2024-01-01T00:00:00Z", "error": "timeout"}
//! ```
//!
//! [`decode_hook_event`] parses it into an untyped [`serde_json::Value`]
//! first and then validates each field into a typed [`HookRecord`], so a bad
//! payload always surfaces as a [`DecodeError`] rather than a panic.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{HookId, Timestamp};

/// Keys accepted for the error detail, in lookup order. The producer emits
/// `delivery_error` (older releases) or `deliveryError`.
const ERROR_KEYS: [&str; 3] = ["error", "delivery_error", "deliveryError"];

// ---------------------------------------------------------------------------
// HookStatus
// ---------------------------------------------------------------------------

/// Outcome of a single webhook delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookStatus {
    Success,
    Failed,
}

impl HookStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            HookStatus::Success => "success",
            HookStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for HookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HookStatus {
    type Err = DecodeError;

    /// Exact, case-sensitive match on `"success"` / `"failed"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(HookStatus::Success),
            "failed" => Ok(HookStatus::Failed),
            other => Err(DecodeError::InvalidStatus(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// HookRecord
// ---------------------------------------------------------------------------

/// The persisted outcome of one webhook delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookRecord {
    /// Stream entry id the record was ingested from. Natural key.
    pub id: HookId,
    pub status: HookStatus,
    /// When the producer created the delivery attempt (not the receive time).
    pub created: Timestamp,
    /// Reserved for later enrichment; ingestion never sets it.
    pub delivered: Option<Timestamp>,
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// DecodeError
// ---------------------------------------------------------------------------

/// Coarse classification of a [`DecodeError`], handy for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    Malformed,
    InvalidStatus,
    InvalidTimestamp,
}

/// Why a raw stream payload could not be turned into a [`HookRecord`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Not JSON, not an object, or a field of the wrong type.
    #[error("Malformed hook payload: {0}")]
    Malformed(String),

    /// `status` missing or not one of `success` / `failed`.
    #[error("Invalid hook status: {0:?}")]
    InvalidStatus(String),

    /// `created` missing or not a parseable timestamp string.
    #[error("Invalid hook timestamp: {0:?}")]
    InvalidTimestamp(String),
}

impl DecodeError {
    pub fn kind(&self) -> DecodeErrorKind {
        match self {
            DecodeError::Malformed(_) => DecodeErrorKind::Malformed,
            DecodeError::InvalidStatus(_) => DecodeErrorKind::InvalidStatus,
            DecodeError::InvalidTimestamp(_) => DecodeErrorKind::InvalidTimestamp,
        }
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode a raw stream payload into a [`HookRecord`] keyed by `id`.
///
/// Fields are validated in the order `status`, `created`, `error`; the first
/// failure wins. Unknown fields are ignored. This function is pure.
pub fn decode_hook_event(id: &str, raw: &[u8]) -> Result<HookRecord, DecodeError> {
    let value: Value =
        serde_json::from_slice(raw).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let fields = match value {
        Value::Object(fields) => fields,
        other => {
            return Err(DecodeError::Malformed(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            )))
        }
    };

    let status = match fields.get("status") {
        Some(Value::String(s)) => s.parse::<HookStatus>()?,
        Some(other) => return Err(DecodeError::InvalidStatus(other.to_string())),
        None => return Err(DecodeError::InvalidStatus("<missing>".into())),
    };

    let created = match fields.get("created") {
        Some(Value::String(s)) => parse_timestamp(s)?,
        Some(other) => return Err(DecodeError::InvalidTimestamp(other.to_string())),
        None => return Err(DecodeError::InvalidTimestamp("<missing>".into())),
    };

    let error = match ERROR_KEYS.iter().find_map(|key| fields.get(*key)) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            return Err(DecodeError::Malformed(format!(
                "error must be a string, got {}",
                json_type_name(other)
            )))
        }
    };

    Ok(HookRecord {
        id: id.to_string(),
        status,
        created,
        delivered: None,
        error,
    })
}

/// Parse a producer timestamp into UTC.
///
/// Accepts RFC 3339 and Go's `time.Time.String()` layout
/// (`2006-01-02 15:04:05.999999999 -0700 MST`, optionally followed by the
/// ` m=+0.000` monotonic clock reading). Sub-second precision is truncated
/// to microseconds, the resolution Postgres `TIMESTAMPTZ` stores.
pub fn parse_timestamp(raw: &str) -> Result<Timestamp, DecodeError> {
    let trimmed = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc).trunc_subsecs(6));
    }

    let without_monotonic = trimmed.split(" m=").next().unwrap_or(trimmed);
    let parts: Vec<&str> = without_monotonic.split_whitespace().collect();
    if let [date, time, offset, ..] = parts.as_slice() {
        let candidate = format!("{date} {time} {offset}");
        for layout in ["%Y-%m-%d %H:%M:%S%.f %z", "%Y-%m-%d %H:%M:%S %z"] {
            if let Ok(dt) = DateTime::parse_from_str(&candidate, layout) {
                return Ok(dt.with_timezone(&Utc).trunc_subsecs(6));
            }
        }
    }

    Err(DecodeError::InvalidTimestamp(raw.to_string()))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
