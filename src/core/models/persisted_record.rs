use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::core::errors::Result;
use crate::core::models::audit_event::AuditEvent;

/// Field holding the digest of a record's own canonical content.
pub const CHECKSUM_FIELD: &str = "_checksum";
/// Field holding the digest of the preceding record in the same file.
pub const PREV_CHECKSUM_FIELD: &str = "_prev_checksum";
/// Value of `type` that marks the first line of every log file.
pub const HEADER_TYPE: &str = "audit_log_header";
/// Version written into new log headers.
pub const LOG_FORMAT_VERSION: &str = "1.0";

/// An event as it sits on disk: the event fields flattened next to the
/// two chain fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedRecord {
    #[serde(flatten)]
    pub event: AuditEvent,
    #[serde(rename = "_checksum")]
    pub checksum: String,
    #[serde(rename = "_prev_checksum")]
    pub prev_checksum: Option<String>,
}

impl PersistedRecord {
    /// Seal an event into a record linked to `prev_checksum`.
    pub fn seal(event: AuditEvent, prev_checksum: Option<String>) -> Result<Self> {
        let checksum = event_checksum(&event)?;
        Ok(Self {
            event,
            checksum,
            prev_checksum,
        })
    }
}

/// The single unchained line that opens every log file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogHeader {
    #[serde(rename = "type")]
    pub kind: String,
    pub version: String,
    pub created: DateTime<Utc>,
    pub description: String,
    pub format: String,
}

impl LogHeader {
    pub fn new() -> Self {
        Self {
            kind: HEADER_TYPE.to_string(),
            version: LOG_FORMAT_VERSION.to_string(),
            created: Utc::now(),
            description: "NUAA CLI Audit Log".to_string(),
            format: "JSON Lines (JSONL)".to_string(),
        }
    }

    /// Whether a parsed log line is a header rather than an event.
    pub fn is_header(value: &Value) -> bool {
        value.get("type").and_then(Value::as_str) == Some(HEADER_TYPE)
    }
}

impl Default for LogHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute the SHA256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Digest of a JSON value serialized with object keys in sorted order.
///
/// `serde_json::Map` is ordered by key, so going through `Value` gives a
/// stable byte form regardless of struct field order.
pub fn canonical_checksum(value: &Value) -> Result<String> {
    let bytes = serde_json::to_vec(value)?;
    Ok(sha256_hex(&bytes))
}

/// Digest of an event's canonical form, as stored in `_checksum`.
pub fn event_checksum(event: &AuditEvent) -> Result<String> {
    canonical_checksum(&serde_json::to_value(event)?)
}
