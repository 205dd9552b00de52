use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde_json::Value;

use crate::config::audit_config::AuditConfig;
use crate::core::errors::Result;
use crate::core::models::integrity_report::{IntegrityReport, IntegrityViolation, ViolationKind};
use crate::core::models::persisted_record::{
    CHECKSUM_FIELD, LogHeader, PREV_CHECKSUM_FIELD, canonical_checksum,
};

/// Replay the hash chain of one log file.
///
/// The header line is skipped. For every other record, `_prev_checksum`
/// must equal the previous record's `_checksum` (null for the first one),
/// and the record minus its two chain fields must hash to `_checksum`.
/// Verification stops at the first violation. A missing or empty file is
/// valid.
pub fn verify_chain(path: &Path) -> Result<IntegrityReport> {
    let mut report = IntegrityReport {
        path: path.to_path_buf(),
        records_checked: 0,
        violation: None,
    };

    if !path.exists() {
        return Ok(report);
    }

    let reader = BufReader::new(File::open(path)?);
    let mut prev_checksum: Option<String> = None;

    for (idx, raw) in reader.split(b'\n').enumerate() {
        let raw = raw?;
        let line = idx + 1;

        if raw.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        match check_record(&raw, prev_checksum.as_deref()) {
            Ok(RecordCheck::Header) => continue,
            Ok(RecordCheck::Chained(checksum)) => {
                prev_checksum = Some(checksum);
                report.records_checked += 1;
            }
            Err(kind) => {
                report.violation = Some(IntegrityViolation { line, kind });
                break;
            }
        }
    }

    Ok(report)
}

/// Replay the live log and every rotated log that exists, live first,
/// then newest rotation to oldest.
pub fn verify_logs(config: &AuditConfig) -> Result<Vec<IntegrityReport>> {
    let mut reports = vec![verify_chain(&config.log_path())?];
    for path in config.existing_rotated_paths() {
        reports.push(verify_chain(&path)?);
    }
    Ok(reports)
}

enum RecordCheck {
    Header,
    Chained(String),
}

fn check_record(
    raw: &[u8],
    expected_prev: Option<&str>,
) -> std::result::Result<RecordCheck, ViolationKind> {
    let value: Value = serde_json::from_slice(raw).map_err(|e| ViolationKind::MalformedRecord {
        detail: format!("invalid JSON: {e}"),
    })?;

    if LogHeader::is_header(&value) {
        return Ok(RecordCheck::Header);
    }

    let Value::Object(mut fields) = value else {
        return Err(ViolationKind::MalformedRecord {
            detail: "not a JSON object".into(),
        });
    };

    let stored = match fields.remove(CHECKSUM_FIELD) {
        Some(Value::String(s)) => s,
        _ => {
            return Err(ViolationKind::MalformedRecord {
                detail: format!("missing {CHECKSUM_FIELD}"),
            });
        }
    };

    let stored_prev = match fields.remove(PREV_CHECKSUM_FIELD) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(_) => {
            return Err(ViolationKind::MalformedRecord {
                detail: format!("{PREV_CHECKSUM_FIELD} is not a string"),
            });
        }
    };

    if stored_prev.as_deref() != expected_prev {
        return Err(ViolationKind::BrokenChain {
            expected: expected_prev.map(str::to_string),
            found: stored_prev,
        });
    }

    let computed = canonical_checksum(&Value::Object(fields)).map_err(|e| {
        ViolationKind::MalformedRecord {
            detail: e.to_string(),
        }
    })?;
    if computed != stored {
        return Err(ViolationKind::ChecksumMismatch { stored, computed });
    }

    Ok(RecordCheck::Chained(stored))
}
