use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde_json::Value;

use crate::core::errors::{AuditError, Result};
use crate::core::models::audit_event::AuditEvent;

/// CSV columns, in the order the event serializes its fields.
pub const CSV_COLUMNS: [&str; 20] = [
    "event_id",
    "timestamp",
    "event_type",
    "severity",
    "user_id",
    "username",
    "session_id",
    "resource_type",
    "resource_id",
    "resource_path",
    "action",
    "description",
    "status",
    "metadata",
    "hostname",
    "ip_address",
    "process_id",
    "is_sensitive",
    "contains_pii",
    "retention_days",
];

/// Write `events` to `output` as a pretty-printed JSON array.
pub fn export_to_json(events: &[AuditEvent], output: &Path) -> Result<()> {
    let file = File::create(output).map_err(|e| export_error(output, e))?;
    let mut writer = BufWriter::new(file);
    write_json(events, &mut writer)?;
    writer.flush().map_err(|e| export_error(output, e))?;
    Ok(())
}

pub fn write_json<W: Write>(events: &[AuditEvent], writer: W) -> Result<()> {
    serde_json::to_writer_pretty(writer, events)?;
    Ok(())
}

/// Write `events` to `output` as CSV, one row per event.
///
/// `metadata` is written as a JSON string. Nothing is written (and no file
/// is created) for an empty list.
pub fn export_to_csv(events: &[AuditEvent], output: &Path) -> Result<()> {
    if events.is_empty() {
        return Ok(());
    }
    let file = File::create(output).map_err(|e| export_error(output, e))?;
    write_csv(events, file).map_err(|e| match e {
        AuditError::Export { detail, .. } => AuditError::Export {
            path: output.to_path_buf(),
            detail,
        },
        other => other,
    })
}

pub fn write_csv<W: Write>(events: &[AuditEvent], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(CSV_COLUMNS).map_err(csv_error)?;

    for event in events {
        let value = serde_json::to_value(event)?;
        let row: Vec<String> = CSV_COLUMNS
            .iter()
            .map(|column| cell(value.get(*column)))
            .collect();
        csv_writer.write_record(&row).map_err(csv_error)?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Flatten one JSON field into a CSV cell.
fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn csv_error(e: csv::Error) -> AuditError {
    AuditError::Export {
        path: Default::default(),
        detail: e.to_string(),
    }
}

fn export_error(path: &Path, e: std::io::Error) -> AuditError {
    AuditError::Export {
        path: path.to_path_buf(),
        detail: e.to_string(),
    }
}
