use std::path::Path;

use crate::cli::{ExportFormat, output};
use crate::config::audit_config::AuditConfig;
use crate::core::errors::Result;
use crate::core::models::audit_query::AuditQuery;
use crate::core::services::export_service;
use crate::core::services::query_service::QueryService;

/// Execute the `nuaa-audit export` command.
///
/// Writes every event of the live log (or of all logs with `--all`),
/// most recent first, to `destination`.
pub fn execute(
    config: &AuditConfig,
    format: ExportFormat,
    destination: &str,
    all: bool,
) -> Result<()> {
    let service = QueryService::new(config);
    let events = if all {
        service.query_all_logs()
    } else {
        service.query(&AuditQuery::new(), None)
    };

    let path = Path::new(destination);
    match format {
        ExportFormat::Json => export_service::export_to_json(&events, path)?,
        ExportFormat::Csv => {
            if events.is_empty() {
                output::warning("No audit events to export; nothing written");
                return Ok(());
            }
            export_service::export_to_csv(&events, path)?
        }
    }

    output::success(&format!("Exported {} events to {}", events.len(), path.display()));
    Ok(())
}
