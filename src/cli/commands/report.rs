use chrono::{Duration, Utc};

use crate::cli::commands::dates::{parse_since, parse_until};
use crate::config::audit_config::AuditConfig;
use crate::core::errors::{AuditError, Result};
use crate::core::services::report_service::ReportService;

/// Period covered when `--since` is omitted.
const DEFAULT_REPORT_DAYS: i64 = 30;

/// Execute the `nuaa-audit report` command.
///
/// Prints a compliance report over the live and rotated logs as pretty
/// JSON. Defaults to the last 30 days.
pub fn execute(config: &AuditConfig, since: Option<&str>, until: Option<&str>) -> Result<()> {
    let end = until.map(parse_until).transpose()?.unwrap_or_else(Utc::now);
    let start = since
        .map(parse_since)
        .transpose()?
        .unwrap_or_else(|| end - Duration::days(DEFAULT_REPORT_DAYS));

    if start > end {
        return Err(AuditError::InvalidQuery {
            detail: format!("report period starts after it ends ({start} > {end})"),
        });
    }

    let report = ReportService::new(config).generate_compliance_report(start, end);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
