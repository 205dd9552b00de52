use std::path::Path;

use tracing::debug;

use crate::cli::output;
use crate::config::audit_config::AuditConfig;
use crate::core::errors::{AuditError, Result};
use crate::core::models::integrity_report::IntegrityReport;
use crate::core::services::integrity_service;

/// Execute the `nuaa-audit verify` command.
///
/// Replays the hash chain of the live log (or `--file`, or every log with
/// `--all`). The first violation found is returned as an error so the
/// process exits non-zero.
pub fn execute(config: &AuditConfig, file: Option<&str>, all: bool) -> Result<()> {
    let reports = match file {
        Some(f) => vec![integrity_service::verify_chain(Path::new(f))?],
        None if all => integrity_service::verify_logs(config)?,
        None => vec![integrity_service::verify_chain(&config.log_path())?],
    };

    output::header("nuaa-audit verify");

    for report in &reports {
        if report.path.exists() {
            print_report(&report.path, report);
        } else {
            debug!(path = %report.path.display(), "no log file to verify");
            output::warning(&format!("{} does not exist", report.path.display()));
        }
    }

    match reports
        .into_iter()
        .find_map(|r| r.violation.map(|v| (r.path, v)))
    {
        None => Ok(()),
        Some((path, violation)) => Err(AuditError::IntegrityViolation {
            path,
            line: violation.line,
            detail: violation.kind.to_string(),
        }),
    }
}

fn print_report(path: &Path, report: &IntegrityReport) {
    match &report.violation {
        None => output::success(&format!(
            "{}: {} records, chain intact",
            path.display(),
            report.records_checked
        )),
        Some(v) => output::error(&format!(
            "{}: {} at line {} (after {} valid records)",
            path.display(),
            v.kind,
            v.line,
            report.records_checked
        )),
    }
}
