use serde_json::Value;

use crate::adapters::audit::json_audit_logger::JsonAuditLogger;
use crate::cli::RecordArgs;
use crate::cli::output;
use crate::config::audit_config::AuditConfig;
use crate::core::errors::{AuditError, Result};
use crate::core::models::audit_event::{
    AuditEvent, EventStatus, EventType, Severity, os_username,
};
use crate::core::traits::audit::{AuditLogger, LogOutcome};

/// Execute the `nuaa-audit record` command.
///
/// Builds one event from the arguments and appends it to the live log.
pub fn execute(config: &AuditConfig, args: &RecordArgs) -> Result<()> {
    let event = build_event(args)?;
    let logger = JsonAuditLogger::new(config.clone())?;

    match logger.try_log(&event)? {
        LogOutcome::Written { checksum } => {
            output::success(&format!("Recorded {} ({})", event.event_type, event.event_id));
            output::detail("checksum", &checksum);
            output::detail("log", &logger.log_path().display().to_string());
        }
        LogOutcome::Skipped => {
            output::warning(&format!(
                "{} not recorded: audit logging is disabled or the type is filtered",
                event.event_type
            ));
        }
    }

    Ok(())
}

fn build_event(args: &RecordArgs) -> Result<AuditEvent> {
    let event_type: EventType = args.event_type.parse()?;
    let severity: Severity = args.severity.parse()?;
    let status: EventStatus = args.status.parse()?;

    let mut event = AuditEvent::new(event_type)
        .with_local_provenance()
        .with_severity(severity)
        .with_status(status);

    if let Some(user) = args.user.clone().or_else(os_username) {
        event = event.with_username(&user);
    }
    if let Some(action) = &args.action {
        event = event.with_action(action);
    }
    if let Some(resource) = &args.resource {
        event = event.with_resource(&args.resource_type, resource);
    }
    if let Some(description) = &args.description {
        event = event.with_description(description);
    }
    for pair in &args.meta {
        let (key, value) = parse_meta(pair)?;
        event = event.with_metadata(key, value);
    }
    if args.pii {
        event = event.with_pii();
    }
    if args.sensitive {
        event = event.with_sensitive();
    }

    Ok(event)
}

/// Split `key=value`. Values that parse as JSON (numbers, booleans,
/// arrays...) keep their type; anything else is stored as a string.
fn parse_meta(pair: &str) -> Result<(&str, Value)> {
    let (key, raw) = pair
        .split_once('=')
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| AuditError::InvalidQuery {
            detail: format!("metadata must be key=value, got '{pair}'"),
        })?;
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key, value))
}
