use tracing::error;

use crate::core::errors::Result;
use crate::core::models::audit_event::AuditEvent;

/// What happened to an event handed to a logger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutcome {
    /// Appended to the live log with this checksum.
    Written { checksum: String },
    /// Logging is disabled or the event type is filtered out; nothing was
    /// written.
    Skipped,
}

/// Port for appending events to the audit trail.
pub trait AuditLogger: Send + Sync {
    /// Append an event, reporting exactly what happened.
    fn try_log(&self, event: &AuditEvent) -> Result<LogOutcome>;

    /// Append an event without ever failing the caller.
    ///
    /// Returns `true` only when the event was written. Errors are reported
    /// through `tracing` and swallowed: audit logging must not break the
    /// operation being audited.
    fn log(&self, event: &AuditEvent) -> bool {
        match self.try_log(event) {
            Ok(LogOutcome::Written { .. }) => true,
            Ok(LogOutcome::Skipped) => false,
            Err(e) => {
                error!(
                    event_id = %event.event_id,
                    event_type = %event.event_type,
                    "Failed to write audit log: {e}"
                );
                false
            }
        }
    }
}
