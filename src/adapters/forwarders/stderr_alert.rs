use std::io::Write;

use tracing::warn;

use crate::core::errors::Result;
use crate::core::models::audit_event::AuditEvent;
use crate::core::traits::forwarder::EventForwarder;

/// Prints `[AUDIT ALERT]` lines to stderr for events that need immediate
/// attention. Other events pass through untouched.
pub struct StderrAlert {
    alert_email: Option<String>,
}

impl StderrAlert {
    pub fn new(alert_email: Option<String>) -> Self {
        Self { alert_email }
    }

    pub fn format_alert(event: &AuditEvent) -> String {
        format!(
            "[AUDIT ALERT] {}: {}",
            event.severity.as_str().to_uppercase(),
            event.event_type
        )
    }
}

impl EventForwarder for StderrAlert {
    fn name(&self) -> &'static str {
        "alert"
    }

    fn forward(&self, event: &AuditEvent) -> Result<()> {
        if !event.requires_immediate_alert() {
            return Ok(());
        }

        writeln!(std::io::stderr().lock(), "{}", Self::format_alert(event))?;

        // Mail delivery is left to whatever consumes the tracing output.
        if let Some(email) = &self.alert_email {
            warn!(
                alert_email = %email,
                event_id = %event.event_id,
                severity = %event.severity,
                event_type = %event.event_type,
                "audit alert raised"
            );
        }
        Ok(())
    }
}
