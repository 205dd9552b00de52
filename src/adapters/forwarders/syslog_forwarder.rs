use std::net::UdpSocket;

use crate::core::errors::Result;
use crate::core::models::audit_event::{AuditEvent, Severity};
use crate::core::traits::forwarder::EventForwarder;

/// Syslog facility 10: security/authorization messages.
const FACILITY_AUTHPRIV: u8 = 10;

/// Sends a one-line summary of each event to a syslog collector over UDP.
///
/// Fire-and-forget: a lost datagram is not an error, and delivery is not
/// retried.
pub struct SyslogForwarder {
    host: String,
    port: u16,
    hostname: String,
}

impl SyslogForwarder {
    pub fn new(host: &str, port: u16) -> Self {
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "localhost".to_string());
        Self {
            host: host.to_string(),
            port,
            hostname,
        }
    }

    /// RFC 3164 style message: `<PRI>Mmm dd hh:mm:ss host tag[pid]: text`.
    pub fn format_message(&self, event: &AuditEvent) -> String {
        let pri = u16::from(FACILITY_AUTHPRIV) * 8 + u16::from(severity_code(event.severity));
        let summary = event
            .action
            .as_deref()
            .or(event.description.as_deref())
            .unwrap_or("");
        format!(
            "<{pri}>{} {} nuaa-audit[{}]: NUAA_AUDIT: {} - {summary}",
            event.timestamp.format("%b %e %H:%M:%S"),
            self.hostname,
            std::process::id(),
            event.event_type,
        )
    }
}

/// Map audit severity onto syslog's 0-7 scale.
fn severity_code(severity: Severity) -> u8 {
    match severity {
        Severity::Critical => 2,
        Severity::Error => 3,
        Severity::Warning => 4,
        Severity::Info => 6,
        Severity::Debug => 7,
    }
}

impl EventForwarder for SyslogForwarder {
    fn name(&self) -> &'static str {
        "syslog"
    }

    fn forward(&self, event: &AuditEvent) -> Result<()> {
        let message = self.format_message(event);
        let socket = UdpSocket::bind(("0.0.0.0", 0))?;
        socket.send_to(message.as_bytes(), (self.host.as_str(), self.port))?;
        Ok(())
    }
}
