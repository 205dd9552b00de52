use crate::core::errors::Result;
use crate::core::models::audit_event::AuditEvent;

/// Best-effort side channel that sees every event after it is persisted.
///
/// Failures are logged by the caller and never affect the write itself.
pub trait EventForwarder: Send + Sync {
    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;

    fn forward(&self, event: &AuditEvent) -> Result<()>;
}
