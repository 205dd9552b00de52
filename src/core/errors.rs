use std::path::PathBuf;

/// All domain errors for the audit trail.
///
/// Each variant provides enough context to diagnose the issue
/// without needing a debugger.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error(
        "Invalid configuration: {detail}\n\n  \
         Check the [audit] table of your config file and the NUAA_AUDIT_* \
         environment variables.\n  \
         Run 'nuaa-audit config' to see the effective configuration."
    )]
    InvalidConfig { detail: String },

    #[error(
        "Unknown event type: '{value}'\n\n  \
         Event types are written as <category>.<name>, e.g. document.created,\n  \
         auth.failure or compliance.pii_accessed."
    )]
    InvalidEventType { value: String },

    #[error("Invalid query: {detail}")]
    InvalidQuery { detail: String },

    #[error("Failed to serialize audit record: {detail}")]
    Serialization { detail: String },

    #[error(
        "Log rotation failed: {detail}\n\n  \
         The live log was left in place; rotation is retried on the next write.\n  \
         Inspect the rotated files in the audit directory before retrying."
    )]
    Rotation { detail: String },

    #[error("Export to {path} failed: {detail}")]
    Export { path: PathBuf, detail: String },

    #[error(
        "Integrity violation in {path} at line {line}: {detail}\n\n  \
         The audit log has been modified or truncated outside the logger.\n  \
         Preserve the file as evidence before taking any other action."
    )]
    IntegrityViolation {
        path: PathBuf,
        line: usize,
        detail: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for AuditError {
    fn from(e: serde_json::Error) -> Self {
        AuditError::Serialization {
            detail: e.to_string(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AuditError>;
