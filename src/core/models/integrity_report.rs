use std::fmt;
use std::path::PathBuf;

/// Which check failed during chain verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    /// `_prev_checksum` does not point at the preceding record: a record
    /// was deleted, inserted or reordered.
    BrokenChain {
        expected: Option<String>,
        found: Option<String>,
    },
    /// The record's content no longer hashes to its `_checksum`.
    ChecksumMismatch { stored: String, computed: String },
    /// The line is not a JSON object or lacks `_checksum`.
    MalformedRecord { detail: String },
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::BrokenChain { .. } => f.write_str("broken checksum chain"),
            ViolationKind::ChecksumMismatch { .. } => f.write_str("checksum mismatch"),
            ViolationKind::MalformedRecord { detail } => write!(f, "malformed record ({detail})"),
        }
    }
}

/// First integrity problem found in a log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityViolation {
    /// 1-based line number in the file.
    pub line: usize,
    pub kind: ViolationKind,
}

/// Outcome of replaying one log file's hash chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityReport {
    pub path: PathBuf,
    /// Chained records verified before stopping.
    pub records_checked: usize,
    pub violation: Option<IntegrityViolation>,
}

impl IntegrityReport {
    pub fn is_valid(&self) -> bool {
        self.violation.is_none()
    }
}
