//! Tamper-evident, hash-chained audit trail.
//!
//! Events are appended to a JSON Lines log in which every record carries
//! the SHA-256 checksum of its content and of the record before it, so
//! any edit, deletion or reordering is detectable by replaying the chain.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;

pub use crate::adapters::audit::json_audit_logger::JsonAuditLogger;
pub use crate::config::audit_config::AuditConfig;
pub use crate::core::errors::{AuditError, Result};
pub use crate::core::models::audit_event::{AuditEvent, EventStatus, EventType, Severity};
pub use crate::core::models::audit_query::AuditQuery;
pub use crate::core::traits::audit::{AuditLogger, LogOutcome};
