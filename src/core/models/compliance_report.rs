use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::models::audit_event::EventType;

/// Most failed actions kept in a report.
pub const MAX_FAILED_ACTIONS: usize = 100;

/// Aggregate view of the audit trail over a reporting period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub report_period: ReportPeriod,
    pub summary: ReportSummary,
    pub event_counts: BTreeMap<String, usize>,
    pub severity_counts: BTreeMap<String, usize>,
    pub user_activity: BTreeMap<String, UserActivity>,
    /// Most recent first, capped at [`MAX_FAILED_ACTIONS`].
    pub failed_actions: Vec<FailedAction>,
    pub compliance_flags: ComplianceFlags,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_events: usize,
    pub unique_users: usize,
    /// Uncapped count, unlike `ComplianceReport::failed_actions`.
    pub failed_actions: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserActivity {
    pub total: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedAction {
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub user: Option<String>,
    pub action: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceFlags {
    pub pii_access_count: usize,
    pub sensitive_operations: usize,
    pub security_events: usize,
}
