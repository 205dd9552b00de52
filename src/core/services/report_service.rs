use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::config::audit_config::AuditConfig;
use crate::core::models::audit_event::{AuditEvent, EventStatus};
use crate::core::models::audit_query::AuditQuery;
use crate::core::models::compliance_report::{
    ComplianceFlags, ComplianceReport, FailedAction, MAX_FAILED_ACTIONS, ReportPeriod,
    ReportSummary, UserActivity,
};
use crate::core::services::query_service::QueryService;

/// Builds compliance reports from the audit trail.
pub struct ReportService<'a> {
    config: &'a AuditConfig,
}

impl<'a> ReportService<'a> {
    pub fn new(config: &'a AuditConfig) -> Self {
        Self { config }
    }

    /// Report over every event (live and rotated logs) with a timestamp in
    /// `[start, end]`.
    pub fn generate_compliance_report(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> ComplianceReport {
        let query = AuditQuery::new().between(start, end);
        let events = QueryService::new(self.config).query_all_logs_matching(&query);
        build_report(&events, start, end)
    }
}

/// Aggregate `events` (most recent first) into a report for the period.
pub fn build_report(
    events: &[AuditEvent],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> ComplianceReport {
    let mut event_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut severity_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut user_activity: BTreeMap<String, UserActivity> = BTreeMap::new();
    let mut failed_actions = Vec::new();
    let mut flags = ComplianceFlags::default();

    for event in events {
        *event_counts
            .entry(event.event_type.as_str().to_string())
            .or_default() += 1;
        *severity_counts
            .entry(event.severity.as_str().to_string())
            .or_default() += 1;

        let failed = event.status == EventStatus::Failure;

        if let Some(username) = &event.username {
            let activity = user_activity.entry(username.clone()).or_default();
            activity.total += 1;
            if failed {
                activity.failed += 1;
            }
        }

        if failed {
            failed_actions.push(FailedAction {
                timestamp: event.timestamp,
                event_type: event.event_type,
                user: event.username.clone(),
                action: event.action.clone(),
            });
        }

        if event.contains_pii {
            flags.pii_access_count += 1;
        }
        if event.is_sensitive {
            flags.sensitive_operations += 1;
        }
        if event.is_security_event() {
            flags.security_events += 1;
        }
    }

    let summary = ReportSummary {
        total_events: events.len(),
        unique_users: user_activity.len(),
        failed_actions: failed_actions.len(),
    };
    failed_actions.truncate(MAX_FAILED_ACTIONS);

    ComplianceReport {
        report_period: ReportPeriod { start, end },
        summary,
        event_counts,
        severity_counts,
        user_activity,
        failed_actions,
        compliance_flags: flags,
    }
}
