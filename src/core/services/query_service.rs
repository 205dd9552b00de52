use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, error};

use crate::config::audit_config::AuditConfig;
use crate::core::errors::Result;
use crate::core::models::audit_event::{AuditEvent, EventStatus, EventType};
use crate::core::models::audit_query::AuditQuery;
use crate::core::models::persisted_record::LogHeader;

/// Read-only access to the live and rotated audit logs.
///
/// Reads do not take the writer's lock. A line being appended while a
/// query runs shows up as a malformed final line and is skipped.
pub struct QueryService<'a> {
    config: &'a AuditConfig,
}

impl<'a> QueryService<'a> {
    pub fn new(config: &'a AuditConfig) -> Self {
        Self { config }
    }

    /// Events from one file (the live log by default) that match `query`,
    /// sorted and paginated.
    ///
    /// A missing file yields no events; read errors are logged and yield
    /// no events.
    pub fn query(&self, query: &AuditQuery, log_file: Option<&Path>) -> Vec<AuditEvent> {
        let live = self.config.log_path();
        let path = log_file.unwrap_or(&live);
        match read_matching(path, query) {
            Ok(events) => query.paginate(events),
            Err(e) => {
                error!(path = %path.display(), "Error querying audit logs: {e}");
                Vec::new()
            }
        }
    }

    /// Every event in the live log and all rotated logs, most recent first.
    pub fn query_all_logs(&self) -> Vec<AuditEvent> {
        self.query_all_logs_matching(&AuditQuery::new())
    }

    /// Apply `query` across the live log and all rotated logs, then sort
    /// and paginate the union.
    pub fn query_all_logs_matching(&self, query: &AuditQuery) -> Vec<AuditEvent> {
        // Oldest file first, so the union is in log order.
        let mut paths = self.config.existing_rotated_paths();
        paths.reverse();
        paths.push(self.config.log_path());

        let mut events = Vec::new();
        for path in &paths {
            match read_matching(path, query) {
                Ok(found) => events.extend(found),
                Err(e) => error!(path = %path.display(), "Error querying audit logs: {e}"),
            }
        }
        query.paginate(events)
    }

    pub fn events_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<AuditEvent> {
        self.query(&AuditQuery::new().between(start, end), None)
    }

    pub fn events_by_user(&self, username: &str) -> Vec<AuditEvent> {
        self.query(&AuditQuery::new().username(username), None)
    }

    pub fn security_events(&self) -> Vec<AuditEvent> {
        let query = AuditQuery::new().event_types([
            EventType::AuthSuccess,
            EventType::AuthFailure,
            EventType::AuthDenied,
            EventType::PermissionDenied,
        ]);
        self.query(&query, None)
    }

    pub fn failed_events(&self) -> Vec<AuditEvent> {
        self.query(&AuditQuery::new().status(EventStatus::Failure), None)
    }

    pub fn events_with_pii(&self) -> Vec<AuditEvent> {
        self.query(&AuditQuery::new().contains_pii(true), None)
    }
}

/// Stream `path`, keeping events that match `query` in file order.
fn read_matching(path: &Path, query: &AuditQuery) -> Result<Vec<AuditEvent>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let reader = BufReader::new(File::open(path)?);
    let mut events = Vec::new();

    for (line_num, raw) in reader.split(b'\n').enumerate() {
        let raw = raw?;
        if raw.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let Some(event) = parse_event(&raw) else {
            debug!(
                path = %path.display(),
                line = line_num + 1,
                "skipping malformed audit record"
            );
            continue;
        };

        if query.matches(&event) {
            events.push(event);
        }
    }

    Ok(events)
}

/// Parse one log line into an event. Headers and anything that does not
/// deserialize yield `None`. The chain fields are ignored.
fn parse_event(raw: &[u8]) -> Option<AuditEvent> {
    let value: Value = serde_json::from_slice(raw).ok()?;
    if LogHeader::is_header(&value) {
        return None;
    }
    serde_json::from_value(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::audit::json_audit_logger::JsonAuditLogger;
    use crate::core::traits::audit::AuditLogger;
    use std::io::Write;
    use tempfile::TempDir;

    fn setup() -> (TempDir, AuditConfig) {
        let tmp = TempDir::new().unwrap();
        let config = AuditConfig {
            alert_on_critical: false,
            ..AuditConfig::in_dir(tmp.path())
        };
        (tmp, config)
    }

    #[test]
    fn query_nonexistent_file_returns_empty() {
        let config = AuditConfig::in_dir("/nonexistent");
        let service = QueryService::new(&config);
        assert!(service.query(&AuditQuery::new(), None).is_empty());
    }

    #[test]
    fn header_is_not_an_event() {
        let (_tmp, config) = setup();
        let _logger = JsonAuditLogger::new(config.clone()).unwrap();
        let service = QueryService::new(&config);
        assert!(service.query_all_logs().is_empty());
    }

    #[test]
    fn filter_by_type_returns_most_recent_first() {
        let (_tmp, config) = setup();
        let logger = JsonAuditLogger::new(config.clone()).unwrap();

        let first = AuditEvent::new(EventType::DocumentCreated);
        let second = AuditEvent::new(EventType::DocumentCreated);
        logger.log(&first);
        logger.log(&second);
        logger.log(&AuditEvent::new(EventType::DocumentDeleted));

        let service = QueryService::new(&config);
        let results = service.query(
            &AuditQuery::new().event_types([EventType::DocumentCreated]),
            None,
        );
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].event_id, second.event_id);
        assert_eq!(results[1].event_id, first.event_id);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let (_tmp, config) = setup();
        let logger = JsonAuditLogger::new(config.clone()).unwrap();
        logger.log(&AuditEvent::new(EventType::UserLogin));

        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(config.log_path())
            .unwrap();
        writeln!(file, "{{not json").unwrap();
        write!(file, "{{\"event_id\": \"trunc").unwrap();

        let service = QueryService::new(&config);
        assert_eq!(service.query(&AuditQuery::new(), None).len(), 1);
    }

    #[test]
    fn limit_and_offset() {
        let (_tmp, config) = setup();
        let logger = JsonAuditLogger::new(config.clone()).unwrap();
        for _ in 0..10 {
            logger.log(&AuditEvent::new(EventType::UserAction));
        }

        let service = QueryService::new(&config);
        let page = service.query(&AuditQuery::new().offset(8).limit(5), None);
        assert_eq!(page.len(), 2);
        assert_eq!(service.query(&AuditQuery::new().limit(3), None).len(), 3);
    }

    #[test]
    fn convenience_queries() {
        let (_tmp, config) = setup();
        let logger = JsonAuditLogger::new(config.clone()).unwrap();

        logger.log(&AuditEvent::new(EventType::AuthFailure).with_status(EventStatus::Failure));
        logger.log(&AuditEvent::new(EventType::DocumentRead).with_username("alice"));
        logger.log(&AuditEvent::new(EventType::PiiAccessed).with_pii());

        let service = QueryService::new(&config);
        assert_eq!(service.security_events().len(), 1);
        assert_eq!(service.failed_events().len(), 1);
        assert_eq!(service.events_with_pii().len(), 1);
        assert_eq!(service.events_by_user("alice").len(), 1);

        let now = Utc::now();
        let all = service.events_by_date_range(now - chrono::Duration::hours(1), now);
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn query_all_logs_spans_rotated_files() {
        let (_tmp, mut config) = setup();
        config.max_file_size = 1;
        config.max_files = 5;
        let logger = JsonAuditLogger::new(config.clone()).unwrap();

        for _ in 0..4 {
            assert!(logger.log(&AuditEvent::new(EventType::UserAction)));
        }

        let service = QueryService::new(&config);
        assert_eq!(service.query(&AuditQuery::new(), None).len(), 1);

        let all = service.query_all_logs();
        assert_eq!(all.len(), 4);
        assert!(all.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
    }
}
