use std::collections::HashSet;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::core::errors::{AuditError, Result};
use crate::core::models::audit_event::{AuditEvent, EventStatus, EventType, Severity};

/// Search criteria for reading the audit log.
///
/// Every clause is optional; an empty query matches every event. Results
/// are sorted by timestamp (most recent first unless `sort_desc` is
/// cleared), then `offset` and `limit` are applied.
#[derive(Debug, Clone)]
pub struct AuditQuery {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub event_types: Option<HashSet<EventType>>,
    pub severities: Option<HashSet<Severity>>,
    pub username: Option<String>,
    resource_glob: Option<ResourceGlob>,
    pub action: Option<String>,
    pub status: Option<EventStatus>,
    pub contains_pii: Option<bool>,
    pub is_sensitive: Option<bool>,
    pub limit: Option<usize>,
    pub offset: usize,
    pub sort_desc: bool,
}

/// A `*` wildcard pattern compiled once per query.
#[derive(Debug, Clone)]
struct ResourceGlob {
    pattern: String,
    regex: Regex,
}

impl ResourceGlob {
    /// `*` matches any run of characters; everything else is literal.
    /// Like the rest of the query, the match is anchored at the start only.
    fn compile(pattern: &str) -> Result<Self> {
        let translated = pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        let regex = Regex::new(&format!("^{translated}")).map_err(|e| AuditError::InvalidQuery {
            detail: format!("invalid resource path pattern '{pattern}': {e}"),
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }
}

impl Default for AuditQuery {
    fn default() -> Self {
        Self {
            start_time: None,
            end_time: None,
            event_types: None,
            severities: None,
            username: None,
            resource_glob: None,
            action: None,
            status: None,
            contains_pii: None,
            is_sensitive: None,
            limit: None,
            offset: 0,
            sort_desc: true,
        }
    }
}

impl AuditQuery {
    /// A query that matches everything, most recent first.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn since(mut self, start: DateTime<Utc>) -> Self {
        self.start_time = Some(start);
        self
    }

    pub fn until(mut self, end: DateTime<Utc>) -> Self {
        self.end_time = Some(end);
        self
    }

    pub fn between(self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.since(start).until(end)
    }

    pub fn event_types(mut self, types: impl IntoIterator<Item = EventType>) -> Self {
        self.event_types = Some(types.into_iter().collect());
        self
    }

    pub fn severities(mut self, severities: impl IntoIterator<Item = Severity>) -> Self {
        self.severities = Some(severities.into_iter().collect());
        self
    }

    pub fn username(mut self, username: &str) -> Self {
        self.username = Some(username.to_string());
        self
    }

    /// Restrict to resources whose path matches `pattern` (`*` wildcards).
    pub fn resource_path(mut self, pattern: &str) -> Result<Self> {
        self.resource_glob = Some(ResourceGlob::compile(pattern)?);
        Ok(self)
    }

    /// The resource path pattern, if one was set.
    pub fn resource_pattern(&self) -> Option<&str> {
        self.resource_glob.as_ref().map(|g| g.pattern.as_str())
    }

    pub fn action(mut self, action: &str) -> Self {
        self.action = Some(action.to_string());
        self
    }

    pub fn status(mut self, status: EventStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn contains_pii(mut self, flag: bool) -> Self {
        self.contains_pii = Some(flag);
        self
    }

    pub fn is_sensitive(mut self, flag: bool) -> Self {
        self.is_sensitive = Some(flag);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn ascending(mut self) -> Self {
        self.sort_desc = false;
        self
    }

    /// Check an event against every clause, stopping at the first miss.
    ///
    /// Clause order: time range, event types, severities, username,
    /// resource path, action, status, PII flag, sensitivity flag.
    /// An event with no resource path is not excluded by the path clause.
    pub fn matches(&self, event: &AuditEvent) -> bool {
        if let Some(start) = self.start_time
            && event.timestamp < start
        {
            return false;
        }
        if let Some(end) = self.end_time
            && event.timestamp > end
        {
            return false;
        }

        if let Some(types) = &self.event_types
            && !types.is_empty()
            && !types.contains(&event.event_type)
        {
            return false;
        }

        if let Some(severities) = &self.severities
            && !severities.is_empty()
            && !severities.contains(&event.severity)
        {
            return false;
        }

        if let Some(username) = &self.username
            && event.username.as_deref() != Some(username.as_str())
        {
            return false;
        }

        if let (Some(glob), Some(path)) = (&self.resource_glob, &event.resource_path)
            && !glob.regex.is_match(path)
        {
            return false;
        }

        if let Some(action) = &self.action
            && event.action.as_deref() != Some(action.as_str())
        {
            return false;
        }

        if let Some(status) = self.status
            && event.status != status
        {
            return false;
        }

        if let Some(pii) = self.contains_pii
            && event.contains_pii != pii
        {
            return false;
        }

        if let Some(sensitive) = self.is_sensitive
            && event.is_sensitive != sensitive
        {
            return false;
        }

        true
    }

    /// Sort by timestamp and apply `offset`, then `limit`. A limit of 0
    /// means no limit.
    ///
    /// `events` is expected in log order; equal timestamps keep that order
    /// (ascending) or its reverse (descending).
    pub fn paginate(&self, mut events: Vec<AuditEvent>) -> Vec<AuditEvent> {
        if self.sort_desc {
            events.reverse();
            events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        } else {
            events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        }

        events
            .into_iter()
            .skip(self.offset)
            .take(self.limit.filter(|&n| n > 0).unwrap_or(usize::MAX))
            .collect()
    }
}
