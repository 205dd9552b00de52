use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::core::errors::AuditError;

/// Kinds of occurrence that get recorded in the audit trail.
///
/// Each variant serializes to a `<category>.<name>` string, which is the
/// form written to disk and accepted on the command line.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum EventType {
    // Document operations
    #[serde(rename = "document.created")]
    DocumentCreated,
    #[serde(rename = "document.read")]
    DocumentRead,
    #[serde(rename = "document.updated")]
    DocumentUpdated,
    #[serde(rename = "document.deleted")]
    DocumentDeleted,
    #[serde(rename = "document.exported")]
    DocumentExported,
    #[serde(rename = "document.imported")]
    DocumentImported,
    #[serde(rename = "document.validated")]
    DocumentValidated,

    // Template operations
    #[serde(rename = "template.accessed")]
    TemplateAccessed,
    #[serde(rename = "template.modified")]
    TemplateModified,
    #[serde(rename = "template.downloaded")]
    TemplateDownloaded,

    // Configuration operations
    #[serde(rename = "config.changed")]
    ConfigChanged,
    #[serde(rename = "config.read")]
    ConfigRead,

    // User operations
    #[serde(rename = "user.login")]
    UserLogin,
    #[serde(rename = "user.logout")]
    UserLogout,
    #[serde(rename = "user.action")]
    #[default]
    UserAction,

    // System operations
    #[serde(rename = "system.start")]
    SystemStart,
    #[serde(rename = "system.stop")]
    SystemStop,
    #[serde(rename = "system.error")]
    SystemError,

    // Agent operations
    #[serde(rename = "agent.registered")]
    AgentRegistered,
    #[serde(rename = "agent.invoked")]
    AgentInvoked,
    #[serde(rename = "agent.error")]
    AgentError,

    // MCP tool operations
    #[serde(rename = "mcp.tool_registered")]
    McpToolRegistered,
    #[serde(rename = "mcp.tool_invoked")]
    McpToolInvoked,

    // Data operations
    #[serde(rename = "data.export")]
    DataExport,
    #[serde(rename = "data.import")]
    DataImport,
    #[serde(rename = "data.backup")]
    DataBackup,
    #[serde(rename = "data.restore")]
    DataRestore,

    // Security events
    #[serde(rename = "auth.success")]
    AuthSuccess,
    #[serde(rename = "auth.failure")]
    AuthFailure,
    #[serde(rename = "auth.denied")]
    AuthDenied,
    #[serde(rename = "permission.denied")]
    PermissionDenied,

    // Compliance events
    #[serde(rename = "compliance.pii_accessed")]
    PiiAccessed,
    #[serde(rename = "compliance.sensitive_exported")]
    SensitiveDataExported,
    #[serde(rename = "compliance.audit_accessed")]
    AuditLogAccessed,
}

impl EventType {
    /// Every event type, in declaration order.
    pub const ALL: [EventType; 34] = [
        EventType::DocumentCreated,
        EventType::DocumentRead,
        EventType::DocumentUpdated,
        EventType::DocumentDeleted,
        EventType::DocumentExported,
        EventType::DocumentImported,
        EventType::DocumentValidated,
        EventType::TemplateAccessed,
        EventType::TemplateModified,
        EventType::TemplateDownloaded,
        EventType::ConfigChanged,
        EventType::ConfigRead,
        EventType::UserLogin,
        EventType::UserLogout,
        EventType::UserAction,
        EventType::SystemStart,
        EventType::SystemStop,
        EventType::SystemError,
        EventType::AgentRegistered,
        EventType::AgentInvoked,
        EventType::AgentError,
        EventType::McpToolRegistered,
        EventType::McpToolInvoked,
        EventType::DataExport,
        EventType::DataImport,
        EventType::DataBackup,
        EventType::DataRestore,
        EventType::AuthSuccess,
        EventType::AuthFailure,
        EventType::AuthDenied,
        EventType::PermissionDenied,
        EventType::PiiAccessed,
        EventType::SensitiveDataExported,
        EventType::AuditLogAccessed,
    ];

    /// The canonical on-disk string, e.g. `"auth.failure"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::DocumentCreated => "document.created",
            EventType::DocumentRead => "document.read",
            EventType::DocumentUpdated => "document.updated",
            EventType::DocumentDeleted => "document.deleted",
            EventType::DocumentExported => "document.exported",
            EventType::DocumentImported => "document.imported",
            EventType::DocumentValidated => "document.validated",
            EventType::TemplateAccessed => "template.accessed",
            EventType::TemplateModified => "template.modified",
            EventType::TemplateDownloaded => "template.downloaded",
            EventType::ConfigChanged => "config.changed",
            EventType::ConfigRead => "config.read",
            EventType::UserLogin => "user.login",
            EventType::UserLogout => "user.logout",
            EventType::UserAction => "user.action",
            EventType::SystemStart => "system.start",
            EventType::SystemStop => "system.stop",
            EventType::SystemError => "system.error",
            EventType::AgentRegistered => "agent.registered",
            EventType::AgentInvoked => "agent.invoked",
            EventType::AgentError => "agent.error",
            EventType::McpToolRegistered => "mcp.tool_registered",
            EventType::McpToolInvoked => "mcp.tool_invoked",
            EventType::DataExport => "data.export",
            EventType::DataImport => "data.import",
            EventType::DataBackup => "data.backup",
            EventType::DataRestore => "data.restore",
            EventType::AuthSuccess => "auth.success",
            EventType::AuthFailure => "auth.failure",
            EventType::AuthDenied => "auth.denied",
            EventType::PermissionDenied => "permission.denied",
            EventType::PiiAccessed => "compliance.pii_accessed",
            EventType::SensitiveDataExported => "compliance.sensitive_exported",
            EventType::AuditLogAccessed => "compliance.audit_accessed",
        }
    }

    /// The category prefix, e.g. `"document"` for `document.created`.
    pub fn category(&self) -> &'static str {
        let s = self.as_str();
        s.split_once('.').map(|(c, _)| c).unwrap_or(s)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        EventType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| AuditError::InvalidEventType {
                value: s.to_string(),
            })
    }
}

/// Severity levels, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "debug" => Ok(Severity::Debug),
            "info" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "critical" => Ok(Severity::Critical),
            other => Err(AuditError::InvalidQuery {
                detail: format!(
                    "unknown severity '{other}' (expected debug, info, warning, error or critical)"
                ),
            }),
        }
    }
}

/// Outcome of the audited action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Success,
    Failure,
    Error,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Success => "success",
            EventStatus::Failure => "failure",
            EventStatus::Error => "error",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventStatus {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "success" => Ok(EventStatus::Success),
            "failure" => Ok(EventStatus::Failure),
            "error" => Ok(EventStatus::Error),
            other => Err(AuditError::InvalidQuery {
                detail: format!("unknown status '{other}' (expected success, failure or error)"),
            }),
        }
    }
}

/// Default retention period for a single event, in days.
pub const DEFAULT_RETENTION_DAYS: u32 = 365;

fn default_retention_days() -> u32 {
    DEFAULT_RETENTION_DAYS
}

/// A single auditable occurrence (one line of the JSONL log).
///
/// `event_id` and `timestamp` are fixed when the event is constructed.
/// The logger works on its own copy, so handing an event to it never
/// changes the caller's value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    #[serde(default)]
    pub severity: Severity,

    // Actor
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,

    // Target
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub resource_path: Option<String>,

    // Narrative
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: EventStatus,

    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,

    // Provenance
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub process_id: Option<u32>,

    // Compliance flags
    #[serde(default)]
    pub is_sensitive: bool,
    #[serde(default)]
    pub contains_pii: bool,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl AuditEvent {
    /// Create an event of the given type with a fresh id and the current time.
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event_type,
            severity: Severity::default(),
            user_id: None,
            username: None,
            session_id: None,
            resource_type: None,
            resource_id: None,
            resource_path: None,
            action: None,
            description: None,
            status: EventStatus::default(),
            metadata: BTreeMap::new(),
            hostname: None,
            ip_address: None,
            process_id: None,
            is_sensitive: false,
            contains_pii: false,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }

    /// Event about a document: resource type `document`, caller's user
    /// (or the OS user), host and pid filled in.
    pub fn document(
        event_type: EventType,
        document_path: &str,
        action: &str,
        user: Option<&str>,
    ) -> Self {
        Self {
            resource_type: Some("document".to_string()),
            resource_path: Some(document_path.to_string()),
            action: Some(action.to_string()),
            username: user.map(str::to_string).or_else(os_username),
            ..Self::new(event_type).with_local_provenance()
        }
    }

    /// Event raised by the system itself.
    pub fn system(event_type: EventType, description: &str, severity: Severity) -> Self {
        Self {
            severity,
            description: Some(description.to_string()),
            ..Self::new(event_type).with_local_provenance()
        }
    }

    /// Authentication or authorization event.
    pub fn security(
        event_type: EventType,
        action: &str,
        status: EventStatus,
        user: Option<&str>,
        severity: Severity,
    ) -> Self {
        Self {
            severity,
            status,
            action: Some(action.to_string()),
            username: user.map(str::to_string).or_else(os_username),
            ..Self::new(event_type).with_local_provenance()
        }
    }

    /// Fill `hostname` and `process_id` from the running process.
    pub fn with_local_provenance(mut self) -> Self {
        self.hostname = hostname::get()
            .ok()
            .map(|h| h.to_string_lossy().into_owned());
        self.process_id = Some(std::process::id());
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_user(mut self, user_id: Option<&str>, username: &str) -> Self {
        self.user_id = user_id.map(str::to_string);
        self.username = Some(username.to_string());
        self
    }

    pub fn with_username(mut self, username: &str) -> Self {
        self.username = Some(username.to_string());
        self
    }

    pub fn with_session(mut self, session_id: &str) -> Self {
        self.session_id = Some(session_id.to_string());
        self
    }

    pub fn with_resource(mut self, resource_type: &str, resource_path: &str) -> Self {
        self.resource_type = Some(resource_type.to_string());
        self.resource_path = Some(resource_path.to_string());
        self
    }

    pub fn with_resource_id(mut self, resource_id: &str) -> Self {
        self.resource_id = Some(resource_id.to_string());
        self
    }

    pub fn with_action(mut self, action: &str) -> Self {
        self.action = Some(action.to_string());
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_status(mut self, status: EventStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn with_ip_address(mut self, ip: &str) -> Self {
        self.ip_address = Some(ip.to_string());
        self
    }

    /// Mark the event as carrying personally identifiable information.
    pub fn with_pii(mut self) -> Self {
        self.contains_pii = true;
        self
    }

    pub fn with_sensitive(mut self) -> Self {
        self.is_sensitive = true;
        self
    }

    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    /// Authentication and authorization outcomes.
    pub fn is_security_event(&self) -> bool {
        matches!(
            self.event_type,
            EventType::AuthSuccess
                | EventType::AuthFailure
                | EventType::AuthDenied
                | EventType::PermissionDenied
        )
    }

    /// Compliance category, or any event flagged as PII or sensitive.
    pub fn is_compliance_event(&self) -> bool {
        self.event_type.category() == "compliance" || self.contains_pii || self.is_sensitive
    }

    /// Error and critical events always alert; a handful of security-relevant
    /// types already alert at warning level.
    pub fn requires_immediate_alert(&self) -> bool {
        matches!(self.severity, Severity::Error | Severity::Critical)
            || (matches!(
                self.event_type,
                EventType::AuthFailure | EventType::PermissionDenied | EventType::SystemError
            ) && self.severity == Severity::Warning)
    }
}

/// Login name of the current OS user, if the environment exposes one.
pub fn os_username() -> Option<String> {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .filter(|u| !u.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_event_has_defaults() {
        let event = AuditEvent::new(EventType::DocumentCreated);
        assert_eq!(event.severity, Severity::Info);
        assert_eq!(event.status, EventStatus::Success);
        assert_eq!(event.retention_days, 365);
        assert!(event.metadata.is_empty());
        assert!(!event.contains_pii);
        assert!(!event.is_sensitive);
    }

    #[test]
    fn event_ids_are_unique() {
        let a = AuditEvent::new(EventType::UserAction);
        let b = AuditEvent::new(EventType::UserAction);
        assert_ne!(a.event_id, b.event_id);
    }

    #[test]
    fn event_type_serializes_to_dotted_string() {
        let json = serde_json::to_string(&EventType::McpToolInvoked).unwrap();
        assert_eq!(json, "\"mcp.tool_invoked\"");

        let parsed: EventType = serde_json::from_str("\"compliance.pii_accessed\"").unwrap();
        assert_eq!(parsed, EventType::PiiAccessed);
    }

    #[test]
    fn as_str_matches_serde_for_every_variant() {
        for t in EventType::ALL {
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.as_str()));
            assert_eq!(t.as_str().parse::<EventType>().unwrap(), t);
        }
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        assert!("document.shredded".parse::<EventType>().is_err());
    }

    #[test]
    fn category_is_prefix() {
        assert_eq!(EventType::DocumentCreated.category(), "document");
        assert_eq!(EventType::PermissionDenied.category(), "permission");
        assert_eq!(EventType::AuditLogAccessed.category(), "compliance");
    }

    #[test]
    fn security_events() {
        assert!(AuditEvent::new(EventType::AuthFailure).is_security_event());
        assert!(AuditEvent::new(EventType::PermissionDenied).is_security_event());
        assert!(!AuditEvent::new(EventType::DocumentRead).is_security_event());
    }

    #[test]
    fn compliance_events() {
        assert!(AuditEvent::new(EventType::PiiAccessed).is_compliance_event());
        assert!(AuditEvent::new(EventType::DocumentRead).with_pii().is_compliance_event());
        assert!(
            AuditEvent::new(EventType::DocumentRead)
                .with_sensitive()
                .is_compliance_event()
        );
        assert!(!AuditEvent::new(EventType::DocumentRead).is_compliance_event());
    }

    #[test]
    fn immediate_alert_rules() {
        let critical = AuditEvent::new(EventType::UserAction).with_severity(Severity::Critical);
        assert!(critical.requires_immediate_alert());

        let auth_warning = AuditEvent::new(EventType::AuthFailure).with_severity(Severity::Warning);
        assert!(auth_warning.requires_immediate_alert());

        let doc_warning =
            AuditEvent::new(EventType::DocumentRead).with_severity(Severity::Warning);
        assert!(!doc_warning.requires_immediate_alert());

        let auth_info = AuditEvent::new(EventType::AuthFailure);
        assert!(!auth_info.requires_immediate_alert());
    }

    #[test]
    fn document_constructor_fills_resource() {
        let event = AuditEvent::document(
            EventType::DocumentCreated,
            "/docs/plan.md",
            "create",
            Some("alice"),
        );
        assert_eq!(event.resource_type.as_deref(), Some("document"));
        assert_eq!(event.resource_path.as_deref(), Some("/docs/plan.md"));
        assert_eq!(event.username.as_deref(), Some("alice"));
        assert_eq!(event.process_id, Some(std::process::id()));
    }

    #[test]
    fn security_constructor_keeps_status_and_severity() {
        let event = AuditEvent::security(
            EventType::AuthFailure,
            "login",
            EventStatus::Failure,
            Some("mallory"),
            Severity::Warning,
        );
        assert_eq!(event.status, EventStatus::Failure);
        assert_eq!(event.severity, Severity::Warning);
        assert!(event.requires_immediate_alert());
    }

    #[test]
    fn deserialize_fills_missing_optional_fields() {
        let json = r#"{
            "event_id": "6f1c1f0e-3a57-4f0c-9a55-0d1d7d5a2f11",
            "timestamp": "2026-03-01T12:00:00Z",
            "event_type": "system.start"
        }"#;
        let event: AuditEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.event_type, EventType::SystemStart);
        assert_eq!(event.retention_days, 365);
        assert_eq!(event.status, EventStatus::Success);
    }
}
