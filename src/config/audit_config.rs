use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{AuditError, Result};
use crate::core::models::audit_event::{DEFAULT_RETENTION_DAYS, EventType};

/// Default size at which the live log is rotated (100 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;
/// Default number of rotated files kept.
pub const DEFAULT_MAX_FILES: usize = 10;
pub const DEFAULT_LOG_FILE: &str = "audit.log";
pub const DEFAULT_SYSLOG_PORT: u16 = 514;

pub const ENV_DIR: &str = "NUAA_AUDIT_DIR";
pub const ENV_ENABLED: &str = "NUAA_AUDIT_ENABLED";
pub const ENV_INCLUDE_PII: &str = "NUAA_AUDIT_INCLUDE_PII";
pub const ENV_COMPLIANCE_MODE: &str = "NUAA_AUDIT_COMPLIANCE_MODE";
pub const ENV_MAX_FILE_SIZE: &str = "NUAA_AUDIT_MAX_FILE_SIZE";
pub const ENV_RETENTION_DAYS: &str = "NUAA_AUDIT_RETENTION_DAYS";
pub const ENV_SYSLOG_ENABLED: &str = "NUAA_AUDIT_SYSLOG_ENABLED";
pub const ENV_SYSLOG_HOST: &str = "NUAA_AUDIT_SYSLOG_HOST";
pub const ENV_ALERT_EMAIL: &str = "NUAA_AUDIT_ALERT_EMAIL";

/// Storage and policy settings for the audit trail.
///
/// Resolved once, in layers: compiled defaults, then the optional
/// `[audit]` table of a TOML file, then `NUAA_AUDIT_*` environment
/// variables. Treated as read-only once a logger has been built from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditConfig {
    pub audit_dir: PathBuf,
    pub log_file: String,

    // Rotation
    pub max_file_size: u64,
    pub max_files: usize,
    pub retention_days: u32,

    // Feature flags
    pub enabled: bool,
    pub include_pii: bool,
    /// Reserved; logs are always written in clear text.
    pub encrypt_logs: bool,
    pub syslog_enabled: bool,

    pub syslog_host: Option<String>,
    pub syslog_port: u16,

    pub alert_on_critical: bool,
    pub alert_email: Option<String>,

    pub compliance_mode: bool,
    /// `None` lets every event type through.
    pub allowed_event_types: Option<BTreeSet<EventType>>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            audit_dir: default_audit_dir(),
            log_file: DEFAULT_LOG_FILE.to_string(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_files: DEFAULT_MAX_FILES,
            retention_days: DEFAULT_RETENTION_DAYS,
            enabled: true,
            include_pii: false,
            encrypt_logs: false,
            syslog_enabled: false,
            syslog_host: None,
            syslog_port: DEFAULT_SYSLOG_PORT,
            alert_on_critical: true,
            alert_email: None,
            compliance_mode: false,
            allowed_event_types: None,
        }
    }
}

/// `<user data dir>/nuaa-cli/audit`, or `.nuaa/audit` when the platform
/// has no data directory.
pub fn default_audit_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("nuaa-cli").join("audit"))
        .unwrap_or_else(|| PathBuf::from(".nuaa").join("audit"))
}

/// Optional `[audit]` table of a TOML config file. Every key may be omitted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditSection {
    pub audit_dir: Option<PathBuf>,
    pub log_file: Option<String>,
    pub max_file_size: Option<u64>,
    pub max_files: Option<usize>,
    pub retention_days: Option<u32>,
    pub enabled: Option<bool>,
    pub include_pii: Option<bool>,
    pub encrypt_logs: Option<bool>,
    pub syslog_enabled: Option<bool>,
    pub syslog_host: Option<String>,
    pub syslog_port: Option<u16>,
    pub alert_on_critical: Option<bool>,
    pub alert_email: Option<String>,
    pub compliance_mode: Option<bool>,
    pub allowed_event_types: Option<Vec<EventType>>,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    audit: Option<AuditSection>,
}

impl AuditConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each
    /// `NUAA_AUDIT_*` variable.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_env(lookup);
        config
    }

    /// Defaults rooted at `dir`, ignoring the environment.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            audit_dir: dir.into(),
            ..Self::default()
        }
    }

    /// Load defaults, then `config_file` (if given), then the environment.
    ///
    /// A config file that was asked for but cannot be read or parsed is an
    /// error. Bad environment values never are.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        Self::load_with_lookup(config_file, |key| std::env::var(key).ok())
    }

    pub fn load_with_lookup<F>(config_file: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = config_file {
            if !path.exists() {
                return Err(AuditError::InvalidConfig {
                    detail: format!("config file {} not found", path.display()),
                });
            }
            let content = std::fs::read_to_string(path)?;
            let parsed: ConfigFile =
                toml::from_str(&content).map_err(|e| AuditError::InvalidConfig {
                    detail: format!("failed to parse {}: {e}", path.display()),
                })?;
            if let Some(section) = parsed.audit {
                config.apply_section(section)?;
            }
        }

        config.apply_env(lookup);
        Ok(config)
    }

    fn apply_section(&mut self, section: AuditSection) -> Result<()> {
        if let Some(log_file) = section.log_file {
            validate_simple_filename(&log_file)?;
            self.log_file = log_file;
        }
        if let Some(dir) = section.audit_dir {
            self.audit_dir = dir;
        }
        if let Some(v) = section.max_file_size {
            self.max_file_size = v;
        }
        if let Some(v) = section.max_files {
            self.max_files = v;
        }
        if let Some(v) = section.retention_days {
            self.retention_days = v;
        }
        if let Some(v) = section.enabled {
            self.enabled = v;
        }
        if let Some(v) = section.include_pii {
            self.include_pii = v;
        }
        if let Some(v) = section.encrypt_logs {
            self.encrypt_logs = v;
        }
        if let Some(v) = section.syslog_enabled {
            self.syslog_enabled = v;
        }
        if section.syslog_host.is_some() {
            self.syslog_host = section.syslog_host;
        }
        if let Some(v) = section.syslog_port {
            self.syslog_port = v;
        }
        if let Some(v) = section.alert_on_critical {
            self.alert_on_critical = v;
        }
        if section.alert_email.is_some() {
            self.alert_email = section.alert_email;
        }
        if let Some(v) = section.compliance_mode {
            self.compliance_mode = v;
        }
        if let Some(types) = section.allowed_event_types {
            self.allowed_event_types = Some(types.into_iter().collect());
        }
        Ok(())
    }

    /// Environment overrides. Unparsable numbers keep the current value.
    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(dir) = get(ENV_DIR) {
            self.audit_dir = PathBuf::from(dir);
        }
        if let Some(v) = get(ENV_ENABLED) {
            self.enabled = parse_flag(&v);
        }
        if let Some(v) = get(ENV_INCLUDE_PII) {
            self.include_pii = parse_flag(&v);
        }
        if let Some(v) = get(ENV_COMPLIANCE_MODE) {
            self.compliance_mode = parse_flag(&v);
        }
        if let Some(size) = get(ENV_MAX_FILE_SIZE).and_then(|v| v.trim().parse().ok()) {
            self.max_file_size = size;
        }
        if let Some(days) = get(ENV_RETENTION_DAYS).and_then(|v| v.trim().parse().ok()) {
            self.retention_days = days;
        }
        if let Some(v) = get(ENV_SYSLOG_ENABLED) {
            self.syslog_enabled = parse_flag(&v);
        }
        if let Some(host) = get(ENV_SYSLOG_HOST) {
            self.syslog_host = Some(host);
        }
        if let Some(email) = get(ENV_ALERT_EMAIL) {
            self.alert_email = Some(email);
        }
    }

    /// Path of the live log file.
    pub fn log_path(&self) -> PathBuf {
        self.audit_dir.join(&self.log_file)
    }

    /// Path of the `index`-th rotated file (`audit.log.1` is the newest).
    pub fn rotated_path(&self, index: usize) -> PathBuf {
        self.audit_dir.join(format!("{}.{index}", self.log_file))
    }

    /// Rotated files that currently exist, newest first.
    pub fn existing_rotated_paths(&self) -> Vec<PathBuf> {
        (1..=self.max_files)
            .map(|i| self.rotated_path(i))
            .filter(|p| p.exists())
            .collect()
    }

    pub fn retention_policy_path(&self) -> PathBuf {
        self.audit_dir.join("retention_policy.json")
    }

    /// Whether events of this type are recorded at all.
    pub fn is_event_allowed(&self, event_type: EventType) -> bool {
        if !self.enabled {
            return false;
        }
        match &self.allowed_event_types {
            None => true,
            Some(allowed) => allowed.contains(&event_type),
        }
    }

    /// Create the audit directory when logging is enabled. Idempotent.
    pub fn ensure_audit_dir(&self) -> Result<()> {
        if self.enabled && !self.audit_dir.exists() {
            std::fs::create_dir_all(&self.audit_dir)?;
        }
        Ok(())
    }
}

/// `true`, `1` and `yes` (any case) are on; everything else is off.
fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "true" | "1" | "yes"
    )
}

/// Reject log file names that would escape the audit directory.
fn validate_simple_filename(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if invalid {
        return Err(AuditError::InvalidConfig {
            detail: format!("log_file '{name}' must be a plain file name"),
        });
    }
    Ok(())
}
