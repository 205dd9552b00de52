use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::adapters::forwarders::stderr_alert::StderrAlert;
use crate::adapters::forwarders::syslog_forwarder::SyslogForwarder;
use crate::config::audit_config::AuditConfig;
use crate::core::errors::{AuditError, Result};
use crate::core::models::audit_event::AuditEvent;
use crate::core::models::integrity_report::IntegrityReport;
use crate::core::models::persisted_record::{CHECKSUM_FIELD, LogHeader, PersistedRecord};
use crate::core::services::integrity_service;
use crate::core::traits::audit::{AuditLogger, LogOutcome};
use crate::core::traits::forwarder::EventForwarder;

/// Metadata key that replaces an event's payload when PII is filtered.
pub const PII_FILTERED_KEY: &str = "_pii_filtered";

/// Chain state guarded by the write lock.
#[derive(Debug, Default)]
struct ChainState {
    /// `_checksum` of the last record in the live file, `None` right after
    /// a header.
    prev_checksum: Option<String>,
}

/// Audit logger that appends hash-chained JSON lines to a file.
///
/// Each line after the header is a self-contained JSON object: one
/// `AuditEvent` plus `_checksum` (SHA-256 of its canonical form) and
/// `_prev_checksum` (the previous line's `_checksum`). Size-based rotation
/// moves the live file to `<log>.1` and starts a fresh chain.
///
/// The rotation check, checksum, append and chain update happen under one
/// mutex, so a single instance can be shared between threads.
pub struct JsonAuditLogger {
    config: AuditConfig,
    chain: Mutex<ChainState>,
    forwarders: Vec<Box<dyn EventForwarder>>,
}

impl JsonAuditLogger {
    /// Open the logger described by `config`.
    ///
    /// When logging is enabled this creates the audit directory, writes a
    /// header if the live file does not exist yet, and resumes the chain
    /// from the last record of an existing file. A disabled config touches
    /// nothing on disk.
    pub fn new(config: AuditConfig) -> Result<Self> {
        let mut state = ChainState::default();

        if config.enabled {
            config.ensure_audit_dir()?;
            let log_path = config.log_path();
            if is_empty_or_missing(&log_path) {
                write_header(&log_path)?;
            } else {
                terminate_torn_tail(&log_path)?;
                state.prev_checksum = last_checksum(&log_path)?;
            }
        }

        let forwarders = default_forwarders(&config);
        Ok(Self {
            config,
            chain: Mutex::new(state),
            forwarders,
        })
    }

    /// Add a side channel that sees every persisted event.
    pub fn with_forwarder(mut self, forwarder: Box<dyn EventForwarder>) -> Self {
        self.forwarders.push(forwarder);
        self
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    pub fn log_path(&self) -> PathBuf {
        self.config.log_path()
    }

    /// A panic inside the critical section cannot leave the chain state
    /// half-updated: `prev_checksum` is assigned only after the append.
    fn lock(&self) -> MutexGuard<'_, ChainState> {
        self.chain.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of `event` with the PII policy applied.
    fn redacted(&self, event: &AuditEvent) -> AuditEvent {
        let mut copy = event.clone();
        if copy.contains_pii && !self.config.include_pii {
            copy.metadata.clear();
            copy.metadata
                .insert(PII_FILTERED_KEY.to_string(), Value::Bool(true));
        }
        copy
    }

    /// Start a new file when the live one is missing, or rotate when it has
    /// reached `max_file_size`.
    fn check_rotation(&self, state: &mut ChainState) -> Result<()> {
        let log_path = self.config.log_path();
        let size = match fs::metadata(&log_path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                write_header(&log_path)?;
                state.prev_checksum = None;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if size == 0 {
            write_header(&log_path)?;
            state.prev_checksum = None;
        } else if size >= self.config.max_file_size {
            self.rotate(state)?;
        }
        Ok(())
    }

    /// Shift `<log>.N` up by one (dropping the oldest), move the live file
    /// to `<log>.1` and open a fresh file with only a header.
    fn rotate(&self, state: &mut ChainState) -> Result<()> {
        let live = self.config.log_path();
        let max_files = self.config.max_files;

        if max_files == 0 {
            fs::remove_file(&live).map_err(|e| rotation_error("discard live log", &live, e))?;
        } else {
            for i in (1..max_files).rev() {
                let old_file = self.config.rotated_path(i);
                let new_file = self.config.rotated_path(i + 1);
                if old_file.exists() {
                    if new_file.exists() {
                        fs::remove_file(&new_file)
                            .map_err(|e| rotation_error("delete oldest log", &new_file, e))?;
                    }
                    fs::rename(&old_file, &new_file)
                        .map_err(|e| rotation_error("shift rotated log", &old_file, e))?;
                }
            }

            let first = self.config.rotated_path(1);
            if first.exists() {
                fs::remove_file(&first)
                    .map_err(|e| rotation_error("delete rotated log", &first, e))?;
            }
            fs::rename(&live, &first).map_err(|e| rotation_error("rotate live log", &live, e))?;
        }

        self.prune_beyond_max();

        write_header(&live)?;
        state.prev_checksum = None;
        info!(path = %live.display(), max_files, "audit log rotated");
        Ok(())
    }

    /// Remove rotated files left above `max_files` (e.g. after the limit
    /// was lowered).
    fn prune_beyond_max(&self) {
        let mut index = self.config.max_files + 1;
        loop {
            let path = self.config.rotated_path(index);
            if !path.exists() {
                break;
            }
            if let Err(e) = fs::remove_file(&path) {
                warn!(path = %path.display(), "could not prune rotated audit log: {e}");
                break;
            }
            index += 1;
        }
    }

    /// Append one sealed record as a single line.
    fn append(&self, record: &PersistedRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let log_path = self.config.log_path();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        file.write_all(line.as_bytes())?;
        file.flush()?;
        if self.config.compliance_mode {
            file.sync_data()?;
        }
        Ok(())
    }

    fn forward(&self, event: &AuditEvent) {
        for forwarder in &self.forwarders {
            if let Err(e) = forwarder.forward(event) {
                debug!(
                    forwarder = forwarder.name(),
                    event_id = %event.event_id,
                    "audit forwarding failed: {e}"
                );
            }
        }
    }

    /// Verify one log file's hash chain, defaulting to the live file.
    ///
    /// Violations and read errors are reported through `tracing`; use
    /// [`verify_file`](Self::verify_file) for the details.
    pub fn verify_integrity(&self, log_file: Option<&Path>) -> bool {
        let path = log_file
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.log_path());

        match self.verify_file(&path) {
            Ok(report) => match &report.violation {
                None => true,
                Some(v) => {
                    warn!(
                        path = %path.display(),
                        line = v.line,
                        "Integrity violation at line {}: {}",
                        v.line,
                        v.kind
                    );
                    false
                }
            },
            Err(e) => {
                error!(path = %path.display(), "Error verifying integrity: {e}");
                false
            }
        }
    }

    /// Replay the chain of `path`. The live file is read under the write
    /// lock so a concurrent rotation cannot be observed half-done.
    pub fn verify_file(&self, path: &Path) -> Result<IntegrityReport> {
        if path == self.config.log_path() {
            let _guard = self.lock();
            integrity_service::verify_chain(path)
        } else {
            integrity_service::verify_chain(path)
        }
    }

    /// Verify the live file and every rotated file that exists. The whole
    /// pass runs under the write lock, so no rotation can shift files
    /// between two checks.
    pub fn verify_all(&self) -> Result<Vec<IntegrityReport>> {
        let _guard = self.lock();
        integrity_service::verify_logs(&self.config)
    }
}

impl AuditLogger for JsonAuditLogger {
    fn try_log(&self, event: &AuditEvent) -> Result<LogOutcome> {
        if !self.config.is_event_allowed(event.event_type) {
            debug!(event_type = %event.event_type, "audit event not recorded");
            return Ok(LogOutcome::Skipped);
        }

        let event = self.redacted(event);

        let record = {
            let mut state = self.lock();
            self.check_rotation(&mut state)?;
            let record = PersistedRecord::seal(event, state.prev_checksum.clone())?;
            self.append(&record)?;
            state.prev_checksum = Some(record.checksum.clone());
            record
        };

        self.forward(&record.event);

        Ok(LogOutcome::Written {
            checksum: record.checksum,
        })
    }
}

fn default_forwarders(config: &AuditConfig) -> Vec<Box<dyn EventForwarder>> {
    let mut forwarders: Vec<Box<dyn EventForwarder>> = Vec::new();
    if config.syslog_enabled
        && let Some(host) = &config.syslog_host
    {
        forwarders.push(Box::new(SyslogForwarder::new(host, config.syslog_port)));
    }
    if config.alert_on_critical {
        forwarders.push(Box::new(StderrAlert::new(config.alert_email.clone())));
    }
    forwarders
}

fn is_empty_or_missing(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true)
}

/// Create (or truncate) `path` with a single header line.
fn write_header(path: &Path) -> Result<()> {
    let mut line = serde_json::to_string(&LogHeader::new())?;
    line.push('\n');
    let mut file = File::create(path)?;
    file.write_all(line.as_bytes())?;
    file.flush()?;
    Ok(())
}

/// End a final line left unterminated by a crash, so the next append
/// starts on a line of its own and the fragment stays a separate
/// (malformed) line.
fn terminate_torn_tail(path: &Path) -> Result<()> {
    let mut file = OpenOptions::new().read(true).append(true).open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(());
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    if last[0] != b'\n' {
        warn!(path = %path.display(), "audit log ends with a partial line; starting a new line");
        file.write_all(b"\n")?;
        file.flush()?;
    }
    Ok(())
}

/// `_checksum` of the last chained record in `path`, skipping blank lines
/// and a torn final line.
fn last_checksum(path: &Path) -> Result<Option<String>> {
    let reader = BufReader::new(File::open(path)?);
    let mut last = None;
    for raw in reader.split(b'\n') {
        let raw = raw?;
        let Ok(value) = serde_json::from_slice::<Value>(&raw) else {
            continue;
        };
        if let Some(checksum) = value.get(CHECKSUM_FIELD).and_then(Value::as_str) {
            last = Some(checksum.to_string());
        }
    }
    Ok(last)
}

fn rotation_error(step: &str, path: &Path, e: std::io::Error) -> AuditError {
    AuditError::Rotation {
        detail: format!("{step} ({}): {e}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::audit_event::{EventType, Severity};
    use crate::core::models::integrity_report::ViolationKind;
    use crate::core::services::query_service::QueryService;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn quiet_config(dir: &Path) -> AuditConfig {
        AuditConfig {
            alert_on_critical: false,
            ..AuditConfig::in_dir(dir)
        }
    }

    fn read_lines(path: &Path) -> Vec<Value> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn new_logger_writes_header() {
        let tmp = TempDir::new().unwrap();
        let logger = JsonAuditLogger::new(quiet_config(tmp.path())).unwrap();

        let lines = read_lines(&logger.log_path());
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["type"], "audit_log_header");
        assert_eq!(lines[0]["version"], "1.0");
    }

    #[test]
    fn first_record_has_null_prev_checksum() {
        let tmp = TempDir::new().unwrap();
        let logger = JsonAuditLogger::new(quiet_config(tmp.path())).unwrap();

        assert!(logger.log(&AuditEvent::new(EventType::SystemStart)));
        assert!(logger.log(&AuditEvent::new(EventType::SystemStop)));

        let lines = read_lines(&logger.log_path());
        assert_eq!(lines.len(), 3);
        assert!(lines[1]["_prev_checksum"].is_null());
        assert_eq!(lines[2]["_prev_checksum"], lines[1]["_checksum"]);
    }

    #[test]
    fn try_log_returns_checksum() {
        let tmp = TempDir::new().unwrap();
        let logger = JsonAuditLogger::new(quiet_config(tmp.path())).unwrap();

        let outcome = logger.try_log(&AuditEvent::new(EventType::UserLogin)).unwrap();
        let LogOutcome::Written { checksum } = outcome else {
            panic!("expected a write");
        };
        let lines = read_lines(&logger.log_path());
        assert_eq!(lines[1]["_checksum"], checksum.as_str());
    }

    #[test]
    fn filtered_event_type_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let config = AuditConfig {
            allowed_event_types: Some([EventType::AuthFailure].into_iter().collect()),
            ..quiet_config(tmp.path())
        };
        let logger = JsonAuditLogger::new(config).unwrap();

        assert_eq!(
            logger.try_log(&AuditEvent::new(EventType::DocumentRead)).unwrap(),
            LogOutcome::Skipped
        );
        assert!(logger.log(&AuditEvent::new(EventType::AuthFailure)));
        assert_eq!(read_lines(&logger.log_path()).len(), 2);
    }

    #[test]
    fn redaction_keeps_caller_event_intact() {
        let tmp = TempDir::new().unwrap();
        let logger = JsonAuditLogger::new(quiet_config(tmp.path())).unwrap();

        let event = AuditEvent::new(EventType::PiiAccessed)
            .with_metadata("ssn", "123-45-6789")
            .with_pii();
        assert!(logger.log(&event));

        assert_eq!(event.metadata["ssn"], "123-45-6789");
        let lines = read_lines(&logger.log_path());
        assert_eq!(lines[1]["metadata"], serde_json::json!({"_pii_filtered": true}));
    }

    #[test]
    fn pii_kept_when_allowed() {
        let tmp = TempDir::new().unwrap();
        let config = AuditConfig {
            include_pii: true,
            ..quiet_config(tmp.path())
        };
        let logger = JsonAuditLogger::new(config).unwrap();

        let event = AuditEvent::new(EventType::PiiAccessed)
            .with_metadata("email", "a@b.c")
            .with_pii();
        assert!(logger.log(&event));
        let lines = read_lines(&logger.log_path());
        assert_eq!(lines[1]["metadata"]["email"], "a@b.c");
    }

    #[test]
    fn reopened_logger_continues_chain() {
        let tmp = TempDir::new().unwrap();
        {
            let logger = JsonAuditLogger::new(quiet_config(tmp.path())).unwrap();
            assert!(logger.log(&AuditEvent::new(EventType::SystemStart)));
        }
        let logger = JsonAuditLogger::new(quiet_config(tmp.path())).unwrap();
        assert!(logger.log(&AuditEvent::new(EventType::SystemStop)));

        assert!(logger.verify_integrity(None));
        assert_eq!(read_lines(&logger.log_path()).len(), 3);
    }

    #[test]
    fn rotation_moves_live_file_and_resets_chain() {
        let tmp = TempDir::new().unwrap();
        let config = AuditConfig {
            max_file_size: 400,
            max_files: 3,
            ..quiet_config(tmp.path())
        };
        let logger = JsonAuditLogger::new(config).unwrap();

        assert!(logger.log(&AuditEvent::new(EventType::SystemStart)));
        let before = fs::read_to_string(logger.log_path()).unwrap();
        assert!(before.len() as u64 >= 400);

        assert!(logger.log(&AuditEvent::new(EventType::SystemStop)));

        let rotated = fs::read_to_string(logger.config().rotated_path(1)).unwrap();
        assert_eq!(rotated, before);

        let live = read_lines(&logger.log_path());
        assert_eq!(live.len(), 2);
        assert_eq!(live[0]["type"], "audit_log_header");
        assert!(live[1]["_prev_checksum"].is_null());

        assert!(logger.verify_integrity(None));
        assert!(logger.verify_integrity(Some(&logger.config().rotated_path(1))));
    }

    #[test]
    fn rotation_keeps_at_most_max_files() {
        let tmp = TempDir::new().unwrap();
        let config = AuditConfig {
            max_file_size: 1,
            max_files: 2,
            ..quiet_config(tmp.path())
        };
        let logger = JsonAuditLogger::new(config).unwrap();

        for _ in 0..6 {
            assert!(logger.log(&AuditEvent::new(EventType::UserAction)));
        }

        assert!(logger.config().rotated_path(1).exists());
        assert!(logger.config().rotated_path(2).exists());
        assert!(!logger.config().rotated_path(3).exists());
    }

    #[test]
    fn zero_max_files_discards_old_log() {
        let tmp = TempDir::new().unwrap();
        let config = AuditConfig {
            max_file_size: 1,
            max_files: 0,
            ..quiet_config(tmp.path())
        };
        let logger = JsonAuditLogger::new(config).unwrap();

        assert!(logger.log(&AuditEvent::new(EventType::UserAction)));
        assert!(logger.log(&AuditEvent::new(EventType::UserAction)));

        assert!(!logger.config().rotated_path(1).exists());
        assert_eq!(read_lines(&logger.log_path()).len(), 2);
    }

    #[test]
    fn deleted_live_file_is_recreated_with_header() {
        let tmp = TempDir::new().unwrap();
        let logger = JsonAuditLogger::new(quiet_config(tmp.path())).unwrap();
        assert!(logger.log(&AuditEvent::new(EventType::UserAction)));

        fs::remove_file(logger.log_path()).unwrap();
        assert!(logger.log(&AuditEvent::new(EventType::UserAction)));

        let lines = read_lines(&logger.log_path());
        assert_eq!(lines[0]["type"], "audit_log_header");
        assert!(lines[1]["_prev_checksum"].is_null());
        assert!(logger.verify_integrity(None));
    }

    #[test]
    fn content_tamper_is_reported() {
        let tmp = TempDir::new().unwrap();
        let logger = JsonAuditLogger::new(quiet_config(tmp.path())).unwrap();
        for user in ["alice", "bob", "carol"] {
            assert!(logger.log(&AuditEvent::new(EventType::UserLogin).with_username(user)));
        }

        let content = fs::read_to_string(logger.log_path()).unwrap();
        fs::write(logger.log_path(), content.replace("\"bob\"", "\"eve\"")).unwrap();

        let report = logger.verify_file(&logger.log_path()).unwrap();
        let violation = report.violation.unwrap();
        assert_eq!(violation.line, 3);
        assert!(matches!(violation.kind, ViolationKind::ChecksumMismatch { .. }));
        assert!(!logger.verify_integrity(None));
    }

    #[test]
    fn write_failure_returns_false() {
        let tmp = TempDir::new().unwrap();
        let logger = JsonAuditLogger::new(quiet_config(tmp.path())).unwrap();

        // Replace the live file with a directory so the append fails.
        fs::remove_file(logger.log_path()).unwrap();
        fs::create_dir(logger.log_path()).unwrap();

        assert!(!logger.log(&AuditEvent::new(EventType::UserAction)));
        assert!(logger.try_log(&AuditEvent::new(EventType::UserAction)).is_err());
    }

    struct Counting(Arc<AtomicUsize>);

    impl EventForwarder for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn forward(&self, _event: &AuditEvent) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(AuditError::InvalidConfig {
                detail: "collector unreachable".into(),
            })
        }
    }

    #[test]
    fn forwarder_failures_do_not_fail_the_write() {
        let tmp = TempDir::new().unwrap();
        let seen = Arc::new(AtomicUsize::new(0));
        let logger = JsonAuditLogger::new(quiet_config(tmp.path()))
            .unwrap()
            .with_forwarder(Box::new(Counting(Arc::clone(&seen))));

        let event = AuditEvent::new(EventType::SystemError).with_severity(Severity::Critical);
        assert!(logger.log(&event));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn forwarders_only_see_written_events() {
        let tmp = TempDir::new().unwrap();
        let seen = Arc::new(AtomicUsize::new(0));
        let config = AuditConfig {
            allowed_event_types: Some([EventType::AuthFailure].into_iter().collect()),
            ..quiet_config(tmp.path())
        };
        let logger = JsonAuditLogger::new(config)
            .unwrap()
            .with_forwarder(Box::new(Counting(Arc::clone(&seen))));

        assert!(!logger.log(&AuditEvent::new(EventType::UserAction)));
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn syslog_forwarder_needs_host() {
        let tmp = TempDir::new().unwrap();
        let no_host = AuditConfig {
            syslog_enabled: true,
            ..quiet_config(tmp.path())
        };
        assert!(default_forwarders(&no_host).is_empty());

        let with_host = AuditConfig {
            syslog_host: Some("127.0.0.1".into()),
            ..no_host
        };
        let names: Vec<_> = default_forwarders(&with_host)
            .iter()
            .map(|f| f.name())
            .collect();
        assert_eq!(names, vec!["syslog"]);
    }

    #[test]
    fn float_metadata_survives_verification() {
        let tmp = TempDir::new().unwrap();
        let logger = JsonAuditLogger::new(quiet_config(tmp.path())).unwrap();

        for v in [1.079907802215119e-66_f64, 0.1 + 0.2, 6.02214076e23, -2.5e-308] {
            assert!(logger.log(&AuditEvent::new(EventType::UserAction).with_metadata("v", v)));
        }

        let report = logger.verify_file(&logger.log_path()).unwrap();
        assert!(report.is_valid(), "{:?}", report.violation);
        assert_eq!(report.records_checked, 4);
        assert!(logger.verify_integrity(None));
    }

    #[test]
    fn record_after_torn_tail_is_kept() {
        let tmp = TempDir::new().unwrap();
        {
            let logger = JsonAuditLogger::new(quiet_config(tmp.path())).unwrap();
            assert!(logger.log(&AuditEvent::new(EventType::UserLogin).with_username("alice")));
        }

        let path = quiet_config(tmp.path()).log_path();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(br#"{"event_id":"abc"#).unwrap();
        drop(file);

        let logger = JsonAuditLogger::new(quiet_config(tmp.path())).unwrap();
        assert!(logger.log(&AuditEvent::new(EventType::UserLogin).with_username("bob")));

        let bob = QueryService::new(logger.config()).events_by_user("bob");
        assert_eq!(bob.len(), 1);

        let raw = fs::read_to_string(&path).unwrap();
        let last: Value = serde_json::from_str(raw.lines().last().unwrap()).unwrap();
        assert_eq!(last["username"], "bob");

        // The fragment itself is still reported, on its own line.
        let violation = logger.verify_file(&path).unwrap().violation.unwrap();
        assert_eq!(violation.line, 3);
        assert!(matches!(violation.kind, ViolationKind::MalformedRecord { .. }));
    }
}
