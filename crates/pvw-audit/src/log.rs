// log.rs — Append-only JSONL audit log.
//
// One JSON object per line, UTF-8, LF-terminated. Each record links to the
// previous one via `previous_hash`, forming a hash chain that makes
// tampering (inserting, deleting, or modifying lines) detectable.
//
// Concurrency: handlers share one `AuditLog` behind an `Arc`. Appends are
// serialized by an internal mutex, and the file is opened in append mode per
// record so the critical section stays short and each record is a whole
// line on disk.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::AuditError;
use crate::event::AuditEvent;
use crate::hasher;

/// An append-only audit log backed by a JSONL file.
///
/// Opened without a path, the log is a no-op sink: every append succeeds and
/// writes nothing. That mode exists for tests and for deployments that have
/// not configured an audit path yet; production configs always set one.
pub struct AuditLog {
    inner: Mutex<Inner>,
}

struct Inner {
    path: Option<PathBuf>,
    /// Hash of the last record written — chains the next record.
    last_hash: Option<String>,
}

impl AuditLog {
    /// Open (or create) an audit log at the given path.
    ///
    /// Creates the parent directory if absent. If the file already exists,
    /// the last line is read back so new records chain correctly.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| AuditError::CreateDirFailed {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let last_hash = if path.exists() {
            Self::read_last_hash(&path)?
        } else {
            None
        };

        Ok(Self {
            inner: Mutex::new(Inner {
                path: Some(path),
                last_hash,
            }),
        })
    }

    /// A log that records nothing. Acceptable for tests only.
    pub fn disabled() -> Self {
        Self {
            inner: Mutex::new(Inner {
                path: None,
                last_hash: None,
            }),
        }
    }

    /// Append a record to the log.
    ///
    /// Sets `previous_hash` to chain the record to the last one, writes the
    /// JSON line, and flushes so the record is durable before the caller's
    /// response leaves the process.
    pub fn append(&self, event: &mut AuditEvent) -> Result<(), AuditError> {
        let mut inner = self.inner.lock().unwrap_or_else(|poisoned| {
            // A panic mid-append cannot corrupt the file (lines are written
            // whole); recover the guard and continue.
            poisoned.into_inner()
        });

        let Some(path) = inner.path.clone() else {
            return Ok(());
        };

        event.previous_hash = inner.last_hash.clone();
        let json = serde_json::to_string(event)?;

        // Open in append mode per record — never overwrites existing data,
        // and keeps the lock hold time bounded by a single line write.
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| AuditError::OpenFailed {
                path: path.clone(),
                source,
            })?;
        writeln!(file, "{}", json)?;
        file.flush()?;

        inner.last_hash = Some(hasher::hash_str(&json));
        tracing::debug!(kind = ?event.kind, actor = %event.actor, "audit record written");
        Ok(())
    }

    /// Read all records from a log file, oldest first. Skips blank lines.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<AuditEvent>, AuditError> {
        let file = File::open(path.as_ref()).map_err(|source| AuditError::OpenFailed {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);
        let mut events = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            events.push(serde_json::from_str(&line)?);
        }

        Ok(events)
    }

    /// Verify the integrity of a log file's hash chain.
    ///
    /// Returns the number of records when the chain is intact, or an
    /// `IntegrityViolation` naming the first broken link.
    pub fn verify_chain(path: impl AsRef<Path>) -> Result<usize, AuditError> {
        let file = File::open(path.as_ref()).map_err(|source| AuditError::OpenFailed {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);
        let mut previous_hash: Option<String> = None;
        let mut count = 0;

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let event: AuditEvent = serde_json::from_str(&line)?;
            if event.previous_hash != previous_hash {
                return Err(AuditError::IntegrityViolation {
                    line: line_num + 1,
                    expected: previous_hash.unwrap_or_else(|| "None".to_string()),
                    actual: event.previous_hash.unwrap_or_else(|| "None".to_string()),
                });
            }

            // Hash the raw line as written, not a re-serialization, so the
            // chain is independent of field ordering.
            previous_hash = Some(hasher::hash_str(&line));
            count += 1;
        }

        Ok(count)
    }

    /// Read the hash of the last record in an existing log file.
    fn read_last_hash(path: &Path) -> Result<Option<String>, AuditError> {
        let file = File::open(path).map_err(|source| AuditError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);
        let mut last_line: Option<String> = None;

        for line in reader.lines() {
            let line = line?;
            if !line.trim().is_empty() {
                last_line = Some(line);
            }
        }

        Ok(last_line.map(|line| hasher::hash_str(&line)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::AuditKind;
    use pvw_model::{ActionRequest, ActionType, Decision, RiskLevel};
    use tempfile::tempdir;

    fn event(kind: AuditKind) -> AuditEvent {
        let mut request = ActionRequest::new("home", ActionType::StopVm, "vm/101");
        request.actor = "authenticated".to_string();
        let decision = Decision {
            allowed: kind != AuditKind::ApplyDenied,
            risk_level: RiskLevel::Medium,
            requires_approval: true,
            reason: "test".to_string(),
        };
        AuditEvent::new(kind, &request, &decision)
    }

    #[test]
    fn append_and_read_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.log");

        let log = AuditLog::open(&path).unwrap();
        let mut e1 = event(AuditKind::Plan);
        let mut e2 = event(AuditKind::ApplyDenied);
        log.append(&mut e1).unwrap();
        log.append(&mut e2).unwrap();

        let events = AuditLog::read_all(&path).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, AuditKind::Plan);
        assert_eq!(events[1].kind, AuditKind::ApplyDenied);
    }

    #[test]
    fn records_are_one_line_each() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.log");

        let log = AuditLog::open(&path).unwrap();
        for _ in 0..3 {
            log.append(&mut event(AuditKind::Plan)).unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.ends_with('\n'));
        assert_eq!(content.lines().count(), 3);
        for line in content.lines() {
            serde_json::from_str::<serde_json::Value>(line).unwrap();
        }
    }

    #[test]
    fn parent_directory_is_created() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("nested").join("audit.log");

        let log = AuditLog::open(&path).unwrap();
        log.append(&mut event(AuditKind::Apply)).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn hash_chain_is_valid_and_first_record_unchained() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.log");

        let log = AuditLog::open(&path).unwrap();
        for _ in 0..5 {
            log.append(&mut event(AuditKind::Plan)).unwrap();
        }

        assert_eq!(AuditLog::verify_chain(&path).unwrap(), 5);
        let events = AuditLog::read_all(&path).unwrap();
        assert!(events[0].previous_hash.is_none());
        assert!(events[1].previous_hash.is_some());
    }

    #[test]
    fn reopen_continues_the_chain() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.log");

        {
            let log = AuditLog::open(&path).unwrap();
            log.append(&mut event(AuditKind::Plan)).unwrap();
        }
        {
            let log = AuditLog::open(&path).unwrap();
            log.append(&mut event(AuditKind::Apply)).unwrap();
        }

        assert_eq!(AuditLog::verify_chain(&path).unwrap(), 2);
    }

    #[test]
    fn tampering_is_detected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.log");

        let log = AuditLog::open(&path).unwrap();
        for _ in 0..3 {
            log.append(&mut event(AuditKind::Plan)).unwrap();
        }

        // Delete the middle line.
        let content = std::fs::read_to_string(&path).unwrap();
        let kept: Vec<&str> = content.lines().enumerate().filter(|(i, _)| *i != 1).map(|(_, l)| l).collect();
        std::fs::write(&path, format!("{}\n", kept.join("\n"))).unwrap();

        match AuditLog::verify_chain(&path) {
            Err(AuditError::IntegrityViolation { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected IntegrityViolation, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn disabled_log_is_a_no_op() {
        let log = AuditLog::disabled();
        log.append(&mut event(AuditKind::Plan)).unwrap();
    }

    #[test]
    fn concurrent_appends_stay_line_atomic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let log = std::sync::Arc::new(AuditLog::open(&path).unwrap());

        let mut handles = Vec::new();
        for _ in 0..4 {
            let log = log.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..10 {
                    log.append(&mut event(AuditKind::Plan)).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(AuditLog::verify_chain(&path).unwrap(), 40);
    }
}
