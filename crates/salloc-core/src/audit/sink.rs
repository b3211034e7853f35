//! Append-only audit sink.
//!
//! Each record is a complete open-append-write-close cycle; no file handle
//! outlives a call. A sink without a path is disabled and every record is a
//! silent no-op.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::record::AuditRecord;

/// Exit status used when a fatal sink cannot record (`EX_IOERR`).
pub const DEFAULT_AUDIT_EXIT_CODE: i32 = 74;

/// What to do when a record cannot be written.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum AuditFailureMode {
    /// Print a warning on stderr and carry on.
    #[default]
    Warn,
    /// Print a warning on stderr, then terminate the process with `exit_code`.
    Fatal { exit_code: i32 },
}

impl AuditFailureMode {
    /// Fatal mode with [`DEFAULT_AUDIT_EXIT_CODE`].
    pub const FATAL: Self = Self::Fatal {
        exit_code: DEFAULT_AUDIT_EXIT_CODE,
    };

    #[must_use]
    pub const fn is_fatal(self) -> bool {
        matches!(self, Self::Fatal { .. })
    }
}

/// Failure while appending to the audit file.
#[derive(Debug, Error)]
pub enum AuditSinkError {
    #[error("cannot open dump file \"{}\": {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("error while writing into file \"{}\": {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("error while closing dump file \"{}\": {source}", path.display())]
    Close {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Optional append-only destination for audit records.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AuditSink {
    path: Option<PathBuf>,
    mode: AuditFailureMode,
}

impl AuditSink {
    /// Sink that records nothing.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            path: None,
            mode: AuditFailureMode::Warn,
        }
    }

    #[must_use]
    pub fn to_file(path: impl Into<PathBuf>, mode: AuditFailureMode) -> Self {
        Self {
            path: Some(path.into()),
            mode,
        }
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[must_use]
    pub const fn mode(&self) -> AuditFailureMode {
        self.mode
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.path.is_some()
    }

    /// Append `record`, reporting failures the configured way.
    ///
    /// Warns on stderr for any failure; in fatal mode the process exits
    /// before this returns. The error is handed back so callers can count it,
    /// never to change the outcome of the operation being audited.
    pub fn record(&self, record: &AuditRecord<'_>) -> Result<(), AuditSinkError> {
        let Err(err) = self.try_record(record) else {
            return Ok(());
        };
        eprintln!("WARNING: {err}!");
        if let AuditFailureMode::Fatal { exit_code } = self.mode {
            std::process::exit(exit_code);
        }
        Err(err)
    }

    /// Append `record` without any reporting.
    pub fn try_record(&self, record: &AuditRecord<'_>) -> Result<(), AuditSinkError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| AuditSinkError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{record}").map_err(|source| AuditSinkError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        // Buffered bytes reach the file here; a failure is the fclose-time error.
        writer.into_inner().map_err(|err| AuditSinkError::Close {
            path: path.to_path_buf(),
            source: err.into_error(),
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callsite::CallSite;

    fn temp_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "salloc-sink-{tag}-{}-{:?}.log",
            std::process::id(),
            std::thread::current().id()
        ))
    }

    #[test]
    fn disabled_sink_is_silent_noop() {
        let sink = AuditSink::disabled();
        assert!(!sink.is_enabled());
        let rec = AuditRecord::free(CallSite::UNKNOWN, 0);
        assert!(sink.record(&rec).is_ok());
    }

    #[test]
    fn disabled_sink_ignores_fatal_mode() {
        let sink = AuditSink {
            path: None,
            mode: AuditFailureMode::FATAL,
        };
        assert!(sink.record(&AuditRecord::free(CallSite::UNKNOWN, 0)).is_ok());
    }

    #[test]
    fn appends_one_line_per_record_in_order() {
        let path = temp_path("order");
        let _ = std::fs::remove_file(&path);
        let sink = AuditSink::to_file(&path, AuditFailureMode::Warn);

        let site = CallSite::new("a.rs", 1, None);
        sink.record(&AuditRecord::allocate(site.clone(), 0x10, 8, 1)).unwrap();
        sink.record(&AuditRecord::free(site, 0x10)).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, ["A -[] +[a.rs]:1 0x10 8 (1)", "F -[] +[a.rs]:1 0x10"]);
        assert!(text.ends_with('\n'));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn open_failure_is_reported_in_warn_mode() {
        let path = std::env::temp_dir()
            .join("salloc-no-such-dir-for-sink-test")
            .join("audit.log");
        let sink = AuditSink::to_file(&path, AuditFailureMode::Warn);
        let err = sink
            .record(&AuditRecord::free(CallSite::UNKNOWN, 0))
            .unwrap_err();
        assert!(matches!(err, AuditSinkError::Open { .. }));
        assert!(err.to_string().contains("cannot open dump file"));
    }

    #[test]
    fn fatal_mode_constant_uses_default_exit_code() {
        assert_eq!(
            AuditFailureMode::FATAL,
            AuditFailureMode::Fatal { exit_code: 74 }
        );
        assert!(AuditFailureMode::FATAL.is_fatal());
        assert!(!AuditFailureMode::default().is_fatal());
    }
}
