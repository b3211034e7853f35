//! Allocator configuration.
//!
//! Configuration can be built in code or read from the environment:
//! - `SALLOC_FAIL_ID`: identifier armed for injected failure (negative or unset: disarmed)
//! - `SALLOC_FAIL_AFTER`: successful calls granted before failures begin (default 0)
//! - `SALLOC_AUDIT_PATH`: audit file path (unset or empty: auditing disabled)
//! - `SALLOC_AUDIT_FATAL`: terminate when an audit record cannot be written
//!   (`1|true|yes|on|fatal`; default off)
//! - `SALLOC_AUDIT_EXIT_CODE`: exit status used in fatal mode (default 74)

use std::path::PathBuf;

use salloc_core::audit::{AuditFailureMode, AuditSink, DEFAULT_AUDIT_EXIT_CODE};
use salloc_core::policy::FailurePolicy;
use thiserror::Error;

pub const ENV_FAIL_ID: &str = "SALLOC_FAIL_ID";
pub const ENV_FAIL_AFTER: &str = "SALLOC_FAIL_AFTER";
pub const ENV_AUDIT_PATH: &str = "SALLOC_AUDIT_PATH";
pub const ENV_AUDIT_FATAL: &str = "SALLOC_AUDIT_FATAL";
pub const ENV_AUDIT_EXIT_CODE: &str = "SALLOC_AUDIT_EXIT_CODE";

/// Malformed configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{var}: expected an integer, got {value:?}")]
    NotAnInteger { var: &'static str, value: String },
}

/// Complete allocator configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocConfig {
    /// Identifier armed for failure; negative disarms.
    pub armed_id: i64,
    /// Successful armed calls before failures begin.
    pub success_budget: i64,
    /// Audit file, if auditing is wanted.
    pub audit_path: Option<PathBuf>,
    /// Terminate instead of warning when auditing fails.
    pub audit_fatal: bool,
    /// Exit status for fatal audit failure.
    pub audit_exit_code: i32,
}

impl Default for AllocConfig {
    fn default() -> Self {
        Self {
            armed_id: -1,
            success_budget: 0,
            audit_path: None,
            audit_fatal: false,
            audit_exit_code: DEFAULT_AUDIT_EXIT_CODE,
        }
    }
}

impl AllocConfig {
    /// Arm `armed_id` for failure after `success_budget` successes.
    #[must_use]
    pub fn failing(armed_id: i64, success_budget: i64) -> Self {
        Self {
            armed_id,
            success_budget,
            ..Self::default()
        }
    }

    /// Add an audit file.
    #[must_use]
    pub fn with_audit(mut self, path: impl Into<PathBuf>, fatal: bool) -> Self {
        self.audit_path = Some(path.into());
        self.audit_fatal = fatal;
        self
    }

    #[must_use]
    pub const fn policy(&self) -> FailurePolicy {
        FailurePolicy::new(self.armed_id, self.success_budget)
    }

    #[must_use]
    pub const fn failure_mode(&self) -> AuditFailureMode {
        if self.audit_fatal {
            AuditFailureMode::Fatal {
                exit_code: self.audit_exit_code,
            }
        } else {
            AuditFailureMode::Warn
        }
    }

    #[must_use]
    pub fn sink(&self) -> AuditSink {
        match &self.audit_path {
            Some(path) => AuditSink::to_file(path, self.failure_mode()),
            None => AuditSink::disabled(),
        }
    }

    /// Read the `SALLOC_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable lookup (unset variables yield `None`).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            armed_id: parse_int(ENV_FAIL_ID, lookup(ENV_FAIL_ID))?.unwrap_or(defaults.armed_id),
            success_budget: parse_int(ENV_FAIL_AFTER, lookup(ENV_FAIL_AFTER))?
                .unwrap_or(defaults.success_budget),
            audit_path: lookup(ENV_AUDIT_PATH)
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            audit_fatal: lookup(ENV_AUDIT_FATAL).is_some_and(|v| flag_from_str_loose(&v)),
            audit_exit_code: parse_int(ENV_AUDIT_EXIT_CODE, lookup(ENV_AUDIT_EXIT_CODE))?
                .map_or(Ok(defaults.audit_exit_code), |code| {
                    i32::try_from(code).map_err(|_| ConfigError::NotAnInteger {
                        var: ENV_AUDIT_EXIT_CODE,
                        value: code.to_string(),
                    })
                })?,
        })
    }
}

fn parse_int(var: &'static str, raw: Option<String>) -> Result<Option<i64>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<i64>()
        .map(Some)
        .map_err(|_| ConfigError::NotAnInteger { var, value: raw })
}

/// Parse a boolean flag (case-insensitive). Unknown values read as off.
#[must_use]
pub fn flag_from_str_loose(s: &str) -> bool {
    matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on" | "fatal"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn defaults_are_disarmed_and_unaudited() {
        let cfg = AllocConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(cfg, AllocConfig::default());
        assert!(!cfg.policy().is_armed());
        assert!(!cfg.sink().is_enabled());
        assert_eq!(cfg.failure_mode(), AuditFailureMode::Warn);
    }

    #[test]
    fn reads_every_variable() {
        let cfg = AllocConfig::from_lookup(lookup_from(&[
            (ENV_FAIL_ID, "100"),
            (ENV_FAIL_AFTER, " 2 "),
            (ENV_AUDIT_PATH, "/tmp/audit.log"),
            (ENV_AUDIT_FATAL, "YES"),
            (ENV_AUDIT_EXIT_CODE, "9"),
        ]))
        .unwrap();
        assert_eq!(cfg.policy(), FailurePolicy::new(100, 2));
        assert_eq!(cfg.audit_path, Some(PathBuf::from("/tmp/audit.log")));
        assert_eq!(cfg.failure_mode(), AuditFailureMode::Fatal { exit_code: 9 });
    }

    #[test]
    fn empty_audit_path_disables_sink() {
        let cfg = AllocConfig::from_lookup(lookup_from(&[(ENV_AUDIT_PATH, "  ")])).unwrap();
        assert_eq!(cfg.audit_path, None);
    }

    #[test]
    fn malformed_integer_is_an_error() {
        let err = AllocConfig::from_lookup(lookup_from(&[(ENV_FAIL_AFTER, "two")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::NotAnInteger {
                var: ENV_FAIL_AFTER,
                value: "two".to_string()
            }
        );
        assert!(
            AllocConfig::from_lookup(lookup_from(&[(ENV_AUDIT_EXIT_CODE, "99999999999")]))
                .is_err()
        );
    }

    #[test]
    fn flag_parser_is_loose() {
        for on in ["1", "true", "TRUE", "yes", "on", "fatal"] {
            assert!(flag_from_str_loose(on), "{on}");
        }
        for off in ["0", "false", "no", "off", "", "bogus"] {
            assert!(!flag_from_str_loose(off), "{off}");
        }
    }

    #[test]
    fn builder_helpers() {
        let cfg = AllocConfig::failing(5, 1).with_audit("/tmp/x.log", true);
        assert_eq!(cfg.policy(), FailurePolicy::new(5, 1));
        assert!(cfg.failure_mode().is_fatal());
        assert_eq!(cfg.sink().path(), Some(std::path::Path::new("/tmp/x.log")));
    }
}
