//! Global lockdown flag. When enabled, the executor refuses every command
//! until an explicit unlock.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use vg_core::Paths;
use vg_core::fsx::{self, FileMode};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LockdownState {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

pub struct Lockdown {
    file: PathBuf,
}

impl Lockdown {
    pub fn new(paths: &Paths) -> Self {
        Lockdown {
            file: paths.lockdown_file(),
        }
    }

    /// Missing or unreadable state means "not locked down".
    pub fn status(&self) -> LockdownState {
        fsx::read_json(&self.file)
            .unwrap_or_default()
            .unwrap_or_default()
    }

    pub fn is_enabled(&self) -> bool {
        self.status().enabled
    }

    pub fn enable(&self, reason: Option<&str>, updated_by: Option<&str>) -> Result<()> {
        self.write(true, reason, updated_by)
    }

    pub fn disable(&self, updated_by: Option<&str>) -> Result<()> {
        self.write(false, None, updated_by)
    }

    fn write(&self, enabled: bool, reason: Option<&str>, updated_by: Option<&str>) -> Result<()> {
        let state = LockdownState {
            enabled,
            updated_at: Some(Utc::now()),
            reason: reason.map(str::to_string),
            updated_by: updated_by.map(str::to_string),
        };
        fsx::write_json_atomic(&self.file, &state, FileMode::Public)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_is_disabled() {
        let td = tempdir().unwrap();
        let lockdown = Lockdown::new(&Paths::under(td.path()));
        assert!(!lockdown.is_enabled());
    }

    #[test]
    fn test_enable_disable_cycle() {
        let td = tempdir().unwrap();
        let lockdown = Lockdown::new(&Paths::under(td.path()));
        lockdown.enable(Some("incident response"), Some("oncall")).unwrap();
        assert!(lockdown.is_enabled());
        let status = lockdown.status();
        assert_eq!(status.reason.as_deref(), Some("incident response"));
        assert_eq!(status.updated_by.as_deref(), Some("oncall"));
        assert!(status.updated_at.is_some());

        lockdown.disable(Some("oncall")).unwrap();
        assert!(!lockdown.is_enabled());
    }

    #[test]
    fn test_corrupt_state_reads_as_disabled() {
        let td = tempdir().unwrap();
        let paths = Paths::under(td.path());
        std::fs::create_dir_all(paths.state_dir()).unwrap();
        std::fs::write(paths.lockdown_file(), "{bad json").unwrap();
        let lockdown = Lockdown::new(&paths);
        assert!(!lockdown.is_enabled());
    }
}
