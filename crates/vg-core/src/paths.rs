//! Explicit state-directory layout.
//!
//! Every stateful component receives a [`Paths`] value through its
//! constructor; nothing derives `HOME` on its own. The on-disk layout is
//! fixed:
//!
//! ```text
//! ~/.vectra-guard/
//!   sessions/<id>.json
//!   session-index.json
//!   trust.json
//!   lockdown.json
//!   metrics.json
//!   backups/metadata.json
//!   backups/<id>/...
//! ~/.vectra-guard-session        (last-session fallback, home level)
//! ```

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const STATE_DIR_NAME: &str = ".vectra-guard";
const LAST_SESSION_FILE_NAME: &str = ".vectra-guard-session";

#[derive(Debug, Clone)]
pub struct Paths {
    home: PathBuf,
    state_dir: PathBuf,
}

impl Paths {
    /// Resolve against the real user home directory.
    pub fn resolve() -> Result<Self> {
        let base = directories::BaseDirs::new().context("Failed to determine home directory")?;
        Ok(Self::under(base.home_dir()))
    }

    /// Build the layout under an explicit home (test seam).
    pub fn under(home: &Path) -> Self {
        Paths {
            home: home.to_path_buf(),
            state_dir: home.join(STATE_DIR_NAME),
        }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn session_dir(&self) -> PathBuf {
        self.state_dir.join("sessions")
    }

    pub fn session_file(&self, session_id: &str) -> PathBuf {
        self.session_dir().join(format!("{session_id}.json"))
    }

    pub fn session_index_file(&self) -> PathBuf {
        self.state_dir.join("session-index.json")
    }

    pub fn trust_file(&self) -> PathBuf {
        self.state_dir.join("trust.json")
    }

    pub fn lockdown_file(&self) -> PathBuf {
        self.state_dir.join("lockdown.json")
    }

    pub fn metrics_file(&self) -> PathBuf {
        self.state_dir.join("metrics.json")
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.state_dir.join("backups")
    }

    pub fn backup_index_file(&self) -> PathBuf {
        self.backup_dir().join("metadata.json")
    }

    pub fn global_config_file(&self) -> PathBuf {
        self.state_dir.join("config.toml")
    }

    /// Fallback file recording only the last session id. Lives next to the
    /// state dir, not inside it, so shell hooks can read it cheaply.
    pub fn last_session_file(&self) -> PathBuf {
        self.home.join(LAST_SESSION_FILE_NAME)
    }

    /// Create the state directories. The state root is user-private (0700).
    pub fn ensure(&self) -> Result<()> {
        for dir in [&self.state_dir, &self.session_dir(), &self.backup_dir()] {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o700);
            fs::set_permissions(&self.state_dir, perms).with_context(|| {
                format!("Failed to restrict state directory: {}", self.state_dir.display())
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_layout_under_home() {
        let paths = Paths::under(Path::new("/home/dev"));
        assert_eq!(paths.state_dir(), Path::new("/home/dev/.vectra-guard"));
        assert_eq!(
            paths.session_file("01ABC"),
            Path::new("/home/dev/.vectra-guard/sessions/01ABC.json")
        );
        assert_eq!(
            paths.last_session_file(),
            Path::new("/home/dev/.vectra-guard-session")
        );
        assert_eq!(
            paths.backup_index_file(),
            Path::new("/home/dev/.vectra-guard/backups/metadata.json")
        );
    }

    #[test]
    fn test_ensure_creates_directories() {
        let td = tempdir().unwrap();
        let paths = Paths::under(td.path());
        paths.ensure().unwrap();
        assert!(paths.state_dir().is_dir());
        assert!(paths.session_dir().is_dir());
        assert!(paths.backup_dir().is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_ensure_sets_private_mode() {
        use std::os::unix::fs::PermissionsExt;
        let td = tempdir().unwrap();
        let paths = Paths::under(td.path());
        paths.ensure().unwrap();
        let mode = fs::metadata(paths.state_dir()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }
}
