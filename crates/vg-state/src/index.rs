//! Workspace→session index and active-session resolution.
//!
//! A freshly spawned process (e.g. a shell hook) finds the active session
//! for its directory in this order:
//!
//! 1. `VECTRAGUARD_SESSION_ID`, accepted only if that session's stored
//!    workspace matches the caller's;
//! 2. the persisted index entry for the workspace;
//! 3. the global last-session file, used only when the caller has no workdir.

use crate::session::{SessionStore, normalize_workspace};
use anyhow::Result;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use vg_core::Paths;
use vg_core::fsx::{self, FileMode};

pub const SESSION_ENV_VAR: &str = "VECTRAGUARD_SESSION_ID";

pub struct WorkspaceIndex {
    paths: Paths,
}

impl WorkspaceIndex {
    pub fn new(paths: Paths) -> Self {
        WorkspaceIndex { paths }
    }

    fn load_map(&self) -> BTreeMap<String, String> {
        fsx::read_json(&self.paths.session_index_file())
            .unwrap_or_default()
            .unwrap_or_default()
    }

    pub fn get(&self, workspace: &Path) -> Option<String> {
        self.load_map().get(&normalize_workspace(workspace)).cloned()
    }

    /// Record the active session for a workspace. Best-effort: the index and
    /// the last-session fallback are written independently and failures only
    /// warn; a command is never blocked by bookkeeping.
    pub fn record_active(&self, workspace: &Path, session_id: &str) {
        let mut map = self.load_map();
        map.insert(normalize_workspace(workspace), session_id.to_string());
        if let Err(e) =
            fsx::write_json_atomic(&self.paths.session_index_file(), &map, FileMode::Public)
        {
            tracing::warn!(error = %e, "failed to update workspace index");
        }
        if let Err(e) = fs::write(self.paths.last_session_file(), session_id) {
            tracing::warn!(error = %e, "failed to update last-session fallback");
        }
    }

    pub fn remove(&self, workspace: &Path) -> Result<()> {
        let mut map = self.load_map();
        map.remove(&normalize_workspace(workspace));
        fsx::write_json_atomic(&self.paths.session_index_file(), &map, FileMode::Public)
    }

    /// Resolve the active session id for a caller.
    ///
    /// `env_session` is the value of [`SESSION_ENV_VAR`] if set. A stale env
    /// var (pointing at a session for another workspace, or one whose
    /// workspace no longer matches) is rejected and resolution falls back to
    /// the index.
    pub fn resolve_active(
        &self,
        store: &SessionStore,
        env_session: Option<&str>,
        workdir: Option<&Path>,
    ) -> Option<String> {
        if let (Some(id), Some(dir)) = (env_session, workdir) {
            match store.load(id) {
                Ok(session) if session.workspace == normalize_workspace(dir) => {
                    return Some(session.id);
                }
                Ok(_) => {
                    tracing::debug!(session_id = id, "env session belongs to another workspace");
                }
                Err(e) => {
                    tracing::debug!(session_id = id, error = %e, "env session unreadable");
                }
            }
        }

        if let Some(dir) = workdir {
            return self.get(dir);
        }

        // No workdir at all: the global fallback is the only signal left.
        fs::read_to_string(self.paths.last_session_file())
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fixtures(home: &Path) -> (SessionStore, WorkspaceIndex) {
        (
            SessionStore::new(Paths::under(home)),
            WorkspaceIndex::new(Paths::under(home)),
        )
    }

    #[test]
    fn test_record_and_get() {
        let td = tempdir().unwrap();
        let (_, index) = fixtures(td.path());
        index.record_active(td.path(), "01SESSION");
        assert_eq!(index.get(td.path()), Some("01SESSION".to_string()));
    }

    #[test]
    fn test_env_var_wins_when_workspace_matches() {
        let td = tempdir().unwrap();
        let (store, index) = fixtures(td.path());
        let ws = td.path().join("ws");
        std::fs::create_dir(&ws).unwrap();
        let session = store.create("codex", &ws).unwrap();
        index.record_active(&ws, "STALE_INDEX_ENTRY");

        let resolved = index.resolve_active(&store, Some(&session.id), Some(&ws));
        assert_eq!(resolved, Some(session.id));
    }

    #[test]
    fn test_env_var_rejected_for_other_workspace() {
        let td = tempdir().unwrap();
        let (store, index) = fixtures(td.path());
        let ws_a = td.path().join("a");
        let ws_b = td.path().join("b");
        std::fs::create_dir(&ws_a).unwrap();
        std::fs::create_dir(&ws_b).unwrap();
        let session_a = store.create("codex", &ws_a).unwrap();
        let session_b = store.create("codex", &ws_b).unwrap();
        index.record_active(&ws_b, &session_b.id);

        // Caller is in b but its env var leaked from a.
        let resolved = index.resolve_active(&store, Some(&session_a.id), Some(&ws_b));
        assert_eq!(resolved, Some(session_b.id));
    }

    #[test]
    fn test_env_var_rejected_when_session_missing() {
        let td = tempdir().unwrap();
        let (store, index) = fixtures(td.path());
        let ws = td.path().join("ws");
        std::fs::create_dir(&ws).unwrap();
        let session = store.create("codex", &ws).unwrap();
        index.record_active(&ws, &session.id);

        let resolved = index.resolve_active(&store, Some("01GONE"), Some(&ws));
        assert_eq!(resolved, Some(session.id));
    }

    #[test]
    fn test_fallback_file_only_without_workdir() {
        let td = tempdir().unwrap();
        let (store, index) = fixtures(td.path());
        index.record_active(td.path(), "01LAST");

        // With a workdir that has no index entry: no fallback.
        let other = td.path().join("other");
        std::fs::create_dir(&other).unwrap();
        assert_eq!(index.resolve_active(&store, None, Some(&other)), None);

        // Without a workdir: the fallback file is consulted.
        assert_eq!(
            index.resolve_active(&store, None, None),
            Some("01LAST".to_string())
        );
    }

    #[test]
    fn test_remove_entry() {
        let td = tempdir().unwrap();
        let (_, index) = fixtures(td.path());
        index.record_active(td.path(), "01SESSION");
        index.remove(td.path()).unwrap();
        assert_eq!(index.get(td.path()), None);
    }
}
