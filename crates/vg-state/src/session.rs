//! The session ledger: one JSON file per session, rewritten atomically on
//! every mutation. The risk score and violation count are derived values,
//! recomputed from the full record lists so the invariant cannot drift.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use vg_core::fsx::{self, FileMode};
use vg_core::{CommandRecord, FileOperation, GuardError, Paths};

/// Weight added to the risk score per disallowed file operation.
const DISALLOWED_FILE_OP_WEIGHT: u64 = 25;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// ULID: monotonic, time-derived, sortable.
    pub id: String,
    pub agent_name: String,
    /// Absolute, symlink-resolved workspace path.
    pub workspace: String,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub commands: Vec<CommandRecord>,
    #[serde(default)]
    pub file_ops: Vec<FileOperation>,
    #[serde(default)]
    pub risk_score: u64,
    #[serde(default)]
    pub violations: u64,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Session {
    /// Recompute the derived counters from the record lists.
    fn recompute(&mut self) {
        let command_score: u64 = self.commands.iter().map(|c| c.risk_level.weight()).sum();
        let disallowed_ops = self.file_ops.iter().filter(|op| !op.allowed).count() as u64;
        self.risk_score = command_score + DISALLOWED_FILE_OP_WEIGHT * disallowed_ops;
        self.violations = self
            .commands
            .iter()
            .filter(|c| c.risk_level.is_violation())
            .count() as u64
            + disallowed_ops;
    }
}

pub struct SessionStore {
    paths: Paths,
}

impl SessionStore {
    pub fn new(paths: Paths) -> Self {
        SessionStore { paths }
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    /// Create a session for a workspace. The workspace is stored absolute
    /// and symlink-resolved so index lookups are stable.
    pub fn create(&self, agent_name: &str, workspace: &Path) -> Result<Session> {
        self.paths.ensure()?;
        let workspace = normalize_workspace(workspace);
        let session = Session {
            id: ulid::Ulid::new().to_string(),
            agent_name: agent_name.to_string(),
            workspace,
            started_at: Utc::now(),
            ended_at: None,
            commands: Vec::new(),
            file_ops: Vec::new(),
            risk_score: 0,
            violations: 0,
            metadata: HashMap::new(),
        };
        self.save(&session)?;
        Ok(session)
    }

    pub fn load(&self, session_id: &str) -> Result<Session> {
        let path = self.paths.session_file(session_id);
        fsx::read_json(&path)?
            .ok_or_else(|| GuardError::SessionNotFound(session_id.to_string()).into())
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        let path = self.paths.session_file(&session.id);
        fsx::write_json_atomic(&path, session, FileMode::Secret)
            .with_context(|| format!("Failed to persist session {}", session.id))
    }

    /// Append a command record and rewrite the ledger.
    pub fn add_command(&self, session: &mut Session, record: CommandRecord) -> Result<()> {
        session.commands.push(record);
        session.recompute();
        self.save(session)
    }

    /// Append a file-operation record and rewrite the ledger.
    pub fn add_file_operation(&self, session: &mut Session, op: FileOperation) -> Result<()> {
        session.file_ops.push(op);
        session.recompute();
        self.save(session)
    }

    /// Close the session. `ended_at` never precedes `started_at`.
    pub fn end(&self, session: &mut Session) -> Result<()> {
        let now = Utc::now();
        session.ended_at = Some(now.max(session.started_at));
        self.save(session)
    }

    /// List every readable session. Corrupt files are skipped and surfaced
    /// as warnings rather than failing the listing.
    pub fn list(&self) -> Result<(Vec<Session>, Vec<String>)> {
        let dir = self.paths.session_dir();
        if !dir.exists() {
            return Ok((Vec::new(), Vec::new()));
        }
        let mut sessions = Vec::new();
        let mut warnings = Vec::new();
        let entries = fs::read_dir(&dir)
            .with_context(|| format!("Failed to read session directory: {}", dir.display()))?;
        for entry in entries {
            let entry = entry.context("Failed to read session directory entry")?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match fsx::read_json::<Session>(&path) {
                Ok(Some(session)) => sessions.push(session),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "skipping corrupt session");
                    warnings.push(format!("corrupt session file {}: {e}", path.display()));
                }
            }
        }
        sessions.sort_by(|a, b| a.id.cmp(&b.id));
        Ok((sessions, warnings))
    }
}

/// Absolute + symlink-resolved workspace key.
pub fn normalize_workspace(workspace: &Path) -> String {
    workspace
        .canonicalize()
        .unwrap_or_else(|_| workspace.to_path_buf())
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
