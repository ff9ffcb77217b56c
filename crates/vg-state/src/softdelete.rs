//! Soft-delete manager: intercepted `rm` targets are moved into a rotating
//! backup store instead of being destroyed, preserving the workspace-relative
//! layout so a restore can put everything back bit-for-bit.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use vg_core::fsx::{self, FileMode};
use vg_core::{GuardError, Paths};
use vg_config::{RotationPolicy, SoftDeleteConfig};

/// Path components that mark a backup as git-protected.
pub const GIT_PROTECTED_PATTERNS: &[&str] = &[
    ".git",
    ".gitignore",
    ".gitattributes",
    ".gitconfig",
    ".gitmodules",
    ".gitkeep",
];

/// Whether any component of `path` matches a git-protected pattern. Covers
/// nested paths like `.git/HEAD`, `.git/config`, `.git/hooks`, `.git/refs`
/// and `.git/objects` via the `.git` component.
pub fn is_git_path(path: &Path) -> bool {
    path.components().any(|component| {
        let name = component.as_os_str().to_string_lossy();
        GIT_PROTECTED_PATTERNS.contains(&name.as_ref())
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupEntry {
    pub original_path: String,
    pub backup_rel_path: String,
    pub size: u64,
    pub is_git_file: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupMeta {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub original_command: String,
    pub entries: Vec<BackupEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl BackupMeta {
    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }

    pub fn has_git_entries(&self) -> bool {
        self.entries.iter().any(|e| e.is_git_file)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupStats {
    pub count: usize,
    pub total_bytes: u64,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

pub struct SoftDeleteManager {
    backup_root: PathBuf,
    index_file: PathBuf,
    config: SoftDeleteConfig,
    /// Serializes concurrent interceptions within this process; across
    /// processes the unique backup id plus rename atomicity suffice.
    lock: Mutex<()>,
}

impl SoftDeleteManager {
    pub fn new(paths: &Paths, config: SoftDeleteConfig) -> Self {
        SoftDeleteManager {
            backup_root: paths.backup_dir(),
            index_file: paths.backup_index_file(),
            config,
            lock: Mutex::new(()),
        }
    }

    fn load_index(&self) -> Result<Vec<BackupMeta>> {
        Ok(fsx::read_json(&self.index_file)?.unwrap_or_default())
    }

    fn save_index(&self, index: &[BackupMeta]) -> Result<()> {
        fsx::write_json_atomic(&self.index_file, &index.to_vec(), FileMode::Public)
    }

    fn new_backup_id(&self) -> String {
        let suffix = ulid::Ulid::new().to_string().to_ascii_lowercase();
        format!(
            "{}-{}",
            Utc::now().format("%Y%m%d-%H%M%S"),
            &suffix[suffix.len() - 6..]
        )
    }

    /// Move `targets` into a fresh backup instead of deleting them.
    pub fn intercept(
        &self,
        targets: &[PathBuf],
        workspace: &Path,
        original_command: &str,
        session_id: Option<&str>,
    ) -> Result<BackupMeta> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let workspace = workspace
            .canonicalize()
            .with_context(|| format!("Failed to resolve workspace {}", workspace.display()))?;

        let mut resolved = Vec::with_capacity(targets.len());
        for target in targets {
            let absolute = if target.is_absolute() {
                target.clone()
            } else {
                workspace.join(target)
            };
            let canonical = absolute
                .canonicalize()
                .with_context(|| format!("Cannot back up missing path {}", absolute.display()))?;
            if self.config.restrict_to_workspace && !canonical.starts_with(&workspace) {
                bail!(
                    "refusing to intercept path outside the workspace: {}",
                    canonical.display()
                );
            }
            resolved.push(canonical);
        }

        let id = self.new_backup_id();
        let backup_dir = self.backup_root.join(&id);
        fs::create_dir_all(&backup_dir)
            .with_context(|| format!("Failed to create backup dir {}", backup_dir.display()))?;

        let mut entries = Vec::with_capacity(resolved.len());
        for path in &resolved {
            let rel: PathBuf = match path.strip_prefix(&workspace) {
                Ok(rel) => rel.to_path_buf(),
                // Outside the workspace: keep the full layout under the
                // backup root, minus the leading separator.
                Err(_) => path.components().skip(1).collect(),
            };
            let dest = backup_dir.join(&rel);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create backup subdir {}", parent.display())
                })?;
            }
            let size = path_size(path);
            move_path(path, &dest)?;
            entries.push(BackupEntry {
                original_path: path.to_string_lossy().to_string(),
                backup_rel_path: rel.to_string_lossy().to_string(),
                size,
                is_git_file: is_git_path(path),
            });
        }

        let meta = BackupMeta {
            id,
            created_at: Utc::now(),
            original_command: original_command.to_string(),
            entries,
            session_id: session_id.map(str::to_string),
        };

        let mut index = self.load_index()?;
        index.push(meta.clone());
        self.save_index(&index)?;

        self.rotate_locked(&mut index)?;
        if self.config.auto_delete {
            self.auto_delete_locked(&mut index)?;
        }

        Ok(meta)
    }

    /// Re-create every entry of a backup, optionally rebased under `to`.
    /// Entries are moved back (preserving timestamps), so a fully restored
    /// backup is consumed. Returns the number of restored entries.
    pub fn restore(&self, id: &str, to: Option<&Path>) -> Result<usize> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut index = self.load_index()?;
        let meta = index
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| GuardError::BackupNotFound(id.to_string()))?;

        let backup_dir = self.backup_root.join(&meta.id);
        let mut restored = 0;
        for entry in &meta.entries {
            let src = backup_dir.join(&entry.backup_rel_path);
            let dest = match to {
                Some(base) => base.join(&entry.backup_rel_path),
                None => PathBuf::from(&entry.original_path),
            };
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create restore dir {}", parent.display())
                })?;
            }
            move_path(&src, &dest)?;
            restored += 1;
        }

        if fs::remove_dir_all(&backup_dir).is_ok() {
            index.retain(|m| m.id != meta.id);
            self.save_index(&index)?;
        }
        Ok(restored)
    }

    pub fn list(&self) -> Result<Vec<BackupMeta>> {
        let mut index = self.load_index()?;
        index.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(index)
    }

    pub fn show(&self, id: &str) -> Result<BackupMeta> {
        self.load_index()?
            .into_iter()
            .find(|m| m.id == id)
            .ok_or_else(|| GuardError::BackupNotFound(id.to_string()).into())
    }

    pub fn stats(&self) -> Result<BackupStats> {
        let index = self.load_index()?;
        Ok(BackupStats {
            count: index.len(),
            total_bytes: index.iter().map(BackupMeta::total_bytes).sum(),
            oldest: index.iter().map(|m| m.created_at).min(),
            newest: index.iter().map(|m| m.created_at).max(),
        })
    }

    /// Apply the configured rotation policy. Returns removed backup count.
    pub fn rotate(&self) -> Result<usize> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut index = self.load_index()?;
        self.rotate_locked(&mut index)
    }

    fn rotate_locked(&self, index: &mut Vec<BackupMeta>) -> Result<usize> {
        let mut removed = 0;
        let policy = self.config.rotation_policy;

        if matches!(policy, RotationPolicy::Age | RotationPolicy::AgeAndCount) {
            let cutoff = Utc::now() - Duration::days(self.config.max_age_days as i64);
            removed += self.remove_matching(index, |m| m.created_at < cutoff)?;
        }
        if matches!(policy, RotationPolicy::Count | RotationPolicy::AgeAndCount) {
            while index.len() > self.config.max_backups {
                let oldest = oldest_id(index);
                removed += self.remove_matching(index, |m| m.id == oldest)?;
            }
        }
        if matches!(policy, RotationPolicy::Size) {
            let budget = self.config.max_size_mb * 1024 * 1024;
            while index.len() > 1
                && index.iter().map(BackupMeta::total_bytes).sum::<u64>() > budget
            {
                let oldest = oldest_id(index);
                removed += self.remove_matching(index, |m| m.id == oldest)?;
            }
        }
        Ok(removed)
    }

    /// Permanently remove backups past the auto-delete threshold. Backups
    /// touching git files get twice the threshold when `protect_git` is set.
    pub fn auto_delete_expired(&self) -> Result<usize> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut index = self.load_index()?;
        self.auto_delete_locked(&mut index)
    }

    fn auto_delete_locked(&self, index: &mut Vec<BackupMeta>) -> Result<usize> {
        let days = self.config.auto_delete_after_days as i64;
        let now = Utc::now();
        let plain_cutoff = now - Duration::days(days);
        let git_cutoff = now - Duration::days(days * 2);
        let protect_git = self.config.protect_git;
        self.remove_matching(index, |m| {
            let cutoff = if protect_git && m.has_git_entries() {
                git_cutoff
            } else {
                plain_cutoff
            };
            m.created_at < cutoff
        })
    }

    fn remove_matching<F: Fn(&BackupMeta) -> bool>(
        &self,
        index: &mut Vec<BackupMeta>,
        predicate: F,
    ) -> Result<usize> {
        let doomed: Vec<String> = index
            .iter()
            .filter(|m| predicate(m))
            .map(|m| m.id.clone())
            .collect();
        if doomed.is_empty() {
            return Ok(0);
        }
        for id in &doomed {
            let dir = self.backup_root.join(id);
            if dir.exists() {
                fs::remove_dir_all(&dir)
                    .with_context(|| format!("Failed to remove backup {}", dir.display()))?;
            }
        }
        index.retain(|m| !doomed.contains(&m.id));
        self.save_index(index)?;
        Ok(doomed.len())
    }
}

fn oldest_id(index: &[BackupMeta]) -> String {
    index
        .iter()
        .min_by_key(|m| m.created_at)
        .map(|m| m.id.clone())
        .unwrap_or_default()
}

/// Total size of a file or directory tree.
fn path_size(path: &Path) -> u64 {
    let Ok(metadata) = fs::symlink_metadata(path) else {
        return 0;
    };
    if metadata.is_file() {
        return metadata.len();
    }
    if !metadata.is_dir() {
        return 0;
    }
    let Ok(entries) = fs::read_dir(path) else {
        return 0;
    };
    entries
        .flatten()
        .map(|entry| path_size(&entry.path()))
        .sum()
}

/// Move with a copy+remove fallback for cross-device renames.
fn move_path(src: &Path, dest: &Path) -> Result<()> {
    if fs::rename(src, dest).is_ok() {
        return Ok(());
    }
    copy_path(src, dest)?;
    if src.is_dir() {
        fs::remove_dir_all(src)
            .with_context(|| format!("Failed to remove moved dir {}", src.display()))?;
    } else {
        fs::remove_file(src)
            .with_context(|| format!("Failed to remove moved file {}", src.display()))?;
    }
    Ok(())
}

fn copy_path(src: &Path, dest: &Path) -> Result<()> {
    if src.is_dir() {
        fs::create_dir_all(dest)
            .with_context(|| format!("Failed to create {}", dest.display()))?;
        for entry in
            fs::read_dir(src).with_context(|| format!("Failed to read {}", src.display()))?
        {
            let entry = entry?;
            copy_path(&entry.path(), &dest.join(entry.file_name()))?;
        }
    } else {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::copy(src, dest).with_context(|| {
            format!("Failed to copy {} to {}", src.display(), dest.display())
        })?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "softdelete_tests.rs"]
mod tests;
