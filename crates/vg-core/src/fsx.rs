//! Atomic state-file replacement.
//!
//! Every durable file in the state directory follows the same discipline:
//! read, mutate in memory, write to a temp file in the same directory, then
//! rename onto the final path. Readers observe either the old or the new
//! content, never a torn write.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

/// File mode for a durable state file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    /// Secret-bearing content (trust store, session ledgers): 0600.
    Secret,
    /// Non-secret state (metrics, lockdown): 0644.
    Public,
}

impl FileMode {
    #[cfg(unix)]
    fn bits(self) -> u32 {
        match self {
            FileMode::Secret => 0o600,
            FileMode::Public => 0o644,
        }
    }
}

/// Atomically replace `path` with `contents`.
pub fn write_atomic(path: &Path, contents: &[u8], mode: FileMode) -> Result<()> {
    let dir = path
        .parent()
        .with_context(|| format!("State file has no parent directory: {}", path.display()))?;
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    tmp.write_all(contents)
        .with_context(|| format!("Failed to write temp file for {}", path.display()))?;
    tmp.flush()
        .with_context(|| format!("Failed to flush temp file for {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(mode.bits()))
            .with_context(|| format!("Failed to set mode on temp file for {}", path.display()))?;
    }
    #[cfg(not(unix))]
    {
        let _ = mode;
    }

    tmp.persist(path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

/// Serialize `value` as pretty JSON and atomically replace `path`.
pub fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T, mode: FileMode) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    write_atomic(path, &json, mode)
}

/// Load a JSON state file. `Ok(None)` when the file does not exist yet.
pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[test]
    fn test_write_then_read_roundtrip() {
        let td = tempdir().unwrap();
        let path = td.path().join("sample.json");
        let value = Sample {
            name: "vg".to_string(),
            count: 3,
        };
        write_json_atomic(&path, &value, FileMode::Public).unwrap();
        let back: Sample = read_json(&path).unwrap().unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_read_missing_file_is_none() {
        let td = tempdir().unwrap();
        let missing: Option<Sample> = read_json(&td.path().join("absent.json")).unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_replace_overwrites_previous_content() {
        let td = tempdir().unwrap();
        let path = td.path().join("state.json");
        write_atomic(&path, b"{\"name\":\"a\",\"count\":1}", FileMode::Public).unwrap();
        write_atomic(&path, b"{\"name\":\"b\",\"count\":2}", FileMode::Public).unwrap();
        let back: Sample = read_json(&path).unwrap().unwrap();
        assert_eq!(back.name, "b");
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let td = tempdir().unwrap();
        let path = td.path().join("state.json");
        write_atomic(&path, b"{}", FileMode::Public).unwrap();
        let names: Vec<_> = fs::read_dir(td.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["state.json".to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn test_secret_mode_is_0600() {
        use std::os::unix::fs::PermissionsExt;
        let td = tempdir().unwrap();
        let path = td.path().join("trust.json");
        write_atomic(&path, b"{}", FileMode::Secret).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_read_corrupt_file_is_error() {
        let td = tempdir().unwrap();
        let path = td.path().join("bad.json");
        fs::write(&path, "not json").unwrap();
        let result: Result<Option<Sample>> = read_json(&path);
        assert!(result.is_err());
    }
}
