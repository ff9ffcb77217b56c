//! The single directory-traversal primitive shared by every scanner.

use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use vg_core::CancelToken;

/// Directory names never descended into.
pub const SKIP_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".vectra-guard",
    "node_modules",
    "vendor",
    "dist",
    "build",
    ".venv",
    "venv",
];

/// Exact lockfile names skipped by every scanner. Any other `*.lock` file is
/// skipped as well.
pub const LOCKFILES: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "bun.lockb",
    "poetry.lock",
    "Pipfile.lock",
    "pdm.lock",
    "uv.lock",
    "Cargo.lock",
    "go.sum",
    "composer.lock",
];

/// Media and binary extensions that carry no scannable text.
pub const BINARY_EXTS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "webp", "ico", "bmp", "pdf", "zip", "gz", "bz2", "xz", "zst",
    "tar", "7z", "exe", "dll", "so", "dylib", "a", "o", "class", "jar", "war", "wasm", "mp3",
    "mp4", "mov", "avi", "ogg", "woff", "woff2", "ttf", "eot", "otf", "db", "sqlite", "bin",
    "dat",
];

pub fn should_skip_dir(name: &str) -> bool {
    SKIP_DIRS.contains(&name)
}

pub fn is_lockfile(name: &str) -> bool {
    LOCKFILES.contains(&name) || name.ends_with(".lock")
}

pub fn has_binary_ext(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            let lower = ext.to_ascii_lowercase();
            BINARY_EXTS.contains(&lower.as_str())
        })
        .unwrap_or(false)
}

/// Content sniff: NUL bytes or invalid UTF-8 in the head mean "probably
/// binary". Only the secret scanner pays for this extra read.
pub fn looks_binary(head: &[u8]) -> bool {
    if head.contains(&0) {
        return true;
    }
    std::str::from_utf8(head).is_err()
}

/// Walk `root` and collect scannable files in traversal order. Walk errors
/// are returned as warnings, never as failures.
pub fn collect_files(root: &Path, cancel: &CancelToken) -> (Vec<PathBuf>, Vec<String>) {
    let mut files = Vec::new();
    let mut warnings = Vec::new();

    let mut builder = WalkBuilder::new(root);
    builder
        .hidden(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .follow_links(false)
        .filter_entry(|entry| {
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                return true;
            }
            !should_skip_dir(&entry.file_name().to_string_lossy())
        });

    for result in builder.build() {
        if cancel.is_cancelled() {
            break;
        }
        match result {
            Ok(entry) => {
                let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
                if !is_file {
                    continue;
                }
                let name = entry.file_name().to_string_lossy();
                if is_lockfile(&name) || has_binary_ext(entry.path()) {
                    continue;
                }
                files.push(entry.into_path());
            }
            Err(e) => warnings.push(format!("walk error: {e}")),
        }
    }

    (files, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_skip_dir_set() {
        for name in [".git", "node_modules", "vendor", ".venv", ".vectra-guard"] {
            assert!(should_skip_dir(name), "{name} should be skipped");
        }
        assert!(!should_skip_dir("src"));
    }

    #[test]
    fn test_lockfile_detection() {
        assert!(is_lockfile("package-lock.json"));
        assert!(is_lockfile("Cargo.lock"));
        assert!(is_lockfile("go.sum"));
        assert!(is_lockfile("anything.lock"));
        assert!(!is_lockfile("main.go"));
    }

    #[test]
    fn test_binary_ext_detection() {
        assert!(has_binary_ext(Path::new("logo.PNG")));
        assert!(has_binary_ext(Path::new("archive.tar")));
        assert!(!has_binary_ext(Path::new("main.py")));
        assert!(!has_binary_ext(Path::new("Makefile")));
    }

    #[test]
    fn test_binary_sniff() {
        assert!(looks_binary(b"abc\0def"));
        assert!(looks_binary(&[0xff, 0xfe, 0x00]));
        assert!(!looks_binary(b"plain text"));
    }

    #[test]
    fn test_collect_skips_dirs_and_lockfiles() {
        let td = tempdir().unwrap();
        fs::create_dir_all(td.path().join("node_modules/pkg")).unwrap();
        fs::create_dir_all(td.path().join("src")).unwrap();
        fs::write(td.path().join("node_modules/pkg/index.js"), "x").unwrap();
        fs::write(td.path().join("src/main.py"), "print(1)").unwrap();
        fs::write(td.path().join("yarn.lock"), "lock").unwrap();
        fs::write(td.path().join("logo.png"), [0x89u8, 0x50]).unwrap();

        let (files, warnings) = collect_files(td.path(), &CancelToken::new());
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["main.py"]);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_cancelled_walk_stops_early() {
        let td = tempdir().unwrap();
        fs::write(td.path().join("a.py"), "x").unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let (files, _) = collect_files(td.path(), &cancel);
        assert!(files.is_empty());
    }
}
