//! Ambient risk context: git branch, working directory, environment map and
//! OS flavor. Assembled once per invocation so the analyzer and level engine
//! stay pure.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// OS family for the protected-directory set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFlavor {
    Unix,
    Macos,
    Wsl,
}

#[derive(Debug, Clone)]
pub struct DetectionContext {
    pub git_branch: Option<String>,
    pub working_dir: Option<PathBuf>,
    pub env: HashMap<String, String>,
    pub os: OsFlavor,
}

impl DetectionContext {
    /// Empty context (tests and non-interactive callers).
    pub fn empty() -> Self {
        DetectionContext {
            git_branch: None,
            working_dir: None,
            env: HashMap::new(),
            os: OsFlavor::Unix,
        }
    }

    /// Probe the process environment and the working directory once.
    pub fn detect(working_dir: Option<&Path>) -> Self {
        let env: HashMap<String, String> = std::env::vars().collect();
        let git_branch = working_dir.and_then(read_git_branch);
        DetectionContext {
            git_branch,
            working_dir: working_dir.map(Path::to_path_buf),
            env,
            os: detect_os_flavor(),
        }
    }

    pub fn env_value(&self, name: &str) -> Option<&str> {
        self.env.get(name).map(String::as_str)
    }
}

/// Parse `.git/HEAD` in `dir` or any ancestor. Avoids spawning git.
pub fn read_git_branch(dir: &Path) -> Option<String> {
    let mut current = Some(dir);
    while let Some(candidate) = current {
        let head = candidate.join(".git").join("HEAD");
        if head.is_file() {
            let contents = fs::read_to_string(&head).ok()?;
            let trimmed = contents.trim();
            return if let Some(reference) = trimmed.strip_prefix("ref: refs/heads/") {
                Some(reference.to_string())
            } else {
                // Detached HEAD: the raw commit id is not a branch.
                None
            };
        }
        current = candidate.parent();
    }
    None
}

fn detect_os_flavor() -> OsFlavor {
    if cfg!(target_os = "macos") {
        return OsFlavor::Macos;
    }
    if std::env::var_os("WSL_DISTRO_NAME").is_some() || Path::new("/mnt/c/Windows").exists() {
        return OsFlavor::Wsl;
    }
    OsFlavor::Unix
}
