//! Bubblewrap argument construction. Pure: the builder receives the
//! workspace and the pre-filtered cache directories and emits the argv that
//! `bwrap` will be spawned with.

use std::path::{Path, PathBuf};

/// Per-user cache directories bind-mounted read-write (relative to `$HOME`)
/// so sandboxed builds keep their caches warm.
pub const CACHE_DIRS: &[&str] = &[
    ".cache",
    ".npm",
    ".cargo",
    ".rustup",
    "go",
    ".m2",
    ".gradle",
    ".pip",
    ".local/share/virtualenvs",
];

#[derive(Debug, Clone)]
pub struct BwrapOptions {
    pub workspace: PathBuf,
    pub cache_dirs: Vec<PathBuf>,
    pub allow_network: bool,
}

/// Cache directories under `home` that actually exist.
pub fn existing_cache_dirs(home: &Path) -> Vec<PathBuf> {
    CACHE_DIRS
        .iter()
        .map(|rel| home.join(rel))
        .filter(|p| p.exists())
        .collect()
}

/// Build the full bwrap argv (without the leading program name), ending with
/// `--` and the command argv.
pub fn build_args(opts: &BwrapOptions, command_argv: &[String]) -> Vec<String> {
    let workspace = opts.workspace.to_string_lossy().to_string();
    let mut args: Vec<String> = vec![
        "--ro-bind".into(),
        "/".into(),
        "/".into(),
        "--dev".into(),
        "/dev".into(),
        "--proc".into(),
        "/proc".into(),
        "--tmpfs".into(),
        "/tmp".into(),
        "--bind".into(),
        workspace.clone(),
        workspace.clone(),
        "--bind".into(),
        workspace.clone(),
        "/workspace".into(),
    ];

    for cache in &opts.cache_dirs {
        let cache = cache.to_string_lossy().to_string();
        args.push("--bind".into());
        args.push(cache.clone());
        args.push(cache);
    }

    args.push("--unshare-all".into());
    if opts.allow_network {
        args.push("--share-net".into());
    }
    args.push("--die-with-parent".into());
    args.push("--new-session".into());
    args.push("--cap-drop".into());
    args.push("ALL".into());
    args.push("--chdir".into());
    args.push(workspace);
    args.push("--".into());
    args.extend(command_argv.iter().cloned());
    args
}
