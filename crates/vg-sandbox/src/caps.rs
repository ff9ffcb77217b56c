//! Host isolation-capability probing. Probed once per process and reused.

use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub bubblewrap: bool,
    pub docker: bool,
    pub user_ns: bool,
    pub mount_ns: bool,
    pub net_ns: bool,
    pub seccomp: bool,
    pub overlayfs: bool,
}

static CAPABILITIES: OnceLock<Capabilities> = OnceLock::new();

/// Return the detected capabilities, probing only once per process.
pub fn detect_capabilities() -> Capabilities {
    *CAPABILITIES.get_or_init(probe_capabilities)
}

fn probe_capabilities() -> Capabilities {
    Capabilities {
        bubblewrap: which::which("bwrap").is_ok(),
        docker: docker_usable(),
        user_ns: Path::new("/proc/self/ns/user").exists(),
        mount_ns: Path::new("/proc/self/ns/mnt").exists(),
        net_ns: Path::new("/proc/self/ns/net").exists(),
        seccomp: Path::new("/proc/sys/kernel/seccomp").exists(),
        overlayfs: Path::new("/sys/module/overlay").exists(),
    }
}

/// Docker counts only when the binary exists *and* the daemon answers.
fn docker_usable() -> bool {
    if which::which("docker").is_err() {
        return false;
    }
    Command::new("docker")
        .arg("info")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
}
