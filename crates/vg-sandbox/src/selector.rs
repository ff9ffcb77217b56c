//! Map (environment, capabilities) to a runtime choice.

use crate::caps::Capabilities;
use crate::environment::Environment;
use vg_core::GuardError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxRuntime {
    Docker,
    Bubblewrap,
    Namespace,
    None,
}

impl std::fmt::Display for SandboxRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SandboxRuntime::Docker => write!(f, "docker"),
            SandboxRuntime::Bubblewrap => write!(f, "bubblewrap"),
            SandboxRuntime::Namespace => write!(f, "namespace"),
            SandboxRuntime::None => write!(f, "none"),
        }
    }
}

impl std::str::FromStr for SandboxRuntime {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "docker" => Ok(SandboxRuntime::Docker),
            "bubblewrap" | "bwrap" => Ok(SandboxRuntime::Bubblewrap),
            "namespace" => Ok(SandboxRuntime::Namespace),
            "none" => Ok(SandboxRuntime::None),
            other => Err(GuardError::Config(format!("unknown sandbox runtime '{other}'"))),
        }
    }
}

/// Preference order per environment. CI/prod/container environments favor
/// full container isolation; dev favors the cheap local backends so build
/// caches stay warm.
pub fn ranked(env: Environment) -> [SandboxRuntime; 4] {
    if env.is_hardened() {
        [
            SandboxRuntime::Docker,
            SandboxRuntime::Bubblewrap,
            SandboxRuntime::Namespace,
            SandboxRuntime::None,
        ]
    } else {
        [
            SandboxRuntime::Bubblewrap,
            SandboxRuntime::Namespace,
            SandboxRuntime::Docker,
            SandboxRuntime::None,
        ]
    }
}

/// Whether a runtime can actually work with the probed capabilities.
pub fn runtime_available(runtime: SandboxRuntime, caps: &Capabilities) -> bool {
    match runtime {
        SandboxRuntime::Docker => caps.docker,
        SandboxRuntime::Bubblewrap => caps.bubblewrap,
        SandboxRuntime::Namespace => {
            cfg!(target_os = "linux") && caps.user_ns && caps.mount_ns
        }
        SandboxRuntime::None => true,
    }
}

/// Pick the best available runtime for the environment.
pub fn select_runtime(env: Environment, caps: &Capabilities) -> SandboxRuntime {
    ranked(env)
        .into_iter()
        .find(|rt| runtime_available(*rt, caps))
        .unwrap_or(SandboxRuntime::None)
}
