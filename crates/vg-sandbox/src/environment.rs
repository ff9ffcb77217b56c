//! Execution-environment detection: explicit override, CI markers,
//! container markers, then a `.git` heuristic.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub const ENV_OVERRIDE_VAR: &str = "VECTRAGUARD_ENV";

/// CI systems recognized by their well-known environment variables.
pub const CI_ENV_VARS: &[&str] = &[
    "CI",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "CIRCLECI",
    "TRAVIS",
    "JENKINS_URL",
    "BUILDKITE",
    "DRONE",
    "BITBUCKET_PIPELINE",
    "TF_BUILD",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Ci,
    Prod,
    Container,
}

impl Environment {
    /// CI, prod and containers share the conservative runtime ranking.
    pub fn is_hardened(self) -> bool {
        !matches!(self, Environment::Dev)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Dev => write!(f, "dev"),
            Environment::Ci => write!(f, "ci"),
            Environment::Prod => write!(f, "prod"),
            Environment::Container => write!(f, "container"),
        }
    }
}

/// Host facts the pure classifier consumes (probed once).
#[derive(Debug, Clone, Copy, Default)]
pub struct HostProbes {
    pub has_dockerenv: bool,
    pub cgroup_mentions_container: bool,
    pub has_git_dir: bool,
}

/// Pure classification over the env map and host probes.
pub fn classify_environment(env: &HashMap<String, String>, probes: &HostProbes) -> Environment {
    if let Some(value) = env.get(ENV_OVERRIDE_VAR) {
        match value.as_str() {
            "dev" | "development" => return Environment::Dev,
            "ci" | "continuous-integration" => return Environment::Ci,
            "prod" | "production" => return Environment::Prod,
            other => {
                tracing::warn!(value = other, "ignoring unknown {ENV_OVERRIDE_VAR} value");
            }
        }
    }

    if CI_ENV_VARS.iter().any(|var| env.contains_key(*var)) {
        return Environment::Ci;
    }

    if probes.has_dockerenv || env.contains_key("container") || probes.cgroup_mentions_container {
        return Environment::Container;
    }

    if probes.has_git_dir {
        return Environment::Dev;
    }

    Environment::Dev
}

/// Probe the filesystem and classify.
pub fn detect_environment(env: &HashMap<String, String>, cwd: &Path) -> Environment {
    let probes = HostProbes {
        has_dockerenv: Path::new("/.dockerenv").exists(),
        cgroup_mentions_container: cgroup_mentions_container(),
        has_git_dir: cwd.join(".git").exists(),
    };
    classify_environment(env, &probes)
}

fn cgroup_mentions_container() -> bool {
    fs::read_to_string("/proc/1/cgroup")
        .map(|contents| {
            contents.contains("docker")
                || contents.contains("kubepods")
                || contents.contains("containerd")
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_explicit_override_wins() {
        let probes = HostProbes::default();
        assert_eq!(
            classify_environment(&env(&[("VECTRAGUARD_ENV", "prod"), ("CI", "true")]), &probes),
            Environment::Prod
        );
        assert_eq!(
            classify_environment(&env(&[("VECTRAGUARD_ENV", "development")]), &probes),
            Environment::Dev
        );
        assert_eq!(
            classify_environment(
                &env(&[("VECTRAGUARD_ENV", "continuous-integration")]),
                &probes
            ),
            Environment::Ci
        );
    }

    #[test]
    fn test_unknown_override_falls_through() {
        let probes = HostProbes::default();
        assert_eq!(
            classify_environment(&env(&[("VECTRAGUARD_ENV", "qa"), ("CI", "1")]), &probes),
            Environment::Ci
        );
    }

    #[test]
    fn test_ci_variables() {
        let probes = HostProbes::default();
        for var in CI_ENV_VARS {
            assert_eq!(
                classify_environment(&env(&[(var, "1")]), &probes),
                Environment::Ci,
                "{var} should mark CI"
            );
        }
    }

    #[test]
    fn test_container_markers() {
        let mut probes = HostProbes::default();
        probes.has_dockerenv = true;
        assert_eq!(classify_environment(&env(&[]), &probes), Environment::Container);

        let probes = HostProbes {
            cgroup_mentions_container: true,
            ..HostProbes::default()
        };
        assert_eq!(classify_environment(&env(&[]), &probes), Environment::Container);

        assert_eq!(
            classify_environment(&env(&[("container", "podman")]), &HostProbes::default()),
            Environment::Container
        );
    }

    #[test]
    fn test_git_dir_and_default_are_dev() {
        let probes = HostProbes {
            has_git_dir: true,
            ..HostProbes::default()
        };
        assert_eq!(classify_environment(&env(&[]), &probes), Environment::Dev);
        assert_eq!(
            classify_environment(&env(&[]), &HostProbes::default()),
            Environment::Dev
        );
    }

    #[test]
    fn test_hardened_split() {
        assert!(!Environment::Dev.is_hardened());
        assert!(Environment::Ci.is_hardened());
        assert!(Environment::Prod.is_hardened());
        assert!(Environment::Container.is_hardened());
    }
}
