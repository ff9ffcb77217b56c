//! Configuration sections and their defaults.

use serde::{Deserialize, Serialize};
use vg_core::{GuardError, GuardLevel};

/// Guard level as configured: a fixed level or `auto`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardLevelSetting {
    Auto,
    Fixed(GuardLevel),
}

impl Default for GuardLevelSetting {
    fn default() -> Self {
        GuardLevelSetting::Auto
    }
}

impl std::str::FromStr for GuardLevelSetting {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "auto" {
            Ok(GuardLevelSetting::Auto)
        } else {
            Ok(GuardLevelSetting::Fixed(s.parse()?))
        }
    }
}

impl std::fmt::Display for GuardLevelSetting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuardLevelSetting::Auto => write!(f, "auto"),
            GuardLevelSetting::Fixed(level) => write!(f, "{level}"),
        }
    }
}

impl Serialize for GuardLevelSetting {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for GuardLevelSetting {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    pub level: GuardLevelSetting,
    /// Floor applied to the auto-resolved level.
    pub floor: GuardLevel,
    pub allow_user_bypass: bool,
    pub bypass_env_var: String,
}

impl Default for GuardConfig {
    fn default() -> Self {
        GuardConfig {
            level: GuardLevelSetting::Auto,
            floor: GuardLevel::Off,
            allow_user_bypass: false,
            bypass_env_var: "VECTRAGUARD_BYPASS".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub block_force_git: bool,
    pub only_destructive_sql: bool,
    /// Substring matches promoted to at least `high`.
    pub denylist: Vec<String>,
    /// Substring matches demoted to `low` unless a critical rule matched.
    pub allowlist: Vec<String>,
    /// Treat `.env` / sensitive-variable reads as medium risk.
    pub protect_env_reads: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        AnalyzerConfig {
            block_force_git: true,
            only_destructive_sql: true,
            denylist: Vec::new(),
            allowlist: Vec::new(),
            protect_env_reads: true,
        }
    }
}

/// How sensitive environment values are masked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskMode {
    #[default]
    Full,
    Partial,
    Hash,
    Fake,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvProtectConfig {
    pub enabled: bool,
    pub mode: MaskMode,
    /// Names treated as sensitive in addition to the built-in patterns.
    pub extra_sensitive: Vec<String>,
}

impl Default for EnvProtectConfig {
    fn default() -> Self {
        EnvProtectConfig {
            enabled: true,
            mode: MaskMode::Full,
            extra_sensitive: Vec::new(),
        }
    }
}

/// Capability-bounding-set policy for the mount-namespace runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilitySet {
    /// Drop the entire bounding set.
    None,
    Minimal,
    #[default]
    Normal,
}

/// Seccomp profile for the mount-namespace runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeccompProfile {
    Minimal,
    #[default]
    Strict,
    Moderate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// `auto` or a fixed runtime name (`bubblewrap`, `namespace`, `docker`, `none`).
    pub runtime: String,
    pub allow_network: bool,
    /// Mount `/tmp` as an overlay over the host `/tmp` instead of a tmpfs.
    pub overlay_tmp: bool,
    pub capability_set: CapabilitySet,
    pub seccomp_profile: SeccompProfile,
    pub docker_image: String,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        SandboxConfig {
            runtime: "auto".to_string(),
            allow_network: false,
            overlay_tmp: false,
            capability_set: CapabilitySet::default(),
            seccomp_profile: SeccompProfile::default(),
            docker_image: "debian:stable-slim".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationPolicy {
    Age,
    Count,
    Size,
    #[default]
    AgeAndCount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SoftDeleteConfig {
    pub enabled: bool,
    pub rotation_policy: RotationPolicy,
    pub max_age_days: u64,
    pub max_backups: usize,
    pub max_size_mb: u64,
    /// Permanently remove backups older than `auto_delete_after_days`.
    /// Rotation trims the retention window; this is the destructive step.
    pub auto_delete: bool,
    pub auto_delete_after_days: u64,
    /// Git-marked backups get twice the auto-delete threshold.
    pub protect_git: bool,
    /// Refuse to intercept paths that escape the workspace.
    pub restrict_to_workspace: bool,
}

impl Default for SoftDeleteConfig {
    fn default() -> Self {
        SoftDeleteConfig {
            enabled: true,
            rotation_policy: RotationPolicy::AgeAndCount,
            max_age_days: 30,
            max_backups: 50,
            max_size_mb: 1024,
            auto_delete: false,
            auto_delete_after_days: 7,
            protect_git: true,
            restrict_to_workspace: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Glob patterns and `dir/` prefixes excluded from secret scans.
    pub ignore_paths: Vec<String>,
    /// Exact secret values that are known placeholders.
    pub secret_allowlist: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig { enabled: true }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub guard: GuardConfig,
    pub analyzer: AnalyzerConfig,
    pub env: EnvProtectConfig,
    pub sandbox: SandboxConfig,
    pub soft_delete: SoftDeleteConfig,
    pub scanner: ScannerConfig,
    pub metrics: MetricsConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sound() {
        let config = Config::default();
        assert_eq!(config.guard.level, GuardLevelSetting::Auto);
        assert_eq!(config.guard.bypass_env_var, "VECTRAGUARD_BYPASS");
        assert!(config.analyzer.block_force_git);
        assert!(config.soft_delete.protect_git);
        assert!(config.metrics.enabled);
    }

    #[test]
    fn test_guard_level_setting_parses_auto_and_fixed() {
        assert_eq!(
            "auto".parse::<GuardLevelSetting>().unwrap(),
            GuardLevelSetting::Auto
        );
        assert_eq!(
            "paranoid".parse::<GuardLevelSetting>().unwrap(),
            GuardLevelSetting::Fixed(GuardLevel::Paranoid)
        );
        assert!("bananas".parse::<GuardLevelSetting>().is_err());
    }

    #[test]
    fn test_config_from_toml() {
        let config: Config = toml::from_str(
            r#"
[guard]
level = "high"
allow_user_bypass = true

[analyzer]
denylist = ["terraform destroy"]

[sandbox]
runtime = "bubblewrap"
allow_network = true

[soft_delete]
rotation_policy = "size"
max_size_mb = 256
"#,
        )
        .unwrap();
        assert_eq!(
            config.guard.level,
            GuardLevelSetting::Fixed(GuardLevel::High)
        );
        assert!(config.guard.allow_user_bypass);
        assert_eq!(config.analyzer.denylist, vec!["terraform destroy"]);
        assert_eq!(config.sandbox.runtime, "bubblewrap");
        assert_eq!(config.soft_delete.rotation_policy, RotationPolicy::Size);
        assert_eq!(config.soft_delete.max_size_mb, 256);
        // Untouched sections keep their defaults.
        assert!(config.metrics.enabled);
    }

    #[test]
    fn test_unknown_guard_level_is_a_config_error() {
        let result: Result<Config, _> = toml::from_str("[guard]\nlevel = \"frantic\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_mask_mode_snake_case() {
        let config: EnvProtectConfig = toml::from_str("mode = \"partial\"\n").unwrap();
        assert_eq!(config.mode, MaskMode::Partial);
    }
}
