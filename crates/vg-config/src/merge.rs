//! Layered loading and assignment-based merging.

use crate::config::{
    CapabilitySet, Config, GuardLevelSetting, MaskMode, RotationPolicy, SeccompProfile,
};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use vg_core::GuardLevel;

/// A partial configuration layer. Every field is optional; present fields
/// overwrite the accumulated value by plain assignment.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigOverlay {
    pub guard: GuardOverlay,
    pub analyzer: AnalyzerOverlay,
    pub env: EnvOverlay,
    pub sandbox: SandboxOverlay,
    pub soft_delete: SoftDeleteOverlay,
    pub scanner: ScannerOverlay,
    pub metrics: MetricsOverlay,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GuardOverlay {
    pub level: Option<GuardLevelSetting>,
    pub floor: Option<GuardLevel>,
    pub allow_user_bypass: Option<bool>,
    pub bypass_env_var: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnalyzerOverlay {
    pub block_force_git: Option<bool>,
    pub only_destructive_sql: Option<bool>,
    pub denylist: Option<Vec<String>>,
    pub allowlist: Option<Vec<String>>,
    pub protect_env_reads: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EnvOverlay {
    pub enabled: Option<bool>,
    pub mode: Option<MaskMode>,
    pub extra_sensitive: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SandboxOverlay {
    pub runtime: Option<String>,
    pub allow_network: Option<bool>,
    pub overlay_tmp: Option<bool>,
    pub capability_set: Option<CapabilitySet>,
    pub seccomp_profile: Option<SeccompProfile>,
    pub docker_image: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SoftDeleteOverlay {
    pub enabled: Option<bool>,
    pub rotation_policy: Option<RotationPolicy>,
    pub max_age_days: Option<u64>,
    pub max_backups: Option<usize>,
    pub max_size_mb: Option<u64>,
    pub auto_delete: Option<bool>,
    pub auto_delete_after_days: Option<u64>,
    pub protect_git: Option<bool>,
    pub restrict_to_workspace: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScannerOverlay {
    pub ignore_paths: Option<Vec<String>>,
    pub secret_allowlist: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MetricsOverlay {
    pub enabled: Option<bool>,
}

macro_rules! assign {
    ($target:expr, $overlay:expr, $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = $overlay.$field {
                $target.$field = value;
            }
        )+
    };
}

impl ConfigOverlay {
    /// Merge this layer into `config` by assignment.
    pub fn apply(self, config: &mut Config) {
        assign!(config.guard, self.guard, level, floor, allow_user_bypass, bypass_env_var);
        assign!(
            config.analyzer,
            self.analyzer,
            block_force_git,
            only_destructive_sql,
            denylist,
            allowlist,
            protect_env_reads,
        );
        assign!(config.env, self.env, enabled, mode, extra_sensitive);
        assign!(
            config.sandbox,
            self.sandbox,
            runtime,
            allow_network,
            overlay_tmp,
            capability_set,
            seccomp_profile,
            docker_image,
        );
        assign!(
            config.soft_delete,
            self.soft_delete,
            enabled,
            rotation_policy,
            max_age_days,
            max_backups,
            max_size_mb,
            auto_delete,
            auto_delete_after_days,
            protect_git,
            restrict_to_workspace,
        );
        assign!(config.scanner, self.scanner, ignore_paths, secret_allowlist);
        assign!(config.metrics, self.metrics, enabled);
    }
}

fn load_overlay(path: &Path) -> Result<Option<ConfigOverlay>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    let overlay = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config: {}", path.display()))?;
    Ok(Some(overlay))
}

/// Load built-in defaults, then the global file, then the project file.
pub fn load_layered(global: &Path, project: Option<&Path>) -> Result<Config> {
    let mut config = Config::default();
    if let Some(overlay) = load_overlay(global)? {
        overlay.apply(&mut config);
    }
    if let Some(project) = project {
        if let Some(overlay) = load_overlay(project)? {
            overlay.apply(&mut config);
        }
    }
    Ok(config)
}
