//! Configuration for Vectra Guard.
//!
//! Two TOML layers: the global file under the state directory, then a
//! project-local `.vectra-guard.toml`. Later layers merge **by assignment**:
//! a key present in a later layer always overwrites the earlier value, and
//! omitting a key keeps whatever the earlier layer (or the built-in default)
//! set. Once a lower layer has set a value there is no way to restore the
//! built-in default by omission; this is the intended contract.

mod config;
mod merge;

pub use config::{
    AnalyzerConfig, CapabilitySet, Config, EnvProtectConfig, GuardConfig, GuardLevelSetting,
    MaskMode, MetricsConfig, RotationPolicy, SandboxConfig, ScannerConfig, SeccompProfile,
    SoftDeleteConfig,
};
pub use merge::{ConfigOverlay, load_layered};

pub const PROJECT_CONFIG_FILE: &str = ".vectra-guard.toml";
