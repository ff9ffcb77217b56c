//! The execution pipeline: classify → resolve level → decide → approve /
//! intercept / dispatch → record.
//!
//! The pipeline returns [`ExecOutcome`], a sum type: blocked commands and
//! sandbox setup failures are expected results, not errors. Ledger and
//! metrics writes are best-effort; a command is never blocked because its
//! bookkeeping failed.

use crate::bubblewrap::{self, BwrapOptions};
use crate::caps::detect_capabilities;
use crate::environment::detect_environment;
use crate::namespace::{self, NamespaceOptions};
use crate::selector::{self, SandboxRuntime};
use anyhow::{Context, Result};
use chrono::Utc;
use std::path::Path;
use std::process::{Command, ExitStatus};
use std::time::Instant;
use vg_config::Config;
use vg_core::{
    Classification, CommandRecord, Decision, ExecMode, ExecOutcome, FileOp, FileOperation,
    GuardLevel, Paths, RiskLevel,
};
use vg_guard::{CommandAnalyzer, DetectionContext, decide, parse_rm, resolve_effective};
use vg_state::{
    ExecutionRecord, Lockdown, MetricsCollector, SessionStore, SoftDeleteManager, TrustStore,
};

/// One command to run on behalf of an agent.
#[derive(Debug, Clone)]
pub struct ExecRequest<'a> {
    pub command: &'a str,
    pub workspace: &'a Path,
    pub session_id: Option<&'a str>,
}

pub struct Executor {
    config: Config,
    paths: Paths,
    analyzer: CommandAnalyzer,
    trust: TrustStore,
    lockdown: Lockdown,
    metrics: MetricsCollector,
    sessions: SessionStore,
    soft_delete: SoftDeleteManager,
}

impl Executor {
    pub fn new(config: Config, paths: Paths) -> Result<Self> {
        let trust = TrustStore::new(&paths);
        let lockdown = Lockdown::new(&paths);
        let metrics = MetricsCollector::new(&paths, config.metrics.enabled);
        let sessions = SessionStore::new(paths.clone());
        let soft_delete = SoftDeleteManager::new(&paths, config.soft_delete.clone());
        Ok(Executor {
            analyzer: CommandAnalyzer::new()?,
            config,
            paths,
            trust,
            lockdown,
            metrics,
            sessions,
            soft_delete,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one command through the full decision pipeline.
    pub fn execute(&self, request: &ExecRequest<'_>, ctx: &DetectionContext) -> Result<ExecOutcome> {
        let started_at = Utc::now();
        let timer = Instant::now();

        let classification =
            self.analyzer
                .analyze(request.command, &self.config.analyzer, ctx);
        let effective = resolve_effective(
            self.config.guard.level,
            self.config.guard.floor,
            ctx,
            request.command,
        );
        let mut decision = decide(effective, classification.risk_level);
        let mut approved_by: Option<String> = None;

        // Lockdown forbids everything until an explicit unlock.
        if self.lockdown.is_enabled() {
            let status = self.lockdown.status();
            let mut reason = "lockdown is enabled".to_string();
            if let Some(why) = status.reason {
                reason.push_str(&format!(" ({why})"));
            }
            let reasons = vec![reason];
            self.record(
                request, &classification, effective, Decision::Block, None, started_at,
                timer.elapsed().as_millis() as u64, -1, ExecMode::Host, None, "lockdown",
            );
            return Ok(ExecOutcome::Blocked(reasons));
        }

        if decision == Decision::RequireApproval {
            if self.trust.is_trusted(request.command).unwrap_or(false) {
                if let Err(e) = self.trust.record_use(request.command) {
                    tracing::warn!(error = %e, "failed to record trust-store use");
                }
                decision = Decision::AllowSandbox;
                approved_by = Some("trust-store".to_string());
            } else if self.bypass_requested(ctx) {
                decision = Decision::AllowHost;
                approved_by = Some("bypass".to_string());
            } else {
                let mut reasons = display_reasons(&classification);
                reasons.push(format!("approval required at guard level {effective}"));
                self.record(
                    request, &classification, effective, Decision::RequireApproval, None,
                    started_at, timer.elapsed().as_millis() as u64, -1, ExecMode::Host, None,
                    "approval required",
                );
                return Ok(ExecOutcome::Blocked(reasons));
            }
        }

        if decision == Decision::Block {
            let reasons = display_reasons(&classification);
            self.record(
                request, &classification, effective, Decision::Block, None, started_at,
                timer.elapsed().as_millis() as u64, -1, ExecMode::Host, None, "blocked",
            );
            return Ok(ExecOutcome::Blocked(reasons));
        }

        // Non-critical rm becomes a soft-delete interception.
        if self.config.soft_delete.enabled && classification.risk_level != RiskLevel::Critical {
            if let Some(rm) = parse_rm(request.command) {
                if !rm.targets.is_empty() {
                    let targets: Vec<std::path::PathBuf> =
                        rm.targets.iter().map(std::path::PathBuf::from).collect();
                    match self.soft_delete.intercept(
                        &targets,
                        request.workspace,
                        request.command,
                        request.session_id,
                    ) {
                        Ok(meta) => {
                            self.record_file_ops(request, &meta, &classification);
                            self.record(
                                request, &classification, effective, decision,
                                Some("soft-delete".to_string()), started_at,
                                timer.elapsed().as_millis() as u64, 0, ExecMode::Host, None,
                                "soft-delete interception",
                            );
                            return Ok(ExecOutcome::Allowed(0));
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "soft-delete interception failed; running rm directly");
                        }
                    }
                }
            }
        }

        let (outcome, mode, runtime) = if decision == Decision::AllowSandbox {
            self.run_sandboxed(request, ctx)?
        } else {
            (self.run_host(request)?, ExecMode::Host, None)
        };

        let duration_ms = timer.elapsed().as_millis() as u64;
        let exit_code = match &outcome {
            ExecOutcome::Allowed(code) => *code,
            _ => -1,
        };
        let reason = match &outcome {
            ExecOutcome::Allowed(_) => "allowed",
            ExecOutcome::Blocked(_) => "blocked",
            ExecOutcome::SandboxFailed { .. } => "sandbox setup failed",
        };
        self.record(
            request, &classification, effective, decision, approved_by, started_at,
            duration_ms, exit_code, mode, runtime, reason,
        );
        Ok(outcome)
    }

    fn bypass_requested(&self, ctx: &DetectionContext) -> bool {
        self.config.guard.allow_user_bypass
            && ctx.env.contains_key(&self.config.guard.bypass_env_var)
    }

    fn run_host(&self, request: &ExecRequest<'_>) -> Result<ExecOutcome> {
        let status = shell_command(request.command)
            .current_dir(request.workspace)
            .status()
            .with_context(|| format!("failed to spawn '{}'", request.command))?;
        Ok(ExecOutcome::Allowed(exit_code(status)))
    }

    /// Run inside the selected runtime. Never falls back to the host
    /// silently: when no runtime can be set up, the failure is surfaced as
    /// [`ExecOutcome::SandboxFailed`].
    fn run_sandboxed(
        &self,
        request: &ExecRequest<'_>,
        ctx: &DetectionContext,
    ) -> Result<(ExecOutcome, ExecMode, Option<String>)> {
        let caps = detect_capabilities();
        let environment = detect_environment(&ctx.env, request.workspace);

        let candidates: Vec<SandboxRuntime> = if self.config.sandbox.runtime == "auto" {
            selector::ranked(environment)
                .into_iter()
                .filter(|rt| *rt != SandboxRuntime::None)
                .filter(|rt| selector::runtime_available(*rt, &caps))
                .collect()
        } else {
            vec![self.config.sandbox.runtime.parse()?]
        };

        if candidates.is_empty() {
            return Ok((
                ExecOutcome::SandboxFailed {
                    step: "select runtime".to_string(),
                    detail: "no usable sandbox runtime available".to_string(),
                },
                ExecMode::Sandbox,
                None,
            ));
        }

        let mut last_error: Option<(SandboxRuntime, anyhow::Error)> = None;
        for runtime in &candidates {
            match self.run_in_runtime(*runtime, request) {
                Ok(status) => {
                    return Ok((
                        ExecOutcome::Allowed(exit_code(status)),
                        ExecMode::Sandbox,
                        Some(runtime.to_string()),
                    ));
                }
                Err(e) => {
                    tracing::warn!(runtime = %runtime, error = %e, "sandbox runtime failed");
                    last_error = Some((*runtime, e));
                }
            }
        }

        match last_error {
            Some((runtime, error)) => Ok((
                ExecOutcome::SandboxFailed {
                    step: format!("{runtime} setup"),
                    detail: error.to_string(),
                },
                ExecMode::Sandbox,
                Some(runtime.to_string()),
            )),
            None => Ok((
                ExecOutcome::SandboxFailed {
                    step: "select runtime".to_string(),
                    detail: "no candidate runtime was tried".to_string(),
                },
                ExecMode::Sandbox,
                None,
            )),
        }
    }

    fn run_in_runtime(
        &self,
        runtime: SandboxRuntime,
        request: &ExecRequest<'_>,
    ) -> Result<ExitStatus> {
        let argv = vec![
            "sh".to_string(),
            "-c".to_string(),
            request.command.to_string(),
        ];
        match runtime {
            SandboxRuntime::Bubblewrap => {
                let opts = BwrapOptions {
                    workspace: request.workspace.to_path_buf(),
                    cache_dirs: bubblewrap::existing_cache_dirs(self.paths.home()),
                    allow_network: self.config.sandbox.allow_network,
                };
                Command::new("bwrap")
                    .args(bubblewrap::build_args(&opts, &argv))
                    .status()
                    .context("failed to spawn bwrap")
            }
            SandboxRuntime::Namespace => {
                let opts = NamespaceOptions {
                    workspace: request.workspace.to_path_buf(),
                    cache_dirs: bubblewrap::existing_cache_dirs(self.paths.home()),
                    capability_set: self.config.sandbox.capability_set,
                    seccomp_profile: self.config.sandbox.seccomp_profile,
                    overlay_tmp: self.config.sandbox.overlay_tmp,
                    overlay_work_root: self.paths.state_dir().join("overlay"),
                };
                namespace::run(&argv, &opts)
            }
            SandboxRuntime::Docker => {
                let workspace = request.workspace.to_string_lossy();
                let mut command = Command::new("docker");
                command.args(["run", "--rm"]);
                if !self.config.sandbox.allow_network {
                    command.args(["--network", "none"]);
                }
                command
                    .arg("-v")
                    .arg(format!("{workspace}:/workspace"))
                    .args(["-w", "/workspace"])
                    .arg(&self.config.sandbox.docker_image)
                    .args(&argv)
                    .status()
                    .context("failed to spawn docker")
            }
            SandboxRuntime::None => shell_command(request.command)
                .current_dir(request.workspace)
                .status()
                .context("failed to spawn command"),
        }
    }

    fn record_file_ops(
        &self,
        request: &ExecRequest<'_>,
        meta: &vg_state::BackupMeta,
        classification: &Classification,
    ) {
        let Some(session_id) = request.session_id else {
            return;
        };
        let Ok(mut session) = self.sessions.load(session_id) else {
            return;
        };
        for entry in &meta.entries {
            let op = FileOperation {
                timestamp: Utc::now(),
                operation: FileOp::Delete,
                path: entry.original_path.clone(),
                size: Some(entry.size),
                risk_level: classification.risk_level,
                allowed: true,
                reason: Some(format!("soft-deleted into backup {}", meta.id)),
            };
            if let Err(e) = self.sessions.add_file_operation(&mut session, op) {
                tracing::warn!(error = %e, "failed to record file operation");
                break;
            }
        }
    }

    /// Append the command record to the session ledger and metrics.
    /// Best-effort: failures warn, the user's command is never blocked by
    /// an inability to log it.
    #[allow(clippy::too_many_arguments)]
    fn record(
        &self,
        request: &ExecRequest<'_>,
        classification: &Classification,
        effective: GuardLevel,
        decision: Decision,
        approved_by: Option<String>,
        started_at: chrono::DateTime<Utc>,
        duration_ms: u64,
        exit_code: i32,
        mode: ExecMode,
        runtime: Option<String>,
        reason: &str,
    ) {
        if let Some(session_id) = request.session_id {
            match self.sessions.load(session_id) {
                Ok(mut session) => {
                    let record = CommandRecord {
                        command_text: request.command.to_string(),
                        args: request
                            .command
                            .split_whitespace()
                            .map(str::to_string)
                            .collect(),
                        effective_level: effective,
                        risk_level: classification.risk_level,
                        reasons: classification.reasons.clone(),
                        decision,
                        approved_by: approved_by.clone(),
                        started_at,
                        duration_ms,
                        exit_code,
                        findings_refs: Vec::new(),
                    };
                    if let Err(e) = self.sessions.add_command(&mut session, record) {
                        tracing::warn!(error = %e, "failed to append command to session ledger");
                    }
                }
                Err(e) => {
                    tracing::warn!(session_id, error = %e, "session unavailable; command not recorded");
                }
            }
        }

        let record = ExecutionRecord {
            timestamp: started_at,
            command: request.command.to_string(),
            mode,
            runtime,
            duration_ms,
            risk_level: classification.risk_level,
            cached: false,
            exit_code,
            reason: reason.to_string(),
        };
        if let Err(e) = self.metrics.record(record) {
            tracing::warn!(error = %e, "failed to record metrics");
        }
    }
}

fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

/// Pair each matched rule with its reason for user-facing block output, so
/// the rule code can be used to silence the finding.
fn display_reasons(classification: &Classification) -> Vec<String> {
    classification
        .matched_rules
        .iter()
        .zip(classification.reasons.iter())
        .map(|(code, reason)| format!("{code}: {reason}"))
        .collect()
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
