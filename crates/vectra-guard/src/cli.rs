//! Command-line surface. A thin shell: every subcommand maps onto one core
//! operation in the library crates.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "vg",
    version,
    about = "Vectra Guard: command interception, static scanning and sandboxing for coding agents"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a command and run it under the guard policy
    Exec {
        /// Session id (defaults to the active session for this workspace)
        #[arg(long)]
        session: Option<String>,
        /// The command to run
        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },
    /// Scan a tree with the per-language code rules
    Scan {
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Emit findings as a JSON array
        #[arg(long)]
        json: bool,
    },
    /// Scan a tree for leaked secrets
    Secrets {
        #[arg(default_value = ".")]
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Combined code + secret audit with remediation hints
    Audit {
        #[arg(default_value = ".")]
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Validate agent scripts (.sh/.py) with the command analyzer
    Validate {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Manage sessions
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// Manage trusted command approvals
    Trust {
        #[command(subcommand)]
        command: TrustCommands,
    },
    /// Inspect and restore soft-delete backups
    Restore {
        #[command(subcommand)]
        command: RestoreCommands,
    },
    /// Global kill switch
    Lockdown {
        #[command(subcommand)]
        command: LockdownCommands,
    },
    /// Print the environment with sensitive values masked
    Env,
    /// Show execution metrics
    Metrics,
    /// Report detected environment, capabilities and state health
    Doctor,
}

#[derive(Subcommand)]
pub enum SessionCommands {
    /// Start a session for the current workspace
    Start {
        #[arg(long, default_value = "agent")]
        agent: String,
    },
    /// List sessions
    List,
    /// Show one session (defaults to the active one)
    Show { id: Option<String> },
    /// End a session (defaults to the active one)
    End { id: Option<String> },
    /// Summarize a session's file operations
    Diff { id: Option<String> },
}

#[derive(Subcommand)]
pub enum TrustCommands {
    /// Approve a command, optionally for a limited number of days
    Add {
        #[arg(long)]
        ttl_days: Option<i64>,
        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },
    /// List valid approvals
    List,
    /// Revoke an approval
    Remove {
        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },
    /// Prune expired approvals
    Clean,
}

#[derive(Subcommand)]
pub enum RestoreCommands {
    /// List backups, newest first
    List,
    /// Restore one backup
    Apply {
        id: String,
        /// Restore under this directory instead of the original paths
        #[arg(long)]
        to: Option<PathBuf>,
    },
    /// Aggregate backup statistics
    Stats,
    /// Show one backup's metadata
    Show { id: String },
}

#[derive(Subcommand)]
pub enum LockdownCommands {
    /// Forbid all command execution
    On {
        #[arg(long)]
        reason: Option<String>,
    },
    /// Resume command execution
    Off,
    /// Show the current state
    Status,
}
