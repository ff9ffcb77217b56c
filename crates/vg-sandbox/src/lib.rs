//! Sandbox runtime detection, selection and execution.
//!
//! The selector probes the host once, ranks the available isolation
//! backends for the detected environment, and the executor runs the chosen
//! backend, refusing to fall back to the host silently when isolation
//! cannot be established.

pub mod bubblewrap;
pub mod caps;
pub mod environment;
pub mod executor;
pub mod namespace;
pub mod selector;

#[cfg(target_os = "linux")]
pub mod seccomp;

pub use caps::{Capabilities, detect_capabilities};
pub use environment::{Environment, detect_environment};
pub use executor::{ExecRequest, Executor};
pub use selector::{SandboxRuntime, select_runtime};
