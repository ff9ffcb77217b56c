//! Linux mount-namespace executor.
//!
//! All isolation happens between `fork` and `execve` inside a `pre_exec`
//! closure: unshare the mount namespace, remount the critical subtree
//! read-only, give the child a private `/tmp`, drop the capability bounding
//! set, set `PR_SET_NO_NEW_PRIVS` and install the seccomp filter. Every
//! filesystem change is confined to the new namespace; the host is never
//! modified. A failed setup step aborts before exec and surfaces as a spawn
//! error carrying the step name.

use std::path::PathBuf;
use vg_config::{CapabilitySet, SeccompProfile};

/// Subtree remounted read-only inside the namespace.
pub const RO_DIRS: &[&str] = &[
    "/bin", "/sbin", "/usr", "/lib", "/lib64", "/etc", "/var", "/opt", "/sys", "/proc", "/boot",
];

/// tmpfs size for the private `/tmp` (1 GiB).
pub const TMPFS_SIZE_BYTES: u64 = 1024 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct NamespaceOptions {
    pub workspace: PathBuf,
    pub cache_dirs: Vec<PathBuf>,
    pub capability_set: CapabilitySet,
    pub seccomp_profile: SeccompProfile,
    /// Mount `/tmp` as an overlay over the host `/tmp` instead of a tmpfs.
    pub overlay_tmp: bool,
    /// Where overlay upper/work directories are created (host side).
    pub overlay_work_root: PathBuf,
}

#[cfg(target_os = "linux")]
pub use linux::run;

#[cfg(target_os = "linux")]
mod linux {
    use super::*;
    use crate::seccomp;
    use anyhow::{Context, Result};
    use std::ffi::CString;
    use std::fs;
    use std::io;
    use std::os::unix::process::CommandExt;
    use std::process::{Command, ExitStatus};

    /// Capabilities dropped for the `minimal`/`normal` sets. Numbers are the
    /// kernel's capability indices; `libc` does not export them all.
    const PRIVILEGED_CAPS: &[(u32, &str)] = &[
        (21, "CAP_SYS_ADMIN"),
        (16, "CAP_SYS_MODULE"),
        (19, "CAP_SYS_PTRACE"),
        (22, "CAP_SYS_BOOT"),
        (27, "CAP_MKNOD"),
        (25, "CAP_SYS_TIME"),
        (34, "CAP_SYSLOG"),
        (29, "CAP_AUDIT_WRITE"),
        (30, "CAP_AUDIT_CONTROL"),
        (37, "CAP_AUDIT_READ"),
        (32, "CAP_MAC_OVERRIDE"),
        (33, "CAP_MAC_ADMIN"),
        (17, "CAP_SYS_RAWIO"),
        (20, "CAP_SYS_PACCT"),
        (9, "CAP_LINUX_IMMUTABLE"),
    ];

    /// Everything the post-fork closure needs, allocated before fork.
    struct SetupPlan {
        root: CString,
        ro_dirs: Vec<CString>,
        rw_binds: Vec<CString>,
        tmp_target: CString,
        tmpfs_data: CString,
        overlay_data: Option<CString>,
        capability_set: CapabilitySet,
        seccomp_profile: SeccompProfile,
    }

    fn cstring(path: &str) -> io::Result<CString> {
        CString::new(path).map_err(|_| io::Error::other(format!("path contains NUL: {path}")))
    }

    fn build_plan(opts: &NamespaceOptions) -> Result<SetupPlan> {
        let ro_dirs = RO_DIRS
            .iter()
            .filter(|dir| std::path::Path::new(dir).exists())
            .map(|dir| cstring(dir))
            .collect::<io::Result<Vec<_>>>()
            .context("encode read-only mount targets")?;

        let mut rw_binds = vec![cstring(&opts.workspace.to_string_lossy())
            .context("encode workspace path")?];
        for cache in &opts.cache_dirs {
            if cache.exists() {
                rw_binds.push(cstring(&cache.to_string_lossy()).context("encode cache path")?);
            }
        }

        let overlay_data = if opts.overlay_tmp {
            let upper = opts.overlay_work_root.join("tmp-upper");
            let work = opts.overlay_work_root.join("tmp-work");
            fs::create_dir_all(&upper).context("create overlay upper dir")?;
            fs::create_dir_all(&work).context("create overlay work dir")?;
            Some(
                cstring(&format!(
                    "lowerdir=/tmp,upperdir={},workdir={}",
                    upper.display(),
                    work.display()
                ))
                .context("encode overlay mount data")?,
            )
        } else {
            None
        };

        Ok(SetupPlan {
            root: cstring("/").context("encode root path")?,
            ro_dirs,
            rw_binds,
            tmp_target: cstring("/tmp").context("encode /tmp")?,
            tmpfs_data: cstring(&format!("size={TMPFS_SIZE_BYTES},mode=1777"))
                .context("encode tmpfs options")?,
            overlay_data,
            capability_set: opts.capability_set,
            seccomp_profile: opts.seccomp_profile,
        })
    }

    fn step_error(step: &str, errno: io::Error) -> io::Error {
        io::Error::other(format!("{step}: {errno}"))
    }

    fn mount(
        source: &CString,
        target: &CString,
        fstype: Option<&CString>,
        flags: libc::c_ulong,
        data: Option<&CString>,
    ) -> io::Result<()> {
        // SAFETY: all pointers reference live CStrings owned by the plan.
        let ret = unsafe {
            libc::mount(
                source.as_ptr(),
                target.as_ptr(),
                fstype.map_or(std::ptr::null(), |f| f.as_ptr()),
                flags,
                data.map_or(std::ptr::null(), |d| d.as_ptr()) as *const libc::c_void,
            )
        };
        if ret != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Runs in the child after fork. Must only fail with a step-tagged
    /// error; the parent reports it as a sandbox setup failure.
    fn setup_sandbox(plan: &SetupPlan, none: &CString, tmpfs: &CString, overlay: &CString) -> io::Result<()> {
        // SAFETY: unshare(CLONE_NEWNS) detaches this process into a private
        // mount namespace; no memory is shared with the parent afterwards.
        if unsafe { libc::unshare(libc::CLONE_NEWNS) } != 0 {
            return Err(step_error("unshare mount namespace", io::Error::last_os_error()));
        }

        // Make every mount private so nothing propagates back to the host.
        mount(none, &plan.root, None, libc::MS_REC | libc::MS_PRIVATE, None)
            .map_err(|e| step_error("make / private", e))?;

        for dir in &plan.ro_dirs {
            mount(dir, dir, None, libc::MS_BIND | libc::MS_REC, None)
                .map_err(|e| step_error("bind critical subtree", e))?;
            mount(
                none,
                dir,
                None,
                libc::MS_BIND | libc::MS_REMOUNT | libc::MS_RDONLY | libc::MS_REC,
                None,
            )
            .map_err(|e| step_error("remount critical subtree read-only", e))?;
        }

        match &plan.overlay_data {
            Some(data) => {
                mount(overlay, &plan.tmp_target, Some(overlay), 0, Some(data))
                    .map_err(|e| step_error("mount /tmp overlay", e))?;
            }
            None => {
                mount(tmpfs, &plan.tmp_target, Some(tmpfs), 0, Some(&plan.tmpfs_data))
                    .map_err(|e| step_error("mount /tmp tmpfs", e))?;
            }
        }

        for target in &plan.rw_binds {
            mount(target, target, None, libc::MS_BIND | libc::MS_REC, None)
                .map_err(|e| step_error("bind workspace read-write", e))?;
        }

        drop_capabilities(plan.capability_set)
            .map_err(|e| step_error("drop capability bounding set", e))?;

        // SAFETY: plain prctl flag set; required before seccomp without
        // CAP_SYS_ADMIN.
        if unsafe { libc::prctl(libc::PR_SET_NO_NEW_PRIVS, 1, 0, 0, 0) } != 0 {
            return Err(step_error("set no_new_privs", io::Error::last_os_error()));
        }

        seccomp::install(plan.seccomp_profile)
            .map_err(|e| step_error("install seccomp filter", e))?;

        Ok(())
    }

    fn drop_capabilities(set: CapabilitySet) -> io::Result<()> {
        let drop_one = |cap: u32| -> io::Result<()> {
            // SAFETY: PR_CAPBSET_DROP with an index is a plain prctl call;
            // EINVAL marks indices above the kernel's highest capability.
            let ret = unsafe { libc::prctl(libc::PR_CAPBSET_DROP, cap as libc::c_ulong, 0, 0, 0) };
            if ret != 0 {
                let err = io::Error::last_os_error();
                if err.raw_os_error() == Some(libc::EINVAL) {
                    return Ok(());
                }
                return Err(err);
            }
            Ok(())
        };

        match set {
            CapabilitySet::None => {
                for cap in 0..64 {
                    drop_one(cap)?;
                }
            }
            CapabilitySet::Minimal | CapabilitySet::Normal => {
                for (cap, _name) in PRIVILEGED_CAPS {
                    drop_one(*cap)?;
                }
            }
        }
        Ok(())
    }

    /// Spawn `command_argv` inside a fresh mount namespace and wait for it.
    /// Setup failures surface as an error whose message carries the failed
    /// step; after exec, the child's exit status is the command's.
    pub fn run(command_argv: &[String], opts: &NamespaceOptions) -> Result<ExitStatus> {
        let plan = build_plan(opts)?;
        let none = cstring("none").context("encode mount source")?;
        let tmpfs = cstring("tmpfs").context("encode tmpfs type")?;
        let overlay = cstring("overlay").context("encode overlay type")?;

        let (program, args) = command_argv
            .split_first()
            .context("empty command for namespace sandbox")?;

        let mut command = Command::new(program);
        command.args(args).current_dir(&opts.workspace);
        // SAFETY: the closure only calls async-signal-safe syscalls (mount,
        // unshare, prctl) on pre-allocated data.
        unsafe {
            command.pre_exec(move || setup_sandbox(&plan, &none, &tmpfs, &overlay));
        }

        let status = command
            .status()
            .context("sandbox setup failed before exec")?;
        Ok(status)
    }
}

#[cfg(not(target_os = "linux"))]
pub fn run(
    _command_argv: &[String],
    _opts: &NamespaceOptions,
) -> anyhow::Result<std::process::ExitStatus> {
    anyhow::bail!("mount-namespace sandbox requires Linux")
}
