//! Classic-BPF seccomp filters for the mount-namespace runtime.
//!
//! Built by hand so the filter can be installed from inside `pre_exec`
//! without allocating after fork beyond the pre-built vector. The filter
//! kills on architecture mismatch, returns `EPERM` for the blocked syscall
//! set of the selected profile, and allows everything else.

use vg_config::SeccompProfile;

const BPF_LD_W_ABS: u16 = 0x20;
const BPF_JMP_JEQ_K: u16 = 0x15;
const BPF_RET_K: u16 = 0x06;

const SECCOMP_RET_KILL: u32 = 0x0000_0000;
const SECCOMP_RET_ERRNO: u32 = 0x0005_0000;
const SECCOMP_RET_ALLOW: u32 = 0x7fff_0000;

/// Offsets into `struct seccomp_data`.
const SECCOMP_DATA_NR: u32 = 0;
const SECCOMP_DATA_ARCH: u32 = 4;

#[cfg(target_arch = "x86_64")]
const AUDIT_ARCH_CURRENT: u32 = 0xC000_003E;
#[cfg(target_arch = "aarch64")]
const AUDIT_ARCH_CURRENT: u32 = 0xC000_00B7;

/// Kernel-module and reboot-class syscalls (the `minimal` profile).
fn module_and_reboot_syscalls() -> Vec<libc::c_long> {
    vec![
        libc::SYS_init_module,
        libc::SYS_finit_module,
        libc::SYS_delete_module,
        libc::SYS_kexec_load,
        libc::SYS_reboot,
        libc::SYS_swapon,
        libc::SYS_swapoff,
    ]
}

/// Introspection and tracing syscalls added by `strict`.
fn tracing_syscalls() -> Vec<libc::c_long> {
    vec![
        libc::SYS_ptrace,
        libc::SYS_bpf,
        libc::SYS_perf_event_open,
        libc::SYS_process_vm_readv,
        libc::SYS_process_vm_writev,
    ]
}

/// Mount and clock manipulation added by `moderate`.
fn mount_and_clock_syscalls() -> Vec<libc::c_long> {
    vec![
        libc::SYS_mount,
        libc::SYS_umount2,
        libc::SYS_pivot_root,
        libc::SYS_chroot,
        libc::SYS_settimeofday,
        libc::SYS_clock_settime,
    ]
}

/// The blocked syscall set for a named profile.
pub fn blocked_syscalls(profile: SeccompProfile) -> Vec<libc::c_long> {
    let mut set = module_and_reboot_syscalls();
    if matches!(profile, SeccompProfile::Strict | SeccompProfile::Moderate) {
        set.extend(tracing_syscalls());
    }
    if matches!(profile, SeccompProfile::Moderate) {
        set.extend(mount_and_clock_syscalls());
    }
    set
}

#[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
fn instruction(code: u16, jt: u8, jf: u8, k: u32) -> libc::sock_filter {
    libc::sock_filter { code, jt, jf, k }
}

/// Build the BPF program for a profile.
#[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
pub fn build_filter(blocked: &[libc::c_long]) -> Vec<libc::sock_filter> {
    let mut filter = vec![
        instruction(BPF_LD_W_ABS, 0, 0, SECCOMP_DATA_ARCH),
        instruction(BPF_JMP_JEQ_K, 1, 0, AUDIT_ARCH_CURRENT),
        instruction(BPF_RET_K, 0, 0, SECCOMP_RET_KILL),
        instruction(BPF_LD_W_ABS, 0, 0, SECCOMP_DATA_NR),
    ];
    for sys in blocked {
        // jeq <sys> → next instruction (the errno return); otherwise skip it.
        filter.push(instruction(BPF_JMP_JEQ_K, 0, 1, *sys as u32));
        filter.push(instruction(BPF_RET_K, 0, 0, SECCOMP_RET_ERRNO | libc::EPERM as u32));
    }
    filter.push(instruction(BPF_RET_K, 0, 0, SECCOMP_RET_ALLOW));
    filter
}

/// Install the filter on the current thread. `PR_SET_NO_NEW_PRIVS` must be
/// set before this is called.
#[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
pub fn install(profile: SeccompProfile) -> std::io::Result<()> {
    let filter = build_filter(&blocked_syscalls(profile));
    let prog = libc::sock_fprog {
        len: filter.len() as libc::c_ushort,
        filter: filter.as_ptr() as *mut libc::sock_filter,
    };
    // SAFETY: prog points at a live, correctly sized filter vector for the
    // duration of the call; PR_SET_SECCOMP with SECCOMP_MODE_FILTER is the
    // documented way to install a classic-BPF seccomp filter.
    let ret = unsafe {
        libc::prctl(
            libc::PR_SET_SECCOMP,
            libc::SECCOMP_MODE_FILTER as libc::c_ulong,
            &prog as *const libc::sock_fprog,
        )
    };
    if ret != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
pub fn install(_profile: SeccompProfile) -> std::io::Result<()> {
    Err(std::io::Error::other(
        "seccomp filter not supported on this architecture",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles_are_nested() {
        let minimal = blocked_syscalls(SeccompProfile::Minimal);
        let strict = blocked_syscalls(SeccompProfile::Strict);
        let moderate = blocked_syscalls(SeccompProfile::Moderate);
        assert!(minimal.len() < strict.len());
        assert!(strict.len() < moderate.len());
        for sys in &minimal {
            assert!(strict.contains(sys));
            assert!(moderate.contains(sys));
        }
        for sys in &strict {
            assert!(moderate.contains(sys));
        }
    }

    #[test]
    fn test_strict_blocks_tracing() {
        let strict = blocked_syscalls(SeccompProfile::Strict);
        assert!(strict.contains(&libc::SYS_ptrace));
        assert!(strict.contains(&libc::SYS_bpf));
        assert!(strict.contains(&libc::SYS_perf_event_open));
    }

    #[test]
    fn test_minimal_does_not_block_mount() {
        let minimal = blocked_syscalls(SeccompProfile::Minimal);
        assert!(!minimal.contains(&libc::SYS_mount));
        let moderate = blocked_syscalls(SeccompProfile::Moderate);
        assert!(moderate.contains(&libc::SYS_mount));
    }

    #[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
    #[test]
    fn test_filter_shape() {
        let blocked = blocked_syscalls(SeccompProfile::Strict);
        let filter = build_filter(&blocked);
        // 4-instruction header, 2 per blocked syscall, final allow.
        assert_eq!(filter.len(), 4 + 2 * blocked.len() + 1);
        assert_eq!(filter.last().unwrap().k, SECCOMP_RET_ALLOW);
        assert_eq!(filter[2].k, SECCOMP_RET_KILL);
    }
}
