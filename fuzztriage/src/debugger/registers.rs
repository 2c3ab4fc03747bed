// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Register access across the 32/64-bit variants of x86, ARM and PowerPC.
//!
//! The primary path is `PTRACE_GETREGSET` with `NT_PRSTATUS`: the kernel
//! reports how many bytes it populated, and that byte count tells the
//! 32-bit and 64-bit layouts of one architecture family apart at runtime
//! (a 64-bit tracer routinely debugs 32-bit children). The legacy
//! `PTRACE_GETREGS` path remains as a fallback for kernels without regset
//! support. `nix` wraps neither with the iovec length exposed, so both go
//! through raw `libc::ptrace`.

use super::DebuggerError;
use nix::errno::Errno;
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};

/// Width of the register layout a task's state was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegsWidth {
    W32,
    W64,
    /// The kernel handed back a layout this build doesn't understand.
    /// Callers treat this as "unsupported" and skip deep analysis.
    Unknown,
}

impl RegsWidth {
    /// Width of this build's own register file, for paths that have no
    /// stopped task to ask (the sanitizer-exit path).
    pub fn native() -> Self {
        if cfg!(target_pointer_width = "64") {
            RegsWidth::W64
        } else {
            RegsWidth::W32
        }
    }
}

/// PC and status register of a stopped task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuState {
    pub pc: u64,
    pub status_reg: u64,
    pub width: RegsWidth,
}

/// Large enough for every NT_PRSTATUS layout we dispatch on.
const REGS_BUF_LEN: usize = 512;

/// True when a 32-bit ARM task is executing THUMB code: bit 5 of the
/// status register (CPSR T bit).
pub fn is_thumb(width: RegsWidth, status_reg: u64) -> bool {
    if !cfg!(any(target_arch = "arm", target_arch = "aarch64")) {
        return false;
    }
    width == RegsWidth::W32 && (status_reg & (1 << 5)) != 0
}

/// Render a PC padded to the width the registers were decoded at.
pub fn format_pc(pc: u64, width: RegsWidth) -> String {
    match width {
        RegsWidth::W32 => format!("{pc:#010x}"),
        _ => format!("{pc:#018x}"),
    }
}

/// Fetch PC and status register of `tid`, reporting the layout width so
/// callers can pick a disassembly mode.
pub fn read_pc_status(tid: Pid) -> Result<CpuState, DebuggerError> {
    let mut buf = [0u8; REGS_BUF_LEN];
    match getregset(tid, &mut buf) {
        Ok(len) => Ok(decode_prstatus(tid, &buf, len)),
        // EIO/EINVAL is what kernels without regset support answer.
        Err(Errno::EIO) | Err(Errno::EINVAL) => read_pc_status_legacy(tid),
        Err(source) => Err(DebuggerError::RegistersUnavailable { tid, source }),
    }
}

fn getregset(tid: Pid, buf: &mut [u8]) -> Result<usize, Errno> {
    let mut iov = libc::iovec {
        iov_base: buf.as_mut_ptr().cast(),
        iov_len: buf.len(),
    };
    // SAFETY: iov describes a live, writable buffer; the kernel updates
    // iov_len to the number of bytes it populated.
    let rc = unsafe {
        libc::ptrace(
            libc::PTRACE_GETREGSET,
            tid.as_raw(),
            libc::NT_PRSTATUS as usize as *mut libc::c_void,
            std::ptr::addr_of_mut!(iov),
        )
    };
    if rc == -1 {
        Err(Errno::last())
    } else {
        Ok(iov.iov_len)
    }
}

/// Decode an NT_PRSTATUS blob by its populated byte count.
fn decode_prstatus(tid: Pid, buf: &[u8], len: usize) -> CpuState {
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    {
        #[cfg(target_arch = "x86_64")]
        if len == std::mem::size_of::<libc::user_regs_struct>() {
            // SAFETY: the kernel populated exactly this layout.
            let regs: libc::user_regs_struct =
                unsafe { std::ptr::read_unaligned(buf.as_ptr().cast()) };
            return CpuState {
                pc: regs.rip,
                status_reg: regs.eflags,
                width: RegsWidth::W64,
            };
        }
        if len == std::mem::size_of::<UserRegsX86_32>() {
            // SAFETY: the kernel populated exactly this layout.
            let regs: UserRegsX86_32 = unsafe { std::ptr::read_unaligned(buf.as_ptr().cast()) };
            return CpuState {
                pc: u64::from(regs.eip),
                status_reg: u64::from(regs.eflags),
                width: RegsWidth::W32,
            };
        }
    }

    #[cfg(any(target_arch = "arm", target_arch = "aarch64"))]
    {
        #[cfg(target_arch = "aarch64")]
        if len == std::mem::size_of::<libc::user_regs_struct>() {
            // SAFETY: the kernel populated exactly this layout.
            let regs: libc::user_regs_struct =
                unsafe { std::ptr::read_unaligned(buf.as_ptr().cast()) };
            return CpuState {
                pc: regs.pc,
                status_reg: regs.pstate,
                width: RegsWidth::W64,
            };
        }
        if len == std::mem::size_of::<UserRegsArm32>() {
            // SAFETY: the kernel populated exactly this layout.
            let regs: UserRegsArm32 = unsafe { std::ptr::read_unaligned(buf.as_ptr().cast()) };
            return CpuState {
                pc: u64::from(regs.uregs[15]),
                status_reg: u64::from(regs.uregs[16]),
                width: RegsWidth::W32,
            };
        }
    }

    #[cfg(any(target_arch = "powerpc", target_arch = "powerpc64"))]
    {
        #[cfg(target_arch = "powerpc64")]
        if len == std::mem::size_of::<PtRegsPpc64>() {
            // SAFETY: the kernel populated exactly this layout.
            let regs: PtRegsPpc64 = unsafe { std::ptr::read_unaligned(buf.as_ptr().cast()) };
            return CpuState {
                pc: regs.nip,
                status_reg: regs.msr,
                width: RegsWidth::W64,
            };
        }
        if len == std::mem::size_of::<PtRegsPpc32>() {
            // SAFETY: the kernel populated exactly this layout.
            let regs: PtRegsPpc32 = unsafe { std::ptr::read_unaligned(buf.as_ptr().cast()) };
            return CpuState {
                pc: u64::from(regs.nip),
                status_reg: u64::from(regs.msr),
                width: RegsWidth::W32,
            };
        }
    }

    log::debug!("unrecognized register-set size {len} for task {tid}");
    CpuState {
        pc: 0,
        status_reg: 0,
        width: RegsWidth::Unknown,
    }
}

/// Legacy whole-struct fallback for kernels predating regsets. Only the
/// native layout is reachable this way.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn read_pc_status_legacy(tid: Pid) -> Result<CpuState, DebuggerError> {
    let mut regs = std::mem::MaybeUninit::<libc::user_regs_struct>::uninit();
    // SAFETY: PTRACE_GETREGS fills the complete native user_regs_struct.
    let rc = unsafe {
        libc::ptrace(
            libc::PTRACE_GETREGS,
            tid.as_raw(),
            std::ptr::null_mut::<libc::c_void>(),
            regs.as_mut_ptr(),
        )
    };
    if rc == -1 {
        return Err(DebuggerError::RegistersUnavailable {
            tid,
            source: Errno::last(),
        });
    }
    // SAFETY: the call above succeeded, so the struct is initialized.
    let regs = unsafe { regs.assume_init() };
    #[cfg(target_arch = "x86_64")]
    return Ok(CpuState {
        pc: regs.rip,
        status_reg: regs.eflags,
        width: RegsWidth::W64,
    });
    #[cfg(target_arch = "x86")]
    return Ok(CpuState {
        pc: u64::from(regs.eip as u32),
        status_reg: u64::from(regs.eflags as u32),
        width: RegsWidth::W32,
    });
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
fn read_pc_status_legacy(tid: Pid) -> Result<CpuState, DebuggerError> {
    // No whole-struct request on these targets (AArch64 never had one).
    Err(DebuggerError::RegistersUnavailable {
        tid,
        source: Errno::EIO,
    })
}

/// Read the link register of an ARM task; used to sharpen single-frame
/// fingerprints.
#[cfg(any(target_arch = "arm", target_arch = "aarch64"))]
pub fn read_link_register(tid: Pid) -> Result<u64, DebuggerError> {
    let mut buf = [0u8; REGS_BUF_LEN];
    let len = getregset(tid, &mut buf)
        .map_err(|source| DebuggerError::RegistersUnavailable { tid, source })?;

    #[cfg(target_arch = "aarch64")]
    if len == std::mem::size_of::<libc::user_regs_struct>() {
        // SAFETY: the kernel populated exactly this layout.
        let regs: libc::user_regs_struct = unsafe { std::ptr::read_unaligned(buf.as_ptr().cast()) };
        return Ok(regs.regs[30]);
    }
    if len == std::mem::size_of::<UserRegsArm32>() {
        // SAFETY: the kernel populated exactly this layout.
        let regs: UserRegsArm32 = unsafe { std::ptr::read_unaligned(buf.as_ptr().cast()) };
        return Ok(u64::from(regs.uregs[14]));
    }
    Err(DebuggerError::RegistersUnavailable {
        tid,
        source: Errno::EIO,
    })
}

/// 32-bit x86 `user_regs_struct`, as populated for 32-bit children of a
/// 64-bit tracer. Fields exist to pin the layout; most are never read.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[repr(C)]
#[derive(Debug, Clone, Copy)]
#[allow(dead_code)]
struct UserRegsX86_32 {
    ebx: u32,
    ecx: u32,
    edx: u32,
    esi: u32,
    edi: u32,
    ebp: u32,
    eax: u32,
    xds: u32,
    xes: u32,
    xfs: u32,
    xgs: u32,
    orig_eax: u32,
    eip: u32,
    xcs: u32,
    eflags: u32,
    esp: u32,
    xss: u32,
}

/// 32-bit ARM register file: r0-r15, CPSR, ORIG_r0.
#[cfg(any(target_arch = "arm", target_arch = "aarch64"))]
#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct UserRegsArm32 {
    uregs: [u32; 18],
}

#[cfg(any(target_arch = "powerpc", target_arch = "powerpc64"))]
#[repr(C)]
#[derive(Debug, Clone, Copy)]
#[allow(dead_code)]
struct PtRegsPpc64 {
    gpr: [u64; 32],
    nip: u64,
    msr: u64,
    orig_gpr3: u64,
    ctr: u64,
    link: u64,
    xer: u64,
    ccr: u64,
    softe: u64,
    trap: u64,
    dar: u64,
    dsisr: u64,
    result: u64,
}

#[cfg(any(target_arch = "powerpc", target_arch = "powerpc64"))]
#[repr(C)]
#[derive(Debug, Clone, Copy)]
#[allow(dead_code)]
struct PtRegsPpc32 {
    gpr: [u32; 32],
    nip: u32,
    msr: u32,
    orig_gpr3: u32,
    ctr: u32,
    link: u32,
    xer: u32,
    ccr: u32,
    mq: u32,
    trap: u32,
    dar: u32,
    dsisr: u32,
    result: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn test_decode_native_64bit_layout() {
        // SAFETY: all-zero bytes are a valid user_regs_struct.
        let mut regs: libc::user_regs_struct = unsafe { std::mem::zeroed() };
        regs.rip = 0x4011a0;
        regs.eflags = 0x246;
        let len = std::mem::size_of::<libc::user_regs_struct>();
        let mut buf = [0u8; REGS_BUF_LEN];
        // SAFETY: both sides are plain-old-data of at least `len` bytes.
        unsafe {
            std::ptr::copy_nonoverlapping(
                std::ptr::addr_of!(regs).cast::<u8>(),
                buf.as_mut_ptr(),
                len,
            );
        }

        let cpu = decode_prstatus(Pid::from_raw(1), &buf, len);
        assert_eq!(cpu.pc, 0x4011a0);
        assert_eq!(cpu.status_reg, 0x246);
        assert_eq!(cpu.width, RegsWidth::W64);
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn test_decode_compat_32bit_layout() {
        let mut regs = UserRegsX86_32 {
            ebx: 0,
            ecx: 0,
            edx: 0,
            esi: 0,
            edi: 0,
            ebp: 0,
            eax: 0,
            xds: 0,
            xes: 0,
            xfs: 0,
            xgs: 0,
            orig_eax: 0,
            eip: 0,
            xcs: 0,
            eflags: 0,
            esp: 0,
            xss: 0,
        };
        regs.eip = 0x80481a0;
        regs.eflags = 0x202;
        let len = std::mem::size_of::<UserRegsX86_32>();
        assert_eq!(len, 68);
        let mut buf = [0u8; REGS_BUF_LEN];
        // SAFETY: both sides are plain-old-data of at least `len` bytes.
        unsafe {
            std::ptr::copy_nonoverlapping(
                std::ptr::addr_of!(regs).cast::<u8>(),
                buf.as_mut_ptr(),
                len,
            );
        }

        let cpu = decode_prstatus(Pid::from_raw(1), &buf, len);
        assert_eq!(cpu.pc, 0x80481a0);
        assert_eq!(cpu.status_reg, 0x202);
        assert_eq!(cpu.width, RegsWidth::W32);
    }

    #[test]
    fn test_decode_unknown_size() {
        let buf = [0u8; REGS_BUF_LEN];
        let cpu = decode_prstatus(Pid::from_raw(1), &buf, 17);
        assert_eq!(cpu.width, RegsWidth::Unknown);
        assert_eq!(cpu.pc, 0);
    }

    #[test]
    fn test_thumb_bit() {
        let thumb = is_thumb(RegsWidth::W32, 1 << 5);
        if cfg!(any(target_arch = "arm", target_arch = "aarch64")) {
            assert!(thumb);
        } else {
            assert!(!thumb);
        }
        assert!(!is_thumb(RegsWidth::W64, 1 << 5));
        assert!(!is_thumb(RegsWidth::W32, 0));
    }

    #[test]
    fn test_format_pc_widths() {
        assert_eq!(format_pc(0x4011a0, RegsWidth::W32), "0x004011a0");
        assert_eq!(format_pc(0x4011a0, RegsWidth::W64), "0x00000000004011a0");
        assert_eq!(
            format_pc(0x4011a0, RegsWidth::Unknown),
            "0x00000000004011a0"
        );
    }
}
