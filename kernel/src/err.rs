//! Fault and panic plumbing.
//!
//! Two distinct failure domains exist in this kernel. A *usage* failure
//! (unknown IPC target, unimplemented method) is never fatal: it travels
//! back to the caller as an [`abi::ErrorCode`] in a [`abi::Response`] and the
//! kernel's own control flow is untouched. A *fault* is a trap the
//! dispatcher cannot attribute to a known syscall — an illegal instruction,
//! a misaligned or out-of-range access, an unrecognised trap cause. Faults
//! from user mode terminate the offending process; the same faults from
//! kernel mode are unrecoverable and panic, per §4.6.

use core::fmt;

/// Why a process was terminated by the trap dispatcher rather than its own
/// `EXIT` syscall.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FaultInfo {
    IllegalInstruction,
    BadMemoryAccess { addr: usize },
    UnalignedAccess { addr: usize },
    /// A trap cause the architecture backend doesn't know how to classify.
    UnknownTrap { cause: usize },
}

impl fmt::Display for FaultInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultInfo::IllegalInstruction => write!(f, "illegal instruction"),
            FaultInfo::BadMemoryAccess { addr } => write!(f, "bad memory access at {addr:#x}"),
            FaultInfo::UnalignedAccess { addr } => write!(f, "unaligned access at {addr:#x}"),
            FaultInfo::UnknownTrap { cause } => write!(f, "unrecognised trap cause {cause:#x}"),
        }
    }
}

/// Kernel-internal inconsistency: an invariant documented in §3 has been
/// violated (a null `current_proc`, a trap cause the dispatcher has no
/// handler path for while already in kernel mode). There is no recovery;
/// the caller should print diagnostics and halt or host-exit.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct KernelPanic(pub &'static str);

impl fmt::Display for KernelPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "kernel panic: {}", self.0)
    }
}
