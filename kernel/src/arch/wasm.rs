//! WASM host backend (§4.4, §6).
//!
//! Each process runs on its own fiber; a dedicated scheduler fiber brokers
//! every switch, because non-scheduler-to-non-scheduler fiber swaps are not
//! guaranteed available on this host (§4.4, §9: "On WASM, use host-provided
//! fiber API; isolate that dependency behind a `Scheduler` trait"). This
//! module is the trait's `wasm32` implementation; the host's actual fiber
//! primitive is reached through the `extern "C"` imports below.

use abi::Pidx;

use crate::arch::{Arch, TrapCause, TrapFrame};
use crate::err::FaultInfo;
use crate::task::Process;

extern "C" {
    /// Creates a host fiber that will call `entry()` once resumed for the
    /// first time, returning an opaque handle.
    fn host_fiber_create(entry: extern "C" fn()) -> u32;
    /// Switches from the scheduler fiber to `fiber`, returning only when
    /// that fiber yields back (via `host_fiber_yield`) or traps.
    fn host_fiber_resume(fiber: u32);
    /// Yields from the current (non-scheduler) fiber back to whichever
    /// fiber resumed it.
    fn host_fiber_yield();

    fn host_putchar(byte: u8);
    /// Returns -1 when no input is queued.
    fn host_getchar() -> i32;
    fn host_exit() -> !;
}

/// The "next process" hint a direct-switch request leaves for the scheduler
/// fiber to pick up on its next iteration (§4.4).
static mut NEXT_HINT: Option<Pidx> = None;
static mut LAST_TRAP: Option<(u32, [i32; 5])> = None;
static mut PENDING_RET: [[i32; 5]; crate::config::PROCS_MAX] =
    [[0; 5]; crate::config::PROCS_MAX];
static mut FIBERS: [Option<u32>; crate::config::PROCS_MAX] = [None; crate::config::PROCS_MAX];

pub struct WasmArch;

impl WasmArch {
    pub const fn new() -> Self {
        Self
    }
}

impl Arch for WasmArch {
    fn spawn(&mut self, pidx: Pidx, proc: &mut Process) {
        // SAFETY: single-threaded WASM host, no reentrancy across spawn
        // calls (all happen during kernel startup before the run loop).
        unsafe {
            let entry: extern "C" fn() = core::mem::transmute(proc.user_pc);
            FIBERS[pidx.index()] = Some(host_fiber_create(entry));
        }
    }

    fn run_until_trap(&mut self, pidx: Pidx, _proc: &mut Process, frame: &mut TrapFrame) -> TrapCause {
        unsafe {
            let fiber = FIBERS[pidx.index()].expect("run_until_trap on an unspawned process");
            host_fiber_resume(fiber);
            match LAST_TRAP.take() {
                Some((sysnum, args)) => {
                    frame.sysnum = sysnum;
                    frame.args = args;
                    TrapCause::Syscall
                }
                None => TrapCause::Fault(FaultInfo::IllegalInstruction),
            }
        }
    }

    fn set_return(&mut self, pidx: Pidx, _proc: &mut Process, frame: &TrapFrame) {
        unsafe {
            PENDING_RET[pidx.index()] = frame.ret;
        }
    }

    fn putchar(&mut self, byte: u8) {
        unsafe { host_putchar(byte) };
    }

    fn getchar(&mut self) -> Option<u8> {
        let c = unsafe { host_getchar() };
        if c < 0 {
            None
        } else {
            Some(c as u8)
        }
    }

    fn shutdown(&mut self) -> ! {
        unsafe { host_exit() }
    }
}

/// Called from a process fiber's raw syscall stub (in `userlib`) before it
/// yields back to the scheduler fiber. Records the trap for the scheduler's
/// `run_until_trap` to pick up and returns the previous call's return
/// values (zero on a process's first syscall).
///
/// # Safety
/// Must only be called from inside a running process fiber, never from the
/// scheduler fiber itself.
pub unsafe fn host_trap(pidx: Pidx, sysnum: u32, args: [i32; 5]) -> [i32; 5] {
    LAST_TRAP = Some((sysnum, args));
    host_fiber_yield();
    PENDING_RET[pidx.index()]
}
