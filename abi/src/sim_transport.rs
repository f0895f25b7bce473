//! Host-only syscall transport for the `sim` architecture backend
//! (SPEC_FULL §E).
//!
//! On bare-metal RISC-V a syscall is an `ecall` trap; on the WASM host it is
//! an import call. Neither exists on a native OS thread, so `kernel::arch::
//! sim` gives each simulated process its own thread and this module gives
//! that thread a way to "trap": send the syscall number and arguments over a
//! channel to the kernel's scheduler thread, then block for the return
//! values. `userlib`'s raw syscall stub calls [`raw_syscall`] directly when
//! built for the `sim` target; it never talks to `kernel` itself.

use std::cell::RefCell;
use std::sync::mpsc::{Receiver, SyncSender};

/// One end of the per-process channel pair, installed on a process's thread
/// before its entry point runs.
pub struct SyscallChannel {
    pub to_kernel: SyncSender<(u32, [i32; 5])>,
    pub from_kernel: Receiver<[i32; 5]>,
}

thread_local! {
    static CHANNEL: RefCell<Option<SyscallChannel>> = RefCell::new(None);
}

/// Installs `channel` as this thread's syscall transport. Called once, by
/// `kernel::arch::sim`, before a simulated process's entry point runs.
pub fn install(channel: SyscallChannel) {
    CHANNEL.with(|c| *c.borrow_mut() = Some(channel));
}

/// Blocks until the kernel's scheduler thread releases this (newly spawned)
/// process for the first time, without having made a syscall yet.
pub fn wait_for_first_run() {
    CHANNEL.with(|c| {
        let c = c.borrow();
        let c = c
            .as_ref()
            .expect("sim syscall transport not installed on this thread");
        let _ = c.from_kernel.recv();
    });
}

/// Performs a syscall: sends `(sysnum, args)` to the kernel thread and
/// blocks for the five return-value slots (see `kernel::arch::TrapFrame`).
pub fn raw_syscall(sysnum: u32, args: [i32; 5]) -> [i32; 5] {
    CHANNEL.with(|c| {
        let c = c.borrow();
        let c = c
            .as_ref()
            .expect("sim syscall transport not installed on this thread");
        c.to_kernel
            .send((sysnum, args))
            .expect("kernel scheduler thread gone");
        c.from_kernel.recv().expect("kernel scheduler thread gone")
    })
}
