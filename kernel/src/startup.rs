//! Kernel startup: build the process table from a fixed task list and hand
//! off to the run loop.
//!
//! The teacher's own `start_kernel` validates a flashed image header and
//! carves task/region tables out of a bump allocator before ever touching
//! the scheduler. This kernel has no on-disk image format — every task is a
//! plain [`task::Spawn`] baked in by whichever binary embeds this crate
//! (`sim-host`, or a bare-metal boot shim) — so the analogous two-phase
//! shape survives as `boot` (build the table, attach pages) followed by
//! `run` (pick a first task and loop until shutdown).

use crate::arch::Arch;
use crate::sched;
use crate::task::Spawn;
use crate::Kernel;

/// Builds a [`Kernel`] with one process per entry in `tasks`, in slot order,
/// and hands each one to `arch` so its first `run_until_trap` begins at
/// `entry`. Slot 0 must be the idle task and slot 1 the shell (§4.5) —
/// `run` relies on both conventions.
pub fn boot(arch: &mut dyn Arch, tasks: &[Spawn<'_>]) -> Kernel {
    let mut kernel = Kernel::new();
    for spawn in tasks {
        let pidx = kernel
            .procs
            .create(spawn)
            .expect("task table exhausted during boot");
        attach_pages(&mut kernel, pidx, spawn);
        arch.spawn(pidx, kernel.procs.get_mut(pidx));
    }
    kernel
}

/// Allocates the comm, storage, and user-stack pages every process gets
/// unconditionally, plus an arg page if `spawn.args` was supplied (§4.3).
fn attach_pages(kernel: &mut Kernel, pidx: abi::Pidx, spawn: &Spawn<'_>) {
    let comm_page = kernel.frames.allocate(pidx, 1);
    let storage_pages = kernel
        .frames
        .allocate(pidx, kernel.procs.storage_pages_per_proc());
    let user_stack_page = kernel.frames.allocate(pidx, 1);
    let arg_page = spawn.args.map(|payload| {
        let base = kernel
            .frames
            .allocate(pidx, 1)
            .expect("out of frames for arg page during boot");
        write_length_prefixed(&mut kernel.ram, base, payload);
        base
    });

    let proc = kernel.procs.get_mut(pidx);
    proc.comm_page = comm_page;
    proc.storage_pages = storage_pages;
    proc.user_stack_page = user_stack_page;
    proc.arg_page = arg_page;
}

/// Writes `payload` into the page at `base` as a little-endian length
/// followed by the raw bytes — the same convention `kernel::syscalls` reads
/// back for `IO_PUTS`/`PROC_LOOKUP`, reused here so `user_program_main`'s arg
/// page has one format to parse instead of two.
fn write_length_prefixed(ram: &mut crate::mem::Ram, base: usize, payload: &[u8]) {
    let Some(bytes) = crate::mem::PageAddr(base).raw_bytes_mut(ram) else {
        return;
    };
    let len = payload.len().min(bytes.len() - 4);
    bytes[0..4].copy_from_slice(&(len as u32).to_le_bytes());
    bytes[4..4 + len].copy_from_slice(&payload[..len]);
}

/// Boots `tasks` on `arch` and runs the kernel until the shell process
/// (slot 1) exits, then tears down through `arch.shutdown()`. Never returns
/// — matching the teacher's own `start_kernel`/`switch_to_user` contract.
pub fn run(arch: &mut dyn Arch, tasks: &[Spawn<'_>]) -> ! {
    let mut kernel = boot(arch, tasks);
    kernel.current = sched::IDLE_PIDX;
    while crate::trap::run_one(&mut kernel, arch) {}
    arch.shutdown()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::sim::SimArch;

    fn idle_entry() -> ! {
        loop {}
    }

    #[test]
    fn boot_attaches_pages_to_every_task() {
        let mut arch = SimArch::new();
        let tasks = [
            Spawn {
                name: "idle",
                entry: idle_entry as usize,
                args: None,
                kernel_mode: true,
            },
            Spawn {
                name: "shell",
                entry: idle_entry as usize,
                args: Some(b"hello"),
                kernel_mode: false,
            },
        ];
        let kernel = boot(&mut arch, &tasks);
        let idle = kernel.procs.get(sched::IDLE_PIDX);
        assert!(idle.comm_page.is_some());
        assert!(idle.storage_pages.is_some());
        assert!(idle.user_stack_page.is_some());
        assert!(idle.arg_page.is_none());

        let shell = kernel.procs.get(sched::SHELL_PIDX);
        assert!(shell.arg_page.is_some());
    }
}
