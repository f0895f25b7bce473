//! Trap dispatch and the kernel's run loop (§4.6).
//!
//! `run_one` is the portable half of "trap entry saves registers, the
//! dispatcher inspects the cause, routes or faults, and the scheduler
//! re-enters" — the register save/restore itself is `Arch::run_until_trap`.

use crate::arch::{Arch, TrapCause};
use crate::err::FaultInfo;
use crate::sched::{self, NextTask};
use crate::task::ProcessState;
use crate::Kernel;

/// Runs the kernel for exactly one trap. Returns `false` once the shell
/// process (§4.5 slot 1) has exited and there is nothing left to schedule,
/// at which point the caller should invoke `arch.shutdown()`.
pub fn run_one(kernel: &mut Kernel, arch: &mut dyn Arch) -> bool {
    let current = kernel.current;

    let mut frame = crate::arch::TrapFrame::default();
    let cause = arch.run_until_trap(current, kernel.procs.get_mut(current), &mut frame);

    let next = match cause {
        TrapCause::Syscall => crate::syscalls::dispatch(kernel, arch, current, &mut frame),
        TrapCause::SbiCall { .. } => {
            // Forwarded unchanged per §4.6; nothing for the kernel to do
            // beyond letting the same process continue.
            NextTask::Same
        }
        TrapCause::Fault(reason) => handle_fault(kernel, arch, current, reason),
    };

    advance(kernel, arch, current, next, frame);

    !sched::shell_has_exited(&kernel.procs)
}

/// Terminates a user-mode fault after logging it (§4.6 "print diagnostic").
/// A fault trapped while already running in kernel mode is not recoverable
/// at all — it means a kernel bug, not a misbehaving task — so it logs and
/// panics instead of touching the process table.
fn handle_fault(kernel: &mut Kernel, arch: &mut dyn Arch, current: abi::Pidx, reason: FaultInfo) -> NextTask {
    if kernel.procs.get(current).kernel_mode {
        crate::klog::klog(
            arch,
            "panic: %s",
            &[crate::klog::Arg::Str("fault trapped from kernel mode")],
        );
        panic!("{}", crate::err::KernelPanic("fault trapped from kernel mode"));
    }
    log_fault(arch, kernel.procs.get(current).name.as_str(), &reason);
    kernel.procs.get_mut(current).force_fault(reason);
    kernel.frames.free_process(current);
    kernel.regions.release_all(current);
    NextTask::Scheduler
}

fn log_fault(arch: &mut dyn Arch, proc_name: &str, reason: &FaultInfo) {
    use crate::klog::{klog, Arg};
    match *reason {
        FaultInfo::IllegalInstruction => {
            klog(arch, "fault: task %s illegal instruction", &[Arg::Str(proc_name)]);
        }
        FaultInfo::BadMemoryAccess { addr } => {
            klog(arch, "fault: task %s bad memory access at %x", &[Arg::Str(proc_name), Arg::Hex(addr as u32)]);
        }
        FaultInfo::UnalignedAccess { addr } => {
            klog(arch, "fault: task %s unaligned access at %x", &[Arg::Str(proc_name), Arg::Hex(addr as u32)]);
        }
        FaultInfo::UnknownTrap { cause } => {
            klog(arch, "fault: task %s unrecognised trap cause %x", &[Arg::Str(proc_name), Arg::Hex(cause as u32)]);
        }
    }
}

fn advance(
    kernel: &mut Kernel,
    arch: &mut dyn Arch,
    current: abi::Pidx,
    next: NextTask,
    frame: crate::arch::TrapFrame,
) {
    // Deliver the current process's own syscall return values (the common,
    // synchronous case: YIELD, ALLOC_PAGE, a failed IPC_SEND, ...).
    arch.set_return(current, kernel.procs.get_mut(current), &frame);

    let target = match next {
        NextTask::Same => current,
        NextTask::Scheduler => sched::pick_next(&kernel.procs, current),
        NextTask::Specific(p) => p,
    };
    kernel.current = target;

    prepare_resume(kernel, arch, target);
}

/// Drains any delayed IPC delivery waiting for `target` — a reply to its
/// blocked `IPC_SEND`, or a message that arrived while it was parked in
/// `IPC_RECV` — into its return registers before it runs again.
fn prepare_resume(kernel: &mut Kernel, arch: &mut dyn Arch, target: abi::Pidx) {
    let proc = kernel.procs.get_mut(target);

    if let Some(resp) = proc.pending_response.take() {
        let frame = crate::arch::TrapFrame {
            ret: [
                resp.error_code as i32,
                resp.values[0],
                resp.values[1],
                resp.values[2],
                0,
            ],
            ..Default::default()
        };
        arch.set_return(target, kernel.procs.get_mut(target), &frame);
        return;
    }

    if proc.state == ProcessState::Runnable {
        if let Some(msg) = proc.pending_message.take() {
            let frame = crate::arch::TrapFrame {
                ret: [
                    msg.sender_pid.0 as i32,
                    msg.method_and_flags as i32,
                    msg.args[0],
                    msg.args[1],
                    msg.args[2],
                ],
                ..Default::default()
            };
            arch.set_return(target, kernel.procs.get_mut(target), &frame);
        }
    }
}
