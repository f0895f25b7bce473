//! Syscall table (§4.6).
//!
//! `dispatch` is the portable half of trap handling: it decodes
//! `frame.sysnum`/`frame.args` under the register convention from §6
//! (`a0, a1, a2, a4, a5` arguments; `a0, a1, a2, a4` primary/secondary
//! results), calls into the relevant module, and either writes an immediate
//! result into `frame.ret` or returns a [`NextTask`] that defers the result
//! to `kernel::trap::prepare_resume`.

use abi::{ErrorCode, KnownRegion, Response, SysPageKind, Sysnum};

use crate::arch::{Arch, TrapFrame};
use crate::mem::{PageAddr, Ram};
use crate::sched::NextTask;
use crate::task::ProcessState;
use crate::Kernel;

pub fn dispatch(
    kernel: &mut Kernel,
    arch: &mut dyn Arch,
    pidx: abi::Pidx,
    frame: &mut TrapFrame,
) -> NextTask {
    let Ok(sysnum) = Sysnum::try_from(frame.sysnum) else {
        // §7: "a syscall with invalid arguments returns a conventional
        // 0/null in its result register" — an unrecognised number is the
        // most basic case of that.
        frame.ret = [0; 5];
        return NextTask::Same;
    };

    match sysnum {
        Sysnum::Yield => NextTask::Scheduler,

        Sysnum::Putchar => {
            arch.putchar(frame.args[0] as u8);
            frame.ret[0] = 0;
            NextTask::Same
        }

        Sysnum::Getchar => {
            frame.ret[0] = match arch.getchar() {
                Some(b) => b as i32,
                None => -1,
            };
            NextTask::Same
        }

        Sysnum::Exit => {
            terminate(kernel, pidx);
            NextTask::Scheduler
        }

        Sysnum::AllocPage => {
            frame.ret[0] = kernel.frames.allocate(pidx, 1).unwrap_or(0) as i32;
            NextTask::Same
        }

        Sysnum::GetSysPage => {
            let proc = kernel.procs.get(pidx);
            let page = match SysPageKind::try_from(frame.args[0] as u32) {
                Ok(SysPageKind::Arg) => proc.arg_page,
                Ok(SysPageKind::Comm) => proc.comm_page,
                Ok(SysPageKind::Storage) => proc.storage_pages,
                Err(()) => None,
            };
            frame.ret[0] = page.unwrap_or(0) as i32;
            NextTask::Same
        }

        Sysnum::IoPuts => {
            if let Some(base) = kernel.procs.get(pidx).comm_page {
                if let Some(s) = read_comm_string(&kernel.ram, base) {
                    for b in s.bytes() {
                        arch.putchar(b);
                    }
                }
            }
            frame.ret[0] = 0;
            NextTask::Same
        }

        Sysnum::ProcLookup => {
            let found = kernel
                .procs
                .get(pidx)
                .comm_page
                .and_then(|base| read_comm_string(&kernel.ram, base))
                .and_then(|name| crate::registry::lookup(&kernel.procs, name));
            frame.ret[0] = found.map(|pid| pid.0 as i32).unwrap_or(0);
            NextTask::Same
        }

        Sysnum::IpcSend => {
            let target_pid = abi::Pid(frame.args[0] as u32);
            let method_and_flags = frame.args[1] as u32;
            let args = [frame.args[2], frame.args[3], frame.args[4]];
            crate::ipc::send(
                &mut kernel.procs,
                &mut kernel.ram,
                pidx,
                target_pid,
                method_and_flags,
                args,
            )
        }

        Sysnum::IpcRecv => {
            let (next, msg) = crate::ipc::recv(&mut kernel.procs, pidx);
            if let Some(msg) = msg {
                frame.ret = [
                    msg.sender_pid.0 as i32,
                    msg.method_and_flags as i32,
                    msg.args[0],
                    msg.args[1],
                    msg.args[2],
                ];
            }
            next
        }

        Sysnum::IpcReply => {
            let response = Response {
                error_code: error_code_from(frame.args[0]),
                values: [frame.args[1], frame.args[2], frame.args[3]],
            };
            crate::ipc::reply(&mut kernel.procs, &mut kernel.ram, pidx, response)
        }

        Sysnum::Shutdown => {
            crate::shutdown::shutdown_all_processes(
                arch,
                &mut kernel.procs,
                &mut kernel.frames,
                &mut kernel.regions,
            );
            NextTask::Scheduler
        }

        Sysnum::LockKnownMemory => {
            let kind = KnownRegion::try_from(frame.args[0] as u32);
            let pages = frame.args[1].max(0) as usize;
            frame.ret[0] = kind
                .ok()
                .and_then(|k| kernel.regions.lock(k, pages, pidx))
                .unwrap_or(0) as i32;
            NextTask::Same
        }
    }
}

fn terminate(kernel: &mut Kernel, pidx: abi::Pidx) {
    kernel.procs.get_mut(pidx).state = ProcessState::Terminated;
    kernel.frames.free_process(pidx);
    kernel.regions.release_all(pidx);
}

/// `error_code` arrives as a raw `i32` from the caller's register; anything
/// outside the known set collapses to `None` rather than panicking — an
/// out-of-range reply code is a user bug, not a kernel one.
fn error_code_from(raw: i32) -> ErrorCode {
    match raw {
        1 => ErrorCode::IpcPidNotFound,
        2 => ErrorCode::IpcMethodNotKnown,
        3 => ErrorCode::IpcMethodNotImplemented,
        4 => ErrorCode::DeviceError,
        _ => ErrorCode::None,
    }
}

/// Reads the length-prefixed string a caller placed in its own comm page
/// ahead of `IO_PUTS`/`PROC_LOOKUP`: a little-endian `u32` byte count
/// followed by that many UTF-8 bytes, borrowed straight out of the page
/// (no allocator available in `no_std` builds). A convention of these two
/// direct syscalls specifically, not the opaque whole-page transfer of §4.8.
fn read_comm_string(ram: &Ram, base: usize) -> Option<&str> {
    let bytes = PageAddr(base).raw_bytes(ram)?;
    let len = u32::from_le_bytes(bytes[0..4].try_into().ok()?) as usize;
    let len = len.min(bytes.len() - 4);
    core::str::from_utf8(&bytes[4..4 + len]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Spawn;
    use abi::{IpcFlags, PAGE_SIZE};

    fn frame(sysnum: Sysnum, args: [i32; 5]) -> TrapFrame {
        TrapFrame {
            sysnum: sysnum as u32,
            args,
            ret: [0; 5],
        }
    }

    fn spawn_at(kernel: &mut Kernel, name: &'static str, comm: usize) -> abi::Pidx {
        let pidx = kernel
            .procs
            .create(&Spawn {
                name,
                entry: 0,
                args: None,
                kernel_mode: true,
            })
            .unwrap();
        kernel.procs.get_mut(pidx).comm_page = Some(comm);
        pidx
    }

    struct NullArch;
    impl Arch for NullArch {
        fn spawn(&mut self, _pidx: abi::Pidx, _proc: &mut crate::task::Process) {}
        fn run_until_trap(
            &mut self,
            _pidx: abi::Pidx,
            _proc: &mut crate::task::Process,
            _frame: &mut TrapFrame,
        ) -> crate::arch::TrapCause {
            crate::arch::TrapCause::Syscall
        }
        fn set_return(&mut self, _pidx: abi::Pidx, _proc: &mut crate::task::Process, _frame: &TrapFrame) {}
        fn putchar(&mut self, _byte: u8) {}
        fn getchar(&mut self) -> Option<u8> {
            None
        }
        fn shutdown(&mut self) -> ! {
            panic!("NullArch::shutdown called in a test")
        }
    }

    #[test]
    fn alloc_page_returns_nonzero_then_exhausts() {
        let mut kernel = Kernel::new();
        let pidx = spawn_at(&mut kernel, "a", crate::config::RAM_BASE);
        let mut arch = NullArch;
        let mut f = frame(Sysnum::AllocPage, [0; 5]);
        let next = dispatch(&mut kernel, &mut arch, pidx, &mut f);
        assert_eq!(next, NextTask::Same);
        assert_ne!(f.ret[0], 0);
    }

    #[test]
    fn get_sys_page_returns_comm_page() {
        let mut kernel = Kernel::new();
        let pidx = spawn_at(&mut kernel, "a", 0xABCD_0000);
        let mut arch = NullArch;
        let mut f = frame(Sysnum::GetSysPage, [SysPageKind::Comm as i32, 0, 0, 0, 0]);
        dispatch(&mut kernel, &mut arch, pidx, &mut f);
        assert_eq!(f.ret[0] as usize, 0xABCD_0000);
    }

    #[test]
    fn proc_lookup_reads_name_from_comm_page() {
        let mut kernel = Kernel::new();
        let a = spawn_at(&mut kernel, "a", crate::config::RAM_BASE);
        let b = spawn_at(&mut kernel, "svc", crate::config::RAM_BASE + PAGE_SIZE);
        let b_pid = kernel.procs.get(b).pid;

        let page = PageAddr(kernel.procs.get(a).comm_page.unwrap());
        let bytes = page.raw_bytes_mut(&mut kernel.ram).unwrap();
        bytes[0..4].copy_from_slice(&3u32.to_le_bytes());
        bytes[4..7].copy_from_slice(b"svc");

        let mut arch = NullArch;
        let mut f = frame(Sysnum::ProcLookup, [0; 5]);
        dispatch(&mut kernel, &mut arch, a, &mut f);
        assert_eq!(f.ret[0] as u32, b_pid.0);
    }

    #[test]
    fn ipc_send_to_unknown_pid_reports_immediately() {
        let mut kernel = Kernel::new();
        let a = spawn_at(&mut kernel, "a", crate::config::RAM_BASE);
        let mut arch = NullArch;
        let mut f = frame(Sysnum::IpcSend, [9999, 0, 0, 0, 0]);
        let next = dispatch(&mut kernel, &mut arch, a, &mut f);
        assert_eq!(next, NextTask::Same);
        assert_eq!(
            kernel.procs.get(a).pending_response.unwrap().error_code,
            ErrorCode::IpcPidNotFound
        );
    }

    #[test]
    fn ipc_recv_then_reply_round_trip() {
        let mut kernel = Kernel::new();
        let a = spawn_at(&mut kernel, "a", crate::config::RAM_BASE);
        let b = spawn_at(&mut kernel, "b", crate::config::RAM_BASE + PAGE_SIZE);
        let b_pid = kernel.procs.get(b).pid;
        let mut arch = NullArch;

        let method_and_flags = abi::pack_method_and_flags(0x1000, IpcFlags::empty()) as i32;
        let mut send_frame = frame(Sysnum::IpcSend, [b_pid.0 as i32, method_and_flags, 7, 0, 0]);
        let next = dispatch(&mut kernel, &mut arch, a, &mut send_frame);
        assert_eq!(next, NextTask::Specific(b));

        let mut recv_frame = frame(Sysnum::IpcRecv, [0; 5]);
        let next = dispatch(&mut kernel, &mut arch, b, &mut recv_frame);
        assert_eq!(next, NextTask::Same);
        assert_eq!(recv_frame.ret[2], 7);

        let mut reply_frame = frame(Sysnum::IpcReply, [0, 42, 0, 0, 0]);
        let next = dispatch(&mut kernel, &mut arch, b, &mut reply_frame);
        assert_eq!(next, NextTask::Specific(a));
        assert_eq!(kernel.procs.get(a).pending_response.unwrap().values[0], 42);
    }
}
