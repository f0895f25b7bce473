//! Host-backed `Arch` implementation: one native OS thread per simulated
//! process, handed off via the channel pair in `abi::sim_transport`
//! (SPEC_FULL §E).
//!
//! Exactly one process thread is ever unparked at a time: `run_until_trap`
//! sends that process its resume value and then blocks on its trap channel,
//! so no two process threads race on the (single, simulated) CPU.

use std::collections::BTreeMap;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::thread::JoinHandle;
use std::vec::Vec;

use abi::sim_transport::{self, SyscallChannel};
use abi::Pidx;

use crate::arch::{Arch, TrapCause, TrapFrame};
use crate::err::FaultInfo;
use crate::task::Process;

struct ProcHandle {
    resume_tx: SyncSender<[i32; 5]>,
    trap_rx: Receiver<(u32, [i32; 5])>,
    pending_ret: [i32; 5],
    _thread: JoinHandle<()>,
}

#[derive(Default)]
pub struct SimArch {
    procs: BTreeMap<u16, ProcHandle>,
    console_out: Vec<u8>,
    input: std::collections::VecDeque<u8>,
}

impl SimArch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written via `PUTCHAR`/`IO_PUTS` since the last call,
    /// consumed by the test harness to assert on console output (§8 S1).
    pub fn take_console_output(&mut self) -> std::string::String {
        let s = std::string::String::from_utf8_lossy(&self.console_out).into_owned();
        self.console_out.clear();
        s
    }

    /// Queues bytes that `GETCHAR` will return, oldest first.
    pub fn feed_input(&mut self, bytes: &[u8]) {
        self.input.extend(bytes.iter().copied());
    }
}

impl Arch for SimArch {
    fn spawn(&mut self, pidx: Pidx, proc: &mut Process) {
        let (resume_tx, resume_rx) = sync_channel::<[i32; 5]>(0);
        let (trap_tx, trap_rx) = sync_channel::<(u32, [i32; 5])>(0);

        // SAFETY: `user_pc` was produced by `kernel::startup::boot` from a
        // `Spawn::entry` that is itself `some_task_fn as usize` for a real
        // `fn() -> !` of this exact signature; transmuting a
        // function-pointer-sized integer back to that pointer type is
        // well-defined as long as the value was never anything else.
        let entry: fn() -> ! = unsafe { core::mem::transmute(proc.user_pc) };

        let channel = SyscallChannel {
            to_kernel: trap_tx,
            from_kernel: resume_rx,
        };

        let handle = std::thread::Builder::new()
            .name(std::format!("proc-{}", pidx.index()))
            .spawn(move || {
                sim_transport::install(channel);
                sim_transport::wait_for_first_run();
                entry();
            })
            .expect("spawning simulated process thread");

        self.procs.insert(
            pidx.index() as u16,
            ProcHandle {
                resume_tx,
                trap_rx,
                pending_ret: [0; 5],
                _thread: handle,
            },
        );
    }

    fn run_until_trap(&mut self, pidx: Pidx, _proc: &mut Process, frame: &mut TrapFrame) -> TrapCause {
        let handle = self
            .procs
            .get_mut(&(pidx.index() as u16))
            .expect("run_until_trap on an unspawned process");

        let ret = handle.pending_ret;
        handle
            .resume_tx
            .send(ret)
            .expect("simulated process thread exited unexpectedly");

        match handle.trap_rx.recv() {
            Ok((sysnum, args)) => {
                frame.sysnum = sysnum;
                frame.args = args;
                TrapCause::Syscall
            }
            Err(_) => {
                // The thread ended without calling EXIT (a bug in the task,
                // not the kernel): treat it as a fault rather than hanging
                // the scheduler forever.
                TrapCause::Fault(FaultInfo::IllegalInstruction)
            }
        }
    }

    fn set_return(&mut self, pidx: Pidx, _proc: &mut Process, frame: &TrapFrame) {
        if let Some(handle) = self.procs.get_mut(&(pidx.index() as u16)) {
            handle.pending_ret = frame.ret;
        }
    }

    fn putchar(&mut self, byte: u8) {
        self.console_out.push(byte);
    }

    fn getchar(&mut self) -> Option<u8> {
        self.input.pop_front()
    }

    fn shutdown(&mut self) -> ! {
        std::process::exit(0);
    }
}
