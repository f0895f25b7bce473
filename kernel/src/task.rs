//! Process table and process control block (§3, §4.3).

use abi::{IpcFlags, Message, Pid, Response, PROC_NAME_MAX};

use crate::config::{KERNEL_STACK_WORDS, PROCS_MAX, STORAGE_PAGES_PER_PROC};
use crate::err::FaultInfo;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ProcessState {
    Unused,
    Runnable,
    IpcWait,
    Terminated,
}

/// A bounded UTF-8 process name, the in-kernel analogue of the original's
/// fixed `char name[32]`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ProcName {
    bytes: [u8; PROC_NAME_MAX],
    len: u8,
}

impl ProcName {
    pub fn new(name: &str) -> Self {
        let mut bytes = [0u8; PROC_NAME_MAX];
        let n = name.len().min(PROC_NAME_MAX);
        bytes[..n].copy_from_slice(&name.as_bytes()[..n]);
        Self { bytes, len: n as u8 }
    }

    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("")
    }
}

/// Startup parameters for [`ProcessTable::create`].
pub struct Spawn<'a> {
    pub name: &'a str,
    pub entry: usize,
    pub args: Option<&'a [u8]>,
    pub kernel_mode: bool,
}

/// Per-process control block (§3).
pub struct Process {
    pub state: ProcessState,
    pub name: ProcName,
    pub pid: Pid,
    pub kernel_mode: bool,

    /// Inline kernel stack; the architecture backend treats this as raw
    /// storage for callee-saved registers across a context switch.
    pub kstack: [u32; KERNEL_STACK_WORDS],
    /// Saved stack pointer into `kstack`, valid while not the current
    /// process.
    pub saved_sp: usize,
    /// Saved user-mode program counter, restored into `sepc` (or the
    /// fiber's resume point on WASM) on switch-in.
    pub user_pc: usize,

    pub arg_page: Option<usize>,
    pub comm_page: Option<usize>,
    pub storage_pages: Option<usize>,
    pub user_stack_page: Option<usize>,

    pub pending_message: Option<Message>,
    pub pending_response: Option<Response>,
    /// The pidx of a sender currently awaiting our reply, if any.
    pub blocked_sender: Option<abi::Pidx>,
    /// Flags of the request we are currently blocking `blocked_sender` on,
    /// so `IPC_REPLY` knows whether to honor `RECV_COMM_DATA` without
    /// needing the original `Message` (already handed to the receiver and
    /// possibly long consumed by the time it replies).
    pub pending_reply_flags: IpcFlags,
}

impl Process {
    const fn unused() -> Self {
        Self {
            state: ProcessState::Unused,
            name: ProcName {
                bytes: [0; PROC_NAME_MAX],
                len: 0,
            },
            pid: Pid::NONE,
            kernel_mode: false,
            kstack: [0; KERNEL_STACK_WORDS],
            saved_sp: 0,
            user_pc: 0,
            arg_page: None,
            comm_page: None,
            storage_pages: None,
            user_stack_page: None,
            pending_message: None,
            pending_response: None,
            blocked_sender: None,
            pending_reply_flags: IpcFlags::empty(),
        }
    }

    pub fn is_live(&self) -> bool {
        self.state != ProcessState::Unused
    }

    /// Terminates this process in place: marks it, without yet releasing
    /// its resources (that is the frame allocator's and region table's job,
    /// driven from `kernel::ipc`/`kernel::shutdown`).
    pub fn force_fault(&mut self, _reason: FaultInfo) {
        self.state = ProcessState::Terminated;
    }
}

pub struct ProcessTable {
    procs: [Process; PROCS_MAX],
    next_pid: u32,
}

impl ProcessTable {
    pub const fn new() -> Self {
        const UNUSED: Process = Process::unused();
        Self {
            procs: [UNUSED; PROCS_MAX],
            // Pid::NONE (0) is reserved for "no process"; real pids start at 1.
            next_pid: 1,
        }
    }

    pub fn get(&self, pidx: abi::Pidx) -> &Process {
        &self.procs[pidx.index()]
    }

    pub fn get_mut(&mut self, pidx: abi::Pidx) -> &mut Process {
        &mut self.procs[pidx.index()]
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (abi::Pidx, &Process)> {
        self.procs
            .iter()
            .enumerate()
            .map(|(i, p)| (abi::Pidx::from_index(i), p))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (abi::Pidx, &mut Process)> {
        self.procs
            .iter_mut()
            .enumerate()
            .map(|(i, p)| (abi::Pidx::from_index(i), p))
    }

    /// Resolves a live `pid` to its table index, or `None` if it does not
    /// name a currently-live process (dead, unknown, or stale after slot
    /// reuse).
    pub fn find_by_pid(&self, pid: Pid) -> Option<abi::Pidx> {
        if pid.is_none() {
            return None;
        }
        self.iter()
            .find(|(_, p)| p.is_live() && p.pid == pid)
            .map(|(pidx, _)| pidx)
    }

    /// Finds the first UNUSED slot and reserves it with a freshly minted
    /// `Pid`, `name`, and `kernel_mode` flag, leaving page fields unset —
    /// callers (`kernel::startup` / a `CREATE_PROCESS`-style syscall) attach
    /// pages afterward and then flip the state to RUNNABLE. Returns `None`
    /// if every slot is occupied (§8 boundary: the `PROCS_MAX + 1`'th create
    /// fails cleanly).
    pub fn create(&mut self, spawn: &Spawn<'_>) -> Option<abi::Pidx> {
        let (pidx, proc) = self
            .procs
            .iter_mut()
            .enumerate()
            .find(|(_, p)| !p.is_live())
            .map(|(i, p)| (abi::Pidx::from_index(i), p))?;

        *proc = Process::unused();
        let pid = Pid(self.next_pid);
        self.next_pid += 1;

        proc.pid = pid;
        proc.name = ProcName::new(spawn.name);
        proc.kernel_mode = spawn.kernel_mode;
        proc.user_pc = spawn.entry;
        proc.state = ProcessState::Runnable;

        Some(pidx)
    }

    pub fn storage_pages_per_proc(&self) -> usize {
        STORAGE_PAGES_PER_PROC
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn(name: &'static str) -> Spawn<'static> {
        Spawn {
            name,
            entry: 0,
            args: None,
            kernel_mode: true,
        }
    }

    #[test]
    fn create_assigns_monotonic_pids() {
        let mut t = ProcessTable::new();
        let p1 = t.create(&spawn("a")).unwrap();
        let p2 = t.create(&spawn("b")).unwrap();
        assert!(t.get(p1).pid.0 < t.get(p2).pid.0);
    }

    #[test]
    fn create_beyond_capacity_fails_cleanly() {
        let mut t = ProcessTable::new();
        for i in 0..PROCS_MAX {
            assert!(t.create(&spawn("x")).is_some(), "slot {i} should have been available");
        }
        assert!(t.create(&spawn("overflow")).is_none());
    }

    #[test]
    fn stale_pid_after_slot_reuse_is_not_found() {
        let mut t = ProcessTable::new();
        let pidx = t.create(&spawn("a")).unwrap();
        let old_pid = t.get(pidx).pid;
        t.get_mut(pidx).state = ProcessState::Terminated;
        t.get_mut(pidx).state = ProcessState::Unused;
        let new_pidx = t.create(&spawn("a-restarted")).unwrap();
        assert_eq!(new_pidx, pidx);
        assert!(t.find_by_pid(old_pid).is_none());
    }
}
