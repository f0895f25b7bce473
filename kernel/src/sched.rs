//! Cooperative round-robin scheduler (§4.5).

use abi::Pidx;

use crate::task::{ProcessState, ProcessTable};

/// What a syscall handler wants to happen to the CPU next. Mirrors the
/// teacher's own `NextTask` split between "stay put", "let the scheduler
/// pick", and "go directly to a specific process" — the last variant is how
/// IPC's direct hand-off (§4.7) bypasses `pick_next` entirely.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NextTask {
    Same,
    Scheduler,
    Specific(Pidx),
}

/// Reserved idle slot; never scheduled by name, only as the scheduler's
/// fallback when no other slot is runnable.
pub const IDLE_PIDX: Pidx = Pidx(0);

/// Conventional "init" / shell slot. When this process terminates the
/// scheduler loop exits (§4.5, §4.10).
pub const SHELL_PIDX: Pidx = Pidx(1);

/// Picks the next process to run: a round-robin scan over slots
/// `current.index() + 1 ..`, wrapping, landing on the first `RUNNABLE` slot
/// with `pidx > 0`. Falls back to [`IDLE_PIDX`] if nothing else qualifies.
pub fn pick_next(procs: &ProcessTable, current: Pidx) -> Pidx {
    let n = crate::config::PROCS_MAX;
    let start = current.index() + 1;
    for offset in 0..n {
        let i = (start + offset) % n;
        if i == 0 {
            continue;
        }
        let pidx = Pidx::from_index(i);
        if procs.get(pidx).state == ProcessState::Runnable {
            return pidx;
        }
    }
    IDLE_PIDX
}

/// True once the shell process (slot 1) has left RUNNABLE/IPC_WAIT,
/// signalling the outer run loop to shut down (§4.5).
pub fn shell_has_exited(procs: &ProcessTable) -> bool {
    let shell = procs.get(SHELL_PIDX);
    !matches!(
        shell.state,
        ProcessState::Runnable | ProcessState::IpcWait
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Spawn;

    #[test]
    fn round_robins_from_current_plus_one() {
        let mut t = ProcessTable::new();
        let spawn = |name: &'static str| Spawn {
            name,
            entry: 0,
            args: None,
            kernel_mode: true,
        };
        let idle = t.create(&spawn("idle")).unwrap();
        let a = t.create(&spawn("a")).unwrap();
        let b = t.create(&spawn("b")).unwrap();
        assert_eq!(idle, IDLE_PIDX);
        assert_eq!(pick_next(&t, idle), a);
        assert_eq!(pick_next(&t, a), b);
        // Wrapping past the end skips slot 0 (idle) and lands back on `a`.
        assert_eq!(pick_next(&t, b), a);
    }

    #[test]
    fn falls_back_to_idle_when_nothing_runnable() {
        let mut t = ProcessTable::new();
        t.get_mut(IDLE_PIDX).state = ProcessState::Runnable;
        assert_eq!(pick_next(&t, IDLE_PIDX), IDLE_PIDX);
    }
}
