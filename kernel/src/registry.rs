//! Name registry (§4.9): process lookup by name. Registration is implicit
//! in `ProcessTable::create`; there is no separate publish step.

use abi::Pid;

use crate::task::ProcessTable;

/// Resolves `name` to a live process's `Pid`, scanning slots in descending
/// `Pidx` order so a newer same-named instance shadows an older one. Pidx is
/// unique per live process, so this is a total order, not a heuristic tie
/// break (resolves the open question in §9 / SPEC_FULL §D.3).
pub fn lookup(procs: &ProcessTable, name: &str) -> Option<Pid> {
    procs
        .iter()
        .rev()
        .find(|(_, p)| p.is_live() && p.name.as_str() == name)
        .map(|(_, p)| p.pid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Spawn;

    fn spawn(name: &'static str) -> Spawn<'static> {
        Spawn {
            name,
            entry: 0,
            args: None,
            kernel_mode: true,
        }
    }

    #[test]
    fn newer_same_named_process_shadows_older() {
        let mut t = ProcessTable::new();
        let first = t.create(&spawn("svc")).unwrap();
        let first_pid = t.get(first).pid;
        let second = t.create(&spawn("svc")).unwrap();
        let second_pid = t.get(second).pid;
        assert_ne!(first_pid, second_pid);
        assert_eq!(lookup(&t, "svc"), Some(second_pid));
    }

    #[test]
    fn unknown_name_is_none() {
        let t = ProcessTable::new();
        assert_eq!(lookup(&t, "nope"), None);
    }

    #[test]
    fn repeated_lookup_is_stable_until_exit() {
        let mut t = ProcessTable::new();
        let pidx = t.create(&spawn("x")).unwrap();
        let pid = t.get(pidx).pid;
        assert_eq!(lookup(&t, "x"), Some(pid));
        assert_eq!(lookup(&t, "x"), Some(pid));
        t.get_mut(pidx).state = crate::task::ProcessState::Terminated;
        assert_eq!(lookup(&t, "x"), None);
    }
}
