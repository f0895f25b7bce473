//! Synchronous request/reply IPC core (§4.7) — the heart of the kernel.
//!
//! `send`/`recv`/`reply` only ever touch process-table state; whether a
//! blocked process's registers get the delivered message or reply written
//! into them happens later, when the architecture backend resumes it (see
//! `kernel::trap::prepare_resume`). That split keeps this module free of any
//! register-file or trap-frame layout knowledge.

use abi::{ErrorCode, IpcFlags, Message, Pid, Response};

use crate::mem::{PageAddr, Ram};
use crate::sched::NextTask;
use crate::task::{ProcessState, ProcessTable};

/// `ipc_send(target_pid, method_and_flags, args)`, as seen from `sender`.
///
/// Returns the `NextTask` the dispatcher should act on. If the target isn't
/// live (including a send to the caller's own pid, diagnosed rather than
/// allowed to deadlock — SPEC_FULL §D.1), the caller's own response is
/// written immediately and execution continues on the same process.
pub fn send(
    procs: &mut ProcessTable,
    ram: &mut Ram,
    sender: abi::Pidx,
    target_pid: Pid,
    method_and_flags: u32,
    args: [i32; 3],
) -> NextTask {
    let sender_pid = procs.get(sender).pid;

    if target_pid == sender_pid || procs.find_by_pid(target_pid).is_none() {
        procs.get_mut(sender).pending_response = Some(Response::err(ErrorCode::IpcPidNotFound));
        return NextTask::Same;
    }
    let target = procs.find_by_pid(target_pid).unwrap();

    // A target that already has a `blocked_sender` has received a request
    // it has not replied to yet — whether it is actively running it or
    // itself blocked on a nested `send` (its own `state` is `IpcWait` either
    // way, which is why that alone can't distinguish "genuinely idle in
    // recv" from "busy"). Accepting a second sender here would overwrite
    // `blocked_sender`/`pending_message`, stranding the first sender's
    // reply and breaking invariant 5 (§3/§8: at most one sender has
    // `blocked_sender == target`). Park ourselves instead; we are not
    // queued, so whoever wakes us must retry the send (§4.7 double-send).
    if procs.get(target).blocked_sender.is_some() {
        procs.get_mut(sender).state = ProcessState::IpcWait;
        return NextTask::Scheduler;
    }

    if abi::unpack_flags(method_and_flags).contains(IpcFlags::SEND_COMM_DATA) {
        copy_comm_page(procs, ram, sender, target);
    }

    let message = Message {
        sender_pid,
        method_and_flags,
        args,
    };
    {
        let t = procs.get_mut(target);
        t.pending_message = Some(message);
        t.blocked_sender = Some(sender);
        t.pending_reply_flags = message.flags();
    }

    // The sender is suspended until the matching reply; its own
    // pending_response is filled in by `reply`, not here. Parking it in
    // IPC_WAIT (the same state `recv` uses) keeps `sched::pick_next` from
    // ever resuming it early, whether we hand off directly below or fall
    // through to the scheduler.
    procs.get_mut(sender).state = ProcessState::IpcWait;

    let was_waiting = procs.get(target).state == ProcessState::IpcWait;
    if was_waiting {
        procs.get_mut(target).state = ProcessState::Runnable;
        NextTask::Specific(target)
    } else {
        // Target is RUNNABLE (possibly mid-reply to someone else) or
        // TERMINATED; either way we cannot hand off directly. Falling
        // through to the scheduler covers the "double-send to a busy
        // service" case from §4.7 and leaves a send to a dead target's
        // slot (if it died after the `find_by_pid` check above, which
        // cannot happen within this single-threaded call) moot.
        NextTask::Scheduler
    }
}

/// `ipc_recv()`, as seen from `receiver`. If a message is already pending it
/// is consumed immediately (caller should write it into return registers
/// itself); otherwise the process blocks.
pub fn recv(procs: &mut ProcessTable, receiver: abi::Pidx) -> (NextTask, Option<Message>) {
    let proc = procs.get_mut(receiver);
    if let Some(msg) = proc.pending_message.take() {
        (NextTask::Same, Some(msg))
    } else {
        proc.state = ProcessState::IpcWait;
        (NextTask::Scheduler, None)
    }
}

/// `ipc_reply(response)`, as seen from `replier`. No-ops (logged, per §4.7
/// "reply without a blocked sender") if nobody is waiting on this replier.
/// Whether the comm page travels back is decided by the original request's
/// own flags (`pending_reply_flags`), not anything the replier specifies.
pub fn reply(
    procs: &mut ProcessTable,
    ram: &mut Ram,
    replier: abi::Pidx,
    response: Response,
) -> NextTask {
    let Some(sender) = procs.get(replier).blocked_sender else {
        return NextTask::Same;
    };

    if procs
        .get(replier)
        .pending_reply_flags
        .contains(IpcFlags::RECV_COMM_DATA)
    {
        copy_comm_page(procs, ram, replier, sender);
    }

    procs.get_mut(sender).pending_response = Some(response);
    procs.get_mut(sender).state = ProcessState::Runnable;
    procs.get_mut(replier).blocked_sender = None;

    // The sender was parked mid-`ipc_send`, never scheduled away from
    // RUNNABLE in the process-table sense (it is "running" on its own
    // kernel stack, suspended inside `switch_context`) — so there is no
    // state to flip here, only the direct switch back to it.
    NextTask::Specific(sender)
}

fn copy_comm_page(procs: &ProcessTable, ram: &mut Ram, from: abi::Pidx, to: abi::Pidx) {
    let (Some(src), Some(dst)) = (procs.get(from).comm_page, procs.get(to).comm_page) else {
        return;
    };
    let _ = PageAddr(src).copy_page_to(PageAddr(dst), ram);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Spawn;

    fn make_two(procs: &mut ProcessTable) -> (abi::Pidx, abi::Pidx) {
        let a = procs
            .create(&Spawn {
                name: "a",
                entry: 0,
                args: None,
                kernel_mode: true,
            })
            .unwrap();
        let b = procs
            .create(&Spawn {
                name: "b",
                entry: 0,
                args: None,
                kernel_mode: true,
            })
            .unwrap();
        procs.get_mut(a).comm_page = Some(crate::config::RAM_BASE);
        procs.get_mut(b).comm_page = Some(crate::config::RAM_BASE + abi::PAGE_SIZE);
        (a, b)
    }

    #[test]
    fn send_to_self_is_diagnosed() {
        let mut procs = ProcessTable::new();
        let mut ram = Ram::new();
        let (a, _b) = make_two(&mut procs);
        let self_pid = procs.get(a).pid;
        let next = send(&mut procs, &mut ram, a, self_pid, 0, [0; 3]);
        assert_eq!(next, NextTask::Same);
        assert_eq!(
            procs.get(a).pending_response.unwrap().error_code,
            ErrorCode::IpcPidNotFound
        );
    }

    #[test]
    fn send_to_unknown_pid_fails_immediately() {
        let mut procs = ProcessTable::new();
        let mut ram = Ram::new();
        let (a, _b) = make_two(&mut procs);
        let next = send(&mut procs, &mut ram, a, Pid(9999), 0, [0; 3]);
        assert_eq!(next, NextTask::Same);
        assert_eq!(
            procs.get(a).pending_response.unwrap().error_code,
            ErrorCode::IpcPidNotFound
        );
    }

    #[test]
    fn round_trip_send_recv_reply() {
        let mut procs = ProcessTable::new();
        let mut ram = Ram::new();
        let (a, b) = make_two(&mut procs);
        let b_pid = procs.get(b).pid;

        // b blocks in recv first.
        let (next, msg) = recv(&mut procs, b);
        assert_eq!(next, NextTask::Scheduler);
        assert!(msg.is_none());
        assert_eq!(procs.get(b).state, ProcessState::IpcWait);

        let next = send(&mut procs, &mut ram, a, b_pid, 0x1234, [1, 2, 3]);
        assert_eq!(next, NextTask::Specific(b));
        assert_eq!(procs.get(b).state, ProcessState::Runnable);
        assert_eq!(procs.get(a).state, ProcessState::IpcWait);

        let (next, msg) = recv(&mut procs, b);
        assert_eq!(next, NextTask::Same);
        let msg = msg.unwrap();
        assert_eq!(msg.args, [1, 2, 3]);

        let next = reply(&mut procs, &mut ram, b, Response::ok([55, 0, 0]));
        assert_eq!(next, NextTask::Specific(a));
        assert_eq!(procs.get(a).state, ProcessState::Runnable);
        let resp = procs.get(a).pending_response.unwrap();
        assert_eq!(resp.values[0], 55);
    }

    #[test]
    fn send_to_already_busy_target_does_not_clobber_first_sender() {
        let mut procs = ProcessTable::new();
        let mut ram = Ram::new();
        let (a, b) = make_two(&mut procs);
        let c = procs
            .create(&Spawn {
                name: "c",
                entry: 0,
                args: None,
                kernel_mode: true,
            })
            .unwrap();
        procs.get_mut(c).comm_page = Some(crate::config::RAM_BASE + 2 * abi::PAGE_SIZE);
        let b_pid = procs.get(b).pid;

        // a's request reaches b and is not yet replied to.
        let next = send(&mut procs, &mut ram, a, b_pid, 0, [0; 3]);
        assert_eq!(next, NextTask::Specific(b));
        assert_eq!(procs.get(b).blocked_sender, Some(a));

        // b, while handling it, blocks itself doing its own nested send —
        // its state becomes IpcWait without touching blocked_sender.
        procs.get_mut(b).state = ProcessState::IpcWait;

        // c now sends to b. It must not steal a's slot.
        let next = send(&mut procs, &mut ram, c, b_pid, 0, [0; 3]);
        assert_eq!(next, NextTask::Scheduler);
        assert_eq!(procs.get(c).state, ProcessState::IpcWait);
        assert_eq!(procs.get(b).blocked_sender, Some(a));

        // b can still reply to a afterward.
        procs.get_mut(b).state = ProcessState::Runnable;
        let next = reply(&mut procs, &mut ram, b, Response::ok([0; 3]));
        assert_eq!(next, NextTask::Specific(a));
    }

    #[test]
    fn reply_without_blocked_sender_is_noop() {
        let mut procs = ProcessTable::new();
        let mut ram = Ram::new();
        let (_a, b) = make_two(&mut procs);
        let next = reply(&mut procs, &mut ram, b, Response::ok([0; 3]));
        assert_eq!(next, NextTask::Same);
    }
}
