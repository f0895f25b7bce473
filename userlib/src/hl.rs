//! High-level wrappers over the raw syscalls (§4.6).
//!
//! This is intended to provide a more ergonomic interface than
//! [`crate::raw::raw_syscall`] directly, the same division of labor as the
//! teacher's own `hl` module over its raw stubs.

use abi::{ErrorCode, IpcFlags, KnownRegion, Message, Pid, Response, Sysnum, SysPageKind};

use crate::raw::{raw_syscall, with_comm_page};

pub fn sys_yield() {
    raw_syscall(Sysnum::Yield, [0; 5]);
}

pub fn sys_putchar(byte: u8) {
    raw_syscall(Sysnum::Putchar, [byte as i32, 0, 0, 0, 0]);
}

pub fn sys_getchar() -> Option<u8> {
    let ret = raw_syscall(Sysnum::Getchar, [0; 5]);
    if ret[0] < 0 {
        None
    } else {
        Some(ret[0] as u8)
    }
}

/// Never returns: the kernel tears this process down and resumes the
/// scheduler instead of completing the trap.
pub fn sys_exit() -> ! {
    raw_syscall(Sysnum::Exit, [0; 5]);
    unreachable!("EXIT does not return control to the caller")
}

pub fn sys_alloc_page() -> Option<usize> {
    let ret = raw_syscall(Sysnum::AllocPage, [0; 5]);
    (ret[0] != 0).then_some(ret[0] as usize)
}

pub fn sys_get_sys_page(kind: SysPageKind) -> Option<usize> {
    let ret = raw_syscall(Sysnum::GetSysPage, [kind as i32, 0, 0, 0, 0]);
    (ret[0] != 0).then_some(ret[0] as usize)
}

/// Writes `s` into this process's comm page (length-prefixed, the same
/// convention `kernel::syscalls::read_comm_string` decodes — not
/// `userlib::comm`'s tagged payloads, which are for structured data between
/// services) and asks the kernel to echo it to the console. A no-op if this
/// process has no comm page, which should not happen outside of tests.
pub fn sys_io_puts(s: &str) {
    let Some(base) = sys_get_sys_page(SysPageKind::Comm) else {
        return;
    };
    with_comm_page(base, |buf| {
        crate::arg::write_length_prefixed(buf, s.as_bytes());
    });
    raw_syscall(Sysnum::IoPuts, [0; 5]);
}

/// Resolves `name` to a live `Pid` via the kernel's name registry (§4.9),
/// staging the lookup string through this process's comm page.
pub fn sys_proc_lookup(name: &str) -> Option<Pid> {
    let base = sys_get_sys_page(SysPageKind::Comm)?;
    with_comm_page(base, |buf| {
        crate::arg::write_length_prefixed(buf, name.as_bytes());
    });
    let ret = raw_syscall(Sysnum::ProcLookup, [0; 5]);
    (ret[0] != 0).then_some(Pid(ret[0] as u32))
}

/// `ipc_send`: blocks until `target` (or the kernel, for an immediate usage
/// fault) replies.
pub fn sys_ipc_send(target: Pid, method: u32, flags: IpcFlags, args: [i32; 3]) -> Response {
    let method_and_flags = abi::pack_method_and_flags(method, flags);
    let ret = raw_syscall(
        Sysnum::IpcSend,
        [target.0 as i32, method_and_flags as i32, args[0], args[1], args[2]],
    );
    Response {
        error_code: error_code_from(ret[0]),
        values: [ret[1], ret[2], ret[3]],
    }
}

/// `ipc_recv`: blocks until a request arrives.
pub fn sys_ipc_recv() -> Message {
    let ret = raw_syscall(Sysnum::IpcRecv, [0; 5]);
    Message {
        sender_pid: Pid(ret[0] as u32),
        method_and_flags: ret[1] as u32,
        args: [ret[2], ret[3], ret[4]],
    }
}

/// `ipc_reply`: delivers `response` to whichever sender is currently
/// blocked on us. A no-op, per §4.7, if nobody is.
pub fn sys_ipc_reply(response: Response) {
    raw_syscall(
        Sysnum::IpcReply,
        [
            response.error_code as i32,
            response.values[0],
            response.values[1],
            response.values[2],
            0,
        ],
    );
}

pub fn sys_shutdown() {
    raw_syscall(Sysnum::Shutdown, [0; 5]);
}

pub fn sys_lock_known_memory(region: KnownRegion) -> Option<usize> {
    let ret = raw_syscall(Sysnum::LockKnownMemory, [region as i32, 0, 0, 0, 0]);
    (ret[0] != 0).then_some(ret[0] as usize)
}

fn error_code_from(raw: i32) -> ErrorCode {
    match raw {
        1 => ErrorCode::IpcPidNotFound,
        2 => ErrorCode::IpcMethodNotKnown,
        3 => ErrorCode::IpcMethodNotImplemented,
        4 => ErrorCode::DeviceError,
        _ => ErrorCode::None,
    }
}

/// Runs a request/reply service loop forever: receive, dispatch to
/// `handle`, reply, repeat. `METHOD_SHUTDOWN` is intercepted here — every
/// service acknowledges it and exits without `handle` ever seeing it, per
/// §4.6's "every task recognizes it" requirement.
///
/// `state` carries whatever a particular service needs across iterations
/// (a counter, a handle to its own storage arena) without `handle` having to
/// capture it by a shared reference the borrow checker would reject across
/// the loop's repeated calls.
pub fn serve<S>(
    mut state: S,
    mut handle: impl FnMut(&mut S, Pid, u32, IpcFlags, [i32; 3]) -> Response,
) -> ! {
    loop {
        let msg = sys_ipc_recv();
        if msg.method() == abi::METHOD_SHUTDOWN {
            sys_ipc_reply(Response::ok([0; 3]));
            sys_exit();
        }
        let response = handle(&mut state, msg.sender_pid, msg.method(), msg.flags(), msg.args);
        sys_ipc_reply(response);
    }
}
