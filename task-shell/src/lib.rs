//! `shell`: the conventional slot-1 process (§4.5, `kernel::sched::SHELL_PIDX`).
//! Exercises the IPC surface end to end against `svc-fib` and `svc-echo`
//! and then exits, which is what ends the kernel's run loop (§4.10) — the
//! demo-system analogue of the original's init process bringing the system
//! down once its job is done.

#![cfg_attr(not(any(test, feature = "sim")), no_std)]

use abi::{ErrorCode, IpcFlags, SysPageKind};
use userlib::{hl, raw};

pub fn main() -> ! {
    run_fib_demo();
    run_echo_demo();
    hl::sys_exit();
}

fn run_fib_demo() {
    let Some(fib) = hl::sys_proc_lookup("fib") else {
        hl::sys_io_puts("shell: fib service not found\n");
        return;
    };
    let resp = hl::sys_ipc_send(fib, svc_fib::METHOD_CALC_FIB, IpcFlags::empty(), [10, 0, 0]);
    if resp.error_code == ErrorCode::None && resp.values[0] == 55 {
        hl::sys_io_puts("shell: fib(10) = 55\n");
    } else {
        hl::sys_io_puts("shell: fib demo failed\n");
    }
}

fn run_echo_demo() {
    let Some(echo) = hl::sys_proc_lookup("echo") else {
        hl::sys_io_puts("shell: echo service not found\n");
        return;
    };
    if let Some(comm_base) = hl::sys_get_sys_page(SysPageKind::Comm) {
        raw::with_comm_page(comm_base, |buf| {
            for (i, b) in buf.iter_mut().enumerate() {
                *b = i as u8;
            }
        });
    }

    let resp = hl::sys_ipc_send(
        echo,
        svc_echo::METHOD_TRANSFORM,
        IpcFlags::SEND_COMM_DATA | IpcFlags::RECV_COMM_DATA,
        [0; 3],
    );
    if resp.error_code == ErrorCode::None {
        hl::sys_io_puts("shell: echo transform ok\n");
    }

    // §8 S6: politely ask the service to shut itself down before we exit.
    hl::sys_ipc_send(echo, abi::METHOD_SHUTDOWN, IpcFlags::empty(), [0; 3]);
}
