//! `echo`: demo IPC service that transforms comm-page data in place (§8 S5)
//! and, via `hl::serve`'s built-in handling of `METHOD_SHUTDOWN`, exits
//! cleanly on request (§8 S6).

#![cfg_attr(not(any(test, feature = "sim")), no_std)]

use abi::{ErrorCode, IpcFlags, Response, SysPageKind};
use userlib::{hl, raw};

/// First user-defined method id after the reserved `METHOD_SHUTDOWN`.
pub const METHOD_TRANSFORM: u32 = abi::METHOD_USER_BASE;

pub fn main() -> ! {
    let comm_base = hl::sys_get_sys_page(SysPageKind::Comm).expect("svc-echo requires a comm page");

    hl::serve(comm_base, |comm_base, _sender, method, flags, _args| {
        if method != METHOD_TRANSFORM {
            return Response::err(ErrorCode::IpcMethodNotKnown);
        }
        // Only bother touching the page if the caller actually sent one;
        // a TRANSFORM with no SEND_COMM_DATA is a no-op success.
        if flags.contains(IpcFlags::SEND_COMM_DATA) {
            raw::with_comm_page(*comm_base, transform);
        }
        Response::ok([0; 3])
    })
}

/// Bitwise-complements every byte. Simple enough that a test can predict the
/// exact output, which is the point: §8 S5 asserts the client sees this
/// transform applied bit-for-bit after the round trip.
fn transform(buf: &mut [u8]) {
    for b in buf.iter_mut() {
        *b = !*b;
    }
}
