//! `fib`: demo IPC service computing Fibonacci numbers (§8 S3/S4).
//!
//! Exposes `main` rather than a `fn main()` binary entry point because this
//! kernel has no dynamic linking (SPEC_FULL Non-goals): every task is a
//! plain function linked directly into the kernel/host image, started by
//! `kernel::startup::boot` jumping to its `Spawn::entry` pointer.

#![cfg_attr(not(any(test, feature = "sim")), no_std)]

use abi::{ErrorCode, Response};
use userlib::hl;

/// First user-defined method id after the reserved `METHOD_SHUTDOWN`.
pub const METHOD_CALC_FIB: u32 = abi::METHOD_USER_BASE;

pub fn main() -> ! {
    hl::serve((), |(), _sender, method, _flags, args| {
        if method != METHOD_CALC_FIB {
            return Response::err(ErrorCode::IpcMethodNotKnown);
        }
        let n = args[0].max(0) as u32;
        Response::ok([fib(n) as i32, 0, 0])
    })
}

fn fib(n: u32) -> u64 {
    let (mut a, mut b) = (0u64, 1u64);
    for _ in 0..n {
        let next = a + b;
        a = b;
        b = next;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fib_matches_known_values() {
        assert_eq!(fib(0), 0);
        assert_eq!(fib(1), 1);
        assert_eq!(fib(10), 55);
        assert_eq!(fib(20), 6765);
    }
}
