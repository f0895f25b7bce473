//! The raw syscall trampoline (§6 Syscall ABI): one `ecall`/channel-send per
//! backend, everything else in [`crate::hl`] built strictly on top of this.
//!
//! Arguments travel in `a0, a1, a2, a4, a5`; results come back in the same
//! five slots (`a0` primary, `a1, a2, a4` secondary, plus `a5` — a deviation
//! from the ABI text's four named return registers needed so `IPC_RECV` can
//! deliver a full three-argument message in one trap; see `DESIGN.md`).

use abi::Sysnum;

cfg_if::cfg_if! {
    if #[cfg(any(test, feature = "sim"))] {
        use std::cell::RefCell;

        thread_local! {
            static COMM_PAGE: RefCell<[u8; abi::PAGE_SIZE]> = RefCell::new([0; abi::PAGE_SIZE]);
        }

        /// Routes through the native-thread channel pair installed by
        /// `kernel::arch::sim` when this task's OS thread was spawned.
        pub fn raw_syscall(sysnum: Sysnum, args: [i32; 5]) -> [i32; 5] {
            abi::sim_transport::raw_syscall(sysnum as u32, args)
        }

        /// Gives `f` a view of this (simulated) process's comm page.
        ///
        /// On a real riscv32/wasm32 target the comm page is ordinary memory
        /// in the same flat address space as the kernel's, so a process can
        /// dereference the address `GET_SYS_PAGE(Comm)` returns directly.
        /// A `sim` process is a native OS thread with its own address space
        /// and no such mapping, so this is backed by a thread-local buffer
        /// instead — sufficient for exercising `userlib::comm`'s own
        /// encode/decode logic against, but it does NOT make
        /// `SEND_COMM_DATA`/`RECV_COMM_DATA` transfers observable from a
        /// simulated task's side; those are asserted directly against
        /// `kernel::mem::Ram` by `sim-host`'s integration tests instead.
        /// `_base` is accepted for signature symmetry with the non-`sim`
        /// path below and otherwise unused here.
        pub fn with_comm_page<R>(_base: usize, f: impl FnOnce(&mut [u8]) -> R) -> R {
            COMM_PAGE.with(|c| f(&mut *c.borrow_mut()))
        }
    } else if #[cfg(target_arch = "riscv32")] {
        pub fn raw_syscall(sysnum: Sysnum, args: [i32; 5]) -> [i32; 5] {
            let (r0, r1, r2, r3, r4): (i32, i32, i32, i32, i32);
            // SAFETY: `ecall` with a zero extension-id-equivalent register
            // is this kernel's own syscall convention (§6), never firmware's
            // SBI convention; `nostack` holds because every syscall either
            // returns immediately or the process is context-switched away
            // entirely, never re-entered mid-instruction.
            unsafe {
                core::arch::asm!(
                    "ecall",
                    in("a3") sysnum as u32,
                    inlateout("a0") args[0] => r0,
                    inlateout("a1") args[1] => r1,
                    inlateout("a2") args[2] => r2,
                    inlateout("a4") args[3] => r3,
                    inlateout("a5") args[4] => r4,
                    options(nostack),
                );
            }
            [r0, r1, r2, r3, r4]
        }

        /// Gives `f` a view of the comm page at physical address `base`
        /// (as returned by `GET_SYS_PAGE(Comm)`). Sound because this kernel
        /// never enables an MMU (SPEC_FULL Non-goals): every live address is
        /// already in this process's own flat address space.
        pub fn with_comm_page<R>(base: usize, f: impl FnOnce(&mut [u8]) -> R) -> R {
            // SAFETY: `base` names a page this process was granted exclusive
            // use of at spawn time and which stays mapped for its lifetime.
            let slice = unsafe { core::slice::from_raw_parts_mut(base as *mut u8, abi::PAGE_SIZE) };
            f(slice)
        }
    } else if #[cfg(target_arch = "wasm32")] {
        extern "C" {
            /// The host-side half of this trap lives in `kernel::arch::wasm`
            /// (not linked into this crate — a task and the kernel are
            /// separate WASM modules on this target, joined only by the
            /// host's import/export wiring). `out` receives the five return
            /// slots in the same order as `args`.
            fn host_task_trap(sysnum: u32, a0: i32, a1: i32, a2: i32, a3: i32, a4: i32, out: *mut i32);
        }

        pub fn raw_syscall(sysnum: Sysnum, args: [i32; 5]) -> [i32; 5] {
            let mut out = [0i32; 5];
            // SAFETY: `out` is a live, correctly sized local array; the host
            // import writes exactly five `i32`s into it before returning.
            unsafe {
                host_task_trap(sysnum as u32, args[0], args[1], args[2], args[3], args[4], out.as_mut_ptr());
            }
            out
        }

        /// Gives `f` a view of the comm page at linear address `base` (as
        /// returned by `GET_SYS_PAGE(Comm)`). The host's WASM linear memory
        /// is one flat address space shared with the kernel's `Ram`, so this
        /// is the same direct-pointer story as riscv32, just expressed over
        /// `wasm32`'s default memory instead of a real bus address.
        pub fn with_comm_page<R>(base: usize, f: impl FnOnce(&mut [u8]) -> R) -> R {
            // SAFETY: see the riscv32 `with_comm_page` above; same contract.
            let slice = unsafe { core::slice::from_raw_parts_mut(base as *mut u8, abi::PAGE_SIZE) };
            f(slice)
        }
    } else {
        compile_error!("userlib needs one of: cfg(test), feature = \"sim\", target_arch = \"riscv32\", target_arch = \"wasm32\"");
    }
}
