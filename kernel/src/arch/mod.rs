//! Architecture abstraction (§4.4, §6, §9 Design Notes: "isolate that
//! dependency behind a `Scheduler` trait").
//!
//! Three backends implement [`Arch`]: [`riscv`] (bare-metal, real trap
//! entry/exit via a naked assembly trampoline), [`wasm`] (host-provided
//! fiber API), and [`sim`] (native OS threads, used by kernel unit tests and
//! `sim-host`). `kernel::trap::run_one` drives whichever one is active
//! without knowing which.

use abi::Pidx;

use crate::err::FaultInfo;

cfg_if::cfg_if! {
    if #[cfg(any(test, feature = "sim"))] {
        pub mod sim;
    } else if #[cfg(target_arch = "riscv32")] {
        pub mod riscv;
    } else if #[cfg(target_arch = "wasm32")] {
        pub mod wasm;
    }
}

/// A decoded syscall's number and arguments (§6 Syscall ABI), plus the
/// return-value slots a handler fills in before the process resumes.
///
/// `ret[4]` is a deviation from the letter of §6's ABI text (which names
/// only `a0, a1, a2, a4` as return registers): `IPC_RECV` needs to deliver
/// `sender_pid`, `method_and_flags`, and all three message `args` in one
/// trap, which is five values. Rather than truncate the third argument or
/// spill it through the comm page, every backend here also treats `a5` as
/// a fifth return register. See `DESIGN.md`.
#[derive(Copy, Clone, Debug, Default)]
pub struct TrapFrame {
    pub sysnum: u32,
    pub args: [i32; 5],
    pub ret: [i32; 5],
}

/// Why `run_until_trap` returned.
pub enum TrapCause {
    Syscall,
    /// An `ecall` with a nonzero SBI extension id in `a7` — forwarded
    /// unchanged per §4.6.
    SbiCall { ext: u32 },
    Fault(FaultInfo),
}

/// The architecture-specific half of context switching, console I/O, and
/// firmware shutdown. Everything else (scheduling policy, IPC, the frame
/// allocator) is plain portable code operating on `kernel::Kernel`.
pub trait Arch {
    /// One-time setup so that the first `run_until_trap(pidx, ..)` begins
    /// execution at `proc.user_pc`.
    fn spawn(&mut self, pidx: Pidx, proc: &mut crate::task::Process);

    /// Gives the CPU to `pidx` until it traps. Fills `frame` with the
    /// decoded syscall (if that's what happened) and returns why control
    /// came back. Takes `proc` directly (rather than looking it up through
    /// `pidx` a second time) because the `riscv` backend reads and writes
    /// `Process::kstack`/`user_pc` as its register save area.
    fn run_until_trap(&mut self, pidx: Pidx, proc: &mut crate::task::Process, frame: &mut TrapFrame) -> TrapCause;

    /// Writes `frame.ret` into `pidx`'s saved registers, observed the next
    /// time it runs.
    fn set_return(&mut self, pidx: Pidx, proc: &mut crate::task::Process, frame: &TrapFrame);

    fn putchar(&mut self, byte: u8);
    fn getchar(&mut self) -> Option<u8>;

    /// Tears down and returns control to firmware/host. Never returns.
    fn shutdown(&mut self) -> !;
}

/// A `core::fmt::Write` sink over an `Arch`'s console, used by
/// `kernel::klog`.
pub struct Console<'a, A: Arch + ?Sized>(pub &'a mut A);

impl<'a, A: Arch + ?Sized> core::fmt::Write for Console<'a, A> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for b in s.bytes() {
            self.0.putchar(b);
        }
        Ok(())
    }
}
