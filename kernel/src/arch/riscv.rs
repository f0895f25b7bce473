//! Bare-metal RISC-V backend (§4.4, §6).
//!
//! Context switch and trap entry are the one place this kernel needs real
//! assembly (§9 Design Notes: "keep the tiny assembly trampoline (no
//! portable substitute exists on RISC-V); everything else ... in plain
//! code"). Everything here operates on the process's inline kernel stack
//! (`Process::kstack`), which holds two fixed-offset areas per process:
//!
//! - a 14-word **kernel continuation**: the kernel's own `ra`, `s0-s11`,
//!   and `sp` at the moment it switched this process in, so that `switch_to`
//!   can later "return" from wherever it left off even though the actual
//!   return happens via `sret`/`trap_entry` rather than a normal `ret`;
//! - a 32-word **user trap frame**: the process's `x1-x31` plus its saved
//!   `sepc`, restored before `sret` and re-saved by `trap_entry` on the way
//!   back in.
//!
//! `Process::saved_sp` is set once, at `spawn` time, to `kstack`'s base
//! address; because both areas live at fixed offsets within `kstack` rather
//! than growing like a real stack, it never needs to move afterward.

use core::arch::{asm, global_asm};

use abi::Pidx;

use crate::arch::{Arch, TrapCause, TrapFrame};
use crate::err::FaultInfo;
use crate::task::Process;

/// `scause` values we classify ourselves; everything else falls through to
/// `TrapCause::Fault`.
const SCAUSE_ECALL_FROM_U: usize = 8;
const SCAUSE_ECALL_FROM_S: usize = 9;

/// Byte layout of the per-process save area inside `Process::kstack`
/// (§6). Offsets are from the base of `kstack`; `switch_to`/`trap_entry`
/// hardcode these as literal immediates rather than threading named
/// operands through `asm!`, matching the layout-by-comment-table style real
/// context-switch trampolines use.
///
/// ```text
/// +0   ra              \
/// +4   s0                 kernel continuation (14 words): the kernel's own
/// ...  s1..s10             state at the point it switched this process in,
/// +48  s11                 popped by trap_entry's epilogue on the way back
/// +52  sp              /   out, restored by switch_to's prologue on the way in
/// +56  ra  (x1)        \
/// +60  sp  (x2)           user trap frame (32 words): every GPR but x0,
/// +64  gp  (x3)            saved by trap_entry and restored by switch_to
/// +68  tp  (x4)            immediately before sret
/// +72  t0  (x5)
/// +76  t1  (x6)
/// +80  t2  (x7)
/// +84  s0  (x8)
/// +88  s1  (x9)
/// +92  a0  (x10)           -- syscall arg/ret 0
/// +96  a1  (x11)           -- syscall arg/ret 1
/// +100 a2  (x12)           -- syscall arg/ret 2
/// +104 a3  (x13)           -- syscall number
/// +108 a4  (x14)           -- syscall arg/ret 3
/// +112 a5  (x15)           -- syscall arg/ret 4
/// +116 a6  (x16)
/// +120 a7  (x17)
/// +124 s2..s11 (x18-x27)
/// +164 t3..t6 (x28-x31)
/// +180 sepc            /
/// ```
const CONT_BYTES: usize = 56;
const TF_A0: usize = CONT_BYTES + 36;
const TF_A1: usize = CONT_BYTES + 40;
const TF_A2: usize = CONT_BYTES + 44;
const TF_A3: usize = CONT_BYTES + 48;
const TF_A4: usize = CONT_BYTES + 52;
const TF_A5: usize = CONT_BYTES + 56;
const TF_SP: usize = CONT_BYTES + 4;
const TF_PC: usize = CONT_BYTES + 124;
const SAVE_AREA_WORDS: usize = (TF_PC + 4) / 4;

pub struct RiscVArch;

impl RiscVArch {
    pub const fn new() -> Self {
        Self
    }
}

impl Arch for RiscVArch {
    fn spawn(&mut self, _pidx: Pidx, proc: &mut Process) {
        // `switch_to`'s prologue always runs its full save-then-load
        // sequence, whether or not this is the process's first switch-in,
        // so the kernel continuation area needs no priming here — only the
        // user trap frame half, which a real trap would otherwise have
        // populated. `Process::unused` already zeroed the rest of `kstack`.
        let base = proc.kstack.as_mut_ptr() as usize;
        proc.saved_sp = base;

        let sp_top = proc
            .user_stack_page
            .expect("spawn: process has no user stack page")
            + abi::PAGE_SIZE;

        write_word(proc, TF_SP, sp_top as u32);
        write_word(proc, TF_PC, proc.user_pc as u32);
    }

    fn run_until_trap(&mut self, pidx: Pidx, proc: &mut Process, frame: &mut TrapFrame) -> TrapCause {
        // SAFETY: `switch_to` is the sole place that changes `sscratch`/
        // `sepc`/the active kernel stack; it is only ever called from the
        // single-threaded kernel run loop with `pidx` known RUNNABLE and
        // `proc.saved_sp` pointing at a save area `spawn` or a previous trap
        // entry left in a consistent state.
        let cause = unsafe { switch_to(proc.saved_sp as *mut u32) };
        let _ = pidx;

        match cause {
            SCAUSE_ECALL_FROM_U => {
                frame.sysnum = read_word(proc, TF_A3);
                frame.args = [
                    read_word(proc, TF_A0) as i32,
                    read_word(proc, TF_A1) as i32,
                    read_word(proc, TF_A2) as i32,
                    read_word(proc, TF_A4) as i32,
                    read_word(proc, TF_A5) as i32,
                ];
                TrapCause::Syscall
            }
            // Every syscall this kernel serves arrives as an ecall from
            // U-mode (above); an ecall our own kernel code issues (the SBI
            // shims below) traps straight to firmware and never reaches
            // this vector at all. This arm exists because `scause` cause 9
            // is architecturally distinct from cause 8, not because any
            // code path here is known to produce it.
            SCAUSE_ECALL_FROM_S => TrapCause::SbiCall {
                ext: read_word(proc, TF_A3),
            },
            _ => TrapCause::Fault(FaultInfo::UnknownTrap { cause }),
        }
    }

    fn set_return(&mut self, _pidx: Pidx, proc: &mut Process, frame: &TrapFrame) {
        // Pokes the saved trap frame's a0, a1, a2, a4, a5 directly; no
        // CPU-visible effect until `pidx` is next switched in.
        write_word(proc, TF_A0, frame.ret[0] as u32);
        write_word(proc, TF_A1, frame.ret[1] as u32);
        write_word(proc, TF_A2, frame.ret[2] as u32);
        write_word(proc, TF_A4, frame.ret[3] as u32);
        write_word(proc, TF_A5, frame.ret[4] as u32);
    }

    fn putchar(&mut self, byte: u8) {
        sbi_console_putchar(byte);
    }

    fn getchar(&mut self) -> Option<u8> {
        let c = sbi_console_getchar();
        if c < 0 {
            None
        } else {
            Some(c as u8)
        }
    }

    fn shutdown(&mut self) -> ! {
        sbi_shutdown()
    }
}

fn read_word(proc: &Process, byte_offset: usize) -> u32 {
    proc.kstack[byte_offset / 4]
}

fn write_word(proc: &mut Process, byte_offset: usize, value: u32) {
    proc.kstack[byte_offset / 4] = value;
}

const _: () = assert!(SAVE_AREA_WORDS <= crate::config::KERNEL_STACK_WORDS);

/// Saves the kernel's own continuation, loads `kstack_ptr`'s user trap
/// frame, and `sret`s into it — returning only once that (or some later)
/// process traps back in, with `scause` in `a0` as the ordinary C return
/// value of this call.
///
/// # Safety
/// Must be called with `kstack_ptr` pointing at a process save area built
/// by `RiscVArch::spawn` or left behind by a previous `trap_entry`, and
/// with no other code relying on `sscratch` meaning anything else.
#[naked]
unsafe extern "C" fn switch_to(_kstack_ptr: *mut u32) -> usize {
    asm!(
        "sw ra, 0(a0)",
        "sw s0, 4(a0)",
        "sw s1, 8(a0)",
        "sw s2, 12(a0)",
        "sw s3, 16(a0)",
        "sw s4, 20(a0)",
        "sw s5, 24(a0)",
        "sw s6, 28(a0)",
        "sw s7, 32(a0)",
        "sw s8, 36(a0)",
        "sw s9, 40(a0)",
        "sw s10, 44(a0)",
        "sw s11, 48(a0)",
        "sw sp, 52(a0)",
        // `sscratch` is how `trap_entry` finds this save area again; it is
        // only ever read back by the `csrrw` at the very top of that path.
        "csrw sscratch, a0",
        "lw t0, 180(a0)",
        "csrw sepc, t0",
        "lw ra, 56(a0)",
        "lw sp, 60(a0)",
        "lw gp, 64(a0)",
        "lw tp, 68(a0)",
        "lw t0, 72(a0)",
        "lw t1, 76(a0)",
        "lw t2, 80(a0)",
        "lw s0, 84(a0)",
        "lw s1, 88(a0)",
        "lw a1, 96(a0)",
        "lw a2, 100(a0)",
        "lw a3, 104(a0)",
        "lw a4, 108(a0)",
        "lw a5, 112(a0)",
        "lw a6, 116(a0)",
        "lw a7, 120(a0)",
        "lw s2, 124(a0)",
        "lw s3, 128(a0)",
        "lw s4, 132(a0)",
        "lw s5, 136(a0)",
        "lw s6, 140(a0)",
        "lw s7, 144(a0)",
        "lw s8, 148(a0)",
        "lw s9, 152(a0)",
        "lw s10, 156(a0)",
        "lw s11, 160(a0)",
        "lw t3, 164(a0)",
        "lw t4, 168(a0)",
        "lw t5, 172(a0)",
        "lw t6, 176(a0)",
        // a0 last: everything above still addresses off it.
        "lw a0, 92(a0)",
        "sret",
        options(noreturn)
    )
}

/// The `stvec` target installed by `kernel_main`. Mirrors `switch_to`'s
/// save area byte-for-byte: whichever process trapped in is found via
/// `sscratch` (set by `switch_to` just before `sret`), its GPRs and `sepc`
/// are saved, and the kernel continuation `switch_to` pushed is popped —
/// making the final `ret` resume `run_until_trap` as if `switch_to` had
/// returned normally, with `scause` as its result in `a0`.
///
/// # Safety
/// Only ever reached by hardware, via `stvec`, while `sscratch` holds the
/// trapping process's save-area pointer.
#[naked]
unsafe extern "C" fn trap_entry() {
    asm!(
        // a0 <- kstack_ptr (was in sscratch); sscratch <- user's old a0.
        "csrrw a0, sscratch, a0",
        "sw ra, 56(a0)",
        "sw sp, 60(a0)",
        "sw gp, 64(a0)",
        "sw tp, 68(a0)",
        "sw t0, 72(a0)",
        "sw t1, 76(a0)",
        "sw t2, 80(a0)",
        "sw s0, 84(a0)",
        "sw s1, 88(a0)",
        "sw a1, 96(a0)",
        "sw a2, 100(a0)",
        "sw a3, 104(a0)",
        "sw a4, 108(a0)",
        "sw a5, 112(a0)",
        "sw a6, 116(a0)",
        "sw a7, 120(a0)",
        "sw s2, 124(a0)",
        "sw s3, 128(a0)",
        "sw s4, 132(a0)",
        "sw s5, 136(a0)",
        "sw s6, 140(a0)",
        "sw s7, 144(a0)",
        "sw s8, 148(a0)",
        "sw s9, 152(a0)",
        "sw s10, 156(a0)",
        "sw s11, 160(a0)",
        "sw t3, 164(a0)",
        "sw t4, 168(a0)",
        "sw t5, 172(a0)",
        "sw t6, 176(a0)",
        "csrr t0, sscratch",
        "sw t0, 92(a0)",
        "csrr t0, sepc",
        "sw t0, 180(a0)",
        "lw ra, 0(a0)",
        "lw s0, 4(a0)",
        "lw s1, 8(a0)",
        "lw s2, 12(a0)",
        "lw s3, 16(a0)",
        "lw s4, 20(a0)",
        "lw s5, 24(a0)",
        "lw s6, 28(a0)",
        "lw s7, 32(a0)",
        "lw s8, 36(a0)",
        "lw s9, 40(a0)",
        "lw s10, 44(a0)",
        "lw s11, 48(a0)",
        "lw sp, 52(a0)",
        "csrr a0, scause",
        "ret",
        options(noreturn)
    )
}

// §6 boot contract: `.text.boot` sets the stack pointer to `__stack_top`
// and jumps to `kernel_main`. `__stack_top`/`__boot_stack` are a plain BSS
// reservation sized by the linker script, not this crate; we only name
// them.
global_asm!(
    ".section .text.boot, \"ax\", @progbits",
    ".global _start",
    "_start:",
    "la sp, __stack_top",
    "j kernel_main",
);

/// Installs the trap vector and hands off to whatever bare-metal binary
/// links this crate. `kernel_start` is that binary's entry point into the
/// portable `kernel::startup`/`kernel::trap` run loop (constructing the
/// `Kernel`, spawning the initial tasks, and calling `trap::run_one` in a
/// loop); it is not defined in this crate.
#[no_mangle]
unsafe extern "C" fn kernel_main() -> ! {
    // Direct mode (low two bits clear): every trap, from any cause, goes to
    // `trap_entry` with no vectoring. This kernel has no interrupts enabled
    // and only ever traps synchronously via `ecall`.
    asm!("csrw stvec, {0}", in(reg) trap_entry as usize, options(nomem));
    kernel_start()
}

extern "C" {
    fn kernel_start() -> !;
}

fn sbi_console_putchar(byte: u8) {
    // SBI legacy console extension (EID 0x01). `ecall` with the extension
    // id in a7 per §6; success/failure is not observable for this call.
    unsafe {
        asm!(
            "ecall",
            in("a7") 0x01usize,
            in("a0") byte as usize,
            options(nostack)
        );
    }
}

fn sbi_console_getchar() -> isize {
    let ret: isize;
    unsafe {
        asm!(
            "ecall",
            in("a7") 0x02usize,
            lateout("a0") ret,
            options(nostack)
        );
    }
    ret
}

fn sbi_shutdown() -> ! {
    // SBI System Reset extension (EID 0x53525354), shutdown function.
    unsafe {
        asm!(
            "ecall",
            in("a7") 0x5352_5354usize,
            in("a6") 0usize,
            in("a0") 0usize,
            in("a1") 0usize,
            options(nostack, noreturn)
        );
    }
}
