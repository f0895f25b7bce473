//! Per-process support library: syscall stubs, comm-page encoding, and the
//! high-level request/reply helpers every task links against.
//!
//! Mirrors the teacher's own split between a raw, per-architecture `asm!`
//! trampoline (here: [`raw`]) and a friendlier wrapper layer built on top of
//! it (here: [`hl`]), minus everything tied to a real MPU: no `Lease`, no
//! `TaskSlot` indirection table — this kernel addresses processes by `Pid`
//! directly (resolved at runtime via `PROC_LOOKUP`), so there is no
//! build-time task ID table to generate stubs against.

#![cfg_attr(not(any(test, feature = "sim")), no_std)]
#![cfg_attr(target_arch = "riscv32", feature(naked_functions))]

pub use abi::*;

pub mod arg;
pub mod comm;
pub mod hl;
pub mod raw;
