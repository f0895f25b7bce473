//! Compile-time kernel configuration.
//!
//! These are `const`s rather than a runtime-configured struct because every
//! one of them sizes a fixed array somewhere in the process or frame table;
//! the original implementation fixed them at build time too
//! (`os/ot/core/kernel.hpp`).

use abi::PAGE_SIZE;

/// Maximum number of live processes. Slot 0 is the reserved idle process,
/// slot 1 is the conventional "init" / shell process (see `kernel::sched`).
pub const PROCS_MAX: usize = 8;

/// Number of 4 KiB frames backing the simulated physical RAM region. Chosen
/// generously enough that every scenario in the test suite can allocate
/// without the allocator becoming the bottleneck under test.
pub const RAM_PAGES: usize = 256;

/// Base physical address of the frame-managed RAM region. Arbitrary on the
/// `sim` backend; matches a plausible RISC-V `qemu virt` RAM base elsewhere.
pub const RAM_BASE: usize = 0x8020_0000;

pub const RAM_END: usize = RAM_BASE + RAM_PAGES * PAGE_SIZE;

/// Number of storage (user heap) pages granted to each process at creation.
pub const STORAGE_PAGES_PER_PROC: usize = 4;

/// Size, in `u32` words, of each process's inline kernel stack used to hold
/// saved callee-registers across a context switch.
pub const KERNEL_STACK_WORDS: usize = 256;

/// Bound on a known-memory region table; we only have one region (the
/// framebuffer) in scope, but the table is sized for future growth the way
/// the original's region array was.
pub const KNOWN_REGIONS_MAX: usize = 4;
