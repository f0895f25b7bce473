//! Physical memory and typed page access (§9 Design Notes: "treat a page as
//! a typed structure chosen at allocation time").
//!
//! The original took a raw pointer returned by the allocator and reinterpret-
//! cast it (`PageAddr::as<T>()`, placement new). Here a page is a `[u8;
//! PAGE_SIZE]` slot inside [`Ram`], and [`PageAddr`] is a typed, checked view
//! onto one: `view`/`write_view` refuse anything that doesn't fit with the
//! right size and alignment, rather than trusting the caller.

use abi::PAGE_SIZE;
use zerocopy::{AsBytes, FromBytes};

use crate::config::{RAM_BASE, RAM_PAGES};

/// The kernel's backing store for every physical page it hands out. On real
/// RISC-V hardware this would simply be the RAM the linker script carves
/// out; here it is explicit storage so the `sim` backend (and kernel unit
/// tests) can exercise page contents without raw pointers into process
/// memory that doesn't exist on the host. Lives inside the kernel's own
/// static context (see `kernel::Kernel`), never on a stack.
pub struct Ram {
    pages: [[u8; PAGE_SIZE]; RAM_PAGES],
}

impl Ram {
    pub const fn new() -> Self {
        Self {
            pages: [[0u8; PAGE_SIZE]; RAM_PAGES],
        }
    }
}

impl Default for Ram {
    fn default() -> Self {
        Self::new()
    }
}

/// A page-sized, page-aligned physical address. Carries no type information
/// about its contents until paired with a type at the point of use via
/// [`PageAddr::view`] / [`PageAddr::write_view`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PageAddr(pub usize);

impl PageAddr {
    pub fn index(self) -> Option<usize> {
        if self.0 < RAM_BASE || self.0 >= RAM_BASE + RAM_PAGES * PAGE_SIZE {
            return None;
        }
        let offset = self.0 - RAM_BASE;
        (offset % PAGE_SIZE == 0).then_some(offset / PAGE_SIZE)
    }

    pub fn raw_bytes(self, ram: &Ram) -> Option<&[u8; PAGE_SIZE]> {
        ram.pages.get(self.index()?)
    }

    pub fn raw_bytes_mut(self, ram: &mut Ram) -> Option<&mut [u8; PAGE_SIZE]> {
        ram.pages.get_mut(self.index()?)
    }

    /// Interprets the page's leading bytes as `T`, requiring `T` fit within
    /// one page and have an alignment the page base (always `PAGE_SIZE`
    /// aligned) satisfies.
    pub fn view<T: FromBytes>(self, ram: &Ram) -> Option<T> {
        if core::mem::size_of::<T>() > PAGE_SIZE || PAGE_SIZE % core::mem::align_of::<T>() != 0 {
            return None;
        }
        let bytes = self.raw_bytes(ram)?;
        T::read_from_prefix(&bytes[..])
    }

    pub fn write_view<T: AsBytes>(self, ram: &mut Ram, value: &T) -> Option<()> {
        if core::mem::size_of::<T>() > PAGE_SIZE || PAGE_SIZE % core::mem::align_of::<T>() != 0 {
            return None;
        }
        let bytes = self.raw_bytes_mut(ram)?;
        bytes[..core::mem::size_of::<T>()].copy_from_slice(value.as_bytes());
        Some(())
    }

    /// Copies the whole page at `self` into the whole page at `dst` — the
    /// comm-page transfer primitive used by `kernel::ipc` (§4.8). Both
    /// addresses must resolve to real pages.
    pub fn copy_page_to(self, dst: PageAddr, ram: &mut Ram) -> Option<()> {
        let src_idx = self.index()?;
        let dst_idx = dst.index()?;
        if src_idx == dst_idx {
            return Some(());
        }
        let (lo, hi) = if src_idx < dst_idx {
            (src_idx, dst_idx)
        } else {
            (dst_idx, src_idx)
        };
        let (left, right) = ram.pages.split_at_mut(hi);
        if src_idx == lo {
            right[0] = left[lo];
        } else {
            left[lo] = right[0];
        }
        Some(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RAM_BASE;

    #[test]
    fn copy_page_round_trips_bytes() {
        let mut ram = Ram::new();
        let src = PageAddr(RAM_BASE);
        let dst = PageAddr(RAM_BASE + PAGE_SIZE);
        src.raw_bytes_mut(&mut ram).unwrap()[0] = 0xAB;
        src.copy_page_to(dst, &mut ram).unwrap();
        assert_eq!(dst.raw_bytes(&ram).unwrap()[0], 0xAB);
    }

    #[test]
    fn out_of_range_address_has_no_index() {
        assert_eq!(PageAddr(0).index(), None);
        assert_eq!(PageAddr(RAM_BASE + 1).index(), None);
    }
}
