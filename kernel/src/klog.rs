//! Minimal kernel diagnostic output (§9 Design Notes: "a tiny in-kernel
//! formatter accepting a small fixed set of specifiers... do not import a
//! general printf").
//!
//! Supports `%s` (str), `%d` (i32), `%x` (u32, lowercase hex), `%lu` (u64).
//! Anything else is emitted as a literal `%` plus the following character.
//! Output is routed to whichever [`crate::arch::Console`] the active `arch`
//! backend provides; this module never touches hardware directly.

use core::fmt::Write;

pub enum Arg<'a> {
    Str(&'a str),
    Int(i32),
    Hex(u32),
    Long(u64),
}

pub fn oprintf(out: &mut dyn Write, fmt: &str, args: &[Arg<'_>]) {
    let mut arg_iter = args.iter();
    let mut chars = fmt.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            let _ = out.write_char(c);
            continue;
        }
        match chars.next() {
            Some('s') => {
                if let Some(Arg::Str(s)) = arg_iter.next() {
                    let _ = out.write_str(s);
                }
            }
            Some('d') => {
                if let Some(Arg::Int(v)) = arg_iter.next() {
                    let _ = write!(out, "{v}");
                }
            }
            Some('x') => {
                if let Some(Arg::Hex(v)) = arg_iter.next() {
                    let _ = write!(out, "{v:x}");
                }
            }
            Some('l') if chars.peek() == Some(&'u') => {
                chars.next();
                if let Some(Arg::Long(v)) = arg_iter.next() {
                    let _ = write!(out, "{v}");
                }
            }
            Some(other) => {
                let _ = out.write_char('%');
                let _ = out.write_char(other);
            }
            None => {
                let _ = out.write_char('%');
            }
        }
    }
}

/// Writes a diagnostic line to `arch`'s console using the fixed-specifier
/// formatter above. Called from `kernel::trap::handle_fault` when a user-mode
/// trap faults a process (and from its kernel-mode-panic branch), and from
/// `kernel::shutdown::shutdown_all_processes`. Takes `arch` explicitly
/// rather than reaching for kernel-global state, per §9's "kernel context
/// passed explicitly" strategy.
pub fn klog(arch: &mut dyn crate::arch::Arch, fmt: &str, args: &[Arg<'_>]) {
    let mut console = crate::arch::Console(arch);
    oprintf(&mut console, fmt, args);
    let _ = console.write_char('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Buf(alloc_free::FixedStr);

    mod alloc_free {
        pub struct FixedStr {
            pub bytes: [u8; 64],
            pub len: usize,
        }
        impl FixedStr {
            pub fn new() -> Self {
                Self { bytes: [0; 64], len: 0 }
            }
            pub fn as_str(&self) -> &str {
                core::str::from_utf8(&self.bytes[..self.len]).unwrap()
            }
        }
    }

    impl core::fmt::Write for Buf {
        fn write_str(&mut self, s: &str) -> core::fmt::Result {
            let n = s.len();
            self.0.bytes[self.0.len..self.0.len + n].copy_from_slice(s.as_bytes());
            self.0.len += n;
            Ok(())
        }
    }

    #[test]
    fn formats_known_specifiers() {
        let mut buf = Buf(alloc_free::FixedStr::new());
        oprintf(
            &mut buf,
            "task %s faulted at %x, code %d, tick %lu",
            &[
                Arg::Str("shell"),
                Arg::Hex(0xdead_beef),
                Arg::Int(-1),
                Arg::Long(42),
            ],
        );
        assert_eq!(
            buf.0.as_str(),
            "task shell faulted at deadbeef, code -1, tick 42"
        );
    }
}
