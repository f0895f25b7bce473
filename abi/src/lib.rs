//! Wire types shared between the kernel and every user task.
//!
//! Nothing in this crate is privileged. It exists so that the kernel and user
//! code agree on the shape of syscall arguments, IPC messages, and error
//! codes without either side importing the other.

#![cfg_attr(not(feature = "sim"), no_std)]

use serde::{Deserialize, Serialize};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

#[cfg(feature = "sim")]
pub mod sim_transport;

/// Size of a physical page frame, in bytes. Every page-granular object in the
/// system (the arg page, the comm page, storage pages, the framebuffer lease
/// unit) is a multiple of this.
pub const PAGE_SIZE: usize = 4096;

/// Process-table index. Kernel-internal, cheap, and reused once a process
/// terminates and its slot is recycled.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, AsBytes, FromBytes, FromZeroes)]
#[repr(transparent)]
pub struct Pidx(pub u16);

impl Pidx {
    /// Sentinel for "no process", distinct from any valid table slot.
    pub const INVALID: Self = Self(u16::MAX);

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn from_index(i: usize) -> Self {
        Self(i as u16)
    }
}

/// Globally unique, never-reused process identifier.
///
/// Unlike [`Pidx`], a `Pid` remains meaningful even after the process that
/// held it has terminated and its table slot has been recycled: a message
/// addressed to a stale `Pid` is rejected with `PID_NOT_FOUND` rather than
/// being silently delivered to whatever process now occupies that slot.
#[derive(
    Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Default, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct Pid(pub u32);

impl Pid {
    /// Sentinel meaning "no process" / "unaddressed".
    pub const NONE: Self = Self(0);

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

bitflags::bitflags! {
    /// Low 8 bits of [`Message::method_and_flags`].
    #[derive(Copy, Clone, Debug, Eq, PartialEq, Default, Serialize, Deserialize)]
    pub struct IpcFlags: u8 {
        /// Copy one page from the sender's comm page into the callee's comm
        /// page before delivering the message.
        const SEND_COMM_DATA = 1 << 0;
        /// Copy one page from the replier's comm page back into the original
        /// sender's comm page when the reply is delivered.
        const RECV_COMM_DATA = 1 << 1;
    }
}

/// Number of bits of [`Message::method_and_flags`] given to the flag byte.
pub const METHOD_SHIFT: u32 = 8;

/// Packs a method id and flag byte into the single word carried by a
/// syscall argument register.
pub const fn pack_method_and_flags(method: u32, flags: IpcFlags) -> u32 {
    (method << METHOD_SHIFT) | flags.bits() as u32
}

pub const fn unpack_method(method_and_flags: u32) -> u32 {
    method_and_flags >> METHOD_SHIFT
}

pub fn unpack_flags(method_and_flags: u32) -> IpcFlags {
    IpcFlags::from_bits_truncate((method_and_flags & 0xFF) as u8)
}

/// Reserved method id recognised by every service: reply success, then exit.
pub const METHOD_SHUTDOWN: u32 = pack_method_and_flags(1, IpcFlags::empty());

/// User-defined method ids must be >= this, grouped per-service in 0x100
/// increments by convention.
pub const METHOD_USER_BASE: u32 = 0x1000;

/// A request, as delivered to a receiver's `pending_message`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default, Serialize, Deserialize)]
pub struct Message {
    pub sender_pid: Pid,
    pub method_and_flags: u32,
    pub args: [i32; 3],
}

impl Message {
    pub fn method(&self) -> u32 {
        unpack_method(self.method_and_flags)
    }

    pub fn flags(&self) -> IpcFlags {
        unpack_flags(self.method_and_flags)
    }
}

/// A reply, as delivered to a sender's `pending_response`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub error_code: ErrorCode,
    pub values: [i32; 3],
}

impl Response {
    pub const fn ok(values: [i32; 3]) -> Self {
        Self {
            error_code: ErrorCode::None,
            values,
        }
    }

    pub const fn err(code: ErrorCode) -> Self {
        Self {
            error_code: code,
            values: [0, 0, 0],
        }
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::err(ErrorCode::None)
    }
}

/// Error codes travelling in [`Response::error_code`].
///
/// `None` means success. Everything else is a user-observable failure; the
/// kernel never aborts a process merely for returning one of these. Only an
/// unhandled CPU trap terminates a process (see `kernel::trap`).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default, Serialize, Deserialize)]
#[repr(u32)]
pub enum ErrorCode {
    #[default]
    None = 0,
    /// `ipc_send`'s target is not a live process (dead pid, unknown pid, or a
    /// send to self, which is diagnosed rather than allowed to deadlock).
    IpcPidNotFound = 1,
    /// The server's dispatch does not recognise the requested method id.
    IpcMethodNotKnown = 2,
    /// The server recognises the method but has not implemented it.
    IpcMethodNotImplemented = 3,
    /// Opaque device/driver failure, for use by out-of-scope collaborators
    /// (block, GPU, filesystem services) that share this Response shape.
    DeviceError = 4,
}

/// Syscall numbers, matching the fixed register convention in the syscall
/// ABI: the number travels in a fixed argument register, arguments in the
/// rest, per `kernel::arch`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum Sysnum {
    Yield = 1,
    Putchar = 2,
    Getchar = 3,
    Exit = 4,
    AllocPage = 5,
    GetSysPage = 6,
    IoPuts = 7,
    ProcLookup = 8,
    IpcSend = 9,
    IpcRecv = 10,
    IpcReply = 11,
    Shutdown = 12,
    LockKnownMemory = 13,
}

impl core::convert::TryFrom<u32> for Sysnum {
    type Error = ();

    fn try_from(x: u32) -> Result<Self, Self::Error> {
        Ok(match x {
            1 => Self::Yield,
            2 => Self::Putchar,
            3 => Self::Getchar,
            4 => Self::Exit,
            5 => Self::AllocPage,
            6 => Self::GetSysPage,
            7 => Self::IoPuts,
            8 => Self::ProcLookup,
            9 => Self::IpcSend,
            10 => Self::IpcRecv,
            11 => Self::IpcReply,
            12 => Self::Shutdown,
            13 => Self::LockKnownMemory,
            _ => return Err(()),
        })
    }
}

/// Selects which per-process page `GET_SYS_PAGE` returns.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum SysPageKind {
    Arg = 0,
    Comm = 1,
    Storage = 2,
}

impl core::convert::TryFrom<u32> for SysPageKind {
    type Error = ();

    fn try_from(x: u32) -> Result<Self, Self::Error> {
        Ok(match x {
            0 => Self::Arg,
            1 => Self::Comm,
            2 => Self::Storage,
            _ => return Err(()),
        })
    }
}

/// Named, device-addressable regions that can be leased exclusively via
/// `LOCK_KNOWN_MEMORY`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum KnownRegion {
    Framebuffer = 0,
}

impl core::convert::TryFrom<u32> for KnownRegion {
    type Error = ();

    fn try_from(x: u32) -> Result<Self, Self::Error> {
        Ok(match x {
            0 => Self::Framebuffer,
            _ => return Err(()),
        })
    }
}

/// Bound on a process name, matching the original implementation's
/// fixed-size `char name[32]`.
pub const PROC_NAME_MAX: usize = 32;
