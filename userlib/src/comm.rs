//! Structured comm-page payloads (SPEC_FULL §C), adapted from the source
//! system's `MsgString`/`MsgError` convention: every payload is a tagged
//! value, `"string"` carrying one string and `"error"` carrying a code plus
//! a message. The kernel never looks inside these bytes — only this module
//! and the services built on it do — so the encoding is free to use this
//! workspace's own wire format instead of the original's hand-rolled mpack:
//! a `serde`-derived enum through `ssmarshal`, the same stack `kernel`
//! itself would reach for if it ever needed to serialize something.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommMessage<'a> {
    String(&'a str),
    Error { code: u32, message: &'a str },
}

/// Encodes `s` as a `String` payload into `buf`, returning the number of
/// bytes written. `None` if it doesn't fit.
pub fn write_string(buf: &mut [u8], s: &str) -> Option<usize> {
    ssmarshal::serialize(buf, &CommMessage::String(s)).ok()
}

/// Decodes a `String` payload from `buf`. `None` on a malformed buffer or a
/// payload tagged `Error` instead.
pub fn read_string(buf: &[u8]) -> Option<&str> {
    match ssmarshal::deserialize::<CommMessage>(buf).ok()?.0 {
        CommMessage::String(s) => Some(s),
        CommMessage::Error { .. } => None,
    }
}

/// Encodes an `Error` payload (`code` as the raw `abi::ErrorCode` discriminant,
/// `message` free-form) into `buf`.
pub fn write_error(buf: &mut [u8], code: abi::ErrorCode, message: &str) -> Option<usize> {
    ssmarshal::serialize(
        buf,
        &CommMessage::Error {
            code: code as u32,
            message,
        },
    )
    .ok()
}

/// Decodes an `Error` payload from `buf`, returning its raw code and message.
pub fn read_error(buf: &[u8]) -> Option<(u32, &str)> {
    match ssmarshal::deserialize::<CommMessage>(buf).ok()?.0 {
        CommMessage::Error { code, message } => Some((code, message)),
        CommMessage::String(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_round_trips() {
        let mut buf = [0u8; 64];
        let n = write_string(&mut buf, "hello").unwrap();
        assert!(n <= buf.len());
        assert_eq!(read_string(&buf[..n]), Some("hello"));
    }

    #[test]
    fn error_round_trips() {
        let mut buf = [0u8; 64];
        let n = write_error(&mut buf, abi::ErrorCode::DeviceError, "framebuffer busy").unwrap();
        let (code, message) = read_error(&buf[..n]).unwrap();
        assert_eq!(code, abi::ErrorCode::DeviceError as u32);
        assert_eq!(message, "framebuffer busy");
    }

    #[test]
    fn reading_the_wrong_tag_fails() {
        let mut buf = [0u8; 64];
        let n = write_string(&mut buf, "hi").unwrap();
        assert!(read_error(&buf[..n]).is_none());
    }
}
