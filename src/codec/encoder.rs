//! OSC packet encoder
//!
//! Writers fill caller-provided buffers and report 0 bytes written when the
//! buffer is too small, so a partially written packet is never mistaken for
//! a valid one.

use bytes::{Bytes, BytesMut};

use crate::codec::argument::{padded_len, Argument};
use crate::codec::decoder::{BUNDLE_HEADER_LEN, BUNDLE_TAG};

/// Exact encoded size of a message with this address and arguments
pub fn message_len(address: &str, arguments: &[Argument<'_>]) -> usize {
    padded_len(address.len() + 1)
        + padded_len(arguments.len() + 2)
        + arguments.iter().map(|a| a.wire_len()).sum::<usize>()
}

fn put_padded(buffer: &mut [u8], at: usize, bytes: &[u8]) -> usize {
    buffer[at..at + bytes.len()].copy_from_slice(bytes);
    at + padded_len(bytes.len() + 1)
}

fn put_argument(buffer: &mut [u8], at: usize, argument: &Argument<'_>) -> usize {
    match argument {
        Argument::Bool(_) => at,
        Argument::Int32(v) => put_bytes(buffer, at, &v.to_be_bytes()),
        Argument::Float32(v) => put_bytes(buffer, at, &v.to_bits().to_be_bytes()),
        Argument::Midi(m) => put_bytes(buffer, at, m),
        Argument::Int64(v) => put_bytes(buffer, at, &v.to_be_bytes()),
        Argument::Float64(v) => put_bytes(buffer, at, &v.to_bits().to_be_bytes()),
        Argument::Timetag(t) => put_bytes(buffer, at, &t.to_be_bytes()),
        Argument::String(s) => put_padded(buffer, at, s.as_bytes()),
        Argument::Blob(b) => {
            let at = put_bytes(buffer, at, &(b.len() as u32).to_be_bytes());
            buffer[at..at + b.len()].copy_from_slice(b);
            at + padded_len(b.len())
        }
    }
}

fn put_bytes(buffer: &mut [u8], at: usize, bytes: &[u8]) -> usize {
    buffer[at..at + bytes.len()].copy_from_slice(bytes);
    at + bytes.len()
}

fn has_interior_nul(address: &str, arguments: &[Argument<'_>]) -> bool {
    address.contains('\0')
        || arguments
            .iter()
            .any(|a| matches!(a, Argument::String(s) if s.contains('\0')))
}

/// Serialize one message into `buffer`.
///
/// The whole buffer is zeroed first. Returns the number of bytes written, or
/// 0 if the message does not fit (or a string contains a NUL byte, which
/// the wire format cannot carry).
pub fn write_message(buffer: &mut [u8], address: &str, arguments: &[Argument<'_>]) -> usize {
    buffer.fill(0);

    let needed = message_len(address, arguments);
    if needed > buffer.len() || has_interior_nul(address, arguments) {
        return 0;
    }

    let mut at = put_padded(buffer, 0, address.as_bytes());

    buffer[at] = b',';
    for (i, argument) in arguments.iter().enumerate() {
        buffer[at + 1 + i] = argument.tag();
    }
    at += padded_len(arguments.len() + 2);

    for argument in arguments {
        at = put_argument(buffer, at, argument);
    }

    debug_assert_eq!(at, needed);
    at
}

/// Encode a message into a freshly allocated packet
pub fn encode_message(address: &str, arguments: &[Argument<'_>]) -> Option<Bytes> {
    let mut buffer = BytesMut::zeroed(message_len(address, arguments));
    match write_message(&mut buffer, address, arguments) {
        0 => None,
        _ => Some(buffer.freeze()),
    }
}

/// Incremental bundle writer over a caller-provided buffer
pub struct BundleWriter<'a> {
    buffer: &'a mut [u8],
    marker: usize,
}

impl<'a> BundleWriter<'a> {
    /// Start a bundle with the given timetag. The buffer is zeroed; if it
    /// cannot even hold the header every later write reports 0.
    pub fn new(buffer: &'a mut [u8], timetag: u64) -> Self {
        buffer.fill(0);
        let marker = if buffer.len() >= BUNDLE_HEADER_LEN {
            buffer[..8].copy_from_slice(BUNDLE_TAG);
            buffer[8..16].copy_from_slice(&timetag.to_be_bytes());
            BUNDLE_HEADER_LEN
        } else {
            0
        };
        Self { buffer, marker }
    }

    /// Append a length-prefixed message. Returns the cumulative bundle
    /// length, or 0 when the message does not fit (the bundle written so far
    /// is left intact).
    pub fn write_next_message(&mut self, address: &str, arguments: &[Argument<'_>]) -> usize {
        if self.marker == 0 {
            return 0;
        }
        let len = message_len(address, arguments);
        let end = self.marker + 4 + len;
        if end > self.buffer.len() {
            return 0;
        }

        let written = write_message(&mut self.buffer[self.marker + 4..end], address, arguments);
        if written == 0 {
            return 0;
        }
        self.buffer[self.marker..self.marker + 4].copy_from_slice(&(written as u32).to_be_bytes());
        self.marker = end;
        self.marker
    }

    /// Bundle length so far
    pub fn len(&self) -> usize {
        self.marker
    }

    pub fn is_empty(&self) -> bool {
        self.marker <= BUNDLE_HEADER_LEN
    }

    /// The encoded bundle
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer[..self.marker]
    }
}
