//! OSC packet decoder
//!
//! Parsing validates the whole message once: the address and type tag blocks
//! must be NUL terminated and padded inside the packet, and every declared
//! argument must fit. Argument reads afterwards never fail for a parsed
//! message.

use std::borrow::Cow;

use crate::codec::argument::{padded_len, tag, Argument};
use crate::error::CodecError;

/// Literal that opens every bundle, NUL included
pub const BUNDLE_TAG: &[u8; 8] = b"#bundle\0";

/// Size of the bundle header: tag plus 8-byte timetag
pub const BUNDLE_HEADER_LEN: usize = 16;

/// A parsed OSC message borrowing from its packet buffer
#[derive(Debug, Clone, Copy)]
pub struct Message<'a> {
    buffer: &'a [u8],
    address: &'a str,
    format: &'a str,
    args_offset: usize,
}

impl<'a> Message<'a> {
    /// Address pattern of the message
    pub fn address(&self) -> &'a str {
        self.address
    }

    /// Type tags, without the leading ','
    pub fn format(&self) -> &'a str {
        self.format
    }

    /// Length in bytes of the message
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Number of arguments declared by the format string
    pub fn argument_count(&self) -> usize {
        self.format.len()
    }

    /// Read head positioned on the first argument
    pub fn cursor(&self) -> usize {
        self.args_offset
    }

    /// Raw packet bytes
    pub fn as_bytes(&self) -> &'a [u8] {
        self.buffer
    }

    /// Iterate the arguments in wire order
    pub fn arguments(&self) -> Arguments<'a> {
        Arguments {
            buffer: self.buffer,
            cursor: self.args_offset,
            tags: self.format.as_bytes().iter(),
        }
    }
}

/// Iterator over the arguments of a parsed [`Message`]
pub struct Arguments<'a> {
    buffer: &'a [u8],
    cursor: usize,
    tags: std::slice::Iter<'a, u8>,
}

impl<'a> Iterator for Arguments<'a> {
    type Item = Argument<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = *self.tags.next()?;
        next_argument(self.buffer, &mut self.cursor, tag)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.tags.size_hint()
    }
}

fn read_u32(buffer: &[u8], at: usize) -> Option<u32> {
    let bytes = buffer.get(at..at + 4)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_u64(buffer: &[u8], at: usize) -> Option<u64> {
    let hi = read_u32(buffer, at)? as u64;
    let lo = read_u32(buffer, at + 4)? as u64;
    Some((hi << 32) | lo)
}

fn find_nul(buffer: &[u8], from: usize) -> Option<usize> {
    buffer
        .get(from..)?
        .iter()
        .position(|&b| b == 0)
        .map(|p| from + p)
}

/// Read the argument of type `tag` at `cursor` and advance the cursor by its
/// wire width.
///
/// Bounds are not re-validated against the message layout: that happened in
/// [`parse_message`]. A misused cursor yields `None` instead of a panic, as
/// does an unknown tag.
pub fn next_argument<'a>(buffer: &'a [u8], cursor: &mut usize, tag: u8) -> Option<Argument<'a>> {
    let at = *cursor;
    let (argument, width) = match tag {
        tag::INT32 => (Argument::Int32(read_u32(buffer, at)? as i32), 4),
        tag::FLOAT32 => (Argument::Float32(f32::from_bits(read_u32(buffer, at)?)), 4),
        tag::MIDI => {
            let m = buffer.get(at..at + 4)?;
            (Argument::Midi([m[0], m[1], m[2], m[3]]), 4)
        }
        tag::INT64 => (Argument::Int64(read_u64(buffer, at)? as i64), 8),
        tag::FLOAT64 => (Argument::Float64(f64::from_bits(read_u64(buffer, at)?)), 8),
        tag::TIMETAG => (Argument::Timetag(read_u64(buffer, at)?), 8),
        tag::STRING => {
            let end = find_nul(buffer, at)?;
            let s = std::str::from_utf8(&buffer[at..end]).ok()?;
            (Argument::String(Cow::Borrowed(s)), padded_len(end - at + 1))
        }
        tag::BLOB => {
            let len = read_u32(buffer, at)? as usize;
            let data = buffer.get(at + 4..at + 4 + len)?;
            (Argument::Blob(Cow::Borrowed(data)), 4 + padded_len(len))
        }
        tag::TRUE => (Argument::Bool(true), 0),
        tag::FALSE => (Argument::Bool(false), 0),
        _ => return None,
    };
    *cursor = at + width;
    Some(argument)
}

/// Width check for one argument during parse; returns the cursor after it.
fn validate_argument(buffer: &[u8], cursor: usize, tag: u8) -> Result<usize, CodecError> {
    let available = buffer.len();
    let fixed = |width: usize| {
        if cursor + width <= available {
            Ok(cursor + width)
        } else {
            Err(CodecError::OutOfBounds {
                needed: cursor + width,
                available,
            })
        }
    };

    match tag {
        tag::TRUE | tag::FALSE => Ok(cursor),
        tag::INT32 | tag::FLOAT32 | tag::MIDI => fixed(4),
        tag::INT64 | tag::FLOAT64 | tag::TIMETAG => fixed(8),
        tag::STRING => {
            let end = find_nul(buffer, cursor).ok_or(CodecError::OutOfBounds {
                needed: available + 1,
                available,
            })?;
            std::str::from_utf8(&buffer[cursor..end]).map_err(|_| CodecError::InvalidString)?;
            let next = cursor + padded_len(end - cursor + 1);
            if next > available {
                return Err(CodecError::OutOfBounds {
                    needed: next,
                    available,
                });
            }
            Ok(next)
        }
        tag::BLOB => {
            let len = read_u32(buffer, cursor).ok_or(CodecError::OutOfBounds {
                needed: cursor + 4,
                available,
            })?;
            // Negative lengths are bounds violations, not huge blobs
            if (len as i32) < 0 {
                return Err(CodecError::OutOfBounds {
                    needed: usize::MAX,
                    available,
                });
            }
            let next = cursor + 4 + padded_len(len as usize);
            if next > available {
                return Err(CodecError::OutOfBounds {
                    needed: next,
                    available,
                });
            }
            Ok(next)
        }
        other => Err(CodecError::UnknownTag(other as char)),
    }
}

/// Parse a buffer holding exactly one OSC message.
///
/// The contents are not copied; the returned [`Message`] points into
/// `buffer`.
pub fn parse_message(buffer: &[u8]) -> Result<Message<'_>, CodecError> {
    let address_end = find_nul(buffer, 0).ok_or(CodecError::UnterminatedAddress)?;
    let address =
        std::str::from_utf8(&buffer[..address_end]).map_err(|_| CodecError::InvalidString)?;

    let format_start = padded_len(address_end + 1);
    if format_start >= buffer.len() || buffer[format_start] != b',' {
        return Err(CodecError::UnterminatedFormat);
    }

    let format_end = find_nul(buffer, format_start).ok_or(CodecError::UnterminatedFormat)?;
    let args_offset = format_start + padded_len(format_end - format_start + 1);
    if args_offset > buffer.len() {
        return Err(CodecError::UnterminatedFormat);
    }

    // Tags are ASCII once validated below, so this cannot fail for a good packet
    let format = std::str::from_utf8(&buffer[format_start + 1..format_end])
        .map_err(|_| CodecError::UnknownTag(char::REPLACEMENT_CHARACTER))?;

    let mut cursor = args_offset;
    for &tag in format.as_bytes() {
        cursor = validate_argument(buffer, cursor, tag)?;
    }

    Ok(Message {
        buffer,
        address,
        format,
        args_offset,
    })
}

/// True iff the buffer starts with the bundle tag
pub fn is_bundle(buffer: &[u8]) -> bool {
    buffer.starts_with(BUNDLE_TAG)
}

/// A parsed bundle whose entry lengths have all been validated
#[derive(Debug, Clone, Copy)]
pub struct Bundle<'a> {
    buffer: &'a [u8],
    timetag: u64,
}

impl<'a> Bundle<'a> {
    pub fn timetag(&self) -> u64 {
        self.timetag
    }

    /// Declared length of the bundle
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.len() == BUNDLE_HEADER_LEN
    }

    /// Iterate the nested element buffers (messages or bundles)
    pub fn messages(&self) -> BundleMessages<'a> {
        BundleMessages {
            buffer: self.buffer,
            marker: BUNDLE_HEADER_LEN,
        }
    }
}

/// Iterator over the elements of a [`Bundle`]
pub struct BundleMessages<'a> {
    buffer: &'a [u8],
    marker: usize,
}

impl<'a> BundleMessages<'a> {
    /// Next nested element, or `None` once the declared length is consumed
    pub fn get_next_message(&mut self) -> Option<&'a [u8]> {
        let len = read_u32(self.buffer, self.marker)? as usize;
        let start = self.marker + 4;
        let element = self.buffer.get(start..start + len)?;
        self.marker = start + len;
        Some(element)
    }
}

impl<'a> Iterator for BundleMessages<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        self.get_next_message()
    }
}

/// Parse a bundle. Every `[length][element]` entry is checked against the
/// remaining bytes first, so a bad length rejects the whole bundle.
pub fn parse_bundle(buffer: &[u8]) -> Result<Bundle<'_>, CodecError> {
    if !is_bundle(buffer) {
        return Err(CodecError::NotABundle);
    }
    let timetag = read_u64(buffer, BUNDLE_TAG.len()).ok_or(CodecError::OutOfBounds {
        needed: BUNDLE_HEADER_LEN,
        available: buffer.len(),
    })?;

    let mut marker = BUNDLE_HEADER_LEN;
    while marker < buffer.len() {
        let len = read_u32(buffer, marker).ok_or(CodecError::OutOfBounds {
            needed: marker + 4,
            available: buffer.len(),
        })?;
        let remaining = buffer.len() - marker - 4;
        if (len as i32) < 0 || len as usize > remaining {
            return Err(CodecError::OutOfBounds {
                needed: len as usize,
                available: remaining,
            });
        }
        marker += 4 + len as usize;
    }

    Ok(Bundle { buffer, timetag })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_bytes() -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"/a\0\0");
        buf.extend_from_slice(b",if\0");
        buf.extend_from_slice(&7i32.to_be_bytes());
        buf.extend_from_slice(&1.5f32.to_be_bytes());
        buf
    }

    #[test]
    fn test_parse_handcrafted_message() {
        let buf = message_bytes();
        let msg = parse_message(&buf).unwrap();
        assert_eq!(msg.address(), "/a");
        assert_eq!(msg.format(), "if");
        assert_eq!(msg.cursor(), 8);

        let args: Vec<_> = msg.arguments().collect();
        assert_eq!(args, vec![Argument::Int32(7), Argument::Float32(1.5)]);
    }

    #[test]
    fn test_unterminated_address() {
        let err = parse_message(b"/abc").unwrap_err();
        assert_eq!(err, CodecError::UnterminatedAddress);
        assert_eq!(err.code(), -1);
    }

    #[test]
    fn test_missing_format_block() {
        assert_eq!(parse_message(b"/ab\0").unwrap_err(), CodecError::UnterminatedFormat);
        assert_eq!(parse_message(b"/ab\0xi\0\0").unwrap_err(), CodecError::UnterminatedFormat);
        assert_eq!(parse_message(b"/ab\0,iii").unwrap_err(), CodecError::UnterminatedFormat);
    }

    #[test]
    fn test_truncated_argument() {
        let buf = message_bytes();
        let err = parse_message(&buf[..buf.len() - 2]).unwrap_err();
        assert!(matches!(err, CodecError::OutOfBounds { .. }));
        assert_eq!(err.code(), -3);
    }

    #[test]
    fn test_unknown_tag() {
        let err = parse_message(b"/a\0\0,x\0\0").unwrap_err();
        assert_eq!(err, CodecError::UnknownTag('x'));
    }

    #[test]
    fn test_negative_blob_length() {
        let mut buf = b"/a\0\0,b\0\0".to_vec();
        buf.extend_from_slice(&(-4i32).to_be_bytes());
        assert!(matches!(parse_message(&buf), Err(CodecError::OutOfBounds { .. })));
    }

    #[test]
    fn test_unpadded_string_rejected() {
        // "hi\0" ends at 11 but padding runs to 12
        let buf = b"/a\0\0,s\0\0hi\0".to_vec();
        assert!(matches!(parse_message(&buf), Err(CodecError::OutOfBounds { .. })));
    }

    #[test]
    fn test_next_argument_misuse_does_not_panic() {
        let mut cursor = 2;
        assert!(next_argument(b"abc", &mut cursor, tag::INT64).is_none());
        assert_eq!(cursor, 2);
        assert!(next_argument(b"abcd", &mut cursor, b'?').is_none());
    }

    #[test]
    fn test_is_bundle() {
        assert!(is_bundle(b"#bundle\0\0\0\0\0\0\0\0\x01"));
        assert!(!is_bundle(b"#bundle"));
        assert!(!is_bundle(b"/bundle\0"));
    }

    #[test]
    fn test_parse_bundle_entries() {
        let msg = message_bytes();
        let mut buf = BUNDLE_TAG.to_vec();
        buf.extend_from_slice(&1u64.to_be_bytes());
        for _ in 0..2 {
            buf.extend_from_slice(&(msg.len() as u32).to_be_bytes());
            buf.extend_from_slice(&msg);
        }

        let bundle = parse_bundle(&buf).unwrap();
        assert_eq!(bundle.timetag(), 1);
        let elements: Vec<_> = bundle.messages().collect();
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0], &msg[..]);
    }

    #[test]
    fn test_bundle_entry_overrun_yields_nothing() {
        let mut buf = BUNDLE_TAG.to_vec();
        buf.extend_from_slice(&1u64.to_be_bytes());
        buf.extend_from_slice(&8u32.to_be_bytes());
        buf.extend_from_slice(b"/a\0\0,\0\0\0");
        // Second entry claims more than what is left
        buf.extend_from_slice(&64u32.to_be_bytes());
        buf.extend_from_slice(b"/b\0\0");

        assert!(matches!(parse_bundle(&buf), Err(CodecError::OutOfBounds { .. })));
    }

    #[test]
    fn test_short_bundle_header() {
        assert!(parse_bundle(b"#bundle\0\0\0").is_err());
        assert_eq!(parse_bundle(b"/x\0\0").unwrap_err(), CodecError::NotABundle);
    }
}
