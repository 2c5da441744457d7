//! Typed OSC arguments

use std::borrow::Cow;
use std::fmt;

/// Type tag characters understood by the codec
pub mod tag {
    pub const INT32: u8 = b'i';
    pub const INT64: u8 = b'h';
    pub const FLOAT32: u8 = b'f';
    pub const FLOAT64: u8 = b'd';
    pub const STRING: u8 = b's';
    pub const BLOB: u8 = b'b';
    pub const MIDI: u8 = b'm';
    pub const TIMETAG: u8 = b't';
    pub const TRUE: u8 = b'T';
    pub const FALSE: u8 = b'F';
}

/// A single OSC argument.
///
/// Decoded arguments borrow string and blob payloads from the packet they
/// came from, so they cannot outlive message dispatch. Use
/// [`Argument::into_owned`] to keep one around (e.g. in a config map).
#[derive(Debug, Clone, PartialEq)]
pub enum Argument<'a> {
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(Cow<'a, str>),
    Blob(Cow<'a, [u8]>),
    Midi([u8; 4]),
    Timetag(u64),
}

impl<'a> Argument<'a> {
    /// Type tag written in the format string for this argument
    pub fn tag(&self) -> u8 {
        match self {
            Argument::Bool(true) => tag::TRUE,
            Argument::Bool(false) => tag::FALSE,
            Argument::Int32(_) => tag::INT32,
            Argument::Int64(_) => tag::INT64,
            Argument::Float32(_) => tag::FLOAT32,
            Argument::Float64(_) => tag::FLOAT64,
            Argument::String(_) => tag::STRING,
            Argument::Blob(_) => tag::BLOB,
            Argument::Midi(_) => tag::MIDI,
            Argument::Timetag(_) => tag::TIMETAG,
        }
    }

    /// Number of payload bytes this argument occupies on the wire
    pub fn wire_len(&self) -> usize {
        match self {
            Argument::Bool(_) => 0,
            Argument::Int32(_) | Argument::Float32(_) | Argument::Midi(_) => 4,
            Argument::Int64(_) | Argument::Float64(_) | Argument::Timetag(_) => 8,
            Argument::String(s) => padded_len(s.len() + 1),
            Argument::Blob(b) => 4 + padded_len(b.len()),
        }
    }

    /// Detach the argument from the buffer it was decoded from
    pub fn into_owned(self) -> Argument<'static> {
        match self {
            Argument::Bool(v) => Argument::Bool(v),
            Argument::Int32(v) => Argument::Int32(v),
            Argument::Int64(v) => Argument::Int64(v),
            Argument::Float32(v) => Argument::Float32(v),
            Argument::Float64(v) => Argument::Float64(v),
            Argument::String(s) => Argument::String(Cow::Owned(s.into_owned())),
            Argument::Blob(b) => Argument::Blob(Cow::Owned(b.into_owned())),
            Argument::Midi(m) => Argument::Midi(m),
            Argument::Timetag(t) => Argument::Timetag(t),
        }
    }

    /// Numeric view used by variable conversion. Booleans count as 1/0.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Argument::Bool(v) => Some(if v { 1.0 } else { 0.0 }),
            Argument::Int32(v) => Some(v as f64),
            Argument::Int64(v) => Some(v as f64),
            Argument::Float32(v) => Some(v as f64),
            Argument::Float64(v) => Some(v),
            _ => None,
        }
    }

    /// Integer view, truncating floats toward zero
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Argument::Bool(v) => Some(v as i64),
            Argument::Int32(v) => Some(v as i64),
            Argument::Int64(v) => Some(v),
            Argument::Float32(v) => Some(v as i64),
            Argument::Float64(v) => Some(v as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Argument::Bool(v) => Some(v),
            Argument::Int32(v) => Some(v != 0),
            Argument::Int64(v) => Some(v != 0),
            Argument::Float32(v) => Some(v != 0.0),
            Argument::Float64(v) => Some(v != 0.0),
            _ => None,
        }
    }
}

impl From<bool> for Argument<'static> {
    fn from(v: bool) -> Self {
        Argument::Bool(v)
    }
}

impl From<i32> for Argument<'static> {
    fn from(v: i32) -> Self {
        Argument::Int32(v)
    }
}

impl From<i64> for Argument<'static> {
    fn from(v: i64) -> Self {
        Argument::Int64(v)
    }
}

impl From<f32> for Argument<'static> {
    fn from(v: f32) -> Self {
        Argument::Float32(v)
    }
}

impl From<f64> for Argument<'static> {
    fn from(v: f64) -> Self {
        Argument::Float64(v)
    }
}

impl<'a> From<&'a str> for Argument<'a> {
    fn from(v: &'a str) -> Self {
        Argument::String(Cow::Borrowed(v))
    }
}

impl fmt::Display for Argument<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Bool(v) => write!(f, "{}", v),
            Argument::Int32(v) => write!(f, "{}", v),
            Argument::Int64(v) => write!(f, "{}", v),
            Argument::Float32(v) => write!(f, "{}", v),
            Argument::Float64(v) => write!(f, "{}", v),
            Argument::String(s) => write!(f, "\"{}\"", s),
            Argument::Blob(b) => write!(f, "blob[{}]", b.len()),
            Argument::Midi(m) => write!(f, "midi[{:02x} {:02x} {:02x} {:02x}]", m[0], m[1], m[2], m[3]),
            Argument::Timetag(t) => write!(f, "timetag({:#018x})", t),
        }
    }
}

/// Render an argument list the way the diagnostic tree dump shows it
pub fn arguments_to_string(arguments: &[Argument<'_>]) -> String {
    arguments
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Round up to the next multiple of 4
pub(crate) fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}
