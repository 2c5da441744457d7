//! Typed leaf variables

use std::fmt;
use std::marker::PhantomData;

use crate::codec::Argument;
use crate::tree::node::NodeId;
use crate::tree::{ExecuteOutcome, OscEndpoint};

/// Kind of value a variable holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    Int32,
    Float32,
    Float64,
}

/// Current value of a variable
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Bool(bool),
    Int32(i32),
    Float32(f32),
    Float64(f64),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::Int32(_) => ValueKind::Int32,
            Value::Float32(_) => ValueKind::Float32,
            Value::Float64(_) => ValueKind::Float64,
        }
    }

    /// Zero of the given kind (`false` for booleans)
    pub fn zero(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Bool => Value::Bool(false),
            ValueKind::Int32 => Value::Int32(0),
            ValueKind::Float32 => Value::Float32(0.0),
            ValueKind::Float64 => Value::Float64(0.0),
        }
    }

    /// Convert a decoded argument to a value of `kind`.
    ///
    /// Numbers convert between each other (floats truncate toward zero and
    /// saturate when going to int32), booleans count as 0/1 and numbers as
    /// booleans when non-zero. Strings, blobs, MIDI and timetags never
    /// convert.
    pub fn from_argument(kind: ValueKind, argument: &Argument<'_>) -> Option<Self> {
        match kind {
            ValueKind::Bool => argument.as_bool().map(Value::Bool),
            ValueKind::Int32 => argument
                .as_i64()
                .map(|v| Value::Int32(v.clamp(i32::MIN as i64, i32::MAX as i64) as i32)),
            ValueKind::Float32 => argument.as_f64().map(|v| Value::Float32(v as f32)),
            ValueKind::Float64 => argument.as_f64().map(Value::Float64),
        }
    }

    pub fn to_argument(&self) -> Argument<'static> {
        match *self {
            Value::Bool(v) => Argument::Bool(v),
            Value::Int32(v) => Argument::Int32(v),
            Value::Float32(v) => Argument::Float32(v),
            Value::Float64(v) => Argument::Float64(v),
        }
    }

    /// Apply a relative adjustment. Booleans toggle when the increment is
    /// `true`. Mismatched kinds leave the value alone.
    fn nudged(self, increment: Value) -> Value {
        match (self, increment) {
            (Value::Bool(v), Value::Bool(i)) => Value::Bool(v ^ i),
            (Value::Int32(v), Value::Int32(i)) => Value::Int32(v.saturating_add(i)),
            (Value::Float32(v), Value::Float32(i)) => Value::Float32(v + i),
            (Value::Float64(v), Value::Float64(i)) => Value::Float64(v + i),
            (unchanged, _) => unchanged,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Float32(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
        }
    }
}

/// Rust types that can back a variable
pub trait OscValue: Copy + Into<Value> {
    const KIND: ValueKind;

    fn from_value(value: Value) -> Option<Self>;
}

macro_rules! impl_osc_value {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        }

        impl OscValue for $ty {
            const KIND: ValueKind = ValueKind::$variant;

            fn from_value(value: Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

impl_osc_value!(bool, Bool);
impl_osc_value!(i32, Int32);
impl_osc_value!(f32, Float32);
impl_osc_value!(f64, Float64);

/// A leaf node holding one value
#[derive(Debug, Clone)]
pub struct Variable {
    value: Value,
    increment: Value,
    fixed_size: bool,
}

impl Variable {
    /// Variable accepting relative (zero-argument) adjustments
    pub fn new(initial: impl Into<Value>) -> Self {
        let value = initial.into();
        Self {
            increment: Value::zero(value.kind()),
            value,
            fixed_size: false,
        }
    }

    /// Variable whose messages always carry exactly one argument.
    /// Zero-argument messages only re-announce the current value.
    pub fn fixed(initial: impl Into<Value>) -> Self {
        Self {
            fixed_size: true,
            ..Self::new(initial)
        }
    }

    pub fn with_increment(mut self, amount: impl Into<Value>) -> Self {
        self.set_increment(amount.into());
        self
    }

    pub fn value(&self) -> Value {
        self.value
    }

    pub fn kind(&self) -> ValueKind {
        self.value.kind()
    }

    pub fn increment(&self) -> Value {
        self.increment
    }

    /// Set the amount added by zero-argument messages. Ignored (returns
    /// false) when the kind does not match the variable.
    pub fn set_increment(&mut self, amount: Value) -> bool {
        if amount.kind() != self.kind() {
            return false;
        }
        self.increment = amount;
        true
    }

    pub fn is_fixed_size(&self) -> bool {
        self.fixed_size
    }

    /// Set a new value of the same kind
    pub fn set(&mut self, value: Value) -> ExecuteOutcome {
        if value.kind() != self.kind() {
            return ExecuteOutcome::Ignored;
        }
        if value == self.value {
            return ExecuteOutcome::Unchanged;
        }
        self.value = value;
        ExecuteOutcome::Changed
    }

    /// Wire form of the current value
    pub fn to_arguments(&self) -> [Argument<'static>; 1] {
        [self.value.to_argument()]
    }
}

impl OscEndpoint for Variable {
    fn execute(&mut self, arguments: &[Argument<'_>]) -> ExecuteOutcome {
        match arguments {
            [] if self.fixed_size => ExecuteOutcome::Announce,
            [] => match self.set(self.value.nudged(self.increment)) {
                ExecuteOutcome::Unchanged => ExecuteOutcome::Announce,
                outcome => outcome,
            },
            [argument] => match Value::from_argument(self.kind(), argument) {
                Some(value) => self.set(value),
                None => {
                    tracing::trace!(tag = %(argument.tag() as char), "Incompatible argument ignored");
                    ExecuteOutcome::Ignored
                }
            },
            _ => ExecuteOutcome::Ignored,
        }
    }

    fn as_string(&self) -> Option<String> {
        Some(self.value.to_string())
    }
}

/// Typed handle to a variable node
#[derive(Debug)]
pub struct Var<T> {
    id: NodeId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Var<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Var<T> {}

impl<T> PartialEq for Var<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T: OscValue> Var<T> {
    pub(crate) fn new(id: NodeId) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }
}
