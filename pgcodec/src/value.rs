//! Application value model.
//!
//! - [`Value`]
//! - [`ValueKind`]
//! - [`PgTimestamp`]
//! - [`PgDate`]
use bytes::Bytes;
use time::PrimitiveDateTime;

use crate::common::ByteStr;

/// An application-level postgres value.
///
/// This is what codecs decode wire bytes into, and what they encode into
/// wire bytes. `NULL` is represented in-band as [`Value::Null`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(ByteStr),
    Bytes(Bytes),
    Array(Vec<Value>),
    Record(Vec<Value>),
    Timestamp(PgTimestamp),
    Date(PgDate),
}

impl Value {
    /// Returns the dynamic kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Text(_) => ValueKind::Text,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::Array(_) => ValueKind::Array,
            Value::Record(_) => ValueKind::Record,
            Value::Timestamp(_) => ValueKind::Timestamp,
            Value::Date(_) => ValueKind::Date,
        }
    }

    /// Return `true` if value is NULL.
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// The closed set of [`Value`] kinds, used for per-kind codec dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Float,
    Text,
    Bytes,
    Array,
    Record,
    Timestamp,
    Date,
}

impl ValueKind {
    /// Number of kinds, for fixed dispatch tables.
    pub const COUNT: usize = 10;

    /// Stable index into a fixed dispatch table.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Kind name for diagnostics.
    pub const fn name(self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Text => "text",
            ValueKind::Bytes => "bytes",
            ValueKind::Array => "array",
            ValueKind::Record => "record",
            ValueKind::Timestamp => "timestamp",
            ValueKind::Date => "date",
        }
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A timestamp with the postgres `infinity`/`-infinity` sentinels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PgTimestamp {
    NegInfinity,
    At(PrimitiveDateTime),
    PosInfinity,
}

/// A date with the postgres `infinity`/`-infinity` sentinels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PgDate {
    NegInfinity,
    At(time::Date),
    PosInfinity,
}

macro_rules! from {
    (<$ty:ty>$pat:pat => $body:expr) => {
        impl From<$ty> for Value {
            fn from($pat: $ty) -> Self {
                $body
            }
        }
    };
}

from!(<bool>v => Value::Bool(v));
from!(<i16>v => Value::Int(v.into()));
from!(<i32>v => Value::Int(v.into()));
from!(<i64>v => Value::Int(v));
from!(<f32>v => Value::Float(v.into()));
from!(<f64>v => Value::Float(v));
from!(<&'static str>v => Value::Text(ByteStr::from_static(v)));
from!(<String>v => Value::Text(v.into()));
from!(<ByteStr>v => Value::Text(v));
from!(<Bytes>v => Value::Bytes(v));
from!(<PgTimestamp>v => Value::Timestamp(v));
from!(<PgDate>v => Value::Date(v));
from!(<PrimitiveDateTime>v => Value::Timestamp(PgTimestamp::At(v)));
from!(<time::Date>v => Value::Date(PgDate::At(v)));

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}
