//! `pgcodec` error types.
use std::{borrow::Cow, fmt};

use crate::common::unit_error;

/// A specialized [`Result`] type for `pgcodec` operation.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// All possible error from the `pgcodec` library.
pub enum Error {
    /// Structurally invalid wire data at decode time.
    Malformed(MalformedLiteral),
    /// A type map cannot serve the shape of a result or parameter list.
    Unsuitable(TypeMapUnsuitable),
    /// A codec invoked for the direction it does not implement.
    Direction(UnsupportedDirection),
    /// A value cannot be encoded by the selected codec.
    Format(FormatError),
    /// Cell access on a cleared result buffer.
    Cleared(BufferCleared),
    /// Column requested not found.
    ColumnNotFound(ColumnNotFound),
    /// Row requested is out of bounds.
    RowNotFound(RowNotFound),
}

/// Decode-time structural violation: bad length, unterminated quote,
/// non-digit, wrong field count.
///
/// Never silently coerced; a failed decode of one cell aborts only that
/// value, the rest of the result buffer remains usable.
pub struct MalformedLiteral {
    reason: Cow<'static, str>,
    row: usize,
    col: usize,
}

impl MalformedLiteral {
    pub(crate) fn new(reason: impl Into<Cow<'static, str>>, row: usize, col: usize) -> Self {
        Self { reason: reason.into(), row, col }
    }

    /// The cell position the violation was found at.
    pub fn position(&self) -> (usize, usize) {
        (self.row, self.col)
    }
}

/// A type map cannot serve the current result or parameter shape.
///
/// Surfaced at `fit_to_*` time, before any per-cell work begins.
pub struct TypeMapUnsuitable {
    reason: Cow<'static, str>,
}

impl TypeMapUnsuitable {
    pub(crate) fn new(reason: impl Into<Cow<'static, str>>) -> Self {
        Self { reason: reason.into() }
    }

    pub(crate) fn columns(expected: usize, got: usize) -> Self {
        Self::new(format!("expected {expected} columns, result has {got}"))
    }

    pub(crate) fn params(expected: usize, got: usize) -> Self {
        Self::new(format!("expected {expected} parameters, query has {got}"))
    }
}

/// A codec was invoked for the encode/decode direction it does not
/// implement. This is a programming error, not a data error.
pub struct UnsupportedDirection {
    codec: &'static str,
    direction: &'static str,
}

impl UnsupportedDirection {
    pub(crate) fn encode(codec: &'static str) -> Self {
        Self { codec, direction: "encode" }
    }

    pub(crate) fn decode(codec: &'static str) -> Self {
        Self { codec, direction: "decode" }
    }
}

/// Encode-time failure: the value cannot be represented by the codec.
///
/// Codecs carrying [`Flags::FORMAT_ERROR_TO_STRING`][f] degrade to the
/// generic string form instead of raising this.
///
/// [f]: crate::codec::Flags::FORMAT_ERROR_TO_STRING
pub struct FormatError {
    reason: Cow<'static, str>,
}

impl FormatError {
    pub(crate) fn new(reason: impl Into<Cow<'static, str>>) -> Self {
        Self { reason: reason.into() }
    }
}

unit_error! {
    /// Cell access on a [`ResultBuffer`][crate::result::ResultBuffer]
    /// that has been cleared.
    pub struct BufferCleared("result buffer has been cleared");
}

unit_error! {
    /// Row index past the end of a result buffer.
    pub struct RowNotFound("row not found");
}

/// Column requested by name or index not found.
pub struct ColumnNotFound(Cow<'static, str>);

impl ColumnNotFound {
    pub(crate) fn name(name: &str) -> Self {
        Self(String::from(name).into())
    }

    pub(crate) fn index(index: usize) -> Self {
        Self(String::from(itoa::Buffer::new().format(index)).into())
    }
}

macro_rules! display {
    (<$ty:ty>($self:ident, $f:ident) => $body:expr) => {
        impl std::error::Error for $ty { }

        impl fmt::Display for $ty {
            fn fmt(&$self, $f: &mut fmt::Formatter<'_>) -> fmt::Result {
                $body
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "\"{self}\"")
            }
        }
    };
}

display!(<MalformedLiteral>(self, f) => {
    write!(f, "malformed literal at row {} col {}: {}", self.row, self.col, self.reason)
});
display!(<TypeMapUnsuitable>(self, f) => {
    write!(f, "type map unsuitable: {}", self.reason)
});
display!(<UnsupportedDirection>(self, f) => {
    write!(f, "codec {:?} does not support {}", self.codec, self.direction)
});
display!(<FormatError>(self, f) => {
    write!(f, "cannot encode value: {}", self.reason)
});
display!(<ColumnNotFound>(self, f) => {
    write!(f, "column not found: {:?}", self.0)
});

macro_rules! from {
    (<$ty:ty>$pat:pat => $body:expr) => {
        impl From<$ty> for Error {
            fn from($pat: $ty) -> Self {
                $body
            }
        }
    };
}

from!(<MalformedLiteral>e => Error::Malformed(e));
from!(<TypeMapUnsuitable>e => Error::Unsuitable(e));
from!(<UnsupportedDirection>e => Error::Direction(e));
from!(<FormatError>e => Error::Format(e));
from!(<BufferCleared>e => Error::Cleared(e));
from!(<ColumnNotFound>e => Error::ColumnNotFound(e));
from!(<RowNotFound>e => Error::RowNotFound(e));

impl std::error::Error for Error { }

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(e) => e.fmt(f),
            Self::Unsuitable(e) => e.fmt(f),
            Self::Direction(e) => e.fmt(f),
            Self::Format(e) => e.fmt(f),
            Self::Cleared(e) => e.fmt(f),
            Self::ColumnNotFound(e) => e.fmt(f),
            Self::RowNotFound(e) => e.fmt(f),
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

impl Error {
    /// Returns `true` for [`Error::Malformed`].
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }

    /// Returns `true` for [`Error::Unsuitable`].
    pub fn is_unsuitable(&self) -> bool {
        matches!(self, Self::Unsuitable(_))
    }
}
