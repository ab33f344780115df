//! Value codecs.
//!
//! A [`Codec`] knows how to encode one application [`Value`] into wire
//! bytes and/or decode wire bytes back, for one postgres type in one
//! [`PgFormat`]. Composite codecs ([`Array`], [`Record`], [`Base64`],
//! [`Quoted`]) delegate element work to an owned inner codec.
//!
//! Encoding is a two-pass protocol: the measure pass (`out = None`)
//! returns either the exact byte count the write pass will need, or an
//! already-produced intermediate text value. This lets a caller size one
//! buffer for many parameters instead of growing it per value.
use bytes::{Bytes, BytesMut};

use crate::{
    common::ByteStr,
    error::{Result, UnsupportedDirection},
    postgres::{Oid, PgFormat},
    value::Value,
};

mod scalar;
mod text;
mod timestamp;
mod array;
mod record;
mod base64;

pub use array::Array;
pub use self::base64::Base64;
pub use record::Record;
pub use scalar::{Bool, Float4, Float8, Int2, Int4, Int8};
pub use text::{Bytea, PgString, Quoted, RawBytes};
pub use timestamp::{Date, Timestamp};

pub(crate) use text::text_form;

/// Result of one [`Codec::encode`] pass.
#[derive(Debug)]
pub enum Encoded {
    /// Measure pass: the exact number of bytes the write pass will need.
    /// Write pass: the number of bytes written, at most the estimate.
    Size(usize),
    /// An intermediate text value has been fully produced; there is no
    /// write pass.
    Text(ByteStr),
}

/// Per-codec behavior flags.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags(u8);

impl Flags {
    /// The wire representation is interpreted as UTC.
    pub const DB_UTC: Flags = Flags(1);
    /// The application value is interpreted as UTC.
    pub const APP_UTC: Flags = Flags(1 << 1);
    /// Degrade unencodable values to their generic string form instead
    /// of raising [`FormatError`][crate::error::FormatError].
    pub const FORMAT_ERROR_TO_STRING: Flags = Flags(1 << 2);

    /// Returns `true` if all bits of `other` are set in `self`.
    pub const fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns the union of both flag sets.
    pub const fn with(self, other: Flags) -> Flags {
        Flags(self.0 | other.0)
    }
}

impl std::fmt::Debug for Flags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Flags({:#b})", self.0)
    }
}

/// A unit that encodes and/or decodes one postgres type in one wire
/// format.
///
/// A codec implements at most one direction of each; the unsupported
/// direction fails with [`UnsupportedDirection`], which is a programming
/// error rather than a data error. Codecs hold no per-call state and may
/// be shared read-only once constructed.
pub trait Codec: Send + Sync {
    /// Codec name for diagnostics.
    fn name(&self) -> &'static str;

    /// Wire format this codec produces and consumes.
    fn format(&self) -> PgFormat {
        PgFormat::Text
    }

    /// Target type oid, `0` when unspecified.
    fn oid(&self) -> Oid {
        0
    }

    /// Behavior flags.
    fn flags(&self) -> Flags {
        Flags::default()
    }

    /// Encode `value`, measure pass when `out` is `None`.
    ///
    /// See [`encode_value`] for the driver of both passes.
    fn encode(&self, value: &Value, out: Option<&mut BytesMut>) -> Result<Encoded> {
        let _ = (value, out);
        Err(UnsupportedDirection::encode(self.name()).into())
    }

    /// Decode the raw bytes of cell (`row`, `col`).
    ///
    /// Structurally invalid input fails with
    /// [`MalformedLiteral`][crate::error::MalformedLiteral].
    fn decode(&self, raw: &[u8], row: usize, col: usize) -> Result<Value> {
        let _ = (raw, row, col);
        Err(UnsupportedDirection::decode(self.name()).into())
    }
}

/// Drive the measure pass then the write pass of [`Codec::encode`].
///
/// # Panics
///
/// Panics when a codec writes more bytes than its measure-pass estimate;
/// that is a fatal contract violation.
pub fn encode_value(codec: &dyn Codec, value: &Value) -> Result<Bytes> {
    match codec.encode(value, None)? {
        Encoded::Text(text) => Ok(text.into_bytes()),
        Encoded::Size(estimate) => {
            let mut out = BytesMut::with_capacity(estimate);
            let written = match codec.encode(value, Some(&mut out))? {
                Encoded::Size(n) => n,
                Encoded::Text(_) => {
                    panic!("codec {:?} produced an intermediate value on the write pass", codec.name())
                }
            };
            assert!(
                written <= estimate,
                "codec {:?} wrote {written} bytes past its estimate of {estimate}",
                codec.name(),
            );
            Ok(out.freeze())
        }
    }
}

/// Encode through the degrade-to-string policy, or fail.
pub(crate) fn format_fallback(codec: &dyn Codec, value: &Value, reason: String) -> Result<Encoded> {
    if codec.flags().contains(Flags::FORMAT_ERROR_TO_STRING) {
        Ok(Encoded::Text(text_form(value)?))
    } else {
        Err(crate::error::FormatError::new(reason).into())
    }
}

/// Two-pass helper for fixed-width binary encodings.
pub(crate) fn fixed_width(
    out: Option<&mut BytesMut>,
    width: usize,
    write: impl FnOnce(&mut BytesMut),
) -> Result<Encoded> {
    match out {
        None => Ok(Encoded::Size(width)),
        Some(buf) => {
            write(buf);
            Ok(Encoded::Size(width))
        }
    }
}

/// Exact-length check for fixed-width binary decodings.
pub(crate) fn check_width(
    codec: &dyn Codec,
    raw: &[u8],
    width: usize,
    row: usize,
    col: usize,
) -> Result<()> {
    if raw.len() != width {
        return Err(crate::error::MalformedLiteral::new(
            format!("{} expects {width} bytes, got {}", codec.name(), raw.len()),
            row,
            col,
        )
        .into());
    }
    Ok(())
}
