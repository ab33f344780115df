//! Scalar numeric and boolean codecs.
//!
//! Text output is produced by manual digit extraction ([`itoa`], [`ryu`])
//! so it is locale independent: ASCII `[-0-9.eE]` plus the literals
//! `Infinity`, `-Infinity` and `NaN` for floating point.
use bytes::{BufMut, BytesMut};

use crate::{
    common::ByteStr,
    error::{MalformedLiteral, Result},
    postgres::{Oid, PgFormat, PgType},
    value::Value,
};

use super::{Codec, Encoded, Flags, check_width, fixed_width, format_fallback, text_form};

/// Parse an ascii integer literal by manual digit extraction.
///
/// Accumulates negated so `i64::MIN` parses without overflow.
fn parse_int(raw: &[u8], row: usize, col: usize) -> Result<i64> {
    let (neg, digits) = match raw.first() {
        Some(b'-') => (true, &raw[1..]),
        Some(b'+') => (false, &raw[1..]),
        Some(_) => (false, raw),
        None => return Err(MalformedLiteral::new("empty integer literal", row, col).into()),
    };
    if digits.is_empty() {
        return Err(MalformedLiteral::new("empty integer literal", row, col).into());
    }
    let mut acc = 0i64;
    for &b in digits {
        if !b.is_ascii_digit() {
            let reason = format!("non-digit {:?} in integer literal", b as char);
            return Err(MalformedLiteral::new(reason, row, col).into());
        }
        acc = acc
            .checked_mul(10)
            .and_then(|acc| acc.checked_sub(i64::from(b - b'0')))
            .ok_or_else(|| MalformedLiteral::new("integer literal out of range", row, col))?;
    }
    match neg {
        true => Ok(acc),
        false => acc
            .checked_neg()
            .ok_or_else(|| MalformedLiteral::new("integer literal out of range", row, col).into()),
    }
}

fn int_of(value: &Value) -> Option<i64> {
    match value {
        Value::Int(i) => Some(*i),
        Value::Text(t) => t.as_str().parse().ok(),
        _ => None,
    }
}

/// Narrow an `i64` to the codec's storage width.
fn narrow<T: TryFrom<i64>>(int: i64) -> Option<T> {
    T::try_from(int).ok()
}

macro_rules! int_codec {
    (
        $(#[$meta:meta])*
        $name:ident, $ty:ty, $pg:literal, $put:ident
    ) => {
        $(#[$meta])*
        pub struct $name {
            format: PgFormat,
            flags: Flags,
        }

        impl $name {
            /// Ascii-digits text codec.
            pub fn text() -> Self {
                Self { format: PgFormat::Text, flags: Flags::default() }
            }

            /// Big-endian two's-complement binary codec.
            pub fn binary() -> Self {
                Self { format: PgFormat::Binary, flags: Flags::default() }
            }

            pub fn with_flags(mut self, flags: Flags) -> Self {
                self.flags = flags;
                self
            }
        }

        impl Codec for $name {
            fn name(&self) -> &'static str {
                $pg
            }

            fn format(&self) -> PgFormat {
                self.format
            }

            fn oid(&self) -> Oid {
                <$ty as PgType>::OID
            }

            fn flags(&self) -> Flags {
                self.flags
            }

            fn encode(&self, value: &Value, out: Option<&mut BytesMut>) -> Result<Encoded> {
                let Some(int) = int_of(value) else {
                    let reason = format!("cannot encode {} value as {}", value.kind(), $pg);
                    return format_fallback(self, value, reason);
                };
                let Some(int) = narrow::<$ty>(int) else {
                    let reason = format!("{int} out of range for {}", $pg);
                    return Err(crate::error::FormatError::new(reason).into());
                };
                match self.format {
                    PgFormat::Binary => fixed_width(out, size_of::<$ty>(), |buf| buf.$put(int)),
                    PgFormat::Text => {
                        Ok(Encoded::Text(ByteStr::copy_from_str(itoa::Buffer::new().format(int))))
                    }
                }
            }

            fn decode(&self, raw: &[u8], row: usize, col: usize) -> Result<Value> {
                match self.format {
                    PgFormat::Binary => {
                        check_width(self, raw, size_of::<$ty>(), row, col)?;
                        let mut be = [0u8; size_of::<$ty>()];
                        be.copy_from_slice(raw);
                        Ok(Value::Int(<$ty>::from_be_bytes(be).into()))
                    }
                    PgFormat::Text => {
                        let int = parse_int(raw, row, col)?;
                        let Some(int) = narrow::<$ty>(int) else {
                            let reason = format!("{int} out of range for {}", $pg);
                            return Err(MalformedLiteral::new(reason, row, col).into());
                        };
                        Ok(Value::Int(int.into()))
                    }
                }
            }
        }
    };
}

int_codec! {
    /// `int2` codec, 2-byte storage.
    Int2, i16, "int2", put_i16
}
int_codec! {
    /// `int4` codec, 4-byte storage.
    Int4, i32, "int4", put_i32
}
int_codec! {
    /// `int8` codec, 8-byte storage.
    Int8, i64, "int8", put_i64
}

pub(crate) fn parse_float(raw: &[u8], row: usize, col: usize) -> Result<f64> {
    match raw {
        b"Infinity" => return Ok(f64::INFINITY),
        b"-Infinity" => return Ok(f64::NEG_INFINITY),
        b"NaN" => return Ok(f64::NAN),
        _ => {}
    }
    std::str::from_utf8(raw)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| MalformedLiteral::new("invalid float literal", row, col).into())
}

fn float_of(value: &Value) -> Option<f64> {
    match value {
        Value::Float(f) => Some(*f),
        Value::Int(i) => Some(*i as f64),
        Value::Text(t) => parse_float(t.as_bytes(), 0, 0).ok(),
        _ => None,
    }
}

macro_rules! float_codec {
    (
        $(#[$meta:meta])*
        $name:ident, $ty:ty, $pg:literal, $put:ident
    ) => {
        $(#[$meta])*
        pub struct $name {
            format: PgFormat,
            flags: Flags,
        }

        impl $name {
            /// Shortest-roundtrip ascii text codec.
            pub fn text() -> Self {
                Self { format: PgFormat::Text, flags: Flags::default() }
            }

            /// Big-endian IEEE-754 binary codec.
            pub fn binary() -> Self {
                Self { format: PgFormat::Binary, flags: Flags::default() }
            }

            pub fn with_flags(mut self, flags: Flags) -> Self {
                self.flags = flags;
                self
            }
        }

        impl Codec for $name {
            fn name(&self) -> &'static str {
                $pg
            }

            fn format(&self) -> PgFormat {
                self.format
            }

            fn oid(&self) -> Oid {
                <$ty as PgType>::OID
            }

            fn flags(&self) -> Flags {
                self.flags
            }

            fn encode(&self, value: &Value, out: Option<&mut BytesMut>) -> Result<Encoded> {
                let Some(float) = float_of(value) else {
                    let reason = format!("cannot encode {} value as {}", value.kind(), $pg);
                    return format_fallback(self, value, reason);
                };
                let float = float as $ty;
                match self.format {
                    PgFormat::Binary => fixed_width(out, size_of::<$ty>(), |buf| buf.$put(float)),
                    PgFormat::Text => Ok(Encoded::Text(float_text(float.into()))),
                }
            }

            fn decode(&self, raw: &[u8], row: usize, col: usize) -> Result<Value> {
                match self.format {
                    PgFormat::Binary => {
                        check_width(self, raw, size_of::<$ty>(), row, col)?;
                        let mut be = [0u8; size_of::<$ty>()];
                        be.copy_from_slice(raw);
                        Ok(Value::Float(<$ty>::from_be_bytes(be).into()))
                    }
                    PgFormat::Text => Ok(Value::Float(parse_float(raw, row, col)?)),
                }
            }
        }
    };
}

float_codec! {
    /// `float4` codec, 4-byte storage.
    Float4, f32, "float4", put_f32
}
float_codec! {
    /// `float8` codec, 8-byte storage.
    Float8, f64, "float8", put_f64
}

pub(crate) fn float_text(float: f64) -> ByteStr {
    if float.is_nan() {
        ByteStr::from_static("NaN")
    } else if float == f64::INFINITY {
        ByteStr::from_static("Infinity")
    } else if float == f64::NEG_INFINITY {
        ByteStr::from_static("-Infinity")
    } else {
        ByteStr::copy_from_str(ryu::Buffer::new().format(float))
    }
}

/// `bool` codec: text `t`/`f` single byte, binary `0`/`1` single byte.
///
/// Encode accepts [`Value::Bool`], integer `0`/`1`, and falls back to the
/// generic string form for anything else.
pub struct Bool {
    format: PgFormat,
}

impl Bool {
    pub fn text() -> Self {
        Self { format: PgFormat::Text }
    }

    pub fn binary() -> Self {
        Self { format: PgFormat::Binary }
    }
}

impl Codec for Bool {
    fn name(&self) -> &'static str {
        "bool"
    }

    fn format(&self) -> PgFormat {
        self.format
    }

    fn oid(&self) -> Oid {
        bool::OID
    }

    fn encode(&self, value: &Value, out: Option<&mut BytesMut>) -> Result<Encoded> {
        let known = match value {
            Value::Bool(b) => Some(*b),
            Value::Int(0) => Some(false),
            Value::Int(1) => Some(true),
            _ => None,
        };
        match (known, self.format) {
            (Some(b), PgFormat::Text) => {
                Ok(Encoded::Text(ByteStr::from_static(if b { "t" } else { "f" })))
            }
            (Some(b), PgFormat::Binary) => fixed_width(out, 1, |buf| buf.put_u8(b as u8)),
            (None, PgFormat::Text) => Ok(Encoded::Text(text_form(value)?)),
            (None, PgFormat::Binary) => {
                let reason = format!("cannot encode {} value as bool", value.kind());
                Err(crate::error::FormatError::new(reason).into())
            }
        }
    }

    fn decode(&self, raw: &[u8], row: usize, col: usize) -> Result<Value> {
        check_width(self, raw, 1, row, col)?;
        let b = match (self.format, raw[0]) {
            (PgFormat::Text, b't') | (PgFormat::Binary, 1) => true,
            (PgFormat::Text, b'f') | (PgFormat::Binary, 0) => false,
            (_, byte) => {
                let reason = format!("invalid boolean byte {byte:#x}");
                return Err(MalformedLiteral::new(reason, row, col).into());
            }
        };
        Ok(Value::Bool(b))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::codec::encode_value;

    #[test]
    fn int4_binary_roundtrip() {
        let codec = Int4::binary();
        for int in [0i64, 1, -1, 42, i64::from(i32::MAX), i64::from(i32::MIN)] {
            let bytes = encode_value(&codec, &Value::Int(int)).unwrap();
            assert_eq!(bytes.len(), 4);
            assert_eq!(codec.decode(&bytes, 0, 0).unwrap(), Value::Int(int));
        }
    }

    #[test]
    fn int4_binary_exact_bytes() {
        let bytes = encode_value(&Int4::binary(), &Value::Int(42)).unwrap();
        assert_eq!(&bytes[..], &[0x00, 0x00, 0x00, 0x2A]);
    }

    #[test]
    fn int4_binary_wrong_length() {
        let err = Int4::binary().decode(&[0, 0, 1], 3, 7).unwrap_err();
        assert!(err.is_malformed());
        let crate::Error::Malformed(m) = err else { panic!() };
        assert_eq!(m.position(), (3, 7));
    }

    #[test]
    fn int8_text_roundtrip() {
        let codec = Int8::text();
        for int in [0, 7, -7, i64::MAX, i64::MIN] {
            let bytes = encode_value(&codec, &Value::Int(int)).unwrap();
            assert_eq!(codec.decode(&bytes, 0, 0).unwrap(), Value::Int(int));
        }
    }

    #[test]
    fn int_text_rejects_non_digit() {
        assert!(Int4::text().decode(b"12a", 0, 0).unwrap_err().is_malformed());
        assert!(Int4::text().decode(b"", 0, 0).unwrap_err().is_malformed());
        assert!(Int4::text().decode(b"-", 0, 0).unwrap_err().is_malformed());
    }

    #[test]
    fn int2_range_checked() {
        let err = encode_value(&Int2::binary(), &Value::Int(70_000)).unwrap_err();
        assert!(matches!(err, crate::Error::Format(_)));
    }

    #[test]
    fn float8_binary_roundtrip() {
        let codec = Float8::binary();
        for float in [0.0f64, -1.5, 1e300, f64::INFINITY, f64::NEG_INFINITY] {
            let bytes = encode_value(&codec, &Value::Float(float)).unwrap();
            assert_eq!(bytes.len(), 8);
            assert_eq!(codec.decode(&bytes, 0, 0).unwrap(), Value::Float(float));
        }
    }

    #[test]
    fn float_text_special_literals() {
        let codec = Float8::text();
        let bytes = encode_value(&codec, &Value::Float(f64::INFINITY)).unwrap();
        assert_eq!(&bytes[..], b"Infinity");
        assert_eq!(codec.decode(b"-Infinity", 0, 0).unwrap(), Value::Float(f64::NEG_INFINITY));
        let Value::Float(nan) = codec.decode(b"NaN", 0, 0).unwrap() else { panic!() };
        assert!(nan.is_nan());
    }

    #[test]
    fn bool_text() {
        let codec = Bool::text();
        assert_eq!(codec.decode(b"t", 0, 0).unwrap(), Value::Bool(true));
        assert_eq!(codec.decode(b"f", 0, 0).unwrap(), Value::Bool(false));
        assert!(codec.decode(b"x", 0, 0).unwrap_err().is_malformed());
        assert!(codec.decode(b"tt", 0, 0).unwrap_err().is_malformed());

        let bytes = encode_value(&codec, &Value::Int(1)).unwrap();
        assert_eq!(&bytes[..], b"t");
    }

    #[test]
    fn bool_binary() {
        let codec = Bool::binary();
        let bytes = encode_value(&codec, &Value::Bool(true)).unwrap();
        assert_eq!(&bytes[..], &[1]);
        assert_eq!(codec.decode(&[0], 0, 0).unwrap(), Value::Bool(false));
        assert!(codec.decode(&[2], 0, 0).unwrap_err().is_malformed());
    }

    #[test]
    fn degrade_to_string_policy() {
        let strict = Int4::text();
        let err = encode_value(&strict, &Value::Text("abc".into())).unwrap_err();
        assert!(matches!(err, crate::Error::Format(_)));

        let lax = Int4::text().with_flags(Flags::FORMAT_ERROR_TO_STRING);
        let bytes = encode_value(&lax, &Value::Text("abc".into())).unwrap();
        assert_eq!(&bytes[..], b"abc");
    }
}
