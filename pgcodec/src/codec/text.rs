//! Generic text, opaque bytes, `bytea` and quoted-literal codecs.
use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    common::ByteStr,
    error::{MalformedLiteral, Result},
    postgres::{Oid, PgFormat, PgType},
    value::Value,
};

use super::{Codec, Encoded, array, encode_value, format_fallback, record, scalar, timestamp};

/// Canonical text form of any [`Value`], used by the generic string codec
/// and by the degrade-to-string encode policy.
pub(crate) fn text_form(value: &Value) -> Result<ByteStr> {
    Ok(match value {
        Value::Null => ByteStr::default(),
        Value::Bool(b) => ByteStr::from_static(if *b { "t" } else { "f" }),
        Value::Int(int) => ByteStr::copy_from_str(itoa::Buffer::new().format(*int)),
        Value::Float(float) => scalar::float_text(*float),
        Value::Text(text) => text.clone(),
        Value::Bytes(bytes) => hex_text(bytes),
        Value::Array(items) => {
            let mut out = String::new();
            array::write_array(&mut out, items, None, b',', true)?;
            out.into()
        }
        Value::Record(fields) => {
            let mut out = String::new();
            record::write_record(&mut out, fields, None)?;
            out.into()
        }
        Value::Timestamp(ts) => timestamp::timestamp_text(ts),
        Value::Date(date) => timestamp::date_text(date),
    })
}

/// `\x`-prefixed lowercase hex form of binary data.
pub(crate) fn hex_text(bytes: &[u8]) -> ByteStr {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("\\x");
    for &b in bytes {
        out.push(char::from_digit((b >> 4).into(), 16).unwrap_or('0'));
        out.push(char::from_digit((b & 0xf).into(), 16).unwrap_or('0'));
    }
    out.into()
}

/// Generic string codec: UTF-8 passthrough decode, canonical text-form
/// encode. The last-resort fallback for text columns.
pub struct PgString;

impl PgString {
    pub fn text() -> Self {
        Self
    }
}

impl Codec for PgString {
    fn name(&self) -> &'static str {
        "text"
    }

    fn oid(&self) -> Oid {
        String::OID
    }

    fn encode(&self, value: &Value, _out: Option<&mut BytesMut>) -> Result<Encoded> {
        Ok(Encoded::Text(text_form(value)?))
    }

    fn decode(&self, raw: &[u8], row: usize, col: usize) -> Result<Value> {
        let text = ByteStr::from_utf8(Bytes::copy_from_slice(raw))
            .map_err(|_| MalformedLiteral::new("invalid utf8 in text value", row, col))?;
        Ok(Value::Text(text))
    }
}

/// Opaque bytes codec. The last-resort fallback for binary columns.
pub struct RawBytes;

impl Codec for RawBytes {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn format(&self) -> PgFormat {
        PgFormat::Binary
    }

    fn encode(&self, value: &Value, out: Option<&mut BytesMut>) -> Result<Encoded> {
        let raw = match value {
            Value::Bytes(bytes) => bytes.as_ref(),
            Value::Text(text) => text.as_bytes(),
            _ => return Ok(Encoded::Text(text_form(value)?)),
        };
        match out {
            None => Ok(Encoded::Size(raw.len())),
            Some(buf) => {
                buf.put_slice(raw);
                Ok(Encoded::Size(raw.len()))
            }
        }
    }

    fn decode(&self, raw: &[u8], _row: usize, _col: usize) -> Result<Value> {
        Ok(Value::Bytes(Bytes::copy_from_slice(raw)))
    }
}

/// `bytea` text codec: `\x` lowercase hex encode; decode accepts hex and
/// the traditional octal-escape form.
pub struct Bytea;

impl Bytea {
    pub fn text() -> Self {
        Self
    }
}

impl Codec for Bytea {
    fn name(&self) -> &'static str {
        "bytea"
    }

    fn oid(&self) -> Oid {
        Bytes::OID
    }

    fn encode(&self, value: &Value, out: Option<&mut BytesMut>) -> Result<Encoded> {
        let raw = match value {
            Value::Bytes(bytes) => bytes.as_ref(),
            Value::Text(text) => text.as_bytes(),
            _ => {
                let reason = format!("cannot encode {} value as bytea", value.kind());
                return format_fallback(self, value, reason);
            }
        };
        let size = 2 + raw.len() * 2;
        match out {
            None => Ok(Encoded::Size(size)),
            Some(buf) => {
                buf.put_slice(b"\\x");
                for &b in raw {
                    const HEX: &[u8; 16] = b"0123456789abcdef";
                    buf.put_u8(HEX[usize::from(b >> 4)]);
                    buf.put_u8(HEX[usize::from(b & 0xf)]);
                }
                Ok(Encoded::Size(size))
            }
        }
    }

    fn decode(&self, raw: &[u8], row: usize, col: usize) -> Result<Value> {
        match raw.strip_prefix(b"\\x") {
            Some(hex) => decode_hex(hex, row, col),
            None => decode_octal_escaped(raw, row, col),
        }
    }
}

fn decode_hex(hex: &[u8], row: usize, col: usize) -> Result<Value> {
    if hex.len() % 2 != 0 {
        return Err(MalformedLiteral::new("odd number of hex digits in bytea", row, col).into());
    }
    let digit = |b: u8| -> Result<u8> {
        match (b as char).to_digit(16) {
            Some(d) => Ok(d as u8),
            None => {
                let reason = format!("invalid hex digit {:?} in bytea", b as char);
                Err(MalformedLiteral::new(reason, row, col).into())
            }
        }
    };
    let mut out = BytesMut::with_capacity(hex.len() / 2);
    for pair in hex.chunks_exact(2) {
        out.put_u8(digit(pair[0])? << 4 | digit(pair[1])?);
    }
    Ok(Value::Bytes(out.freeze()))
}

fn decode_octal_escaped(raw: &[u8], row: usize, col: usize) -> Result<Value> {
    let mut out = BytesMut::with_capacity(raw.len());
    let mut rest = raw;
    loop {
        match memchr::memchr(b'\\', rest) {
            None => {
                out.put_slice(rest);
                break;
            }
            Some(at) => {
                out.put_slice(&rest[..at]);
                rest = &rest[at + 1..];
                match rest {
                    [b'\\', ..] => {
                        out.put_u8(b'\\');
                        rest = &rest[1..];
                    }
                    [a @ b'0'..=b'3', b @ b'0'..=b'7', c @ b'0'..=b'7', ..] => {
                        out.put_u8((a - b'0') << 6 | (b - b'0') << 3 | (c - b'0'));
                        rest = &rest[3..];
                    }
                    _ => {
                        return Err(MalformedLiteral::new(
                            "invalid escape in bytea literal",
                            row,
                            col,
                        )
                        .into());
                    }
                }
            }
        }
    }
    Ok(Value::Bytes(out.freeze()))
}

/// Quoted-literal wrapper: the inner text wrapped in `"` with
/// `\`-escaping, for embedding in SQL-literal context.
///
/// The inner element codec may be absent, meaning the generic string
/// codec applies.
pub struct Quoted {
    elem: Option<Box<dyn Codec>>,
}

impl Quoted {
    /// Quote around the generic text form.
    pub fn plain() -> Self {
        Self { elem: None }
    }

    /// Quote around the output of `elem`.
    pub fn new(elem: impl Codec + 'static) -> Self {
        Self { elem: Some(Box::new(elem)) }
    }
}

impl Codec for Quoted {
    fn name(&self) -> &'static str {
        "quoted"
    }

    fn encode(&self, value: &Value, _out: Option<&mut BytesMut>) -> Result<Encoded> {
        let inner = match &self.elem {
            Some(codec) => {
                let bytes = encode_value(&**codec, value)?;
                match ByteStr::from_utf8(bytes) {
                    Ok(text) => text,
                    Err(_) => {
                        let reason = format!("{} output cannot be quoted as text", codec.name());
                        return Err(crate::error::FormatError::new(reason).into());
                    }
                }
            }
            None => text_form(value)?,
        };
        let mut out = String::with_capacity(inner.len() + 2);
        out.push('"');
        for c in inner.chars() {
            if matches!(c, '"' | '\\') {
                out.push('\\');
            }
            out.push(c);
        }
        out.push('"');
        Ok(Encoded::Text(out.into()))
    }

    fn decode(&self, raw: &[u8], row: usize, col: usize) -> Result<Value> {
        let unquoted;
        let inner = match raw.first() {
            Some(b'"') => {
                unquoted = array::unquote_full(raw, row, col)?;
                &unquoted[..]
            }
            _ => raw,
        };
        match &self.elem {
            Some(codec) => codec.decode(inner, row, col),
            None => PgString.decode(inner, row, col),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::codec::encode_value;

    #[test]
    fn bytea_hex_roundtrip() {
        let codec = Bytea::text();
        let bytes = Bytes::from_static(&[0x00, 0xde, 0xad, 0xbe, 0xef, 0x7f]);
        let wire = encode_value(&codec, &Value::Bytes(bytes.clone())).unwrap();
        assert_eq!(&wire[..], b"\\x00deadbeef7f");
        assert_eq!(codec.decode(&wire, 0, 0).unwrap(), Value::Bytes(bytes));
    }

    #[test]
    fn bytea_octal_unescape() {
        let codec = Bytea::text();
        let value = codec.decode(b"ab\\\\c\\001", 0, 0).unwrap();
        assert_eq!(value, Value::Bytes(Bytes::from_static(b"ab\\c\x01")));
    }

    #[test]
    fn bytea_rejects_bad_hex() {
        let codec = Bytea::text();
        assert!(codec.decode(b"\\xzz", 0, 0).unwrap_err().is_malformed());
        assert!(codec.decode(b"\\xabc", 0, 0).unwrap_err().is_malformed());
    }

    #[test]
    fn string_passthrough() {
        let codec = PgString::text();
        let wire = encode_value(&codec, &Value::Text("O'Reilly".into())).unwrap();
        assert_eq!(&wire[..], b"O'Reilly");
        assert_eq!(codec.decode(&wire, 0, 0).unwrap(), Value::Text("O'Reilly".into()));
    }

    #[test]
    fn string_rejects_invalid_utf8() {
        assert!(PgString.decode(&[0xff, 0xfe], 0, 0).unwrap_err().is_malformed());
    }

    #[test]
    fn quoted_literal_roundtrip() {
        let codec = Quoted::plain();
        let wire = encode_value(&codec, &Value::Text(r#"a"b\c"#.into())).unwrap();
        assert_eq!(&wire[..], br#""a\"b\\c""#);
        assert_eq!(codec.decode(&wire, 0, 0).unwrap(), Value::Text(r#"a"b\c"#.into()));
    }
}
