//! Base64 wrapper codec.
use ::base64::{Engine as _, engine::general_purpose::STANDARD};
use bytes::{Bytes, BytesMut};

use crate::{
    error::{MalformedLiteral, Result},
    value::Value,
};

use super::{Codec, Encoded, encode_value, text_form};

/// Base64 wrapper: decodes its payload to bytes, then optionally
/// re-dispatches through an owned inner codec.
///
/// Composition is recursive, so e.g. "base64 of an array literal" is
/// `Base64::new(Array::of_text())`.
pub struct Base64 {
    elem: Option<Box<dyn Codec>>,
}

impl Base64 {
    /// Base64 of opaque bytes.
    pub fn of_bytes() -> Self {
        Self { elem: None }
    }

    /// Base64 of the inner codec's wire form.
    pub fn new(elem: impl Codec + 'static) -> Self {
        Self { elem: Some(Box::new(elem)) }
    }
}

impl Codec for Base64 {
    fn name(&self) -> &'static str {
        "base64"
    }

    fn encode(&self, value: &Value, _out: Option<&mut BytesMut>) -> Result<Encoded> {
        let inner = match &self.elem {
            Some(codec) => encode_value(&**codec, value)?,
            None => match value {
                Value::Bytes(bytes) => bytes.clone(),
                _ => text_form(value)?.into_bytes(),
            },
        };
        Ok(Encoded::Text(STANDARD.encode(&inner).into()))
    }

    fn decode(&self, raw: &[u8], row: usize, col: usize) -> Result<Value> {
        let bytes = STANDARD
            .decode(raw)
            .map_err(|_| MalformedLiteral::new("invalid base64 payload", row, col))?;
        match &self.elem {
            Some(codec) => codec.decode(&bytes, row, col),
            None => Ok(Value::Bytes(Bytes::from(bytes))),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::codec::{Array, Int4, encode_value};

    #[test]
    fn bytes_roundtrip() {
        let codec = Base64::of_bytes();
        let value = Value::Bytes(Bytes::from_static(b"\x00\x01binary\xff"));
        let wire = encode_value(&codec, &value).unwrap();
        assert!(wire.iter().all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'=')));
        assert_eq!(codec.decode(&wire, 0, 0).unwrap(), value);
    }

    #[test]
    fn base64_of_array_literal() {
        let codec = Base64::new(Array::new(Int4::text()));
        let value = Value::Array(vec![Value::Int(1), Value::Null, Value::Int(3)]);
        let wire = encode_value(&codec, &value).unwrap();
        assert_eq!(&wire[..], STANDARD.encode(b"{1,NULL,3}").as_bytes());
        assert_eq!(codec.decode(&wire, 0, 0).unwrap(), value);
    }

    #[test]
    fn rejects_bad_payload() {
        let codec = Base64::of_bytes();
        assert!(codec.decode(b"not!!base64", 0, 0).unwrap_err().is_malformed());
    }
}
