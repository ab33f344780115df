//! Array text-literal codec.
//!
//! Grammar: `{elem,elem,{nested,...}}` with an optional leading
//! `[lo:hi]...=` dimension decoration, unquoted `NULL` for null elements,
//! `"`-quoted elements with `\`-escaping of `"` and `\`, and a
//! configurable element delimiter (default `,`).
//!
//! The dimension decoration is parsed and discarded: decoded arrays are
//! always zero-based flat nested sequences, regardless of the declared
//! lower bound. This is a deliberate simplification, matching the
//! zero-based sequence convention of the application side.
use bytes::BytesMut;

use crate::{
    common::ByteStr,
    error::{MalformedLiteral, Result},
    postgres::{Oid, PgFormat},
    value::Value,
};

use super::{Codec, Encoded, encode_value, format_fallback, text_form};

/// Array text-literal codec.
///
/// The element codec is exclusively owned; when absent, elements pass
/// through the generic string codec.
pub struct Array {
    elem: Option<Box<dyn Codec>>,
    delimiter: u8,
    needs_quotation: bool,
    oid: Oid,
}

impl Array {
    /// Array of generic text elements.
    pub fn of_text() -> Self {
        Self { elem: None, delimiter: b',', needs_quotation: true, oid: 0 }
    }

    /// Array with an owned element codec.
    pub fn new(elem: impl Codec + 'static) -> Self {
        Self { elem: Some(Box::new(elem)), delimiter: b',', needs_quotation: true, oid: 0 }
    }

    /// Override the element delimiter, `,` by default.
    ///
    /// Postgres uses `;` for `box[]`.
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Disable element quoting on encode.
    pub fn without_quotation(mut self) -> Self {
        self.needs_quotation = false;
        self
    }

    /// Override the array type oid reported to the wire layer.
    pub fn with_oid(mut self, oid: Oid) -> Self {
        self.oid = oid;
        self
    }

    fn decode_elem(&self, raw: &[u8], row: usize, col: usize) -> Result<Value> {
        match &self.elem {
            Some(codec) => codec.decode(raw, row, col),
            None => super::PgString.decode(raw, row, col),
        }
    }
}

impl Codec for Array {
    fn name(&self) -> &'static str {
        "array"
    }

    fn format(&self) -> PgFormat {
        PgFormat::Text
    }

    fn oid(&self) -> Oid {
        self.oid
    }

    fn encode(&self, value: &Value, _out: Option<&mut BytesMut>) -> Result<Encoded> {
        let Value::Array(items) = value else {
            let reason = format!("cannot encode {} value as array", value.kind());
            return format_fallback(self, value, reason);
        };
        let mut out = String::new();
        write_array(
            &mut out,
            items,
            self.elem.as_deref(),
            self.delimiter,
            self.needs_quotation,
        )?;
        Ok(Encoded::Text(out.into()))
    }

    fn decode(&self, raw: &[u8], row: usize, col: usize) -> Result<Value> {
        let mut parser = Parser { input: raw, pos: 0, delimiter: self.delimiter, row, col };
        parser.skip_dimensions()?;
        let items = parser.parse_array(self, 0)?;
        if parser.pos != raw.len() {
            return Err(parser.fail("trailing data after array literal"));
        }
        Ok(Value::Array(items))
    }
}

const MAX_DEPTH: usize = 32;

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
    delimiter: u8,
    row: usize,
    col: usize,
}

impl Parser<'_> {
    fn fail(&self, reason: &'static str) -> crate::error::Error {
        MalformedLiteral::new(reason, self.row, self.col).into()
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    /// Recognize and discard the optional `[lo:hi]...=` decoration.
    fn skip_dimensions(&mut self) -> Result<()> {
        if self.peek() != Some(b'[') {
            return Ok(());
        }
        match memchr::memchr(b'=', &self.input[self.pos..]) {
            Some(at) => {
                self.pos += at + 1;
                Ok(())
            }
            None => Err(self.fail("dimension decoration without `=`")),
        }
    }

    fn parse_array(&mut self, array: &Array, depth: usize) -> Result<Vec<Value>> {
        if depth > MAX_DEPTH {
            return Err(self.fail("array literal nested too deeply"));
        }
        if self.peek() != Some(b'{') {
            return Err(self.fail("expected `{` at start of array literal"));
        }
        self.pos += 1;

        let mut items = Vec::new();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(items);
        }
        loop {
            match self.peek() {
                Some(b'{') => items.push(Value::Array(self.parse_array(array, depth + 1)?)),
                Some(b'"') => {
                    let elem = self.parse_quoted()?;
                    items.push(array.decode_elem(&elem, self.row, self.col)?);
                }
                Some(_) => {
                    let (row, col) = (self.row, self.col);
                    let token = self.take_unquoted()?;
                    match token {
                        b"NULL" => items.push(Value::Null),
                        _ => items.push(array.decode_elem(token, row, col)?),
                    }
                }
                None => return Err(self.fail("unterminated array literal")),
            }
            match self.peek() {
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(items);
                }
                Some(d) if d == self.delimiter => self.pos += 1,
                Some(_) => return Err(self.fail("expected delimiter or `}` after element")),
                None => return Err(self.fail("unterminated array literal")),
            }
        }
    }

    /// Consume a `"`-quoted element, unescaping `\"` and `\\`.
    fn parse_quoted(&mut self) -> Result<Vec<u8>> {
        self.pos += 1; // opening quote
        let mut out = Vec::new();
        loop {
            let rest = &self.input[self.pos..];
            match memchr::memchr2(b'"', b'\\', rest) {
                None => return Err(self.fail("unterminated quoted element")),
                Some(at) => {
                    out.extend_from_slice(&rest[..at]);
                    match rest[at] {
                        b'"' => {
                            self.pos += at + 1;
                            return Ok(out);
                        }
                        _ => match rest.get(at + 1) {
                            Some(&escaped) => {
                                out.push(escaped);
                                self.pos += at + 2;
                            }
                            None => return Err(self.fail("unterminated escape sequence")),
                        },
                    }
                }
            }
        }
    }

    /// Consume an unquoted token, up to the delimiter or a closing brace.
    fn take_unquoted(&mut self) -> Result<&[u8]> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b == self.delimiter || matches!(b, b'}' | b'{' | b'"') {
                break;
            }
            self.pos += 1;
        }
        let token = &self.input[start..self.pos];
        if token.is_empty() {
            return Err(MalformedLiteral::new("empty array element", self.row, self.col).into());
        }
        Ok(token)
    }
}

/// Write the array literal of `items` into `out`.
pub(crate) fn write_array(
    out: &mut String,
    items: &[Value],
    elem: Option<&dyn Codec>,
    delimiter: u8,
    needs_quotation: bool,
) -> Result<()> {
    out.push('{');
    for (nth, item) in items.iter().enumerate() {
        if nth > 0 {
            out.push(delimiter as char);
        }
        match item {
            Value::Null => out.push_str("NULL"),
            Value::Array(nested) => write_array(out, nested, elem, delimiter, needs_quotation)?,
            _ => {
                let text = elem_text(elem, item)?;
                match needs_quotation && must_quote(&text, delimiter) {
                    true => push_quoted(out, &text),
                    false => out.push_str(&text),
                }
            }
        }
    }
    out.push('}');
    Ok(())
}

/// Element text through the element codec, or the generic text form.
pub(crate) fn elem_text(elem: Option<&dyn Codec>, value: &Value) -> Result<ByteStr> {
    match elem {
        None => text_form(value),
        Some(codec) => {
            let bytes = encode_value(codec, value)?;
            ByteStr::from_utf8(bytes).map_err(|_| {
                let reason = format!("{} output cannot be embedded in a literal", codec.name());
                crate::error::FormatError::new(reason).into()
            })
        }
    }
}

fn must_quote(text: &str, delimiter: u8) -> bool {
    text.is_empty()
        || text == "NULL"
        || text.bytes().any(|b| {
            b == delimiter || matches!(b, b'{' | b'}' | b'"' | b'\\') || b.is_ascii_whitespace()
        })
}

pub(crate) fn push_quoted(out: &mut String, text: &str) {
    out.push('"');
    for c in text.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
}

/// Unescape a fully-quoted literal; the closing quote must end the input.
pub(crate) fn unquote_full(raw: &[u8], row: usize, col: usize) -> Result<Vec<u8>> {
    let mut parser = Parser { input: raw, pos: 0, delimiter: b',', row, col };
    let out = parser.parse_quoted()?;
    if parser.pos != raw.len() {
        return Err(parser.fail("trailing data after quoted literal"));
    }
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::codec::{Int4, encode_value};

    fn text(s: &'static str) -> Value {
        Value::Text(s.into())
    }

    #[test]
    fn nested_roundtrip_with_nulls() {
        let codec = Array::new(Int4::text());
        let value = Value::Array(vec![
            Value::Array(vec![Value::Int(1), Value::Int(2)]),
            Value::Array(vec![Value::Int(3), Value::Null]),
        ]);
        let wire = encode_value(&codec, &value).unwrap();
        assert_eq!(&wire[..], b"{{1,2},{3,NULL}}");
        assert_eq!(codec.decode(&wire, 0, 0).unwrap(), value);
    }

    #[test]
    fn escaping_roundtrip() {
        let codec = Array::of_text();
        let value = Value::Array(vec![text(r#"qu"ote"#), text(r"back\slash"), text("plain")]);
        let wire = encode_value(&codec, &value).unwrap();
        assert_eq!(&wire[..], br#"{"qu\"ote","back\\slash",plain}"#);
        assert_eq!(codec.decode(&wire, 0, 0).unwrap(), value);
    }

    #[test]
    fn quoted_null_is_not_null() {
        let codec = Array::of_text();
        let value = Value::Array(vec![text("NULL"), Value::Null]);
        let wire = encode_value(&codec, &value).unwrap();
        assert_eq!(&wire[..], br#"{"NULL",NULL}"#);
        assert_eq!(codec.decode(&wire, 0, 0).unwrap(), value);
    }

    #[test]
    fn dimension_decoration_discarded() {
        let codec = Array::new(Int4::text());
        let value = codec.decode(b"[3:5]={7,8,9}", 0, 0).unwrap();
        assert_eq!(value, Value::Array(vec![Value::Int(7), Value::Int(8), Value::Int(9)]));
    }

    #[test]
    fn custom_delimiter() {
        let codec = Array::of_text().with_delimiter(b';');
        let value = Value::Array(vec![text("a,b"), text("c")]);
        let wire = encode_value(&codec, &value).unwrap();
        assert_eq!(&wire[..], b"{a,b;c}");
        assert_eq!(codec.decode(&wire, 0, 0).unwrap(), value);
    }

    #[test]
    fn empty_array() {
        let codec = Array::of_text();
        assert_eq!(codec.decode(b"{}", 0, 0).unwrap(), Value::Array(vec![]));
    }

    #[test]
    fn missing_close_brace() {
        let codec = Array::of_text();
        assert!(codec.decode(b"{a,b", 0, 0).unwrap_err().is_malformed());
        assert!(codec.decode(b"{\"a", 0, 0).unwrap_err().is_malformed());
        assert!(codec.decode(b"{a}b", 0, 0).unwrap_err().is_malformed());
    }

    #[test]
    fn error_carries_position() {
        let codec = Array::of_text();
        let err = codec.decode(b"{a,b", 4, 2).unwrap_err();
        let crate::Error::Malformed(m) = err else { panic!() };
        assert_eq!(m.position(), (4, 2));
    }
}
