//! Record (composite row) text-literal codec.
//!
//! Grammar: `(field,field)` with an empty field denoting null, and the
//! same `"`/`\` quoting rules as array literals.
use bytes::BytesMut;

use crate::{
    error::{MalformedLiteral, Result},
    postgres::{Oid, PgFormat},
    value::Value,
};

use super::{Codec, Encoded, array, format_fallback};

/// Record text-literal codec.
///
/// The field codec is exclusively owned; when absent, fields pass through
/// the generic string codec. When the expected field count is known, a
/// mismatching literal is malformed.
pub struct Record {
    elem: Option<Box<dyn Codec>>,
    expected_fields: Option<usize>,
    oid: Oid,
}

impl Record {
    /// Record of generic text fields.
    pub fn of_text() -> Self {
        Self { elem: None, expected_fields: None, oid: 0 }
    }

    /// Record with an owned field codec.
    pub fn new(elem: impl Codec + 'static) -> Self {
        Self { elem: Some(Box::new(elem)), expected_fields: None, oid: 0 }
    }

    /// Require exactly `count` fields on decode.
    pub fn with_field_count(mut self, count: usize) -> Self {
        self.expected_fields = Some(count);
        self
    }

    /// Override the record type oid reported to the wire layer.
    pub fn with_oid(mut self, oid: Oid) -> Self {
        self.oid = oid;
        self
    }

    fn decode_field(&self, raw: &[u8], row: usize, col: usize) -> Result<Value> {
        match &self.elem {
            Some(codec) => codec.decode(raw, row, col),
            None => super::PgString.decode(raw, row, col),
        }
    }
}

impl Codec for Record {
    fn name(&self) -> &'static str {
        "record"
    }

    fn format(&self) -> PgFormat {
        PgFormat::Text
    }

    fn oid(&self) -> Oid {
        self.oid
    }

    fn encode(&self, value: &Value, _out: Option<&mut BytesMut>) -> Result<Encoded> {
        let Value::Record(fields) = value else {
            let reason = format!("cannot encode {} value as record", value.kind());
            return format_fallback(self, value, reason);
        };
        let mut out = String::new();
        write_record(&mut out, fields, self.elem.as_deref())?;
        Ok(Encoded::Text(out.into()))
    }

    fn decode(&self, raw: &[u8], row: usize, col: usize) -> Result<Value> {
        let fail = |reason: &'static str| MalformedLiteral::new(reason, row, col);

        let Some(body) = raw.strip_prefix(b"(") else {
            return Err(fail("expected `(` at start of record literal").into());
        };
        let Some(body) = body.strip_suffix(b")") else {
            return Err(fail("unterminated record literal").into());
        };

        // a record always has at least one field, so `()` is one null
        let mut fields = Vec::new();
        let mut pos = 0;
        loop {
            match body.get(pos) {
                // nothing between delimiters denotes null
                Some(b',') | None => fields.push(Value::Null),
                Some(b'"') => {
                    let (field, used) = take_quoted(&body[pos..], row, col)?;
                    fields.push(self.decode_field(&field, row, col)?);
                    pos += used;
                    if pos < body.len() && body[pos] != b',' {
                        return Err(fail("expected `,` after quoted field").into());
                    }
                }
                Some(_) => {
                    let end =
                        memchr::memchr(b',', &body[pos..]).map_or(body.len(), |at| pos + at);
                    let token = &body[pos..end];
                    if token.iter().any(|b| matches!(b, b'"' | b'\\' | b'(' | b')')) {
                        return Err(fail("unquoted special character in record field").into());
                    }
                    fields.push(self.decode_field(token, row, col)?);
                    pos = end;
                }
            }
            match body.get(pos) {
                Some(b',') => pos += 1,
                None => break,
                Some(_) => return Err(fail("expected `,` between record fields").into()),
            }
        }

        if let Some(expected) = self.expected_fields {
            if fields.len() != expected {
                let reason =
                    format!("record literal has {} fields, expected {expected}", fields.len());
                return Err(MalformedLiteral::new(reason, row, col).into());
            }
        }
        Ok(Value::Record(fields))
    }
}

/// Write the record literal of `fields` into `out`.
pub(crate) fn write_record(
    out: &mut String,
    fields: &[Value],
    elem: Option<&dyn Codec>,
) -> Result<()> {
    out.push('(');
    for (nth, field) in fields.iter().enumerate() {
        if nth > 0 {
            out.push(',');
        }
        match field {
            // nothing between delimiters denotes null
            Value::Null => {}
            _ => {
                let text = array::elem_text(elem, field)?;
                match must_quote(&text) {
                    true => array::push_quoted(out, &text),
                    false => out.push_str(&text),
                }
            }
        }
    }
    out.push(')');
    Ok(())
}

fn must_quote(text: &str) -> bool {
    text.is_empty()
        || text
            .bytes()
            .any(|b| matches!(b, b',' | b'(' | b')' | b'"' | b'\\') || b.is_ascii_whitespace())
}

/// Consume a quoted field at the start of `body`, returning the unescaped
/// bytes and the consumed length.
///
/// Accepts both escape forms the server may emit: `""` for a literal
/// quote and `\"`/`\\` backslash escapes.
fn take_quoted(body: &[u8], row: usize, col: usize) -> Result<(Vec<u8>, usize)> {
    let mut out = Vec::new();
    let mut pos = 1; // opening quote
    loop {
        let rest = &body[pos..];
        match memchr::memchr2(b'"', b'\\', rest) {
            None => return Err(MalformedLiteral::new("unterminated quote in record", row, col).into()),
            Some(at) => {
                out.extend_from_slice(&rest[..at]);
                match rest[at] {
                    b'"' => match rest.get(at + 1) {
                        Some(&b'"') => {
                            out.push(b'"');
                            pos += at + 2;
                        }
                        _ => return Ok((out, pos + at + 1)),
                    },
                    _ => match rest.get(at + 1) {
                        Some(&escaped) => {
                            out.push(escaped);
                            pos += at + 2;
                        }
                        None => {
                            return Err(MalformedLiteral::new(
                                "unterminated escape sequence in record",
                                row,
                                col,
                            )
                            .into());
                        }
                    },
                }
            }
        }
    }
}
