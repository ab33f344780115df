//! Outgoing parameter and COPY row encoding.
use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    codec::encode_value,
    common::verbose,
    error::Result,
    postgres::{Oid, PgFormat},
    typemap::{TypeMap, resolve_codec},
    value::Value,
};

/// Encoded query parameters, ready for a `Bind` message.
///
/// Parallel arrays by position: wire format code, target type oid (`0`
/// leaves inference to the server) and the encoded payload, `None` for
/// NULL.
#[derive(Debug)]
pub struct QueryParams {
    formats: Vec<PgFormat>,
    oids: Vec<Oid>,
    values: Vec<Option<Bytes>>,
}

impl QueryParams {
    pub fn formats(&self) -> &[PgFormat] {
        &self.formats
    }

    pub fn oids(&self) -> &[Oid] {
        &self.oids
    }

    pub fn values(&self) -> &[Option<Bytes>] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Encode a parameter list through `map`.
///
/// The map's `fit_to_query` runs first; an unsuitable map rejects the
/// whole list before any value is encoded. Each parameter resolves its
/// codec with the concrete value in hand, so kind-dispatching maps work
/// here.
pub fn encode_params(map: &dyn TypeMap, params: &[Value]) -> Result<QueryParams> {
    map.fit_to_query(params)?;

    let mut formats = Vec::with_capacity(params.len());
    let mut oids = Vec::with_capacity(params.len());
    let mut values = Vec::with_capacity(params.len());

    for (position, param) in params.iter().enumerate() {
        let codec = resolve_codec(map, position, Some(param), PgFormat::Text);
        formats.push(codec.format());
        oids.push(codec.oid());
        match param {
            Value::Null => values.push(None),
            _ => values.push(Some(encode_value(&*codec, param)?)),
        }
    }

    verbose!(params = params.len(), "parameters encoded");
    Ok(QueryParams { formats, oids, values })
}

/// Encode one row of a text-format COPY stream, trailing newline
/// included.
///
/// NULL becomes `\N`; backslash, tab, newline and carriage return in
/// field data are backslash-escaped so they survive the line format.
pub fn encode_copy_row(map: &dyn TypeMap, row: &[Value]) -> Result<Bytes> {
    map.fit_to_copy(row.len())?;

    let mut out = BytesMut::new();
    for (position, value) in row.iter().enumerate() {
        if position > 0 {
            out.put_u8(b'\t');
        }
        match value {
            Value::Null => out.put_slice(b"\\N"),
            _ => {
                let codec = resolve_codec(map, position, Some(value), PgFormat::Text);
                let field = encode_value(&*codec, value)?;
                put_copy_escaped(&mut out, &field);
            }
        }
    }
    out.put_u8(b'\n');
    Ok(out.freeze())
}

fn put_copy_escaped(out: &mut BytesMut, field: &[u8]) {
    for &b in field {
        match b {
            b'\\' => out.put_slice(b"\\\\"),
            b'\t' => out.put_slice(b"\\t"),
            b'\n' => out.put_slice(b"\\n"),
            b'\r' => out.put_slice(b"\\r"),
            _ => out.put_u8(b),
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::codec::{Int4, PgString};
    use crate::typemap::{AllStrings, ByColumn, ByValueKind};
    use crate::value::ValueKind;

    #[test]
    fn params_by_kind() {
        let map = ByValueKind::new()
            .set(ValueKind::Int, Arc::new(Int4::binary()))
            .set(ValueKind::Text, Arc::new(PgString::text()));

        let params = [Value::Int(42), Value::Text("O'Reilly".into())];
        let encoded = encode_params(&map, &params).unwrap();

        assert_eq!(encoded.formats(), [PgFormat::Binary, PgFormat::Text]);
        assert_eq!(encoded.oids(), [23, 25]);
        assert_eq!(
            encoded.values()[0].as_deref(),
            Some(&[0x00, 0x00, 0x00, 0x2A][..]),
        );
        // no literal-level escaping for parameters
        assert_eq!(encoded.values()[1].as_deref(), Some(&b"O'Reilly"[..]));
    }

    #[test]
    fn null_param_carries_format_and_oid() {
        let map = ByColumn::new(vec![Some(Arc::new(Int4::binary()) as _)]);
        let encoded = encode_params(&map, &[Value::Null]).unwrap();
        assert_eq!(encoded.formats(), [PgFormat::Binary]);
        assert_eq!(encoded.oids(), [23]);
        assert_eq!(encoded.values(), [None]);
    }

    #[test]
    fn params_count_enforced() {
        let map = ByColumn::new(vec![None, None]);
        let err = encode_params(&map, &[Value::Int(1)]).unwrap_err();
        assert!(err.is_unsuitable());
    }

    #[test]
    fn copy_row_escaping() {
        let map = AllStrings::new();
        let row = [
            Value::Text("plain".into()),
            Value::Null,
            Value::Text("tab\there\nand\\slash".into()),
        ];
        let line = encode_copy_row(&map, &row).unwrap();
        assert_eq!(&line[..], b"plain\t\\N\ttab\\there\\nand\\\\slash\n");
    }

    #[test]
    fn copy_rejected_by_kind_map() {
        let map = ByValueKind::new();
        let err = encode_copy_row(&map, &[Value::Int(1)]).unwrap_err();
        assert!(err.is_unsuitable());
    }
}
