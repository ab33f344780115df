//! Lazily materialized row view.
//!
//! A [`Tuple`] snapshots one row's raw cells out of a
//! [`ResultBuffer`][crate::result::ResultBuffer] and decodes each cell at
//! most once, on first access. Snapshotting is cheap: each cell is a
//! reference-counted slice of the buffer's wire data, so the tuple
//! outlives buffer clearing without copying.
use std::sync::Arc;

use bytes::Bytes;

use crate::{
    common::verbose,
    error::{ColumnNotFound, Result},
    result::{ColumnDesc, Fields},
    typemap::{TypeMap, resolve_codec},
    value::Value,
};

/// The raw side of a not-yet-fully-materialized tuple, dropped once
/// every slot holds a decoded value.
struct Source {
    row: usize,
    cells: Vec<Option<Bytes>>,
    columns: Arc<[ColumnDesc]>,
    type_map: Arc<dyn TypeMap>,
}

/// One row, decoded cell by cell on demand.
///
/// Slot materialization is monotonic: a decoded value is cached and
/// never re-decoded. Once the last slot fills, the raw source is
/// released and the tuple detaches entirely from the wire data.
pub struct Tuple {
    fields: Arc<Fields>,
    source: Option<Source>,
    slots: Vec<Option<Value>>,
    unfilled: usize,
}

impl Tuple {
    pub(crate) fn new(
        fields: Arc<Fields>,
        columns: Arc<[ColumnDesc]>,
        type_map: Arc<dyn TypeMap>,
        row: usize,
        cells: Vec<Option<Bytes>>,
    ) -> Self {
        let len = cells.len();
        let source = match len {
            0 => None,
            _ => Some(Source { row, cells, columns, type_map }),
        };
        Self { fields, source, slots: vec![None; len], unfilled: len }
    }

    /// Returns the number of fields.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns `true` once every slot is decoded and the raw source is
    /// released.
    pub fn is_detached(&self) -> bool {
        self.source.is_none()
    }

    /// Name of the field at `index`.
    pub fn field_name(&self, index: usize) -> Option<&str> {
        self.fields.name_at(index).map(|name| name.as_str())
    }

    /// The value at `index`, decoding it on first access.
    pub fn get(&mut self, index: usize) -> Result<&Value> {
        if index >= self.slots.len() {
            return Err(ColumnNotFound::index(index).into());
        }
        if self.slots[index].is_none() {
            self.materialize(index)?;
        }
        Ok(self.slots[index].as_ref().unwrap())
    }

    /// The value of the first field named `name`, decoding it on first
    /// access.
    pub fn get_by_name(&mut self, name: &str) -> Result<&Value> {
        match self.fields.index_of(name) {
            Some(index) => self.get(index),
            None => Err(ColumnNotFound::name(name).into()),
        }
    }

    /// Decode every remaining slot and detach from the raw source.
    pub fn materialize_all(&mut self) -> Result<()> {
        for index in 0..self.slots.len() {
            if self.slots[index].is_none() {
                self.materialize(index)?;
            }
        }
        Ok(())
    }

    fn materialize(&mut self, index: usize) -> Result<()> {
        // slot empty implies the source is still held
        let source = self.source.as_ref().unwrap();
        let value = match &source.cells[index] {
            None => Value::Null,
            Some(raw) => {
                let format = source.columns[index].format();
                let codec = resolve_codec(&*source.type_map, index, None, format);
                codec.decode(raw, source.row, index)?
            }
        };
        self.slots[index] = Some(value);
        self.unfilled -= 1;
        if self.unfilled == 0 {
            self.source = None;
            verbose!("tuple detached");
        }
        Ok(())
    }
}

impl std::fmt::Debug for Tuple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tuple")
            .field("fields", &self.slots.len())
            .field("unfilled", &self.unfilled)
            .field("detached", &self.is_detached())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::codec::Int4;
    use crate::common::ByteStr;
    use crate::postgres::PgFormat;
    use crate::result::ResultBuffer;
    use crate::typemap::{AllStrings, ByColumn};

    fn buffer() -> ResultBuffer {
        let columns = vec![
            ColumnDesc::new(ByteStr::from_static("id"), 0, PgFormat::Text),
            ColumnDesc::new(ByteStr::from_static("name"), 0, PgFormat::Text),
            ColumnDesc::new(ByteStr::from_static("note"), 0, PgFormat::Text),
        ];
        let rows = vec![vec![
            Some(Bytes::from_static(b"42")),
            Some(Bytes::from_static(b"ada")),
            None,
        ]];
        let map = ByColumn::new(vec![Some(Arc::new(Int4::text()) as _), None, None]);
        ResultBuffer::new(columns, rows, Arc::new(map)).unwrap()
    }

    #[test]
    fn lazy_materialization_then_detach() {
        let mut tuple = buffer().tuple(0).unwrap();
        assert!(!tuple.is_detached());

        assert_eq!(tuple.get(0).unwrap(), &Value::Int(42));
        assert!(!tuple.is_detached());
        assert_eq!(tuple.get(1).unwrap(), &Value::Text("ada".into()));
        assert_eq!(tuple.get(2).unwrap(), &Value::Null);
        assert!(tuple.is_detached());

        // cached, not re-decoded
        assert_eq!(tuple.get(0).unwrap(), &Value::Int(42));
    }

    #[test]
    fn survives_buffer_clear() {
        let mut buffer = buffer();
        let mut tuple = buffer.tuple(0).unwrap();
        buffer.clear();

        assert_eq!(tuple.get_by_name("name").unwrap(), &Value::Text("ada".into()));
        tuple.materialize_all().unwrap();
        assert!(tuple.is_detached());
        assert_eq!(tuple.get(0).unwrap(), &Value::Int(42));
    }

    #[test]
    fn name_and_bounds() {
        let mut tuple = buffer().tuple(0).unwrap();
        assert_eq!(tuple.len(), 3);
        assert_eq!(tuple.field_name(1), Some("name"));
        assert!(matches!(
            tuple.get(9).unwrap_err(),
            crate::Error::ColumnNotFound(_),
        ));
        assert!(matches!(
            tuple.get_by_name("missing").unwrap_err(),
            crate::Error::ColumnNotFound(_),
        ));
    }

    #[test]
    fn empty_row_detaches_immediately() {
        let buffer = ResultBuffer::new(vec![], vec![vec![]], Arc::new(AllStrings::new()))
            .unwrap();
        let tuple = buffer.tuple(0).unwrap();
        assert!(tuple.is_detached());
        assert!(tuple.is_empty());
    }
}
