//! Query result buffer.
//!
//! - [`ResultBuffer`]
//! - [`ColumnDesc`]
//! - [`Fields`]
//! - [`RowMaps`]
//!
//! A [`ResultBuffer`] owns the raw wire-format rows of one statement
//! execution and routes per-cell access through its bound
//! [`TypeMap`][crate::typemap::TypeMap] to produce application values on
//! demand.
use std::{cell::OnceCell, collections::HashMap, sync::Arc};

use bytes::Bytes;

use crate::{
    common::{ByteStr, verbose},
    error::{BufferCleared, ColumnNotFound, MalformedLiteral, Result, RowNotFound},
    ext::FmtExt,
    postgres::{Oid, PgFormat},
    tuple::Tuple,
    typemap::{TypeMap, resolve_codec},
    value::Value,
};

/// One row of raw cells, `None` for NULL.
pub type RawRow = Vec<Option<Bytes>>;

/// One column description from a `RowDescription` message.
#[derive(Debug, Clone)]
pub struct ColumnDesc {
    name: ByteStr,
    oid: Oid,
    format: PgFormat,
}

impl ColumnDesc {
    pub fn new(name: ByteStr, oid: Oid, format: PgFormat) -> Self {
        Self { name, oid, format }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn oid(&self) -> Oid {
        self.oid
    }

    pub const fn format(&self) -> PgFormat {
        self.format
    }
}

/// Column-name index, built once on first name-based access.
///
/// Duplicate column names collapse to the first occurrence in the map;
/// the ordered name array is only carried when duplicates exist, so
/// positional name lookup stays possible.
pub enum Fields {
    Unique(HashMap<ByteStr, usize>),
    WithDuplicates(HashMap<ByteStr, usize>, Vec<ByteStr>),
}

impl Fields {
    fn build(columns: &[ColumnDesc]) -> Fields {
        let mut map = HashMap::with_capacity(columns.len());
        let mut duplicates = false;
        for (index, column) in columns.iter().enumerate() {
            if map.contains_key(column.name()) {
                duplicates = true;
            } else {
                map.insert(column.name.clone(), index);
            }
        }
        match duplicates {
            false => Fields::Unique(map),
            true => {
                let names = columns.iter().map(|c| c.name.clone()).collect();
                Fields::WithDuplicates(map, names)
            }
        }
    }

    /// Index of the first column named `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        match self {
            Fields::Unique(map) | Fields::WithDuplicates(map, _) => map.get(name).copied(),
        }
    }

    /// Name of the column at `index`, regardless of duplicates.
    pub fn name_at(&self, index: usize) -> Option<&ByteStr> {
        match self {
            Fields::Unique(map) => map.iter().find(|(_, i)| **i == index).map(|(name, _)| name),
            Fields::WithDuplicates(_, names) => names.get(index),
        }
    }
}

/// The owner of one query result's raw wire-format row data.
///
/// Once [`clear`][ResultBuffer::clear]ed, every cell access fails with
/// [`BufferCleared`]; stale data is never silently returned.
pub struct ResultBuffer {
    columns: Arc<[ColumnDesc]>,
    fields: OnceCell<Arc<Fields>>,
    type_map: Arc<dyn TypeMap>,
    rows: Option<Vec<RawRow>>,
    row_count: usize,
    size_estimate: usize,
    autoclear: bool,
}

impl ResultBuffer {
    /// Bind raw rows to a type map.
    ///
    /// The map's `fit_to_result` runs here, before any per-cell work;
    /// an unsuitable map aborts the whole binding.
    pub fn new(
        columns: Vec<ColumnDesc>,
        rows: Vec<RawRow>,
        type_map: Arc<dyn TypeMap>,
    ) -> Result<Self> {
        for (nth, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                let reason =
                    format!("row has {} cells, expected {}", row.len(), columns.len());
                return Err(MalformedLiteral::new(reason, nth, 0).into());
            }
        }
        let type_map = match type_map.fit_to_result(&columns)? {
            Some(specialized) => specialized,
            None => type_map,
        };
        let size_estimate = estimate_size(&columns, &rows);
        verbose!(rows = rows.len(), size_estimate, "result buffer bound");
        Ok(Self {
            columns: columns.into(),
            fields: OnceCell::new(),
            type_map,
            row_count: rows.len(),
            rows: Some(rows),
            size_estimate,
            autoclear: false,
        })
    }

    /// Mark this buffer as owned by the engine lifecycle, which clears
    /// it when its scope ends.
    pub fn with_autoclear(mut self) -> Self {
        self.autoclear = true;
        self
    }

    /// Returns `true` if the engine lifecycle owns the clear operation.
    pub const fn autoclear(&self) -> bool {
        self.autoclear
    }

    /// Returns the number of rows.
    pub const fn len(&self) -> usize {
        self.row_count
    }

    /// Returns `true` if the result contains no rows.
    pub const fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    /// Returns the column descriptions.
    pub fn columns(&self) -> &[ColumnDesc] {
        &self.columns
    }

    /// Returns the bound type map.
    pub fn type_map(&self) -> &Arc<dyn TypeMap> {
        &self.type_map
    }

    /// Approximate byte size of the owned wire data, for memory-pressure
    /// accounting only.
    pub const fn size_estimate(&self) -> usize {
        self.size_estimate
    }

    fn cells(&self) -> Result<&[RawRow], BufferCleared> {
        match &self.rows {
            Some(rows) => Ok(rows),
            None => Err(BufferCleared),
        }
    }

    /// Raw bytes of cell (`row`, `col`), `None` for NULL.
    pub fn raw(&self, row: usize, col: usize) -> Result<Option<&[u8]>> {
        let rows = self.cells()?;
        let cells = rows.get(row).ok_or(RowNotFound)?;
        let cell = cells.get(col).ok_or_else(|| ColumnNotFound::index(col))?;
        Ok(cell.as_deref())
    }

    /// Decode cell (`row`, `col`) through the resolved codec.
    pub fn get(&self, row: usize, col: usize) -> Result<Value> {
        match self.raw(row, col)? {
            None => Ok(Value::Null),
            Some(raw) => {
                let format = self.columns[col].format();
                let codec = resolve_codec(&*self.type_map, col, None, format);
                codec.decode(raw, row, col)
            }
        }
    }

    /// Decode cell (`row`, `name`) through the resolved codec.
    pub fn get_by_name(&self, row: usize, name: &str) -> Result<Value> {
        match self.column_index(name) {
            Some(col) => self.get(row, col),
            None => Err(ColumnNotFound::name(name).into()),
        }
    }

    /// The column-name index, built on first use.
    pub fn fields(&self) -> &Arc<Fields> {
        self.fields.get_or_init(|| Arc::new(Fields::build(&self.columns)))
    }

    /// Index of the first column named `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.fields().index_of(name)
    }

    /// Release the raw storage and poison the buffer.
    ///
    /// Idempotent: engine-owned (`autoclear`) buffers may be cleared
    /// again by the engine lifecycle without effect.
    pub fn clear(&mut self) {
        if self.rows.take().is_some() {
            verbose!(rows = self.row_count, "result buffer cleared");
        }
    }

    /// Returns `true` once [`clear`][ResultBuffer::clear]ed.
    pub const fn is_cleared(&self) -> bool {
        self.rows.is_none()
    }

    /// A lazy per-column view of one row.
    ///
    /// The tuple snapshots the row's raw cells, so it stays valid while
    /// the buffer advances or clears underneath it.
    pub fn tuple(&self, row: usize) -> Result<Tuple> {
        let rows = self.cells()?;
        let cells = rows.get(row).ok_or(RowNotFound)?;
        Ok(Tuple::new(
            Arc::clone(self.fields()),
            Arc::clone(&self.columns),
            Arc::clone(&self.type_map),
            row,
            cells.clone(),
        ))
    }

    /// Convert rows to maps through one reused scratch map.
    ///
    /// The fast path for bulk conversion; each yielded map is
    /// overwritten by the following call. Use
    /// [`row_as_map`][ResultBuffer::row_as_map] for a map the caller
    /// keeps.
    pub fn row_maps(&self) -> RowMaps<'_> {
        RowMaps { buffer: self, row: 0, scratch: HashMap::with_capacity(self.columns.len()) }
    }

    /// An owned, independent map of one row.
    pub fn row_as_map(&self, row: usize) -> Result<HashMap<ByteStr, Value>> {
        let mut map = HashMap::with_capacity(self.columns.len());
        self.fill_map(row, &mut map)?;
        Ok(map)
    }

    fn fill_map(&self, row: usize, map: &mut HashMap<ByteStr, Value>) -> Result<()> {
        for (col, desc) in self.columns.iter().enumerate() {
            // first occurrence wins when names repeat
            if !map.contains_key(desc.name()) {
                map.insert(desc.name.clone(), self.get(row, col)?);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for ResultBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut dbg = f.debug_struct("ResultBuffer");
        dbg.field("columns", &self.columns.len())
            .field("rows", &self.row_count)
            .field("size_estimate", &self.size_estimate)
            .field("cleared", &self.is_cleared());
        if let Some(rows) = &self.rows {
            if let Some(first) = rows.first() {
                let cells: Vec<_> =
                    first.iter().map(|c| c.as_deref().map(|b| b.lossy().to_string())).collect();
                dbg.field("first_row", &cells);
            }
        }
        dbg.finish()
    }
}

/// See [`ResultBuffer::row_maps`].
pub struct RowMaps<'a> {
    buffer: &'a ResultBuffer,
    row: usize,
    scratch: HashMap<ByteStr, Value>,
}

impl RowMaps<'_> {
    /// Advance to the next row.
    ///
    /// The returned map is a shared scratch overwritten by the next
    /// call; deep-copy it before retaining.
    pub fn next_map(&mut self) -> Result<Option<&HashMap<ByteStr, Value>>> {
        if self.row == self.buffer.len() {
            return Ok(None);
        }
        self.scratch.clear();
        self.buffer.fill_map(self.row, &mut self.scratch)?;
        self.row += 1;
        Ok(Some(&self.scratch))
    }
}

/// Sample-based cell count, bounding the work on huge results.
const SAMPLE_LIMIT: usize = 128;

fn estimate_size(columns: &[ColumnDesc], rows: &[RawRow]) -> usize {
    let base = size_of::<ResultBuffer>()
        + columns
            .iter()
            .map(|c| size_of::<ColumnDesc>() + c.name().len())
            .sum::<usize>();
    let per_row = size_of::<RawRow>() + columns.len() * size_of::<Option<Bytes>>();

    let data = |row: &RawRow| {
        row.iter().map(|cell| cell.as_deref().map_or(0, <[u8]>::len)).sum::<usize>()
    };

    if rows.len() <= SAMPLE_LIMIT {
        base + rows.iter().map(|row| per_row + data(row)).sum::<usize>()
    } else {
        let stride = rows.len().div_ceil(SAMPLE_LIMIT);
        let mut sampled = 0usize;
        let mut sampled_data = 0usize;
        for row in rows.iter().step_by(stride) {
            sampled += 1;
            sampled_data += data(row);
        }
        base + rows.len() * per_row + sampled_data * rows.len() / sampled.max(1)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::codec::Int4;
    use crate::typemap::{AllStrings, ByColumn};

    fn desc(name: &'static str) -> ColumnDesc {
        ColumnDesc::new(ByteStr::from_static(name), 0, PgFormat::Text)
    }

    fn cell(text: &'static str) -> Option<Bytes> {
        Some(Bytes::from_static(text.as_bytes()))
    }

    fn sample() -> ResultBuffer {
        ResultBuffer::new(
            vec![desc("id"), desc("name")],
            vec![
                vec![cell("1"), cell("ada")],
                vec![cell("2"), None],
            ],
            Arc::new(AllStrings::new()),
        )
        .unwrap()
    }

    #[test]
    fn cell_access() {
        let buffer = sample();
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.get(0, 1).unwrap(), Value::Text("ada".into()));
        assert_eq!(buffer.get(1, 1).unwrap(), Value::Null);
        assert_eq!(buffer.get_by_name(1, "id").unwrap(), Value::Text("2".into()));
        assert!(matches!(
            buffer.get_by_name(0, "nope").unwrap_err(),
            crate::Error::ColumnNotFound(_),
        ));
    }

    #[test]
    fn by_column_binding_decodes() {
        let map = ByColumn::new(vec![Some(Arc::new(Int4::text()) as _), None]);
        let buffer = ResultBuffer::new(
            vec![desc("id"), desc("name")],
            vec![vec![cell("7"), cell("grace")]],
            Arc::new(map),
        )
        .unwrap();
        assert_eq!(buffer.get(0, 0).unwrap(), Value::Int(7));
        assert_eq!(buffer.get(0, 1).unwrap(), Value::Text("grace".into()));
    }

    #[test]
    fn unsuitable_binding_aborts_early() {
        let map = ByColumn::new(vec![None, None]);
        let err = ResultBuffer::new(
            vec![desc("a"), desc("b"), desc("c")],
            vec![],
            Arc::new(map),
        )
        .unwrap_err();
        assert!(err.is_unsuitable());
    }

    #[test]
    fn cleared_access_fails_loudly() {
        let mut buffer = sample();
        buffer.clear();
        assert!(buffer.is_cleared());
        assert!(matches!(buffer.get(0, 0).unwrap_err(), crate::Error::Cleared(_)));
        assert!(matches!(buffer.tuple(0).unwrap_err(), crate::Error::Cleared(_)));
        // idempotent
        buffer.clear();
    }

    #[test]
    fn duplicate_names_first_wins() {
        let buffer = ResultBuffer::new(
            vec![desc("x"), desc("x"), desc("y")],
            vec![vec![cell("first"), cell("second"), cell("other")]],
            Arc::new(AllStrings::new()),
        )
        .unwrap();
        assert_eq!(buffer.column_index("x"), Some(0));
        assert!(matches!(&**buffer.fields(), Fields::WithDuplicates(..)));
        assert_eq!(buffer.fields().name_at(1).unwrap(), "x");

        let map = buffer.row_as_map(0).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("x"), Some(&Value::Text("first".into())));
    }

    #[test]
    fn row_maps_reuses_scratch() {
        let buffer = sample();
        let mut maps = buffer.row_maps();

        let first = maps.next_map().unwrap().unwrap();
        assert_eq!(first.get("name"), Some(&Value::Text("ada".into())));

        let second = maps.next_map().unwrap().unwrap();
        assert_eq!(second.get("name"), Some(&Value::Null));
        assert!(maps.next_map().unwrap().is_none());
    }

    #[test]
    fn size_estimate_tracks_data() {
        let small = sample().size_estimate();
        assert!(small > 0);

        let rows: Vec<RawRow> =
            (0..10_000).map(|_| vec![cell("12345678"), cell("abcdefgh")]).collect();
        let big = ResultBuffer::new(
            vec![desc("id"), desc("name")],
            rows,
            Arc::new(AllStrings::new()),
        )
        .unwrap();
        assert!(big.size_estimate() > 10_000 * 16);
    }

    #[test]
    fn row_width_validated() {
        let err = ResultBuffer::new(
            vec![desc("a"), desc("b")],
            vec![vec![cell("only-one")]],
            Arc::new(AllStrings::new()),
        )
        .unwrap_err();
        assert!(err.is_malformed());
    }
}
