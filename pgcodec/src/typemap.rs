//! Codec selection strategies.
//!
//! - [`TypeMap`]
//! - [`AllStrings`]
//! - [`ByColumn`]
//! - [`ByValueKind`]
//!
//! A [`TypeMap`] resolves which [`Codec`] applies to a given column or
//! parameter position. Every strategy can carry a shared fallback map,
//! consulted whenever the strategy cannot resolve a position itself; a
//! chain that resolves nothing falls back to the built-in plain string
//! codec (or opaque bytes for binary columns), so resolution never fails.
use std::sync::{Arc, LazyLock};

use crate::{
    codec::{Codec, PgString, RawBytes},
    error::Result,
    postgres::PgFormat,
    result::ColumnDesc,
    value::Value,
};

mod all_strings;
mod by_column;
mod by_kind;

pub use all_strings::AllStrings;
pub use by_column::ByColumn;
pub use by_kind::{ByValueKind, KindResolver};

/// A strategy that resolves which [`Codec`] applies to a column or
/// parameter position.
///
/// Resolution must be deterministic for a fixed shape: within one bound
/// result or parameter list, the same position resolves to the same
/// codec on every call.
pub trait TypeMap: Send + Sync {
    /// Validate this map against a result shape.
    ///
    /// Returns a specialized copy when the map (or its fallback) had to
    /// derive one for this shape, `None` to keep using `self`. Failing
    /// here aborts the whole binding before any per-cell work.
    fn fit_to_result(&self, columns: &[ColumnDesc]) -> Result<Option<Arc<dyn TypeMap>>>;

    /// Validate this map against an outgoing parameter list.
    fn fit_to_query(&self, params: &[Value]) -> Result<()>;

    /// Validate this map against a COPY stream of `columns` columns.
    fn fit_to_copy(&self, columns: usize) -> Result<()>;

    /// Resolve the codec for a position, `None` meaning delegate to
    /// [`default_type_map`][TypeMap::default_type_map].
    ///
    /// `value` carries the value being encoded for strategies that
    /// dispatch on its dynamic kind; it is `None` on the decode side.
    fn resolve(&self, position: usize, value: Option<&Value>) -> Option<Arc<dyn Codec>>;

    /// The shared fallback map, when one is configured.
    fn default_type_map(&self) -> Option<&Arc<dyn TypeMap>> {
        None
    }
}

static TEXT_FALLBACK: LazyLock<Arc<dyn Codec>> = LazyLock::new(|| Arc::new(PgString::text()));
static BINARY_FALLBACK: LazyLock<Arc<dyn Codec>> = LazyLock::new(|| Arc::new(RawBytes));

/// Walk the fallback chain for a position; never fails.
///
/// `format` selects the last-resort codec: plain string for text,
/// opaque bytes for binary.
pub fn resolve_codec(
    map: &dyn TypeMap,
    position: usize,
    value: Option<&Value>,
    format: PgFormat,
) -> Arc<dyn Codec> {
    let mut current = map;
    loop {
        if let Some(codec) = current.resolve(position, value) {
            return codec;
        }
        match current.default_type_map() {
            Some(next) => current = &**next,
            None => break,
        }
    }
    match format {
        PgFormat::Text => Arc::clone(&TEXT_FALLBACK),
        PgFormat::Binary => Arc::clone(&BINARY_FALLBACK),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::codec::{Int4, Int8};
    use crate::common::ByteStr;

    fn desc(name: &'static str) -> ColumnDesc {
        ColumnDesc::new(ByteStr::from_static(name), 0, PgFormat::Text)
    }

    #[test]
    fn by_column_determinism() {
        let map = ByColumn::new(vec![Some(Arc::new(Int4::binary()) as _), None]);
        let columns = [desc("a"), desc("b")];
        assert!(map.fit_to_result(&columns).unwrap().is_none());

        let first = resolve_codec(&map, 0, None, PgFormat::Text);
        let again = resolve_codec(&map, 0, None, PgFormat::Text);
        assert!(Arc::ptr_eq(&first, &again));
    }

    #[test]
    fn by_column_count_mismatch() {
        let map = ByColumn::new(vec![None, None]);
        let columns = [desc("a"), desc("b"), desc("c")];
        assert!(matches!(map.fit_to_result(&columns), Err(e) if e.is_unsuitable()));

        let err = map.fit_to_query(&[Value::Int(1)]).unwrap_err();
        assert!(err.is_unsuitable());
    }

    #[test]
    fn none_slot_delegates_to_default() {
        let fallback: Arc<dyn TypeMap> =
            Arc::new(ByColumn::new(vec![Some(Arc::new(Int8::text()) as _)]));
        let map = ByColumn::new(vec![None]).with_default(fallback);
        let codec = resolve_codec(&map, 0, None, PgFormat::Text);
        assert_eq!(codec.name(), "int8");
    }

    #[test]
    fn empty_chain_falls_back_to_builtin() {
        let map = AllStrings::new();
        // AllStrings always resolves, so test with an empty ByColumn slot
        let map2 = ByColumn::new(vec![None]);
        assert_eq!(resolve_codec(&map2, 0, None, PgFormat::Text).name(), "text");
        assert_eq!(resolve_codec(&map2, 0, None, PgFormat::Binary).name(), "raw");
        assert_eq!(resolve_codec(&map, 0, None, PgFormat::Text).name(), "text");
    }
}
