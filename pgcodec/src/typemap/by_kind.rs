use std::sync::Arc;

use crate::{
    codec::Codec,
    error::{Result, TypeMapUnsuitable},
    result::ColumnDesc,
    value::{Value, ValueKind},
};

use super::TypeMap;

/// A registered per-kind resolver, consulted with the concrete value.
pub type KindResolver = fn(&Value) -> Option<Arc<dyn Codec>>;

enum Entry {
    Codec(Arc<dyn Codec>),
    Resolver(KindResolver),
}

/// Dispatch on the dynamic kind of the value being encoded.
///
/// A fixed lookup table indexed by the closed set of [`ValueKind`]s maps
/// each kind to a codec or to a resolver function. This strategy is
/// encode-only: fitting it to a result or a COPY stream delegates to the
/// fallback map, or fails.
pub struct ByValueKind {
    entries: [Option<Entry>; ValueKind::COUNT],
    default_type_map: Option<Arc<dyn TypeMap>>,
}

impl ByValueKind {
    pub fn new() -> Self {
        Self { entries: std::array::from_fn(|_| None), default_type_map: None }
    }

    /// Map every value of `kind` to `codec`.
    pub fn set(mut self, kind: ValueKind, codec: Arc<dyn Codec>) -> Self {
        self.entries[kind.index()] = Some(Entry::Codec(codec));
        self
    }

    /// Map every value of `kind` through a resolver function.
    pub fn set_resolver(mut self, kind: ValueKind, resolver: KindResolver) -> Self {
        self.entries[kind.index()] = Some(Entry::Resolver(resolver));
        self
    }

    /// Set the shared fallback map.
    pub fn with_default(mut self, map: Arc<dyn TypeMap>) -> Self {
        self.default_type_map = Some(map);
        self
    }
}

impl Default for ByValueKind {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeMap for ByValueKind {
    fn fit_to_result(&self, columns: &[ColumnDesc]) -> Result<Option<Arc<dyn TypeMap>>> {
        match &self.default_type_map {
            Some(fallback) => fallback.fit_to_result(columns),
            None => Err(TypeMapUnsuitable::new(
                "value-kind dispatch is only suitable for query parameters",
            )
            .into()),
        }
    }

    fn fit_to_query(&self, _params: &[Value]) -> Result<()> {
        Ok(())
    }

    fn fit_to_copy(&self, _columns: usize) -> Result<()> {
        Err(TypeMapUnsuitable::new(
            "value-kind dispatch is only suitable for query parameters",
        )
        .into())
    }

    fn resolve(&self, _position: usize, value: Option<&Value>) -> Option<Arc<dyn Codec>> {
        match self.entries[value?.kind().index()].as_ref()? {
            Entry::Codec(codec) => Some(Arc::clone(codec)),
            Entry::Resolver(resolver) => resolver(value?),
        }
    }

    fn default_type_map(&self) -> Option<&Arc<dyn TypeMap>> {
        self.default_type_map.as_ref()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::codec::{Int4, Int8, PgString};
    use crate::typemap::resolve_codec;
    use crate::postgres::PgFormat;

    #[test]
    fn dispatches_on_kind() {
        let map = ByValueKind::new()
            .set(ValueKind::Int, Arc::new(Int4::binary()))
            .set(ValueKind::Text, Arc::new(PgString::text()));

        let int = Value::Int(1);
        let text = Value::Text("x".into());
        assert_eq!(resolve_codec(&map, 0, Some(&int), PgFormat::Text).name(), "int4");
        assert_eq!(resolve_codec(&map, 3, Some(&text), PgFormat::Text).name(), "text");
        // unknown kind falls through to the builtin
        let float = Value::Float(1.5);
        assert_eq!(resolve_codec(&map, 0, Some(&float), PgFormat::Text).name(), "text");
    }

    #[test]
    fn resolver_function() {
        fn pick(value: &Value) -> Option<Arc<dyn Codec>> {
            match value {
                Value::Int(i) if i32::try_from(*i).is_ok() => Some(Arc::new(Int4::binary())),
                Value::Int(_) => Some(Arc::new(Int8::binary())),
                _ => None,
            }
        }
        let map = ByValueKind::new().set_resolver(ValueKind::Int, pick);

        let small = Value::Int(7);
        let big = Value::Int(i64::MAX);
        assert_eq!(resolve_codec(&map, 0, Some(&small), PgFormat::Text).name(), "int4");
        assert_eq!(resolve_codec(&map, 0, Some(&big), PgFormat::Text).name(), "int8");
    }

    #[test]
    fn copy_stream_unsupported() {
        let map = ByValueKind::new();
        assert!(map.fit_to_copy(2).unwrap_err().is_unsuitable());
    }
}
