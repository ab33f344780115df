use std::sync::Arc;

use crate::{
    codec::Codec,
    error::{Result, TypeMapUnsuitable},
    result::ColumnDesc,
    value::Value,
};

use super::TypeMap;

/// A fixed ordered list of codec-or-none, one per column or parameter
/// position.
///
/// The list length must equal the column/parameter count at bind time.
/// A `None` slot always delegates to the default map, never silently
/// falls back to all-strings.
pub struct ByColumn {
    codecs: Vec<Option<Arc<dyn Codec>>>,
    default_type_map: Option<Arc<dyn TypeMap>>,
}

impl ByColumn {
    pub fn new(codecs: Vec<Option<Arc<dyn Codec>>>) -> Self {
        Self { codecs, default_type_map: None }
    }

    /// Set the shared fallback map.
    pub fn with_default(mut self, map: Arc<dyn TypeMap>) -> Self {
        self.default_type_map = Some(map);
        self
    }

    /// Number of positions this map serves.
    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}

impl TypeMap for ByColumn {
    fn fit_to_result(&self, columns: &[ColumnDesc]) -> Result<Option<Arc<dyn TypeMap>>> {
        if columns.len() != self.codecs.len() {
            return Err(TypeMapUnsuitable::columns(self.codecs.len(), columns.len()).into());
        }
        // a fallback that specialized itself forces a derived copy of
        // this map referencing the specialized form
        match &self.default_type_map {
            Some(fallback) => match fallback.fit_to_result(columns)? {
                Some(specialized) => Ok(Some(Arc::new(ByColumn {
                    codecs: self.codecs.clone(),
                    default_type_map: Some(specialized),
                }))),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    fn fit_to_query(&self, params: &[Value]) -> Result<()> {
        if params.len() != self.codecs.len() {
            return Err(TypeMapUnsuitable::params(self.codecs.len(), params.len()).into());
        }
        Ok(())
    }

    fn fit_to_copy(&self, columns: usize) -> Result<()> {
        if columns != self.codecs.len() {
            return Err(TypeMapUnsuitable::columns(self.codecs.len(), columns).into());
        }
        Ok(())
    }

    fn resolve(&self, position: usize, _value: Option<&Value>) -> Option<Arc<dyn Codec>> {
        self.codecs.get(position)?.as_ref().map(Arc::clone)
    }

    fn default_type_map(&self) -> Option<&Arc<dyn TypeMap>> {
        self.default_type_map.as_ref()
    }
}
