use std::sync::Arc;

use crate::{
    codec::{Codec, PgString},
    error::Result,
    result::ColumnDesc,
    value::Value,
};

use super::TypeMap;

/// The simplest strategy: every position is the plain string codec,
/// regardless of shape. Suitable for results, query parameters and COPY
/// streams alike.
pub struct AllStrings {
    codec: Arc<dyn Codec>,
}

impl AllStrings {
    pub fn new() -> Self {
        Self { codec: Arc::new(PgString::text()) }
    }
}

impl Default for AllStrings {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeMap for AllStrings {
    fn fit_to_result(&self, _columns: &[ColumnDesc]) -> Result<Option<Arc<dyn TypeMap>>> {
        Ok(None)
    }

    fn fit_to_query(&self, _params: &[Value]) -> Result<()> {
        Ok(())
    }

    fn fit_to_copy(&self, _columns: usize) -> Result<()> {
        Ok(())
    }

    fn resolve(&self, _position: usize, _value: Option<&Value>) -> Option<Arc<dyn Codec>> {
        Some(Arc::clone(&self.codec))
    }
}
