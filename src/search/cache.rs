use std::sync::{Arc, Mutex};

use super::ChartSearchIndex;
use crate::config::SearchSettings;
use crate::error::Result;
use crate::models::{Catalog, ChartsByCatalogId};

/// Holds the index of the last dataset it was asked about
///
/// Reuse is keyed on container identity, not content: a refreshed dataset
/// must come in new `Arc`s to trigger a rebuild.
pub struct SearchIndexCache {
    settings: SearchSettings,
    slot: Mutex<Option<Arc<ChartSearchIndex>>>,
}

impl SearchIndexCache {
    pub fn new(settings: SearchSettings) -> Self {
        Self {
            settings,
            slot: Mutex::new(None),
        }
    }

    /// Get the cached index for this dataset or build (and cache) a new one
    pub fn get_or_build(
        &self,
        catalogs: &Arc<Vec<Catalog>>,
        charts_by_catalog_id: &Arc<ChartsByCatalogId>,
    ) -> Result<Arc<ChartSearchIndex>> {
        let mut slot = self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(index) = slot.as_ref() {
            if index.is_built_from(catalogs, charts_by_catalog_id) {
                log::debug!("Reusing chart search index");
                return Ok(Arc::clone(index));
            }
        }

        let index = Arc::new(ChartSearchIndex::build(
            Arc::clone(catalogs),
            Arc::clone(charts_by_catalog_id),
            &self.settings,
        )?);
        *slot = Some(Arc::clone(&index));
        Ok(index)
    }
}
