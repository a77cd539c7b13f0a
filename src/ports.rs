//! External collaborators
//!
//! The catalog explorer and user configs talk to the outside world only
//! through these traits, so hosts and tests can plug in their own.

use std::future::Future;

use serde_json::Value;

use crate::error::Result;
use crate::models::{CatalogsAndCharts, RawChart};

/// Backend the catalogs and charts are fetched from
pub trait CatalogSource {
    fn fetch_catalogs_and_charts(&self) -> impl Future<Output = Result<CatalogsAndCharts>> + Send;
}

/// Picks the version of a chart that is shown by default
pub trait VersionResolver {
    fn default_version(&self, chart: &RawChart) -> Option<String>;
}

/// First listed version without a pre-release suffix, else the first listed version
#[derive(Debug, Default, Clone, Copy)]
pub struct LatestStableVersion;

impl VersionResolver for LatestStableVersion {
    fn default_version(&self, chart: &RawChart) -> Option<String> {
        chart
            .versions
            .iter()
            .find(|v| !v.version.contains('-'))
            .or_else(|| chart.versions.first())
            .map(|v| v.version.clone())
    }
}

/// Key/secret store holding per-user values
pub trait SecretStore {
    /// `Ok(None)` when nothing is stored at `path`
    fn get(&self, path: &str) -> impl Future<Output = Result<Option<Value>>> + Send;

    fn put(&self, path: &str, value: Value) -> impl Future<Output = Result<()>> + Send;
}
