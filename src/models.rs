use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Charts of every catalog, keyed by catalog id, in declaration order
pub type ChartsByCatalogId = FxHashMap<String, Vec<Chart>>;

/// A named grouping of charts
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub id: String,
    /// Hidden catalogs are never selected by default and never indexed
    pub is_hidden: bool,
}

/// Summary of a chart, built from its default version
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Chart {
    pub name: String,
    pub description: String,
    pub icon_url: Option<String>,
    pub project_homepage_url: Option<String>,
}

/// One published version of a chart, as returned by the data source
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChartVersion {
    pub version: String,
    pub description: Option<String>,
    pub icon_url: Option<String>,
    pub project_homepage_url: Option<String>,
}

/// A chart with every published version
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RawChart {
    pub name: String,
    pub versions: Vec<ChartVersion>,
}

/// Payload of the data source
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct CatalogsAndCharts {
    pub catalogs: Vec<Catalog>,
    pub charts_by_catalog_id: FxHashMap<String, Vec<RawChart>>,
}

/// Search hit with highlight masks for rendering
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub catalog_id: String,
    pub chart_name: String,
    /// Char offsets into the chart name
    pub chart_name_highlighted_indexes: Vec<usize>,
    /// Char offsets into the chart description
    pub chart_description_highlighted_indexes: Vec<usize>,
}

/// Chart as displayed in the catalog explorer grid
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DisplayedChart {
    pub catalog_id: String,
    pub chart: Chart,
    pub chart_name_highlighted_indexes: Vec<usize>,
    pub chart_description_highlighted_indexes: Vec<usize>,
}
