//! Onyxia service catalog explorer
//!
//! Fetches the catalogs of deployable charts, keeps track of the selected
//! catalog and runs debounced full-text searches across every visible
//! catalog, reporting the matched characters for highlighting.

pub mod background;
pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod ports;
pub mod search;
pub mod selectors;
pub mod state;

pub use commands::{CatalogExplorer, UserConfigKey, UserConfigs, UserConfigsManager};
pub use config::SearchSettings;
pub use error::{Error, Result};
pub use models::{Catalog, CatalogsAndCharts, Chart, ChartsByCatalogId, DisplayedChart, SearchResult};
pub use search::get_match_positions;
pub use state::{CatalogAction, CatalogState, CatalogStore};
