//! Use cases driven by the host application
//!
//! Split into submodules by functionality.

mod catalog;
mod user_configs;

pub use catalog::CatalogExplorer;
pub use user_configs::{ConfigEntry, UserConfigKey, UserConfigs, UserConfigsManager};
