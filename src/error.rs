use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to fetch catalogs: {0}")]
    Fetch(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Search index error: {0}")]
    Index(#[from] tantivy::TantivyError),

    #[error("Invariant violated: {0}")]
    Invariant(String),

    #[error("Unknown catalog: {0}")]
    UnknownCatalog(String),

    #[error("Chart {catalog_id}/{chart_name} has no version {version}")]
    MissingDefaultVersion {
        catalog_id: String,
        chart_name: String,
        version: String,
    },

    #[error("Secret store error: {0}")]
    SecretStore(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Event bus closed")]
    EventBusClosed,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Log and build an invariant violation
    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        let message = message.into();
        log::error!("Invariant violated: {}", message);
        Error::Invariant(message)
    }
}
