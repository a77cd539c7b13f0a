//! Catalog explorer state management
//!
//! Central state of the catalog explorer:
//! - Catalog and chart dataset lifecycle (not fetched, fetching, ready)
//! - Selected catalog
//! - Current search and its results
//!
//! State only changes by dispatching a [`CatalogAction`] to the
//! [`CatalogStore`], which applies it and then broadcasts it to subscribers.

use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;

use crate::models::{Catalog, ChartsByCatalogId, SearchResult};

/// Capacity of the action broadcast channel
const EVENT_BUS_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum CatalogState {
    NotFetched { is_fetching: bool },
    Ready(ReadyState),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadyState {
    pub catalogs: Arc<Vec<Catalog>>,
    pub charts_by_catalog_id: Arc<ChartsByCatalogId>,
    pub selected_catalog_id: String,
    search: String,
    search_results: Option<Vec<SearchResult>>,
}

impl ReadyState {
    pub fn new(
        catalogs: Arc<Vec<Catalog>>,
        charts_by_catalog_id: Arc<ChartsByCatalogId>,
        selected_catalog_id: String,
    ) -> Self {
        Self {
            catalogs,
            charts_by_catalog_id,
            selected_catalog_id,
            search: String::new(),
            search_results: None,
        }
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    /// Results of the active search, `None` when no search is active
    pub fn search_results(&self) -> Option<&[SearchResult]> {
        self.search_results.as_deref()
    }
}

impl Default for CatalogState {
    fn default() -> Self {
        CatalogState::NotFetched { is_fetching: false }
    }
}

impl CatalogState {
    pub fn is_ready(&self) -> bool {
        matches!(self, CatalogState::Ready(_))
    }

    pub fn as_ready(&self) -> Option<&ReadyState> {
        match self {
            CatalogState::Ready(ready) => Some(ready),
            CatalogState::NotFetched { .. } => None,
        }
    }

    /// Apply an action, returning false when it does not fit the current state
    pub fn apply(&mut self, action: &CatalogAction) -> bool {
        if let CatalogAction::CatalogsFetched {
            catalogs,
            charts_by_catalog_id,
            selected_catalog_id,
        } = action
        {
            if self.is_ready() {
                return false;
            }
            *self = CatalogState::Ready(ReadyState::new(
                Arc::clone(catalogs),
                Arc::clone(charts_by_catalog_id),
                selected_catalog_id.clone(),
            ));
            return true;
        }

        match (self, action) {
            (CatalogState::NotFetched { is_fetching }, CatalogAction::CatalogsFetching) => {
                if *is_fetching {
                    return false;
                }
                *is_fetching = true;
                true
            }
            (CatalogState::NotFetched { is_fetching }, CatalogAction::CatalogsFetchFailed) => {
                *is_fetching = false;
                true
            }
            (CatalogState::Ready(ready), CatalogAction::DefaultCatalogSelected) => {
                match default_catalog_id(&ready.catalogs) {
                    Some(id) => {
                        ready.selected_catalog_id = id.to_string();
                        true
                    }
                    None => false,
                }
            }
            (CatalogState::Ready(ready), CatalogAction::SelectedCatalogChanged { selected_catalog_id }) => {
                ready.selected_catalog_id = selected_catalog_id.clone();
                true
            }
            (CatalogState::Ready(ready), CatalogAction::SearchChanged { search }) => {
                ready.search = search.clone();
                if search.is_empty() {
                    ready.search_results = None;
                }
                true
            }
            (CatalogState::Ready(ready), CatalogAction::SearchResultsChanged { search_results }) => {
                // Results only exist alongside a non-empty search
                if search_results.is_some() && ready.search.is_empty() {
                    return false;
                }
                ready.search_results = search_results.clone();
                true
            }
            _ => false,
        }
    }
}

/// First non-hidden catalog in declaration order
pub fn default_catalog_id(catalogs: &[Catalog]) -> Option<&str> {
    catalogs
        .iter()
        .find(|catalog| !catalog.is_hidden)
        .map(|catalog| catalog.id.as_str())
}

/// State transitions, also published on the event bus
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogAction {
    CatalogsFetching,
    CatalogsFetchFailed,
    CatalogsFetched {
        catalogs: Arc<Vec<Catalog>>,
        charts_by_catalog_id: Arc<ChartsByCatalogId>,
        selected_catalog_id: String,
    },
    DefaultCatalogSelected,
    SelectedCatalogChanged { selected_catalog_id: String },
    SearchChanged { search: String },
    SearchResultsChanged { search_results: Option<Vec<SearchResult>> },
}

impl CatalogAction {
    pub fn name(&self) -> &'static str {
        match self {
            CatalogAction::CatalogsFetching => "catalogsFetching",
            CatalogAction::CatalogsFetchFailed => "catalogsFetchFailed",
            CatalogAction::CatalogsFetched { .. } => "catalogsFetched",
            CatalogAction::DefaultCatalogSelected => "defaultCatalogSelected",
            CatalogAction::SelectedCatalogChanged { .. } => "selectedCatalogChanged",
            CatalogAction::SearchChanged { .. } => "searchChanged",
            CatalogAction::SearchResultsChanged { .. } => "searchResultsChanged",
        }
    }
}

/// Owner of the catalog state and its action bus
pub struct CatalogStore {
    state: RwLock<CatalogState>,
    events: broadcast::Sender<CatalogAction>,
}

impl Default for CatalogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self {
            state: RwLock::new(CatalogState::default()),
            events,
        }
    }

    /// Snapshot of the current state
    pub fn state(&self) -> CatalogState {
        self.read(Clone::clone)
    }

    /// Run `f` against the current state without cloning it
    pub fn read<T>(&self, f: impl FnOnce(&CatalogState) -> T) -> T {
        let state = self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&state)
    }

    /// Apply an action and publish it if it changed the state
    pub fn dispatch(&self, action: CatalogAction) -> bool {
        let mut state = self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner());

        if !state.apply(&action) {
            log::debug!("Ignored action {} in current state", action.name());
            return false;
        }

        log::debug!("Dispatched {}", action.name());
        // Published under the lock so subscribers see actions in state order.
        // No subscriber is fine.
        let _ = self.events.send(action);
        true
    }

    /// Subscribe to actions dispatched from now on
    pub fn subscribe(&self) -> broadcast::Receiver<CatalogAction> {
        self.events.subscribe()
    }
}
