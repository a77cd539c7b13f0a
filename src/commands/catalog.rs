use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rustc_hash::FxHashMap;
use tokio::sync::broadcast::error::RecvError;

use crate::background::Debouncer;
use crate::config::SearchSettings;
use crate::error::{Error, Result};
use crate::models::{Catalog, CatalogsAndCharts, Chart, ChartsByCatalogId, RawChart};
use crate::ports::{CatalogSource, LatestStableVersion, VersionResolver};
use crate::search::SearchIndexCache;
use crate::state::{default_catalog_id, CatalogAction, CatalogState, CatalogStore};

/// Catalog browsing and chart search
///
/// Owns the catalog state. The dataset is fetched on the first
/// [`select_catalog`](Self::select_catalog) and never refetched. Searches go
/// through a shared debounce window and an index that is rebuilt only when
/// the dataset containers change.
pub struct CatalogExplorer<S, V = LatestStableVersion> {
    source: S,
    resolver: V,
    store: CatalogStore,
    debouncer: Debouncer,
    index_cache: SearchIndexCache,
    /// Sequence number of the newest search that got past the debounce window
    latest_search: AtomicU64,
}

impl<S: CatalogSource> CatalogExplorer<S> {
    pub fn new(source: S, settings: SearchSettings) -> Self {
        Self::with_resolver(source, LatestStableVersion, settings)
    }
}

impl<S: CatalogSource, V: VersionResolver> CatalogExplorer<S, V> {
    pub fn with_resolver(source: S, resolver: V, settings: SearchSettings) -> Self {
        Self {
            source,
            resolver,
            store: CatalogStore::new(),
            debouncer: Debouncer::new(settings.debounce_delay()),
            index_cache: SearchIndexCache::new(settings),
            latest_search: AtomicU64::new(0),
        }
    }

    /// Snapshot of the current state
    pub fn state(&self) -> CatalogState {
        self.store.state()
    }

    /// The underlying store, for subscribing to actions or custom reads
    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    /// Select a catalog, `None` meaning the default one
    ///
    /// Fetches the dataset first if it has not been fetched. A call made
    /// while that fetch is in flight does nothing.
    pub async fn select_catalog(&self, catalog_id: Option<&str>) -> Result<()> {
        if self.store.read(CatalogState::is_ready) {
            return self.change_selection(catalog_id);
        }

        if !self.store.dispatch(CatalogAction::CatalogsFetching) {
            if self.store.read(CatalogState::is_ready) {
                return self.change_selection(catalog_id);
            }
            log::debug!("Catalogs are already being fetched");
            return Ok(());
        }

        let started = Instant::now();
        let (catalogs, charts_by_catalog_id) = match self.fetch_dataset().await {
            Ok(dataset) => dataset,
            Err(e) => {
                // Leave the door open for a retry
                self.store.dispatch(CatalogAction::CatalogsFetchFailed);
                return Err(e);
            }
        };

        let requested_is_known =
            catalog_id.map(|id| catalogs.iter().any(|catalog| catalog.id == id));

        let selected_catalog_id = match (catalog_id, requested_is_known) {
            (Some(id), Some(true)) => id.to_string(),
            // Unknown ids still get the dataset loaded, on the default catalog
            _ => match default_catalog_id(&catalogs) {
                Some(id) => id.to_string(),
                None => {
                    self.store.dispatch(CatalogAction::CatalogsFetchFailed);
                    return Err(Error::invariant("no visible catalog to select by default"));
                }
            },
        };

        log::info!(
            "Fetched {} catalogs in {:?}",
            catalogs.len(),
            started.elapsed()
        );

        self.store.dispatch(CatalogAction::CatalogsFetched {
            catalogs: Arc::new(catalogs),
            charts_by_catalog_id: Arc::new(charts_by_catalog_id),
            selected_catalog_id,
        });

        match (catalog_id, requested_is_known) {
            (None, _) => {
                self.store.dispatch(CatalogAction::DefaultCatalogSelected);
            }
            (Some(id), Some(false)) => return Err(Error::UnknownCatalog(id.to_string())),
            _ => {}
        }

        Ok(())
    }

    fn change_selection(&self, catalog_id: Option<&str>) -> Result<()> {
        let Some(catalog_id) = catalog_id else {
            let has_default = self.store.read(|state| {
                state
                    .as_ready()
                    .is_some_and(|ready| default_catalog_id(&ready.catalogs).is_some())
            });
            if !has_default {
                return Err(Error::invariant("no visible catalog to select by default"));
            }
            self.store.dispatch(CatalogAction::DefaultCatalogSelected);
            return Ok(());
        };

        let (is_current, is_known) = self.store.read(|state| match state.as_ready() {
            Some(ready) => (
                ready.selected_catalog_id == catalog_id,
                ready.catalogs.iter().any(|catalog| catalog.id == catalog_id),
            ),
            None => (false, false),
        });

        if is_current {
            return Ok(());
        }
        if !is_known {
            return Err(Error::UnknownCatalog(catalog_id.to_string()));
        }

        self.store.dispatch(CatalogAction::SelectedCatalogChanged {
            selected_catalog_id: catalog_id.to_string(),
        });
        Ok(())
    }

    async fn fetch_dataset(&self) -> Result<(Vec<Catalog>, ChartsByCatalogId)> {
        let CatalogsAndCharts {
            catalogs,
            charts_by_catalog_id,
        } = self.source.fetch_catalogs_and_charts().await?;

        let mut summaries = FxHashMap::default();
        for (catalog_id, raw_charts) in charts_by_catalog_id {
            let charts = raw_charts
                .iter()
                .map(|raw| self.summarize(&catalog_id, raw))
                .collect::<Result<Vec<_>>>()?;
            summaries.insert(catalog_id, charts);
        }

        Ok((catalogs, summaries))
    }

    /// Reduce a chart to the summary of its default version
    fn summarize(&self, catalog_id: &str, raw: &RawChart) -> Result<Chart> {
        let Some(version) = self.resolver.default_version(raw) else {
            return Err(Error::invariant(format!(
                "chart {}/{} has no default version",
                catalog_id, raw.name
            )));
        };

        let Some(chart_version) = raw.versions.iter().find(|v| v.version == version) else {
            return Err(Error::MissingDefaultVersion {
                catalog_id: catalog_id.to_string(),
                chart_name: raw.name.clone(),
                version,
            });
        };

        Ok(Chart {
            name: raw.name.clone(),
            description: chart_version.description.clone().unwrap_or_default(),
            icon_url: chart_version.icon_url.clone(),
            project_homepage_url: chart_version.project_homepage_url.clone(),
        })
    }

    /// Update the search and its results
    ///
    /// Runs only if no other call comes in within the debounce window, and not
    /// before the dataset is fetched. An empty search clears the results.
    pub async fn set_search(&self, search: &str) -> Result<()> {
        if !self.debouncer.wait_for_quiet().await.is_trailing() {
            log::debug!("Search {:?} superseded", search);
            return Ok(());
        }

        // Numbered in call order, before any wait on the fetch
        let sequence = self.latest_search.fetch_add(1, Ordering::SeqCst) + 1;

        self.wait_for_catalogs().await?;

        if self.is_stale(sequence) {
            log::debug!("Search {:?} superseded while waiting for catalogs", search);
            return Ok(());
        }

        self.store.dispatch(CatalogAction::SearchChanged {
            search: search.to_string(),
        });

        if search.is_empty() {
            self.store.dispatch(CatalogAction::SearchResultsChanged {
                search_results: None,
            });
            return Ok(());
        }

        let Some((catalogs, charts_by_catalog_id)) = self.store.read(|state| {
            state.as_ready().map(|ready| {
                (
                    Arc::clone(&ready.catalogs),
                    Arc::clone(&ready.charts_by_catalog_id),
                )
            })
        }) else {
            return Err(Error::invariant("searching before catalogs are fetched"));
        };

        let index = self.index_cache.get_or_build(&catalogs, &charts_by_catalog_id)?;
        let search_results = index.search(search).await?;

        if self.is_stale(sequence) {
            log::debug!("Discarding stale results for {:?}", search);
            return Ok(());
        }

        log::debug!("Search {:?} matched {} charts", search, search_results.len());
        self.store.dispatch(CatalogAction::SearchResultsChanged {
            search_results: Some(search_results),
        });
        Ok(())
    }

    fn is_stale(&self, sequence: u64) -> bool {
        self.latest_search.load(Ordering::SeqCst) != sequence
    }

    /// Resolve once the dataset is fetched
    async fn wait_for_catalogs(&self) -> Result<()> {
        // Subscribe before checking so the fetched action cannot slip in between
        let mut actions = self.store.subscribe();

        if self.store.read(CatalogState::is_ready) {
            return Ok(());
        }

        loop {
            match actions.recv().await {
                Ok(CatalogAction::CatalogsFetched { .. }) => return Ok(()),
                Ok(_) => continue,
                Err(RecvError::Lagged(_)) => {
                    if self.store.read(CatalogState::is_ready) {
                        return Ok(());
                    }
                }
                Err(RecvError::Closed) => return Err(Error::EventBusClosed),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use crate::models::ChartVersion;

    #[derive(Default)]
    struct FakeSource {
        dataset: CatalogsAndCharts,
        fail: bool,
        fetch_count: AtomicUsize,
        delay: Duration,
    }

    impl CatalogSource for FakeSource {
        async fn fetch_catalogs_and_charts(&self) -> Result<CatalogsAndCharts> {
            self.fetch_count.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(Error::Fetch("backend unavailable".into()));
            }
            Ok(self.dataset.clone())
        }
    }

    fn version(version: &str, description: Option<&str>) -> ChartVersion {
        ChartVersion {
            version: version.to_string(),
            description: description.map(str::to_string),
            icon_url: Some(format!("https://example.org/{}.png", version)),
            project_homepage_url: None,
        }
    }

    fn raw_chart(name: &str, description: &str) -> RawChart {
        RawChart {
            name: name.to_string(),
            versions: vec![version("1.0.0", Some(description))],
        }
    }

    fn dataset() -> CatalogsAndCharts {
        let mut charts = FxHashMap::default();
        charts.insert(
            "internal".to_string(),
            vec![raw_chart("jupyter-admin", "Admin notebook")],
        );
        charts.insert(
            "c1".to_string(),
            vec![raw_chart("jupyter", "notebook"), raw_chart("rstudio", "IDE for R")],
        );
        charts.insert("c2".to_string(), vec![raw_chart("postgresql", "database")]);

        CatalogsAndCharts {
            catalogs: vec![
                Catalog { id: "internal".to_string(), is_hidden: true },
                Catalog { id: "c1".to_string(), is_hidden: false },
                Catalog { id: "c2".to_string(), is_hidden: false },
            ],
            charts_by_catalog_id: charts,
        }
    }

    fn explorer() -> CatalogExplorer<FakeSource> {
        CatalogExplorer::new(
            FakeSource {
                dataset: dataset(),
                ..Default::default()
            },
            SearchSettings::default(),
        )
    }

    fn selected(explorer: &CatalogExplorer<FakeSource>) -> String {
        explorer.state().as_ready().unwrap().selected_catalog_id.clone()
    }

    fn results(explorer: &CatalogExplorer<FakeSource>) -> Option<Vec<(String, String)>> {
        explorer.state().as_ready().unwrap().search_results().map(|results| {
            results
                .iter()
                .map(|r| (r.catalog_id.clone(), r.chart_name.clone()))
                .collect()
        })
    }

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<CatalogAction>) -> Vec<&'static str> {
        let mut names = Vec::new();
        while let Ok(action) = rx.try_recv() {
            names.push(action.name());
        }
        names
    }

    #[tokio::test]
    async fn test_first_select_fetches_and_picks_default() {
        let explorer = explorer();
        let mut rx = explorer.store().subscribe();

        explorer.select_catalog(None).await.unwrap();

        assert_eq!(selected(&explorer), "c1");
        assert_eq!(
            drain(&mut rx),
            vec!["catalogsFetching", "catalogsFetched", "defaultCatalogSelected"]
        );
    }

    #[tokio::test]
    async fn test_charts_summarized_from_default_version() {
        let mut dataset = dataset();
        dataset.charts_by_catalog_id.insert(
            "c2".to_string(),
            vec![RawChart {
                name: "postgresql".to_string(),
                versions: vec![version("2.0.0-beta", Some("beta")), version("1.2.0", None)],
            }],
        );
        let explorer = CatalogExplorer::new(
            FakeSource { dataset, ..Default::default() },
            SearchSettings::default(),
        );

        explorer.select_catalog(Some("c2")).await.unwrap();

        let state = explorer.state();
        let ready = state.as_ready().unwrap();
        let chart = &ready.charts_by_catalog_id["c2"][0];
        assert_eq!(chart.description, "");
        assert_eq!(chart.icon_url.as_deref(), Some("https://example.org/1.2.0.png"));
        assert_eq!(ready.selected_catalog_id, "c2");
    }

    #[tokio::test]
    async fn test_select_when_ready() {
        let explorer = explorer();
        explorer.select_catalog(None).await.unwrap();
        let mut rx = explorer.store().subscribe();

        explorer.select_catalog(Some("c2")).await.unwrap();
        assert_eq!(selected(&explorer), "c2");

        // Same id is a no-op
        explorer.select_catalog(Some("c2")).await.unwrap();

        explorer.select_catalog(None).await.unwrap();
        assert_eq!(selected(&explorer), "c1");

        assert_eq!(drain(&mut rx), vec!["selectedCatalogChanged", "defaultCatalogSelected"]);
        assert_eq!(explorer.source.fetch_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_catalog() {
        let explorer = explorer();
        explorer.select_catalog(None).await.unwrap();

        let err = explorer.select_catalog(Some("nope")).await.unwrap_err();
        assert!(matches!(err, Error::UnknownCatalog(id) if id == "nope"));
        assert_eq!(selected(&explorer), "c1");
    }

    #[tokio::test]
    async fn test_unknown_catalog_on_first_select_keeps_dataset() {
        let explorer = explorer();

        let err = explorer.select_catalog(Some("nope")).await.unwrap_err();
        assert!(matches!(err, Error::UnknownCatalog(_)));
        assert_eq!(selected(&explorer), "c1");
        assert_eq!(explorer.source.fetch_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_visible_catalog_is_invariant_violation() {
        let mut dataset = dataset();
        for catalog in &mut dataset.catalogs {
            catalog.is_hidden = true;
        }
        let explorer = CatalogExplorer::new(
            FakeSource { dataset, ..Default::default() },
            SearchSettings::default(),
        );

        let err = explorer.select_catalog(None).await.unwrap_err();
        assert!(matches!(err, Error::Invariant(_)));
        assert_eq!(explorer.state(), CatalogState::NotFetched { is_fetching: false });
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_during_fetch_is_noop() {
        let explorer = CatalogExplorer::new(
            FakeSource {
                dataset: dataset(),
                delay: Duration::from_millis(100),
                ..Default::default()
            },
            SearchSettings::default(),
        );

        let (first, second) =
            tokio::join!(explorer.select_catalog(None), explorer.select_catalog(Some("c2")));
        first.unwrap();
        second.unwrap();

        assert_eq!(explorer.source.fetch_count.load(Ordering::SeqCst), 1);
        assert_eq!(selected(&explorer), "c1");
    }

    #[tokio::test]
    async fn test_fetch_failure_allows_retry() {
        let explorer = CatalogExplorer::new(
            FakeSource { fail: true, ..Default::default() },
            SearchSettings::default(),
        );

        assert!(matches!(explorer.select_catalog(None).await, Err(Error::Fetch(_))));
        assert_eq!(explorer.state(), CatalogState::NotFetched { is_fetching: false });

        assert!(explorer.select_catalog(None).await.is_err());
        assert_eq!(explorer.source.fetch_count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_finds_chart() {
        let explorer = explorer();
        explorer.select_catalog(None).await.unwrap();

        explorer.set_search("jup").await.unwrap();

        assert_eq!(explorer.state().as_ready().unwrap().search(), "jup");
        assert_eq!(results(&explorer), Some(vec![("c1".to_string(), "jupyter".to_string())]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hidden_catalog_never_in_results() {
        let explorer = explorer();
        explorer.select_catalog(None).await.unwrap();

        explorer.set_search("admin").await.unwrap();
        assert_eq!(results(&explorer), Some(Vec::new()));

        explorer.set_search("jupyter-admin notebook").await.unwrap();
        let found = results(&explorer).unwrap();
        assert!(found.iter().all(|(catalog_id, _)| catalog_id != "internal"));
        assert!(found.contains(&("c1".to_string(), "jupyter".to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_search_clears_without_query() {
        let explorer = explorer();
        explorer.select_catalog(None).await.unwrap();
        explorer.set_search("jup").await.unwrap();
        assert!(results(&explorer).is_some());

        let mut rx = explorer.store().subscribe();
        explorer.set_search("").await.unwrap();

        assert_eq!(results(&explorer), None);
        assert_eq!(explorer.state().as_ready().unwrap().search(), "");
        assert_eq!(drain(&mut rx), vec!["searchChanged", "searchResultsChanged"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_runs_one_query_with_last_term() {
        let explorer = explorer();
        explorer.select_catalog(None).await.unwrap();
        let mut rx = explorer.store().subscribe();

        let first = explorer.set_search("rst");
        let second = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            explorer.set_search("jup").await
        };
        let (first, second) = tokio::join!(first, second);
        first.unwrap();
        second.unwrap();

        let mut searches = Vec::new();
        let mut result_updates = 0;
        while let Ok(action) = rx.try_recv() {
            match action {
                CatalogAction::SearchChanged { search } => searches.push(search),
                CatalogAction::SearchResultsChanged { .. } => result_updates += 1,
                _ => {}
            }
        }
        assert_eq!(searches, vec!["jup"]);
        assert_eq!(result_updates, 1);
        assert_eq!(results(&explorer), Some(vec![("c1".to_string(), "jupyter".to_string())]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_waits_for_fetch() {
        let explorer = CatalogExplorer::new(
            FakeSource {
                dataset: dataset(),
                delay: Duration::from_millis(500),
                ..Default::default()
            },
            SearchSettings::default(),
        );

        let (selection, search) =
            tokio::join!(explorer.select_catalog(None), explorer.set_search("postgres"));
        selection.unwrap();
        search.unwrap();

        assert_eq!(
            results(&explorer),
            Some(vec![("c2".to_string(), "postgresql".to_string())])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_older_search_waiting_for_fetch_is_dropped() {
        let explorer = CatalogExplorer::new(
            FakeSource {
                dataset: dataset(),
                delay: Duration::from_millis(1000),
                ..Default::default()
            },
            SearchSettings::default(),
        );
        let mut rx = explorer.store().subscribe();

        // Both searches outlive their debounce window while the fetch is in flight
        let later = async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            explorer.set_search("jup").await
        };
        let (selection, earlier, later) = tokio::join!(
            explorer.select_catalog(None),
            explorer.set_search("rst"),
            later
        );
        selection.unwrap();
        earlier.unwrap();
        later.unwrap();

        let mut searches = Vec::new();
        let mut published = Vec::new();
        while let Ok(action) = rx.try_recv() {
            match action {
                CatalogAction::SearchChanged { search } => searches.push(search),
                CatalogAction::SearchResultsChanged { search_results } => published.push(
                    search_results
                        .unwrap_or_default()
                        .into_iter()
                        .map(|r| r.chart_name)
                        .collect::<Vec<_>>(),
                ),
                _ => {}
            }
        }

        assert_eq!(searches, vec!["jup"]);
        assert_eq!(published, vec![vec!["jupyter".to_string()]]);
        assert_eq!(explorer.state().as_ready().unwrap().search(), "jup");
    }

    #[tokio::test(start_paused = true)]
    async fn test_index_reused_across_searches() {
        let explorer = explorer();
        explorer.select_catalog(None).await.unwrap();
        explorer.set_search("jup").await.unwrap();

        let state = explorer.state();
        let ready = state.as_ready().unwrap();
        let first = explorer
            .index_cache
            .get_or_build(&ready.catalogs, &ready.charts_by_catalog_id)
            .unwrap();
        explorer.set_search("rst").await.unwrap();
        let second = explorer
            .index_cache
            .get_or_build(&ready.catalogs, &ready.charts_by_catalog_id)
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
    }
}
