//! Read-only views over the catalog state for rendering

use crate::models::{Catalog, DisplayedChart};
use crate::state::CatalogState;

pub fn is_fetching(state: &CatalogState) -> bool {
    matches!(state, CatalogState::NotFetched { is_fetching: true })
}

pub fn selected_catalog(state: &CatalogState) -> Option<&Catalog> {
    let ready = state.as_ready()?;
    ready
        .catalogs
        .iter()
        .find(|catalog| catalog.id == ready.selected_catalog_id)
}

/// Non-hidden catalogs, declaration order
pub fn visible_catalogs(state: &CatalogState) -> Vec<&Catalog> {
    match state.as_ready() {
        Some(ready) => ready.catalogs.iter().filter(|catalog| !catalog.is_hidden).collect(),
        None => Vec::new(),
    }
}

/// Charts to show: search hits in rank order while a search is active,
/// otherwise the charts of the selected catalog
pub fn displayed_charts(state: &CatalogState) -> Vec<DisplayedChart> {
    let Some(ready) = state.as_ready() else {
        return Vec::new();
    };

    match ready.search_results() {
        Some(results) => results
            .iter()
            .filter_map(|result| {
                let chart = ready
                    .charts_by_catalog_id
                    .get(&result.catalog_id)?
                    .iter()
                    .find(|chart| chart.name == result.chart_name)?;
                Some(DisplayedChart {
                    catalog_id: result.catalog_id.clone(),
                    chart: chart.clone(),
                    chart_name_highlighted_indexes: result.chart_name_highlighted_indexes.clone(),
                    chart_description_highlighted_indexes: result
                        .chart_description_highlighted_indexes
                        .clone(),
                })
            })
            .collect(),
        None => ready
            .charts_by_catalog_id
            .get(&ready.selected_catalog_id)
            .map(|charts| {
                charts
                    .iter()
                    .map(|chart| DisplayedChart {
                        catalog_id: ready.selected_catalog_id.clone(),
                        chart: chart.clone(),
                        chart_name_highlighted_indexes: Vec::new(),
                        chart_description_highlighted_indexes: Vec::new(),
                    })
                    .collect()
            })
            .unwrap_or_default(),
    }
}
