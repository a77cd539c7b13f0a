use std::sync::Arc;
use std::time::Instant;

use rustc_hash::FxHashSet;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Query, TermQuery};
use tantivy::schema::{
    Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, Value, STORED, STRING,
};
use tantivy::tokenizer::{LowerCaser, NgramTokenizer, TextAnalyzer};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};

use super::{get_match_positions, parse_search};
use crate::config::SearchSettings;
use crate::error::Result;
use crate::models::{Catalog, ChartsByCatalogId, SearchResult};

const NGRAM_TOKENIZER: &str = "chart_ngram";
const WRITER_MEMORY_BUDGET: usize = 15_000_000;

/// Full-text index over the charts of every visible catalog
///
/// Each chart is one document keyed `catalogId/chartName`, whose text is the
/// chart name followed by its description. Every word is indexed as all of
/// its substrings up to `resolution` chars, so any infix of a word matches.
pub struct ChartSearchIndex {
    catalogs: Arc<Vec<Catalog>>,
    charts_by_catalog_id: Arc<ChartsByCatalogId>,
    reader: IndexReader,
    key_field: Field,
    text_field: Field,
    resolution: usize,
    max_results: usize,
    document_count: usize,
}

impl ChartSearchIndex {
    /// Build the index over the given dataset
    pub fn build(
        catalogs: Arc<Vec<Catalog>>,
        charts_by_catalog_id: Arc<ChartsByCatalogId>,
        settings: &SearchSettings,
    ) -> Result<Self> {
        let started = Instant::now();
        let resolution = settings.resolution.max(1);

        let mut schema_builder = Schema::builder();
        let key_field = schema_builder.add_text_field("catalog_id_chart_name", STRING | STORED);
        let text_options = TextOptions::default().set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer(NGRAM_TOKENIZER)
                .set_index_option(IndexRecordOption::WithFreqs),
        );
        let text_field = schema_builder.add_text_field("chart_name_and_description", text_options);
        let schema = schema_builder.build();

        let index = Index::create_in_ram(schema);
        let analyzer = TextAnalyzer::builder(NgramTokenizer::new(1, resolution, false)?)
            .filter(LowerCaser)
            .build();
        index.tokenizers().register(NGRAM_TOKENIZER, analyzer);

        let mut writer: IndexWriter = index.writer_with_num_threads(1, WRITER_MEMORY_BUDGET)?;
        let mut document_count = 0;

        // Map iteration order is irrelevant: ranking ties fall back to the key
        for (catalog_id, charts) in charts_by_catalog_id.iter() {
            match catalogs.iter().find(|catalog| &catalog.id == catalog_id) {
                Some(catalog) if catalog.is_hidden => continue,
                Some(_) => {}
                None => {
                    log::warn!("Skipping charts of unknown catalog {}", catalog_id);
                    continue;
                }
            }

            for chart in charts {
                let mut doc = TantivyDocument::default();
                doc.add_text(key_field, format!("{}/{}", catalog_id, chart.name));
                // One value per word so grams never span two words
                for word in chart.name.split_whitespace().chain(chart.description.split_whitespace()) {
                    doc.add_text(text_field, word);
                }
                writer.add_document(doc)?;
                document_count += 1;
            }
        }

        writer.commit()?;

        let reader: IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        log::info!(
            "Built chart search index: {} documents in {:?}",
            document_count,
            started.elapsed()
        );

        Ok(Self {
            catalogs,
            charts_by_catalog_id,
            reader,
            key_field,
            text_field,
            resolution,
            max_results: settings.max_results,
            document_count,
        })
    }

    /// Number of indexed charts
    pub fn len(&self) -> usize {
        self.document_count
    }

    pub fn is_empty(&self) -> bool {
        self.document_count == 0
    }

    /// Whether this index was built from exactly these containers
    pub fn is_built_from(
        &self,
        catalogs: &Arc<Vec<Catalog>>,
        charts_by_catalog_id: &Arc<ChartsByCatalogId>,
    ) -> bool {
        Arc::ptr_eq(&self.catalogs, catalogs)
            && Arc::ptr_eq(&self.charts_by_catalog_id, charts_by_catalog_id)
    }

    /// Ranked charts matching any term of `search`, with highlight masks
    pub async fn search(&self, search: &str) -> Result<Vec<SearchResult>> {
        tokio::task::yield_now().await;
        self.search_blocking(search)
    }

    fn search_blocking(&self, search: &str) -> Result<Vec<SearchResult>> {
        let keys = self.matching_keys(search)?;

        if keys.is_empty() {
            return Ok(Vec::new());
        }

        Ok(keys
            .iter()
            .filter_map(|key| self.to_search_result(key, search))
            .collect())
    }

    /// Document keys ranked by score, ties in key order
    fn matching_keys(&self, search: &str) -> Result<Vec<String>> {
        let parsed = parse_search(search);
        if parsed.is_empty() || self.max_results == 0 {
            return Ok(Vec::new());
        }

        let term_queries: Vec<Box<dyn Query>> = parsed
            .term_fragments(self.resolution)
            .into_iter()
            .map(|fragments| {
                let mut queries: Vec<Box<dyn Query>> = fragments
                    .iter()
                    .map(|fragment| {
                        Box::new(TermQuery::new(
                            Term::from_field_text(self.text_field, fragment),
                            IndexRecordOption::WithFreqs,
                        )) as Box<dyn Query>
                    })
                    .collect();
                if queries.len() == 1 {
                    queries.remove(0)
                } else {
                    Box::new(BooleanQuery::intersection(queries)) as Box<dyn Query>
                }
            })
            .collect();

        // Any term is enough to surface a chart
        let query = BooleanQuery::union(term_queries);

        let searcher = self.reader.searcher();
        let top_docs = searcher.search(&query, &TopDocs::with_limit(self.max_results))?;

        let mut scored: Vec<(f32, String)> = Vec::with_capacity(top_docs.len());
        let mut seen: FxHashSet<String> = FxHashSet::default();
        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher.doc(doc_address)?;
            let Some(key) = doc.get_first(self.key_field).and_then(|v| v.as_str()) else {
                continue;
            };
            if seen.insert(key.to_string()) {
                scored.push((score, key.to_string()));
            }
        }

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.cmp(&b.1))
        });

        Ok(scored.into_iter().map(|(_, key)| key).collect())
    }

    fn to_search_result(&self, key: &str, search: &str) -> Option<SearchResult> {
        let (catalog_id, chart_name) = key.split_once('/')?;

        let Some(chart) = self
            .charts_by_catalog_id
            .get(catalog_id)
            .and_then(|charts| charts.iter().find(|chart| chart.name == chart_name))
        else {
            log::warn!("Search hit {} has no matching chart", key);
            return None;
        };

        Some(SearchResult {
            catalog_id: catalog_id.to_string(),
            chart_name: chart_name.to_string(),
            chart_name_highlighted_indexes: get_match_positions(chart_name, search),
            chart_description_highlighted_indexes: get_match_positions(&chart.description, search),
        })
    }
}
