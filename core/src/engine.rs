//! Engine handle with an explicit build/rebuild lifecycle.
//!
//! The current [`Searcher`] sits behind `RwLock<Option<Arc<_>>>`. A build
//! constructs the complete index off to the side and publishes it with a
//! single pointer swap, so readers observe either the old generation or the
//! new one, never a partial index. Searches clone the `Arc` and release the
//! lock before evaluating.

use crate::analyzer::Analyzer;
use crate::builder::build;
use crate::config::EngineConfig;
use crate::document::{Document, FieldValue};
use crate::error::{Result, SearchError};
use crate::index::{DocId, InvertedIndex};
use crate::persist::{load_index, save_index, IndexPaths};
use crate::query::{Query, QueryParser, SearchRequest};
use crate::search::{search, TopDocs};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// One immutable index generation together with the analyzer it was built with.
#[derive(Debug)]
pub struct Searcher {
    index: InvertedIndex,
    parser: QueryParser,
    generation: u64,
}

impl Searcher {
    pub fn index(&self) -> &InvertedIndex { &self.index }

    pub fn parser(&self) -> &QueryParser { &self.parser }

    pub fn generation(&self) -> u64 { self.generation }

    pub fn search(&self, query: &Query, k: usize) -> TopDocs { search(&self.index, query, k) }

    pub fn search_request(&self, req: &SearchRequest, k: usize) -> Result<TopDocs> {
        let query = self.parser.parse(req)?;
        Ok(self.search(&query, k))
    }

    pub fn search_simple(&self, field: &str, text: &str, k: usize) -> TopDocs {
        self.search(&self.parser.parse_simple(field, text), k)
    }

    /// First stored value among `fields`, for presenting a hit.
    pub fn display_value(&self, doc_id: DocId, fields: &[&str]) -> Option<&FieldValue> {
        fields.iter().find_map(|f| self.index.stored_value(doc_id, f))
    }
}

pub struct SearchEngine {
    config: EngineConfig,
    current: RwLock<Option<Arc<Searcher>>>,
    generation: AtomicU64,
    // held across build, save and publish; one writer at a time
    build_lock: Mutex<()>,
}

impl SearchEngine {
    /// Engine with no index; searches fail with `IndexNotBuilt` until a build or load.
    pub fn new(config: EngineConfig) -> Self {
        Self { config, current: RwLock::new(None), generation: AtomicU64::new(0), build_lock: Mutex::new(()) }
    }

    /// Engine initialized from a persisted index.
    pub fn open(config: EngineConfig, paths: &IndexPaths) -> Result<Self> {
        let engine = Self::new(config);
        engine.load(paths)?;
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig { &self.config }

    pub fn is_built(&self) -> bool { self.current.read().is_some() }

    fn publish(&self, index: InvertedIndex, analyzer: Analyzer) -> Arc<Searcher> {
        let parser = QueryParser::new(analyzer, self.config.fields.clone());
        let mut current = self.current.write();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let searcher = Arc::new(Searcher { index, parser, generation });
        *current = Some(searcher.clone());
        drop(current);
        tracing::info!(generation, num_docs = searcher.index.document_count(), "index generation published");
        searcher
    }

    /// Builds a fresh in-memory index and swaps it in.
    pub fn build<I>(&self, documents: I) -> Arc<Searcher>
    where
        I: IntoIterator<Item = Document>,
    {
        let _guard = self.build_lock.lock();
        let analyzer = Analyzer::new(self.config.analyzer);
        let index = build(analyzer, documents);
        self.publish(index, analyzer)
    }

    /// Builds, replaces the index at `paths`, then swaps it in. If saving
    /// fails the previous generation stays current.
    pub fn rebuild_and_persist<I>(&self, paths: &IndexPaths, documents: I) -> Result<Arc<Searcher>>
    where
        I: IntoIterator<Item = Document>,
    {
        let _guard = self.build_lock.lock();
        let analyzer = Analyzer::new(self.config.analyzer);
        let index = build(analyzer, documents);
        save_index(paths, &index, analyzer.config())?;
        Ok(self.publish(index, analyzer))
    }

    /// Loads a persisted index, analyzing queries as that index was analyzed.
    pub fn load(&self, paths: &IndexPaths) -> Result<Arc<Searcher>> {
        let _guard = self.build_lock.lock();
        let (index, meta) = load_index(paths)?;
        if meta.analyzer != self.config.analyzer {
            tracing::warn!(stored = ?meta.analyzer, configured = ?self.config.analyzer, "using analyzer settings stored with the index");
        }
        Ok(self.publish(index, Analyzer::new(meta.analyzer)))
    }

    pub fn searcher(&self) -> Result<Arc<Searcher>> {
        self.current.read().clone().ok_or(SearchError::IndexNotBuilt)
    }

    pub fn search(&self, query: &Query, k: usize) -> Result<TopDocs> { Ok(self.searcher()?.search(query, k)) }

    pub fn search_request(&self, req: &SearchRequest, k: usize) -> Result<TopDocs> {
        self.searcher()?.search_request(req, k)
    }

    pub fn search_simple(&self, field: &str, text: &str, k: usize) -> Result<TopDocs> {
        Ok(self.searcher()?.search_simple(field, text, k))
    }
}
