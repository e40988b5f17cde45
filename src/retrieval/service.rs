//! High-level attraction retrieval service.
//!
//! The only entry point external callers use. Keeps the persisted index
//! eventually consistent with the attraction source by launching background
//! rebuilds, and answers city-filtered similarity queries against whatever
//! snapshot currently exists.
//!
//! Provider, storage and data failures never surface to callers: a query
//! against an unavailable index returns an empty list, and callers fall back
//! to non-retrieval behavior. Only invalid input (`top_k < 1`) panics.

use std::sync::Arc;
use std::thread::JoinHandle;

use crate::attractions::{AttractionRecord, AttractionSource};
use crate::retrieval::coordinator::IndexBuildCoordinator;
use crate::retrieval::embeddings::{EmbeddingError, EmbeddingProvider};
use crate::retrieval::index::{IndexError, VectorIndex};
use crate::retrieval::normalize::{normalize, NormalizedEntry};
use crate::retrieval::storage::{IndexStorage, IndexStorageError};

/// Over-fetch multiplier applied to `top_k` before city filtering
const OVERFETCH_FACTOR: usize = 5;

/// Minimum candidate set size regardless of `top_k`
const OVERFETCH_FLOOR: usize = 25;

/// Errors that can occur inside a rebuild. Absorbed at this boundary;
/// callers of `search` only ever observe an empty result list.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Storage error: {0}")]
    Storage(#[from] IndexStorageError),

    #[error("Provider returned {got} vectors for {expected} texts")]
    VectorCountMismatch { expected: usize, got: usize },
}

/// Retrieval service over the persistent attraction index.
pub struct RetrievalService {
    source: Arc<dyn AttractionSource>,
    embedder: Arc<dyn EmbeddingProvider>,
    storage: Arc<IndexStorage>,
    coordinator: Arc<IndexBuildCoordinator>,
}

impl RetrievalService {
    pub fn new(
        source: Arc<dyn AttractionSource>,
        embedder: Arc<dyn EmbeddingProvider>,
        storage: Arc<IndexStorage>,
    ) -> Self {
        Self {
            source,
            embedder,
            storage,
            coordinator: Arc::new(IndexBuildCoordinator::new()),
        }
    }

    /// Whether a rebuild is currently in flight.
    pub fn is_building(&self) -> bool {
        self.coordinator.is_building()
    }

    /// Trigger a background rebuild if the index is stale.
    ///
    /// Cheap in the common paths: a no-op when the source is empty, when the
    /// persisted snapshot already matches the live entry count, or when a
    /// rebuild is already running. Otherwise the rebuild is spawned on its
    /// own thread and this call returns immediately.
    ///
    /// The returned join handle is for test harnesses; production callers
    /// ignore it.
    pub fn ensure_index_built(&self) -> Option<JoinHandle<()>> {
        let entries = normalize(&self.source.load());
        if entries.is_empty() {
            log::debug!("attraction source empty; nothing to index");
            return None;
        }

        let model_id = self.embedder.model_id_hash();
        let dimensions = self.embedder.dimensions();
        if self.storage.is_complete(&model_id, dimensions, entries.len()) {
            return None;
        }

        if !self.coordinator.try_acquire() {
            log::debug!("index rebuild already in progress; skipping");
            return None;
        }

        log::info!(
            "index stale ({} entries); rebuilding in background",
            entries.len()
        );

        let embedder = Arc::clone(&self.embedder);
        let storage = Arc::clone(&self.storage);
        let coordinator = Arc::clone(&self.coordinator);
        let handle = std::thread::spawn(move || {
            match rebuild(embedder.as_ref(), &storage, entries) {
                Ok(count) => log::info!("index rebuilt with {} vectors", count),
                Err(e) => log::warn!("index rebuild failed: {}", e),
            }
            coordinator.release();
        });

        Some(handle)
    }

    /// Search the index for attractions in `destination_city`.
    ///
    /// Returns at most `top_k` records ordered most-relevant first, all with
    /// a city equal (case-insensitively) to the requested destination. An
    /// unavailable or stale index yields an empty list; callers needing
    /// results before the first successful build must fall back to the raw
    /// attraction listing.
    ///
    /// # Panics
    /// Panics if `top_k < 1`; that is caller error, not a runtime condition.
    pub fn search(&self, query: &str, destination_city: &str, top_k: usize) -> Vec<AttractionRecord> {
        assert!(top_k >= 1, "top_k must be at least 1");

        // Fire-and-forget; never await the rebuild
        let _ = self.ensure_index_built();

        let entry_count = normalize(&self.source.load()).len();
        let model_id = self.embedder.model_id_hash();
        let dimensions = self.embedder.dimensions();

        if !self.storage.is_complete(&model_id, dimensions, entry_count) {
            log::debug!("index unavailable or stale; returning no retrieval results");
            return vec![];
        }

        let (index, meta) = match self.storage.load(&model_id, dimensions) {
            Ok(loaded) => loaded,
            Err(e) => {
                log::warn!("failed to load index artifacts: {}", e);
                return vec![];
            }
        };

        let query_vector = match self.embedder.embed(query) {
            Ok(vector) => vector,
            Err(e) => {
                log::warn!("query embedding failed: {}", e);
                return vec![];
            }
        };

        // Over-fetch: the flat index has no per-city partition, so pull a
        // larger candidate set and filter afterwards
        let fetch_k = (top_k * OVERFETCH_FACTOR).max(OVERFETCH_FLOOR);
        let hits = match index.search(&query_vector, fetch_k) {
            Ok(hits) => hits,
            Err(e) => {
                log::warn!("index search failed: {}", e);
                return vec![];
            }
        };

        let wanted = destination_city.to_lowercase();
        let mut results = Vec::with_capacity(top_k);
        for hit in hits {
            let record = &meta[hit.position];
            if record.city.to_lowercase() == wanted {
                results.push(record.clone());
                if results.len() >= top_k {
                    break;
                }
            }
        }

        log::info!(
            "retrieval returned {} of {} requested results for '{}' in {}",
            results.len(),
            top_k,
            query,
            destination_city
        );
        results
    }
}

/// Embed all entries and persist the snapshot. Runs on the rebuild thread.
///
/// Any failure aborts before `save`, so the previously persisted artifact
/// set stays exactly as it was.
fn rebuild(
    embedder: &dyn EmbeddingProvider,
    storage: &IndexStorage,
    entries: Vec<NormalizedEntry>,
) -> Result<usize, RetrievalError> {
    let texts: Vec<String> = entries.iter().map(|e| e.text.clone()).collect();
    let meta: Vec<AttractionRecord> = entries.into_iter().map(|e| e.meta).collect();

    let vectors = embedder.embed_batch(&texts)?;
    if vectors.len() != texts.len() {
        return Err(RetrievalError::VectorCountMismatch {
            expected: texts.len(),
            got: vectors.len(),
        });
    }

    let index = VectorIndex::from_rows(embedder.dimensions(), &vectors)?;
    storage.save(&index, &meta, &embedder.model_id_hash())?;

    Ok(index.len())
}
