//! Attraction retrieval engine: persistent vector index over attraction text.
//!
//! This module provides semantic retrieval of attractions using embedding
//! vectors and exact L2 nearest-neighbor search.
//!
//! # Architecture
//!
//! - `normalize`: flattens per-city attraction records into embeddable text
//! - `embeddings`: batched embedding generation (OpenAI or offline stub)
//! - `index`: in-memory flat vector index with exact L2 search
//! - `storage`: three-artifact persistence (matrix, metadata, norms)
//! - `coordinator`: single-flight guard for background rebuilds
//! - `service`: high-level retrieval service callers use

mod coordinator;
mod embeddings;
mod index;
mod normalize;
mod service;
mod storage;

pub use embeddings::{EmbeddingError, EmbeddingProvider, OfflineEmbedder, OpenAiEmbedder};
pub use service::RetrievalService;
pub use storage::IndexStorage;
