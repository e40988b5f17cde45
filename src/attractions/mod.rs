//! Attraction records and the sources that supply them.
//!
//! - `AttractionRecord`: the frozen upstream record shape
//! - `AttractionSource`: anything that can supply city -> attractions
//! - `client`: TripAdvisor-via-RapidAPI fetcher with JSON caching
//! - `parse`: multi-shape response parsing as a chain of typed extractors

pub mod client;
pub mod parse;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use client::AttractionsClient;

/// One attraction as supplied by the upstream listing API.
///
/// Missing fields default to empty strings; the format is frozen. `city` is
/// empty in the raw cache (the city is the map key there) and filled in when
/// records are normalized for indexing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttractionRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub rating: String,
    #[serde(default)]
    pub reviews: String,
    #[serde(default)]
    pub photo: String,
    #[serde(default)]
    pub link: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub city: String,
}

/// Supplier of per-city attraction records.
///
/// `load` soft-fails: a missing or unreadable source yields an empty map,
/// never an error.
pub trait AttractionSource: Send + Sync {
    fn load(&self) -> BTreeMap<String, Vec<AttractionRecord>>;
}

/// Attraction source backed by the local `attractions.json` cache.
pub struct CachedAttractionSource {
    path: PathBuf,
}

impl CachedAttractionSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Conventional cache location inside a data directory.
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join("attractions.json"))
    }
}

impl AttractionSource for CachedAttractionSource {
    fn load(&self) -> BTreeMap<String, Vec<AttractionRecord>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                log::debug!("attraction cache not readable at {:?}: {}", self.path, e);
                return BTreeMap::new();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(data) => data,
            Err(e) => {
                log::warn!("attraction cache at {:?} is malformed: {}", self.path, e);
                BTreeMap::new()
            }
        }
    }
}

/// In-memory source for tests.
#[cfg(test)]
pub struct StaticAttractionSource {
    data: std::sync::RwLock<BTreeMap<String, Vec<AttractionRecord>>>,
}

#[cfg(test)]
impl StaticAttractionSource {
    pub fn new(data: BTreeMap<String, Vec<AttractionRecord>>) -> Self {
        Self {
            data: std::sync::RwLock::new(data),
        }
    }

    pub fn empty() -> Self {
        Self::new(BTreeMap::new())
    }

    pub fn replace(&self, data: BTreeMap<String, Vec<AttractionRecord>>) {
        *self.data.write().unwrap_or_else(|e| e.into_inner()) = data;
    }
}

#[cfg(test)]
impl AttractionSource for StaticAttractionSource {
    fn load(&self) -> BTreeMap<String, Vec<AttractionRecord>> {
        self.data
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cached_source_missing_file_is_empty() {
        let source = CachedAttractionSource::new(PathBuf::from("/nonexistent/attractions.json"));
        assert!(source.load().is_empty());
    }

    #[test]
    fn test_cached_source_malformed_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attractions.json");
        std::fs::write(&path, "{not json").unwrap();

        let source = CachedAttractionSource::new(path);
        assert!(source.load().is_empty());
    }

    #[test]
    fn test_cached_source_reads_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attractions.json");
        std::fs::write(
            &path,
            r#"{"Paris": [{"name": "Louvre", "rating": "4.7"}]}"#,
        )
        .unwrap();

        let source = CachedAttractionSource::new(path);
        let data = source.load();
        assert_eq!(data["Paris"].len(), 1);
        assert_eq!(data["Paris"][0].name, "Louvre");
        // Unlisted fields default to empty strings
        assert_eq!(data["Paris"][0].description, "");
    }

    #[test]
    fn test_static_source_replace() {
        let source = StaticAttractionSource::empty();
        assert!(source.load().is_empty());

        let mut data = BTreeMap::new();
        data.insert(
            "Rome".to_string(),
            vec![AttractionRecord {
                name: "Forum".to_string(),
                ..Default::default()
            }],
        );
        source.replace(data);
        assert_eq!(source.load()["Rome"][0].name, "Forum");
    }
}
