//! Attraction record normalization for embedding input.
//!
//! Flattens the per-city attraction map into an ordered list of entries,
//! each carrying a synthesized descriptive text and the record metadata
//! tagged with its city.

use std::collections::BTreeMap;

use crate::attractions::AttractionRecord;

/// A flattened attraction entry ready for embedding.
#[derive(Debug, Clone)]
pub struct NormalizedEntry {
    /// Unified descriptive text fed to the embedding provider
    pub text: String,
    /// Original record with `city` filled in; persisted alongside the vector
    pub meta: AttractionRecord,
}

/// Flatten a city -> attractions map into an ordered entry list.
///
/// Missing fields are already empty strings on `AttractionRecord`, so every
/// record produces a valid descriptive text. An empty or unreadable source
/// yields an empty list; callers treat that as "nothing to index".
///
/// Iteration follows the map's key order, so repeated runs over the same
/// data produce the same entry order.
pub fn normalize(data: &BTreeMap<String, Vec<AttractionRecord>>) -> Vec<NormalizedEntry> {
    let mut entries = Vec::new();

    for (city, attractions) in data {
        for record in attractions {
            let text = format!(
                "{}. {} {} Rated {} with {} reviews. Located in {}.",
                record.name, record.description, record.category, record.rating, record.reviews, city
            )
            .trim()
            .to_string();

            let mut meta = record.clone();
            meta.city = city.clone();

            entries.push(NormalizedEntry { text, meta });
        }
    }

    log::debug!("normalized {} attraction entries", entries.len());
    entries
}
