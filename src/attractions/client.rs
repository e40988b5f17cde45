//! TripAdvisor-via-RapidAPI attraction fetcher.
//!
//! Every upstream call is cached on disk and guarded by a monthly quota
//! counter, so repeated planning runs for the same city cost zero API calls.
//! All failures are soft: an unreachable API or exhausted quota yields an
//! empty list and the caller falls back to whatever is already cached.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{json, Value};

use crate::attractions::parse::{find_geo_id, parse_attractions};
use crate::attractions::AttractionRecord;

const API_HOST: &str = "travel-advisor.p.rapidapi.com";
const SEARCH_URL: &str = "https://travel-advisor.p.rapidapi.com/locations/v2/search";
const LIST_URL: &str = "https://travel-advisor.p.rapidapi.com/attractions/v2/list";

/// Free-tier monthly request allowance, with headroom left for retries
const MONTHLY_CALL_LIMIT: u32 = 480;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, thiserror::Error)]
pub enum AttractionsError {
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("API returned status {0}")]
    BadStatus(u16),

    #[error("Monthly call limit reached ({0} calls)")]
    QuotaExhausted(u32),

    #[error("No geo id found for city")]
    GeoIdNotFound,
}

/// Client for the attraction listing API with on-disk caching.
pub struct AttractionsClient {
    client: reqwest::blocking::Client,
    api_key: String,
    data_dir: PathBuf,
    limit: usize,
}

impl AttractionsClient {
    pub fn new(api_key: String, data_dir: PathBuf, limit: usize) -> Result<Self, AttractionsError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            api_key,
            data_dir,
            limit,
        })
    }

    /// Fetch top attractions for `city`, serving from the local cache when
    /// possible and persisting fresh results into it.
    ///
    /// Soft-fails: quota exhaustion, network errors and unparseable
    /// responses all log and return an empty list.
    pub fn fetch_attractions(&self, city: &str) -> Vec<AttractionRecord> {
        let mut cache = self.load_cache();
        if let Some(cached) = cache.get(city) {
            if !cached.is_empty() {
                log::debug!("attractions for {} served from cache", city);
                return cached.clone();
            }
        }

        let records = match self.fetch_remote(city) {
            Ok(records) => records,
            Err(e) => {
                log::warn!("attraction fetch for {} failed: {}", city, e);
                return vec![];
            }
        };

        if records.is_empty() {
            log::warn!("attraction API returned no usable cards for {}", city);
            return vec![];
        }

        cache.insert(city.to_string(), records.clone());
        self.save_cache(&cache);
        records
    }

    fn fetch_remote(&self, city: &str) -> Result<Vec<AttractionRecord>, AttractionsError> {
        let geo_id = self.resolve_geo_id(city)?;
        log::debug!("geo id for {} is {}", city, geo_id);

        self.consume_quota()?;
        let payload = json!({
            "geoId": geo_id,
            "startDate": "",
            "endDate": "",
            "sort": "TRAVELER_RANKED",
            "sortOrder": "desc",
            "filters": [
                { "id": "category", "value": ["42"] },
                { "id": "rating", "value": ["30"] }
            ],
            "updateToken": ""
        });

        let response = self.post(LIST_URL, &payload)?;
        Ok(parse_attractions(&response, self.limit))
    }

    /// Resolve a city name to its numeric geo id, caching lookups in
    /// `geoids.json`.
    fn resolve_geo_id(&self, city: &str) -> Result<i64, AttractionsError> {
        let key = city.trim().to_lowercase();
        let mut cache = self.load_geo_cache();
        if let Some(id) = cache.get(&key) {
            return Ok(*id);
        }

        self.consume_quota()?;
        let payload = json!({
            "query": city,
            "updateToken": ""
        });

        let response = self.post(SEARCH_URL, &payload)?;
        let geo_id = find_geo_id(&response).ok_or(AttractionsError::GeoIdNotFound)?;

        cache.insert(key, geo_id);
        self.save_geo_cache(&cache);
        Ok(geo_id)
    }

    fn post(&self, url: &str, payload: &Value) -> Result<Value, AttractionsError> {
        let response = self
            .client
            .post(url)
            .header("x-rapidapi-key", &self.api_key)
            .header("x-rapidapi-host", API_HOST)
            .json(payload)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttractionsError::BadStatus(status.as_u16()));
        }

        Ok(response.json()?)
    }

    /// Increment the persistent call counter, refusing once the monthly
    /// limit is reached. The counter file must be deleted by hand when the
    /// quota window resets.
    fn consume_quota(&self) -> Result<(), AttractionsError> {
        let path = self.counter_path();
        let used: u32 = std::fs::read_to_string(&path)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0);

        if used >= MONTHLY_CALL_LIMIT {
            return Err(AttractionsError::QuotaExhausted(used));
        }

        let _ = std::fs::create_dir_all(&self.data_dir);
        if let Err(e) = std::fs::write(&path, (used + 1).to_string()) {
            log::warn!("failed to persist call counter: {}", e);
        }
        Ok(())
    }

    fn cache_path(&self) -> PathBuf {
        self.data_dir.join("attractions.json")
    }

    fn geo_cache_path(&self) -> PathBuf {
        self.data_dir.join("geoids.json")
    }

    fn counter_path(&self) -> PathBuf {
        self.data_dir.join("attractions_counter.txt")
    }

    fn load_cache(&self) -> BTreeMap<String, Vec<AttractionRecord>> {
        read_json(&self.cache_path())
    }

    fn save_cache(&self, cache: &BTreeMap<String, Vec<AttractionRecord>>) {
        write_json(&self.data_dir, &self.cache_path(), cache);
    }

    fn load_geo_cache(&self) -> BTreeMap<String, i64> {
        read_json(&self.geo_cache_path())
    }

    fn save_geo_cache(&self, cache: &BTreeMap<String, i64>) {
        write_json(&self.data_dir, &self.geo_cache_path(), cache);
    }
}

fn read_json<T: serde::de::DeserializeOwned + Default>(path: &Path) -> T {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return T::default();
    };
    match serde_json::from_str(&contents) {
        Ok(value) => value,
        Err(e) => {
            log::warn!("cache at {:?} is malformed: {}", path, e);
            T::default()
        }
    }
}

fn write_json<T: serde::Serialize>(dir: &Path, path: &Path, value: &T) {
    let _ = std::fs::create_dir_all(dir);
    let serialized = match serde_json::to_string_pretty(value) {
        Ok(s) => s,
        Err(e) => {
            log::warn!("failed to serialize cache for {:?}: {}", path, e);
            return;
        }
    };
    if let Err(e) = std::fs::write(path, serialized) {
        log::warn!("failed to write cache at {:?}: {}", path, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_in(dir: &Path) -> AttractionsClient {
        AttractionsClient::new("test-key".to_string(), dir.to_path_buf(), 10).unwrap()
    }

    #[test]
    fn test_cache_hit_skips_network() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("attractions.json"),
            r#"{"Paris": [{"name": "Louvre"}]}"#,
        )
        .unwrap();

        // No network in tests; a cache hit must return before any request
        let records = client_in(dir.path()).fetch_attractions("Paris");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Louvre");
    }

    #[test]
    fn test_quota_counter_increments() {
        let dir = tempfile::tempdir().unwrap();
        let client = client_in(dir.path());

        client.consume_quota().unwrap();
        client.consume_quota().unwrap();

        let counter = std::fs::read_to_string(dir.path().join("attractions_counter.txt")).unwrap();
        assert_eq!(counter, "2");
    }

    #[test]
    fn test_quota_exhaustion_refuses() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("attractions_counter.txt"),
            MONTHLY_CALL_LIMIT.to_string(),
        )
        .unwrap();

        let client = client_in(dir.path());
        assert!(matches!(
            client.consume_quota(),
            Err(AttractionsError::QuotaExhausted(_))
        ));
    }

    #[test]
    fn test_geo_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let client = client_in(dir.path());

        let mut cache = BTreeMap::new();
        cache.insert("paris".to_string(), 187147i64);
        client.save_geo_cache(&cache);

        assert_eq!(client.load_geo_cache().get("paris"), Some(&187147));
    }

    #[test]
    fn test_malformed_cache_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("attractions.json"), "[broken").unwrap();

        let client = client_in(dir.path());
        assert!(client.load_cache().is_empty());
    }
}
