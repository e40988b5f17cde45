//! Current weather lookups with a TTL cache and daily call budget.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

const API_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
const CACHE_TTL: Duration = Duration::from_secs(3600);
const DAILY_CALL_LIMIT: u32 = 1000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("API returned status {0}")]
    BadStatus(u16),

    #[error("Daily call limit reached")]
    QuotaExhausted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    fetched_at: u64,
    summary: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Counter {
    day: String,
    calls: u32,
}

#[derive(Debug, Deserialize)]
struct WeatherResponse {
    weather: Vec<WeatherCondition>,
    main: WeatherMain,
}

#[derive(Debug, Deserialize)]
struct WeatherCondition {
    description: String,
}

#[derive(Debug, Deserialize)]
struct WeatherMain {
    temp: f64,
}

/// Client for current-weather lookups. Every result is cached for an hour
/// and calls are capped per day; all failures degrade to `None`.
pub struct WeatherClient {
    client: reqwest::blocking::Client,
    api_key: String,
    data_dir: PathBuf,
}

impl WeatherClient {
    pub fn new(api_key: String, data_dir: PathBuf) -> Result<Self, WeatherError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            api_key,
            data_dir,
        })
    }

    /// Human-readable current weather for `city`, or `None` on any failure.
    pub fn current_weather(&self, city: &str) -> Option<String> {
        let key = city.trim().to_lowercase();
        let now = unix_now();

        let mut cache: BTreeMap<String, CacheEntry> = self.read_cache();
        if let Some(entry) = cache.get(&key) {
            if now.saturating_sub(entry.fetched_at) < CACHE_TTL.as_secs() {
                log::debug!("weather for {} served from cache", city);
                return Some(entry.summary.clone());
            }
        }

        let summary = match self.fetch_remote(city) {
            Ok(summary) => summary,
            Err(e) => {
                log::warn!("weather lookup for {} failed: {}", city, e);
                return None;
            }
        };

        cache.insert(
            key,
            CacheEntry {
                fetched_at: now,
                summary: summary.clone(),
            },
        );
        self.write_cache(&cache);
        Some(summary)
    }

    fn fetch_remote(&self, city: &str) -> Result<String, WeatherError> {
        self.consume_quota()?;

        let response = self
            .client
            .get(API_URL)
            .query(&[("q", city), ("appid", &self.api_key), ("units", "metric")])
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(WeatherError::BadStatus(status.as_u16()));
        }

        let parsed: WeatherResponse = response.json()?;
        let description = parsed
            .weather
            .first()
            .map(|c| c.description.clone())
            .unwrap_or_else(|| "unknown conditions".to_string());
        Ok(format!("{}, {:.0}°C", description, parsed.main.temp))
    }

    /// Per-day counter; resets automatically when the date changes.
    fn consume_quota(&self) -> Result<(), WeatherError> {
        let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
        let path = self.data_dir.join("weather_counter.json");

        let mut counter: Counter = std::fs::read_to_string(&path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();

        if counter.day != today {
            counter = Counter {
                day: today,
                calls: 0,
            };
        }

        if counter.calls >= DAILY_CALL_LIMIT {
            return Err(WeatherError::QuotaExhausted);
        }

        counter.calls += 1;
        let _ = std::fs::create_dir_all(&self.data_dir);
        if let Ok(serialized) = serde_json::to_string(&counter) {
            if let Err(e) = std::fs::write(&path, serialized) {
                log::warn!("failed to persist weather counter: {}", e);
            }
        }
        Ok(())
    }

    fn cache_path(&self) -> PathBuf {
        self.data_dir.join("weather_cache.json")
    }

    fn read_cache(&self) -> BTreeMap<String, CacheEntry> {
        std::fs::read_to_string(self.cache_path())
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    fn write_cache(&self, cache: &BTreeMap<String, CacheEntry>) {
        let _ = std::fs::create_dir_all(&self.data_dir);
        if let Ok(serialized) = serde_json::to_string_pretty(cache) {
            if let Err(e) = std::fs::write(self.cache_path(), serialized) {
                log::warn!("failed to write weather cache: {}", e);
            }
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_in(dir: &std::path::Path) -> WeatherClient {
        WeatherClient::new("test-key".to_string(), dir.to_path_buf()).unwrap()
    }

    #[test]
    fn test_fresh_cache_hit() {
        let dir = tempfile::tempdir().unwrap();
        let client = client_in(dir.path());

        let mut cache = BTreeMap::new();
        cache.insert(
            "paris".to_string(),
            CacheEntry {
                fetched_at: unix_now(),
                summary: "clear sky, 22°C".to_string(),
            },
        );
        client.write_cache(&cache);

        assert_eq!(
            client.current_weather("Paris").as_deref(),
            Some("clear sky, 22°C")
        );
    }

    #[test]
    fn test_stale_cache_entry_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let client = client_in(dir.path());

        let mut cache = BTreeMap::new();
        cache.insert(
            "paris".to_string(),
            CacheEntry {
                fetched_at: unix_now() - CACHE_TTL.as_secs() - 1,
                summary: "old".to_string(),
            },
        );
        client.write_cache(&cache);

        // Stale entry forces a refetch; no network in tests, so None
        assert_eq!(client.current_weather("Paris"), None);
    }

    #[test]
    fn test_quota_counter_resets_on_new_day() {
        let dir = tempfile::tempdir().unwrap();
        let client = client_in(dir.path());

        std::fs::write(
            dir.path().join("weather_counter.json"),
            r#"{"day": "2020-01-01", "calls": 999}"#,
        )
        .unwrap();

        // Old day resets the count, so quota is available again
        client.consume_quota().unwrap();
        let contents =
            std::fs::read_to_string(dir.path().join("weather_counter.json")).unwrap();
        let counter: Counter = serde_json::from_str(&contents).unwrap();
        assert_eq!(counter.calls, 1);
    }

    #[test]
    fn test_quota_exhaustion() {
        let dir = tempfile::tempdir().unwrap();
        let client = client_in(dir.path());

        let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
        std::fs::write(
            dir.path().join("weather_counter.json"),
            format!(r#"{{"day": "{}", "calls": {}}}"#, today, DAILY_CALL_LIMIT),
        )
        .unwrap();

        assert!(matches!(
            client.consume_quota(),
            Err(WeatherError::QuotaExhausted)
        ));
    }
}
