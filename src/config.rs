use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const DEFAULT_ATTRACTION_LIMIT: usize = 10;

/// Default embedding model
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
/// Default embedding vector width
const DEFAULT_EMBEDDING_DIMENSIONS: usize = 1536;

/// Configuration for the retrieval engine
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Use the deterministic offline embedder instead of the remote provider
    #[serde(default)]
    pub offline: bool,

    /// Embedding model name
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding vector width; must match the model
    #[serde(default = "default_embedding_dimensions")]
    pub dimensions: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            offline: false,
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_embedding_dimensions() -> usize {
    DEFAULT_EMBEDDING_DIMENSIONS
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Maximum attractions to keep per city when fetching
    #[serde(default = "default_attraction_limit")]
    pub attraction_limit: usize,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

// Serde defaults only apply to missing fields during deserialization; the
// first-run config file is written from this impl, so it must carry the
// same values.
impl Default for Config {
    fn default() -> Self {
        Self {
            attraction_limit: DEFAULT_ATTRACTION_LIMIT,
            retrieval: RetrievalConfig::default(),
            base_path: PathBuf::new(),
        }
    }
}

fn default_attraction_limit() -> usize {
    DEFAULT_ATTRACTION_LIMIT
}

impl Config {
    fn validate(&mut self) {
        if self.attraction_limit == 0 {
            self.attraction_limit = 1;
        }

        if self.retrieval.dimensions == 0 {
            panic!("retrieval.dimensions must be greater than 0");
        }

        if self.retrieval.model.trim().is_empty() {
            panic!("retrieval.model must not be empty");
        }
    }

    pub fn load_with(base_path: &Path) -> Self {
        let path = base_path.join("config.yaml");

        // create new if does not exist
        if !path.exists() {
            if let Err(e) = std::fs::create_dir_all(base_path) {
                log::warn!("failed to create data dir {:?}: {}", base_path, e);
            }
            let default_str = serde_yml::to_string(&Self::default()).unwrap();
            if let Err(e) = std::fs::write(&path, default_str) {
                log::warn!("failed to write default config: {}", e);
            }
        }

        let config_str =
            std::fs::read_to_string(&path).expect("config file is not readable");
        let mut config: Self = serde_yml::from_str(&config_str).expect("config is malformed");

        config.base_path = base_path.to_path_buf();

        config.validate();

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config).unwrap() {
            config.save();
        }

        config
    }

    pub fn save(&self) {
        let config_str = serde_yml::to_string(&self).unwrap();
        if let Err(e) = std::fs::write(self.base_path.join("config.yaml"), config_str) {
            log::warn!("failed to save config: {}", e);
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.base_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_serde_defaults() {
        let config = Config::default();
        assert_eq!(config.attraction_limit, DEFAULT_ATTRACTION_LIMIT);
        assert_eq!(config.retrieval.model, DEFAULT_EMBEDDING_MODEL);
        assert_eq!(config.retrieval.dimensions, DEFAULT_EMBEDDING_DIMENSIONS);
    }

    #[test]
    fn test_creates_default_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_with(dir.path());

        assert!(dir.path().join("config.yaml").exists());
        assert_eq!(config.attraction_limit, DEFAULT_ATTRACTION_LIMIT);
        assert_eq!(config.retrieval.model, DEFAULT_EMBEDDING_MODEL);
        assert_eq!(config.retrieval.dimensions, DEFAULT_EMBEDDING_DIMENSIONS);
        assert!(!config.retrieval.offline);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.yaml"),
            "retrieval:\n  offline: true\n",
        )
        .unwrap();

        let config = Config::load_with(dir.path());
        assert!(config.retrieval.offline);
        assert_eq!(config.retrieval.dimensions, DEFAULT_EMBEDDING_DIMENSIONS);
        assert_eq!(config.attraction_limit, DEFAULT_ATTRACTION_LIMIT);
    }

    #[test]
    fn test_zero_attraction_limit_clamped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.yaml"), "attraction_limit: 0\n").unwrap();

        let config = Config::load_with(dir.path());
        assert_eq!(config.attraction_limit, 1);
    }

    #[test]
    #[should_panic(expected = "retrieval.dimensions")]
    fn test_zero_dimensions_panics() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.yaml"),
            "retrieval:\n  dimensions: 0\n",
        )
        .unwrap();

        Config::load_with(dir.path());
    }
}
