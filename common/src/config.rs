use crate::scoring::ScoringConfig;
use crate::yaml_include::{load_yaml_with_includes, to_yaml_string};
use serde::Deserialize;
use std::{error::Error, fs, path::Path};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CommonConfig {
    pub project_name: String,
    pub database_url: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Upper bound on transactions scored concurrently within a batch.
    pub threads: u32,
    /// Polling interval when the backlog is empty.
    pub sleep_ms: u64,
    pub batch_limit: u32,
    pub log_level: String,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            sleep_ms: 3000,
            batch_limit: 10,
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ModelConfig {
    /// JSON artifact of the linear classifier; scoring is rule-only without it.
    #[serde(default)]
    pub artifact_path: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MetricsConfig {
    #[serde(default)]
    pub listen_address: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    pub common: CommonConfig,
    #[serde(default)]
    pub processor: ProcessorConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    pub fn load(config_path: &str) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let contents = fs::read_to_string(config_path)?;
        let config = serde_yml::from_str(&contents)?;

        Ok(config)
    }

    /// Same as [`Config::load`] but resolves `!include` lines first.
    pub fn load_with_includes(config_path: &str) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let yaml = load_yaml_with_includes(Path::new(config_path))?;
        let contents = to_yaml_string(&yaml)?;
        let config = serde_yml::from_str(&contents)?;

        Ok(config)
    }
}
