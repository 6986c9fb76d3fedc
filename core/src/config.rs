use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use std::env;
use std::path::Path;

use crate::model::AggregationPolicy;

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Minimum normalized edit-distance similarity for two spellings to merge.
    pub similarity_threshold: f64,
    /// Separators between names inside a single nomination cell.
    pub delimiters: Vec<String>,
    /// Whole tokens dropped during name normalization.
    pub honorifics: Vec<String>,
    /// Suffixes trimmed from the end of a name token.
    pub honorific_suffixes: Vec<String>,
    pub aggregation: AggregationPolicy,
    pub directed: bool,
    /// Share of the highest in-degree below which a connected student is at risk.
    pub at_risk_ratio: f64,
    pub eigenvector_tolerance: f64,
    pub eigenvector_max_iterations: usize,
    /// Ask the AI for name-correction groups before resolution.
    pub ai_alias_hints: bool,
    /// Rows included in the mapping prompt.
    pub prompt_sample_rows: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
            delimiters: [",", ";", "\n", "、", "|"]
                .iter()
                .map(|d| d.to_string())
                .collect(),
            honorifics: [
                "mr", "mrs", "ms", "miss", "dr", "prof", "jr", "sr", "ii", "iii", "님",
            ]
            .iter()
            .map(|h| h.to_string())
            .collect(),
            honorific_suffixes: vec!["님".to_string()],
            aggregation: AggregationPolicy::Sum,
            directed: true,
            at_risk_ratio: 0.1,
            eigenvector_tolerance: 1e-6,
            eigenvector_max_iterations: 1000,
            ai_alias_hints: false,
            prompt_sample_rows: 20,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct CredentialsConfig {
    pub keys: Vec<String>,
    pub cooldown_secs: u64,
    pub auth_cooldown_secs: u64,
    pub max_consecutive_failures: u32,
    pub max_attempts: usize,
    pub call_timeout_ms: u64,
    /// Fixes credential selection order; unset means OS entropy.
    pub seed: Option<u64>,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            keys: Vec::new(),
            cooldown_secs: 60,
            auth_cooldown_secs: 3600,
            max_consecutive_failures: 3,
            max_attempts: 3,
            call_timeout_ms: 30_000,
            seed: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub analysis: AnalysisConfig,
    pub credentials: CredentialsConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(environment());

        builder.build()?.try_deserialize()
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(environment())
            .build()?
            .try_deserialize()
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}

// SOCIOGRAM_CREDENTIALS__KEYS=k1,k2 overrides credentials.keys.
fn environment() -> Environment {
    Environment::with_prefix("SOCIOGRAM")
        .prefix_separator("_")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("credentials.keys")
        .try_parsing(true)
}
