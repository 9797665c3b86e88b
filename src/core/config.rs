use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::error::{KeySweepError, Result};

/// Query used for the full-text search when the caller does not supply one.
pub const DEFAULT_QUERY: &str = "sk- openai";

#[derive(Debug, Clone)]
pub struct Config {
    /// Token for the code-search backend.
    pub github_token: String,
    /// Dedup store file (append-only record list).
    pub found_keys_path: PathBuf,
    /// Optional secondary credential-list sink.
    pub cred_list_path: Option<PathBuf>,
    pub query: String,
    pub tuning: Tuning,
}

impl Config {
    /// Build the runtime configuration from the environment. Missing required
    /// variables are fatal; the pipeline must not start without them.
    pub fn from_env(query_override: Option<String>) -> Result<Self> {
        let github_token = require_var("GITHUB_API_TOKEN")?;
        let found_keys_path = PathBuf::from(require_var("FOUND_KEYS_PATH")?);
        let cred_list_path = std::env::var("CRED_LIST_FILEPATH").ok().map(PathBuf::from);

        let query = match query_override {
            Some(q) => q,
            None => {
                warn!(
                    "search query not provided, falling back to default \"{}\"",
                    DEFAULT_QUERY
                );
                DEFAULT_QUERY.to_string()
            }
        };

        Ok(Self {
            github_token,
            found_keys_path,
            cred_list_path,
            query,
            tuning: Tuning::load(),
        })
    }
}

fn require_var(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(KeySweepError::Config(format!("{} is not set", name))),
    }
}

/// Tunables read from `config/default.toml`. Every field has a default, so
/// the file itself is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub github_rate_limit_ms: u64,
    pub validator_rate_limit_ms: u64,
    pub validation_concurrency: usize,
    pub graphql_max_pages: u32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            github_rate_limit_ms: 2000,
            validator_rate_limit_ms: 2000,
            validation_concurrency: 4,
            graphql_max_pages: 20,
        }
    }
}

impl Tuning {
    pub fn load() -> Self {
        Self::load_from(&["config/default.toml", ".key_sweep.toml"])
    }

    fn load_from(paths: &[&str]) -> Self {
        for path in paths {
            if Path::new(path).exists() {
                match std::fs::read_to_string(path) {
                    Ok(contents) => match toml::from_str(&contents) {
                        Ok(tuning) => {
                            info!("Loaded tuning from {}", path);
                            return tuning;
                        }
                        Err(e) => warn!("Failed to parse {}: {}", path, e),
                    },
                    Err(e) => warn!("Failed to read {}: {}", path, e),
                }
            }
        }
        Tuning::default()
    }
}
