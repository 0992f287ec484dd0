use crate::builder::BuildPolicy;
use crate::persist::CacheConfig;
use crate::query::QueryConfig;
use crate::tokenizer::TokenizerConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Every tunable of a search session. Missing sections and fields take their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub tokenizer: TokenizerConfig,
    pub build: BuildPolicy,
    pub cache: CacheConfig,
    pub query: QueryConfig,
    /// Hits per result page.
    pub page_size: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            tokenizer: TokenizerConfig::default(),
            build: BuildPolicy::default(),
            cache: CacheConfig::default(),
            query: QueryConfig::default(),
            page_size: 10,
        }
    }
}

impl SearchConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
        let config = serde_json::from_str(&raw).with_context(|| format!("parse config {}", path.display()))?;
        Ok(config)
    }

    /// Load `path` when given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}
