use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{HybrankError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub rerank: RerankConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub diversity: DiversityConfig,
}

impl Config {
    /// Load configuration: defaults, then the global file (or the explicit
    /// path / `HYBRANK_CONFIG`), then `HYBRANK_*` environment overrides.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("HYBRANK_CONFIG").ok().map(PathBuf::from));

        if let Some(path) = explicit {
            match Self::load_patch(&path)? {
                Some(patch) => config.merge_patch(patch),
                None => {
                    return Err(HybrankError::Config(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
            }
        } else if let Some(global) = Self::load_global()? {
            config.merge_patch(global);
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        let Some(dir) = dirs::config_dir() else {
            return Ok(None);
        };
        Self::load_patch(&dir.join("hybrank/config.toml"))
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| HybrankError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw)
            .map_err(|err| HybrankError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.search {
            self.search.merge(patch);
        }
        if let Some(patch) = patch.rerank {
            self.rerank.merge(patch);
        }
        if let Some(patch) = patch.cache {
            self.cache.merge(patch);
        }
        if let Some(patch) = patch.diversity {
            self.diversity.merge(patch);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(value) = env_f32("HYBRANK_SEARCH_ALPHA")? {
            self.search.alpha = value;
        }
        if let Some(value) = env_usize("HYBRANK_SEARCH_DENSE_K")? {
            self.search.dense_k = value;
        }
        if let Some(value) = env_usize("HYBRANK_SEARCH_SPARSE_K")? {
            self.search.sparse_k = value;
        }
        if let Some(value) = env_usize("HYBRANK_SEARCH_TOPK_DEFAULT")? {
            self.search.topk_default = value;
        }
        if let Some(value) = env_usize("HYBRANK_SEARCH_TOPK_MAX")? {
            self.search.topk_max = value;
        }
        if let Some(value) = env_bool("HYBRANK_SEARCH_LEXICAL_FALLBACK") {
            self.search.lexical_fallback = value;
        }
        if let Some(value) = env_bool("HYBRANK_SEARCH_DENSE_FALLBACK") {
            self.search.dense_fallback = value;
        }

        if let Some(value) = env_bool("HYBRANK_RERANK_ENABLED") {
            self.rerank.enabled = value;
        }
        if let Some(value) = env_usize("HYBRANK_RERANK_POOL_MULTIPLIER")? {
            self.rerank.pool_multiplier = value;
        }
        if let Some(value) = env_usize("HYBRANK_RERANK_MAX_CANDIDATES")? {
            self.rerank.max_candidates = value;
        }
        if let Some(value) = env_u64("HYBRANK_RERANK_TIMEOUT_MS")? {
            self.rerank.timeout_ms = value;
        }

        if let Some(value) = env_bool("HYBRANK_CACHE_ENABLED") {
            self.cache.enabled = value;
        }
        if let Some(value) = env_u64("HYBRANK_CACHE_TTL_SECONDS")? {
            self.cache.ttl_seconds = value;
        }
        if let Some(value) = env_usize("HYBRANK_CACHE_MAX_ENTRIES")? {
            self.cache.max_entries = value;
        }

        if let Some(value) = env_bool("HYBRANK_DIVERSITY_ENABLED") {
            self.diversity.enabled = value;
        }
        if let Some(value) = env_f32("HYBRANK_DIVERSITY_MMR_LAMBDA")? {
            self.diversity.mmr_lambda = value;
        }

        Ok(())
    }

    /// Reject settings the pipeline cannot honor.
    pub fn validate(&self) -> Result<()> {
        let search = &self.search;
        if !(0.0..=1.0).contains(&search.alpha) {
            return Err(HybrankError::Config(format!(
                "search.alpha must be within [0, 1], got {}",
                search.alpha
            )));
        }
        if search.topk_max == 0 {
            return Err(HybrankError::Config("search.topk_max must be at least 1".to_string()));
        }
        if search.topk_default == 0 || search.topk_default > search.topk_max {
            return Err(HybrankError::Config(format!(
                "search.topk_default must be within 1..={}",
                search.topk_max
            )));
        }
        if search.dense_k == 0 || search.sparse_k == 0 {
            return Err(HybrankError::Config(
                "search.dense_k and search.sparse_k must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&search.missing_score) {
            return Err(HybrankError::Config(format!(
                "search.missing_score must be within [0, 1], got {}",
                search.missing_score
            )));
        }
        if self.rerank.pool_multiplier == 0 {
            return Err(HybrankError::Config(
                "rerank.pool_multiplier must be at least 1".to_string(),
            ));
        }
        if self.rerank.max_candidates < search.topk_max {
            return Err(HybrankError::Config(format!(
                "rerank.max_candidates ({}) must be >= search.topk_max ({})",
                self.rerank.max_candidates, search.topk_max
            )));
        }
        if self.rerank.timeout_ms == 0 {
            return Err(HybrankError::Config("rerank.timeout_ms must be positive".to_string()));
        }
        if self.cache.max_entries == 0 {
            return Err(HybrankError::Config("cache.max_entries must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.diversity.mmr_lambda) {
            return Err(HybrankError::Config(format!(
                "diversity.mmr_lambda must be within [0, 1], got {}",
                self.diversity.mmr_lambda
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Dense weight in the hybrid blend; sparse gets `1 - alpha`.
    pub alpha: f32,
    /// Candidates requested from the dense index.
    pub dense_k: usize,
    /// Candidates requested from the sparse index.
    pub sparse_k: usize,
    pub topk_default: usize,
    pub topk_max: usize,
    pub max_query_chars: usize,
    pub snippet_chars: usize,
    /// Normalized score given to a candidate absent from one index's results.
    pub missing_score: f32,
    /// Serve hybrid requests lexical-only when the dense index is down.
    pub lexical_fallback: bool,
    /// Serve hybrid requests dense-only when the sparse index is down.
    pub dense_fallback: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            alpha: 0.6,
            dense_k: 200,
            sparse_k: 200,
            topk_default: 5,
            topk_max: 20,
            max_query_chars: 1000,
            snippet_chars: 200,
            missing_score: 0.0,
            lexical_fallback: false,
            dense_fallback: false,
        }
    }
}

impl SearchConfig {
    fn merge(&mut self, patch: SearchPatch) {
        if let Some(value) = patch.alpha {
            self.alpha = value;
        }
        if let Some(value) = patch.dense_k {
            self.dense_k = value;
        }
        if let Some(value) = patch.sparse_k {
            self.sparse_k = value;
        }
        if let Some(value) = patch.topk_default {
            self.topk_default = value;
        }
        if let Some(value) = patch.topk_max {
            self.topk_max = value;
        }
        if let Some(value) = patch.max_query_chars {
            self.max_query_chars = value;
        }
        if let Some(value) = patch.snippet_chars {
            self.snippet_chars = value;
        }
        if let Some(value) = patch.missing_score {
            self.missing_score = value;
        }
        if let Some(value) = patch.lexical_fallback {
            self.lexical_fallback = value;
        }
        if let Some(value) = patch.dense_fallback {
            self.dense_fallback = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankConfig {
    /// Master switch; when off, rerank requests are ignored.
    pub enabled: bool,
    /// Pool size as a multiple of `topk`.
    pub pool_multiplier: usize,
    /// Hard cap on candidates sent to the scorer.
    pub max_candidates: usize,
    pub timeout_ms: u64,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pool_multiplier: 3,
            max_candidates: 60,
            timeout_ms: 5000,
        }
    }
}

impl RerankConfig {
    fn merge(&mut self, patch: RerankPatch) {
        if let Some(value) = patch.enabled {
            self.enabled = value;
        }
        if let Some(value) = patch.pool_multiplier {
            self.pool_multiplier = value;
        }
        if let Some(value) = patch.max_candidates {
            self.max_candidates = value;
        }
        if let Some(value) = patch.timeout_ms {
            self.timeout_ms = value;
        }
    }

    /// Number of fused candidates handed to the reranker for a given `topk`.
    #[must_use]
    pub fn pool_size(&self, topk: usize) -> usize {
        topk.saturating_mul(self.pool_multiplier)
            .max(topk)
            .min(self.max_candidates.max(topk))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_seconds: u64,
    pub max_entries: usize,
    /// Interval for the background expiry sweep; 0 disables it.
    pub sweep_interval_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: 1800,
            max_entries: 1024,
            sweep_interval_seconds: 60,
        }
    }
}

impl CacheConfig {
    fn merge(&mut self, patch: CachePatch) {
        if let Some(value) = patch.enabled {
            self.enabled = value;
        }
        if let Some(value) = patch.ttl_seconds {
            self.ttl_seconds = value;
        }
        if let Some(value) = patch.max_entries {
            self.max_entries = value;
        }
        if let Some(value) = patch.sweep_interval_seconds {
            self.sweep_interval_seconds = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiversityConfig {
    pub enabled: bool,
    /// Relevance/diversity trade-off for MMR (1.0 = relevance only).
    pub mmr_lambda: f32,
    /// Chunks kept per source URL before MMR; 0 means unlimited.
    pub max_chunks_per_url: usize,
}

impl Default for DiversityConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mmr_lambda: 0.7,
            max_chunks_per_url: 5,
        }
    }
}

impl DiversityConfig {
    fn merge(&mut self, patch: DiversityPatch) {
        if let Some(value) = patch.enabled {
            self.enabled = value;
        }
        if let Some(value) = patch.mmr_lambda {
            self.mmr_lambda = value;
        }
        if let Some(value) = patch.max_chunks_per_url {
            self.max_chunks_per_url = value;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigPatch {
    pub search: Option<SearchPatch>,
    pub rerank: Option<RerankPatch>,
    pub cache: Option<CachePatch>,
    pub diversity: Option<DiversityPatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SearchPatch {
    pub alpha: Option<f32>,
    pub dense_k: Option<usize>,
    pub sparse_k: Option<usize>,
    pub topk_default: Option<usize>,
    pub topk_max: Option<usize>,
    pub max_query_chars: Option<usize>,
    pub snippet_chars: Option<usize>,
    pub missing_score: Option<f32>,
    pub lexical_fallback: Option<bool>,
    pub dense_fallback: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RerankPatch {
    pub enabled: Option<bool>,
    pub pool_multiplier: Option<usize>,
    pub max_candidates: Option<usize>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CachePatch {
    pub enabled: Option<bool>,
    pub ttl_seconds: Option<u64>,
    pub max_entries: Option<usize>,
    pub sweep_interval_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DiversityPatch {
    pub enabled: Option<bool>,
    pub mmr_lambda: Option<f32>,
    pub max_chunks_per_url: Option<usize>,
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|value| {
        matches!(
            value.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn env_usize(key: &str) -> Result<Option<usize>> {
    match std::env::var(key) {
        Ok(value) => value.parse::<usize>().map(Some).map_err(|err| {
            HybrankError::Config(format!("invalid {key} value {value}: {err}"))
        }),
        Err(_) => Ok(None),
    }
}

fn env_u64(key: &str) -> Result<Option<u64>> {
    match std::env::var(key) {
        Ok(value) => value.parse::<u64>().map(Some).map_err(|err| {
            HybrankError::Config(format!("invalid {key} value {value}: {err}"))
        }),
        Err(_) => Ok(None),
    }
}

fn env_f32(key: &str) -> Result<Option<f32>> {
    match std::env::var(key) {
        Ok(value) => value.parse::<f32>().map(Some).map_err(|err| {
            HybrankError::Config(format!("invalid {key} value {value}: {err}"))
        }),
        Err(_) => Ok(None),
    }
}
