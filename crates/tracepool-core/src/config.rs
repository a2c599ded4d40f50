use std::path::Path;

use anyhow::{Context, Result};
use config as cfg;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Sizing and policy knobs for a [`StringPool`](crate::StringPool).
///
/// The defaults are empirical: 256 buckets with a 50-insertion overload
/// threshold and roughly ten megabytes of string storage served in 4 KiB
/// pages. Loaded files and `TRACEPOOL__*` environment variables override
/// individual fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PoolConfig {
    /// Number of hash buckets; each owns one balanced tree.
    #[serde(default = "PoolConfig::default_bucket_count")]
    pub bucket_count: usize,
    /// Once a bucket has taken more than this many insertions it stops
    /// deduplicating and hands out fresh copies instead.
    #[serde(default = "PoolConfig::default_fallback_threshold")]
    pub fallback_threshold: u32,
    /// Size in bytes of one string-body page.
    #[serde(default = "PoolConfig::default_byte_page_size")]
    pub byte_page_size: usize,
    /// Page limit of the string-body arena.
    #[serde(default = "PoolConfig::default_pages")]
    pub byte_pages: usize,
    /// Slots per page in the node and record arenas.
    #[serde(default = "PoolConfig::default_slots_per_page")]
    pub slots_per_page: usize,
    /// Page limit of the tree-node arena.
    #[serde(default = "PoolConfig::default_pages")]
    pub node_pages: usize,
    /// Page limit of the string-record arena.
    #[serde(default = "PoolConfig::default_pages")]
    pub record_pages: usize,
}

impl PoolConfig {
    fn default_bucket_count() -> usize {
        256
    }

    fn default_fallback_threshold() -> u32 {
        50
    }

    fn default_byte_page_size() -> usize {
        4096
    }

    fn default_pages() -> usize {
        256 * 10
    }

    fn default_slots_per_page() -> usize {
        256
    }

    /// Every bucket in one tree and the overload fallback switched off.
    pub fn single_bucket() -> Self {
        Self {
            bucket_count: 1,
            fallback_threshold: u32::MAX,
            ..Self::default()
        }
    }

    pub fn with_buckets(mut self, bucket_count: usize) -> Self {
        self.bucket_count = bucket_count;
        self
    }

    pub fn with_fallback_threshold(mut self, threshold: u32) -> Self {
        self.fallback_threshold = threshold;
        self
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.bucket_count > 0, "bucket_count must be > 0");
        anyhow::ensure!(self.byte_page_size > 0, "byte_page_size must be > 0");
        anyhow::ensure!(self.byte_pages > 0, "byte_pages must be > 0");
        anyhow::ensure!(self.slots_per_page > 0, "slots_per_page must be > 0");
        anyhow::ensure!(self.node_pages > 0, "node_pages must be > 0");
        anyhow::ensure!(self.record_pages > 0, "record_pages must be > 0");

        // arena handles pack page and offset into 32 bits each
        let limit = u32::MAX as usize;
        anyhow::ensure!(self.byte_page_size <= limit, "byte_page_size must fit in u32");
        anyhow::ensure!(self.slots_per_page <= limit, "slots_per_page must fit in u32");
        anyhow::ensure!(self.byte_pages < limit, "byte_pages must be below u32::MAX");
        anyhow::ensure!(self.node_pages < limit, "node_pages must be below u32::MAX");
        anyhow::ensure!(self.record_pages < limit, "record_pages must be below u32::MAX");
        Ok(())
    }

    /// Layer `default.toml` and `local.toml` from `config_dir` (both
    /// optional) under `TRACEPOOL__*` environment variables.
    pub fn load_from_sources(config_dir: &Path) -> Result<Self> {
        let loaded: Self = cfg::Config::builder()
            .add_source(cfg::File::from(config_dir.join("default.toml")).required(false))
            .add_source(cfg::File::from(config_dir.join("local.toml")).required(false))
            .add_source(
                cfg::Environment::with_prefix("TRACEPOOL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("building pool configuration")?
            .try_deserialize()
            .context("deserializing pool configuration")?;
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn from_toml_str(source: &str) -> Result<Self> {
        let parsed: Self = toml::from_str(source).context("parsing pool configuration")?;
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("serializing pool configuration")
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            bucket_count: Self::default_bucket_count(),
            fallback_threshold: Self::default_fallback_threshold(),
            byte_page_size: Self::default_byte_page_size(),
            byte_pages: Self::default_pages(),
            slots_per_page: Self::default_slots_per_page(),
            node_pages: Self::default_pages(),
            record_pages: Self::default_pages(),
        }
    }
}
