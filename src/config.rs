//! Configuration for isokv
//!
//! Centralized configuration with sensible defaults.

use crate::error::{IsoError, Result};

/// Main configuration for an isokv store
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Skip List Configuration
    // -------------------------------------------------------------------------
    /// Height of the sentinel tower; no node grows taller than this
    pub max_level: u8,

    /// Inverse promotion probability: a node climbs one more level with
    /// probability `1 / skip_factor`
    pub skip_factor: u32,

    // -------------------------------------------------------------------------
    // Apply Pipeline Configuration
    // -------------------------------------------------------------------------
    /// Number of committed batches that may queue in front of the executor.
    /// Zero makes every submit a rendezvous with the executor thread.
    pub apply_queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_level: 10,
            skip_factor: 2,
            apply_queue_capacity: 0,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the skip list cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.max_level == 0 {
            return Err(IsoError::Config("max_level must be at least 1".to_string()));
        }
        if self.skip_factor < 2 {
            return Err(IsoError::Config(format!(
                "skip_factor must be at least 2, got {}",
                self.skip_factor
            )));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the maximum skip list level
    pub fn max_level(mut self, level: u8) -> Self {
        self.config.max_level = level;
        self
    }

    /// Set the skip factor used by the level generator
    pub fn skip_factor(mut self, factor: u32) -> Self {
        self.config.skip_factor = factor;
        self
    }

    /// Set how many committed batches may wait for the executor
    pub fn apply_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.apply_queue_capacity = capacity;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
