//! # Render Core Configuration
//!
//! Tunables for the buffer pools and the render queues. Everything has a
//! working default, so a missing config file is never fatal.
//!
//! ```toml
//! [pools]
//! vertex_slab_elements = 65536
//! index_slab_elements = 262144
//! alignment = 16
//!
//! [queue]
//! instancing_supported = true
//! order_independent = false
//! ```

use super::{Config, ConfigError};
use serde::{Deserialize, Serialize};

/// Slab sizing for the buffer pools
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Vertices a freshly created slab can hold
    pub vertex_slab_elements: u32,
    /// Indices a freshly created slab can hold
    pub index_slab_elements: u32,
    /// Byte alignment of every chunk handed out (power of two)
    pub alignment: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            vertex_slab_elements: 1 << 16,
            index_slab_elements: 1 << 18,
            alignment: 16,
        }
    }
}

impl PoolConfig {
    /// Set the number of vertices per slab
    pub fn with_vertex_slab_elements(mut self, count: u32) -> Self {
        self.vertex_slab_elements = count;
        self
    }

    /// Set the number of indices per slab
    pub fn with_index_slab_elements(mut self, count: u32) -> Self {
        self.index_slab_elements = count;
        self
    }

    /// Set the chunk alignment
    pub fn with_alignment(mut self, alignment: u64) -> Self {
        self.alignment = alignment;
        self
    }

    /// Validate slab sizes and alignment
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.alignment.is_power_of_two() {
            return Err(ConfigError::Invalid(format!(
                "pool alignment must be a power of two, got {}",
                self.alignment
            )));
        }
        if self.vertex_slab_elements == 0 || self.index_slab_elements == 0 {
            return Err(ConfigError::Invalid("slab element counts must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Render queue behaviour switches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Whether the device path supports instanced draws
    pub instancing_supported: bool,
    /// Whether transparent passes use order-independent transparency,
    /// which lets blended geometry be instanced too
    pub order_independent: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            instancing_supported: true,
            order_independent: false,
        }
    }
}

impl QueueConfig {
    /// Enable or disable instanced draws
    pub fn with_instancing_supported(mut self, supported: bool) -> Self {
        self.instancing_supported = supported;
        self
    }

    /// Enable or disable order-independent transparency
    pub fn with_order_independent(mut self, order_independent: bool) -> Self {
        self.order_independent = order_independent;
        self
    }
}

/// Top-level configuration for the render core
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderCoreConfig {
    /// Buffer pool settings
    pub pools: PoolConfig,
    /// Render queue settings
    pub queue: QueueConfig,
}

impl RenderCoreConfig {
    /// Replace the pool settings
    pub fn with_pools(mut self, pools: PoolConfig) -> Self {
        self.pools = pools;
        self
    }

    /// Replace the queue settings
    pub fn with_queue(mut self, queue: QueueConfig) -> Self {
        self.queue = queue;
        self
    }

    /// Validate every section
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pools.validate()
    }
}

impl Config for RenderCoreConfig {}
