//! Display configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tunable parameters of the display engine
///
/// Every field has a working default; applications typically override
/// only `shader_path` and `vsync`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Slots allocated up front; the pool grows past this on demand
    pub initial_slot_count: usize,
    /// Capacity of the filled queue. 1 keeps latency minimal and drops
    /// discardable frames under backpressure; larger values buffer
    /// bursts at the cost of latency.
    pub filled_queue_capacity: usize,
    /// Capacity of the released-slot queue back to the producer
    pub available_queue_capacity: usize,
    /// Per-frame GPU resource sets cycling through the ring
    pub frame_resource_count: usize,
    /// How long the render thread waits for a filled frame per cycle
    pub filled_pop_timeout_ms: u64,
    /// How long slot acquisition waits for a released slot before
    /// growing the pool
    pub acquire_slot_timeout_ms: u64,
    /// How long a discardable frame waits for queue space before being
    /// dropped
    pub discard_push_timeout_ms: u64,
    /// Surface acquisition attempts before giving up as unrecoverable
    pub max_surface_retries: u32,
    /// Directory holding the compiled SPIR-V shaders
    pub shader_path: PathBuf,
    /// Prefer a vsynced present mode
    pub vsync: bool,
    /// Allow tearing present modes when vsync is off
    pub tearing_permitted: bool,
    /// Force a specific physical device by enumeration index
    pub gpu_index: Option<u32>,
    /// Enable Vulkan validation layers
    pub enable_validation: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            initial_slot_count: 3,
            filled_queue_capacity: 1,
            available_queue_capacity: 8,
            frame_resource_count: 3,
            filled_pop_timeout_ms: 50,
            acquire_slot_timeout_ms: 5,
            discard_push_timeout_ms: 1,
            max_surface_retries: 3,
            shader_path: PathBuf::from("./shaders"),
            vsync: true,
            tearing_permitted: false,
            gpu_index: None,
            enable_validation: false,
        }
    }
}

impl DisplayConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(path, contents).map_err(ConfigError::Io)
    }

    /// Render-thread wait for a filled frame
    pub fn filled_pop_timeout(&self) -> Duration {
        Duration::from_millis(self.filled_pop_timeout_ms)
    }

    /// Producer wait for a released slot before pool growth
    pub fn acquire_slot_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_slot_timeout_ms)
    }

    /// Discardable-frame wait for filled-queue space
    pub fn discard_push_timeout(&self) -> Duration {
        Duration::from_millis(self.discard_push_timeout_ms)
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),
}
