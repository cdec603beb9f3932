//! Error taxonomy for the display engine
//!
//! Fatal conditions (unsupported capability, device-level failures,
//! unrecoverable surface loss) are surfaced through these variants;
//! transient conditions (nothing queued, no free ring entry, minimized
//! window) are reported as `Ok(false)` from the affected call instead.

use ash::vk;
use thiserror::Error;

/// Errors surfaced by the display engine and its GPU backends
#[derive(Error, Debug)]
pub enum DisplayError {
    /// The requested image description cannot be displayed on this device
    #[error("unsupported image format: {reason}")]
    Unsupported {
        /// Why the format cannot be displayed
        reason: String,
    },

    /// The presentation surface stayed stale/timed out past the retry cap
    #[error("presentation surface could not be recovered after {attempts} attempts")]
    SurfaceUnrecoverable {
        /// Number of recreation attempts made before giving up
        attempts: u32,
    },

    /// Device memory or object allocation failed
    #[error("allocation failed: {reason}")]
    Allocation {
        /// What could not be allocated
        reason: String,
    },

    /// Raw Vulkan API error, always fatal (no device-loss recovery)
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// A shader blob could not be read from the configured directory
    #[error("failed to load shader '{name}': {source}")]
    ShaderLoad {
        /// Logical shader name (e.g. "vert.spv")
        name: String,
        /// Underlying IO failure
        #[source]
        source: std::io::Error,
    },

    /// Engine initialization failed before any frame was displayed
    #[error("initialization failed: {0}")]
    InitializationFailed(String),
}

/// Result type for display engine operations
pub type DisplayResult<T> = Result<T, DisplayError>;
