//! GPU frame presentation engine for real-time video pipelines
//!
//! An upstream producer (decoder, capture device, network receiver)
//! fills host-mapped image slots while a render thread uploads and
//! presents them at display pace. The two sides meet only at bounded
//! handoff queues, so a slow display drops discardable frames instead
//! of stalling the pipeline, and a slow producer simply leaves the
//! last frame on screen.
//!
//! ```no_run
//! use std::sync::Arc;
//! use video_display::{DisplayConfig, ImageDescription, PixelFormat, VulkanDisplay};
//! # fn window_handler() -> Arc<dyn video_display::WindowHandler> { unimplemented!() }
//! # fn surface_backend(_: &DisplayConfig) -> video_display::vulkan::VulkanBackend { unimplemented!() }
//!
//! let config = DisplayConfig::default();
//! let display = Arc::new(VulkanDisplay::new(
//!     surface_backend(&config),
//!     window_handler(),
//!     config,
//! )?);
//!
//! // Producer thread:
//! let desc = ImageDescription::new(1920, 1080, PixelFormat::Uyvy);
//! let mut frame = display.acquire_image(desc)?;
//! // ... write desc.height rows, frame.row_pitch() apart ...
//! display.queue_image(frame, true)?;
//!
//! // Render thread, once per refresh:
//! display.display_queued_image()?;
//! # Ok::<(), video_display::DisplayError>(())
//! ```

pub mod config;
pub mod display;
pub mod vulkan;

pub use config::{ConfigError, DisplayConfig};
pub use display::{
    AcquireOutcome, DisplayEngine, DisplayError, DisplayResult, FrameHandle, GpuBackend,
    ImageDescription, PixelFormat, PresentOutcome, RenderArea, SlotImage, WindowHandler,
    WindowParameters,
};

/// Display engine running on the Vulkan backend
pub type VulkanDisplay = DisplayEngine<vulkan::VulkanBackend>;
