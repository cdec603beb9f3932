//! GPU backend seam
//!
//! The engine's orchestration is generic over this trait so that the
//! queueing, pooling, retry, and teardown logic runs identically
//! against the Vulkan backend and the scripted test backend.

use crate::display::error::DisplayResult;
use crate::display::format::ImageDescription;
use crate::display::surface::WindowParameters;
use crate::display::viewport::RenderArea;

/// Result of trying to acquire a surface image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// A surface image is ready at this index
    Image(u32),
    /// The surface no longer matches the window; recreate and retry
    Stale,
    /// No image became available in time; retry without recreating
    Timeout,
}

/// Result of presenting a finished frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// The frame reached the display
    Presented,
    /// The frame was consumed but the surface should be recreated
    /// before the next one
    Stale,
}

/// A host-visible image owned by a frame slot
pub trait SlotImage: Send {
    /// Description the image was created for
    fn description(&self) -> ImageDescription;
    /// Byte stride between row starts; at least the packed row size
    fn row_pitch(&self) -> usize;
    /// The mapped host bytes
    fn bytes_mut(&mut self) -> &mut [u8];
}

/// Device operations behind the display engine
///
/// All calls happen under the engine's device lock; implementations
/// need no interior synchronization.
pub trait GpuBackend: Send + 'static {
    /// Host-visible slot image type
    type SlotImage: SlotImage;
    /// Per-frame resource token (semaphores, command buffer, descriptors)
    type FrameResources: Send;

    /// Create the fixed set of per-frame resource tokens
    fn create_frame_resources(&mut self, count: usize)
        -> DisplayResult<Vec<Self::FrameResources>>;

    /// Whether the device can display this description at all
    fn is_description_supported(&mut self, description: ImageDescription) -> DisplayResult<bool>;

    /// Error with the precise reason if the description is unsupported
    fn check_displayable(&mut self, description: ImageDescription) -> DisplayResult<()>;

    /// Allocate a host-mapped slot image for the description
    fn create_slot_image(&mut self, description: ImageDescription)
        -> DisplayResult<Self::SlotImage>;

    /// Free a slot image's device objects
    fn destroy_slot_image(&mut self, image: &mut Self::SlotImage);

    /// Block until the GPU has released the image (producer reuse guard)
    fn wait_slot_released(&mut self, image: &Self::SlotImage) -> DisplayResult<()>;

    /// Non-blocking check whether the GPU has released the image
    fn poll_slot_released(&mut self, image: &Self::SlotImage) -> DisplayResult<bool>;

    /// Rebuild format-dependent pipeline state for a new description
    fn reconfigure_pipeline(&mut self, description: ImageDescription) -> DisplayResult<()>;

    /// Try to acquire a surface image for this frame's resources
    fn acquire_surface_image(
        &mut self,
        resources: &Self::FrameResources,
    ) -> DisplayResult<AcquireOutcome>;

    /// Rebuild the surface for the current window parameters
    fn recreate_surface(&mut self, parameters: WindowParameters) -> DisplayResult<()>;

    /// Record and submit the upload + draw work for one frame
    fn submit_frame(
        &mut self,
        resources: &Self::FrameResources,
        image: &mut Self::SlotImage,
        surface_index: u32,
        area: RenderArea,
    ) -> DisplayResult<()>;

    /// Present the submitted frame
    fn present_frame(
        &mut self,
        resources: &Self::FrameResources,
        surface_index: u32,
    ) -> DisplayResult<PresentOutcome>;

    /// Wait for the device to go idle
    fn wait_idle(&mut self) -> DisplayResult<()>;

    /// Release all device objects; called exactly once at teardown
    fn destroy(&mut self);
}
