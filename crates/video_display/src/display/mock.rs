//! Scripted in-memory backend for engine tests
//!
//! Models the device as plain state: slot images are byte vectors with
//! a fake row pitch, the per-slot fence is a shared flag, and surface
//! acquisition follows a script of outcomes. No GPU is touched.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use crate::display::backend::{AcquireOutcome, GpuBackend, PresentOutcome, SlotImage};
use crate::display::error::{DisplayError, DisplayResult};
use crate::display::format::ImageDescription;
use crate::display::surface::{WindowHandler, WindowParameters};
use crate::display::viewport::RenderArea;

/// Extra bytes added per row to exercise pitch-aware copies
const MOCK_PITCH_PADDING: usize = 16;

/// Host-visible image backed by a plain byte vector
pub struct MockSlotImage {
    description: ImageDescription,
    pitch: usize,
    bytes: Vec<u8>,
    busy: Arc<AtomicBool>,
}

impl MockSlotImage {
    /// Allocate an image with a deliberately padded row pitch
    pub fn new(description: ImageDescription) -> Self {
        let pitch = description.packed_row_bytes() + MOCK_PITCH_PADDING;
        Self {
            description,
            pitch,
            bytes: vec![0; pitch * description.height as usize],
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Read-only view of the image bytes
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl SlotImage for MockSlotImage {
    fn description(&self) -> ImageDescription {
        self.description
    }

    fn row_pitch(&self) -> usize {
        self.pitch
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

/// Window whose drawable size tests can change at any time
pub struct MockWindow {
    width: AtomicU32,
    height: AtomicU32,
}

impl MockWindow {
    pub fn new(width: u32, height: u32) -> Arc<Self> {
        Arc::new(Self {
            width: AtomicU32::new(width),
            height: AtomicU32::new(height),
        })
    }

    pub fn set_size(&self, width: u32, height: u32) {
        self.width.store(width, Ordering::Release);
        self.height.store(height, Ordering::Release);
    }
}

impl WindowHandler for MockWindow {
    fn window_parameters(&self) -> WindowParameters {
        WindowParameters::new(
            self.width.load(Ordering::Acquire),
            self.height.load(Ordering::Acquire),
        )
    }
}

/// Record of one submitted frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitRecord {
    /// First byte of the image, used by tests as a frame tag
    pub tag: u8,
    /// Surface image index the frame was drawn into
    pub surface_index: u32,
    /// Render area the frame was fitted to
    pub area: RenderArea,
}

/// Scripted GPU backend
pub struct MockBackend {
    /// Outcomes returned by successive surface acquisitions; once the
    /// script runs dry every acquisition yields image 0
    pub acquire_script: VecDeque<AcquireOutcome>,
    /// Outcomes returned by successive presents; defaults to Presented
    pub present_script: VecDeque<PresentOutcome>,
    /// When false, submitted frames stay busy until completed by the
    /// test; when true (default) frames finish instantly
    pub auto_complete: bool,
    /// Descriptions the fake device refuses to display
    pub rejected: Vec<ImageDescription>,

    pub reconfigure_count: u32,
    pub recreate_count: u32,
    pub last_recreate: Option<WindowParameters>,
    pub images_created: u32,
    pub images_destroyed: u32,
    pub wait_idle_count: u32,
    pub submits: Vec<SubmitRecord>,
    pub destroyed: bool,

    pending: VecDeque<Arc<AtomicBool>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
            auto_complete: true,
            rejected: Vec::new(),
            reconfigure_count: 0,
            recreate_count: 0,
            last_recreate: None,
            images_created: 0,
            images_destroyed: 0,
            wait_idle_count: 0,
            submits: Vec::new(),
            destroyed: false,
            pending: VecDeque::new(),
        }
    }

    /// Mark the oldest still-busy frame as finished
    pub fn complete_oldest(&mut self) {
        if let Some(flag) = self.pending.pop_front() {
            flag.store(false, Ordering::Release);
        }
    }

    /// Frames submitted but not yet completed
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

impl GpuBackend for MockBackend {
    type SlotImage = MockSlotImage;
    type FrameResources = u32;

    fn create_frame_resources(&mut self, count: usize) -> DisplayResult<Vec<u32>> {
        Ok((0..count as u32).collect())
    }

    fn is_description_supported(&mut self, description: ImageDescription) -> DisplayResult<bool> {
        Ok(!description.is_empty() && !self.rejected.contains(&description))
    }

    fn check_displayable(&mut self, description: ImageDescription) -> DisplayResult<()> {
        if self.is_description_supported(description)? {
            Ok(())
        } else {
            Err(DisplayError::Unsupported {
                reason: format!("{description:?} rejected by mock device"),
            })
        }
    }

    fn create_slot_image(&mut self, description: ImageDescription) -> DisplayResult<MockSlotImage> {
        self.images_created += 1;
        Ok(MockSlotImage::new(description))
    }

    fn destroy_slot_image(&mut self, _image: &mut MockSlotImage) {
        self.images_destroyed += 1;
    }

    fn wait_slot_released(&mut self, image: &MockSlotImage) -> DisplayResult<()> {
        image.busy.store(false, Ordering::Release);
        Ok(())
    }

    fn poll_slot_released(&mut self, image: &MockSlotImage) -> DisplayResult<bool> {
        Ok(!image.busy.load(Ordering::Acquire))
    }

    fn reconfigure_pipeline(&mut self, _description: ImageDescription) -> DisplayResult<()> {
        self.reconfigure_count += 1;
        Ok(())
    }

    fn acquire_surface_image(&mut self, _resources: &u32) -> DisplayResult<AcquireOutcome> {
        Ok(self
            .acquire_script
            .pop_front()
            .unwrap_or(AcquireOutcome::Image(0)))
    }

    fn recreate_surface(&mut self, parameters: WindowParameters) -> DisplayResult<()> {
        self.recreate_count += 1;
        self.last_recreate = Some(parameters);
        Ok(())
    }

    fn submit_frame(
        &mut self,
        _resources: &u32,
        image: &mut MockSlotImage,
        surface_index: u32,
        area: RenderArea,
    ) -> DisplayResult<()> {
        self.submits.push(SubmitRecord {
            tag: image.bytes.first().copied().unwrap_or(0),
            surface_index,
            area,
        });
        if !self.auto_complete {
            image.busy.store(true, Ordering::Release);
            self.pending.push_back(Arc::clone(&image.busy));
        }
        Ok(())
    }

    fn present_frame(&mut self, _resources: &u32, _surface_index: u32) -> DisplayResult<PresentOutcome> {
        Ok(self
            .present_script
            .pop_front()
            .unwrap_or(PresentOutcome::Presented))
    }

    fn wait_idle(&mut self) -> DisplayResult<()> {
        self.wait_idle_count += 1;
        Ok(())
    }

    fn destroy(&mut self) {
        self.destroyed = true;
    }
}
