//! Display engine façade
//!
//! Producer threads call [`DisplayEngine::acquire_image`] /
//! [`DisplayEngine::queue_image`]; the render thread calls
//! [`DisplayEngine::display_queued_image`] once per display refresh.
//! Device access is serialized behind one coarse lock; the lock is
//! dropped while the render thread waits for a filled frame so
//! producers are never stalled by the wait.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};

use crate::config::DisplayConfig;
use crate::display::backend::{AcquireOutcome, GpuBackend, PresentOutcome, SlotImage};
use crate::display::error::{DisplayError, DisplayResult};
use crate::display::format::ImageDescription;
use crate::display::pool::SlotPool;
use crate::display::queue::HandoffQueue;
use crate::display::ring::FrameRing;
use crate::display::slot::{FrameHandle, FrameSlot};
use crate::display::surface::{AcquireRetry, WindowHandler, WindowParameters};
use crate::display::viewport::RenderArea;

/// State touched only by the render thread
struct RenderLoopState<B: GpuBackend> {
    ring: FrameRing<FrameSlot<B::SlotImage>, B::FrameResources>,
    current: Option<ImageDescription>,
    area: RenderArea,
}

/// Frame presentation engine generic over the GPU backend
pub struct DisplayEngine<B: GpuBackend> {
    device: Mutex<B>,
    window: Arc<dyn WindowHandler>,
    config: DisplayConfig,
    pool: Mutex<SlotPool<B::SlotImage>>,
    /// Slots released by the render thread, flowing back to producers
    available: HandoffQueue<FrameSlot<B::SlotImage>>,
    /// Filled frames waiting to be displayed
    filled: HandoffQueue<FrameSlot<B::SlotImage>>,
    render: Mutex<RenderLoopState<B>>,
    /// Size pushed by `window_parameters_changed`; overrides the handler
    window_hint: Mutex<Option<WindowParameters>>,
    destroyed: AtomicBool,
}

impl<B: GpuBackend> DisplayEngine<B> {
    /// Build the engine over an initialized backend
    pub fn new(
        mut backend: B,
        window: Arc<dyn WindowHandler>,
        config: DisplayConfig,
    ) -> DisplayResult<Self> {
        let resources = backend.create_frame_resources(config.frame_resource_count)?;
        info!(
            "display engine ready: {} slots, {} frame resources, filled capacity {}",
            config.initial_slot_count, config.frame_resource_count, config.filled_queue_capacity
        );
        Ok(Self {
            available: HandoffQueue::new(config.available_queue_capacity),
            filled: HandoffQueue::new(config.filled_queue_capacity),
            pool: Mutex::new(SlotPool::new(config.initial_slot_count)),
            render: Mutex::new(RenderLoopState {
                ring: FrameRing::new(resources),
                current: None,
                area: RenderArea::default(),
            }),
            device: Mutex::new(backend),
            window,
            config,
            window_hint: Mutex::new(None),
            destroyed: AtomicBool::new(false),
        })
    }

    /// Configuration the engine was built with
    pub fn config(&self) -> &DisplayConfig {
        &self.config
    }

    /// Whether the device can display frames of this description
    pub fn is_format_supported(&self, description: ImageDescription) -> DisplayResult<bool> {
        self.device
            .lock()
            .unwrap()
            .is_description_supported(description)
    }

    /// Record a drawable size pushed by the platform layer
    ///
    /// Call from resize events when no [`WindowHandler`] can report the
    /// size on demand; a pushed size takes precedence over the handler
    /// from then on. The next display cycle refits the render area, and
    /// a zero-area size is treated as minimized.
    pub fn window_parameters_changed(&self, parameters: WindowParameters) {
        debug!(
            "window parameters changed: {}x{}",
            parameters.width, parameters.height
        );
        *self.window_hint.lock().unwrap() = Some(parameters);
    }

    fn window_parameters(&self) -> WindowParameters {
        self.window_hint
            .lock()
            .unwrap()
            .unwrap_or_else(|| self.window.window_parameters())
    }

    /// Acquire a writable frame slot for the given description
    ///
    /// Reuses a pooled slot when one is free, waits briefly for the
    /// render thread to release one, and grows the pool as a last
    /// resort. The returned handle's image matches `description`
    /// exactly and the GPU is guaranteed to be done reading it.
    pub fn acquire_image(
        &self,
        description: ImageDescription,
    ) -> DisplayResult<FrameHandle<B::SlotImage>> {
        self.ensure_alive()?;
        {
            let mut device = self.device.lock().unwrap();
            device.check_displayable(description)?;
        }

        let mut slot = {
            let mut pool = self.pool.lock().unwrap();
            pool.take(&self.available, self.config.acquire_slot_timeout())
        };

        let mut device = self.device.lock().unwrap();
        let matches = slot
            .image()
            .map_or(false, |image| image.description() == description);
        if matches {
            if slot.was_submitted() {
                if let Some(image) = slot.image() {
                    device.wait_slot_released(image)?;
                }
            }
        } else {
            if let Some(mut old) = slot.take_image() {
                device.wait_slot_released(&old)?;
                device.destroy_slot_image(&mut old);
            }
            match device.create_slot_image(description) {
                Ok(image) => slot.attach_image(image),
                Err(err) => {
                    drop(device);
                    self.pool.lock().unwrap().release_local(slot);
                    return Err(err);
                }
            }
        }
        Ok(FrameHandle::new(slot))
    }

    /// Hand a filled frame to the render thread
    ///
    /// Non-discardable frames block until the filled queue has space.
    /// Discardable frames wait briefly and are dropped back into the
    /// pool under backpressure. Returns `true` if the frame was
    /// dropped.
    pub fn queue_image(
        &self,
        frame: FrameHandle<B::SlotImage>,
        discardable: bool,
    ) -> DisplayResult<bool> {
        let mut slot = frame.into_slot();
        if self.destroyed.load(Ordering::Acquire) {
            let mut device = self.device.lock().unwrap();
            if let Some(mut image) = slot.take_image() {
                device.destroy_slot_image(&mut image);
            }
            return Ok(true);
        }

        if !discardable {
            self.filled.push_blocking(slot);
            return Ok(false);
        }
        match self
            .filled
            .push_timeout(slot, self.config.discard_push_timeout())
        {
            Ok(()) => Ok(false),
            Err(slot) => {
                debug!("filled queue full; discarding frame from slot {}", slot.id());
                self.pool.lock().unwrap().release_local(slot);
                Ok(true)
            }
        }
    }

    /// Return an acquired frame to the pool without displaying it
    pub fn discard_image(&self, frame: FrameHandle<B::SlotImage>) {
        self.pool.lock().unwrap().release_local(frame.into_slot());
    }

    /// Copy a tightly packed frame buffer into a fresh slot and queue it
    /// as non-discardable
    pub fn copy_and_queue(
        &self,
        data: &[u8],
        description: ImageDescription,
    ) -> DisplayResult<bool> {
        let packed_row = description.packed_row_bytes();
        let expected = packed_row * description.height as usize;
        if data.len() < expected {
            return Err(DisplayError::Unsupported {
                reason: format!(
                    "source buffer holds {} bytes, {description:?} needs {expected}",
                    data.len()
                ),
            });
        }

        let mut frame = self.acquire_image(description)?;
        let pitch = frame.row_pitch();
        let bytes = frame.bytes_mut();
        if pitch == packed_row {
            bytes[..expected].copy_from_slice(&data[..expected]);
        } else {
            for (row, chunk) in data[..expected].chunks_exact(packed_row).enumerate() {
                let start = row * pitch;
                bytes[start..start + packed_row].copy_from_slice(chunk);
            }
        }
        self.queue_image(frame, false)
    }

    /// Display the next queued frame, if any
    ///
    /// Returns `Ok(true)` when a frame was presented and `Ok(false)`
    /// when nothing was displayed this cycle (no frame arrived in time,
    /// no free frame resources, or the window is minimized).
    pub fn display_queued_image(&self) -> DisplayResult<bool> {
        if self.destroyed.load(Ordering::Acquire) {
            return Ok(false);
        }
        let mut render = self.render.lock().unwrap();

        let params = self.window_parameters();
        if params.is_minimized() {
            let mut device = self.device.lock().unwrap();
            self.reclaim_finished(&mut render, &mut device)?;
            while let Some(slot) = self.filled.try_pop() {
                self.release_slot(slot);
            }
            return Ok(false);
        }

        {
            let mut device = self.device.lock().unwrap();
            self.reclaim_finished(&mut render, &mut device)?;
        }

        let Some(resources) = render.ring.take_free() else {
            return Ok(false);
        };
        // Device lock intentionally not held while waiting.
        let Some(mut slot) = self.filled.pop_timeout(self.config.filled_pop_timeout()) else {
            render.ring.put_free(resources);
            return Ok(false);
        };

        let mut device = self.device.lock().unwrap();

        if let Some(preprocess) = slot.take_preprocess() {
            if let Some(image) = slot.image_mut() {
                preprocess(image);
            }
        }

        let Some(description) = slot.image().map(|image| image.description()) else {
            render.ring.put_free(resources);
            self.release_slot(slot);
            return Ok(false);
        };

        // Pipeline state depends only on the pixel format; a size-only
        // change just refits the render area.
        if render.current.map(|c| c.format) != Some(description.format) {
            if let Err(err) = device.reconfigure_pipeline(description) {
                render.ring.put_free(resources);
                self.release_slot(slot);
                return Err(err);
            }
        }
        render.current = Some(description);
        render.area = RenderArea::fit(description.width, description.height, params);

        let mut retry = AcquireRetry::new(self.config.max_surface_retries);
        let surface_index = loop {
            let params = self.window_parameters();
            if params.is_minimized() {
                render.ring.put_free(resources);
                self.release_slot(slot);
                return Ok(false);
            }
            let outcome = match device.acquire_surface_image(&resources) {
                Ok(outcome) => outcome,
                Err(err) => {
                    render.ring.put_free(resources);
                    self.release_slot(slot);
                    return Err(err);
                }
            };
            match outcome {
                AcquireOutcome::Image(index) => break index,
                AcquireOutcome::Stale => {
                    if let Err(err) = retry.failure() {
                        render.ring.put_free(resources);
                        self.release_slot(slot);
                        return Err(err);
                    }
                    debug!(
                        "stale surface, recreating ({} of {} attempts)",
                        retry.attempts(),
                        self.config.max_surface_retries
                    );
                    let recreate = device
                        .wait_idle()
                        .and_then(|()| device.recreate_surface(params));
                    if let Err(err) = recreate {
                        render.ring.put_free(resources);
                        self.release_slot(slot);
                        return Err(err);
                    }
                    render.area =
                        RenderArea::fit(description.width, description.height, params);
                }
                AcquireOutcome::Timeout => {
                    if let Err(err) = retry.failure() {
                        render.ring.put_free(resources);
                        self.release_slot(slot);
                        return Err(err);
                    }
                }
            }
        };

        let submit = match slot.image_mut() {
            Some(image) => device.submit_frame(&resources, image, surface_index, render.area),
            None => Ok(()),
        };
        if let Err(err) = submit {
            render.ring.put_free(resources);
            self.release_slot(slot);
            return Err(err);
        }
        slot.mark_submitted();

        let present = device.present_frame(&resources, surface_index);
        // Slot and token are tracked even if present failed; teardown
        // reclaims them.
        render.ring.push_in_flight(slot, resources);
        match present? {
            PresentOutcome::Presented => {}
            PresentOutcome::Stale => {
                debug!("present reported stale surface; next acquire recreates");
            }
        }
        Ok(true)
    }

    /// Tear down the engine: drain every queue, free all slot images,
    /// and release the backend. Idempotent; also run by `Drop`.
    pub fn destroy(&self) -> DisplayResult<()> {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        info!("destroying display engine");
        let mut render = self.render.lock().unwrap();
        let mut device = self.device.lock().unwrap();
        if let Err(err) = device.wait_idle() {
            warn!("device wait failed during teardown: {err}");
        }

        let mut slots = render.ring.drain_in_flight();
        while let Some(slot) = self.filled.try_pop() {
            slots.push(slot);
        }
        while let Some(slot) = self.available.try_pop() {
            slots.push(slot);
        }
        slots.extend(self.pool.lock().unwrap().drain_local());
        for mut slot in slots {
            if let Some(mut image) = slot.take_image() {
                device.destroy_slot_image(&mut image);
            }
        }
        device.destroy();
        Ok(())
    }

    fn ensure_alive(&self) -> DisplayResult<()> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(DisplayError::InitializationFailed(
                "display engine already destroyed".to_string(),
            ));
        }
        Ok(())
    }

    /// Release finished in-flight frames back to the producer queue
    fn reclaim_finished(
        &self,
        render: &mut RenderLoopState<B>,
        device: &mut B,
    ) -> DisplayResult<()> {
        let mut overflow = Vec::new();
        render.ring.reclaim(
            |slot| match slot.image() {
                Some(image) => device.poll_slot_released(image),
                None => Ok(true),
            },
            |slot| {
                if let Err(slot) = self.available.try_push(slot) {
                    overflow.push(slot);
                }
            },
        )?;
        for slot in overflow {
            debug!(
                "released-slot queue full; returning slot {} to the pool",
                slot.id()
            );
            self.pool.lock().unwrap().release_local(slot);
        }
        Ok(())
    }

    /// Route a slot back to producers, falling back to the pool's free
    /// list when the queue is full so no slot is ever lost
    fn release_slot(&self, slot: FrameSlot<B::SlotImage>) {
        if let Err(slot) = self.available.try_push(slot) {
            debug!(
                "released-slot queue full; returning slot {} to the pool",
                slot.id()
            );
            self.pool.lock().unwrap().release_local(slot);
        }
    }

    #[cfg(test)]
    pub(crate) fn backend(&self) -> std::sync::MutexGuard<'_, B> {
        self.device.lock().unwrap()
    }

    #[cfg(test)]
    pub(crate) fn filled_len(&self) -> usize {
        self.filled.len()
    }

    #[cfg(test)]
    pub(crate) fn available_len(&self) -> usize {
        self.available.len()
    }

    #[cfg(test)]
    pub(crate) fn pool_total(&self) -> usize {
        self.pool.lock().unwrap().total()
    }

    #[cfg(test)]
    pub(crate) fn in_flight_len(&self) -> usize {
        self.render.lock().unwrap().ring.in_flight_len()
    }
}

impl<B: GpuBackend> Drop for DisplayEngine<B> {
    fn drop(&mut self) {
        if let Err(err) = self.destroy() {
            warn!("display engine teardown failed: {err}");
        }
    }
}
