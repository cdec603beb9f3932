//! Frame slots and the producer-facing frame handle
//!
//! A slot is owned by exactly one place at a time: the pool's free
//! list, the producer (as a [`FrameHandle`]), one of the handoff
//! queues, or the in-flight ring. Ownership moves with the value; no
//! slot is ever aliased across threads.

use crate::display::backend::SlotImage;
use crate::display::format::ImageDescription;

/// One-shot closure run on the image bytes just before upload
pub type PreprocessFn<I> = Box<dyn FnOnce(&mut I) + Send>;

/// A pooled frame slot with its backend image
pub struct FrameSlot<I: SlotImage> {
    id: u32,
    image: Option<I>,
    submitted: bool,
    preprocess: Option<PreprocessFn<I>>,
}

impl<I: SlotImage> FrameSlot<I> {
    /// Create a slot without an image; the image is attached on first
    /// acquire when the frame description is known
    pub fn empty(id: u32) -> Self {
        Self {
            id,
            image: None,
            submitted: false,
            preprocess: None,
        }
    }

    /// Stable identity of the slot within its pool
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The backend image currently attached, if any
    pub fn image(&self) -> Option<&I> {
        self.image.as_ref()
    }

    /// Mutable access to the attached backend image
    pub fn image_mut(&mut self) -> Option<&mut I> {
        self.image.as_mut()
    }

    /// Detach the backend image, e.g. for recreation or teardown
    pub fn take_image(&mut self) -> Option<I> {
        self.image.take()
    }

    /// Attach a backend image matching a new frame description
    pub fn attach_image(&mut self, image: I) {
        self.image = Some(image);
    }

    /// Whether the slot's image has been submitted to the GPU at least
    /// once since it was attached
    pub fn was_submitted(&self) -> bool {
        self.submitted
    }

    /// Record that the slot's image was submitted to the GPU
    pub fn mark_submitted(&mut self) {
        self.submitted = true;
    }

    /// Install the preprocess closure for the next display of this slot
    pub fn set_preprocess(&mut self, preprocess: PreprocessFn<I>) {
        self.preprocess = Some(preprocess);
    }

    /// Take the preprocess closure; it never survives past one use
    pub fn take_preprocess(&mut self) -> Option<PreprocessFn<I>> {
        self.preprocess.take()
    }
}

/// Producer-side view of an acquired slot
///
/// Move-only: queuing the frame consumes the handle, so the producer
/// cannot touch the bytes after handoff.
pub struct FrameHandle<I: SlotImage> {
    slot: FrameSlot<I>,
}

impl<I: SlotImage> FrameHandle<I> {
    pub(crate) fn new(slot: FrameSlot<I>) -> Self {
        debug_assert!(slot.image.is_some(), "handle requires an attached image");
        Self { slot }
    }

    pub(crate) fn into_slot(self) -> FrameSlot<I> {
        self.slot
    }

    /// Description the slot's image was created for
    pub fn description(&self) -> ImageDescription {
        self.image().description()
    }

    /// Byte stride between the starts of consecutive rows
    ///
    /// May exceed the packed row size; producers must honor it when
    /// writing.
    pub fn row_pitch(&self) -> usize {
        self.image().row_pitch()
    }

    /// The host-visible image bytes to fill
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        self.slot
            .image_mut()
            .expect("handle always holds an image")
            .bytes_mut()
    }

    /// Install a closure run on the image exactly once, right before
    /// the next upload of this frame
    pub fn set_preprocess(&mut self, preprocess: impl FnOnce(&mut I) + Send + 'static) {
        self.slot.set_preprocess(Box::new(preprocess));
    }

    fn image(&self) -> &I {
        self.slot.image().expect("handle always holds an image")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::format::PixelFormat;
    use crate::display::mock::MockSlotImage;

    #[test]
    fn preprocess_is_one_shot() {
        let mut slot = FrameSlot::empty(0);
        slot.attach_image(MockSlotImage::new(ImageDescription::new(
            4,
            4,
            PixelFormat::Rgba,
        )));
        slot.set_preprocess(Box::new(|image: &mut MockSlotImage| {
            image.bytes_mut()[0] = 0xAB;
        }));

        let preprocess = slot.take_preprocess().unwrap();
        preprocess(slot.image_mut().unwrap());
        assert_eq!(slot.image().unwrap().bytes()[0], 0xAB);
        assert!(slot.take_preprocess().is_none());
    }

    #[test]
    fn handle_reports_image_geometry() {
        let desc = ImageDescription::new(8, 2, PixelFormat::Uyvy);
        let mut slot = FrameSlot::empty(3);
        slot.attach_image(MockSlotImage::new(desc));
        let mut handle = FrameHandle::new(slot);

        assert_eq!(handle.description(), desc);
        assert!(handle.row_pitch() >= desc.packed_row_bytes());
        assert_eq!(handle.bytes_mut().len(), handle.row_pitch() * 2);

        let slot = handle.into_slot();
        assert_eq!(slot.id(), 3);
    }
}
