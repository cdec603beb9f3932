//! Host-mapped transfer images backing frame slots
//!
//! Each slot owns a linear-tiling image whose memory stays mapped for
//! the slot's whole life. Producers write rows `row_pitch()` apart;
//! the render thread samples the same memory after a host→shader
//! barrier, so no staging copy exists on the upload path.

use ash::{vk, Device};
use log::trace;

use crate::display::backend::SlotImage;
use crate::display::error::{DisplayError, DisplayResult};
use crate::display::format::ImageDescription;
use crate::vulkan::sync::Fence;

/// A frame slot's device image, mapped memory, and release fence
pub struct VulkanSlotImage {
    device: Device,
    description: ImageDescription,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
    mapped: *mut u8,
    byte_size: usize,
    row_pitch: usize,
    coherent: bool,
    fence: Fence,
    layout: vk::ImageLayout,
    destroyed: bool,
}

// The mapped pointer is only dereferenced by the thread currently
// owning the slot; ownership transfers through the handoff queues.
unsafe impl Send for VulkanSlotImage {}

impl VulkanSlotImage {
    /// Allocate a host-mapped image for the description
    ///
    /// `upload_format` and `upload_width` come from the pipeline: the
    /// native format for directly sampled layouts, or the half-width
    /// RGBA geometry when the compute conversion pass is active.
    /// `conversion` is the sampler conversion for native 4:2:2
    /// sampling, or null.
    pub fn new(
        device: Device,
        memory_type_of: &impl Fn(vk::MemoryRequirements) -> DisplayResult<(u32, bool)>,
        description: ImageDescription,
        upload_format: vk::Format,
        upload_width: u32,
        conversion: vk::SamplerYcbcrConversion,
    ) -> DisplayResult<Self> {
        let extent = vk::Extent3D {
            width: upload_width,
            height: description.height,
            depth: 1,
        };
        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .format(upload_format)
            .extent(extent)
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::LINEAR)
            .usage(vk::ImageUsageFlags::SAMPLED)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::PREINITIALIZED);

        let image = unsafe {
            device
                .create_image(&image_info, None)
                .map_err(DisplayError::Api)?
        };

        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let (memory_type_index, coherent) = memory_type_of(requirements)?;

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);
        let memory = match unsafe { device.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(err) => {
                unsafe { device.destroy_image(image, None) };
                return Err(DisplayError::Allocation {
                    reason: format!("{} bytes of host-visible memory: {err:?}", requirements.size),
                });
            }
        };
        unsafe {
            device
                .bind_image_memory(image, memory, 0)
                .map_err(DisplayError::Api)?;
        }

        let mapped = unsafe {
            device
                .map_memory(memory, 0, vk::WHOLE_SIZE, vk::MemoryMapFlags::empty())
                .map_err(DisplayError::Api)?
        }
        .cast::<u8>();

        let subresource = vk::ImageSubresource {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level: 0,
            array_layer: 0,
        };
        let sub_layout = unsafe { device.get_image_subresource_layout(image, subresource) };
        let row_pitch = sub_layout.row_pitch as usize;
        let byte_size = requirements.size as usize;
        trace!(
            "slot image {}x{} {:?}: pitch {row_pitch}, {byte_size} bytes",
            description.width,
            description.height,
            description.format
        );

        let view = create_view(&device, image, upload_format, conversion)?;
        let fence = Fence::new(device.clone(), true)?;

        Ok(Self {
            device,
            description,
            image,
            memory,
            view,
            mapped,
            byte_size,
            row_pitch,
            coherent,
            fence,
            layout: vk::ImageLayout::PREINITIALIZED,
            destroyed: false,
        })
    }

    /// Image handle
    pub fn image(&self) -> vk::Image {
        self.image
    }

    /// Sampled view of the image
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Fence signaled when the GPU finishes reading the image
    pub fn fence(&self) -> &Fence {
        &self.fence
    }

    /// Current image layout as last recorded
    pub fn layout(&self) -> vk::ImageLayout {
        self.layout
    }

    /// Record the layout a just-submitted barrier leaves the image in
    pub fn set_layout(&mut self, layout: vk::ImageLayout) {
        self.layout = layout;
    }

    /// Make host writes visible to the device on non-coherent memory
    pub fn flush(&self) -> DisplayResult<()> {
        if self.coherent {
            return Ok(());
        }
        let range = vk::MappedMemoryRange::builder()
            .memory(self.memory)
            .offset(0)
            .size(vk::WHOLE_SIZE);
        unsafe {
            self.device
                .flush_mapped_memory_ranges(&[range.build()])
                .map_err(DisplayError::Api)
        }
    }

    /// Free all device objects; safe to call more than once
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        unsafe {
            self.device.destroy_image_view(self.view, None);
            self.device.unmap_memory(self.memory);
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

impl SlotImage for VulkanSlotImage {
    fn description(&self) -> ImageDescription {
        self.description
    }

    fn row_pitch(&self) -> usize {
        self.row_pitch
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        // Valid for the life of the mapping; the slot owns the memory.
        unsafe { std::slice::from_raw_parts_mut(self.mapped, self.byte_size) }
    }
}

impl Drop for VulkanSlotImage {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn create_view(
    device: &Device,
    image: vk::Image,
    format: vk::Format,
    conversion: vk::SamplerYcbcrConversion,
) -> DisplayResult<vk::ImageView> {
    let mut conversion_info =
        vk::SamplerYcbcrConversionInfo::builder().conversion(conversion);
    let mut create_info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });
    if conversion != vk::SamplerYcbcrConversion::null() {
        create_info = create_info.push_next(&mut conversion_info);
    }

    unsafe {
        device
            .create_image_view(&create_info, None)
            .map_err(DisplayError::Api)
    }
}
