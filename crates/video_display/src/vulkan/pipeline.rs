//! Render and conversion pipelines
//!
//! The graphics pipeline draws a full-screen quad sampling the frame
//! image; viewport and scissor are dynamic so window resizes cost
//! nothing. Pipeline state depends only on the frame's pixel format
//! and the surface format, never on frame size.
//!
//! Chroma-subsampled frames sample through a `SamplerYcbcrConversion`
//! when the device supports it. Otherwise a compute pre-pass expands
//! the packed bytes (uploaded as half-width RGBA texels) into a
//! device-local RGBA intermediate that the graphics pass samples.

use std::path::{Path, PathBuf};

use ash::{vk, Device};
use log::{debug, info};

use crate::display::error::{DisplayError, DisplayResult};
use crate::display::format::{ImageDescription, PixelFormat};
use crate::vulkan::shader::ShaderModule;

/// Compute workgroup edge of the conversion shader
const CONVERSION_GROUP_SIZE: u32 = 16;

/// How a pixel format reaches the graphics pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingPlan {
    /// The slot image is sampled directly
    Direct,
    /// The slot image is expanded by the compute pre-pass first
    ConversionPass,
}

/// Geometry and format of the slot image upload for a description
pub struct UploadPlan {
    /// Vulkan format of the slot image
    pub format: vk::Format,
    /// Width of the slot image in texels
    pub width: u32,
    /// Sampler conversion the image view must reference, or null
    pub conversion: vk::SamplerYcbcrConversion,
    /// Whether the compute pre-pass runs for this format
    pub plan: SamplingPlan,
}

/// Format-dependent pipeline state
struct FormatState {
    format: PixelFormat,
    sampler: vk::Sampler,
    ycbcr_conversion: vk::SamplerYcbcrConversion,
    descriptor_set_layout: vk::DescriptorSetLayout,
    pipeline_layout: vk::PipelineLayout,
    pipeline: vk::Pipeline,
    conversion: Option<ConversionPipeline>,
}

/// Render pipeline manager
pub struct RenderPipeline {
    device: Device,
    shader_dir: PathBuf,
    ycbcr_sampling: bool,
    render_pass: vk::RenderPass,
    surface_format: vk::Format,
    state: Option<FormatState>,
}

impl RenderPipeline {
    /// Create the manager with a render pass for the surface format
    pub fn new(
        device: Device,
        shader_dir: &Path,
        surface_format: vk::Format,
        ycbcr_sampling: bool,
    ) -> DisplayResult<Self> {
        let render_pass = create_render_pass(&device, surface_format)?;
        Ok(Self {
            device,
            shader_dir: shader_dir.to_path_buf(),
            ycbcr_sampling,
            render_pass,
            surface_format,
            state: None,
        })
    }

    /// Whether the device and shaders can display this format
    pub fn supports_format(&self, format: PixelFormat) -> bool {
        if !format.is_ycbcr() || self.ycbcr_sampling {
            return true;
        }
        // The fallback path needs the conversion shader on disk.
        self.shader_dir.join("conv.spv").is_file()
    }

    /// Upload geometry for slot images of this description
    ///
    /// Valid only after `reconfigure` ran for the description's format.
    pub fn upload_plan(&self, description: ImageDescription) -> UploadPlan {
        let conversion = self
            .state
            .as_ref()
            .map_or(vk::SamplerYcbcrConversion::null(), |s| s.ycbcr_conversion);
        if description.format.is_ycbcr() && !self.ycbcr_sampling {
            UploadPlan {
                format: description.format.conversion_upload_format(),
                width: description.conversion_upload_width(),
                conversion: vk::SamplerYcbcrConversion::null(),
                plan: SamplingPlan::ConversionPass,
            }
        } else {
            UploadPlan {
                format: description.format.vk_format(),
                width: description.width,
                conversion,
                plan: SamplingPlan::Direct,
            }
        }
    }

    /// Rebuild format-dependent state for a new pixel format
    pub fn reconfigure(&mut self, description: ImageDescription) -> DisplayResult<()> {
        if self
            .state
            .as_ref()
            .is_some_and(|s| s.format == description.format)
        {
            return Ok(());
        }
        info!("reconfiguring pipeline for {:?}", description.format);
        self.destroy_state();

        let format = description.format;
        let needs_conversion_pass = format.is_ycbcr() && !self.ycbcr_sampling;
        if needs_conversion_pass && !self.supports_format(format) {
            return Err(DisplayError::Unsupported {
                reason: format!(
                    "{format:?} needs the conversion shader (conv.spv) and native \
                     YCbCr sampling is unavailable"
                ),
            });
        }

        let ycbcr_conversion = if format.is_ycbcr() && self.ycbcr_sampling {
            create_ycbcr_conversion(&self.device, format.vk_format())?
        } else {
            vk::SamplerYcbcrConversion::null()
        };
        let sampler = create_sampler(&self.device, ycbcr_conversion)?;
        let descriptor_set_layout = create_sampled_layout(&self.device, sampler)?;
        let pipeline_layout = create_pipeline_layout(&self.device, descriptor_set_layout)?;
        let pipeline = create_graphics_pipeline(
            &self.device,
            &self.shader_dir,
            self.render_pass,
            pipeline_layout,
        )?;

        let conversion = if needs_conversion_pass {
            Some(ConversionPipeline::new(self.device.clone(), &self.shader_dir)?)
        } else {
            None
        };

        self.state = Some(FormatState {
            format,
            sampler,
            ycbcr_conversion,
            descriptor_set_layout,
            pipeline_layout,
            pipeline,
            conversion,
        });
        Ok(())
    }

    /// Rebuild the render pass when the surface format changed, then
    /// the pipeline that references it
    pub fn surface_format_changed(&mut self, surface_format: vk::Format) -> DisplayResult<()> {
        if surface_format == self.surface_format {
            return Ok(());
        }
        debug!(
            "surface format changed {:?} -> {surface_format:?}",
            self.surface_format
        );
        let description = self.state.as_ref().map(|s| s.format);
        self.destroy_state();
        unsafe { self.device.destroy_render_pass(self.render_pass, None) };
        self.render_pass = create_render_pass(&self.device, surface_format)?;
        self.surface_format = surface_format;
        if let Some(format) = description {
            // Size is irrelevant to pipeline state.
            self.reconfigure(ImageDescription::new(0, 0, format))?;
        }
        Ok(())
    }

    /// Render pass the framebuffers are built against
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    /// Graphics pipeline handle, if configured
    pub fn pipeline(&self) -> Option<vk::Pipeline> {
        self.state.as_ref().map(|s| s.pipeline)
    }

    /// Pipeline layout for descriptor binding
    pub fn pipeline_layout(&self) -> Option<vk::PipelineLayout> {
        self.state.as_ref().map(|s| s.pipeline_layout)
    }

    /// Descriptor set layout of the sampled frame image
    pub fn descriptor_set_layout(&self) -> Option<vk::DescriptorSetLayout> {
        self.state.as_ref().map(|s| s.descriptor_set_layout)
    }

    /// Compute pre-pass state, if active for the current format
    pub fn conversion_mut(&mut self) -> Option<&mut ConversionPipeline> {
        self.state.as_mut().and_then(|s| s.conversion.as_mut())
    }

    /// Shared view of the compute pre-pass state
    pub fn conversion_ref(&self) -> Option<&ConversionPipeline> {
        self.state.as_ref().and_then(|s| s.conversion.as_ref())
    }

    /// Whether format state is already built for this pixel format
    pub fn is_configured_for(&self, format: PixelFormat) -> bool {
        self.state.as_ref().is_some_and(|s| s.format == format)
    }

    fn destroy_state(&mut self) {
        let Some(state) = self.state.take() else {
            return;
        };
        unsafe {
            self.device.destroy_pipeline(state.pipeline, None);
            self.device
                .destroy_pipeline_layout(state.pipeline_layout, None);
            self.device
                .destroy_descriptor_set_layout(state.descriptor_set_layout, None);
            self.device.destroy_sampler(state.sampler, None);
            if state.ycbcr_conversion != vk::SamplerYcbcrConversion::null() {
                self.device
                    .destroy_sampler_ycbcr_conversion(state.ycbcr_conversion, None);
            }
        }
        drop(state.conversion);
    }
}

impl Drop for RenderPipeline {
    fn drop(&mut self) {
        self.destroy_state();
        unsafe {
            self.device.destroy_render_pass(self.render_pass, None);
        }
    }
}

/// Device-local image the conversion pass writes into
struct Intermediate {
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
    width: u32,
    height: u32,
}

/// Compute pipeline expanding packed 4:2:2 bytes into RGBA
pub struct ConversionPipeline {
    device: Device,
    sampler: vk::Sampler,
    descriptor_set_layout: vk::DescriptorSetLayout,
    pipeline_layout: vk::PipelineLayout,
    pipeline: vk::Pipeline,
    intermediate: Option<Intermediate>,
}

impl ConversionPipeline {
    fn new(device: Device, shader_dir: &Path) -> DisplayResult<Self> {
        let shader = ShaderModule::load(device.clone(), shader_dir, "conv.spv")?;
        let sampler = create_sampler(&device, vk::SamplerYcbcrConversion::null())?;

        let samplers = [sampler];
        let bindings = [
            // Packed upload image
            vk::DescriptorSetLayoutBinding::builder()
                .binding(0)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::COMPUTE)
                .immutable_samplers(&samplers)
                .build(),
            // RGBA intermediate
            vk::DescriptorSetLayoutBinding::builder()
                .binding(1)
                .descriptor_type(vk::DescriptorType::STORAGE_IMAGE)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::COMPUTE)
                .build(),
        ];
        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);
        let descriptor_set_layout = unsafe {
            device
                .create_descriptor_set_layout(&layout_info, None)
                .map_err(DisplayError::Api)?
        };

        // One u32 selecting the packed byte order (UYVY vs YUYV).
        let push_range = vk::PushConstantRange::builder()
            .stage_flags(vk::ShaderStageFlags::COMPUTE)
            .offset(0)
            .size(4);
        let push_ranges = [push_range.build()];
        let set_layouts = [descriptor_set_layout];
        let pipeline_layout_info = vk::PipelineLayoutCreateInfo::builder()
            .set_layouts(&set_layouts)
            .push_constant_ranges(&push_ranges);
        let pipeline_layout = unsafe {
            device
                .create_pipeline_layout(&pipeline_layout_info, None)
                .map_err(DisplayError::Api)?
        };

        let entry_point = c_entry_point();
        let stage = vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::COMPUTE)
            .module(shader.handle())
            .name(entry_point);
        let create_info = vk::ComputePipelineCreateInfo::builder()
            .stage(stage.build())
            .layout(pipeline_layout);
        let pipeline = unsafe {
            device
                .create_compute_pipelines(vk::PipelineCache::null(), &[create_info.build()], None)
                .map_err(|(_, err)| DisplayError::Api(err))?[0]
        };

        Ok(Self {
            device,
            sampler,
            descriptor_set_layout,
            pipeline_layout,
            pipeline,
            intermediate: None,
        })
    }

    /// View of the intermediate image, rebuilding it when the frame
    /// size changed
    pub fn ensure_intermediate(
        &mut self,
        memory_type_of: &impl Fn(vk::MemoryRequirements) -> DisplayResult<u32>,
        width: u32,
        height: u32,
    ) -> DisplayResult<vk::ImageView> {
        if let Some(intermediate) = &self.intermediate {
            if intermediate.width == width && intermediate.height == height {
                return Ok(intermediate.view);
            }
        }
        self.destroy_intermediate();

        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .format(vk::Format::R8G8B8A8_UNORM)
            .extent(vk::Extent3D {
                width,
                height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::SAMPLED)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let image = unsafe {
            self.device
                .create_image(&image_info, None)
                .map_err(DisplayError::Api)?
        };
        let requirements = unsafe { self.device.get_image_memory_requirements(image) };
        let memory_type_index = memory_type_of(requirements)?;
        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);
        let memory = unsafe {
            self.device
                .allocate_memory(&alloc_info, None)
                .map_err(|err| DisplayError::Allocation {
                    reason: format!("conversion intermediate: {err:?}"),
                })?
        };
        unsafe {
            self.device
                .bind_image_memory(image, memory, 0)
                .map_err(DisplayError::Api)?;
        }

        let view_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(vk::Format::R8G8B8A8_UNORM)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });
        let view = unsafe {
            self.device
                .create_image_view(&view_info, None)
                .map_err(DisplayError::Api)?
        };

        self.intermediate = Some(Intermediate {
            image,
            memory,
            view,
            width,
            height,
        });
        Ok(view)
    }

    /// Intermediate image handle for layout transitions
    pub fn intermediate_image(&self) -> Option<vk::Image> {
        self.intermediate.as_ref().map(|i| i.image)
    }

    /// Compute pipeline handle
    pub fn pipeline(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Compute pipeline layout
    pub fn pipeline_layout(&self) -> vk::PipelineLayout {
        self.pipeline_layout
    }

    /// Descriptor set layout of the compute pass
    pub fn descriptor_set_layout(&self) -> vk::DescriptorSetLayout {
        self.descriptor_set_layout
    }

    /// Workgroup counts covering a frame
    pub fn dispatch_size(width: u32, height: u32) -> (u32, u32) {
        (
            width.div_ceil(CONVERSION_GROUP_SIZE),
            height.div_ceil(CONVERSION_GROUP_SIZE),
        )
    }

    fn destroy_intermediate(&mut self) {
        if let Some(intermediate) = self.intermediate.take() {
            unsafe {
                self.device.destroy_image_view(intermediate.view, None);
                self.device.destroy_image(intermediate.image, None);
                self.device.free_memory(intermediate.memory, None);
            }
        }
    }
}

impl Drop for ConversionPipeline {
    fn drop(&mut self) {
        self.destroy_intermediate();
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device
                .destroy_pipeline_layout(self.pipeline_layout, None);
            self.device
                .destroy_descriptor_set_layout(self.descriptor_set_layout, None);
            self.device.destroy_sampler(self.sampler, None);
        }
    }
}

fn c_entry_point() -> &'static std::ffi::CStr {
    // "main\0"
    std::ffi::CStr::from_bytes_with_nul(b"main\0").unwrap_or_default()
}

fn create_render_pass(device: &Device, format: vk::Format) -> DisplayResult<vk::RenderPass> {
    let attachment = vk::AttachmentDescription::builder()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR);
    let attachments = [attachment.build()];

    let color_ref = vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    };
    let color_refs = [color_ref];
    let subpass = vk::SubpassDescription::builder()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs);
    let subpasses = [subpass.build()];

    let dependency = vk::SubpassDependency::builder()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE);
    let dependencies = [dependency.build()];

    let create_info = vk::RenderPassCreateInfo::builder()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);
    unsafe {
        device
            .create_render_pass(&create_info, None)
            .map_err(DisplayError::Api)
    }
}

fn create_ycbcr_conversion(
    device: &Device,
    format: vk::Format,
) -> DisplayResult<vk::SamplerYcbcrConversion> {
    let create_info = vk::SamplerYcbcrConversionCreateInfo::builder()
        .format(format)
        .ycbcr_model(vk::SamplerYcbcrModelConversion::YCBCR_709)
        .ycbcr_range(vk::SamplerYcbcrRange::ITU_NARROW)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .x_chroma_offset(vk::ChromaLocation::MIDPOINT)
        .y_chroma_offset(vk::ChromaLocation::MIDPOINT)
        .chroma_filter(vk::Filter::LINEAR);
    unsafe {
        device
            .create_sampler_ycbcr_conversion(&create_info, None)
            .map_err(DisplayError::Api)
    }
}

fn create_sampler(
    device: &Device,
    conversion: vk::SamplerYcbcrConversion,
) -> DisplayResult<vk::Sampler> {
    let mut conversion_info = vk::SamplerYcbcrConversionInfo::builder().conversion(conversion);
    let mut create_info = vk::SamplerCreateInfo::builder()
        .mag_filter(vk::Filter::LINEAR)
        .min_filter(vk::Filter::LINEAR)
        .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
        .address_mode_u(vk::SamplerAddressMode::CLAMP_TO_EDGE)
        .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_EDGE)
        .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_EDGE)
        .unnormalized_coordinates(false);
    if conversion != vk::SamplerYcbcrConversion::null() {
        create_info = create_info.push_next(&mut conversion_info);
    }
    unsafe {
        device
            .create_sampler(&create_info, None)
            .map_err(DisplayError::Api)
    }
}

fn create_sampled_layout(
    device: &Device,
    sampler: vk::Sampler,
) -> DisplayResult<vk::DescriptorSetLayout> {
    // Immutable sampler: required when a YCbCr conversion is attached.
    let samplers = [sampler];
    let binding = vk::DescriptorSetLayoutBinding::builder()
        .binding(0)
        .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
        .descriptor_count(1)
        .stage_flags(vk::ShaderStageFlags::FRAGMENT)
        .immutable_samplers(&samplers);
    let bindings = [binding.build()];
    let create_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);
    unsafe {
        device
            .create_descriptor_set_layout(&create_info, None)
            .map_err(DisplayError::Api)
    }
}

fn create_pipeline_layout(
    device: &Device,
    descriptor_set_layout: vk::DescriptorSetLayout,
) -> DisplayResult<vk::PipelineLayout> {
    let set_layouts = [descriptor_set_layout];
    let create_info = vk::PipelineLayoutCreateInfo::builder().set_layouts(&set_layouts);
    unsafe {
        device
            .create_pipeline_layout(&create_info, None)
            .map_err(DisplayError::Api)
    }
}

fn create_graphics_pipeline(
    device: &Device,
    shader_dir: &Path,
    render_pass: vk::RenderPass,
    layout: vk::PipelineLayout,
) -> DisplayResult<vk::Pipeline> {
    let vertex_shader = ShaderModule::load(device.clone(), shader_dir, "vert.spv")?;
    let fragment_shader = ShaderModule::load(device.clone(), shader_dir, "frag.spv")?;

    let entry_point = c_entry_point();
    let stages = [
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(vertex_shader.handle())
            .name(entry_point)
            .build(),
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(fragment_shader.handle())
            .name(entry_point)
            .build(),
    ];

    // The quad is generated from gl_VertexIndex; no vertex buffers.
    let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder();
    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
        .topology(vk::PrimitiveTopology::TRIANGLE_LIST);

    let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
        .viewport_count(1)
        .scissor_count(1);

    let rasterization = vk::PipelineRasterizationStateCreateInfo::builder()
        .polygon_mode(vk::PolygonMode::FILL)
        .cull_mode(vk::CullModeFlags::NONE)
        .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
        .line_width(1.0);

    let multisample = vk::PipelineMultisampleStateCreateInfo::builder()
        .rasterization_samples(vk::SampleCountFlags::TYPE_1);

    let color_attachment = vk::PipelineColorBlendAttachmentState::builder()
        .color_write_mask(vk::ColorComponentFlags::RGBA)
        .blend_enable(false);
    let color_attachments = [color_attachment.build()];
    let color_blend =
        vk::PipelineColorBlendStateCreateInfo::builder().attachments(&color_attachments);

    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state =
        vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

    let create_info = vk::GraphicsPipelineCreateInfo::builder()
        .stages(&stages)
        .vertex_input_state(&vertex_input)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterization)
        .multisample_state(&multisample)
        .color_blend_state(&color_blend)
        .dynamic_state(&dynamic_state)
        .layout(layout)
        .render_pass(render_pass)
        .subpass(0);

    let pipeline = unsafe {
        device
            .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info.build()], None)
            .map_err(|(_, err)| DisplayError::Api(err))?[0]
    };
    Ok(pipeline)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_covers_every_texel() {
        assert_eq!(ConversionPipeline::dispatch_size(1920, 1080), (120, 68));
        assert_eq!(ConversionPipeline::dispatch_size(1, 1), (1, 1));
        assert_eq!(ConversionPipeline::dispatch_size(16, 16), (1, 1));
        assert_eq!(ConversionPipeline::dispatch_size(17, 16), (2, 1));
    }
}
