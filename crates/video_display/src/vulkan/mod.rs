//! Vulkan backend
//!
//! Owns the device, swapchain, pipelines, and per-frame resources, and
//! records the per-frame command stream: host→shader barrier on the
//! slot image, optional compute conversion pass, the full-screen draw,
//! and the barrier returning the slot image to host-writable layout.

pub mod context;
pub mod pipeline;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod transfer;

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::vk;
use log::warn;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::config::DisplayConfig;
use crate::display::backend::{AcquireOutcome, GpuBackend, PresentOutcome, SlotImage};
use crate::display::error::{DisplayError, DisplayResult};
use crate::display::format::{ImageDescription, PixelFormat};
use crate::display::surface::WindowParameters;
use crate::display::viewport::RenderArea;
use crate::vulkan::context::VulkanContext;
use crate::vulkan::pipeline::{ConversionPipeline, RenderPipeline, SamplingPlan};
use crate::vulkan::swapchain::{PresentPreference, Swapchain};
use crate::vulkan::sync::Semaphore;

pub use crate::vulkan::transfer::VulkanSlotImage;

/// Per-frame GPU objects indexed by the engine's resource tokens
struct FrameObjects {
    image_available: Semaphore,
    render_finished: Semaphore,
    command_buffer: vk::CommandBuffer,
    graphics_set: vk::DescriptorSet,
    compute_set: vk::DescriptorSet,
}

/// Production GPU backend running on Vulkan
pub struct VulkanBackend {
    frames: Vec<FrameObjects>,
    command_pool: vk::CommandPool,
    descriptor_pool: vk::DescriptorPool,
    swapchain: Option<Swapchain>,
    pipeline: Option<RenderPipeline>,
    preference: PresentPreference,
    destroyed: bool,
    // Dropped last; everything above holds device clones.
    context: VulkanContext,
}

impl VulkanBackend {
    /// Initialize Vulkan for an existing window
    pub fn new(
        display_handle: RawDisplayHandle,
        window_handle: RawWindowHandle,
        window: WindowParameters,
        config: &DisplayConfig,
    ) -> DisplayResult<Self> {
        let context = VulkanContext::new(display_handle, window_handle, config)?;
        let preference = PresentPreference {
            vsync: config.vsync,
            tearing_permitted: config.tearing_permitted,
        };

        let loader = SwapchainLoader::new(&context.instance, &context.device);
        let mut swapchain = Swapchain::new(
            loader,
            context.device.clone(),
            context.surface,
            &context.surface_loader,
            context.physical_device,
            window,
            preference,
        )?;

        let pipeline = RenderPipeline::new(
            context.device.clone(),
            &config.shader_path,
            swapchain.format().format,
            context.ycbcr_sampling,
        )?;
        swapchain.create_framebuffers(pipeline.render_pass())?;

        let pool_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(context.queue_family_index);
        let command_pool = unsafe {
            context
                .device
                .create_command_pool(&pool_info, None)
                .map_err(DisplayError::Api)?
        };

        Ok(Self {
            frames: Vec::new(),
            command_pool,
            descriptor_pool: vk::DescriptorPool::null(),
            swapchain: Some(swapchain),
            pipeline: Some(pipeline),
            preference,
            destroyed: false,
            context,
        })
    }

    fn swapchain_ref(&self) -> DisplayResult<&Swapchain> {
        self.swapchain.as_ref().ok_or_else(backend_destroyed)
    }

    /// Rebuild format state and per-frame descriptor sets if the
    /// pixel format changed
    fn ensure_format(&mut self, description: ImageDescription) -> DisplayResult<()> {
        let configured = self
            .pipeline
            .as_ref()
            .ok_or_else(backend_destroyed)?
            .is_configured_for(description.format);
        if configured {
            return Ok(());
        }
        // In-flight frames may still reference the old pipeline state.
        self.context.wait_idle()?;
        let pipeline = self.pipeline.as_mut().ok_or_else(backend_destroyed)?;
        pipeline.reconfigure(description)?;
        self.allocate_descriptor_sets()
    }

    fn allocate_descriptor_sets(&mut self) -> DisplayResult<()> {
        let device = &self.context.device;
        let pipeline = self.pipeline.as_ref().ok_or_else(backend_destroyed)?;
        let Some(graphics_layout) = pipeline.descriptor_set_layout() else {
            return Ok(());
        };
        if self.frames.is_empty() {
            return Ok(());
        }
        if self.descriptor_pool == vk::DescriptorPool::null() {
            return Ok(());
        }

        unsafe {
            device
                .reset_descriptor_pool(self.descriptor_pool, vk::DescriptorPoolResetFlags::empty())
                .map_err(DisplayError::Api)?;
        }

        let graphics_layouts = vec![graphics_layout; self.frames.len()];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.descriptor_pool)
            .set_layouts(&graphics_layouts);
        let graphics_sets = unsafe {
            device
                .allocate_descriptor_sets(&alloc_info)
                .map_err(DisplayError::Api)?
        };

        let compute_layout = self
            .pipeline
            .as_ref()
            .and_then(RenderPipeline::conversion_ref)
            .map(ConversionPipeline::descriptor_set_layout);
        let compute_sets = if let Some(layout) = compute_layout {
            let layouts = vec![layout; self.frames.len()];
            let alloc_info = vk::DescriptorSetAllocateInfo::builder()
                .descriptor_pool(self.descriptor_pool)
                .set_layouts(&layouts);
            unsafe {
                self.context
                    .device
                    .allocate_descriptor_sets(&alloc_info)
                    .map_err(DisplayError::Api)?
            }
        } else {
            vec![vk::DescriptorSet::null(); self.frames.len()]
        };

        for ((frame, graphics_set), compute_set) in
            self.frames.iter_mut().zip(graphics_sets).zip(compute_sets)
        {
            frame.graphics_set = graphics_set;
            frame.compute_set = compute_set;
        }
        Ok(())
    }

    fn memory_type_host(
        &self,
    ) -> impl Fn(vk::MemoryRequirements) -> DisplayResult<(u32, bool)> + '_ {
        move |requirements| {
            let index = self.context.find_memory_type(
                requirements,
                vk::MemoryPropertyFlags::HOST_VISIBLE,
                vk::MemoryPropertyFlags::HOST_COHERENT | vk::MemoryPropertyFlags::HOST_CACHED,
            )?;
            let coherent = self.context.memory_properties.memory_types[index as usize]
                .property_flags
                .contains(vk::MemoryPropertyFlags::HOST_COHERENT);
            Ok((index, coherent))
        }
    }

    /// Record the full command stream for one frame
    #[allow(clippy::too_many_lines)]
    fn record_commands(
        &mut self,
        frame_index: usize,
        image: &mut VulkanSlotImage,
        surface_index: u32,
        area: RenderArea,
    ) -> DisplayResult<()> {
        let description = image.description();
        let plan = {
            let pipeline = self.pipeline.as_ref().ok_or_else(backend_destroyed)?;
            pipeline.upload_plan(description).plan
        };

        // Route descriptor writes before recording; the frame's token
        // was free, so its sets are not referenced by pending work.
        let sampled_view = if plan == SamplingPlan::ConversionPass {
            let memory_type_of = |requirements: vk::MemoryRequirements| {
                self.context.find_memory_type(
                    requirements,
                    vk::MemoryPropertyFlags::DEVICE_LOCAL,
                    vk::MemoryPropertyFlags::empty(),
                )
            };
            let pipeline = self.pipeline.as_mut().ok_or_else(backend_destroyed)?;
            let conversion = pipeline
                .conversion_mut()
                .ok_or_else(|| DisplayError::Unsupported {
                    reason: "conversion pass required but not configured".to_string(),
                })?;
            conversion.ensure_intermediate(&memory_type_of, description.width, description.height)?
        } else {
            image.view()
        };

        let device = self.context.device.clone();
        let frame = &self.frames[frame_index];
        let pipeline = self.pipeline.as_ref().ok_or_else(backend_destroyed)?;
        let swapchain = self.swapchain.as_ref().ok_or_else(backend_destroyed)?;

        // Graphics set always samples `sampled_view`.
        let image_info = vk::DescriptorImageInfo::builder()
            .image_view(sampled_view)
            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        let image_infos = [image_info.build()];
        let mut writes = vec![vk::WriteDescriptorSet::builder()
            .dst_set(frame.graphics_set)
            .dst_binding(0)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(&image_infos)
            .build()];

        let upload_info = vk::DescriptorImageInfo::builder()
            .image_view(image.view())
            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        let upload_infos = [upload_info.build()];
        let storage_info = vk::DescriptorImageInfo::builder()
            .image_view(sampled_view)
            .image_layout(vk::ImageLayout::GENERAL);
        let storage_infos = [storage_info.build()];
        if plan == SamplingPlan::ConversionPass {
            writes.push(
                vk::WriteDescriptorSet::builder()
                    .dst_set(frame.compute_set)
                    .dst_binding(0)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(&upload_infos)
                    .build(),
            );
            writes.push(
                vk::WriteDescriptorSet::builder()
                    .dst_set(frame.compute_set)
                    .dst_binding(1)
                    .descriptor_type(vk::DescriptorType::STORAGE_IMAGE)
                    .image_info(&storage_infos)
                    .build(),
            );
        }
        unsafe { device.update_descriptor_sets(&writes, &[]) };

        let command_buffer = frame.command_buffer;
        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(DisplayError::Api)?;
        }

        let color_range = vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        };

        // Host writes -> shader reads on the slot image.
        let read_stage = if plan == SamplingPlan::ConversionPass {
            vk::PipelineStageFlags::COMPUTE_SHADER
        } else {
            vk::PipelineStageFlags::FRAGMENT_SHADER
        };
        let to_shader = vk::ImageMemoryBarrier::builder()
            .src_access_mask(vk::AccessFlags::HOST_WRITE)
            .dst_access_mask(vk::AccessFlags::SHADER_READ)
            .old_layout(image.layout())
            .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image.image())
            .subresource_range(color_range);
        unsafe {
            device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::HOST,
                read_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_shader.build()],
            );
        }

        if plan == SamplingPlan::ConversionPass {
            let conversion_image = self
                .pipeline
                .as_ref()
                .and_then(RenderPipeline::conversion_ref)
                .and_then(ConversionPipeline::intermediate_image);
            let Some(conversion_image) = conversion_image else {
                unsafe {
                    let _ = device.end_command_buffer(command_buffer);
                }
                return Err(DisplayError::Unsupported {
                    reason: "conversion intermediate missing".to_string(),
                });
            };

            // Intermediate becomes writable for the compute pass.
            let to_general = vk::ImageMemoryBarrier::builder()
                .src_access_mask(vk::AccessFlags::empty())
                .dst_access_mask(vk::AccessFlags::SHADER_WRITE)
                .old_layout(vk::ImageLayout::UNDEFINED)
                .new_layout(vk::ImageLayout::GENERAL)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(conversion_image)
                .subresource_range(color_range);
            unsafe {
                device.cmd_pipeline_barrier(
                    command_buffer,
                    vk::PipelineStageFlags::TOP_OF_PIPE,
                    vk::PipelineStageFlags::COMPUTE_SHADER,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[to_general.build()],
                );
            }

            let pipeline_ref = self.pipeline.as_ref().ok_or_else(backend_destroyed)?;
            let conversion = pipeline_ref
                .conversion_ref()
                .ok_or_else(backend_destroyed)?;
            let (groups_x, groups_y) =
                ConversionPipeline::dispatch_size(description.width, description.height);
            unsafe {
                device.cmd_bind_pipeline(
                    command_buffer,
                    vk::PipelineBindPoint::COMPUTE,
                    conversion.pipeline(),
                );
                device.cmd_bind_descriptor_sets(
                    command_buffer,
                    vk::PipelineBindPoint::COMPUTE,
                    conversion.pipeline_layout(),
                    0,
                    &[frame.compute_set],
                    &[],
                );
                let swizzle: u32 = u32::from(description.format == PixelFormat::Yuyv);
                device.cmd_push_constants(
                    command_buffer,
                    conversion.pipeline_layout(),
                    vk::ShaderStageFlags::COMPUTE,
                    0,
                    &swizzle.to_ne_bytes(),
                );
                device.cmd_dispatch(command_buffer, groups_x, groups_y, 1);
            }

            // Compute writes -> fragment reads on the intermediate.
            let to_sampled = vk::ImageMemoryBarrier::builder()
                .src_access_mask(vk::AccessFlags::SHADER_WRITE)
                .dst_access_mask(vk::AccessFlags::SHADER_READ)
                .old_layout(vk::ImageLayout::GENERAL)
                .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(conversion_image)
                .subresource_range(color_range);
            unsafe {
                device.cmd_pipeline_barrier(
                    command_buffer,
                    vk::PipelineStageFlags::COMPUTE_SHADER,
                    vk::PipelineStageFlags::FRAGMENT_SHADER,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[to_sampled.build()],
                );
            }
        }

        let framebuffer = swapchain.framebuffer(surface_index).ok_or_else(|| {
            DisplayError::Api(vk::Result::ERROR_OUT_OF_DATE_KHR)
        })?;
        let clear = vk::ClearValue {
            color: vk::ClearColorValue {
                float32: [0.0, 0.0, 0.0, 1.0],
            },
        };
        let clears = [clear];
        let render_pass_begin = vk::RenderPassBeginInfo::builder()
            .render_pass(pipeline.render_pass())
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: swapchain.extent(),
            })
            .clear_values(&clears);

        let graphics_pipeline = pipeline.pipeline().ok_or_else(backend_destroyed)?;
        let graphics_layout = pipeline.pipeline_layout().ok_or_else(backend_destroyed)?;
        let viewport = vk::Viewport {
            x: area.x as f32,
            y: area.y as f32,
            width: area.width as f32,
            height: area.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D {
                x: area.x as i32,
                y: area.y as i32,
            },
            extent: vk::Extent2D {
                width: area.width,
                height: area.height,
            },
        };
        unsafe {
            device.cmd_begin_render_pass(
                command_buffer,
                &render_pass_begin,
                vk::SubpassContents::INLINE,
            );
            device.cmd_set_viewport(command_buffer, 0, &[viewport]);
            device.cmd_set_scissor(command_buffer, 0, &[scissor]);
            device.cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                graphics_pipeline,
            );
            device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                graphics_layout,
                0,
                &[frame.graphics_set],
                &[],
            );
            device.cmd_draw(command_buffer, 6, 1, 0, 0);
            device.cmd_end_render_pass(command_buffer);
        }

        // Shader reads -> host writes, so the producer can refill the
        // slot once the fence signals.
        let back_to_host = vk::ImageMemoryBarrier::builder()
            .src_access_mask(vk::AccessFlags::SHADER_READ)
            .dst_access_mask(vk::AccessFlags::HOST_WRITE)
            .old_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            .new_layout(vk::ImageLayout::GENERAL)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image.image())
            .subresource_range(color_range);
        unsafe {
            device.cmd_pipeline_barrier(
                command_buffer,
                read_stage,
                vk::PipelineStageFlags::HOST,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[back_to_host.build()],
            );
            device
                .end_command_buffer(command_buffer)
                .map_err(DisplayError::Api)?;
        }
        image.set_layout(vk::ImageLayout::GENERAL);
        Ok(())
    }
}

fn backend_destroyed() -> DisplayError {
    DisplayError::InitializationFailed("Vulkan backend already destroyed".to_string())
}

impl GpuBackend for VulkanBackend {
    type SlotImage = VulkanSlotImage;
    type FrameResources = usize;

    fn create_frame_resources(&mut self, count: usize) -> DisplayResult<Vec<usize>> {
        let device = &self.context.device;

        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count as u32);
        let command_buffers = unsafe {
            device
                .allocate_command_buffers(&alloc_info)
                .map_err(DisplayError::Api)?
        };

        let pool_sizes = [
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: 2 * count as u32,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::STORAGE_IMAGE,
                descriptor_count: count as u32,
            },
        ];
        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(2 * count as u32)
            .pool_sizes(&pool_sizes);
        self.descriptor_pool = unsafe {
            device
                .create_descriptor_pool(&pool_info, None)
                .map_err(DisplayError::Api)?
        };

        self.frames = command_buffers
            .into_iter()
            .map(|command_buffer| {
                Ok(FrameObjects {
                    image_available: Semaphore::new(device.clone())?,
                    render_finished: Semaphore::new(device.clone())?,
                    command_buffer,
                    graphics_set: vk::DescriptorSet::null(),
                    compute_set: vk::DescriptorSet::null(),
                })
            })
            .collect::<DisplayResult<Vec<_>>>()?;
        Ok((0..count).collect())
    }

    fn is_description_supported(&mut self, description: ImageDescription) -> DisplayResult<bool> {
        if description.is_empty() {
            return Ok(false);
        }
        let pipeline = self.pipeline.as_ref().ok_or_else(backend_destroyed)?;
        if !pipeline.supports_format(description.format) {
            return Ok(false);
        }
        let plan = pipeline.upload_plan(description);
        self.context
            .supports_linear_image(plan.format, plan.width, description.height)
    }

    fn check_displayable(&mut self, description: ImageDescription) -> DisplayResult<()> {
        if self.is_description_supported(description)? {
            Ok(())
        } else {
            Err(DisplayError::Unsupported {
                reason: format!("device cannot sample or convert {description:?}"),
            })
        }
    }

    fn create_slot_image(
        &mut self,
        description: ImageDescription,
    ) -> DisplayResult<VulkanSlotImage> {
        self.ensure_format(description)?;
        let plan = {
            let pipeline = self.pipeline.as_ref().ok_or_else(backend_destroyed)?;
            pipeline.upload_plan(description)
        };
        VulkanSlotImage::new(
            self.context.device.clone(),
            &self.memory_type_host(),
            description,
            plan.format,
            plan.width,
            plan.conversion,
        )
    }

    fn destroy_slot_image(&mut self, image: &mut VulkanSlotImage) {
        image.destroy();
    }

    fn wait_slot_released(&mut self, image: &VulkanSlotImage) -> DisplayResult<()> {
        image.fence().wait(u64::MAX)
    }

    fn poll_slot_released(&mut self, image: &VulkanSlotImage) -> DisplayResult<bool> {
        image.fence().is_signaled()
    }

    fn reconfigure_pipeline(&mut self, description: ImageDescription) -> DisplayResult<()> {
        self.ensure_format(description)
    }

    fn acquire_surface_image(&mut self, resources: &usize) -> DisplayResult<AcquireOutcome> {
        let frame = self
            .frames
            .get(*resources)
            .ok_or_else(backend_destroyed)?;
        self.swapchain_ref()?.acquire(frame.image_available.handle())
    }

    fn recreate_surface(&mut self, parameters: WindowParameters) -> DisplayResult<()> {
        let swapchain = self.swapchain.take().ok_or_else(backend_destroyed)?;
        let rebuilt = swapchain.recreate(
            self.context.surface,
            &self.context.surface_loader,
            self.context.physical_device,
            parameters,
            self.preference,
        )?;
        let surface_format = rebuilt.format().format;
        self.swapchain = Some(rebuilt);

        let pipeline = self.pipeline.as_mut().ok_or_else(backend_destroyed)?;
        pipeline.surface_format_changed(surface_format)?;
        let render_pass = pipeline.render_pass();
        self.allocate_descriptor_sets()?;
        if let Some(swapchain) = self.swapchain.as_mut() {
            swapchain.create_framebuffers(render_pass)?;
        }
        Ok(())
    }

    fn submit_frame(
        &mut self,
        resources: &usize,
        image: &mut VulkanSlotImage,
        surface_index: u32,
        area: RenderArea,
    ) -> DisplayResult<()> {
        image.flush()?;
        image.fence().reset()?;
        self.record_commands(*resources, image, surface_index, area)?;

        let frame = &self.frames[*resources];
        let wait_semaphores = [frame.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [frame.command_buffer];
        let signal_semaphores = [frame.render_finished.handle()];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);
        unsafe {
            self.context
                .device
                .queue_submit(
                    self.context.queue,
                    &[submit_info.build()],
                    image.fence().handle(),
                )
                .map_err(DisplayError::Api)
        }
    }

    fn present_frame(&mut self, resources: &usize, surface_index: u32) -> DisplayResult<PresentOutcome> {
        let frame = self
            .frames
            .get(*resources)
            .ok_or_else(backend_destroyed)?;
        self.swapchain_ref()?.present(
            self.context.queue,
            frame.render_finished.handle(),
            surface_index,
        )
    }

    fn wait_idle(&mut self) -> DisplayResult<()> {
        self.context.wait_idle()
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        if let Err(err) = self.context.wait_idle() {
            warn!("device wait failed while destroying backend: {err}");
        }
        self.frames.clear();
        unsafe {
            if self.descriptor_pool != vk::DescriptorPool::null() {
                self.context
                    .device
                    .destroy_descriptor_pool(self.descriptor_pool, None);
                self.descriptor_pool = vk::DescriptorPool::null();
            }
            self.context
                .device
                .destroy_command_pool(self.command_pool, None);
        }
        self.pipeline = None;
        self.swapchain = None;
    }
}

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        self.destroy();
    }
}
