//! Swapchain and framebuffer management
//!
//! Acquisition and present map Vulkan's staleness signals onto the
//! engine's outcomes: SUBOPTIMAL or OUT_OF_DATE at acquire demand a
//! rebuild before drawing, while a suboptimal present is tolerated
//! because the frame already reached the display.

use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::{vk, Device};
use log::debug;

use crate::display::backend::{AcquireOutcome, PresentOutcome};
use crate::display::error::{DisplayError, DisplayResult};
use crate::display::surface::WindowParameters;

/// How long one surface-image acquisition may block, in nanoseconds
const ACQUIRE_TIMEOUT_NS: u64 = 500_000_000;

/// Present-mode preference derived from configuration
#[derive(Debug, Clone, Copy)]
pub struct PresentPreference {
    /// Prefer a vsynced mode
    pub vsync: bool,
    /// Allow tearing modes when vsync is off
    pub tearing_permitted: bool,
}

/// Swapchain wrapper with per-image views and framebuffers
pub struct Swapchain {
    device: Device,
    loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    image_views: Vec<vk::ImageView>,
    framebuffers: Vec<vk::Framebuffer>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Create a swapchain sized to the window
    pub fn new(
        loader: SwapchainLoader,
        device: Device,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
        physical_device: vk::PhysicalDevice,
        window: WindowParameters,
        preference: PresentPreference,
    ) -> DisplayResult<Self> {
        Self::build(
            loader,
            device,
            surface,
            surface_loader,
            physical_device,
            window,
            preference,
            vk::SwapchainKHR::null(),
        )
    }

    /// Recreate the swapchain, handing the old one to the driver so
    /// in-flight presents can finish
    pub fn recreate(
        mut self,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
        physical_device: vk::PhysicalDevice,
        window: WindowParameters,
        preference: PresentPreference,
    ) -> DisplayResult<Self> {
        let old = self.swapchain;
        self.destroy_views();
        // Drop of the consumed value must not touch the retired handle.
        self.swapchain = vk::SwapchainKHR::null();
        let rebuilt = Self::build(
            self.loader.clone(),
            self.device.clone(),
            surface,
            surface_loader,
            physical_device,
            window,
            preference,
            old,
        );
        unsafe {
            self.loader.destroy_swapchain(old, None);
        }
        rebuilt
    }

    #[allow(clippy::too_many_lines)]
    fn build(
        loader: SwapchainLoader,
        device: Device,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
        physical_device: vk::PhysicalDevice,
        window: WindowParameters,
        preference: PresentPreference,
        old_swapchain: vk::SwapchainKHR,
    ) -> DisplayResult<Self> {
        let surface_caps = unsafe {
            surface_loader
                .get_physical_device_surface_capabilities(physical_device, surface)
                .map_err(DisplayError::Api)?
        };

        // Choose surface format
        let surface_formats = unsafe {
            surface_loader
                .get_physical_device_surface_formats(physical_device, surface)
                .map_err(DisplayError::Api)?
        };
        let format = surface_formats
            .iter()
            .find(|sf| {
                sf.format == vk::Format::B8G8R8A8_SRGB
                    && sf.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
            })
            .copied()
            .unwrap_or(surface_formats[0]);

        // Choose present mode
        let present_modes = unsafe {
            surface_loader
                .get_physical_device_surface_present_modes(physical_device, surface)
                .map_err(DisplayError::Api)?
        };
        let present_mode = choose_present_mode(&present_modes, preference);
        debug!("present mode: {present_mode:?}");

        // Choose extent
        let extent = if surface_caps.current_extent.width != u32::MAX {
            surface_caps.current_extent
        } else {
            vk::Extent2D {
                width: window.width.clamp(
                    surface_caps.min_image_extent.width,
                    surface_caps.max_image_extent.width,
                ),
                height: window.height.clamp(
                    surface_caps.min_image_extent.height,
                    surface_caps.max_image_extent.height,
                ),
            }
        };

        // Choose image count
        let image_count = (surface_caps.min_image_count + 1).min(
            if surface_caps.max_image_count > 0 {
                surface_caps.max_image_count
            } else {
                surface_caps.min_image_count + 1
            },
        );

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(surface_caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = unsafe {
            loader
                .create_swapchain(&create_info, None)
                .map_err(DisplayError::Api)?
        };

        let images = unsafe {
            loader
                .get_swapchain_images(swapchain)
                .map_err(DisplayError::Api)?
        };

        let image_views: Result<Vec<_>, _> = images
            .iter()
            .map(|&image| {
                let create_info = vk::ImageViewCreateInfo::builder()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(format.format)
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    });

                unsafe { device.create_image_view(&create_info, None) }
            })
            .collect();
        let image_views = image_views.map_err(DisplayError::Api)?;

        Ok(Self {
            device,
            loader,
            swapchain,
            image_views,
            framebuffers: Vec::new(),
            format,
            extent,
        })
    }

    /// (Re)build one framebuffer per swapchain image for a render pass
    pub fn create_framebuffers(&mut self, render_pass: vk::RenderPass) -> DisplayResult<()> {
        self.destroy_framebuffers();
        for &view in &self.image_views {
            let attachments = [view];
            let create_info = vk::FramebufferCreateInfo::builder()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(self.extent.width)
                .height(self.extent.height)
                .layers(1);
            let framebuffer = unsafe {
                self.device
                    .create_framebuffer(&create_info, None)
                    .map_err(DisplayError::Api)?
            };
            self.framebuffers.push(framebuffer);
        }
        Ok(())
    }

    /// Try to acquire the next surface image
    pub fn acquire(&self, signal: vk::Semaphore) -> DisplayResult<AcquireOutcome> {
        let result = unsafe {
            self.loader.acquire_next_image(
                self.swapchain,
                ACQUIRE_TIMEOUT_NS,
                signal,
                vk::Fence::null(),
            )
        };
        match result {
            // A suboptimal image would still present, but stretched;
            // rebuild before drawing instead.
            Ok((_, true)) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::Stale),
            Ok((index, false)) => Ok(AcquireOutcome::Image(index)),
            Err(vk::Result::TIMEOUT | vk::Result::NOT_READY) => Ok(AcquireOutcome::Timeout),
            Err(err) => Err(DisplayError::Api(err)),
        }
    }

    /// Present a rendered image
    pub fn present(
        &self,
        queue: vk::Queue,
        wait: vk::Semaphore,
        image_index: u32,
    ) -> DisplayResult<PresentOutcome> {
        let wait_semaphores = [wait];
        let swapchains = [self.swapchain];
        let indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&indices);

        let result = unsafe { self.loader.queue_present(queue, &present_info) };
        match result {
            // The frame reached the screen either way.
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::Stale),
            Err(err) => Err(DisplayError::Api(err)),
        }
    }

    /// Framebuffer for a surface image index
    pub fn framebuffer(&self, image_index: u32) -> Option<vk::Framebuffer> {
        self.framebuffers.get(image_index as usize).copied()
    }

    /// Surface format the swapchain was built with
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// Current swapchain extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn destroy_framebuffers(&mut self) {
        unsafe {
            for framebuffer in self.framebuffers.drain(..) {
                self.device.destroy_framebuffer(framebuffer, None);
            }
        }
    }

    fn destroy_views(&mut self) {
        self.destroy_framebuffers();
        unsafe {
            for view in self.image_views.drain(..) {
                self.device.destroy_image_view(view, None);
            }
        }
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.destroy_views();
        unsafe {
            if self.swapchain != vk::SwapchainKHR::null() {
                self.loader.destroy_swapchain(self.swapchain, None);
            }
        }
    }
}

fn choose_present_mode(
    available: &[vk::PresentModeKHR],
    preference: PresentPreference,
) -> vk::PresentModeKHR {
    let pick = |wanted: vk::PresentModeKHR| available.contains(&wanted).then_some(wanted);
    if preference.vsync {
        // Relaxed vsync tears instead of stuttering when a frame is
        // late; FIFO itself is always available.
        if preference.tearing_permitted {
            if let Some(mode) = pick(vk::PresentModeKHR::FIFO_RELAXED) {
                return mode;
            }
        }
        return vk::PresentModeKHR::FIFO;
    }
    pick(vk::PresentModeKHR::MAILBOX)
        .or_else(|| {
            preference
                .tearing_permitted
                .then(|| pick(vk::PresentModeKHR::IMMEDIATE))
                .flatten()
        })
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vsync_always_uses_fifo() {
        let modes = [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::FIFO];
        let preference = PresentPreference {
            vsync: true,
            tearing_permitted: false,
        };
        assert_eq!(choose_present_mode(&modes, preference), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn relaxed_vsync_needs_tearing_permission() {
        let modes = [vk::PresentModeKHR::FIFO_RELAXED, vk::PresentModeKHR::FIFO];
        let strict = PresentPreference {
            vsync: true,
            tearing_permitted: false,
        };
        assert_eq!(choose_present_mode(&modes, strict), vk::PresentModeKHR::FIFO);
        let relaxed = PresentPreference {
            vsync: true,
            tearing_permitted: true,
        };
        assert_eq!(
            choose_present_mode(&modes, relaxed),
            vk::PresentModeKHR::FIFO_RELAXED
        );
    }

    #[test]
    fn no_vsync_prefers_mailbox() {
        let modes = [
            vk::PresentModeKHR::IMMEDIATE,
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::FIFO,
        ];
        let preference = PresentPreference {
            vsync: false,
            tearing_permitted: true,
        };
        assert_eq!(
            choose_present_mode(&modes, preference),
            vk::PresentModeKHR::MAILBOX
        );
    }

    #[test]
    fn tearing_only_when_permitted() {
        let modes = [vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO];
        let no_tearing = PresentPreference {
            vsync: false,
            tearing_permitted: false,
        };
        assert_eq!(
            choose_present_mode(&modes, no_tearing),
            vk::PresentModeKHR::FIFO
        );
        let tearing = PresentPreference {
            vsync: false,
            tearing_permitted: true,
        };
        assert_eq!(
            choose_present_mode(&modes, tearing),
            vk::PresentModeKHR::IMMEDIATE
        );
    }
}
