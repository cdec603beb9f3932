//! Vulkan instance, device, and queue initialization

use std::ffi::CStr;
use std::ffi::CString;

use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::{vk, Device, Entry, Instance};
use log::{debug, info};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::config::DisplayConfig;
use crate::display::error::{DisplayError, DisplayResult};

/// Owned Vulkan context: instance, surface, logical device, and the
/// single graphics+present queue the engine submits to
pub struct VulkanContext {
    // Never read after init, but the loaded library must outlive the
    // instance and device.
    _entry: Entry,
    /// Vulkan instance handle
    pub instance: Instance,
    /// Surface extension loader
    pub surface_loader: Surface,
    /// Presentation surface
    pub surface: vk::SurfaceKHR,
    /// Selected physical device
    pub physical_device: vk::PhysicalDevice,
    /// Cached memory properties of the physical device
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Queue family used for graphics, compute, and present
    pub queue_family_index: u32,
    /// Logical device
    pub device: Device,
    /// Submission queue
    pub queue: vk::Queue,
    /// Whether the device samples chroma-subsampled formats natively
    pub ycbcr_sampling: bool,
}

impl VulkanContext {
    /// Initialize Vulkan against an existing window
    pub fn new(
        display_handle: RawDisplayHandle,
        window_handle: RawWindowHandle,
        config: &DisplayConfig,
    ) -> DisplayResult<Self> {
        let entry = unsafe { Entry::load() }.map_err(|e| {
            DisplayError::InitializationFailed(format!("failed to load Vulkan: {e:?}"))
        })?;

        let instance = create_instance(&entry, display_handle, config)?;

        let surface = unsafe {
            ash_window::create_surface(&entry, &instance, display_handle, window_handle, None)
                .map_err(DisplayError::Api)?
        };
        let surface_loader = Surface::new(&entry, &instance);

        let (physical_device, queue_family_index) =
            select_physical_device(&instance, &surface_loader, surface, config.gpu_index)?;

        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let device_name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) };
        info!("using GPU: {}", device_name.to_string_lossy());

        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(physical_device) };

        // Vulkan 1.1 core feature query for chroma-subsampled sampling
        let mut ycbcr_features = vk::PhysicalDeviceSamplerYcbcrConversionFeatures::builder();
        let mut features2 =
            vk::PhysicalDeviceFeatures2::builder().push_next(&mut ycbcr_features);
        unsafe { instance.get_physical_device_features2(physical_device, &mut features2) };
        let ycbcr_sampling = ycbcr_features.sampler_ycbcr_conversion == vk::TRUE;
        debug!("native YCbCr sampling: {ycbcr_sampling}");

        let (device, queue) = create_logical_device(
            &instance,
            physical_device,
            queue_family_index,
            ycbcr_sampling,
        )?;

        Ok(Self {
            _entry: entry,
            instance,
            surface_loader,
            surface,
            physical_device,
            memory_properties,
            queue_family_index,
            device,
            queue,
            ycbcr_sampling,
        })
    }

    /// Whether a linear-tiling sampled image of this format and size
    /// can exist on the device
    pub fn supports_linear_image(
        &self,
        format: vk::Format,
        width: u32,
        height: u32,
    ) -> DisplayResult<bool> {
        let props = unsafe {
            self.instance
                .get_physical_device_format_properties(self.physical_device, format)
        };
        if !props
            .linear_tiling_features
            .contains(vk::FormatFeatureFlags::SAMPLED_IMAGE)
        {
            return Ok(false);
        }
        let limits = unsafe {
            self.instance.get_physical_device_image_format_properties(
                self.physical_device,
                format,
                vk::ImageType::TYPE_2D,
                vk::ImageTiling::LINEAR,
                vk::ImageUsageFlags::SAMPLED,
                vk::ImageCreateFlags::empty(),
            )
        };
        match limits {
            Ok(limits) => {
                Ok(width <= limits.max_extent.width && height <= limits.max_extent.height)
            }
            Err(vk::Result::ERROR_FORMAT_NOT_SUPPORTED) => Ok(false),
            Err(err) => Err(DisplayError::Api(err)),
        }
    }

    /// Find a memory type matching the requirements, preferring
    /// `optional` flags on top of the `required` ones
    pub fn find_memory_type(
        &self,
        requirements: vk::MemoryRequirements,
        required: vk::MemoryPropertyFlags,
        optional: vk::MemoryPropertyFlags,
    ) -> DisplayResult<u32> {
        let search = |flags: vk::MemoryPropertyFlags| {
            self.memory_properties.memory_types
                [..self.memory_properties.memory_type_count as usize]
                .iter()
                .enumerate()
                .position(|(index, memory_type)| {
                    requirements.memory_type_bits & (1 << index) != 0
                        && memory_type.property_flags.contains(flags)
                })
        };
        search(required | optional)
            .or_else(|| search(required))
            .map(|index| index as u32)
            .ok_or_else(|| DisplayError::Allocation {
                reason: format!("no memory type with flags {required:?}"),
            })
    }

    /// Block until the device is idle
    pub fn wait_idle(&self) -> DisplayResult<()> {
        unsafe { self.device.device_wait_idle().map_err(DisplayError::Api) }
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);
            self.instance.destroy_instance(None);
        }
    }
}

fn create_instance(
    entry: &Entry,
    display_handle: RawDisplayHandle,
    config: &DisplayConfig,
) -> DisplayResult<Instance> {
    let app_name = CString::new("video_display").unwrap_or_default();
    let app_info = vk::ApplicationInfo::builder()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 1, 0, 0))
        .engine_name(&app_name)
        .engine_version(vk::make_api_version(0, 1, 0, 0))
        // 1.1 for sampler YCbCr conversion
        .api_version(vk::API_VERSION_1_1);

    let extensions = ash_window::enumerate_required_extensions(display_handle)
        .map_err(DisplayError::Api)?
        .to_vec();

    let layer_names = if config.enable_validation {
        vec![CString::new("VK_LAYER_KHRONOS_validation").unwrap_or_default()]
    } else {
        vec![]
    };
    let layer_ptrs: Vec<*const i8> = layer_names.iter().map(|name| name.as_ptr()).collect();

    let create_info = vk::InstanceCreateInfo::builder()
        .application_info(&app_info)
        .enabled_extension_names(&extensions)
        .enabled_layer_names(&layer_ptrs);

    unsafe {
        entry
            .create_instance(&create_info, None)
            .map_err(DisplayError::Api)
    }
}

fn select_physical_device(
    instance: &Instance,
    surface_loader: &Surface,
    surface: vk::SurfaceKHR,
    forced_index: Option<u32>,
) -> DisplayResult<(vk::PhysicalDevice, u32)> {
    let devices = unsafe {
        instance
            .enumerate_physical_devices()
            .map_err(DisplayError::Api)?
    };
    if devices.is_empty() {
        return Err(DisplayError::InitializationFailed(
            "no Vulkan-capable GPU found".to_string(),
        ));
    }

    if let Some(index) = forced_index {
        let device = *devices.get(index as usize).ok_or_else(|| {
            DisplayError::InitializationFailed(format!(
                "requested GPU index {index}, only {} devices present",
                devices.len()
            ))
        })?;
        let family = find_queue_family(instance, surface_loader, surface, device)?
            .ok_or_else(|| {
                DisplayError::InitializationFailed(format!(
                    "GPU index {index} has no graphics+present queue family"
                ))
            })?;
        return Ok((device, family));
    }

    // Prefer a discrete GPU; otherwise take the first suitable device.
    let mut fallback = None;
    for &device in &devices {
        let Some(family) = find_queue_family(instance, surface_loader, surface, device)? else {
            continue;
        };
        let properties = unsafe { instance.get_physical_device_properties(device) };
        if properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
            return Ok((device, family));
        }
        fallback.get_or_insert((device, family));
    }
    fallback.ok_or_else(|| {
        DisplayError::InitializationFailed(
            "no GPU with a graphics queue that can present to the surface".to_string(),
        )
    })
}

fn find_queue_family(
    instance: &Instance,
    surface_loader: &Surface,
    surface: vk::SurfaceKHR,
    device: vk::PhysicalDevice,
) -> DisplayResult<Option<u32>> {
    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
    for (index, family) in families.iter().enumerate() {
        let index = index as u32;
        if !family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            continue;
        }
        // Graphics implies compute support for the conversion pass on
        // every driver this targets, but presentation must be queried.
        let presentable = unsafe {
            surface_loader
                .get_physical_device_surface_support(device, index, surface)
                .map_err(DisplayError::Api)?
        };
        if presentable {
            return Ok(Some(index));
        }
    }
    Ok(None)
}

fn create_logical_device(
    instance: &Instance,
    physical_device: vk::PhysicalDevice,
    queue_family_index: u32,
    enable_ycbcr: bool,
) -> DisplayResult<(Device, vk::Queue)> {
    let queue_priorities = [1.0f32];
    let queue_info = vk::DeviceQueueCreateInfo::builder()
        .queue_family_index(queue_family_index)
        .queue_priorities(&queue_priorities);
    let queue_infos = [queue_info.build()];

    let extensions = [SwapchainLoader::name().as_ptr()];

    let mut ycbcr_features = vk::PhysicalDeviceSamplerYcbcrConversionFeatures::builder()
        .sampler_ycbcr_conversion(enable_ycbcr);

    let mut create_info = vk::DeviceCreateInfo::builder()
        .queue_create_infos(&queue_infos)
        .enabled_extension_names(&extensions);
    if enable_ycbcr {
        create_info = create_info.push_next(&mut ycbcr_features);
    }

    let device = unsafe {
        instance
            .create_device(physical_device, &create_info, None)
            .map_err(DisplayError::Api)?
    };
    let queue = unsafe { device.get_device_queue(queue_family_index, 0) };
    Ok((device, queue))
}
