//! RAII wrappers for Vulkan synchronization objects

use ash::{vk, Device};

use crate::display::error::{DisplayError, DisplayResult};

/// GPU-GPU synchronization primitive with automatic cleanup
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a new semaphore
    pub fn new(device: Device) -> DisplayResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();

        let semaphore = unsafe {
            device
                .create_semaphore(&create_info, None)
                .map_err(DisplayError::Api)?
        };

        Ok(Self { device, semaphore })
    }

    /// Get the semaphore handle
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Fence wrapper with RAII cleanup
pub struct Fence {
    device: Device,
    fence: vk::Fence,
}

impl Fence {
    /// Create a new fence, optionally pre-signaled
    pub fn new(device: Device, signaled: bool) -> DisplayResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::builder().flags(flags);

        let fence = unsafe {
            device
                .create_fence(&create_info, None)
                .map_err(DisplayError::Api)?
        };

        Ok(Self { device, fence })
    }

    /// Wait for the fence with a timeout in nanoseconds
    pub fn wait(&self, timeout: u64) -> DisplayResult<()> {
        unsafe {
            self.device
                .wait_for_fences(&[self.fence], true, timeout)
                .map_err(DisplayError::Api)
        }
    }

    /// Non-blocking signal check
    pub fn is_signaled(&self) -> DisplayResult<bool> {
        match unsafe { self.device.wait_for_fences(&[self.fence], true, 0) } {
            Ok(()) => Ok(true),
            Err(vk::Result::TIMEOUT) => Ok(false),
            Err(err) => Err(DisplayError::Api(err)),
        }
    }

    /// Reset the fence to unsignaled
    pub fn reset(&self) -> DisplayResult<()> {
        unsafe {
            self.device
                .reset_fences(&[self.fence])
                .map_err(DisplayError::Api)
        }
    }

    /// Get the fence handle
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
        }
    }
}
