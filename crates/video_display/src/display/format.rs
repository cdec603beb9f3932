//! Pixel formats and image descriptions
//!
//! Format metadata is expressed as pure functions on [`PixelFormat`];
//! there is no mutable global lookup state.

use ash::vk;
use serde::{Deserialize, Serialize};

/// Pixel layout of an incoming frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit RGBA, 4 bytes per pixel
    Rgba,
    /// 8-bit BGRA, 4 bytes per pixel
    Bgra,
    /// 8-bit RGB, 3 bytes per pixel
    Rgb,
    /// Packed 4:2:2 YCbCr, U Y0 V Y1 byte order, 2 bytes per pixel
    Uyvy,
    /// Packed 4:2:2 YCbCr, Y0 U Y1 V byte order, 2 bytes per pixel
    Yuyv,
}

impl PixelFormat {
    /// Bytes occupied by one pixel in the host buffer
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba | Self::Bgra => 4,
            Self::Rgb => 3,
            Self::Uyvy | Self::Yuyv => 2,
        }
    }

    /// Whether this is a chroma-subsampled YCbCr layout
    ///
    /// Such formats sample directly only through a chroma-subsampled
    /// sampler conversion; without that device capability they go
    /// through the compute conversion pre-pass.
    pub fn is_ycbcr(self) -> bool {
        matches!(self, Self::Uyvy | Self::Yuyv)
    }

    /// The native Vulkan format used when the image is sampled directly
    pub fn vk_format(self) -> vk::Format {
        match self {
            Self::Rgba => vk::Format::R8G8B8A8_SRGB,
            Self::Bgra => vk::Format::B8G8R8A8_SRGB,
            Self::Rgb => vk::Format::R8G8B8_SRGB,
            // Byte order UYVY maps to B8G8R8G8 and YUYV to G8B8G8R8 in
            // Vulkan's "G = luma, B/R = chroma" naming.
            Self::Uyvy => vk::Format::B8G8R8G8_422_UNORM,
            Self::Yuyv => vk::Format::G8B8G8R8_422_UNORM,
        }
    }

    /// Format of the upload image on the conversion-pass fallback path
    ///
    /// Packed 4:2:2 bytes are uploaded as half-width RGBA texels (one
    /// texel holds one macro-pixel pair) and expanded by the compute
    /// conversion shader.
    pub fn conversion_upload_format(self) -> vk::Format {
        vk::Format::R8G8B8A8_UNORM
    }
}

/// Size and pixel format of a frame
///
/// Compared by equality; any change triggers slot recreation and, when
/// the format differs, pipeline reconfiguration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageDescription {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Pixel layout
    pub format: PixelFormat,
}

impl ImageDescription {
    /// Create a description
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            format,
        }
    }

    /// Whether the description covers zero pixels
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Tightly packed bytes in one row of the host buffer
    pub fn packed_row_bytes(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// Width in texels of the upload image when the conversion pre-pass
    /// is active (two packed pixels collapse into one RGBA texel)
    pub fn conversion_upload_width(&self) -> u32 {
        self.width / 2
    }
}
