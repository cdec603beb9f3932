//! SPIR-V shader module loading

use std::path::Path;

use ash::{vk, Device};

use crate::display::error::{DisplayError, DisplayResult};

/// Shader module wrapper with RAII cleanup
pub struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Create a shader module from SPIR-V words
    pub fn new(device: Device, code: &[u32]) -> DisplayResult<Self> {
        let create_info = vk::ShaderModuleCreateInfo::builder().code(code);

        let module = unsafe {
            device
                .create_shader_module(&create_info, None)
                .map_err(DisplayError::Api)?
        };

        Ok(Self { device, module })
    }

    /// Load a compiled SPIR-V blob from `dir/name`
    pub fn load(device: Device, dir: &Path, name: &str) -> DisplayResult<Self> {
        let path = dir.join(name);
        let bytes = std::fs::read(&path).map_err(|source| DisplayError::ShaderLoad {
            name: name.to_string(),
            source,
        })?;
        let words = spirv_words(&bytes).ok_or_else(|| DisplayError::ShaderLoad {
            name: name.to_string(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "SPIR-V blob is not a whole number of 32-bit words",
            ),
        })?;
        Self::new(device, &words)
    }

    /// Get the shader module handle
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}

fn spirv_words(bytes: &[u8]) -> Option<Vec<u32>> {
    if bytes.len() % 4 != 0 || bytes.is_empty() {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_truncated_blobs() {
        assert!(spirv_words(&[1, 2, 3]).is_none());
        assert!(spirv_words(&[]).is_none());
    }

    #[test]
    fn decodes_little_endian_words() {
        let words = spirv_words(&[0x03, 0x02, 0x23, 0x07]).unwrap();
        assert_eq!(words, vec![0x0723_0203]);
    }
}
