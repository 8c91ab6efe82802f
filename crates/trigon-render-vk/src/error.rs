use ash::prelude::VkResult;
use ash::vk;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal conditions while bringing the device up. Nothing here is retried.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("validation layer {0} requested, but not available")]
    MissingLayer(String),
    #[error("instance extension {0} required, but not available")]
    MissingExtension(String),
    #[error("failed to find GPUs with Vulkan support")]
    NoPhysicalDevice,
    #[error("failed to find a suitable GPU ({checked} checked)")]
    NoSuitableDevice { checked: usize },
    #[error("surface reports no supported formats")]
    NoSurfaceFormats,
    #[error("failed to load shader {}", path.display())]
    ShaderLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{call} failed: {result:?}")]
    Vk {
        call: &'static str,
        result: vk::Result,
    },
}

/// Tags a raw `VkResult` with the API call that produced it.
pub(crate) trait VkCall<T> {
    fn call(self, call: &'static str) -> Result<T, SetupError>;
}

impl<T> VkCall<T> for VkResult<T> {
    fn call(self, call: &'static str) -> Result<T, SetupError> {
        self.map_err(|result| SetupError::Vk { call, result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vk_failures_name_the_call() {
        let r: VkResult<()> = Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        let err = r.call("vkCreateInstance").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("vkCreateInstance"), "{msg}");
        assert!(msg.contains("ERROR_INITIALIZATION_FAILED"), "{msg}");
    }

    #[test]
    fn shader_errors_keep_the_io_source() {
        let err = SetupError::ShaderLoad {
            path: PathBuf::from("tri.vert.spv"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(err.to_string().contains("tri.vert.spv"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
