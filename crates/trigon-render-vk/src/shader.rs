use crate::error::{SetupError, VkCall};
use ash::util::read_spv;
use ash::vk;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use trigon_render::RenderSettings;

pub const VERTEX_FILE: &str = "tri.vert.spv";
pub const FRAGMENT_FILE: &str = "tri.frag.spv";

/// Where `build.rs` left the compiled built-in shaders.
pub fn builtin_dir() -> PathBuf {
    PathBuf::from(env!("TRIGON_SHADER_DIR"))
}

/// Vertex and fragment SPIR-V paths, falling back to the built-in pair.
pub fn shader_paths(settings: &RenderSettings) -> (PathBuf, PathBuf) {
    let dir = builtin_dir();
    (
        settings
            .vertex_shader
            .clone()
            .unwrap_or_else(|| dir.join(VERTEX_FILE)),
        settings
            .fragment_shader
            .clone()
            .unwrap_or_else(|| dir.join(FRAGMENT_FILE)),
    )
}

/// Zero-pads `bytes` up to a whole number of 32-bit words.
pub fn pad_to_words(mut bytes: Vec<u8>) -> Vec<u8> {
    let rem = bytes.len() % 4;
    if rem != 0 {
        bytes.resize(bytes.len() + 4 - rem, 0);
    }
    bytes
}

pub fn load_spirv(path: &Path) -> Result<Vec<u32>, SetupError> {
    let to_err = |source| SetupError::ShaderLoad {
        path: path.to_path_buf(),
        source,
    };
    let bytes = pad_to_words(std::fs::read(path).map_err(to_err)?);
    read_spv(&mut Cursor::new(&bytes[..])).map_err(to_err)
}

pub unsafe fn create_module(
    device: &ash::Device,
    code: &[u32],
) -> Result<vk::ShaderModule, SetupError> {
    let info = vk::ShaderModuleCreateInfo::default().code(code);
    device
        .create_shader_module(&info, None)
        .call("vkCreateShaderModule")
}
