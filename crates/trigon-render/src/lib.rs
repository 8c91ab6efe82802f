// SPDX-License-Identifier: CEPL-1.0
use anyhow::Result;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

/// Primitive assembly for the fixed pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Topology {
    PointList,
    LineList,
    #[default]
    LineStrip,
    TriangleList,
    TriangleStrip,
    TriangleFan,
}

/// Everything a backend needs to bring up the fixed pipeline. Built once by
/// the application and never mutated afterwards.
#[derive(Clone, Debug)]
pub struct RenderSettings {
    /// Target resolution, used when the surface lets us pick the extent.
    pub size: RenderSize,
    pub clear_color: [f32; 4],
    pub topology: Topology,
    pub vertex_count: u32,
    pub instance_count: u32,
    /// `None` means the shaders shipped with the backend.
    pub vertex_shader: Option<PathBuf>,
    pub fragment_shader: Option<PathBuf>,
    /// `None` follows the build profile (on for debug builds).
    pub validation: Option<bool>,
}

impl RenderSettings {
    pub fn validation_enabled(&self) -> bool {
        self.validation.unwrap_or(cfg!(debug_assertions))
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        RenderSettings {
            size: RenderSize {
                width: 800,
                height: 600,
            },
            clear_color: [0.0, 0.0, 0.0, 1.0],
            topology: Topology::default(),
            vertex_count: 3,
            instance_count: 1,
            vertex_shader: None,
            fragment_shader: None,
            validation: None,
        }
    }
}

pub trait Renderer {
    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        settings: &RenderSettings,
    ) -> Result<Self>
    where
        Self: Sized;

    /// Draws one frame. Blocks until the swapchain hands out an image.
    fn render(&mut self) -> Result<()>;

    /// Frames presented so far.
    fn frames(&self) -> u64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_draw_three_vertices_as_a_line_strip() {
        let s = RenderSettings::default();
        assert_eq!(s.topology, Topology::LineStrip);
        assert_eq!((s.vertex_count, s.instance_count), (3, 1));
        assert_eq!(s.clear_color, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(s.size, RenderSize { width: 800, height: 600 });
    }

    #[test]
    fn explicit_validation_overrides_build_profile() {
        let mut s = RenderSettings::default();
        assert_eq!(s.validation_enabled(), cfg!(debug_assertions));
        s.validation = Some(false);
        assert!(!s.validation_enabled());
        s.validation = Some(true);
        assert!(s.validation_enabled());
    }
}
