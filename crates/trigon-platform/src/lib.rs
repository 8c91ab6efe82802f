// SPDX-License-Identifier: CEPL-1.0
//! Windowing collaborator. The rest of the workspace reaches winit through
//! this crate so the version is pinned in one place.
pub use winit;

use trigon_render::RenderSize;
use winit::dpi::PhysicalSize;
use winit::window::{Window, WindowAttributes};

pub const DEFAULT_TITLE: &str = "Vulkan";

/// Attributes for the fixed-size, non-resizable presentation window.
pub fn fixed_window_attributes(title: &str, size: RenderSize) -> WindowAttributes {
    Window::default_attributes()
        .with_title(title)
        .with_inner_size(PhysicalSize::new(size.width.max(1), size.height.max(1)))
        .with_resizable(false)
}

/// Size the compositor actually gave us, never zero in either dimension.
pub fn window_render_size(window: &Window) -> RenderSize {
    let size = window.inner_size();
    let out = RenderSize {
        width: size.width.max(1),
        height: size.height.max(1),
    };
    tracing::debug!("window inner size {}x{}", out.width, out.height);
    out
}
