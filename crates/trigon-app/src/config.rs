// SPDX-License-Identifier: CEPL-1.0
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use trigon_render::{RenderSettings, RenderSize, Topology};

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct AppCfg {
    #[serde(default)]
    pub window: WindowCfg,
    #[serde(default)]
    pub render: RenderCfg,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct WindowCfg {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowCfg {
    fn default() -> Self {
        WindowCfg {
            width: 800,
            height: 600,
            title: trigon_platform::DEFAULT_TITLE.to_owned(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TopologyCfg {
    PointList,
    LineList,
    #[default]
    LineStrip,
    TriangleList,
    TriangleStrip,
    TriangleFan,
}

impl From<TopologyCfg> for Topology {
    fn from(t: TopologyCfg) -> Self {
        match t {
            TopologyCfg::PointList => Topology::PointList,
            TopologyCfg::LineList => Topology::LineList,
            TopologyCfg::LineStrip => Topology::LineStrip,
            TopologyCfg::TriangleList => Topology::TriangleList,
            TopologyCfg::TriangleStrip => Topology::TriangleStrip,
            TopologyCfg::TriangleFan => Topology::TriangleFan,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct RenderCfg {
    pub clear_color: [f32; 4],
    pub topology: TopologyCfg,
    pub vertex_count: u32,
    pub instance_count: u32,
    pub vertex_shader: Option<PathBuf>,
    pub fragment_shader: Option<PathBuf>,
    pub validation: Option<bool>,
}

impl Default for RenderCfg {
    fn default() -> Self {
        let s = RenderSettings::default();
        RenderCfg {
            clear_color: s.clear_color,
            topology: TopologyCfg::default(),
            vertex_count: s.vertex_count,
            instance_count: s.instance_count,
            vertex_shader: None,
            fragment_shader: None,
            validation: None,
        }
    }
}

impl AppCfg {
    pub fn window_size(&self) -> RenderSize {
        RenderSize {
            width: self.window.width.max(1),
            height: self.window.height.max(1),
        }
    }

    pub fn render_settings(&self) -> RenderSettings {
        let r = &self.render;
        RenderSettings {
            size: self.window_size(),
            clear_color: r.clear_color,
            topology: r.topology.into(),
            vertex_count: r.vertex_count,
            instance_count: r.instance_count,
            vertex_shader: r.vertex_shader.clone(),
            fragment_shader: r.fragment_shader.clone(),
            validation: r.validation,
        }
    }
}

pub fn parse_cfg(text: &str) -> Result<AppCfg> {
    Ok(toml::from_str::<AppCfg>(text)?)
}

/// A missing file means defaults; a file that exists but does not parse is
/// an error.
pub fn load_cfg(path: &Path) -> Result<AppCfg> {
    match fs::read_to_string(path) {
        Ok(s) => parse_cfg(&s).with_context(|| format!("parse {}", path.display())),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!("no config at {}, using defaults", path.display());
            Ok(AppCfg::default())
        }
        Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = parse_cfg("").unwrap();
        let s = cfg.render_settings();
        assert_eq!(s.size, RenderSize { width: 800, height: 600 });
        assert_eq!(s.topology, Topology::LineStrip);
        assert_eq!((s.vertex_count, s.instance_count), (3, 1));
        assert_eq!(cfg.window.title, "Vulkan");
        assert_eq!(s.validation, None);
    }

    #[test]
    fn sections_override_individual_fields() {
        let cfg = parse_cfg(
            r#"
            [window]
            width = 1024
            title = "tri"

            [render]
            topology = "triangle_list"
            clear_color = [0.1, 0.2, 0.3, 1.0]
            fragment_shader = "shaders/flat.frag.spv"
            validation = false
            "#,
        )
        .unwrap();
        let s = cfg.render_settings();
        assert_eq!(s.size, RenderSize { width: 1024, height: 600 });
        assert_eq!(cfg.window.title, "tri");
        assert_eq!(s.topology, Topology::TriangleList);
        assert_eq!(s.clear_color, [0.1, 0.2, 0.3, 1.0]);
        assert_eq!(s.vertex_shader, None);
        assert_eq!(
            s.fragment_shader.as_deref(),
            Some(Path::new("shaders/flat.frag.spv"))
        );
        assert_eq!(s.validation, Some(false));
    }

    #[test]
    fn malformed_config_is_an_error() {
        assert!(parse_cfg("[render]\ntopology = \"hexagon\"").is_err());
        assert!(parse_cfg("[render]\nvertex_count = -1").is_err());
        assert!(parse_cfg("[window]\nfullscreen = true").is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("trigon-app-no-such-config.toml");
        let cfg = load_cfg(&path).unwrap();
        assert_eq!(cfg.window.width, 800);
    }

    #[test]
    fn zero_sized_window_is_clamped() {
        let cfg = parse_cfg("[window]\nwidth = 0\nheight = 0").unwrap();
        assert_eq!(cfg.window_size(), RenderSize { width: 1, height: 1 });
    }
}
