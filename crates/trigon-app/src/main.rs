// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use trigon_core::init_tracing;
use trigon_render::{RenderSettings, Renderer};
use trigon_render_vk::VkRenderer;
use tracing::{error, info};

use trigon_platform::winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use std::path::PathBuf;

mod config;

use config::{load_cfg, AppCfg};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML config; a missing file means defaults
    #[arg(long, default_value = "trigon.toml")]
    config: PathBuf,

    /// Print what every GPU supports and exit
    #[arg(long)]
    list_devices: bool,

    /// With --list-devices, also name every extension and layer
    #[arg(long, short)]
    verbose: bool,

    /// Force validation layers on or off (default: on for debug builds)
    #[arg(long, value_enum)]
    validation: Option<Toggle>,
}

struct App {
    cfg: AppCfg,
    settings: RenderSettings,
    window: Option<Window>,
    renderer: Option<VkRenderer>,
    exiting: bool,
    failure: Option<anyhow::Error>,
}

impl App {
    fn new(cfg: AppCfg, settings: RenderSettings) -> Self {
        App {
            cfg,
            settings,
            window: None,
            renderer: None,
            exiting: false,
            failure: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{err:#}");
        self.failure.get_or_insert(err);
        self.shutdown(event_loop);
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.exiting = true;
        // Vulkan objects go before the window they present to.
        if let Some(r) = self.renderer.take() {
            info!("frames presented: {}", r.frames());
        }
        self.window = None;
        event_loop.exit();
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = trigon_platform::fixed_window_attributes(
            &self.cfg.window.title,
            self.settings.size,
        );
        let window = event_loop.create_window(attrs).context("create_window")?;

        self.settings.size = trigon_platform::window_render_size(&window);
        let renderer =
            VkRenderer::new(&window, &window, &self.settings).context("vulkan init")?;

        info!(
            "window {}x{} \"{}\"",
            self.settings.size.width, self.settings.size.height, self.cfg.window.title
        );
        self.window = Some(window);
        self.renderer = Some(renderer);
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() && !self.exiting {
            if let Err(e) = self.init(event_loop) {
                self.fail(event_loop, e);
                return;
            }
        }
        event_loop.set_control_flow(ControlFlow::Poll);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(window) = &self.window {
            if window_id != window.id() {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.shutdown(event_loop);
            }

            WindowEvent::RedrawRequested => {
                if self.exiting {
                    return;
                }
                if let Some(renderer) = &mut self.renderer {
                    if let Err(e) = renderer.render() {
                        self.fail(event_loop, e.context("render"));
                    }
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if self.exiting {
            return;
        }
        if let Some(w) = &self.window {
            w.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    if args.list_devices {
        for report in trigon_render_vk::device_reports(args.verbose)? {
            println!("{report}");
        }
        return Ok(());
    }

    let cfg = load_cfg(&args.config)?;
    let mut settings = cfg.render_settings();
    if let Some(v) = args.validation {
        settings.validation = Some(matches!(v, Toggle::On));
    }
    info!(
        "validation {}",
        if settings.validation_enabled() { "on" } else { "off" }
    );

    let event_loop: EventLoop<()> = EventLoop::new()?;
    let mut app = App::new(cfg, settings);
    event_loop.run_app(&mut app)?;

    match app.failure.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
