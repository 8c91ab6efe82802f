//! Vulkan bring-up for a single fixed pipeline.
//!
//! Stages run strictly in order and each consumes the previous stage's output
//! unchanged: capability probing ([`caps`]), device selection ([`select`]),
//! logical device ([`device`]), swapchain negotiation ([`swapchain`]), the
//! fixed render pipeline ([`pipeline`]) and the frame loop ([`frame`]).
use anyhow::{Context, Result};
use tracing::info;

use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use trigon_render::{RenderSettings, Renderer};

use ash::khr::{surface, swapchain as khr_swapchain};
use ash::vk;
use ash::{Entry, Instance};

pub mod caps;
pub mod debug;
pub mod device;
pub mod error;
pub mod frame;
pub mod guard;
pub mod instance;
pub mod pipeline;
pub mod select;
pub mod shader;
pub mod swapchain;

pub use error::SetupError;
pub use guard::HandleGuard;

use debug::DebugMessenger;
use device::DeviceContext;
use frame::{DrawParams, FrameSync};
use pipeline::RenderPipelineBundle;
use select::SurfacePresentSupport;
use swapchain::{SwapchainBundle, SwapchainPlan, SwapchainSupport};

pub struct VkRenderer {
    _entry: Entry,
    instance: Instance,
    debug: Option<DebugMessenger>,
    surface_loader: surface::Instance,
    surface: vk::SurfaceKHR,

    ctx: DeviceContext,

    swapchain_loader: khr_swapchain::Device,
    swapchain: SwapchainBundle,
    pipeline: RenderPipelineBundle,
    sync: FrameSync,

    frames: u64,
}

// Teardown runs in reverse creation order after the device is idle:
// semaphores, command buffers, pipeline, framebuffers, render pass, image
// views, swapchain, command pool, messenger, surface, device, instance.
impl Drop for VkRenderer {
    fn drop(&mut self) {
        unsafe {
            let d = &self.ctx.device;
            d.device_wait_idle().ok();

            self.sync.destroy(d);
            d.destroy_pipeline(self.pipeline.pipeline, None);
            for &fb in &self.swapchain.framebuffers {
                d.destroy_framebuffer(fb, None);
            }
            d.destroy_render_pass(self.pipeline.render_pass, None);
            for &iv in &self.swapchain.image_views {
                d.destroy_image_view(iv, None);
            }
            self.swapchain_loader
                .destroy_swapchain(self.swapchain.swapchain, None);
            self.sync.destroy_pool(d);

            if let Some(debug) = &self.debug {
                debug.destroy();
            }
            self.surface_loader.destroy_surface(self.surface, None);
            d.destroy_device(None);
            self.instance.destroy_instance(None);
        }
        info!("vulkan resources released after {} frames", self.frames);
    }
}

unsafe fn destroy_swapchain_bundle(
    device: &ash::Device,
    loader: &khr_swapchain::Device,
    bundle: &SwapchainBundle,
) {
    for &fb in &bundle.framebuffers {
        device.destroy_framebuffer(fb, None);
    }
    for &iv in &bundle.image_views {
        device.destroy_image_view(iv, None);
    }
    loader.destroy_swapchain(bundle.swapchain, None);
}

unsafe fn build_renderer(
    window: &dyn HasWindowHandle,
    display: &dyn HasDisplayHandle,
    settings: &RenderSettings,
) -> Result<VkRenderer> {
    let entry = Entry::linked();
    let diagnostics = settings.validation_enabled();

    let dh: RawDisplayHandle = display.display_handle()?.as_raw();
    let wh: RawWindowHandle = window.window_handle()?.as_raw();

    // Instance, messenger, surface and device are guarded until the renderer
    // owns them; an early return unwinds them in reverse.
    let instance = instance::create_instance(&entry, Some(dh), diagnostics)
        .context("create_instance")?;
    let instance_guard = HandleGuard::with_handle(instance.handle(), |_| unsafe {
        instance.destroy_instance(None)
    });

    let debug = if diagnostics {
        Some(DebugMessenger::new(&entry, &instance).context("create debug messenger")?)
    } else {
        None
    };
    let debug_guard = HandleGuard::with_handle(
        debug
            .as_ref()
            .map_or(vk::DebugUtilsMessengerEXT::null(), DebugMessenger::handle),
        |_| unsafe {
            if let Some(d) = &debug {
                d.destroy();
            }
        },
    );

    let surface_loader = surface::Instance::new(&entry, &instance);
    let surface = HandleGuard::with_handle(
        ash_window::create_surface(&entry, &instance, dh, wh, None).context("create_surface")?,
        |s| unsafe { surface_loader.destroy_surface(s, None) },
    );

    let records = caps::enumerate_devices(&instance)?;
    let present = SurfacePresentSupport {
        loader: &surface_loader,
        surface: surface.get(),
    };
    let selected = select::select_device(&records, caps::REQUIRED_DEVICE_EXTENSIONS, &present)?;

    let layers = instance::validation_layers(diagnostics);
    let ctx = device::create_logical_device(
        &instance,
        &selected,
        caps::REQUIRED_DEVICE_EXTENSIONS,
        &layers,
    )
    .context("create_device")?;
    let device_guard = HandleGuard::with_handle(ctx.device.handle(), |_| unsafe {
        ctx.device.destroy_device(None)
    });

    let support = SwapchainSupport::query(&surface_loader, selected.record.handle, surface.get())?;
    let plan = SwapchainPlan::negotiate(&support, &ctx.families, settings.size)?;
    let swapchain_loader = khr_swapchain::Device::new(&instance, &ctx.device);
    let mut bundle =
        swapchain::create_swapchain(&ctx.device, &swapchain_loader, surface.get(), &plan)
            .context("create_swapchain")?;

    let pipeline = match pipeline::build(&ctx.device, &mut bundle, settings) {
        Ok(p) => p,
        Err(e) => {
            destroy_swapchain_bundle(&ctx.device, &swapchain_loader, &bundle);
            return Err(e);
        }
    };

    let draw = DrawParams {
        clear_color: settings.clear_color,
        vertex_count: settings.vertex_count,
        instance_count: settings.instance_count,
    };
    let sync = match FrameSync::new(&ctx, &bundle, &pipeline, &draw) {
        Ok(s) => s,
        Err(e) => {
            ctx.device.destroy_pipeline(pipeline.pipeline, None);
            ctx.device.destroy_render_pass(pipeline.render_pass, None);
            destroy_swapchain_bundle(&ctx.device, &swapchain_loader, &bundle);
            return Err(e);
        }
    };

    device_guard.release();
    let surface = surface.release();
    debug_guard.release();
    instance_guard.release();

    Ok(VkRenderer {
        _entry: entry,
        instance,
        debug,
        surface_loader,
        surface,
        ctx,
        swapchain_loader,
        swapchain: bundle,
        pipeline,
        sync,
        frames: 0,
    })
}

impl VkRenderer {
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent
    }

    pub fn format(&self) -> vk::Format {
        self.swapchain.format
    }
}

impl Renderer for VkRenderer {
    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        settings: &RenderSettings,
    ) -> Result<Self> {
        unsafe {
            let r = build_renderer(window, display, settings)?;
            info!(
                "Vulkan swapchain ready ({}x{}, fmt {:?}, {} images)",
                r.swapchain.extent.width,
                r.swapchain.extent.height,
                r.swapchain.format,
                r.swapchain.len()
            );
            Ok(r)
        }
    }

    fn render(&mut self) -> Result<()> {
        unsafe {
            let image_index = self
                .sync
                .acquire(&self.swapchain_loader, self.swapchain.swapchain)?;
            self.sync.submit_and_present(
                &self.ctx,
                &self.swapchain_loader,
                self.swapchain.swapchain,
                image_index,
            )?;
        }
        self.frames += 1;
        Ok(())
    }

    fn frames(&self) -> u64 {
        self.frames
    }
}

/// Capability report for every GPU, without a window or surface. `detailed`
/// adds every extension and layer name.
pub fn device_reports(detailed: bool) -> Result<Vec<String>> {
    unsafe {
        let entry = Entry::linked();
        let instance =
            instance::create_instance(&entry, None, false).context("create_instance")?;
        let _guard = HandleGuard::with_handle(instance.handle(), |_| unsafe {
            instance.destroy_instance(None)
        });
        let records = caps::enumerate_devices(&instance)?;
        Ok(records
            .iter()
            .map(|r| {
                if detailed {
                    r.detailed_report().to_string()
                } else {
                    r.report().to_string()
                }
            })
            .collect())
    }
}
