use crate::error::{SetupError, VkCall};
use crate::guard::HandleGuard;
use crate::select::QueueFamilies;
use ash::khr::{surface, swapchain};
use ash::vk;
use trigon_render::RenderSize;
use std::fmt;
use tracing::{debug, info};

/// Surface limits and options for one (device, surface) pair. Queried fresh,
/// never cached across devices.
#[derive(Clone, Debug, Default)]
pub struct SwapchainSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    pub unsafe fn query(
        loader: &surface::Instance,
        phys: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Self, SetupError> {
        let support = SwapchainSupport {
            capabilities: loader
                .get_physical_device_surface_capabilities(phys, surface)
                .call("vkGetPhysicalDeviceSurfaceCapabilitiesKHR")?,
            formats: loader
                .get_physical_device_surface_formats(phys, surface)
                .call("vkGetPhysicalDeviceSurfaceFormatsKHR")?,
            present_modes: loader
                .get_physical_device_surface_present_modes(phys, surface)
                .call("vkGetPhysicalDeviceSurfacePresentModesKHR")?,
        };
        debug!("swapchain support:\n{}", support.report());
        Ok(support)
    }

    pub fn report(&self) -> SupportReport<'_> {
        SupportReport(self)
    }
}

pub fn present_mode_name(m: vk::PresentModeKHR) -> &'static str {
    match m {
        vk::PresentModeKHR::FIFO => "FIFO",
        vk::PresentModeKHR::MAILBOX => "MAILBOX",
        vk::PresentModeKHR::IMMEDIATE => "IMMEDIATE",
        vk::PresentModeKHR::FIFO_RELAXED => "FIFO_RELAXED",
        _ => "OTHER",
    }
}

/// Capabilities, every (format, colour space) pair and every present mode.
pub struct SupportReport<'a>(&'a SwapchainSupport);

impl fmt::Display for SupportReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.0.capabilities;
        let ext = |e: vk::Extent2D| format!("{}x{}", e.width, e.height);
        writeln!(f, "{:<16}{}..{}", "image count:", c.min_image_count, c.max_image_count)?;
        writeln!(f, "{:<16}{}", "current extent:", ext(c.current_extent))?;
        writeln!(
            f,
            "{:<16}{} .. {}",
            "extent range:",
            ext(c.min_image_extent),
            ext(c.max_image_extent)
        )?;
        writeln!(f, "{:<16}{}", "array layers:", c.max_image_array_layers)?;
        writeln!(
            f,
            "{:<16}{:?} (current {:?})",
            "transforms:", c.supported_transforms, c.current_transform
        )?;
        writeln!(f, "{:<16}{:?}", "alpha:", c.supported_composite_alpha)?;
        write!(f, "{:<16}{:?}", "usage:", c.supported_usage_flags)?;
        for (i, sf) in self.0.formats.iter().enumerate() {
            write!(f, "\n{:<16}#{i} {:?} / {:?}", "format:", sf.format, sf.color_space)?;
        }
        for (i, &m) in self.0.present_modes.iter().enumerate() {
            write!(f, "\n{:<16}#{i} {}", "present mode:", present_mode_name(m))?;
        }
        Ok(())
    }
}

const PREFERRED_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// BGRA8 / sRGB-nonlinear when offered (or when the surface has no
/// preference), otherwise whatever the surface lists first.
pub fn choose_surface_format(
    formats: &[vk::SurfaceFormatKHR],
) -> Result<vk::SurfaceFormatKHR, SetupError> {
    match formats {
        [] => Err(SetupError::NoSurfaceFormats),
        [only] if only.format == vk::Format::UNDEFINED => Ok(PREFERRED_FORMAT),
        _ => Ok(formats
            .iter()
            .copied()
            .find(|f| {
                f.format == PREFERRED_FORMAT.format && f.color_space == PREFERRED_FORMAT.color_space
            })
            .unwrap_or(formats[0])),
    }
}

/// MAILBOX wins outright; IMMEDIATE only if MAILBOX is absent; FIFO is
/// always available.
pub fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    let mut best = vk::PresentModeKHR::FIFO;
    for &mode in modes {
        if mode == vk::PresentModeKHR::MAILBOX {
            return mode;
        }
        if mode == vk::PresentModeKHR::IMMEDIATE {
            best = mode;
        }
    }
    best
}

/// `current_extent` unless the surface leaves the choice to us
/// (width == u32::MAX), in which case `want` is clamped into the limits.
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, want: RenderSize) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }
    let (lo, hi) = (caps.min_image_extent, caps.max_image_extent);
    vk::Extent2D {
        width: want.width.min(hi.width).max(lo.width),
        height: want.height.min(hi.height).max(lo.height),
    }
}

/// One more than the minimum, capped when the surface advertises a maximum.
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = caps.min_image_count + 1;
    if caps.max_image_count > 0 {
        count.min(caps.max_image_count)
    } else {
        count
    }
}

pub fn sharing_mode(families: &QueueFamilies) -> (vk::SharingMode, Vec<u32>) {
    if families.shared() {
        (vk::SharingMode::EXCLUSIVE, Vec::new())
    } else {
        (
            vk::SharingMode::CONCURRENT,
            vec![families.graphics, families.present],
        )
    }
}

/// Every negotiated swapchain parameter, decided before anything is created.
#[derive(Clone, Debug)]
pub struct SwapchainPlan {
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub sharing_mode: vk::SharingMode,
    pub queue_family_indices: Vec<u32>,
}

impl SwapchainPlan {
    pub fn negotiate(
        support: &SwapchainSupport,
        families: &QueueFamilies,
        want: RenderSize,
    ) -> Result<Self, SetupError> {
        let (sharing_mode, queue_family_indices) = sharing_mode(families);
        Ok(SwapchainPlan {
            format: choose_surface_format(&support.formats)?,
            present_mode: choose_present_mode(&support.present_modes),
            extent: choose_extent(&support.capabilities, want),
            image_count: choose_image_count(&support.capabilities),
            pre_transform: support.capabilities.current_transform,
            sharing_mode,
            queue_family_indices,
        })
    }
}

/// Swapchain plus its per-image objects. `images`, `image_views` and
/// `framebuffers` are indexed by swapchain image index and always have the
/// same length once the pipeline builder has run.
pub struct SwapchainBundle {
    pub swapchain: vk::SwapchainKHR,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub framebuffers: Vec<vk::Framebuffer>,
}

impl SwapchainBundle {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

unsafe fn create_image_views(
    device: &ash::Device,
    images: &[vk::Image],
    format: vk::Format,
) -> Result<Vec<vk::ImageView>, SetupError> {
    let mut views = Vec::with_capacity(images.len());
    for &image in images {
        let info = vk::ImageViewCreateInfo {
            s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
            image,
            view_type: vk::ImageViewType::TYPE_2D,
            format,
            components: vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            },
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            },
            ..Default::default()
        };
        match device.create_image_view(&info, None) {
            Ok(view) => views.push(view),
            Err(result) => {
                for v in views {
                    device.destroy_image_view(v, None);
                }
                return Err(SetupError::Vk {
                    call: "vkCreateImageView",
                    result,
                });
            }
        }
    }
    Ok(views)
}

/// Creates the swapchain described by `plan`, fetches its images and builds
/// one view per image. Framebuffers are left empty.
pub unsafe fn create_swapchain(
    device: &ash::Device,
    loader: &swapchain::Device,
    surface: vk::SurfaceKHR,
    plan: &SwapchainPlan,
) -> Result<SwapchainBundle, SetupError> {
    let info = vk::SwapchainCreateInfoKHR::default()
        .surface(surface)
        .min_image_count(plan.image_count)
        .image_format(plan.format.format)
        .image_color_space(plan.format.color_space)
        .image_extent(plan.extent)
        .image_array_layers(1)
        .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
        .image_sharing_mode(plan.sharing_mode)
        .queue_family_indices(&plan.queue_family_indices)
        .pre_transform(plan.pre_transform)
        .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
        .present_mode(plan.present_mode)
        .clipped(true)
        .old_swapchain(vk::SwapchainKHR::null());

    let swapchain = HandleGuard::with_handle(
        loader
            .create_swapchain(&info, None)
            .call("vkCreateSwapchainKHR")?,
        |s| unsafe { loader.destroy_swapchain(s, None) },
    );
    let images = loader
        .get_swapchain_images(swapchain.get())
        .call("vkGetSwapchainImagesKHR")?;
    let image_views = create_image_views(device, &images, plan.format.format)?;

    info!(
        "swapchain created: {} images, {}x{}, {:?}, {:?}",
        images.len(),
        plan.extent.width,
        plan.extent.height,
        plan.format.format,
        plan.present_mode
    );

    Ok(SwapchainBundle {
        swapchain: swapchain.release(),
        format: plan.format.format,
        extent: plan.extent,
        images,
        image_views,
        framebuffers: Vec::new(),
    })
}
