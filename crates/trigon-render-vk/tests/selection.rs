//! Device selection and swapchain negotiation against hand-built device
//! records. No GPU or window is involved.
use ash::vk::{self, Handle};
use std::collections::HashSet;
use std::ffi::{c_char, CStr};

use trigon_render::RenderSize;
use trigon_render_vk::caps::{PhysicalDeviceRecord, REQUIRED_DEVICE_EXTENSIONS};
use trigon_render_vk::device::queue_create_infos;
use trigon_render_vk::select::{select_device, PresentSupport};
use trigon_render_vk::swapchain::{SwapchainPlan, SwapchainSupport};
use trigon_render_vk::SetupError;

struct Presents(HashSet<(u64, u32)>);

impl Presents {
    fn on(pairs: &[(u64, u32)]) -> Self {
        Presents(pairs.iter().copied().collect())
    }
}

impl PresentSupport for Presents {
    fn supports_present(&self, device: vk::PhysicalDevice, family: u32) -> bool {
        self.0.contains(&(device.as_raw(), family))
    }
}

// The crate's own record builders live behind `#[cfg(test)]`, which is not
// compiled for integration tests.
fn write_name(dst: &mut [c_char], name: &CStr) {
    for (d, &b) in dst.iter_mut().zip(name.to_bytes_with_nul()) {
        *d = b as c_char;
    }
}

fn gpu(raw: u64, name: &CStr, families: &[(vk::QueueFlags, u32)], exts: &[&CStr]) -> PhysicalDeviceRecord {
    let mut properties = vk::PhysicalDeviceProperties::default();
    write_name(&mut properties.device_name, name);
    PhysicalDeviceRecord {
        handle: vk::PhysicalDevice::from_raw(raw),
        properties,
        features: Default::default(),
        memory: Default::default(),
        queue_families: families
            .iter()
            .map(|&(queue_flags, queue_count)| vk::QueueFamilyProperties {
                queue_flags,
                queue_count,
                ..Default::default()
            })
            .collect(),
        extensions: exts
            .iter()
            .map(|n| {
                let mut e = vk::ExtensionProperties::default();
                write_name(&mut e.extension_name, n);
                e
            })
            .collect(),
        layers: Vec::new(),
    }
}

fn support(formats: &[vk::SurfaceFormatKHR]) -> SwapchainSupport {
    SwapchainSupport {
        capabilities: vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 8,
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
            ..Default::default()
        },
        formats: formats.to_vec(),
        present_modes: vec![vk::PresentModeKHR::FIFO],
    }
}

#[test]
fn single_family_device_shares_one_queue() {
    let devices = [gpu(
        7,
        c"integrated",
        &[(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER, 1)],
        REQUIRED_DEVICE_EXTENSIONS,
    )];
    let picked = select_device(&devices, REQUIRED_DEVICE_EXTENSIONS, &Presents::on(&[(7, 0)]))
        .expect("device accepted");

    assert_eq!((picked.families.graphics, picked.families.present), (0, 0));
    assert!(picked.families.shared());
    assert_eq!(queue_create_infos(&picked.families).len(), 1);

    let plan = SwapchainPlan::negotiate(
        &support(&[vk::SurfaceFormatKHR {
            format: vk::Format::UNDEFINED,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }]),
        &picked.families,
        RenderSize {
            width: 800,
            height: 600,
        },
    )
    .expect("plan");
    assert_eq!(plan.sharing_mode, vk::SharingMode::EXCLUSIVE);
    assert!(plan.queue_family_indices.is_empty());
    assert_eq!(plan.format.format, vk::Format::B8G8R8A8_UNORM);
    assert_eq!(plan.format.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    assert_eq!((plan.extent.width, plan.extent.height), (800, 600));
    assert_eq!(plan.image_count, 3);
    assert_eq!(plan.present_mode, vk::PresentModeKHR::FIFO);
}

#[test]
fn device_without_swapchain_extension_is_skipped() {
    let devices = [
        gpu(1, c"compute-only", &[(vk::QueueFlags::GRAPHICS, 1)], &[]),
        gpu(
            2,
            c"discrete",
            &[(vk::QueueFlags::GRAPHICS, 16)],
            REQUIRED_DEVICE_EXTENSIONS,
        ),
    ];
    let present = Presents::on(&[(1, 0), (2, 0)]);
    let picked = select_device(&devices, REQUIRED_DEVICE_EXTENSIONS, &present).expect("second device");
    assert_eq!(picked.record.handle.as_raw(), 2);
    assert_eq!(picked.record.name(), "discrete");
}

#[test]
fn first_suitable_device_wins_over_later_ones() {
    let devices = [
        gpu(1, c"first", &[(vk::QueueFlags::GRAPHICS, 1)], REQUIRED_DEVICE_EXTENSIONS),
        gpu(2, c"second", &[(vk::QueueFlags::GRAPHICS, 1)], REQUIRED_DEVICE_EXTENSIONS),
    ];
    let present = Presents::on(&[(1, 0), (2, 0)]);
    let picked = select_device(&devices, REQUIRED_DEVICE_EXTENSIONS, &present).expect("first device");
    assert_eq!(picked.record.handle.as_raw(), 1);
}

#[test]
fn split_queues_use_concurrent_sharing() {
    let devices = [gpu(
        3,
        c"split",
        &[(vk::QueueFlags::GRAPHICS, 1), (vk::QueueFlags::TRANSFER, 1)],
        REQUIRED_DEVICE_EXTENSIONS,
    )];
    let picked = select_device(&devices, REQUIRED_DEVICE_EXTENSIONS, &Presents::on(&[(3, 1)]))
        .expect("device accepted");
    assert_eq!((picked.families.graphics, picked.families.present), (0, 1));
    assert_eq!(queue_create_infos(&picked.families).len(), 2);

    let plan = SwapchainPlan::negotiate(
        &support(&[vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }]),
        &picked.families,
        RenderSize {
            width: 640,
            height: 480,
        },
    )
    .expect("plan");
    assert_eq!(plan.sharing_mode, vk::SharingMode::CONCURRENT);
    assert_eq!(plan.queue_family_indices, vec![0, 1]);
    assert_eq!(plan.format.format, vk::Format::R8G8B8A8_SRGB);
}

#[test]
fn no_present_support_anywhere_fails_selection() {
    let devices = [gpu(
        5,
        c"headless",
        &[(vk::QueueFlags::GRAPHICS, 2)],
        REQUIRED_DEVICE_EXTENSIONS,
    )];
    let err = select_device(&devices, REQUIRED_DEVICE_EXTENSIONS, &Presents::on(&[])).unwrap_err();
    assert!(matches!(err, SetupError::NoSuitableDevice { checked: 1 }));
}

#[test]
fn empty_device_list_is_its_own_error() {
    let err = select_device(&[], REQUIRED_DEVICE_EXTENSIONS, &Presents::on(&[])).unwrap_err();
    assert!(matches!(err, SetupError::NoPhysicalDevice));
}

#[test]
fn empty_queue_families_are_ignored() {
    let devices = [gpu(
        9,
        c"odd",
        &[(vk::QueueFlags::GRAPHICS, 0), (vk::QueueFlags::GRAPHICS, 1)],
        REQUIRED_DEVICE_EXTENSIONS,
    )];
    let present = Presents::on(&[(9, 0), (9, 1)]);
    let picked = select_device(&devices, REQUIRED_DEVICE_EXTENSIONS, &present).expect("device accepted");
    assert_eq!((picked.families.graphics, picked.families.present), (1, 1));
}

#[test]
fn later_family_with_both_roles_avoids_concurrent_sharing() {
    for first in [vk::QueueFlags::GRAPHICS, vk::QueueFlags::TRANSFER] {
        let devices = [gpu(
            4,
            c"late-present",
            &[(first, 1), (vk::QueueFlags::GRAPHICS, 1)],
            REQUIRED_DEVICE_EXTENSIONS,
        )];
        // A transfer-only first family presents; a graphics-only one does not.
        let present = if first == vk::QueueFlags::TRANSFER {
            Presents::on(&[(4, 0), (4, 1)])
        } else {
            Presents::on(&[(4, 1)])
        };
        let picked = select_device(&devices, REQUIRED_DEVICE_EXTENSIONS, &present)
            .expect("device accepted");
        assert_eq!((picked.families.graphics, picked.families.present), (1, 1));
        assert_eq!(queue_create_infos(&picked.families).len(), 1);

        let plan = SwapchainPlan::negotiate(
            &support(&[vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }]),
            &picked.families,
            RenderSize {
                width: 800,
                height: 600,
            },
        )
        .expect("plan");
        assert_eq!(plan.sharing_mode, vk::SharingMode::EXCLUSIVE);
    }
}
