use crate::caps::PhysicalDeviceRecord;
use crate::error::SetupError;
use ash::khr::surface;
use ash::vk;
use std::collections::BTreeSet;
use std::ffi::CStr;
use thiserror::Error;
use tracing::{info, warn};

/// Whether a queue family of a device can present to the target surface.
pub trait PresentSupport {
    fn supports_present(&self, device: vk::PhysicalDevice, family: u32) -> bool;
}

pub struct SurfacePresentSupport<'a> {
    pub loader: &'a surface::Instance,
    pub surface: vk::SurfaceKHR,
}

impl PresentSupport for SurfacePresentSupport<'_> {
    fn supports_present(&self, device: vk::PhysicalDevice, family: u32) -> bool {
        let res = unsafe {
            self.loader
                .get_physical_device_surface_support(device, family, self.surface)
        };
        match res {
            Ok(supported) => supported,
            Err(e) => {
                warn!("surface support query for family {family} failed: {e:?}");
                false
            }
        }
    }
}

/// Queue families resolved against one device and one surface. An index is
/// only set when the family passed its check.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    pub fn resolve(record: &PhysicalDeviceRecord, present: &dyn PresentSupport) -> Self {
        let mut out = QueueFamilyIndices::default();
        for (i, family) in record.queue_families.iter().enumerate() {
            let i = i as u32;
            if family.queue_count == 0 {
                continue;
            }
            // Each match overwrites the previous index; the scan stops once
            // both are set.
            if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                out.graphics = Some(i);
            }
            if present.supports_present(record.handle, i) {
                out.present = Some(i);
            }
            if out.is_complete() {
                break;
            }
        }
        out
    }

    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }

    pub fn complete(self) -> Option<QueueFamilies> {
        Some(QueueFamilies {
            graphics: self.graphics?,
            present: self.present?,
        })
    }
}

/// Complete pair of queue family indices for the selected device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    pub fn shared(&self) -> bool {
        self.graphics == self.present
    }

    /// Distinct family indices, ascending.
    pub fn unique(&self) -> BTreeSet<u32> {
        [self.graphics, self.present].into_iter().collect()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Unsuitable {
    #[error("no queue family supports graphics")]
    NoGraphicsQueue,
    #[error("no queue family can present to the surface")]
    NoPresentQueue,
    #[error("missing device extension {0}")]
    MissingExtension(String),
}

pub fn check_device(
    record: &PhysicalDeviceRecord,
    required_extensions: &[&CStr],
    present: &dyn PresentSupport,
) -> Result<QueueFamilies, Unsuitable> {
    let indices = QueueFamilyIndices::resolve(record, present);
    if indices.graphics.is_none() {
        return Err(Unsuitable::NoGraphicsQueue);
    }
    let Some(families) = indices.complete() else {
        return Err(Unsuitable::NoPresentQueue);
    };
    if let Some(missing) = required_extensions
        .iter()
        .find(|&&ext| !record.supports_extension(ext))
    {
        return Err(Unsuitable::MissingExtension(
            missing.to_string_lossy().into_owned(),
        ));
    }
    Ok(families)
}

#[derive(Clone, Copy, Debug)]
pub struct SelectedDevice<'r> {
    pub record: &'r PhysicalDeviceRecord,
    pub families: QueueFamilies,
}

/// First device, in enumeration order, that passes [`check_device`].
pub fn select_device<'r>(
    records: &'r [PhysicalDeviceRecord],
    required_extensions: &[&CStr],
    present: &dyn PresentSupport,
) -> Result<SelectedDevice<'r>, SetupError> {
    if records.is_empty() {
        return Err(SetupError::NoPhysicalDevice);
    }
    for record in records {
        match check_device(record, required_extensions, present) {
            Ok(families) => {
                info!(
                    "selected physical device `{}` (graphics family {}, present family {})",
                    record.name(),
                    families.graphics,
                    families.present
                );
                return Ok(SelectedDevice { record, families });
            }
            Err(why) => warn!("skipping physical device `{}`: {why}", record.name()),
        }
    }
    Err(SetupError::NoSuitableDevice {
        checked: records.len(),
    })
}
