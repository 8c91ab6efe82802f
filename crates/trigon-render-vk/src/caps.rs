//! Read-only capability probing: instance extensions, layers and one
//! [`PhysicalDeviceRecord`] per GPU. Nothing here mutates GPU state.
use crate::error::{SetupError, VkCall};
use ash::{vk, Entry, Instance};
use raw_window_handle::RawDisplayHandle;
use std::ffi::{c_char, CStr};
use std::fmt;
use tracing::debug;

pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Extensions every selected device must expose.
pub const REQUIRED_DEVICE_EXTENSIONS: &[&CStr] = &[ash::khr::swapchain::NAME];

/// Reads a fixed-size, NUL-terminated name field out of a Vulkan struct.
pub fn name_from_array(raw: &[c_char]) -> &CStr {
    // SAFETY: c_char and u8 have the same size and alignment.
    let bytes = unsafe { std::slice::from_raw_parts(raw.as_ptr().cast::<u8>(), raw.len()) };
    CStr::from_bytes_until_nul(bytes).unwrap_or(c"")
}

/// Everything queried about one GPU. Immutable once built.
#[derive(Clone, Debug)]
pub struct PhysicalDeviceRecord {
    pub handle: vk::PhysicalDevice,
    pub properties: vk::PhysicalDeviceProperties,
    pub features: vk::PhysicalDeviceFeatures,
    pub memory: vk::PhysicalDeviceMemoryProperties,
    pub queue_families: Vec<vk::QueueFamilyProperties>,
    pub extensions: Vec<vk::ExtensionProperties>,
    pub layers: Vec<vk::LayerProperties>,
}

impl PhysicalDeviceRecord {
    pub fn name(&self) -> String {
        name_from_array(&self.properties.device_name)
            .to_string_lossy()
            .into_owned()
    }

    pub fn extension_names(&self) -> impl Iterator<Item = &CStr> {
        self.extensions
            .iter()
            .map(|e| name_from_array(&e.extension_name))
    }

    pub fn supports_extension(&self, name: &CStr) -> bool {
        self.extension_names().any(|n| n == name)
    }

    pub fn report(&self) -> DeviceReport<'_> {
        DeviceReport {
            record: self,
            names: false,
        }
    }

    /// Like [`report`](Self::report), plus every extension and layer name.
    pub fn detailed_report(&self) -> DeviceReport<'_> {
        DeviceReport {
            record: self,
            names: true,
        }
    }
}

pub fn device_type_name(ty: vk::PhysicalDeviceType) -> &'static str {
    match ty {
        vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
        vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
        vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
        vk::PhysicalDeviceType::CPU => "CPU",
        _ => "(Other)",
    }
}

fn queue_caps(flags: vk::QueueFlags) -> String {
    let names = [
        (vk::QueueFlags::GRAPHICS, "graphics"),
        (vk::QueueFlags::COMPUTE, "compute"),
        (vk::QueueFlags::TRANSFER, "transfer"),
        (vk::QueueFlags::SPARSE_BINDING, "sparse"),
    ];
    let caps: Vec<&str> = names
        .iter()
        .filter(|(bit, _)| flags.contains(*bit))
        .map(|(_, n)| *n)
        .collect();
    if caps.is_empty() {
        "none".to_owned()
    } else {
        caps.join("+")
    }
}

/// Human-readable summary of a device, used by `--list-devices` and the
/// debug log.
pub struct DeviceReport<'a> {
    record: &'a PhysicalDeviceRecord,
    names: bool,
}

impl fmt::Display for DeviceReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.record;
        let p = &r.properties;
        writeln!(f, "{:<12}{}", "name:", r.name())?;
        writeln!(f, "{:<12}{}", "type:", device_type_name(p.device_type))?;
        writeln!(
            f,
            "{:<12}{}.{}.{}",
            "api:",
            vk::api_version_major(p.api_version),
            vk::api_version_minor(p.api_version),
            vk::api_version_patch(p.api_version)
        )?;
        writeln!(
            f,
            "{:<12}{} heaps, {} types",
            "memory:", r.memory.memory_heap_count, r.memory.memory_type_count
        )?;
        for (i, q) in r.queue_families.iter().enumerate() {
            writeln!(
                f,
                "{:<12}#{i} x{} {}",
                "queues:",
                q.queue_count,
                queue_caps(q.queue_flags)
            )?;
        }
        write!(
            f,
            "{:<12}{} extensions, {} layers",
            "supports:",
            r.extensions.len(),
            r.layers.len()
        )?;
        if self.names {
            for name in r.extension_names() {
                write!(f, "\n{:<12}{}", "extension:", name.to_string_lossy())?;
            }
            for l in &r.layers {
                write!(
                    f,
                    "\n{:<12}{} ({})",
                    "layer:",
                    name_from_array(&l.layer_name).to_string_lossy(),
                    name_from_array(&l.description).to_string_lossy()
                )?;
            }
        }
        Ok(())
    }
}

pub unsafe fn available_instance_extensions(
    entry: &Entry,
) -> Result<Vec<vk::ExtensionProperties>, SetupError> {
    entry
        .enumerate_instance_extension_properties(None)
        .call("vkEnumerateInstanceExtensionProperties")
}

pub unsafe fn available_layers(entry: &Entry) -> Result<Vec<vk::LayerProperties>, SetupError> {
    entry
        .enumerate_instance_layer_properties()
        .call("vkEnumerateInstanceLayerProperties")
}

/// Windowing extensions for `display`, plus debug utils when diagnostics are
/// on.
pub fn required_instance_extensions(
    display: Option<RawDisplayHandle>,
    diagnostics: bool,
) -> Result<Vec<&'static CStr>, SetupError> {
    let mut out = Vec::new();
    if let Some(display) = display {
        let wsi = ash_window::enumerate_required_extensions(display)
            .call("enumerate_required_extensions")?;
        // SAFETY: ash-window hands out pointers to 'static NUL-terminated names.
        out.extend(wsi.iter().map(|&p| unsafe { CStr::from_ptr(p) }));
    }
    if diagnostics {
        out.push(ash::ext::debug_utils::NAME);
    }
    Ok(out)
}

pub fn check_instance_extensions(
    available: &[vk::ExtensionProperties],
    required: &[&CStr],
) -> Result<(), SetupError> {
    for &want in required {
        if !available
            .iter()
            .any(|e| name_from_array(&e.extension_name) == want)
        {
            return Err(SetupError::MissingExtension(
                want.to_string_lossy().into_owned(),
            ));
        }
    }
    Ok(())
}

pub fn check_layers(
    available: &[vk::LayerProperties],
    required: &[&CStr],
) -> Result<(), SetupError> {
    for &want in required {
        if !available
            .iter()
            .any(|l| name_from_array(&l.layer_name) == want)
        {
            return Err(SetupError::MissingLayer(want.to_string_lossy().into_owned()));
        }
    }
    Ok(())
}

unsafe fn query_device(
    instance: &Instance,
    handle: vk::PhysicalDevice,
) -> Result<PhysicalDeviceRecord, SetupError> {
    let record = PhysicalDeviceRecord {
        handle,
        properties: instance.get_physical_device_properties(handle),
        features: instance.get_physical_device_features(handle),
        memory: instance.get_physical_device_memory_properties(handle),
        queue_families: instance.get_physical_device_queue_family_properties(handle),
        extensions: instance
            .enumerate_device_extension_properties(handle)
            .call("vkEnumerateDeviceExtensionProperties")?,
        layers: instance
            .enumerate_device_layer_properties(handle)
            .call("vkEnumerateDeviceLayerProperties")?,
    };
    debug!("found device:\n{}", record.detailed_report());
    Ok(record)
}

/// One record per physical device, in enumeration order.
pub unsafe fn enumerate_devices(
    instance: &Instance,
) -> Result<Vec<PhysicalDeviceRecord>, SetupError> {
    let handles = instance
        .enumerate_physical_devices()
        .call("vkEnumeratePhysicalDevices")?;
    handles
        .into_iter()
        .map(|h| query_device(instance, h))
        .collect()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use ash::vk::Handle;

    pub fn fill_name(dst: &mut [c_char], name: &CStr) {
        for (d, &b) in dst.iter_mut().zip(name.to_bytes_with_nul()) {
            *d = b as c_char;
        }
    }

    pub fn extension(name: &CStr) -> vk::ExtensionProperties {
        let mut e = vk::ExtensionProperties::default();
        fill_name(&mut e.extension_name, name);
        e
    }

    pub fn layer(name: &CStr) -> vk::LayerProperties {
        let mut l = vk::LayerProperties::default();
        fill_name(&mut l.layer_name, name);
        l
    }

    pub fn family(flags: vk::QueueFlags, count: u32) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: count,
            ..Default::default()
        }
    }

    pub fn device(
        raw: u64,
        name: &CStr,
        families: Vec<vk::QueueFamilyProperties>,
        extensions: &[&CStr],
    ) -> PhysicalDeviceRecord {
        let mut properties = vk::PhysicalDeviceProperties::default();
        fill_name(&mut properties.device_name, name);
        PhysicalDeviceRecord {
            handle: vk::PhysicalDevice::from_raw(raw),
            properties,
            features: Default::default(),
            memory: Default::default(),
            queue_families: families,
            extensions: extensions.iter().map(|n| extension(n)).collect(),
            layers: Vec::new(),
        }
    }
}
