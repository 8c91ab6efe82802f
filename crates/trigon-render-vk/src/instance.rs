use crate::caps::{self, VALIDATION_LAYER};
use crate::error::{SetupError, VkCall};
use ash::{vk, Entry, Instance};
use raw_window_handle::RawDisplayHandle;
use std::ffi::{c_char, CStr};
use tracing::{debug, info};

/// Layers to enable for the instance and device.
pub fn validation_layers(diagnostics: bool) -> Vec<&'static CStr> {
    if diagnostics {
        vec![VALIDATION_LAYER]
    } else {
        Vec::new()
    }
}

/// Creates the instance with the windowing extensions for `display` (none
/// when `display` is `None`), after checking every required extension and
/// layer is present.
pub unsafe fn create_instance(
    entry: &Entry,
    display: Option<RawDisplayHandle>,
    diagnostics: bool,
) -> Result<Instance, SetupError> {
    let layers = validation_layers(diagnostics);
    if diagnostics {
        caps::check_layers(&caps::available_layers(entry)?, &layers)?;
        info!("validation layers enabled");
    }

    let available = caps::available_instance_extensions(entry)?;
    for ext in &available {
        debug!(
            "instance extension available: {:?}",
            caps::name_from_array(&ext.extension_name)
        );
    }
    let required = caps::required_instance_extensions(display, diagnostics)?;
    caps::check_instance_extensions(&available, &required)?;

    let app_info = vk::ApplicationInfo::default()
        .application_name(c"Hello Triangle")
        .application_version(vk::make_api_version(0, 1, 0, 0))
        .engine_name(c"No Engine")
        .engine_version(vk::make_api_version(0, 1, 0, 0))
        .api_version(vk::API_VERSION_1_0);

    let ext_ptrs: Vec<*const c_char> = required.iter().map(|n| n.as_ptr()).collect();
    let layer_ptrs: Vec<*const c_char> = layers.iter().map(|n| n.as_ptr()).collect();
    let create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_extension_names(&ext_ptrs)
        .enabled_layer_names(&layer_ptrs);

    let instance = entry
        .create_instance(&create_info, None)
        .call("vkCreateInstance")?;
    info!("instance created ({} extensions)", required.len());
    Ok(instance)
}
