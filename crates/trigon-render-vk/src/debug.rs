use crate::error::{SetupError, VkCall};
use ash::ext::debug_utils;
use ash::{vk, Entry, Instance};
use std::borrow::Cow;
use std::ffi::{c_void, CStr};
use tracing::{debug, error, info, trace, warn};

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user: *mut c_void,
) -> vk::Bool32 {
    let message = if data.is_null() || unsafe { (*data).p_message.is_null() } {
        Cow::Borrowed("<no message>")
    } else {
        // SAFETY: the loader passes a valid callback struct for this call.
        unsafe { CStr::from_ptr((*data).p_message) }.to_string_lossy()
    };
    let kind = if types.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "validation"
    } else if types.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "performance"
    } else {
        "general"
    };
    match severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => error!("[vulkan {kind}] {message}"),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => warn!("[vulkan {kind}] {message}"),
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => info!("[vulkan {kind}] {message}"),
        vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE => trace!("[vulkan {kind}] {message}"),
        _ => debug!("[vulkan {kind}] {message}"),
    }
    vk::FALSE
}

/// Forwards validation-layer output into `tracing`. Only created when
/// diagnostics are enabled.
pub struct DebugMessenger {
    loader: debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

impl DebugMessenger {
    pub unsafe fn new(entry: &Entry, instance: &Instance) -> Result<Self, SetupError> {
        let loader = debug_utils::Instance::new(entry, instance);
        let ci = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));
        let messenger = loader
            .create_debug_utils_messenger(&ci, None)
            .call("vkCreateDebugUtilsMessengerEXT")?;
        Ok(DebugMessenger { loader, messenger })
    }

    pub fn handle(&self) -> vk::DebugUtilsMessengerEXT {
        self.messenger
    }

    /// Must run before the instance is destroyed.
    pub unsafe fn destroy(&self) {
        self.loader
            .destroy_debug_utils_messenger(self.messenger, None);
    }
}
