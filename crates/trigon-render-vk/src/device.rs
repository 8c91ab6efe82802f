use crate::error::{SetupError, VkCall};
use crate::select::{QueueFamilies, SelectedDevice};
use ash::{vk, Instance};
use std::ffi::{c_char, CStr};
use tracing::info;

static QUEUE_PRIORITY: [f32; 1] = [1.0];

/// The logical device and the two queues every later stage submits to.
pub struct DeviceContext {
    pub device: ash::Device,
    pub families: QueueFamilies,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
}

/// One single-queue request per distinct family.
pub fn queue_create_infos(families: &QueueFamilies) -> Vec<vk::DeviceQueueCreateInfo<'static>> {
    families
        .unique()
        .into_iter()
        .map(|index| {
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(index)
                .queue_priorities(&QUEUE_PRIORITY)
        })
        .collect()
}

fn as_ptrs(names: &[&CStr]) -> Vec<*const c_char> {
    names.iter().map(|n| n.as_ptr()).collect()
}

pub unsafe fn create_logical_device(
    instance: &Instance,
    selected: &SelectedDevice<'_>,
    extensions: &[&CStr],
    layers: &[&CStr],
) -> Result<DeviceContext, SetupError> {
    let families = selected.families;
    let queue_infos = queue_create_infos(&families);
    let ext_ptrs = as_ptrs(extensions);
    let layer_ptrs = as_ptrs(layers);
    let features = vk::PhysicalDeviceFeatures::default();

    // Device layers are deprecated but still honoured by older loaders.
    #[allow(deprecated)]
    let info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_infos)
        .enabled_extension_names(&ext_ptrs)
        .enabled_layer_names(&layer_ptrs)
        .enabled_features(&features);

    let device = instance
        .create_device(selected.record.handle, &info, None)
        .call("vkCreateDevice")?;
    let graphics_queue = device.get_device_queue(families.graphics, 0);
    let present_queue = device.get_device_queue(families.present, 0);
    info!(
        "logical device created ({} queue famil{})",
        queue_infos.len(),
        if queue_infos.len() == 1 { "y" } else { "ies" }
    );

    Ok(DeviceContext {
        device,
        families,
        graphics_queue,
        present_queue,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_family_gets_one_request() {
        let infos = queue_create_infos(&QueueFamilies {
            graphics: 2,
            present: 2,
        });
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].queue_family_index, 2);
        assert_eq!(infos[0].queue_count, 1);
    }

    #[test]
    fn split_families_get_one_request_each() {
        let infos = queue_create_infos(&QueueFamilies {
            graphics: 0,
            present: 3,
        });
        let indices: Vec<u32> = infos.iter().map(|i| i.queue_family_index).collect();
        assert_eq!(indices, vec![0, 3]);
        for info in &infos {
            assert_eq!(info.queue_count, 1);
            // SAFETY: points at QUEUE_PRIORITY, which is 'static.
            assert_eq!(unsafe { *info.p_queue_priorities }, 1.0);
        }
    }
}
