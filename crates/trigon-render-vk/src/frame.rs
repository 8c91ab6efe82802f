//! Static command recording and the acquire → submit → present cycle.
use crate::device::DeviceContext;
use crate::error::{SetupError, VkCall};
use crate::guard::HandleGuard;
use crate::pipeline::RenderPipelineBundle;
use crate::swapchain::SwapchainBundle;
use anyhow::{Context, Result};
use ash::khr::swapchain;
use ash::vk;
use std::cell::Cell;
use tracing::warn;

/// Semaphores plus the pre-recorded command buffers, one per framebuffer.
pub struct FrameSync {
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    pub command_pool: vk::CommandPool,
    pub command_buffers: Vec<vk::CommandBuffer>,
    suboptimal_seen: Cell<bool>,
}

/// What a single draw call looks like; fixed for the lifetime of the
/// command buffers.
#[derive(Clone, Copy, Debug)]
pub struct DrawParams {
    pub clear_color: [f32; 4],
    pub vertex_count: u32,
    pub instance_count: u32,
}

pub fn clear_value(rgba: [f32; 4]) -> vk::ClearValue {
    vk::ClearValue {
        color: vk::ClearColorValue { float32: rgba },
    }
}

pub unsafe fn create_command_pool(
    device: &ash::Device,
    queue_family: u32,
) -> Result<vk::CommandPool, SetupError> {
    let pool_info = vk::CommandPoolCreateInfo {
        s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
        queue_family_index: queue_family,
        ..Default::default()
    };
    device
        .create_command_pool(&pool_info, None)
        .call("vkCreateCommandPool")
}

unsafe fn record(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    framebuffer: vk::Framebuffer,
    extent: vk::Extent2D,
    pipeline: &RenderPipelineBundle,
    draw: &DrawParams,
) -> Result<(), SetupError> {
    let begin = vk::CommandBufferBeginInfo {
        s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
        ..Default::default()
    };
    device
        .begin_command_buffer(cmd, &begin)
        .call("vkBeginCommandBuffer")?;

    let clears = [clear_value(draw.clear_color)];
    let rp_begin = vk::RenderPassBeginInfo {
        s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
        render_pass: pipeline.render_pass,
        framebuffer,
        render_area: vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        },
        clear_value_count: clears.len() as u32,
        p_clear_values: clears.as_ptr(),
        ..Default::default()
    };

    device.cmd_begin_render_pass(cmd, &rp_begin, vk::SubpassContents::INLINE);
    device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline.pipeline);
    device.cmd_draw(cmd, draw.vertex_count, draw.instance_count, 0, 0);
    device.cmd_end_render_pass(cmd);

    device.end_command_buffer(cmd).call("vkEndCommandBuffer")
}

impl FrameSync {
    /// Allocates and records one command buffer per framebuffer, then
    /// creates the two semaphores. Nothing is re-recorded afterwards.
    pub unsafe fn new(
        ctx: &DeviceContext,
        swapchain: &SwapchainBundle,
        pipeline: &RenderPipelineBundle,
        draw: &DrawParams,
    ) -> Result<Self> {
        let device = &ctx.device;
        let command_pool = HandleGuard::with_handle(
            create_command_pool(device, ctx.families.graphics)?,
            |p| unsafe { device.destroy_command_pool(p, None) },
        );

        let alloc_info = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: command_pool.get(),
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: swapchain.framebuffers.len() as u32,
            ..Default::default()
        };
        // Buffers go with the pool if anything below fails.
        let command_buffers = device
            .allocate_command_buffers(&alloc_info)
            .call("vkAllocateCommandBuffers")?;
        for (i, (&cmd, &fb)) in command_buffers
            .iter()
            .zip(&swapchain.framebuffers)
            .enumerate()
        {
            record(device, cmd, fb, swapchain.extent, pipeline, draw)
                .with_context(|| format!("record command buffer {i}"))?;
        }

        let sem_ci = vk::SemaphoreCreateInfo::default();
        let destroy_semaphore = |s| unsafe { device.destroy_semaphore(s, None) };
        let image_available = HandleGuard::with_handle(
            device
                .create_semaphore(&sem_ci, None)
                .call("vkCreateSemaphore")?,
            destroy_semaphore,
        );
        let render_finished = device
            .create_semaphore(&sem_ci, None)
            .call("vkCreateSemaphore")?;

        Ok(FrameSync {
            image_available: image_available.release(),
            render_finished,
            command_pool: command_pool.release(),
            command_buffers,
            suboptimal_seen: Cell::new(false),
        })
    }

    fn note_suboptimal(&self) {
        if !self.suboptimal_seen.replace(true) {
            warn!("swapchain is suboptimal for the surface; continuing without recreation");
        }
    }

    /// Blocks until the next swapchain image is ready; signals
    /// `image_available` when it is.
    pub unsafe fn acquire(
        &self,
        loader: &swapchain::Device,
        swapchain: vk::SwapchainKHR,
    ) -> Result<u32> {
        let (index, suboptimal) = loader
            .acquire_next_image(
                swapchain,
                u64::MAX,
                self.image_available,
                vk::Fence::null(),
            )
            .context("acquire_next_image")?;
        if suboptimal {
            self.note_suboptimal();
        }
        Ok(index)
    }

    /// Submits the buffer recorded for `image_index` and presents the image
    /// once rendering has finished. Waits for the present queue to drain so
    /// the semaphores are free for the next frame.
    pub unsafe fn submit_and_present(
        &self,
        ctx: &DeviceContext,
        loader: &swapchain::Device,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
    ) -> Result<()> {
        let cmd = self.command_buffers[image_index as usize];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];

        let submit = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            wait_semaphore_count: 1,
            p_wait_semaphores: &self.image_available,
            p_wait_dst_stage_mask: wait_stages.as_ptr(),
            command_buffer_count: 1,
            p_command_buffers: &cmd,
            signal_semaphore_count: 1,
            p_signal_semaphores: &self.render_finished,
            ..Default::default()
        };
        ctx.device
            .queue_submit(
                ctx.graphics_queue,
                std::slice::from_ref(&submit),
                vk::Fence::null(),
            )
            .context("queue_submit")?;

        let present = vk::PresentInfoKHR {
            s_type: vk::StructureType::PRESENT_INFO_KHR,
            wait_semaphore_count: 1,
            p_wait_semaphores: &self.render_finished,
            swapchain_count: 1,
            p_swapchains: &swapchain,
            p_image_indices: &image_index,
            ..Default::default()
        };
        let suboptimal = loader
            .queue_present(ctx.present_queue, &present)
            .context("queue_present")?;
        if suboptimal {
            self.note_suboptimal();
        }

        ctx.device
            .queue_wait_idle(ctx.present_queue)
            .context("queue_wait_idle")?;
        Ok(())
    }

    /// Semaphores first, then the command buffers and their pool.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_semaphore(self.render_finished, None);
        device.destroy_semaphore(self.image_available, None);
        if !self.command_buffers.is_empty() {
            device.free_command_buffers(self.command_pool, &self.command_buffers);
        }
    }

    pub unsafe fn destroy_pool(&self, device: &ash::Device) {
        device.destroy_command_pool(self.command_pool, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_value_carries_rgba() {
        let v = clear_value([0.0, 0.0, 0.0, 1.0]);
        // SAFETY: written through the `color` variant just above.
        assert_eq!(unsafe { v.color.float32 }, [0.0, 0.0, 0.0, 1.0]);
    }
}
