use crate::error::{SetupError, VkCall};
use crate::guard::HandleGuard;
use crate::shader;
use crate::swapchain::SwapchainBundle;
use anyhow::{anyhow, Context, Result};
use ash::vk;
use trigon_render::{RenderSettings, Topology};
use tracing::info;

/// Long-lived half of the pipeline. The layout and shader modules used to
/// build it are gone by the time this exists.
pub struct RenderPipelineBundle {
    pub render_pass: vk::RenderPass,
    pub pipeline: vk::Pipeline,
}

pub fn primitive_topology(t: Topology) -> vk::PrimitiveTopology {
    match t {
        Topology::PointList => vk::PrimitiveTopology::POINT_LIST,
        Topology::LineList => vk::PrimitiveTopology::LINE_LIST,
        Topology::LineStrip => vk::PrimitiveTopology::LINE_STRIP,
        Topology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        Topology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
        Topology::TriangleFan => vk::PrimitiveTopology::TRIANGLE_FAN,
    }
}

/// Viewport and scissor covering the whole swapchain image.
pub fn full_viewport(extent: vk::Extent2D) -> (vk::Viewport, vk::Rect2D) {
    (
        vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        },
        vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        },
    )
}

/// Single colour attachment, cleared on load and handed to the presentation
/// engine at the end of the one subpass.
pub unsafe fn create_render_pass(
    device: &ash::Device,
    format: vk::Format,
) -> Result<vk::RenderPass, SetupError> {
    let color_att = vk::AttachmentDescription {
        format,
        samples: vk::SampleCountFlags::TYPE_1,
        load_op: vk::AttachmentLoadOp::CLEAR,
        store_op: vk::AttachmentStoreOp::STORE,
        stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
        stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
        initial_layout: vk::ImageLayout::UNDEFINED,
        final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
        ..Default::default()
    };
    let att_ref = vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    };

    let subpass = vk::SubpassDescription {
        pipeline_bind_point: vk::PipelineBindPoint::GRAPHICS,
        color_attachment_count: 1,
        p_color_attachments: &att_ref,
        ..Default::default()
    };

    let rp_info = vk::RenderPassCreateInfo {
        s_type: vk::StructureType::RENDER_PASS_CREATE_INFO,
        attachment_count: 1,
        p_attachments: &color_att,
        subpass_count: 1,
        p_subpasses: &subpass,
        ..Default::default()
    };
    device
        .create_render_pass(&rp_info, None)
        .call("vkCreateRenderPass")
}

pub unsafe fn create_framebuffers(
    device: &ash::Device,
    render_pass: vk::RenderPass,
    views: &[vk::ImageView],
    extent: vk::Extent2D,
) -> Result<Vec<vk::Framebuffer>, SetupError> {
    let mut framebuffers = Vec::with_capacity(views.len());
    for view in views {
        let fb_info = vk::FramebufferCreateInfo {
            s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
            render_pass,
            attachment_count: 1,
            p_attachments: view,
            width: extent.width,
            height: extent.height,
            layers: 1,
            ..Default::default()
        };
        match device.create_framebuffer(&fb_info, None) {
            Ok(fb) => framebuffers.push(fb),
            Err(result) => {
                for fb in framebuffers {
                    device.destroy_framebuffer(fb, None);
                }
                return Err(SetupError::Vk {
                    call: "vkCreateFramebuffer",
                    result,
                });
            }
        }
    }
    Ok(framebuffers)
}

/// Builds the fixed graphics pipeline. Shader modules and the pipeline
/// layout are destroyed before returning, on success and on failure.
pub unsafe fn create_pipeline(
    device: &ash::Device,
    render_pass: vk::RenderPass,
    extent: vk::Extent2D,
    settings: &RenderSettings,
) -> Result<vk::Pipeline> {
    let (vs_path, fs_path) = shader::shader_paths(settings);
    let vs_code = shader::load_spirv(&vs_path)?;
    let fs_code = shader::load_spirv(&fs_path)?;

    let destroy_module = |m| unsafe { device.destroy_shader_module(m, None) };
    let vs = HandleGuard::with_handle(shader::create_module(device, &vs_code)?, destroy_module);
    let fs = HandleGuard::with_handle(shader::create_module(device, &fs_code)?, destroy_module);
    let entry = c"main";

    let stages = [
        vk::PipelineShaderStageCreateInfo {
            s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
            stage: vk::ShaderStageFlags::VERTEX,
            module: vs.get(),
            p_name: entry.as_ptr(),
            ..Default::default()
        },
        vk::PipelineShaderStageCreateInfo {
            s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
            stage: vk::ShaderStageFlags::FRAGMENT,
            module: fs.get(),
            p_name: entry.as_ptr(),
            ..Default::default()
        },
    ];

    // No bindings: positions come from gl_VertexIndex.
    let vertex_input = vk::PipelineVertexInputStateCreateInfo::default();
    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_INPUT_ASSEMBLY_STATE_CREATE_INFO,
        topology: primitive_topology(settings.topology),
        primitive_restart_enable: vk::FALSE,
        ..Default::default()
    };

    let (viewport, scissor) = full_viewport(extent);
    let viewport_state = vk::PipelineViewportStateCreateInfo::default()
        .viewports(std::slice::from_ref(&viewport))
        .scissors(std::slice::from_ref(&scissor));

    let raster = vk::PipelineRasterizationStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_RASTERIZATION_STATE_CREATE_INFO,
        depth_clamp_enable: vk::FALSE,
        rasterizer_discard_enable: vk::FALSE,
        polygon_mode: vk::PolygonMode::FILL,
        cull_mode: vk::CullModeFlags::BACK,
        front_face: vk::FrontFace::CLOCKWISE,
        depth_bias_enable: vk::FALSE,
        line_width: 1.0,
        ..Default::default()
    };
    let multisample = vk::PipelineMultisampleStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_MULTISAMPLE_STATE_CREATE_INFO,
        rasterization_samples: vk::SampleCountFlags::TYPE_1,
        sample_shading_enable: vk::FALSE,
        ..Default::default()
    };
    let color_blend_att = vk::PipelineColorBlendAttachmentState {
        color_write_mask: vk::ColorComponentFlags::R
            | vk::ColorComponentFlags::G
            | vk::ColorComponentFlags::B
            | vk::ColorComponentFlags::A,
        blend_enable: vk::FALSE,
        ..Default::default()
    };
    let color_blend = vk::PipelineColorBlendStateCreateInfo::default()
        .logic_op_enable(false)
        .attachments(std::slice::from_ref(&color_blend_att));

    let layout = HandleGuard::with_handle(
        device
            .create_pipeline_layout(&vk::PipelineLayoutCreateInfo::default(), None)
            .call("vkCreatePipelineLayout")?,
        |l| unsafe { device.destroy_pipeline_layout(l, None) },
    );

    let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
        .stages(&stages)
        .vertex_input_state(&vertex_input)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&raster)
        .multisample_state(&multisample)
        .color_blend_state(&color_blend)
        .layout(layout.get())
        .render_pass(render_pass)
        .subpass(0);

    let pipelines = device
        .create_graphics_pipelines(
            vk::PipelineCache::null(),
            std::slice::from_ref(&pipeline_info),
            None,
        )
        .map_err(|(_, err)| anyhow!("create_graphics_pipelines failed: {:?}", err))?;

    // layout, fs, vs drop here
    Ok(pipelines[0])
}

/// Render pass, pipeline and one framebuffer per swapchain image.
pub unsafe fn build(
    device: &ash::Device,
    swapchain: &mut SwapchainBundle,
    settings: &RenderSettings,
) -> Result<RenderPipelineBundle> {
    let render_pass = HandleGuard::with_handle(
        create_render_pass(device, swapchain.format)?,
        |rp| unsafe { device.destroy_render_pass(rp, None) },
    );
    let pipeline = HandleGuard::with_handle(
        create_pipeline(device, render_pass.get(), swapchain.extent, settings)
            .context("create_pipeline")?,
        |p| unsafe { device.destroy_pipeline(p, None) },
    );

    swapchain.framebuffers = create_framebuffers(
        device,
        render_pass.get(),
        &swapchain.image_views,
        swapchain.extent,
    )?;
    debug_assert_eq!(swapchain.framebuffers.len(), swapchain.image_views.len());

    info!(
        "pipeline ready: {:?}, {} framebuffers",
        primitive_topology(settings.topology),
        swapchain.framebuffers.len()
    );

    Ok(RenderPipelineBundle {
        pipeline: pipeline.release(),
        render_pass: render_pass.release(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_topology_is_a_line_strip() {
        assert_eq!(
            primitive_topology(RenderSettings::default().topology),
            vk::PrimitiveTopology::LINE_STRIP
        );
        assert_eq!(
            primitive_topology(Topology::TriangleList),
            vk::PrimitiveTopology::TRIANGLE_LIST
        );
    }

    #[test]
    fn viewport_and_scissor_cover_the_extent() {
        let extent = vk::Extent2D {
            width: 800,
            height: 600,
        };
        let (vp, sc) = full_viewport(extent);
        assert_eq!((vp.x, vp.y, vp.width, vp.height), (0.0, 0.0, 800.0, 600.0));
        assert_eq!((vp.min_depth, vp.max_depth), (0.0, 1.0));
        assert_eq!(sc.extent, extent);
        assert_eq!((sc.offset.x, sc.offset.y), (0, 0));
    }
}
