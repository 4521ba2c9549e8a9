/// Graphics and compute pipeline creation
///
/// Pipelines target dynamic rendering: the attachment formats of the
/// description are chained in as `VkPipelineRenderingCreateInfo`, and
/// viewport and scissor are always dynamic state.

use ash::vk;
use ash::vk::Handle;
use mgp_engine::mgp::Result;
use mgp_engine::mgp::render::{ComputePipelineInfo, GraphicsPipelineInfo, ShaderStageModule};
use mgp_engine::engine_err;
use std::ffi::CString;

use crate::vulkan_format::*;

/// Entry point names kept alive for the duration of a create call
fn entry_names(stages: &[&ShaderStageModule]) -> Result<Vec<CString>> {
    stages
        .iter()
        .map(|stage| {
            CString::new(stage.entry_point.as_str())
                .map_err(|e| engine_err!("mgp::vulkan", "Invalid entry point name '{}': {}", stage.entry_point, e))
        })
        .collect()
}

fn stage_info<'a>(stage: &ShaderStageModule, name: &'a CString) -> vk::PipelineShaderStageCreateInfo<'a> {
    vk::PipelineShaderStageCreateInfo::default()
        .stage(shader_stage_to_vk(stage.stage))
        .module(vk::ShaderModule::from_raw(stage.module.as_raw()))
        .name(name)
}

/// Build one graphics pipeline
///
/// # Safety
///
/// Every handle in `info` must be a live object of `device`.
pub(crate) unsafe fn create_graphics_pipeline(
    device: &ash::Device,
    cache: vk::PipelineCache,
    info: &GraphicsPipelineInfo,
) -> Result<vk::Pipeline> {
    let stages: Vec<&ShaderStageModule> = info.stages.iter().collect();
    let names = entry_names(&stages)?;
    let stage_infos: Vec<_> = stages
        .iter()
        .zip(&names)
        .map(|(stage, name)| stage_info(stage, name))
        .collect();

    // Vertex input
    let bindings: Vec<vk::VertexInputBindingDescription> = info
        .vertex_layout
        .bindings
        .iter()
        .map(|b| vk::VertexInputBindingDescription {
            binding: b.binding,
            stride: b.stride,
            input_rate: input_rate_to_vk(b.input_rate),
        })
        .collect();
    let attributes: Vec<vk::VertexInputAttributeDescription> = info
        .vertex_layout
        .attributes
        .iter()
        .map(|a| vk::VertexInputAttributeDescription {
            location: a.location,
            binding: a.binding,
            format: format_to_vk(a.format),
            offset: a.offset,
        })
        .collect();
    let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
        .vertex_binding_descriptions(&bindings)
        .vertex_attribute_descriptions(&attributes);

    let input_assembly =
        vk::PipelineInputAssemblyStateCreateInfo::default().topology(topology_to_vk(info.topology));

    let viewport_state = vk::PipelineViewportStateCreateInfo::default()
        .viewport_count(1)
        .scissor_count(1);

    // Rasterization
    let raster = &info.rasterization;
    let mut rasterization = vk::PipelineRasterizationStateCreateInfo::default()
        .polygon_mode(polygon_mode_to_vk(raster.polygon_mode))
        .cull_mode(cull_mode_to_vk(raster.cull_mode))
        .front_face(front_face_to_vk(raster.front_face))
        .line_width(1.0);
    if let Some(bias) = raster.depth_bias {
        rasterization = rasterization
            .depth_bias_enable(true)
            .depth_bias_constant_factor(bias.constant_factor)
            .depth_bias_slope_factor(bias.slope_factor)
            .depth_bias_clamp(bias.clamp);
    }

    let multisample = vk::PipelineMultisampleStateCreateInfo::default()
        .rasterization_samples(sample_count_to_vk(info.multisample.sample_count))
        .alpha_to_coverage_enable(info.multisample.alpha_to_coverage);

    // Depth/stencil
    let ds = &info.depth_stencil;
    let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
        .depth_test_enable(ds.depth_test_enable)
        .depth_write_enable(ds.depth_write_enable)
        .depth_compare_op(compare_op_to_vk(ds.depth_compare_op))
        .stencil_test_enable(ds.stencil_test_enable)
        .front(stencil_op_state_to_vk(&ds.front))
        .back(stencil_op_state_to_vk(&ds.back))
        .min_depth_bounds(0.0)
        .max_depth_bounds(1.0);

    // Colour blend, one state per colour attachment
    let blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> = info
        .color_blend
        .iter()
        .map(|b| {
            vk::PipelineColorBlendAttachmentState::default()
                .blend_enable(b.blend_enable)
                .src_color_blend_factor(blend_factor_to_vk(b.src_color_factor))
                .dst_color_blend_factor(blend_factor_to_vk(b.dst_color_factor))
                .color_blend_op(blend_op_to_vk(b.color_blend_op))
                .src_alpha_blend_factor(blend_factor_to_vk(b.src_alpha_factor))
                .dst_alpha_blend_factor(blend_factor_to_vk(b.dst_alpha_factor))
                .alpha_blend_op(blend_op_to_vk(b.alpha_blend_op))
                .color_write_mask(color_write_mask_to_vk(&b.color_write_mask))
        })
        .collect();
    let color_blend = vk::PipelineColorBlendStateCreateInfo::default().attachments(&blend_attachments);

    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

    // Attachment formats for dynamic rendering
    let color_formats: Vec<vk::Format> = info.color_formats.iter().map(|&f| format_to_vk(f)).collect();
    let mut rendering = vk::PipelineRenderingCreateInfo::default()
        .color_attachment_formats(&color_formats)
        .depth_attachment_format(info.depth_format.map(format_to_vk).unwrap_or(vk::Format::UNDEFINED))
        .stencil_attachment_format(info.stencil_format.map(format_to_vk).unwrap_or(vk::Format::UNDEFINED));

    let create_info = vk::GraphicsPipelineCreateInfo::default()
        .stages(&stage_infos)
        .vertex_input_state(&vertex_input)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterization)
        .multisample_state(&multisample)
        .depth_stencil_state(&depth_stencil)
        .color_blend_state(&color_blend)
        .dynamic_state(&dynamic_state)
        .layout(vk::PipelineLayout::from_raw(info.layout.as_raw()))
        .push_next(&mut rendering);

    let pipelines = device
        .create_graphics_pipelines(cache, &[create_info], None)
        .map_err(|(_, e)| engine_err!("mgp::vulkan", "Failed to create graphics pipeline: {:?}", e))?;
    pipelines
        .into_iter()
        .next()
        .ok_or_else(|| engine_err!("mgp::vulkan", "Driver returned no graphics pipeline"))
}

/// Build one compute pipeline
///
/// # Safety
///
/// Every handle in `info` must be a live object of `device`.
pub(crate) unsafe fn create_compute_pipeline(
    device: &ash::Device,
    cache: vk::PipelineCache,
    info: &ComputePipelineInfo,
) -> Result<vk::Pipeline> {
    let names = entry_names(&[&info.stage])?;
    let create_info = vk::ComputePipelineCreateInfo::default()
        .stage(stage_info(&info.stage, &names[0]))
        .layout(vk::PipelineLayout::from_raw(info.layout.as_raw()));

    let pipelines = device
        .create_compute_pipelines(cache, &[create_info], None)
        .map_err(|(_, e)| engine_err!("mgp::vulkan", "Failed to create compute pipeline: {:?}", e))?;
    pipelines
        .into_iter()
        .next()
        .ok_or_else(|| engine_err!("mgp::vulkan", "Driver returned no compute pipeline"))
}
