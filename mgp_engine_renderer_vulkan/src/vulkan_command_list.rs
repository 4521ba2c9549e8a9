/// Command recording helpers that need more than a direct call
///
/// Layout transitions go through synchronization2, rendering through
/// dynamic rendering. The simple draw/bind/dispatch calls are recorded
/// inline by `VulkanDevice`.

use ash::vk;
use ash::vk::Handle;
use mgp_engine::mgp::render::{
    BufferImageCopy, ClearValue, ImageBarrier, ImageLayout, RenderingAttachment, RenderingInfo,
};

use crate::vulkan_format::*;

/// Barrier for one layout transition, scoped by what each layout implies
pub(crate) fn image_barrier(barrier: &ImageBarrier) -> vk::ImageMemoryBarrier2<'static> {
    let (src_stage, src_access) = layout_scope(barrier.old_layout);
    let (dst_stage, dst_access) = layout_scope(barrier.new_layout);
    vk::ImageMemoryBarrier2::default()
        .src_stage_mask(src_stage)
        .src_access_mask(src_access)
        .dst_stage_mask(dst_stage)
        .dst_access_mask(dst_access)
        .old_layout(image_layout_to_vk(barrier.old_layout))
        .new_layout(image_layout_to_vk(barrier.new_layout))
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(vk::Image::from_raw(barrier.image.as_raw()))
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: aspect_to_vk(barrier.aspect),
            base_mip_level: barrier.base_mip,
            level_count: barrier.mip_count,
            base_array_layer: barrier.base_layer,
            layer_count: barrier.layer_count,
        })
}

/// Record every transition in one `vkCmdPipelineBarrier2`
///
/// # Safety
///
/// `cmd` must be in the recording state; every image must be live.
pub(crate) unsafe fn record_barriers(device: &ash::Device, cmd: vk::CommandBuffer, barriers: &[ImageBarrier]) {
    if barriers.is_empty() {
        return;
    }
    let image_barriers: Vec<vk::ImageMemoryBarrier2> = barriers.iter().map(image_barrier).collect();
    let dependency = vk::DependencyInfo::default().image_memory_barriers(&image_barriers);
    device.cmd_pipeline_barrier2(cmd, &dependency);
}

fn clear_value_to_vk(clear: ClearValue) -> vk::ClearValue {
    match clear {
        ClearValue::Color(float32) => vk::ClearValue {
            color: vk::ClearColorValue { float32 },
        },
        ClearValue::DepthStencil { depth, stencil } => vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue { depth, stencil },
        },
    }
}

/// Attachment description for dynamic rendering; a resolve view turns on
/// an averaging resolve into it
pub(crate) fn rendering_attachment(attachment: &RenderingAttachment) -> vk::RenderingAttachmentInfo<'static> {
    let mut info = vk::RenderingAttachmentInfo::default()
        .image_view(vk::ImageView::from_raw(attachment.view.as_raw()))
        .image_layout(image_layout_to_vk(attachment.layout))
        .load_op(load_op_to_vk(attachment.load_op))
        .store_op(store_op_to_vk(attachment.store_op))
        .clear_value(clear_value_to_vk(attachment.clear));
    if let Some(resolve) = attachment.resolve_view {
        info = info
            .resolve_mode(vk::ResolveModeFlags::AVERAGE)
            .resolve_image_view(vk::ImageView::from_raw(resolve.as_raw()))
            .resolve_image_layout(image_layout_to_vk(attachment.resolve_layout));
    }
    info
}

/// # Safety
///
/// `cmd` must be recording and outside any rendering scope.
pub(crate) unsafe fn record_begin_rendering(device: &ash::Device, cmd: vk::CommandBuffer, info: &RenderingInfo) {
    let color: Vec<vk::RenderingAttachmentInfo> = info.color_attachments.iter().map(rendering_attachment).collect();
    let depth = info.depth_attachment.as_ref().map(rendering_attachment);

    let mut rendering = vk::RenderingInfo::default()
        .render_area(vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: vk::Extent2D { width: info.width, height: info.height },
        })
        .layer_count(info.layer_count.max(1))
        .color_attachments(&color);
    if let Some(depth) = depth.as_ref() {
        rendering = rendering.depth_attachment(depth);
    }
    device.cmd_begin_rendering(cmd, &rendering);
}

/// # Safety
///
/// `cmd` must be recording; `src` and `dst` must be live, `dst` in `dst_layout`.
pub(crate) unsafe fn record_copy_buffer_to_image(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    src: vk::Buffer,
    dst: vk::Image,
    dst_layout: ImageLayout,
    regions: &[BufferImageCopy],
) {
    let regions: Vec<vk::BufferImageCopy> = regions
        .iter()
        .map(|r| vk::BufferImageCopy {
            buffer_offset: r.buffer_offset,
            buffer_row_length: 0,
            buffer_image_height: 0,
            image_subresource: vk::ImageSubresourceLayers {
                aspect_mask: aspect_to_vk(r.aspect),
                mip_level: r.mip_level,
                base_array_layer: r.base_layer,
                layer_count: r.layer_count,
            },
            image_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
            image_extent: vk::Extent3D {
                width: r.width,
                height: r.height,
                depth: r.depth.max(1),
            },
        })
        .collect();
    device.cmd_copy_buffer_to_image(cmd, src, dst, image_layout_to_vk(dst_layout), &regions);
}

#[cfg(test)]
#[path = "vulkan_command_list_tests.rs"]
mod tests;
