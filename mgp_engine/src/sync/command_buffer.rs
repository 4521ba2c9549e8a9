/// CommandBuffer - recording wrapper stamped with its frame slot
///
/// Buffers handed out by [`FrameData::get_free_buffer`](crate::sync::FrameData::get_free_buffer)
/// remember the slot they came from and the slot's generation at that time.
/// Resetting the slot bumps its generation, so any wrapper kept across the
/// reset refuses to record with `Error::StaleCommandBuffer` instead of
/// writing into a buffer the GPU may still read.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use crate::device::{
    BufferCopy, BufferHandle, BufferImageCopy, CommandBufferHandle, DescriptorSetHandle, Device, ImageBarrier,
    ImageHandle, ImageLayout, IndexType, PipelineBindPoint, PipelineLayoutHandle, Rect2D, RenderingInfo,
    ShaderStages, Viewport,
};
use crate::error::{Error, Result};
use crate::pipeline::PipelineBinding;
use crate::resource::{Image, ViewRange};

pub struct CommandBuffer {
    device: Arc<dyn Device>,
    handle: CommandBufferHandle,
    slot: usize,
    generation: u64,
    slot_generation: Arc<AtomicU64>,
    recording: bool,
    rendering: bool,
}

impl CommandBuffer {
    pub(crate) fn new(
        device: Arc<dyn Device>,
        handle: CommandBufferHandle,
        slot: usize,
        slot_generation: Arc<AtomicU64>,
    ) -> Self {
        let generation = slot_generation.load(Ordering::Acquire);
        Self {
            device,
            handle,
            slot,
            generation,
            slot_generation,
            recording: false,
            rendering: false,
        }
    }

    pub fn handle(&self) -> CommandBufferHandle {
        self.handle
    }

    /// Frame slot the buffer belongs to
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Slot generation the buffer was handed out in
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// True between `begin_rendering` and `end_rendering`
    pub fn is_rendering(&self) -> bool {
        self.rendering
    }

    /// True once the slot has been reset since this buffer was handed out
    pub fn is_stale(&self) -> bool {
        self.slot_generation.load(Ordering::Acquire) != self.generation
    }

    fn check_stamp(&self) -> Result<()> {
        let current = self.slot_generation.load(Ordering::Acquire);
        if current != self.generation {
            return Err(Error::StaleCommandBuffer {
                slot: self.slot,
                generation: self.generation,
                current,
            });
        }
        Ok(())
    }

    fn check_recording(&self) -> Result<()> {
        self.check_stamp()?;
        if !self.recording {
            return Err(Error::InvalidResource("command buffer is not recording".to_string()));
        }
        Ok(())
    }

    // ===== LIFECYCLE =====

    pub fn begin(&mut self) -> Result<()> {
        self.check_stamp()?;
        if self.recording {
            return Err(Error::InvalidResource("command buffer already recording".to_string()));
        }
        self.device.begin_command_buffer(self.handle)?;
        self.recording = true;
        Ok(())
    }

    pub fn end(&mut self) -> Result<()> {
        self.check_recording()?;
        if self.rendering {
            return Err(Error::InvalidResource("command buffer ended inside a rendering scope".to_string()));
        }
        self.device.end_command_buffer(self.handle)?;
        self.recording = false;
        Ok(())
    }

    // ===== LAYOUT TRANSITIONS =====

    /// Transition every subresource of an image and record the new layout
    ///
    /// Nothing is recorded when the image already is in a read-only
    /// `layout`. Writable layouts get a barrier even when unchanged, so that
    /// consecutive writers are ordered.
    pub fn transition_image(&mut self, image: &mut Image, layout: ImageLayout) -> Result<()> {
        let range = ViewRange::full(image.info());
        self.transition_image_range(image, range, layout)
    }

    /// Transition a mip/layer range of an image
    ///
    /// The tracked layout is per image: ranges are meant for images that
    /// move between layouts as a whole, such as per-mip generation passes
    /// that finish by transitioning the full image.
    pub fn transition_image_range(&mut self, image: &mut Image, range: ViewRange, layout: ImageLayout) -> Result<()> {
        self.check_recording()?;
        let old_layout = image.layout();
        if old_layout == layout && layout.is_read_only() {
            return Ok(());
        }
        let barrier = ImageBarrier {
            image: image.handle(),
            aspect: image.aspect(),
            old_layout,
            new_layout: layout,
            base_mip: range.base_mip,
            mip_count: range.mip_count,
            base_layer: range.base_layer,
            layer_count: range.layer_count,
        };
        self.device.cmd_pipeline_barrier(self.handle, &[barrier]);
        image.set_layout(layout);
        Ok(())
    }

    // ===== RENDERING =====

    pub fn begin_rendering(&mut self, info: &RenderingInfo) -> Result<()> {
        self.check_recording()?;
        if self.rendering {
            return Err(Error::InvalidResource("rendering scope already open".to_string()));
        }
        self.device.cmd_begin_rendering(self.handle, info);
        self.rendering = true;
        Ok(())
    }

    pub fn end_rendering(&mut self) -> Result<()> {
        self.check_recording()?;
        if !self.rendering {
            return Err(Error::InvalidResource("no rendering scope open".to_string()));
        }
        self.device.cmd_end_rendering(self.handle);
        self.rendering = false;
        Ok(())
    }

    /// Bind a pipeline fetched from the pipeline cache
    pub fn bind_pipeline(&mut self, binding: &PipelineBinding) -> Result<()> {
        self.check_recording()?;
        self.device.cmd_bind_pipeline(self.handle, binding.bind_point, binding.pipeline);
        Ok(())
    }

    pub fn bind_descriptor_sets(
        &mut self,
        bind_point: PipelineBindPoint,
        layout: PipelineLayoutHandle,
        first_set: u32,
        sets: &[DescriptorSetHandle],
    ) -> Result<()> {
        self.check_recording()?;
        self.device.cmd_bind_descriptor_sets(self.handle, bind_point, layout, first_set, sets);
        Ok(())
    }

    /// Push a plain-old-data value as push constants
    pub fn push_constants<T: bytemuck::Pod>(
        &mut self,
        layout: PipelineLayoutHandle,
        stages: ShaderStages,
        offset: u32,
        value: &T,
    ) -> Result<()> {
        self.check_recording()?;
        self.device
            .cmd_push_constants(self.handle, layout, stages, offset, bytemuck::bytes_of(value));
        Ok(())
    }

    pub fn set_viewport(&mut self, viewport: &Viewport) -> Result<()> {
        self.check_recording()?;
        self.device.cmd_set_viewport(self.handle, viewport);
        Ok(())
    }

    pub fn set_scissor(&mut self, scissor: &Rect2D) -> Result<()> {
        self.check_recording()?;
        self.device.cmd_set_scissor(self.handle, scissor);
        Ok(())
    }

    /// Full-target viewport (depth 0..1) and matching scissor
    pub fn set_viewport_and_scissor(&mut self, width: u32, height: u32) -> Result<()> {
        self.set_viewport(&Viewport {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        })?;
        self.set_scissor(&Rect2D { x: 0, y: 0, width, height })
    }

    pub fn bind_vertex_buffers(&mut self, first_binding: u32, buffers: &[(BufferHandle, u64)]) -> Result<()> {
        self.check_recording()?;
        self.device.cmd_bind_vertex_buffers(self.handle, first_binding, buffers);
        Ok(())
    }

    pub fn bind_index_buffer(&mut self, buffer: BufferHandle, offset: u64, index_type: IndexType) -> Result<()> {
        self.check_recording()?;
        self.device.cmd_bind_index_buffer(self.handle, buffer, offset, index_type);
        Ok(())
    }

    pub fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) -> Result<()> {
        self.check_recording()?;
        self.device
            .cmd_draw(self.handle, vertex_count, instance_count, first_vertex, first_instance);
        Ok(())
    }

    pub fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<()> {
        self.check_recording()?;
        self.device.cmd_draw_indexed(
            self.handle,
            index_count,
            instance_count,
            first_index,
            vertex_offset,
            first_instance,
        );
        Ok(())
    }

    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()> {
        self.check_recording()?;
        if self.rendering {
            return Err(Error::InvalidResource("dispatch inside a rendering scope".to_string()));
        }
        self.device.cmd_dispatch(self.handle, x, y, z);
        Ok(())
    }

    // ===== TRANSFERS =====

    pub fn copy_buffer(&mut self, src: BufferHandle, dst: BufferHandle, regions: &[BufferCopy]) -> Result<()> {
        self.check_recording()?;
        self.device.cmd_copy_buffer(self.handle, src, dst, regions);
        Ok(())
    }

    /// Copy into an image that is in `TransferDst` or `General` layout
    pub fn copy_buffer_to_image(
        &mut self,
        src: BufferHandle,
        dst: ImageHandle,
        dst_layout: ImageLayout,
        regions: &[BufferImageCopy],
    ) -> Result<()> {
        self.check_recording()?;
        self.device.cmd_copy_buffer_to_image(self.handle, src, dst, dst_layout, regions);
        Ok(())
    }
}

#[cfg(test)]
#[path = "command_buffer_tests.rs"]
mod tests;
