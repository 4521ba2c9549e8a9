/// Device trait - the backend boundary
///
/// Everything above this trait (caches, pools, frames, render graph) is
/// backend-agnostic and only speaks in opaque handles. Recording calls are
/// infallible at this level, mirroring the underlying API: their errors only
/// surface when the command buffer is ended or submitted.

use crate::error::Result;
use crate::device::handles::*;
use crate::device::types::*;
use crate::device::pipeline_state::*;

/// A logical GPU device with one graphics/present queue
pub trait Device: Send + Sync {
    // ===== QUEUES =====

    /// The queue used for rendering, presentation and uploads
    fn graphics_queue(&self) -> QueueInfo;

    // ===== BUFFERS =====

    /// Create a buffer and bind memory to it
    fn create_buffer(&self, desc: &BufferInfo) -> Result<BufferHandle>;

    fn destroy_buffer(&self, buffer: BufferHandle);

    /// Copy bytes into a host-visible buffer
    ///
    /// # Errors
    ///
    /// Fails if the buffer is not mapped or the range is out of bounds.
    fn write_buffer(&self, buffer: BufferHandle, offset: u64, data: &[u8]) -> Result<()>;

    /// Copy bytes out of a host-visible buffer
    fn read_buffer(&self, buffer: BufferHandle, offset: u64, out: &mut [u8]) -> Result<()>;

    /// Device address of a buffer created with `BufferUsage::DEVICE_ADDRESS`
    fn buffer_device_address(&self, buffer: BufferHandle) -> Option<u64>;

    // ===== IMAGES AND SAMPLERS =====

    fn create_image(&self, info: &ImageInfo, name: &str) -> Result<ImageHandle>;

    fn destroy_image(&self, image: ImageHandle);

    fn create_image_view(&self, desc: &ImageViewDesc) -> Result<ImageViewHandle>;

    fn destroy_image_view(&self, view: ImageViewHandle);

    fn create_sampler(&self, info: &SamplerInfo) -> Result<SamplerHandle>;

    fn destroy_sampler(&self, sampler: SamplerHandle);

    // ===== DESCRIPTORS =====

    fn create_descriptor_set_layout(&self, info: &DescriptorSetLayoutInfo) -> Result<DescriptorSetLayoutHandle>;

    fn destroy_descriptor_set_layout(&self, layout: DescriptorSetLayoutHandle);

    fn create_descriptor_pool(&self, info: &DescriptorPoolInfo) -> Result<DescriptorPoolHandle>;

    fn destroy_descriptor_pool(&self, pool: DescriptorPoolHandle);

    /// Return every set allocated from `pool` to it
    fn reset_descriptor_pool(&self, pool: DescriptorPoolHandle) -> Result<()>;

    /// Allocate one set per layout
    ///
    /// `variable_counts`, when present, gives the descriptor count of each
    /// set's variable-sized last binding.
    fn allocate_descriptor_sets(
        &self,
        pool: DescriptorPoolHandle,
        layouts: &[DescriptorSetLayoutHandle],
        variable_counts: Option<&[u32]>,
    ) -> std::result::Result<Vec<DescriptorSetHandle>, DescriptorAllocError>;

    fn update_descriptor_sets(&self, writes: &[DescriptorWrite]);

    // ===== SHADERS AND PIPELINES =====

    /// Create a shader module from SPIR-V words
    fn create_shader_module(&self, code: &[u32]) -> Result<ShaderModuleHandle>;

    fn destroy_shader_module(&self, module: ShaderModuleHandle);

    fn create_pipeline_layout(&self, info: &PipelineLayoutInfo) -> Result<PipelineLayoutHandle>;

    fn destroy_pipeline_layout(&self, layout: PipelineLayoutHandle);

    fn create_graphics_pipeline(&self, info: &GraphicsPipelineInfo) -> Result<PipelineHandle>;

    fn create_compute_pipeline(&self, info: &ComputePipelineInfo) -> Result<PipelineHandle>;

    fn destroy_pipeline(&self, pipeline: PipelineHandle);

    /// Serialized driver pipeline cache (opaque bytes)
    fn pipeline_cache_data(&self) -> Result<Vec<u8>>;

    // ===== COMMAND POOLS AND BUFFERS =====

    /// Create a pool whose buffers can be re-begun individually
    fn create_command_pool(&self, queue_family: u32) -> Result<CommandPoolHandle>;

    fn destroy_command_pool(&self, pool: CommandPoolHandle);

    /// Reset every buffer allocated from the pool
    fn reset_command_pool(&self, pool: CommandPoolHandle) -> Result<()>;

    fn allocate_command_buffers(&self, pool: CommandPoolHandle, count: u32) -> Result<Vec<CommandBufferHandle>>;

    fn begin_command_buffer(&self, cmd: CommandBufferHandle) -> Result<()>;

    fn end_command_buffer(&self, cmd: CommandBufferHandle) -> Result<()>;

    // ===== SYNCHRONIZATION =====

    fn create_fence(&self, signaled: bool) -> Result<FenceHandle>;

    fn destroy_fence(&self, fence: FenceHandle);

    /// Block until the fence is signaled or `timeout_ns` elapses
    ///
    /// # Returns
    ///
    /// `false` if the wait timed out.
    fn wait_for_fence(&self, fence: FenceHandle, timeout_ns: u64) -> Result<bool>;

    fn reset_fence(&self, fence: FenceHandle) -> Result<()>;

    /// Non-blocking fence query
    fn fence_signaled(&self, fence: FenceHandle) -> Result<bool>;

    fn create_semaphore(&self) -> Result<SemaphoreHandle>;

    fn destroy_semaphore(&self, semaphore: SemaphoreHandle);

    /// Submit command buffers, signaling `fence` when they complete
    fn submit(&self, queue: QueueHandle, info: &SubmitInfo<'_>, fence: Option<FenceHandle>) -> Result<()>;

    /// Block until the device is idle
    fn wait_idle(&self) -> Result<()>;

    // ===== COMMAND RECORDING =====

    fn cmd_pipeline_barrier(&self, cmd: CommandBufferHandle, barriers: &[ImageBarrier]);

    fn cmd_begin_rendering(&self, cmd: CommandBufferHandle, info: &RenderingInfo);

    fn cmd_end_rendering(&self, cmd: CommandBufferHandle);

    fn cmd_bind_pipeline(&self, cmd: CommandBufferHandle, bind_point: PipelineBindPoint, pipeline: PipelineHandle);

    fn cmd_bind_descriptor_sets(
        &self,
        cmd: CommandBufferHandle,
        bind_point: PipelineBindPoint,
        layout: PipelineLayoutHandle,
        first_set: u32,
        sets: &[DescriptorSetHandle],
    );

    fn cmd_push_constants(
        &self,
        cmd: CommandBufferHandle,
        layout: PipelineLayoutHandle,
        stages: ShaderStages,
        offset: u32,
        data: &[u8],
    );

    fn cmd_set_viewport(&self, cmd: CommandBufferHandle, viewport: &Viewport);

    fn cmd_set_scissor(&self, cmd: CommandBufferHandle, scissor: &Rect2D);

    fn cmd_bind_vertex_buffers(&self, cmd: CommandBufferHandle, first_binding: u32, buffers: &[(BufferHandle, u64)]);

    fn cmd_bind_index_buffer(&self, cmd: CommandBufferHandle, buffer: BufferHandle, offset: u64, index_type: IndexType);

    fn cmd_draw(
        &self,
        cmd: CommandBufferHandle,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    );

    fn cmd_draw_indexed(
        &self,
        cmd: CommandBufferHandle,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    );

    fn cmd_dispatch(&self, cmd: CommandBufferHandle, x: u32, y: u32, z: u32);

    fn cmd_copy_buffer(&self, cmd: CommandBufferHandle, src: BufferHandle, dst: BufferHandle, regions: &[BufferCopy]);

    fn cmd_copy_buffer_to_image(
        &self,
        cmd: CommandBufferHandle,
        src: BufferHandle,
        dst: ImageHandle,
        dst_layout: ImageLayout,
        regions: &[BufferImageCopy],
    );

    // ===== PRESENTATION =====

    /// Create a swapchain for the device's surface
    ///
    /// When `info.old_swapchain` is set the old chain is retired; the caller
    /// destroys it afterwards.
    fn create_swapchain(&self, info: &SwapchainInfo) -> Result<SwapchainImages>;

    fn destroy_swapchain(&self, swapchain: SwapchainHandle);

    /// Acquire the next image, signaling `signal` when it is ready
    fn acquire_next_image(&self, swapchain: SwapchainHandle, signal: SemaphoreHandle) -> Result<AcquireResult>;

    fn present(
        &self,
        queue: QueueHandle,
        swapchain: SwapchainHandle,
        image_index: u32,
        wait: &[SemaphoreHandle],
    ) -> Result<PresentResult>;
}
