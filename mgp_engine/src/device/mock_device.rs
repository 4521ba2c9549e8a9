/// Mock Device for unit tests (no GPU required)
///
/// Hands out counter-based handles and records everything the engine asks of
/// the GPU so tests can inspect it: created objects, descriptor writes,
/// barriers, recorded commands and submissions. Submitted work "completes"
/// immediately unless `auto_signal` is switched off, which lets tests hold a
/// frame in flight.

#[cfg(test)]
use std::collections::VecDeque;
#[cfg(test)]
use std::sync::{Mutex, MutexGuard};
#[cfg(test)]
use rustc_hash::{FxHashMap, FxHashSet};

#[cfg(test)]
use crate::device::*;
#[cfg(test)]
use crate::error::{Error, Result};

// ============================================================================
// Mock records
// ============================================================================

#[cfg(test)]
#[derive(Debug, Clone)]
pub struct MockBuffer {
    pub desc: BufferInfo,
    pub data: Vec<u8>,
    pub address: Option<u64>,
}

#[cfg(test)]
#[derive(Debug, Clone)]
pub struct MockPool {
    pub info: DescriptorPoolInfo,
    pub allocated: u32,
}

#[cfg(test)]
#[derive(Debug, Clone)]
pub struct MockSubmit {
    pub command_buffers: Vec<CommandBufferHandle>,
    pub waits: Vec<SemaphoreHandle>,
    pub signals: Vec<SemaphoreHandle>,
    pub fence: Option<FenceHandle>,
}

#[cfg(test)]
#[derive(Debug, Clone)]
pub struct MockSwapchain {
    pub handle: SwapchainHandle,
    pub images: Vec<ImageHandle>,
    pub next_index: u32,
    pub width: u32,
    pub height: u32,
}

/// Everything the mock has been asked to do
#[cfg(test)]
#[derive(Default)]
pub struct MockState {
    next_handle: u64,

    pub buffers: FxHashMap<BufferHandle, MockBuffer>,
    pub images: FxHashMap<ImageHandle, ImageInfo>,
    pub views: FxHashMap<ImageViewHandle, ImageViewDesc>,
    pub samplers: FxHashMap<SamplerHandle, SamplerInfo>,
    pub set_layouts: FxHashMap<DescriptorSetLayoutHandle, DescriptorSetLayoutInfo>,
    pub pools: FxHashMap<DescriptorPoolHandle, MockPool>,
    pub pools_created: u32,
    pub descriptor_writes: Vec<DescriptorWrite>,
    pub modules: FxHashSet<ShaderModuleHandle>,
    pub pipeline_layouts: FxHashMap<PipelineLayoutHandle, PipelineLayoutInfo>,
    pub pipelines: FxHashSet<PipelineHandle>,
    pub graphics_pipelines_created: u32,
    pub compute_pipelines_created: u32,
    pub destroyed_pipelines: Vec<PipelineHandle>,
    pub command_pools: FxHashMap<CommandPoolHandle, Vec<CommandBufferHandle>>,
    pub command_pool_resets: FxHashMap<CommandPoolHandle, u32>,
    pub fences: FxHashMap<FenceHandle, bool>,
    pub semaphores: FxHashSet<SemaphoreHandle>,
    pub submits: Vec<MockSubmit>,
    pub barriers: Vec<ImageBarrier>,
    pub commands: Vec<String>,
    pub swapchain: Option<MockSwapchain>,
    pub swapchains_created: u32,
    pub acquire_script: VecDeque<AcquireResult>,
    pub present_script: VecDeque<PresentResult>,
    pub presents: u32,
    pub wait_idle_calls: u32,

    /// Submissions signal their fence immediately
    pub auto_signal: bool,
    /// Device has a presentation surface
    pub has_surface: bool,
    /// Make pipeline creation fail
    pub fail_pipelines: bool,
    /// Reject this many upcoming submissions
    pub failing_submits: u32,
}

#[cfg(test)]
impl MockState {
    fn next<T>(&mut self, wrap: fn(u64) -> T) -> T {
        self.next_handle += 1;
        wrap(self.next_handle)
    }

    /// Count of GPU objects not yet destroyed
    pub fn live_objects(&self) -> usize {
        self.buffers.len()
            + self.images.len()
            + self.views.len()
            + self.samplers.len()
            + self.set_layouts.len()
            + self.pools.len()
            + self.modules.len()
            + self.pipeline_layouts.len()
            + self.pipelines.len()
            + self.command_pools.len()
            + self.fences.len()
            + self.semaphores.len()
            + usize::from(self.swapchain.is_some())
    }

    /// Recorded commands matching a prefix
    pub fn commands_starting_with(&self, prefix: &str) -> Vec<String> {
        self.commands.iter().filter(|c| c.starts_with(prefix)).cloned().collect()
    }
}

// ============================================================================
// Mock Device
// ============================================================================

#[cfg(test)]
pub struct MockDevice {
    state: Mutex<MockState>,
}

#[cfg(test)]
impl MockDevice {
    /// Device with a 800x600 presentation surface
    pub fn new() -> Self {
        let state = MockState {
            auto_signal: true,
            has_surface: true,
            ..Default::default()
        };
        Self { state: Mutex::new(state) }
    }

    /// Device without a surface
    pub fn headless() -> Self {
        let device = Self::new();
        device.state().has_surface = false;
        device
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Force a fence state
    pub fn set_fence(&self, fence: FenceHandle, signaled: bool) {
        self.state().fences.insert(fence, signaled);
    }
}

#[cfg(test)]
fn layout_name(layout: ImageLayout) -> String {
    format!("{:?}", layout)
}

#[cfg(test)]
impl Device for MockDevice {
    fn graphics_queue(&self) -> QueueInfo {
        QueueInfo { handle: QueueHandle::from_raw(0xA11), family: 0 }
    }

    fn create_buffer(&self, desc: &BufferInfo) -> Result<BufferHandle> {
        let mut state = self.state();
        let handle = state.next(BufferHandle::from_raw);
        let address = desc
            .usage
            .contains(BufferUsage::DEVICE_ADDRESS)
            .then(|| 0x1000_0000 + handle.as_raw() * 0x1000);
        state.buffers.insert(handle, MockBuffer {
            desc: desc.clone(),
            data: vec![0; desc.size as usize],
            address,
        });
        Ok(handle)
    }

    fn destroy_buffer(&self, buffer: BufferHandle) {
        self.state().buffers.remove(&buffer);
    }

    fn write_buffer(&self, buffer: BufferHandle, offset: u64, data: &[u8]) -> Result<()> {
        let mut state = self.state();
        let record = state
            .buffers
            .get_mut(&buffer)
            .ok_or_else(|| Error::InvalidResource(format!("unknown buffer {:?}", buffer)))?;
        if record.desc.location == MemoryLocation::GpuOnly {
            return Err(Error::InvalidResource("buffer is not host visible".to_string()));
        }
        let start = offset as usize;
        let end = start + data.len();
        if end > record.data.len() {
            return Err(Error::InvalidResource("write out of bounds".to_string()));
        }
        record.data[start..end].copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(&self, buffer: BufferHandle, offset: u64, out: &mut [u8]) -> Result<()> {
        let state = self.state();
        let record = state
            .buffers
            .get(&buffer)
            .ok_or_else(|| Error::InvalidResource(format!("unknown buffer {:?}", buffer)))?;
        let start = offset as usize;
        let end = start + out.len();
        if end > record.data.len() {
            return Err(Error::InvalidResource("read out of bounds".to_string()));
        }
        out.copy_from_slice(&record.data[start..end]);
        Ok(())
    }

    fn buffer_device_address(&self, buffer: BufferHandle) -> Option<u64> {
        self.state().buffers.get(&buffer).and_then(|b| b.address)
    }

    fn create_image(&self, info: &ImageInfo, _name: &str) -> Result<ImageHandle> {
        let mut state = self.state();
        let handle = state.next(ImageHandle::from_raw);
        state.images.insert(handle, info.clone());
        Ok(handle)
    }

    fn destroy_image(&self, image: ImageHandle) {
        self.state().images.remove(&image);
    }

    fn create_image_view(&self, desc: &ImageViewDesc) -> Result<ImageViewHandle> {
        let mut state = self.state();
        let swapchain_owned = state
            .swapchain
            .as_ref()
            .is_some_and(|s| s.images.contains(&desc.image));
        if !state.images.contains_key(&desc.image) && !swapchain_owned {
            return Err(Error::InvalidResource(format!("view of unknown image {:?}", desc.image)));
        }
        let handle = state.next(ImageViewHandle::from_raw);
        state.views.insert(handle, *desc);
        Ok(handle)
    }

    fn destroy_image_view(&self, view: ImageViewHandle) {
        self.state().views.remove(&view);
    }

    fn create_sampler(&self, info: &SamplerInfo) -> Result<SamplerHandle> {
        let mut state = self.state();
        let handle = state.next(SamplerHandle::from_raw);
        state.samplers.insert(handle, *info);
        Ok(handle)
    }

    fn destroy_sampler(&self, sampler: SamplerHandle) {
        self.state().samplers.remove(&sampler);
    }

    fn create_descriptor_set_layout(&self, info: &DescriptorSetLayoutInfo) -> Result<DescriptorSetLayoutHandle> {
        let mut state = self.state();
        let handle = state.next(DescriptorSetLayoutHandle::from_raw);
        state.set_layouts.insert(handle, info.clone());
        Ok(handle)
    }

    fn destroy_descriptor_set_layout(&self, layout: DescriptorSetLayoutHandle) {
        self.state().set_layouts.remove(&layout);
    }

    fn create_descriptor_pool(&self, info: &DescriptorPoolInfo) -> Result<DescriptorPoolHandle> {
        let mut state = self.state();
        let handle = state.next(DescriptorPoolHandle::from_raw);
        state.pools.insert(handle, MockPool { info: info.clone(), allocated: 0 });
        state.pools_created += 1;
        Ok(handle)
    }

    fn destroy_descriptor_pool(&self, pool: DescriptorPoolHandle) {
        self.state().pools.remove(&pool);
    }

    fn reset_descriptor_pool(&self, pool: DescriptorPoolHandle) -> Result<()> {
        let mut state = self.state();
        let record = state
            .pools
            .get_mut(&pool)
            .ok_or_else(|| Error::InvalidResource(format!("unknown pool {:?}", pool)))?;
        record.allocated = 0;
        Ok(())
    }

    fn allocate_descriptor_sets(
        &self,
        pool: DescriptorPoolHandle,
        layouts: &[DescriptorSetLayoutHandle],
        _variable_counts: Option<&[u32]>,
    ) -> std::result::Result<Vec<DescriptorSetHandle>, DescriptorAllocError> {
        let mut state = self.state();
        let record = state.pools.get_mut(&pool).ok_or_else(|| {
            DescriptorAllocError::Device(Error::InvalidResource(format!("unknown pool {:?}", pool)))
        })?;
        if record.allocated + layouts.len() as u32 > record.info.max_sets {
            return Err(DescriptorAllocError::OutOfPoolMemory);
        }
        record.allocated += layouts.len() as u32;
        Ok(layouts.iter().map(|_| state.next(DescriptorSetHandle::from_raw)).collect())
    }

    fn update_descriptor_sets(&self, writes: &[DescriptorWrite]) {
        self.state().descriptor_writes.extend_from_slice(writes);
    }

    fn create_shader_module(&self, code: &[u32]) -> Result<ShaderModuleHandle> {
        if code.is_empty() {
            return Err(Error::InvalidResource("empty SPIR-V".to_string()));
        }
        let mut state = self.state();
        let handle = state.next(ShaderModuleHandle::from_raw);
        state.modules.insert(handle);
        Ok(handle)
    }

    fn destroy_shader_module(&self, module: ShaderModuleHandle) {
        self.state().modules.remove(&module);
    }

    fn create_pipeline_layout(&self, info: &PipelineLayoutInfo) -> Result<PipelineLayoutHandle> {
        let mut state = self.state();
        let handle = state.next(PipelineLayoutHandle::from_raw);
        state.pipeline_layouts.insert(handle, info.clone());
        Ok(handle)
    }

    fn destroy_pipeline_layout(&self, layout: PipelineLayoutHandle) {
        self.state().pipeline_layouts.remove(&layout);
    }

    fn create_graphics_pipeline(&self, _info: &GraphicsPipelineInfo) -> Result<PipelineHandle> {
        let mut state = self.state();
        if state.fail_pipelines {
            return Err(Error::BackendError("mock pipeline creation failure".to_string()));
        }
        let handle = state.next(PipelineHandle::from_raw);
        state.pipelines.insert(handle);
        state.graphics_pipelines_created += 1;
        Ok(handle)
    }

    fn create_compute_pipeline(&self, _info: &ComputePipelineInfo) -> Result<PipelineHandle> {
        let mut state = self.state();
        if state.fail_pipelines {
            return Err(Error::BackendError("mock pipeline creation failure".to_string()));
        }
        let handle = state.next(PipelineHandle::from_raw);
        state.pipelines.insert(handle);
        state.compute_pipelines_created += 1;
        Ok(handle)
    }

    fn destroy_pipeline(&self, pipeline: PipelineHandle) {
        let mut state = self.state();
        state.pipelines.remove(&pipeline);
        state.destroyed_pipelines.push(pipeline);
    }

    fn pipeline_cache_data(&self) -> Result<Vec<u8>> {
        Ok(b"mock-pipeline-cache".to_vec())
    }

    fn create_command_pool(&self, _queue_family: u32) -> Result<CommandPoolHandle> {
        let mut state = self.state();
        let handle = state.next(CommandPoolHandle::from_raw);
        state.command_pools.insert(handle, Vec::new());
        Ok(handle)
    }

    fn destroy_command_pool(&self, pool: CommandPoolHandle) {
        self.state().command_pools.remove(&pool);
    }

    fn reset_command_pool(&self, pool: CommandPoolHandle) -> Result<()> {
        let mut state = self.state();
        if !state.command_pools.contains_key(&pool) {
            return Err(Error::InvalidResource(format!("unknown command pool {:?}", pool)));
        }
        *state.command_pool_resets.entry(pool).or_insert(0) += 1;
        Ok(())
    }

    fn allocate_command_buffers(&self, pool: CommandPoolHandle, count: u32) -> Result<Vec<CommandBufferHandle>> {
        let mut state = self.state();
        let buffers: Vec<_> = (0..count).map(|_| state.next(CommandBufferHandle::from_raw)).collect();
        state
            .command_pools
            .get_mut(&pool)
            .ok_or_else(|| Error::InvalidResource(format!("unknown command pool {:?}", pool)))?
            .extend_from_slice(&buffers);
        Ok(buffers)
    }

    fn begin_command_buffer(&self, cmd: CommandBufferHandle) -> Result<()> {
        self.state().commands.push(format!("begin {}", cmd.as_raw()));
        Ok(())
    }

    fn end_command_buffer(&self, cmd: CommandBufferHandle) -> Result<()> {
        self.state().commands.push(format!("end {}", cmd.as_raw()));
        Ok(())
    }

    fn create_fence(&self, signaled: bool) -> Result<FenceHandle> {
        let mut state = self.state();
        let handle = state.next(FenceHandle::from_raw);
        state.fences.insert(handle, signaled);
        Ok(handle)
    }

    fn destroy_fence(&self, fence: FenceHandle) {
        self.state().fences.remove(&fence);
    }

    fn wait_for_fence(&self, fence: FenceHandle, timeout_ns: u64) -> Result<bool> {
        let state = self.state();
        match state.fences.get(&fence) {
            Some(true) => Ok(true),
            Some(false) if timeout_ns == 0 => Ok(false),
            Some(false) => Err(Error::BackendError("mock fence wait would block forever".to_string())),
            None => Err(Error::InvalidResource(format!("unknown fence {:?}", fence))),
        }
    }

    fn reset_fence(&self, fence: FenceHandle) -> Result<()> {
        let mut state = self.state();
        match state.fences.get_mut(&fence) {
            Some(signaled) => {
                *signaled = false;
                Ok(())
            }
            None => Err(Error::InvalidResource(format!("unknown fence {:?}", fence))),
        }
    }

    fn fence_signaled(&self, fence: FenceHandle) -> Result<bool> {
        self.state()
            .fences
            .get(&fence)
            .copied()
            .ok_or_else(|| Error::InvalidResource(format!("unknown fence {:?}", fence)))
    }

    fn create_semaphore(&self) -> Result<SemaphoreHandle> {
        let mut state = self.state();
        let handle = state.next(SemaphoreHandle::from_raw);
        state.semaphores.insert(handle);
        Ok(handle)
    }

    fn destroy_semaphore(&self, semaphore: SemaphoreHandle) {
        self.state().semaphores.remove(&semaphore);
    }

    fn submit(&self, _queue: QueueHandle, info: &SubmitInfo<'_>, fence: Option<FenceHandle>) -> Result<()> {
        let mut state = self.state();
        if state.failing_submits > 0 {
            state.failing_submits -= 1;
            return Err(Error::BackendError("mock submit failure".to_string()));
        }
        if let Some(fence) = fence {
            if state.fences.get(&fence) == Some(&true) {
                return Err(Error::BackendError("submit with a signaled fence".to_string()));
            }
            if state.auto_signal {
                state.fences.insert(fence, true);
            }
        }
        state.submits.push(MockSubmit {
            command_buffers: info.command_buffers.to_vec(),
            waits: info.wait_semaphores.iter().map(|(s, _)| *s).collect(),
            signals: info.signal_semaphores.to_vec(),
            fence,
        });
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        self.state().wait_idle_calls += 1;
        Ok(())
    }

    fn cmd_pipeline_barrier(&self, cmd: CommandBufferHandle, barriers: &[ImageBarrier]) {
        let mut state = self.state();
        for barrier in barriers {
            state.commands.push(format!(
                "barrier {} {} {}->{}",
                cmd.as_raw(),
                barrier.image.as_raw(),
                layout_name(barrier.old_layout),
                layout_name(barrier.new_layout)
            ));
        }
        state.barriers.extend_from_slice(barriers);
    }

    fn cmd_begin_rendering(&self, cmd: CommandBufferHandle, info: &RenderingInfo) {
        self.state().commands.push(format!(
            "begin_rendering {} {}x{} colors={} depth={}",
            cmd.as_raw(),
            info.width,
            info.height,
            info.color_attachments.len(),
            info.depth_attachment.is_some()
        ));
    }

    fn cmd_end_rendering(&self, cmd: CommandBufferHandle) {
        self.state().commands.push(format!("end_rendering {}", cmd.as_raw()));
    }

    fn cmd_bind_pipeline(&self, cmd: CommandBufferHandle, bind_point: PipelineBindPoint, pipeline: PipelineHandle) {
        self.state()
            .commands
            .push(format!("bind_pipeline {} {:?} {}", cmd.as_raw(), bind_point, pipeline.as_raw()));
    }

    fn cmd_bind_descriptor_sets(
        &self,
        cmd: CommandBufferHandle,
        bind_point: PipelineBindPoint,
        _layout: PipelineLayoutHandle,
        first_set: u32,
        sets: &[DescriptorSetHandle],
    ) {
        self.state().commands.push(format!(
            "bind_sets {} {:?} first={} count={}",
            cmd.as_raw(),
            bind_point,
            first_set,
            sets.len()
        ));
    }

    fn cmd_push_constants(
        &self,
        cmd: CommandBufferHandle,
        _layout: PipelineLayoutHandle,
        _stages: ShaderStages,
        offset: u32,
        data: &[u8],
    ) {
        self.state()
            .commands
            .push(format!("push_constants {} offset={} size={}", cmd.as_raw(), offset, data.len()));
    }

    fn cmd_set_viewport(&self, cmd: CommandBufferHandle, viewport: &Viewport) {
        self.state()
            .commands
            .push(format!("viewport {} {}x{}", cmd.as_raw(), viewport.width, viewport.height));
    }

    fn cmd_set_scissor(&self, cmd: CommandBufferHandle, scissor: &Rect2D) {
        self.state()
            .commands
            .push(format!("scissor {} {}x{}", cmd.as_raw(), scissor.width, scissor.height));
    }

    fn cmd_bind_vertex_buffers(&self, cmd: CommandBufferHandle, first_binding: u32, buffers: &[(BufferHandle, u64)]) {
        self.state().commands.push(format!(
            "bind_vertex_buffers {} first={} count={}",
            cmd.as_raw(),
            first_binding,
            buffers.len()
        ));
    }

    fn cmd_bind_index_buffer(&self, cmd: CommandBufferHandle, buffer: BufferHandle, offset: u64, index_type: IndexType) {
        self.state().commands.push(format!(
            "bind_index_buffer {} {} offset={} {:?}",
            cmd.as_raw(),
            buffer.as_raw(),
            offset,
            index_type
        ));
    }

    fn cmd_draw(&self, cmd: CommandBufferHandle, vertex_count: u32, instance_count: u32, _first_vertex: u32, _first_instance: u32) {
        self.state()
            .commands
            .push(format!("draw {} {}x{}", cmd.as_raw(), vertex_count, instance_count));
    }

    fn cmd_draw_indexed(
        &self,
        cmd: CommandBufferHandle,
        index_count: u32,
        instance_count: u32,
        _first_index: u32,
        _vertex_offset: i32,
        _first_instance: u32,
    ) {
        self.state()
            .commands
            .push(format!("draw_indexed {} {}x{}", cmd.as_raw(), index_count, instance_count));
    }

    fn cmd_dispatch(&self, cmd: CommandBufferHandle, x: u32, y: u32, z: u32) {
        self.state().commands.push(format!("dispatch {} {}x{}x{}", cmd.as_raw(), x, y, z));
    }

    fn cmd_copy_buffer(&self, cmd: CommandBufferHandle, src: BufferHandle, dst: BufferHandle, regions: &[BufferCopy]) {
        let mut state = self.state();
        // Copies execute at record time so tests can observe uploaded bytes.
        for region in regions {
            let bytes = state.buffers.get(&src).map(|b| {
                b.data[region.src_offset as usize..(region.src_offset + region.size) as usize].to_vec()
            });
            if let (Some(bytes), Some(target)) = (bytes, state.buffers.get_mut(&dst)) {
                let start = region.dst_offset as usize;
                target.data[start..start + bytes.len()].copy_from_slice(&bytes);
            }
        }
        state.commands.push(format!(
            "copy_buffer {} {}->{} regions={}",
            cmd.as_raw(),
            src.as_raw(),
            dst.as_raw(),
            regions.len()
        ));
    }

    fn cmd_copy_buffer_to_image(
        &self,
        cmd: CommandBufferHandle,
        src: BufferHandle,
        dst: ImageHandle,
        dst_layout: ImageLayout,
        regions: &[BufferImageCopy],
    ) {
        self.state().commands.push(format!(
            "copy_buffer_to_image {} {}->{} {:?} regions={}",
            cmd.as_raw(),
            src.as_raw(),
            dst.as_raw(),
            dst_layout,
            regions.len()
        ));
    }

    fn create_swapchain(&self, info: &SwapchainInfo) -> Result<SwapchainImages> {
        let mut state = self.state();
        if !state.has_surface {
            return Err(Error::InitializationFailed("no presentation surface".to_string()));
        }
        let handle = state.next(SwapchainHandle::from_raw);
        let images: Vec<_> = (0..3).map(|_| state.next(ImageHandle::from_raw)).collect();
        state.swapchain = Some(MockSwapchain {
            handle,
            images: images.clone(),
            next_index: 0,
            width: info.width,
            height: info.height,
        });
        state.swapchains_created += 1;
        Ok(SwapchainImages {
            handle,
            format: Format::B8G8R8A8_SRGB,
            width: info.width,
            height: info.height,
            images,
        })
    }

    fn destroy_swapchain(&self, swapchain: SwapchainHandle) {
        let mut state = self.state();
        if state.swapchain.as_ref().is_some_and(|s| s.handle == swapchain) {
            state.swapchain = None;
        }
    }

    fn acquire_next_image(&self, swapchain: SwapchainHandle, _signal: SemaphoreHandle) -> Result<AcquireResult> {
        let mut state = self.state();
        if let Some(scripted) = state.acquire_script.pop_front() {
            return Ok(scripted);
        }
        let chain = state
            .swapchain
            .as_mut()
            .filter(|s| s.handle == swapchain)
            .ok_or_else(|| Error::InvalidResource("acquire on a retired swapchain".to_string()))?;
        let index = chain.next_index;
        chain.next_index = (chain.next_index + 1) % chain.images.len() as u32;
        Ok(AcquireResult::Acquired { index, suboptimal: false })
    }

    fn present(
        &self,
        _queue: QueueHandle,
        _swapchain: SwapchainHandle,
        _image_index: u32,
        _wait: &[SemaphoreHandle],
    ) -> Result<PresentResult> {
        let mut state = self.state();
        state.presents += 1;
        Ok(state.present_script.pop_front().unwrap_or(PresentResult::Presented))
    }
}

// ============================================================================
// Mock Platform
// ============================================================================

/// Window of adjustable size
#[cfg(test)]
pub struct MockPlatform {
    size: Mutex<(u32, u32)>,
}

#[cfg(test)]
impl MockPlatform {
    pub fn new(width: u32, height: u32) -> Self {
        Self { size: Mutex::new((width, height)) }
    }

    pub fn resize(&self, width: u32, height: u32) {
        *self.size.lock().unwrap() = (width, height);
    }
}

#[cfg(test)]
impl crate::swapchain::Platform for MockPlatform {
    fn window_size(&self) -> (u32, u32) {
        *self.size.lock().unwrap()
    }
}
