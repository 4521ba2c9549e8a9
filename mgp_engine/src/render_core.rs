/// RenderCore - the engine context
///
/// Owns every engine component and hands them out explicitly. There is no
/// global state besides the logger: code that needs the arena, the caches or
/// the queue receives the `RenderCore` (or the single component) as an
/// argument.
///
/// Components are declared in teardown order; `Drop` waits for the GPU
/// first and releases the swapchain images while the arena is still alive.

use std::sync::Arc;
use crate::bindless::BindlessRegistry;
use crate::config::Config;
use crate::descriptor::{DescriptorLayoutCache, DescriptorPoolDynamic, DescriptorPoolStatic, PoolSizeRatio};
use crate::device::{
    BufferInfo, BufferUsage, DescriptorPoolInfo, DescriptorPoolSize, DescriptorSetLayoutHandle, Device, ImageInfo,
    ImageUsage, SamplerInfo,
};
use crate::error::{Error, Result};
use crate::pipeline::{PipelineCache, ShaderProgram, ShaderStageReflection};
use crate::render_graph::{GraphContext, RecordSummary, RenderGraph};
use crate::resource::{BufferId, DeletionQueue, ImageId, ImageViewId, ResourceArena, SamplerId, ViewRange};
use crate::swapchain::{Platform, Swapchain};
use crate::sync::{CommandBuffer, InstantSubmitSync, Queue, TransferQueue, UploadTicket};
use crate::{engine_debug, engine_err, engine_info, engine_trace, engine_warn};

pub struct RenderCore {
    pub(crate) transfer: TransferQueue,
    pub(crate) swapchain: Option<Swapchain>,
    /// One dynamic pool per frame slot, cleared when the slot comes around
    pub(crate) frame_pools: Vec<DescriptorPoolDynamic>,
    pub(crate) static_pool: DescriptorPoolStatic,
    pub(crate) pipelines: PipelineCache,
    pub(crate) arena: ResourceArena,
    pub(crate) bindless: BindlessRegistry,
    pub(crate) layouts: DescriptorLayoutCache,
    pub(crate) deletion: DeletionQueue,
    pub(crate) queue: Queue,
    pub(crate) platform: Option<Arc<dyn Platform>>,
    pub(crate) device: Arc<dyn Device>,
    config: Config,
    frame_number: u64,
}

impl RenderCore {
    /// Build every component on top of `device`
    ///
    /// Without a `platform` the core runs headless: no swapchain is
    /// created and frames are submitted without presenting.
    pub fn new(device: Arc<dyn Device>, platform: Option<Arc<dyn Platform>>, config: Config) -> Result<Self> {
        let queue = Queue::new(device.clone(), config.frames_in_flight)?;
        let deletion = DeletionQueue::new(device.clone(), config.frames_in_flight);
        let mut layouts = DescriptorLayoutCache::new(device.clone());
        let mut bindless = BindlessRegistry::new(device.clone(), &mut layouts, config.bindless_capacity)?;
        let mut arena = ResourceArena::new(device.clone());
        let pipelines = PipelineCache::new(device.clone(), config.pipeline_cache_capacity);

        let static_sets = config.initial_sets_per_pool.max(1);
        let static_pool = DescriptorPoolStatic::new(
            device.clone(),
            &DescriptorPoolInfo {
                max_sets: static_sets,
                sizes: PoolSizeRatio::defaults()
                    .into_iter()
                    .map(|r| DescriptorPoolSize {
                        descriptor_type: r.descriptor_type,
                        count: ((r.ratio * static_sets as f32).ceil() as u32).max(1),
                    })
                    .collect(),
                update_after_bind: false,
            },
        )?;
        let frame_pools = (0..config.frames_in_flight)
            .map(|_| {
                DescriptorPoolDynamic::new(
                    device.clone(),
                    config.initial_sets_per_pool,
                    config.max_sets_per_pool,
                    PoolSizeRatio::defaults(),
                )
            })
            .collect();

        let swapchain = match &platform {
            Some(platform) => {
                let (width, height) = platform.window_size();
                Some(Swapchain::new(device.clone(), &mut arena, &mut bindless, width, height, &config)?)
            }
            None => {
                engine_info!("mgp::RenderCore", "No platform given, running headless");
                None
            }
        };
        let transfer = TransferQueue::new(device.clone(), config.staging_ring_size)?;

        engine_info!(
            "mgp::RenderCore",
            "Render core ready ({} frames in flight, {} bindless slots per class)",
            config.frames_in_flight,
            config.bindless_capacity
        );
        Ok(Self {
            transfer,
            swapchain,
            frame_pools,
            static_pool,
            pipelines,
            arena,
            bindless,
            layouts,
            deletion,
            queue,
            platform,
            device,
            config,
            frame_number: 0,
        })
    }

    // ===== ACCESSORS =====

    pub fn device(&self) -> &Arc<dyn Device> {
        &self.device
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Frames started since creation
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn arena(&self) -> &ResourceArena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut ResourceArena {
        &mut self.arena
    }

    pub fn bindless(&self) -> &BindlessRegistry {
        &self.bindless
    }

    pub fn layouts_mut(&mut self) -> &mut DescriptorLayoutCache {
        &mut self.layouts
    }

    pub fn pipelines(&self) -> &PipelineCache {
        &self.pipelines
    }

    pub fn pipelines_mut(&mut self) -> &mut PipelineCache {
        &mut self.pipelines
    }

    pub fn static_pool_mut(&mut self) -> &mut DescriptorPoolStatic {
        &mut self.static_pool
    }

    /// Dynamic descriptor pool of the current frame slot
    pub fn frame_pool_mut(&mut self) -> &mut DescriptorPoolDynamic {
        &mut self.frame_pools[self.queue.current_index()]
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn transfer(&self) -> &TransferQueue {
        &self.transfer
    }

    pub fn transfer_mut(&mut self) -> &mut TransferQueue {
        &mut self.transfer
    }

    pub fn swapchain(&self) -> Option<&Swapchain> {
        self.swapchain.as_ref()
    }

    pub fn deletion_queue(&self) -> &DeletionQueue {
        &self.deletion
    }

    pub fn platform(&self) -> Option<&Arc<dyn Platform>> {
        self.platform.as_ref()
    }

    // ===== RESOURCES =====

    pub fn create_image(&mut self, info: ImageInfo, name: &str) -> Result<ImageId> {
        self.arena.create_image(info, name)
    }

    /// Get or create a view of `range`, registering sampled views as bindless
    pub fn create_view(&mut self, image: ImageId, range: ViewRange) -> Result<ImageViewId> {
        self.arena.create_view(image, range, &mut self.bindless)
    }

    pub fn standard_view(&mut self, image: ImageId) -> Result<ImageViewId> {
        self.arena.standard_view(image, &mut self.bindless)
    }

    /// Release an image and its views once the frames using them retire
    pub fn destroy_image(&mut self, image: ImageId) -> Result<()> {
        let doomed = self.arena.release_image(image, &mut self.bindless)?;
        self.deletion.extend(doomed);
        Ok(())
    }

    pub fn create_buffer(&mut self, info: BufferInfo, register_bindless: bool) -> Result<BufferId> {
        self.arena.create_buffer(info, register_bindless, &mut self.bindless)
    }

    pub fn destroy_buffer(&mut self, buffer: BufferId) -> Result<()> {
        let doomed = self.arena.release_buffer(buffer, &mut self.bindless)?;
        self.deletion.push(doomed);
        Ok(())
    }

    pub fn create_sampler(&mut self, info: SamplerInfo) -> Result<SamplerId> {
        self.arena.create_sampler(info, &mut self.bindless)
    }

    /// Queue a copy of `data` into a device-local buffer
    pub fn upload_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) -> Result<UploadTicket> {
        let target = self.arena.buffer(buffer)?;
        if !target.usage().contains(BufferUsage::TRANSFER_DST) {
            return Err(Error::InvalidResource(format!(
                "buffer '{}' lacks TRANSFER_DST usage",
                target.name()
            )));
        }
        target.check_range(offset, data.len() as u64)?;
        let handle = target.handle();
        self.transfer.upload_buffer(handle, offset, data)
    }

    /// Queue an upload of mip 0 of every layer of `image`
    pub fn upload_image(&mut self, image: ImageId, data: &[u8]) -> Result<UploadTicket> {
        let image = self.arena.image_mut(image)?;
        if !image.info().usage.contains(ImageUsage::TRANSFER_DST) {
            return Err(Error::InvalidResource(format!(
                "image '{}' lacks TRANSFER_DST usage",
                image.name()
            )));
        }
        self.transfer.upload_image(image, data)
    }

    // ===== SHADERS =====

    /// Create the modules of a program and reflect its pipeline interface
    ///
    /// # Arguments
    ///
    /// * `stages` - SPIR-V words and reflection of each stage
    /// * `overrides` - Descriptor set layouts to use instead of reflected ones
    pub fn create_program(
        &mut self,
        stages: Vec<(&[u32], ShaderStageReflection)>,
        overrides: &[(u32, DescriptorSetLayoutHandle)],
    ) -> Result<ShaderProgram> {
        let mut modules = Vec::with_capacity(stages.len());
        for (code, reflection) in stages {
            match self.device.create_shader_module(code) {
                Ok(module) => modules.push((module, reflection)),
                Err(e) => {
                    for (module, _) in modules {
                        self.device.destroy_shader_module(module);
                    }
                    return Err(e);
                }
            }
        }
        let handles: Vec<_> = modules.iter().map(|(module, _)| *module).collect();
        ShaderProgram::new(modules, &mut self.layouts, overrides).inspect_err(|_| {
            for module in &handles {
                self.device.destroy_shader_module(*module);
            }
        })
    }

    /// Drop a program's pipelines and modules once the frames using them retire
    pub fn release_program(&mut self, program: ShaderProgram) {
        self.pipelines.release_program(program);
        self.deletion.extend(self.pipelines.take_retired());
    }

    // ===== FRAME =====

    /// Record `graph` into `cmd` with the current slot's descriptor pool
    pub fn record_graph(&mut self, graph: &mut RenderGraph<'_>, cmd: &mut CommandBuffer) -> Result<RecordSummary> {
        let slot = self.queue.current_index();
        let mut ctx = GraphContext {
            arena: &mut self.arena,
            pipelines: &mut self.pipelines,
            layouts: &mut self.layouts,
            bindless: &self.bindless,
            descriptors: &mut self.frame_pools[slot],
        };
        graph.record(cmd, &mut ctx)
    }

    /// Finish the frame: move to the next slot and flush what has retired
    ///
    /// Call after [`InFlightSync::present`](crate::sync::InFlightSync::present).
    pub fn next_frame(&mut self) -> Result<()> {
        self.deletion.extend(self.pipelines.take_retired());
        self.frame_number += 1;
        let slot = self.queue.advance();
        self.deletion.set_frame(self.frame_number);
        self.transfer.poll()?;

        // The slot's previous frame is the oldest one that can still use
        // retired objects; if it is done, nothing queued can be in use.
        if self.device.fence_signaled(self.queue.current_frame().in_flight_fence())? {
            self.deletion.collect();
        }
        engine_trace!("mgp::RenderCore", "Frame {} on slot {}", self.frame_number, slot);
        Ok(())
    }

    /// Block on a one-off submission recorded by `record`
    pub fn instant_submit<F>(&mut self, record: F) -> Result<()>
    where
        F: FnOnce(&mut CommandBuffer) -> Result<()>,
    {
        InstantSubmitSync::run(&mut self.queue, record)
    }

    /// Recreate the swapchain at `width` x `height`
    ///
    /// # Returns
    ///
    /// `false` if there is no swapchain or the size has no area.
    pub fn rebuild_swapchain(&mut self, width: u32, height: u32) -> Result<bool> {
        match self.swapchain.as_mut() {
            Some(swapchain) => swapchain.rebuild(width, height, &mut self.arena, &mut self.bindless),
            None => Ok(false),
        }
    }

    /// Size the swapchain should have: the window size, or the current extent without a platform
    pub(crate) fn target_extent(&self) -> Option<(u32, u32)> {
        match (&self.platform, &self.swapchain) {
            (Some(platform), _) => Some(platform.window_size()),
            (None, Some(swapchain)) => Some(swapchain.extent()),
            (None, None) => None,
        }
    }

    /// Drain all GPU work and destroy everything queued for deletion
    pub fn wait_idle(&mut self) -> Result<()> {
        self.device.wait_idle()?;
        self.transfer.poll()?;
        self.deletion.extend(self.pipelines.take_retired());
        self.deletion.flush_all();
        Ok(())
    }

    /// Write the driver pipeline cache to `pipeline_cache_path`
    ///
    /// # Returns
    ///
    /// `false` if no path is configured.
    pub fn save_pipeline_cache(&self) -> Result<bool> {
        let Some(path) = &self.config.pipeline_cache_path else {
            return Ok(false);
        };
        let data = self.device.pipeline_cache_data()?;
        std::fs::write(path, &data)
            .map_err(|e| engine_err!("mgp::RenderCore", "Failed to write pipeline cache {}: {}", path.display(), e))?;
        engine_debug!("mgp::RenderCore", "Saved {} byte pipeline cache to {}", data.len(), path.display());
        Ok(true)
    }
}

impl Drop for RenderCore {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            engine_warn!("mgp::RenderCore", "wait_idle failed during teardown: {}", e);
        }
        if let Some(swapchain) = self.swapchain.take() {
            swapchain.destroy(&mut self.arena, &mut self.bindless);
        }
        self.deletion.extend(self.pipelines.take_retired());
        self.deletion.flush_all();
        for pool in &mut self.frame_pools {
            pool.destroy();
        }
        engine_debug!("mgp::RenderCore", "Render core destroyed after {} frames", self.frame_number);
    }
}

impl std::fmt::Debug for RenderCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderCore")
            .field("frame_number", &self.frame_number)
            .field("slot", &self.queue.current_index())
            .field("headless", &self.swapchain.is_none())
            .finish()
    }
}

#[cfg(test)]
#[path = "render_core_tests.rs"]
mod tests;
