/// Pipeline cache
///
/// Deduplicates pipeline and pipeline layout creation. The map keys are the
/// complete creation descriptions (`GraphicsPipelineInfo`,
/// `ComputePipelineInfo`, `PipelineLayoutInfo`), so a lookup only hits when
/// the full state is equal; the 64-bit digest that shows up in logs is for
/// diagnostics only.
///
/// Graphics pipelines are bounded by an LRU. An evicted pipeline may still
/// be referenced by in-flight frames, so it is handed out through
/// [`take_retired`](PipelineCache::take_retired) for the deletion queue
/// instead of being destroyed. Pipeline layouts are never evicted.

use std::hash::{Hash, Hasher};
use std::sync::Arc;
use rustc_hash::{FxHashMap, FxHasher};
use crate::device::{
    ComputePipelineInfo, Device, GraphicsPipelineInfo, MultisampleState, PipelineBindPoint, PipelineHandle,
    PipelineLayoutHandle, PipelineLayoutInfo,
};
use crate::error::{Error, Result};
use crate::pipeline::{PipelineDefinition, RenderInfo, ShaderProgram};
use crate::resource::DeferredDestroy;
use crate::utils::LruCache;
use crate::{engine_debug, engine_error, engine_trace};

/// Everything needed to bind a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineBinding {
    pub pipeline: PipelineHandle,
    pub layout: PipelineLayoutHandle,
    pub bind_point: PipelineBindPoint,
}

/// Pipeline cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Digest of a cache key, for logs
fn digest<T: Hash>(key: &T) -> u64 {
    let mut hasher = FxHasher::default();
    key.hash(&mut hasher);
    hasher.finish()
}

pub struct PipelineCache {
    device: Arc<dyn Device>,
    graphics: LruCache<GraphicsPipelineInfo, PipelineHandle>,
    compute: FxHashMap<ComputePipelineInfo, PipelineHandle>,
    layouts: FxHashMap<PipelineLayoutInfo, PipelineLayoutHandle>,
    stats: CacheStats,
    retired: Vec<DeferredDestroy>,
}

impl PipelineCache {
    /// # Arguments
    ///
    /// * `capacity` - Graphics pipelines kept before LRU eviction (0 = unbounded)
    pub fn new(device: Arc<dyn Device>, capacity: usize) -> Self {
        Self {
            device,
            graphics: LruCache::new(capacity),
            compute: FxHashMap::default(),
            layouts: FxHashMap::default(),
            stats: CacheStats::default(),
            retired: Vec::new(),
        }
    }

    /// Get or create the layout for a program's sets and push constants
    pub fn fetch_pipeline_layout(&mut self, shader: &ShaderProgram) -> Result<PipelineLayoutHandle> {
        let key = PipelineLayoutInfo {
            set_layouts: shader.set_layouts().to_vec(),
            push_constant_size: shader.push_constant_size(),
            push_constant_stages: shader.push_constant_stages(),
        };
        if let Some(layout) = self.layouts.get(&key) {
            return Ok(*layout);
        }

        let layout = self.device.create_pipeline_layout(&key).map_err(|e| {
            engine_error!("mgp::PipelineCache", "Pipeline layout creation failed: {}", e);
            e
        })?;
        engine_trace!(
            "mgp::PipelineCache",
            "Created pipeline layout {:016x} ({} sets)",
            digest(&key),
            key.set_layouts.len()
        );
        self.layouts.insert(key, layout);
        Ok(layout)
    }

    /// Get or create the graphics pipeline for a material drawn into a target
    ///
    /// # Errors
    ///
    /// Fails if `shader` is a compute program or the backend cannot build the
    /// pipeline. There is no fallback pipeline.
    pub fn fetch_graphics_pipeline(
        &mut self,
        shader: &ShaderProgram,
        definition: &PipelineDefinition,
        render_info: &RenderInfo,
    ) -> Result<PipelineBinding> {
        if shader.is_compute() {
            return Err(Error::InvalidResource("compute program used for a graphics pipeline".to_string()));
        }
        let layout = self.fetch_pipeline_layout(shader)?;
        let key = GraphicsPipelineInfo {
            layout,
            stages: shader.stages().to_vec(),
            vertex_layout: definition.vertex_layout.clone(),
            topology: definition.topology,
            rasterization: definition.rasterization,
            depth_stencil: definition.depth_stencil,
            color_blend: definition.blend_states(render_info.color_formats.len()),
            multisample: MultisampleState {
                sample_count: render_info.samples,
                alpha_to_coverage: definition.alpha_to_coverage,
            },
            color_formats: render_info.color_formats.clone(),
            depth_format: render_info.depth_format,
            stencil_format: render_info.stencil_format(),
        };

        if let Some(pipeline) = self.graphics.get(&key) {
            self.stats.hits += 1;
            return Ok(PipelineBinding { pipeline: *pipeline, layout, bind_point: PipelineBindPoint::Graphics });
        }

        let pipeline = self.device.create_graphics_pipeline(&key).map_err(|e| {
            engine_error!("mgp::PipelineCache", "Graphics pipeline {:016x} creation failed: {}", digest(&key), e);
            e
        })?;
        self.stats.misses += 1;
        engine_debug!(
            "mgp::PipelineCache",
            "Created graphics pipeline {:016x} ({} colour targets, {:?})",
            digest(&key),
            key.color_formats.len(),
            key.multisample.sample_count
        );

        if let Some((evicted_key, evicted)) = self.graphics.insert(key, pipeline) {
            self.stats.evictions += 1;
            self.retired.push(DeferredDestroy::Pipeline(evicted));
            engine_trace!("mgp::PipelineCache", "Evicted graphics pipeline {:016x}", digest(&evicted_key));
        }
        Ok(PipelineBinding { pipeline, layout, bind_point: PipelineBindPoint::Graphics })
    }

    /// Get or create the compute pipeline of a single-stage compute program
    pub fn fetch_compute_pipeline(&mut self, shader: &ShaderProgram) -> Result<PipelineBinding> {
        if !shader.is_compute() {
            return Err(Error::InvalidResource("graphics program used for a compute pipeline".to_string()));
        }
        let layout = self.fetch_pipeline_layout(shader)?;
        let key = ComputePipelineInfo { layout, stage: shader.stages()[0].clone() };

        if let Some(pipeline) = self.compute.get(&key) {
            self.stats.hits += 1;
            return Ok(PipelineBinding { pipeline: *pipeline, layout, bind_point: PipelineBindPoint::Compute });
        }

        let pipeline = self.device.create_compute_pipeline(&key).map_err(|e| {
            engine_error!("mgp::PipelineCache", "Compute pipeline {:016x} creation failed: {}", digest(&key), e);
            e
        })?;
        self.stats.misses += 1;
        engine_debug!("mgp::PipelineCache", "Created compute pipeline {:016x}", digest(&key));
        self.compute.insert(key, pipeline);
        Ok(PipelineBinding { pipeline, layout, bind_point: PipelineBindPoint::Compute })
    }

    /// Retire a program together with every pipeline built from it
    ///
    /// Module handles may be reused by the backend once destroyed, so the
    /// program's pipelines must leave the cache before its modules go.
    /// Everything is queued in [`take_retired`](Self::take_retired).
    pub fn release_program(&mut self, program: ShaderProgram) {
        let uses = |stages: &[crate::device::ShaderStageModule]| stages.iter().any(|s| program.uses_module(s.module));

        let graphics = self.graphics.extract_if(|key, _| !uses(key.stages.as_slice()));
        let compute: Vec<ComputePipelineInfo> = self
            .compute
            .keys()
            .filter(|key| uses(std::slice::from_ref(&key.stage)))
            .cloned()
            .collect();

        let mut released = graphics.len();
        for (_, pipeline) in graphics {
            self.retired.push(DeferredDestroy::Pipeline(pipeline));
        }
        for key in compute {
            if let Some(pipeline) = self.compute.remove(&key) {
                self.retired.push(DeferredDestroy::Pipeline(pipeline));
                released += 1;
            }
        }
        for stage in program.stages() {
            self.retired.push(DeferredDestroy::ShaderModule(stage.module));
        }
        engine_debug!("mgp::PipelineCache", "Released program with {} pipelines", released);
    }

    /// Objects evicted or released since the last call
    pub fn take_retired(&mut self) -> Vec<DeferredDestroy> {
        std::mem::take(&mut self.retired)
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Number of cached graphics pipelines
    pub fn graphics_len(&self) -> usize {
        self.graphics.len()
    }

    pub fn compute_len(&self) -> usize {
        self.compute.len()
    }

    pub fn layout_len(&self) -> usize {
        self.layouts.len()
    }
}

impl Drop for PipelineCache {
    fn drop(&mut self) {
        for object in self.retired.drain(..) {
            object.destroy(self.device.as_ref());
        }
        for (_, pipeline) in self.graphics.drain() {
            self.device.destroy_pipeline(pipeline);
        }
        for (_, pipeline) in self.compute.drain() {
            self.device.destroy_pipeline(pipeline);
        }
        for (_, layout) in self.layouts.drain() {
            self.device.destroy_pipeline_layout(layout);
        }
    }
}

#[cfg(test)]
#[path = "pipeline_cache_tests.rs"]
mod tests;
