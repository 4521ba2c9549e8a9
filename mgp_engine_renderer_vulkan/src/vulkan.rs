/// VulkanDevice - Vulkan 1.3 implementation of the `Device` trait
///
/// Core handles are the raw `vk::Handle` values of the objects they stand
/// for, so most calls are a direct translation. Buffers and images carry a
/// gpu-allocator allocation, tracked here by raw handle until destroyed.

use ash::vk;
use ash::vk::Handle;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use mgp_engine::mgp::render::*;
use mgp_engine::mgp::{Config, Error, Result, ValidationStats};
use mgp_engine::{engine_bail, engine_debug, engine_err, engine_error, engine_info, engine_trace, engine_warn};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use rustc_hash::FxHashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::vulkan_command_list::{record_barriers, record_begin_rendering, record_copy_buffer_to_image};
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::*;
use crate::{vulkan_pipeline, vulkan_swapchain};

/// A buffer and the memory bound to it
struct BufferRecord {
    allocation: Allocation,
    size: u64,
    usage: BufferUsage,
}

/// Allocations of the objects this device created
#[derive(Default)]
struct Resources {
    buffers: FxHashMap<u64, BufferRecord>,
    images: FxHashMap<u64, Allocation>,
}

/// Vulkan device implementation
pub struct VulkanDevice {
    context: GpuContext,
    /// Driver pipeline cache, seeded from `Config::pipeline_cache_path`
    pipeline_cache: vk::PipelineCache,
    resources: Mutex<Resources>,
}

fn vk_buffer(h: BufferHandle) -> vk::Buffer {
    vk::Buffer::from_raw(h.as_raw())
}

fn vk_image(h: ImageHandle) -> vk::Image {
    vk::Image::from_raw(h.as_raw())
}

fn vk_cmd(h: CommandBufferHandle) -> vk::CommandBuffer {
    vk::CommandBuffer::from_raw(h.as_raw())
}

fn vk_fence(h: FenceHandle) -> vk::Fence {
    vk::Fence::from_raw(h.as_raw())
}

fn vk_semaphore(h: SemaphoreHandle) -> vk::Semaphore {
    vk::Semaphore::from_raw(h.as_raw())
}

fn vk_pipeline_layout(h: PipelineLayoutHandle) -> vk::PipelineLayout {
    vk::PipelineLayout::from_raw(h.as_raw())
}

impl VulkanDevice {
    /// Create a device that presents to `window`
    ///
    /// # Arguments
    ///
    /// * `window` - Window whose surface the swapchain will target
    /// * `config` - Engine configuration (validation, pipeline cache path)
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(window: &W, config: &Config) -> Result<Self> {
        let display = window
            .display_handle()
            .map_err(|e| Error::InitializationFailed(format!("No display handle: {}", e)))?
            .as_raw();
        let window = window
            .window_handle()
            .map_err(|e| Error::InitializationFailed(format!("No window handle: {}", e)))?
            .as_raw();
        Self::with_context(GpuContext::new(Some((display, window)), config)?, config)
    }

    /// Create a device without a surface
    ///
    /// Everything but the swapchain calls works; those fail.
    pub fn headless(config: &Config) -> Result<Self> {
        Self::with_context(GpuContext::new(None, config)?, config)
    }

    fn with_context(context: GpuContext, config: &Config) -> Result<Self> {
        let pipeline_cache = unsafe { create_pipeline_cache(&context.device, config)? };
        engine_info!(
            "mgp::vulkan",
            "Vulkan device ready ({})",
            if context.surface.is_some() { "windowed" } else { "headless" }
        );
        Ok(Self {
            context,
            pipeline_cache,
            resources: Mutex::new(Resources::default()),
        })
    }

    /// Counters of validation messages received so far
    ///
    /// All zero when validation is off or the `vulkan-validation` feature is
    /// not compiled in.
    pub fn validation_stats(&self) -> ValidationStats {
        #[cfg(feature = "vulkan-validation")]
        if let Some(messenger) = &self.context.messenger {
            return messenger.state.stats();
        }
        ValidationStats::default()
    }

    /// Print the validation summary to stdout
    pub fn print_validation_report(&self) {
        #[cfg(feature = "vulkan-validation")]
        if let Some(messenger) = &self.context.messenger {
            messenger.state.print_report();
            return;
        }
        engine_info!("mgp::vulkan", "Validation is disabled, no report");
    }

    fn device(&self) -> &ash::Device {
        &self.context.device
    }

    fn resources(&self) -> MutexGuard<'_, Resources> {
        self.resources.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate memory matching `requirements`
    fn allocate(
        &self,
        name: &str,
        requirements: vk::MemoryRequirements,
        location: gpu_allocator::MemoryLocation,
        linear: bool,
    ) -> Result<Allocation> {
        self.context
            .allocator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location,
                linear,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| {
                let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                engine_error!("mgp::vulkan", "Out of GPU memory for '{}' ({:.2} MB): {}", name, size_mb, e);
                Error::OutOfMemory
            })
    }

    fn free(&self, allocation: Allocation) {
        if let Err(e) = self
            .context
            .allocator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .free(allocation)
        {
            engine_warn!("mgp::vulkan", "Failed to free allocation: {}", e);
        }
    }

    fn swapchain_parts(&self) -> Result<(&crate::vulkan_context::Surface, &ash::khr::swapchain::Device)> {
        match (&self.context.surface, &self.context.swapchain_loader) {
            (Some(surface), Some(loader)) => Ok((surface, loader)),
            _ => Err(engine_err!("mgp::vulkan", "Headless device has no surface to present to")),
        }
    }

    fn swapchain_loader(&self) -> Option<&ash::khr::swapchain::Device> {
        self.context.swapchain_loader.as_ref()
    }
}

/// Pipeline cache from the saved blob, or empty when there is none or the
/// driver rejects it
unsafe fn create_pipeline_cache(device: &ash::Device, config: &Config) -> Result<vk::PipelineCache> {
    let initial = match &config.pipeline_cache_path {
        Some(path) => match std::fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                engine_debug!("mgp::vulkan", "No pipeline cache at {}: {}", path.display(), e);
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    if !initial.is_empty() {
        let info = vk::PipelineCacheCreateInfo::default().initial_data(&initial);
        match device.create_pipeline_cache(&info, None) {
            Ok(cache) => {
                engine_debug!("mgp::vulkan", "Pipeline cache seeded with {} bytes", initial.len());
                return Ok(cache);
            }
            Err(e) => engine_warn!("mgp::vulkan", "Saved pipeline cache rejected ({:?}), starting empty", e),
        }
    }

    device
        .create_pipeline_cache(&vk::PipelineCacheCreateInfo::default(), None)
        .map_err(|e| engine_err!("mgp::vulkan", "Failed to create pipeline cache: {:?}", e))
}

/// Checked `offset..offset + len` inside a buffer of `size` bytes
fn buffer_range(offset: u64, len: usize, size: u64) -> Result<std::ops::Range<usize>> {
    let end = offset.checked_add(len as u64).filter(|&end| end <= size).ok_or_else(|| {
        Error::InvalidResource(format!("Range {}+{} outside buffer of {} bytes", offset, len, size))
    })?;
    Ok(offset as usize..end as usize)
}

impl Device for VulkanDevice {
    // ===== QUEUES =====

    fn graphics_queue(&self) -> QueueInfo {
        QueueInfo {
            handle: QueueHandle::from_raw(self.context.queue.as_raw()),
            family: self.context.queue_family,
        }
    }

    // ===== BUFFERS =====

    fn create_buffer(&self, desc: &BufferInfo) -> Result<BufferHandle> {
        unsafe {
            let create_info = vk::BufferCreateInfo::default()
                .size(desc.size)
                .usage(buffer_usage_to_vk(desc.usage))
                .sharing_mode(vk::SharingMode::EXCLUSIVE);
            let buffer = self
                .device()
                .create_buffer(&create_info, None)
                .map_err(|e| engine_err!("mgp::vulkan", "Failed to create buffer '{}' ({} bytes): {:?}", desc.name, desc.size, e))?;

            let requirements = self.device().get_buffer_memory_requirements(buffer);
            let allocation = match self.allocate(&desc.name, requirements, memory_location_to_allocator(desc.location), true) {
                Ok(allocation) => allocation,
                Err(e) => {
                    self.device().destroy_buffer(buffer, None);
                    return Err(e);
                }
            };

            if let Err(e) = self.device().bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) {
                self.device().destroy_buffer(buffer, None);
                self.free(allocation);
                engine_bail!("mgp::vulkan", "Failed to bind buffer memory for '{}': {:?}", desc.name, e);
            }

            engine_trace!("mgp::vulkan", "Buffer '{}' created ({} bytes)", desc.name, desc.size);
            self.resources().buffers.insert(
                buffer.as_raw(),
                BufferRecord {
                    allocation,
                    size: desc.size,
                    usage: desc.usage,
                },
            );
            Ok(BufferHandle::from_raw(buffer.as_raw()))
        }
    }

    fn destroy_buffer(&self, buffer: BufferHandle) {
        let record = self.resources().buffers.remove(&buffer.as_raw());
        unsafe { self.device().destroy_buffer(vk_buffer(buffer), None) };
        if let Some(record) = record {
            self.free(record.allocation);
        }
    }

    fn write_buffer(&self, buffer: BufferHandle, offset: u64, data: &[u8]) -> Result<()> {
        let mut resources = self.resources();
        let record = resources
            .buffers
            .get_mut(&buffer.as_raw())
            .ok_or_else(|| Error::InvalidResource(format!("Unknown buffer {:#x}", buffer.as_raw())))?;
        let range = buffer_range(offset, data.len(), record.size)?;
        let mapped = record
            .allocation
            .mapped_slice_mut()
            .ok_or_else(|| Error::InvalidResource("Buffer is not host-visible".to_string()))?;
        mapped[range].copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(&self, buffer: BufferHandle, offset: u64, out: &mut [u8]) -> Result<()> {
        let resources = self.resources();
        let record = resources
            .buffers
            .get(&buffer.as_raw())
            .ok_or_else(|| Error::InvalidResource(format!("Unknown buffer {:#x}", buffer.as_raw())))?;
        let range = buffer_range(offset, out.len(), record.size)?;
        let mapped = record
            .allocation
            .mapped_slice()
            .ok_or_else(|| Error::InvalidResource("Buffer is not host-visible".to_string()))?;
        out.copy_from_slice(&mapped[range]);
        Ok(())
    }

    fn buffer_device_address(&self, buffer: BufferHandle) -> Option<u64> {
        let usage = self.resources().buffers.get(&buffer.as_raw())?.usage;
        if !usage.contains(BufferUsage::DEVICE_ADDRESS) {
            return None;
        }
        let info = vk::BufferDeviceAddressInfo::default().buffer(vk_buffer(buffer));
        Some(unsafe { self.device().get_buffer_device_address(&info) })
    }

    // ===== IMAGES AND SAMPLERS =====

    fn create_image(&self, info: &ImageInfo, name: &str) -> Result<ImageHandle> {
        unsafe {
            let flags = if info.image_type == ImageType::Cube {
                vk::ImageCreateFlags::CUBE_COMPATIBLE
            } else {
                vk::ImageCreateFlags::empty()
            };
            let tiling = match info.tiling {
                ImageTiling::Optimal => vk::ImageTiling::OPTIMAL,
                ImageTiling::Linear => vk::ImageTiling::LINEAR,
            };
            let create_info = vk::ImageCreateInfo::default()
                .flags(flags)
                .image_type(image_type_to_vk(info.image_type))
                .format(format_to_vk(info.format))
                .extent(vk::Extent3D {
                    width: info.width,
                    height: info.height,
                    depth: info.depth.max(1),
                })
                .mip_levels(info.mip_levels)
                .array_layers(info.array_layers)
                .samples(sample_count_to_vk(info.samples))
                .tiling(tiling)
                .usage(image_usage_to_vk(info.usage, info.transient))
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);

            let image = self
                .device()
                .create_image(&create_info, None)
                .map_err(|e| engine_err!("mgp::vulkan", "Failed to create image '{}' ({}x{}): {:?}", name, info.width, info.height, e))?;

            let requirements = self.device().get_image_memory_requirements(image);
            let linear = info.tiling == ImageTiling::Linear;
            let allocation = match self.allocate(name, requirements, gpu_allocator::MemoryLocation::GpuOnly, linear) {
                Ok(allocation) => allocation,
                Err(e) => {
                    self.device().destroy_image(image, None);
                    return Err(e);
                }
            };

            if let Err(e) = self.device().bind_image_memory(image, allocation.memory(), allocation.offset()) {
                self.device().destroy_image(image, None);
                self.free(allocation);
                engine_bail!("mgp::vulkan", "Failed to bind image memory for '{}': {:?}", name, e);
            }

            engine_trace!("mgp::vulkan", "Image '{}' created ({}x{}x{}, {:?})", name, info.width, info.height, info.depth, info.format);
            self.resources().images.insert(image.as_raw(), allocation);
            Ok(ImageHandle::from_raw(image.as_raw()))
        }
    }

    fn destroy_image(&self, image: ImageHandle) {
        let allocation = self.resources().images.remove(&image.as_raw());
        unsafe { self.device().destroy_image(vk_image(image), None) };
        if let Some(allocation) = allocation {
            self.free(allocation);
        }
    }

    fn create_image_view(&self, desc: &ImageViewDesc) -> Result<ImageViewHandle> {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(vk_image(desc.image))
            .view_type(view_type_to_vk(desc.view_type))
            .format(format_to_vk(desc.format))
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect_to_vk(desc.aspect),
                base_mip_level: desc.base_mip,
                level_count: desc.mip_count,
                base_array_layer: desc.base_layer,
                layer_count: desc.layer_count,
            });
        let view = unsafe { self.device().create_image_view(&create_info, None) }
            .map_err(|e| engine_err!("mgp::vulkan", "Failed to create image view: {:?}", e))?;
        Ok(ImageViewHandle::from_raw(view.as_raw()))
    }

    fn destroy_image_view(&self, view: ImageViewHandle) {
        unsafe { self.device().destroy_image_view(vk::ImageView::from_raw(view.as_raw()), None) };
    }

    fn create_sampler(&self, info: &SamplerInfo) -> Result<SamplerHandle> {
        let mut create_info = vk::SamplerCreateInfo::default()
            .mag_filter(filter_to_vk(info.mag_filter))
            .min_filter(filter_to_vk(info.min_filter))
            .mipmap_mode(mipmap_mode_to_vk(info.mipmap_mode))
            .address_mode_u(address_mode_to_vk(info.address_u))
            .address_mode_v(address_mode_to_vk(info.address_v))
            .address_mode_w(address_mode_to_vk(info.address_w))
            .border_color(border_color_to_vk(info.border_color))
            .min_lod(0.0)
            .max_lod(info.max_lod.map_or(vk::LOD_CLAMP_NONE, |lod| lod as f32));
        if let Some(anisotropy) = info.max_anisotropy {
            create_info = create_info.anisotropy_enable(true).max_anisotropy(anisotropy as f32);
        }
        if let Some(op) = info.compare_op {
            create_info = create_info.compare_enable(true).compare_op(compare_op_to_vk(op));
        }
        let sampler = unsafe { self.device().create_sampler(&create_info, None) }
            .map_err(|e| engine_err!("mgp::vulkan", "Failed to create sampler: {:?}", e))?;
        Ok(SamplerHandle::from_raw(sampler.as_raw()))
    }

    fn destroy_sampler(&self, sampler: SamplerHandle) {
        unsafe { self.device().destroy_sampler(vk::Sampler::from_raw(sampler.as_raw()), None) };
    }

    // ===== DESCRIPTORS =====

    fn create_descriptor_set_layout(&self, info: &DescriptorSetLayoutInfo) -> Result<DescriptorSetLayoutHandle> {
        let bindings: Vec<vk::DescriptorSetLayoutBinding> = info
            .bindings
            .iter()
            .map(|b| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(b.binding)
                    .descriptor_type(descriptor_type_to_vk(b.descriptor_type))
                    .descriptor_count(b.count)
                    .stage_flags(shader_stages_to_vk(b.stages))
            })
            .collect();
        let binding_flags: Vec<vk::DescriptorBindingFlags> =
            info.bindings.iter().map(|b| binding_flags_to_vk(b.flags)).collect();
        let mut flags_info = vk::DescriptorSetLayoutBindingFlagsCreateInfo::default().binding_flags(&binding_flags);

        let layout_flags = if info.update_after_bind {
            vk::DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL
        } else {
            vk::DescriptorSetLayoutCreateFlags::empty()
        };
        let create_info = vk::DescriptorSetLayoutCreateInfo::default()
            .flags(layout_flags)
            .bindings(&bindings)
            .push_next(&mut flags_info);

        let layout = unsafe { self.device().create_descriptor_set_layout(&create_info, None) }
            .map_err(|e| engine_err!("mgp::vulkan", "Failed to create descriptor set layout: {:?}", e))?;
        Ok(DescriptorSetLayoutHandle::from_raw(layout.as_raw()))
    }

    fn destroy_descriptor_set_layout(&self, layout: DescriptorSetLayoutHandle) {
        unsafe {
            self.device()
                .destroy_descriptor_set_layout(vk::DescriptorSetLayout::from_raw(layout.as_raw()), None)
        };
    }

    fn create_descriptor_pool(&self, info: &DescriptorPoolInfo) -> Result<DescriptorPoolHandle> {
        let sizes: Vec<vk::DescriptorPoolSize> = info
            .sizes
            .iter()
            .filter(|s| s.count > 0)
            .map(|s| vk::DescriptorPoolSize {
                ty: descriptor_type_to_vk(s.descriptor_type),
                descriptor_count: s.count,
            })
            .collect();
        let flags = if info.update_after_bind {
            vk::DescriptorPoolCreateFlags::UPDATE_AFTER_BIND
        } else {
            vk::DescriptorPoolCreateFlags::empty()
        };
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .flags(flags)
            .max_sets(info.max_sets)
            .pool_sizes(&sizes);
        let pool = unsafe { self.device().create_descriptor_pool(&create_info, None) }
            .map_err(|e| engine_err!("mgp::vulkan", "Failed to create descriptor pool ({} sets): {:?}", info.max_sets, e))?;
        engine_trace!("mgp::vulkan", "Descriptor pool created ({} sets)", info.max_sets);
        Ok(DescriptorPoolHandle::from_raw(pool.as_raw()))
    }

    fn destroy_descriptor_pool(&self, pool: DescriptorPoolHandle) {
        unsafe {
            self.device()
                .destroy_descriptor_pool(vk::DescriptorPool::from_raw(pool.as_raw()), None)
        };
    }

    fn reset_descriptor_pool(&self, pool: DescriptorPoolHandle) -> Result<()> {
        unsafe {
            self.device().reset_descriptor_pool(
                vk::DescriptorPool::from_raw(pool.as_raw()),
                vk::DescriptorPoolResetFlags::empty(),
            )
        }
        .map_err(|e| engine_err!("mgp::vulkan", "Failed to reset descriptor pool: {:?}", e))
    }

    fn allocate_descriptor_sets(
        &self,
        pool: DescriptorPoolHandle,
        layouts: &[DescriptorSetLayoutHandle],
        variable_counts: Option<&[u32]>,
    ) -> std::result::Result<Vec<DescriptorSetHandle>, DescriptorAllocError> {
        let vk_layouts: Vec<vk::DescriptorSetLayout> = layouts
            .iter()
            .map(|l| vk::DescriptorSetLayout::from_raw(l.as_raw()))
            .collect();
        let mut variable_info = vk::DescriptorSetVariableDescriptorCountAllocateInfo::default()
            .descriptor_counts(variable_counts.unwrap_or(&[]));
        let mut allocate_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(vk::DescriptorPool::from_raw(pool.as_raw()))
            .set_layouts(&vk_layouts);
        if variable_counts.is_some() {
            allocate_info = allocate_info.push_next(&mut variable_info);
        }

        match unsafe { self.device().allocate_descriptor_sets(&allocate_info) } {
            Ok(sets) => Ok(sets.iter().map(|s| DescriptorSetHandle::from_raw(s.as_raw())).collect()),
            Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) => Err(DescriptorAllocError::OutOfPoolMemory),
            Err(vk::Result::ERROR_FRAGMENTED_POOL) => Err(DescriptorAllocError::FragmentedPool),
            Err(e) => Err(DescriptorAllocError::Device(engine_err!(
                "mgp::vulkan",
                "Failed to allocate {} descriptor sets: {:?}",
                layouts.len(),
                e
            ))),
        }
    }

    fn update_descriptor_sets(&self, writes: &[DescriptorWrite]) {
        if writes.is_empty() {
            return;
        }

        // Infos first: the writes borrow them
        let mut buffer_infos = Vec::new();
        let mut image_infos = Vec::new();
        for write in writes {
            match write.resource {
                DescriptorResource::Buffer { buffer, offset, range, .. } => {
                    buffer_infos.push(vk::DescriptorBufferInfo {
                        buffer: vk_buffer(buffer),
                        offset,
                        range,
                    });
                }
                DescriptorResource::Image { view, layout, .. } => {
                    image_infos.push(vk::DescriptorImageInfo {
                        sampler: vk::Sampler::null(),
                        image_view: vk::ImageView::from_raw(view.as_raw()),
                        image_layout: image_layout_to_vk(layout),
                    });
                }
                DescriptorResource::Sampler(sampler) => {
                    image_infos.push(vk::DescriptorImageInfo {
                        sampler: vk::Sampler::from_raw(sampler.as_raw()),
                        image_view: vk::ImageView::null(),
                        image_layout: vk::ImageLayout::UNDEFINED,
                    });
                }
                DescriptorResource::CombinedImageSampler { view, sampler, layout } => {
                    image_infos.push(vk::DescriptorImageInfo {
                        sampler: vk::Sampler::from_raw(sampler.as_raw()),
                        image_view: vk::ImageView::from_raw(view.as_raw()),
                        image_layout: image_layout_to_vk(layout),
                    });
                }
            }
        }

        let mut next_buffer = 0;
        let mut next_image = 0;
        let vk_writes: Vec<vk::WriteDescriptorSet> = writes
            .iter()
            .map(|write| {
                let base = vk::WriteDescriptorSet::default()
                    .dst_set(vk::DescriptorSet::from_raw(write.set.as_raw()))
                    .dst_binding(write.binding)
                    .dst_array_element(write.array_element)
                    .descriptor_type(descriptor_type_to_vk(write.resource.descriptor_type()));
                match write.resource {
                    DescriptorResource::Buffer { .. } => {
                        next_buffer += 1;
                        base.buffer_info(std::slice::from_ref(&buffer_infos[next_buffer - 1]))
                    }
                    _ => {
                        next_image += 1;
                        base.image_info(std::slice::from_ref(&image_infos[next_image - 1]))
                    }
                }
            })
            .collect();

        unsafe { self.device().update_descriptor_sets(&vk_writes, &[]) };
    }

    // ===== SHADERS AND PIPELINES =====

    fn create_shader_module(&self, code: &[u32]) -> Result<ShaderModuleHandle> {
        let create_info = vk::ShaderModuleCreateInfo::default().code(code);
        let module = unsafe { self.device().create_shader_module(&create_info, None) }
            .map_err(|e| engine_err!("mgp::vulkan", "Failed to create shader module ({} words): {:?}", code.len(), e))?;
        Ok(ShaderModuleHandle::from_raw(module.as_raw()))
    }

    fn destroy_shader_module(&self, module: ShaderModuleHandle) {
        unsafe {
            self.device()
                .destroy_shader_module(vk::ShaderModule::from_raw(module.as_raw()), None)
        };
    }

    fn create_pipeline_layout(&self, info: &PipelineLayoutInfo) -> Result<PipelineLayoutHandle> {
        let set_layouts: Vec<vk::DescriptorSetLayout> = info
            .set_layouts
            .iter()
            .map(|l| vk::DescriptorSetLayout::from_raw(l.as_raw()))
            .collect();
        let push_constant_ranges: Vec<vk::PushConstantRange> = if info.push_constant_size > 0 {
            vec![vk::PushConstantRange {
                stage_flags: shader_stages_to_vk(info.push_constant_stages),
                offset: 0,
                size: info.push_constant_size,
            }]
        } else {
            Vec::new()
        };
        let create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&set_layouts)
            .push_constant_ranges(&push_constant_ranges);
        let layout = unsafe { self.device().create_pipeline_layout(&create_info, None) }
            .map_err(|e| engine_err!("mgp::vulkan", "Failed to create pipeline layout: {:?}", e))?;
        Ok(PipelineLayoutHandle::from_raw(layout.as_raw()))
    }

    fn destroy_pipeline_layout(&self, layout: PipelineLayoutHandle) {
        unsafe { self.device().destroy_pipeline_layout(vk_pipeline_layout(layout), None) };
    }

    fn create_graphics_pipeline(&self, info: &GraphicsPipelineInfo) -> Result<PipelineHandle> {
        let pipeline = unsafe { vulkan_pipeline::create_graphics_pipeline(self.device(), self.pipeline_cache, info)? };
        engine_trace!("mgp::vulkan", "Graphics pipeline created ({} stages)", info.stages.len());
        Ok(PipelineHandle::from_raw(pipeline.as_raw()))
    }

    fn create_compute_pipeline(&self, info: &ComputePipelineInfo) -> Result<PipelineHandle> {
        let pipeline = unsafe { vulkan_pipeline::create_compute_pipeline(self.device(), self.pipeline_cache, info)? };
        engine_trace!("mgp::vulkan", "Compute pipeline created");
        Ok(PipelineHandle::from_raw(pipeline.as_raw()))
    }

    fn destroy_pipeline(&self, pipeline: PipelineHandle) {
        unsafe { self.device().destroy_pipeline(vk::Pipeline::from_raw(pipeline.as_raw()), None) };
    }

    fn pipeline_cache_data(&self) -> Result<Vec<u8>> {
        unsafe { self.device().get_pipeline_cache_data(self.pipeline_cache) }
            .map_err(|e| engine_err!("mgp::vulkan", "Failed to read pipeline cache data: {:?}", e))
    }

    // ===== COMMAND POOLS AND BUFFERS =====

    fn create_command_pool(&self, queue_family: u32) -> Result<CommandPoolHandle> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let pool = unsafe { self.device().create_command_pool(&create_info, None) }
            .map_err(|e| engine_err!("mgp::vulkan", "Failed to create command pool: {:?}", e))?;
        Ok(CommandPoolHandle::from_raw(pool.as_raw()))
    }

    fn destroy_command_pool(&self, pool: CommandPoolHandle) {
        unsafe {
            self.device()
                .destroy_command_pool(vk::CommandPool::from_raw(pool.as_raw()), None)
        };
    }

    fn reset_command_pool(&self, pool: CommandPoolHandle) -> Result<()> {
        unsafe {
            self.device().reset_command_pool(
                vk::CommandPool::from_raw(pool.as_raw()),
                vk::CommandPoolResetFlags::empty(),
            )
        }
        .map_err(|e| engine_err!("mgp::vulkan", "Failed to reset command pool: {:?}", e))
    }

    fn allocate_command_buffers(&self, pool: CommandPoolHandle, count: u32) -> Result<Vec<CommandBufferHandle>> {
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(vk::CommandPool::from_raw(pool.as_raw()))
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);
        let buffers = unsafe { self.device().allocate_command_buffers(&allocate_info) }
            .map_err(|e| engine_err!("mgp::vulkan", "Failed to allocate {} command buffers: {:?}", count, e))?;
        Ok(buffers.iter().map(|b| CommandBufferHandle::from_raw(b.as_raw())).collect())
    }

    fn begin_command_buffer(&self, cmd: CommandBufferHandle) -> Result<()> {
        let begin_info = vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { self.device().begin_command_buffer(vk_cmd(cmd), &begin_info) }
            .map_err(|e| engine_err!("mgp::vulkan", "Failed to begin command buffer: {:?}", e))
    }

    fn end_command_buffer(&self, cmd: CommandBufferHandle) -> Result<()> {
        unsafe { self.device().end_command_buffer(vk_cmd(cmd)) }
            .map_err(|e| engine_err!("mgp::vulkan", "Failed to end command buffer: {:?}", e))
    }

    // ===== SYNCHRONIZATION =====

    fn create_fence(&self, signaled: bool) -> Result<FenceHandle> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let fence = unsafe { self.device().create_fence(&vk::FenceCreateInfo::default().flags(flags), None) }
            .map_err(|e| engine_err!("mgp::vulkan", "Failed to create fence: {:?}", e))?;
        Ok(FenceHandle::from_raw(fence.as_raw()))
    }

    fn destroy_fence(&self, fence: FenceHandle) {
        unsafe { self.device().destroy_fence(vk_fence(fence), None) };
    }

    fn wait_for_fence(&self, fence: FenceHandle, timeout_ns: u64) -> Result<bool> {
        match unsafe { self.device().wait_for_fences(&[vk_fence(fence)], true, timeout_ns) } {
            Ok(()) => Ok(true),
            Err(vk::Result::TIMEOUT) => Ok(false),
            Err(e) => Err(engine_err!("mgp::vulkan", "Failed to wait for fence: {:?}", e)),
        }
    }

    fn reset_fence(&self, fence: FenceHandle) -> Result<()> {
        unsafe { self.device().reset_fences(&[vk_fence(fence)]) }
            .map_err(|e| engine_err!("mgp::vulkan", "Failed to reset fence: {:?}", e))
    }

    fn fence_signaled(&self, fence: FenceHandle) -> Result<bool> {
        unsafe { self.device().get_fence_status(vk_fence(fence)) }
            .map_err(|e| engine_err!("mgp::vulkan", "Failed to query fence: {:?}", e))
    }

    fn create_semaphore(&self) -> Result<SemaphoreHandle> {
        let semaphore = unsafe { self.device().create_semaphore(&vk::SemaphoreCreateInfo::default(), None) }
            .map_err(|e| engine_err!("mgp::vulkan", "Failed to create semaphore: {:?}", e))?;
        Ok(SemaphoreHandle::from_raw(semaphore.as_raw()))
    }

    fn destroy_semaphore(&self, semaphore: SemaphoreHandle) {
        unsafe { self.device().destroy_semaphore(vk_semaphore(semaphore), None) };
    }

    fn submit(&self, queue: QueueHandle, info: &SubmitInfo<'_>, fence: Option<FenceHandle>) -> Result<()> {
        let command_buffers: Vec<vk::CommandBuffer> = info.command_buffers.iter().map(|&c| vk_cmd(c)).collect();
        let wait_semaphores: Vec<vk::Semaphore> = info.wait_semaphores.iter().map(|&(s, _)| vk_semaphore(s)).collect();
        let wait_stages: Vec<vk::PipelineStageFlags> =
            info.wait_semaphores.iter().map(|&(_, stage)| pipeline_stage_to_vk(stage)).collect();
        let signal_semaphores: Vec<vk::Semaphore> = info.signal_semaphores.iter().map(|&s| vk_semaphore(s)).collect();

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device().queue_submit(
                vk::Queue::from_raw(queue.as_raw()),
                &[submit_info],
                fence.map(vk_fence).unwrap_or_else(vk::Fence::null),
            )
        }
        .map_err(|e| engine_err!("mgp::vulkan", "Failed to submit {} command buffers: {:?}", command_buffers.len(), e))
    }

    fn wait_idle(&self) -> Result<()> {
        unsafe { self.device().device_wait_idle() }
            .map_err(|e| engine_err!("mgp::vulkan", "Failed to wait idle: {:?}", e))
    }

    // ===== COMMAND RECORDING =====

    fn cmd_pipeline_barrier(&self, cmd: CommandBufferHandle, barriers: &[ImageBarrier]) {
        unsafe { record_barriers(self.device(), vk_cmd(cmd), barriers) };
    }

    fn cmd_begin_rendering(&self, cmd: CommandBufferHandle, info: &RenderingInfo) {
        unsafe { record_begin_rendering(self.device(), vk_cmd(cmd), info) };
    }

    fn cmd_end_rendering(&self, cmd: CommandBufferHandle) {
        unsafe { self.device().cmd_end_rendering(vk_cmd(cmd)) };
    }

    fn cmd_bind_pipeline(&self, cmd: CommandBufferHandle, bind_point: PipelineBindPoint, pipeline: PipelineHandle) {
        unsafe {
            self.device().cmd_bind_pipeline(
                vk_cmd(cmd),
                bind_point_to_vk(bind_point),
                vk::Pipeline::from_raw(pipeline.as_raw()),
            )
        };
    }

    fn cmd_bind_descriptor_sets(
        &self,
        cmd: CommandBufferHandle,
        bind_point: PipelineBindPoint,
        layout: PipelineLayoutHandle,
        first_set: u32,
        sets: &[DescriptorSetHandle],
    ) {
        let vk_sets: Vec<vk::DescriptorSet> = sets.iter().map(|s| vk::DescriptorSet::from_raw(s.as_raw())).collect();
        unsafe {
            self.device().cmd_bind_descriptor_sets(
                vk_cmd(cmd),
                bind_point_to_vk(bind_point),
                vk_pipeline_layout(layout),
                first_set,
                &vk_sets,
                &[],
            )
        };
    }

    fn cmd_push_constants(
        &self,
        cmd: CommandBufferHandle,
        layout: PipelineLayoutHandle,
        stages: ShaderStages,
        offset: u32,
        data: &[u8],
    ) {
        unsafe {
            self.device().cmd_push_constants(
                vk_cmd(cmd),
                vk_pipeline_layout(layout),
                shader_stages_to_vk(stages),
                offset,
                data,
            )
        };
    }

    fn cmd_set_viewport(&self, cmd: CommandBufferHandle, viewport: &Viewport) {
        let vk_viewport = vk::Viewport {
            x: viewport.x,
            y: viewport.y,
            width: viewport.width,
            height: viewport.height,
            min_depth: viewport.min_depth,
            max_depth: viewport.max_depth,
        };
        unsafe { self.device().cmd_set_viewport(vk_cmd(cmd), 0, &[vk_viewport]) };
    }

    fn cmd_set_scissor(&self, cmd: CommandBufferHandle, scissor: &Rect2D) {
        let vk_scissor = vk::Rect2D {
            offset: vk::Offset2D { x: scissor.x, y: scissor.y },
            extent: vk::Extent2D { width: scissor.width, height: scissor.height },
        };
        unsafe { self.device().cmd_set_scissor(vk_cmd(cmd), 0, &[vk_scissor]) };
    }

    fn cmd_bind_vertex_buffers(&self, cmd: CommandBufferHandle, first_binding: u32, buffers: &[(BufferHandle, u64)]) {
        let vk_buffers: Vec<vk::Buffer> = buffers.iter().map(|&(b, _)| vk_buffer(b)).collect();
        let offsets: Vec<u64> = buffers.iter().map(|&(_, offset)| offset).collect();
        unsafe {
            self.device()
                .cmd_bind_vertex_buffers(vk_cmd(cmd), first_binding, &vk_buffers, &offsets)
        };
    }

    fn cmd_bind_index_buffer(&self, cmd: CommandBufferHandle, buffer: BufferHandle, offset: u64, index_type: IndexType) {
        unsafe {
            self.device()
                .cmd_bind_index_buffer(vk_cmd(cmd), vk_buffer(buffer), offset, index_type_to_vk(index_type))
        };
    }

    fn cmd_draw(
        &self,
        cmd: CommandBufferHandle,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        unsafe {
            self.device()
                .cmd_draw(vk_cmd(cmd), vertex_count, instance_count, first_vertex, first_instance)
        };
    }

    fn cmd_draw_indexed(
        &self,
        cmd: CommandBufferHandle,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        unsafe {
            self.device().cmd_draw_indexed(
                vk_cmd(cmd),
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            )
        };
    }

    fn cmd_dispatch(&self, cmd: CommandBufferHandle, x: u32, y: u32, z: u32) {
        unsafe { self.device().cmd_dispatch(vk_cmd(cmd), x, y, z) };
    }

    fn cmd_copy_buffer(&self, cmd: CommandBufferHandle, src: BufferHandle, dst: BufferHandle, regions: &[BufferCopy]) {
        let vk_regions: Vec<vk::BufferCopy> = regions
            .iter()
            .map(|r| vk::BufferCopy {
                src_offset: r.src_offset,
                dst_offset: r.dst_offset,
                size: r.size,
            })
            .collect();
        unsafe {
            self.device()
                .cmd_copy_buffer(vk_cmd(cmd), vk_buffer(src), vk_buffer(dst), &vk_regions)
        };
    }

    fn cmd_copy_buffer_to_image(
        &self,
        cmd: CommandBufferHandle,
        src: BufferHandle,
        dst: ImageHandle,
        dst_layout: ImageLayout,
        regions: &[BufferImageCopy],
    ) {
        unsafe {
            record_copy_buffer_to_image(self.device(), vk_cmd(cmd), vk_buffer(src), vk_image(dst), dst_layout, regions)
        };
    }

    // ===== PRESENTATION =====

    fn create_swapchain(&self, info: &SwapchainInfo) -> Result<SwapchainImages> {
        let (surface, loader) = self.swapchain_parts()?;
        unsafe { vulkan_swapchain::create_swapchain(self.context.physical_device, surface, loader, info) }
    }

    fn destroy_swapchain(&self, swapchain: SwapchainHandle) {
        if let Some(loader) = self.swapchain_loader() {
            unsafe { loader.destroy_swapchain(vk::SwapchainKHR::from_raw(swapchain.as_raw()), None) };
        }
    }

    fn acquire_next_image(&self, swapchain: SwapchainHandle, signal: SemaphoreHandle) -> Result<AcquireResult> {
        let (_, loader) = self.swapchain_parts()?;
        let result = unsafe {
            loader.acquire_next_image(
                vk::SwapchainKHR::from_raw(swapchain.as_raw()),
                u64::MAX,
                vk_semaphore(signal),
                vk::Fence::null(),
            )
        };
        match result {
            Ok((index, suboptimal)) => Ok(AcquireResult::Acquired { index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireResult::OutOfDate),
            Err(e) => Err(engine_err!("mgp::vulkan", "Failed to acquire swapchain image: {:?}", e)),
        }
    }

    fn present(
        &self,
        queue: QueueHandle,
        swapchain: SwapchainHandle,
        image_index: u32,
        wait: &[SemaphoreHandle],
    ) -> Result<PresentResult> {
        let (_, loader) = self.swapchain_parts()?;
        let wait_semaphores: Vec<vk::Semaphore> = wait.iter().map(|&s| vk_semaphore(s)).collect();
        let swapchains = [vk::SwapchainKHR::from_raw(swapchain.as_raw())];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { loader.queue_present(vk::Queue::from_raw(queue.as_raw()), &present_info) } {
            Ok(false) => Ok(PresentResult::Presented),
            Ok(true) => Ok(PresentResult::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentResult::OutOfDate),
            Err(e) => Err(engine_err!("mgp::vulkan", "Failed to present: {:?}", e)),
        }
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        unsafe {
            self.context.device.device_wait_idle().ok();

            // Whatever the core did not destroy is reclaimed here, before the
            // allocator goes away with the context
            let resources = std::mem::take(self.resources.get_mut().unwrap_or_else(PoisonError::into_inner));
            if !resources.buffers.is_empty() || !resources.images.is_empty() {
                engine_warn!(
                    "mgp::vulkan",
                    "{} buffers and {} images still alive at device shutdown",
                    resources.buffers.len(),
                    resources.images.len()
                );
            }
            for (raw, record) in resources.buffers {
                self.context.device.destroy_buffer(vk::Buffer::from_raw(raw), None);
                self.free(record.allocation);
            }
            for (raw, allocation) in resources.images {
                self.context.device.destroy_image(vk::Image::from_raw(raw), None);
                self.free(allocation);
            }

            self.context.device.destroy_pipeline_cache(self.pipeline_cache, None);
        }
        engine_debug!("mgp::vulkan", "Vulkan device destroyed");
    }
}

#[cfg(test)]
#[path = "vulkan_tests.rs"]
mod tests;
