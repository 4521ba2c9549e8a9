/// Bindless descriptor registry
///
/// One descriptor set, bound once per command buffer, holds every storage
/// buffer, sampler, 2D texture and cubemap the engine creates. Shaders index
/// it with the integer carried by a [`BindlessHandle`].
///
/// | binding | class      | descriptor type |
/// |---------|------------|-----------------|
/// | 0       | Buffer     | storage buffer  |
/// | 1       | Sampler    | sampler         |
/// | 2       | Texture2D  | sampled image   |
/// | 3       | Cubemap    | sampled image   |
///
/// Each class has its own monotonic counter; indices are never reused within
/// a registry's lifetime. Registration writes the descriptor immediately,
/// which the `UPDATE_AFTER_BIND | PARTIALLY_BOUND` binding flags allow while
/// other slots are in use by in-flight frames.

use std::sync::Arc;
use rustc_hash::FxHashSet;
use crate::descriptor::{DescriptorLayoutCache, DescriptorPoolStatic};
use crate::device::{
    BufferHandle, DescriptorBindingFlags, DescriptorPoolInfo, DescriptorPoolSize,
    DescriptorResource, DescriptorSetHandle, DescriptorSetLayoutBinding, DescriptorSetLayoutHandle,
    DescriptorSetLayoutInfo, DescriptorType, DescriptorWrite, Device, ImageLayout, ImageViewHandle,
    PipelineBindPoint, PipelineLayoutHandle, SamplerHandle, ShaderStages,
};
use crate::error::{Error, Result};
use crate::sync::CommandBuffer;
use crate::{engine_error, engine_info};

// ===== HANDLES =====

/// Resource class of a bindless slot; the value is the binding index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BindlessClass {
    Buffer = 0,
    Sampler = 1,
    Texture2D = 2,
    Cubemap = 3,
}

impl BindlessClass {
    pub const ALL: [BindlessClass; 4] = [
        BindlessClass::Buffer,
        BindlessClass::Sampler,
        BindlessClass::Texture2D,
        BindlessClass::Cubemap,
    ];

    /// Binding of the class in the bindless set
    pub fn binding(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            BindlessClass::Buffer => "buffer",
            BindlessClass::Sampler => "sampler",
            BindlessClass::Texture2D => "texture2d",
            BindlessClass::Cubemap => "cubemap",
        }
    }

    fn descriptor_type(self) -> DescriptorType {
        match self {
            BindlessClass::Buffer => DescriptorType::StorageBuffer,
            BindlessClass::Sampler => DescriptorType::Sampler,
            BindlessClass::Texture2D | BindlessClass::Cubemap => DescriptorType::SampledImage,
        }
    }
}

/// Index of a resource in the bindless set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindlessHandle {
    class: BindlessClass,
    index: u32,
}

impl BindlessHandle {
    pub fn class(&self) -> BindlessClass {
        self.class
    }

    /// Array element to use in shaders
    pub fn index(&self) -> u32 {
        self.index
    }
}

// ===== REGISTRY =====

pub struct BindlessRegistry {
    device: Arc<dyn Device>,
    layout: DescriptorSetLayoutHandle,
    // Keeps the set alive.
    _pool: DescriptorPoolStatic,
    set: DescriptorSetHandle,
    capacity: u32,
    next: [u32; 4],
    retired: FxHashSet<BindlessHandle>,
}

impl BindlessRegistry {
    /// Create the bindless layout, pool and set
    ///
    /// # Arguments
    ///
    /// * `layouts` - Cache the set layout is fetched from (and owned by)
    /// * `capacity` - Slots per resource class
    pub fn new(device: Arc<dyn Device>, layouts: &mut DescriptorLayoutCache, capacity: u32) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InitializationFailed("bindless capacity must be non-zero".to_string()));
        }

        let layout = layouts.fetch(&Self::layout_info(capacity))?;
        let mut pool = DescriptorPoolStatic::new(
            device.clone(),
            &DescriptorPoolInfo {
                max_sets: 1,
                sizes: vec![
                    DescriptorPoolSize { descriptor_type: DescriptorType::StorageBuffer, count: capacity },
                    DescriptorPoolSize { descriptor_type: DescriptorType::Sampler, count: capacity },
                    DescriptorPoolSize { descriptor_type: DescriptorType::SampledImage, count: capacity * 2 },
                ],
                update_after_bind: true,
            },
        )?;
        let set = pool
            .allocate(&[layout], None)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::InitializationFailed("bindless set allocation returned nothing".to_string()))?;

        engine_info!("mgp::BindlessRegistry", "Bindless set ready ({} slots per class)", capacity);
        Ok(Self {
            device,
            layout,
            _pool: pool,
            set,
            capacity,
            next: [0; 4],
            retired: FxHashSet::default(),
        })
    }

    /// Layout description of the bindless set
    pub fn layout_info(capacity: u32) -> DescriptorSetLayoutInfo {
        let flags = DescriptorBindingFlags::UPDATE_AFTER_BIND | DescriptorBindingFlags::PARTIALLY_BOUND;
        DescriptorSetLayoutInfo::new(
            BindlessClass::ALL
                .iter()
                .map(|class| DescriptorSetLayoutBinding {
                    binding: class.binding(),
                    descriptor_type: class.descriptor_type(),
                    count: capacity,
                    stages: ShaderStages::ALL,
                    flags,
                })
                .collect(),
        )
    }

    fn register(&mut self, class: BindlessClass, resource: DescriptorResource) -> Result<BindlessHandle> {
        let counter = &mut self.next[class as usize];
        if *counter >= self.capacity {
            engine_error!(
                "mgp::BindlessRegistry",
                "No free {} slot left ({} in use)",
                class.name(),
                self.capacity
            );
            return Err(Error::BindlessCapacityExceeded { class: class.name(), capacity: self.capacity });
        }
        let index = *counter;
        *counter += 1;

        self.device.update_descriptor_sets(&[DescriptorWrite {
            set: self.set,
            binding: class.binding(),
            array_element: index,
            resource,
        }]);
        Ok(BindlessHandle { class, index })
    }

    /// Register a storage buffer (whole `range` bytes)
    pub fn register_buffer(&mut self, buffer: BufferHandle, range: u64) -> Result<BindlessHandle> {
        self.register(
            BindlessClass::Buffer,
            DescriptorResource::Buffer {
                buffer,
                offset: 0,
                range,
                descriptor_type: DescriptorType::StorageBuffer,
            },
        )
    }

    pub fn register_sampler(&mut self, sampler: SamplerHandle) -> Result<BindlessHandle> {
        self.register(BindlessClass::Sampler, DescriptorResource::Sampler(sampler))
    }

    /// Register a 2D view, read in `ShaderReadOnly` layout
    pub fn register_texture_2d(&mut self, view: ImageViewHandle) -> Result<BindlessHandle> {
        self.register(
            BindlessClass::Texture2D,
            DescriptorResource::Image {
                view,
                layout: ImageLayout::ShaderReadOnly,
                descriptor_type: DescriptorType::SampledImage,
            },
        )
    }

    /// Register a cube view, read in `ShaderReadOnly` layout
    pub fn register_cubemap(&mut self, view: ImageViewHandle) -> Result<BindlessHandle> {
        self.register(
            BindlessClass::Cubemap,
            DescriptorResource::Image {
                view,
                layout: ImageLayout::ShaderReadOnly,
                descriptor_type: DescriptorType::SampledImage,
            },
        )
    }

    /// Mark a handle dead once its resource is destroyed
    ///
    /// The slot is not reused; it simply stops being live.
    pub fn retire(&mut self, handle: BindlessHandle) {
        self.retired.insert(handle);
    }

    /// True if `handle` was issued by this registry and not retired
    pub fn is_live(&self, handle: BindlessHandle) -> bool {
        handle.index < self.next[handle.class as usize] && !self.retired.contains(&handle)
    }

    /// Handles issued so far for a class
    pub fn count(&self, class: BindlessClass) -> u32 {
        self.next[class as usize]
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn layout(&self) -> DescriptorSetLayoutHandle {
        self.layout
    }

    pub fn set(&self) -> DescriptorSetHandle {
        self.set
    }

    /// Bind the set at `set_index` of `layout`
    pub fn bind(
        &self,
        cmd: &mut CommandBuffer,
        bind_point: PipelineBindPoint,
        layout: PipelineLayoutHandle,
        set_index: u32,
    ) -> Result<()> {
        cmd.bind_descriptor_sets(bind_point, layout, set_index, &[self.set])
    }
}

#[cfg(test)]
#[path = "bindless_registry_tests.rs"]
mod tests;
