/// Batched descriptor writes
///
/// ```ignore
/// let mut writer = DescriptorWriter::new();
/// writer
///     .write_buffer(0, ubo, 0, 256, DescriptorType::UniformBuffer)
///     .write_combined_image(1, view, sampler, ImageLayout::ShaderReadOnly);
/// writer.update(device, set);
/// ```

use crate::device::{
    BufferHandle, DescriptorResource, DescriptorSetHandle, DescriptorType, DescriptorWrite, Device, ImageLayout,
    ImageViewHandle, SamplerHandle,
};

#[derive(Debug, Default)]
pub struct DescriptorWriter {
    /// (binding, array element, resource)
    entries: Vec<(u32, u32, DescriptorResource)>,
}

impl DescriptorWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_buffer(
        &mut self,
        binding: u32,
        buffer: BufferHandle,
        offset: u64,
        range: u64,
        descriptor_type: DescriptorType,
    ) -> &mut Self {
        self.entries.push((binding, 0, DescriptorResource::Buffer { buffer, offset, range, descriptor_type }));
        self
    }

    pub fn write_image(
        &mut self,
        binding: u32,
        view: ImageViewHandle,
        layout: ImageLayout,
        descriptor_type: DescriptorType,
    ) -> &mut Self {
        self.entries.push((binding, 0, DescriptorResource::Image { view, layout, descriptor_type }));
        self
    }

    pub fn write_sampler(&mut self, binding: u32, sampler: SamplerHandle) -> &mut Self {
        self.entries.push((binding, 0, DescriptorResource::Sampler(sampler)));
        self
    }

    pub fn write_combined_image(
        &mut self,
        binding: u32,
        view: ImageViewHandle,
        sampler: SamplerHandle,
        layout: ImageLayout,
    ) -> &mut Self {
        self.entries
            .push((binding, 0, DescriptorResource::CombinedImageSampler { view, sampler, layout }));
        self
    }

    /// Write into one element of an arrayed binding
    pub fn write_array_element(&mut self, binding: u32, element: u32, resource: DescriptorResource) -> &mut Self {
        self.entries.push((binding, element, resource));
        self
    }

    /// Flush every pending write to `set` in one device call
    pub fn update(&mut self, device: &dyn Device, set: DescriptorSetHandle) {
        if self.entries.is_empty() {
            return;
        }
        let writes: Vec<DescriptorWrite> = self
            .entries
            .drain(..)
            .map(|(binding, array_element, resource)| DescriptorWrite { set, binding, array_element, resource })
            .collect();
        device.update_descriptor_sets(&writes);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "writer_tests.rs"]
mod tests;
