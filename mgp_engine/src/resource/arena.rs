/// Resource arena - owning storage for images, views, buffers and samplers
///
/// Every resource lives in a `SlotMap` and is addressed by a
/// generation-checked id. Views hold their image's id, never a pointer, so a
/// view of a destroyed image resolves to `Error::InvalidResource` instead of
/// dangling.
///
/// Destruction is split in two: `release_*` removes the records and retires
/// bindless handles immediately, and returns the GPU objects as
/// [`DeferredDestroy`] entries for the caller to push on the deletion queue
/// (or to destroy at once when the device is idle).

use std::sync::Arc;
use rustc_hash::FxHashMap;
use slotmap::SlotMap;
use crate::bindless::BindlessRegistry;
use crate::device::{
    BufferInfo, BufferUsage, Device, ImageHandle, ImageInfo, ImageLayout, ImageUsage, ImageViewDesc,
    ImageViewType, SamplerInfo,
};
use crate::error::{Error, Result};
use crate::resource::{
    BufferId, DeferredDestroy, GpuBuffer, Image, ImageId, ImageView, ImageViewId, Sampler, SamplerId,
    ViewRange,
};
use crate::{engine_debug, engine_trace};

pub struct ResourceArena {
    device: Arc<dyn Device>,
    images: SlotMap<ImageId, Image>,
    views: SlotMap<ImageViewId, ImageView>,
    buffers: SlotMap<BufferId, GpuBuffer>,
    samplers: SlotMap<SamplerId, Sampler>,
    /// One sampler per distinct description
    sampler_cache: FxHashMap<SamplerInfo, SamplerId>,
}

impl ResourceArena {
    pub fn new(device: Arc<dyn Device>) -> Self {
        Self {
            device,
            images: SlotMap::with_key(),
            views: SlotMap::with_key(),
            buffers: SlotMap::with_key(),
            samplers: SlotMap::with_key(),
            sampler_cache: FxHashMap::default(),
        }
    }

    // ===== IMAGES =====

    /// Create an image in the `Undefined` layout
    ///
    /// # Errors
    ///
    /// Returns an error for zero extents, mip or layer counts, or if the
    /// backend fails to create the image.
    pub fn create_image(&mut self, info: ImageInfo, name: &str) -> Result<ImageId> {
        if info.width == 0 || info.height == 0 || info.depth == 0 || info.mip_levels == 0 || info.array_layers == 0 {
            return Err(Error::InvalidResource(format!("image '{}' has an empty extent: {:?}", name, info)));
        }
        if info.mip_levels > info.max_mip_levels() {
            return Err(Error::InvalidResource(format!(
                "image '{}' asks for {} mips, its extent allows {}",
                name,
                info.mip_levels,
                info.max_mip_levels()
            )));
        }
        let handle = self.device.create_image(&info, name)?;
        engine_trace!("mgp::ResourceArena", "Created image '{}' {}x{} {:?}", name, info.width, info.height, info.format);
        Ok(self.images.insert(Image {
            handle,
            info,
            layout: ImageLayout::Undefined,
            owned: true,
            views: FxHashMap::default(),
            name: name.to_string(),
        }))
    }

    /// Track an image created elsewhere (swapchain images)
    ///
    /// Imported images are never destroyed by the arena, only their views.
    pub fn import_image(&mut self, handle: ImageHandle, info: ImageInfo, layout: ImageLayout, name: &str) -> ImageId {
        self.images.insert(Image {
            handle,
            info,
            layout,
            owned: false,
            views: FxHashMap::default(),
            name: name.to_string(),
        })
    }

    pub fn image(&self, id: ImageId) -> Result<&Image> {
        self.images
            .get(id)
            .ok_or_else(|| Error::InvalidResource(format!("stale image id {:?}", id)))
    }

    pub fn image_mut(&mut self, id: ImageId) -> Result<&mut Image> {
        self.images
            .get_mut(id)
            .ok_or_else(|| Error::InvalidResource(format!("stale image id {:?}", id)))
    }

    pub fn contains_image(&self, id: ImageId) -> bool {
        self.images.contains_key(id)
    }

    /// Remove an image and every view of it
    ///
    /// Bindless handles of the views are retired now. The returned objects
    /// must be destroyed once no in-flight frame references them.
    pub fn release_image(&mut self, id: ImageId, bindless: &mut BindlessRegistry) -> Result<Vec<DeferredDestroy>> {
        let image = self
            .images
            .remove(id)
            .ok_or_else(|| Error::InvalidResource(format!("stale image id {:?}", id)))?;

        let mut doomed = Vec::with_capacity(image.views.len() + 1);
        for view_id in image.views.values() {
            if let Some(view) = self.views.remove(*view_id) {
                if let Some(handle) = view.bindless {
                    bindless.retire(handle);
                }
                doomed.push(DeferredDestroy::ImageView(view.handle));
            }
        }
        if image.owned {
            doomed.push(DeferredDestroy::Image(image.handle));
        }
        engine_trace!("mgp::ResourceArena", "Released image '{}' ({} views)", image.name, image.views.len());
        Ok(doomed)
    }

    // ===== IMAGE VIEWS =====

    /// Get or create the view of `range`
    ///
    /// Views are cached per image and range: identical arguments return the
    /// same id. A sampled 2D or cube view is registered in the bindless set
    /// when it is first constructed, never again.
    pub fn create_view(&mut self, image_id: ImageId, range: ViewRange, bindless: &mut BindlessRegistry) -> Result<ImageViewId> {
        let image = self
            .images
            .get(image_id)
            .ok_or_else(|| Error::InvalidResource(format!("stale image id {:?}", image_id)))?;
        if let Some(existing) = image.views.get(&range) {
            return Ok(*existing);
        }
        if !range.fits(&image.info) {
            return Err(Error::InvalidResource(format!(
                "view range {:?} outside image '{}' ({} mips, {} layers)",
                range, image.name, image.info.mip_levels, image.info.array_layers
            )));
        }

        let view_type = range.view_type(&image.info);
        let format = image.info.format;
        let sampled = image.info.usage.contains(ImageUsage::SAMPLED);
        let handle = self.device.create_image_view(&ImageViewDesc {
            image: image.handle,
            view_type,
            format,
            aspect: format.aspect(),
            base_mip: range.base_mip,
            mip_count: range.mip_count,
            base_layer: range.base_layer,
            layer_count: range.layer_count,
        })?;

        let registered = match (sampled, view_type) {
            (true, ImageViewType::Tex2D) => bindless.register_texture_2d(handle).map(Some),
            (true, ImageViewType::Cube) => bindless.register_cubemap(handle).map(Some),
            _ => Ok(None),
        };
        let bindless_handle = match registered {
            Ok(h) => h,
            Err(e) => {
                self.device.destroy_image_view(handle);
                return Err(e);
            }
        };

        let id = self.views.insert(ImageView {
            image: image_id,
            handle,
            range,
            view_type,
            format,
            bindless: bindless_handle,
        });
        if let Some(image) = self.images.get_mut(image_id) {
            image.views.insert(range, id);
        }
        Ok(id)
    }

    /// Get or create the view covering every mip and layer
    pub fn standard_view(&mut self, image_id: ImageId, bindless: &mut BindlessRegistry) -> Result<ImageViewId> {
        let range = ViewRange::full(&self.image(image_id)?.info);
        self.create_view(image_id, range, bindless)
    }

    pub fn view(&self, id: ImageViewId) -> Result<&ImageView> {
        self.views
            .get(id)
            .ok_or_else(|| Error::InvalidResource(format!("stale image view id {:?}", id)))
    }

    /// The image behind a view
    pub fn view_image(&self, id: ImageViewId) -> Result<&Image> {
        let view = self.view(id)?;
        self.image(view.image)
    }

    // ===== BUFFERS =====

    /// Create a buffer, optionally registering it as a bindless storage buffer
    pub fn create_buffer(&mut self, info: BufferInfo, register_bindless: bool, bindless: &mut BindlessRegistry) -> Result<BufferId> {
        if info.size == 0 {
            return Err(Error::InvalidResource(format!("buffer '{}' has size 0", info.name)));
        }
        if register_bindless && !info.usage.contains(BufferUsage::STORAGE) {
            return Err(Error::InvalidResource(format!(
                "buffer '{}' is registered bindless without STORAGE usage",
                info.name
            )));
        }

        let handle = self.device.create_buffer(&info)?;
        let bindless_handle = if register_bindless {
            match bindless.register_buffer(handle, info.size) {
                Ok(h) => Some(h),
                Err(e) => {
                    self.device.destroy_buffer(handle);
                    return Err(e);
                }
            }
        } else {
            None
        };

        Ok(self.buffers.insert(GpuBuffer {
            handle,
            size: info.size,
            usage: info.usage,
            location: info.location,
            device_address: self.device.buffer_device_address(handle),
            bindless: bindless_handle,
            name: info.name,
        }))
    }

    pub fn buffer(&self, id: BufferId) -> Result<&GpuBuffer> {
        self.buffers
            .get(id)
            .ok_or_else(|| Error::InvalidResource(format!("stale buffer id {:?}", id)))
    }

    /// Write into a mapped buffer
    pub fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<()> {
        let buffer = self.buffer(id)?;
        if !buffer.is_mapped() {
            return Err(Error::InvalidResource(format!(
                "buffer '{}' is GPU-only, upload it through the transfer queue",
                buffer.name
            )));
        }
        buffer.check_range(offset, data.len() as u64)?;
        self.device.write_buffer(buffer.handle, offset, data)
    }

    /// Remove a buffer, retiring its bindless handle
    pub fn release_buffer(&mut self, id: BufferId, bindless: &mut BindlessRegistry) -> Result<DeferredDestroy> {
        let buffer = self
            .buffers
            .remove(id)
            .ok_or_else(|| Error::InvalidResource(format!("stale buffer id {:?}", id)))?;
        if let Some(handle) = buffer.bindless {
            bindless.retire(handle);
        }
        Ok(DeferredDestroy::Buffer(buffer.handle))
    }

    // ===== SAMPLERS =====

    /// Get or create the sampler for `info`
    ///
    /// Samplers are deduplicated by their full description and registered in
    /// the bindless set on creation.
    pub fn create_sampler(&mut self, info: SamplerInfo, bindless: &mut BindlessRegistry) -> Result<SamplerId> {
        if let Some(id) = self.sampler_cache.get(&info) {
            return Ok(*id);
        }
        let handle = self.device.create_sampler(&info)?;
        let bindless_handle = match bindless.register_sampler(handle) {
            Ok(h) => h,
            Err(e) => {
                self.device.destroy_sampler(handle);
                return Err(e);
            }
        };
        let id = self.samplers.insert(Sampler {
            handle,
            info,
            bindless: bindless_handle,
        });
        self.sampler_cache.insert(info, id);
        engine_debug!("mgp::ResourceArena", "Created sampler {:?} (bindless {})", info.mag_filter, bindless_handle.index());
        Ok(id)
    }

    pub fn sampler(&self, id: SamplerId) -> Result<&Sampler> {
        self.samplers
            .get(id)
            .ok_or_else(|| Error::InvalidResource(format!("stale sampler id {:?}", id)))
    }

    // ===== STATISTICS =====

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn sampler_count(&self) -> usize {
        self.samplers.len()
    }
}

impl Drop for ResourceArena {
    fn drop(&mut self) {
        let device = self.device.as_ref();
        for (_, view) in self.views.drain() {
            device.destroy_image_view(view.handle);
        }
        for (_, image) in self.images.drain() {
            if image.owned {
                device.destroy_image(image.handle);
            }
        }
        for (_, buffer) in self.buffers.drain() {
            device.destroy_buffer(buffer.handle);
        }
        for (_, sampler) in self.samplers.drain() {
            device.destroy_sampler(sampler.handle);
        }
    }
}

#[cfg(test)]
#[path = "arena_tests.rs"]
mod tests;
