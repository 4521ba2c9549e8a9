/// Swapchain - presentation images, their semaphores and the frame's render targets
///
/// The swapchain images are imported into the [`ResourceArena`] so their
/// layouts are tracked like any other image. Alongside them the swapchain
/// owns a multisampled colour target resolving into the acquired image and
/// a depth target, both sized to the surface and rebuilt with it.

use std::sync::Arc;
use crate::bindless::BindlessRegistry;
use crate::config::Config;
use crate::device::{
    AcquireResult, Device, Format, ImageInfo, ImageLayout, ImageUsage, PresentMode, PresentResult, QueueHandle,
    SampleCount, SemaphoreHandle, StoreOp, SwapchainHandle, SwapchainImages, SwapchainInfo,
};
use crate::error::{Error, Result};
use crate::render_graph::OutputAttachment;
use crate::resource::{DeferredDestroy, ImageId, ImageViewId, ResourceArena};
use crate::{engine_debug, engine_info, engine_warn};

/// Format requested for the presentation images
const PREFERRED_FORMAT: Format = Format::B8G8R8A8_SRGB;

/// Format of the depth target
const DEPTH_FORMAT: Format = Format::D32_SFLOAT;

/// Window-system services the engine consumes
pub trait Platform: Send + Sync {
    /// Current drawable size in pixels; (0, 0) while minimized
    fn window_size(&self) -> (u32, u32);
}

/// An arena image together with its full view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Target {
    image: ImageId,
    view: ImageViewId,
}

pub struct Swapchain {
    device: Arc<dyn Device>,
    handle: SwapchainHandle,
    format: Format,
    width: u32,
    height: u32,
    present_mode: PresentMode,
    samples: SampleCount,

    images: Vec<Target>,
    /// Multisampled colour target; absent when rendering single-sampled
    msaa_color: Option<Target>,
    depth: Option<Target>,

    /// One per frame slot, signaled by acquire
    image_available: Vec<SemaphoreHandle>,
    /// One per swapchain image, waited on by present
    render_finished: Vec<SemaphoreHandle>,
}

impl Swapchain {
    /// Create the swapchain and its render targets
    ///
    /// # Errors
    ///
    /// Fails without a presentation surface or for a zero-area size.
    pub fn new(
        device: Arc<dyn Device>,
        arena: &mut ResourceArena,
        bindless: &mut BindlessRegistry,
        width: u32,
        height: u32,
        config: &Config,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InitializationFailed(format!("cannot create a {}x{} swapchain", width, height)));
        }

        let mut swapchain = Self {
            device: device.clone(),
            handle: SwapchainHandle::from_raw(0),
            format: PREFERRED_FORMAT,
            width,
            height,
            present_mode: config.present_mode,
            samples: config.msaa_samples,
            images: Vec::new(),
            msaa_color: None,
            depth: None,
            image_available: Vec::with_capacity(config.frames_in_flight),
            render_finished: Vec::new(),
        };
        for _ in 0..config.frames_in_flight {
            let semaphore = device.create_semaphore()?;
            swapchain.image_available.push(semaphore);
        }

        let created = device.create_swapchain(&SwapchainInfo {
            width,
            height,
            preferred_format: PREFERRED_FORMAT,
            present_mode: config.present_mode,
            old_swapchain: None,
        })?;
        swapchain.handle = created.handle;
        swapchain.adopt(created, arena, bindless)?;

        engine_info!(
            "mgp::Swapchain",
            "Created {}x{} swapchain ({} images, {:?}, {}x MSAA)",
            swapchain.width,
            swapchain.height,
            swapchain.images.len(),
            swapchain.format,
            swapchain.samples.count()
        );
        Ok(swapchain)
    }

    /// Import the images of a freshly created swapchain and build the targets
    fn adopt(
        &mut self,
        created: SwapchainImages,
        arena: &mut ResourceArena,
        bindless: &mut BindlessRegistry,
    ) -> Result<()> {
        self.format = created.format;
        self.width = created.width;
        self.height = created.height;

        let info = ImageInfo::tex2d(
            created.width,
            created.height,
            created.format,
            ImageUsage::COLOR_ATTACHMENT | ImageUsage::TRANSFER_DST,
        );
        for (index, handle) in created.images.into_iter().enumerate() {
            let image = arena.import_image(handle, info.clone(), ImageLayout::Undefined, &format!("swapchain_{}", index));
            let view = arena.standard_view(image, bindless)?;
            self.images.push(Target { image, view });
        }

        if self.samples != SampleCount::S1 {
            let info = ImageInfo::attachment(self.width, self.height, self.format, self.samples).transient();
            let image = arena.create_image(info, "swapchain_msaa_color")?;
            let view = arena.standard_view(image, bindless)?;
            self.msaa_color = Some(Target { image, view });
        }

        let info = ImageInfo::attachment(self.width, self.height, DEPTH_FORMAT, self.samples);
        let image = arena.create_image(info, "swapchain_depth")?;
        let view = arena.standard_view(image, bindless)?;
        self.depth = Some(Target { image, view });

        for _ in 0..self.images.len() {
            let semaphore = self.device.create_semaphore()?;
            self.render_finished.push(semaphore);
        }
        Ok(())
    }

    /// Remove the images and targets from the arena
    ///
    /// Their GPU objects are returned for the caller to destroy.
    fn release_targets(&mut self, arena: &mut ResourceArena, bindless: &mut BindlessRegistry) -> Vec<DeferredDestroy> {
        let mut doomed = Vec::new();
        let targets = self.images.drain(..).chain(self.msaa_color.take()).chain(self.depth.take());
        for target in targets {
            match arena.release_image(target.image, bindless) {
                Ok(objects) => doomed.extend(objects),
                Err(e) => engine_warn!("mgp::Swapchain", "Swapchain target already released: {}", e),
            }
        }
        for semaphore in self.render_finished.drain(..) {
            self.device.destroy_semaphore(semaphore);
        }
        doomed
    }

    // ===== FRAME =====

    /// Acquire the next image, signaling the semaphore of frame slot `slot`
    pub fn acquire(&self, slot: usize) -> Result<AcquireResult> {
        let semaphore = self.image_available_semaphore(slot)?;
        self.device.acquire_next_image(self.handle, semaphore)
    }

    /// Present `index` once its render-finished semaphore signals
    pub fn present(&self, queue: QueueHandle, index: u32) -> Result<PresentResult> {
        let semaphore = self.render_finished_semaphore(index)?;
        self.device.present(queue, self.handle, index, &[semaphore])
    }

    pub fn image_available_semaphore(&self, slot: usize) -> Result<SemaphoreHandle> {
        self.image_available
            .get(slot)
            .copied()
            .ok_or_else(|| Error::InvalidResource(format!("no acquire semaphore for frame slot {}", slot)))
    }

    pub fn render_finished_semaphore(&self, index: u32) -> Result<SemaphoreHandle> {
        self.render_finished
            .get(index as usize)
            .copied()
            .ok_or_else(|| Error::InvalidResource(format!("swapchain image index {} out of range", index)))
    }

    // ===== REBUILD =====

    /// Recreate the swapchain and its targets at a new size
    ///
    /// Waits for the device to go idle, so everything released here is
    /// destroyed at once.
    ///
    /// # Returns
    ///
    /// `false` if the request was ignored because the size has no area.
    pub fn rebuild(
        &mut self,
        width: u32,
        height: u32,
        arena: &mut ResourceArena,
        bindless: &mut BindlessRegistry,
    ) -> Result<bool> {
        if width == 0 || height == 0 {
            engine_debug!("mgp::Swapchain", "Ignoring {}x{} swapchain rebuild", width, height);
            return Ok(false);
        }
        self.device.wait_idle()?;

        let created = self.device.create_swapchain(&SwapchainInfo {
            width,
            height,
            preferred_format: PREFERRED_FORMAT,
            present_mode: self.present_mode,
            old_swapchain: Some(self.handle),
        })?;

        for object in self.release_targets(arena, bindless) {
            object.destroy(self.device.as_ref());
        }
        self.device.destroy_swapchain(self.handle);
        self.handle = created.handle;
        self.adopt(created, arena, bindless)?;

        engine_debug!("mgp::Swapchain", "Rebuilt swapchain at {}x{}", self.width, self.height);
        Ok(true)
    }

    /// Release the arena images before the swapchain goes away (device idle)
    pub fn destroy(mut self, arena: &mut ResourceArena, bindless: &mut BindlessRegistry) {
        for object in self.release_targets(arena, bindless) {
            object.destroy(self.device.as_ref());
        }
    }

    // ===== ATTACHMENTS =====

    /// Colour output for a pass rendering into image `index`
    ///
    /// Multisampled: the MSAA target, cleared and resolved into the
    /// swapchain image. Single-sampled: the swapchain image itself.
    pub fn color_attachment(&self, index: u32, clear: [f32; 4]) -> Result<OutputAttachment> {
        let target = self.image(index)?;
        Ok(match self.msaa_color {
            Some(msaa) => OutputAttachment::clear_color(msaa.view, clear)
                .with_store(StoreOp::DontCare)
                .with_resolve(target.view),
            None => OutputAttachment::clear_color(target.view, clear),
        })
    }

    /// Depth output matching the colour target, cleared to `depth`
    pub fn depth_attachment(&self, depth: f32) -> Result<OutputAttachment> {
        let target = self
            .depth
            .ok_or_else(|| Error::InvalidResource("swapchain has no depth target".to_string()))?;
        Ok(OutputAttachment::clear_depth(target.view, depth).with_store(StoreOp::DontCare))
    }

    fn image(&self, index: u32) -> Result<Target> {
        self.images
            .get(index as usize)
            .copied()
            .ok_or_else(|| Error::InvalidResource(format!("swapchain image index {} out of range", index)))
    }

    /// Arena id of swapchain image `index`
    pub fn image_id(&self, index: u32) -> Result<ImageId> {
        Ok(self.image(index)?.image)
    }

    pub fn image_view(&self, index: u32) -> Result<ImageViewId> {
        Ok(self.image(index)?.view)
    }

    pub fn handle(&self) -> SwapchainHandle {
        self.handle
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn depth_format(&self) -> Format {
        DEPTH_FORMAT
    }

    pub fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn samples(&self) -> SampleCount {
        self.samples
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        for semaphore in self.render_finished.drain(..).chain(self.image_available.drain(..)) {
            self.device.destroy_semaphore(semaphore);
        }
        self.device.destroy_swapchain(self.handle);
    }
}

#[cfg(test)]
#[path = "swapchain_tests.rs"]
mod tests;
