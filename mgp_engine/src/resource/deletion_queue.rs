/// Frame-stamped deferred destruction.
///
/// A GPU object released during frame `F` may still be read by command
/// buffers of frame `F` and of the frames recorded before it. The queue keeps
/// it until the current frame reaches `F + frames_in_flight`; at that point
/// the frame slot reusing `F`'s resources has waited on `F`'s fence.

use std::collections::VecDeque;
use std::sync::Arc;
use crate::device::{
    BufferHandle, Device, ImageHandle, ImageViewHandle, PipelineHandle, SamplerHandle, ShaderModuleHandle,
};
use crate::engine_trace;

/// A GPU object waiting for the frames that use it to retire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredDestroy {
    Buffer(BufferHandle),
    Image(ImageHandle),
    ImageView(ImageViewHandle),
    Sampler(SamplerHandle),
    Pipeline(PipelineHandle),
    ShaderModule(ShaderModuleHandle),
}

impl DeferredDestroy {
    /// Destroy the object now
    pub fn destroy(self, device: &dyn Device) {
        match self {
            DeferredDestroy::Buffer(h) => device.destroy_buffer(h),
            DeferredDestroy::Image(h) => device.destroy_image(h),
            DeferredDestroy::ImageView(h) => device.destroy_image_view(h),
            DeferredDestroy::Sampler(h) => device.destroy_sampler(h),
            DeferredDestroy::Pipeline(h) => device.destroy_pipeline(h),
            DeferredDestroy::ShaderModule(h) => device.destroy_shader_module(h),
        }
    }
}

pub struct DeletionQueue {
    device: Arc<dyn Device>,
    frames_in_flight: u64,
    frame: u64,
    /// (frame stamp, object), stamps non-decreasing
    pending: VecDeque<(u64, DeferredDestroy)>,
}

impl DeletionQueue {
    pub fn new(device: Arc<dyn Device>, frames_in_flight: usize) -> Self {
        Self {
            device,
            frames_in_flight: frames_in_flight.max(1) as u64,
            frame: 0,
            pending: VecDeque::new(),
        }
    }

    /// Advance the frame counter used to stamp new entries
    pub fn set_frame(&mut self, frame: u64) {
        debug_assert!(frame >= self.frame, "deletion queue frame went backwards");
        self.frame = frame;
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Queue an object released during the current frame
    pub fn push(&mut self, object: DeferredDestroy) {
        self.pending.push_back((self.frame, object));
    }

    pub fn extend<I: IntoIterator<Item = DeferredDestroy>>(&mut self, objects: I) {
        for object in objects {
            self.push(object);
        }
    }

    /// Destroy every object whose frames have retired
    ///
    /// Call only once the fence of the current frame slot has been waited on.
    ///
    /// # Returns
    ///
    /// The number of objects destroyed.
    pub fn collect(&mut self) -> usize {
        let mut destroyed = 0;
        while let Some(&(stamp, object)) = self.pending.front() {
            if stamp + self.frames_in_flight > self.frame {
                break;
            }
            self.pending.pop_front();
            object.destroy(self.device.as_ref());
            destroyed += 1;
        }
        if destroyed > 0 {
            engine_trace!("mgp::DeletionQueue", "Destroyed {} retired objects at frame {}", destroyed, self.frame);
        }
        destroyed
    }

    /// Destroy everything immediately (the device must be idle)
    pub fn flush_all(&mut self) {
        for (_, object) in self.pending.drain(..) {
            object.destroy(self.device.as_ref());
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Drop for DeletionQueue {
    fn drop(&mut self) {
        self.flush_all();
    }
}

#[cfg(test)]
#[path = "deletion_queue_tests.rs"]
mod tests;
