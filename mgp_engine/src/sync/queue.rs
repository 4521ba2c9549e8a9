/// Queue - the graphics queue and its frame-in-flight slots
///
/// The queue owns one [`FrameData`] per frame in flight and knows which slot
/// is current. Slots are used round-robin; a slot is only reused after its
/// in-flight fence has been waited on, which bounds how far the CPU can run
/// ahead of the GPU.

use std::sync::Arc;
use crate::device::{Device, FenceHandle, QueueHandle, QueueInfo, SubmitInfo};
use crate::error::{Error, Result};
use crate::sync::FrameData;
use crate::{engine_debug, engine_warn};

pub struct Queue {
    device: Arc<dyn Device>,
    info: QueueInfo,
    frames: Vec<FrameData>,
    current: usize,
}

impl Queue {
    /// Create the queue wrapper with `frames_in_flight` slots
    pub fn new(device: Arc<dyn Device>, frames_in_flight: usize) -> Result<Self> {
        if frames_in_flight == 0 {
            return Err(Error::InitializationFailed("frames_in_flight must be at least 1".to_string()));
        }
        let info = device.graphics_queue();
        let frames = (0..frames_in_flight)
            .map(|slot| FrameData::new(device.clone(), info.family, slot))
            .collect::<Result<Vec<_>>>()?;

        engine_debug!("mgp::Queue", "Queue family {} with {} frames in flight", info.family, frames_in_flight);
        Ok(Self {
            device,
            info,
            frames,
            current: 0,
        })
    }

    pub fn device(&self) -> &dyn Device {
        self.device.as_ref()
    }

    pub fn handle(&self) -> QueueHandle {
        self.info.handle
    }

    pub fn family(&self) -> u32 {
        self.info.family
    }

    pub fn frames_in_flight(&self) -> usize {
        self.frames.len()
    }

    /// Index of the current slot
    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_frame(&self) -> &FrameData {
        &self.frames[self.current]
    }

    pub fn current_frame_mut(&mut self) -> &mut FrameData {
        &mut self.frames[self.current]
    }

    pub fn frame(&self, slot: usize) -> Option<&FrameData> {
        self.frames.get(slot)
    }

    /// Move to the next slot
    ///
    /// # Returns
    ///
    /// The new current slot index.
    pub fn advance(&mut self) -> usize {
        self.current = (self.current + 1) % self.frames.len();
        self.current
    }

    /// Block until the current slot's last frame has finished on the GPU
    pub fn wait_current(&self) -> Result<()> {
        let fence = self.current_frame().in_flight_fence();
        self.device.wait_for_fence(fence, u64::MAX)?;
        Ok(())
    }

    pub fn submit(&self, info: &SubmitInfo<'_>, fence: Option<FenceHandle>) -> Result<()> {
        self.device.submit(self.info.handle, info, fence)
    }

    /// Drain all GPU work
    pub fn wait_idle(&self) -> Result<()> {
        self.device.wait_idle()
    }
}

impl Drop for Queue {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            engine_warn!("mgp::Queue", "wait_idle failed during teardown: {}", e);
        }
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
