/// FrameData - command recording resources of one frame-in-flight slot
///
/// Each slot owns a command pool with a growing list of buffers and two
/// fences: `in_flight` signals when the slot's frame finished on the GPU,
/// `instant_submit` signals completion of blocking one-shot submissions that
/// share the slot's pool without waiting behind the frame.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use crate::device::{CommandBufferHandle, CommandPoolHandle, Device, FenceHandle};
use crate::error::{Error, Result};
use crate::sync::CommandBuffer;
use crate::{engine_error, engine_trace};

/// Buffers allocated when a slot is created
const INITIAL_BUFFERS: usize = 2;

pub struct FrameData {
    device: Arc<dyn Device>,
    slot: usize,
    pool: CommandPoolHandle,
    buffers: Vec<CommandBufferHandle>,
    next_free: usize,
    /// Bumped on every reset; stamped into handed-out buffers
    generation: Arc<AtomicU64>,
    in_flight_fence: FenceHandle,
    instant_submit_fence: FenceHandle,
}

impl FrameData {
    /// Create slot `slot` for the given queue family
    ///
    /// The in-flight fence starts signaled so the first wait on a fresh slot
    /// returns immediately.
    pub fn new(device: Arc<dyn Device>, queue_family: u32, slot: usize) -> Result<Self> {
        let pool = device.create_command_pool(queue_family)?;
        let buffers = match device.allocate_command_buffers(pool, INITIAL_BUFFERS as u32) {
            Ok(buffers) => buffers,
            Err(e) => {
                device.destroy_command_pool(pool);
                return Err(e);
            }
        };
        let in_flight_fence = device.create_fence(true)?;
        let instant_submit_fence = device.create_fence(false)?;

        Ok(Self {
            device,
            slot,
            pool,
            buffers,
            next_free: 0,
            generation: Arc::new(AtomicU64::new(0)),
            in_flight_fence,
            instant_submit_fence,
        })
    }

    /// Next unused command buffer of this cycle
    ///
    /// Doubles the buffer list when every buffer is in use; only a driver
    /// allocation failure makes this fail.
    pub fn get_free_buffer(&mut self) -> Result<CommandBuffer> {
        if self.next_free == self.buffers.len() {
            let grow = self.buffers.len().max(1);
            let more = self
                .device
                .allocate_command_buffers(self.pool, grow as u32)
                .map_err(|e| {
                    engine_error!("mgp::FrameData", "Slot {}: command buffer allocation failed: {}", self.slot, e);
                    e
                })?;
            self.buffers.extend(more);
            engine_trace!("mgp::FrameData", "Slot {} grew to {} command buffers", self.slot, self.buffers.len());
        }

        let handle = self.buffers[self.next_free];
        self.next_free += 1;
        Ok(CommandBuffer::new(self.device.clone(), handle, self.slot, self.generation.clone()))
    }

    /// Reset the pool and rewind the free list
    ///
    /// Every `CommandBuffer` handed out before the reset becomes stale.
    ///
    /// # Errors
    ///
    /// `Error::FrameInFlight` while the slot's in-flight fence is unsignaled.
    pub fn reset(&mut self) -> Result<()> {
        if !self.device.fence_signaled(self.in_flight_fence)? {
            return Err(Error::FrameInFlight(self.slot));
        }
        self.device.reset_command_pool(self.pool)?;
        self.next_free = 0;
        self.generation.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn in_flight_fence(&self) -> FenceHandle {
        self.in_flight_fence
    }

    pub fn instant_submit_fence(&self) -> FenceHandle {
        self.instant_submit_fence
    }

    /// Command buffers allocated from the slot's pool
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Command buffers handed out since the last reset
    pub fn buffers_in_use(&self) -> usize {
        self.next_free
    }
}

impl Drop for FrameData {
    fn drop(&mut self) {
        self.device.destroy_fence(self.in_flight_fence);
        self.device.destroy_fence(self.instant_submit_fence);
        self.device.destroy_command_pool(self.pool);
    }
}

#[cfg(test)]
#[path = "frame_data_tests.rs"]
mod tests;
