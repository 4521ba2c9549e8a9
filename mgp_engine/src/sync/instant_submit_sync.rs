/// InstantSubmitSync - blocking one-shot submission
///
/// Borrows a command buffer from the current frame slot, records the
/// caller's work, submits it with the slot's instant-submit fence and blocks
/// until it completes. Intended for setup work (mip generation, one-off
/// copies); streaming uploads go through the
/// [`TransferQueue`](crate::sync::TransferQueue) instead.

use crate::device::SubmitInfo;
use crate::error::Result;
use crate::sync::{CommandBuffer, Queue};
use crate::engine_trace;

pub struct InstantSubmitSync {
    cmd: CommandBuffer,
}

impl InstantSubmitSync {
    /// Start recording on a free buffer of the current slot
    pub fn begin(queue: &mut Queue) -> Result<Self> {
        let mut cmd = queue.current_frame_mut().get_free_buffer()?;
        cmd.begin()?;
        Ok(Self { cmd })
    }

    pub fn command_buffer(&mut self) -> &mut CommandBuffer {
        &mut self.cmd
    }

    /// End, submit and wait for the recorded work
    pub fn submit(mut self, queue: &Queue) -> Result<()> {
        self.cmd.end()?;
        let fence = queue.current_frame().instant_submit_fence();
        let device = queue.device();

        let buffers = [self.cmd.handle()];
        queue.submit(
            &SubmitInfo {
                command_buffers: &buffers,
                ..Default::default()
            },
            Some(fence),
        )?;
        device.wait_for_fence(fence, u64::MAX)?;
        device.reset_fence(fence)?;
        engine_trace!("mgp::InstantSubmitSync", "Instant submit on slot {} complete", self.cmd.slot());
        Ok(())
    }

    /// Record with `record` and submit in one call
    pub fn run<F>(queue: &mut Queue, record: F) -> Result<()>
    where
        F: FnOnce(&mut CommandBuffer) -> Result<()>,
    {
        let mut sync = Self::begin(queue)?;
        record(sync.command_buffer())?;
        sync.submit(queue)
    }
}

#[cfg(test)]
#[path = "instant_submit_sync_tests.rs"]
mod tests;
