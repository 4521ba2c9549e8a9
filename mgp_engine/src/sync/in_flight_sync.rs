/// InFlightSync - the frame boundary
///
/// One frame is driven by three calls, in this order:
///
/// ```ignore
/// let mut cmd = sync.begin(&mut core)?;
/// core.record_graph(&mut graph, &mut cmd)?;
/// sync.present(&mut core, cmd)?;
/// core.next_frame()?;
/// ```
///
/// `begin` blocks until the GPU has finished the frame that last used the
/// current slot, then recycles the slot's command buffers and descriptor
/// pool and acquires a swapchain image. `present` submits the frame and
/// presents the image. The slot's fence is reset only by the submit itself,
/// so a frame abandoned between the two calls leaves the slot waitable.
/// A stale swapchain is rebuilt transparently; while the
/// window has no area the frame is still recorded and submitted, but
/// nothing is presented.

use crate::device::{AcquireResult, FenceHandle, ImageLayout, PipelineStage, PresentResult, SubmitInfo};
use crate::error::{Error, Result};
use crate::render_core::RenderCore;
use crate::sync::CommandBuffer;
use crate::{engine_bail_warn, engine_debug, engine_trace, engine_warn};

/// Out-of-date acquires tolerated in a row before giving up
const MAX_ACQUIRE_ATTEMPTS: u32 = 3;

#[derive(Debug, Default)]
pub struct InFlightSync {
    image_index: Option<u32>,
    rebuild_pending: bool,
}

impl InFlightSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the frame on the current slot
    ///
    /// # Returns
    ///
    /// A command buffer of the slot, already begun.
    pub fn begin(&mut self, core: &mut RenderCore) -> Result<CommandBuffer> {
        let slot = core.queue.current_index();
        core.queue.wait_current()?;
        core.deletion.collect();
        core.frame_pools[slot].clear()?;
        core.queue.current_frame_mut().reset()?;

        if self.rebuild_pending {
            self.rebuild(core)?;
        }
        self.image_index = None;
        if core.swapchain.is_some() && !self.rebuild_pending {
            self.image_index = self.acquire(core, slot)?;
        }

        let mut cmd = core.queue.current_frame_mut().get_free_buffer()?;
        cmd.begin()?;
        engine_trace!("mgp::InFlightSync", "Frame {} begun on slot {}", core.frame_number(), slot);
        Ok(cmd)
    }

    fn acquire(&mut self, core: &mut RenderCore, slot: usize) -> Result<Option<u32>> {
        for _ in 0..MAX_ACQUIRE_ATTEMPTS {
            let Some(swapchain) = core.swapchain.as_ref() else {
                return Ok(None);
            };
            match swapchain.acquire(slot)? {
                AcquireResult::Acquired { index, suboptimal } => {
                    if suboptimal {
                        self.rebuild_pending = true;
                    }
                    return Ok(Some(index));
                }
                AcquireResult::OutOfDate => {
                    engine_debug!("mgp::InFlightSync", "Swapchain out of date on acquire");
                    self.rebuild_pending = true;
                    if !self.rebuild(core)? {
                        return Ok(None);
                    }
                }
            }
        }
        engine_bail_warn!(
            "mgp::InFlightSync",
            "Swapchain still out of date after {} rebuilds",
            MAX_ACQUIRE_ATTEMPTS
        );
    }

    /// Rebuild at the window size; clears the pending flag on success
    fn rebuild(&mut self, core: &mut RenderCore) -> Result<bool> {
        let Some((width, height)) = core.target_extent() else {
            self.rebuild_pending = false;
            return Ok(false);
        };
        let rebuilt = core.rebuild_swapchain(width, height)?;
        if rebuilt {
            self.rebuild_pending = false;
        }
        Ok(rebuilt)
    }

    /// End, submit and present the frame recorded into `cmd`
    ///
    /// Flushes the transfer queue first so uploads recorded during the frame
    /// execute before it.
    pub fn present(&mut self, core: &mut RenderCore, mut cmd: CommandBuffer) -> Result<()> {
        let slot = core.queue.current_index();
        if cmd.slot() != slot {
            return Err(Error::InvalidResource(format!(
                "command buffer of slot {} presented on slot {}",
                cmd.slot(),
                slot
            )));
        }

        let image_index = self.image_index.take();
        if let Some(index) = image_index {
            let swapchain = core
                .swapchain
                .as_ref()
                .ok_or_else(|| Error::InvalidResource("image acquired without a swapchain".to_string()))?;
            let image = core.arena.image_mut(swapchain.image_id(index)?)?;
            cmd.transition_image(image, ImageLayout::PresentSrc)?;
        }
        cmd.end()?;
        core.transfer.flush()?;

        let fence = core.queue.current_frame().in_flight_fence();
        let buffers = [cmd.handle()];
        let (Some(index), Some(swapchain)) = (image_index, core.swapchain.as_ref()) else {
            return submit_frame(core, &SubmitInfo { command_buffers: &buffers, ..Default::default() }, fence);
        };

        let wait = [(swapchain.image_available_semaphore(slot)?, PipelineStage::ColorAttachmentOutput)];
        let signal = [swapchain.render_finished_semaphore(index)?];
        submit_frame(
            core,
            &SubmitInfo {
                command_buffers: &buffers,
                wait_semaphores: &wait,
                signal_semaphores: &signal,
            },
            fence,
        )?;

        match swapchain.present(core.queue.handle(), index)? {
            PresentResult::Presented => {}
            PresentResult::Suboptimal | PresentResult::OutOfDate => {
                engine_debug!("mgp::InFlightSync", "Swapchain stale on present, rebuilding next frame");
                self.rebuild_pending = true;
            }
        }
        Ok(())
    }

    /// Swapchain image acquired by the last `begin`, if any
    pub fn image_index(&self) -> Option<u32> {
        self.image_index
    }

    /// Rebuild the swapchain at the start of the next frame (window resized)
    pub fn request_rebuild(&mut self) {
        self.rebuild_pending = true;
    }

    pub fn rebuild_pending(&self) -> bool {
        self.rebuild_pending
    }
}

/// Reset the slot fence and submit with it
///
/// A rejected submit is followed by an empty one on the same fence, so the
/// next `begin` on the slot does not wait on a fence nothing will signal.
fn submit_frame(core: &RenderCore, info: &SubmitInfo<'_>, fence: FenceHandle) -> Result<()> {
    core.device.reset_fence(fence)?;
    if let Err(err) = core.queue.submit(info, Some(fence)) {
        if core.queue.submit(&SubmitInfo::default(), Some(fence)).is_err() {
            engine_warn!("mgp::InFlightSync", "Frame fence left unsignaled after a failed submit");
        }
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
#[path = "in_flight_sync_tests.rs"]
mod tests;
