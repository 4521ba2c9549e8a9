/// TransferQueue - background uploads through a staging ring
///
/// Uploads copy their bytes into the [`StagingRing`] and record the GPU copy
/// into the open batch. `flush` submits the batch with its own fence and
/// returns an [`UploadTicket`]; nothing blocks until the ring runs out of
/// room, at which point the oldest batch is waited on. `poll` retires
/// finished batches, gives their ring space back and runs completion
/// callbacks.
///
/// Batches go to the graphics queue, so a frame submitted after a flush sees
/// the uploaded data without extra semaphores.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use crate::device::{
    BufferCopy, BufferHandle, BufferImageCopy, CommandBufferHandle, CommandPoolHandle, Device, FenceHandle,
    ImageLayout, QueueInfo, SubmitInfo,
};
use crate::error::{Error, Result};
use crate::resource::Image;
use crate::sync::{CommandBuffer, StagingRing};
use crate::{engine_debug, engine_trace, engine_warn};

/// Slot index reported by transfer command buffers
const TRANSFER_SLOT: usize = usize::MAX;

/// Staging offset alignment (covers every texel size in use)
const STAGING_ALIGNMENT: u64 = 16;

/// Identifies the batch an upload was recorded into
///
/// Tickets grow monotonically. `UploadTicket::default()` (ticket 0) is
/// always complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct UploadTicket(u64);

impl UploadTicket {
    pub fn value(&self) -> u64 {
        self.0
    }
}

type Callback = Box<dyn FnOnce() + Send>;

struct Batch {
    ticket: u64,
    cmd: CommandBufferHandle,
    fence: FenceHandle,
    ring_mark: u64,
    callbacks: Vec<Callback>,
}

pub struct TransferQueue {
    device: Arc<dyn Device>,
    queue: QueueInfo,
    pool: CommandPoolHandle,
    ring: StagingRing,
    generation: Arc<AtomicU64>,

    /// Batch being recorded
    open: Option<CommandBuffer>,
    open_uploads: usize,
    open_callbacks: Vec<Callback>,
    /// Ring offset of the open batch's first reservation
    open_ring_start: Option<u64>,

    in_flight: VecDeque<Batch>,
    free_buffers: Vec<CommandBufferHandle>,
    free_fences: Vec<FenceHandle>,

    next_ticket: u64,
    completed: u64,
}

impl TransferQueue {
    /// # Arguments
    ///
    /// * `ring_size` - Staging ring size in bytes; also the largest single upload
    pub fn new(device: Arc<dyn Device>, ring_size: u64) -> Result<Self> {
        let queue = device.graphics_queue();
        let pool = device.create_command_pool(queue.family)?;
        let ring = match StagingRing::new(device.clone(), ring_size) {
            Ok(ring) => ring,
            Err(e) => {
                device.destroy_command_pool(pool);
                return Err(e);
            }
        };
        engine_debug!("mgp::TransferQueue", "Staging ring of {} KiB", ring_size / 1024);

        Ok(Self {
            device,
            queue,
            pool,
            ring,
            generation: Arc::new(AtomicU64::new(0)),
            open: None,
            open_uploads: 0,
            open_callbacks: Vec::new(),
            open_ring_start: None,
            in_flight: VecDeque::new(),
            free_buffers: Vec::new(),
            free_fences: Vec::new(),
            next_ticket: 1,
            completed: 0,
        })
    }

    // ===== UPLOADS =====

    /// Copy `data` into `dst` at `dst_offset`
    ///
    /// # Returns
    ///
    /// The ticket of the batch the copy was recorded into.
    pub fn upload_buffer(&mut self, dst: BufferHandle, dst_offset: u64, data: &[u8]) -> Result<UploadTicket> {
        let src_offset = self.stage(data)?;
        let src = self.ring.buffer();
        let cmd = self.open_batch()?;
        cmd.copy_buffer(src, dst, &[BufferCopy { src_offset, dst_offset, size: data.len() as u64 }])?;
        self.open_uploads += 1;
        Ok(UploadTicket(self.next_ticket))
    }

    /// Fill mip 0 of every layer of `image` and leave it shader-readable
    ///
    /// `data` holds the layers back to back, tightly packed. The image's
    /// tracked layout becomes `ShaderReadOnly` as soon as the copy is
    /// recorded, so the batch must be flushed before a frame that samples
    /// the image is submitted.
    pub fn upload_image(&mut self, image: &mut Image, data: &[u8]) -> Result<UploadTicket> {
        let info = image.info();
        let expected = info.width as u64
            * info.height as u64
            * info.depth as u64
            * info.array_layers as u64
            * info.format.bytes_per_texel() as u64;
        if data.len() as u64 != expected {
            return Err(Error::InvalidResource(format!(
                "image '{}' upload expects {} bytes, got {}",
                image.name(),
                expected,
                data.len()
            )));
        }
        let region = BufferImageCopy {
            buffer_offset: 0,
            aspect: image.aspect(),
            mip_level: 0,
            base_layer: 0,
            layer_count: info.array_layers,
            width: info.width,
            height: info.height,
            depth: info.depth,
        };

        let buffer_offset = self.stage(data)?;
        let src = self.ring.buffer();
        let cmd = self.open_batch()?;
        cmd.transition_image(image, ImageLayout::TransferDst)?;
        cmd.copy_buffer_to_image(
            src,
            image.handle(),
            ImageLayout::TransferDst,
            &[BufferImageCopy { buffer_offset, ..region }],
        )?;
        cmd.transition_image(image, ImageLayout::ShaderReadOnly)?;
        self.open_uploads += 1;
        Ok(UploadTicket(self.next_ticket))
    }

    /// Reserve ring space and copy `data` into it
    ///
    /// Flushes the open batch and waits on the oldest in-flight batch until
    /// the ring has room.
    fn stage(&mut self, data: &[u8]) -> Result<u64> {
        let size = data.len() as u64;
        if size == 0 {
            return Err(Error::InvalidResource("empty upload".to_string()));
        }
        if size > self.ring.size() {
            return Err(Error::InvalidResource(format!(
                "upload of {} bytes exceeds the {} byte staging ring",
                size,
                self.ring.size()
            )));
        }

        loop {
            if let Some(offset) = self.ring.allocate(size, STAGING_ALIGNMENT) {
                self.open_ring_start.get_or_insert(offset);
                self.ring.write(offset, data)?;
                return Ok(offset);
            }
            if self.open_uploads > 0 {
                self.flush()?;
            }
            let Some(oldest) = self.in_flight.front() else {
                return Err(Error::InvalidResource("staging ring full with no batch in flight".to_string()));
            };
            engine_trace!("mgp::TransferQueue", "Staging ring full, waiting for batch {}", oldest.ticket);
            self.device.wait_for_fence(oldest.fence, u64::MAX)?;
            self.poll()?;
        }
    }

    fn open_batch(&mut self) -> Result<&mut CommandBuffer> {
        if self.open.is_none() {
            let handle = match self.free_buffers.pop() {
                Some(handle) => handle,
                None => {
                    let mut buffers = self.device.allocate_command_buffers(self.pool, 1)?;
                    buffers
                        .pop()
                        .ok_or_else(|| Error::BackendError("no command buffer allocated".to_string()))?
                }
            };
            let mut cmd = CommandBuffer::new(self.device.clone(), handle, TRANSFER_SLOT, self.generation.clone());
            cmd.begin()?;
            self.open = Some(cmd);
        }
        self.open
            .as_mut()
            .ok_or_else(|| Error::BackendError("transfer batch not open".to_string()))
    }

    // ===== SUBMISSION =====

    /// Submit the open batch
    ///
    /// # Returns
    ///
    /// The ticket of the submitted batch, or of the newest earlier batch if
    /// nothing was recorded since the last flush.
    pub fn flush(&mut self) -> Result<UploadTicket> {
        let Some(mut cmd) = self.open.take() else {
            return Ok(UploadTicket(self.next_ticket - 1));
        };
        if let Err(e) = cmd.end() {
            self.free_buffers.push(cmd.handle());
            self.discard_open(&e);
            return Err(e);
        }

        let fence = match self.free_fences.pop() {
            Some(fence) => fence,
            None => self.device.create_fence(false)?,
        };
        let buffers = [cmd.handle()];
        if let Err(e) = self.device.submit(
            self.queue.handle,
            &SubmitInfo { command_buffers: &buffers, ..Default::default() },
            Some(fence),
        ) {
            self.free_fences.push(fence);
            self.free_buffers.push(cmd.handle());
            self.discard_open(&e);
            return Err(e);
        }

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        engine_trace!("mgp::TransferQueue", "Submitted batch {} ({} uploads)", ticket, self.open_uploads);
        self.in_flight.push_back(Batch {
            ticket,
            cmd: cmd.handle(),
            fence,
            ring_mark: self.ring.mark(),
            callbacks: std::mem::take(&mut self.open_callbacks),
        });
        self.open_uploads = 0;
        self.open_ring_start = None;
        Ok(UploadTicket(ticket))
    }

    /// Forget the batch that failed to submit and give its ring space back
    fn discard_open(&mut self, err: &Error) {
        if let Some(start) = self.open_ring_start.take() {
            self.ring.rewind(start);
        }
        engine_warn!(
            "mgp::TransferQueue",
            "Dropped {} uploads and {} completion callbacks of a batch that failed to submit: {}",
            self.open_uploads,
            self.open_callbacks.len(),
            err
        );
        self.open_uploads = 0;
        self.open_callbacks.clear();
    }

    /// Retire finished batches in submission order
    ///
    /// # Returns
    ///
    /// The number of batches retired.
    pub fn poll(&mut self) -> Result<usize> {
        let mut retired = 0;
        while let Some(batch) = self.in_flight.front() {
            if !self.device.fence_signaled(batch.fence)? {
                break;
            }
            let Some(batch) = self.in_flight.pop_front() else {
                break;
            };
            self.device.reset_fence(batch.fence)?;
            self.free_fences.push(batch.fence);
            self.free_buffers.push(batch.cmd);
            self.ring.release(batch.ring_mark);
            self.completed = batch.ticket;
            for callback in batch.callbacks {
                callback();
            }
            retired += 1;
        }
        Ok(retired)
    }

    /// Block until the batch of `ticket` has completed
    ///
    /// Flushes first if the ticket belongs to the open batch.
    pub fn wait(&mut self, ticket: UploadTicket) -> Result<()> {
        if self.is_complete(ticket) {
            return Ok(());
        }
        if ticket.0 >= self.next_ticket {
            self.flush()?;
        }
        while !self.is_complete(ticket) {
            let Some(oldest) = self.in_flight.front() else {
                break;
            };
            self.device.wait_for_fence(oldest.fence, u64::MAX)?;
            self.poll()?;
        }
        Ok(())
    }

    /// True once the batch of `ticket` has been retired by `poll`
    pub fn is_complete(&self, ticket: UploadTicket) -> bool {
        ticket.0 <= self.completed
    }

    /// Run `callback` from `poll` once the batch of `ticket` completes
    ///
    /// Runs immediately if it already has.
    pub fn on_complete<F>(&mut self, ticket: UploadTicket, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_complete(ticket) {
            callback();
            return;
        }
        match self.in_flight.iter_mut().find(|b| b.ticket == ticket.0) {
            Some(batch) => batch.callbacks.push(Box::new(callback)),
            None => self.open_callbacks.push(Box::new(callback)),
        }
    }

    /// Uploads recorded but not yet flushed
    pub fn pending_uploads(&self) -> usize {
        self.open_uploads
    }

    pub fn batches_in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn ring(&self) -> &StagingRing {
        &self.ring
    }
}

impl Drop for TransferQueue {
    fn drop(&mut self) {
        if !self.in_flight.is_empty() {
            if let Err(e) = self.device.wait_idle() {
                engine_warn!("mgp::TransferQueue", "wait_idle failed during teardown: {}", e);
            }
        }
        for batch in self.in_flight.drain(..) {
            self.device.destroy_fence(batch.fence);
        }
        for fence in self.free_fences.drain(..) {
            self.device.destroy_fence(fence);
        }
        self.device.destroy_command_pool(self.pool);
    }
}

#[cfg(test)]
#[path = "transfer_queue_tests.rs"]
mod tests;
