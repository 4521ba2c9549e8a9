/// StagingRing - persistently mapped upload ring buffer
///
/// Space is handed out at `head` and given back in FIFO order by moving
/// `tail` to a mark taken when a batch was closed. The live region is
/// `[tail, head)`, or `[tail, size) + [0, head)` once wrapped. A wrapped
/// allocation must end strictly before `tail`, so `head == tail` only ever
/// means empty, and an empty ring rewinds to offset 0.

use std::sync::Arc;
use crate::device::{BufferHandle, BufferInfo, BufferUsage, Device, MemoryLocation};
use crate::error::{Error, Result};

pub struct StagingRing {
    device: Arc<dyn Device>,
    buffer: BufferHandle,
    size: u64,
    head: u64,
    tail: u64,
}

fn align_up(value: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        value
    } else {
        value.div_ceil(alignment) * alignment
    }
}

impl StagingRing {
    pub fn new(device: Arc<dyn Device>, size: u64) -> Result<Self> {
        if size == 0 {
            return Err(Error::InitializationFailed("staging ring size must be non-zero".to_string()));
        }
        let buffer = device.create_buffer(&BufferInfo {
            size,
            usage: BufferUsage::TRANSFER_SRC,
            location: MemoryLocation::CpuToGpu,
            name: "staging_ring".to_string(),
        })?;
        Ok(Self {
            device,
            buffer,
            size,
            head: 0,
            tail: 0,
        })
    }

    /// Reserve `size` bytes aligned to `alignment`
    ///
    /// # Returns
    ///
    /// The offset of the reservation, or `None` if the ring has no
    /// contiguous room until older batches are released.
    pub fn allocate(&mut self, size: u64, alignment: u64) -> Option<u64> {
        if size == 0 || size > self.size {
            return None;
        }
        if self.is_empty() {
            self.head = 0;
            self.tail = 0;
        }

        let offset = align_up(self.head, alignment);
        if self.head >= self.tail {
            if offset + size <= self.size {
                self.head = offset + size;
                return Some(offset);
            }
            // Wrap to the start
            if size < self.tail {
                self.head = size;
                return Some(0);
            }
            return None;
        }

        if offset + size < self.tail {
            self.head = offset + size;
            return Some(offset);
        }
        None
    }

    /// Copy bytes into a reserved region
    pub fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        self.device.write_buffer(self.buffer, offset, data)
    }

    /// Current head, to be released once the work using it has completed
    pub fn mark(&self) -> u64 {
        self.head
    }

    /// Give back everything allocated before `mark` was taken
    pub fn release(&mut self, mark: u64) {
        self.tail = mark;
        if self.tail == self.head {
            self.head = 0;
            self.tail = 0;
        }
    }

    /// Drop every allocation made at or after `offset`, newest first
    ///
    /// `offset` must be the offset returned by an allocation that is still live.
    pub fn rewind(&mut self, offset: u64) {
        self.head = offset;
        if self.tail == self.head {
            self.head = 0;
            self.tail = 0;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    pub fn buffer(&self) -> BufferHandle {
        self.buffer
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn head(&self) -> u64 {
        self.head
    }

    pub fn tail(&self) -> u64 {
        self.tail
    }
}

impl Drop for StagingRing {
    fn drop(&mut self) {
        self.device.destroy_buffer(self.buffer);
    }
}

#[cfg(test)]
#[path = "staging_ring_tests.rs"]
mod tests;
