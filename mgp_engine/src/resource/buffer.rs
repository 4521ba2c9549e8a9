/// GPU buffers tracked by the resource arena.

use slotmap::new_key_type;
use crate::bindless::BindlessHandle;
use crate::device::{BufferHandle, BufferUsage, MemoryLocation};
use crate::error::{Error, Result};

new_key_type! {
    /// Generation-checked id of a buffer in a `ResourceArena`.
    pub struct BufferId;
}

/// A GPU buffer with a fixed size and usage
#[derive(Debug)]
pub struct GpuBuffer {
    pub(crate) handle: BufferHandle,
    pub(crate) size: u64,
    pub(crate) usage: BufferUsage,
    pub(crate) location: MemoryLocation,
    pub(crate) device_address: Option<u64>,
    pub(crate) bindless: Option<BindlessHandle>,
    pub(crate) name: String,
}

impl GpuBuffer {
    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    /// Size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    pub fn location(&self) -> MemoryLocation {
        self.location
    }

    /// True if the CPU can write the buffer directly
    pub fn is_mapped(&self) -> bool {
        self.location != MemoryLocation::GpuOnly
    }

    /// Address for buffer-pointer access from shaders
    pub fn device_address(&self) -> Option<u64> {
        self.device_address
    }

    pub fn bindless(&self) -> Option<BindlessHandle> {
        self.bindless
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fails unless `len` bytes at `offset` lie inside the buffer
    pub fn check_range(&self, offset: u64, len: u64) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.size => Ok(()),
            _ => Err(Error::InvalidResource(format!(
                "{} bytes at {} overflow buffer '{}' ({} bytes)",
                len, offset, self.name, self.size
            ))),
        }
    }
}
