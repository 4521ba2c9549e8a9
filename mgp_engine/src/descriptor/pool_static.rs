/// Fixed-capacity descriptor pool
///
/// For sets that are allocated once and kept (the bindless set, UI). Running
/// out is an error rather than a trigger to grow.

use std::sync::Arc;
use crate::device::{
    DescriptorAllocError, DescriptorPoolHandle, DescriptorPoolInfo, DescriptorSetHandle, DescriptorSetLayoutHandle,
    Device,
};
use crate::error::{Error, Result};
use crate::engine_error;

pub struct DescriptorPoolStatic {
    device: Arc<dyn Device>,
    pool: DescriptorPoolHandle,
    max_sets: u32,
    allocated: u32,
}

impl DescriptorPoolStatic {
    pub fn new(device: Arc<dyn Device>, info: &DescriptorPoolInfo) -> Result<Self> {
        let pool = device.create_descriptor_pool(info)?;
        Ok(Self {
            device,
            pool,
            max_sets: info.max_sets,
            allocated: 0,
        })
    }

    /// Allocate one set per layout
    ///
    /// # Errors
    ///
    /// `Error::DescriptorPoolExhausted` when the pool has no room left.
    pub fn allocate(
        &mut self,
        layouts: &[DescriptorSetLayoutHandle],
        variable_counts: Option<&[u32]>,
    ) -> Result<Vec<DescriptorSetHandle>> {
        match self.device.allocate_descriptor_sets(self.pool, layouts, variable_counts) {
            Ok(sets) => {
                self.allocated += sets.len() as u32;
                Ok(sets)
            }
            Err(DescriptorAllocError::OutOfPoolMemory) | Err(DescriptorAllocError::FragmentedPool) => {
                engine_error!(
                    "mgp::DescriptorPoolStatic",
                    "Static pool exhausted ({} of {} sets allocated)",
                    self.allocated,
                    self.max_sets
                );
                Err(Error::DescriptorPoolExhausted(format!(
                    "static pool full ({} of {} sets)",
                    self.allocated, self.max_sets
                )))
            }
            Err(DescriptorAllocError::Device(e)) => Err(e),
        }
    }

    /// Return every set to the pool
    pub fn reset(&mut self) -> Result<()> {
        self.device.reset_descriptor_pool(self.pool)?;
        self.allocated = 0;
        Ok(())
    }

    pub fn handle(&self) -> DescriptorPoolHandle {
        self.pool
    }

    pub fn allocated(&self) -> u32 {
        self.allocated
    }

    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }
}

impl Drop for DescriptorPoolStatic {
    fn drop(&mut self) {
        self.device.destroy_descriptor_pool(self.pool);
    }
}

#[cfg(test)]
#[path = "pool_static_tests.rs"]
mod tests;
