/// Growable descriptor pool
///
/// Pools are bucketed into `free` (empty, ready) and `used` (full, waiting
/// for `clear`). Allocation goes to the current pool; when the device reports
/// it out of memory or fragmented, the pool moves to `used`, a fresh one is
/// fetched and the allocation is retried once. Brand-new pools double in
/// size up to `max_sets_per_pool`.
///
/// Sets allocated here are transient: `clear` hands every pool back and
/// invalidates them. `RenderCore` keeps one dynamic pool per frame slot and
/// clears it when the slot comes around again.

use std::sync::Arc;
use crate::device::{
    DescriptorAllocError, DescriptorPoolHandle, DescriptorPoolInfo, DescriptorPoolSize, DescriptorSetHandle,
    DescriptorSetLayoutHandle, DescriptorType, Device,
};
use crate::error::{Error, Result};
use crate::{engine_debug, engine_error};

/// Share of a pool's descriptors given to one descriptor type
///
/// A pool of `n` sets holds `ceil(ratio * n)` descriptors of the type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolSizeRatio {
    pub descriptor_type: DescriptorType,
    pub ratio: f32,
}

impl PoolSizeRatio {
    /// A general-purpose mix for material and pass sets
    pub fn defaults() -> Vec<PoolSizeRatio> {
        vec![
            PoolSizeRatio { descriptor_type: DescriptorType::UniformBuffer, ratio: 3.0 },
            PoolSizeRatio { descriptor_type: DescriptorType::StorageBuffer, ratio: 3.0 },
            PoolSizeRatio { descriptor_type: DescriptorType::CombinedImageSampler, ratio: 4.0 },
            PoolSizeRatio { descriptor_type: DescriptorType::SampledImage, ratio: 2.0 },
            PoolSizeRatio { descriptor_type: DescriptorType::StorageImage, ratio: 1.0 },
            PoolSizeRatio { descriptor_type: DescriptorType::Sampler, ratio: 1.0 },
        ]
    }
}

/// Pool counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Times a full pool was swapped for another during an allocation
    pub rotations: u64,
    /// Pools created over the allocator's lifetime
    pub pools_created: u64,
}

pub struct DescriptorPoolDynamic {
    device: Arc<dyn Device>,
    ratios: Vec<PoolSizeRatio>,
    free: Vec<DescriptorPoolHandle>,
    used: Vec<DescriptorPoolHandle>,
    current: Option<DescriptorPoolHandle>,
    sets_per_pool: u32,
    max_sets_per_pool: u32,
    stats: PoolStats,
}

impl DescriptorPoolDynamic {
    /// # Arguments
    ///
    /// * `initial_sets_per_pool` - Capacity of the first pool
    /// * `max_sets_per_pool` - Cap for the doubling capacity
    /// * `ratios` - Descriptor mix of each pool
    pub fn new(
        device: Arc<dyn Device>,
        initial_sets_per_pool: u32,
        max_sets_per_pool: u32,
        ratios: Vec<PoolSizeRatio>,
    ) -> Self {
        let max_sets_per_pool = max_sets_per_pool.max(1);
        Self {
            device,
            ratios,
            free: Vec::new(),
            used: Vec::new(),
            current: None,
            sets_per_pool: initial_sets_per_pool.clamp(1, max_sets_per_pool),
            max_sets_per_pool,
            stats: PoolStats::default(),
        }
    }

    fn create_pool(&mut self) -> Result<DescriptorPoolHandle> {
        let max_sets = self.sets_per_pool;
        let sizes = self
            .ratios
            .iter()
            .map(|r| DescriptorPoolSize {
                descriptor_type: r.descriptor_type,
                count: ((r.ratio * max_sets as f32).ceil() as u32).max(1),
            })
            .collect();
        let pool = self.device.create_descriptor_pool(&DescriptorPoolInfo {
            max_sets,
            sizes,
            update_after_bind: false,
        })?;

        self.stats.pools_created += 1;
        self.sets_per_pool = (self.sets_per_pool.saturating_mul(2)).min(self.max_sets_per_pool);
        engine_debug!(
            "mgp::DescriptorPoolDynamic",
            "Created descriptor pool #{} with {} sets (next: {})",
            self.stats.pools_created,
            max_sets,
            self.sets_per_pool
        );
        Ok(pool)
    }

    /// A pool from the free list, or a new one
    fn fetch_pool(&mut self) -> Result<DescriptorPoolHandle> {
        match self.free.pop() {
            Some(pool) => Ok(pool),
            None => self.create_pool(),
        }
    }

    fn current_pool(&mut self) -> Result<DescriptorPoolHandle> {
        match self.current {
            Some(pool) => Ok(pool),
            None => {
                let pool = self.fetch_pool()?;
                self.current = Some(pool);
                Ok(pool)
            }
        }
    }

    /// Allocate one set per layout
    ///
    /// `variable_counts` gives the size of each set's variable-count binding.
    ///
    /// # Errors
    ///
    /// `Error::DescriptorPoolExhausted` if a fresh pool cannot hold the sets
    /// either.
    pub fn allocate(
        &mut self,
        layouts: &[DescriptorSetLayoutHandle],
        variable_counts: Option<&[u32]>,
    ) -> Result<Vec<DescriptorSetHandle>> {
        let pool = self.current_pool()?;
        match self.device.allocate_descriptor_sets(pool, layouts, variable_counts) {
            Ok(sets) => return Ok(sets),
            Err(DescriptorAllocError::Device(e)) => return Err(e),
            Err(DescriptorAllocError::OutOfPoolMemory) | Err(DescriptorAllocError::FragmentedPool) => {}
        }

        // Rotate once and retry.
        self.used.push(pool);
        self.current = None;
        self.stats.rotations += 1;
        let pool = self.current_pool()?;

        match self.device.allocate_descriptor_sets(pool, layouts, variable_counts) {
            Ok(sets) => Ok(sets),
            Err(DescriptorAllocError::Device(e)) => Err(e),
            Err(_) => {
                engine_error!(
                    "mgp::DescriptorPoolDynamic",
                    "Allocation of {} sets failed on a fresh pool",
                    layouts.len()
                );
                Err(Error::DescriptorPoolExhausted(format!(
                    "{} sets do not fit in a fresh pool",
                    layouts.len()
                )))
            }
        }
    }

    /// Reset every pool and return it to the free list
    ///
    /// Every set allocated since the last clear becomes invalid.
    pub fn clear(&mut self) -> Result<()> {
        if let Some(pool) = self.current.take() {
            self.used.push(pool);
        }
        while let Some(pool) = self.used.pop() {
            self.device.reset_descriptor_pool(pool)?;
            self.free.push(pool);
        }
        Ok(())
    }

    /// Destroy every pool
    pub fn destroy(&mut self) {
        let pools = self.current.take().into_iter().chain(self.free.drain(..)).chain(self.used.drain(..));
        for pool in pools {
            self.device.destroy_descriptor_pool(pool);
        }
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    /// Capacity the next created pool will get
    pub fn sets_per_pool(&self) -> u32 {
        self.sets_per_pool
    }

    pub fn free_pools(&self) -> usize {
        self.free.len()
    }

    pub fn used_pools(&self) -> usize {
        self.used.len()
    }
}

impl Drop for DescriptorPoolDynamic {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
#[path = "pool_dynamic_tests.rs"]
mod tests;
