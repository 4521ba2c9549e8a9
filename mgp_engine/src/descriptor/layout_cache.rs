/// Descriptor set layout cache
///
/// Keys are the complete `DescriptorSetLayoutInfo`, so two descriptions share
/// a layout only if every binding matches. Layouts live until the cache is
/// dropped.

use std::sync::Arc;
use rustc_hash::FxHashMap;
use crate::device::{DescriptorSetLayoutHandle, DescriptorSetLayoutInfo, Device};
use crate::error::Result;
use crate::engine_trace;

pub struct DescriptorLayoutCache {
    device: Arc<dyn Device>,
    layouts: FxHashMap<DescriptorSetLayoutInfo, DescriptorSetLayoutHandle>,
    hits: u64,
    misses: u64,
}

impl DescriptorLayoutCache {
    pub fn new(device: Arc<dyn Device>) -> Self {
        Self {
            device,
            layouts: FxHashMap::default(),
            hits: 0,
            misses: 0,
        }
    }

    /// Get or create the layout described by `info`
    pub fn fetch(&mut self, info: &DescriptorSetLayoutInfo) -> Result<DescriptorSetLayoutHandle> {
        if let Some(layout) = self.layouts.get(info) {
            self.hits += 1;
            return Ok(*layout);
        }

        let layout = self.device.create_descriptor_set_layout(info)?;
        self.misses += 1;
        engine_trace!(
            "mgp::DescriptorLayoutCache",
            "Created set layout with {} bindings (update_after_bind={})",
            info.bindings.len(),
            info.update_after_bind
        );
        self.layouts.insert(info.clone(), layout);
        Ok(layout)
    }

    /// Layout with no bindings, used to fill unused set indices
    pub fn empty(&mut self) -> Result<DescriptorSetLayoutHandle> {
        self.fetch(&DescriptorSetLayoutInfo::default())
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}

impl Drop for DescriptorLayoutCache {
    fn drop(&mut self) {
        for (_, layout) in self.layouts.drain() {
            self.device.destroy_descriptor_set_layout(layout);
        }
    }
}

#[cfg(test)]
#[path = "layout_cache_tests.rs"]
mod tests;
