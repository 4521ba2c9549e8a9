/// Descriptor module - layout deduplication, pools and batched writes

pub mod layout_cache;
pub mod pool_static;
pub mod pool_dynamic;
pub mod writer;

pub use layout_cache::DescriptorLayoutCache;
pub use pool_static::DescriptorPoolStatic;
pub use pool_dynamic::{DescriptorPoolDynamic, PoolSizeRatio, PoolStats};
pub use writer::DescriptorWriter;
