/// Resource module - GPU resources owned by a generation-checked arena

pub mod image;
pub mod buffer;
pub mod sampler;
pub mod deletion_queue;
pub mod arena;

pub use image::{Image, ImageId, ImageView, ImageViewId, ViewRange};
pub use buffer::{BufferId, GpuBuffer};
pub use sampler::{Sampler, SamplerId};
pub use deletion_queue::{DeferredDestroy, DeletionQueue};
pub use arena::ResourceArena;
