/// Command recording, frames in flight and GPU/CPU synchronization

pub mod command_buffer;
pub mod frame_data;
pub mod queue;
pub mod in_flight_sync;
pub mod instant_submit_sync;
pub mod staging_ring;
pub mod transfer_queue;

pub use command_buffer::CommandBuffer;
pub use frame_data::FrameData;
pub use queue::Queue;
pub use in_flight_sync::InFlightSync;
pub use instant_submit_sync::InstantSubmitSync;
pub use staging_ring::StagingRing;
pub use transfer_queue::{TransferQueue, UploadTicket};
