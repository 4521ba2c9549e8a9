//! Error types for the MGP engine
//!
//! Every fallible engine operation returns [`Result`]. Conditions the render loop
//! can recover from (stale swapchain, exhausted descriptor pool) are handled
//! inside the components; everything else surfaces here and is left to the
//! application to report or abort on.

use std::fmt;

/// Result type for MGP engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// MGP engine errors
#[derive(Debug, Clone)]
pub enum Error {
    /// Backend-specific error (Vulkan result codes, driver failures)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (stale id, destroyed handle, bad description)
    InvalidResource(String),

    /// Initialization failed (instance, device, swapchain, subsystems)
    InitializationFailed(String),

    /// A descriptor pool could not satisfy an allocation, even after rotation
    DescriptorPoolExhausted(String),

    /// A bindless resource class ran out of descriptor slots
    BindlessCapacityExceeded {
        /// Resource class name ("buffer", "sampler", "texture2d", "cubemap")
        class: &'static str,
        /// Slots available for that class
        capacity: u32,
    },

    /// Recording into a command buffer whose frame slot has been reset since
    StaleCommandBuffer {
        /// Frame-in-flight slot the buffer came from
        slot: usize,
        /// Generation stamped on the buffer
        generation: u64,
        /// Current generation of the slot
        current: u64,
    },

    /// A frame slot was reset while the GPU may still read its command buffers
    FrameInFlight(usize),

    /// The render graph has a cycle or an unsatisfiable read
    InvalidRenderGraph(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::DescriptorPoolExhausted(msg) => write!(f, "Descriptor pool exhausted: {}", msg),
            Error::BindlessCapacityExceeded { class, capacity } => {
                write!(f, "Bindless capacity exceeded: {} slots of class '{}' in use", capacity, class)
            }
            Error::StaleCommandBuffer { slot, generation, current } => write!(
                f,
                "Stale command buffer: slot {} generation {} (slot is at generation {})",
                slot, generation, current
            ),
            Error::FrameInFlight(slot) => {
                write!(f, "Frame slot {} reset while its in-flight fence is unsignaled", slot)
            }
            Error::InvalidRenderGraph(msg) => write!(f, "Invalid render graph: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
