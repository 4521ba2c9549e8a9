/// Device module - the GPU backend boundary and the types that cross it

// Module declarations
pub mod handles;
pub mod types;
pub mod pipeline_state;
pub mod device;

#[cfg(test)]
pub(crate) mod mock_device;

// Re-export everything
pub use handles::*;
pub use types::*;
pub use pipeline_state::*;
pub use device::*;
