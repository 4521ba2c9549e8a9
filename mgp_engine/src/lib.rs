/*!
# MGP Engine

Core of the MGP rendering engine: GPU resource and pipeline lifecycle management.

This crate is platform-agnostic. It talks to the GPU only through the
[`Device`](mgp::render::Device) trait, which backend crates implement
(`mgp_engine_renderer_vulkan` provides the Vulkan 1.3 one).

## Architecture

- **ResourceArena**: images, views, buffers and samplers behind generation-checked ids
- **BindlessRegistry**: one update-after-bind descriptor set addressed by integer handles
- **DescriptorLayoutCache / DescriptorPool***: deduplicated layouts, growable pools
- **PipelineCache**: full-key graphics/compute pipeline cache with LRU eviction
- **Queue / FrameData / InFlightSync**: frames in flight and the frame boundary API
- **TransferQueue**: background uploads through a staging ring
- **RenderGraph**: per-frame DAG of passes with automatic layout transitions
- **RenderCore**: the context that owns all of the above

Nothing but the logger is global; components receive the device and each
other explicitly.
*/

// Internal modules
mod error;
mod engine;
mod config;
pub mod log;
pub mod device;
pub mod utils;
pub mod resource;
pub mod bindless;
pub mod descriptor;
pub mod pipeline;
pub mod sync;
pub mod render_graph;
pub mod swapchain;
pub mod render_core;

// Main mgp namespace module
pub mod mgp {
    // Error types
    pub use crate::error::{Error, Result};

    // Logger routing
    pub use crate::engine::Engine;

    // Configuration
    pub use crate::config::{
        Config, DebugSeverity, DebugOutput, DebugMessageFilter, ValidationStats,
    };

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    // Render sub-module with every engine component
    pub mod render {
        pub use crate::device::*;
        pub use crate::resource::*;
        pub use crate::bindless::*;
        pub use crate::descriptor::*;
        pub use crate::pipeline::*;
        pub use crate::sync::*;
        pub use crate::render_graph::*;
        pub use crate::swapchain::*;
        pub use crate::render_core::*;
    }
}

// Re-export math library at crate root
pub use glam;
