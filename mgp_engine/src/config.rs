/// Engine configuration
///
/// One `Config` value is handed to the backend constructor and to
/// [`RenderCore::new`](crate::mgp::render::RenderCore::new). Nothing reads it
/// from the environment; the application owns where the values come from.

use std::path::PathBuf;
use crate::device::{PresentMode, SampleCount};

/// Validation layer message severity filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugSeverity {
    /// Only errors
    ErrorsOnly,
    /// Errors and warnings
    ErrorsAndWarnings,
    /// Everything, including info and verbose
    All,
}

/// Where validation messages go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugOutput {
    /// Coloured stderr
    Console,
    /// Appended to a file
    File(String),
    /// Both stderr and a file
    Both(String),
}

/// Validation message categories to display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugMessageFilter {
    pub show_general: bool,
    pub show_validation: bool,
    pub show_performance: bool,
}

impl Default for DebugMessageFilter {
    fn default() -> Self {
        Self {
            show_general: true,
            show_validation: true,
            show_performance: true,
        }
    }
}

/// Validation message counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
}

impl ValidationStats {
    /// Sum of all counters
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }

    /// True when at least one error was reported
    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Application name reported to the driver
    pub app_name: String,
    /// Application version (major, minor, patch)
    pub app_version: (u32, u32, u32),

    /// Number of frame slots recorded ahead of the GPU
    pub frames_in_flight: usize,

    /// Descriptor slots per bindless resource class
    pub bindless_capacity: u32,

    /// Set capacity of the first dynamic descriptor pool
    pub initial_sets_per_pool: u32,
    /// Upper bound for the doubling dynamic pool size
    pub max_sets_per_pool: u32,

    /// Graphics pipelines kept before least-recently-used eviction (0 = unbounded)
    pub pipeline_cache_capacity: usize,
    /// Driver pipeline cache blob, loaded at device creation and saved on request
    pub pipeline_cache_path: Option<PathBuf>,

    /// Sample count of the swapchain colour/depth target
    pub msaa_samples: SampleCount,
    /// Presentation mode requested for the swapchain
    pub present_mode: PresentMode,

    /// Size in bytes of the transfer staging ring
    pub staging_ring_size: u64,

    /// Enable validation layers and the debug messenger
    pub enable_validation: bool,
    pub debug_severity: DebugSeverity,
    pub debug_output: DebugOutput,
    pub debug_message_filter: DebugMessageFilter,
    /// Abort the process on the first validation error
    pub break_on_validation_error: bool,
    /// Panic on the first validation error
    pub panic_on_error: bool,
    /// Count validation messages per severity
    pub enable_validation_stats: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "mgp".to_string(),
            app_version: (0, 1, 0),
            frames_in_flight: 3,
            bindless_capacity: 65536,
            initial_sets_per_pool: 64,
            max_sets_per_pool: 4092,
            pipeline_cache_capacity: 1024,
            pipeline_cache_path: None,
            msaa_samples: SampleCount::S4,
            present_mode: PresentMode::Fifo,
            staging_ring_size: 32 * 1024 * 1024,
            enable_validation: cfg!(debug_assertions),
            debug_severity: DebugSeverity::ErrorsAndWarnings,
            debug_output: DebugOutput::Console,
            debug_message_filter: DebugMessageFilter::default(),
            break_on_validation_error: false,
            panic_on_error: false,
            enable_validation_stats: false,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
