/// Swapchain module - presentation and the platform interface

pub mod swapchain;

pub use swapchain::{Platform, Swapchain};
