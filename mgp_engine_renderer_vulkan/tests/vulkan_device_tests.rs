//! Integration tests for VulkanDevice
//!
//! These tests drive the real device through the core `Device` trait and
//! `RenderCore`. All of them require a GPU and are marked with #[ignore].
//!
//! Run with: cargo test --test vulkan_device_tests -- --ignored

use std::sync::Arc;

use mgp_engine::mgp::Config;
use mgp_engine::mgp::render::{
    BufferCopy, BufferInfo, BufferUsage, Device, Format, ImageInfo, ImageTiling, ImageType, ImageUsage,
    InFlightSync, MemoryLocation, Platform, RenderCore, SampleCount,
};
use mgp_engine_renderer_vulkan::mgp::{VulkanDevice, WinitPlatform};
use winit::event_loop::EventLoop;
use winit::window::Window;

fn test_config() -> Config {
    Config {
        app_name: "mgp device tests".to_string(),
        enable_validation: false,
        staging_ring_size: 1024 * 1024,
        ..Config::default()
    }
}

fn headless_device() -> Arc<VulkanDevice> {
    Arc::new(VulkanDevice::headless(&test_config()).unwrap())
}

/// Hidden window for the presentation tests
#[allow(deprecated)]
fn create_test_window() -> (Arc<Window>, EventLoop<()>) {
    let event_loop = EventLoop::new().unwrap();
    let attributes = Window::default_attributes()
        .with_title("mgp device test")
        .with_inner_size(winit::dpi::PhysicalSize::new(640, 480))
        .with_visible(false);
    let window = event_loop.create_window(attributes).unwrap();
    (Arc::new(window), event_loop)
}

fn buffer_info(size: u64, usage: BufferUsage, location: MemoryLocation, name: &str) -> BufferInfo {
    BufferInfo { size, usage, location, name: name.to_string() }
}

// ============================================================================
// DEVICE
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_headless_device_has_no_swapchain() {
    let device = headless_device();
    let result = device.create_swapchain(&mgp_engine::mgp::render::SwapchainInfo {
        width: 64,
        height: 64,
        preferred_format: Format::B8G8R8A8_SRGB,
        present_mode: mgp_engine::mgp::render::PresentMode::Fifo,
        old_swapchain: None,
    });
    assert!(result.is_err());
    assert_eq!(device.validation_stats().total(), 0);
}

#[test]
#[ignore] // Requires GPU
fn test_mapped_buffer_write_read() {
    let device = headless_device();
    let buffer = device
        .create_buffer(&buffer_info(64, BufferUsage::UNIFORM, MemoryLocation::CpuToGpu, "mapped"))
        .unwrap();

    let data: Vec<u8> = (0..32).collect();
    device.write_buffer(buffer, 16, &data).unwrap();
    let mut out = vec![0u8; 32];
    device.read_buffer(buffer, 16, &mut out).unwrap();
    assert_eq!(out, data);

    assert!(device.write_buffer(buffer, 48, &data).is_err());
    device.destroy_buffer(buffer);
}

#[test]
#[ignore] // Requires GPU
fn test_gpu_only_buffer_is_not_mapped() {
    let device = headless_device();
    let buffer = device
        .create_buffer(&buffer_info(16, BufferUsage::STORAGE, MemoryLocation::GpuOnly, "device_local"))
        .unwrap();
    assert!(device.write_buffer(buffer, 0, &[1, 2, 3, 4]).is_err());
    assert_eq!(device.buffer_device_address(buffer), None);
    device.destroy_buffer(buffer);
}

#[test]
#[ignore] // Requires GPU
fn test_device_address_buffer() {
    let device = headless_device();
    let buffer = device
        .create_buffer(&buffer_info(
            256,
            BufferUsage::STORAGE | BufferUsage::DEVICE_ADDRESS,
            MemoryLocation::GpuOnly,
            "addressed",
        ))
        .unwrap();
    let address = device.buffer_device_address(buffer).unwrap();
    assert_ne!(address, 0);
    device.destroy_buffer(buffer);
}

#[test]
#[ignore] // Requires GPU
fn test_fence_timeout_reports_false() {
    let device = headless_device();
    let fence = device.create_fence(false).unwrap();
    assert!(!device.fence_signaled(fence).unwrap());
    assert!(!device.wait_for_fence(fence, 1_000).unwrap());
    device.destroy_fence(fence);

    let signaled = device.create_fence(true).unwrap();
    assert!(device.wait_for_fence(signaled, 0).unwrap());
    device.destroy_fence(signaled);
}

#[test]
#[ignore] // Requires GPU
fn test_pipeline_cache_data_is_available() {
    let device = headless_device();
    assert!(device.pipeline_cache_data().is_ok());
}

// ============================================================================
// RENDER CORE ON A REAL DEVICE
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_upload_then_copy_back() {
    let device = headless_device();
    let mut core = RenderCore::new(device.clone(), None, test_config()).unwrap();

    let gpu = core
        .create_buffer(
            buffer_info(256, BufferUsage::STORAGE | BufferUsage::TRANSFER_SRC | BufferUsage::TRANSFER_DST, MemoryLocation::GpuOnly, "target"),
            false,
        )
        .unwrap();
    let readback = core
        .create_buffer(buffer_info(256, BufferUsage::TRANSFER_DST, MemoryLocation::GpuToCpu, "readback"), false)
        .unwrap();

    let data: Vec<u8> = (0..=255).collect();
    let ticket = core.upload_buffer(gpu, 0, &data).unwrap();
    core.transfer_mut().wait(ticket).unwrap();

    let src = core.arena().buffer(gpu).unwrap().handle();
    let dst = core.arena().buffer(readback).unwrap().handle();
    core.instant_submit(|cmd| cmd.copy_buffer(src, dst, &[BufferCopy { src_offset: 0, dst_offset: 0, size: 256 }]))
        .unwrap();

    let mut out = vec![0u8; 256];
    device.read_buffer(dst, 0, &mut out).unwrap();
    assert_eq!(out, data);

    core.destroy_buffer(gpu).unwrap();
    core.destroy_buffer(readback).unwrap();
    core.wait_idle().unwrap();
}

#[test]
#[ignore] // Requires GPU
fn test_image_upload_and_bindless_view() {
    let device = headless_device();
    let mut core = RenderCore::new(device, None, test_config()).unwrap();

    let image = core
        .create_image(
            ImageInfo {
                image_type: ImageType::Tex2D,
                width: 4,
                height: 4,
                depth: 1,
                format: Format::R8G8B8A8_UNORM,
                tiling: ImageTiling::Optimal,
                mip_levels: 1,
                array_layers: 1,
                samples: SampleCount::S1,
                usage: ImageUsage::SAMPLED | ImageUsage::TRANSFER_DST,
                transient: false,
            },
            "checker",
        )
        .unwrap();
    let view = core.standard_view(image).unwrap();
    assert!(core.arena().view(view).unwrap().bindless().is_some());

    let pixels = vec![0xFFu8; 4 * 4 * 4];
    let ticket = core.upload_image(image, &pixels).unwrap();
    core.transfer_mut().wait(ticket).unwrap();

    core.destroy_image(image).unwrap();
    core.wait_idle().unwrap();
}

#[test]
#[ignore] // Requires GPU
fn test_headless_frames() {
    let device = headless_device();
    let mut core = RenderCore::new(device, None, test_config()).unwrap();
    let mut sync = InFlightSync::new();

    for _ in 0..8 {
        let cmd = sync.begin(&mut core).unwrap();
        sync.present(&mut core, cmd).unwrap();
        core.next_frame().unwrap();
    }
    assert_eq!(core.frame_number(), 8);
    core.wait_idle().unwrap();
}

#[test]
#[ignore] // Requires GPU
fn test_windowed_frames_present() {
    let (window, _event_loop) = create_test_window();
    let config = test_config();
    let device = Arc::new(VulkanDevice::new(window.as_ref(), &config).unwrap());
    let platform: Arc<dyn Platform> = Arc::new(WinitPlatform::new(window.clone()));
    let mut core = RenderCore::new(device, Some(platform), config).unwrap();

    let (width, height) = core.swapchain().unwrap().extent();
    assert!(width > 0 && height > 0);

    let mut sync = InFlightSync::new();
    for _ in 0..4 {
        let cmd = sync.begin(&mut core).unwrap();
        sync.present(&mut core, cmd).unwrap();
        core.next_frame().unwrap();
    }
    core.wait_idle().unwrap();
}
