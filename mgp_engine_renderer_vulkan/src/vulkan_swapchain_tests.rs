use super::*;
use mgp_engine::mgp::render::PresentMode;

fn surface_format(format: vk::Format) -> vk::SurfaceFormatKHR {
    vk::SurfaceFormatKHR {
        format,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    }
}

fn capabilities(current: (u32, u32), min_images: u32, max_images: u32) -> vk::SurfaceCapabilitiesKHR {
    vk::SurfaceCapabilitiesKHR {
        min_image_count: min_images,
        max_image_count: max_images,
        current_extent: vk::Extent2D { width: current.0, height: current.1 },
        min_image_extent: vk::Extent2D { width: 1, height: 1 },
        max_image_extent: vk::Extent2D { width: 4096, height: 4096 },
        ..Default::default()
    }
}

#[test]
fn test_preferred_format_wins() {
    let available = [surface_format(vk::Format::R8G8B8A8_UNORM), surface_format(vk::Format::B8G8R8A8_SRGB)];
    let (chosen, format) = choose_surface_format(&available, Format::B8G8R8A8_SRGB).unwrap();
    assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
    assert_eq!(format, Format::B8G8R8A8_SRGB);
}

#[test]
fn test_unknown_formats_are_skipped() {
    let available = [
        surface_format(vk::Format::A2B10G10R10_UNORM_PACK32),
        surface_format(vk::Format::R8G8B8A8_UNORM),
    ];
    let (chosen, format) = choose_surface_format(&available, Format::B8G8R8A8_SRGB).unwrap();
    assert_eq!(chosen.format, vk::Format::R8G8B8A8_UNORM);
    assert_eq!(format, Format::R8G8B8A8_UNORM);

    assert!(choose_surface_format(&[surface_format(vk::Format::A2B10G10R10_UNORM_PACK32)], Format::B8G8R8A8_SRGB).is_none());
}

#[test]
fn test_present_mode_falls_back_to_fifo() {
    let available = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
    assert_eq!(choose_present_mode(&available, PresentMode::Immediate), vk::PresentModeKHR::IMMEDIATE);
    assert_eq!(choose_present_mode(&available, PresentMode::Mailbox), vk::PresentModeKHR::FIFO);
}

#[test]
fn test_extent_follows_surface_when_fixed() {
    let caps = capabilities((1280, 720), 2, 3);
    assert_eq!(choose_extent(&caps, 800, 600), vk::Extent2D { width: 1280, height: 720 });
}

#[test]
fn test_extent_clamped_when_surface_lets_us_choose() {
    let caps = capabilities((u32::MAX, u32::MAX), 2, 3);
    assert_eq!(choose_extent(&caps, 800, 600), vk::Extent2D { width: 800, height: 600 });
    assert_eq!(choose_extent(&caps, 9000, 0), vk::Extent2D { width: 4096, height: 1 });
}

#[test]
fn test_image_count() {
    assert_eq!(choose_image_count(&capabilities((1, 1), 2, 3)), 3);
    assert_eq!(choose_image_count(&capabilities((1, 1), 3, 3)), 3);
    // 0 = no upper bound
    assert_eq!(choose_image_count(&capabilities((1, 1), 2, 0)), 3);
}
