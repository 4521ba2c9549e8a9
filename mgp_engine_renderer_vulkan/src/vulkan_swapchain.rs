/// Swapchain creation against the device surface
///
/// Only the Vulkan objects live here. Image import, MSAA and depth targets,
/// semaphores and rebuild policy are handled by the core `Swapchain`.

use ash::vk;
use ash::vk::Handle;
use mgp_engine::mgp::{Error, Result};
use mgp_engine::mgp::render::{Format, ImageHandle, SwapchainHandle, SwapchainImages, SwapchainInfo};
use mgp_engine::{engine_debug, engine_err, engine_error};

use crate::vulkan_context::Surface;
use crate::vulkan_format::{format_from_vk, format_to_vk, present_mode_to_vk};

/// Pick the surface format, preferring `preferred` in the sRGB colour space
///
/// Falls back to the first format the engine has a name for.
pub(crate) fn choose_surface_format(
    available: &[vk::SurfaceFormatKHR],
    preferred: Format,
) -> Option<(vk::SurfaceFormatKHR, Format)> {
    let wanted = format_to_vk(preferred);
    available
        .iter()
        .find(|f| f.format == wanted && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
        .map(|f| (*f, preferred))
        .or_else(|| {
            available
                .iter()
                .find_map(|f| format_from_vk(f.format).map(|format| (*f, format)))
        })
}

/// Requested present mode if supported, FIFO otherwise
pub(crate) fn choose_present_mode(
    available: &[vk::PresentModeKHR],
    requested: mgp_engine::mgp::render::PresentMode,
) -> vk::PresentModeKHR {
    let wanted = present_mode_to_vk(requested);
    if available.contains(&wanted) {
        wanted
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// Surface extent: the current extent when the surface fixes it, else the
/// requested size clamped to the allowed range
pub(crate) fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, width: u32, height: u32) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: width.clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
        height: height.clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
    }
}

/// One more image than the minimum, within the maximum (0 = unbounded)
pub(crate) fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        count.min(capabilities.max_image_count)
    } else {
        count
    }
}

/// Create a swapchain and fetch its images
///
/// # Safety
///
/// `surface` and `loader` must belong to `physical_device`'s instance and
/// device; `info.old_swapchain`, when set, must be a live swapchain.
pub(crate) unsafe fn create_swapchain(
    physical_device: vk::PhysicalDevice,
    surface: &Surface,
    loader: &ash::khr::swapchain::Device,
    info: &SwapchainInfo,
) -> Result<SwapchainImages> {
    let capabilities = surface
        .loader
        .get_physical_device_surface_capabilities(physical_device, surface.handle)
        .map_err(|e| engine_err!("mgp::vulkan", "Failed to get surface capabilities: {:?}", e))?;
    let formats = surface
        .loader
        .get_physical_device_surface_formats(physical_device, surface.handle)
        .map_err(|e| engine_err!("mgp::vulkan", "Failed to get surface formats: {:?}", e))?;
    let present_modes = surface
        .loader
        .get_physical_device_surface_present_modes(physical_device, surface.handle)
        .map_err(|e| engine_err!("mgp::vulkan", "Failed to get present modes: {:?}", e))?;

    let (surface_format, format) = choose_surface_format(&formats, info.preferred_format).ok_or_else(|| {
        engine_error!("mgp::vulkan", "Surface offers no usable colour format");
        Error::InitializationFailed("Surface offers no usable colour format".to_string())
    })?;
    let extent = choose_extent(&capabilities, info.width, info.height);
    let present_mode = choose_present_mode(&present_modes, info.present_mode);
    let old = info
        .old_swapchain
        .map(|h| vk::SwapchainKHR::from_raw(h.as_raw()))
        .unwrap_or_else(vk::SwapchainKHR::null);

    let create_info = vk::SwapchainCreateInfoKHR::default()
        .surface(surface.handle)
        .min_image_count(choose_image_count(&capabilities))
        .image_format(surface_format.format)
        .image_color_space(surface_format.color_space)
        .image_extent(extent)
        .image_array_layers(1)
        .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
        .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        .pre_transform(capabilities.current_transform)
        .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
        .present_mode(present_mode)
        .clipped(true)
        .old_swapchain(old);

    let swapchain = loader
        .create_swapchain(&create_info, None)
        .map_err(|e| engine_err!("mgp::vulkan", "Failed to create swapchain: {:?}", e))?;
    let images = match loader.get_swapchain_images(swapchain) {
        Ok(images) => images,
        Err(e) => {
            loader.destroy_swapchain(swapchain, None);
            return Err(engine_err!("mgp::vulkan", "Failed to get swapchain images: {:?}", e));
        }
    };

    engine_debug!(
        "mgp::vulkan",
        "Swapchain created: {}x{} {:?}, {} images, {:?}",
        extent.width,
        extent.height,
        format,
        images.len(),
        present_mode
    );

    Ok(SwapchainImages {
        handle: SwapchainHandle::from_raw(swapchain.as_raw()),
        format,
        width: extent.width,
        height: extent.height,
        images: images.iter().map(|i| ImageHandle::from_raw(i.as_raw())).collect(),
    })
}

#[cfg(test)]
#[path = "vulkan_swapchain_tests.rs"]
mod tests;
