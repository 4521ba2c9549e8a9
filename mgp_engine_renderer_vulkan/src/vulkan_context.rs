/// GpuContext - instance, physical device, logical device and allocator
///
/// Owns every Vulkan object whose lifetime is the whole device's: the
/// instance, the optional surface and debug messenger, the logical device
/// with its single graphics/present queue, and the memory allocator.
/// Destruction order is fixed in `Drop`: allocator, device, surface,
/// messenger, instance.

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use mgp_engine::mgp::{Config, Error, Result};
use mgp_engine::{engine_debug, engine_error, engine_info};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::ffi::CString;
use std::fmt::Debug;
use std::mem::ManuallyDrop;
use std::sync::Mutex;

#[cfg(feature = "vulkan-validation")]
use crate::debug::{DebugConfig, DebugState};

/// Presentation surface and its loader
pub(crate) struct Surface {
    pub handle: vk::SurfaceKHR,
    pub loader: ash::khr::surface::Instance,
}

/// Debug messenger and the state its callback reads
#[cfg(feature = "vulkan-validation")]
pub(crate) struct Messenger {
    loader: ash::ext::debug_utils::Instance,
    handle: vk::DebugUtilsMessengerEXT,
    pub state: Box<DebugState>,
}

/// Log an initialization failure and build the matching error
fn init_failed(what: &str, e: impl Debug) -> Error {
    engine_error!("mgp::vulkan", "{}: {:?}", what, e);
    Error::InitializationFailed(format!("{}: {:?}", what, e))
}

/// Shared device-lifetime Vulkan state
pub struct GpuContext {
    /// Loader; kept alive for the function pointers of everything below
    _entry: ash::Entry,
    pub(crate) instance: ash::Instance,
    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) device: ash::Device,

    /// Graphics queue, also used for presentation and uploads
    pub(crate) queue: vk::Queue,
    pub(crate) queue_family: u32,

    /// Dropped before the device is destroyed
    pub(crate) allocator: ManuallyDrop<Mutex<Allocator>>,

    pub(crate) surface: Option<Surface>,
    pub(crate) swapchain_loader: Option<ash::khr::swapchain::Device>,

    #[cfg(feature = "vulkan-validation")]
    pub(crate) messenger: Option<Messenger>,
}

impl GpuContext {
    /// Create the instance and device
    ///
    /// # Arguments
    ///
    /// * `window` - Raw handles of the window to present to, `None` for a headless device
    /// * `config` - Application name and validation settings
    pub fn new(window: Option<(RawDisplayHandle, RawWindowHandle)>, config: &Config) -> Result<Self> {
        unsafe {
            let entry = ash::Entry::load().map_err(|e| init_failed("Failed to load Vulkan library", e))?;

            let app_name = CString::new(config.app_name.as_str())
                .map_err(|e| init_failed("Invalid application name", e))?;
            let (major, minor, patch) = config.app_version;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, major, minor, patch))
                .engine_name(c"mgp")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_3);

            let mut extension_names = match window {
                Some((display, _)) => ash_window::enumerate_required_extensions(display)
                    .map_err(|e| init_failed("Failed to get required extensions", e))?
                    .to_vec(),
                None => Vec::new(),
            };

            let validation = validation_enabled(config);
            let mut layer_names = Vec::new();
            if validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
                layer_names.push(c"VK_LAYER_KHRONOS_validation".as_ptr());
            }

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);
            let instance = entry
                .create_instance(&create_info, None)
                .map_err(|e| init_failed("Failed to create Vulkan instance", e))?;

            #[cfg(feature = "vulkan-validation")]
            let messenger = if validation {
                Some(create_messenger(&entry, &instance, config)?)
            } else {
                None
            };

            let surface = match window {
                Some((display, window)) => {
                    let handle = ash_window::create_surface(&entry, &instance, display, window, None)
                        .map_err(|e| init_failed("Failed to create surface", e))?;
                    Some(Surface {
                        handle,
                        loader: ash::khr::surface::Instance::new(&entry, &instance),
                    })
                }
                None => None,
            };

            let (physical_device, queue_family) = pick_physical_device(&instance, surface.as_ref())?;
            let device = create_device(&instance, physical_device, queue_family, surface.is_some())?;
            let queue = device.get_device_queue(queue_family, 0);

            let allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: true,
                allocation_sizes: Default::default(),
            })
            .map_err(|e| init_failed("Failed to create GPU allocator", e))?;

            let swapchain_loader = surface
                .as_ref()
                .map(|_| ash::khr::swapchain::Device::new(&instance, &device));

            Ok(Self {
                _entry: entry,
                instance,
                physical_device,
                device,
                queue,
                queue_family,
                allocator: ManuallyDrop::new(Mutex::new(allocator)),
                surface,
                swapchain_loader,
                #[cfg(feature = "vulkan-validation")]
                messenger,
            })
        }
    }
}

/// Whether validation layers will be enabled
fn validation_enabled(config: &Config) -> bool {
    if !config.enable_validation {
        return false;
    }
    if cfg!(feature = "vulkan-validation") {
        true
    } else {
        engine_info!(
            "mgp::vulkan",
            "Validation requested but the vulkan-validation feature is disabled"
        );
        false
    }
}

#[cfg(feature = "vulkan-validation")]
unsafe fn create_messenger(entry: &ash::Entry, instance: &ash::Instance, config: &Config) -> Result<Messenger> {
    let loader = ash::ext::debug_utils::Instance::new(entry, instance);
    let state = Box::new(DebugState::new(DebugConfig {
        severity: config.debug_severity,
        output: config.debug_output.clone(),
        message_filter: config.debug_message_filter,
        break_on_error: config.break_on_validation_error,
        panic_on_error: config.panic_on_error,
        enable_stats: config.enable_validation_stats,
    }));
    let info = crate::debug::messenger_create_info(&state);
    let handle = loader
        .create_debug_utils_messenger(&info, None)
        .map_err(|e| init_failed("Failed to create debug messenger", e))?;
    Ok(Messenger { loader, handle, state })
}

/// First queue family that can render, compute and (when a surface is given) present
unsafe fn graphics_family(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    surface: Option<&Surface>,
) -> Option<u32> {
    let families = instance.get_physical_device_queue_family_properties(physical_device);
    families.iter().enumerate().find_map(|(index, family)| {
        let index = index as u32;
        if !family.queue_flags.contains(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE) {
            return None;
        }
        let presents = match surface {
            Some(surface) => surface
                .loader
                .get_physical_device_surface_support(physical_device, index, surface.handle)
                .unwrap_or(false),
            None => true,
        };
        presents.then_some(index)
    })
}

/// Pick a Vulkan 1.3 device, discrete GPUs first
unsafe fn pick_physical_device(instance: &ash::Instance, surface: Option<&Surface>) -> Result<(vk::PhysicalDevice, u32)> {
    let physical_devices = instance
        .enumerate_physical_devices()
        .map_err(|e| init_failed("Failed to enumerate physical devices", e))?;

    let mut best: Option<(u32, vk::PhysicalDevice, u32)> = None;
    for physical_device in physical_devices {
        let properties = instance.get_physical_device_properties(physical_device);
        if properties.api_version < vk::API_VERSION_1_3 {
            continue;
        }
        let Some(family) = graphics_family(instance, physical_device, surface) else {
            continue;
        };
        let rank = match properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => 3,
            vk::PhysicalDeviceType::INTEGRATED_GPU => 2,
            vk::PhysicalDeviceType::VIRTUAL_GPU => 1,
            _ => 0,
        };
        if best.map_or(true, |(best_rank, _, _)| rank > best_rank) {
            best = Some((rank, physical_device, family));
        }
    }

    let (_, physical_device, family) = best.ok_or_else(|| {
        engine_error!("mgp::vulkan", "No Vulkan 1.3 GPU with a graphics queue found");
        Error::InitializationFailed("No Vulkan 1.3 GPU with a graphics queue found".to_string())
    })?;

    let properties = instance.get_physical_device_properties(physical_device);
    let name = properties
        .device_name_as_c_str()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    engine_info!("mgp::vulkan", "Using GPU '{}' (queue family {})", name, family);
    Ok((physical_device, family))
}

/// Logical device with dynamic rendering, synchronization2, descriptor
/// indexing and buffer device addresses enabled
unsafe fn create_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    queue_family: u32,
    presents: bool,
) -> Result<ash::Device> {
    let priorities = [1.0];
    let queue_infos = [vk::DeviceQueueCreateInfo::default()
        .queue_family_index(queue_family)
        .queue_priorities(&priorities)];

    let mut extension_names = Vec::new();
    if presents {
        extension_names.push(ash::khr::swapchain::NAME.as_ptr());
    }

    let mut features12 = vk::PhysicalDeviceVulkan12Features::default()
        .descriptor_indexing(true)
        .runtime_descriptor_array(true)
        .descriptor_binding_partially_bound(true)
        .descriptor_binding_variable_descriptor_count(true)
        .descriptor_binding_update_unused_while_pending(true)
        .descriptor_binding_sampled_image_update_after_bind(true)
        .descriptor_binding_storage_image_update_after_bind(true)
        .descriptor_binding_storage_buffer_update_after_bind(true)
        .shader_sampled_image_array_non_uniform_indexing(true)
        .shader_storage_buffer_array_non_uniform_indexing(true)
        .buffer_device_address(true);
    let mut features13 = vk::PhysicalDeviceVulkan13Features::default()
        .dynamic_rendering(true)
        .synchronization2(true);
    let core_features = vk::PhysicalDeviceFeatures::default().sampler_anisotropy(true);
    let mut features = vk::PhysicalDeviceFeatures2::default()
        .features(core_features)
        .push_next(&mut features12)
        .push_next(&mut features13);

    let create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_infos)
        .enabled_extension_names(&extension_names)
        .push_next(&mut features);

    let device = instance
        .create_device(physical_device, &create_info, None)
        .map_err(|e| init_failed("Failed to create logical device", e))?;
    engine_debug!("mgp::vulkan", "Logical device created (swapchain extension: {})", presents);
    Ok(device)
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            // Allocator frees its memory blocks through the device
            ManuallyDrop::drop(&mut self.allocator);
            self.device.destroy_device(None);

            if let Some(surface) = self.surface.take() {
                surface.loader.destroy_surface(surface.handle, None);
            }

            #[cfg(feature = "vulkan-validation")]
            if let Some(messenger) = self.messenger.take() {
                messenger.loader.destroy_debug_utils_messenger(messenger.handle, None);
            }

            self.instance.destroy_instance(None);
        }
    }
}
