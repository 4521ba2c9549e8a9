/*!
# MGP Engine - Vulkan Backend

Vulkan 1.3 implementation of the [`Device`](mgp_engine::mgp::render::Device)
trait consumed by `mgp_engine`.

Built on `ash` for the bindings and `gpu-allocator` for memory. Rendering
uses dynamic rendering and synchronization2; descriptor indexing and
buffer device addresses are enabled for the bindless registry.

Validation layers and the debug messenger are compiled in with the
`vulkan-validation` feature and switched on by `Config::enable_validation`.

## Example

```no_run
use std::sync::Arc;
use mgp_engine::mgp::Config;
use mgp_engine::mgp::render::RenderCore;
use mgp_engine_renderer_vulkan::mgp::{VulkanDevice, WinitPlatform};
# fn run(window: Arc<winit::window::Window>) -> mgp_engine::mgp::Result<()> {
let config = Config::default();
let device = Arc::new(VulkanDevice::new(window.as_ref(), &config)?);
let platform = Arc::new(WinitPlatform::new(window));
let core = RenderCore::new(device, Some(platform), config)?;
# Ok(())
# }
```
*/

mod vulkan;
mod vulkan_context;
mod vulkan_format;
mod vulkan_command_list;
mod vulkan_pipeline;
mod vulkan_shader;
mod vulkan_swapchain;
mod vulkan_platform;

#[cfg(feature = "vulkan-validation")]
mod debug;

/// Public backend types
pub mod mgp {
    pub use crate::vulkan::VulkanDevice;
    pub use crate::vulkan_platform::WinitPlatform;
    pub use crate::vulkan_shader::reflect_spirv;
}
