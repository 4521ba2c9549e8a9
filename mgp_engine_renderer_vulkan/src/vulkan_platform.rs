/// WinitPlatform - window-system services backed by a winit window

use mgp_engine::mgp::render::Platform;
use std::sync::Arc;
use winit::window::Window;

/// Reports the drawable size of a winit window to the swapchain
pub struct WinitPlatform {
    window: Arc<Window>,
}

impl WinitPlatform {
    pub fn new(window: Arc<Window>) -> Self {
        Self { window }
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }
}

impl Platform for WinitPlatform {
    fn window_size(&self) -> (u32, u32) {
        if self.window.is_minimized().unwrap_or(false) {
            return (0, 0);
        }
        let size = self.window.inner_size();
        (size.width, size.height)
    }
}
