/// Opaque GPU object handles
///
/// Every object the backend creates is represented in the core by a `u64`
/// newtype. The Vulkan backend stores the raw `vk::Handle` value; the mock
/// device hands out counters. Zero is the null handle in both.

macro_rules! define_handle {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
            pub struct $name(u64);

            impl $name {
                /// The null handle
                pub const NULL: Self = Self(0);

                /// Wrap a raw backend value
                pub const fn from_raw(raw: u64) -> Self {
                    Self(raw)
                }

                /// Raw backend value
                pub const fn as_raw(self) -> u64 {
                    self.0
                }

                pub const fn is_null(self) -> bool {
                    self.0 == 0
                }
            }
        )*
    };
}

define_handle!(
    /// Buffer object
    BufferHandle,
    /// Image object
    ImageHandle,
    /// Image view object
    ImageViewHandle,
    /// Sampler object
    SamplerHandle,
    /// Descriptor set layout
    DescriptorSetLayoutHandle,
    /// Descriptor pool
    DescriptorPoolHandle,
    /// Descriptor set
    DescriptorSetHandle,
    /// Pipeline layout
    PipelineLayoutHandle,
    /// Graphics or compute pipeline
    PipelineHandle,
    /// Shader module
    ShaderModuleHandle,
    /// Command pool
    CommandPoolHandle,
    /// Primary command buffer
    CommandBufferHandle,
    /// CPU-waitable fence
    FenceHandle,
    /// GPU-GPU semaphore
    SemaphoreHandle,
    /// Presentation swapchain
    SwapchainHandle,
    /// Device queue
    QueueHandle,
);
