/// Backend-neutral descriptions of GPU objects, descriptors and commands

use bitflags::bitflags;
use crate::device::handles::*;

// ============================================================================
// Formats
// ============================================================================

/// Texel and attachment format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum Format {
    Undefined,

    // Colour formats
    R8_UNORM,
    R8G8_UNORM,
    R8G8B8A8_UNORM,
    R8G8B8A8_SRGB,
    B8G8R8A8_UNORM,
    B8G8R8A8_SRGB,
    R16G16_SFLOAT,
    R16G16B16A16_SFLOAT,
    R32_UINT,
    R32_SFLOAT,
    R32G32_SFLOAT,
    R32G32B32_SFLOAT,
    R32G32B32A32_SFLOAT,
    B10G11R11_UFLOAT_PACK32,

    // Depth/stencil formats
    D16_UNORM,
    D32_SFLOAT,
    D24_UNORM_S8_UINT,
    D32_SFLOAT_S8_UINT,
}

impl Format {
    /// True for formats with a depth component
    pub fn is_depth(&self) -> bool {
        matches!(
            self,
            Format::D16_UNORM | Format::D32_SFLOAT | Format::D24_UNORM_S8_UINT | Format::D32_SFLOAT_S8_UINT
        )
    }

    /// True for formats with a stencil component
    pub fn has_stencil(&self) -> bool {
        matches!(self, Format::D24_UNORM_S8_UINT | Format::D32_SFLOAT_S8_UINT)
    }

    /// Aspects addressed by a full view of this format
    pub fn aspect(&self) -> ImageAspect {
        if self.has_stencil() {
            ImageAspect::DEPTH | ImageAspect::STENCIL
        } else if self.is_depth() {
            ImageAspect::DEPTH
        } else {
            ImageAspect::COLOR
        }
    }

    /// Size of one texel in bytes (0 for Undefined)
    pub fn bytes_per_texel(&self) -> u32 {
        match self {
            Format::Undefined => 0,
            Format::R8_UNORM => 1,
            Format::R8G8_UNORM | Format::D16_UNORM => 2,
            Format::R8G8B8A8_UNORM
            | Format::R8G8B8A8_SRGB
            | Format::B8G8R8A8_UNORM
            | Format::B8G8R8A8_SRGB
            | Format::R16G16_SFLOAT
            | Format::R32_UINT
            | Format::R32_SFLOAT
            | Format::B10G11R11_UFLOAT_PACK32
            | Format::D32_SFLOAT
            | Format::D24_UNORM_S8_UINT => 4,
            Format::R16G16B16A16_SFLOAT | Format::R32G32_SFLOAT | Format::D32_SFLOAT_S8_UINT => 8,
            Format::R32G32B32_SFLOAT => 12,
            Format::R32G32B32A32_SFLOAT => 16,
        }
    }
}

bitflags! {
    /// Image aspects touched by a view or barrier
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageAspect: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

// ============================================================================
// Images
// ============================================================================

/// Image memory layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    Undefined,
    General,
    ColorAttachment,
    DepthStencilAttachment,
    DepthStencilReadOnly,
    ShaderReadOnly,
    TransferSrc,
    TransferDst,
    PresentSrc,
}

impl ImageLayout {
    /// True for layouts in which the image can only be read
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            ImageLayout::DepthStencilReadOnly
                | ImageLayout::ShaderReadOnly
                | ImageLayout::TransferSrc
                | ImageLayout::PresentSrc
        )
    }
}

/// Image dimensionality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageType {
    Tex1D,
    Tex2D,
    Tex3D,
    /// 2D image with six array layers per cube
    Cube,
}

/// Image tiling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageTiling {
    Optimal,
    Linear,
}

/// Multisample count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleCount {
    /// 1 sample (no multisampling)
    S1,
    S2,
    S4,
    S8,
}

impl SampleCount {
    /// Number of samples per pixel
    pub fn count(&self) -> u32 {
        match self {
            SampleCount::S1 => 1,
            SampleCount::S2 => 2,
            SampleCount::S4 => 4,
            SampleCount::S8 => 8,
        }
    }
}

bitflags! {
    /// How an image will be used
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageUsage: u32 {
        const SAMPLED = 1 << 0;
        const STORAGE = 1 << 1;
        const COLOR_ATTACHMENT = 1 << 2;
        const DEPTH_STENCIL_ATTACHMENT = 1 << 3;
        const TRANSFER_SRC = 1 << 4;
        const TRANSFER_DST = 1 << 5;
        const INPUT_ATTACHMENT = 1 << 6;
    }
}

/// Immutable properties of an image
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageInfo {
    pub image_type: ImageType,
    pub width: u32,
    pub height: u32,
    /// Depth for 3D images, 1 otherwise
    pub depth: u32,
    pub format: Format,
    pub tiling: ImageTiling,
    pub mip_levels: u32,
    /// Array layers (6 per cube for cube images)
    pub array_layers: u32,
    pub samples: SampleCount,
    pub usage: ImageUsage,
    /// Lazily allocated attachment that never leaves tile memory
    pub transient: bool,
}

impl ImageInfo {
    /// Single-mip, single-sample 2D image
    pub fn tex2d(width: u32, height: u32, format: Format, usage: ImageUsage) -> Self {
        Self {
            image_type: ImageType::Tex2D,
            width,
            height,
            depth: 1,
            format,
            tiling: ImageTiling::Optimal,
            mip_levels: 1,
            array_layers: 1,
            samples: SampleCount::S1,
            usage,
            transient: false,
        }
    }

    /// Square cubemap with six layers
    pub fn cube(size: u32, format: Format, mip_levels: u32, usage: ImageUsage) -> Self {
        Self {
            image_type: ImageType::Cube,
            array_layers: 6,
            mip_levels,
            ..Self::tex2d(size, size, format, usage)
        }
    }

    /// Render target with the given sample count
    pub fn attachment(width: u32, height: u32, format: Format, samples: SampleCount) -> Self {
        let usage = if format.is_depth() {
            ImageUsage::DEPTH_STENCIL_ATTACHMENT
        } else {
            ImageUsage::COLOR_ATTACHMENT
        };
        Self {
            samples,
            ..Self::tex2d(width, height, format, usage)
        }
    }

    pub fn with_mips(mut self, mip_levels: u32) -> Self {
        self.mip_levels = mip_levels;
        self
    }

    pub fn with_samples(mut self, samples: SampleCount) -> Self {
        self.samples = samples;
        self
    }

    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    /// Extent of a mip level, clamped to 1
    pub fn mip_extent(&self, mip: u32) -> (u32, u32, u32) {
        let shrink = |size: u32| size.checked_shr(mip).unwrap_or(0).max(1);
        (shrink(self.width), shrink(self.height), shrink(self.depth))
    }

    /// Length of the full mip chain, down to 1x1x1
    pub fn max_mip_levels(&self) -> u32 {
        let largest = self.width.max(self.height).max(self.depth).max(1);
        u32::BITS - largest.leading_zeros()
    }
}

/// Image view dimensionality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageViewType {
    Tex1D,
    Tex2D,
    Tex2DArray,
    Tex3D,
    Cube,
}

/// Parameters for creating an image view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageViewDesc {
    pub image: ImageHandle,
    pub view_type: ImageViewType,
    pub format: Format,
    pub aspect: ImageAspect,
    pub base_mip: u32,
    pub mip_count: u32,
    pub base_layer: u32,
    pub layer_count: u32,
}

// ============================================================================
// Buffers
// ============================================================================

bitflags! {
    /// How a buffer will be used
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const VERTEX = 1 << 0;
        const INDEX = 1 << 1;
        const UNIFORM = 1 << 2;
        const STORAGE = 1 << 3;
        const INDIRECT = 1 << 4;
        const TRANSFER_SRC = 1 << 5;
        const TRANSFER_DST = 1 << 6;
        /// Buffer is addressed from shaders through its device address
        const DEVICE_ADDRESS = 1 << 7;
    }
}

/// Where a buffer's memory lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryLocation {
    /// Device local, not mapped
    GpuOnly,
    /// Host visible, persistently mapped, written by the CPU
    CpuToGpu,
    /// Host visible, persistently mapped, read back by the CPU
    GpuToCpu,
}

/// Parameters for creating a buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferInfo {
    pub size: u64,
    pub usage: BufferUsage,
    pub location: MemoryLocation,
    /// Debug name
    pub name: String,
}

// ============================================================================
// Samplers
// ============================================================================

/// Texel filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

/// Mip selection mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MipmapMode {
    Nearest,
    Linear,
}

/// Texture coordinate wrapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Repeat,
    MirroredRepeat,
    ClampToEdge,
    ClampToBorder,
}

/// Border colour for ClampToBorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BorderColor {
    TransparentBlack,
    OpaqueBlack,
    OpaqueWhite,
}

/// Immutable sampler configuration
///
/// All fields are integral so the description can key the sampler cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerInfo {
    pub mag_filter: Filter,
    pub min_filter: Filter,
    pub mipmap_mode: MipmapMode,
    pub address_u: AddressMode,
    pub address_v: AddressMode,
    pub address_w: AddressMode,
    pub border_color: BorderColor,
    /// Anisotropy level, None disables anisotropic filtering
    pub max_anisotropy: Option<u8>,
    /// Depth comparison for shadow samplers
    pub compare_op: Option<crate::device::CompareOp>,
    /// Highest mip the sampler may select, None for all mips
    pub max_lod: Option<u32>,
}

impl SamplerInfo {
    /// Trilinear filtering with repeat wrapping
    pub fn linear_repeat() -> Self {
        Self {
            mag_filter: Filter::Linear,
            min_filter: Filter::Linear,
            mipmap_mode: MipmapMode::Linear,
            address_u: AddressMode::Repeat,
            address_v: AddressMode::Repeat,
            address_w: AddressMode::Repeat,
            border_color: BorderColor::OpaqueBlack,
            max_anisotropy: None,
            compare_op: None,
            max_lod: None,
        }
    }

    /// Trilinear filtering clamped to edge
    pub fn linear_clamp() -> Self {
        Self {
            address_u: AddressMode::ClampToEdge,
            address_v: AddressMode::ClampToEdge,
            address_w: AddressMode::ClampToEdge,
            ..Self::linear_repeat()
        }
    }

    /// Point sampling clamped to edge
    pub fn nearest_clamp() -> Self {
        Self {
            mag_filter: Filter::Nearest,
            min_filter: Filter::Nearest,
            mipmap_mode: MipmapMode::Nearest,
            ..Self::linear_clamp()
        }
    }

    /// Depth comparison sampler for shadow maps
    pub fn shadow() -> Self {
        Self {
            address_u: AddressMode::ClampToBorder,
            address_v: AddressMode::ClampToBorder,
            address_w: AddressMode::ClampToBorder,
            border_color: BorderColor::OpaqueWhite,
            compare_op: Some(crate::device::CompareOp::LessOrEqual),
            ..Self::linear_clamp()
        }
    }
}

impl Default for SamplerInfo {
    fn default() -> Self {
        Self::linear_repeat()
    }
}

// ============================================================================
// Descriptors
// ============================================================================

/// Descriptor type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    Sampler,
    CombinedImageSampler,
    SampledImage,
    StorageImage,
    UniformBuffer,
    StorageBuffer,
}

bitflags! {
    /// Shader stages that can access a binding or push constant range
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStages: u32 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
        const COMPUTE = 1 << 2;
        const ALL_GRAPHICS = Self::VERTEX.bits() | Self::FRAGMENT.bits();
        const ALL = Self::ALL_GRAPHICS.bits() | Self::COMPUTE.bits();
    }
}

bitflags! {
    /// Per-binding descriptor indexing flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DescriptorBindingFlags: u32 {
        const UPDATE_AFTER_BIND = 1 << 0;
        const PARTIALLY_BOUND = 1 << 1;
        const VARIABLE_DESCRIPTOR_COUNT = 1 << 2;
        const UPDATE_UNUSED_WHILE_PENDING = 1 << 3;
    }
}

/// One binding of a descriptor set layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorSetLayoutBinding {
    pub binding: u32,
    pub descriptor_type: DescriptorType,
    pub count: u32,
    pub stages: ShaderStages,
    pub flags: DescriptorBindingFlags,
}

/// Full description of a descriptor set layout
///
/// Bindings are kept sorted by binding index so equal layouts compare equal
/// regardless of declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DescriptorSetLayoutInfo {
    pub bindings: Vec<DescriptorSetLayoutBinding>,
    /// Layout is created with the update-after-bind pool flag
    pub update_after_bind: bool,
}

impl DescriptorSetLayoutInfo {
    pub fn new(mut bindings: Vec<DescriptorSetLayoutBinding>) -> Self {
        bindings.sort_by_key(|b| b.binding);
        let update_after_bind = bindings
            .iter()
            .any(|b| b.flags.contains(DescriptorBindingFlags::UPDATE_AFTER_BIND));
        Self { bindings, update_after_bind }
    }
}

/// Number of descriptors of one type in a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorPoolSize {
    pub descriptor_type: DescriptorType,
    pub count: u32,
}

/// Parameters for creating a descriptor pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorPoolInfo {
    pub max_sets: u32,
    pub sizes: Vec<DescriptorPoolSize>,
    /// Pool may hold sets from update-after-bind layouts
    pub update_after_bind: bool,
}

/// Why a descriptor set allocation failed
#[derive(Debug, Clone)]
pub enum DescriptorAllocError {
    /// The pool has no room left for these sets
    OutOfPoolMemory,
    /// The pool has room but it is fragmented
    FragmentedPool,
    /// Any other failure
    Device(crate::error::Error),
}

/// What a descriptor write points at
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DescriptorResource {
    Buffer {
        buffer: BufferHandle,
        offset: u64,
        range: u64,
        descriptor_type: DescriptorType,
    },
    Image {
        view: ImageViewHandle,
        layout: ImageLayout,
        descriptor_type: DescriptorType,
    },
    Sampler(SamplerHandle),
    CombinedImageSampler {
        view: ImageViewHandle,
        sampler: SamplerHandle,
        layout: ImageLayout,
    },
}

impl DescriptorResource {
    pub fn descriptor_type(&self) -> DescriptorType {
        match self {
            DescriptorResource::Buffer { descriptor_type, .. } => *descriptor_type,
            DescriptorResource::Image { descriptor_type, .. } => *descriptor_type,
            DescriptorResource::Sampler(_) => DescriptorType::Sampler,
            DescriptorResource::CombinedImageSampler { .. } => DescriptorType::CombinedImageSampler,
        }
    }
}

/// A single descriptor update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DescriptorWrite {
    pub set: DescriptorSetHandle,
    pub binding: u32,
    pub array_element: u32,
    pub resource: DescriptorResource,
}

// ============================================================================
// Commands
// ============================================================================

/// Layout change of an image subresource range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBarrier {
    pub image: ImageHandle,
    pub aspect: ImageAspect,
    pub old_layout: ImageLayout,
    pub new_layout: ImageLayout,
    pub base_mip: u32,
    pub mip_count: u32,
    pub base_layer: u32,
    pub layer_count: u32,
}

/// What happens to attachment contents at the start of rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadOp {
    Load,
    Clear,
    DontCare,
}

/// What happens to attachment contents at the end of rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Store,
    DontCare,
}

/// Clear value for an attachment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    Color([f32; 4]),
    DepthStencil { depth: f32, stencil: u32 },
}

/// One attachment of a dynamic rendering scope
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderingAttachment {
    pub view: ImageViewHandle,
    pub layout: ImageLayout,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub clear: ClearValue,
    /// Single-sample view the attachment resolves into
    pub resolve_view: Option<ImageViewHandle>,
    pub resolve_layout: ImageLayout,
}

/// Parameters of a dynamic rendering scope
#[derive(Debug, Clone, PartialEq)]
pub struct RenderingInfo {
    pub width: u32,
    pub height: u32,
    pub layer_count: u32,
    pub color_attachments: Vec<RenderingAttachment>,
    pub depth_attachment: Option<RenderingAttachment>,
}

/// Viewport dimensions and depth range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

/// Scissor rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Pipeline a bind call targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineBindPoint {
    Graphics,
    Compute,
}

/// Index buffer element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    /// 16-bit indices (max 65535 vertices)
    U16,
    /// 32-bit indices
    U32,
}

impl IndexType {
    /// Size in bytes of one index element
    pub fn size_bytes(&self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

/// Buffer-to-buffer copy region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferCopy {
    pub src_offset: u64,
    pub dst_offset: u64,
    pub size: u64,
}

/// Buffer-to-image copy region (tightly packed source)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferImageCopy {
    pub buffer_offset: u64,
    pub aspect: ImageAspect,
    pub mip_level: u32,
    pub base_layer: u32,
    pub layer_count: u32,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

/// Pipeline stage a semaphore wait blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    TopOfPipe,
    ColorAttachmentOutput,
    Transfer,
    ComputeShader,
    AllCommands,
}

/// One queue submission
#[derive(Debug, Clone, Copy, Default)]
pub struct SubmitInfo<'a> {
    pub command_buffers: &'a [CommandBufferHandle],
    pub wait_semaphores: &'a [(SemaphoreHandle, PipelineStage)],
    pub signal_semaphores: &'a [SemaphoreHandle],
}

/// A device queue and its family index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueInfo {
    pub handle: QueueHandle,
    pub family: u32,
}

// ============================================================================
// Presentation
// ============================================================================

/// Swapchain presentation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresentMode {
    /// Vsync, always supported
    Fifo,
    /// Triple-buffered vsync
    Mailbox,
    /// No vsync, may tear
    Immediate,
}

/// Parameters for (re)creating a swapchain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainInfo {
    pub width: u32,
    pub height: u32,
    pub preferred_format: Format,
    pub present_mode: PresentMode,
    /// Retired swapchain handed to the driver for resource reuse
    pub old_swapchain: Option<SwapchainHandle>,
}

/// A created swapchain and its images
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapchainImages {
    pub handle: SwapchainHandle,
    pub format: Format,
    pub width: u32,
    pub height: u32,
    pub images: Vec<ImageHandle>,
}

/// Result of acquiring a swapchain image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireResult {
    /// Image acquired; `suboptimal` asks for a rebuild after this frame
    Acquired { index: u32, suboptimal: bool },
    /// Swapchain no longer matches the surface
    OutOfDate,
}

/// Result of presenting a swapchain image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentResult {
    Presented,
    Suboptimal,
    OutOfDate,
}
