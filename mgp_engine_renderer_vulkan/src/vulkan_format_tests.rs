//! Unit tests for the engine-to-Vulkan conversions
//!
//! Pure mappings only, no GPU needed.

use super::*;
use mgp_engine::mgp::render::MemoryLocation;

// ============================================================================
// FORMATS
// ============================================================================

#[test]
fn test_color_formats_map_one_to_one() {
    assert_eq!(format_to_vk(Format::R8G8B8A8_UNORM), vk::Format::R8G8B8A8_UNORM);
    assert_eq!(format_to_vk(Format::R8G8B8A8_SRGB), vk::Format::R8G8B8A8_SRGB);
    assert_eq!(format_to_vk(Format::B8G8R8A8_SRGB), vk::Format::B8G8R8A8_SRGB);
    assert_eq!(format_to_vk(Format::R16G16B16A16_SFLOAT), vk::Format::R16G16B16A16_SFLOAT);
    assert_eq!(format_to_vk(Format::B10G11R11_UFLOAT_PACK32), vk::Format::B10G11R11_UFLOAT_PACK32);
    assert_eq!(format_to_vk(Format::Undefined), vk::Format::UNDEFINED);
}

#[test]
fn test_depth_formats_map_one_to_one() {
    assert_eq!(format_to_vk(Format::D16_UNORM), vk::Format::D16_UNORM);
    assert_eq!(format_to_vk(Format::D32_SFLOAT), vk::Format::D32_SFLOAT);
    assert_eq!(format_to_vk(Format::D24_UNORM_S8_UINT), vk::Format::D24_UNORM_S8_UINT);
    assert_eq!(format_to_vk(Format::D32_SFLOAT_S8_UINT), vk::Format::D32_SFLOAT_S8_UINT);
}

#[test]
fn test_surface_formats_round_trip() {
    for format in [Format::B8G8R8A8_SRGB, Format::B8G8R8A8_UNORM, Format::R8G8B8A8_SRGB] {
        assert_eq!(format_from_vk(format_to_vk(format)), Some(format));
    }
    assert_eq!(format_from_vk(vk::Format::A2B10G10R10_UNORM_PACK32), None);
}

#[test]
fn test_aspect_combines_depth_and_stencil() {
    assert_eq!(aspect_to_vk(Format::R8G8B8A8_UNORM.aspect()), vk::ImageAspectFlags::COLOR);
    assert_eq!(aspect_to_vk(Format::D32_SFLOAT.aspect()), vk::ImageAspectFlags::DEPTH);
    assert_eq!(
        aspect_to_vk(Format::D24_UNORM_S8_UINT.aspect()),
        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    );
}

// ============================================================================
// LAYOUTS AND BARRIER SCOPES
// ============================================================================

#[test]
fn test_image_layouts() {
    assert_eq!(image_layout_to_vk(ImageLayout::Undefined), vk::ImageLayout::UNDEFINED);
    assert_eq!(image_layout_to_vk(ImageLayout::ColorAttachment), vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
    assert_eq!(
        image_layout_to_vk(ImageLayout::DepthStencilReadOnly),
        vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL
    );
    assert_eq!(image_layout_to_vk(ImageLayout::ShaderReadOnly), vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
    assert_eq!(image_layout_to_vk(ImageLayout::PresentSrc), vk::ImageLayout::PRESENT_SRC_KHR);
}

#[test]
fn test_undefined_layout_has_no_access() {
    let (stage, access) = layout_scope(ImageLayout::Undefined);
    assert_eq!(stage, vk::PipelineStageFlags2::TOP_OF_PIPE);
    assert_eq!(access, vk::AccessFlags2::NONE);
}

#[test]
fn test_attachment_layouts_write_in_their_stage() {
    let (stage, access) = layout_scope(ImageLayout::ColorAttachment);
    assert_eq!(stage, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT);
    assert!(access.contains(vk::AccessFlags2::COLOR_ATTACHMENT_WRITE));

    let (stage, access) = layout_scope(ImageLayout::DepthStencilAttachment);
    assert!(stage.contains(vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS));
    assert!(access.contains(vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE));
}

#[test]
fn test_read_only_layouts_never_write() {
    let writes = vk::AccessFlags2::SHADER_STORAGE_WRITE
        | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE
        | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE
        | vk::AccessFlags2::TRANSFER_WRITE;
    for layout in [
        ImageLayout::ShaderReadOnly,
        ImageLayout::DepthStencilReadOnly,
        ImageLayout::TransferSrc,
        ImageLayout::PresentSrc,
    ] {
        assert!(layout.is_read_only());
        let (_, access) = layout_scope(layout);
        assert!(!access.intersects(writes), "{:?} writes", layout);
    }
}

// ============================================================================
// USAGE FLAGS
// ============================================================================

#[test]
fn test_image_usage_flags() {
    let flags = image_usage_to_vk(ImageUsage::SAMPLED | ImageUsage::TRANSFER_DST, false);
    assert_eq!(flags, vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST);

    let flags = image_usage_to_vk(ImageUsage::COLOR_ATTACHMENT, true);
    assert_eq!(flags, vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSIENT_ATTACHMENT);
}

#[test]
fn test_buffer_usage_flags() {
    let flags = buffer_usage_to_vk(BufferUsage::STORAGE | BufferUsage::DEVICE_ADDRESS | BufferUsage::TRANSFER_DST);
    assert_eq!(
        flags,
        vk::BufferUsageFlags::STORAGE_BUFFER
            | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS
            | vk::BufferUsageFlags::TRANSFER_DST
    );
    assert_eq!(buffer_usage_to_vk(BufferUsage::empty()), vk::BufferUsageFlags::empty());
}

#[test]
fn test_memory_locations() {
    assert_eq!(memory_location_to_allocator(MemoryLocation::GpuOnly), gpu_allocator::MemoryLocation::GpuOnly);
    assert_eq!(memory_location_to_allocator(MemoryLocation::CpuToGpu), gpu_allocator::MemoryLocation::CpuToGpu);
    assert_eq!(memory_location_to_allocator(MemoryLocation::GpuToCpu), gpu_allocator::MemoryLocation::GpuToCpu);
}

#[test]
fn test_cube_images_are_2d() {
    assert_eq!(image_type_to_vk(ImageType::Cube), vk::ImageType::TYPE_2D);
    assert_eq!(view_type_to_vk(ImageViewType::Cube), vk::ImageViewType::CUBE);
    assert_eq!(image_type_to_vk(ImageType::Tex3D), vk::ImageType::TYPE_3D);
}

// ============================================================================
// DESCRIPTORS AND STAGES
// ============================================================================

#[test]
fn test_bindless_binding_flags() {
    let flags = binding_flags_to_vk(DescriptorBindingFlags::UPDATE_AFTER_BIND | DescriptorBindingFlags::PARTIALLY_BOUND);
    assert_eq!(
        flags,
        vk::DescriptorBindingFlags::UPDATE_AFTER_BIND | vk::DescriptorBindingFlags::PARTIALLY_BOUND
    );
}

#[test]
fn test_descriptor_types() {
    assert_eq!(descriptor_type_to_vk(DescriptorType::StorageBuffer), vk::DescriptorType::STORAGE_BUFFER);
    assert_eq!(descriptor_type_to_vk(DescriptorType::SampledImage), vk::DescriptorType::SAMPLED_IMAGE);
    assert_eq!(
        descriptor_type_to_vk(DescriptorType::CombinedImageSampler),
        vk::DescriptorType::COMBINED_IMAGE_SAMPLER
    );
}

#[test]
fn test_shader_stage_flags() {
    assert_eq!(
        shader_stages_to_vk(ShaderStages::ALL_GRAPHICS),
        vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
    );
    assert_eq!(
        shader_stages_to_vk(ShaderStages::ALL),
        vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT | vk::ShaderStageFlags::COMPUTE
    );
    assert_eq!(shader_stage_to_vk(ShaderStage::Compute), vk::ShaderStageFlags::COMPUTE);
}

// ============================================================================
// FIXED-FUNCTION STATE
// ============================================================================

#[test]
fn test_sample_counts() {
    assert_eq!(sample_count_to_vk(SampleCount::S1), vk::SampleCountFlags::TYPE_1);
    assert_eq!(sample_count_to_vk(SampleCount::S4), vk::SampleCountFlags::TYPE_4);
    assert_eq!(sample_count_to_vk(SampleCount::S8), vk::SampleCountFlags::TYPE_8);
}

#[test]
fn test_color_write_mask() {
    assert_eq!(color_write_mask_to_vk(&ColorWriteMask::ALL), vk::ColorComponentFlags::RGBA);
    assert_eq!(color_write_mask_to_vk(&ColorWriteMask::NONE), vk::ColorComponentFlags::empty());
    let rg = ColorWriteMask { r: true, g: true, b: false, a: false };
    assert_eq!(color_write_mask_to_vk(&rg), vk::ColorComponentFlags::R | vk::ColorComponentFlags::G);
}

#[test]
fn test_stencil_state() {
    let state = StencilOpState {
        fail_op: StencilOp::Zero,
        pass_op: StencilOp::Replace,
        compare_op: CompareOp::Equal,
        reference: 3,
        ..StencilOpState::default()
    };
    let vk_state = stencil_op_state_to_vk(&state);
    assert_eq!(vk_state.fail_op, vk::StencilOp::ZERO);
    assert_eq!(vk_state.pass_op, vk::StencilOp::REPLACE);
    assert_eq!(vk_state.depth_fail_op, vk::StencilOp::KEEP);
    assert_eq!(vk_state.compare_op, vk::CompareOp::EQUAL);
    assert_eq!(vk_state.compare_mask, 0xFF);
    assert_eq!(vk_state.reference, 3);
}

#[test]
fn test_blend_state_pieces() {
    assert_eq!(blend_factor_to_vk(BlendFactor::OneMinusSrcAlpha), vk::BlendFactor::ONE_MINUS_SRC_ALPHA);
    assert_eq!(blend_op_to_vk(BlendOp::ReverseSubtract), vk::BlendOp::REVERSE_SUBTRACT);
    assert_eq!(cull_mode_to_vk(CullMode::None), vk::CullModeFlags::NONE);
    assert_eq!(front_face_to_vk(FrontFace::CounterClockwise), vk::FrontFace::COUNTER_CLOCKWISE);
    assert_eq!(polygon_mode_to_vk(PolygonMode::Line), vk::PolygonMode::LINE);
    assert_eq!(topology_to_vk(PrimitiveTopology::TriangleStrip), vk::PrimitiveTopology::TRIANGLE_STRIP);
}

#[test]
fn test_sampler_state() {
    assert_eq!(address_mode_to_vk(AddressMode::ClampToBorder), vk::SamplerAddressMode::CLAMP_TO_BORDER);
    assert_eq!(border_color_to_vk(BorderColor::OpaqueWhite), vk::BorderColor::FLOAT_OPAQUE_WHITE);
    assert_eq!(filter_to_vk(Filter::Nearest), vk::Filter::NEAREST);
    assert_eq!(mipmap_mode_to_vk(MipmapMode::Linear), vk::SamplerMipmapMode::LINEAR);
}

#[test]
fn test_attachment_ops_and_present_modes() {
    assert_eq!(load_op_to_vk(LoadOp::Clear), vk::AttachmentLoadOp::CLEAR);
    assert_eq!(store_op_to_vk(StoreOp::DontCare), vk::AttachmentStoreOp::DONT_CARE);
    assert_eq!(present_mode_to_vk(PresentMode::Mailbox), vk::PresentModeKHR::MAILBOX);
    assert_eq!(pipeline_stage_to_vk(PipelineStage::ColorAttachmentOutput), vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT);
    assert_eq!(index_type_to_vk(IndexType::U16), vk::IndexType::UINT16);
}
