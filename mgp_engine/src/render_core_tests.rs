use super::*;
use crate::device::mock_device::{MockDevice, MockPlatform};
use crate::device::{BufferUsage, DescriptorType, Format, ImageLayout, ImageUsage, MemoryLocation, ShaderStage};
use crate::pipeline::ReflectedBinding;
use crate::render_graph::RenderPassDefinition;
use crate::sync::InFlightSync;

fn small_config() -> Config {
    Config {
        bindless_capacity: 64,
        staging_ring_size: 4096,
        ..Config::default()
    }
}

fn windowed() -> (Arc<MockDevice>, RenderCore) {
    let device = Arc::new(MockDevice::new());
    let platform: Arc<dyn Platform> = Arc::new(MockPlatform::new(800, 600));
    let core = RenderCore::new(device.clone(), Some(platform), small_config()).unwrap();
    (device, core)
}

fn headless() -> (Arc<MockDevice>, RenderCore) {
    let device = Arc::new(MockDevice::headless());
    let core = RenderCore::new(device.clone(), None, small_config()).unwrap();
    (device, core)
}

fn run_frame(core: &mut RenderCore, sync: &mut InFlightSync) {
    let cmd = sync.begin(core).unwrap();
    sync.present(core, cmd).unwrap();
    core.next_frame().unwrap();
}

fn stage(stage: ShaderStage) -> ShaderStageReflection {
    ShaderStageReflection {
        stage,
        entry_point: "main".to_string(),
        bindings: vec![ReflectedBinding { set: 1, binding: 0, descriptor_type: DescriptorType::UniformBuffer, count: 1 }],
        push_constant_size: 0,
    }
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_headless_core_has_no_swapchain() {
    let (_device, core) = headless();
    assert!(core.swapchain().is_none());
    assert!(core.platform().is_none());
    assert_eq!(core.queue().frames_in_flight(), 3);
}

#[test]
fn test_platform_size_drives_swapchain() {
    let (_device, core) = windowed();
    let swapchain = core.swapchain().unwrap();
    assert_eq!(swapchain.extent(), (800, 600));
    assert_eq!(swapchain.image_count(), 3);
}

#[test]
fn test_platform_without_surface_fails() {
    let device = Arc::new(MockDevice::headless());
    let platform: Arc<dyn Platform> = Arc::new(MockPlatform::new(800, 600));
    assert!(RenderCore::new(device, Some(platform), small_config()).is_err());
}

#[test]
fn test_zero_frames_in_flight_is_rejected() {
    let device = Arc::new(MockDevice::headless());
    let config = Config { frames_in_flight: 0, ..small_config() };
    assert!(matches!(RenderCore::new(device, None, config), Err(crate::error::Error::InitializationFailed(_))));
}

// ============================================================================
// Frames
// ============================================================================

#[test]
fn test_next_frame_cycles_slots() {
    let (_device, mut core) = headless();
    let mut sync = InFlightSync::new();
    let mut slots = Vec::new();
    for _ in 0..4 {
        slots.push(core.queue().current_index());
        run_frame(&mut core, &mut sync);
    }
    assert_eq!(slots, vec![0, 1, 2, 0]);
    assert_eq!(core.frame_number(), 4);
}

#[test]
fn test_destroyed_image_outlives_in_flight_frames() {
    let (device, mut core) = headless();
    let mut sync = InFlightSync::new();
    let info = ImageInfo::tex2d(64, 64, Format::R8G8B8A8_UNORM, ImageUsage::SAMPLED);
    let image = core.create_image(info, "decal").unwrap();
    let handle = core.arena().image(image).unwrap().handle();

    run_frame(&mut core, &mut sync);
    core.destroy_image(image).unwrap();
    assert!(core.arena().image(image).is_err());
    assert_eq!(core.deletion_queue().len(), 1);

    run_frame(&mut core, &mut sync);
    run_frame(&mut core, &mut sync);
    assert!(device.state().images.contains_key(&handle));

    run_frame(&mut core, &mut sync);
    assert!(!device.state().images.contains_key(&handle));
    assert!(core.deletion_queue().is_empty());
}

#[test]
fn test_released_program_is_destroyed_after_wait_idle() {
    let (device, mut core) = headless();
    let code = [0x0723_0203u32, 0, 0, 0];
    let program = core
        .create_program(vec![(&code[..], stage(ShaderStage::Vertex)), (&code[..], stage(ShaderStage::Fragment))], &[])
        .unwrap();
    assert_eq!(device.state().modules.len(), 2);

    core.release_program(program);
    assert_eq!(core.deletion_queue().len(), 2);
    assert_eq!(device.state().modules.len(), 2);

    core.wait_idle().unwrap();
    assert!(device.state().modules.is_empty());
}

#[test]
fn test_invalid_program_destroys_its_modules() {
    let (device, mut core) = headless();
    let code = [0x0723_0203u32, 0, 0, 0];
    let result = core.create_program(
        vec![(&code[..], stage(ShaderStage::Vertex)), (&code[..], stage(ShaderStage::Vertex))],
        &[],
    );
    assert!(result.is_err());
    assert!(device.state().modules.is_empty());
}

#[test]
fn test_swapchain_pass_transitions_for_presentation() {
    let (device, mut core) = windowed();
    let mut sync = InFlightSync::new();

    let mut cmd = sync.begin(&mut core).unwrap();
    let index = sync.image_index().unwrap();
    let swapchain = core.swapchain().unwrap();
    let color = swapchain.color_attachment(index, [0.0, 0.0, 0.0, 1.0]).unwrap();
    let depth = swapchain.depth_attachment(1.0).unwrap();
    let target = swapchain.image_id(index).unwrap();
    let target_handle = core.arena().image(target).unwrap().handle();

    let mut graph = RenderGraph::new();
    graph.add_pass(
        RenderPassDefinition::new("main")
            .output(color)
            .output(depth)
            .build(|cmd, info, _| {
                assert_eq!((info.width, info.height), (800, 600));
                cmd.draw(3, 1, 0, 0)
            }),
    );
    let summary = core.record_graph(&mut graph, &mut cmd).unwrap();
    assert_eq!(summary.executed, vec!["main"]);
    sync.present(&mut core, cmd).unwrap();

    assert_eq!(core.arena().image(target).unwrap().layout(), ImageLayout::PresentSrc);
    let state = device.state();
    let transitions: Vec<_> = state
        .barriers
        .iter()
        .filter(|b| b.image == target_handle)
        .map(|b| (b.old_layout, b.new_layout))
        .collect();
    assert_eq!(
        transitions,
        vec![
            (ImageLayout::Undefined, ImageLayout::ColorAttachment),
            (ImageLayout::ColorAttachment, ImageLayout::PresentSrc),
        ]
    );
    let rendering = state.commands_starting_with("begin_rendering");
    assert_eq!(rendering.len(), 1);
    assert!(rendering[0].ends_with("800x600 colors=1 depth=true"));
}

#[test]
fn test_uploads_are_submitted_before_the_frame() {
    let (device, mut core) = headless();
    let mut sync = InFlightSync::new();
    let buffer = core
        .create_buffer(
            BufferInfo {
                size: 64,
                usage: BufferUsage::VERTEX | BufferUsage::TRANSFER_DST,
                location: MemoryLocation::GpuOnly,
                name: "vertices".to_string(),
            },
            false,
        )
        .unwrap();

    let cmd = sync.begin(&mut core).unwrap();
    let frame_cmd = cmd.handle();
    let ticket = core.upload_buffer(buffer, 0, &[7; 32]).unwrap();
    sync.present(&mut core, cmd).unwrap();
    core.next_frame().unwrap();

    assert!(core.transfer().is_complete(ticket));
    let handle = core.arena().buffer(buffer).unwrap().handle();
    let state = device.state();
    assert_eq!(state.submits.len(), 2);
    assert_eq!(state.submits[1].command_buffers, vec![frame_cmd]);
    assert_eq!(&state.buffers[&handle].data[..32], &[7; 32]);
}

#[test]
fn test_upload_buffer_checks_range_and_usage() {
    let (_device, mut core) = headless();
    let small = core
        .create_buffer(
            BufferInfo {
                size: 16,
                usage: BufferUsage::VERTEX | BufferUsage::TRANSFER_DST,
                location: MemoryLocation::GpuOnly,
                name: "small".to_string(),
            },
            false,
        )
        .unwrap();
    let no_dst = core
        .create_buffer(
            BufferInfo {
                size: 64,
                usage: BufferUsage::VERTEX,
                location: MemoryLocation::GpuOnly,
                name: "no_dst".to_string(),
            },
            false,
        )
        .unwrap();

    assert!(matches!(core.upload_buffer(small, 8, &[7; 32]), Err(Error::InvalidResource(_))));
    assert!(core.upload_buffer(small, u64::MAX, &[7; 2]).is_err());
    assert!(matches!(core.upload_buffer(no_dst, 0, &[7; 8]), Err(Error::InvalidResource(_))));
    assert_eq!(core.transfer().pending_uploads(), 0);
    assert!(core.transfer().ring().is_empty());

    core.upload_buffer(small, 8, &[7; 8]).unwrap();
    assert_eq!(core.transfer().pending_uploads(), 1);
}

#[test]
fn test_upload_image_needs_transfer_dst() {
    let (_device, mut core) = headless();
    let info = ImageInfo::tex2d(4, 4, Format::R8G8B8A8_UNORM, ImageUsage::SAMPLED);
    let image = core.create_image(info, "sampled_only").unwrap();
    assert!(matches!(core.upload_image(image, &[0; 64]), Err(Error::InvalidResource(_))));
}

#[test]
fn test_instant_submit_blocks_until_done() {
    let (device, mut core) = headless();
    core.instant_submit(|cmd| cmd.dispatch(4, 4, 1)).unwrap();

    let instant_fence = core.queue().current_frame().instant_submit_fence();
    let state = device.state();
    assert_eq!(state.submits.len(), 1);
    assert_eq!(state.submits[0].fence, Some(instant_fence));
    let cmd = state.submits[0].command_buffers[0].as_raw();
    assert_eq!(state.commands_starting_with("dispatch"), vec![format!("dispatch {} 4x4x1", cmd)]);
    // Waited on and reset for the next instant submit
    assert!(!state.fences[&instant_fence]);
}

// ============================================================================
// Pipeline cache file and teardown
// ============================================================================

#[test]
fn test_save_pipeline_cache() {
    let (_device, core) = headless();
    assert!(!core.save_pipeline_cache().unwrap());

    let path = std::env::temp_dir().join(format!("mgp_pipeline_cache_{}.bin", std::process::id()));
    let device = Arc::new(MockDevice::headless());
    let config = Config { pipeline_cache_path: Some(path.clone()), ..small_config() };
    let core = RenderCore::new(device, None, config).unwrap();
    assert!(core.save_pipeline_cache().unwrap());
    assert_eq!(std::fs::read(&path).unwrap(), b"mock-pipeline-cache");
    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_drop_destroys_every_gpu_object() {
    let (device, mut core) = windowed();
    let mut sync = InFlightSync::new();
    let info = ImageInfo::tex2d(32, 32, Format::R8G8B8A8_UNORM, ImageUsage::SAMPLED | ImageUsage::TRANSFER_DST);
    let image = core.create_image(info, "albedo").unwrap();
    core.standard_view(image).unwrap();
    core.upload_image(image, &[0xAA; 32 * 32 * 4]).unwrap();
    run_frame(&mut core, &mut sync);
    run_frame(&mut core, &mut sync);

    drop(core);
    let state = device.state();
    assert_eq!(state.live_objects(), 0);
    assert!(state.wait_idle_calls >= 1);
}
