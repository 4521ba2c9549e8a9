use super::*;
use crate::device::mock_device::MockDevice;
use crate::device::{BufferInfo, BufferUsage, Format, ImageHandle, ImageInfo, ImageUsage, MemoryLocation};
use rustc_hash::FxHashMap;
use std::sync::Mutex;

fn setup(ring_size: u64) -> (Arc<MockDevice>, TransferQueue) {
    let device = Arc::new(MockDevice::new());
    let transfer = TransferQueue::new(device.clone(), ring_size).unwrap();
    (device, transfer)
}

fn target_buffer(device: &MockDevice, size: u64) -> BufferHandle {
    device
        .create_buffer(&BufferInfo {
            size,
            usage: BufferUsage::TRANSFER_DST | BufferUsage::VERTEX,
            location: MemoryLocation::GpuOnly,
            name: "target".to_string(),
        })
        .unwrap()
}

fn texture(width: u32, height: u32) -> Image {
    Image {
        handle: ImageHandle::from_raw(900),
        info: ImageInfo::tex2d(width, height, Format::R8G8B8A8_UNORM, ImageUsage::SAMPLED | ImageUsage::TRANSFER_DST),
        layout: ImageLayout::Undefined,
        owned: true,
        views: FxHashMap::default(),
        name: "albedo".to_string(),
    }
}

#[test]
fn test_ticket_zero_is_always_complete() {
    let (_device, transfer) = setup(1024);
    assert!(transfer.is_complete(UploadTicket::default()));
}

#[test]
fn test_buffer_upload_reaches_target_after_flush() {
    let (device, mut transfer) = setup(1024);
    let dst = target_buffer(&device, 64);

    let ticket = transfer.upload_buffer(dst, 8, &[9, 8, 7, 6]).unwrap();
    assert_eq!(ticket.value(), 1);
    assert!(!transfer.is_complete(ticket));
    assert_eq!(transfer.pending_uploads(), 1);

    assert_eq!(transfer.flush().unwrap(), ticket);
    assert_eq!(transfer.batches_in_flight(), 1);
    assert_eq!(transfer.poll().unwrap(), 1);
    assert!(transfer.is_complete(ticket));
    assert!(transfer.ring().is_empty());

    let state = device.state();
    assert_eq!(&state.buffers[&dst].data[8..12], &[9, 8, 7, 6]);
    assert_eq!(state.submits.len(), 1);
}

#[test]
fn test_uploads_share_a_batch_until_flush() {
    let (device, mut transfer) = setup(1024);
    let dst = target_buffer(&device, 64);

    let a = transfer.upload_buffer(dst, 0, &[1; 16]).unwrap();
    let b = transfer.upload_buffer(dst, 16, &[2; 16]).unwrap();
    assert_eq!(a, b);
    transfer.flush().unwrap();

    let c = transfer.upload_buffer(dst, 32, &[3; 16]).unwrap();
    assert!(c > a);
    assert_eq!(device.state().submits.len(), 1);
}

#[test]
fn test_flush_without_uploads_is_a_no_op() {
    let (device, mut transfer) = setup(1024);
    assert_eq!(transfer.flush().unwrap(), UploadTicket::default());
    assert!(device.state().submits.is_empty());
}

#[test]
fn test_batches_stay_pending_until_fence_signals() {
    let (device, mut transfer) = setup(1024);
    device.state().auto_signal = false;
    let dst = target_buffer(&device, 64);

    let ticket = transfer.upload_buffer(dst, 0, &[1; 32]).unwrap();
    transfer.flush().unwrap();
    assert_eq!(transfer.poll().unwrap(), 0);
    assert!(!transfer.is_complete(ticket));
    assert!(!transfer.ring().is_empty());

    let fence = device.state().submits[0].fence.unwrap();
    device.set_fence(fence, true);
    assert_eq!(transfer.poll().unwrap(), 1);
    assert!(transfer.is_complete(ticket));
}

#[test]
fn test_wait_flushes_open_batch() {
    let (device, mut transfer) = setup(1024);
    let dst = target_buffer(&device, 64);
    let ticket = transfer.upload_buffer(dst, 0, &[5; 8]).unwrap();

    transfer.wait(ticket).unwrap();
    assert!(transfer.is_complete(ticket));
    assert_eq!(transfer.pending_uploads(), 0);
}

#[test]
fn test_full_ring_waits_for_oldest_batch() {
    let (device, mut transfer) = setup(64);
    let dst = target_buffer(&device, 256);

    transfer.upload_buffer(dst, 0, &[1; 48]).unwrap();
    // Does not fit behind the first upload: the open batch is flushed,
    // waited on and its space reused.
    let second = transfer.upload_buffer(dst, 64, &[2; 48]).unwrap();

    assert_eq!(second.value(), 2);
    assert!(transfer.is_complete(UploadTicket(1)));
    assert_eq!(device.state().submits.len(), 1);
}

#[test]
fn test_oversized_upload_is_rejected() {
    let (device, mut transfer) = setup(64);
    let dst = target_buffer(&device, 256);
    assert!(transfer.upload_buffer(dst, 0, &[0; 65]).is_err());
    assert!(transfer.upload_buffer(dst, 0, &[]).is_err());
}

#[test]
fn test_callbacks_run_on_completion() {
    let (device, mut transfer) = setup(1024);
    let dst = target_buffer(&device, 64);
    let log = Arc::new(Mutex::new(Vec::new()));

    let ticket = transfer.upload_buffer(dst, 0, &[1; 4]).unwrap();
    let sink = log.clone();
    transfer.on_complete(ticket, move || sink.lock().unwrap().push("uploaded"));
    assert!(log.lock().unwrap().is_empty());

    transfer.flush().unwrap();
    transfer.poll().unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["uploaded"]);

    // Already complete: runs immediately
    let sink = log.clone();
    transfer.on_complete(ticket, move || sink.lock().unwrap().push("late"));
    assert_eq!(log.lock().unwrap().len(), 2);
}

#[test]
fn test_failed_flush_gives_ring_space_back() {
    let (device, mut transfer) = setup(1024);
    let dst = target_buffer(&device, 64);
    let log = Arc::new(Mutex::new(Vec::new()));

    let ticket = transfer.upload_buffer(dst, 0, &[3; 32]).unwrap();
    let sink = log.clone();
    transfer.on_complete(ticket, move || sink.lock().unwrap().push("lost"));

    device.state().failing_submits = 1;
    assert!(transfer.flush().is_err());
    assert_eq!(transfer.pending_uploads(), 0);
    assert_eq!(transfer.batches_in_flight(), 0);
    assert!(transfer.ring().is_empty());

    // The next batch starts clean and only runs its own callbacks
    let ticket = transfer.upload_buffer(dst, 0, &[4; 32]).unwrap();
    transfer.wait(ticket).unwrap();
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(&device.state().buffers[&dst].data[0..4], &[4; 4]);
}

// ============================================================================
// Images
// ============================================================================

#[test]
fn test_image_upload_transitions_around_copy() {
    let (device, mut transfer) = setup(4096);
    let mut image = texture(16, 16);

    transfer.upload_image(&mut image, &[0xFF; 16 * 16 * 4]).unwrap();
    assert_eq!(image.layout(), ImageLayout::ShaderReadOnly);

    let state = device.state();
    let barriers: Vec<_> = state.barriers.iter().map(|b| (b.old_layout, b.new_layout)).collect();
    assert_eq!(
        barriers,
        vec![
            (ImageLayout::Undefined, ImageLayout::TransferDst),
            (ImageLayout::TransferDst, ImageLayout::ShaderReadOnly),
        ]
    );
    assert_eq!(state.commands_starting_with("copy_buffer_to_image").len(), 1);
}

#[test]
fn test_image_upload_checks_size() {
    let (_device, mut transfer) = setup(4096);
    let mut image = texture(16, 16);
    assert!(transfer.upload_image(&mut image, &[0; 100]).is_err());
    assert_eq!(image.layout(), ImageLayout::Undefined);
}

#[test]
fn test_drop_releases_everything() {
    let (device, mut transfer) = setup(1024);
    let dst = target_buffer(&device, 64);
    transfer.upload_buffer(dst, 0, &[1; 4]).unwrap();
    transfer.flush().unwrap();
    drop(transfer);

    let state = device.state();
    assert!(state.fences.is_empty());
    assert!(state.command_pools.is_empty());
    assert_eq!(state.buffers.len(), 1);
}
