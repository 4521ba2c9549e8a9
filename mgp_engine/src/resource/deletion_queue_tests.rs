use super::*;
use crate::device::mock_device::MockDevice;
use crate::device::{BufferInfo, BufferUsage, MemoryLocation};

fn setup() -> (Arc<MockDevice>, DeletionQueue) {
    let device = Arc::new(MockDevice::new());
    let queue = DeletionQueue::new(device.clone(), 3);
    (device, queue)
}

fn make_buffer(device: &MockDevice) -> BufferHandle {
    device
        .create_buffer(&BufferInfo {
            size: 64,
            usage: BufferUsage::STORAGE,
            location: MemoryLocation::GpuOnly,
            name: "doomed".to_string(),
        })
        .unwrap()
}

#[test]
fn test_object_survives_frames_in_flight() {
    let (device, mut queue) = setup();
    let buffer = make_buffer(&device);
    queue.push(DeferredDestroy::Buffer(buffer));

    for frame in 1..3 {
        queue.set_frame(frame);
        assert_eq!(queue.collect(), 0);
        assert!(device.state().buffers.contains_key(&buffer));
    }

    queue.set_frame(3);
    assert_eq!(queue.collect(), 1);
    assert!(!device.state().buffers.contains_key(&buffer));
    assert!(queue.is_empty());
}

#[test]
fn test_collect_stops_at_first_young_entry() {
    let (device, mut queue) = setup();
    let old = make_buffer(&device);
    let young = make_buffer(&device);

    queue.push(DeferredDestroy::Buffer(old));
    queue.set_frame(2);
    queue.push(DeferredDestroy::Buffer(young));

    queue.set_frame(3);
    assert_eq!(queue.collect(), 1);
    assert_eq!(queue.len(), 1);
    assert!(device.state().buffers.contains_key(&young));

    queue.set_frame(5);
    assert_eq!(queue.collect(), 1);
}

#[test]
fn test_flush_all_ignores_stamps() {
    let (device, mut queue) = setup();
    queue.push(DeferredDestroy::Buffer(make_buffer(&device)));
    queue.push(DeferredDestroy::Buffer(make_buffer(&device)));
    queue.flush_all();
    assert!(queue.is_empty());
    assert!(device.state().buffers.is_empty());
}

#[test]
fn test_drop_flushes() {
    let (device, mut queue) = setup();
    queue.push(DeferredDestroy::Buffer(make_buffer(&device)));
    drop(queue);
    assert!(device.state().buffers.is_empty());
}
