use super::*;
use crate::device::mock_device::MockDevice;
use std::sync::Arc;

#[test]
fn test_run_submits_with_instant_fence_and_resets_it() {
    let device = Arc::new(MockDevice::new());
    let mut queue = Queue::new(device.clone(), 2).unwrap();

    InstantSubmitSync::run(&mut queue, |cmd| cmd.dispatch(4, 4, 1)).unwrap();

    let fence = queue.current_frame().instant_submit_fence();
    let state = device.state();
    assert_eq!(state.submits.len(), 1);
    assert_eq!(state.submits[0].fence, Some(fence));
    assert!(state.submits[0].waits.is_empty());
    assert_eq!(state.fences[&fence], false);
    assert_eq!(state.commands_starting_with("dispatch").len(), 1);
}

#[test]
fn test_in_flight_fence_is_untouched() {
    let device = Arc::new(MockDevice::new());
    let mut queue = Queue::new(device.clone(), 2).unwrap();
    let in_flight = queue.current_frame().in_flight_fence();
    device.set_fence(in_flight, false);

    InstantSubmitSync::run(&mut queue, |_| Ok(())).unwrap();
    assert_eq!(device.state().fences[&in_flight], false);
}

#[test]
fn test_recording_error_skips_submission() {
    let device = Arc::new(MockDevice::new());
    let mut queue = Queue::new(device.clone(), 2).unwrap();

    let result = InstantSubmitSync::run(&mut queue, |cmd| cmd.end_rendering());
    assert!(result.is_err());
    assert!(device.state().submits.is_empty());
}

#[test]
fn test_uses_buffers_of_current_slot() {
    let device = Arc::new(MockDevice::new());
    let mut queue = Queue::new(device.clone(), 2).unwrap();
    queue.advance();

    let mut sync = InstantSubmitSync::begin(&mut queue).unwrap();
    assert_eq!(sync.command_buffer().slot(), 1);
    sync.submit(&queue).unwrap();
    assert_eq!(queue.current_frame().buffers_in_use(), 1);
}
