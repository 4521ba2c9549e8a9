use super::*;

#[test]
fn test_buffer_range_inside() {
    assert_eq!(buffer_range(0, 16, 16).unwrap(), 0..16);
    assert_eq!(buffer_range(8, 4, 16).unwrap(), 8..12);
    assert_eq!(buffer_range(16, 0, 16).unwrap(), 16..16);
}

#[test]
fn test_buffer_range_outside() {
    assert!(matches!(buffer_range(8, 9, 16), Err(Error::InvalidResource(_))));
    assert!(matches!(buffer_range(17, 0, 16), Err(Error::InvalidResource(_))));
    assert!(buffer_range(u64::MAX, 2, 16).is_err());
}

#[test]
fn test_handles_keep_raw_values() {
    let buffer = vk::Buffer::from_raw(0xABCD);
    assert_eq!(vk_buffer(BufferHandle::from_raw(buffer.as_raw())), buffer);
    assert_eq!(vk_fence(FenceHandle::NULL), vk::Fence::null());
}
