use super::*;
use crate::device::mock_device::MockDevice;
use crate::device::{DescriptorPoolSize, DescriptorType};

fn pool_info(max_sets: u32) -> DescriptorPoolInfo {
    DescriptorPoolInfo {
        max_sets,
        sizes: vec![DescriptorPoolSize { descriptor_type: DescriptorType::UniformBuffer, count: max_sets }],
        update_after_bind: false,
    }
}

#[test]
fn test_allocate_until_full_then_error() {
    let device = Arc::new(MockDevice::new());
    let mut pool = DescriptorPoolStatic::new(device.clone(), &pool_info(2)).unwrap();
    let layout = DescriptorSetLayoutHandle::from_raw(1);

    assert_eq!(pool.allocate(&[layout], None).unwrap().len(), 1);
    assert_eq!(pool.allocate(&[layout], None).unwrap().len(), 1);
    assert_eq!(pool.allocated(), 2);

    let err = pool.allocate(&[layout], None).unwrap_err();
    assert!(matches!(err, Error::DescriptorPoolExhausted(_)));
    // No hidden growth
    assert_eq!(device.state().pools_created, 1);
}

#[test]
fn test_reset_returns_capacity() {
    let device = Arc::new(MockDevice::new());
    let mut pool = DescriptorPoolStatic::new(device, &pool_info(1)).unwrap();
    let layout = DescriptorSetLayoutHandle::from_raw(1);

    pool.allocate(&[layout], None).unwrap();
    assert!(pool.allocate(&[layout], None).is_err());

    pool.reset().unwrap();
    assert_eq!(pool.allocated(), 0);
    assert!(pool.allocate(&[layout], None).is_ok());
    assert_eq!(pool.max_sets(), 1);
}

#[test]
fn test_drop_destroys_pool() {
    let device = Arc::new(MockDevice::new());
    {
        let _pool = DescriptorPoolStatic::new(device.clone(), &pool_info(4)).unwrap();
        assert_eq!(device.state().pools.len(), 1);
    }
    assert!(device.state().pools.is_empty());
}
