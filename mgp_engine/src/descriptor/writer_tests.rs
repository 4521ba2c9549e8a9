use super::*;
use crate::device::mock_device::MockDevice;

#[test]
fn test_update_flushes_all_writes_in_one_call() {
    let device = MockDevice::new();
    let set = DescriptorSetHandle::from_raw(77);
    let mut writer = DescriptorWriter::new();
    writer
        .write_buffer(0, BufferHandle::from_raw(1), 0, 256, DescriptorType::UniformBuffer)
        .write_combined_image(1, ImageViewHandle::from_raw(2), SamplerHandle::from_raw(3), ImageLayout::ShaderReadOnly)
        .write_sampler(2, SamplerHandle::from_raw(3));
    assert_eq!(writer.len(), 3);

    writer.update(&device, set);

    let state = device.state();
    assert_eq!(state.descriptor_writes.len(), 3);
    assert!(state.descriptor_writes.iter().all(|w| w.set == set));
    assert_eq!(state.descriptor_writes[1].binding, 1);
    assert_eq!(
        state.descriptor_writes[1].resource.descriptor_type(),
        DescriptorType::CombinedImageSampler
    );
    drop(state);
    assert!(writer.is_empty());
}

#[test]
fn test_array_element_is_kept() {
    let device = MockDevice::new();
    let mut writer = DescriptorWriter::new();
    writer.write_array_element(2, 41, DescriptorResource::Sampler(SamplerHandle::from_raw(9)));
    writer.update(&device, DescriptorSetHandle::from_raw(1));
    assert_eq!(device.state().descriptor_writes[0].array_element, 41);
}

#[test]
fn test_empty_update_is_a_no_op() {
    let device = MockDevice::new();
    DescriptorWriter::new().update(&device, DescriptorSetHandle::from_raw(1));
    assert!(device.state().descriptor_writes.is_empty());
}
