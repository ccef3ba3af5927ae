use super::*;

fn properties(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
    let mut properties = vk::PhysicalDeviceMemoryProperties::default();
    for (i, flags) in types.iter().enumerate() {
        properties.memory_types[i].property_flags = *flags;
    }
    properties.memory_type_count = types.len() as u32;
    properties
}

#[test]
fn test_memory_location_per_usage() {
    assert_eq!(memory_location(MemoryUsage::DeviceOnly), MemoryLocation::GpuOnly);
    assert_eq!(memory_location(MemoryUsage::CpuOnly), MemoryLocation::CpuToGpu);
    assert_eq!(memory_location(MemoryUsage::CpuToGpu), MemoryLocation::CpuToGpu);
    assert_eq!(memory_location(MemoryUsage::GpuToCpu), MemoryLocation::GpuToCpu);
}

#[test]
fn test_find_memory_type_matches_flags_and_bits() {
    let host = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
    let props = properties(&[
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
        host,
        host,
    ]);

    assert_eq!(find_memory_type_index(&props, u32::MAX, host), Some(1));
    // Type 1 excluded by the resource's type bits
    assert_eq!(find_memory_type_index(&props, 0b101, host), Some(2));
    assert_eq!(find_memory_type_index(&props, 0b001, host), None);
}

#[test]
fn test_find_memory_type_ignores_types_past_count() {
    let mut props = properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
    props.memory_types[3].property_flags = vk::MemoryPropertyFlags::HOST_VISIBLE;
    assert_eq!(find_memory_type_index(&props, u32::MAX, vk::MemoryPropertyFlags::HOST_VISIBLE), None);
}

#[test]
fn test_resolve_memory_type_without_exact_flags() {
    let host = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
    let props = properties(&[
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
        host,
        host | vk::MemoryPropertyFlags::HOST_CACHED,
    ]);

    assert_eq!(resolve_memory_type_index(&props, u32::MAX, host), 1);
    // Nothing in bits 0b100 matches exactly, so the lowest allowed type is reported
    assert_eq!(resolve_memory_type_index(&props, 0b100, host), 2);
    assert_eq!(resolve_memory_type_index(&props, 0b110, vk::MemoryPropertyFlags::LAZILY_ALLOCATED), 1);
    assert_eq!(resolve_memory_type_index(&props, 0, host), 0);
}

#[test]
fn test_atom_aligned_range() {
    assert_eq!(atom_aligned_range(0, 10, 64), (0, 64));
    assert_eq!(atom_aligned_range(70, 10, 64), (64, 64));
    assert_eq!(atom_aligned_range(60, 10, 64), (0, 128));
    assert_eq!(atom_aligned_range(128, 64, 64), (128, 64));
    // Atom size 0 behaves like 1
    assert_eq!(atom_aligned_range(5, 3, 0), (5, 3));
}
