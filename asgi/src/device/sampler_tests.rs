use crate::device::*;

#[test]
fn test_default_sampler() {
    let desc = SamplerDesc::default();
    assert_eq!(desc.min_lod, 0.0);
    assert_eq!(desc.max_lod, 0.0);
    assert_eq!(desc.mag_filter, Filter::Linear);
    assert_eq!(desc.mipmap_mode, SamplerMipmapMode::Linear);
    assert_eq!(desc.address_mode_w, SamplerAddressMode::ClampToEdge);
    assert_eq!(desc.border_color, BorderColor::IntOpaqueWhite);
    assert!(!desc.anisotropy_enabled());
    assert!(!desc.compare_enabled());
}

#[test]
fn test_anisotropy_and_compare_toggles() {
    let desc = SamplerDesc {
        max_anisotropy: 8.0,
        compare_op: CompareOp::LessOrEqual,
        ..SamplerDesc::default()
    };
    assert!(desc.anisotropy_enabled());
    assert!(desc.compare_enabled());
}
