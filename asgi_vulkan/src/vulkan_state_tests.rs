use super::*;
use asgi::gi::upload::ImageLayoutState;

#[test]
fn test_stage_flags_union() {
    let flags = ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT;
    assert_eq!(
        stage_flags_to_vk(flags),
        vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
    );
    assert_eq!(stage_flags_to_vk(ShaderStageFlags::empty()), vk::ShaderStageFlags::empty());
}

#[test]
fn test_binding_kinds() {
    assert_eq!(binding_kind_to_vk(BindingKind::UniformBuffer), vk::DescriptorType::UNIFORM_BUFFER);
    assert_eq!(binding_kind_to_vk(BindingKind::StorageBuffer), vk::DescriptorType::STORAGE_BUFFER);
    assert_eq!(
        binding_kind_to_vk(BindingKind::CombinedImageSampler),
        vk::DescriptorType::COMBINED_IMAGE_SAMPLER
    );
}

#[test]
fn test_color_write_mask() {
    assert_eq!(color_write_mask_to_vk(ColorWriteMask::all()), vk::ColorComponentFlags::RGBA);
    assert_eq!(
        color_write_mask_to_vk(ColorWriteMask::R | ColorWriteMask::A),
        vk::ColorComponentFlags::R | vk::ColorComponentFlags::A
    );
}

#[test]
fn test_stencil_state_conversion() {
    let state = StencilOpState {
        fail_op: StencilOp::Zero,
        pass_op: StencilOp::Replace,
        depth_fail_op: StencilOp::Keep,
        compare_op: CompareOp::Equal,
        compare_mask: 0x0F,
        write_mask: 0xF0,
        reference: 3,
    };
    let native = stencil_op_state_to_vk(&state);
    assert_eq!(native.fail_op, vk::StencilOp::ZERO);
    assert_eq!(native.pass_op, vk::StencilOp::REPLACE);
    assert_eq!(native.compare_op, vk::CompareOp::EQUAL);
    assert_eq!(native.compare_mask, 0x0F);
    assert_eq!(native.write_mask, 0xF0);
    assert_eq!(native.reference, 3);
}

#[test]
fn test_transfer_dest_barrier_flags() {
    let flags = ImageLayoutState::TransferDest.barrier_flags();
    assert_eq!(access_flags_to_vk(flags.access), vk::AccessFlags::TRANSFER_WRITE);
    assert_eq!(pipeline_stage_to_vk(flags.stage), vk::PipelineStageFlags::TRANSFER);
    assert_eq!(image_layout_to_vk(flags.layout), vk::ImageLayout::TRANSFER_DST_OPTIMAL);
}

#[test]
fn test_depth_attachment_barrier_flags() {
    let flags = ImageLayoutState::DepthStencilAttachment.barrier_flags();
    assert_eq!(
        pipeline_stage_to_vk(flags.stage),
        vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS
    );
    assert_eq!(
        image_layout_to_vk(flags.layout),
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
    );
}

#[test]
fn test_undefined_barrier_has_no_access() {
    let flags = ImageLayoutState::Undefined.barrier_flags();
    assert_eq!(access_flags_to_vk(flags.access), vk::AccessFlags::empty());
    assert_eq!(pipeline_stage_to_vk(flags.stage), vk::PipelineStageFlags::TOP_OF_PIPE);
}

#[test]
fn test_empty_stage_mask_becomes_top_of_pipe() {
    assert_eq!(
        pipeline_stage_to_vk(PipelineStageFlags::empty()),
        vk::PipelineStageFlags::TOP_OF_PIPE
    );
}

#[test]
fn test_present_layout() {
    assert_eq!(image_layout_to_vk(ImageLayout::PresentSrc), vk::ImageLayout::PRESENT_SRC_KHR);
}

#[test]
fn test_sampler_conversions() {
    assert_eq!(filter_to_vk(Filter::Nearest), vk::Filter::NEAREST);
    assert_eq!(mipmap_mode_to_vk(SamplerMipmapMode::Linear), vk::SamplerMipmapMode::LINEAR);
    assert_eq!(
        address_mode_to_vk(SamplerAddressMode::ClampToBorder),
        vk::SamplerAddressMode::CLAMP_TO_BORDER
    );
    assert_eq!(border_color_to_vk(BorderColor::IntOpaqueWhite), vk::BorderColor::INT_OPAQUE_WHITE);
}

#[test]
fn test_index_types() {
    assert_eq!(index_type_to_vk(IndexType::U16), vk::IndexType::UINT16);
    assert_eq!(index_type_to_vk(IndexType::U32), vk::IndexType::UINT32);
}
