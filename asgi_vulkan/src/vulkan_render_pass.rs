/// Render pass creation

use ash::vk;
use asgi::gi::device::{AttachmentReference, RenderPassDesc, SubpassDependency};
use asgi::gi::Result;
use asgi::{gi_bail_warn, gi_err};

use crate::vulkan_format::{format_to_vk, sample_count_to_vk};
use crate::vulkan_state::{access_flags_to_vk, image_layout_to_vk, load_op_to_vk, pipeline_stage_to_vk, store_op_to_vk};

/// Vulkan render pass plus the descriptor it was created from
pub(crate) struct RenderPass {
    pub render_pass: vk::RenderPass,
    pub desc: RenderPassDesc,
}

fn reference_to_vk(reference: &AttachmentReference) -> vk::AttachmentReference {
    vk::AttachmentReference {
        attachment: reference.attachment,
        layout: image_layout_to_vk(reference.layout),
    }
}

fn dependency_to_vk(dependency: &SubpassDependency) -> vk::SubpassDependency {
    vk::SubpassDependency {
        src_subpass: dependency.src_subpass.unwrap_or(vk::SUBPASS_EXTERNAL),
        dst_subpass: dependency.dst_subpass.unwrap_or(vk::SUBPASS_EXTERNAL),
        src_stage_mask: pipeline_stage_to_vk(dependency.src_stage),
        dst_stage_mask: pipeline_stage_to_vk(dependency.dst_stage),
        src_access_mask: access_flags_to_vk(dependency.src_access),
        dst_access_mask: access_flags_to_vk(dependency.dst_access),
        dependency_flags: vk::DependencyFlags::empty(),
    }
}

/// Reject subpasses referencing attachments the pass does not declare
fn validate(desc: &RenderPassDesc) -> Result<()> {
    if desc.subpasses.is_empty() {
        gi_bail_warn!("asgi::vulkan", "Render pass without subpass");
    }
    let count = desc.attachments.len() as u32;
    for (i, subpass) in desc.subpasses.iter().enumerate() {
        let references = subpass
            .input_attachments
            .iter()
            .chain(&subpass.color_attachments)
            .chain(subpass.depth_stencil_attachment.as_ref());
        for reference in references {
            if reference.attachment >= count {
                gi_bail_warn!("asgi::vulkan",
                    "Subpass {} references attachment {} of {}", i, reference.attachment, count);
            }
        }
    }
    Ok(())
}

impl RenderPass {
    pub fn new(device: &ash::Device, desc: &RenderPassDesc) -> Result<Self> {
        validate(desc)?;

        let attachments: Vec<vk::AttachmentDescription> = desc
            .attachments
            .iter()
            .map(|a| vk::AttachmentDescription {
                flags: vk::AttachmentDescriptionFlags::empty(),
                format: format_to_vk(a.format),
                samples: sample_count_to_vk(a.samples),
                load_op: load_op_to_vk(a.load_op),
                store_op: store_op_to_vk(a.store_op),
                stencil_load_op: load_op_to_vk(a.stencil_load_op),
                stencil_store_op: store_op_to_vk(a.stencil_store_op),
                initial_layout: image_layout_to_vk(a.initial_layout),
                final_layout: image_layout_to_vk(a.final_layout),
            })
            .collect();

        // Reference arrays must outlive the subpass descriptions pointing at them
        let inputs: Vec<Vec<vk::AttachmentReference>> = desc
            .subpasses
            .iter()
            .map(|s| s.input_attachments.iter().map(reference_to_vk).collect())
            .collect();
        let colors: Vec<Vec<vk::AttachmentReference>> = desc
            .subpasses
            .iter()
            .map(|s| s.color_attachments.iter().map(reference_to_vk).collect())
            .collect();
        let depths: Vec<Option<vk::AttachmentReference>> = desc
            .subpasses
            .iter()
            .map(|s| s.depth_stencil_attachment.as_ref().map(reference_to_vk))
            .collect();

        let subpasses: Vec<vk::SubpassDescription> = (0..desc.subpasses.len())
            .map(|i| {
                let mut subpass = vk::SubpassDescription::default()
                    .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
                    .input_attachments(&inputs[i])
                    .color_attachments(&colors[i]);
                if let Some(depth) = &depths[i] {
                    subpass = subpass.depth_stencil_attachment(depth);
                }
                subpass
            })
            .collect();

        let dependencies: Vec<vk::SubpassDependency> = desc.dependencies.iter().map(dependency_to_vk).collect();

        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let render_pass = unsafe {
            device
                .create_render_pass(&create_info, None)
                .map_err(|e| gi_err!("asgi::vulkan", "Failed to create render pass: {:?}", e))?
        };

        Ok(Self {
            render_pass,
            desc: desc.clone(),
        })
    }

    pub fn destroy(self, device: &ash::Device) {
        unsafe {
            device.destroy_render_pass(self.render_pass, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asgi::gi::device::{AttachmentDesc, Format};
    use asgi::gi::upload::ImageLayout;

    #[test]
    fn test_external_dependency_uses_subpass_external() {
        let desc = RenderPassDesc::single_pass(AttachmentDesc::color(Format::B8G8R8A8_SRGB, ImageLayout::PresentSrc), None);
        let native = dependency_to_vk(&desc.dependencies[0]);
        assert_eq!(native.src_subpass, vk::SUBPASS_EXTERNAL);
        assert_eq!(native.dst_subpass, 0);
        assert!(native.dst_stage_mask.contains(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT));
    }

    #[test]
    fn test_single_pass_with_depth_is_valid() {
        let desc = RenderPassDesc::single_pass(
            AttachmentDesc::color(Format::R8G8B8A8_UNORM, ImageLayout::ShaderReadOnlyOptimal),
            Some(AttachmentDesc::depth(Format::D32_SFLOAT)),
        );
        assert!(validate(&desc).is_ok());
        let depth = desc.subpasses[0].depth_stencil_attachment.as_ref().map(reference_to_vk);
        assert_eq!(depth.map(|r| r.layout), Some(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL));
    }

    #[test]
    fn test_out_of_range_reference_rejected() {
        let mut desc = RenderPassDesc::single_pass(AttachmentDesc::color(Format::R8G8B8A8_UNORM, ImageLayout::General), None);
        desc.subpasses[0].color_attachments[0].attachment = 3;
        assert!(validate(&desc).is_err());
    }

    #[test]
    fn test_empty_render_pass_rejected() {
        assert!(validate(&RenderPassDesc::default()).is_err());
    }
}
