/// Graphics pipelines - layout synthesis from reflection and fixed-function state

use std::ffi::CString;
use ash::vk;
use asgi::gi::device::{
    BindingGroupLayoutDesc, DynamicState, GraphicsPipelineDesc, PipelineLayoutDesc, PrimitiveTopology, ShaderReflection,
    ShaderStage,
};
use asgi::gi::Result;
use asgi::{gi_bail_warn, gi_debug, gi_err};

use crate::vulkan_format::{format_to_vk, sample_count_to_vk};
use crate::vulkan_render_pass::RenderPass;
use crate::vulkan_shader::ShaderModule;
use crate::vulkan_state::{
    binding_kind_to_vk, blend_factor_to_vk, blend_op_to_vk, color_write_mask_to_vk, compare_op_to_vk,
    cull_mode_to_vk, dynamic_state_to_vk, front_face_to_vk, input_rate_to_vk, polygon_mode_to_vk,
    shader_stage_to_vk, stage_flags_to_vk, stencil_op_state_to_vk, topology_to_vk,
};

/// Vulkan graphics pipeline with its layout objects
pub(crate) struct Pipeline {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
    /// One per binding group, empty groups included
    pub set_layouts: Vec<vk::DescriptorSetLayout>,
    pub layout_desc: PipelineLayoutDesc,
}

/// Dynamic states of `desc`; viewport and scissor are always dynamic since
/// the pipeline carries no static extent
pub(crate) fn effective_dynamic_states(desc: &GraphicsPipelineDesc) -> Vec<DynamicState> {
    let mut states = desc.dynamic_states.clone();
    for required in [DynamicState::Viewport, DynamicState::Scissor] {
        if !states.contains(&required) {
            gi_debug!("asgi::vulkan", "Adding {:?} to the pipeline's dynamic states", required);
            states.push(required);
        }
    }
    states
}

/// Native vertex bindings: stride from the attributes, input rate per binding
pub(crate) fn vertex_bindings(desc: &GraphicsPipelineDesc) -> Vec<vk::VertexInputBindingDescription> {
    desc.vertex_layout
        .binding_strides()
        .into_iter()
        .map(|(binding, stride)| vk::VertexInputBindingDescription {
            binding,
            stride,
            input_rate: input_rate_to_vk(desc.vertex_layout.input_rate(binding)),
        })
        .collect()
}

fn set_layout_bindings(group: &BindingGroupLayoutDesc) -> Vec<vk::DescriptorSetLayoutBinding<'static>> {
    group
        .entries
        .iter()
        .map(|entry| {
            vk::DescriptorSetLayoutBinding::default()
                .binding(entry.slot)
                .descriptor_type(binding_kind_to_vk(entry.kind))
                .descriptor_count(entry.count)
                .stage_flags(stage_flags_to_vk(entry.visibility))
        })
        .collect()
}

impl Pipeline {
    /// Create the pipeline for `stages`, given in canonical stage order
    pub fn new(
        device: &ash::Device,
        desc: &GraphicsPipelineDesc,
        render_pass: &RenderPass,
        stages: &[(ShaderStage, &ShaderModule)],
    ) -> Result<Self> {
        let color_count = match render_pass.desc.color_attachment_count(desc.subpass) {
            Some(count) => count,
            None => gi_bail_warn!("asgi::vulkan", "Render pass has no subpass {}", desc.subpass),
        };
        if desc.color_blend.attachments.len() != color_count {
            gi_bail_warn!("asgi::vulkan",
                "{} color blend attachment(s) for {} color attachment(s) in subpass {}",
                desc.color_blend.attachments.len(), color_count, desc.subpass);
        }

        let reflections: Vec<&ShaderReflection> = stages.iter().map(|(_, module)| &module.reflection).collect();
        let layout_desc = PipelineLayoutDesc::synthesize(&reflections)?;

        let mut set_layouts = Vec::with_capacity(layout_desc.binding_groups.len());
        match Self::create_layouts(device, &layout_desc, &mut set_layouts) {
            Ok(layout) => match Self::create_pipeline(device, desc, render_pass, stages, layout) {
                Ok(pipeline) => {
                    gi_debug!("asgi::vulkan", "Created pipeline with {} stage(s), {} binding group(s), {} binding(s)",
                        stages.len(), layout_desc.binding_groups.len(), layout_desc.binding_count());
                    Ok(Self { pipeline, layout, set_layouts, layout_desc })
                }
                Err(e) => {
                    unsafe {
                        device.destroy_pipeline_layout(layout, None);
                    }
                    Self::destroy_set_layouts(device, &set_layouts);
                    Err(e)
                }
            },
            Err(e) => {
                Self::destroy_set_layouts(device, &set_layouts);
                Err(e)
            }
        }
    }

    /// Set layouts (pushed into `set_layouts` as created) and the pipeline layout
    fn create_layouts(
        device: &ash::Device,
        layout_desc: &PipelineLayoutDesc,
        set_layouts: &mut Vec<vk::DescriptorSetLayout>,
    ) -> Result<vk::PipelineLayout> {
        for (index, group) in layout_desc.binding_groups.iter().enumerate() {
            let bindings = set_layout_bindings(group);
            let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
            let set_layout = unsafe {
                device
                    .create_descriptor_set_layout(&create_info, None)
                    .map_err(|e| gi_err!("asgi::vulkan", "Failed to create layout of binding group {}: {:?}", index, e))?
            };
            set_layouts.push(set_layout);
        }

        let push_constant_ranges: Vec<vk::PushConstantRange> = layout_desc
            .push_constant_ranges
            .iter()
            .map(|range| vk::PushConstantRange {
                stage_flags: stage_flags_to_vk(range.visibility),
                offset: range.offset,
                size: range.size,
            })
            .collect();

        let create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(set_layouts)
            .push_constant_ranges(&push_constant_ranges);
        unsafe {
            device
                .create_pipeline_layout(&create_info, None)
                .map_err(|e| gi_err!("asgi::vulkan", "Failed to create pipeline layout: {:?}", e))
        }
    }

    fn create_pipeline(
        device: &ash::Device,
        desc: &GraphicsPipelineDesc,
        render_pass: &RenderPass,
        stages: &[(ShaderStage, &ShaderModule)],
        layout: vk::PipelineLayout,
    ) -> Result<vk::Pipeline> {
        let entry_points = stages
            .iter()
            .map(|(_, module)| {
                CString::new(module.reflection.entry_point.as_str()).map_err(|e| {
                    gi_err!("asgi::vulkan", "Invalid entry point '{}': {}", module.reflection.entry_point, e)
                })
            })
            .collect::<Result<Vec<CString>>>()?;

        let stage_infos: Vec<vk::PipelineShaderStageCreateInfo> = stages
            .iter()
            .zip(&entry_points)
            .map(|((stage, module), entry)| {
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(shader_stage_to_vk(*stage))
                    .module(module.module)
                    .name(entry)
            })
            .collect();

        // Vertex input
        let bindings = vertex_bindings(desc);
        let attributes: Vec<vk::VertexInputAttributeDescription> = desc
            .vertex_layout
            .attributes
            .iter()
            .map(|a| vk::VertexInputAttributeDescription {
                location: a.location,
                binding: a.binding,
                format: format_to_vk(a.format),
                offset: a.offset,
            })
            .collect();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(topology_to_vk(desc.topology))
            .primitive_restart_enable(desc.primitive_restart);

        let tessellation = match desc.topology {
            PrimitiveTopology::PatchList { control_points } => Some(
                vk::PipelineTessellationStateCreateInfo::default().patch_control_points(control_points),
            ),
            _ => None,
        };

        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        // Rasterization
        let raster = &desc.rasterization;
        let mut rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(raster.depth_clamp_enable)
            .rasterizer_discard_enable(raster.rasterizer_discard_enable)
            .polygon_mode(polygon_mode_to_vk(raster.polygon_mode))
            .cull_mode(cull_mode_to_vk(raster.cull_mode))
            .front_face(front_face_to_vk(raster.front_face))
            .line_width(raster.line_width);
        if let Some(bias) = raster.depth_bias {
            rasterization = rasterization
                .depth_bias_enable(true)
                .depth_bias_constant_factor(bias.constant_factor)
                .depth_bias_slope_factor(bias.slope_factor)
                .depth_bias_clamp(bias.clamp);
        }

        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(sample_count_to_vk(desc.multisample.sample_count))
            .alpha_to_coverage_enable(desc.multisample.alpha_to_coverage)
            .sample_shading_enable(false);

        // Depth / stencil
        let ds = &desc.depth_stencil;
        let (bounds_enable, (min_bounds, max_bounds)) = match ds.depth_bounds {
            Some(bounds) => (true, bounds),
            None => (false, (0.0, 1.0)),
        };
        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(ds.depth_test_enable)
            .depth_write_enable(ds.depth_write_enable)
            .depth_compare_op(compare_op_to_vk(ds.depth_compare_op))
            .depth_bounds_test_enable(bounds_enable)
            .min_depth_bounds(min_bounds)
            .max_depth_bounds(max_bounds)
            .stencil_test_enable(ds.stencil_test_enable)
            .front(stencil_op_state_to_vk(&ds.front))
            .back(stencil_op_state_to_vk(&ds.back));

        // Color blend, one entry per color attachment
        let blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> = desc
            .color_blend
            .attachments
            .iter()
            .map(|a| vk::PipelineColorBlendAttachmentState {
                blend_enable: a.blend_enable.into(),
                src_color_blend_factor: blend_factor_to_vk(a.src_color_factor),
                dst_color_blend_factor: blend_factor_to_vk(a.dst_color_factor),
                color_blend_op: blend_op_to_vk(a.color_blend_op),
                src_alpha_blend_factor: blend_factor_to_vk(a.src_alpha_factor),
                dst_alpha_blend_factor: blend_factor_to_vk(a.dst_alpha_factor),
                alpha_blend_op: blend_op_to_vk(a.alpha_blend_op),
                color_write_mask: color_write_mask_to_vk(a.color_write_mask),
            })
            .collect();
        let color_blend = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&blend_attachments)
            .blend_constants(desc.color_blend.blend_constants);

        let dynamic_states: Vec<vk::DynamicState> = effective_dynamic_states(desc)
            .into_iter()
            .map(dynamic_state_to_vk)
            .collect();
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let mut create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stage_infos)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(render_pass.render_pass)
            .subpass(desc.subpass);
        if let Some(tessellation) = &tessellation {
            create_info = create_info.tessellation_state(tessellation);
        }

        let pipelines = unsafe {
            device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
                .map_err(|(_, e)| gi_err!("asgi::vulkan", "Failed to create graphics pipeline: {:?}", e))?
        };
        pipelines
            .into_iter()
            .next()
            .ok_or_else(|| gi_err!("asgi::vulkan", "Driver returned no pipeline"))
    }

    fn destroy_set_layouts(device: &ash::Device, set_layouts: &[vk::DescriptorSetLayout]) {
        for set_layout in set_layouts {
            unsafe {
                device.destroy_descriptor_set_layout(*set_layout, None);
            }
        }
    }

    pub fn destroy(self, device: &ash::Device) {
        unsafe {
            device.destroy_pipeline(self.pipeline, None);
            device.destroy_pipeline_layout(self.layout, None);
        }
        Self::destroy_set_layouts(device, &self.set_layouts);
    }
}

#[cfg(test)]
#[path = "vulkan_pipeline_tests.rs"]
mod tests;
