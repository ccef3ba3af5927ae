/// Graphics pipeline descriptor and fixed-function state

use std::collections::BTreeMap;
use bitflags::bitflags;
use crate::device::{RenderPassHandle, ShaderModuleHandle, ShaderReflection, ShaderStage};
use crate::error::{Error, Result};
use crate::format::Format;
use crate::gi_warn;

/// Primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
    TriangleFan,
    /// Patches fed to the tessellation stages, `control_points` vertices each
    PatchList { control_points: u32 },
}

impl PrimitiveTopology {
    pub fn is_patch_list(&self) -> bool {
        matches!(self, PrimitiveTopology::PatchList { .. })
    }
}

/// Vertex input rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexInputRate {
    /// Advance per vertex
    Vertex,
    /// Advance per instance
    Instance,
}

/// One vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Shader input location
    pub location: u32,
    /// Vertex buffer binding the attribute is read from
    pub binding: u32,
    pub format: Format,
    /// Byte offset inside one element of the binding
    pub offset: u32,
}

/// Vertex input layout
///
/// Binding strides are not stored: they are derived from the attributes, see
/// [`VertexLayout::binding_strides`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexLayout {
    pub attributes: Vec<VertexAttribute>,
    /// Input rate per binding. Bindings absent from the map advance per vertex.
    pub input_rates: BTreeMap<u32, VertexInputRate>,
}

impl VertexLayout {
    /// Stride of every binding: the sum of the sizes of its attributes
    pub fn binding_strides(&self) -> BTreeMap<u32, u32> {
        let mut strides = BTreeMap::new();
        for attribute in &self.attributes {
            *strides.entry(attribute.binding).or_insert(0) += attribute.format.size_bytes();
        }
        strides
    }

    pub fn input_rate(&self, binding: u32) -> VertexInputRate {
        self.input_rates
            .get(&binding)
            .copied()
            .unwrap_or(VertexInputRate::Vertex)
    }
}

// ===== RASTERIZATION =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
    FrontAndBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontFace {
    CounterClockwise,
    Clockwise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolygonMode {
    Fill,
    Line,
    Point,
}

/// Depth bias parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthBias {
    pub constant_factor: f32,
    pub slope_factor: f32,
    pub clamp: f32,
}

/// Rasterization state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterizationState {
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub polygon_mode: PolygonMode,
    pub depth_clamp_enable: bool,
    pub rasterizer_discard_enable: bool,
    /// `None` disables depth bias
    pub depth_bias: Option<DepthBias>,
    /// Static line width, ignored when `DynamicState::LineWidth` is set
    pub line_width: f32,
}

impl Default for RasterizationState {
    fn default() -> Self {
        Self {
            cull_mode: CullMode::Back,
            front_face: FrontFace::CounterClockwise,
            polygon_mode: PolygonMode::Fill,
            depth_clamp_enable: false,
            rasterizer_discard_enable: false,
            depth_bias: None,
            line_width: 1.0,
        }
    }
}

// ===== DEPTH / STENCIL =====

/// Comparison operator for depth, stencil and sampler compare
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StencilOp {
    Keep,
    Zero,
    Replace,
    IncrementAndClamp,
    DecrementAndClamp,
    Invert,
    IncrementAndWrap,
    DecrementAndWrap,
}

/// Stencil state of one face
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StencilOpState {
    pub fail_op: StencilOp,
    pub pass_op: StencilOp,
    pub depth_fail_op: StencilOp,
    pub compare_op: CompareOp,
    pub compare_mask: u32,
    pub write_mask: u32,
    pub reference: u32,
}

impl Default for StencilOpState {
    fn default() -> Self {
        Self {
            fail_op: StencilOp::Keep,
            pass_op: StencilOp::Keep,
            depth_fail_op: StencilOp::Keep,
            compare_op: CompareOp::Always,
            compare_mask: 0xFF,
            write_mask: 0xFF,
            reference: 0,
        }
    }
}

/// Depth and stencil test state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthStencilState {
    pub depth_test_enable: bool,
    pub depth_write_enable: bool,
    pub depth_compare_op: CompareOp,
    /// `Some((min, max))` enables the depth bounds test
    pub depth_bounds: Option<(f32, f32)>,
    pub stencil_test_enable: bool,
    pub front: StencilOpState,
    pub back: StencilOpState,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            depth_test_enable: true,
            depth_write_enable: true,
            depth_compare_op: CompareOp::Less,
            depth_bounds: None,
            stencil_test_enable: false,
            front: StencilOpState::default(),
            back: StencilOpState::default(),
        }
    }
}

// ===== COLOR BLEND =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    ConstantColor,
    OneMinusConstantColor,
    SrcAlphaSaturate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendOp {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

bitflags! {
    /// Color channels written by an attachment
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColorWriteMask: u32 {
        const R = 1 << 0;
        const G = 1 << 1;
        const B = 1 << 2;
        const A = 1 << 3;
    }
}

/// Blend state of one color attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorBlendAttachment {
    pub blend_enable: bool,
    pub src_color_factor: BlendFactor,
    pub dst_color_factor: BlendFactor,
    pub color_blend_op: BlendOp,
    pub src_alpha_factor: BlendFactor,
    pub dst_alpha_factor: BlendFactor,
    pub alpha_blend_op: BlendOp,
    pub color_write_mask: ColorWriteMask,
}

impl Default for ColorBlendAttachment {
    fn default() -> Self {
        Self {
            blend_enable: false,
            src_color_factor: BlendFactor::One,
            dst_color_factor: BlendFactor::Zero,
            color_blend_op: BlendOp::Add,
            src_alpha_factor: BlendFactor::One,
            dst_alpha_factor: BlendFactor::Zero,
            alpha_blend_op: BlendOp::Add,
            color_write_mask: ColorWriteMask::all(),
        }
    }
}

impl ColorBlendAttachment {
    /// Standard `src * a + dst * (1 - a)` alpha blending
    pub fn alpha_blend() -> Self {
        Self {
            blend_enable: true,
            src_color_factor: BlendFactor::SrcAlpha,
            dst_color_factor: BlendFactor::OneMinusSrcAlpha,
            src_alpha_factor: BlendFactor::One,
            dst_alpha_factor: BlendFactor::OneMinusSrcAlpha,
            ..Self::default()
        }
    }
}

/// Color blend state, one attachment entry per color attachment of the subpass
#[derive(Debug, Clone, PartialEq)]
pub struct ColorBlendState {
    pub attachments: Vec<ColorBlendAttachment>,
    pub blend_constants: [f32; 4],
}

impl Default for ColorBlendState {
    fn default() -> Self {
        Self {
            attachments: vec![ColorBlendAttachment::default()],
            blend_constants: [0.0; 4],
        }
    }
}

// ===== MULTISAMPLE =====

/// Samples per pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleCount {
    S1,
    S2,
    S4,
    S8,
    S16,
}

impl SampleCount {
    pub fn count(&self) -> u32 {
        match self {
            SampleCount::S1 => 1,
            SampleCount::S2 => 2,
            SampleCount::S4 => 4,
            SampleCount::S8 => 8,
            SampleCount::S16 => 16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultisampleState {
    pub sample_count: SampleCount,
    pub alpha_to_coverage: bool,
}

impl Default for MultisampleState {
    fn default() -> Self {
        Self {
            sample_count: SampleCount::S1,
            alpha_to_coverage: false,
        }
    }
}

/// Pipeline state set while recording instead of at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DynamicState {
    Viewport,
    Scissor,
    LineWidth,
    DepthBias,
    BlendConstants,
    StencilReference,
}

impl DynamicState {
    /// Viewport, scissor and line width
    pub fn defaults() -> Vec<DynamicState> {
        vec![DynamicState::Viewport, DynamicState::Scissor, DynamicState::LineWidth]
    }
}

// ===== SHADER STAGES =====

/// Shader module per graphics stage
///
/// Vertex and fragment are mandatory at pipeline creation, the others optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShaderStages {
    pub vertex: Option<ShaderModuleHandle>,
    pub tessellation_control: Option<ShaderModuleHandle>,
    pub tessellation_evaluation: Option<ShaderModuleHandle>,
    pub geometry: Option<ShaderModuleHandle>,
    pub fragment: Option<ShaderModuleHandle>,
}

impl ShaderStages {
    /// Vertex + fragment only
    pub fn new(vertex: ShaderModuleHandle, fragment: ShaderModuleHandle) -> Self {
        Self {
            vertex: Some(vertex),
            fragment: Some(fragment),
            ..Self::default()
        }
    }

    pub fn get(&self, stage: ShaderStage) -> Option<ShaderModuleHandle> {
        match stage {
            ShaderStage::Vertex => self.vertex,
            ShaderStage::TessellationControl => self.tessellation_control,
            ShaderStage::TessellationEvaluation => self.tessellation_evaluation,
            ShaderStage::Geometry => self.geometry,
            ShaderStage::Fragment => self.fragment,
        }
    }

    /// Present stages in canonical order
    pub fn active(&self) -> Vec<(ShaderStage, ShaderModuleHandle)> {
        ShaderStage::GRAPHICS_ORDER
            .iter()
            .filter_map(|&stage| self.get(stage).map(|module| (stage, module)))
            .collect()
    }

    /// Both mandatory stages are present
    pub fn is_complete(&self) -> bool {
        self.vertex.is_some() && self.fragment.is_some()
    }

    pub fn has_tessellation(&self) -> bool {
        self.tessellation_control.is_some() || self.tessellation_evaluation.is_some()
    }
}

// ===== PIPELINE DESCRIPTOR =====

/// Descriptor for creating a graphics pipeline
#[derive(Debug, Clone)]
pub struct GraphicsPipelineDesc {
    pub vertex_layout: VertexLayout,
    pub stages: ShaderStages,
    pub topology: PrimitiveTopology,
    pub primitive_restart: bool,
    pub rasterization: RasterizationState,
    pub depth_stencil: DepthStencilState,
    pub color_blend: ColorBlendState,
    pub multisample: MultisampleState,
    pub dynamic_states: Vec<DynamicState>,
    /// Render pass the pipeline is compatible with
    pub render_pass: RenderPassHandle,
    /// Subpass index inside `render_pass`
    pub subpass: u32,
}

impl GraphicsPipelineDesc {
    /// Defaults for everything but the stages and the render pass
    pub fn new(stages: ShaderStages, render_pass: RenderPassHandle) -> Self {
        Self {
            vertex_layout: VertexLayout::default(),
            stages,
            topology: PrimitiveTopology::TriangleList,
            primitive_restart: false,
            rasterization: RasterizationState::default(),
            depth_stencil: DepthStencilState::default(),
            color_blend: ColorBlendState::default(),
            multisample: MultisampleState::default(),
            dynamic_states: DynamicState::defaults(),
            render_pass,
            subpass: 0,
        }
    }

    /// Fail with `InvalidStages` on an incomplete or inconsistent stage set
    ///
    /// Vertex and fragment are mandatory. Tessellation takes both of its stages
    /// together with a `PatchList` topology, and a `PatchList` topology needs
    /// tessellation.
    pub fn validate_stages(&self) -> Result<()> {
        if !self.stages.is_complete() {
            let mut missing = Vec::new();
            if self.stages.vertex.is_none() {
                missing.push("vertex");
            }
            if self.stages.fragment.is_none() {
                missing.push("fragment");
            }
            return Err(invalid_stages(format!("missing {} stage", missing.join(" and "))));
        }

        if self.stages.tessellation_control.is_some() != self.stages.tessellation_evaluation.is_some() {
            return Err(invalid_stages(
                "tessellation control and evaluation stages must be set together".to_string(),
            ));
        }
        let tessellation = self.stages.has_tessellation();
        match self.topology {
            PrimitiveTopology::PatchList { .. } if !tessellation => {
                Err(invalid_stages("patch list topology without tessellation stages".to_string()))
            }
            PrimitiveTopology::PatchList { control_points: 0 } => {
                Err(invalid_stages("patch list with zero control points".to_string()))
            }
            topology if tessellation && !topology.is_patch_list() => Err(invalid_stages(format!(
                "tessellation stages require a patch list topology, got {:?}", topology
            ))),
            _ => Ok(()),
        }
    }
}

/// Fail with `InvalidStages` when the module in the `slot` stage was compiled
/// for another stage
pub fn validate_stage_reflection(slot: ShaderStage, reflection: &ShaderReflection) -> Result<()> {
    if reflection.stage != slot {
        return Err(invalid_stages(format!(
            "{:?} module bound to the {:?} stage", reflection.stage, slot
        )));
    }
    Ok(())
}

fn invalid_stages(message: String) -> Error {
    gi_warn!("asgi::pipeline", "Cannot create pipeline: {}", message);
    Error::InvalidStages(message)
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
