/// Sampler descriptor

use crate::device::CompareOp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerMipmapMode {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerAddressMode {
    Repeat,
    MirroredRepeat,
    ClampToEdge,
    ClampToBorder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderColor {
    FloatTransparentBlack,
    IntTransparentBlack,
    FloatOpaqueBlack,
    IntOpaqueBlack,
    FloatOpaqueWhite,
    IntOpaqueWhite,
}

/// Descriptor for creating a sampler
///
/// Anisotropic filtering is only enabled when `max_anisotropy > 1`, depth
/// comparison only when `compare_op` is not `Never`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerDesc {
    pub min_lod: f32,
    pub max_lod: f32,
    pub mip_lod_bias: f32,
    pub mag_filter: Filter,
    pub min_filter: Filter,
    pub mipmap_mode: SamplerMipmapMode,
    pub address_mode_u: SamplerAddressMode,
    pub address_mode_v: SamplerAddressMode,
    pub address_mode_w: SamplerAddressMode,
    pub max_anisotropy: f32,
    pub compare_op: CompareOp,
    pub border_color: BorderColor,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            min_lod: 0.0,
            max_lod: 0.0,
            mip_lod_bias: 0.0,
            mag_filter: Filter::Linear,
            min_filter: Filter::Linear,
            mipmap_mode: SamplerMipmapMode::Linear,
            address_mode_u: SamplerAddressMode::ClampToEdge,
            address_mode_v: SamplerAddressMode::ClampToEdge,
            address_mode_w: SamplerAddressMode::ClampToEdge,
            max_anisotropy: 1.0,
            compare_op: CompareOp::Never,
            border_color: BorderColor::IntOpaqueWhite,
        }
    }
}

impl SamplerDesc {
    pub fn anisotropy_enabled(&self) -> bool {
        self.max_anisotropy > 1.0
    }

    pub fn compare_enabled(&self) -> bool {
        self.compare_op != CompareOp::Never
    }
}

#[cfg(test)]
#[path = "sampler_tests.rs"]
mod tests;
