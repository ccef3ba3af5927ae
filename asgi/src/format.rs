/// Pixel and vertex-attribute formats and their byte sizes

/// Data format shared by vertex attributes, images and views
///
/// Names follow the native Vulkan naming: component layout, then numeric type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum Format {
    Undefined,

    // 4 x 32 bit
    R32G32B32A32_SFLOAT,
    R32G32B32A32_SINT,
    R32G32B32A32_UINT,

    // 3 x 32 bit
    R32G32B32_SFLOAT,
    R32G32B32_SINT,
    R32G32B32_UINT,

    // 2 x 32 bit
    R32G32_SFLOAT,
    R32G32_SINT,
    R32G32_UINT,

    // 4 x 16 bit
    R16G16B16A16_SFLOAT,
    R16G16B16A16_SINT,
    R16G16B16A16_SNORM,
    R16G16B16A16_SSCALED,
    R16G16B16A16_UINT,
    R16G16B16A16_UNORM,
    R16G16B16A16_USCALED,

    // 1 x 32 bit
    R32_SFLOAT,
    R32_SINT,
    R32_UINT,

    // 2 x 16 bit
    R16G16_SFLOAT,
    R16G16_SINT,
    R16G16_SNORM,
    R16G16_SSCALED,
    R16G16_UINT,
    R16G16_UNORM,
    R16G16_USCALED,

    // 4 x 8 bit
    R8G8B8A8_SINT,
    R8G8B8A8_SNORM,
    R8G8B8A8_SRGB,
    R8G8B8A8_SSCALED,
    R8G8B8A8_UINT,
    R8G8B8A8_UNORM,
    R8G8B8A8_USCALED,
    B8G8R8A8_SINT,
    B8G8R8A8_SNORM,
    B8G8R8A8_SRGB,
    B8G8R8A8_SSCALED,
    B8G8R8A8_UINT,
    B8G8R8A8_UNORM,
    B8G8R8A8_USCALED,

    // 3 x 8 bit
    R8G8B8_SINT,
    R8G8B8_SNORM,
    R8G8B8_SRGB,
    R8G8B8_SSCALED,
    R8G8B8_UINT,
    R8G8B8_UNORM,
    R8G8B8_USCALED,
    B8G8R8_SINT,
    B8G8R8_SNORM,
    B8G8R8_SRGB,
    B8G8R8_SSCALED,
    B8G8R8_UINT,
    B8G8R8_UNORM,
    B8G8R8_USCALED,

    // 1 x 16 bit
    R16_SFLOAT,
    R16_SINT,
    R16_SNORM,
    R16_SSCALED,
    R16_UINT,
    R16_UNORM,
    R16_USCALED,

    // 2 x 8 bit
    R8G8_SINT,
    R8G8_SNORM,
    R8G8_SRGB,
    R8G8_SSCALED,
    R8G8_UINT,
    R8G8_UNORM,
    R8G8_USCALED,

    // 1 x 8 bit
    R8_SINT,
    R8_SNORM,
    R8_SRGB,
    R8_SSCALED,
    R8_UINT,
    R8_UNORM,
    R8_USCALED,

    // Depth / stencil
    D16_UNORM,
    X8_D24_UNORM_PACK32,
    D32_SFLOAT,
    S8_UINT,
    D16_UNORM_S8_UINT,
    D24_UNORM_S8_UINT,
    D32_SFLOAT_S8_UINT,
}

impl Format {
    /// Size in bytes of one element (vertex attribute or texel)
    ///
    /// Returns 0 for `Undefined` and for combined depth+stencil formats, which
    /// have no single tightly packed texel size.
    pub fn size_bytes(&self) -> u32 {
        use Format::*;
        match self {
            R32G32B32A32_SFLOAT | R32G32B32A32_SINT | R32G32B32A32_UINT => 16,

            R32G32B32_SFLOAT | R32G32B32_SINT | R32G32B32_UINT => 12,

            R32G32_SFLOAT | R32G32_SINT | R32G32_UINT
            | R16G16B16A16_SFLOAT | R16G16B16A16_SINT | R16G16B16A16_SNORM
            | R16G16B16A16_SSCALED | R16G16B16A16_UINT | R16G16B16A16_UNORM
            | R16G16B16A16_USCALED => 8,

            R32_SFLOAT | R32_SINT | R32_UINT
            | R16G16_SFLOAT | R16G16_SINT | R16G16_SNORM | R16G16_SSCALED
            | R16G16_UINT | R16G16_UNORM | R16G16_USCALED
            | R8G8B8A8_SINT | R8G8B8A8_SNORM | R8G8B8A8_SRGB | R8G8B8A8_SSCALED
            | R8G8B8A8_UINT | R8G8B8A8_UNORM | R8G8B8A8_USCALED
            | B8G8R8A8_SINT | B8G8R8A8_SNORM | B8G8R8A8_SRGB | B8G8R8A8_SSCALED
            | B8G8R8A8_UINT | B8G8R8A8_UNORM | B8G8R8A8_USCALED
            | X8_D24_UNORM_PACK32 | D32_SFLOAT => 4,

            R8G8B8_SINT | R8G8B8_SNORM | R8G8B8_SRGB | R8G8B8_SSCALED
            | R8G8B8_UINT | R8G8B8_UNORM | R8G8B8_USCALED
            | B8G8R8_SINT | B8G8R8_SNORM | B8G8R8_SRGB | B8G8R8_SSCALED
            | B8G8R8_UINT | B8G8R8_UNORM | B8G8R8_USCALED => 3,

            R16_SFLOAT | R16_SINT | R16_SNORM | R16_SSCALED
            | R16_UINT | R16_UNORM | R16_USCALED
            | R8G8_SINT | R8G8_SNORM | R8G8_SRGB | R8G8_SSCALED
            | R8G8_UINT | R8G8_UNORM | R8G8_USCALED
            | D16_UNORM => 2,

            R8_SINT | R8_SNORM | R8_SRGB | R8_SSCALED
            | R8_UINT | R8_UNORM | R8_USCALED
            | S8_UINT => 1,

            Undefined | D16_UNORM_S8_UINT | D24_UNORM_S8_UINT | D32_SFLOAT_S8_UINT => 0,
        }
    }

    /// Format has a depth component
    pub fn is_depth(&self) -> bool {
        matches!(
            self,
            Format::D16_UNORM
                | Format::X8_D24_UNORM_PACK32
                | Format::D32_SFLOAT
                | Format::D16_UNORM_S8_UINT
                | Format::D24_UNORM_S8_UINT
                | Format::D32_SFLOAT_S8_UINT
        )
    }

    /// Format has a stencil component
    pub fn is_stencil(&self) -> bool {
        matches!(
            self,
            Format::S8_UINT
                | Format::D16_UNORM_S8_UINT
                | Format::D24_UNORM_S8_UINT
                | Format::D32_SFLOAT_S8_UINT
        )
    }

    /// Format has both depth and stencil components
    pub fn is_depth_stencil(&self) -> bool {
        self.is_depth() && self.is_stencil()
    }
}

/// Byte size of `format`, 0 when the format has no packed size
pub fn format_size(format: Format) -> u32 {
    format.size_bytes()
}

#[cfg(test)]
#[path = "format_tests.rs"]
mod tests;
