/// Sampler creation from a SamplerDesc

use ash::vk;
use asgi::gi::device::SamplerDesc;
use asgi::gi::Result;
use asgi::{gi_err, gi_warn};

use crate::vulkan_state::{address_mode_to_vk, border_color_to_vk, compare_op_to_vk, filter_to_vk, mipmap_mode_to_vk};

/// Create info for `desc`
///
/// Anisotropy is clamped to `max_anisotropy` and disabled when the device
/// does not support it.
pub(crate) fn sampler_create_info(desc: &SamplerDesc, max_anisotropy: Option<f32>) -> vk::SamplerCreateInfo<'static> {
    let mut create_info = vk::SamplerCreateInfo::default()
        .mag_filter(filter_to_vk(desc.mag_filter))
        .min_filter(filter_to_vk(desc.min_filter))
        .mipmap_mode(mipmap_mode_to_vk(desc.mipmap_mode))
        .address_mode_u(address_mode_to_vk(desc.address_mode_u))
        .address_mode_v(address_mode_to_vk(desc.address_mode_v))
        .address_mode_w(address_mode_to_vk(desc.address_mode_w))
        .mip_lod_bias(desc.mip_lod_bias)
        .min_lod(desc.min_lod)
        .max_lod(desc.max_lod)
        .border_color(border_color_to_vk(desc.border_color))
        .unnormalized_coordinates(false);

    if desc.compare_enabled() {
        create_info = create_info
            .compare_enable(true)
            .compare_op(compare_op_to_vk(desc.compare_op));
    } else {
        create_info = create_info
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS);
    }

    match (desc.anisotropy_enabled(), max_anisotropy) {
        (true, Some(limit)) => {
            create_info = create_info
                .anisotropy_enable(true)
                .max_anisotropy(desc.max_anisotropy.min(limit));
        }
        _ => {
            create_info = create_info
                .anisotropy_enable(false)
                .max_anisotropy(1.0);
        }
    }

    create_info
}

pub(crate) fn create_sampler(device: &ash::Device, desc: &SamplerDesc, max_anisotropy: Option<f32>) -> Result<vk::Sampler> {
    if desc.anisotropy_enabled() && max_anisotropy.is_none() {
        gi_warn!("asgi::vulkan", "Sampler anisotropy {} requested but not supported, disabled", desc.max_anisotropy);
    }
    let create_info = sampler_create_info(desc, max_anisotropy);
    unsafe {
        device
            .create_sampler(&create_info, None)
            .map_err(|e| gi_err!("asgi::vulkan", "Failed to create sampler: {:?}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asgi::gi::device::{CompareOp, Filter};

    #[test]
    fn test_default_sampler_has_no_anisotropy_or_compare() {
        let info = sampler_create_info(&SamplerDesc::default(), Some(16.0));
        assert_eq!(info.anisotropy_enable, vk::FALSE);
        assert_eq!(info.max_anisotropy, 1.0);
        assert_eq!(info.compare_enable, vk::FALSE);
    }

    #[test]
    fn test_anisotropy_clamped_to_device_limit() {
        let desc = SamplerDesc { max_anisotropy: 32.0, ..SamplerDesc::default() };
        let info = sampler_create_info(&desc, Some(16.0));
        assert_eq!(info.anisotropy_enable, vk::TRUE);
        assert_eq!(info.max_anisotropy, 16.0);
    }

    #[test]
    fn test_anisotropy_disabled_without_device_support() {
        let desc = SamplerDesc { max_anisotropy: 8.0, ..SamplerDesc::default() };
        let info = sampler_create_info(&desc, None);
        assert_eq!(info.anisotropy_enable, vk::FALSE);
    }

    #[test]
    fn test_compare_enabled_for_shadow_sampler() {
        let desc = SamplerDesc {
            compare_op: CompareOp::LessOrEqual,
            mag_filter: Filter::Nearest,
            ..SamplerDesc::default()
        };
        let info = sampler_create_info(&desc, None);
        assert_eq!(info.compare_enable, vk::TRUE);
        assert_eq!(info.compare_op, vk::CompareOp::LESS_OR_EQUAL);
        assert_eq!(info.mag_filter, vk::Filter::NEAREST);
    }
}
