// src/wgpu_utils/binding_types.rs
//! WGPU binding type utilities
//!
//! Maps texture kinds, sampling state and uniform buffers onto the wgpu
//! types a bind group layout or sampler is described with.

use crate::gfx::driver::{FilterMode, TextureFormat, TextureParameters, WrapMode};
use crate::gfx::resources::TextureKind;

pub fn uniform() -> wgpu::BindingType {
    wgpu::BindingType::Buffer {
        ty: wgpu::BufferBindingType::Uniform,
        has_dynamic_offset: false,
        min_binding_size: None,
    }
}

pub fn sampler(filtering: wgpu::SamplerBindingType) -> wgpu::BindingType {
    wgpu::BindingType::Sampler(filtering)
}

fn sample_type(kind: TextureKind) -> wgpu::TextureSampleType {
    match kind {
        TextureKind::Colour | TextureKind::HdrColour => {
            wgpu::TextureSampleType::Float { filterable: true }
        }
        TextureKind::Depth => wgpu::TextureSampleType::Depth,
    }
}

/// Binding for a 2D texture of `kind`.
pub fn texture_2d(kind: TextureKind) -> wgpu::BindingType {
    wgpu::BindingType::Texture {
        sample_type: sample_type(kind),
        view_dimension: wgpu::TextureViewDimension::D2,
        multisampled: false,
    }
}

/// Binding for a colour cube map.
pub fn texture_cube() -> wgpu::BindingType {
    wgpu::BindingType::Texture {
        sample_type: sample_type(TextureKind::Colour),
        view_dimension: wgpu::TextureViewDimension::Cube,
        multisampled: false,
    }
}

/// Sampler binding matching what a texture of `kind` is sampled with.
pub fn sampler_for(kind: TextureKind) -> wgpu::BindingType {
    match kind {
        TextureKind::Depth => sampler(wgpu::SamplerBindingType::NonFiltering),
        _ => sampler(wgpu::SamplerBindingType::Filtering),
    }
}

pub fn texture_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Srgba8 => wgpu::TextureFormat::Rgba8UnormSrgb,
        TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        TextureFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
    }
}

fn address_mode(wrap: WrapMode) -> wgpu::AddressMode {
    match wrap {
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
        WrapMode::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
        WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
    }
}

/// Splits a filter into its texel filter and mipmap filter.
fn filter_mode(filter: FilterMode) -> (wgpu::FilterMode, wgpu::FilterMode) {
    match filter {
        FilterMode::Nearest | FilterMode::NearestMipmapNearest => {
            (wgpu::FilterMode::Nearest, wgpu::FilterMode::Nearest)
        }
        FilterMode::Linear => (wgpu::FilterMode::Linear, wgpu::FilterMode::Nearest),
        FilterMode::LinearMipmapLinear => (wgpu::FilterMode::Linear, wgpu::FilterMode::Linear),
    }
}

/// Sampler descriptor equivalent to `parameters`.
pub fn sampler_descriptor(parameters: &TextureParameters) -> wgpu::SamplerDescriptor<'static> {
    let (min_filter, mipmap_filter) = filter_mode(parameters.min_filter);
    let (mag_filter, _) = filter_mode(parameters.mag_filter);
    wgpu::SamplerDescriptor {
        label: Some("topaz sampler"),
        address_mode_u: address_mode(parameters.wrap_s),
        address_mode_v: address_mode(parameters.wrap_t),
        address_mode_w: address_mode(parameters.wrap_t),
        mag_filter,
        min_filter,
        mipmap_filter,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_textures_bind_as_depth() {
        assert_eq!(
            texture_2d(TextureKind::Depth),
            wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Depth,
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            }
        );
        assert_eq!(
            sampler_for(TextureKind::Depth),
            wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering)
        );
    }

    #[test]
    fn test_texture_formats() {
        assert_eq!(
            texture_format(TextureKind::Colour.format(true)),
            wgpu::TextureFormat::Rgba8UnormSrgb
        );
        assert_eq!(
            texture_format(TextureKind::HdrColour.format(false)),
            wgpu::TextureFormat::Rgba16Float
        );
    }

    #[test]
    fn test_mipmapped_sampler() {
        let descriptor = sampler_descriptor(&TextureParameters::default().with_mipmapping());
        assert_eq!(descriptor.min_filter, wgpu::FilterMode::Linear);
        assert_eq!(descriptor.mipmap_filter, wgpu::FilterMode::Linear);
        assert_eq!(descriptor.address_mode_u, wgpu::AddressMode::Repeat);

        let clamped = sampler_descriptor(&TextureParameters::nearest_clamped());
        assert_eq!(clamped.mag_filter, wgpu::FilterMode::Nearest);
        assert_eq!(clamped.address_mode_v, wgpu::AddressMode::ClampToEdge);
    }
}
