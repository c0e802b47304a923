// src/wgpu_utils/vertex_layout.rs
//! Lowering of vertex formats to wgpu vertex buffer layouts

use crate::gfx::driver::{BufferType, ComponentType};
use crate::gfx::error::{Error, Result};
use crate::gfx::resources::{Attribute, Format};

/// wgpu vertex format for one attribute, if wgpu has one.
///
/// wgpu has no three-component 8 or 16 bit formats and no normalised 32 bit
/// integers; those attributes return `None`.
pub fn vertex_format(attribute: &Attribute) -> Option<wgpu::VertexFormat> {
    use wgpu::VertexFormat as V;
    use ComponentType as C;

    let format = match (attribute.component_type, attribute.components, attribute.normalised) {
        (C::Byte, 1, true) => V::Snorm8,
        (C::Byte, 2, true) => V::Snorm8x2,
        (C::Byte, 4, true) => V::Snorm8x4,
        (C::Byte, 1, false) => V::Sint8,
        (C::Byte, 2, false) => V::Sint8x2,
        (C::Byte, 4, false) => V::Sint8x4,
        (C::UnsignedByte, 1, true) => V::Unorm8,
        (C::UnsignedByte, 2, true) => V::Unorm8x2,
        (C::UnsignedByte, 4, true) => V::Unorm8x4,
        (C::UnsignedByte, 1, false) => V::Uint8,
        (C::UnsignedByte, 2, false) => V::Uint8x2,
        (C::UnsignedByte, 4, false) => V::Uint8x4,
        (C::Short, 1, true) => V::Snorm16,
        (C::Short, 2, true) => V::Snorm16x2,
        (C::Short, 4, true) => V::Snorm16x4,
        (C::Short, 1, false) => V::Sint16,
        (C::Short, 2, false) => V::Sint16x2,
        (C::Short, 4, false) => V::Sint16x4,
        (C::UnsignedShort, 1, true) => V::Unorm16,
        (C::UnsignedShort, 2, true) => V::Unorm16x2,
        (C::UnsignedShort, 4, true) => V::Unorm16x4,
        (C::UnsignedShort, 1, false) => V::Uint16,
        (C::UnsignedShort, 2, false) => V::Uint16x2,
        (C::UnsignedShort, 4, false) => V::Uint16x4,
        (C::Int, 1, false) => V::Sint32,
        (C::Int, 2, false) => V::Sint32x2,
        (C::Int, 3, false) => V::Sint32x3,
        (C::Int, 4, false) => V::Sint32x4,
        (C::UnsignedInt, 1, false) => V::Uint32,
        (C::UnsignedInt, 2, false) => V::Uint32x2,
        (C::UnsignedInt, 3, false) => V::Uint32x3,
        (C::UnsignedInt, 4, false) => V::Uint32x4,
        (C::Float, 1, _) => V::Float32,
        (C::Float, 2, _) => V::Float32x2,
        (C::Float, 3, _) => V::Float32x3,
        (C::Float, 4, _) => V::Float32x4,
        (C::Double, 1, _) => V::Float64,
        (C::Double, 2, _) => V::Float64x2,
        (C::Double, 3, _) => V::Float64x3,
        (C::Double, 4, _) => V::Float64x4,
        _ => return None,
    };
    Some(format)
}

/// Owned attribute list for one vertex buffer, borrowed as a
/// [`wgpu::VertexBufferLayout`] when a pipeline is built.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexLayout {
    pub array_stride: wgpu::BufferAddress,
    pub step_mode: wgpu::VertexStepMode,
    pub attributes: Vec<wgpu::VertexAttribute>,
}

impl VertexLayout {
    /// Lowers `format`, keeping its packed offsets and attribute indices as
    /// shader locations.
    pub fn from_format(format: &Format, step_mode: wgpu::VertexStepMode) -> Result<Self> {
        let attributes = format
            .attributes()
            .iter()
            .zip(format.offsets())
            .map(|(attribute, offset)| {
                let lowered = vertex_format(attribute).ok_or_else(|| {
                    Error::InvalidFormat(format!(
                        "attribute {} of format '{}' ({} x {:?}) has no wgpu vertex format",
                        attribute.index,
                        format.name(),
                        attribute.components,
                        attribute.component_type
                    ))
                })?;
                Ok(wgpu::VertexAttribute {
                    format: lowered,
                    offset: offset as wgpu::BufferAddress,
                    shader_location: attribute.index,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            array_stride: format.stride() as wgpu::BufferAddress,
            step_mode,
            attributes,
        })
    }

    pub fn desc(&self) -> wgpu::VertexBufferLayout<'_> {
        wgpu::VertexBufferLayout {
            array_stride: self.array_stride,
            step_mode: self.step_mode,
            attributes: &self.attributes,
        }
    }
}

/// Usage flags a wgpu buffer needs to stand in for a buffer of `buffer_type`.
pub fn buffer_usages(buffer_type: BufferType) -> wgpu::BufferUsages {
    let target = match buffer_type {
        BufferType::Vertex => wgpu::BufferUsages::VERTEX,
        BufferType::Index => wgpu::BufferUsages::INDEX,
        BufferType::Uniform => wgpu::BufferUsages::UNIFORM,
    };
    target | wgpu::BufferUsages::COPY_DST
}

/// Index buffers always hold `u32` indices.
pub const INDEX_FORMAT: wgpu::IndexFormat = wgpu::IndexFormat::Uint32;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::resources::fmt;

    #[test]
    fn test_interleaved_format_lowers_with_offsets() {
        let format = Format::new("vertex")
            .attribute(0, 3, ComponentType::Float)
            .attribute(2, 2, ComponentType::Float)
            .with(Attribute::new(3, 4, ComponentType::UnsignedByte).normalised());
        let layout = VertexLayout::from_format(&format, wgpu::VertexStepMode::Vertex).unwrap();

        assert_eq!(layout.array_stride, 24);
        assert_eq!(
            layout.attributes,
            vec![
                wgpu::VertexAttribute {
                    format: wgpu::VertexFormat::Float32x3,
                    offset: 0,
                    shader_location: 0,
                },
                wgpu::VertexAttribute {
                    format: wgpu::VertexFormat::Float32x2,
                    offset: 12,
                    shader_location: 2,
                },
                wgpu::VertexAttribute {
                    format: wgpu::VertexFormat::Unorm8x4,
                    offset: 20,
                    shader_location: 3,
                },
            ]
        );
        assert_eq!(layout.desc().attributes.len(), 3);
    }

    #[test]
    fn test_three_byte_attributes_have_no_wgpu_format() {
        let format = fmt::vec3_normalised_bytes(1);
        assert!(vertex_format(&format.attributes()[0]).is_none());
        assert!(matches!(
            VertexLayout::from_format(&format, wgpu::VertexStepMode::Vertex),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_buffer_usages() {
        assert!(buffer_usages(BufferType::Index).contains(wgpu::BufferUsages::INDEX));
        assert!(buffer_usages(BufferType::Uniform).contains(wgpu::BufferUsages::COPY_DST));
        assert!(!buffer_usages(BufferType::Vertex).contains(wgpu::BufferUsages::UNIFORM));
    }
}
