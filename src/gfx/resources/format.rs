//! Vertex format descriptors
//!
//! A [`Format`] says how the bytes of one vertex buffer split into typed
//! attributes. Attributes are packed in order: the offset of each is the sum
//! of the sizes before it, and the stride is the total.

use crate::gfx::config::Limits;
use crate::gfx::driver::{AttributePointer, ComponentType};
use crate::gfx::error::{Error, Result};

/// One vertex attribute: `components` values of `component_type` read into
/// shader attribute `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Attribute {
    pub index: u32,
    pub components: u8,
    pub component_type: ComponentType,
    /// Integer components are mapped to `[0, 1]` / `[-1, 1]` when set.
    pub normalised: bool,
}

impl Attribute {
    pub fn new(index: u32, components: u8, component_type: ComponentType) -> Self {
        Self {
            index,
            components,
            component_type,
            normalised: false,
        }
    }

    /// Builder pattern: read integer components as normalised values
    pub fn normalised(mut self) -> Self {
        self.normalised = true;
        self
    }

    /// Size of the attribute in bytes.
    pub fn size(&self) -> usize {
        self.components as usize * self.component_type.size()
    }
}

/// Named, ordered list of attributes describing one vertex buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Format {
    name: String,
    attributes: Vec<Attribute>,
}

impl Format {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
        }
    }

    /// Appends an attribute (builder pattern)
    ///
    /// # Arguments
    /// * `index` - Shader attribute location
    /// * `components` - Number of components, 1 to 4
    /// * `component_type` - Scalar type of each component
    pub fn attribute(self, index: u32, components: u8, component_type: ComponentType) -> Self {
        self.with(Attribute::new(index, components, component_type))
    }

    /// Appends a prepared attribute (builder pattern)
    pub fn with(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Attribute indices in declaration order.
    pub fn indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.attributes.iter().map(|attribute| attribute.index)
    }

    /// Bytes per vertex.
    pub fn stride(&self) -> usize {
        self.attributes.iter().map(Attribute::size).sum()
    }

    /// Byte offset of each attribute within a vertex.
    pub fn offsets(&self) -> Vec<usize> {
        self.attributes
            .iter()
            .scan(0, |offset, attribute| {
                let current = *offset;
                *offset += attribute.size();
                Some(current)
            })
            .collect()
    }

    /// Checks the format on its own: it must have attributes, each with 1 to
    /// 4 components, an index the driver supports and no index twice.
    pub fn validate(&self, limits: &Limits) -> Result<()> {
        if self.attributes.is_empty() {
            return Err(Error::InvalidFormat(format!(
                "format '{}' has no attributes",
                self.name
            )));
        }
        for (position, attribute) in self.attributes.iter().enumerate() {
            if !(1..=4).contains(&attribute.components) {
                return Err(Error::InvalidFormat(format!(
                    "attribute {} of format '{}' has {} components",
                    attribute.index, self.name, attribute.components
                )));
            }
            if attribute.index >= limits.max_vertex_attributes {
                return Err(Error::InvalidFormat(format!(
                    "attribute index {} of format '{}' exceeds the {} supported attributes",
                    attribute.index, self.name, limits.max_vertex_attributes
                )));
            }
            if self.attributes[..position]
                .iter()
                .any(|earlier| earlier.index == attribute.index)
            {
                return Err(Error::InvalidFormat(format!(
                    "attribute index {} appears twice in format '{}'",
                    attribute.index, self.name
                )));
            }
        }
        Ok(())
    }

    /// Driver attribute pointers for a buffer laid out in this format.
    pub fn pointers(&self) -> Vec<AttributePointer> {
        let stride = self.stride();
        self.attributes
            .iter()
            .zip(self.offsets())
            .map(|(attribute, offset)| AttributePointer {
                index: attribute.index,
                components: attribute.components,
                component_type: attribute.component_type,
                normalised: attribute.normalised,
                stride,
                offset,
            })
            .collect()
    }
}

/// Ready-made single attribute formats.
pub mod fmt {
    use super::{Attribute, Format};
    use crate::gfx::driver::ComponentType;

    pub fn one_float(index: u32) -> Format {
        Format::new("one_float").attribute(index, 1, ComponentType::Float)
    }

    pub fn two_floats(index: u32) -> Format {
        Format::new("two_floats").attribute(index, 2, ComponentType::Float)
    }

    pub fn three_floats(index: u32) -> Format {
        Format::new("three_floats").attribute(index, 3, ComponentType::Float)
    }

    pub fn four_floats(index: u32) -> Format {
        Format::new("four_floats").attribute(index, 4, ComponentType::Float)
    }

    pub fn one_uint(index: u32) -> Format {
        Format::new("one_uint").attribute(index, 1, ComponentType::UnsignedInt)
    }

    pub fn one_int(index: u32) -> Format {
        Format::new("one_int").attribute(index, 1, ComponentType::Int)
    }

    /// Three signed bytes read as a unit vector, e.g. packed normals.
    pub fn vec3_normalised_bytes(index: u32) -> Format {
        Format::new("vec3_normalised_bytes")
            .with(Attribute::new(index, 3, ComponentType::Byte).normalised())
    }

    /// Four unsigned bytes read as an RGBA colour in `[0, 1]`.
    pub fn rgba_normalised_bytes(index: u32) -> Format {
        Format::new("rgba_normalised_bytes")
            .with(Attribute::new(index, 4, ComponentType::UnsignedByte).normalised())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stride_and_offsets_are_packed() {
        let format = Format::new("vertex")
            .attribute(0, 3, ComponentType::Float)
            .attribute(1, 2, ComponentType::Float)
            .with(Attribute::new(2, 4, ComponentType::UnsignedByte).normalised());
        assert_eq!(format.stride(), 24);
        assert_eq!(format.offsets(), vec![0, 12, 20]);

        let pointers = format.pointers();
        assert_eq!(pointers[2].offset, 20);
        assert_eq!(pointers[2].stride, 24);
        assert!(pointers[2].normalised);
    }

    #[test]
    fn test_validate_rejects_bad_formats() {
        let limits = Limits::default();
        assert!(Format::new("empty").validate(&limits).is_err());
        assert!(Format::new("wide")
            .attribute(0, 5, ComponentType::Float)
            .validate(&limits)
            .is_err());
        assert!(Format::new("far")
            .attribute(16, 1, ComponentType::Float)
            .validate(&limits)
            .is_err());
        assert!(Format::new("twice")
            .attribute(0, 1, ComponentType::Float)
            .attribute(0, 2, ComponentType::Float)
            .validate(&limits)
            .is_err());
        assert!(fmt::three_floats(0).validate(&limits).is_ok());
    }

    #[test]
    fn test_helpers() {
        assert_eq!(fmt::one_float(0).stride(), 4);
        assert_eq!(fmt::four_floats(0).stride(), 16);
        assert_eq!(fmt::vec3_normalised_bytes(2).stride(), 3);
        assert_eq!(fmt::rgba_normalised_bytes(3).indices().collect::<Vec<_>>(), vec![3]);
    }
}
