//! Objects: a vertex array plus the buffers and formats it reads from
//!
//! An [`Object`] owns every buffer emplaced into it and the format attached
//! to each vertex buffer. Slots are insertion-ordered integers and stay
//! valid for the lifetime of the object.

use std::collections::BTreeMap;

use super::buffer::{Buffer, BufferKind, IndexBuffer, UniformBuffer, VertexBuffer};
use super::format::Format;
use crate::gfx::context::{self, bound};
use crate::gfx::driver::BufferType;
use crate::gfx::error::{Error, Result};
use crate::gfx::handle::{BufferHandle, VertexArrayHandle};

/// A buffer of any kind, as stored in an object slot.
#[derive(Debug)]
pub enum AnyBuffer {
    Vertex(VertexBuffer),
    Index(IndexBuffer),
    Uniform(UniformBuffer),
}

impl AnyBuffer {
    pub fn buffer_type(&self) -> BufferType {
        match self {
            AnyBuffer::Vertex(_) => BufferType::Vertex,
            AnyBuffer::Index(_) => BufferType::Index,
            AnyBuffer::Uniform(_) => BufferType::Uniform,
        }
    }

    pub fn handle(&self) -> BufferHandle {
        match self {
            AnyBuffer::Vertex(buffer) => buffer.handle(),
            AnyBuffer::Index(buffer) => buffer.handle(),
            AnyBuffer::Uniform(buffer) => buffer.handle(),
        }
    }

    pub fn capacity(&self) -> usize {
        match self {
            AnyBuffer::Vertex(buffer) => buffer.capacity(),
            AnyBuffer::Index(buffer) => buffer.capacity(),
            AnyBuffer::Uniform(buffer) => buffer.capacity(),
        }
    }
}

/// Owner of a vertex array and its buffers.
#[derive(Debug)]
pub struct Object {
    handle: VertexArrayHandle,
    buffers: Vec<AnyBuffer>,
    formats: BTreeMap<usize, Format>,
}

impl Object {
    pub fn new() -> Result<Self> {
        let handle = context::with(|ctx| Ok(ctx.driver().create_vertex_array()?))?;
        log::debug!("Created object {}", handle);
        Ok(Self {
            handle,
            buffers: Vec::new(),
            formats: BTreeMap::new(),
        })
    }

    pub fn handle(&self) -> VertexArrayHandle {
        self.handle
    }

    /// Creates a buffer of kind `K` and returns its slot.
    pub fn emplace_buffer<K: BufferKind>(&mut self) -> Result<usize> {
        let buffer = Buffer::<K>::new()?;
        self.buffers.push(K::wrap(buffer));
        Ok(self.buffers.len() - 1)
    }

    fn slot(&self, slot: usize) -> Result<&AnyBuffer> {
        self.buffers.get(slot).ok_or_else(|| {
            log::warn!("Object {} has no buffer in slot {}", self.handle, slot);
            Error::NoSuchSlot(slot)
        })
    }

    fn mismatch<K: BufferKind>(&self, slot: usize, actual: BufferType) -> Error {
        log::error!(
            "Slot {} of object {} holds a {} buffer, not a {} buffer",
            slot,
            self.handle,
            actual,
            K::TYPE
        );
        Error::KindMismatch {
            slot,
            expected: K::TYPE,
            actual,
        }
    }

    /// The buffer in `slot`, which must be of kind `K`.
    pub fn get<K: BufferKind>(&self, slot: usize) -> Result<&Buffer<K>> {
        let buffer = self.slot(slot)?;
        K::unwrap_ref(buffer).ok_or_else(|| self.mismatch::<K>(slot, buffer.buffer_type()))
    }

    /// Mutable access to the buffer in `slot`, which must be of kind `K`.
    pub fn get_mut<K: BufferKind>(&mut self, slot: usize) -> Result<&mut Buffer<K>> {
        let actual = self.slot(slot)?.buffer_type();
        if actual != K::TYPE {
            return Err(self.mismatch::<K>(slot, actual));
        }
        match self.buffers.get_mut(slot).and_then(K::unwrap_mut) {
            Some(buffer) => Ok(buffer),
            None => Err(Error::NoSuchSlot(slot)),
        }
    }

    /// The buffer in `slot` regardless of kind.
    pub fn buffer(&self, slot: usize) -> Option<&AnyBuffer> {
        self.buffers.get(slot)
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Slots holding buffers of kind `K`, in order.
    pub fn buffers_of<K: BufferKind>(&self) -> impl Iterator<Item = usize> + '_ {
        self.buffers
            .iter()
            .enumerate()
            .filter(|(_, buffer)| buffer.buffer_type() == K::TYPE)
            .map(|(slot, _)| slot)
    }

    /// Attaches `format` to the vertex buffer in `slot` and points the
    /// vertex array's attributes at it. Replaces any earlier format of the
    /// same slot, disabling the attributes only the old format used.
    ///
    /// Fails if the slot is not a vertex buffer, the format is malformed,
    /// one of its attribute indices is already used by another slot, or a
    /// single vertex would not fit in the buffer.
    pub fn format(&mut self, slot: usize, format: Format) -> Result<()> {
        let buffer = self.slot(slot)?;
        let AnyBuffer::Vertex(vertices) = buffer else {
            let actual = buffer.buffer_type();
            log::error!(
                "Cannot format slot {} of object {}: it holds a {} buffer",
                slot,
                self.handle,
                actual
            );
            return Err(Error::NotAVertexBuffer { slot, actual });
        };
        let buffer_handle = vertices.handle();
        let capacity = vertices.capacity();

        let limits = context::limits().ok_or(Error::NoContext)?;
        if let Err(error) = format.validate(&limits) {
            log::error!("Rejected format for slot {} of object {}: {}", slot, self.handle, error);
            return Err(error);
        }

        for index in format.indices() {
            let collision = self
                .formats
                .iter()
                .find(|(other, existing)| **other != slot && existing.indices().any(|i| i == index));
            if let Some((&other, _)) = collision {
                log::error!(
                    "Attribute {} of object {} is already formatted by slot {}",
                    index,
                    self.handle,
                    other
                );
                return Err(Error::AttributeCollision { index, slot: other });
            }
        }

        let stride = format.stride();
        if capacity > 0 && stride > capacity {
            log::error!(
                "Format '{}' needs {} bytes per vertex but slot {} of object {} holds {}",
                format.name(),
                stride,
                slot,
                self.handle,
                capacity
            );
            return Err(Error::FormatExceedsBuffer {
                slot,
                stride,
                capacity,
            });
        }

        let handle = self.handle;
        let pointers = format.pointers();
        let stale: Vec<u32> = self
            .formats
            .get(&slot)
            .map(|previous| {
                previous
                    .indices()
                    .filter(|index| !format.indices().any(|i| i == *index))
                    .collect()
            })
            .unwrap_or_default();
        context::with(|ctx| {
            for &index in &stale {
                ctx.driver().disable_vertex_array_attribute(handle, index)?;
            }
            for pointer in &pointers {
                ctx.driver()
                    .vertex_array_attribute(handle, buffer_handle, pointer)?;
            }
            Ok(())
        })?;
        self.formats.insert(slot, format);
        Ok(())
    }

    /// Format of the vertex buffer in `slot`, if one was attached.
    pub fn format_of(&self, slot: usize) -> Option<&Format> {
        self.formats.get(&slot)
    }

    pub fn formats(&self) -> impl Iterator<Item = (usize, &Format)> {
        self.formats.iter().map(|(slot, format)| (*slot, format))
    }

    /// Makes this the driver's current object. Binding the object that is
    /// already current issues no driver call.
    pub fn bind(&self) -> Result<()> {
        let handle = self.handle;
        context::with(|ctx| ctx.bind_object(handle))
    }

    /// Clears the current object if it is this one.
    pub fn unbind(&self) -> Result<()> {
        let handle = self.handle;
        context::with(|ctx| {
            if ctx.bound().object() == handle {
                ctx.bind_object(VertexArrayHandle::NONE)?;
            }
            Ok(())
        })
    }

    pub fn is_bound(&self) -> bool {
        self.handle.is_some() && bound::object() == self.handle
    }
}

impl Drop for Object {
    fn drop(&mut self) {
        let handle = self.handle.take();
        if handle.is_none() {
            return;
        }
        context::release("Object", |ctx| ctx.release_vertex_array(handle));
        log::debug!("Released object {}", handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::resources::buffer::kind::{Index, Uniform, Vertex};
    use crate::gfx::resources::fmt;
    use crate::gfx::test_support::headless;

    #[test]
    fn test_bind_and_unbind_track_current_object() {
        let (_gfx, _) = headless();
        let object = Object::new().unwrap();
        let other = Object::new().unwrap();

        object.bind().unwrap();
        assert_eq!(bound::object(), object.handle());
        assert!(object.is_bound());

        // Idempotent.
        object.bind().unwrap();
        assert!(object.is_bound());

        // Unbinding an object that is not current leaves the binding alone.
        other.unbind().unwrap();
        assert!(object.is_bound());

        object.unbind().unwrap();
        assert_ne!(bound::object(), object.handle());
    }

    #[test]
    fn test_slots_are_insertion_ordered() {
        let (_gfx, _) = headless();
        let mut object = Object::new().unwrap();
        assert_eq!(object.emplace_buffer::<Vertex>().unwrap(), 0);
        assert_eq!(object.emplace_buffer::<Index>().unwrap(), 1);
        assert_eq!(object.emplace_buffer::<Vertex>().unwrap(), 2);
        assert_eq!(object.buffer_count(), 3);
        assert_eq!(object.buffers_of::<Vertex>().collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(object.buffers_of::<Uniform>().count(), 0);
    }

    #[test]
    fn test_kind_mismatch_is_an_error() {
        let (_gfx, _) = headless();
        let mut object = Object::new().unwrap();
        let slot = object.emplace_buffer::<Index>().unwrap();
        assert!(object.get::<Index>(slot).is_ok());
        assert!(matches!(
            object.get::<Vertex>(slot),
            Err(Error::KindMismatch {
                expected: BufferType::Vertex,
                actual: BufferType::Index,
                ..
            })
        ));
        assert!(object.get_mut::<Uniform>(slot).is_err());
        assert!(matches!(object.get::<Index>(7), Err(Error::NoSuchSlot(7))));
    }

    #[test]
    fn test_format_only_applies_to_vertex_buffers() {
        let (_gfx, _) = headless();
        let mut object = Object::new().unwrap();
        let index = object.emplace_buffer::<Index>().unwrap();
        assert!(matches!(
            object.format(index, fmt::one_uint(0)),
            Err(Error::NotAVertexBuffer { .. })
        ));
        assert!(object.format_of(index).is_none());
    }

    #[test]
    fn test_attribute_collision_across_slots() {
        let (_gfx, _) = headless();
        let mut object = Object::new().unwrap();
        let positions = object.emplace_buffer::<Vertex>().unwrap();
        let colours = object.emplace_buffer::<Vertex>().unwrap();
        object.format(positions, fmt::three_floats(0)).unwrap();
        assert!(matches!(
            object.format(colours, fmt::four_floats(0)),
            Err(Error::AttributeCollision { index: 0, slot: 0 })
        ));
        object.format(colours, fmt::four_floats(1)).unwrap();
        // Reformatting a slot with its own indices is not a collision.
        object.format(positions, fmt::two_floats(0)).unwrap();
        assert_eq!(object.formats().count(), 2);
    }

    #[test]
    fn test_format_must_fit_in_buffer() {
        let (_gfx, _) = headless();
        let mut object = Object::new().unwrap();
        let slot = object.emplace_buffer::<Vertex>().unwrap();
        object.get_mut::<Vertex>(slot).unwrap().resize(8).unwrap();
        assert!(matches!(
            object.format(slot, fmt::three_floats(0)),
            Err(Error::FormatExceedsBuffer {
                stride: 12,
                capacity: 8,
                ..
            })
        ));
    }
}
