//! Scoped typed views of mapped buffer memory

use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

use bytemuck::Pod;

use crate::gfx::context;
use crate::gfx::error::{Error, Result};
use crate::gfx::handle::BufferHandle;

/// A typed window onto a mapped buffer, obtained from
/// [`Buffer::map`](super::Buffer::map).
///
/// The view holds `capacity = bytes / size_of::<T>()` elements; trailing
/// bytes that do not make up a whole `T` are preserved untouched. The
/// mapping is released when the view is dropped, on every exit path, and
/// everything written through it is flushed to the buffer at that point.
pub struct MappedView<'a, T: Pod> {
    buffer: BufferHandle,
    elements: Vec<T>,
    tail: Vec<u8>,
    _buffer: PhantomData<&'a mut [u8]>,
}

impl<'a, T: Pod> MappedView<'a, T> {
    pub(crate) fn new(buffer: BufferHandle) -> Result<Self> {
        let size = std::mem::size_of::<T>();
        assert!(size > 0, "cannot map a buffer as zero-sized elements");

        let bytes = context::with(|ctx| Ok(ctx.driver().map_buffer(buffer)?))?;
        let whole = bytes.len() / size * size;
        let elements = bytemuck::pod_collect_to_vec(&bytes[..whole]);
        log::debug!(
            "Mapped buffer {} as {} elements of {} bytes",
            buffer,
            whole / size,
            size
        );

        Ok(Self {
            buffer,
            elements,
            tail: bytes[whole..].to_vec(),
            _buffer: PhantomData,
        })
    }

    /// Number of elements in the view.
    pub fn capacity(&self) -> usize {
        self.elements.len()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.elements.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.elements.get_mut(index)
    }

    /// Like [`get`](Self::get), but reports an out-of-range index as an
    /// error.
    pub fn try_get(&self, index: usize) -> Result<&T> {
        let capacity = self.capacity();
        self.elements
            .get(index)
            .ok_or(Error::OutOfBounds { index, capacity })
    }

    pub fn try_set(&mut self, index: usize, value: T) -> Result<()> {
        let capacity = self.capacity();
        match self.elements.get_mut(index) {
            Some(element) => {
                *element = value;
                Ok(())
            }
            None => {
                log::error!(
                    "Write to element {} of a {} element view of buffer {}",
                    index,
                    capacity,
                    self.buffer
                );
                Err(Error::OutOfBounds { index, capacity })
            }
        }
    }

    /// Sets element `index`.
    ///
    /// # Panics
    /// If `index` is out of bounds.
    pub fn set(&mut self, index: usize, value: T) {
        self[index] = value;
    }

    /// Copies `data` into the start of the view.
    pub fn copy_from_slice(&mut self, data: &[T]) -> Result<()> {
        if data.len() > self.capacity() {
            return Err(Error::CapacityExceeded {
                requested: data.len() * std::mem::size_of::<T>(),
                capacity: self.capacity() * std::mem::size_of::<T>(),
            });
        }
        self.elements[..data.len()].copy_from_slice(data);
        Ok(())
    }

    pub fn as_slice(&self) -> &[T] {
        &self.elements
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.elements
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.elements.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.elements.iter_mut()
    }
}

impl<T: Pod> Index<usize> for MappedView<'_, T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        match self.elements.get(index) {
            Some(element) => element,
            None => panic!(
                "index {} is out of bounds for a mapped view of {} elements",
                index,
                self.elements.len()
            ),
        }
    }
}

impl<T: Pod> IndexMut<usize> for MappedView<'_, T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        let capacity = self.elements.len();
        match self.elements.get_mut(index) {
            Some(element) => element,
            None => panic!(
                "index {} is out of bounds for a mapped view of {} elements",
                index, capacity
            ),
        }
    }
}

impl<'v, T: Pod> IntoIterator for &'v MappedView<'_, T> {
    type Item = &'v T;
    type IntoIter = std::slice::Iter<'v, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl<'v, T: Pod> IntoIterator for &'v mut MappedView<'_, T> {
    type Item = &'v mut T;
    type IntoIter = std::slice::IterMut<'v, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter_mut()
    }
}

impl<T: Pod + std::fmt::Debug> std::fmt::Debug for MappedView<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedView")
            .field("buffer", &self.buffer)
            .field("elements", &self.elements)
            .finish()
    }
}

impl<T: Pod> Drop for MappedView<'_, T> {
    fn drop(&mut self) {
        let mut contents: Vec<u8> = bytemuck::cast_slice(&self.elements).to_vec();
        contents.extend_from_slice(&self.tail);
        let buffer = self.buffer;
        context::release("Mapped view", |ctx| {
            if let Err(error) = ctx.driver().unmap_buffer(buffer, &contents) {
                log::error!("Failed to unmap buffer {}: {}", buffer, error);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use crate::gfx::error::Error;
    use crate::gfx::resources::{UniformBuffer, VertexBuffer};
    use crate::gfx::test_support::headless;

    #[test]
    fn test_view_capacity_is_bytes_over_element_size() {
        let (_gfx, _) = headless();
        let mut buffer = VertexBuffer::new().unwrap();
        buffer.resize(36).unwrap();

        let view = buffer.map::<f32>().unwrap();
        assert_eq!(view.capacity(), 9);
        drop(view);

        // 36 bytes hold four 8-byte elements plus a 4-byte tail.
        let view = buffer.map::<[f32; 2]>().unwrap();
        assert_eq!(view.capacity(), 4);
    }

    #[test]
    fn test_out_of_range_access_is_an_error() {
        let (_gfx, _) = headless();
        let mut buffer = VertexBuffer::new().unwrap();
        buffer.resize(8).unwrap();
        let mut view = buffer.map::<u32>().unwrap();
        assert!(view.try_get(1).is_ok());
        assert!(matches!(
            view.try_get(2),
            Err(Error::OutOfBounds {
                index: 2,
                capacity: 2
            })
        ));
        assert!(view.try_set(2, 5).is_err());
        assert!(view.get(2).is_none());
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_index_past_end_panics() {
        let (_gfx, _) = headless();
        let mut buffer = VertexBuffer::new().unwrap();
        buffer.resize(8).unwrap();
        let view = buffer.map::<u32>().unwrap();
        let _ = view[2];
    }

    #[test]
    fn test_writes_are_flushed_on_drop() {
        let (_gfx, _) = headless();
        let mut buffer = VertexBuffer::new().unwrap();
        buffer.resize(16).unwrap();
        {
            let mut view = buffer.map::<f32>().unwrap();
            view.set(0, 1.5);
            view[3] = 4.5;
            for value in view.iter_mut().skip(1).take(2) {
                *value = 2.0;
            }
        }
        let view = buffer.map::<f32>().unwrap();
        assert_eq!(view.as_slice(), &[1.5, 2.0, 2.0, 4.5]);
    }

    #[test]
    fn test_mapping_is_released_after_early_return() {
        fn fill(buffer: &mut VertexBuffer) -> crate::gfx::Result<()> {
            let mut view = buffer.map::<u32>()?;
            view[0] = 7;
            view.try_set(10, 1)?;
            Ok(())
        }

        let (_gfx, _) = headless();
        let mut buffer = VertexBuffer::new().unwrap();
        buffer.resize(8).unwrap();
        assert!(fill(&mut buffer).is_err());

        // The failed call still unmapped and flushed.
        let view = buffer.map::<u32>().unwrap();
        assert_eq!(view[0], 7);
    }

    #[test]
    fn test_mapping_empty_buffer_fails() {
        let (_gfx, _) = headless();
        let mut buffer = UniformBuffer::new().unwrap();
        assert!(matches!(buffer.map::<u8>(), Err(Error::EmptyMapping)));
    }
}
