//! GPU buffers
//!
//! [`Buffer`] owns one driver buffer allocation. The kind (vertex, index or
//! uniform) is a type parameter, so an index buffer can never be handed to
//! code expecting a vertex buffer.

use std::marker::PhantomData;

use bytemuck::Pod;

use super::mapped_pool::MappedView;
use super::object::AnyBuffer;
use crate::gfx::context::{self, bound};
use crate::gfx::driver::BufferType;
use crate::gfx::error::{Error, Result};
use crate::gfx::handle::BufferHandle;

/// Marker types selecting the kind of a [`Buffer`].
pub mod kind {
    /// Per-vertex attribute data.
    #[derive(Debug)]
    pub enum Vertex {}
    /// `u32` element indices.
    #[derive(Debug)]
    pub enum Index {}
    /// Uniform block storage.
    #[derive(Debug)]
    pub enum Uniform {}
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::kind::Vertex {}
    impl Sealed for super::kind::Index {}
    impl Sealed for super::kind::Uniform {}
}

/// Implemented by the markers in [`kind`].
pub trait BufferKind: sealed::Sealed + Sized + 'static {
    const TYPE: BufferType;
    /// Geometry buffers refuse zero-sized allocations.
    const HOLDS_GEOMETRY: bool;

    #[doc(hidden)]
    fn wrap(buffer: Buffer<Self>) -> AnyBuffer;
    #[doc(hidden)]
    fn unwrap_ref(buffer: &AnyBuffer) -> Option<&Buffer<Self>>;
    #[doc(hidden)]
    fn unwrap_mut(buffer: &mut AnyBuffer) -> Option<&mut Buffer<Self>>;
}

macro_rules! buffer_kind {
    ($kind:ident, $geometry:literal) => {
        impl BufferKind for kind::$kind {
            const TYPE: BufferType = BufferType::$kind;
            const HOLDS_GEOMETRY: bool = $geometry;

            fn wrap(buffer: Buffer<Self>) -> AnyBuffer {
                AnyBuffer::$kind(buffer)
            }

            fn unwrap_ref(buffer: &AnyBuffer) -> Option<&Buffer<Self>> {
                match buffer {
                    AnyBuffer::$kind(buffer) => Some(buffer),
                    _ => None,
                }
            }

            fn unwrap_mut(buffer: &mut AnyBuffer) -> Option<&mut Buffer<Self>> {
                match buffer {
                    AnyBuffer::$kind(buffer) => Some(buffer),
                    _ => None,
                }
            }
        }
    };
}

buffer_kind!(Vertex, true);
buffer_kind!(Index, true);
buffer_kind!(Uniform, false);

pub type VertexBuffer = Buffer<kind::Vertex>;
pub type IndexBuffer = Buffer<kind::Index>;
pub type UniformBuffer = Buffer<kind::Uniform>;

/// One driver buffer allocation of kind `K`.
///
/// A buffer starts with no storage. [`resize`](Self::resize) allocates fresh
/// storage (the old contents are gone), [`terminal_resize`](Self::terminal_resize)
/// allocates immutable storage that can never change size again.
#[derive(Debug)]
pub struct Buffer<K: BufferKind> {
    handle: BufferHandle,
    capacity: usize,
    terminal: bool,
    previous_content: Vec<u8>,
    _kind: PhantomData<K>,
}

impl<K: BufferKind> Buffer<K> {
    pub fn new() -> Result<Self> {
        let handle = context::with(|ctx| Ok(ctx.driver().create_buffer()?))?;
        log::debug!("Created {} buffer {}", K::TYPE, handle);
        Ok(Self {
            handle,
            capacity: 0,
            terminal: false,
            previous_content: Vec::new(),
            _kind: PhantomData,
        })
    }

    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    pub fn buffer_type(&self) -> BufferType {
        K::TYPE
    }

    /// Size of the current allocation in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// Number of whole `T` that fit in the allocation.
    pub fn element_count<T: Pod>(&self) -> usize {
        match std::mem::size_of::<T>() {
            0 => 0,
            size => self.capacity / size,
        }
    }

    /// Reallocates the buffer to exactly `bytes`. Contents are undefined
    /// afterwards until re-uploaded.
    ///
    /// # Panics
    /// If the buffer was sized by [`terminal_resize`](Self::terminal_resize).
    pub fn resize(&mut self, bytes: usize) -> Result<()> {
        self.allocate(bytes, false)
    }

    /// Like [`resize`](Self::resize), but the storage is immutable: no
    /// further resize of any kind is allowed.
    ///
    /// # Panics
    /// If the buffer was already sized by a terminal resize.
    pub fn terminal_resize(&mut self, bytes: usize) -> Result<()> {
        self.allocate(bytes, true)?;
        self.terminal = true;
        Ok(())
    }

    fn allocate(&mut self, bytes: usize, immutable: bool) -> Result<()> {
        assert!(
            !self.terminal,
            "{} buffer {} has a fixed size of {} bytes and cannot be resized",
            K::TYPE,
            self.handle,
            self.capacity
        );
        if bytes == 0 && K::HOLDS_GEOMETRY {
            log::error!(
                "Refusing to allocate zero bytes for {} buffer {}",
                K::TYPE,
                self.handle
            );
            return Err(Error::ZeroSizedGeometry(K::TYPE));
        }

        let handle = self.handle;
        context::with(|ctx| Ok(ctx.driver().buffer_storage(handle, bytes, immutable)?))?;
        self.capacity = bytes;
        self.previous_content.clear();
        Ok(())
    }

    /// Uploads `data` to the start of the buffer.
    pub fn send<T: Pod>(&mut self, data: &[T]) -> Result<()> {
        self.send_at(0, data)
    }

    /// Uploads `data` starting `offset` bytes into the buffer. Fails if the
    /// upload would run past the current capacity.
    pub fn send_at<T: Pod>(&mut self, offset: usize, data: &[T]) -> Result<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let end = offset.checked_add(bytes.len()).unwrap_or(usize::MAX);
        if end > self.capacity {
            log::error!(
                "Upload of {} bytes at offset {} exceeds the {} byte capacity of {} buffer {}",
                bytes.len(),
                offset,
                self.capacity,
                K::TYPE,
                self.handle
            );
            return Err(Error::CapacityExceeded {
                requested: end,
                capacity: self.capacity,
            });
        }
        if bytes.is_empty() {
            return Ok(());
        }

        let handle = self.handle;
        context::with(|ctx| Ok(ctx.driver().buffer_sub_data(handle, offset, bytes)?))?;
        self.previous_content.clear();
        Ok(())
    }

    /// Maps the buffer as a typed view of `capacity / size_of::<T>()`
    /// elements. Writes reach the buffer when the view is dropped.
    ///
    /// The view borrows the buffer mutably, so a second mapping cannot be
    /// taken while one is open:
    ///
    /// ```compile_fail
    /// # fn demo(buffer: &mut topaz::gfx::VertexBuffer) -> topaz::gfx::Result<()> {
    /// let first = buffer.map::<f32>()?;
    /// let second = buffer.map::<f32>()?;
    /// drop(first);
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Panics
    /// If `T` is zero-sized.
    pub fn map<T: Pod>(&mut self) -> Result<MappedView<'_, T>> {
        if self.capacity == 0 {
            log::error!("{} buffer {} has no storage to map", K::TYPE, self.handle);
            return Err(Error::EmptyMapping);
        }
        self.previous_content.clear();
        MappedView::new(self.handle)
    }

    /// Binds the buffer to its kind's target.
    pub fn bind(&self) -> Result<()> {
        let handle = self.handle;
        context::with(|ctx| ctx.bind_buffer(K::TYPE, handle))
    }

    pub fn is_bound(&self) -> bool {
        bound::buffer(K::TYPE) == self.handle
    }
}

impl Buffer<kind::Uniform> {
    /// Binds the buffer to uniform block binding point `binding`.
    pub fn bind_base(&self, binding: u32) -> Result<()> {
        let handle = self.handle;
        context::with(|ctx| ctx.bind_buffer_base(handle, binding))
    }

    /// Uploads `content` unless it equals what was last uploaded through
    /// this method. Grows the buffer if it is too small. Returns whether an
    /// upload happened.
    pub fn update_content<T: Pod>(&mut self, content: &T) -> Result<bool> {
        let bytes = bytemuck::bytes_of(content);
        if self.previous_content == bytes {
            return Ok(false);
        }
        self.force_update_content(content)?;
        Ok(true)
    }

    /// Uploads `content` unconditionally.
    pub fn force_update_content<T: Pod>(&mut self, content: &T) -> Result<()> {
        let bytes = bytemuck::bytes_of(content);
        if self.capacity < bytes.len() {
            self.resize(bytes.len())?;
        }
        self.send(bytes)?;
        self.previous_content = bytes.to_vec();
        Ok(())
    }
}

impl<K: BufferKind> Drop for Buffer<K> {
    fn drop(&mut self) {
        let handle = self.handle.take();
        if handle.is_none() {
            return;
        }
        context::release("Buffer", |ctx| ctx.release_buffer(handle));
        log::debug!("Released {} buffer {}", K::TYPE, handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::test_support::headless;
    use rand::Rng;

    #[test]
    fn test_resize_then_send_of_same_size() {
        let (_gfx, _) = headless();
        let mut buffer = VertexBuffer::new().unwrap();
        let data = [1.0f32, 2.0, 3.0, 4.0];
        buffer.resize(std::mem::size_of_val(&data)).unwrap();
        buffer.send(&data).unwrap();
        assert_eq!(buffer.element_count::<f32>(), 4);
    }

    #[test]
    fn test_oversized_send_fails() {
        let (_gfx, _) = headless();
        let mut buffer = VertexBuffer::new().unwrap();
        buffer.resize(8).unwrap();
        let result = buffer.send(&[0u32; 3]);
        assert!(matches!(
            result,
            Err(Error::CapacityExceeded {
                requested: 12,
                capacity: 8
            })
        ));
        assert!(buffer.send_at(4, &[7u32]).is_ok());
        assert!(buffer.send_at(6, &[7u32]).is_err());
    }

    #[test]
    fn test_send_at_huge_offset_is_a_capacity_error() {
        let (_gfx, _) = headless();
        let mut buffer = VertexBuffer::new().unwrap();
        buffer.resize(8).unwrap();
        assert!(matches!(
            buffer.send_at(usize::MAX - 1, &[7u32]),
            Err(Error::CapacityExceeded { capacity: 8, .. })
        ));
    }

    #[test]
    fn test_zero_resize_then_send_reports_failure() {
        let (_gfx, _) = headless();
        let mut buffer = VertexBuffer::new().unwrap();
        assert!(matches!(
            buffer.resize(0),
            Err(Error::ZeroSizedGeometry(BufferType::Vertex))
        ));
        assert_eq!(buffer.capacity(), 0);
        assert!(buffer.send(&[1.0f32, 2.0, 3.0]).is_err());
    }

    #[test]
    fn test_zero_sized_uniform_buffer_is_allowed() {
        let (_gfx, _) = headless();
        let mut buffer = UniformBuffer::new().unwrap();
        assert!(buffer.resize(0).is_ok());
    }

    #[test]
    #[should_panic(expected = "cannot be resized")]
    fn test_terminal_resize_twice_panics() {
        let (_gfx, _) = headless();
        let mut buffer = IndexBuffer::new().unwrap();
        buffer.terminal_resize(12).unwrap();
        assert!(buffer.is_terminal());
        let _ = buffer.terminal_resize(24);
    }

    #[test]
    #[should_panic(expected = "cannot be resized")]
    fn test_resize_after_terminal_panics() {
        let (_gfx, _) = headless();
        let mut buffer = VertexBuffer::new().unwrap();
        buffer.terminal_resize(12).unwrap();
        let _ = buffer.resize(12);
    }

    #[test]
    fn test_update_content_skips_unchanged() {
        let (_gfx, _) = headless();
        let mut buffer = UniformBuffer::new().unwrap();
        let content = [1.0f32, 0.5, 0.25, 0.0];
        assert!(buffer.update_content(&content).unwrap());
        assert_eq!(buffer.capacity(), 16);
        assert!(!buffer.update_content(&content).unwrap());
        assert!(buffer.update_content(&[0.0f32; 4]).unwrap());
        buffer.bind_base(0).unwrap();
        assert!(buffer.is_bound());
    }

    #[test]
    fn test_random_uploads_read_back_through_map() {
        let (_gfx, _) = headless();
        let mut rng = rand::rng();
        for _ in 0..16 {
            let count = rng.random_range(1..64usize);
            let data: Vec<u32> = (0..count).map(|_| rng.random()).collect();

            let mut buffer = VertexBuffer::new().unwrap();
            buffer.resize(count * 4).unwrap();
            buffer.send(&data).unwrap();

            let view = buffer.map::<u32>().unwrap();
            assert_eq!(view.capacity(), count);
            assert_eq!(view.as_slice(), &data[..]);
        }
    }

    #[test]
    fn test_drop_without_context_is_safe() {
        let buffer = {
            let (_gfx, _) = headless();
            VertexBuffer::new().unwrap()
        };
        drop(buffer);
    }
}
