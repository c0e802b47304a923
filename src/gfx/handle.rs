//! Opaque driver handles
//!
//! A handle identifies one driver-side resource. It never owns memory; the
//! owning wrapper (buffer, object, program, texture) is responsible for
//! releasing it. Zero is reserved as "no resource" and is never handed out
//! by a driver.
//!
//! Handles are tagged with the kind of resource they name, so a buffer
//! handle can never be compared against (or passed where the driver expects)
//! a texture handle.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Resource kind tags used to parameterise [`Handle`].
pub mod kind {
    /// GPU buffer allocation.
    #[derive(Debug)]
    pub enum Buffer {}
    /// Vertex array (the driver-side half of an `Object`).
    #[derive(Debug)]
    pub enum VertexArray {}
    /// A single compiled shader stage.
    #[derive(Debug)]
    pub enum Shader {}
    /// A linked shader program.
    #[derive(Debug)]
    pub enum Program {}
    /// Texture allocation (2D or cube map).
    #[derive(Debug)]
    pub enum Texture {}
    /// Framebuffer / render target.
    #[derive(Debug)]
    pub enum Framebuffer {}
}

/// Typed opaque integer identifying a driver-side resource.
pub struct Handle<K> {
    id: u32,
    _kind: PhantomData<fn() -> K>,
}

pub type BufferHandle = Handle<kind::Buffer>;
pub type VertexArrayHandle = Handle<kind::VertexArray>;
pub type ShaderHandle = Handle<kind::Shader>;
pub type ProgramHandle = Handle<kind::Program>;
pub type TextureHandle = Handle<kind::Texture>;
pub type FramebufferHandle = Handle<kind::Framebuffer>;

impl<K> Handle<K> {
    /// The "no resource" sentinel.
    pub const NONE: Self = Self {
        id: 0,
        _kind: PhantomData,
    };

    /// Wraps a raw driver id. Only drivers should need this.
    pub const fn from_raw(id: u32) -> Self {
        Self {
            id,
            _kind: PhantomData,
        }
    }

    pub const fn id(self) -> u32 {
        self.id
    }

    pub const fn is_none(self) -> bool {
        self.id == 0
    }

    pub const fn is_some(self) -> bool {
        self.id != 0
    }

    /// Replaces `self` with the sentinel and returns the previous value.
    ///
    /// Destructors use this so a handle can only ever be released once.
    pub fn take(&mut self) -> Self {
        std::mem::replace(self, Self::NONE)
    }
}

impl<K> Clone for Handle<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for Handle<K> {}

impl<K> PartialEq for Handle<K> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<K> Eq for Handle<K> {}

impl<K> Hash for Handle<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<K> Default for Handle<K> {
    fn default() -> Self {
        Self::NONE
    }
}

impl<K> fmt::Debug for Handle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = std::any::type_name::<K>();
        let kind = kind.rsplit("::").next().unwrap_or(kind);
        write!(f, "{}#{}", kind, self.id)
    }
}

impl<K> fmt::Display for Handle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}
