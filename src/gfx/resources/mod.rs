// src/gfx/resources/mod.rs
//! GPU resource management
//!
//! Buffers and their mapped views, vertex formats, objects, CPU bitmaps,
//! fonts and textures.

pub mod buffer;
pub mod cube_map;
pub mod font;
pub mod format;
pub mod image;
pub mod mapped_pool;
pub mod object;
pub mod texture_maps;
pub mod texture_resource;

// Re-export main types
pub use buffer::{kind, Buffer, BufferKind, IndexBuffer, UniformBuffer, VertexBuffer};
pub use cube_map::{CubeMap, CUBE_MAP_SAMPLER};
pub use font::Font;
pub use format::{fmt, Attribute, Format};
pub use image::{Image, Pixel, PixelDepth, PixelRGBA8};
pub use mapped_pool::MappedView;
pub use object::{AnyBuffer, Object};
pub use texture_maps::{DisplacementMap, NormalMap, ParallaxMap};
pub use texture_resource::{Texture, TextureKind};
