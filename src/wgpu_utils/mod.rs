// src/wgpu_utils/mod.rs
//! WGPU interop helpers
//!
//! Lowers vertex formats, buffer kinds and texture state to the descriptors
//! a wgpu pipeline is built from.

pub mod binding_types;
pub mod vertex_layout;

// Re-export main types
pub use binding_types::*;
pub use vertex_layout::{buffer_usages, vertex_format, VertexLayout, INDEX_FORMAT};
