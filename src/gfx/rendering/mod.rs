// src/gfx/rendering/mod.rs
//! Core rendering functionality
//!
//! Render targets and the device that issues draws into them.

pub mod device;
pub mod frame;

// Re-export main types
pub use device::Device;
pub use frame::{Frame, FrameBuffer, WindowFrame};
