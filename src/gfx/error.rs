//! Error types for the resource layer
//!
//! Variants follow four families: configuration mistakes (caller misuse that
//! is detected up front), resource-creation failures (left in a not-ready
//! state), lookup misses (warned and skipped by most callers) and driver
//! errors. Lifetime misuse such as resizing a terminal buffer is not an
//! error value at all; it panics.

use std::path::PathBuf;

use thiserror::Error;

use super::driver::{BufferType, DriverError};

#[derive(Error, Debug)]
pub enum Error {
    #[error("no graphics context is active on this thread")]
    NoContext,
    #[error("a graphics context is already active on this thread")]
    ContextAlreadyActive,

    #[error("object has no buffer in slot {0}")]
    NoSuchSlot(usize),
    #[error("slot {slot} holds a {actual} buffer, not a {expected} buffer")]
    KindMismatch {
        slot: usize,
        expected: BufferType,
        actual: BufferType,
    },
    #[error("formats can only be attached to vertex buffers (slot {slot} holds a {actual} buffer)")]
    NotAVertexBuffer { slot: usize, actual: BufferType },
    #[error("vertex attribute {index} is already formatted by slot {slot}")]
    AttributeCollision { index: u32, slot: usize },
    #[error("vertex format stride of {stride} bytes exceeds the {capacity} byte buffer in slot {slot}")]
    FormatExceedsBuffer {
        slot: usize,
        stride: usize,
        capacity: usize,
    },
    #[error("invalid vertex format: {0}")]
    InvalidFormat(String),

    #[error("uniform table is full ({capacity} entries)")]
    UniformTableFull { capacity: usize },
    #[error("uniform '{name}' holds a {actual}, not a {expected}")]
    UniformTypeMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("cannot allocate a zero-sized {0} buffer")]
    ZeroSizedGeometry(BufferType),
    #[error("upload of {requested} bytes exceeds buffer capacity of {capacity} bytes")]
    CapacityExceeded { requested: usize, capacity: usize },
    #[error("cannot map a buffer with no storage")]
    EmptyMapping,
    #[error("index {index} is out of bounds for a view of {capacity} elements")]
    OutOfBounds { index: usize, capacity: usize },

    #[error("texture unit {unit} is outside the supported range 0..{count}")]
    TextureUnitOutOfRange { unit: u32, count: u32 },
    #[error("{pixels} pixels cannot fill a {width}x{height} image")]
    ImageSizeMismatch {
        width: u32,
        height: u32,
        pixels: usize,
    },
    #[error("failed to decode image '{}'", path.display())]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to load font: {0}")]
    FontLoad(String),
    #[error("failed to read shader source '{}'", path.display())]
    ShaderSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type used throughout the resource layer.
pub type Result<T> = std::result::Result<T, Error>;
