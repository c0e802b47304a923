//! Typed uniform values
//!
//! The set of types a uniform can hold is closed: [`UniformValue`] has one
//! variant per supported GLSL type, and [`UniformType`] is sealed so only
//! those Rust types can parameterise [`Uniform`] or the typed program
//! accessors. Anything else fails to compile.

use cgmath::{Matrix2, Matrix3, Matrix4, Vector2, Vector3, Vector4};

use crate::gfx::context::{self, Context};
use crate::gfx::error::Result;
use crate::gfx::handle::ProgramHandle;

/// A uniform value of one of the supported GLSL types.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Bool(bool),
    Int(i32),
    UInt(u32),
    Float(f32),
    Double(f64),
    Vec2(Vector2<f32>),
    Vec3(Vector3<f32>),
    Vec4(Vector4<f32>),
    Mat2(Matrix2<f32>),
    Mat3(Matrix3<f32>),
    Mat4(Matrix4<f32>),
}

impl UniformValue {
    /// GLSL type name of the value.
    pub fn glsl_type(&self) -> &'static str {
        match self {
            UniformValue::Bool(_) => bool::GLSL_TYPE,
            UniformValue::Int(_) => i32::GLSL_TYPE,
            UniformValue::UInt(_) => u32::GLSL_TYPE,
            UniformValue::Float(_) => f32::GLSL_TYPE,
            UniformValue::Double(_) => f64::GLSL_TYPE,
            UniformValue::Vec2(_) => Vector2::<f32>::GLSL_TYPE,
            UniformValue::Vec3(_) => Vector3::<f32>::GLSL_TYPE,
            UniformValue::Vec4(_) => Vector4::<f32>::GLSL_TYPE,
            UniformValue::Mat2(_) => Matrix2::<f32>::GLSL_TYPE,
            UniformValue::Mat3(_) => Matrix3::<f32>::GLSL_TYPE,
            UniformValue::Mat4(_) => Matrix4::<f32>::GLSL_TYPE,
        }
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Rust types that can be stored in a uniform.
pub trait UniformType: sealed::Sealed + Copy + PartialEq + 'static {
    const GLSL_TYPE: &'static str;

    fn into_value(self) -> UniformValue;

    /// Returns `None` if `value` holds a different type.
    fn from_value(value: &UniformValue) -> Option<Self>;
}

macro_rules! uniform_type {
    ($ty:ty, $variant:ident, $glsl:literal) => {
        impl sealed::Sealed for $ty {}

        impl UniformType for $ty {
            const GLSL_TYPE: &'static str = $glsl;

            fn into_value(self) -> UniformValue {
                UniformValue::$variant(self)
            }

            fn from_value(value: &UniformValue) -> Option<Self> {
                match value {
                    UniformValue::$variant(inner) => Some(*inner),
                    _ => None,
                }
            }
        }

        impl From<$ty> for UniformValue {
            fn from(value: $ty) -> Self {
                UniformValue::$variant(value)
            }
        }
    };
}

uniform_type!(bool, Bool, "bool");
uniform_type!(i32, Int, "int");
uniform_type!(u32, UInt, "uint");
uniform_type!(f32, Float, "float");
uniform_type!(f64, Double, "double");
uniform_type!(Vector2<f32>, Vec2, "vec2");
uniform_type!(Vector3<f32>, Vec3, "vec3");
uniform_type!(Vector4<f32>, Vec4, "vec4");
uniform_type!(Matrix2<f32>, Mat2, "mat2");
uniform_type!(Matrix3<f32>, Mat3, "mat3");
uniform_type!(Matrix4<f32>, Mat4, "mat4");

/// A named, typed uniform of one program, holding the last value set.
#[derive(Debug, Clone, PartialEq)]
pub struct Uniform<T: UniformType> {
    shader_handle: ProgramHandle,
    name: String,
    value: T,
}

impl<T: UniformType> Uniform<T> {
    pub fn new(shader_handle: ProgramHandle, name: impl Into<String>, value: T) -> Self {
        Self {
            shader_handle,
            name: name.into(),
            value,
        }
    }

    pub fn shader_handle(&self) -> ProgramHandle {
        self.shader_handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> T {
        self.value
    }

    pub fn set(&mut self, value: T) {
        self.value = value;
    }

    /// Pushes the stored value to the program.
    ///
    /// Returns `Ok(false)` if the name has no location in the program; that
    /// is a warning, not an error.
    pub fn push(&self) -> Result<bool> {
        context::with(|ctx| {
            push_value(ctx, self.shader_handle, &self.name, &self.value.into_value())
        })
    }
}

/// Untyped entry of a program's uniform table.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct UniformSlot {
    pub name: String,
    pub value: UniformValue,
}

impl<T: UniformType> From<Uniform<T>> for UniformSlot {
    fn from(uniform: Uniform<T>) -> Self {
        Self {
            name: uniform.name,
            value: uniform.value.into_value(),
        }
    }
}

pub(crate) fn push_value(
    ctx: &mut Context,
    program: ProgramHandle,
    name: &str,
    value: &UniformValue,
) -> Result<bool> {
    match ctx.driver().uniform_location(program, name) {
        Some(location) => {
            ctx.driver().push_uniform(program, location, value)?;
            Ok(true)
        }
        None => {
            log::warn!(
                "Uniform '{}' has no location in program {}; push skipped",
                name,
                program
            );
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::config::ContextConfig;
    use crate::gfx::context::initialise;
    use crate::gfx::driver::HeadlessDriver;
    use cgmath::{SquareMatrix, Vector3};

    #[test]
    fn test_value_round_trip_by_type() {
        let value = Vector3::new(1.0f32, 2.0, 3.0).into_value();
        assert_eq!(value.glsl_type(), "vec3");
        assert_eq!(Vector3::<f32>::from_value(&value), Some(Vector3::new(1.0, 2.0, 3.0)));
        assert_eq!(f32::from_value(&value), None);
        assert_eq!(UniformValue::from(Matrix4::<f32>::identity()).glsl_type(), "mat4");
    }

    #[test]
    fn test_push_without_location_is_skipped() {
        let _gfx = initialise(HeadlessDriver::new(), ContextConfig::default()).unwrap();
        let uniform = Uniform::new(ProgramHandle::from_raw(99), "missing", 1.0f32);
        assert!(!uniform.push().unwrap());
    }
}
