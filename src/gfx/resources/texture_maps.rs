//! Surface detail maps
//!
//! Normal, parallax and displacement maps are plain textures whose `bind`
//! also tells the shader the effect is present, through the companion
//! uniforms `has_normal_map`, `has_parallax_map` / `parallax_multiplier` /
//! `parallax_bias` and `has_displacement_map` / `displacement_factor`.
//!
//! Each map has a neutral 1x1 default that leaves shading unchanged.

use std::ops::Deref;
use std::path::Path;

use super::image::{Image, PixelRGBA8};
use super::texture_resource::Texture;
use crate::gfx::error::Result;
use crate::gfx::shader::ShaderProgram;

/// Flat tangent-space normal (0, 0, 1).
pub const DEFAULT_NORMAL_MAP_PIXEL: PixelRGBA8 = PixelRGBA8::new(128, 128, 255, 255);
pub const DEFAULT_PARALLAX_MAP_PIXEL: PixelRGBA8 = PixelRGBA8::new(0, 0, 0, 255);
pub const DEFAULT_DISPLACEMENT_MAP_PIXEL: PixelRGBA8 = PixelRGBA8::new(0, 0, 0, 255);

pub const DEFAULT_PARALLAX_MULTIPLIER: f32 = 0.04;
pub const DEFAULT_PARALLAX_OFFSET: f32 = -0.5;
pub const DEFAULT_DISPLACEMENT_FACTOR: f32 = 0.25;

fn neutral(pixel: PixelRGBA8) -> Result<Texture> {
    Texture::from_image(Image::filled(1, 1, pixel), false)
}

/// Sets and pushes a batch of companion uniforms.
fn push_flags(program: &mut ShaderProgram, flag: &str, floats: &[(&str, f32)]) -> Result<()> {
    program.set_uniform(flag, true)?;
    program.push_uniform(flag)?;
    for (name, value) in floats {
        program.set_uniform(name, *value)?;
        program.push_uniform(name)?;
    }
    Ok(())
}

#[derive(Debug, PartialEq)]
pub struct NormalMap {
    texture: Texture,
}

impl NormalMap {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            texture: Texture::from_file(path, false, false, false)?,
        })
    }

    pub fn from_texture(texture: Texture) -> Self {
        Self { texture }
    }

    /// 1x1 map pointing every normal straight out of the surface.
    pub fn neutral() -> Result<Self> {
        Ok(Self {
            texture: neutral(DEFAULT_NORMAL_MAP_PIXEL)?,
        })
    }

    /// Binds the map to `sampler` at `unit` and sets `has_normal_map`.
    pub fn bind(&self, program: &mut ShaderProgram, unit: u32, sampler: &str) -> Result<()> {
        self.texture.bind(program, unit, sampler)?;
        push_flags(program, "has_normal_map", &[])
    }

    pub fn into_texture(self) -> Texture {
        self.texture
    }
}

impl Deref for NormalMap {
    type Target = Texture;

    fn deref(&self) -> &Texture {
        &self.texture
    }
}

/// Height map for parallax occlusion.
///
/// The bias is derived once at construction as `multiplier / 2 * offset`.
#[derive(Debug, PartialEq)]
pub struct ParallaxMap {
    texture: Texture,
    multiplier: f32,
    bias: f32,
}

impl ParallaxMap {
    /// Loads a height map.
    ///
    /// # Arguments
    /// * `path` - Image file
    /// * `multiplier` - Depth scale of the effect
    /// * `offset` - Shifts the sampled height; -0.5 centres it on the surface
    pub fn from_file(path: impl AsRef<Path>, multiplier: f32, offset: f32) -> Result<Self> {
        Ok(Self::from_texture(
            Texture::from_file(path, false, false, false)?,
            multiplier,
            offset,
        ))
    }

    pub fn from_texture(texture: Texture, multiplier: f32, offset: f32) -> Self {
        Self {
            texture,
            multiplier,
            bias: multiplier / 2.0 * offset,
        }
    }

    pub fn neutral() -> Result<Self> {
        Ok(Self::from_texture(
            neutral(DEFAULT_PARALLAX_MAP_PIXEL)?,
            DEFAULT_PARALLAX_MULTIPLIER,
            DEFAULT_PARALLAX_OFFSET,
        ))
    }

    pub fn multiplier(&self) -> f32 {
        self.multiplier
    }

    pub fn bias(&self) -> f32 {
        self.bias
    }

    /// Binds the map to `sampler` at `unit` and sets `has_parallax_map`,
    /// `parallax_multiplier` and `parallax_bias`.
    pub fn bind(&self, program: &mut ShaderProgram, unit: u32, sampler: &str) -> Result<()> {
        self.texture.bind(program, unit, sampler)?;
        push_flags(
            program,
            "has_parallax_map",
            &[
                ("parallax_multiplier", self.multiplier),
                ("parallax_bias", self.bias),
            ],
        )
    }

    pub fn into_texture(self) -> Texture {
        self.texture
    }
}

impl Deref for ParallaxMap {
    type Target = Texture;

    fn deref(&self) -> &Texture {
        &self.texture
    }
}

#[derive(Debug, PartialEq)]
pub struct DisplacementMap {
    texture: Texture,
    factor: f32,
}

impl DisplacementMap {
    pub fn from_file(path: impl AsRef<Path>, factor: f32) -> Result<Self> {
        Ok(Self::from_texture(
            Texture::from_file(path, false, false, false)?,
            factor,
        ))
    }

    pub fn from_texture(texture: Texture, factor: f32) -> Self {
        Self { texture, factor }
    }

    pub fn neutral() -> Result<Self> {
        Ok(Self::from_texture(
            neutral(DEFAULT_DISPLACEMENT_MAP_PIXEL)?,
            DEFAULT_DISPLACEMENT_FACTOR,
        ))
    }

    pub fn factor(&self) -> f32 {
        self.factor
    }

    /// Binds the map to `sampler` at `unit` and sets `has_displacement_map`
    /// and `displacement_factor`.
    pub fn bind(&self, program: &mut ShaderProgram, unit: u32, sampler: &str) -> Result<()> {
        self.texture.bind(program, unit, sampler)?;
        push_flags(
            program,
            "has_displacement_map",
            &[("displacement_factor", self.factor)],
        )
    }

    pub fn into_texture(self) -> Texture {
        self.texture
    }
}

impl Deref for DisplacementMap {
    type Target = Texture;

    fn deref(&self) -> &Texture {
        &self.texture
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::shader::UniformValue;
    use crate::gfx::test_support::{headless, FRAGMENT, VERTEX};

    #[test]
    fn test_normal_map_sets_presence_flag() {
        let (_gfx, recorder) = headless();
        let mut program = ShaderProgram::from_sources(VERTEX, FRAGMENT).unwrap();
        let map = NormalMap::neutral().unwrap();

        map.bind(&mut program, 1, "normal_map").unwrap();
        assert_eq!(program.uniform_value::<i32>("normal_map"), Some(1));
        assert_eq!(program.uniform_value::<bool>("has_normal_map"), Some(true));
        assert_eq!(
            recorder.last_uniform(program.handle(), "has_normal_map"),
            Some(UniformValue::Bool(true))
        );
        assert_eq!(
            map.read_pixels().unwrap(),
            bytemuck::bytes_of(&DEFAULT_NORMAL_MAP_PIXEL)
        );
    }

    #[test]
    fn test_parallax_bias_is_derived_from_offset() {
        let (_gfx, _) = headless();
        let map = ParallaxMap::neutral().unwrap();
        assert_eq!(map.multiplier(), 0.04);
        assert!((map.bias() - -0.01).abs() < 1e-6);

        let mut program = ShaderProgram::from_sources(VERTEX, FRAGMENT).unwrap();
        map.bind(&mut program, 2, "parallax_map").unwrap();
        assert_eq!(program.uniform_value::<bool>("has_parallax_map"), Some(true));
        assert_eq!(program.uniform_value::<f32>("parallax_multiplier"), Some(0.04));
        assert_eq!(program.uniform_value::<f32>("parallax_bias"), Some(map.bias()));
    }

    #[test]
    fn test_displacement_map_factor() {
        let (_gfx, _) = headless();
        let mut program = ShaderProgram::from_sources(VERTEX, FRAGMENT).unwrap();
        let map = DisplacementMap::neutral().unwrap();
        map.bind(&mut program, 3, "displacement_map").unwrap();
        assert_eq!(program.uniform_value::<f32>("displacement_factor"), Some(0.25));
        assert_eq!(
            program.uniform_value::<bool>("has_displacement_map"),
            Some(true)
        );
    }

    #[test]
    fn test_rejected_unit_sets_no_flags() {
        let (_gfx, _) = headless();
        let mut program = ShaderProgram::from_sources(VERTEX, FRAGMENT).unwrap();
        let map = NormalMap::neutral().unwrap();
        assert!(map.bind(&mut program, 40, "normal_map").is_err());
        assert!(!program.has_uniform("has_normal_map"));
    }
}
