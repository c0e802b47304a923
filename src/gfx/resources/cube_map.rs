//! Cube maps built from six face images

use std::path::{Path, PathBuf};

use super::image::{Image, PixelRGBA8};
use super::texture_resource::bind_sampler;
use crate::gfx::context;
use crate::gfx::driver::{CubeFace, TextureFormat, TextureParameters, TextureTarget};
use crate::gfx::error::Result;
use crate::gfx::handle::TextureHandle;
use crate::gfx::shader::ShaderProgram;

/// Sampler uniform every cube map binds to.
pub const CUBE_MAP_SAMPLER: &str = "cube_map_sampler";

impl CubeFace {
    /// File name suffix of the face in a skybox directory.
    pub fn suffix(self) -> &'static str {
        match self {
            CubeFace::Right => "_rt",
            CubeFace::Left => "_lf",
            CubeFace::Top => "_up",
            CubeFace::Bottom => "_dn",
            CubeFace::Back => "_bk",
            CubeFace::Front => "_ft",
        }
    }
}

/// A cube-mapped texture.
///
/// Faces are loaded independently: a face that fails to decode or upload
/// is logged, listed in [`CubeMap::missing_faces`] and left unallocated
/// while the others still load.
#[derive(Debug)]
pub struct CubeMap {
    handle: TextureHandle,
    faces: [Option<(u32, u32)>; 6],
}

impl CubeMap {
    /// Loads the six faces in the order right, left, top, bottom, back, front.
    pub fn from_faces<P: AsRef<Path>>(paths: [P; 6]) -> Result<Self> {
        let handle =
            context::with(|ctx| Ok(ctx.driver().create_texture(TextureTarget::CubeMap)?))?;
        log::debug!("Created cube map {}", handle);
        let mut cube_map = Self {
            handle,
            faces: [None; 6],
        };

        for (face, path) in CubeFace::ALL.into_iter().zip(paths.iter()) {
            let path: &Path = path.as_ref();
            match image::open(path) {
                Ok(decoded) => {
                    let rgba = decoded.to_rgba8();
                    let (width, height) = rgba.dimensions();
                    if let Err(error) = cube_map.upload(face, width, height, rgba.as_raw()) {
                        log::error!(
                            "Failed to upload {:?} face of cube map {} from {}: {}",
                            face,
                            handle,
                            path.display(),
                            error
                        );
                    }
                }
                Err(error) => {
                    log::error!(
                        "Failed to load {:?} face of cube map {} from {}: {}",
                        face,
                        handle,
                        path.display(),
                        error
                    );
                }
            }
        }

        context::with(|ctx| {
            Ok(ctx
                .driver()
                .texture_parameters(handle, &TextureParameters::clamped())?)
        })?;
        Ok(cube_map)
    }

    /// Loads `<dir>/<name>_rt<extension>`, `_lf`, `_up`, `_dn`, `_bk` and
    /// `_ft`. `extension` includes the dot, e.g. ".png".
    pub fn from_directory(dir: impl AsRef<Path>, name: &str, extension: &str) -> Result<Self> {
        Self::from_faces(face_paths(dir.as_ref(), name, extension))
    }

    /// Builds a cube map from decoded images, e.g. solid-colour test skies.
    pub fn from_images(images: [&Image<PixelRGBA8>; 6]) -> Result<Self> {
        let handle =
            context::with(|ctx| Ok(ctx.driver().create_texture(TextureTarget::CubeMap)?))?;
        let mut cube_map = Self {
            handle,
            faces: [None; 6],
        };
        for (face, image) in CubeFace::ALL.into_iter().zip(images) {
            cube_map.upload(face, image.width(), image.height(), image.as_bytes())?;
        }
        context::with(|ctx| {
            Ok(ctx
                .driver()
                .texture_parameters(handle, &TextureParameters::clamped())?)
        })?;
        Ok(cube_map)
    }

    fn upload(&mut self, face: CubeFace, width: u32, height: u32, data: &[u8]) -> Result<()> {
        let handle = self.handle;
        context::with(|ctx| {
            Ok(ctx.driver().texture_image(
                handle,
                Some(face),
                TextureFormat::Rgba8,
                width,
                height,
                Some(data),
            )?)
        })?;
        self.faces[face.index()] = Some((width, height));
        Ok(())
    }

    pub fn handle(&self) -> TextureHandle {
        self.handle
    }

    /// Dimensions of a loaded face.
    pub fn face_dimensions(&self, face: CubeFace) -> Option<(u32, u32)> {
        self.faces[face.index()]
    }

    pub fn missing_faces(&self) -> Vec<CubeFace> {
        CubeFace::ALL
            .into_iter()
            .filter(|face| self.faces[face.index()].is_none())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.faces.iter().all(Option::is_some)
    }

    pub fn read_face(&self, face: CubeFace) -> Result<Vec<u8>> {
        let handle = self.handle;
        context::with(|ctx| Ok(ctx.driver().read_texture(handle, Some(face))?))
    }

    /// Binds the cube map at `unit` and sets `cube_map_sampler` to it.
    pub fn bind(&self, program: &mut ShaderProgram, unit: u32) -> Result<()> {
        bind_sampler(
            program,
            unit,
            CUBE_MAP_SAMPLER,
            TextureTarget::CubeMap,
            self.handle,
        )
    }
}

impl Drop for CubeMap {
    fn drop(&mut self) {
        let handle = self.handle.take();
        if handle.is_none() {
            return;
        }
        context::release("CubeMap", |ctx| ctx.release_texture(handle));
        log::debug!("Released cube map {}", handle);
    }
}

fn face_paths(dir: &Path, name: &str, extension: &str) -> [PathBuf; 6] {
    CubeFace::ALL.map(|face| dir.join(format!("{}{}{}", name, face.suffix(), extension)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::config::{ContextConfig, Limits};
    use crate::gfx::context::{bound, initialise};
    use crate::gfx::driver::HeadlessDriver;
    use crate::gfx::test_support::{headless, FRAGMENT, VERTEX};

    #[test]
    fn test_face_paths_use_skybox_suffixes() {
        let paths = face_paths(Path::new("sky"), "day", ".png");
        assert_eq!(paths[0], Path::new("sky/day_rt.png"));
        assert_eq!(paths[3], Path::new("sky/day_dn.png"));
        assert_eq!(paths[5], Path::new("sky/day_ft.png"));
    }

    #[test]
    fn test_missing_face_does_not_abort_loading() {
        let (_gfx, _) = headless();
        let dir = std::env::temp_dir().join(format!("topaz-cube-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        for face in CubeFace::ALL {
            if face == CubeFace::Top {
                continue;
            }
            let path = dir.join(format!("sky{}.png", face.suffix()));
            image::RgbaImage::from_pixel(2, 2, image::Rgba([10, 20, 30, 255]))
                .save(&path)
                .unwrap();
        }

        let cube_map = CubeMap::from_directory(&dir, "sky", ".png").unwrap();
        assert_eq!(cube_map.missing_faces(), vec![CubeFace::Top]);
        assert!(!cube_map.is_complete());
        assert_eq!(cube_map.face_dimensions(CubeFace::Front), Some((2, 2)));
        assert_eq!(&cube_map.read_face(CubeFace::Left).unwrap()[..4], &[10, 20, 30, 255]);
        assert!(cube_map.read_face(CubeFace::Top).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_rejected_upload_does_not_abort_loading() {
        let driver = HeadlessDriver::with_limits(Limits::default().with_max_texture_size(2));
        let _gfx = initialise(driver, ContextConfig::default()).unwrap();
        let dir = std::env::temp_dir().join(format!("topaz-cube-big-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        for face in CubeFace::ALL {
            let side = if face == CubeFace::Left { 4 } else { 2 };
            let path = dir.join(format!("sky{}.png", face.suffix()));
            image::RgbaImage::from_pixel(side, side, image::Rgba([1, 2, 3, 255]))
                .save(&path)
                .unwrap();
        }

        let cube_map = CubeMap::from_directory(&dir, "sky", ".png").unwrap();
        assert_eq!(cube_map.missing_faces(), vec![CubeFace::Left]);
        assert_eq!(cube_map.face_dimensions(CubeFace::Front), Some((2, 2)));
        assert_eq!(cube_map.face_dimensions(CubeFace::Back), Some((2, 2)));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_bind_sets_cube_map_sampler() {
        let (_gfx, _) = headless();
        let sky = Image::filled(1, 1, PixelRGBA8::WHITE);
        let cube_map = CubeMap::from_images([&sky; 6]).unwrap();
        assert!(cube_map.is_complete());

        let mut program = ShaderProgram::from_sources(VERTEX, FRAGMENT).unwrap();
        cube_map.bind(&mut program, 5).unwrap();
        assert_eq!(program.uniform_value::<i32>(CUBE_MAP_SAMPLER), Some(5));
        assert_eq!(bound::texture(5, TextureTarget::CubeMap), cube_map.handle());
    }
}
