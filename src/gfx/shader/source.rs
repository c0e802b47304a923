//! Shader sources on disk and built-in programs

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::ShaderProgram;
use crate::gfx::driver::ShaderType;
use crate::gfx::error::{Error, Result};

/// Path of the `ty` stage for programs stored at `base`, e.g.
/// `shaders/sky` becomes `shaders/sky.vertex.glsl`.
pub fn stage_path(base: &Path, ty: ShaderType) -> PathBuf {
    let mut path = base.as_os_str().to_owned();
    path.push(ty.file_suffix());
    PathBuf::from(path)
}

/// Reads the source of one stage. A missing file is an absent stage and
/// yields an empty string.
pub(crate) fn read_stage(base: &Path, ty: ShaderType) -> Result<String> {
    let path = stage_path(base, ty);
    match std::fs::read_to_string(&path) {
        Ok(source) => Ok(source),
        Err(error) if error.kind() == ErrorKind::NotFound => {
            log::debug!("No {} shader at {}", ty, path.display());
            Ok(String::new())
        }
        Err(source) => {
            log::error!("Failed to read {}: {}", path.display(), source);
            Err(Error::ShaderSource { path, source })
        }
    }
}

fn pass_through_vertex(position: &str, texcoord: &str) -> String {
    format!(
        "#version 330 core
in vec3 {position};
in vec2 {texcoord};
out vec2 pass_texcoord;

void main() {{
    pass_texcoord = {texcoord};
    gl_Position = vec4({position}, 1.0);
}}
"
    )
}

fn pass_through_fragment(sampler: &str) -> String {
    format!(
        "#version 330 core
in vec2 pass_texcoord;
out vec4 colour;
uniform sampler2D {sampler};

void main() {{
    colour = texture({sampler}, pass_texcoord);
}}
"
    )
}

/// Builds the minimal textured pass-through program: positions go straight
/// to clip space and fragments sample `sampler`.
///
/// # Arguments
/// * `position` - Name of the 3 component position attribute (location 0)
/// * `texcoord` - Name of the 2 component texture coordinate attribute (location 1)
/// * `sampler` - Name of the 2D sampler uniform
pub fn pass_through(position: &str, texcoord: &str, sampler: &str) -> Result<ShaderProgram> {
    let mut program = ShaderProgram::new()?;
    program.register_attribute(position, 0);
    program.register_attribute(texcoord, 1);
    program
        .emplace(ShaderType::Vertex)
        .upload_source(pass_through_vertex(position, texcoord));
    program
        .emplace(ShaderType::Fragment)
        .upload_source(pass_through_fragment(sampler));
    program.build()?;
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_path_appends_suffix() {
        let path = stage_path(Path::new("shaders/sky"), ShaderType::TessellationControl);
        assert_eq!(path, PathBuf::from("shaders/sky.tessellation_control.glsl"));
    }

    #[test]
    fn test_missing_stage_is_empty() {
        let base = std::env::temp_dir().join("topaz-no-such-shader");
        assert_eq!(read_stage(&base, ShaderType::Geometry).unwrap(), "");
    }
}
