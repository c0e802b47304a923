//! Minimal GLSL scanning for the headless driver
//!
//! This is not a compiler. It checks the structural properties a real
//! compiler would reject first (missing entry point, unbalanced delimiters)
//! and extracts the default-block `uniform` declarations a linker would
//! assign locations to.

/// One `uniform` declaration found in a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct UniformDecl {
    pub name: String,
    pub glsl_type: String,
    pub array_len: Option<usize>,
}

const PRECISION_QUALIFIERS: [&str; 3] = ["lowp", "mediump", "highp"];

/// Checks `source` for an entry point and balanced delimiters. The error
/// string is formatted like a driver info log.
pub(super) fn check_source(source: &str) -> Result<(), String> {
    let stripped = strip_comments(source);
    let mut stack: Vec<(char, usize)> = Vec::new();

    for (number, line) in stripped.lines().enumerate() {
        let number = number + 1;
        if line.trim_start().starts_with('#') {
            continue;
        }
        for c in line.chars() {
            match c {
                '{' | '(' | '[' => stack.push((c, number)),
                '}' | ')' | ']' => {
                    let expected = match c {
                        '}' => '{',
                        ')' => '(',
                        _ => '[',
                    };
                    match stack.pop() {
                        Some((open, _)) if open == expected => {}
                        Some((open, line)) => {
                            return Err(format!(
                                "0:{}: error: '{}' does not close '{}' opened on line {}",
                                number, c, open, line
                            ))
                        }
                        None => return Err(format!("0:{}: error: unmatched '{}'", number, c)),
                    }
                }
                _ => {}
            }
        }
    }

    if let Some((open, line)) = stack.pop() {
        return Err(format!("0:{}: error: unclosed '{}'", line, open));
    }

    if !has_entry_point(&stripped) {
        return Err("0:1: error: missing entry point 'main'".to_owned());
    }
    Ok(())
}

/// Extracts the default-block uniform declarations of `source`, in order.
/// Uniform blocks are skipped; their members live in buffer storage.
pub(super) fn uniform_declarations(source: &str) -> Vec<UniformDecl> {
    let stripped = strip_comments(source);
    let code: String = stripped
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n");

    let mut declarations = Vec::new();
    for statement in code.split(';') {
        let statement = match statement.rfind(['{', '}']) {
            Some(at) => &statement[at + 1..],
            None => statement,
        };
        let statement = skip_layout(statement.trim());

        let mut words = statement.split_whitespace();
        if words.next() != Some("uniform") {
            continue;
        }
        let mut glsl_type = match words.next() {
            Some(word) => word,
            None => continue,
        };
        if PRECISION_QUALIFIERS.contains(&glsl_type) {
            glsl_type = match words.next() {
                Some(word) => word,
                None => continue,
            };
        }

        let rest: Vec<&str> = words.collect();
        for declarator in rest.join(" ").split(',') {
            let declarator = declarator.split('=').next().unwrap_or("").trim();
            let (name, array_len) = match declarator.find('[') {
                Some(at) => {
                    let len = declarator[at + 1..]
                        .trim_end_matches(']')
                        .trim()
                        .parse::<usize>()
                        .ok();
                    (declarator[..at].trim(), len)
                }
                None => (declarator, None),
            };
            if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                continue;
            }
            declarations.push(UniformDecl {
                name: name.to_owned(),
                glsl_type: glsl_type.to_owned(),
                array_len,
            });
        }
    }
    declarations
}

/// Returns true if a value of GLSL type `pushed` may be stored in a uniform
/// declared as `declared`. Samplers are set through integer pushes.
pub(super) fn accepts(declared: &str, pushed: &str) -> bool {
    if declared == pushed {
        return true;
    }
    match pushed {
        "int" => is_opaque(declared),
        "mat2" => declared == "mat2x2",
        "mat3" => declared == "mat3x3",
        "mat4" => declared == "mat4x4",
        _ => false,
    }
}

fn is_opaque(glsl_type: &str) -> bool {
    let base = glsl_type.trim_start_matches(['i', 'u']);
    base.starts_with("sampler") || base.starts_with("image")
}

fn has_entry_point(code: &str) -> bool {
    let mut search = code;
    while let Some(at) = search.find("main") {
        let before_ok = search[..at]
            .chars()
            .next_back()
            .map_or(true, |c| !(c.is_alphanumeric() || c == '_'));
        let after = search[at + 4..].trim_start();
        if before_ok && after.starts_with('(') {
            return true;
        }
        search = &search[at + 4..];
    }
    false
}

fn skip_layout(statement: &str) -> &str {
    if !statement.starts_with("layout") {
        return statement;
    }
    match statement.find(')') {
        Some(at) => statement[at + 1..].trim_start(),
        None => statement,
    }
}

/// Removes `//` and `/* */` comments, keeping line breaks so line numbers
/// in diagnostics stay correct.
fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('/', Some('/')) => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut previous = ' ';
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                    }
                    if previous == '*' && c == '/' {
                        break;
                    }
                    previous = c;
                }
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = r#"
        #version 330 core
        layout(location = 0) in vec3 position;
        uniform mat4 model, view;
        uniform highp float time; // seconds
        /* uniform vec4 commented; */
        uniform Lights { vec4 colour; } lights;
        uniform sampler2D textures[4];
        void main() {
            gl_Position = view * model * vec4(position, 1.0);
        }
    "#;

    #[test]
    fn test_collects_default_block_uniforms() {
        let names: Vec<_> = uniform_declarations(VERTEX)
            .into_iter()
            .map(|decl| (decl.name, decl.glsl_type, decl.array_len))
            .collect();
        assert_eq!(
            names,
            vec![
                ("model".to_owned(), "mat4".to_owned(), None),
                ("view".to_owned(), "mat4".to_owned(), None),
                ("time".to_owned(), "float".to_owned(), None),
                ("textures".to_owned(), "sampler2D".to_owned(), Some(4)),
            ]
        );
    }

    #[test]
    fn test_check_source() {
        assert!(check_source(VERTEX).is_ok());
        assert!(check_source("void mainly() {}").is_err());

        let error = check_source("void main() {\n  if (x {\n}\n").unwrap_err();
        assert!(error.starts_with("0:2:"), "{}", error);
    }

    #[test]
    fn test_sampler_accepts_int() {
        assert!(accepts("sampler2D", "int"));
        assert!(accepts("usamplerCube", "int"));
        assert!(accepts("mat4x4", "mat4"));
        assert!(!accepts("vec3", "vec4"));
        assert!(!accepts("float", "int"));
    }
}
