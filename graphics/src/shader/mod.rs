//! GLSL shader composition and compilation.
//!
//! This module turns a shader source id into a validated naga module:
//!
//! 1. The source is read through [`SearchPaths`].
//! 2. `#include "path"` / `#include <path>` directives are resolved recursively,
//!    first against registered in-memory includes, then against the search paths.
//! 3. The stage macro (`VERTEX`, `FRAGMENT` or `COMPUTE`) is added to the
//!    caller's [`MacroSet`] and the result is handed to naga's GLSL frontend
//!    as preprocessor defines.
//! 4. The module is validated.
//!
//! Any failure along the way becomes [`GraphicsError::CompileError`] carrying
//! the source id and the diagnostics text.
//!
//! # Multi-Stage Shaders
//!
//! A single GLSL file can contain several stages using `#ifdef VERTEX` /
//! `#ifdef FRAGMENT` blocks:
//!
//! ```glsl
//! #version 450
//! #ifdef VERTEX
//! layout(location = 0) in vec3 position;
//! void main() { gl_Position = vec4(position, 1.0); }
//! #endif
//! #ifdef FRAGMENT
//! layout(location = 0) out vec4 out_color;
//! void main() { out_color = vec4(1.0); }
//! #endif
//! ```

mod macros;

use std::collections::{HashMap, HashSet};

use crate::assets::SearchPaths;
use crate::error::GraphicsError;
use crate::profiling::profile_scope;

pub use macros::{MacroSet, ShaderDef};

/// A programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

impl ShaderStage {
    /// The macro defined while compiling for this stage.
    pub fn define(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "VERTEX",
            ShaderStage::Fragment => "FRAGMENT",
            ShaderStage::Compute => "COMPUTE",
        }
    }

    fn to_naga(self) -> naga::ShaderStage {
        match self {
            ShaderStage::Vertex => naga::ShaderStage::Vertex,
            ShaderStage::Fragment => naga::ShaderStage::Fragment,
            ShaderStage::Compute => naga::ShaderStage::Compute,
        }
    }
}

bitflags::bitflags! {
    /// Set of shader stages a binding is visible to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStages: u32 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
        const COMPUTE = 1 << 2;
        const GRAPHICS = Self::VERTEX.bits() | Self::FRAGMENT.bits();
    }
}

impl From<ShaderStage> for ShaderStages {
    fn from(stage: ShaderStage) -> Self {
        match stage {
            ShaderStage::Vertex => ShaderStages::VERTEX,
            ShaderStage::Fragment => ShaderStages::FRAGMENT,
            ShaderStage::Compute => ShaderStages::COMPUTE,
        }
    }
}

/// Built-in includes available to every shader.
const CINDER_MATH: &str = r#"const float PI = 3.14159265358979;

float saturate_f(float x) {
    return clamp(x, 0.0, 1.0);
}
"#;

const CINDER_COLOR: &str = r#"vec3 srgb_to_linear(vec3 c) {
    return mix(c / 12.92, pow((c + 0.055) / 1.055, vec3(2.4)), step(vec3(0.04045), c));
}

float luminance(vec3 c) {
    return dot(c, vec3(0.2126, 0.7152, 0.0722));
}
"#;

/// Resolves includes and compiles GLSL into validated naga modules.
#[derive(Debug, Clone)]
pub struct ShaderComposer {
    /// In-memory includes that take priority over the search paths.
    includes: HashMap<String, String>,
}

impl Default for ShaderComposer {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderComposer {
    /// Create a composer with the built-in `cinder/*.glsl` includes registered.
    pub fn new() -> Self {
        let mut composer = Self {
            includes: HashMap::new(),
        };
        composer.register_include("cinder/math.glsl", CINDER_MATH);
        composer.register_include("cinder/color.glsl", CINDER_COLOR);
        composer
    }

    /// Register an in-memory include.
    pub fn register_include(&mut self, path: &str, source: &str) {
        self.includes.insert(path.to_string(), source.to_string());
    }

    /// The macro set actually passed to the preprocessor for `stage`.
    pub fn effective_macros(stage: ShaderStage, macros: &MacroSet) -> MacroSet {
        let mut effective = macros.clone();
        effective.set(stage.define(), true);
        effective
    }

    /// Load, preprocess, parse and validate `source_id` for `stage`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::CompileError`] if the source or one of its
    /// includes cannot be found, or if naga rejects the result.
    pub fn compile(
        &self,
        paths: &SearchPaths,
        source_id: &str,
        stage: ShaderStage,
        macros: &MacroSet,
    ) -> Result<naga::Module, GraphicsError> {
        profile_scope!("shader_compile");

        let compile_error = |diagnostics: String| GraphicsError::CompileError {
            source_id: source_id.to_string(),
            diagnostics,
        };

        let (_, source) = paths
            .read_to_string(source_id)
            .map_err(|err| compile_error(err.to_string()))?;

        let mut included = HashSet::new();
        let resolved = self
            .resolve_includes(paths, &source, &mut included)
            .map_err(compile_error)?;

        let options = naga::front::glsl::Options {
            stage: stage.to_naga(),
            defines: Self::effective_macros(stage, macros).to_naga_defines(),
        };

        let mut frontend = naga::front::glsl::Frontend::default();
        let module = frontend
            .parse(&options, &resolved)
            .map_err(|errors| compile_error(format!("GLSL parse error:\n{errors}")))?;

        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        );
        validator
            .validate(&module)
            .map_err(|err| compile_error(format!("validation error: {err}")))?;

        Ok(module)
    }

    /// Resolve `#include` directives recursively. Each file is included at most once.
    fn resolve_includes(
        &self,
        paths: &SearchPaths,
        source: &str,
        included: &mut HashSet<String>,
    ) -> Result<String, String> {
        let mut result = String::with_capacity(source.len());

        for line in source.lines() {
            let Some(path) = parse_include_directive(line.trim()) else {
                result.push_str(line);
                result.push('\n');
                continue;
            };
            if !included.insert(path.to_string()) {
                continue;
            }

            let include_source = match self.includes.get(path) {
                Some(source) => source.clone(),
                None => paths
                    .read_to_string(path)
                    .map(|(_, text)| text)
                    .map_err(|err| format!("include \"{path}\": {err}"))?,
            };

            let nested = self.resolve_includes(paths, &include_source, included)?;
            result.push_str(&nested);
            result.push('\n');
        }

        Ok(result)
    }
}

/// Parse a `#include "path"` directive, returning the path if found.
fn parse_include_directive(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("#include")?.trim();
    if let Some(inner) = rest.strip_prefix('"') {
        inner.strip_suffix('"')
    } else if let Some(inner) = rest.strip_prefix('<') {
        inner.strip_suffix('>')
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemorySource;

    const TINTED_FRAGMENT: &str = r#"#version 450
#include "cinder/math.glsl"

layout(location = 0) out vec4 out_color;

void main() {
#ifdef USE_RED
    out_color = vec4(saturate_f(1.5), 0.0, 0.0, 1.0);
#else
    out_color = vec4(0.0, 1.0, 0.0, 1.0);
#endif
}
"#;

    fn paths_with(files: &[(&str, &str)]) -> SearchPaths {
        let source = MemorySource::new();
        for (path, text) in files {
            source.insert_text(*path, text);
        }
        let mut paths = SearchPaths::new();
        paths.push(source, "");
        paths
    }

    #[test]
    fn test_compile_with_builtin_include() {
        let paths = paths_with(&[("tinted.frag", TINTED_FRAGMENT)]);
        let composer = ShaderComposer::new();

        let module = composer.compile(
            &paths,
            "tinted.frag",
            ShaderStage::Fragment,
            &MacroSet::new().with("USE_RED", true),
        );
        assert!(module.is_ok(), "Failed: {:?}", module.err());
    }

    #[test]
    fn test_include_from_search_paths() {
        let paths = paths_with(&[
            ("lib/shared.glsl", "vec4 shared_color() { return vec4(0.5); }"),
            (
                "uses_shared.frag",
                r#"#version 450
#include <lib/shared.glsl>
#include <lib/shared.glsl>
layout(location = 0) out vec4 out_color;
void main() { out_color = shared_color(); }
"#,
            ),
        ]);

        let result = ShaderComposer::new().compile(
            &paths,
            "uses_shared.frag",
            ShaderStage::Fragment,
            &MacroSet::new(),
        );
        assert!(result.is_ok(), "Failed: {:?}", result.err());
    }

    #[test]
    fn test_stage_define_selects_block() {
        let paths = paths_with(&[(
            "both.glsl",
            r#"#version 450
#ifdef VERTEX
layout(location = 0) in vec3 position;
void main() { gl_Position = vec4(position, 1.0); }
#endif
#ifdef FRAGMENT
layout(location = 0) out vec4 out_color;
void main() { out_color = vec4(1.0); }
#endif
"#,
        )]);
        let composer = ShaderComposer::new();

        for stage in [ShaderStage::Vertex, ShaderStage::Fragment] {
            let result = composer.compile(&paths, "both.glsl", stage, &MacroSet::new());
            assert!(result.is_ok(), "{stage:?} failed: {:?}", result.err());
        }
    }

    #[test]
    fn test_missing_source_is_compile_error() {
        let paths = paths_with(&[]);
        let err = ShaderComposer::new()
            .compile(&paths, "nope.frag", ShaderStage::Fragment, &MacroSet::new())
            .unwrap_err();
        assert!(
            matches!(err, GraphicsError::CompileError { ref source_id, .. } if source_id == "nope.frag")
        );
    }

    #[test]
    fn test_missing_include_is_compile_error() {
        let paths = paths_with(&[(
            "broken.frag",
            "#version 450\n#include \"does/not/exist.glsl\"\nvoid main() {}\n",
        )]);
        let err = ShaderComposer::new()
            .compile(&paths, "broken.frag", ShaderStage::Fragment, &MacroSet::new())
            .unwrap_err();
        let GraphicsError::CompileError { diagnostics, .. } = err else {
            panic!("expected CompileError, got {err:?}");
        };
        assert!(diagnostics.contains("does/not/exist.glsl"));
    }

    #[test]
    fn test_syntax_error_is_compile_error() {
        let paths = paths_with(&[(
            "bad.frag",
            "#version 450\nlayout(location = 0) out vec4 c;\nvoid main() { c = ; }\n",
        )]);
        let err = ShaderComposer::new()
            .compile(&paths, "bad.frag", ShaderStage::Fragment, &MacroSet::new())
            .unwrap_err();
        assert!(matches!(err, GraphicsError::CompileError { .. }));
    }

    #[test]
    fn test_effective_macros_include_stage() {
        let base = MacroSet::new().with("SKINNED", true);
        let vertex = ShaderComposer::effective_macros(ShaderStage::Vertex, &base);
        let fragment = ShaderComposer::effective_macros(ShaderStage::Fragment, &base);
        assert!(vertex.contains("VERTEX"));
        assert!(vertex.contains("SKINNED"));
        assert_ne!(vertex.hash_key(), fragment.hash_key());
    }

    #[test]
    fn test_parse_include_directive() {
        assert_eq!(parse_include_directive("#include \"a/b.glsl\""), Some("a/b.glsl"));
        assert_eq!(parse_include_directive("#include <a/b.glsl>"), Some("a/b.glsl"));
        assert_eq!(parse_include_directive("#include a/b.glsl"), None);
        assert_eq!(parse_include_directive("#version 450"), None);
    }
}
