//! Pipeline creation settings.

use std::hash::{DefaultHasher, Hash, Hasher};

use crate::backend::{BoundResource, SignatureHandle};
use crate::bindless::VariableKind;
use crate::shader::{MacroSet, ShaderStages};
use crate::types::{CompareFunction, TextureFormat};

/// Primitive topology for vertex assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    #[default]
    TriangleList,
    TriangleStrip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    None,
    Front,
    #[default]
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FillMode {
    #[default]
    Solid,
    /// Requires [`DeviceFeatures::WIREFRAME_FILL`](crate::types::DeviceFeatures::WIREFRAME_FILL).
    Wireframe,
}

/// Blend factor for blending operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendFactor {
    /// 0.0
    #[default]
    Zero,
    /// 1.0
    One,
    /// Source color
    Src,
    /// 1 - source color
    OneMinusSrc,
    /// Source alpha
    SrcAlpha,
    /// 1 - source alpha
    OneMinusSrcAlpha,
    /// Destination color
    Dst,
    /// 1 - destination color
    OneMinusDst,
    /// Destination alpha
    DstAlpha,
    /// 1 - destination alpha
    OneMinusDstAlpha,
}

/// Blend state for the color attachments. Color and alpha share the factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendState {
    pub src_factor: BlendFactor,
    pub dst_factor: BlendFactor,
}

impl BlendState {
    /// Standard alpha blending (src over dst).
    pub fn alpha_blending() -> Self {
        Self {
            src_factor: BlendFactor::SrcAlpha,
            dst_factor: BlendFactor::OneMinusSrcAlpha,
        }
    }

    pub fn additive() -> Self {
        Self {
            src_factor: BlendFactor::One,
            dst_factor: BlendFactor::One,
        }
    }
}

/// Vertex attribute format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
    Uint32,
    Unorm8x4,
}

impl VertexFormat {
    pub fn size(self) -> u32 {
        match self {
            VertexFormat::Float32 | VertexFormat::Uint32 | VertexFormat::Unorm8x4 => 4,
            VertexFormat::Float32x2 => 8,
            VertexFormat::Float32x3 => 12,
            VertexFormat::Float32x4 => 16,
        }
    }
}

/// One element of a pipeline's input layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub location: u32,
    pub buffer_slot: u32,
    pub offset: u32,
    pub format: VertexFormat,
}

/// A sampler baked into the pipeline under `name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImmutableSampler {
    pub stages: ShaderStages,
    pub name: String,
}

/// Overrides the default [`VariableKind`] of one shader variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceVariable {
    pub stages: ShaderStages,
    pub name: String,
    pub kind: VariableKind,
}

/// A resource bound by name when the pipeline is created.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StaticUniform {
    pub stages: ShaderStages,
    pub name: String,
    pub resource: BoundResource,
}

/// How a pipeline receives its resources.
///
/// The two models are exclusive: a pipeline on the shared signature never
/// binds per-pipeline static uniforms and never owns a binding object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PipelineBinding {
    /// Bindless path: resources come from the shared resource signature.
    Signature(SignatureHandle),
    /// Legacy path: static uniforms bound on the pipeline by name.
    Static(Vec<StaticUniform>),
}

impl Default for PipelineBinding {
    fn default() -> Self {
        PipelineBinding::Static(Vec::new())
    }
}

impl PipelineBinding {
    pub fn signature(&self) -> Option<SignatureHandle> {
        match self {
            PipelineBinding::Signature(handle) => Some(*handle),
            PipelineBinding::Static(_) => None,
        }
    }
}

/// Full description of a graphics pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineSettings {
    pub topology: PrimitiveTopology,
    pub cull: CullMode,
    pub fill: FillMode,
    /// `None` disables depth testing.
    pub depth_compare: Option<CompareFunction>,
    pub depth_write: bool,
    /// `None` disables blending.
    pub blend: Option<BlendState>,
    pub render_targets: u8,
    pub color_format: TextureFormat,
    pub depth_format: Option<TextureFormat>,
    pub scissors: bool,
    pub layout: Vec<VertexAttribute>,
    pub immutable_samplers: Vec<ImmutableSampler>,
    pub variables: Vec<ResourceVariable>,
    pub default_variable_kind: VariableKind,
    pub vertex_shader: String,
    pub fragment_shader: String,
    pub macros: MacroSet,
    pub binding: PipelineBinding,
    /// Name of the binding object to create. Only honored on the legacy path.
    pub bind_name: Option<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            topology: PrimitiveTopology::TriangleList,
            cull: CullMode::Back,
            fill: FillMode::Solid,
            depth_compare: Some(CompareFunction::LessEqual),
            depth_write: true,
            blend: None,
            render_targets: 1,
            color_format: TextureFormat::Rgba8Unorm,
            depth_format: Some(TextureFormat::Depth32Float),
            scissors: false,
            layout: Vec::new(),
            immutable_samplers: Vec::new(),
            variables: Vec::new(),
            default_variable_kind: VariableKind::Static,
            vertex_shader: String::new(),
            fragment_shader: String::new(),
            macros: MacroSet::new(),
            binding: PipelineBinding::default(),
            bind_name: None,
        }
    }
}

impl PipelineSettings {
    /// Settings for a vertex/fragment shader pair with default state.
    pub fn new(vertex_shader: impl Into<String>, fragment_shader: impl Into<String>) -> Self {
        Self {
            vertex_shader: vertex_shader.into(),
            fragment_shader: fragment_shader.into(),
            ..Default::default()
        }
    }

    /// State for a full-screen pass: no culling, no depth, no vertex input.
    pub fn fullscreen(
        vertex_shader: impl Into<String>,
        fragment_shader: impl Into<String>,
    ) -> Self {
        Self {
            cull: CullMode::None,
            depth_compare: None,
            depth_write: false,
            depth_format: None,
            ..Self::new(vertex_shader, fragment_shader)
        }
    }

    pub fn with_topology(mut self, topology: PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    pub fn with_cull(mut self, cull: CullMode) -> Self {
        self.cull = cull;
        self
    }

    pub fn with_fill(mut self, fill: FillMode) -> Self {
        self.fill = fill;
        self
    }

    pub fn with_depth(mut self, compare: Option<CompareFunction>, write: bool) -> Self {
        self.depth_compare = compare;
        self.depth_write = write;
        self
    }

    pub fn with_blend(mut self, blend: BlendState) -> Self {
        self.blend = Some(blend);
        self
    }

    pub fn with_color_format(mut self, format: TextureFormat) -> Self {
        self.color_format = format;
        self
    }

    pub fn with_attribute(mut self, attribute: VertexAttribute) -> Self {
        self.layout.push(attribute);
        self
    }

    pub fn with_immutable_sampler(mut self, stages: ShaderStages, name: impl Into<String>) -> Self {
        self.immutable_samplers.push(ImmutableSampler {
            stages,
            name: name.into(),
        });
        self
    }

    pub fn with_variable(
        mut self,
        stages: ShaderStages,
        name: impl Into<String>,
        kind: VariableKind,
    ) -> Self {
        self.variables.push(ResourceVariable {
            stages,
            name: name.into(),
            kind,
        });
        self
    }

    pub fn with_macros(mut self, macros: MacroSet) -> Self {
        self.macros = macros;
        self
    }

    /// Use the shared resource signature.
    pub fn with_signature(mut self, signature: SignatureHandle) -> Self {
        self.binding = PipelineBinding::Signature(signature);
        self
    }

    /// Bind `resource` to `name` when the pipeline is created. Switches to the legacy path.
    pub fn with_static_uniform(
        mut self,
        stages: ShaderStages,
        name: impl Into<String>,
        resource: BoundResource,
    ) -> Self {
        let uniform = StaticUniform {
            stages,
            name: name.into(),
            resource,
        };
        match &mut self.binding {
            PipelineBinding::Static(uniforms) => uniforms.push(uniform),
            PipelineBinding::Signature(_) => {
                self.binding = PipelineBinding::Static(vec![uniform]);
            }
        }
        self
    }

    pub fn with_bind_name(mut self, name: impl Into<String>) -> Self {
        self.bind_name = Some(name.into());
        self
    }

    /// Hash of every field, used to notice a cache hit with different settings.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

/// Full description of a compute pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ComputeSettings {
    pub shader: String,
    pub macros: MacroSet,
    pub immutable_samplers: Vec<ImmutableSampler>,
    pub variables: Vec<ResourceVariable>,
    pub binding: PipelineBinding,
    pub bind_name: Option<String>,
}

impl ComputeSettings {
    pub fn new(shader: impl Into<String>) -> Self {
        Self {
            shader: shader.into(),
            ..Default::default()
        }
    }

    pub fn with_macros(mut self, macros: MacroSet) -> Self {
        self.macros = macros;
        self
    }

    pub fn with_signature(mut self, signature: SignatureHandle) -> Self {
        self.binding = PipelineBinding::Signature(signature);
        self
    }

    pub fn with_bind_name(mut self, name: impl Into<String>) -> Self {
        self.bind_name = Some(name.into());
        self
    }

    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BufferHandle;

    #[test]
    fn test_static_uniform_replaces_signature() {
        let settings = PipelineSettings::new("a.vert", "a.frag")
            .with_signature(SignatureHandle::from_raw(1))
            .with_static_uniform(
                ShaderStages::FRAGMENT,
                "Constants",
                BoundResource::Buffer(BufferHandle::from_raw(2)),
            );
        assert_eq!(settings.binding.signature(), None);
        assert!(matches!(&settings.binding, PipelineBinding::Static(u) if u.len() == 1));
    }

    #[test]
    fn test_fingerprint_tracks_state() {
        let base = PipelineSettings::new("a.vert", "a.frag");
        assert_eq!(
            base.fingerprint(),
            PipelineSettings::new("a.vert", "a.frag").fingerprint()
        );
        assert_ne!(
            base.fingerprint(),
            base.clone().with_fill(FillMode::Wireframe).fingerprint()
        );
    }

    #[test]
    fn test_fullscreen_disables_depth() {
        let settings = PipelineSettings::fullscreen("fs.vert", "fs.frag");
        assert_eq!(settings.depth_compare, None);
        assert!(!settings.depth_write);
        assert_eq!(settings.cull, CullMode::None);
    }
}
