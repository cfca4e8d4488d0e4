//! Shader, sampler, pipeline and binding caches.
//!
//! Pipelines are cached by name alone: the first [`PipelineCache::create_pipeline`]
//! call for a name wins, and later calls get the same handle back whatever
//! settings they pass. Shaders are cached by source id and the hash of the
//! effective macro set, so one source compiled for two stages or with two
//! macro sets yields distinct entries.

mod settings;

pub use settings::{
    BlendFactor, BlendState, ComputeSettings, CullMode, FillMode, ImmutableSampler,
    PipelineBinding, PipelineSettings, PrimitiveTopology, ResourceVariable, StaticUniform,
    VertexAttribute, VertexFormat,
};

use std::collections::HashMap;

use crate::assets::SearchPaths;
use crate::backend::{
    BindTarget, BindingHandle, ComputePipelineDescriptor, GpuBackend, ImmutableSamplerBinding,
    PipelineDescriptor, PipelineHandle, SamplerHandle, ShaderDescriptor, ShaderHandle,
};
use crate::error::GraphicsError;
use crate::profiling::profile_scope;
use crate::shader::{MacroSet, ShaderComposer, ShaderStage};
use crate::types::{DeviceFeatures, SamplerDescriptor};

/// A created pipeline and everything it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineRecord {
    pub handle: PipelineHandle,
    pub shaders: Vec<ShaderHandle>,
    /// Binding created for the pipeline's bind name, legacy path only.
    pub binding: Option<BindingHandle>,
    fingerprint: u64,
}

/// Name-keyed pipeline cache plus the shader and sampler caches it draws on.
#[derive(Debug)]
pub struct PipelineCache {
    search_paths: SearchPaths,
    composer: ShaderComposer,
    shaders: HashMap<(String, u64), ShaderHandle>,
    pipelines: HashMap<String, PipelineRecord>,
    binds: HashMap<String, BindingHandle>,
    samplers: HashMap<u32, SamplerHandle>,
}

impl PipelineCache {
    /// Create an empty cache that loads shader sources from `search_paths`.
    pub fn new(search_paths: SearchPaths) -> Self {
        Self {
            search_paths,
            composer: ShaderComposer::new(),
            shaders: HashMap::new(),
            pipelines: HashMap::new(),
            binds: HashMap::new(),
            samplers: HashMap::new(),
        }
    }

    /// Packed id of the default point/wrap sampler.
    pub fn default_sampler_id() -> u32 {
        SamplerDescriptor::point_wrap().packed_id()
    }

    /// Register the default sampler. Called once the device exists.
    pub fn initialize(&mut self, backend: &mut dyn GpuBackend) -> Result<(), GraphicsError> {
        self.register_sampler(
            backend,
            Self::default_sampler_id(),
            &SamplerDescriptor::point_wrap(),
        )?;
        Ok(())
    }

    pub fn search_paths(&self) -> &SearchPaths {
        &self.search_paths
    }

    pub fn search_paths_mut(&mut self) -> &mut SearchPaths {
        &mut self.search_paths
    }

    /// The composer, for registering in-memory includes.
    pub fn composer_mut(&mut self) -> &mut ShaderComposer {
        &mut self.composer
    }

    /// Compile `source_id` for `stage`, or return the cached shader.
    ///
    /// # Errors
    ///
    /// Every failure, including backend rejection, is a [`GraphicsError::CompileError`].
    pub fn compile_shader(
        &mut self,
        backend: &mut dyn GpuBackend,
        source_id: &str,
        stage: ShaderStage,
        macros: &MacroSet,
    ) -> Result<ShaderHandle, GraphicsError> {
        let macro_hash = ShaderComposer::effective_macros(stage, macros).hash_key();
        let key = (source_id.to_string(), macro_hash);
        if let Some(&shader) = self.shaders.get(&key) {
            return Ok(shader);
        }

        let module = self
            .composer
            .compile(&self.search_paths, source_id, stage, macros)?;

        let label = format!("{source_id}#{macro_hash:016x}");
        let shader = backend
            .create_shader(&ShaderDescriptor {
                label: &label,
                stage,
                module: &module,
            })
            .map_err(|err| GraphicsError::CompileError {
                source_id: source_id.to_string(),
                diagnostics: err.to_string(),
            })?;

        log::info!("Compiled shader {label} ({stage:?})");
        self.shaders.insert(key, shader);
        Ok(shader)
    }

    /// Create the pipeline `name`, or return the existing one.
    ///
    /// On a cache hit `settings` are ignored.
    ///
    /// # Errors
    ///
    /// Shader failures surface as [`GraphicsError::CompileError`]. Everything
    /// else is a [`GraphicsError::PipelineCreationError`]: wireframe fill on a
    /// device without it, backend rejection or a static uniform the shaders
    /// don't declare.
    pub fn create_pipeline(
        &mut self,
        backend: &mut dyn GpuBackend,
        features: DeviceFeatures,
        name: &str,
        settings: &PipelineSettings,
    ) -> Result<PipelineHandle, GraphicsError> {
        if let Some(handle) = self.cached(name, settings.fingerprint()) {
            return Ok(handle);
        }
        profile_scope!("create_pipeline");

        if settings.fill == FillMode::Wireframe && !features.contains(DeviceFeatures::WIREFRAME_FILL)
        {
            return Err(creation_error(
                name,
                "wireframe fill requested but the device lacks WIREFRAME_FILL",
            ));
        }

        let vertex = self.compile_shader(
            backend,
            &settings.vertex_shader,
            ShaderStage::Vertex,
            &settings.macros,
        )?;
        let fragment = self.compile_shader(
            backend,
            &settings.fragment_shader,
            ShaderStage::Fragment,
            &settings.macros,
        )?;
        let immutable_samplers = self.resolve_samplers(backend, &settings.immutable_samplers)?;

        let handle = backend
            .create_pipeline(&PipelineDescriptor {
                label: name,
                vertex,
                fragment,
                settings,
                immutable_samplers: &immutable_samplers,
                signature: settings.binding.signature(),
            })
            .map_err(|err| creation_error(name, err))?;

        let binding = match self.bind_legacy(
            backend,
            name,
            handle,
            &settings.binding,
            settings.bind_name.as_deref(),
        ) {
            Ok(binding) => binding,
            Err(err) => {
                backend.destroy_pipeline(handle);
                return Err(err);
            }
        };

        log::debug!("PipelineCache: created pipeline '{name}'");
        self.pipelines.insert(
            name.to_string(),
            PipelineRecord {
                handle,
                shaders: vec![vertex, fragment],
                binding,
                fingerprint: settings.fingerprint(),
            },
        );
        Ok(handle)
    }

    /// Compute counterpart of [`create_pipeline`](Self::create_pipeline), sharing its cache.
    pub fn create_compute_pipeline(
        &mut self,
        backend: &mut dyn GpuBackend,
        features: DeviceFeatures,
        name: &str,
        settings: &ComputeSettings,
    ) -> Result<PipelineHandle, GraphicsError> {
        if let Some(handle) = self.cached(name, settings.fingerprint()) {
            return Ok(handle);
        }
        if !features.contains(DeviceFeatures::COMPUTE_SHADERS) {
            return Err(creation_error(
                name,
                "compute pipeline requested but the device lacks COMPUTE_SHADERS",
            ));
        }

        let shader =
            self.compile_shader(backend, &settings.shader, ShaderStage::Compute, &settings.macros)?;
        let immutable_samplers = self.resolve_samplers(backend, &settings.immutable_samplers)?;

        let handle = backend
            .create_compute_pipeline(&ComputePipelineDescriptor {
                label: name,
                shader,
                settings,
                immutable_samplers: &immutable_samplers,
                signature: settings.binding.signature(),
            })
            .map_err(|err| creation_error(name, err))?;

        let binding = match self.bind_legacy(
            backend,
            name,
            handle,
            &settings.binding,
            settings.bind_name.as_deref(),
        ) {
            Ok(binding) => binding,
            Err(err) => {
                backend.destroy_pipeline(handle);
                return Err(err);
            }
        };

        log::debug!("PipelineCache: created compute pipeline '{name}'");
        self.pipelines.insert(
            name.to_string(),
            PipelineRecord {
                handle,
                shaders: vec![shader],
                binding,
                fingerprint: settings.fingerprint(),
            },
        );
        Ok(handle)
    }

    fn cached(&self, name: &str, fingerprint: u64) -> Option<PipelineHandle> {
        let record = self.pipelines.get(name)?;
        if record.fingerprint != fingerprint {
            log::debug!(
                "PipelineCache: '{name}' requested with different settings, returning the cached pipeline"
            );
        }
        Some(record.handle)
    }

    fn resolve_samplers(
        &mut self,
        backend: &mut dyn GpuBackend,
        samplers: &[ImmutableSampler],
    ) -> Result<Vec<ImmutableSamplerBinding>, GraphicsError> {
        if samplers.is_empty() {
            return Ok(Vec::new());
        }
        let sampler = self.register_sampler(
            backend,
            Self::default_sampler_id(),
            &SamplerDescriptor::point_wrap(),
        )?;
        Ok(samplers
            .iter()
            .map(|s| ImmutableSamplerBinding {
                stages: s.stages,
                name: s.name.clone(),
                sampler,
            })
            .collect())
    }

    /// Static uniforms and the optional binding object of a legacy-path pipeline.
    fn bind_legacy(
        &mut self,
        backend: &mut dyn GpuBackend,
        name: &str,
        pipeline: PipelineHandle,
        binding: &PipelineBinding,
        bind_name: Option<&str>,
    ) -> Result<Option<BindingHandle>, GraphicsError> {
        let PipelineBinding::Static(uniforms) = binding else {
            if let Some(bind_name) = bind_name {
                log::warn!(
                    "PipelineCache: '{name}' uses the resource signature, ignoring bind name '{bind_name}'"
                );
            }
            return Ok(None);
        };

        let target = BindTarget::Pipeline(pipeline);
        for uniform in uniforms {
            backend
                .set_static_variable(target, uniform.stages, &uniform.name, uniform.resource)
                .map_err(|err| creation_error(name, err))?;
        }

        let Some(bind_name) = bind_name else {
            return Ok(None);
        };
        let binding = backend
            .create_binding(target)
            .map_err(|err| creation_error(name, err))?;
        self.binds.insert(bind_name.to_string(), binding);
        Ok(Some(binding))
    }

    /// Create a sampler under `id`. An id that is already taken returns the existing sampler.
    pub fn register_sampler(
        &mut self,
        backend: &mut dyn GpuBackend,
        id: u32,
        descriptor: &SamplerDescriptor,
    ) -> Result<SamplerHandle, GraphicsError> {
        if let Some(&sampler) = self.samplers.get(&id) {
            return Ok(sampler);
        }
        let sampler = backend.create_sampler(descriptor)?;
        log::trace!("PipelineCache: registered sampler {id:#x} {:?}", descriptor.label);
        self.samplers.insert(id, sampler);
        Ok(sampler)
    }

    pub fn get_sampler(&self, id: u32) -> Option<SamplerHandle> {
        self.samplers.get(&id).copied()
    }

    /// The default point/wrap sampler, once registered.
    pub fn default_sampler(&self) -> Option<SamplerHandle> {
        self.get_sampler(Self::default_sampler_id())
    }

    pub fn get_bind(&self, name: &str) -> Option<BindingHandle> {
        self.binds.get(name).copied()
    }

    pub fn get_pipeline(&self, name: &str) -> Option<PipelineHandle> {
        self.pipelines.get(name).map(|record| record.handle)
    }

    pub fn record(&self, name: &str) -> Option<&PipelineRecord> {
        self.pipelines.get(name)
    }

    pub fn shader_count(&self) -> usize {
        self.shaders.len()
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Destroy every cached pipeline, binding, shader and sampler.
    pub fn clear(&mut self, backend: &mut dyn GpuBackend) {
        log::debug!(
            "PipelineCache: clearing {} pipelines, {} shaders, {} samplers",
            self.pipelines.len(),
            self.shaders.len(),
            self.samplers.len()
        );
        self.binds.clear();
        for (_, record) in self.pipelines.drain() {
            if let Some(binding) = record.binding {
                backend.destroy_binding(binding);
            }
            backend.destroy_pipeline(record.handle);
        }
        for (_, shader) in self.shaders.drain() {
            backend.destroy_shader(shader);
        }
        for (_, sampler) in self.samplers.drain() {
            backend.destroy_sampler(sampler);
        }
    }
}

fn creation_error(name: &str, reason: impl ToString) -> GraphicsError {
    GraphicsError::PipelineCreationError {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemorySource;
    use crate::backend::{
        BoundResource, BufferHandle, DummyBackend, DummyBackendOptions, DummyCommand,
        SignatureHandle,
    };
    use crate::shader::ShaderStages;
    use crate::types::{BufferDescriptor, BufferUsage, DeviceRequest, FilterMode};

    const FULLSCREEN_VERT: &str = r#"#version 450
layout(location = 0) in vec2 a_position;
layout(location = 0) out vec2 v_uv;
void main() {
    v_uv = a_position * 0.5 + 0.5;
    gl_Position = vec4(a_position, 0.0, 1.0);
}
"#;

    const TINT_FRAG: &str = r#"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 o_color;
layout(set = 0, binding = 0) uniform Constants { vec4 tint; } u_constants;
void main() {
#ifdef USE_TINT
    o_color = u_constants.tint;
#else
    o_color = vec4(v_uv, 0.0, 1.0) * u_constants.tint;
#endif
}
"#;

    fn setup(options: DummyBackendOptions) -> (DummyBackend, PipelineCache) {
        let source = MemorySource::new();
        source.insert_text("fullscreen.vert", FULLSCREEN_VERT);
        source.insert_text("tint.frag", TINT_FRAG);
        let mut paths = SearchPaths::new();
        paths.push(source, "");

        let mut backend = DummyBackend::with_options(options);
        backend
            .create_device(&DeviceRequest::default())
            .expect("device");
        let mut cache = PipelineCache::new(paths);
        cache.initialize(&mut backend).expect("default sampler");
        (backend, cache)
    }

    fn constants(backend: &mut DummyBackend) -> BufferHandle {
        backend
            .create_buffer(&BufferDescriptor::new(16, BufferUsage::CONSTANT))
            .expect("buffer")
    }

    #[test]
    fn test_shader_cache_is_macro_sensitive() {
        let (mut backend, mut cache) = setup(DummyBackendOptions::default());
        let plain = MacroSet::new();
        let tinted = MacroSet::new().with("USE_TINT", true);

        let a = cache
            .compile_shader(&mut backend, "tint.frag", ShaderStage::Fragment, &plain)
            .unwrap();
        let b = cache
            .compile_shader(&mut backend, "tint.frag", ShaderStage::Fragment, &tinted)
            .unwrap();
        let again = cache
            .compile_shader(&mut backend, "tint.frag", ShaderStage::Fragment, &tinted)
            .unwrap();

        assert_ne!(a, b);
        assert_eq!(b, again);
        assert_eq!(cache.shader_count(), 2);
    }

    #[test]
    fn test_name_is_sole_pipeline_key() {
        let (mut backend, mut cache) = setup(DummyBackendOptions::default());
        let log = backend.command_log();
        let settings = PipelineSettings::fullscreen("fullscreen.vert", "tint.frag")
            .with_signature(SignatureHandle::from_raw(99));

        let first = cache
            .create_pipeline(&mut backend, DeviceFeatures::all(), "Tint", &settings)
            .unwrap();
        let other = settings.clone().with_blend(BlendState::additive());
        let second = cache
            .create_pipeline(&mut backend, DeviceFeatures::all(), "Tint", &other)
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(cache.get_pipeline("Tint"), Some(first));
        assert_eq!(
            log.count(|c| matches!(c, DummyCommand::CreatePipeline { .. })),
            1
        );
    }

    #[test]
    fn test_static_uniforms_and_bind_name() {
        let (mut backend, mut cache) = setup(DummyBackendOptions::default());
        let buffer = constants(&mut backend);
        let settings = PipelineSettings::fullscreen("fullscreen.vert", "tint.frag")
            .with_static_uniform(
                ShaderStages::FRAGMENT,
                "Constants",
                BoundResource::Buffer(buffer),
            )
            .with_bind_name("TintBind");

        cache
            .create_pipeline(&mut backend, DeviceFeatures::all(), "Tint", &settings)
            .unwrap();

        let bind = cache.get_bind("TintBind");
        assert!(bind.is_some());
        assert_eq!(cache.record("Tint").and_then(|r| r.binding), bind);
    }

    #[test]
    fn test_signature_path_creates_no_binding() {
        let (mut backend, mut cache) = setup(DummyBackendOptions::default());
        let settings = PipelineSettings::fullscreen("fullscreen.vert", "tint.frag")
            .with_signature(SignatureHandle::from_raw(7))
            .with_bind_name("Ignored");

        cache
            .create_pipeline(&mut backend, DeviceFeatures::all(), "Tint", &settings)
            .unwrap();
        assert_eq!(cache.get_bind("Ignored"), None);
    }

    #[test]
    fn test_missing_static_variable_fails() {
        let (mut backend, mut cache) = setup(DummyBackendOptions::default());
        let buffer = constants(&mut backend);
        let settings = PipelineSettings::fullscreen("fullscreen.vert", "tint.frag")
            .with_static_uniform(
                ShaderStages::FRAGMENT,
                "DoesNotExist",
                BoundResource::Buffer(buffer),
            );

        let err = cache
            .create_pipeline(&mut backend, DeviceFeatures::all(), "Tint", &settings)
            .unwrap_err();
        assert!(
            matches!(err, GraphicsError::PipelineCreationError { ref name, .. } if name == "Tint")
        );
        assert_eq!(cache.get_pipeline("Tint"), None);
    }

    #[test]
    fn test_backend_rejection_is_creation_error() {
        let (mut backend, mut cache) =
            setup(DummyBackendOptions::default().with_failing_pipeline("Broken"));
        let settings = PipelineSettings::fullscreen("fullscreen.vert", "tint.frag");

        let err = cache
            .create_pipeline(&mut backend, DeviceFeatures::all(), "Broken", &settings)
            .unwrap_err();
        assert!(matches!(err, GraphicsError::PipelineCreationError { .. }));
    }

    #[test]
    fn test_wireframe_requires_feature() {
        let (mut backend, mut cache) = setup(DummyBackendOptions::default());
        let settings = PipelineSettings::fullscreen("fullscreen.vert", "tint.frag")
            .with_fill(FillMode::Wireframe);

        let err = cache
            .create_pipeline(
                &mut backend,
                DeviceFeatures::BINDLESS_RESOURCES,
                "Wire",
                &settings,
            )
            .unwrap_err();
        assert!(matches!(err, GraphicsError::PipelineCreationError { .. }));
    }

    #[test]
    fn test_missing_shader_is_compile_error() {
        let (mut backend, mut cache) = setup(DummyBackendOptions::default());
        let settings = PipelineSettings::fullscreen("missing.vert", "tint.frag");
        let err = cache
            .create_pipeline(&mut backend, DeviceFeatures::all(), "Missing", &settings)
            .unwrap_err();
        assert!(matches!(err, GraphicsError::CompileError { .. }));
    }

    #[test]
    fn test_sampler_id_collision_returns_existing() {
        let (mut backend, mut cache) = setup(DummyBackendOptions::default());
        let linear = SamplerDescriptor::linear();
        let first = cache
            .register_sampler(&mut backend, linear.packed_id(), &linear)
            .unwrap();
        let second = cache
            .register_sampler(&mut backend, linear.packed_id(), &SamplerDescriptor::nearest())
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(cache.get_sampler(linear.packed_id()), Some(first));
        assert_eq!(cache.get_sampler(0xdead), None);
    }

    #[test]
    fn test_default_sampler_is_point_wrap() {
        let (_, cache) = setup(DummyBackendOptions::default());
        assert!(cache.default_sampler().is_some());
        assert_eq!(SamplerDescriptor::point_wrap().min_filter, FilterMode::Nearest);
    }

    #[test]
    fn test_clear_drops_everything() {
        let (mut backend, mut cache) = setup(DummyBackendOptions::default());
        let settings = PipelineSettings::fullscreen("fullscreen.vert", "tint.frag");
        cache
            .create_pipeline(&mut backend, DeviceFeatures::all(), "Tint", &settings)
            .unwrap();

        let log = backend.command_log();
        cache.clear(&mut backend);
        assert_eq!(cache.get_pipeline("Tint"), None);
        assert_eq!(cache.shader_count(), 0);
        assert_eq!(cache.default_sampler(), None);

        assert_eq!(log.count(|c| matches!(c, DummyCommand::DestroyPipeline { .. })), 1);
        assert_eq!(log.count(|c| matches!(c, DummyCommand::DestroyShader { .. })), 2);
        assert_eq!(log.count(|c| matches!(c, DummyCommand::DestroySampler { .. })), 1);
    }

    #[test]
    fn test_failed_static_binding_destroys_pipeline() {
        let (mut backend, mut cache) = setup(DummyBackendOptions::default());
        let log = backend.command_log();
        let buffer = constants(&mut backend);
        let settings = PipelineSettings::fullscreen("fullscreen.vert", "tint.frag")
            .with_static_uniform(
                ShaderStages::FRAGMENT,
                "DoesNotExist",
                BoundResource::Buffer(buffer),
            );

        cache
            .create_pipeline(&mut backend, DeviceFeatures::all(), "Tint", &settings)
            .unwrap_err();

        let created = log
            .snapshot()
            .into_iter()
            .find_map(|c| match c {
                DummyCommand::CreatePipeline { pipeline, .. } => Some(pipeline),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            log.count(|c| matches!(c, DummyCommand::DestroyPipeline { pipeline } if *pipeline == created)),
            1
        );
    }
}
