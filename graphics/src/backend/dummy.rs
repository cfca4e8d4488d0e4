//! Dummy GPU backend for testing and development.
//!
//! This backend doesn't perform actual GPU operations. Every call is appended
//! to a shared [`CommandLog`] so tests can assert on exactly what the render
//! core asked the GPU to do, and in which order.
//!
//! It still validates what a real backend would validate: required device
//! features, the bindless descriptor limit, live texture views and the shader
//! variables a static binding refers to (taken from the naga module's globals).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::bindless::{BindlessKind, SignatureDescriptor};
use crate::shader::{ShaderStage, ShaderStages};
use crate::types::{
    BufferDescriptor, Color, DeviceFeatures, DeviceInfo, DeviceRequest, Extent2d,
    SamplerDescriptor, TextureDescriptor,
};

use super::{
    BackendError, BindTarget, BindingHandle, BindlessWrite, BoundResource, BufferHandle,
    ComputePipelineDescriptor, GpuBackend, OverlayQuad, PipelineDescriptor, PipelineHandle,
    SamplerHandle, ShaderDescriptor, ShaderHandle, SignatureHandle, StateTransition,
    TextureHandle, TextureViewHandle,
};

/// A call recorded by the [`DummyBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum DummyCommand {
    CreateDevice { features: DeviceFeatures },
    CreateSwapchain { size: Extent2d, vsync: bool },
    ResizeSwapchain { size: Extent2d },
    CreateTexture { texture: TextureHandle, label: Option<String> },
    DestroyTexture { texture: TextureHandle },
    CreateBuffer { buffer: BufferHandle, label: Option<String> },
    DestroyBuffer { buffer: BufferHandle },
    WriteBuffer { buffer: BufferHandle, len: usize },
    CreateSampler { sampler: SamplerHandle, packed_id: u32 },
    DestroySampler { sampler: SamplerHandle },
    CreateShader { shader: ShaderHandle, label: String, stage: ShaderStage },
    DestroyShader { shader: ShaderHandle },
    CreatePipeline { pipeline: PipelineHandle, label: String },
    DestroyPipeline { pipeline: PipelineHandle },
    CreateSignature { signature: SignatureHandle, entries: usize },
    DestroySignature { signature: SignatureHandle },
    SetStaticVariable { target: BindTarget, name: String },
    CreateBinding { binding: BindingHandle, target: BindTarget },
    DestroyBinding { binding: BindingHandle },
    SetMutableVariable { binding: BindingHandle, name: String },
    ResizeBindless { kind: BindlessKind, capacity: u32 },
    WriteBindless { kind: BindlessKind, writes: Vec<BindlessWrite> },
    Transition(Vec<StateTransition>),
    ClearBackbuffer(Color),
    CommitBinding(BindingHandle),
    BeginRenderTarget { color: TextureViewHandle, clear: bool },
    EndRenderTarget,
    SetPipeline(PipelineHandle),
    Draw { vertex_count: u32, instance_count: u32 },
    DrawQuad(OverlayQuad),
    Composite(TextureViewHandle),
    Present { vsync: bool },
}

/// Shared, clonable view of everything a [`DummyBackend`] recorded.
#[derive(Debug, Clone, Default)]
pub struct CommandLog(Arc<Mutex<Vec<DummyCommand>>>);

impl CommandLog {
    fn push(&self, command: DummyCommand) {
        self.0.lock().push(command);
    }

    /// Copy of the recorded commands.
    pub fn snapshot(&self) -> Vec<DummyCommand> {
        self.0.lock().clone()
    }

    /// Take the recorded commands, leaving the log empty.
    pub fn drain(&self) -> Vec<DummyCommand> {
        std::mem::take(&mut *self.0.lock())
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    /// Number of recorded commands matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&DummyCommand) -> bool) -> usize {
        self.0.lock().iter().filter(|c| predicate(c)).count()
    }
}

/// Knobs for failure injection and device limits.
#[derive(Debug, Clone)]
pub struct DummyBackendOptions {
    /// Name reported in [`DeviceInfo`].
    pub adapter_name: String,
    /// Features the fake adapter supports.
    pub supported_features: DeviceFeatures,
    /// Hard limit on descriptors per bindless array.
    pub max_bindless_descriptors: u32,
    /// Make `create_device` fail.
    pub fail_device: bool,
    /// Pipeline labels whose creation fails.
    pub failing_pipelines: HashSet<String>,
}

impl Default for DummyBackendOptions {
    fn default() -> Self {
        Self {
            adapter_name: "Dummy Adapter".into(),
            supported_features: DeviceFeatures::all(),
            max_bindless_descriptors: 4096,
            fail_device: false,
            failing_pipelines: HashSet::new(),
        }
    }
}

impl DummyBackendOptions {
    pub fn with_supported_features(mut self, features: DeviceFeatures) -> Self {
        self.supported_features = features;
        self
    }

    pub fn with_max_bindless_descriptors(mut self, limit: u32) -> Self {
        self.max_bindless_descriptors = limit;
        self
    }

    pub fn with_failing_device(mut self) -> Self {
        self.fail_device = true;
        self
    }

    pub fn with_failing_pipeline(mut self, label: impl Into<String>) -> Self {
        self.failing_pipelines.insert(label.into());
        self
    }
}

/// Dummy GPU backend.
#[derive(Debug)]
pub struct DummyBackend {
    options: DummyBackendOptions,
    log: CommandLog,
    next_id: u64,
    device_created: bool,
    textures: HashMap<TextureHandle, TextureViewHandle>,
    live_views: HashSet<TextureViewHandle>,
    shader_symbols: HashMap<ShaderHandle, HashSet<String>>,
    pipeline_symbols: HashMap<PipelineHandle, HashSet<String>>,
    signature_symbols: HashMap<SignatureHandle, HashSet<String>>,
    bindings: HashMap<BindingHandle, BindTarget>,
    buffers: HashMap<BufferHandle, u64>,
    samplers: HashSet<SamplerHandle>,
}

impl DummyBackend {
    /// Create a new dummy backend with default options.
    pub fn new() -> Self {
        Self::with_options(DummyBackendOptions::default())
    }

    pub fn with_options(options: DummyBackendOptions) -> Self {
        Self {
            options,
            log: CommandLog::default(),
            next_id: 0,
            device_created: false,
            textures: HashMap::new(),
            live_views: HashSet::new(),
            shader_symbols: HashMap::new(),
            pipeline_symbols: HashMap::new(),
            signature_symbols: HashMap::new(),
            bindings: HashMap::new(),
            buffers: HashMap::new(),
            samplers: HashSet::new(),
        }
    }

    /// Handle to the command log. Stays valid after the backend is boxed.
    pub fn command_log(&self) -> CommandLog {
        self.log.clone()
    }

    fn next_raw(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn require_device(&self) -> Result<(), BackendError> {
        if self.device_created {
            Ok(())
        } else {
            Err(BackendError::InitializationFailed(
                "device has not been created".into(),
            ))
        }
    }

    fn symbols_for(&self, target: BindTarget) -> Result<&HashSet<String>, BackendError> {
        match target {
            BindTarget::Pipeline(pipeline) => self
                .pipeline_symbols
                .get(&pipeline)
                .ok_or_else(|| BackendError::UnknownHandle(format!("{pipeline:?}"))),
            BindTarget::Signature(signature) => self
                .signature_symbols
                .get(&signature)
                .ok_or_else(|| BackendError::UnknownHandle(format!("{signature:?}"))),
        }
    }

    fn shader_symbols(&self, shader: ShaderHandle) -> Result<&HashSet<String>, BackendError> {
        self.shader_symbols
            .get(&shader)
            .ok_or_else(|| BackendError::UnknownHandle(format!("{shader:?}")))
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Names a static binding may refer to: global variable names plus the type
/// names of their blocks.
fn module_symbols(module: &naga::Module) -> HashSet<String> {
    let mut symbols = HashSet::new();
    for (_, global) in module.global_variables.iter() {
        if let Some(name) = &global.name {
            symbols.insert(name.clone());
        }
        if let Some(name) = &module.types[global.ty].name {
            symbols.insert(name.clone());
        }
    }
    symbols
}

impl GpuBackend for DummyBackend {
    fn name(&self) -> &str {
        "Dummy"
    }

    fn create_device(&mut self, request: &DeviceRequest) -> Result<DeviceInfo, BackendError> {
        if self.options.fail_device {
            return Err(BackendError::InitializationFailed(
                "dummy device creation disabled".into(),
            ));
        }

        let missing = request.required - self.options.supported_features;
        if !missing.is_empty() {
            return Err(BackendError::FeatureNotSupported(format!("{missing:?}")));
        }

        let features = request.required | (request.optional & self.options.supported_features);
        log::trace!("DummyBackend: creating device with {features:?}");
        self.device_created = true;
        self.log.push(DummyCommand::CreateDevice { features });

        Ok(DeviceInfo {
            name: self.options.adapter_name.clone(),
            features,
            max_bindless_descriptors: self.options.max_bindless_descriptors,
        })
    }

    fn create_swapchain(&mut self, size: Extent2d, vsync: bool) -> Result<(), BackendError> {
        self.require_device()?;
        log::trace!(
            "DummyBackend: creating swapchain {}x{} (vsync: {vsync})",
            size.width,
            size.height
        );
        self.log.push(DummyCommand::CreateSwapchain { size, vsync });
        Ok(())
    }

    fn resize_swapchain(&mut self, size: Extent2d) -> Result<(), BackendError> {
        self.require_device()?;
        self.log.push(DummyCommand::ResizeSwapchain { size });
        Ok(())
    }

    fn create_texture(
        &mut self,
        descriptor: &TextureDescriptor,
        data: Option<&[u8]>,
    ) -> Result<(TextureHandle, TextureViewHandle), BackendError> {
        self.require_device()?;
        if descriptor.size.is_empty() {
            return Err(BackendError::ResourceCreationFailed(format!(
                "texture {:?} has zero size",
                descriptor.label
            )));
        }
        if let Some(data) = data
            && data.len() < descriptor.byte_size()
        {
            return Err(BackendError::ResourceCreationFailed(format!(
                "texture {:?} expects {} bytes of initial data, got {}",
                descriptor.label,
                descriptor.byte_size(),
                data.len()
            )));
        }

        log::trace!(
            "DummyBackend: creating texture {:?} ({}x{})",
            descriptor.label,
            descriptor.size.width,
            descriptor.size.height
        );
        let texture = TextureHandle::from_raw(self.next_raw());
        let view = TextureViewHandle::from_raw(self.next_raw());
        self.textures.insert(texture, view);
        self.live_views.insert(view);
        self.log.push(DummyCommand::CreateTexture {
            texture,
            label: descriptor.label.clone(),
        });
        Ok((texture, view))
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if let Some(view) = self.textures.remove(&texture) {
            self.live_views.remove(&view);
            self.log.push(DummyCommand::DestroyTexture { texture });
        }
    }

    fn is_texture_view_alive(&self, view: TextureViewHandle) -> bool {
        self.live_views.contains(&view)
    }

    fn create_buffer(&mut self, descriptor: &BufferDescriptor) -> Result<BufferHandle, BackendError> {
        self.require_device()?;
        log::trace!(
            "DummyBackend: creating buffer {:?} (size: {})",
            descriptor.label,
            descriptor.size
        );
        let buffer = BufferHandle::from_raw(self.next_raw());
        self.buffers.insert(buffer, descriptor.size);
        self.log.push(DummyCommand::CreateBuffer {
            buffer,
            label: descriptor.label.clone(),
        });
        Ok(buffer)
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if self.buffers.remove(&buffer).is_some() {
            self.log.push(DummyCommand::DestroyBuffer { buffer });
        }
    }

    fn write_buffer(
        &mut self,
        buffer: BufferHandle,
        offset: u64,
        data: &[u8],
    ) -> Result<(), BackendError> {
        let size = *self
            .buffers
            .get(&buffer)
            .ok_or_else(|| BackendError::UnknownHandle(format!("{buffer:?}")))?;
        let end = offset.checked_add(data.len() as u64);
        if end.is_none_or(|end| end > size) {
            return Err(BackendError::ResourceCreationFailed(format!(
                "write of {} bytes at offset {offset} overflows buffer of {size} bytes",
                data.len()
            )));
        }
        self.log.push(DummyCommand::WriteBuffer {
            buffer,
            len: data.len(),
        });
        Ok(())
    }

    fn create_sampler(
        &mut self,
        descriptor: &SamplerDescriptor,
    ) -> Result<SamplerHandle, BackendError> {
        self.require_device()?;
        log::trace!("DummyBackend: creating sampler {:?}", descriptor.label);
        let sampler = SamplerHandle::from_raw(self.next_raw());
        self.samplers.insert(sampler);
        self.log.push(DummyCommand::CreateSampler {
            sampler,
            packed_id: descriptor.packed_id(),
        });
        Ok(sampler)
    }

    fn destroy_sampler(&mut self, sampler: SamplerHandle) {
        if self.samplers.remove(&sampler) {
            self.log.push(DummyCommand::DestroySampler { sampler });
        }
    }

    fn create_shader(
        &mut self,
        descriptor: &ShaderDescriptor<'_>,
    ) -> Result<ShaderHandle, BackendError> {
        self.require_device()?;
        let shader = ShaderHandle::from_raw(self.next_raw());
        self.shader_symbols
            .insert(shader, module_symbols(descriptor.module));
        self.log.push(DummyCommand::CreateShader {
            shader,
            label: descriptor.label.to_string(),
            stage: descriptor.stage,
        });
        Ok(shader)
    }

    fn destroy_shader(&mut self, shader: ShaderHandle) {
        if self.shader_symbols.remove(&shader).is_some() {
            self.log.push(DummyCommand::DestroyShader { shader });
        }
    }

    fn create_pipeline(
        &mut self,
        descriptor: &PipelineDescriptor<'_>,
    ) -> Result<PipelineHandle, BackendError> {
        self.require_device()?;
        if self.options.failing_pipelines.contains(descriptor.label) {
            return Err(BackendError::ResourceCreationFailed(format!(
                "dummy pipeline '{}' rejected",
                descriptor.label
            )));
        }

        let mut symbols = self.shader_symbols(descriptor.vertex)?.clone();
        symbols.extend(self.shader_symbols(descriptor.fragment)?.iter().cloned());

        let pipeline = PipelineHandle::from_raw(self.next_raw());
        self.pipeline_symbols.insert(pipeline, symbols);
        self.log.push(DummyCommand::CreatePipeline {
            pipeline,
            label: descriptor.label.to_string(),
        });
        Ok(pipeline)
    }

    fn create_compute_pipeline(
        &mut self,
        descriptor: &ComputePipelineDescriptor<'_>,
    ) -> Result<PipelineHandle, BackendError> {
        self.require_device()?;
        if self.options.failing_pipelines.contains(descriptor.label) {
            return Err(BackendError::ResourceCreationFailed(format!(
                "dummy pipeline '{}' rejected",
                descriptor.label
            )));
        }

        let symbols = self.shader_symbols(descriptor.shader)?.clone();
        let pipeline = PipelineHandle::from_raw(self.next_raw());
        self.pipeline_symbols.insert(pipeline, symbols);
        self.log.push(DummyCommand::CreatePipeline {
            pipeline,
            label: descriptor.label.to_string(),
        });
        Ok(pipeline)
    }

    fn destroy_pipeline(&mut self, pipeline: PipelineHandle) {
        if self.pipeline_symbols.remove(&pipeline).is_some() {
            self.log.push(DummyCommand::DestroyPipeline { pipeline });
        }
    }

    fn create_signature(
        &mut self,
        descriptor: &SignatureDescriptor,
    ) -> Result<SignatureHandle, BackendError> {
        self.require_device()?;
        let signature = SignatureHandle::from_raw(self.next_raw());
        let symbols = descriptor
            .entries
            .iter()
            .map(|entry| entry.name.clone())
            .chain(descriptor.immutable_samplers.iter().map(|s| s.name.clone()))
            .collect();
        self.signature_symbols.insert(signature, symbols);
        self.log.push(DummyCommand::CreateSignature {
            signature,
            entries: descriptor.entries.len(),
        });
        Ok(signature)
    }

    fn destroy_signature(&mut self, signature: SignatureHandle) {
        if self.signature_symbols.remove(&signature).is_some() {
            self.log.push(DummyCommand::DestroySignature { signature });
        }
    }

    fn set_static_variable(
        &mut self,
        target: BindTarget,
        _stages: ShaderStages,
        name: &str,
        _resource: BoundResource,
    ) -> Result<(), BackendError> {
        if !self.symbols_for(target)?.contains(name) {
            return Err(BackendError::VariableNotFound(name.to_string()));
        }
        self.log.push(DummyCommand::SetStaticVariable {
            target,
            name: name.to_string(),
        });
        Ok(())
    }

    fn create_binding(&mut self, target: BindTarget) -> Result<BindingHandle, BackendError> {
        self.symbols_for(target)?;
        let binding = BindingHandle::from_raw(self.next_raw());
        self.bindings.insert(binding, target);
        self.log
            .push(DummyCommand::CreateBinding { binding, target });
        Ok(binding)
    }

    fn destroy_binding(&mut self, binding: BindingHandle) {
        if self.bindings.remove(&binding).is_some() {
            self.log.push(DummyCommand::DestroyBinding { binding });
        }
    }

    fn set_mutable_variable(
        &mut self,
        binding: BindingHandle,
        _stages: ShaderStages,
        name: &str,
        _resource: BoundResource,
    ) -> Result<(), BackendError> {
        let target = *self
            .bindings
            .get(&binding)
            .ok_or_else(|| BackendError::UnknownHandle(format!("{binding:?}")))?;
        if !self.symbols_for(target)?.contains(name) {
            return Err(BackendError::VariableNotFound(name.to_string()));
        }
        self.log.push(DummyCommand::SetMutableVariable {
            binding,
            name: name.to_string(),
        });
        Ok(())
    }

    fn resize_bindless(&mut self, kind: BindlessKind, capacity: u32) -> Result<(), BackendError> {
        if capacity > self.options.max_bindless_descriptors {
            return Err(BackendError::ResourceCreationFailed(format!(
                "bindless {kind:?} capacity {capacity} exceeds device limit {}",
                self.options.max_bindless_descriptors
            )));
        }
        self.log
            .push(DummyCommand::ResizeBindless { kind, capacity });
        Ok(())
    }

    fn write_bindless(&mut self, kind: BindlessKind, writes: &[BindlessWrite]) {
        self.log.push(DummyCommand::WriteBindless {
            kind,
            writes: writes.to_vec(),
        });
    }

    fn transition(&mut self, transitions: &[StateTransition]) {
        self.log
            .push(DummyCommand::Transition(transitions.to_vec()));
    }

    fn clear_backbuffer(&mut self, color: Color) {
        self.log.push(DummyCommand::ClearBackbuffer(color));
    }

    fn commit_binding(&mut self, binding: BindingHandle) {
        self.log.push(DummyCommand::CommitBinding(binding));
    }

    fn begin_render_target(
        &mut self,
        color: TextureViewHandle,
        _depth: Option<TextureViewHandle>,
        clear: Option<Color>,
    ) {
        self.log.push(DummyCommand::BeginRenderTarget {
            color,
            clear: clear.is_some(),
        });
    }

    fn end_render_target(&mut self) {
        self.log.push(DummyCommand::EndRenderTarget);
    }

    fn set_pipeline(&mut self, pipeline: PipelineHandle) {
        self.log.push(DummyCommand::SetPipeline(pipeline));
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32) {
        self.log.push(DummyCommand::Draw {
            vertex_count,
            instance_count,
        });
    }

    fn draw_quad(&mut self, quad: &OverlayQuad) {
        self.log.push(DummyCommand::DrawQuad(*quad));
    }

    fn composite(&mut self, source: TextureViewHandle) {
        self.log.push(DummyCommand::Composite(source));
    }

    fn present(&mut self, vsync: bool) -> Result<(), BackendError> {
        self.require_device()?;
        self.log.push(DummyCommand::Present { vsync });
        Ok(())
    }
}

static_assertions::assert_impl_all!(DummyBackend: Send);
static_assertions::assert_impl_all!(CommandLog: Send, Sync, Clone);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TextureFormat;
    use crate::types::TextureUsage;

    fn ready_backend() -> DummyBackend {
        let mut backend = DummyBackend::new();
        backend
            .create_device(&DeviceRequest::default())
            .expect("device");
        backend
    }

    #[test]
    fn test_dummy_backend_name() {
        assert_eq!(DummyBackend::new().name(), "Dummy");
    }

    #[test]
    fn test_missing_required_feature_rejected() {
        let mut backend = DummyBackend::with_options(
            DummyBackendOptions::default()
                .with_supported_features(DeviceFeatures::BINDLESS_RESOURCES),
        );
        let result = backend.create_device(&DeviceRequest::default());
        assert!(matches!(result, Err(BackendError::FeatureNotSupported(_))));
    }

    #[test]
    fn test_optional_features_only_when_supported() {
        let mut backend = DummyBackend::with_options(
            DummyBackendOptions::default().with_supported_features(DeviceFeatures::default()),
        );
        let mut request = DeviceRequest::default();
        request.request(DeviceFeatures::COMPUTE_SHADERS);
        let info = backend.create_device(&request).expect("device");
        assert_eq!(info.features, DeviceFeatures::default());
    }

    #[test]
    fn test_texture_view_lifetime() {
        let mut backend = ready_backend();
        let desc = TextureDescriptor::new_2d(
            4,
            4,
            TextureFormat::Rgba8Unorm,
            TextureUsage::TEXTURE_BINDING,
        );
        let (texture, view) = backend.create_texture(&desc, None).expect("texture");
        assert!(backend.is_texture_view_alive(view));

        backend.destroy_texture(texture);
        assert!(!backend.is_texture_view_alive(view));
    }

    #[test]
    fn test_buffer_write_at_huge_offset_rejected() {
        let mut backend = ready_backend();
        let buffer = backend
            .create_buffer(&BufferDescriptor::new(16, Default::default()))
            .expect("buffer");
        assert!(backend.write_buffer(buffer, 8, &[0u8; 8]).is_ok());
        assert!(matches!(
            backend.write_buffer(buffer, u64::MAX, &[0u8; 4]),
            Err(BackendError::ResourceCreationFailed(_))
        ));
    }

    #[test]
    fn test_destroy_is_logged_once() {
        let mut backend = ready_backend();
        let log = backend.command_log();
        let buffer = backend
            .create_buffer(&BufferDescriptor::new(16, Default::default()))
            .expect("buffer");
        backend.destroy_buffer(buffer);
        backend.destroy_buffer(buffer);

        assert_eq!(
            log.count(|c| matches!(c, DummyCommand::DestroyBuffer { .. })),
            1
        );
        assert!(matches!(
            backend.write_buffer(buffer, 0, &[0u8; 4]),
            Err(BackendError::UnknownHandle(_))
        ));
    }

    #[test]
    fn test_short_initial_data_rejected() {
        let mut backend = ready_backend();
        let desc = TextureDescriptor::sampled_rgba8(2, 2);
        let result = backend.create_texture(&desc, Some(&[0u8; 4]));
        assert!(matches!(
            result,
            Err(BackendError::ResourceCreationFailed(_))
        ));
    }

    #[test]
    fn test_command_log_is_shared() {
        let mut backend = ready_backend();
        let log = backend.command_log();
        log.clear();

        backend.clear_backbuffer(Color::BLACK);
        backend.present(true).expect("present");

        assert_eq!(
            log.snapshot(),
            vec![
                DummyCommand::ClearBackbuffer(Color::BLACK),
                DummyCommand::Present { vsync: true },
            ]
        );
    }
}
