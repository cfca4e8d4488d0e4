//! The render context: everything a frame needs, owned in one place.
//!
//! [`RenderContext`] owns the backend, the device description, the bindless
//! table, the barrier queue, the pipeline cache, the resource signature and
//! the fallback textures. It is handed by `&mut` to plugins and to the draw
//! callback, which makes command recording single-threaded and non-reentrant.
//!
//! A context can be built on its own for tests with [`RenderContext::standalone`].

use std::collections::HashSet;

use crate::assets::SearchPaths;
use crate::backend::{
    BindingHandle, BufferHandle, GpuBackend, PipelineHandle, ResourceRef, SamplerHandle,
    ShaderHandle, SignatureHandle, TextureHandle, TextureViewHandle,
};
use crate::barrier::BarrierQueue;
use crate::bindless::{
    BindlessConfig, BindlessKind, BindlessSlot, ResourceHandleTable, ResourceSignature,
    SignatureBinder,
};
use crate::error::GraphicsError;
use crate::pipeline::{ComputeSettings, PipelineCache, PipelineSettings};
use crate::shader::{MacroSet, ShaderStage};
use crate::types::{
    BufferDescriptor, DeviceFeatures, DeviceInfo, DeviceRequest, Extent2d, ResourceState,
    SamplerDescriptor, TextureDescriptor,
};

/// A texture registered in the bindless table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureSlot {
    pub texture: TextureHandle,
    pub view: TextureViewHandle,
    pub kind: BindlessKind,
    pub index: u32,
}

/// Textures bound wherever a material has nothing better.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackTextures {
    /// Magenta checker. Always bindless texture slot 0.
    pub missing: TextureSlot,
    /// Vertex-visible zero texture, slot 0 of the vertex array.
    pub missing_vertex: TextureSlot,
    pub white: TextureSlot,
    pub black: TextureSlot,
    /// Flat tangent-space normal.
    pub normal: TextureSlot,
}

const FALLBACK_SIZE: u32 = 2;

fn solid_pixels(rgba: [u8; 4]) -> Vec<u8> {
    let pixels = [rgba; (FALLBACK_SIZE * FALLBACK_SIZE) as usize];
    bytemuck::cast_slice(&pixels).to_vec()
}

fn checker_pixels(a: [u8; 4], b: [u8; 4]) -> Vec<u8> {
    bytemuck::cast_slice(&[a, b, b, a]).to_vec()
}

/// The render core's state.
pub struct RenderContext {
    backend: Box<dyn GpuBackend>,
    device: Option<DeviceInfo>,
    bindless_config: BindlessConfig,
    bindless: ResourceHandleTable,
    barriers: BarrierQueue,
    pipelines: PipelineCache,
    signature: Option<ResourceSignature>,
    fallbacks: Option<FallbackTextures>,
    /// Textures waiting out the frames in flight before destruction.
    retired: Vec<(u64, TextureHandle)>,
    /// Buffers created through the context, destroyed on reset.
    buffers: HashSet<BufferHandle>,
    render_size: Extent2d,
    frame: u64,
}

impl RenderContext {
    /// Create a context around `backend`. No device exists yet.
    pub fn new(
        backend: Box<dyn GpuBackend>,
        search_paths: SearchPaths,
        bindless_config: BindlessConfig,
    ) -> Self {
        Self {
            backend,
            device: None,
            bindless: ResourceHandleTable::new(bindless_config, 0),
            bindless_config,
            barriers: BarrierQueue::new(),
            pipelines: PipelineCache::new(search_paths),
            signature: None,
            fallbacks: None,
            retired: Vec::new(),
            buffers: HashSet::new(),
            render_size: Extent2d::default(),
            frame: 0,
        }
    }

    /// A context with a device created from the default request.
    pub fn standalone(
        backend: Box<dyn GpuBackend>,
        search_paths: SearchPaths,
    ) -> Result<Self, GraphicsError> {
        let mut context = Self::new(backend, search_paths, BindlessConfig::default());
        context.create_device(&DeviceRequest::default())?;
        Ok(context)
    }

    /// Create the device and size the bindless table to its limits.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::UnsupportedBackend`] if the backend refuses the request.
    pub fn create_device(&mut self, request: &DeviceRequest) -> Result<DeviceInfo, GraphicsError> {
        let info = self
            .backend
            .create_device(request)
            .map_err(|err| GraphicsError::UnsupportedBackend(err.to_string()))?;
        log::info!(
            "RenderContext: device '{}' on {} backend, features {:?}",
            info.name,
            self.backend.name(),
            info.features
        );

        self.bindless = ResourceHandleTable::new(self.bindless_config, info.max_bindless_descriptors);
        self.pipelines.initialize(self.backend.as_mut())?;
        self.device = Some(info.clone());
        Ok(info)
    }

    /// Create the device, or check that the existing one can serve `request`.
    ///
    /// A device outlives [`reset`](Self::reset), so bringing the renderer up
    /// again reuses it and only re-registers the default sampler.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::UnsupportedBackend`] if the existing device
    /// lacks a required feature.
    pub fn ensure_device(&mut self, request: &DeviceRequest) -> Result<DeviceInfo, GraphicsError> {
        let Some(info) = self.device.clone() else {
            return self.create_device(request);
        };
        let missing = request.required - info.features;
        if !missing.is_empty() {
            return Err(GraphicsError::UnsupportedBackend(format!(
                "device '{}' lacks required features {missing:?}",
                info.name
            )));
        }
        log::debug!("RenderContext: reusing device '{}'", info.name);
        self.pipelines.initialize(self.backend.as_mut())?;
        Ok(info)
    }

    pub fn device(&self) -> Option<&DeviceInfo> {
        self.device.as_ref()
    }

    /// Enabled device features. Empty before the device exists.
    pub fn features(&self) -> DeviceFeatures {
        self.device
            .as_ref()
            .map(|device| device.features)
            .unwrap_or_else(DeviceFeatures::empty)
    }

    pub fn backend(&self) -> &dyn GpuBackend {
        self.backend.as_ref()
    }

    /// The backend, for recording draw commands.
    pub fn backend_mut(&mut self) -> &mut dyn GpuBackend {
        self.backend.as_mut()
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub(crate) fn advance_frame(&mut self) {
        self.frame += 1;
    }

    pub fn render_size(&self) -> Extent2d {
        self.render_size
    }

    pub(crate) fn set_render_size(&mut self, size: Extent2d) {
        self.render_size = size;
    }

    // ---- bindless -----------------------------------------------------------

    pub fn bindless(&self) -> &ResourceHandleTable {
        &self.bindless
    }

    /// Assign a bindless slot to `view`.
    pub fn register_texture(
        &mut self,
        view: TextureViewHandle,
        kind: BindlessKind,
    ) -> Result<u32, GraphicsError> {
        let alive = self.backend.is_texture_view_alive(view);
        self.bindless.register(view, kind, alive)
    }

    /// Release the slot of `view` into quarantine.
    pub fn unregister_texture(&mut self, view: TextureViewHandle) -> Option<BindlessSlot> {
        self.bindless.unregister(view)
    }

    /// Create a texture. Initial data leaves it in the shader-resource state
    /// after the next barrier flush.
    pub fn create_texture(
        &mut self,
        descriptor: &TextureDescriptor,
        data: Option<&[u8]>,
    ) -> Result<(TextureHandle, TextureViewHandle), GraphicsError> {
        let (texture, view) = self.backend.create_texture(descriptor, data)?;
        if data.is_some() {
            self.barriers
                .enqueue(texture, ResourceState::CopyDest, ResourceState::ShaderResource);
        }
        Ok((texture, view))
    }

    /// Create a texture from `data` and register it in the bindless table.
    pub fn upload_texture(
        &mut self,
        descriptor: &TextureDescriptor,
        data: &[u8],
        kind: BindlessKind,
    ) -> Result<TextureSlot, GraphicsError> {
        let (texture, view) = self.create_texture(descriptor, Some(data))?;
        let index = match self.register_texture(view, kind) {
            Ok(index) => index,
            Err(err) => {
                self.barriers.cancel(texture);
                self.backend.destroy_texture(texture);
                return Err(err);
            }
        };
        Ok(TextureSlot {
            texture,
            view,
            kind,
            index,
        })
    }

    /// Unregister `slot` and destroy its texture once no frame in flight can use it.
    pub fn release_texture(&mut self, slot: TextureSlot) {
        self.bindless.unregister(slot.view);
        self.retire_texture(slot.texture);
    }

    /// Destroy `texture` once no frame in flight can use it.
    pub fn retire_texture(&mut self, texture: TextureHandle) {
        let due = self.frame + u64::from(self.bindless_config.frames_in_flight);
        self.retired.push((due, texture));
    }

    /// Flush pending barriers, then push bindless slot changes to the GPU.
    ///
    /// Runs once per frame before any draw.
    pub fn flush_bindless(&mut self) -> Result<(), GraphicsError> {
        self.barriers.flush(self.backend.as_mut());
        self.bindless.update(self.backend.as_mut())?;

        let frame = self.frame;
        let backend = self.backend.as_mut();
        self.retired.retain(|&(due, texture)| {
            if due <= frame {
                backend.destroy_texture(texture);
                false
            } else {
                true
            }
        });
        Ok(())
    }

    // ---- buffers & barriers -------------------------------------------------

    /// Create a buffer owned by the context. It lives until
    /// [`destroy_buffer`](Self::destroy_buffer) or shutdown.
    pub fn create_buffer(&mut self, descriptor: &BufferDescriptor) -> Result<BufferHandle, GraphicsError> {
        let buffer = self.backend.create_buffer(descriptor)?;
        self.buffers.insert(buffer);
        Ok(buffer)
    }

    /// Destroy a buffer created through the context, dropping any transition
    /// still queued for it.
    pub fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if self.buffers.remove(&buffer) {
            self.barriers.cancel(buffer);
            self.backend.destroy_buffer(buffer);
        }
    }

    pub fn write_buffer(
        &mut self,
        buffer: BufferHandle,
        offset: u64,
        data: &[u8],
    ) -> Result<(), GraphicsError> {
        Ok(self.backend.write_buffer(buffer, offset, data)?)
    }

    /// Write a GPU-visible struct at the start of `buffer`.
    pub fn write_uniform<T: bytemuck::Pod>(
        &mut self,
        buffer: BufferHandle,
        value: &T,
    ) -> Result<(), GraphicsError> {
        self.write_buffer(buffer, 0, bytemuck::bytes_of(value))
    }

    pub fn enqueue_barrier(
        &mut self,
        resource: impl Into<ResourceRef>,
        from: ResourceState,
        to: ResourceState,
    ) {
        self.barriers.enqueue(resource, from, to);
    }

    pub fn barriers(&self) -> &BarrierQueue {
        &self.barriers
    }

    pub fn barriers_mut(&mut self) -> &mut BarrierQueue {
        &mut self.barriers
    }

    // ---- pipelines ----------------------------------------------------------

    pub fn pipelines(&self) -> &PipelineCache {
        &self.pipelines
    }

    pub fn pipelines_mut(&mut self) -> &mut PipelineCache {
        &mut self.pipelines
    }

    pub fn compile_shader(
        &mut self,
        source_id: &str,
        stage: ShaderStage,
        macros: &MacroSet,
    ) -> Result<ShaderHandle, GraphicsError> {
        self.pipelines
            .compile_shader(self.backend.as_mut(), source_id, stage, macros)
    }

    pub fn create_pipeline(
        &mut self,
        name: &str,
        settings: &PipelineSettings,
    ) -> Result<PipelineHandle, GraphicsError> {
        let features = self.features();
        self.pipelines
            .create_pipeline(self.backend.as_mut(), features, name, settings)
    }

    pub fn create_compute_pipeline(
        &mut self,
        name: &str,
        settings: &ComputeSettings,
    ) -> Result<PipelineHandle, GraphicsError> {
        let features = self.features();
        self.pipelines
            .create_compute_pipeline(self.backend.as_mut(), features, name, settings)
    }

    pub fn get_pipeline(&self, name: &str) -> Option<PipelineHandle> {
        self.pipelines.get_pipeline(name)
    }

    pub fn get_bind(&self, name: &str) -> Option<BindingHandle> {
        self.pipelines.get_bind(name)
    }

    pub fn register_sampler(
        &mut self,
        id: u32,
        descriptor: &SamplerDescriptor,
    ) -> Result<SamplerHandle, GraphicsError> {
        self.pipelines
            .register_sampler(self.backend.as_mut(), id, descriptor)
    }

    pub fn get_sampler(&self, id: u32) -> Option<SamplerHandle> {
        self.pipelines.get_sampler(id)
    }

    // ---- signature & fallbacks ----------------------------------------------

    pub fn signature(&self) -> Option<&ResourceSignature> {
        self.signature.as_ref()
    }

    /// Handle of the shared signature, for bindless-path pipelines.
    pub fn signature_handle(&self) -> Option<SignatureHandle> {
        self.signature.as_ref().map(ResourceSignature::handle)
    }

    pub(crate) fn set_signature(&mut self, signature: ResourceSignature) {
        self.signature = Some(signature);
    }

    /// Split borrow of the signature and the backend, for binders.
    pub(crate) fn signature_and_backend(
        &mut self,
    ) -> Option<(&mut ResourceSignature, &mut dyn GpuBackend)> {
        let signature = self.signature.as_mut()?;
        Some((signature, self.backend.as_mut()))
    }

    /// Binder for the mutable variables of the shared signature.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::NotInitialized`] before the signature exists.
    pub fn mutable_binder(&mut self) -> Result<SignatureBinder<'_>, GraphicsError> {
        let signature = self.signature.as_ref().ok_or(GraphicsError::NotInitialized)?;
        signature.mutable_binder(self.backend.as_mut())
    }

    pub fn fallbacks(&self) -> Option<&FallbackTextures> {
        self.fallbacks.as_ref()
    }

    /// Create and register the fallback textures. `missing` is registered
    /// first so it takes texture slot 0.
    pub fn create_fallback_textures(&mut self) -> Result<&FallbackTextures, GraphicsError> {
        let descriptor = |label: &str| {
            TextureDescriptor::sampled_rgba8(FALLBACK_SIZE, FALLBACK_SIZE).with_label(label)
        };

        let missing = self.upload_texture(
            &descriptor("Missing"),
            &checker_pixels([255, 0, 255, 255], [0, 0, 0, 255]),
            BindlessKind::Texture,
        )?;
        let missing_vertex = self.upload_texture(
            &descriptor("Missing vertex"),
            &solid_pixels([0, 0, 0, 0]),
            BindlessKind::VertexTexture,
        )?;
        let white = self.upload_texture(
            &descriptor("White"),
            &solid_pixels([255, 255, 255, 255]),
            BindlessKind::Texture,
        )?;
        let black = self.upload_texture(
            &descriptor("Black"),
            &solid_pixels([0, 0, 0, 255]),
            BindlessKind::Texture,
        )?;
        let normal = self.upload_texture(
            &descriptor("Normal"),
            &solid_pixels([0x7f, 0x7f, 0xff, 255]),
            BindlessKind::Texture,
        )?;

        log::debug!("RenderContext: fallback textures ready, missing at slot {}", missing.index);
        Ok(self.fallbacks.insert(FallbackTextures {
            missing,
            missing_vertex,
            white,
            black,
            normal,
        }))
    }

    /// Destroy everything the context created and drop every cache and
    /// GPU-side table. The device stays alive.
    pub(crate) fn reset(&mut self) {
        self.barriers.clear();
        for (_, texture) in self.retired.drain(..) {
            self.backend.destroy_texture(texture);
        }
        if let Some(fallbacks) = self.fallbacks.take() {
            for slot in [
                fallbacks.missing,
                fallbacks.missing_vertex,
                fallbacks.white,
                fallbacks.black,
                fallbacks.normal,
            ] {
                self.backend.destroy_texture(slot.texture);
            }
        }
        for buffer in self.buffers.drain() {
            self.backend.destroy_buffer(buffer);
        }
        let limit = self
            .device
            .as_ref()
            .map(|device| device.max_bindless_descriptors)
            .unwrap_or(0);
        self.bindless = ResourceHandleTable::new(self.bindless_config, limit);
        self.pipelines.clear(self.backend.as_mut());
        if let Some(signature) = self.signature.take() {
            signature.destroy(self.backend.as_mut());
        }
        self.frame = 0;
    }
}

impl std::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("backend", &self.backend.name())
            .field("device", &self.device)
            .field("frame", &self.frame)
            .field("render_size", &self.render_size)
            .field("pending_barriers", &self.barriers.len())
            .finish_non_exhaustive()
    }
}

static_assertions::assert_impl_all!(RenderContext: Send);
