//! GPU backend abstraction layer.
//!
//! Everything above this module is backend-agnostic: the render core talks to
//! the device, the swapchain and the command context exclusively through the
//! [`GpuBackend`] trait.
//!
//! # Available Backends
//!
//! - `dummy` (default): records every call into a [`CommandLog`] without
//!   touching a GPU. Used by tests, benchmarks and the headless demo.
//!
//! # Architecture
//!
//! A backend is owned by the [`RenderContext`](crate::RenderContext) as a
//! `Box<dyn GpuBackend>` and is only ever reached through `&mut`, so command
//! recording is single-threaded and non-reentrant by construction.
//!
//! Each backend provides:
//! - Device and swapchain creation
//! - Resource creation and destruction (textures, buffers, samplers, shaders, pipelines)
//! - Resource signatures and binding objects
//! - Bindless array writes and batched state transitions
//! - Per-frame command recording and presentation

#[cfg(feature = "dummy")]
pub mod dummy;
mod error;
mod handles;

pub use error::BackendError;
pub use handles::{
    BindingHandle, BufferHandle, PipelineHandle, ResourceRef, SamplerHandle, ShaderHandle,
    SignatureHandle, TextureHandle, TextureViewHandle,
};

#[cfg(feature = "dummy")]
pub use dummy::{CommandLog, DummyBackend, DummyBackendOptions, DummyCommand};

use crate::bindless::{BindlessKind, SignatureDescriptor};
use crate::pipeline::{ComputeSettings, PipelineSettings};
use crate::shader::{ShaderStage, ShaderStages};
use crate::types::{
    BufferDescriptor, Color, DeviceInfo, DeviceRequest, Extent2d, ResourceState,
    SamplerDescriptor, ScreenRect, TextureDescriptor,
};

/// A validated shader module ready for backend compilation.
#[derive(Debug, Clone, Copy)]
pub struct ShaderDescriptor<'a> {
    /// Cache label, `source_id` plus a macro hash.
    pub label: &'a str,
    pub stage: ShaderStage,
    pub module: &'a naga::Module,
}

/// An immutable sampler resolved to a live sampler object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImmutableSamplerBinding {
    pub stages: ShaderStages,
    pub name: String,
    pub sampler: SamplerHandle,
}

/// Everything needed to create a graphics pipeline.
#[derive(Debug, Clone, Copy)]
pub struct PipelineDescriptor<'a> {
    pub label: &'a str,
    pub vertex: ShaderHandle,
    pub fragment: ShaderHandle,
    pub settings: &'a PipelineSettings,
    pub immutable_samplers: &'a [ImmutableSamplerBinding],
    /// Present on the bindless path only.
    pub signature: Option<SignatureHandle>,
}

/// Everything needed to create a compute pipeline.
#[derive(Debug, Clone, Copy)]
pub struct ComputePipelineDescriptor<'a> {
    pub label: &'a str,
    pub shader: ShaderHandle,
    pub settings: &'a ComputeSettings,
    pub immutable_samplers: &'a [ImmutableSamplerBinding],
    pub signature: Option<SignatureHandle>,
}

/// Owner of static shader variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindTarget {
    Pipeline(PipelineHandle),
    Signature(SignatureHandle),
}

/// A resource bound to a named shader variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundResource {
    Buffer(BufferHandle),
    TextureView(TextureViewHandle),
    Sampler(SamplerHandle),
}

/// One resource state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateTransition {
    pub resource: ResourceRef,
    pub from: ResourceState,
    pub to: ResourceState,
}

/// One slot write into a shader-visible bindless array.
///
/// `view: None` clears the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindlessWrite {
    pub index: u32,
    pub view: Option<TextureViewHandle>,
}

/// A screen-space quad drawn on the backbuffer during the overlay pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayQuad {
    pub rect: ScreenRect,
    pub color: Color,
    /// Bindless texture slot sampled by the quad.
    pub texture: Option<u32>,
}

/// Trait implemented by every GPU backend.
///
/// Creation calls return handles; recording calls append to the current
/// frame's command stream. All methods are called from the render thread.
pub trait GpuBackend: Send {
    /// Get the backend name.
    fn name(&self) -> &str;

    // ---- device -------------------------------------------------------------

    /// Create the device, enabling `request.required` plus any supported optional features.
    fn create_device(&mut self, request: &DeviceRequest) -> Result<DeviceInfo, BackendError>;

    fn create_swapchain(&mut self, size: Extent2d, vsync: bool) -> Result<(), BackendError>;

    fn resize_swapchain(&mut self, size: Extent2d) -> Result<(), BackendError>;

    // ---- resources ----------------------------------------------------------

    /// Create a texture and its default shader view, optionally filled with `data`.
    fn create_texture(
        &mut self,
        descriptor: &TextureDescriptor,
        data: Option<&[u8]>,
    ) -> Result<(TextureHandle, TextureViewHandle), BackendError>;

    fn destroy_texture(&mut self, texture: TextureHandle);

    /// Returns true if `view` belongs to a live texture.
    fn is_texture_view_alive(&self, view: TextureViewHandle) -> bool;

    fn create_buffer(&mut self, descriptor: &BufferDescriptor) -> Result<BufferHandle, BackendError>;

    fn destroy_buffer(&mut self, buffer: BufferHandle);

    fn write_buffer(
        &mut self,
        buffer: BufferHandle,
        offset: u64,
        data: &[u8],
    ) -> Result<(), BackendError>;

    fn create_sampler(&mut self, descriptor: &SamplerDescriptor)
    -> Result<SamplerHandle, BackendError>;

    fn destroy_sampler(&mut self, sampler: SamplerHandle);

    fn create_shader(&mut self, descriptor: &ShaderDescriptor<'_>)
    -> Result<ShaderHandle, BackendError>;

    fn destroy_shader(&mut self, shader: ShaderHandle);

    fn create_pipeline(
        &mut self,
        descriptor: &PipelineDescriptor<'_>,
    ) -> Result<PipelineHandle, BackendError>;

    fn create_compute_pipeline(
        &mut self,
        descriptor: &ComputePipelineDescriptor<'_>,
    ) -> Result<PipelineHandle, BackendError>;

    /// Destroy a graphics or compute pipeline.
    fn destroy_pipeline(&mut self, pipeline: PipelineHandle);

    // ---- binding ------------------------------------------------------------

    fn create_signature(
        &mut self,
        descriptor: &SignatureDescriptor,
    ) -> Result<SignatureHandle, BackendError>;

    fn destroy_signature(&mut self, signature: SignatureHandle);

    /// Bind a resource to a static variable of a pipeline or signature.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::VariableNotFound`] if no shader of the target
    /// declares a variable called `name`.
    fn set_static_variable(
        &mut self,
        target: BindTarget,
        stages: ShaderStages,
        name: &str,
        resource: BoundResource,
    ) -> Result<(), BackendError>;

    /// Create a binding object for the mutable and dynamic variables of `target`.
    fn create_binding(&mut self, target: BindTarget) -> Result<BindingHandle, BackendError>;

    fn destroy_binding(&mut self, binding: BindingHandle);

    fn set_mutable_variable(
        &mut self,
        binding: BindingHandle,
        stages: ShaderStages,
        name: &str,
        resource: BoundResource,
    ) -> Result<(), BackendError>;

    /// Reallocate the shader-visible array for `kind` to hold `capacity` slots.
    fn resize_bindless(&mut self, kind: BindlessKind, capacity: u32) -> Result<(), BackendError>;

    fn write_bindless(&mut self, kind: BindlessKind, writes: &[BindlessWrite]);

    // ---- recording ----------------------------------------------------------

    /// Execute a batch of state transitions as one operation.
    fn transition(&mut self, transitions: &[StateTransition]);

    fn clear_backbuffer(&mut self, color: Color);

    fn commit_binding(&mut self, binding: BindingHandle);

    fn begin_render_target(
        &mut self,
        color: TextureViewHandle,
        depth: Option<TextureViewHandle>,
        clear: Option<Color>,
    );

    fn end_render_target(&mut self);

    fn set_pipeline(&mut self, pipeline: PipelineHandle);

    fn draw(&mut self, vertex_count: u32, instance_count: u32);

    fn draw_quad(&mut self, quad: &OverlayQuad);

    /// Copy `source` onto the backbuffer.
    fn composite(&mut self, source: TextureViewHandle);

    fn present(&mut self, vsync: bool) -> Result<(), BackendError>;
}
