//! # Cinder Graphics
//!
//! The resource-binding and pipeline-orchestration core of the Cinder renderer.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`ResourceHandleTable`] - Bindless slot allocation with frame-delayed reuse
//! - [`BarrierQueue`] - Deferred, batched resource state transitions
//! - [`PipelineCache`] - Shader, sampler, pipeline and binding caches
//! - [`RenderPluginChain`] - Ordered render features with a fixed lifecycle
//! - [`FrameOrchestrator`] - Per-frame driver with intro playback
//! - [`GpuBackend`] - Trait for backends, with [`DummyBackend`] for headless use
//!
//! ## Example
//!
//! ```ignore
//! use cinder_graphics::{DrawPass, DummyBackend, FrameOrchestrator, RendererConfig};
//!
//! let mut frames = FrameOrchestrator::new(Box::new(DummyBackend::new()), RendererConfig::new())?;
//! frames.set_draw_callback(|pass, ctx| {
//!     if pass == DrawPass::Opaque {
//!         // record draws through ctx.backend_mut()
//!     }
//! });
//! frames.init()?;
//! loop {
//!     frames.update()?;
//!     frames.render()?;
//! }
//! ```

pub mod assets;
pub mod backend;
pub mod barrier;
pub mod bindless;
pub mod config;
pub mod context;
pub mod error;
pub mod frame;
pub mod pipeline;
pub mod plugin;
pub mod profiling;
pub mod shader;
pub mod types;

// Re-export main types for convenience
pub use assets::{AssetError, DirectorySource, MemorySource, SearchPaths, SourceProvider};
pub use backend::{BackendError, GpuBackend};
#[cfg(feature = "dummy")]
pub use backend::{CommandLog, DummyBackend, DummyCommand};
pub use barrier::BarrierQueue;
pub use bindless::{BindlessConfig, BindlessKind, ResourceHandleTable};
pub use config::{RendererConfig, TimeStep};
pub use context::{FallbackTextures, RenderContext, TextureSlot};
pub use error::GraphicsError;
pub use frame::{
    Camera, DrawPass, FrameOrchestrator, IntroConfig, IntroPhase, PerspectiveCamera, RenderTarget,
};
pub use pipeline::{PipelineCache, PipelineSettings};
pub use plugin::{PostProcessPlugin, RenderPlugin, RenderPluginChain};
pub use shader::{MacroSet, ShaderStage};
pub use types::{Color, DeviceFeatures, Extent2d, ResourceState};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the library version. Call once at startup.
pub fn init() {
    log::info!("Cinder Graphics v{} initialized", VERSION);
}
