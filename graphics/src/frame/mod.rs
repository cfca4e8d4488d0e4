//! Frame orchestration.
//!
//! [`FrameOrchestrator`] drives one frame at a time through a fixed sequence:
//!
//! | Step | `render()`                                              |
//! |------|---------------------------------------------------------|
//! | 1    | clear the backbuffer                                    |
//! | 2    | write the camera constants                              |
//! | 3    | flush barriers, then update the bindless table          |
//! | 4    | plugin `pre_render`                                     |
//! | 5    | commit the signature binding                            |
//! | 6    | opaque pass into the offscreen target                   |
//! | 7    | plugin `post_render`                                    |
//! | 8    | composite the target onto the backbuffer                |
//! | 9    | overlay pass on the backbuffer                          |
//! | 10   | present, then advance the frame counter                 |
//!
//! While intros play, the overlay pass draws the intro instead of the draw
//! callback and the opaque pass records nothing.

mod camera;
mod intro;
mod media;
mod target;

pub use camera::{Camera, CameraUniform, PerspectiveCamera};
pub use intro::{IntroConfig, IntroPhase, IntroSequence};
pub use media::{DecodedMedia, MediaDecoder, MediaFrame, STILL_FRAME_DURATION, WebpDecoder};
pub use target::RenderTarget;

use std::time::{Duration, Instant};

use crate::backend::{BoundResource, BufferHandle, GpuBackend};
use crate::bindless::{ResourceSignature, SignatureBuilder, VariableKind};
use crate::config::{RendererConfig, TimeStep};
use crate::context::RenderContext;
use crate::error::GraphicsError;
use crate::plugin::{RenderPlugin, RenderPluginChain};
use crate::profiling::{frame_mark, profile_scope};
use crate::shader::ShaderStages;
use crate::types::{BufferDescriptor, Color, Extent2d, ResourceState, TextureFormat};

/// Name of the camera constant buffer in the resource signature.
pub const CAMERA_VARIABLE: &str = "Camera";
/// Bindless array of fragment-visible textures.
pub const TEXTURES_VARIABLE: &str = "g_Textures";
/// Bindless array of vertex-visible textures.
pub const VERTEX_TEXTURES_VARIABLE: &str = "g_VertexTextures";

/// Format of the offscreen target.
const TARGET_FORMAT: TextureFormat = TextureFormat::Rgba16Float;

/// The pass the draw callback is recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawPass {
    /// Scene geometry, into the offscreen target.
    Opaque,
    /// Screen-space drawing, onto the backbuffer after compositing.
    Overlay,
}

/// Records the caller's draws. Called once per pass.
pub type DrawCallback = Box<dyn FnMut(DrawPass, &mut RenderContext) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Uninitialized,
    Ready,
}

/// Drives initialization, ticking and rendering of frames.
pub struct FrameOrchestrator {
    config: RendererConfig,
    context: RenderContext,
    plugins: RenderPluginChain,
    camera: Box<dyn Camera>,
    camera_buffer: Option<BufferHandle>,
    target: Option<RenderTarget>,
    swapchain_created: bool,
    intros: IntroSequence,
    draw_callback: Option<DrawCallback>,
    state: OrchestratorState,
    /// Linear clear color, resolved at init.
    clear_color: Color,
    last_tick: Option<Instant>,
}

impl FrameOrchestrator {
    /// Create an orchestrator around `backend`. Nothing touches the device
    /// until [`init`](Self::init).
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidParameter`] if the config lists an
    /// intro that cannot be played.
    pub fn new(backend: Box<dyn GpuBackend>, config: RendererConfig) -> Result<Self, GraphicsError> {
        let context = RenderContext::new(backend, config.search_paths.clone(), config.bindless);

        let mut intros = IntroSequence::new();
        for intro in &config.intros {
            intros.add(intro.clone())?;
        }
        intros.skip(config.skip_intros);

        Ok(Self {
            context,
            plugins: RenderPluginChain::new(),
            camera: Box::new(PerspectiveCamera::default()),
            camera_buffer: None,
            target: None,
            swapchain_created: false,
            intros,
            draw_callback: None,
            state: OrchestratorState::Uninitialized,
            clear_color: config.clear_color,
            last_tick: None,
            config,
        })
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == OrchestratorState::Ready
    }

    fn ensure_ready(&self) -> Result<(), GraphicsError> {
        match self.state {
            OrchestratorState::Ready => Ok(()),
            OrchestratorState::Uninitialized => Err(GraphicsError::NotInitialized),
        }
    }

    fn ensure_uninitialized(&self, what: &str) -> Result<(), GraphicsError> {
        if self.is_ready() {
            return Err(GraphicsError::InvalidParameter(format!(
                "{what} must happen before init"
            )));
        }
        Ok(())
    }

    /// Append a plugin. Plugins must be added before [`init`](Self::init).
    pub fn add_plugin(&mut self, plugin: impl RenderPlugin) -> Result<(), GraphicsError> {
        self.ensure_uninitialized("adding a plugin")?;
        self.plugins.add(plugin)
    }

    /// Queue an intro. Intros must be added before [`init`](Self::init).
    pub fn add_intro(&mut self, intro: IntroConfig) -> Result<(), GraphicsError> {
        self.ensure_uninitialized("adding an intro")?;
        self.intros.add(intro)
    }

    pub fn skip_intros(&mut self, skip: bool) {
        self.intros.skip(skip);
    }

    pub fn set_on_intro_complete(&mut self, callback: impl FnOnce() + Send + 'static) {
        self.intros.set_on_complete(callback);
    }

    pub fn set_draw_callback(
        &mut self,
        callback: impl FnMut(DrawPass, &mut RenderContext) + Send + 'static,
    ) {
        self.draw_callback = Some(Box::new(callback));
    }

    /// Replace the camera. After init the new camera is initialized and
    /// sized immediately.
    pub fn set_camera(&mut self, mut camera: impl Camera + 'static) -> Result<(), GraphicsError> {
        if self.is_ready() {
            camera.initialize(&mut self.context)?;
            camera.resize(self.context.render_size());
        }
        self.camera = Box::new(camera);
        Ok(())
    }

    pub fn camera(&self) -> &dyn Camera {
        self.camera.as_ref()
    }

    pub fn camera_mut(&mut self) -> &mut dyn Camera {
        self.camera.as_mut()
    }

    pub fn plugins(&self) -> &RenderPluginChain {
        &self.plugins
    }

    pub fn plugins_mut(&mut self) -> &mut RenderPluginChain {
        &mut self.plugins
    }

    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut RenderContext {
        &mut self.context
    }

    pub fn intros(&self) -> &IntroSequence {
        &self.intros
    }

    pub fn render_target(&self) -> Option<&RenderTarget> {
        self.target.as_ref()
    }

    pub fn frame(&self) -> u64 {
        self.context.frame()
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Bring the renderer up. Runs once; calling it again is an error.
    ///
    /// A failure part way through destroys whatever was created, so `init`
    /// may be retried. Plugins and intros are kept.
    ///
    /// # Errors
    ///
    /// - [`GraphicsError::UnsupportedBackend`] if the device or swapchain cannot be created
    /// - any error a plugin or the camera returns from its setup hooks
    pub fn init(&mut self) -> Result<(), GraphicsError> {
        self.ensure_uninitialized("init")?;
        let size = self.config.render_size;
        log::info!(
            "FrameOrchestrator: initializing {}x{} with {} plugins",
            size.width,
            size.height,
            self.plugins.len()
        );

        if let Err(err) = self.bring_up(size) {
            log::error!("FrameOrchestrator: init failed: {err}");
            self.release_resources();
            return Err(err);
        }

        self.clear_color = self.config.clear_color.to_linear();
        self.intros.start(&self.config.search_paths);
        self.last_tick = None;
        self.state = OrchestratorState::Ready;
        log::info!("FrameOrchestrator: ready");
        Ok(())
    }

    fn bring_up(&mut self, size: Extent2d) -> Result<(), GraphicsError> {
        let mut request = self.config.device_request();
        self.plugins.requirements(&mut request)?;

        self.context.ensure_device(&request)?;
        let backend = self.context.backend_mut();
        let swapchain = if self.swapchain_created {
            backend.resize_swapchain(size)
        } else {
            backend.create_swapchain(size, self.config.vsync)
        };
        swapchain.map_err(|err| GraphicsError::UnsupportedBackend(err.to_string()))?;
        self.swapchain_created = true;
        self.context.set_render_size(size);

        self.create_signature()?;

        self.camera.initialize(&mut self.context)?;
        self.camera.resize(size);

        self.plugins.initialize(&mut self.context, size)?;
        self.context.create_fallback_textures()?;
        self.plugins.upload(&mut self.context)?;

        self.target = Some(RenderTarget::new(&mut self.context, size, TARGET_FORMAT)?);
        Ok(())
    }

    /// Build the shared signature, bind its variables and store it on the context.
    fn create_signature(&mut self) -> Result<(), GraphicsError> {
        let mut builder = SignatureBuilder::new("Cinder");
        builder
            .add_constant_buffer(ShaderStages::GRAPHICS, CAMERA_VARIABLE, VariableKind::Static)
            .add_bindless_array(ShaderStages::GRAPHICS, TEXTURES_VARIABLE)
            .add_bindless_array(ShaderStages::VERTEX, VERTEX_TEXTURES_VARIABLE);
        self.plugins.signatures(&mut builder)?;
        let descriptor = builder.build()?;

        let camera_buffer = self.context.create_buffer(
            &BufferDescriptor::constant::<CameraUniform>().with_label(CAMERA_VARIABLE),
        )?;
        self.camera_buffer = Some(camera_buffer);
        self.context.enqueue_barrier(
            camera_buffer,
            ResourceState::Undefined,
            ResourceState::ConstantBuffer,
        );

        let signature = ResourceSignature::create(self.context.backend_mut(), descriptor)?;
        self.context.set_signature(signature);
        let Some((signature, backend)) = self.context.signature_and_backend() else {
            return Err(GraphicsError::NotInitialized);
        };
        {
            let mut binder = signature.static_binder(backend);
            binder.set(CAMERA_VARIABLE, BoundResource::Buffer(camera_buffer))?;
            self.plugins.bind_static(&mut binder)?;
        }
        signature.create_binding(backend)?;
        let mut binder = signature.mutable_binder(backend)?;
        self.plugins.bind_mutable(&mut binder)
    }

    fn tick(&mut self) -> Duration {
        match self.config.time_step {
            TimeStep::Fixed(step) => step,
            TimeStep::Realtime => {
                let now = Instant::now();
                let dt = self
                    .last_tick
                    .map(|last| now.duration_since(last))
                    .unwrap_or_default();
                self.last_tick = Some(now);
                dt
            }
        }
    }

    /// Advance one tick. While intros play only the intro advances.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::NotInitialized`] before [`init`](Self::init).
    pub fn update(&mut self) -> Result<(), GraphicsError> {
        self.ensure_ready()?;
        profile_scope!("FrameOrchestrator::update");
        let dt = self.tick();

        if self.intros.is_active() {
            return self.intros.update(&mut self.context, dt);
        }

        self.camera.update(dt.as_secs_f32());
        self.plugins.update(&mut self.context)
    }

    /// Record and present one frame.
    ///
    /// # Errors
    ///
    /// - [`GraphicsError::NotInitialized`] before [`init`](Self::init)
    /// - [`GraphicsError::MissingDrawCallback`] if no draw callback is set
    pub fn render(&mut self) -> Result<(), GraphicsError> {
        self.ensure_ready()?;
        let Some(draw) = self.draw_callback.as_mut() else {
            return Err(GraphicsError::MissingDrawCallback);
        };
        let (Some(target), Some(camera_buffer)) = (self.target.as_mut(), self.camera_buffer) else {
            return Err(GraphicsError::NotInitialized);
        };
        profile_scope!("FrameOrchestrator::render");
        let ctx = &mut self.context;
        let intro_active = self.intros.is_active();

        ctx.backend_mut().clear_backbuffer(self.clear_color);
        ctx.write_uniform(camera_buffer, &self.camera.uniform())?;
        ctx.flush_bindless()?;

        self.plugins.pre_render(ctx, self.camera.as_ref())?;

        if let Some(binding) = ctx.signature().and_then(ResourceSignature::binding) {
            ctx.backend_mut().commit_binding(binding);
        }

        target.begin_record(ctx, Some(Color::TRANSPARENT))?;
        if !intro_active {
            profile_scope!("opaque_pass");
            draw(DrawPass::Opaque, &mut *ctx);
        }
        target.end_record(ctx);

        self.plugins.post_render(ctx, self.camera.as_ref(), target)?;

        ctx.backend_mut().composite(target.color_view());

        if intro_active {
            self.intros.draw(ctx);
        } else {
            profile_scope!("overlay_pass");
            draw(DrawPass::Overlay, &mut *ctx);
        }

        ctx.backend_mut().present(self.config.vsync)?;
        ctx.advance_frame();
        frame_mark!();
        log::trace!("FrameOrchestrator: presented frame {}", ctx.frame());
        Ok(())
    }

    /// Resize the swapchain, the offscreen target, the camera and the plugins.
    pub fn resize(&mut self, size: Extent2d) -> Result<(), GraphicsError> {
        self.config.render_size = size;
        if !self.is_ready() {
            return Ok(());
        }
        if size.is_empty() {
            log::debug!("FrameOrchestrator: ignoring resize to an empty surface");
            return Ok(());
        }
        log::info!("FrameOrchestrator: resizing to {}x{}", size.width, size.height);

        self.context.backend_mut().resize_swapchain(size)?;
        self.context.set_render_size(size);
        if let Some(target) = &mut self.target {
            target.resize(&mut self.context, size)?;
        }
        self.camera.resize(size);
        self.plugins.resize(&mut self.context, size)
    }

    /// Tear everything down and return to the uninitialized state. Plugins
    /// are dropped; the draw callback and camera are kept.
    pub fn shutdown(&mut self) {
        if !self.is_ready() {
            return;
        }
        log::info!("FrameOrchestrator: shutting down after {} frames", self.frame());

        if self.intros.is_active() {
            self.intros.abandon(&mut self.context);
        }
        self.plugins.clear();
        self.release_resources();
        self.state = OrchestratorState::Uninitialized;
    }

    /// Destroy the offscreen target and everything the context created.
    fn release_resources(&mut self) {
        if let Some(target) = self.target.take() {
            target.destroy(&mut self.context);
        }
        self.context.reset();
        self.camera_buffer = None;
    }
}

impl Drop for FrameOrchestrator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for FrameOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameOrchestrator")
            .field("state", &self.state)
            .field("frame", &self.frame())
            .field("plugins", &self.plugins)
            .field("intros", &self.intros)
            .field("has_draw_callback", &self.draw_callback.is_some())
            .finish_non_exhaustive()
    }
}

static_assertions::assert_impl_all!(FrameOrchestrator: Send);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CommandLog, DummyBackend, DummyCommand};

    /// Fails `upload` the given number of times, then succeeds.
    struct FlakyPlugin {
        failures: u32,
    }

    impl RenderPlugin for FlakyPlugin {
        fn id(&self) -> &str {
            "Flaky"
        }

        fn upload(&mut self, _ctx: &mut RenderContext) -> Result<(), GraphicsError> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(GraphicsError::InvalidParameter("upload refused".into()));
            }
            Ok(())
        }
    }

    /// Every created texture, buffer, sampler, shader, pipeline, signature
    /// and binding has a matching destroy.
    fn assert_nothing_alive(log: &CommandLog) {
        let count = |f: fn(&DummyCommand) -> bool| log.count(f);
        assert_eq!(
            count(|c| matches!(c, DummyCommand::CreateTexture { .. })),
            count(|c| matches!(c, DummyCommand::DestroyTexture { .. }))
        );
        assert_eq!(
            count(|c| matches!(c, DummyCommand::CreateBuffer { .. })),
            count(|c| matches!(c, DummyCommand::DestroyBuffer { .. }))
        );
        assert_eq!(
            count(|c| matches!(c, DummyCommand::CreateSampler { .. })),
            count(|c| matches!(c, DummyCommand::DestroySampler { .. }))
        );
        assert_eq!(
            count(|c| matches!(c, DummyCommand::CreateShader { .. })),
            count(|c| matches!(c, DummyCommand::DestroyShader { .. }))
        );
        assert_eq!(
            count(|c| matches!(c, DummyCommand::CreatePipeline { .. })),
            count(|c| matches!(c, DummyCommand::DestroyPipeline { .. }))
        );
        assert_eq!(
            count(|c| matches!(c, DummyCommand::CreateSignature { .. })),
            count(|c| matches!(c, DummyCommand::DestroySignature { .. }))
        );
        assert_eq!(
            count(|c| matches!(c, DummyCommand::CreateBinding { .. })),
            count(|c| matches!(c, DummyCommand::DestroyBinding { .. }))
        );
    }

    fn orchestrator() -> (FrameOrchestrator, crate::backend::CommandLog) {
        let backend = DummyBackend::new();
        let log = backend.command_log();
        let config = RendererConfig::new().with_render_size(Extent2d::new(320, 200));
        (FrameOrchestrator::new(Box::new(backend), config).unwrap(), log)
    }

    #[test]
    fn test_signature_holds_core_entries() {
        let (mut frames, _log) = orchestrator();
        frames.init().unwrap();
        let signature = frames.context().signature().unwrap();
        assert!(signature.entry(CAMERA_VARIABLE).is_some());
        assert!(signature.entry(TEXTURES_VARIABLE).is_some());
        assert!(signature.entry(VERTEX_TEXTURES_VARIABLE).is_some());
        assert!(signature.binding().is_some());
    }

    #[test]
    fn test_init_twice_rejected() {
        let (mut frames, _log) = orchestrator();
        frames.init().unwrap();
        assert!(matches!(frames.init(), Err(GraphicsError::InvalidParameter(_))));
    }

    #[test]
    fn test_render_step_order() {
        let (mut frames, log) = orchestrator();
        frames.set_draw_callback(|_, _| {});
        frames.init().unwrap();
        log.clear();

        frames.render().unwrap();
        let commands = log.snapshot();
        let position = |pred: &dyn Fn(&DummyCommand) -> bool| commands.iter().position(pred);

        let clear = position(&|c| matches!(c, DummyCommand::ClearBackbuffer(_))).unwrap();
        let camera = position(&|c| matches!(c, DummyCommand::WriteBuffer { .. })).unwrap();
        let commit = position(&|c| matches!(c, DummyCommand::CommitBinding(_))).unwrap();
        let begin = position(&|c| matches!(c, DummyCommand::BeginRenderTarget { .. })).unwrap();
        let composite = position(&|c| matches!(c, DummyCommand::Composite(_))).unwrap();
        let present = position(&|c| matches!(c, DummyCommand::Present { .. })).unwrap();

        assert!(clear < camera && camera < commit && commit < begin);
        assert!(begin < composite && composite < present);
        assert_eq!(frames.frame(), 1);
    }

    #[test]
    fn test_resize_before_init_only_records_size() {
        let (mut frames, log) = orchestrator();
        frames.resize(Extent2d::new(64, 64)).unwrap();
        assert!(log.is_empty());
        assert_eq!(frames.config().render_size, Extent2d::new(64, 64));
    }

    #[test]
    fn test_failed_init_rolls_back_and_can_retry() {
        let (mut frames, log) = orchestrator();
        frames.add_plugin(FlakyPlugin { failures: 1 }).unwrap();

        assert!(matches!(frames.init(), Err(GraphicsError::InvalidParameter(_))));
        assert_eq!(frames.state(), OrchestratorState::Uninitialized);
        assert!(frames.context().signature().is_none());
        assert_nothing_alive(&log);

        frames.init().unwrap();
        assert!(frames.is_ready());
        assert_eq!(log.count(|c| matches!(c, DummyCommand::CreateDevice { .. })), 1);
        assert_eq!(log.count(|c| matches!(c, DummyCommand::CreateSwapchain { .. })), 1);
        assert_eq!(log.count(|c| matches!(c, DummyCommand::ResizeSwapchain { .. })), 1);
        assert!(frames.context().pipelines().default_sampler().is_some());
    }

    #[test]
    fn test_shutdown_destroys_everything_created() {
        let (mut frames, log) = orchestrator();
        frames.set_draw_callback(|_, _| {});
        frames.init().unwrap();
        for _ in 0..2 {
            frames.render().unwrap();
        }
        frames.resize(Extent2d::new(128, 96)).unwrap();
        frames.render().unwrap();

        frames.shutdown();
        assert_nothing_alive(&log);
        assert_eq!(log.count(|c| matches!(c, DummyCommand::DestroySignature { .. })), 1);
    }

    #[test]
    fn test_shutdown_returns_to_uninitialized() {
        let (mut frames, _log) = orchestrator();
        frames.set_draw_callback(|_, _| {});
        frames.init().unwrap();
        frames.render().unwrap();
        frames.shutdown();

        assert_eq!(frames.state(), OrchestratorState::Uninitialized);
        assert!(matches!(frames.render(), Err(GraphicsError::NotInitialized)));
        assert!(frames.context().get_pipeline("anything").is_none());
        assert_eq!(frames.frame(), 0);
    }
}
