//! Common utilities for render core integration tests.
//!
//! Every test runs on the dummy backend with shaders and intro media served
//! from an in-memory source, so nothing touches the filesystem or a GPU.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use cinder_graphics::backend::DummyBackendOptions;
use cinder_graphics::bindless::SignatureBuilder;
use cinder_graphics::frame::IntroSequence;
use cinder_graphics::{
    Camera, CommandLog, DummyBackend, DummyCommand, Extent2d, FrameOrchestrator, GraphicsError, MemorySource,
    RenderContext, RenderPlugin, RenderTarget, RendererConfig, SearchPaths, TimeStep,
};

// ============================================================================
// Shader sources
// ============================================================================

pub const FULLSCREEN_VERT: &str = r#"#version 450
layout(location = 0) in vec2 a_position;
layout(location = 0) out vec2 v_uv;
void main() {
    v_uv = a_position * 0.5 + 0.5;
    gl_Position = vec4(a_position, 0.0, 1.0);
}
"#;

pub const TINT_FRAG: &str = r#"#version 450
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

pub const VIGNETTE_FRAG: &str = r#"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 o_color;
layout(set = 0, binding = 1) uniform PostProcessConstants {
    uint source_index;
    uint effect_index;
    uint frame;
    uint padding;
    vec4 resolution;
} u_post;
void main() {
    vec2 centered = v_uv - vec2(0.5);
    float falloff = 1.0 - dot(centered, centered) * u_post.resolution.x * u_post.resolution.z;
    o_color = vec4(vec3(falloff), 1.0);
}
"#;

pub const CLEAR_COMP: &str = r#"#version 450
layout(local_size_x = 64) in;
layout(set = 0, binding = 0) buffer Data { float values[]; } b_data;
void main() {
    b_data.values[gl_GlobalInvocationID.x] = 0.0;
}
"#;

/// A memory source holding every test shader.
pub fn shader_source() -> MemorySource {
    let source = MemorySource::new();
    source.insert_text("fullscreen.vert", FULLSCREEN_VERT);
    source.insert_text("tint.frag", TINT_FRAG);
    source.insert_text("post/vignette.frag", VIGNETTE_FRAG);
    source.insert_text("clear.comp", CLEAR_COMP);
    source
}

pub fn search_paths(source: &MemorySource) -> SearchPaths {
    let mut paths = SearchPaths::new();
    paths.push(source.clone(), "");
    paths
}

/// Encode a solid-color still WebP.
pub fn encode_webp(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let image = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, image::ImageFormat::WebP)
        .expect("encode webp");
    bytes.into_inner()
}

// ============================================================================
// Renderer harness
// ============================================================================

/// A frame orchestrator on a dummy backend plus handles to inspect it.
pub struct TestRenderer {
    pub frames: FrameOrchestrator,
    pub log: CommandLog,
    pub source: MemorySource,
}

impl TestRenderer {
    pub fn new() -> Self {
        Self::with(DummyBackendOptions::default(), |config| config)
    }

    /// Build with custom backend options and a config tweak. The config
    /// starts with the test shaders on its search paths and a fixed 500ms step.
    pub fn with(
        options: DummyBackendOptions,
        configure: impl FnOnce(RendererConfig) -> RendererConfig,
    ) -> Self {
        let backend = DummyBackend::with_options(options);
        let log = backend.command_log();
        let source = shader_source();
        let config = RendererConfig::new()
            .with_render_size(Extent2d::new(320, 240))
            .with_search_paths(search_paths(&source))
            .with_time_step(TimeStep::Fixed(Duration::from_millis(500)));
        let frames =
            FrameOrchestrator::new(Box::new(backend), configure(config)).expect("orchestrator");
        Self {
            frames,
            log,
            source,
        }
    }

    /// Call `update` until `done` holds, failing after a few seconds.
    pub fn update_until(&mut self, what: &str, done: impl Fn(&IntroSequence) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !done(self.frames.intros()) {
            assert!(Instant::now() < deadline, "timed out waiting for {what}");
            self.frames.update().expect("update");
            std::thread::sleep(Duration::from_millis(2));
        }
    }
}

// ============================================================================
// Recording plugin
// ============================================================================

/// Shared record of hook invocations, as "<id>:<hook>".
pub type HookLog = Arc<Mutex<Vec<String>>>;

/// A plugin that records every hook it receives.
pub struct RecordingPlugin {
    id: &'static str,
    hooks: HookLog,
}

impl RecordingPlugin {
    pub fn new(id: &'static str, hooks: &HookLog) -> Self {
        Self {
            id,
            hooks: Arc::clone(hooks),
        }
    }

    fn record(&self, hook: &str) {
        self.hooks.lock().push(format!("{}:{hook}", self.id));
    }
}

impl RenderPlugin for RecordingPlugin {
    fn id(&self) -> &str {
        self.id
    }

    fn signatures(&mut self, _builder: &mut SignatureBuilder) -> Result<(), GraphicsError> {
        self.record("signatures");
        Ok(())
    }

    fn initialize(&mut self, _ctx: &mut RenderContext, _size: Extent2d) -> Result<(), GraphicsError> {
        self.record("initialize");
        Ok(())
    }

    fn upload(&mut self, _ctx: &mut RenderContext) -> Result<(), GraphicsError> {
        self.record("upload");
        Ok(())
    }

    fn resize(&mut self, _ctx: &mut RenderContext, size: Extent2d) -> Result<(), GraphicsError> {
        self.record(&format!("resize {}x{}", size.width, size.height));
        Ok(())
    }

    fn update(&mut self, _ctx: &mut RenderContext) -> Result<(), GraphicsError> {
        self.record("update");
        Ok(())
    }

    fn pre_render(&mut self, _ctx: &mut RenderContext, _camera: &dyn Camera) -> Result<(), GraphicsError> {
        self.record("pre_render");
        Ok(())
    }

    fn post_render(
        &mut self,
        _ctx: &mut RenderContext,
        _camera: &dyn Camera,
        _target: &mut RenderTarget,
    ) -> Result<(), GraphicsError> {
        self.record("post_render");
        Ok(())
    }
}

/// Entries of `hooks` whose hook part equals `hook`, in order.
pub fn calls(hooks: &HookLog, hook: &str) -> Vec<String> {
    hooks
        .lock()
        .iter()
        .filter_map(|entry| {
            let (id, name) = entry.split_once(':')?;
            (name == hook).then(|| id.to_string())
        })
        .collect()
}

// ============================================================================
// Resource accounting
// ============================================================================

/// Assert every created GPU object in `log` was destroyed again.
pub fn assert_nothing_alive(log: &CommandLog) {
    let pairs: [(&str, fn(&DummyCommand) -> bool, fn(&DummyCommand) -> bool); 7] = [
        (
            "textures",
            |c| matches!(c, DummyCommand::CreateTexture { .. }),
            |c| matches!(c, DummyCommand::DestroyTexture { .. }),
        ),
        (
            "buffers",
            |c| matches!(c, DummyCommand::CreateBuffer { .. }),
            |c| matches!(c, DummyCommand::DestroyBuffer { .. }),
        ),
        (
            "samplers",
            |c| matches!(c, DummyCommand::CreateSampler { .. }),
            |c| matches!(c, DummyCommand::DestroySampler { .. }),
        ),
        (
            "shaders",
            |c| matches!(c, DummyCommand::CreateShader { .. }),
            |c| matches!(c, DummyCommand::DestroyShader { .. }),
        ),
        (
            "pipelines",
            |c| matches!(c, DummyCommand::CreatePipeline { .. }),
            |c| matches!(c, DummyCommand::DestroyPipeline { .. }),
        ),
        (
            "signatures",
            |c| matches!(c, DummyCommand::CreateSignature { .. }),
            |c| matches!(c, DummyCommand::DestroySignature { .. }),
        ),
        (
            "bindings",
            |c| matches!(c, DummyCommand::CreateBinding { .. }),
            |c| matches!(c, DummyCommand::DestroyBinding { .. }),
        ),
    ];
    for (what, created, destroyed) in pairs {
        assert_eq!(log.count(created), log.count(destroyed), "leaked {what}");
    }
}
