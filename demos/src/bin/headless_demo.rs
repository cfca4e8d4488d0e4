//! # Headless Demo
//!
//! Demonstrates:
//! - Frame orchestration on the dummy backend
//! - A legacy-path pipeline with a static constant buffer
//! - The post-process plugin with a vignette effect
//! - Intro playback (pass `--intro <file.webp>`)
//! - Plugin queries by id
//!
//! At exit it prints a summary of the recorded backend commands.

use std::time::Duration;

use clap::Parser;

use cinder_demos::{DemoArgs, FrameStatsPlugin, search_paths};
use cinder_graphics::backend::{BoundResource, OverlayQuad};
use cinder_graphics::pipeline::{VertexAttribute, VertexFormat};
use cinder_graphics::plugin::FullscreenEffect;
use cinder_graphics::shader::ShaderStages;
use cinder_graphics::types::{BufferDescriptor, ScreenRect};
use cinder_graphics::{
    Color, DrawPass, DummyBackend, DummyCommand, Extent2d, FrameOrchestrator, GraphicsError,
    IntroConfig, MacroSet, PipelineSettings, PostProcessPlugin, RendererConfig, ResourceState,
    TimeStep,
};

/// Layout of the quad's `Constants` block.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct QuadConstants {
    tint: [f32; 4],
    /// x: rotation in radians.
    params: [f32; 4],
}

fn build_config(args: &DemoArgs) -> RendererConfig {
    let time_step = match args.fixed_step_ms {
        Some(ms) => TimeStep::Fixed(Duration::from_millis(ms)),
        None => TimeStep::Realtime,
    };
    let mut config = RendererConfig::new()
        .with_render_size(Extent2d::new(args.width, args.height))
        .with_vsync(!args.no_vsync)
        .with_clear_color(Color::rgba(0.05, 0.05, 0.08, 1.0))
        .with_skip_intros(args.skip_intros)
        .with_time_step(time_step)
        .with_search_paths(search_paths());
    for path in &args.intro {
        config = config.with_intro(IntroConfig::new(path.clone()).with_cover(false));
    }
    config
}

fn run(args: DemoArgs) -> Result<(), GraphicsError> {
    let backend = DummyBackend::new();
    let log = backend.command_log();
    let mut frames = FrameOrchestrator::new(Box::new(backend), build_config(&args))?;

    frames.add_plugin(FrameStatsPlugin::new(30))?;
    if !args.no_post {
        let mut post = PostProcessPlugin::new();
        post.add(FullscreenEffect::new(
            "Vignette",
            "fullscreen.vert",
            "post/vignette.frag",
        ));
        frames.add_plugin(post)?;
    }
    frames.set_on_intro_complete(|| log::info!("Intros finished"));
    frames.init()?;

    let ctx = frames.context_mut();
    let constants = ctx.create_buffer(
        &BufferDescriptor::constant::<QuadConstants>().with_label("Quad constants"),
    )?;
    ctx.enqueue_barrier(
        constants,
        ResourceState::Undefined,
        ResourceState::ConstantBuffer,
    );
    let quad = ctx.create_pipeline(
        "Demo::Quad",
        &PipelineSettings::new("quad.vert", "quad.frag")
            .with_attribute(VertexAttribute {
                location: 0,
                buffer_slot: 0,
                offset: 0,
                format: VertexFormat::Float32x2,
            })
            .with_macros(MacroSet::new().with("SRGB_TINT", true))
            .with_static_uniform(
                ShaderStages::GRAPHICS,
                "Constants",
                BoundResource::Buffer(constants),
            ),
    )?;

    let mut angle = 0.0f32;
    frames.set_draw_callback(move |pass, ctx| match pass {
        DrawPass::Opaque => {
            angle += 0.02;
            let uniform = QuadConstants {
                tint: [1.0, 0.55, 0.2, 1.0],
                params: [angle, 0.0, 0.0, 0.0],
            };
            if let Err(err) = ctx.write_uniform(constants, &uniform) {
                log::error!("Failed to update quad constants: {err}");
                return;
            }
            let backend = ctx.backend_mut();
            backend.set_pipeline(quad);
            backend.draw(6, 1);
        }
        DrawPass::Overlay => {
            ctx.backend_mut().draw_quad(&OverlayQuad {
                rect: ScreenRect::new(16.0, 16.0, 96.0, 24.0),
                color: Color::rgba(1.0, 1.0, 1.0, 0.5),
                texture: None,
            });
        }
    });

    while frames.frame() < args.max_frames {
        frames.update()?;
        frames.render()?;
    }

    let stats = frames
        .plugins()
        .get_as::<FrameStatsPlugin>(FrameStatsPlugin::ID)
        .map(|stats| (stats.frames(), stats.updates()))
        .unwrap_or_default();
    let draws = log.count(|c| matches!(c, DummyCommand::Draw { .. }));
    let quads = log.count(|c| matches!(c, DummyCommand::DrawQuad(_)));
    let transitions = log.count(|c| matches!(c, DummyCommand::Transition(_)));

    println!("Rendered {} frames", frames.frame());
    println!("  plugins:      {}", frames.plugins().ids().collect::<Vec<_>>().join(", "));
    println!("  plugin ticks: {} updates, {} frames", stats.1, stats.0);
    println!("  draws:        {draws}");
    println!("  quads:        {quads}");
    println!("  barriers:     {transitions} batches");
    println!(
        "  pipelines:    {} ({} shaders)",
        frames.context().pipelines().pipeline_count(),
        frames.context().pipelines().shader_count()
    );
    println!("  intro frames: {}", frames.intros().frames_rendered());

    frames.shutdown();
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    cinder_graphics::init();

    let args = DemoArgs::parse();
    if let Err(err) = run(args) {
        log::error!("Demo failed: {err}");
        std::process::exit(1);
    }
}
