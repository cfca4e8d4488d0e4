//! # Cinder Demos
//!
//! Headless demos of the Cinder render core. They run on the dummy backend
//! and report what was recorded, so they work without a GPU or a window.
//!
//! ## Available Demos
//!
//! - `headless_demo` - Plugins, post-processing, intros and a tinted quad

use std::path::PathBuf;

use clap::Parser;

use cinder_graphics::{
    Camera, DirectorySource, GraphicsError, RenderContext, RenderPlugin, SearchPaths,
};

/// Demos library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Root of the demo assets shipped with this crate.
pub fn assets_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets")
}

/// Search paths for the demos: every directory under `assets/shaders`,
/// then `assets` itself for intro media.
pub fn search_paths() -> SearchPaths {
    let root = assets_dir();
    let mut paths = SearchPaths::new();
    paths.push_tree(DirectorySource::new(root.join("shaders")), "");
    paths.push(DirectorySource::new(root), "");
    paths
}

/// Command line shared by the demos.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "cinder-demo",
    about = "Cinder render core demo",
    long_about = "Runs the Cinder render core headless on the dummy backend.\n\
        \n\
        EXAMPLES:\n\
          # Render 60 frames and print a summary\n\
          ./headless_demo --max-frames 60\n\
        \n\
          # Play an intro from the assets directory first\n\
          ./headless_demo --intro intros/logo.webp",
    version
)]
pub struct DemoArgs {
    /// Output width in pixels.
    #[arg(long, default_value = "1280")]
    pub width: u32,

    /// Output height in pixels.
    #[arg(long, default_value = "720")]
    pub height: u32,

    /// Disable vertical sync.
    #[arg(long)]
    pub no_vsync: bool,

    /// Exit after rendering N frames.
    #[arg(long, default_value = "120")]
    pub max_frames: u64,

    /// Fixed simulation step in milliseconds. Realtime when omitted.
    #[arg(long)]
    pub fixed_step_ms: Option<u64>,

    /// Intro media to play before the scene, relative to the assets directory.
    #[arg(long)]
    pub intro: Vec<String>,

    /// Skip intros.
    #[arg(long)]
    pub skip_intros: bool,

    /// Disable the vignette post-process effect.
    #[arg(long)]
    pub no_post: bool,
}

/// Counts rendered frames and logs a line every `interval` frames.
pub struct FrameStatsPlugin {
    interval: u64,
    frames: u64,
    updates: u64,
}

impl FrameStatsPlugin {
    pub const ID: &'static str = "FrameStats";

    pub fn new(interval: u64) -> Self {
        Self {
            interval: interval.max(1),
            frames: 0,
            updates: 0,
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn updates(&self) -> u64 {
        self.updates
    }
}

impl RenderPlugin for FrameStatsPlugin {
    fn id(&self) -> &str {
        Self::ID
    }

    fn update(&mut self, _ctx: &mut RenderContext) -> Result<(), GraphicsError> {
        self.updates += 1;
        Ok(())
    }

    fn pre_render(&mut self, ctx: &mut RenderContext, camera: &dyn Camera) -> Result<(), GraphicsError> {
        self.frames += 1;
        if self.frames % self.interval == 0 {
            let size = camera.size();
            log::info!(
                "FrameStats: frame {} at {}x{}, {} textures bound",
                ctx.frame(),
                size.width,
                size.height,
                ctx.bindless().len(cinder_graphics::BindlessKind::Texture)
            );
        }
        Ok(())
    }
}
