//! Intro playback.
//!
//! ```text
//!   Pending ──start──► LoadingIntros ──decoded──► PlayingIntro(i) ──end──► LoadingIntros
//!      │                     │                          │                    (i + 1)
//!      │ skip                │ skip                     │ skip / last intro ended
//!      └─────────────────────┴──────────────────────────┴──────────► IntroComplete
//! ```
//!
//! Every intro is decoded on a worker runtime as soon as the sequence starts.
//! Decoded frames come back over a channel that [`IntroSequence::update`]
//! polls; textures are created and registered on the render thread only.
//! The sequence only moves forward: an intro that ended or failed to decode
//! is never revisited.

use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

use crate::assets::SearchPaths;
use crate::backend::OverlayQuad;
use crate::bindless::BindlessKind;
use crate::context::{RenderContext, TextureSlot};
use crate::error::GraphicsError;
use crate::types::{Color, Extent2d, ScreenRect, TextureDescriptor};

use super::media::{DecodedMedia, MediaDecoder, WebpDecoder};

/// One intro to play.
#[derive(Debug, Clone, PartialEq)]
pub struct IntroConfig {
    /// Search-path relative `.webp` file.
    pub path: String,
    /// Playback speed multiplier.
    pub speed: f32,
    /// Stretch to the whole screen instead of centering at native size.
    pub cover: bool,
    /// Fill behind the frame.
    pub background: Color,
}

impl IntroConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            speed: 1.0,
            cover: false,
            background: Color::BLACK,
        }
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_cover(mut self, cover: bool) -> Self {
        self.cover = cover;
        self
    }

    pub fn with_background(mut self, background: Color) -> Self {
        self.background = background;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntroPhase {
    /// `start` has not run yet.
    Pending,
    /// Waiting for the current intro to finish decoding.
    LoadingIntros,
    PlayingIntro(usize),
    IntroComplete,
}

struct DecodeResult {
    index: usize,
    media: Result<DecodedMedia, GraphicsError>,
}

enum Decoded {
    Waiting,
    Ready(DecodedMedia),
    Failed,
}

/// Frames of the intro on screen.
struct Playback {
    frames: Vec<(TextureSlot, Duration, Extent2d)>,
    current: usize,
    elapsed: Duration,
}

impl Playback {
    fn release(self, ctx: &mut RenderContext) {
        for (slot, _, _) in self.frames {
            ctx.release_texture(slot);
        }
    }
}

/// The intro state machine.
pub struct IntroSequence {
    intros: Vec<IntroConfig>,
    phase: IntroPhase,
    /// Index of the intro being loaded or played.
    current: usize,
    decoded: Vec<Decoded>,
    playback: Option<Playback>,
    runtime: Option<tokio::runtime::Runtime>,
    receiver: Option<mpsc::Receiver<DecodeResult>>,
    decoder: Arc<dyn MediaDecoder>,
    skip: bool,
    frames_rendered: u64,
    on_complete: Option<Box<dyn FnOnce() + Send>>,
}

impl IntroSequence {
    pub fn new() -> Self {
        Self::with_decoder(Arc::new(WebpDecoder))
    }

    pub fn with_decoder(decoder: Arc<dyn MediaDecoder>) -> Self {
        Self {
            intros: Vec::new(),
            phase: IntroPhase::Pending,
            current: 0,
            decoded: Vec::new(),
            playback: None,
            runtime: None,
            receiver: None,
            decoder,
            skip: false,
            frames_rendered: 0,
            on_complete: None,
        }
    }

    /// Queue an intro.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidParameter`] for a file the decoder
    /// does not handle, a negative or non-finite speed, or once playback
    /// has started.
    pub fn add(&mut self, intro: IntroConfig) -> Result<(), GraphicsError> {
        if !intro.speed.is_finite() || intro.speed < 0.0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "intro '{}' has invalid speed {}",
                intro.path, intro.speed
            )));
        }
        if !self.decoder.supports(&intro.path) {
            return Err(GraphicsError::InvalidParameter(format!(
                "invalid intro '{}', only '.webp' is supported",
                intro.path
            )));
        }
        if self.phase != IntroPhase::Pending {
            return Err(GraphicsError::InvalidParameter(format!(
                "intro '{}' added after playback started",
                intro.path
            )));
        }
        self.intros.push(intro);
        Ok(())
    }

    pub fn intros(&self) -> &[IntroConfig] {
        &self.intros
    }

    pub fn phase(&self) -> IntroPhase {
        self.phase
    }

    /// True while intros own the screen.
    pub fn is_active(&self) -> bool {
        matches!(
            self.phase,
            IntroPhase::LoadingIntros | IntroPhase::PlayingIntro(_)
        )
    }

    pub fn is_complete(&self) -> bool {
        self.phase == IntroPhase::IntroComplete
    }

    /// Number of frames the intro overlay has drawn.
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Skip every intro. Before `start` this completes immediately on start;
    /// during playback the next `update` abandons it.
    pub fn skip(&mut self, skip: bool) {
        if skip && !self.skip {
            log::info!("IntroSequence: skipping intros");
        }
        self.skip = skip;
    }

    pub fn is_skipped(&self) -> bool {
        self.skip
    }

    /// Called once when the sequence completes, skipped or not.
    pub fn set_on_complete(&mut self, callback: impl FnOnce() + Send + 'static) {
        self.on_complete = Some(Box::new(callback));
    }

    /// Begin decoding every intro. Media is read from `paths`.
    pub fn start(&mut self, paths: &SearchPaths) {
        if self.phase != IntroPhase::Pending {
            return;
        }
        if self.skip || self.intros.is_empty() {
            self.complete();
            return;
        }

        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("cinder-intro")
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                log::error!("IntroSequence: failed to start decode runtime: {err}");
                self.complete();
                return;
            }
        };

        let (sender, receiver) = mpsc::channel();
        for (index, intro) in self.intros.iter().enumerate() {
            let sender = sender.clone();
            let paths = paths.clone();
            let decoder = Arc::clone(&self.decoder);
            let path = intro.path.clone();
            runtime.spawn_blocking(move || {
                let media = paths
                    .read(&path)
                    .map_err(GraphicsError::from)
                    .and_then(|(_, bytes)| decoder.decode(&path, &bytes));
                // The receiver is gone once the sequence is abandoned.
                let _ = sender.send(DecodeResult { index, media });
            });
        }

        log::info!("IntroSequence: decoding {} intros", self.intros.len());
        self.decoded = self.intros.iter().map(|_| Decoded::Waiting).collect();
        self.runtime = Some(runtime);
        self.receiver = Some(receiver);
        self.phase = IntroPhase::LoadingIntros;
    }

    /// Advance playback by `dt`.
    pub fn update(&mut self, ctx: &mut RenderContext, dt: Duration) -> Result<(), GraphicsError> {
        if !self.is_active() {
            return Ok(());
        }
        if self.skip {
            self.abandon(ctx);
            return Ok(());
        }

        self.poll();

        if let IntroPhase::PlayingIntro(index) = self.phase {
            let speed = f64::from(self.intros[index].speed);
            // Past the largest Duration every frame has elapsed.
            let step = Duration::try_from_secs_f64(dt.as_secs_f64() * speed)
                .unwrap_or(Duration::MAX);
            if self.advance(step) {
                log::debug!("IntroSequence: intro {index} ended");
                if let Some(playback) = self.playback.take() {
                    playback.release(ctx);
                }
                self.current = index + 1;
                self.phase = IntroPhase::LoadingIntros;
            }
        }

        if self.phase == IntroPhase::LoadingIntros {
            self.begin_next(ctx);
        }
        Ok(())
    }

    fn poll(&mut self) {
        let Some(receiver) = &self.receiver else {
            return;
        };
        while let Ok(DecodeResult { index, media }) = receiver.try_recv() {
            self.decoded[index] = match media {
                Ok(media) => Decoded::Ready(media),
                Err(err) => {
                    log::warn!(
                        "IntroSequence: skipping intro '{}': {err}",
                        self.intros[index].path
                    );
                    Decoded::Failed
                }
            };
        }
    }

    /// Step the frame clock. Returns true once the last frame has elapsed.
    fn advance(&mut self, dt: Duration) -> bool {
        let Some(playback) = &mut self.playback else {
            return true;
        };
        playback.elapsed = playback.elapsed.saturating_add(dt);
        while let Some((_, duration, _)) = playback.frames.get(playback.current) {
            if playback.elapsed < *duration {
                return false;
            }
            playback.elapsed -= *duration;
            playback.current += 1;
        }
        true
    }

    /// Upload the current intro if it is decoded. Intros that failed to
    /// decode or to upload are skipped.
    fn begin_next(&mut self, ctx: &mut RenderContext) {
        while self.current < self.intros.len() {
            let index = self.current;
            match std::mem::replace(&mut self.decoded[index], Decoded::Failed) {
                Decoded::Waiting => {
                    self.decoded[index] = Decoded::Waiting;
                    return;
                }
                Decoded::Failed => self.current += 1,
                Decoded::Ready(media) => match self.upload(ctx, index, media) {
                    Ok(playback) => {
                        self.playback = Some(playback);
                        self.phase = IntroPhase::PlayingIntro(index);
                        log::debug!("IntroSequence: playing '{}'", self.intros[index].path);
                        return;
                    }
                    Err(err) => {
                        log::warn!(
                            "IntroSequence: skipping intro '{}', upload failed: {err}",
                            self.intros[index].path
                        );
                        self.current += 1;
                    }
                },
            }
        }
        self.finish();
    }

    fn upload(
        &self,
        ctx: &mut RenderContext,
        index: usize,
        media: DecodedMedia,
    ) -> Result<Playback, GraphicsError> {
        let path = &self.intros[index].path;
        let mut frames = Vec::with_capacity(media.frames.len());
        for (i, frame) in media.frames.into_iter().enumerate() {
            let descriptor = TextureDescriptor::sampled_rgba8(frame.width, frame.height)
                .with_label(format!("{path}#{i}"));
            let slot = match ctx.upload_texture(&descriptor, &frame.rgba, BindlessKind::Texture) {
                Ok(slot) => slot,
                Err(err) => {
                    Playback {
                        frames,
                        current: 0,
                        elapsed: Duration::ZERO,
                    }
                    .release(ctx);
                    return Err(err);
                }
            };
            frames.push((
                slot,
                frame.duration,
                Extent2d::new(frame.width, frame.height),
            ));
        }
        Ok(Playback {
            frames,
            current: 0,
            elapsed: Duration::ZERO,
        })
    }

    /// Draw the intro overlay onto the backbuffer.
    pub fn draw(&mut self, ctx: &mut RenderContext) {
        let screen = ctx.render_size();
        if !self.is_active() {
            return;
        }
        let Some(intro) = self.intros.get(self.current) else {
            return;
        };

        let backend = ctx.backend_mut();
        backend.draw_quad(&OverlayQuad {
            rect: ScreenRect::full(screen),
            color: intro.background,
            texture: None,
        });

        if let Some(playback) = &self.playback
            && let Some((slot, _, size)) = playback.frames.get(playback.current)
        {
            let rect = if intro.cover {
                ScreenRect::full(screen)
            } else {
                ScreenRect::centered(*size, screen)
            };
            backend.draw_quad(&OverlayQuad {
                rect,
                color: Color::WHITE,
                texture: Some(slot.index),
            });
            self.frames_rendered += 1;
        }
    }

    /// Drop playback and any pending decodes, then complete.
    pub fn abandon(&mut self, ctx: &mut RenderContext) {
        if let Some(playback) = self.playback.take() {
            playback.release(ctx);
        }
        self.finish();
    }

    fn finish(&mut self) {
        self.receiver = None;
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
        self.decoded.clear();
        self.complete();
    }

    fn complete(&mut self) {
        log::info!("IntroSequence: complete");
        self.phase = IntroPhase::IntroComplete;
        if let Some(callback) = self.on_complete.take() {
            callback();
        }
    }
}

impl Default for IntroSequence {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IntroSequence {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl std::fmt::Debug for IntroSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntroSequence")
            .field("intros", &self.intros)
            .field("phase", &self.phase)
            .field("skip", &self.skip)
            .field("frames_rendered", &self.frames_rendered)
            .finish_non_exhaustive()
    }
}
