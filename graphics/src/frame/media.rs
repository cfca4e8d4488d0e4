//! Intro media decoding.
//!
//! Decoders run on worker threads and produce plain RGBA frames; turning them
//! into textures happens later, on the render thread.

use std::io::Cursor;
use std::time::Duration;

use image::codecs::webp::WebPDecoder;
use image::{AnimationDecoder, DynamicImage};

use crate::error::GraphicsError;

/// Display time of a still image.
pub const STILL_FRAME_DURATION: Duration = Duration::from_secs(2);

/// Display time of an animation frame that declares no delay.
const DEFAULT_FRAME_DELAY: Duration = Duration::from_millis(100);

/// One decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaFrame {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8 pixels.
    pub rgba: Vec<u8>,
    pub duration: Duration,
}

/// A fully decoded medium.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedMedia {
    pub frames: Vec<MediaFrame>,
}

impl DecodedMedia {
    pub fn total_duration(&self) -> Duration {
        self.frames.iter().map(|frame| frame.duration).sum()
    }
}

/// Turns encoded bytes into frames.
pub trait MediaDecoder: Send + Sync {
    /// Returns true if this decoder handles files like `path`.
    fn supports(&self, path: &str) -> bool;

    fn decode(&self, path: &str, bytes: &[u8]) -> Result<DecodedMedia, GraphicsError>;
}

/// Still and animated WebP.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebpDecoder;

fn decode_error(path: &str, err: impl ToString) -> GraphicsError {
    GraphicsError::MediaDecode {
        path: path.to_string(),
        reason: err.to_string(),
    }
}

impl MediaDecoder for WebpDecoder {
    fn supports(&self, path: &str) -> bool {
        path.rsplit_once('.')
            .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case("webp"))
    }

    fn decode(&self, path: &str, bytes: &[u8]) -> Result<DecodedMedia, GraphicsError> {
        let decoder = WebPDecoder::new(Cursor::new(bytes)).map_err(|e| decode_error(path, e))?;

        let frames = if decoder.has_animation() {
            decoder
                .into_frames()
                .collect_frames()
                .map_err(|e| decode_error(path, e))?
                .into_iter()
                .map(|frame| {
                    let (numer, denom) = frame.delay().numer_denom_ms();
                    let delay = if numer == 0 || denom == 0 {
                        DEFAULT_FRAME_DELAY
                    } else {
                        Duration::from_secs_f64(f64::from(numer) / f64::from(denom) / 1000.0)
                    };
                    let buffer = frame.into_buffer();
                    MediaFrame {
                        width: buffer.width(),
                        height: buffer.height(),
                        rgba: buffer.into_raw(),
                        duration: delay,
                    }
                })
                .collect()
        } else {
            let image = DynamicImage::from_decoder(decoder)
                .map_err(|e| decode_error(path, e))?
                .to_rgba8();
            vec![MediaFrame {
                width: image.width(),
                height: image.height(),
                rgba: image.into_raw(),
                duration: STILL_FRAME_DURATION,
            }]
        };

        if frames.is_empty() {
            return Err(decode_error(path, "no frames"));
        }
        log::debug!("WebpDecoder: decoded '{path}' ({} frames)", frames.len());
        Ok(DecodedMedia { frames })
    }
}
