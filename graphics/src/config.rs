//! Renderer configuration.

use std::time::Duration;

use crate::assets::SearchPaths;
use crate::bindless::BindlessConfig;
use crate::frame::IntroConfig;
use crate::types::{Color, DeviceFeatures, DeviceRequest, Extent2d};

/// How `update` measures elapsed time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeStep {
    /// Every tick advances by the same amount.
    Fixed(Duration),
    /// Ticks advance by wall-clock time since the previous tick.
    #[default]
    Realtime,
}

/// Configuration for a [`FrameOrchestrator`](crate::FrameOrchestrator).
///
/// # Example
///
/// ```ignore
/// let config = RendererConfig::new()
///     .with_render_size(Extent2d::new(1280, 720))
///     .with_clear_color(Color::rgba(0.1, 0.1, 0.1, 1.0))
///     .with_intro(IntroConfig::new("intros/logo.webp").with_cover(true));
/// ```
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Features the device must support.
    pub features: DeviceFeatures,
    /// Descriptor heap size hint (0 = backend default).
    pub heap_size: u32,
    pub vsync: bool,
    /// Backbuffer clear color, in sRGB.
    pub clear_color: Color,
    pub intros: Vec<IntroConfig>,
    pub skip_intros: bool,
    pub render_size: Extent2d,
    pub bindless: BindlessConfig,
    pub time_step: TimeStep,
    pub search_paths: SearchPaths,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            features: DeviceFeatures::default(),
            heap_size: 0,
            vsync: true,
            clear_color: Color::BLACK,
            intros: Vec::new(),
            skip_intros: false,
            render_size: Extent2d::new(1280, 720),
            bindless: BindlessConfig::default(),
            time_step: TimeStep::default(),
            search_paths: SearchPaths::new(),
        }
    }
}

impl RendererConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_features(mut self, features: DeviceFeatures) -> Self {
        self.features = features;
        self
    }

    pub fn with_heap_size(mut self, heap_size: u32) -> Self {
        self.heap_size = heap_size;
        self
    }

    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    /// Set the clear color in sRGB. It is converted to linear at init.
    pub fn with_clear_color(mut self, color: Color) -> Self {
        self.clear_color = color;
        self
    }

    pub fn with_intro(mut self, intro: IntroConfig) -> Self {
        self.intros.push(intro);
        self
    }

    pub fn with_skip_intros(mut self, skip: bool) -> Self {
        self.skip_intros = skip;
        self
    }

    pub fn with_render_size(mut self, size: Extent2d) -> Self {
        self.render_size = size;
        self
    }

    /// Frames a released resource is kept alive before reuse.
    pub fn with_frames_in_flight(mut self, frames: u32) -> Self {
        self.bindless.frames_in_flight = frames;
        self
    }

    pub fn with_bindless(mut self, bindless: BindlessConfig) -> Self {
        self.bindless = bindless;
        self
    }

    pub fn with_time_step(mut self, time_step: TimeStep) -> Self {
        self.time_step = time_step;
        self
    }

    pub fn with_search_paths(mut self, search_paths: SearchPaths) -> Self {
        self.search_paths = search_paths;
        self
    }

    /// The device request before plugins add their requirements.
    pub fn device_request(&self) -> DeviceRequest {
        let mut request = DeviceRequest::new(self.features);
        request.reserve_descriptors(self.heap_size);
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = RendererConfig::new()
            .with_heap_size(2048)
            .with_frames_in_flight(2)
            .with_skip_intros(true)
            .with_intro(IntroConfig::new("logo.webp"))
            .with_time_step(TimeStep::Fixed(Duration::from_millis(16)));

        assert_eq!(config.bindless.frames_in_flight, 2);
        assert!(config.skip_intros);
        assert_eq!(config.intros.len(), 1);
        assert_eq!(config.device_request().descriptor_heap_size, 2048);
        assert_eq!(config.device_request().required, DeviceFeatures::default());
    }
}
