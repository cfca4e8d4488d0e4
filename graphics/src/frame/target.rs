//! The offscreen render target the opaque pass and post-processing draw into.

use crate::backend::{TextureHandle, TextureViewHandle};
use crate::bindless::BindlessKind;
use crate::context::{RenderContext, TextureSlot};
use crate::error::GraphicsError;
use crate::types::{Color, Extent2d, ResourceState, TextureDescriptor, TextureFormat, TextureUsage};

/// Color plus depth attachment, with the color registered bindless so
/// post-process effects can sample it.
#[derive(Debug)]
pub struct RenderTarget {
    color: TextureSlot,
    depth: (TextureHandle, TextureViewHandle),
    size: Extent2d,
    format: TextureFormat,
    recording: bool,
}

impl RenderTarget {
    pub fn new(
        ctx: &mut RenderContext,
        size: Extent2d,
        format: TextureFormat,
    ) -> Result<Self, GraphicsError> {
        let (color, depth) = Self::create_attachments(ctx, size, format)?;
        log::debug!(
            "RenderTarget: created {}x{} {format:?}, color at slot {}",
            size.width,
            size.height,
            color.index
        );
        Ok(Self {
            color,
            depth,
            size,
            format,
            recording: false,
        })
    }

    fn create_attachments(
        ctx: &mut RenderContext,
        size: Extent2d,
        format: TextureFormat,
    ) -> Result<(TextureSlot, (TextureHandle, TextureViewHandle)), GraphicsError> {
        let color_desc = TextureDescriptor::new_2d(
            size.width,
            size.height,
            format,
            TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        )
        .with_label("Offscreen color");
        let depth_desc = TextureDescriptor::new_2d(
            size.width,
            size.height,
            TextureFormat::Depth32Float,
            TextureUsage::RENDER_ATTACHMENT,
        )
        .with_label("Offscreen depth");

        let (texture, view) = ctx.create_texture(&color_desc, None)?;
        let index = ctx.register_texture(view, BindlessKind::Texture)?;
        let depth = ctx.create_texture(&depth_desc, None)?;

        ctx.enqueue_barrier(texture, ResourceState::Undefined, ResourceState::RenderTarget);
        ctx.enqueue_barrier(depth.0, ResourceState::Undefined, ResourceState::DepthWrite);

        let color = TextureSlot {
            texture,
            view,
            kind: BindlessKind::Texture,
            index,
        };
        Ok((color, depth))
    }

    /// Start recording into the target, clearing it when `clear` is set.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidParameter`] if the target is already recording.
    pub fn begin_record(
        &mut self,
        ctx: &mut RenderContext,
        clear: Option<Color>,
    ) -> Result<(), GraphicsError> {
        if self.recording {
            return Err(GraphicsError::InvalidParameter(
                "render target is already recording".into(),
            ));
        }
        ctx.backend_mut()
            .begin_render_target(self.color.view, Some(self.depth.1), clear);
        self.recording = true;
        Ok(())
    }

    pub fn end_record(&mut self, ctx: &mut RenderContext) {
        if self.recording {
            ctx.backend_mut().end_render_target();
            self.recording = false;
        }
    }

    /// Recreate the attachments at `size`. The old ones are retired.
    pub fn resize(&mut self, ctx: &mut RenderContext, size: Extent2d) -> Result<(), GraphicsError> {
        if size == self.size {
            return Ok(());
        }
        let (color, depth) = Self::create_attachments(ctx, size, self.format)?;
        ctx.release_texture(self.color);
        ctx.retire_texture(self.depth.0);
        self.color = color;
        self.depth = depth;
        self.size = size;
        Ok(())
    }

    /// Retire both attachments.
    pub fn destroy(self, ctx: &mut RenderContext) {
        ctx.release_texture(self.color);
        ctx.retire_texture(self.depth.0);
    }

    pub fn color_view(&self) -> TextureViewHandle {
        self.color.view
    }

    /// Bindless slot of the color attachment.
    pub fn color_index(&self) -> u32 {
        self.color.index
    }

    pub fn depth_view(&self) -> TextureViewHandle {
        self.depth.1
    }

    pub fn size(&self) -> Extent2d {
        self.size
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::SearchPaths;
    use crate::backend::{DummyBackend, DummyCommand};

    #[test]
    fn test_record_cycle() {
        let backend = DummyBackend::new();
        let log = backend.command_log();
        let mut ctx = RenderContext::standalone(Box::new(backend), SearchPaths::new()).unwrap();
        let mut target =
            RenderTarget::new(&mut ctx, Extent2d::new(64, 32), TextureFormat::Rgba8Unorm).unwrap();
        log.clear();

        target.begin_record(&mut ctx, Some(Color::BLACK)).unwrap();
        assert!(target.begin_record(&mut ctx, None).is_err());
        target.end_record(&mut ctx);
        target.end_record(&mut ctx);

        assert_eq!(
            log.snapshot(),
            vec![
                DummyCommand::BeginRenderTarget {
                    color: target.color_view(),
                    clear: true
                },
                DummyCommand::EndRenderTarget,
            ]
        );
    }

    #[test]
    fn test_resize_swaps_attachments() {
        let mut ctx =
            RenderContext::standalone(Box::new(DummyBackend::new()), SearchPaths::new()).unwrap();
        let mut target =
            RenderTarget::new(&mut ctx, Extent2d::new(64, 32), TextureFormat::Rgba8Unorm).unwrap();
        let old = target.color_view();

        target.resize(&mut ctx, Extent2d::new(128, 64)).unwrap();
        assert_ne!(target.color_view(), old);
        assert_eq!(ctx.bindless().slot(old), None);
        assert!(ctx.bindless().slot(target.color_view()).is_some());
    }
}
