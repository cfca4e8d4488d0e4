//! Post-processing plugin.
//!
//! Effects run in order on the offscreen target after the opaque pass. Each
//! effect re-opens the target without clearing it, so effects compose.

use crate::backend::{BoundResource, BufferHandle, PipelineHandle};
use crate::bindless::{SignatureBuilder, VariableKind};
use crate::context::RenderContext;
use crate::error::GraphicsError;
use crate::frame::{Camera, RenderTarget};
use crate::pipeline::PipelineSettings;
use crate::shader::{MacroSet, ShaderStages};
use crate::types::{BufferDescriptor, Extent2d, ResourceState};

use super::RenderPlugin;

/// Layout of the `PostProcessConstants` constant buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PostProcessConstants {
    /// Bindless slot of the target's color attachment.
    pub source_index: u32,
    /// Position of the running effect in the chain.
    pub effect_index: u32,
    pub frame: u32,
    pub _padding: u32,
    /// Width, height, 1/width, 1/height.
    pub resolution: [f32; 4],
}

static_assertions::const_assert_eq!(std::mem::size_of::<PostProcessConstants>(), 32);

/// One step of the post-process chain.
pub trait PostProcessEffect: Send {
    fn name(&self) -> &str;

    /// Create pipelines and resources. Runs during the plugin's `upload`.
    fn init(&mut self, _ctx: &mut RenderContext) -> Result<(), GraphicsError> {
        Ok(())
    }

    /// Record the effect. The target is open for recording.
    fn apply(&mut self, ctx: &mut RenderContext, target: &RenderTarget) -> Result<(), GraphicsError>;
}

/// A full-screen triangle drawn with one pipeline.
#[derive(Debug, Clone)]
pub struct FullscreenEffect {
    name: String,
    vertex_shader: String,
    fragment_shader: String,
    macros: MacroSet,
    pipeline: Option<PipelineHandle>,
}

impl FullscreenEffect {
    pub fn new(
        name: impl Into<String>,
        vertex_shader: impl Into<String>,
        fragment_shader: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            vertex_shader: vertex_shader.into(),
            fragment_shader: fragment_shader.into(),
            macros: MacroSet::new(),
            pipeline: None,
        }
    }

    pub fn with_macros(mut self, macros: MacroSet) -> Self {
        self.macros = macros;
        self
    }

    pub fn pipeline(&self) -> Option<PipelineHandle> {
        self.pipeline
    }

    fn pipeline_name(&self) -> String {
        format!("PostProcess::{}", self.name)
    }
}

impl PostProcessEffect for FullscreenEffect {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self, ctx: &mut RenderContext) -> Result<(), GraphicsError> {
        let mut settings =
            PipelineSettings::fullscreen(&self.vertex_shader, &self.fragment_shader)
                .with_macros(self.macros.clone());
        if let Some(signature) = ctx.signature_handle() {
            settings = settings.with_signature(signature);
        }
        self.pipeline = Some(ctx.create_pipeline(&self.pipeline_name(), &settings)?);
        Ok(())
    }

    fn apply(&mut self, ctx: &mut RenderContext, _target: &RenderTarget) -> Result<(), GraphicsError> {
        let pipeline = self.pipeline.ok_or(GraphicsError::NotInitialized)?;
        let backend = ctx.backend_mut();
        backend.set_pipeline(pipeline);
        backend.draw(3, 1);
        Ok(())
    }
}

struct EffectEntry {
    enabled: bool,
    effect: Box<dyn PostProcessEffect>,
}

/// Applies an ordered list of [`PostProcessEffect`]s to the offscreen target.
pub struct PostProcessPlugin {
    effects: Vec<EffectEntry>,
    constants: Option<BufferHandle>,
    uploaded: bool,
}

impl PostProcessPlugin {
    pub const ID: &'static str = "PostProcess";

    /// Name of the constant buffer in the resource signature.
    pub const CONSTANTS: &'static str = "PostProcessConstants";

    pub fn new() -> Self {
        Self {
            effects: Vec::new(),
            constants: None,
            uploaded: false,
        }
    }

    /// Append an enabled effect.
    ///
    /// Effects added after `upload` must be initialized by the caller.
    pub fn add(&mut self, effect: impl PostProcessEffect + 'static) -> &mut Self {
        if self.uploaded {
            log::warn!(
                "PostProcessPlugin: '{}' added after upload, it will not be initialized",
                effect.name()
            );
        }
        self.effects.push(EffectEntry {
            enabled: true,
            effect: Box::new(effect),
        });
        self
    }

    /// Remove the effect at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidParameter`] if `index` is out of range.
    pub fn remove(&mut self, index: usize) -> Result<Box<dyn PostProcessEffect>, GraphicsError> {
        if index >= self.effects.len() {
            return Err(GraphicsError::InvalidParameter(format!(
                "post-process effect {index} out of range ({} effects)",
                self.effects.len()
            )));
        }
        Ok(self.effects.remove(index).effect)
    }

    pub fn get(&self, index: usize) -> Option<&dyn PostProcessEffect> {
        self.effects.get(index).map(|entry| entry.effect.as_ref())
    }

    pub fn set_enabled(&mut self, index: usize, enabled: bool) -> bool {
        match self.effects.get_mut(index) {
            Some(entry) => {
                entry.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn is_enabled(&self, index: usize) -> bool {
        self.effects.get(index).is_some_and(|entry| entry.enabled)
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn constants_buffer(&self) -> Option<BufferHandle> {
        self.constants
    }
}

impl Default for PostProcessPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderPlugin for PostProcessPlugin {
    fn id(&self) -> &str {
        Self::ID
    }

    fn signatures(&mut self, builder: &mut SignatureBuilder) -> Result<(), GraphicsError> {
        builder.add_constant_buffer(ShaderStages::FRAGMENT, Self::CONSTANTS, VariableKind::Mutable);
        Ok(())
    }

    fn initialize(&mut self, ctx: &mut RenderContext, _size: Extent2d) -> Result<(), GraphicsError> {
        let buffer = ctx.create_buffer(
            &BufferDescriptor::constant::<PostProcessConstants>().with_label(Self::CONSTANTS),
        )?;
        ctx.enqueue_barrier(buffer, ResourceState::Undefined, ResourceState::ConstantBuffer);
        ctx.mutable_binder()?
            .set(Self::CONSTANTS, BoundResource::Buffer(buffer))?;
        self.constants = Some(buffer);
        Ok(())
    }

    fn upload(&mut self, ctx: &mut RenderContext) -> Result<(), GraphicsError> {
        for entry in &mut self.effects {
            entry.effect.init(ctx)?;
        }
        self.uploaded = true;
        Ok(())
    }

    fn post_render(
        &mut self,
        ctx: &mut RenderContext,
        _camera: &dyn Camera,
        target: &mut RenderTarget,
    ) -> Result<(), GraphicsError> {
        let Some(buffer) = self.constants else {
            return Err(GraphicsError::NotInitialized);
        };

        let size = target.size();
        let (width, height) = (size.width.max(1) as f32, size.height.max(1) as f32);
        for (index, entry) in self.effects.iter_mut().enumerate() {
            if !entry.enabled {
                continue;
            }

            let constants = PostProcessConstants {
                source_index: target.color_index(),
                effect_index: index as u32,
                frame: ctx.frame() as u32,
                _padding: 0,
                resolution: [width, height, 1.0 / width, 1.0 / height],
            };
            ctx.write_uniform(buffer, &constants)?;

            target.begin_record(ctx, None)?;
            let result = entry.effect.apply(ctx, target);
            target.end_record(ctx);
            result?;
        }
        Ok(())
    }
}
