//! Render plugins: named, ordered render features with a fixed lifecycle.
//!
//! # Lifecycle
//!
//! | Hook            | When                                          |
//! |-----------------|-----------------------------------------------|
//! | `requirements`  | before device creation                        |
//! | `signatures`    | once, while the resource signature is built   |
//! | `bind_static`   | once, after the signature is created          |
//! | `bind_mutable`  | once, after `bind_static`                     |
//! | `initialize`    | once                                          |
//! | `upload`        | once, after the fallback textures exist       |
//! | `resize`        | on output size change                         |
//! | `update`        | every tick while enabled                      |
//! | `pre_render`    | every frame while enabled, before the opaque pass |
//! | `post_render`   | every frame while enabled, after the opaque pass  |
//!
//! Per-frame hooks run in registration order. Disabling a plugin skips its
//! per-frame hooks without changing its position in the chain.

mod post_process;

pub use post_process::{
    FullscreenEffect, PostProcessConstants, PostProcessEffect, PostProcessPlugin,
};

use std::any::Any;

use crate::bindless::{SignatureBinder, SignatureBuilder};
use crate::context::RenderContext;
use crate::error::GraphicsError;
use crate::frame::{Camera, RenderTarget};
use crate::shader::MacroSet;
use crate::types::{DeviceRequest, Extent2d};

/// Downcasting support for plugins.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A render feature plugged into the frame.
///
/// Every hook defaults to a no-op.
pub trait RenderPlugin: AsAny + Send {
    /// Unique id within a chain.
    fn id(&self) -> &str;

    fn requirements(&self, _request: &mut DeviceRequest) -> Result<(), GraphicsError> {
        Ok(())
    }

    fn signatures(&mut self, _builder: &mut SignatureBuilder) -> Result<(), GraphicsError> {
        Ok(())
    }

    fn bind_static(&mut self, _binder: &mut SignatureBinder<'_>) -> Result<(), GraphicsError> {
        Ok(())
    }

    fn bind_mutable(&mut self, _binder: &mut SignatureBinder<'_>) -> Result<(), GraphicsError> {
        Ok(())
    }

    fn initialize(&mut self, _ctx: &mut RenderContext, _size: Extent2d) -> Result<(), GraphicsError> {
        Ok(())
    }

    fn resize(&mut self, _ctx: &mut RenderContext, _size: Extent2d) -> Result<(), GraphicsError> {
        Ok(())
    }

    fn upload(&mut self, _ctx: &mut RenderContext) -> Result<(), GraphicsError> {
        Ok(())
    }

    fn update(&mut self, _ctx: &mut RenderContext) -> Result<(), GraphicsError> {
        Ok(())
    }

    fn pre_render(
        &mut self,
        _ctx: &mut RenderContext,
        _camera: &dyn Camera,
    ) -> Result<(), GraphicsError> {
        Ok(())
    }

    fn post_render(
        &mut self,
        _ctx: &mut RenderContext,
        _camera: &dyn Camera,
        _target: &mut RenderTarget,
    ) -> Result<(), GraphicsError> {
        Ok(())
    }

    /// Defines this plugin exposes to material shaders.
    fn shader_macros(&self) -> Option<MacroSet> {
        None
    }
}

/// A plugin and its chain state.
pub struct PluginEntry {
    id: String,
    enabled: bool,
    plugin: Box<dyn RenderPlugin>,
}

impl PluginEntry {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn plugin(&self) -> &dyn RenderPlugin {
        self.plugin.as_ref()
    }
}

impl std::fmt::Debug for PluginEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginEntry")
            .field("id", &self.id)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Ordered list of plugins, queryable by id.
#[derive(Debug, Default)]
pub struct RenderPluginChain {
    entries: Vec<PluginEntry>,
}

impl RenderPluginChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `plugin`, enabled.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidParameter`] if a plugin with the same id exists.
    pub fn add(&mut self, plugin: impl RenderPlugin) -> Result<(), GraphicsError> {
        self.add_boxed(Box::new(plugin))
    }

    pub fn add_boxed(&mut self, plugin: Box<dyn RenderPlugin>) -> Result<(), GraphicsError> {
        let id = plugin.id().to_string();
        if self.position(&id).is_some() {
            return Err(GraphicsError::InvalidParameter(format!(
                "plugin '{id}' is already registered"
            )));
        }
        log::debug!("RenderPluginChain: added '{id}'");
        self.entries.push(PluginEntry {
            id,
            enabled: true,
            plugin,
        });
        Ok(())
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&dyn RenderPlugin> {
        self.entries
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| entry.plugin.as_ref())
    }

    /// The plugin `id` as its concrete type.
    pub fn get_as<T: RenderPlugin>(&self, id: &str) -> Option<&T> {
        self.get(id)?.as_any().downcast_ref::<T>()
    }

    pub fn get_as_mut<T: RenderPlugin>(&mut self, id: &str) -> Option<&mut T> {
        let entry = self.entries.iter_mut().find(|entry| entry.id == id)?;
        entry.plugin.as_mut().as_any_mut().downcast_mut::<T>()
    }

    /// Enable or disable `id`. Returns false if no such plugin exists.
    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> bool {
        match self.entries.iter_mut().find(|entry| entry.id == id) {
            Some(entry) => {
                entry.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.id == id && entry.enabled)
    }

    /// Ids in registration order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.id.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &PluginEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Union of every plugin's shader macros, in registration order.
    pub fn shader_macros(&self) -> MacroSet {
        let mut macros = MacroSet::new();
        for entry in &self.entries {
            if let Some(plugin_macros) = entry.plugin.shader_macros() {
                macros.merge(&plugin_macros);
            }
        }
        macros
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    // ---- dispatch -----------------------------------------------------------

    pub(crate) fn requirements(&self, request: &mut DeviceRequest) -> Result<(), GraphicsError> {
        for entry in &self.entries {
            entry.plugin.requirements(request)?;
        }
        Ok(())
    }

    pub(crate) fn signatures(&mut self, builder: &mut SignatureBuilder) -> Result<(), GraphicsError> {
        for entry in &mut self.entries {
            entry.plugin.signatures(builder)?;
        }
        Ok(())
    }

    pub(crate) fn bind_static(&mut self, binder: &mut SignatureBinder<'_>) -> Result<(), GraphicsError> {
        for entry in &mut self.entries {
            entry.plugin.bind_static(binder)?;
        }
        Ok(())
    }

    pub(crate) fn bind_mutable(&mut self, binder: &mut SignatureBinder<'_>) -> Result<(), GraphicsError> {
        for entry in &mut self.entries {
            entry.plugin.bind_mutable(binder)?;
        }
        Ok(())
    }

    pub(crate) fn initialize(&mut self, ctx: &mut RenderContext, size: Extent2d) -> Result<(), GraphicsError> {
        for entry in &mut self.entries {
            entry.plugin.initialize(ctx, size)?;
        }
        Ok(())
    }

    pub(crate) fn resize(&mut self, ctx: &mut RenderContext, size: Extent2d) -> Result<(), GraphicsError> {
        for entry in &mut self.entries {
            entry.plugin.resize(ctx, size)?;
        }
        Ok(())
    }

    pub(crate) fn upload(&mut self, ctx: &mut RenderContext) -> Result<(), GraphicsError> {
        for entry in &mut self.entries {
            entry.plugin.upload(ctx)?;
        }
        Ok(())
    }

    pub(crate) fn update(&mut self, ctx: &mut RenderContext) -> Result<(), GraphicsError> {
        for entry in self.entries.iter_mut().filter(|entry| entry.enabled) {
            entry.plugin.update(ctx)?;
        }
        Ok(())
    }

    pub(crate) fn pre_render(
        &mut self,
        ctx: &mut RenderContext,
        camera: &dyn Camera,
    ) -> Result<(), GraphicsError> {
        for entry in self.entries.iter_mut().filter(|entry| entry.enabled) {
            entry.plugin.pre_render(ctx, camera)?;
        }
        Ok(())
    }

    pub(crate) fn post_render(
        &mut self,
        ctx: &mut RenderContext,
        camera: &dyn Camera,
        target: &mut RenderTarget,
    ) -> Result<(), GraphicsError> {
        for entry in self.entries.iter_mut().filter(|entry| entry.enabled) {
            entry.plugin.post_render(ctx, camera, target)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    impl RenderPlugin for Named {
        fn id(&self) -> &str {
            self.0
        }

        fn shader_macros(&self) -> Option<MacroSet> {
            Some(MacroSet::new().with(format!("HAS_{}", self.0.to_uppercase()), true))
        }
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut chain = RenderPluginChain::new();
        chain.add(Named("Lighting")).unwrap();
        assert!(matches!(
            chain.add(Named("Lighting")),
            Err(GraphicsError::InvalidParameter(_))
        ));
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_disable_keeps_order() {
        let mut chain = RenderPluginChain::new();
        for id in ["A", "B", "C"] {
            chain.add(Named(id)).unwrap();
        }
        assert!(chain.set_enabled("B", false));
        assert!(!chain.set_enabled("Missing", false));

        assert_eq!(chain.ids().collect::<Vec<_>>(), vec!["A", "B", "C"]);
        assert!(!chain.is_enabled("B"));
        assert!(chain.is_enabled("C"));
    }

    #[test]
    fn test_downcast() {
        let mut chain = RenderPluginChain::new();
        chain.add(Named("A")).unwrap();
        assert!(chain.get_as::<Named>("A").is_some());
        assert!(chain.get_as::<PostProcessPlugin>("A").is_none());
        assert!(chain.get_as_mut::<Named>("A").is_some());
        assert!(chain.get("B").is_none());
    }

    #[test]
    fn test_shader_macros_merge() {
        let mut chain = RenderPluginChain::new();
        chain.add(Named("fog")).unwrap();
        chain.add(Named("light")).unwrap();
        let macros = chain.shader_macros();
        assert!(macros.contains("HAS_FOG"));
        assert!(macros.contains("HAS_LIGHT"));
    }
}
