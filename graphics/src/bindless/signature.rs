//! Resource signatures: the binding layout shared by every bindless pipeline.
//!
//! The core contributes the camera constants and the two bindless texture
//! arrays; each plugin appends its own entries during the `signatures` hook.
//! Once created, static variables are bound through a [`SignatureBinder`]
//! and a binding object is created for the mutable ones.

use crate::backend::{
    BindTarget, BindingHandle, BoundResource, GpuBackend, ImmutableSamplerBinding,
    SignatureHandle,
};
use crate::error::GraphicsError;
use crate::shader::ShaderStages;

/// How often a shader variable is expected to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VariableKind {
    /// Bound once on the signature or pipeline.
    Static,
    /// Bound on a binding object; may change between frames.
    #[default]
    Mutable,
    /// Bound on a binding object; may change between draws.
    Dynamic,
}

/// Shape of a signature entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureResourceKind {
    ConstantBuffer,
    StructuredBuffer,
    Texture,
    /// A texture array; `runtime_sized` arrays ignore `len`.
    TextureArray { len: u32, runtime_sized: bool },
    Sampler,
}

/// One variable declared by a signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignatureEntry {
    pub stages: ShaderStages,
    pub name: String,
    pub kind: SignatureResourceKind,
    pub variable: VariableKind,
}

/// Input to [`GpuBackend::create_signature`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureDescriptor {
    pub label: String,
    pub entries: Vec<SignatureEntry>,
    pub immutable_samplers: Vec<ImmutableSamplerBinding>,
}

/// Accumulates signature entries from the core and its plugins.
#[derive(Debug, Clone, Default)]
pub struct SignatureBuilder {
    descriptor: SignatureDescriptor,
}

impl SignatureBuilder {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            descriptor: SignatureDescriptor {
                label: label.into(),
                ..Default::default()
            },
        }
    }

    pub fn add(&mut self, entry: SignatureEntry) -> &mut Self {
        self.descriptor.entries.push(entry);
        self
    }

    pub fn add_constant_buffer(
        &mut self,
        stages: ShaderStages,
        name: impl Into<String>,
        variable: VariableKind,
    ) -> &mut Self {
        self.add(SignatureEntry {
            stages,
            name: name.into(),
            kind: SignatureResourceKind::ConstantBuffer,
            variable,
        })
    }

    pub fn add_structured_buffer(
        &mut self,
        stages: ShaderStages,
        name: impl Into<String>,
        variable: VariableKind,
    ) -> &mut Self {
        self.add(SignatureEntry {
            stages,
            name: name.into(),
            kind: SignatureResourceKind::StructuredBuffer,
            variable,
        })
    }

    /// Add a runtime-sized texture array, the shape of a bindless table.
    pub fn add_bindless_array(
        &mut self,
        stages: ShaderStages,
        name: impl Into<String>,
    ) -> &mut Self {
        self.add(SignatureEntry {
            stages,
            name: name.into(),
            kind: SignatureResourceKind::TextureArray {
                len: 0,
                runtime_sized: true,
            },
            variable: VariableKind::Mutable,
        })
    }

    pub fn add_immutable_sampler(&mut self, sampler: ImmutableSamplerBinding) -> &mut Self {
        self.descriptor.immutable_samplers.push(sampler);
        self
    }

    pub fn entries(&self) -> &[SignatureEntry] {
        &self.descriptor.entries
    }

    /// Finish the descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidParameter`] if two entries share a name.
    pub fn build(self) -> Result<SignatureDescriptor, GraphicsError> {
        let entries = &self.descriptor.entries;
        for (i, entry) in entries.iter().enumerate() {
            if entries[..i].iter().any(|other| other.name == entry.name) {
                return Err(GraphicsError::InvalidParameter(format!(
                    "signature '{}' declares '{}' twice",
                    self.descriptor.label, entry.name
                )));
            }
        }
        Ok(self.descriptor)
    }
}

/// A created signature plus its binding object.
#[derive(Debug, Clone)]
pub struct ResourceSignature {
    handle: SignatureHandle,
    binding: Option<BindingHandle>,
    descriptor: SignatureDescriptor,
}

impl ResourceSignature {
    /// Create the signature on the backend.
    pub fn create(
        backend: &mut dyn GpuBackend,
        descriptor: SignatureDescriptor,
    ) -> Result<Self, GraphicsError> {
        let handle = backend.create_signature(&descriptor)?;
        log::debug!(
            "ResourceSignature: created '{}' with {} entries",
            descriptor.label,
            descriptor.entries.len()
        );
        Ok(Self {
            handle,
            binding: None,
            descriptor,
        })
    }

    pub fn handle(&self) -> SignatureHandle {
        self.handle
    }

    /// The binding object, once [`create_binding`](Self::create_binding) ran.
    pub fn binding(&self) -> Option<BindingHandle> {
        self.binding
    }

    pub fn entries(&self) -> &[SignatureEntry] {
        &self.descriptor.entries
    }

    pub fn entry(&self, name: &str) -> Option<&SignatureEntry> {
        self.descriptor.entries.iter().find(|e| e.name == name)
    }

    /// Create the binding object for mutable and dynamic variables.
    pub fn create_binding(
        &mut self,
        backend: &mut dyn GpuBackend,
    ) -> Result<BindingHandle, GraphicsError> {
        let binding = backend.create_binding(BindTarget::Signature(self.handle))?;
        self.binding = Some(binding);
        Ok(binding)
    }

    /// Destroy the binding object and the signature.
    pub fn destroy(self, backend: &mut dyn GpuBackend) {
        if let Some(binding) = self.binding {
            backend.destroy_binding(binding);
        }
        backend.destroy_signature(self.handle);
    }

    /// Binder for static variables.
    pub fn static_binder<'a>(&'a self, backend: &'a mut dyn GpuBackend) -> SignatureBinder<'a> {
        SignatureBinder {
            backend,
            signature: self,
            binding: None,
        }
    }

    /// Binder for mutable and dynamic variables.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidParameter`] if the binding object does not exist yet.
    pub fn mutable_binder<'a>(
        &'a self,
        backend: &'a mut dyn GpuBackend,
    ) -> Result<SignatureBinder<'a>, GraphicsError> {
        let binding = self.binding.ok_or_else(|| {
            GraphicsError::InvalidParameter(format!(
                "signature '{}' has no binding object",
                self.descriptor.label
            ))
        })?;
        Ok(SignatureBinder {
            backend,
            signature: self,
            binding: Some(binding),
        })
    }
}

/// Binds resources to the variables of a [`ResourceSignature`].
///
/// Handed to the `bind_static` and `bind_mutable` plugin hooks.
pub struct SignatureBinder<'a> {
    backend: &'a mut dyn GpuBackend,
    signature: &'a ResourceSignature,
    /// `None` for the static binder.
    binding: Option<BindingHandle>,
}

impl SignatureBinder<'_> {
    /// Returns true for the binder passed to `bind_static`.
    pub fn is_static(&self) -> bool {
        self.binding.is_none()
    }

    /// Bind `resource` to the variable `name`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidParameter`] if the signature has no such
    /// variable or it has the wrong [`VariableKind`] for this binder.
    pub fn set(&mut self, name: &str, resource: BoundResource) -> Result<(), GraphicsError> {
        let entry = self.signature.entry(name).ok_or_else(|| {
            GraphicsError::InvalidParameter(format!("signature has no variable '{name}'"))
        })?;

        match (self.binding, entry.variable) {
            (None, VariableKind::Static) => {
                self.backend.set_static_variable(
                    BindTarget::Signature(self.signature.handle),
                    entry.stages,
                    name,
                    resource,
                )?;
            }
            (Some(binding), VariableKind::Mutable | VariableKind::Dynamic) => {
                self.backend
                    .set_mutable_variable(binding, entry.stages, name, resource)?;
            }
            (_, variable) => {
                return Err(GraphicsError::InvalidParameter(format!(
                    "variable '{name}' is {variable:?} and cannot be set through a {} binder",
                    if self.is_static() { "static" } else { "mutable" }
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BufferHandle, DummyBackend};
    use crate::types::{BufferDescriptor, DeviceRequest};

    fn builder() -> SignatureBuilder {
        let mut builder = SignatureBuilder::new("Test");
        builder
            .add_constant_buffer(ShaderStages::GRAPHICS, "Camera", VariableKind::Static)
            .add_bindless_array(ShaderStages::FRAGMENT, "g_Textures");
        builder
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut builder = builder();
        builder.add_constant_buffer(ShaderStages::VERTEX, "Camera", VariableKind::Static);
        assert!(matches!(
            builder.build(),
            Err(GraphicsError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_binders_respect_variable_kind() {
        let mut backend = DummyBackend::new();
        backend.create_device(&DeviceRequest::default()).unwrap();
        let buffer = backend
            .create_buffer(&BufferDescriptor::new(64, Default::default()))
            .unwrap();
        let texture = BoundResource::Buffer(BufferHandle::NULL);

        let mut signature =
            ResourceSignature::create(&mut backend, builder().build().unwrap()).unwrap();
        assert!(signature.mutable_binder(&mut backend).is_err());

        signature
            .static_binder(&mut backend)
            .set("Camera", BoundResource::Buffer(buffer))
            .unwrap();
        assert!(
            signature
                .static_binder(&mut backend)
                .set("g_Textures", texture)
                .is_err()
        );
        assert!(
            signature
                .static_binder(&mut backend)
                .set("Missing", texture)
                .is_err()
        );

        signature.create_binding(&mut backend).unwrap();
        let mut binder = signature.mutable_binder(&mut backend).unwrap();
        assert!(!binder.is_static());
        binder.set("g_Textures", texture).unwrap();
        assert!(binder.set("Camera", BoundResource::Buffer(buffer)).is_err());
    }
}
