//! Opaque handles to backend-owned objects.
//!
//! Handles are plain ids minted by the backend. Zero is reserved as the null
//! handle and is never returned from a successful creation call.

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            /// The null handle.
            pub const NULL: Self = Self(0);

            /// Wrap a raw backend id.
            pub const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            /// The raw backend id.
            pub const fn raw(self) -> u64 {
                self.0
            }

            /// Returns true for the null handle.
            pub const fn is_null(self) -> bool {
                self.0 == 0
            }
        }
    };
}

define_handle!(
    /// A GPU texture.
    TextureHandle
);
define_handle!(
    /// A shader-readable view of a texture. This is what the bindless table indexes.
    TextureViewHandle
);
define_handle!(
    /// A GPU buffer.
    BufferHandle
);
define_handle!(
    /// A sampler object.
    SamplerHandle
);
define_handle!(
    /// A compiled shader module.
    ShaderHandle
);
define_handle!(
    /// A graphics or compute pipeline state object.
    PipelineHandle
);
define_handle!(
    /// A resource signature (the shared bindless binding layout).
    SignatureHandle
);
define_handle!(
    /// A resource binding object holding mutable and dynamic variables.
    BindingHandle
);

/// A resource that can take part in a state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceRef {
    Texture(TextureHandle),
    Buffer(BufferHandle),
}

impl From<TextureHandle> for ResourceRef {
    fn from(texture: TextureHandle) -> Self {
        Self::Texture(texture)
    }
}

impl From<BufferHandle> for ResourceRef {
    fn from(buffer: BufferHandle) -> Self {
        Self::Buffer(buffer)
    }
}
