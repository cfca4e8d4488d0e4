//! Resource states used by state transitions.

use super::BufferUsage;

/// The access state a GPU resource is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceState {
    /// Contents are undefined (freshly created).
    #[default]
    Undefined,
    /// Destination of a copy or upload.
    CopyDest,
    /// Source of a copy.
    CopySource,
    /// Bound as a color render target.
    RenderTarget,
    /// Bound as a depth target with writes enabled.
    DepthWrite,
    /// Read by shaders.
    ShaderResource,
    /// Read/write access from shaders.
    UnorderedAccess,
    /// Bound as a constant buffer.
    ConstantBuffer,
    /// Bound as a vertex buffer.
    VertexBuffer,
    /// Bound as an index buffer.
    IndexBuffer,
    /// Ready for presentation.
    Present,
}

impl ResourceState {
    /// The state a buffer must be in to be read through its primary usage.
    ///
    /// Usages are checked from most to least specific; a buffer with no
    /// shader-visible usage maps to [`ResourceState::CopyDest`].
    pub fn for_buffer_usage(usage: BufferUsage) -> Self {
        if usage.contains(BufferUsage::CONSTANT) {
            Self::ConstantBuffer
        } else if usage.contains(BufferUsage::INDEX) {
            Self::IndexBuffer
        } else if usage.contains(BufferUsage::VERTEX) {
            Self::VertexBuffer
        } else if usage.contains(BufferUsage::UNORDERED_ACCESS) {
            Self::UnorderedAccess
        } else if usage.contains(BufferUsage::SHADER_RESOURCE) {
            Self::ShaderResource
        } else {
            Self::CopyDest
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_usage_mapping() {
        assert_eq!(
            ResourceState::for_buffer_usage(BufferUsage::CONSTANT | BufferUsage::COPY_DST),
            ResourceState::ConstantBuffer
        );
        assert_eq!(
            ResourceState::for_buffer_usage(BufferUsage::INDEX),
            ResourceState::IndexBuffer
        );
        assert_eq!(
            ResourceState::for_buffer_usage(BufferUsage::SHADER_RESOURCE),
            ResourceState::ShaderResource
        );
        assert_eq!(
            ResourceState::for_buffer_usage(BufferUsage::COPY_DST),
            ResourceState::CopyDest
        );
    }
}
