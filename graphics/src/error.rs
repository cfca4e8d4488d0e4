//! Graphics error types.

use crate::assets::AssetError;
use crate::backend::BackendError;
use crate::bindless::BindlessKind;

/// Errors that can occur in the render core.
///
/// Every variant is fatal for the operation that produced it: startup aborts,
/// or the current frame is abandoned. Cache lookups never produce errors, they
/// return `Option` instead.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphicsError {
    /// A resource handed to the core is null or unknown to the backend.
    #[error("invalid resource: {0}")]
    InvalidResource(String),

    /// The bindless table hit the device descriptor limit.
    #[error("bindless {kind:?} table exceeded the device limit of {limit} descriptors")]
    CapacityExceeded { kind: BindlessKind, limit: u32 },

    /// A shader failed to load, preprocess, parse or validate.
    #[error("failed to compile shader '{source_id}':\n{diagnostics}")]
    CompileError {
        source_id: String,
        diagnostics: String,
    },

    /// The backend refused to build a pipeline, or a static variable was missing.
    #[error("failed to create pipeline '{name}': {reason}")]
    PipelineCreationError { name: String, reason: String },

    /// A frame operation was called before `init()`.
    #[error("renderer is not initialized")]
    NotInitialized,

    /// `render()` was called without a draw callback.
    #[error("no draw callback set")]
    MissingDrawCallback,

    /// Device, context or swapchain creation failed.
    #[error("unsupported backend: {0}")]
    UnsupportedBackend(String),

    /// An invalid parameter was provided.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Intro media could not be decoded.
    #[error("failed to decode media '{path}': {reason}")]
    MediaDecode { path: String, reason: String },

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphicsError::NotInitialized;
        assert_eq!(err.to_string(), "renderer is not initialized");

        let err = GraphicsError::PipelineCreationError {
            name: "Model::Base".into(),
            reason: "could not find variable 'Constants'".into(),
        };
        assert_eq!(
            err.to_string(),
            "failed to create pipeline 'Model::Base': could not find variable 'Constants'"
        );
    }

    #[test]
    fn test_capacity_display() {
        let err = GraphicsError::CapacityExceeded {
            kind: BindlessKind::Texture,
            limit: 64,
        };
        assert_eq!(
            err.to_string(),
            "bindless Texture table exceeded the device limit of 64 descriptors"
        );
    }

    #[test]
    fn test_backend_error_converts() {
        let err: GraphicsError = BackendError::DeviceLost.into();
        assert_eq!(err, GraphicsError::Backend(BackendError::DeviceLost));
        assert_eq!(err.to_string(), "GPU device lost");
    }
}
