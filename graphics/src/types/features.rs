//! Device feature flags and device requests.

use bitflags::bitflags;

bitflags! {
    /// Optional device capabilities the renderer or its plugins can request.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DeviceFeatures: u32 {
        /// Polygon fill mode `Wireframe`.
        const WIREFRAME_FILL = 1 << 0;
        /// Sparse (partially resident) resources.
        const SPARSE_RESOURCES = 1 << 1;
        /// Bindless descriptor indexing.
        const BINDLESS_RESOURCES = 1 << 2;
        /// Runtime-sized shader resource arrays.
        const RUNTIME_SHADER_ARRAYS = 1 << 3;
        /// Compute shaders.
        const COMPUTE_SHADERS = 1 << 4;
        /// GPU timestamp queries.
        const DURATION_QUERIES = 1 << 5;
    }
}

impl Default for DeviceFeatures {
    /// The features the core itself relies on.
    fn default() -> Self {
        Self::WIREFRAME_FILL
            | Self::SPARSE_RESOURCES
            | Self::BINDLESS_RESOURCES
            | Self::RUNTIME_SHADER_ARRAYS
    }
}

/// Everything the backend needs to create a device.
///
/// Built from [`RendererConfig`](crate::RendererConfig) and then handed to every
/// plugin's `requirements` hook before device creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRequest {
    /// Features that must be present; device creation fails otherwise.
    pub required: DeviceFeatures,
    /// Features that are enabled when available.
    pub optional: DeviceFeatures,
    /// Size hint for the shader-visible descriptor heap (0 = backend default).
    pub descriptor_heap_size: u32,
}

impl DeviceRequest {
    pub fn new(required: DeviceFeatures) -> Self {
        Self {
            required,
            optional: DeviceFeatures::empty(),
            descriptor_heap_size: 0,
        }
    }

    /// Mark features as required.
    pub fn require(&mut self, features: DeviceFeatures) -> &mut Self {
        self.required |= features;
        self
    }

    /// Mark features as optional.
    pub fn request(&mut self, features: DeviceFeatures) -> &mut Self {
        self.optional |= features;
        self
    }

    /// Raise the heap size hint to at least `size`.
    pub fn reserve_descriptors(&mut self, size: u32) -> &mut Self {
        self.descriptor_heap_size = self.descriptor_heap_size.max(size);
        self
    }
}

impl Default for DeviceRequest {
    fn default() -> Self {
        Self::new(DeviceFeatures::default())
    }
}

/// Properties of a created device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Human-readable adapter name.
    pub name: String,
    /// Features that were actually enabled.
    pub features: DeviceFeatures,
    /// Hard limit on descriptors in a single bindless array.
    pub max_bindless_descriptors: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_accumulates() {
        let mut request = DeviceRequest::default();
        request
            .require(DeviceFeatures::COMPUTE_SHADERS)
            .request(DeviceFeatures::DURATION_QUERIES)
            .reserve_descriptors(512)
            .reserve_descriptors(128);

        assert!(request.required.contains(DeviceFeatures::BINDLESS_RESOURCES));
        assert!(request.required.contains(DeviceFeatures::COMPUTE_SHADERS));
        assert_eq!(request.optional, DeviceFeatures::DURATION_QUERIES);
        assert_eq!(request.descriptor_heap_size, 512);
    }
}
