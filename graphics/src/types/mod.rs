//! Common types and descriptors for graphics resources.
//!
//! This module contains format enums, usage flags, resource states, device
//! feature flags and the descriptor structs passed to the backend.

mod buffer;
mod common;
mod features;
mod sampler;
mod state;
mod texture;

pub use buffer::{BufferDescriptor, BufferUsage};
pub use common::{Color, Extent2d, ScreenRect};
pub use features::{DeviceFeatures, DeviceInfo, DeviceRequest};
pub use sampler::{AddressMode, CompareFunction, FilterMode, SamplerDescriptor};
pub use state::ResourceState;
pub use texture::{TextureDescriptor, TextureFormat, TextureUsage};
