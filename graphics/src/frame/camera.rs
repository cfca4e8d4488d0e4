//! Cameras and their GPU uniform.
//!
//! The orchestrator owns the camera constant buffer and writes
//! [`Camera::uniform`] into it every frame; cameras themselves never touch
//! the GPU.

use glam::{Mat4, Vec3};

use crate::context::RenderContext;
use crate::error::GraphicsError;
use crate::types::Extent2d;

/// Layout of the `Camera` constant buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub view_projection: [[f32; 4]; 4],
    /// World position, w unused.
    pub position: [f32; 4],
    /// Width, height, 1/width, 1/height.
    pub viewport: [f32; 4],
}

static_assertions::const_assert_eq!(std::mem::size_of::<CameraUniform>(), 224);

impl CameraUniform {
    fn new(view: Mat4, projection: Mat4, position: Vec3, size: Extent2d) -> Self {
        let (width, height) = (size.width.max(1) as f32, size.height.max(1) as f32);
        Self {
            view: view.to_cols_array_2d(),
            projection: projection.to_cols_array_2d(),
            view_projection: (projection * view).to_cols_array_2d(),
            position: position.extend(1.0).to_array(),
            viewport: [width, height, 1.0 / width, 1.0 / height],
        }
    }
}

/// The view the opaque pass renders from.
pub trait Camera: Send {
    /// Called once during `init`, after the plugins bound their resources.
    fn initialize(&mut self, _ctx: &mut RenderContext) -> Result<(), GraphicsError> {
        Ok(())
    }

    /// Per-tick update while no intro is playing.
    fn update(&mut self, _dt: f32) {}

    fn resize(&mut self, size: Extent2d);

    fn view(&self) -> Mat4;

    fn projection(&self) -> Mat4;

    fn position(&self) -> Vec3;

    fn size(&self) -> Extent2d;

    fn uniform(&self) -> CameraUniform {
        CameraUniform::new(self.view(), self.projection(), self.position(), self.size())
    }
}

/// Right-handed perspective camera looking at a target point.
#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveCamera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
    size: Extent2d,
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 2.0, -5.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y: 60f32.to_radians(),
            near: 0.01,
            far: 1000.0,
            size: Extent2d::new(1, 1),
        }
    }
}

impl PerspectiveCamera {
    pub fn new(position: Vec3, target: Vec3) -> Self {
        Self {
            position,
            target,
            ..Default::default()
        }
    }

    pub fn with_fov(mut self, fov_y: f32) -> Self {
        self.fov_y = fov_y;
        self
    }

    pub fn with_clip(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }
}

impl Camera for PerspectiveCamera {
    fn resize(&mut self, size: Extent2d) {
        self.size = size;
    }

    fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.size.aspect_ratio(), self.near, self.far)
    }

    fn position(&self) -> Vec3 {
        self.position
    }

    fn size(&self) -> Extent2d {
        self.size
    }
}
