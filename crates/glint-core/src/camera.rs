//! Cameras and projection helpers.
//!
//! All projections follow the wgpu clip-space convention: right-handed view
//! space looking down -Z, and depth mapped to `[0, 1]`.

use glam::{Mat4, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// Anything that can be rendered from.
pub trait CameraView {
    /// World-to-view transform.
    fn view_matrix(&self) -> Mat4;

    /// View-to-clip transform.
    fn projection_matrix(&self) -> Mat4;

    /// Far clip distance.
    fn far(&self) -> f32;

    /// View-to-world transform.
    fn world_matrix(&self) -> Mat4 {
        self.view_matrix().inverse()
    }

    /// Camera position in world space.
    fn position(&self) -> Vec3 {
        self.world_matrix().w_axis.truncate()
    }

    fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

/// Camera projection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProjectionMode {
    /// Perspective projection.
    #[default]
    Perspective,
    /// Orthographic projection.
    Orthographic,
}

/// Extents of an orthographic view volume in view space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrthoBounds {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
}

impl OrthoBounds {
    /// Bounds centered on the view axis.
    pub fn centered(width: f32, height: f32) -> Self {
        Self {
            left: -width * 0.5,
            right: width * 0.5,
            bottom: -height * 0.5,
            top: height * 0.5,
        }
    }
}

impl Default for OrthoBounds {
    fn default() -> Self {
        Self::centered(2.0, 2.0)
    }
}

/// Renders only a sub-rectangle of a larger virtual viewport.
///
/// Offsets are measured in pixels from the top-left corner of the full view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewOffset {
    pub full_width: f32,
    pub full_height: f32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Off-axis perspective projection with `[0, 1]` depth.
#[must_use]
pub fn frustum_rh(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    let x = 2.0 * near / (right - left);
    let y = 2.0 * near / (top - bottom);
    let a = (right + left) / (right - left);
    let b = (top + bottom) / (top - bottom);
    let c = far / (near - far);
    let d = near * far / (near - far);
    Mat4::from_cols(
        Vec4::new(x, 0.0, 0.0, 0.0),
        Vec4::new(0.0, y, 0.0, 0.0),
        Vec4::new(a, b, c, -1.0),
        Vec4::new(0.0, 0.0, d, 0.0),
    )
}

/// A look-at camera with perspective or orthographic projection.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Camera position in world space.
    pub position: Vec3,
    /// Point the camera looks at.
    pub target: Vec3,
    /// Up direction.
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov: f32,
    /// Width / height.
    pub aspect_ratio: f32,
    /// Near clip distance.
    pub near: f32,
    /// Far clip distance.
    pub far: f32,
    pub projection_mode: ProjectionMode,
    /// View volume used in orthographic mode.
    pub ortho_bounds: OrthoBounds,
    view_offset: Option<ViewOffset>,
}

impl Camera {
    /// Creates a perspective camera at `(0, 0, 5)` looking at the origin.
    pub fn new(aspect_ratio: f32) -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov: 45.0_f32.to_radians(),
            aspect_ratio,
            near: 0.1,
            far: 100.0,
            projection_mode: ProjectionMode::Perspective,
            ortho_bounds: OrthoBounds::default(),
            view_offset: None,
        }
    }

    /// Creates a perspective camera with the given vertical field of view in degrees.
    pub fn perspective(fov_degrees: f32, aspect_ratio: f32, near: f32, far: f32) -> Self {
        Self {
            fov: fov_degrees.to_radians(),
            near,
            far,
            ..Self::new(aspect_ratio)
        }
    }

    /// Creates an orthographic camera.
    pub fn orthographic(bounds: OrthoBounds, near: f32, far: f32) -> Self {
        let width = bounds.right - bounds.left;
        let height = bounds.top - bounds.bottom;
        Self {
            near,
            far,
            projection_mode: ProjectionMode::Orthographic,
            ortho_bounds: bounds,
            ..Self::new(width / height)
        }
    }

    /// Places the camera at `position` looking at `target`.
    #[must_use]
    pub fn looking_at(mut self, position: Vec3, target: Vec3, up: Vec3) -> Self {
        self.look_at(position, target, up);
        self
    }

    pub fn look_at(&mut self, position: Vec3, target: Vec3, up: Vec3) {
        self.position = position;
        self.target = target;
        self.up = up;
    }

    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) {
        self.aspect_ratio = aspect_ratio;
    }

    /// Restricts rendering to a sub-rectangle of a `full_width` x `full_height` view.
    pub fn set_view_offset(
        &mut self,
        full_width: f32,
        full_height: f32,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) {
        self.view_offset = Some(ViewOffset {
            full_width,
            full_height,
            x,
            y,
            width,
            height,
        });
    }

    pub fn clear_view_offset(&mut self) {
        self.view_offset = None;
    }

    pub fn view_offset(&self) -> Option<ViewOffset> {
        self.view_offset
    }

    /// Returns the forward direction (normalized).
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize()
    }

    /// Returns the right direction (normalized).
    pub fn right(&self) -> Vec3 {
        self.forward().cross(self.up).normalize()
    }

    fn perspective_projection(&self) -> Mat4 {
        let top = self.near * (self.fov * 0.5).tan();
        let height = 2.0 * top;
        let width = self.aspect_ratio * height;
        let mut left = -0.5 * width;
        let mut top = top;
        let mut width = width;
        let mut height = height;
        if let Some(view) = self.view_offset {
            left += view.x * width / view.full_width;
            top -= view.y * height / view.full_height;
            width *= view.width / view.full_width;
            height *= view.height / view.full_height;
        }
        frustum_rh(left, left + width, top - height, top, self.near, self.far)
    }

    fn orthographic_projection(&self) -> Mat4 {
        let b = self.ortho_bounds;
        let mut left = b.left;
        let mut right = b.right;
        let mut top = b.top;
        let mut bottom = b.bottom;
        if let Some(view) = self.view_offset {
            let scale_w = (b.right - b.left) / view.full_width;
            let scale_h = (b.top - b.bottom) / view.full_height;
            left += scale_w * view.x;
            right = left + scale_w * view.width;
            top -= scale_h * view.y;
            bottom = top - scale_h * view.height;
        }
        Mat4::orthographic_rh(left, right, bottom, top, self.near, self.far)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(16.0 / 9.0)
    }
}

impl CameraView for Camera {
    fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    fn projection_matrix(&self) -> Mat4 {
        match self.projection_mode {
            ProjectionMode::Perspective => self.perspective_projection(),
            ProjectionMode::Orthographic => self.orthographic_projection(),
        }
    }

    fn far(&self) -> f32 {
        self.far
    }

    fn position(&self) -> Vec3 {
        self.position
    }
}
