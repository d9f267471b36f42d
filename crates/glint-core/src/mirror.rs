//! Planar mirror math: mirror planes, virtual cameras and oblique near-plane clipping.

use glam::{Mat4, Vec3, Vec4};

use crate::camera::CameraView;

/// Maps clip-space `xy` in `[-1, 1]` to texture `uv` in `[0, 1]` (v pointing down).
pub const TEXTURE_BIAS: Mat4 = Mat4::from_cols(
    Vec4::new(0.5, 0.0, 0.0, 0.0),
    Vec4::new(0.0, -0.5, 0.0, 0.0),
    Vec4::new(0.0, 0.0, 1.0, 0.0),
    Vec4::new(0.5, 0.5, 0.0, 1.0),
);

/// Reflects `v` about the plane through the origin with unit normal `n`.
#[must_use]
pub fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    v - 2.0 * v.dot(n) * n
}

/// Affine reflection across `plane`: `p - 2 (n · p + d) n`.
#[must_use]
pub fn reflection_matrix(plane: &MirrorPlane) -> Mat4 {
    let n = plane.normal;
    Mat4::from_cols(
        reflect(Vec3::X, n).extend(0.0),
        reflect(Vec3::Y, n).extend(0.0),
        reflect(Vec3::Z, n).extend(0.0),
        (-2.0 * plane.constant * n).extend(1.0),
    )
}

/// A plane `normal · p + constant = 0` with a unit normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MirrorPlane {
    pub normal: Vec3,
    pub constant: f32,
}

impl MirrorPlane {
    pub fn from_normal_and_point(normal: Vec3, point: Vec3) -> Self {
        let normal = normal.normalize();
        Self {
            normal,
            constant: -point.dot(normal),
        }
    }

    /// Plane of a reflective surface whose local +Z is its front normal.
    ///
    /// Scale in `surface_world` does not affect the normal.
    pub fn from_surface(surface_world: Mat4) -> Self {
        Self::from_normal_and_point(
            surface_world.z_axis.truncate(),
            surface_world.w_axis.truncate(),
        )
    }

    /// Signed distance from `point` to the plane.
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.constant
    }

    pub fn as_vec4(&self) -> Vec4 {
        self.normal.extend(self.constant)
    }

    /// The plane expressed in the space points are mapped into by `matrix`.
    #[must_use]
    pub fn transformed(&self, matrix: Mat4) -> Self {
        let v = matrix.inverse().transpose() * self.as_vec4();
        let len = v.truncate().length();
        Self {
            normal: v.truncate() / len,
            constant: v.w / len,
        }
    }
}

/// A camera derived from a real camera and a mirror plane for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VirtualCamera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub view: Mat4,
    pub projection: Mat4,
    pub far: f32,
}

impl CameraView for VirtualCamera {
    fn view_matrix(&self) -> Mat4 {
        self.view
    }

    fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    fn far(&self) -> f32 {
        self.far
    }

    fn position(&self) -> Vec3 {
        self.position
    }
}

/// Everything the reflector derives from the camera and surface for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MirrorFrame {
    pub plane: MirrorPlane,
    /// Virtual camera with the oblique-clipped projection.
    pub camera: VirtualCamera,
    /// Maps surface-local positions to the target's texture space.
    pub texture_matrix: Mat4,
    /// The mirror plane in the virtual camera's view space.
    pub clip_plane: Vec4,
}

/// `bias * projection * view * surface_world`.
#[must_use]
pub fn texture_projection_matrix(projection: Mat4, view: Mat4, surface_world: Mat4) -> Mat4 {
    TEXTURE_BIAS * projection * view * surface_world
}

fn sign(x: f32) -> f32 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Replaces the near plane of `projection` with `clip_plane` (view space).
///
/// Overwrites the third row (elements 2, 6, 10, 14 in column-major order)
/// so that clip-space depth 0 lies on `clip_plane` while the far plane is
/// tilted to pass through the original far corner selected by the plane's
/// orientation. `clip_bias` pulls the near plane slightly back along the
/// view axis to hide seams at the mirror's edge.
///
/// Returns `projection` unchanged when the plane is degenerate for it.
#[must_use]
pub fn apply_oblique_clip(projection: Mat4, clip_plane: Vec4, clip_bias: f32) -> Mat4 {
    let m = projection.to_cols_array();
    let corner_x = sign(clip_plane.x);
    let corner_y = sign(clip_plane.y);

    let (q, w_of_q) = if m[11] == 0.0 {
        // Orthographic: no perspective divide, solve through the inverse.
        let q = projection.inverse() * Vec4::new(corner_x, corner_y, 1.0, 1.0);
        (q, projection.row(3).dot(q))
    } else {
        // Far-plane corner in view space, scaled so that its clip w is 1.
        let q = Vec4::new(
            (corner_x + m[8]) / m[0],
            (corner_y + m[9]) / m[5],
            -1.0,
            (1.0 + m[10]) / m[14],
        );
        (q, 1.0)
    };

    let denom = clip_plane.dot(q);
    if denom.abs() <= f32::EPSILON || !denom.is_finite() {
        return projection;
    }
    let scaled = clip_plane * (w_of_q / denom);

    let mut out = m;
    out[2] = scaled.x;
    out[6] = scaled.y;
    out[10] = scaled.z - clip_bias;
    out[14] = scaled.w;
    Mat4::from_cols_array(&out)
}

/// Mirrors `camera` across the surface described by `surface_world`.
///
/// Returns `None` when the surface faces away from the camera
/// (`(surface - camera) · normal >= 0`); nothing should be rendered then.
pub fn mirror_camera<C: CameraView + ?Sized>(
    camera: &C,
    surface_world: Mat4,
    clip_bias: f32,
) -> Option<MirrorFrame> {
    let plane = MirrorPlane::from_surface(surface_world);
    let surface_pos = surface_world.w_axis.truncate();
    let camera_world = camera.world_matrix();
    let camera_pos = camera_world.w_axis.truncate();
    if (surface_pos - camera_pos).dot(plane.normal) >= 0.0 {
        return None;
    }

    let mirror = reflection_matrix(&plane);
    let position = mirror.transform_point3(camera_pos);

    let look_dir = camera_world.transform_vector3(Vec3::NEG_Z).normalize();
    let target = mirror.transform_point3(camera_pos + look_dir);

    let camera_up = camera_world.transform_vector3(Vec3::Y).normalize();
    let up = mirror.transform_vector3(camera_up);

    let view = Mat4::look_at_rh(position, target, up);
    let base_projection = camera.projection_matrix();
    let texture_matrix = texture_projection_matrix(base_projection, view, surface_world);

    let clip_plane = plane.transformed(view).as_vec4();
    let projection = apply_oblique_clip(base_projection, clip_plane, clip_bias);

    Some(MirrorFrame {
        plane,
        camera: VirtualCamera {
            position,
            target,
            up,
            view,
            projection,
            far: camera.far(),
        },
        texture_matrix,
        clip_plane,
    })
}
