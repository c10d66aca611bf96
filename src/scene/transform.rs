use nalgebra as na;
use na::{matrix, Matrix4, Vector3};

use crate::error::RenderError;

/// Depth range the viewport maps the canonical cube onto.
pub const DEPTH: f32 = 255.0;

/// The matrices, defining where a vertex ends up on the screen.
/// Combined per vertex as viewport * projection * view * model * position.
/// Lights live in world space and skip the model matrix.
#[derive(Debug, Clone, Copy)]
pub struct Transforms {
    pub model: Matrix4<f32>,
    pub view: Matrix4<f32>,
    pub projection: Matrix4<f32>,
    pub viewport: Matrix4<f32>,
}

impl Default for Transforms {
    fn default() -> Self {
        return Self {
            model: Matrix4::identity(),
            view: Matrix4::identity(),
            projection: Matrix4::identity(),
            viewport: Matrix4::identity(),
        };
    }
}

impl Transforms {
    /// Projection and view, applied to world space directions such as lights.
    pub fn light_matrix(&self) -> Matrix4<f32> {
        return self.projection * self.view;
    }

    /// Everything from model coordinates up to clip space.
    pub fn clip_matrix(&self) -> Matrix4<f32> {
        return self.projection * self.view * self.model;
    }

    /// Full transform from model coordinates to the screen, before perspective division.
    pub fn screen_matrix(&self) -> Matrix4<f32> {
        return self.viewport * self.clip_matrix();
    }
}

/// Builds the view matrix of a camera at `eye` looking at `center`.
/// Fails if the basis can't be built, i.e. `up` is parallel to the view direction.
pub fn lookat(eye: Vector3<f32>, center: Vector3<f32>, up: Vector3<f32>) -> Result<Matrix4<f32>, RenderError> {
    let view = eye - center;
    if view.norm() < 1e-6 {
        return Err(RenderError::DegenerateCamera);
    }
    let z = view.normalize();
    let up_cross_z = up.cross(&z);
    if up_cross_z.norm() < 1e-6 {
        return Err(RenderError::DegenerateCamera);
    }
    let x = up_cross_z.normalize();
    let y = z.cross(&x).normalize();
    let basis_matrix = matrix![x.x, x.y, x.z, 0.0;
                               y.x, y.y, y.z, 0.0;
                               z.x, z.y, z.z, 0.0;
                               0.0, 0.0, 0.0, 1.0];
    return Ok(basis_matrix * translation(-eye));
}

/// Simple perspective, dividing by distance from the eye.
/// Coefficient is conventionally -1 / |eye - center|, 0 gives orthographic projection.
pub fn projection(coef: f32) -> Matrix4<f32> {
    return matrix![1.0, 0.0, 0.0,  0.0;
                   0.0, 1.0, 0.0,  0.0;
                   0.0, 0.0, 1.0,  0.0;
                   0.0, 0.0, coef, 1.0];
}

/// Maps [-1, 1] cube to the [x, x + w] x [y, y + h] box on the screen, depth goes to [0, DEPTH].
pub fn viewport(x: f32, y: f32, w: f32, h: f32) -> Matrix4<f32> {
    let d = DEPTH;
    return matrix![w / 2.0, 0.0,     0.0,     x + w / 2.0;
                   0.0,     h / 2.0, 0.0,     y + h / 2.0;
                   0.0,     0.0,     d / 2.0, d / 2.0;
                   0.0,     0.0,     0.0,     1.0];
}

pub fn translation(v: Vector3<f32>) -> Matrix4<f32> {
    return matrix![1.0, 0.0, 0.0, v.x;
                   0.0, 1.0, 0.0, v.y;
                   0.0, 0.0, 1.0, v.z;
                   0.0, 0.0, 0.0, 1.0];
}

/// Uniform scale around the origin.
pub fn zoom(factor: f32) -> Matrix4<f32> {
    return matrix![factor, 0.0,    0.0,    0.0;
                   0.0,    factor, 0.0,    0.0;
                   0.0,    0.0,    factor, 0.0;
                   0.0,    0.0,    0.0,    1.0];
}

/// Rotation around the x axis, turning +y towards +z.
pub fn rotation_x(cos: f32, sin: f32) -> Matrix4<f32> {
    return matrix![1.0, 0.0, 0.0,  0.0;
                   0.0, cos, -sin, 0.0;
                   0.0, sin, cos,  0.0;
                   0.0, 0.0, 0.0,  1.0];
}

/// Rotation around the y axis, turning +z towards +x.
pub fn rotation_y(cos: f32, sin: f32) -> Matrix4<f32> {
    return matrix![cos,  0.0, sin, 0.0;
                   0.0,  1.0, 0.0, 0.0;
                   -sin, 0.0, cos, 0.0;
                   0.0,  0.0, 0.0, 1.0];
}

/// Rotation around the z axis, turning +x towards +y.
pub fn rotation_z(cos: f32, sin: f32) -> Matrix4<f32> {
    return matrix![cos, -sin, 0.0, 0.0;
                   sin, cos,  0.0, 0.0;
                   0.0, 0.0,  1.0, 0.0;
                   0.0, 0.0,  0.0, 1.0];
}
