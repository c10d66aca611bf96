use nalgebra as na;
use na::{vector, Matrix3, Matrix4, Vector3, Vector4};

use crate::error::RenderError;

/// Determinants below this are treated as singular.
const SINGULAR_EPSILON: f32 = 1e-12;

/// Embedding into homogenous coordinates with an explicit w.
/// w = 1 for points, w = 0 for directions.
pub fn embed(v: Vector3<f32>, w: f32) -> Vector4<f32> {
    return vector![v.x, v.y, v.z, w];
}

/// Embedding of a point into homogenous coordinates.
pub fn embed_point(v: Vector3<f32>) -> Vector4<f32> {
    return embed(v, 1.0);
}

/// Dropping the last homogenous coordinate without division.
pub fn project(v: Vector4<f32>) -> Vector3<f32> {
    return vector![v.x, v.y, v.z];
}

/// Transformation of a point from homogenous coordinates.
/// Caller is responsible for w being non-zero.
pub fn project_divide(v: Vector4<f32>) -> Vector3<f32> {
    return vector![v.x / v.w, v.y / v.w, v.z / v.w];
}

fn is_singular(determinant: f32) -> bool {
    return !determinant.is_finite() || determinant.abs() < SINGULAR_EPSILON;
}

/// Gauss-Jordan inverse of a 3x3 matrix, failing on (near) singular input.
pub fn try_invert3(m: &Matrix3<f32>, what: &'static str) -> Result<Matrix3<f32>, RenderError> {
    if is_singular(m.determinant()) {
        return Err(RenderError::SingularMatrix(what));
    }
    return m.try_inverse().ok_or(RenderError::SingularMatrix(what));
}

/// Inverse of a 4x4 matrix, failing on (near) singular input.
pub fn try_invert4(m: &Matrix4<f32>, what: &'static str) -> Result<Matrix4<f32>, RenderError> {
    if is_singular(m.determinant()) {
        return Err(RenderError::SingularMatrix(what));
    }
    return m.try_inverse().ok_or(RenderError::SingularMatrix(what));
}

/// Inverse transpose, which is what normals have to be multiplied by.
pub fn invert_transpose(m: &Matrix4<f32>, what: &'static str) -> Result<Matrix4<f32>, RenderError> {
    return Ok(try_invert4(m, what)?.transpose());
}
