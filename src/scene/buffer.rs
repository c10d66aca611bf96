use nalgebra as na;
use na::{Matrix2x3, Matrix3, Matrix4x3, Vector2, Vector3, Vector4};

/// Buffer for passing values between vertex and fragment parts of the pipeline.
/// Every attribute is stored per triangle corner as a column, so interpolation with
/// barycentric coordinates is a single matrix-vector product.
/// Overwritten for every new triangle.
#[derive(Debug, Clone, Copy)]
pub struct Varying {
    pub uvs: Matrix2x3<f32>,     // UV coordinates, defining where to look for a color of a vertex.
    pub clip: Matrix4x3<f32>,    // Vertex positions after projection, before perspective division.
    pub normals: Matrix3<f32>,   // Transformed vertex normals.
    pub ndc: Matrix3<f32>,       // Vertex positions in normalized device coordinates.
}

impl Default for Varying {
    fn default() -> Self {
        return Self {
            uvs: Matrix2x3::zeros(),
            clip: Matrix4x3::zeros(),
            normals: Matrix3::zeros(),
            ndc: Matrix3::zeros(),
        };
    }
}

impl Varying {
    /// Records attributes of one corner.
    pub fn store(&mut self, corner: usize, uv: Vector2<f32>, clip: Vector4<f32>, normal: Vector3<f32>) {
        self.uvs.set_column(corner, &uv);
        self.clip.set_column(corner, &clip);
        self.normals.set_column(corner, &normal);
        self.ndc.set_column(corner, &(clip.xyz() / clip.w));
    }

    pub fn uv(&self, bar_coord: Vector3<f32>) -> Vector2<f32> {
        return self.uvs * bar_coord;
    }

    pub fn normal(&self, bar_coord: Vector3<f32>) -> Vector3<f32> {
        return self.normals * bar_coord;
    }

    /// UV change along the two triangle edges leaving corner 0.
    pub fn uv_edges(&self) -> (Vector2<f32>, Vector2<f32>) {
        let first = self.uvs.column(1) - self.uvs.column(0);
        let second = self.uvs.column(2) - self.uvs.column(0);
        return (first, second);
    }

    /// Triangle edges leaving corner 0 in normalized device coordinates.
    pub fn ndc_edges(&self) -> (Vector3<f32>, Vector3<f32>) {
        let first = self.ndc.column(1) - self.ndc.column(0);
        let second = self.ndc.column(2) - self.ndc.column(0);
        return (first, second);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use na::vector;

    #[test]
    fn interpolates_per_corner_attributes() {
        let mut varying = Varying::default();
        varying.store(0, vector![0.0, 0.0], vector![0.0, 0.0, 0.0, 1.0], vector![1.0, 0.0, 0.0]);
        varying.store(1, vector![1.0, 0.0], vector![2.0, 0.0, 0.0, 2.0], vector![0.0, 1.0, 0.0]);
        varying.store(2, vector![0.0, 1.0], vector![0.0, 1.0, 0.0, 1.0], vector![0.0, 0.0, 1.0]);

        let bar = vector![0.5, 0.25, 0.25];
        assert!((varying.uv(bar) - vector![0.25, 0.25]).norm() < 1e-6);
        assert!((varying.normal(bar) - vector![0.5, 0.25, 0.25]).norm() < 1e-6);
        // Second corner is divided by its w.
        assert!((varying.ndc.column(1) - vector![1.0, 0.0, 0.0]).norm() < 1e-6);

        let (uv_edge_1, uv_edge_2) = varying.uv_edges();
        assert_eq!(uv_edge_1, vector![1.0, 0.0]);
        assert_eq!(uv_edge_2, vector![0.0, 1.0]);
        let (e1, e2) = varying.ndc_edges();
        assert_eq!(e1, vector![1.0, 0.0, 0.0]);
        assert_eq!(e2, vector![0.0, 1.0, 0.0]);
    }
}
