use std::fmt;
use std::str::FromStr;

use nalgebra as na;
use na::{Matrix3, Matrix4, Vector2, Vector3, Vector4};
use serde::Deserialize;

use super::buffer::Varying;
use super::model::Model;
use super::transform::Transforms;
use super::util::{embed, embed_point, invert_transpose, project, try_invert3};
use super::Color;
use crate::error::RenderError;

/// Two stages of a programmable pipeline.
pub trait Shader {
    /// Called for corners 0, 1 and 2 of a face, in that order. Returns the clip space position
    /// and fills whatever the fragment stage is going to interpolate.
    fn vertex(&mut self, face: usize, corner: usize) -> Vector4<f32>;

    /// Color of the fragment at `coord` with perspective corrected barycentric coordinates
    /// `bar_coord`. `None` discards the fragment.
    fn fragment(&mut self, coord: Vector2<u32>, bar_coord: Vector3<f32>) -> Option<Color>;
}

/// Shaders, that can be picked for a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ShaderKind {
    /// Normal map lookup in a local Darboux (tangent) basis.
    Darboux,
    /// Interpolated vertex normals, discarding transparent texels.
    Phong,
}

impl Default for ShaderKind {
    fn default() -> Self {
        ShaderKind::Darboux
    }
}

impl FromStr for ShaderKind {
    type Err = RenderError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "default" | "darboux" | "normal_map" => Ok(ShaderKind::Darboux),
            "phong" => Ok(ShaderKind::Phong),
            _ => Err(RenderError::Config(format!("unsupported shader '{}'", name))),
        }
    }
}

impl fmt::Display for ShaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderKind::Darboux => write!(f, "darboux"),
            ShaderKind::Phong => write!(f, "phong"),
        }
    }
}

/// Directional light with its share of the diffuse term.
#[derive(Debug, Clone, Copy)]
pub struct Light {
    pub direction: Vector3<f32>,
    pub weight: f32,
}

/// Frame constants shared by every shader invocation of a pass.
pub struct Uniforms {
    pub clip_matrix: Matrix4<f32>,     // Projection * View * Model, applied to vertices.
    pub it_clip_matrix: Matrix4<f32>,  // Inverse transpose of the above, applied to normals.
    pub lights: Vec<Light>,            // Directions through Projection * View, normalized.
    pub ambient: Vector3<f32>,         // Added to every lit color, per channel in [0, 255].
}

impl Uniforms {
    pub fn new(transforms: &Transforms, lights: &[Light], ambient: Vector3<f32>) -> Result<Self, RenderError> {
        let clip_matrix = transforms.clip_matrix();
        let it_clip_matrix = invert_transpose(&clip_matrix, "projection * view * model")?;
        let light_matrix = transforms.light_matrix();
        let mut transformed = Vec::with_capacity(lights.len());
        for light in lights {
            let direction = project(light_matrix * embed(light.direction, 0.0))
                .try_normalize(f32::EPSILON)
                .ok_or_else(|| RenderError::Config(format!("light {:?} has no direction", light.direction)))?;
            transformed.push(Light { direction, weight: light.weight });
        }
        let lights = transformed;
        return Ok(Self { clip_matrix, it_clip_matrix, lights, ambient });
    }

    /// Weighted sum of Lambertian terms of all lights.
    pub fn diffuse_intensity(&self, normal: Vector3<f32>) -> f32 {
        return self
            .lights
            .iter()
            .map(|light| light.weight * normal.dot(&light.direction).max(0.0))
            .sum();
    }

    /// Diffuse color scaled by the intensity, plus ambient, saturated.
    pub fn shade(&self, diffuse: Color, intensity: f32) -> Color {
        let channel = |i: usize| (diffuse[i] as f32 * intensity + self.ambient[i]).clamp(0.0, 255.0) as u8;
        return image::Rgba([channel(0), channel(1), channel(2), 255]);
    }

    fn transform_vertex(&self, model: &Model, face: usize, corner: usize) -> Vector4<f32> {
        return self.clip_matrix * embed_point(model.get_vertex_position(face, corner));
    }

    fn transform_normal(&self, model: &Model, face: usize, corner: usize) -> Vector3<f32> {
        return project(self.it_clip_matrix * embed(model.get_vertex_normal(face, corner), 0.0));
    }
}

/// Calculating normal at a fragment by transforming normal from the normal map out of the local
/// Darboux basis, built from triangle edges and uv deltas.
pub struct DarbouxShader<'a> {
    model: &'a Model,
    uniforms: &'a Uniforms,
    varying: Varying,
}

impl<'a> DarbouxShader<'a> {
    pub fn new(model: &'a Model, uniforms: &'a Uniforms) -> Self {
        return Self { model, uniforms, varying: Varying::default() };
    }

    /// Columns are tangent, bitangent and the interpolated normal.
    fn local_basis(&self, normal: Vector3<f32>) -> Option<Matrix3<f32>> {
        let (edge_1, edge_2) = self.varying.ndc_edges();
        let a = Matrix3::from_rows(&[edge_1.transpose(), edge_2.transpose(), normal.transpose()]);
        let ai = try_invert3(&a, "darboux basis").ok()?;
        let (uv_edge_1, uv_edge_2) = self.varying.uv_edges();
        let i = ai * Vector3::new(uv_edge_1.x, uv_edge_2.x, 0.0);
        let j = ai * Vector3::new(uv_edge_1.y, uv_edge_2.y, 0.0);
        let i = i.try_normalize(f32::EPSILON)?;
        let j = j.try_normalize(f32::EPSILON)?;
        return Some(Matrix3::from_columns(&[i, j, normal]));
    }
}

impl Shader for DarbouxShader<'_> {
    fn vertex(&mut self, face: usize, corner: usize) -> Vector4<f32> {
        let clip = self.uniforms.transform_vertex(self.model, face, corner);
        let normal = self.uniforms.transform_normal(self.model, face, corner);
        self.varying.store(corner, self.model.get_vertex_uv(face, corner), clip, normal);
        return clip;
    }

    fn fragment(&mut self, _coord: Vector2<u32>, bar_coord: Vector3<f32>) -> Option<Color> {
        let bn = self.varying.normal(bar_coord).try_normalize(f32::EPSILON).unwrap_or_else(Vector3::z);
        let uv = self.varying.uv(bar_coord);
        // Flat uv mapping or a sliver triangle leave no basis, then the plain normal is used.
        let normal = match self.local_basis(bn) {
            Some(basis) => (basis * self.model.get_normal_tangent_at_uv(uv)).normalize(),
            None => bn,
        };
        let intensity = self.uniforms.diffuse_intensity(normal);
        return Some(self.uniforms.shade(self.model.get_color_at_uv(uv), intensity));
    }
}

/// Calculating diffuse coefficient based on the interpolation of vertex normals in a particular fragment.
/// Texels with zero alpha are cut out.
pub struct PhongShader<'a> {
    model: &'a Model,
    uniforms: &'a Uniforms,
    varying: Varying,
}

impl<'a> PhongShader<'a> {
    pub fn new(model: &'a Model, uniforms: &'a Uniforms) -> Self {
        return Self { model, uniforms, varying: Varying::default() };
    }
}

impl Shader for PhongShader<'_> {
    fn vertex(&mut self, face: usize, corner: usize) -> Vector4<f32> {
        let clip = self.uniforms.transform_vertex(self.model, face, corner);
        let normal = self.uniforms.transform_normal(self.model, face, corner);
        self.varying.store(corner, self.model.get_vertex_uv(face, corner), clip, normal);
        return clip;
    }

    fn fragment(&mut self, _coord: Vector2<u32>, bar_coord: Vector3<f32>) -> Option<Color> {
        let color = self.model.get_color_at_uv(self.varying.uv(bar_coord));
        if color[3] == 0 {
            return None;
        }
        let normal = self.varying.normal(bar_coord).try_normalize(f32::EPSILON).unwrap_or_else(Vector3::z);
        return Some(self.uniforms.shade(color, self.uniforms.diffuse_intensity(normal)));
    }
}
