use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use image::{imageops, Rgba, RgbaImage};
use log::{debug, info, warn};
use nalgebra as na;
use na::{vector, Vector2, Vector3};
use obj::raw::object::Polygon;
use obj::raw::{parse_obj, RawObj};

use super::Color;
use crate::error::RenderError;

/// Color used when a model has no diffuse texture.
const WHITE: Color = Rgba([255, 255, 255, 255]);

/// Tangent space normal reported when a model has no normal map. Deliberately not normalized.
pub const DEFAULT_TANGENT_NORMAL: Vector3<f32> = Vector3::new(1.0, 1.0, 1.0);

/// Indices of one face corner into the position, uv and normal arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Corner {
    pub position: usize,
    pub uv: usize,
    pub normal: usize,
}

impl Corner {
    pub fn new(position: usize, uv: usize, normal: usize) -> Self {
        return Self { position, uv, normal };
    }
}

pub type Face = [Corner; 3];

/// Rgba8 image sampled with nearest neighbour filtering.
/// Stored flipped, so that v = 0 is the bottom row as uv coordinates expect.
pub struct Texture {
    image: RgbaImage,
}

impl Texture {
    /// Wraps an image given in file order, row 0 on top.
    pub fn from_image(mut image: RgbaImage) -> Self {
        imageops::flip_vertical_in_place(&mut image);
        return Self { image };
    }

    pub fn load(path: &Path) -> Result<Self, RenderError> {
        let image = image::open(path).map_err(|e| RenderError::Texture {
            path: path.to_path_buf(),
            source: e,
        })?;
        return Ok(Self::from_image(image.to_rgba8()));
    }

    /// Loads a texture if the file is there. Missing file is not an error, broken one is.
    pub fn load_optional(path: &Path) -> Result<Option<Self>, RenderError> {
        if !path.exists() {
            info!("texture file {} not found, skipping", path.display());
            return Ok(None);
        }
        let texture = Self::load(path)?;
        info!("texture file {} loaded", path.display());
        return Ok(Some(texture));
    }

    /// Texel at floor(u * width), floor(v * height), clamped to the image.
    pub fn sample(&self, uv: Vector2<f32>) -> Color {
        fn to_texel(coord: f32, size: u32) -> u32 {
            // NaN saturates to 0 in the cast.
            let texel = (coord * size as f32).floor().max(0.0) as u32;
            return texel.min(size - 1);
        }
        let (width, height) = self.image.dimensions();
        if width == 0 || height == 0 {
            return WHITE;
        }
        return *self.image.get_pixel(to_texel(uv.x, width), to_texel(uv.y, height));
    }
}

/// Where the textures of a model live relative to its mesh file.
#[derive(Debug, Clone)]
pub struct TextureSuffixes {
    pub diffuse: String,
    pub normal_map: String,
}

/// Swaps extension of the model file for a suffix: `african_head.obj` -> `african_head_diffuse.png`.
fn texture_path(model_path: &Path, suffix: &str) -> PathBuf {
    let stem = model_path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    return model_path.with_file_name(format!("{}{}", stem, suffix));
}

/// Mesh with its textures. Read-only once built.
pub struct Model {
    positions: Vec<Vector3<f32>>,
    normals: Vec<Vector3<f32>>,
    uvs: Vec<Vector2<f32>>,
    faces: Vec<Face>,
    diffuse_map: Option<Texture>,
    normal_map: Option<Texture>,
}

impl Model {
    /// Builds a model, checking that every face index is in bounds of its array.
    pub fn new(
        positions: Vec<Vector3<f32>>,
        normals: Vec<Vector3<f32>>,
        uvs: Vec<Vector2<f32>>,
        faces: Vec<Face>,
    ) -> Result<Self, RenderError> {
        for (face_index, face) in faces.iter().enumerate() {
            for corner in face {
                let checks = [
                    ("position", corner.position, positions.len()),
                    ("uv", corner.uv, uvs.len()),
                    ("normal", corner.normal, normals.len()),
                ];
                for (kind, index, len) in checks {
                    if index >= len {
                        return Err(RenderError::MeshIndex { face: face_index, kind, index, len });
                    }
                }
            }
        }
        return Ok(Self {
            positions,
            normals,
            uvs,
            faces,
            diffuse_map: None,
            normal_map: None,
        });
    }

    pub fn with_diffuse_map(mut self, texture: Texture) -> Self {
        self.diffuse_map = Some(texture);
        return self;
    }

    pub fn with_normal_map(mut self, texture: Texture) -> Self {
        self.normal_map = Some(texture);
        return self;
    }

    /// Loads an OBJ file and the textures found next to it.
    pub fn load(path: &Path, suffixes: &TextureSuffixes) -> Result<Self, RenderError> {
        let file = File::open(path).map_err(|e| RenderError::Io { path: path.to_path_buf(), source: e })?;
        let mut model = Self::from_reader(BufReader::new(file)).map_err(|e| match e {
            RenderError::ObjParse { source, .. } => RenderError::ObjParse { path: path.to_path_buf(), source },
            other => other,
        })?;
        info!(
            "{}: v# {} f# {} vt# {} vn# {}",
            path.display(),
            model.nverts(),
            model.nfaces(),
            model.uvs.len(),
            model.normals.len()
        );
        model.diffuse_map = Texture::load_optional(&texture_path(path, &suffixes.diffuse))?;
        model.normal_map = Texture::load_optional(&texture_path(path, &suffixes.normal_map))?;
        return Ok(model);
    }

    /// Parses OBJ data. Polygons are fan triangulated, corners without uv get a shared (0, 0) uv
    /// and corners without a normal get the geometric normal of their polygon.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, RenderError> {
        let raw: RawObj = parse_obj(reader).map_err(|e| RenderError::ObjParse {
            path: PathBuf::new(),
            source: e,
        })?;

        let positions: Vec<Vector3<f32>> = raw.positions.iter().map(|p| vector![p.0, p.1, p.2]).collect();
        let mut normals: Vec<Vector3<f32>> = raw.normals.iter().map(|n| vector![n.0, n.1, n.2]).collect();
        let mut uvs: Vec<Vector2<f32>> = raw.tex_coords.iter().map(|t| vector![t.0, t.1]).collect();
        let mut faces: Vec<Face> = Vec::with_capacity(raw.polygons.len());
        let mut missing_uv: Option<usize> = None;

        for polygon in &raw.polygons {
            let indices: Vec<(usize, Option<usize>, Option<usize>)> = match polygon {
                Polygon::P(p) => p.iter().map(|&v| (v, None, None)).collect(),
                Polygon::PT(p) => p.iter().map(|&(v, t)| (v, Some(t), None)).collect(),
                Polygon::PN(p) => p.iter().map(|&(v, n)| (v, None, Some(n))).collect(),
                Polygon::PTN(p) => p.iter().map(|&(v, t, n)| (v, Some(t), Some(n))).collect(),
            };
            if indices.len() < 3 {
                warn!("skipping polygon with {} corners", indices.len());
                continue;
            }

            let uv_fallback = if indices.iter().any(|i| i.1.is_none()) {
                *missing_uv.get_or_insert_with(|| {
                    uvs.push(vector![0.0, 0.0]);
                    uvs.len() - 1
                })
            } else {
                0
            };
            let normal_fallback = if indices.iter().any(|i| i.2.is_none()) {
                let corner_position = |k: usize| positions.get(indices[k].0).copied().unwrap_or_else(Vector3::zeros);
                let geometric = (corner_position(1) - corner_position(0)).cross(&(corner_position(2) - corner_position(0)));
                normals.push(geometric.try_normalize(f32::EPSILON).unwrap_or_else(Vector3::z));
                normals.len() - 1
            } else {
                0
            };
            let to_corner = |&(v, t, n): &(usize, Option<usize>, Option<usize>)| {
                Corner::new(v, t.unwrap_or(uv_fallback), n.unwrap_or(normal_fallback))
            };

            // Fan triangulation around the first corner.
            for k in 1..indices.len() - 1 {
                faces.push([to_corner(&indices[0]), to_corner(&indices[k]), to_corner(&indices[k + 1])]);
            }
        }
        debug!("parsed {} polygons into {} triangles", raw.polygons.len(), faces.len());

        return Self::new(positions, normals, uvs, faces);
    }

    pub fn nfaces(&self) -> usize {
        return self.faces.len();
    }

    pub fn nverts(&self) -> usize {
        return self.positions.len();
    }

    pub fn get_vertex_position(&self, face: usize, corner: usize) -> Vector3<f32> {
        return self.positions[self.faces[face][corner].position];
    }

    pub fn get_vertex_uv(&self, face: usize, corner: usize) -> Vector2<f32> {
        return self.uvs[self.faces[face][corner].uv];
    }

    /// Normalized vertex normal.
    pub fn get_vertex_normal(&self, face: usize, corner: usize) -> Vector3<f32> {
        let normal = self.normals[self.faces[face][corner].normal];
        return normal.try_normalize(f32::EPSILON).unwrap_or(normal);
    }

    pub fn get_color_at_uv(&self, uv: Vector2<f32>) -> Color {
        return match &self.diffuse_map {
            Some(texture) => texture.sample(uv),
            None => WHITE,
        };
    }

    /// Normal from the tangent space normal map, channels mapped from [0, 255] to [-1, 1].
    pub fn get_normal_tangent_at_uv(&self, uv: Vector2<f32>) -> Vector3<f32> {
        let texture = match &self.normal_map {
            Some(texture) => texture,
            None => return DEFAULT_TANGENT_NORMAL,
        };
        let color = texture.sample(uv);
        return vector![
            color[0] as f32 / 255.0 * 2.0 - 1.0,
            color[1] as f32 / 255.0 * 2.0 - 1.0,
            color[2] as f32 / 255.0 * 2.0 - 1.0
        ];
    }
}
