//! Render settings, read from a RON file.
//!
//! Every field has a default, so a config file only has to mention what it changes:
//!
//! ```ron
//! (
//!     width: 800,
//!     height: 800,
//!     eye: (1.0, 1.0, 3.0),
//!     lights: [(direction: (1.0, 1.0, 1.0), weight: 0.7), (direction: (-1.0, 0.0, 1.0), weight: 0.3)],
//!     shader: Phong,
//! )
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use nalgebra as na;
use na::{vector, Vector3};
use serde::Deserialize;

use crate::error::RenderError;
use crate::scene::model::TextureSuffixes;
use crate::scene::shader::{Light, ShaderKind};

pub type Triple = (f32, f32, f32);

fn to_vector(t: Triple) -> Vector3<f32> {
    return vector![t.0, t.1, t.2];
}

fn is_finite(t: Triple) -> bool {
    return t.0.is_finite() && t.1.is_finite() && t.2.is_finite();
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct LightConfig {
    pub direction: Triple,
    #[serde(default = "default_weight")]
    pub weight: f32,
}

fn default_weight() -> f32 {
    1.0
}

/// What happens when one of several models can't be loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ModelErrorPolicy {
    /// Render the others, fail only if nothing could be rendered.
    Skip,
    /// Fail the whole pass.
    Abort,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub width: u32,
    pub height: u32,
    /// Viewport size before aspect correction, `height * 0.816` if not set.
    pub aperture: Option<f32>,
    pub aspect: f32,
    /// Lower left corner of the viewport, `(-0.2 * width, 0.092 * height)` if not set.
    pub viewport_offset: Option<(f32, f32)>,
    pub eye: Triple,
    pub center: Triple,
    pub up: Triple,
    pub lights: Vec<LightConfig>,
    /// Added to every shaded color, channels in [0, 255].
    pub ambient: Triple,
    pub shader: ShaderKind,
    pub model_zoom: f32,
    /// Rotations of the models around the x, y and z axes, in degrees.
    /// Applied z first, then x, then y.
    pub model_rotation_x: f32,
    pub model_rotation_y: f32,
    pub model_rotation_z: f32,
    pub diffuse_suffix: String,
    pub normal_map_suffix: String,
    pub on_model_error: ModelErrorPolicy,
    pub output: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        return Self {
            width: 350,
            height: 600,
            aperture: None,
            aspect: 1.0,
            viewport_offset: None,
            eye: (3.0, 3.0, 3.0),
            center: (0.0, 0.0, 0.0),
            up: (0.0, 1.0, 0.0),
            lights: vec![LightConfig { direction: (1.0, 3.0, 2.0), weight: 1.0 }],
            ambient: (0.0, 0.0, 0.0),
            shader: ShaderKind::default(),
            model_zoom: 1.0,
            model_rotation_x: 0.0,
            model_rotation_y: 0.0,
            model_rotation_z: 0.0,
            diffuse_suffix: String::from("_diffuse.png"),
            normal_map_suffix: String::from("_nm_tangent.png"),
            on_model_error: ModelErrorPolicy::Skip,
            output: PathBuf::from("framebuffer.png"),
        };
    }
}

impl Config {
    pub fn from_ron(text: &str) -> Result<Self, RenderError> {
        let config: Config = ron::from_str(text)?;
        config.validate()?;
        return Ok(config);
    }

    pub fn load(path: &Path) -> Result<Self, RenderError> {
        let text = fs::read_to_string(path)
            .map_err(|e| RenderError::Config(format!("can't read {}: {}", path.display(), e)))?;
        return Self::from_ron(&text);
    }

    /// Checks values, that would otherwise produce an empty or garbage image.
    pub fn validate(&self) -> Result<(), RenderError> {
        fn fail(msg: String) -> Result<(), RenderError> {
            return Err(RenderError::Config(msg));
        }

        if self.width == 0 || self.height == 0 {
            return fail(format!("frame size {}x{} is empty", self.width, self.height));
        }
        if !(self.aperture() > 0.0) || !self.aperture().is_finite() {
            return fail(format!("aperture must be positive, got {}", self.aperture()));
        }
        if self.aspect == 0.0 || !self.aspect.is_finite() {
            return fail(format!("aspect must be non-zero, got {}", self.aspect));
        }
        let (offset_x, offset_y) = self.viewport_offset();
        if !offset_x.is_finite() || !offset_y.is_finite() {
            return fail(String::from("viewport offset must be finite"));
        }
        for (name, value) in [("eye", self.eye), ("center", self.center), ("up", self.up), ("ambient", self.ambient)] {
            if !is_finite(value) {
                return fail(format!("{} has non-finite components", name));
            }
        }
        if (self.eye() - self.center()).norm() < 1e-6 {
            return fail(String::from("eye and center coincide"));
        }
        for light in &self.lights {
            if !is_finite(light.direction) || !light.weight.is_finite() || light.weight < 0.0 {
                return fail(format!("bad light {:?}", light));
            }
            if to_vector(light.direction).norm() < 1e-6 {
                return fail(format!("light {:?} has no direction", light));
            }
        }
        let rotations = [self.model_rotation_x, self.model_rotation_y, self.model_rotation_z];
        if !(self.model_zoom > 0.0) || !self.model_zoom.is_finite() || !rotations.iter().all(|r| r.is_finite()) {
            return fail(String::from("model zoom must be positive and rotation finite"));
        }
        return Ok(());
    }

    pub fn eye(&self) -> Vector3<f32> {
        return to_vector(self.eye);
    }

    pub fn center(&self) -> Vector3<f32> {
        return to_vector(self.center);
    }

    pub fn up(&self) -> Vector3<f32> {
        return to_vector(self.up);
    }

    pub fn ambient(&self) -> Vector3<f32> {
        return to_vector(self.ambient);
    }

    pub fn lights(&self) -> Vec<Light> {
        return self
            .lights
            .iter()
            .map(|l| Light { direction: to_vector(l.direction), weight: l.weight })
            .collect();
    }

    pub fn aperture(&self) -> f32 {
        return self.aperture.unwrap_or(self.height as f32 * 0.816);
    }

    pub fn viewport_offset(&self) -> (f32, f32) {
        return self
            .viewport_offset
            .unwrap_or((-0.2 * self.width as f32, 0.092 * self.height as f32));
    }

    /// Viewport width and height, aperture stretched by the aspect.
    pub fn viewport_size(&self) -> (f32, f32) {
        let aspect_sqrt = self.aspect.abs().sqrt();
        return (self.aperture() * aspect_sqrt, self.aperture() / aspect_sqrt);
    }

    pub fn texture_suffixes(&self) -> TextureSuffixes {
        return TextureSuffixes {
            diffuse: self.diffuse_suffix.clone(),
            normal_map: self.normal_map_suffix.clone(),
        };
    }
}
