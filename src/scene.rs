pub mod buffer;
pub mod model;
pub mod raster;
pub mod shader;
pub mod transform;
pub mod util;

use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Seek, Write};
use std::path::Path;

use image::{imageops, DynamicImage, ImageError, ImageFormat, Rgba, RgbaImage};
use log::debug;

use crate::error::RenderError;

/// Raw rgba8 pixel data.
pub type Color = Rgba<u8>;

/// Value of the z-buffer before anything has been drawn. Larger z is nearer to the camera.
pub const FAR: f32 = f32::NEG_INFINITY;

/// Scene, holding its width, height, color data and the z-buffer.
/// (0, 0) is the bottom left coordinate, rows are flipped only when the scene is written out.
pub struct Scene {
    pub width: u32,
    pub height: u32,
    z_buffer: Vec<f32>,       // Nearest depth seen so far for every pixel.
    render_data: RgbaImage,   // Color data, row 0 is the bottom row.
}

impl Scene {
    /// Generates new Scene struct with specified width and height.
    pub fn new(width: u32, height: u32) -> Scene {
        let n_pixels = (width as usize) * (height as usize);
        return Scene {
            width,
            height,
            z_buffer: vec![FAR; n_pixels],
            render_data: RgbaImage::new(width, height),
        };
    }

    fn index(&self, x: u32, y: u32) -> usize {
        return x as usize + y as usize * self.width as usize;
    }

    pub fn depth(&self, x: u32, y: u32) -> f32 {
        return self.z_buffer[self.index(x, y)];
    }

    #[cfg(test)]
    pub fn get_pixel(&self, x: u32, y: u32) -> Color {
        return *self.render_data.get_pixel(x, y);
    }

    /// Stores an accepted fragment: its color and its depth.
    pub fn set_fragment(&mut self, x: u32, y: u32, color: Color, depth: f32) {
        let index = self.index(x, y);
        self.z_buffer[index] = depth;
        self.render_data.put_pixel(x, y, color);
    }

    /// Number of pixels some fragment has been written to.
    pub fn covered_pixels(&self) -> usize {
        return self.z_buffer.iter().filter(|z| **z > FAR).count();
    }

    /// Scene as an image, with row 0 on top as image files expect.
    pub fn to_image(&self) -> RgbaImage {
        return imageops::flip_vertical(&self.render_data);
    }

    /// Writes the scene to a new file, format is deduced from the extension.
    /// Never overwrites: an existing destination is reported and left untouched.
    pub fn write_to_file(&self, path: &Path) -> Result<(), RenderError> {
        let format = ImageFormat::from_path(path).map_err(|e| RenderError::Write {
            path: path.to_path_buf(),
            source: e,
        })?;
        let file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(RenderError::DestinationExists(path.to_path_buf()));
            }
            Err(e) => {
                return Err(RenderError::Write { path: path.to_path_buf(), source: e.into() });
            }
        };

        let image = DynamicImage::ImageRgba8(self.to_image());
        // Only some encoders take an alpha channel.
        let image = match format {
            ImageFormat::Png | ImageFormat::Tiff | ImageFormat::WebP | ImageFormat::Tga => image,
            _ => DynamicImage::ImageRgb8(image.to_rgb8()),
        };
        if let Err(e) = encode(&image, format, file) {
            // Partial images are never left behind.
            let _ = fs::remove_file(path);
            return Err(RenderError::Write { path: path.to_path_buf(), source: e });
        }
        debug!("wrote {}x{} image to {}", self.width, self.height, path.display());
        return Ok(());
    }
}

/// Encodes the image into `out`. Buffered bytes are flushed before returning,
/// so a failing write is reported here rather than lost on drop.
fn encode<W: Write + Seek>(image: &DynamicImage, format: ImageFormat, out: W) -> Result<(), ImageError> {
    let mut writer = BufWriter::new(out);
    image.write_to(&mut writer, format)?;
    writer.flush()?;
    return Ok(());
}

/// Checks ahead of rendering that the scene can be written to `path`.
pub fn check_destination(path: &Path) -> Result<(), RenderError> {
    if path.exists() {
        return Err(RenderError::DestinationExists(path.to_path_buf()));
    }
    if let Err(e) = ImageFormat::from_path(path) {
        return Err(RenderError::Write { path: path.to_path_buf(), source: e });
    }
    return Ok(());
}
