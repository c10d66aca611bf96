use log::trace;
use nalgebra as na;
use na::{vector, Matrix4, Vector2, Vector3, Vector4};

use super::shader::Shader;
use super::util::project_divide;
use super::Scene;

/// Smallest doubled signed area of a triangle, that still covers anything.
const MIN_AREA: f32 = f32::EPSILON;

/// Pixel range covered by a triangle's bounding box, inclusive on both ends.
#[derive(Debug, PartialEq, Eq)]
struct BoundingBox {
    ll: Vector2<u32>, // lower left corner
    ur: Vector2<u32>, // upper right corner
}

/// Bounding box of the screen points clamped to the scene, `None` if they don't overlap.
fn get_bounding_box(points: &[Vector2<f32>; 3], width: u32, height: u32) -> Option<BoundingBox> {
    if width == 0 || height == 0 {
        return None;
    }
    let min_x = points[0].x.min(points[1].x).min(points[2].x).floor();
    let min_y = points[0].y.min(points[1].y).min(points[2].y).floor();
    let max_x = points[0].x.max(points[1].x).max(points[2].x).ceil();
    let max_y = points[0].y.max(points[1].y).max(points[2].y).ceil();
    if max_x < 0.0 || max_y < 0.0 || min_x > (width - 1) as f32 || min_y > (height - 1) as f32 {
        return None;
    }
    return Some(BoundingBox {
        ll: vector![min_x.max(0.0) as u32, min_y.max(0.0) as u32],
        ur: vector![max_x.min((width - 1) as f32) as u32, max_y.min((height - 1) as f32) as u32],
    });
}

fn cross_2d(u: Vector2<f32>, v: Vector2<f32>) -> f32 {
    return u.x * v.y - u.y * v.x;
}

/// Doubled signed area of the triangle, positive for counter-clockwise winding.
pub fn signed_area(a: Vector2<f32>, b: Vector2<f32>, c: Vector2<f32>) -> f32 {
    return cross_2d(b - a, c - a);
}

/// Barycentric coordinates of `p` in triangle `a, b, c` as ratios of signed sub-triangle areas.
/// Triangles with zero or negative area have no inside, so `None` is returned for them.
pub fn barycentric(a: Vector2<f32>, b: Vector2<f32>, c: Vector2<f32>, p: Vector2<f32>) -> Option<Vector3<f32>> {
    let area = signed_area(a, b, c);
    if !(area > MIN_AREA) {
        return None;
    }
    let v = cross_2d(p - a, c - a) / area;
    let w = cross_2d(b - a, p - a) / area;
    return Some(vector![1.0 - v - w, v, w]);
}

/// Screen space barycentric coordinates turned into the weights of the triangle in clip space,
/// so that attributes interpolate linearly on the surface rather than on the screen.
pub fn perspective_correct(bar_screen: Vector3<f32>, w: Vector3<f32>) -> Vector3<f32> {
    let bar_clip = bar_screen.component_div(&w);
    return bar_clip / (bar_clip.x + bar_clip.y + bar_clip.z);
}

/// Rasterizes one triangle given by its clip space corners into the scene.
///
/// Pixel centers with all barycentric coordinates >= 0 are covered. A covered fragment is shaded
/// only if its depth is strictly greater (nearer) than the z-buffer value, so a pixel on an edge
/// shared by two triangles is written once. Returns the number of fragments written.
pub fn triangle<S: Shader>(clip: &[Vector4<f32>; 3], viewport: &Matrix4<f32>, shader: &mut S, scene: &mut Scene) -> usize {
    // Nothing behind the eye plane is drawn, there is no clipping.
    if clip.iter().any(|c| !(c.w > 0.0) || !c.iter().all(|v| v.is_finite())) {
        trace!("skipping triangle with a corner behind the eye: {:?}", clip);
        return 0;
    }
    let screen: [Vector3<f32>; 3] = [
        project_divide(viewport * clip[0]),
        project_divide(viewport * clip[1]),
        project_divide(viewport * clip[2]),
    ];
    let points = [screen[0].xy(), screen[1].xy(), screen[2].xy()];
    let depths = vector![screen[0].z, screen[1].z, screen[2].z];
    let w = vector![clip[0].w, clip[1].w, clip[2].w];

    if signed_area(points[0], points[1], points[2]) <= MIN_AREA {
        // Degenerate or facing away.
        return 0;
    }
    let bbox = match get_bounding_box(&points, scene.width, scene.height) {
        Some(bbox) => bbox,
        None => return 0,
    };

    let mut written = 0;
    for x in bbox.ll.x..=bbox.ur.x {
        for y in bbox.ll.y..=bbox.ur.y {
            let center = vector![x as f32 + 0.5, y as f32 + 0.5];
            let bar_screen = match barycentric(points[0], points[1], points[2], center) {
                Some(bar) => bar,
                None => return written,
            };
            if bar_screen.x < 0.0 || bar_screen.y < 0.0 || bar_screen.z < 0.0 {
                // If any of the coordinates are negative, point is not in the triangle.
                continue;
            }
            // z / w is linear in screen space, so plain screen weights interpolate it.
            let depth = bar_screen.dot(&depths);
            if !(depth > scene.depth(x, y)) {
                continue;
            }
            if let Some(color) = shader.fragment(vector![x, y], perspective_correct(bar_screen, w)) {
                scene.set_fragment(x, y, color, depth);
                written += 1;
            }
        }
    }
    return written;
}

/// Runs the vertex stage for every corner of every face and rasterizes the faces in order.
/// Returns the number of fragments written.
pub fn draw_faces<S: Shader>(nfaces: usize, viewport: &Matrix4<f32>, shader: &mut S, scene: &mut Scene) -> usize {
    let mut written = 0;
    for face in 0..nfaces {
        let clip = [shader.vertex(face, 0), shader.vertex(face, 1), shader.vertex(face, 2)];
        written += triangle(&clip, viewport, shader, scene);
    }
    return written;
}
