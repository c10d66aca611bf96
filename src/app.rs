use std::path::{Path, PathBuf};
use std::time;

use log::{debug, info, warn};
use nalgebra as na;
use na::Matrix4;

use crate::config::{Config, ModelErrorPolicy};
use crate::error::RenderError;
use crate::scene::model::Model;
use crate::scene::raster::draw_faces;
use crate::scene::shader::{DarbouxShader, PhongShader, ShaderKind, Uniforms};
use crate::scene::transform::{lookat, projection, rotation_x, rotation_y, rotation_z, viewport, zoom, Transforms};
use crate::scene::{check_destination, Scene};

/// Struct, defining execution context, resolved from the command line.
pub struct Params {
    pub config_path: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub shader: Option<ShaderKind>,
    pub model_paths: Vec<PathBuf>,
}

/// Config file looked up when none is given explicitly.
const DEFAULT_CONFIG: &str = "config.ron";

/// Config from an explicit path, or from the default location if it's there, or defaults.
pub fn resolve_config(params: &Params) -> Result<Config, RenderError> {
    let mut config = match &params.config_path {
        Some(path) => Config::load(path)?,
        None if Path::new(DEFAULT_CONFIG).exists() => Config::load(Path::new(DEFAULT_CONFIG))?,
        None => {
            info!("no {} found, using default settings", DEFAULT_CONFIG);
            Config::default()
        }
    };
    if let Some(output) = &params.output {
        config.output = output.clone();
    }
    if let Some(shader) = params.shader {
        config.shader = shader;
    }
    config.validate()?;
    return Ok(config);
}

/// Camera, perspective and viewport for the configured frame.
pub fn build_transforms(config: &Config) -> Result<Transforms, RenderError> {
    let eye = config.eye();
    let center = config.center();
    let (ax, ay, az) = (
        config.model_rotation_x.to_radians(),
        config.model_rotation_y.to_radians(),
        config.model_rotation_z.to_radians(),
    );
    let model_matrix: Matrix4<f32> = rotation_y(ay.cos(), ay.sin())
        * rotation_x(ax.cos(), ax.sin())
        * rotation_z(az.cos(), az.sin())
        * zoom(config.model_zoom);
    let (x, y) = config.viewport_offset();
    let (w, h) = config.viewport_size();
    return Ok(Transforms {
        model: model_matrix,
        view: lookat(eye, center, config.up())?,
        projection: projection(-1.0 / (eye - center).norm()),
        viewport: viewport(x, y, w, h),
    });
}

/// Draws every face of the model with the chosen shader. Returns the number of fragments written.
pub fn render_model(
    model: &Model,
    kind: ShaderKind,
    uniforms: &Uniforms,
    transforms: &Transforms,
    scene: &mut Scene,
) -> usize {
    return match kind {
        ShaderKind::Darboux => {
            let mut shader = DarbouxShader::new(model, uniforms);
            draw_faces(model.nfaces(), &transforms.viewport, &mut shader, scene)
        }
        ShaderKind::Phong => {
            let mut shader = PhongShader::new(model, uniforms);
            draw_faces(model.nfaces(), &transforms.viewport, &mut shader, scene)
        }
    };
}

/// Renders all models into one frame and writes it out.
/// Nothing is written unless the whole pass succeeds.
pub fn run(params: Params) -> Result<(), RenderError> {
    let config = resolve_config(&params)?;
    debug!("{:#?}", config);
    if params.model_paths.is_empty() {
        return Err(RenderError::Config(String::from("no model files given")));
    }
    // Failing here is cheaper than after rendering.
    check_destination(&config.output)?;

    let transforms = build_transforms(&config)?;
    let uniforms = Uniforms::new(&transforms, &config.lights(), config.ambient())?;
    let suffixes = config.texture_suffixes();
    let mut scene = Scene::new(config.width, config.height);

    let time_begin = time::Instant::now();
    let mut rendered = 0;
    for path in &params.model_paths {
        let model = match Model::load(path, &suffixes) {
            Ok(model) => model,
            Err(e) if e.is_asset_error() && config.on_model_error == ModelErrorPolicy::Skip => {
                warn!("skipping {}: {}", path.display(), e);
                continue;
            }
            Err(e) => return Err(e),
        };
        let fragments = render_model(&model, config.shader, &uniforms, &transforms, &mut scene);
        info!("{}: {} faces, {} fragments written", path.display(), model.nfaces(), fragments);
        rendered += 1;
    }
    if rendered == 0 {
        return Err(RenderError::NothingRendered);
    }
    info!(
        "rendered {} model(s) with {} shader, {} pixels covered in {:.3}s",
        rendered,
        config.shader,
        scene.covered_pixels(),
        time::Instant::now().duration_since(time_begin).as_secs_f32()
    );

    scene.write_to_file(&config.output)?;
    info!("frame written to {}", config.output.display());
    return Ok(());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::model::{Corner, Texture};
    use crate::scene::raster::{barycentric, triangle};
    use crate::scene::shader::{Light, Shader};
    use crate::scene::util::{embed_point, project_divide};
    use crate::scene::Color;
    use image::{Rgba, RgbaImage};
    use na::{vector, Matrix3, Vector2, Vector3, Vector4};
    use std::fs;

    fn reference_transforms(size: f32) -> Transforms {
        let eye = vector![3.0, 3.0, 3.0];
        let center = Vector3::zeros();
        return Transforms {
            model: Matrix4::identity(),
            view: lookat(eye, center, vector![0.0, 1.0, 0.0]).unwrap(),
            projection: projection(-1.0 / (eye - center).norm()),
            viewport: viewport(0.0, 0.0, size, size),
        };
    }

    fn cube_vertex(i: usize) -> Vector3<f32> {
        return vector![(i & 1) as f32 - 0.5, ((i >> 1) & 1) as f32 - 0.5, ((i >> 2) & 1) as f32 - 0.5];
    }

    /// Unit cube around the origin, counter-clockwise faces seen from outside.
    fn unit_cube() -> Model {
        let positions = (0..8).map(cube_vertex).collect();
        let normals = vec![
            vector![1.0, 0.0, 0.0],
            vector![-1.0, 0.0, 0.0],
            vector![0.0, 1.0, 0.0],
            vector![0.0, -1.0, 0.0],
            vector![0.0, 0.0, 1.0],
            vector![0.0, 0.0, -1.0],
        ];
        let uvs = vec![vector![0.0, 0.0], vector![1.0, 0.0], vector![1.0, 1.0], vector![0.0, 1.0]];
        let quads = [[1, 3, 7, 5], [0, 4, 6, 2], [2, 6, 7, 3], [0, 1, 5, 4], [4, 5, 7, 6], [0, 2, 3, 1]];
        let mut faces = Vec::new();
        for (n, q) in quads.iter().enumerate() {
            faces.push([Corner::new(q[0], 0, n), Corner::new(q[1], 1, n), Corner::new(q[2], 2, n)]);
            faces.push([Corner::new(q[0], 0, n), Corner::new(q[2], 2, n), Corner::new(q[3], 3, n)]);
        }
        let white = Texture::from_image(RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255])));
        return Model::new(positions, normals, uvs, faces).unwrap().with_diffuse_map(white);
    }

    /// Andrew's monotone chain, counter-clockwise.
    fn convex_hull(mut points: Vec<Vector2<f32>>) -> Vec<Vector2<f32>> {
        points.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap().then(a.y.partial_cmp(&b.y).unwrap()));
        let reversed: Vec<Vector2<f32>> = points.iter().rev().copied().collect();
        let mut hull: Vec<Vector2<f32>> = Vec::new();
        for chain in [&points, &reversed] {
            let start = hull.len();
            for &p in chain.iter() {
                while hull.len() >= start + 2 {
                    let (o, a) = (hull[hull.len() - 2], hull[hull.len() - 1]);
                    if (a - o).perp(&(p - o)) > 0.0 {
                        break;
                    }
                    hull.pop();
                }
                hull.push(p);
            }
            hull.pop();
        }
        return hull;
    }

    /// Smallest signed distance from `p` to the hull edges, positive inside.
    fn hull_distance(hull: &[Vector2<f32>], p: Vector2<f32>) -> f32 {
        let mut distance = f32::MAX;
        for k in 0..hull.len() {
            let a = hull[k];
            let b = hull[(k + 1) % hull.len()];
            distance = distance.min((b - a).perp(&(p - a)) / (b - a).norm());
        }
        return distance;
    }

    #[test]
    fn cube_renders_a_convex_silhouette() {
        let size = 100;
        let transforms = reference_transforms(size as f32);
        let uniforms = Uniforms::new(
            &transforms,
            &[Light { direction: vector![1.0, 3.0, 2.0], weight: 1.0 }],
            Vector3::zeros(),
        )
        .unwrap();
        let model = unit_cube();
        let mut scene = Scene::new(size, size);
        let written = render_model(&model, ShaderKind::Darboux, &uniforms, &transforms, &mut scene);
        let covered = scene.covered_pixels();
        // Captured from the first correct render of this setup.
        assert_eq!(covered, 1084);
        // No pixel center sits on a shared edge, so nothing is drawn twice.
        assert_eq!(written, covered);

        let screen = transforms.screen_matrix();
        let corners = (0..8).map(|i| project_divide(screen * embed_point(cube_vertex(i))).xy()).collect();
        let hull = convex_hull(corners);
        let mut strictly_inside = 0;
        for x in 0..size {
            for y in 0..size {
                let center = vector![x as f32 + 0.5, y as f32 + 0.5];
                let distance = hull_distance(&hull, center);
                if scene.depth(x, y) > f32::NEG_INFINITY {
                    assert!(distance > -1e-3, "fragment outside silhouette at ({}, {})", x, y);
                    assert_eq!(scene.get_pixel(x, y)[3], 255);
                } else if distance > 1e-3 {
                    strictly_inside += 1;
                }
            }
        }
        // Pixel centers well inside the silhouette are all covered.
        assert_eq!(strictly_inside, 0);

        // Same setup, same picture.
        let mut again = Scene::new(size, size);
        render_model(&model, ShaderKind::Darboux, &uniforms, &transforms, &mut again);
        assert_eq!(again.covered_pixels(), covered);
        assert_eq!(again.to_image(), scene.to_image());
    }

    /// Records where the surface point with the fragment weights projects to.
    struct RecordingShader {
        transforms: Transforms,
        corners: Matrix3<f32>,
        samples: Vec<(Vector2<u32>, Vector3<f32>)>,
    }

    impl Shader for RecordingShader {
        fn vertex(&mut self, _face: usize, corner: usize) -> Vector4<f32> {
            let positions = [vector![-1.5, 0.0, 1.5], vector![1.5, 0.0, 1.5], vector![1.5, 0.0, -1.5]];
            self.corners.set_column(corner, &positions[corner]);
            return self.transforms.clip_matrix() * embed_point(positions[corner]);
        }

        fn fragment(&mut self, coord: Vector2<u32>, bar_coord: Vector3<f32>) -> Option<Color> {
            self.samples.push((coord, bar_coord));
            return Some(Rgba([255, 255, 255, 255]));
        }
    }

    #[test]
    fn interpolation_is_perspective_correct() {
        let transforms = reference_transforms(100.0);
        let screen_matrix = transforms.screen_matrix();
        let mut shader = RecordingShader { transforms, corners: Matrix3::zeros(), samples: Vec::new() };
        let mut scene = Scene::new(100, 100);
        let clip = [shader.vertex(0, 0), shader.vertex(0, 1), shader.vertex(0, 2)];
        assert!(triangle(&clip, &transforms.viewport, &mut shader, &mut scene) > 100);

        let screen: Vec<Vector2<f32>> =
            (0..3).map(|k| project_divide(screen_matrix * embed_point(shader.corners.column(k).into_owned())).xy()).collect();
        let project_to_screen = |weights: Vector3<f32>| {
            project_divide(screen_matrix * embed_point(shader.corners * weights)).xy()
        };

        let mut worst_correct: f32 = 0.0;
        let mut worst_naive: f32 = 0.0;
        for (coord, bar) in &shader.samples {
            let center = vector![coord.x as f32 + 0.5, coord.y as f32 + 0.5];
            worst_correct = worst_correct.max((project_to_screen(*bar) - center).norm());
            let naive = barycentric(screen[0], screen[1], screen[2], center).unwrap();
            worst_naive = worst_naive.max((project_to_screen(naive) - center).norm());
        }
        assert!(worst_correct < 0.01, "perspective correct weights are off by {}", worst_correct);
        assert!(worst_naive > 0.25, "naive weights should drift, worst {}", worst_naive);
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("soft_raster_app_{}_{}", std::process::id(), name));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        return dir;
    }

    const TRIANGLE_OBJ: &str = "v -1 -1 0\nv 1 -1 0\nv 0 1 0\nvn 0 0 1\nf 1//1 2//1 3//1\n";

    fn params(dir: &Path, models: Vec<PathBuf>) -> Params {
        let config_path = dir.join("config.ron");
        fs::write(
            &config_path,
            "(width: 64, height: 64, eye: (0.0, 0.0, 3.0), aperture: Some(64.0), viewport_offset: Some((0.0, 0.0)))",
        )
        .unwrap();
        return Params {
            config_path: Some(config_path),
            output: Some(dir.join("frame.png")),
            shader: None,
            model_paths: models,
        };
    }

    #[test]
    fn run_writes_one_image_and_skips_broken_models() {
        let dir = temp_dir("run");
        let mesh = dir.join("triangle.obj");
        fs::write(&mesh, TRIANGLE_OBJ).unwrap();
        run(params(&dir, vec![dir.join("missing.obj"), mesh])).unwrap();

        let image = image::open(dir.join("frame.png")).unwrap().to_rgba8();
        assert_eq!(image.dimensions(), (64, 64));
        assert!(image.pixels().any(|p| p[3] == 255));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn run_refuses_existing_destination_before_loading() {
        let dir = temp_dir("exists");
        fs::write(dir.join("frame.png"), b"keep me").unwrap();
        let mesh = dir.join("triangle.obj");
        fs::write(&mesh, TRIANGLE_OBJ).unwrap();
        let result = run(params(&dir, vec![mesh]));
        assert!(matches!(result, Err(RenderError::DestinationExists(_))));
        assert_eq!(fs::read(dir.join("frame.png")).unwrap(), b"keep me");
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn run_fails_without_anything_to_render() {
        let dir = temp_dir("nothing");
        let result = run(params(&dir, vec![dir.join("missing.obj")]));
        assert!(matches!(result, Err(RenderError::NothingRendered)));
        assert!(!dir.join("frame.png").exists());

        let mut abort = params(&dir, vec![dir.join("missing.obj")]);
        fs::write(abort.config_path.as_ref().unwrap(), "(on_model_error: Abort)").unwrap();
        abort.output = Some(dir.join("abort.png"));
        assert!(matches!(run(abort), Err(RenderError::Io { .. })));

        let result = run(params(&dir, Vec::new()));
        assert!(matches!(result, Err(RenderError::Config(_))));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn model_rotations_leave_camera_and_lights_alone() {
        let still = build_transforms(&Config::default()).unwrap();
        let config = Config { model_rotation_x: 90.0, model_rotation_z: 30.0, model_zoom: 2.0, ..Config::default() };
        let turned = build_transforms(&config).unwrap();
        let (c, s) = (30.0f32.to_radians().cos(), 30.0f32.to_radians().sin());
        let expected = rotation_x(0.0, 1.0) * rotation_z(c, s) * zoom(2.0);
        assert!((turned.model - expected).norm() < 1e-5);
        assert_eq!(turned.view, still.view);
        assert_eq!(turned.light_matrix(), still.light_matrix());
    }

    #[test]
    fn degenerate_camera_is_a_config_error() {
        let config = Config { eye: (0.0, 4.0, 0.0), ..Config::default() };
        assert!(matches!(build_transforms(&config), Err(RenderError::DegenerateCamera)));
    }

    #[test]
    fn command_line_overrides_config() {
        let dir = temp_dir("overrides");
        let mut p = params(&dir, Vec::new());
        p.shader = Some(ShaderKind::Phong);
        let config = resolve_config(&p).unwrap();
        assert_eq!(config.shader, ShaderKind::Phong);
        assert_eq!(config.output, dir.join("frame.png"));
        assert_eq!(config.width, 64);
        fs::remove_dir_all(&dir).unwrap();
    }
}
