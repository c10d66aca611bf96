use std::fmt;
use std::path::PathBuf;

/// Everything that can stop a render pass.
///
/// Configuration errors come from resolved settings, asset errors from a single model
/// and its textures, output errors from the destination image.
#[derive(Debug)]
pub enum RenderError {
    Config(String),
    ConfigParse(ron::error::SpannedError),
    DegenerateCamera,
    SingularMatrix(&'static str),
    Io { path: PathBuf, source: std::io::Error },
    ObjParse { path: PathBuf, source: obj::ObjError },
    MeshIndex { face: usize, kind: &'static str, index: usize, len: usize },
    Texture { path: PathBuf, source: image::ImageError },
    DestinationExists(PathBuf),
    Write { path: PathBuf, source: image::ImageError },
    NothingRendered,
}

impl RenderError {
    /// Asset errors only affect the model being loaded, the pass may go on without it.
    pub fn is_asset_error(&self) -> bool {
        return matches!(
            self,
            RenderError::Io { .. }
                | RenderError::ObjParse { .. }
                | RenderError::MeshIndex { .. }
                | RenderError::Texture { .. }
        );
    }
}

impl From<ron::error::SpannedError> for RenderError {
    fn from(e: ron::error::SpannedError) -> Self {
        RenderError::ConfigParse(e)
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Config(msg) => write!(f, "configuration error: {}", msg),
            RenderError::ConfigParse(e) => write!(f, "config parse error: {}", e),
            RenderError::DegenerateCamera => {
                write!(f, "configuration error: up direction is parallel to the view direction")
            }
            RenderError::SingularMatrix(what) => write!(f, "singular matrix: {}", what),
            RenderError::Io { path, source } => {
                write!(f, "can't read {}: {}", path.display(), source)
            }
            RenderError::ObjParse { path, source } => {
                write!(f, "malformed mesh {}: {}", path.display(), source)
            }
            RenderError::MeshIndex { face, kind, index, len } => write!(
                f,
                "face {} references {} {} but only {} exist",
                face, kind, index, len
            ),
            RenderError::Texture { path, source } => {
                write!(f, "can't decode texture {}: {}", path.display(), source)
            }
            RenderError::DestinationExists(path) => {
                write!(f, "destination {} already exists", path.display())
            }
            RenderError::Write { path, source } => {
                write!(f, "can't write {}: {}", path.display(), source)
            }
            RenderError::NothingRendered => write!(f, "no model could be rendered"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::ConfigParse(e) => Some(e),
            RenderError::Io { source, .. } => Some(source),
            RenderError::ObjParse { source, .. } => Some(source),
            RenderError::Texture { source, .. } => Some(source),
            RenderError::Write { source, .. } => Some(source),
            _ => None,
        }
    }
}
