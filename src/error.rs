use std::path::{Path, PathBuf};

use derive_more::{Display, From};
use stencil_bundle::BundleError;
use stencil_runtime::{BootError, LoadError, ResolutionError};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Display, Debug, From)]
pub enum Error {
    #[display("{}: {source}", path.display())]
    #[from(skip)]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[display("Failed to walk project: {_0}")]
    Walk(walkdir::Error),

    #[display("No templates found under {}", _0.display())]
    #[from(skip)]
    NoTemplates(PathBuf),

    #[display("Main component `{_0}` has no template")]
    #[from(skip)]
    MissingMain(String),

    #[display("{} is not a data-segment module", _0.display())]
    #[from(skip)]
    MalformedModule(PathBuf),

    #[display("Invalid JSON: {_0}")]
    Json(serde_json::Error),

    #[display("{_0}")]
    Bundle(BundleError),

    #[display("{_0}")]
    Load(LoadError),

    #[display("Invalid resolver map: {_0}")]
    ResolverMap(ResolutionError),

    #[display("{_0}")]
    Boot(BootError),
}

impl Error {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io { source, .. } => Some(source),
            Error::Walk(e) => Some(e),
            Error::Json(e) => Some(e),
            Error::Bundle(e) => Some(e),
            Error::Load(e) => Some(e),
            Error::ResolverMap(e) => Some(e),
            Error::Boot(e) => Some(e),
            _ => None,
        }
    }
}
