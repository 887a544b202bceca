use std::fmt;
use std::path::PathBuf;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal error taxonomy for dataset generation.
#[derive(Debug)]
pub enum Error {
    MissingPrecomputed { source: String, index: usize },
    DegeneratePair { i: usize, j: usize, norm: f64 },
    MissingFeatureRecord(usize),
    MissingMatchRecord(usize, usize),
    DatasetLayout { path: PathBuf, reason: String },
    Pool(String),
    Io(std::io::Error),
    Json(serde_json::Error),
    Image(image::ImageError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MissingPrecomputed { source, index } => write!(
                f,
                "missing precomputed features from source {source:?} for image {index}"
            ),
            Error::DegeneratePair { i, j, norm } => write!(
                f,
                "degenerate pair ({i}, {j}): relative translation norm {norm:.3e}"
            ),
            Error::MissingFeatureRecord(index) => {
                write!(f, "missing feature record for image {index}")
            }
            Error::MissingMatchRecord(i, j) => {
                write!(f, "missing match record for pair ({i}, {j})")
            }
            Error::DatasetLayout { path, reason } => {
                write!(f, "invalid dataset layout at {path:?}: {reason}")
            }
            Error::Pool(msg) => write!(f, "worker pool failure: {msg}"),
            Error::Io(e) => write!(f, "{e}"),
            Error::Json(e) => write!(f, "{e}"),
            Error::Image(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Json(e) => Some(e),
            Error::Image(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

impl From<image::ImageError> for Error {
    fn from(e: image::ImageError) -> Self {
        Error::Image(e)
    }
}
