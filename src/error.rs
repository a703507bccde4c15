use std::path::PathBuf;
use thiserror::Error;

pub type AugmentResult<T> = Result<T, AugmentError>;

/// Errors raised while reading, transforming or writing a dataset pair.
///
/// None of these abort a batch: the driver logs them, counts them in
/// [`ProcessingStats`](crate::types::ProcessingStats) and moves on to the next pair.
#[derive(Debug, Error)]
pub enum AugmentError {
    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },
    #[error("image missing or unreadable: {path}")]
    MissingImage { path: PathBuf },
    #[error("invalid transform: {0}")]
    InvalidTransformSpec(String),
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("image codec error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("yaml parse error at {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl AugmentError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        AugmentError::MalformedRecord {
            line: 0,
            reason: reason.into(),
        }
    }

    /// Attach a 1-based line number to a `MalformedRecord`; other variants pass through.
    pub(crate) fn at_line(self, line: usize) -> Self {
        match self {
            AugmentError::MalformedRecord { reason, .. } => {
                AugmentError::MalformedRecord { line, reason }
            }
            other => other,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AugmentError::Io {
            path: path.into(),
            source,
        }
    }
}
