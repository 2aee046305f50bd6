use std::path::PathBuf;

use thiserror::Error;

/// Errors from codebase discovery and ignore-rule loading.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("workspace {} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("invalid ignore rule in {path}: {source}")]
    Ignore {
        path: PathBuf,
        #[source]
        source: ignore::Error,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ResolveError {
    ResolveError::Io {
        path: path.into(),
        source,
    }
}
