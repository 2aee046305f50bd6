//! Workspace reader: the stat capability handlers check preconditions with.

use std::io::ErrorKind;
use std::path::Path;

use crate::error::ReadError;

/// The subset of file metadata the orchestrator looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo {
    pub is_dir: bool,
    pub size: u64,
}

pub trait WorkspaceReader: Send + Sync {
    /// Returns [`ReadError::NotExists`] when nothing is at `path`.
    fn stat(&self, path: &Path) -> Result<FileInfo, ReadError>;

    fn exists(&self, path: &Path) -> Result<bool, ReadError> {
        match self.stat(path) {
            Ok(_) => Ok(true),
            Err(ReadError::NotExists(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

/// [`WorkspaceReader`] over the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsWorkspaceReader;

impl WorkspaceReader for FsWorkspaceReader {
    fn stat(&self, path: &Path) -> Result<FileInfo, ReadError> {
        match std::fs::metadata(path) {
            Ok(meta) => Ok(FileInfo {
                is_dir: meta.is_dir(),
                size: meta.len(),
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(ReadError::NotExists(path.to_path_buf()))
            }
            Err(source) => Err(ReadError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn stat_distinguishes_missing_paths() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("gone.rs");
        let err = FsWorkspaceReader.stat(&missing).unwrap_err();
        assert!(matches!(err, ReadError::NotExists(_)));
        assert!(err.to_string().contains("does not exist"));
        assert!(!FsWorkspaceReader.exists(&missing).unwrap());
    }

    #[test]
    fn stat_reports_kind_and_size() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.rs");
        std::fs::write(&file, b"fn main() {}").unwrap();

        let info = FsWorkspaceReader.stat(&file).unwrap();
        assert!(!info.is_dir);
        assert_eq!(info.size, 12);
        assert!(FsWorkspaceReader.stat(dir.path()).unwrap().is_dir);
    }
}
