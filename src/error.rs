use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TailError {
    #[error("file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("permission denied: {}", path.display())]
    PermissionDenied { path: PathBuf },

    #[error("not a regular file: {}", path.display())]
    NotAFile { path: PathBuf },

    /// The file vanished or became unreadable while being polled.
    #[error("failed to read {}: {source}", path.display())]
    TransientRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid highlight pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TailError {
    /// Maps an error from opening or stat-ing `path` at attach time.
    pub fn from_open(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => TailError::NotFound {
                path: path.to_path_buf(),
            },
            io::ErrorKind::PermissionDenied => TailError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => TailError::Io(err),
        }
    }

    pub fn transient(path: &Path, source: io::Error) -> Self {
        TailError::TransientRead {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, TailError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_open_maps_kinds() {
        let path = Path::new("/var/log/app.log");

        let err = TailError::from_open(path, io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, TailError::NotFound { .. }));

        let err = TailError::from_open(path, io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, TailError::PermissionDenied { .. }));

        let err = TailError::from_open(path, io::Error::from(io::ErrorKind::Interrupted));
        assert!(matches!(err, TailError::Io(_)));
    }

    #[test]
    fn test_display() {
        let err = TailError::NotFound {
            path: PathBuf::from("/tmp/missing.log"),
        };
        assert_eq!(err.to_string(), "file not found: /tmp/missing.log");

        let err = TailError::transient(
            Path::new("/tmp/app.log"),
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.to_string(), "failed to read /tmp/app.log: gone");
    }
}
