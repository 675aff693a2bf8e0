//! Error types for the helper layer

use camino::Utf8PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// A helper failure, tagged with the path it concerned
#[derive(Error, Debug)]
pub enum Error {
    /// A filesystem call failed while performing `action` on `path`
    #[error("{action} {path}: {source}")]
    Io {
        action: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `path` held, or would have held, invalid JSON
    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    /// Wrap an IO error with the action and path it came from
    pub fn io(action: &'static str, path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }

    /// Wrap a JSON (de)serialization error with the file it concerned
    pub fn json(path: impl Into<Utf8PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }

    /// The underlying IO error kind, if this is an IO failure
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            Self::Io { source, .. } => Some(source.kind()),
            Self::Json { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_io_error_display() {
        let err = Error::io(
            "read",
            "/tmp/missing.txt",
            io::Error::new(io::ErrorKind::NotFound, "no such file"),
        );
        assert_eq!(err.to_string(), "read /tmp/missing.txt: no such file");
        assert_eq!(err.io_kind(), Some(io::ErrorKind::NotFound));
    }

    #[test]
    fn test_json_error_has_no_io_kind() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = Error::json("/tmp/bad.json", source);
        assert!(err.to_string().starts_with("Invalid JSON in /tmp/bad.json"));
        assert_eq!(err.io_kind(), None);
    }
}
