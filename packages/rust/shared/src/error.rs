//! Error types for vinaya-notes.
//!
//! Library crates use [`VinayaError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all vinaya-notes operations.
#[derive(Debug, thiserror::Error)]
pub enum VinayaError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/API failure while fetching notes or the scid map.
    ///
    /// Transient failures have already been retried when this surfaces.
    #[error("fetch error: {url}: {message}")]
    Fetch {
        url: String,
        status: Option<u16>,
        message: String,
    },

    /// A note's segment identifier has no entry in the scid map.
    #[error("unresolved segment: {scid} has no entry in the scid map")]
    UnresolvedSegment { scid: String },

    /// Filesystem failure while writing rendered output.
    #[error("render error at {path:?}: {source}")]
    Render {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Filesystem I/O error while reading inputs.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Malformed scid map, notes payload, or other JSON input.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// HTML-to-Markdown conversion error.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// Output verification error (manifest mismatch, missing file, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, VinayaError>;

impl VinayaError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a fetch error for `url`.
    pub fn fetch(url: impl Into<String>, status: Option<u16>, msg: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            status,
            message: msg.into(),
        }
    }

    /// Create an unresolved-segment error.
    pub fn unresolved(scid: impl Into<String>) -> Self {
        Self::UnresolvedSegment { scid: scid.into() }
    }

    /// Wrap a `std::io::Error` raised while writing output.
    pub fn render(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Render {
            path: path.into(),
            source,
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// HTTP status attached to a fetch error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Fetch { status, .. } => *status,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = VinayaError::unresolved("pli-tv-bu-vb-pj1");
        assert_eq!(
            err.to_string(),
            "unresolved segment: pli-tv-bu-vb-pj1 has no entry in the scid map"
        );

        let err = VinayaError::fetch("https://example.com/notes", Some(503), "HTTP 503");
        assert!(err.to_string().contains("https://example.com/notes"));
        assert_eq!(err.status(), Some(503));
    }

    #[test]
    fn status_only_on_fetch_errors() {
        assert_eq!(VinayaError::parse("bad json").status(), None);
    }
}
