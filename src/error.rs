use std::path::PathBuf;
use thiserror::Error;

/// unitlint's error types.
#[derive(Debug, Error)]
pub enum UnitLintError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("cannot access {path}: {message}")]
    Access { path: PathBuf, message: String },

    #[error("not a unit file: {path}")]
    NotAUnitFile { path: PathBuf },

    #[error("unknown unit: {unit}")]
    UnknownUnit { unit: String },

    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, UnitLintError>;

impl UnitLintError {
    pub fn parse<P: Into<PathBuf>, S: Into<String>>(path: P, message: S) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn access<P: Into<PathBuf>, S: Into<String>>(path: P, message: S) -> Self {
        Self::Access {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn not_a_unit_file<P: Into<PathBuf>>(path: P) -> Self {
        Self::NotAUnitFile { path: path.into() }
    }

    pub fn unknown_unit<S: Into<String>>(unit: S) -> Self {
        Self::UnknownUnit { unit: unit.into() }
    }

    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}
