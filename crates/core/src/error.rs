//! Error taxonomy for the assessment pipeline.
//!
//! Each variant corresponds to a failure confinement boundary: `ConfigError` aborts
//! before any pipeline stage runs, `IoError`/`ArchiveError` are caught and logged at
//! their worker, `SecurityError` aborts only the archive currently being extracted,
//! and `InvariantError` aborts the whole run.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssessmentError {
    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("archive error in {path}: {message}")]
    Archive { path: PathBuf, message: String },

    #[error("path traversal attempt in {archive} via member {member}")]
    Security { archive: PathBuf, member: String },

    #[error("invariant violated in {component}: {message}")]
    Invariant { component: &'static str, message: String },
}

impl AssessmentError {
    pub fn config(message: impl Into<String>) -> Self {
        AssessmentError::Config { message: message.into() }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AssessmentError::Io { path: path.into(), source }
    }

    pub fn archive(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        AssessmentError::Archive { path: path.into(), message: message.into() }
    }

    pub fn security(archive: impl Into<PathBuf>, member: impl Into<String>) -> Self {
        AssessmentError::Security { archive: archive.into(), member: member.into() }
    }

    pub fn invariant(component: &'static str, message: impl Into<String>) -> Self {
        AssessmentError::Invariant { component, message: message.into() }
    }
}

pub type Result<T> = std::result::Result<T, AssessmentError>;
