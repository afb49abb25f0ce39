//! Error types.

use std::{io, path::PathBuf};

/// Errors returned synchronously by component accessors and generators.
#[derive(Clone, Eq, PartialEq, Debug, thiserror::Error)]
pub enum Error {
    /// The operation is not defined for the UUID version or generator at hand.
    #[error("operation not supported: {0}")]
    NotSupported(&'static str),
    /// A field value does not fit the width or epoch range of the target field.
    #[error("{name} must be between {min} and {max}")]
    ValueOutOfRange {
        /// Name of the offending field.
        name: &'static str,
        /// Smallest accepted value, rendered for display.
        min: String,
        /// Largest accepted value, rendered for display.
        max: String,
    },
    /// The operation cannot complete with the current inputs or collaborators.
    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),
    /// The generator has been disposed.
    #[error("the generator has been disposed")]
    Disposed,
    /// The platform cannot provide the requested information.
    #[error("operation not supported on this platform")]
    PlatformNotSupported,
}

impl Error {
    pub(crate) fn out_of_range(
        name: &'static str,
        min: impl ToString,
        max: impl ToString,
    ) -> Self {
        Self::ValueOutOfRange {
            name,
            min: min.to_string(),
            max: max.to_string(),
        }
    }
}

/// Result type with [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Failures of the state file. These never escape from the generation path; they are reported
/// through [`GeneratorState`](crate::state::GeneratorState)'s error listener.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The state file does not exist.
    #[error("state file not found: {}", .0.display())]
    FileNotFound(PathBuf),
    /// The state file ended before a complete record was read.
    #[error("unexpected end of state data")]
    UnexpectedEndOfData,
    /// The state file holds a record this library does not understand.
    #[error("invalid state data: {0}")]
    InvalidData(String),
    /// Any other I/O failure, including sharing violations.
    #[error("state file I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// Field-less summary of a [`StorageError`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum StorageErrorKind {
    /// The state file does not exist.
    FileNotFound,
    /// The state file is shorter than one record.
    UnexpectedEndOfData,
    /// The state file carries an unknown format tag.
    InvalidData,
    /// Any other I/O failure.
    Io,
}

impl StorageError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> StorageErrorKind {
        match self {
            Self::FileNotFound(_) => StorageErrorKind::FileNotFound,
            Self::UnexpectedEndOfData => StorageErrorKind::UnexpectedEndOfData,
            Self::InvalidData(_) => StorageErrorKind::InvalidData,
            Self::Io(_) => StorageErrorKind::Io,
        }
    }
}
