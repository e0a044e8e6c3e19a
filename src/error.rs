//! Error handling stuff
use crate::sysfs::ControlPath;
use displaydoc::Display;
use std::io;
use thiserror::Error;

/// Error type for a single sysfs attribute write.
///
/// Neither variant is fatal. They are logged, recorded in a
/// [`Report`][crate::report::Report], and the pass moves on.
#[derive(Debug, Display, Error)]
pub enum WriteError {
    /// Failed to open {path}: {source}
    OpenFailed { path: ControlPath, source: io::Error },

    /// Failed to write '{value}' to {path}: {source}
    WriteFailed {
        path: ControlPath,
        value: String,
        source: io::Error,
    },
}

impl WriteError {
    /// The attribute this error is about
    pub fn path(&self) -> &ControlPath {
        match self {
            Self::OpenFailed { path, .. } | Self::WriteFailed { path, .. } => path,
        }
    }

    /// Underlying OS error
    pub fn io(&self) -> &io::Error {
        match self {
            Self::OpenFailed { source, .. } | Self::WriteFailed { source, .. } => source,
        }
    }
}

/// Error type for [`linpower::config`][crate::config]
#[derive(Debug, Display, Error)]
pub enum ConfigError {
    /// Couldn't read configuration {0}: {1}
    Read(String, #[source] io::Error),

    /// Invalid configuration: {0}
    Parse(#[from] toml::de::Error),

    /// Unknown category `{0}`
    UnknownCategory(String),

    /// Control path cannot be empty
    EmptyPath,
}
