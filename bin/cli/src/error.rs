//! CLI error type.

use std::fmt;
use std::path::PathBuf;

/// Errors surfaced by subcommands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliError {
    /// Configuration could not be loaded.
    Config { details: String },
    /// Reading or writing a file failed.
    Io { path: PathBuf, details: String },
    /// A graph or template could not be decoded or encoded.
    Codec { details: String },
    /// Preferences could not be read or written.
    Preferences { details: String },
    /// Starting or observing a run failed.
    Run { details: String },
    /// An argument was not usable.
    InvalidArgument { details: String },
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { details } => write!(f, "configuration error: {details}"),
            Self::Io { path, details } => write!(f, "{}: {details}", path.display()),
            Self::Codec { details } => write!(f, "{details}"),
            Self::Preferences { details } => write!(f, "preferences error: {details}"),
            Self::Run { details } => write!(f, "run error: {details}"),
            Self::InvalidArgument { details } => write!(f, "invalid argument: {details}"),
        }
    }
}

impl std::error::Error for CliError {}
