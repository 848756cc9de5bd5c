//! CLI Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A command-line error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for command-line operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// An argument is outside what the document allows.
    #[display("invalid argument: {_0}")]
    InvalidArgument(#[error(not(source))] String),
    /// Configuration could not be resolved.
    #[display("configuration unavailable")]
    Config,
    /// The session store could not be read or written.
    #[display("session store unavailable")]
    Session,
    /// Output could not be produced.
    #[display("output failed")]
    Output,
}
