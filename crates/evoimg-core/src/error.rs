//! Error types for reading, transforming and rendering circuits.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Every user-facing variant displays only its message, so callers can match
/// on the message text itself.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed module shape, empty node body, unreadable constant or a wrong
    /// argument count for a known operator.
    #[error("{0}")]
    Syntax(String),

    /// Missing or duplicated output realization, duplicated input realization,
    /// argument index out of range, reserved module name, duplicated module.
    #[error("{0}")]
    Structure(String),

    /// Missing entry point, entry outputs other than `rgb`, multi-output
    /// helper modules, undeclared callees and call arity mismatches.
    #[error("{0}")]
    Composition(String),

    #[error("Module `{module}` has a cycle: {unranked} nodes cannot be ordered")]
    Cycle { module: String, unranked: usize },

    /// Broken invariant inside the engine. Never caused by bad input once a
    /// circuit has been read successfully.
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// True for errors caused by the text or the configuration handed in by a
    /// caller, as opposed to engine defects and environment failures.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Error::Syntax(_)
                | Error::Structure(_)
                | Error::Composition(_)
                | Error::Cycle { .. }
                | Error::Config(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
