use std::collections::TryReserveError;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NclistError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid interval database file: {0}")]
    Format(String),

    #[error("Failed to allocate {0}")]
    Allocation(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),
}

impl NclistError {
    /// Wrap a failed `try_reserve` with a description of what was being grown
    pub fn allocation(what: &str, err: TryReserveError) -> Self {
        NclistError::Allocation(format!("{what}: {err}"))
    }

    pub fn format<S: Into<String>>(msg: S) -> Self {
        NclistError::Format(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, NclistError>;
