use std::net::IpAddr;
use thiserror::Error;

/// Errors surfaced by the probing engine.
///
/// Per-probe transport problems are normally folded into result values;
/// `Transport` is what those probes produce before they are recorded.
#[derive(Error, Debug)]
pub enum ReconError {
    #[error("cannot resolve host '{host}': {reason}")]
    Resolution { host: String, reason: String },

    #[error("host {0} is unreachable")]
    Unreachable(IpAddr),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("{0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ReconError>;
