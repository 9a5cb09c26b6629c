//! Error types for the osprobe fusion engine

use thiserror::Error;

/// Common result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Engine-level errors
///
/// Only `Config` is a hard failure that prevents a run. `InvalidObservation`
/// is returned by the ledger and swallowed (with a warning) by the engine,
/// and `AlreadyRunning` is fatal only to the caller's new request, never to
/// the run already in flight.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// An adapter produced an out-of-contract observation
    #[error("Invalid observation: {0}")]
    InvalidObservation(String),

    /// Re-entrant run() call on a busy engine
    #[error("Detection run already in progress")]
    AlreadyRunning,
}

/// Per-source probe failure
///
/// Raised inside a signal source's capability probe. Never crosses the
/// engine boundary: the engine downgrades it to a failed trace step and
/// the run continues with zero contribution from that source.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// I/O error while reading platform state
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Probe did not settle within the configured deadline
    #[error("Probe timed out after {0}ms")]
    Timeout(u64),

    /// Capability not present or permission-gated on this host
    #[error("Capability unavailable: {0}")]
    Unavailable(String),

    /// Raw probe result could not be interpreted
    #[error("Parse error: {0}")]
    Parse(String),

    /// Internal probe error
    #[error("Internal error: {0}")]
    Internal(String),
}
