//! Probe process errors.

use thiserror::Error;

/// Failures around the external fping process.
///
/// None of these stop a worker: the cycle keeps whatever samples it already
/// collected and the backoff logic takes it from there.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The process could not be started.
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The process started without a stderr pipe.
    #[error("stderr of '{0}' is not piped")]
    MissingPipe(String),

    /// Reading diagnostic output failed.
    #[error("failed to read probe output: {0}")]
    Read(#[source] std::io::Error),

    /// Waiting for the process failed.
    #[error("failed to wait for probe: {0}")]
    Wait(#[source] std::io::Error),
}
