//! Probe engine: fping output parsing, backoff and the per-profile worker.
//!
//! - [`parse_line`]: One fping summary line → [`Sample`] or [`FormatError`]
//! - [`ProbeWorker`]: Runs fping cycle after cycle for one profile
//! - [`Backoff`]: Cooldown after cycles that yield nothing
//! - [`ProbeLauncher`]: Seam between the worker and the process it starts

mod backoff;
mod error;
mod launcher;
mod parser;
mod worker;

pub use backoff::{BACKOFF_STEP, Backoff, MAX_BACKOFF_LEVEL};
pub use error::ProbeError;
pub use launcher::{FpingLauncher, ProbeLauncher, fping_args};
pub use parser::{FormatError, LOSS_SENTINEL, Latency, Sample, parse_line};
pub use worker::ProbeWorker;

/// Samples gathered in one cycle of one profile.
pub type Batch = Vec<Sample>;
