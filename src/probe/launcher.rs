//! fping invocation.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::config::FpingConfig;

/// Build the fping argument list for one profile.
///
/// `-C` makes fping send `cycle` probes per target and print one summary line
/// per target on stderr when done; `-O` sets the ToS byte; `-p` is the period
/// between probes to the same target.
pub fn fping_args(
    fping: &FpingConfig,
    tos: u8,
    interval_ms: u64,
    cycle: u32,
    addresses: &[String],
) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-B".into(),
        fping.backoff_factor.to_string(),
        "-D".into(),
        "-r".into(),
        fping.retries.to_string(),
        "-i".into(),
        fping.burst_interval.to_string(),
        "-e".into(),
        "-u".into(),
        "-O".into(),
        tos.to_string(),
        "-p".into(),
        interval_ms.to_string(),
        "-C".into(),
        cycle.to_string(),
    ];
    args.extend(addresses.iter().cloned());
    args
}

/// Turns an argument list into a ready-to-spawn command.
pub trait ProbeLauncher: Send + Sync + 'static {
    /// Program name for logs.
    fn program(&self) -> &str;

    /// Bare command; the worker sets up stdio.
    fn command(&self, args: &[String]) -> Command;
}

/// Launches the real fping binary.
#[derive(Debug, Clone)]
pub struct FpingLauncher {
    binary: PathBuf,
    label: String,
}

impl FpingLauncher {
    pub fn new(binary: impl AsRef<Path>) -> Self {
        let binary = binary.as_ref().to_path_buf();
        let label = binary.display().to_string();
        Self { binary, label }
    }
}

impl ProbeLauncher for FpingLauncher {
    fn program(&self) -> &str {
        &self.label
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args);
        cmd
    }
}

/// Apply the stdio layout every probe process runs with.
///
/// Results arrive on stderr; per-probe lines on stdout are discarded.
pub(crate) fn prepare(cmd: &mut Command) {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
}
