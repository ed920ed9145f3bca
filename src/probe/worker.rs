//! Per-profile probe worker.
//!
//! A worker owns one fping process at a time. Each cycle it runs fping with
//! `-C`, parses the summary lines into a batch, hands the batch to the
//! dispatcher and sleeps. Cycles never overlap and the loop never ends on its
//! own.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::config::AppConfig;
use crate::debug::{DebugEvent, DebugSender};
use crate::registry::{Profile, Registry};
use crate::sink::BatchDispatcher;

use super::backoff::{BACKOFF_STEP, Backoff};
use super::launcher::{ProbeLauncher, fping_args, prepare};
use super::parser::parse_line;
use super::{Batch, ProbeError};

/// fping exit codes up to this value report unreachable or unresolved
/// targets, which is ordinary monitoring data.
const FPING_MAX_EXPECTED_EXIT: i32 = 2;

/// One fping loop for one profile.
pub struct ProbeWorker {
    profile_id: String,
    probe: String,
    probe_set: String,
    tos: u8,
    addresses: Vec<String>,
    /// Address → target id, built once.
    reverse: HashMap<String, String>,
    args: Vec<String>,
    interval: Duration,
    backoff: Backoff,
    backoff_step: Duration,
    launcher: Arc<dyn ProbeLauncher>,
    dispatcher: BatchDispatcher,
    debug: DebugSender,
}

impl ProbeWorker {
    pub fn new(
        profile: &Profile,
        registry: &Registry,
        config: &AppConfig,
        launcher: Arc<dyn ProbeLauncher>,
        dispatcher: BatchDispatcher,
        debug: DebugSender,
    ) -> Self {
        let addresses = registry.addresses(profile);
        let args = fping_args(
            &config.fping,
            profile.tos,
            config.interval,
            config.cycle,
            &addresses,
        );

        Self {
            profile_id: profile.id(),
            probe: profile.probe.clone(),
            probe_set: profile.probe_set.clone(),
            tos: profile.tos,
            reverse: registry.reverse_map(profile),
            addresses,
            args,
            interval: config.interval(),
            backoff: Backoff::default(),
            backoff_step: BACKOFF_STEP,
            launcher,
            dispatcher,
            debug,
        }
    }

    /// Override the per-level backoff sleep (one minute by default).
    pub fn with_backoff_step(mut self, step: Duration) -> Self {
        self.backoff_step = step;
        self
    }

    pub fn profile_id(&self) -> &str {
        &self.profile_id
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }

    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// Run cycles forever.
    pub async fn run(mut self) {
        tracing::info!(
            profile = %self.profile_id,
            tos = self.tos,
            targets = %self.addresses.join(" "),
            "Starting worker"
        );
        self.debug.emit(|| DebugEvent::WorkerStarted {
            profile: self.profile_id.clone(),
            tos: self.tos,
            addresses: self.addresses.clone(),
        });

        loop {
            let delay = self.run_cycle().await;
            tokio::time::sleep(delay).await;
        }
    }

    /// Run one fping cycle, dispatch its batch and return the sleep before
    /// the next one.
    pub async fn run_cycle(&mut self) -> Duration {
        let batch = match self.collect().await {
            Ok(batch) => batch,
            Err(e) => {
                tracing::error!(profile = %self.profile_id, error = %e, "Probe cycle failed");
                Batch::new()
            }
        };
        self.finish_cycle(batch)
    }

    /// Spawn fping, read its stderr to the end and reap it.
    async fn collect(&mut self) -> Result<Batch, ProbeError> {
        let mut cmd = self.launcher.command(&self.args);
        prepare(&mut cmd);

        let mut child = cmd.spawn().map_err(|source| ProbeError::Spawn {
            program: self.launcher.program().to_string(),
            source,
        })?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ProbeError::MissingPipe(self.launcher.program().to_string()))?;

        let batch = self.read_batch(BufReader::new(stderr)).await;

        match child.wait().await {
            Ok(status) if status.success() => {}
            Ok(status) => match status.code() {
                Some(code) if code <= FPING_MAX_EXPECTED_EXIT => {
                    tracing::debug!(profile = %self.profile_id, code, "fping reported unreachable targets");
                }
                _ => {
                    tracing::warn!(profile = %self.profile_id, status = %status, "fping exited abnormally");
                }
            },
            Err(e) => {
                tracing::warn!(profile = %self.profile_id, error = %ProbeError::Wait(e), "Lost track of fping process");
            }
        }

        Ok(batch)
    }

    /// Parse every line of `reader` into a batch.
    ///
    /// Lines are decoded lossily, so stray non-UTF-8 bytes only spoil the
    /// line they sit on. Unparseable lines are logged and skipped. A read
    /// error ends the batch early with whatever was parsed so far.
    pub async fn read_batch<R>(&mut self, mut reader: R) -> Batch
    where
        R: AsyncBufRead + Unpin,
    {
        let mut batch = Batch::new();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(profile = %self.profile_id, error = %ProbeError::Read(e), "Stopped reading fping output");
                    break;
                }
            }
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(['\n', '\r']);
            if line.trim().is_empty() {
                continue;
            }

            self.debug.emit(|| DebugEvent::RawLine {
                profile: self.profile_id.clone(),
                line: line.to_string(),
            });

            match parse_line(line) {
                Ok(mut sample) => {
                    self.backoff.reset();

                    sample.probe = self.probe.clone();
                    sample.probe_set = self.probe_set.clone();
                    sample.target = self.reverse.get(&sample.host).cloned().unwrap_or_default();

                    self.debug.emit(|| DebugEvent::Sample {
                        profile: self.profile_id.clone(),
                        target: sample.target.clone(),
                        host: sample.host.clone(),
                        loss_pct: sample.loss_pct,
                        latency: sample.latency,
                    });
                    batch.push(sample);
                }
                Err(e) => {
                    let host = line.split_whitespace().next().unwrap_or_default();
                    tracing::warn!(profile = %self.profile_id, host = %host, error = %e, "Unparseable fping output");
                }
            }
        }

        batch
    }

    /// Hand a non-empty batch to the dispatcher, or escalate backoff.
    pub fn finish_cycle(&mut self, batch: Batch) -> Duration {
        if batch.is_empty() {
            let level = self.backoff.escalate();
            let delay = self.backoff.delay(self.interval, self.backoff_step);
            tracing::warn!(
                profile = %self.profile_id,
                backoff = level,
                delay_ms = delay.as_millis() as u64,
                "Worker yielded no results, backing off"
            );
            self.debug.emit(|| DebugEvent::Backoff {
                profile: self.profile_id.clone(),
                level,
                delay,
            });
        } else {
            tracing::debug!(profile = %self.profile_id, samples = batch.len(), "Cycle complete");
            // Detached; the sleep below never waits on the sink.
            drop(self.dispatcher.dispatch(self.profile_id.clone(), batch));
        }

        self.backoff.delay(self.interval, self.backoff_step)
    }
}

impl std::fmt::Debug for ProbeWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeWorker")
            .field("profile", &self.profile_id)
            .field("tos", &self.tos)
            .field("addresses", &self.addresses)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}
