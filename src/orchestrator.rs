//! Worker orchestration.
//!
//! Starts one [`ProbeWorker`] per profile that has targets, each after a
//! random delay shorter than the polling interval so fping instances do not
//! all fire at once, and routes the shared debug channel to one consumer.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::{JoinHandle, JoinSet};

use crate::config::AppConfig;
use crate::debug::{self, DebugReceiver, DebugSender};
use crate::probe::{BACKOFF_STEP, ProbeLauncher, ProbeWorker};
use crate::registry::Registry;
use crate::sink::BatchDispatcher;

/// Random startup delay in `[0, interval)`.
pub fn startup_jitter(interval: Duration) -> Duration {
    let max = interval.as_millis().min(u128::from(u64::MAX)) as u64;
    if max == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::random_range(0..max))
}

/// Builds and launches the worker fleet.
pub struct Orchestrator {
    config: Arc<AppConfig>,
    registry: Arc<Registry>,
    launcher: Arc<dyn ProbeLauncher>,
    dispatcher: BatchDispatcher,
    debug: DebugSender,
    debug_rx: Option<DebugReceiver>,
    backoff_step: Duration,
}

impl Orchestrator {
    /// Create an orchestrator. The debug channel is only opened when
    /// `config.debug` is set.
    pub fn new(
        config: Arc<AppConfig>,
        registry: Arc<Registry>,
        launcher: Arc<dyn ProbeLauncher>,
        dispatcher: BatchDispatcher,
    ) -> Self {
        let (debug, debug_rx) = if config.debug {
            let (tx, rx) = debug::channel(config.debug_channel_capacity);
            (tx, Some(rx))
        } else {
            (DebugSender::disabled(), None)
        };

        Self {
            config,
            registry,
            launcher,
            dispatcher,
            debug,
            debug_rx,
            backoff_step: BACKOFF_STEP,
        }
    }

    /// Override the per-level backoff sleep of every worker.
    pub fn with_backoff_step(mut self, step: Duration) -> Self {
        self.backoff_step = step;
        self
    }

    /// One worker per profile with at least one target.
    pub fn workers(&self) -> Vec<ProbeWorker> {
        let mut workers = Vec::new();

        for profile in self.registry.profiles() {
            if self.registry.targets_of(profile).next().is_none() {
                tracing::info!(profile = %profile.id(), "Profile has no targets, not starting a worker");
                continue;
            }

            if self.config.debug {
                for target in self.registry.targets_of(profile) {
                    tracing::info!(
                        profile = %profile.id(),
                        target = %target.id,
                        name = %target.name,
                        address = %target.address,
                        "Target"
                    );
                }
            }

            workers.push(
                ProbeWorker::new(
                    profile,
                    &self.registry,
                    &self.config,
                    Arc::clone(&self.launcher),
                    self.dispatcher.clone(),
                    self.debug.clone(),
                )
                .with_backoff_step(self.backoff_step),
            );
        }

        workers
    }

    /// Spawn the debug consumer and every worker.
    pub fn start(mut self) -> RunningWorkers {
        let debug_consumer = self.debug_rx.take().map(DebugReceiver::spawn_consumer);
        let interval = self.config.interval();

        let mut tasks = JoinSet::new();
        let mut profiles = Vec::new();

        for worker in self.workers() {
            let delay = startup_jitter(interval);
            tracing::debug!(profile = %worker.profile_id(), delay_ms = delay.as_millis(), "Scheduling worker");
            profiles.push(worker.profile_id().to_string());

            tasks.spawn(async move {
                tokio::time::sleep(delay).await;
                worker.run().await;
            });
        }

        tracing::info!(workers = profiles.len(), "Workers started");
        RunningWorkers {
            tasks,
            profiles,
            debug_consumer,
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("profiles", &self.registry.profiles().count())
            .field("debug", &self.debug.is_enabled())
            .finish_non_exhaustive()
    }
}

/// Handle to the spawned worker tasks.
#[derive(Debug)]
pub struct RunningWorkers {
    tasks: JoinSet<()>,
    profiles: Vec<String>,
    debug_consumer: Option<JoinHandle<()>>,
}

impl RunningWorkers {
    /// Profiles that got a worker.
    pub fn profiles(&self) -> &[String] {
        &self.profiles
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Wait until every worker task has ended. Workers only end by panicking
    /// or being aborted, so in practice this runs until shutdown.
    pub async fn join(&mut self) {
        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result
                && e.is_panic()
            {
                tracing::error!(error = %e, "Worker task panicked");
            }
        }
    }

    /// Abort every worker and the debug consumer. In-flight dispatches are
    /// not waited for.
    pub async fn shutdown(mut self) {
        self.tasks.shutdown().await;
        if let Some(consumer) = self.debug_consumer.take() {
            consumer.abort();
        }
        tracing::info!(workers = self.profiles.len(), "Workers stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::FpingLauncher;
    use crate::sink::{MetricsSink, Point, SinkError};

    struct NullSink;

    #[async_trait::async_trait]
    impl MetricsSink for NullSink {
        fn name(&self) -> &str {
            "null"
        }

        async fn write(&self, _points: &[Point]) -> Result<(), SinkError> {
            Ok(())
        }
    }

    const CONFIG: &str = r#"
influxdb: { host: 127.0.0.1, port: 8089, db: joki, measurement: ping }
probes:
  wan: { be: 0, af41: 136 }
  lab: { ef: 184 }
targets:
  google: { name: Google DNS, address: 8.8.8.8, links: [wan] }
"#;

    fn orchestrator(yaml: &str) -> Orchestrator {
        let config = Arc::new(AppConfig::from_yaml(yaml).unwrap());
        let registry = Arc::new(config.registry().unwrap());
        Orchestrator::new(
            config,
            registry,
            Arc::new(FpingLauncher::new("fping")),
            BatchDispatcher::new(Arc::new(NullSink), "ping", "h"),
        )
    }

    #[test]
    fn test_startup_jitter_bounds() {
        let interval = Duration::from_millis(1000);
        for _ in 0..200 {
            assert!(startup_jitter(interval) < interval);
        }
        assert_eq!(startup_jitter(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_workers_skip_profiles_without_targets() {
        let orch = orchestrator(CONFIG);
        let ids: Vec<_> = orch
            .workers()
            .iter()
            .map(|w| w.profile_id().to_string())
            .collect();
        assert_eq!(ids, vec!["wan/af41", "wan/be"]);
    }

    #[test]
    fn test_debug_channel_follows_config() {
        assert!(!orchestrator(CONFIG).debug.is_enabled());

        let debug = format!("debug: true\n{CONFIG}");
        let orch = orchestrator(&debug);
        assert!(orch.debug.is_enabled());
        assert!(orch.debug_rx.is_some());
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let running = orchestrator(CONFIG).start();
        assert_eq!(running.len(), 2);
        assert_eq!(running.profiles(), ["wan/af41", "wan/be"]);
        running.shutdown().await;
    }
}
