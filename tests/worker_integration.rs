//! Worker Integration Tests for Joki
//!
//! Runs real probe processes through a shell stand-in for fping that prints
//! summary lines for the addresses it is given.

#![cfg(unix)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use joki::debug::{self, DebugEvent, DebugSender};
use joki::orchestrator::Orchestrator;
use joki::probe::{ProbeLauncher, ProbeWorker};
use joki::sink::{BatchDispatcher, MetricsSink, Point, SinkError};
use joki::{AppConfig, Registry};
use tokio::process::Command;

// =============================================================================
// Test Helpers
// =============================================================================

/// Skips the fping flags and answers every address on stderr.
const ANSWER_ALL: &str = r#"while [ "$1" != "-C" ]; do shift; done; shift 2
for a in "$@"; do printf '%s : 0.50 0.70\n' "$a" >&2; done"#;

/// Prints nothing and fails like an fping that reached nobody.
const SILENT: &str = "exit 1";

/// Runs `sh -c <script>` with the fping arguments as positional parameters.
struct ShellLauncher {
    script: &'static str,
    spawns: AtomicUsize,
}

impl ShellLauncher {
    fn new(script: &'static str) -> Arc<Self> {
        Arc::new(Self {
            script,
            spawns: AtomicUsize::new(0),
        })
    }

    fn spawns(&self) -> usize {
        self.spawns.load(Ordering::SeqCst)
    }
}

impl ProbeLauncher for ShellLauncher {
    fn program(&self) -> &str {
        "sh"
    }

    fn command(&self, args: &[String]) -> Command {
        self.spawns.fetch_add(1, Ordering::SeqCst);
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(self.script).arg("sh").args(args);
        cmd
    }
}

/// Records every write, optionally after a delay.
#[derive(Default)]
struct RecordingSink {
    delay: Option<Duration>,
    started: AtomicUsize,
    writes: Mutex<Vec<Vec<Point>>>,
}

impl RecordingSink {
    fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    fn points(&self) -> Vec<Point> {
        self.writes.lock().unwrap().iter().flatten().cloned().collect()
    }

    async fn wait_for_writes(&self, count: usize) {
        for _ in 0..200 {
            if self.writes.lock().unwrap().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("sink did not receive {count} writes");
    }
}

#[async_trait::async_trait]
impl MetricsSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn write(&self, points: &[Point]) -> Result<(), SinkError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.writes.lock().unwrap().push(points.to_vec());
        Ok(())
    }
}

const CONFIG: &str = r#"
interval: 50
cycle: 1
influxdb: { host: 127.0.0.1, port: 8089, db: joki, measurement: ping }
probes:
  wan:
    be: 0
    af41: 136
targets:
  google: { name: Google DNS, address: 8.8.8.8, links: [wan] }
  gw: { name: Gateway, address: 10.1.1.1 }
"#;

fn setup() -> (Arc<AppConfig>, Arc<Registry>) {
    let config = AppConfig::from_yaml(CONFIG).expect("valid config");
    let registry = config.registry().expect("valid registry");
    (Arc::new(config), Arc::new(registry))
}

fn worker(
    profile: &str,
    launcher: Arc<ShellLauncher>,
    sink: Arc<RecordingSink>,
    debug: DebugSender,
) -> ProbeWorker {
    let (config, registry) = setup();
    let profile = registry.profile(profile).expect("profile exists").clone();
    ProbeWorker::new(
        &profile,
        &registry,
        &config,
        launcher,
        BatchDispatcher::new(sink, "ping", "collector-1"),
        debug,
    )
}

// =============================================================================
// Worker Tests
// =============================================================================

#[tokio::test]
async fn test_cycle_produces_tagged_points() {
    let launcher = ShellLauncher::new(ANSWER_ALL);
    let sink = Arc::new(RecordingSink::default());
    let mut w = worker("wan/af41", launcher.clone(), sink.clone(), DebugSender::disabled());

    let delay = w.run_cycle().await;
    assert_eq!(delay, Duration::from_millis(50));
    assert_eq!(launcher.spawns(), 1);

    sink.wait_for_writes(1).await;
    let points = sink.points();
    assert_eq!(points.len(), 2);

    let gw = points
        .iter()
        .find(|p| p.tags["target_host"] == "10.1.1.1")
        .expect("gateway point");
    assert_eq!(gw.tags["src_host"], "collector-1");
    assert_eq!(gw.tags["target_name"], "gw");
    assert_eq!(gw.tags["probe"], "af41");
    assert_eq!(gw.tags["probe_set"], "wan");
    assert!(gw.fields.contains_key("avg"));
    assert!(gw.to_line().contains("losspct=0i"));
}

#[tokio::test]
async fn test_profiles_sharing_an_address_report_separately() {
    let launcher = ShellLauncher::new(ANSWER_ALL);
    let sink = Arc::new(RecordingSink::default());

    let mut be = worker("wan/be", launcher.clone(), sink.clone(), DebugSender::disabled());
    let mut af41 = worker("wan/af41", launcher.clone(), sink.clone(), DebugSender::disabled());
    be.run_cycle().await;
    af41.run_cycle().await;

    sink.wait_for_writes(2).await;
    let mut probes: Vec<_> = sink
        .points()
        .into_iter()
        .filter(|p| p.tags["target_host"] == "8.8.8.8")
        .map(|p| p.tags["probe"].clone())
        .collect();
    probes.sort();
    assert_eq!(probes, ["af41", "be"]);
}

#[tokio::test]
async fn test_silent_probe_escalates_backoff() {
    let launcher = ShellLauncher::new(SILENT);
    let sink = Arc::new(RecordingSink::default());
    let mut w = worker("wan/be", launcher.clone(), sink.clone(), DebugSender::disabled())
        .with_backoff_step(Duration::from_millis(10));

    for level in 1..=3u32 {
        let delay = w.run_cycle().await;
        assert_eq!(delay, Duration::from_millis(10) * level);
    }
    assert_eq!(w.backoff().level(), 3);
    assert_eq!(launcher.spawns(), 3);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(sink.points().is_empty());
}

#[tokio::test]
async fn test_slow_sink_does_not_delay_cycles() {
    let launcher = ShellLauncher::new(ANSWER_ALL);
    let sink = RecordingSink::slow(Duration::from_secs(30));
    let w = worker("wan/be", launcher.clone(), sink.clone(), DebugSender::disabled());

    let result = tokio::time::timeout(Duration::from_millis(800), w.run()).await;
    assert!(result.is_err(), "worker loop never returns");

    // Every cycle handed off a batch; none of the writes has finished.
    assert!(launcher.spawns() >= 3, "only {} cycles ran", launcher.spawns());
    assert!(sink.started.load(Ordering::SeqCst) >= 3);
    assert!(sink.points().is_empty());
}

#[tokio::test]
async fn test_debug_events_follow_output() {
    let launcher = ShellLauncher::new(ANSWER_ALL);
    let sink = Arc::new(RecordingSink::default());
    let (tx, mut rx) = debug::channel(16);
    let mut w = worker("wan/be", launcher, sink, tx);

    w.run_cycle().await;

    let mut raw = 0;
    let mut samples = Vec::new();
    while let Ok(Some(event)) = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await {
        match event {
            DebugEvent::RawLine { profile, .. } => {
                assert_eq!(profile, "wan/be");
                raw += 1;
            }
            DebugEvent::Sample { target, .. } => samples.push(target),
            other => panic!("unexpected event: {other}"),
        }
    }
    samples.sort();
    assert_eq!(raw, 2);
    assert_eq!(samples, ["google", "gw"]);
}

// =============================================================================
// Orchestrator Tests
// =============================================================================

#[tokio::test]
async fn test_orchestrator_runs_every_profile() {
    let (config, registry) = setup();
    let launcher = ShellLauncher::new(ANSWER_ALL);
    let sink = Arc::new(RecordingSink::default());

    let running = Orchestrator::new(
        config,
        registry,
        launcher.clone(),
        BatchDispatcher::new(sink.clone(), "ping", "collector-1"),
    )
    .start();
    assert_eq!(running.profiles(), ["wan/af41", "wan/be"]);

    sink.wait_for_writes(4).await;
    running.shutdown().await;

    let points = sink.points();
    for probe in ["af41", "be"] {
        assert!(points.iter().any(|p| p.tags["probe"] == probe));
    }

    let spawned = launcher.spawns();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(launcher.spawns(), spawned, "no cycles after shutdown");
}
