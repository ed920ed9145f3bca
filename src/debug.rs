//! Shared debug channel.
//!
//! Many workers produce, one consumer logs. The channel is bounded and drops
//! the oldest events when the consumer falls behind, so producers never wait
//! on it.

use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::probe::Latency;

/// Operator-facing events emitted when `debug` is enabled.
#[derive(Debug, Clone, PartialEq)]
pub enum DebugEvent {
    /// A worker is about to run its first cycle.
    WorkerStarted {
        profile: String,
        tos: u8,
        addresses: Vec<String>,
    },
    /// Raw line read from fping.
    RawLine { profile: String, line: String },
    /// Parsed result for one host.
    Sample {
        profile: String,
        target: String,
        host: String,
        loss_pct: u8,
        latency: Option<Latency>,
    },
    /// A worker yielded nothing and sleeps for `delay` at backoff `level`.
    Backoff {
        profile: String,
        level: u8,
        delay: Duration,
    },
}

impl std::fmt::Display for DebugEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WorkerStarted {
                profile,
                tos,
                addresses,
            } => write!(
                f,
                "{profile} - starting worker, tos {tos}: {}",
                addresses.join(" ")
            ),
            Self::RawLine { profile, line } => write!(f, "{profile} - {line}"),
            Self::Sample {
                profile,
                target,
                host,
                loss_pct,
                latency: Some(l),
            } => write!(
                f,
                "{profile} - {target} [{host}] loss: {loss_pct}%, min: {:.2}, avg: {:.2}, max: {:.2}",
                l.min, l.avg, l.max
            ),
            Self::Sample {
                profile,
                target,
                host,
                latency: None,
                ..
            } => write!(f, "{profile} - {target} [{host}] is down"),
            Self::Backoff {
                profile,
                level,
                delay,
            } => write!(
                f,
                "{profile} - yielded no results, backoff {level}, sleeping for {}",
                humantime::format_duration(*delay)
            ),
        }
    }
}

/// Producer side; cheap to clone, a no-op when debug is off.
#[derive(Debug, Clone, Default)]
pub struct DebugSender {
    tx: Option<broadcast::Sender<DebugEvent>>,
}

impl DebugSender {
    /// A sender that discards everything.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Publish an event. The closure only runs when debug is on.
    pub fn emit(&self, event: impl FnOnce() -> DebugEvent) {
        if let Some(tx) = &self.tx {
            // No receiver left means nobody is listening; nothing to do.
            let _ = tx.send(event());
        }
    }
}

/// Consumer side.
#[derive(Debug)]
pub struct DebugReceiver {
    rx: broadcast::Receiver<DebugEvent>,
}

impl DebugReceiver {
    /// Next event, skipping over gaps left by dropped events.
    ///
    /// Returns `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<DebugEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Debug consumer lagged, oldest events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Log every event until the channel closes.
    pub fn spawn_consumer(mut self) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = self.recv().await {
                tracing::info!(target: "joki::debug", "{event}");
            }
        })
    }
}

/// Create a bounded drop-oldest debug channel.
///
/// # Panics
/// Panics if `capacity` is zero; configuration validation rejects that.
pub fn channel(capacity: usize) -> (DebugSender, DebugReceiver) {
    let (tx, rx) = broadcast::channel(capacity);
    (DebugSender { tx: Some(tx) }, DebugReceiver { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(i: usize) -> DebugEvent {
        DebugEvent::RawLine {
            profile: "wan/be".to_string(),
            line: format!("line {i}"),
        }
    }

    #[tokio::test]
    async fn test_drop_oldest_when_full() {
        let (tx, mut rx) = channel(4);
        for i in 0..10 {
            tx.emit(|| raw(i));
        }

        // Only the newest four survive.
        for i in 6..10 {
            assert_eq!(rx.recv().await, Some(raw(i)));
        }

        drop(tx);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_disabled_sender_skips_closure() {
        let tx = DebugSender::disabled();
        assert!(!tx.is_enabled());
        tx.emit(|| panic!("closure must not run when disabled"));
    }

    #[test]
    fn test_display() {
        let up = DebugEvent::Sample {
            profile: "wan/be".to_string(),
            target: "google".to_string(),
            host: "8.8.8.8".to_string(),
            loss_pct: 10,
            latency: Some(Latency {
                min: 1.0,
                avg: 1.5,
                max: 2.0,
            }),
        };
        assert_eq!(
            up.to_string(),
            "wan/be - google [8.8.8.8] loss: 10%, min: 1.00, avg: 1.50, max: 2.00"
        );

        let backoff = DebugEvent::Backoff {
            profile: "wan/be".to_string(),
            level: 3,
            delay: Duration::from_secs(180),
        };
        assert_eq!(
            backoff.to_string(),
            "wan/be - yielded no results, backoff 3, sleeping for 3m"
        );
    }
}
