//! Cooldown for workers whose cycles yield nothing.

use std::time::Duration;

/// Highest backoff level.
pub const MAX_BACKOFF_LEVEL: u8 = 9;

/// Sleep added per backoff level.
pub const BACKOFF_STEP: Duration = Duration::from_secs(60);

/// Backoff level of one worker, 0..=9.
///
/// Level 0 means the worker runs at its configured interval. Every empty
/// cycle raises the level by one; any parsed sample drops it back to 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Backoff {
    level: u8,
}

impl Backoff {
    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn reset(&mut self) {
        self.level = 0;
    }

    /// Raise the level by one, saturating at [`MAX_BACKOFF_LEVEL`].
    pub fn escalate(&mut self) -> u8 {
        self.level = (self.level + 1).min(MAX_BACKOFF_LEVEL);
        self.level
    }

    /// Sleep before the next cycle: `interval` at level 0, `level * step` otherwise.
    pub fn delay(&self, interval: Duration, step: Duration) -> Duration {
        match self.level {
            0 => interval,
            level => step * u32::from(level),
        }
    }
}
