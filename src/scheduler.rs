//! Tick-rate limiting for the control loop

use std::time::{Duration, Instant};

/// What the loop does while waiting for the next tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleStrategy {
    /// Yield to the runtime and check again immediately
    Spin,
    /// Sleep for most of the remaining interval
    Sleep,
}

impl IdleStrategy {
    pub fn from_flag(sleep_between_frames: bool) -> Self {
        if sleep_between_frames {
            IdleStrategy::Sleep
        } else {
            IdleStrategy::Spin
        }
    }

    /// Wait out part of `remaining` according to the strategy
    pub async fn idle(self, remaining: Duration) {
        match self {
            IdleStrategy::Spin => tokio::task::yield_now().await,
            IdleStrategy::Sleep => {
                let factor = crate::constants::control::IDLE_SLEEP_FACTOR;
                tokio::time::sleep(remaining.mul_f64(factor)).await;
            }
        }
    }
}

/// Outcome of polling the limiter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDecision {
    /// A tick should run now
    Due,
    /// Not yet; this much of the interval is left
    Wait(Duration),
}

/// Enforces a minimum spacing between ticks by comparing wall-clock times.
///
/// An overrunning tick is not compensated for: the next one fires as soon as
/// a full interval has passed since the previous one started.
#[derive(Debug, Clone)]
pub struct TickLimiter {
    interval: Duration,
    last_tick: Instant,
}

impl TickLimiter {
    pub fn new(ticks_per_second: u32, now: Instant) -> Self {
        Self {
            interval: Duration::from_secs_f64(1.0 / ticks_per_second.max(1) as f64),
            last_tick: now,
        }
    }

    /// Check whether a tick is due at `now`, recording it if so
    pub fn poll(&mut self, now: Instant) -> TickDecision {
        let elapsed = now.saturating_duration_since(self.last_tick);
        if elapsed > self.interval {
            self.last_tick = now;
            TickDecision::Due
        } else {
            TickDecision::Wait(self.interval - elapsed)
        }
    }
}
