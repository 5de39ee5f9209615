use std::time::Duration;
use tokio::{sync::mpsc::UnboundedSender, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::session::SessionMessage;

/// Accumulates time spent with nobody listening.
#[derive(Debug)]
pub struct IdleTracker {
    idle: Duration,
    threshold: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleVerdict {
    Occupied,
    Idle(Duration),
    Expired,
}

impl IdleTracker {
    pub fn new(threshold: Duration) -> Self {
        Self {
            idle: Duration::ZERO,
            threshold,
        }
    }

    /// Records one tick of `elapsed` with `listeners` people in the channel.
    pub fn observe(&mut self, listeners: usize, elapsed: Duration) -> IdleVerdict {
        if listeners > 0 {
            self.idle = Duration::ZERO;
            return IdleVerdict::Occupied;
        }

        self.idle += elapsed;
        if self.idle >= self.threshold {
            IdleVerdict::Expired
        } else {
            IdleVerdict::Idle(self.idle)
        }
    }

    #[cfg(test)]
    pub fn idle_for(&self) -> Duration {
        self.idle
    }
}

/// Sends `make()` into the session inbox every `period` until cancelled.
///
/// The first message goes out one full period after spawning.
pub(crate) fn spawn_ticker(
    name: &'static str,
    period: Duration,
    inbox: UnboundedSender<SessionMessage>,
    cancel: CancellationToken,
    make: fn() -> SessionMessage,
) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    if inbox.send(make()).is_err() {
                        break;
                    }
                }
            }
        }
        debug!("⏱️ {} ticker stopped", name);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_secs(60);

    #[test]
    fn stays_idle_below_the_threshold() {
        let mut tracker = IdleTracker::new(Duration::from_secs(300));
        for i in 1..=4 {
            assert_eq!(tracker.observe(0, TICK), IdleVerdict::Idle(TICK * i));
        }
        assert_eq!(tracker.idle_for(), Duration::from_secs(240));
    }

    #[test]
    fn expires_once_the_threshold_is_reached() {
        let mut tracker = IdleTracker::new(Duration::from_secs(300));
        for _ in 0..4 {
            tracker.observe(0, TICK);
        }
        assert_eq!(tracker.observe(0, TICK), IdleVerdict::Expired);
    }

    #[test]
    fn any_listener_resets_the_accumulator() {
        let mut tracker = IdleTracker::new(Duration::from_secs(300));
        for _ in 0..4 {
            tracker.observe(0, TICK);
        }
        assert_eq!(tracker.observe(2, TICK), IdleVerdict::Occupied);
        assert_eq!(tracker.idle_for(), Duration::ZERO);
        assert_eq!(tracker.observe(0, TICK), IdleVerdict::Idle(TICK));
    }
}
