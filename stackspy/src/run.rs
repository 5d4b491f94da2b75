use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::error::SpyError;
use crate::session::{Session, SnapshotOutcome};
use crate::sink::Sink;

/// Highest snapshot rate a loop is configured with
pub const MAX_SAMPLE_RATE: u32 = 1_000_000;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoopStats {
    pub delivered: u64,
    pub dropped: u64,
    pub snapshot_errors: u64,
}

impl LoopStats {
    /// Snapshot calls made, whatever their result
    pub fn cycles(&self) -> u64 {
        self.delivered + self.dropped + self.snapshot_errors
    }
}

/// Drives one session at a fixed rate until halted.
///
/// Bridge calls block, so each snapshot runs under `block_in_place`; the loop
/// must be polled from a multi-threaded tokio runtime.
pub struct SamplingLoop<S> {
    session: Session,
    sink: S,
    period: Duration,
    max_cycles: Option<u64>,
}

impl<S: Sink> SamplingLoop<S> {
    pub fn new(session: Session, sink: S, rate_hz: u32) -> Self {
        let period = Duration::from_secs(1) / rate_hz.clamp(1, MAX_SAMPLE_RATE);
        Self { session, sink, period, max_cycles: None }
    }

    /// Stop on its own after `n` snapshot calls.
    pub fn with_max_cycles(mut self, n: u64) -> Self {
        self.max_cycles = Some(n);
        self
    }

    /// Sample until `halt` fires (or its sender goes away), the cycle limit is
    /// reached, or a fatal error occurs; then stop the session.
    ///
    /// Returns the stats and the sink so callers can flush it.
    pub async fn run(self, mut halt: watch::Receiver<()>) -> Result<(LoopStats, S), SpyError> {
        let Self { session, mut sink, period, max_cycles } = self;
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut stats = LoopStats::default();

        let result = loop {
            if max_cycles.map_or(false, |max| stats.cycles() >= max) {
                break Ok(());
            }
            tokio::select! {
                _ = ticker.tick() => (),
                _ = halt.changed() => break Ok(()),
            }

            match tokio::task::block_in_place(|| session.snapshot(&mut sink)) {
                Ok(SnapshotOutcome::Delivered) => stats.delivered += 1,
                Ok(SnapshotOutcome::Dropped(_)) => stats.dropped += 1,
                Err(e) if e.is_fatal() => {
                    error!(pid = %session.pid(), error = %e, "sampling loop aborted");
                    break Err(e);
                }
                Err(e) => {
                    warn!(pid = %session.pid(), error = %e, "snapshot failed");
                    stats.snapshot_errors += 1;
                }
            }
        };

        if let Err(e) = tokio::task::block_in_place(|| session.stop()) {
            warn!(pid = %session.pid(), error = %e, "stopping session failed");
        }
        info!(
            pid = %session.pid(),
            delivered = stats.delivered,
            dropped = stats.dropped,
            snapshot_errors = stats.snapshot_errors,
            "sampling finished"
        );

        result.map(|()| (stats, sink))
    }
}
