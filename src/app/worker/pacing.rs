//! Loop pacing and shutdown observation
//!
//! A `Pacer` maps iteration outcomes to sleep durations; a
//! `ShutdownListener` lets loops sleep without missing a shutdown broadcast.

use std::time::Duration;

use tokio::sync::broadcast::{self, error::TryRecvError};

use super::config::WorkerConfig;
use super::types::{IterationOutcome, WorkerKind};

/// Delay policy of a worker loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacer {
    /// Sleep after an empty poll
    pub idle: Duration,
    /// Sleep after requeueing a message
    pub requeue: Duration,
}

impl Pacer {
    pub fn new(idle: Duration, requeue: Duration) -> Self {
        Self { idle, requeue }
    }

    /// Pacer for a stage using the configured intervals
    pub fn for_kind(kind: WorkerKind, config: &WorkerConfig) -> Self {
        let requeue = match kind {
            WorkerKind::Scan => config.scan_requeue_delay,
            WorkerKind::Download | WorkerKind::Zip => Duration::ZERO,
        };
        Self::new(config.poll_interval(kind), requeue)
    }

    /// Sleep to take after `outcome`; `None` means continue at once
    pub fn delay_for(&self, outcome: IterationOutcome) -> Option<Duration> {
        let delay = match outcome {
            IterationOutcome::Idle => self.idle,
            IterationOutcome::Requeued => self.requeue,
            IterationOutcome::Processed => Duration::ZERO,
        };
        (!delay.is_zero()).then_some(delay)
    }
}

/// Receiving side of the shutdown broadcast
///
/// A closed channel counts as shutdown: once every sender is gone nobody can
/// stop the loop any more.
#[derive(Debug)]
pub struct ShutdownListener {
    rx: broadcast::Receiver<()>,
    triggered: bool,
}

impl ShutdownListener {
    pub fn new(rx: broadcast::Receiver<()>) -> Self {
        Self {
            rx,
            triggered: false,
        }
    }

    /// Whether shutdown was requested, without waiting
    pub fn is_triggered(&mut self) -> bool {
        if !self.triggered {
            match self.rx.try_recv() {
                Ok(()) | Err(TryRecvError::Closed) | Err(TryRecvError::Lagged(_)) => {
                    self.triggered = true;
                }
                Err(TryRecvError::Empty) => {}
            }
        }
        self.triggered
    }

    /// Sleep for `duration` unless shutdown arrives first
    ///
    /// Returns `true` when interrupted by shutdown.
    pub async fn sleep(&mut self, duration: Duration) -> bool {
        if self.is_triggered() {
            return true;
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            _ = self.rx.recv() => {
                self.triggered = true;
                true
            }
        }
    }
}
