//! Running pipeline tasks

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::worker::{WorkerKind, WorkerStats};
use crate::errors::{PipelineError, PipelineResult};

use super::signals::SignalHandler;

/// Owns the spawned worker loops and their shutdown broadcast
pub struct PipelineHandle {
    shutdown_tx: broadcast::Sender<()>,
    tasks: Vec<(WorkerKind, JoinHandle<WorkerStats>)>,
    signal_task: Option<JoinHandle<()>>,
    timeout: Duration,
}

impl PipelineHandle {
    pub(super) fn new(
        shutdown_tx: broadcast::Sender<()>,
        tasks: Vec<(WorkerKind, JoinHandle<WorkerStats>)>,
        timeout: Duration,
    ) -> Self {
        Self {
            shutdown_tx,
            tasks,
            signal_task: None,
            timeout,
        }
    }

    /// Sender that stops the loops when fired
    pub fn shutdown_sender(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Forward CTRL-C and SIGTERM to the loops
    pub fn install_signal_handler(&mut self) {
        if self.signal_task.is_none() {
            let handler = SignalHandler::new(self.shutdown_tx.clone());
            self.signal_task = Some(handler.setup());
        }
    }

    /// Signal every loop to stop and collect their statistics
    ///
    /// Loops finish the message they are working on. Any still running after
    /// the timeout are aborted.
    pub async fn shutdown(mut self) -> PipelineResult<Vec<WorkerStats>> {
        info!("Shutting down pipeline");
        let _ = self.shutdown_tx.send(());

        if let Some(signal_task) = self.signal_task.take() {
            signal_task.abort();
        }

        let joined = tokio::time::timeout(
            self.timeout,
            futures::future::join_all(self.tasks.iter_mut().map(|(_, task)| task)),
        )
        .await;

        let results = match joined {
            Ok(results) => results,
            Err(_) => {
                error!("Pipeline shutdown timed out after {:?}", self.timeout);
                for (_, task) in &self.tasks {
                    task.abort();
                }
                return Err(PipelineError::ShutdownTimeout {
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        let mut stats = Vec::with_capacity(results.len());
        for ((kind, _), result) in self.tasks.iter().zip(results) {
            match result {
                Ok(worker_stats) => stats.push(worker_stats),
                Err(e) => {
                    error!("{} worker failed to join: {}", kind, e);
                    return Err(PipelineError::WorkerPanic {
                        stage: kind.to_string(),
                    });
                }
            }
        }

        info!("Pipeline stopped");
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::pipeline::create_shutdown_channel;

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_times_out_on_stuck_task() {
        let (tx, _) = create_shutdown_channel();
        let stuck = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            WorkerStats::new(WorkerKind::Scan)
        });
        let handle = PipelineHandle::new(tx, vec![(WorkerKind::Scan, stuck)], Duration::from_secs(5));

        let err = handle.shutdown().await.unwrap_err();
        assert!(matches!(err, PipelineError::ShutdownTimeout { seconds: 5 }));
    }

    #[tokio::test]
    async fn test_panicking_task_is_reported() {
        let (tx, _) = create_shutdown_channel();
        async fn explode() -> WorkerStats {
            panic!("boom")
        }
        let task = tokio::spawn(explode());
        let handle = PipelineHandle::new(tx, vec![(WorkerKind::Zip, task)], Duration::from_secs(5));

        let err = handle.shutdown().await.unwrap_err();
        assert!(matches!(err, PipelineError::WorkerPanic { ref stage } if stage == "zip"));
    }

    #[tokio::test]
    async fn test_loops_observe_shutdown_sender() {
        let (tx, _) = create_shutdown_channel();
        let mut rx = tx.subscribe();
        let task = tokio::spawn(async move {
            let _ = rx.recv().await;
            WorkerStats::new(WorkerKind::Download)
        });
        let handle = PipelineHandle::new(tx, vec![(WorkerKind::Download, task)], Duration::from_secs(5));

        let stats = handle.shutdown().await.unwrap();
        assert_eq!(stats[0].kind, WorkerKind::Download);
    }
}
