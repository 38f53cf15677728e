//! Periodic background maintenance tasks
//!
//! A sweeper runs a closure on a fixed interval until it is stopped. Stopping
//! is signalled over a watch channel and waits for the task to finish.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Handle to a running sweeper task
pub struct SweeperHandle {
    name: &'static str,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Spawn a task calling `tick` every `period`. The first call happens one
    /// full period after spawning.
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown, mut stop) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval() fires immediately; skip that one
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => tick().await,
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::debug!(sweeper = name, "Sweeper stopped");
        });

        tracing::debug!(sweeper = name, period_secs = period.as_secs_f64(), "Sweeper started");
        Self {
            name,
            shutdown,
            task,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal the task to stop and wait for it
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::error!(sweeper = self.name, error = %e, "Sweeper task failed");
        }
    }
}
