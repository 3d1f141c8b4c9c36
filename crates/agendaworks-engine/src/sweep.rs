//! Background sweeper: a supervised tokio task that runs the daily
//! escalation sweep and shuts down on request.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::engine::Engine;

/// Handle to a running sweeper. Dropping it without calling
/// [`SweeperHandle::shutdown`] also stops the task: the stop channel
/// closes and the loop exits on its next wakeup.
pub struct SweeperHandle {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the sweeper to stop and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.handle.await {
            if !e.is_cancelled() {
                tracing::error!("sweeper task panicked: {e}");
            }
        }
    }
}

/// Spawn the background sweeper. It sweeps immediately, then wakes on
/// every poll interval to catch the day rollover. The engine's own
/// once-per-day guard makes the extra wakeups harmless.
pub fn spawn_sweeper(engine: Arc<Engine>, poll_interval: Duration) -> SweeperHandle {
    let (stop, mut stop_rx) = watch::channel(false);
    let handle = tokio::spawn(async move {
        tracing::info!("🔔 Escalation sweeper started (poll every {poll_interval:?})");
        let mut ticker = tokio::time::interval(poll_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let today = chrono::Local::now().date_naive();
                    match engine.run_sweep(today, false).await {
                        Ok(outcome) if !outcome.skipped => {
                            tracing::info!(
                                "sweep for {today}: {} evaluated, {} alert(s)",
                                outcome.evaluated,
                                outcome.alerts
                            );
                        }
                        Ok(_) => {}
                        Err(e) => tracing::error!("⚠️ sweep failed: {e}"),
                    }
                }
                res = stop_rx.changed() => {
                    // Err means the sender side is gone: the handle was
                    // dropped without shutdown. Stop either way.
                    if res.is_err() || *stop_rx.borrow() {
                        tracing::info!("escalation sweeper stopping");
                        break;
                    }
                }
            }
        }
    });
    SweeperHandle { stop, handle }
}
