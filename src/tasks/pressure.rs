//! Memory Pressure Task
//!
//! Forwards host memory-pressure signals into eviction sweeps, one sweep per
//! delivered signal.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::MediaCache;

/// Signals buffered while a sweep runs; further ones are dropped.
const SIGNAL_BUFFER: usize = 8;

// == Memory Pressure ==
/// Where a pressure signal came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryPressure {
    /// Host process signal (SIGUSR1)
    Signal,
    /// Admin endpoint
    Http,
}

// == Memory Pressure Monitor ==
/// Sending half handed to whatever observes the host's memory.
#[derive(Debug, Clone)]
pub struct MemoryPressureMonitor {
    tx: mpsc::Sender<MemoryPressure>,
}

impl MemoryPressureMonitor {
    /// Creates a monitor and the receiver to pass to [`spawn_pressure_task`].
    pub fn channel() -> (Self, mpsc::Receiver<MemoryPressure>) {
        let (tx, rx) = mpsc::channel(SIGNAL_BUFFER);
        (Self { tx }, rx)
    }

    /// Queues one sweep. Returns false once the task has stopped.
    ///
    /// Each queued signal halves the loaded images again, so a burst of `n`
    /// leaves about `2^-n` of them. Once [`SIGNAL_BUFFER`] sweeps are queued
    /// further signals are dropped and still report true.
    pub fn notify(&self, pressure: MemoryPressure) -> bool {
        match self.tx.try_send(pressure) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("Memory pressure ({:?}) dropped: {} sweeps queued", pressure, SIGNAL_BUFFER);
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Memory pressure ({:?}) dropped: task stopped", pressure);
                false
            }
        }
    }
}

/// Spawns the task that sweeps `cache` once per received signal.
///
/// The task ends when every [`MemoryPressureMonitor`] clone is dropped.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
pub fn spawn_pressure_task(
    cache: MediaCache,
    mut rx: mpsc::Receiver<MemoryPressure>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting memory pressure task");

        while let Some(pressure) = rx.recv().await {
            let evicted = cache.handle_memory_pressure().await;
            info!(
                "Memory pressure ({:?}): {} images evicted, {} signals queued",
                pressure,
                evicted.len(),
                rx.len()
            );
        }

        debug!("Memory pressure task stopped");
    })
}
