use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::SchedulingQueue;

/// The background process that keeps the queue reordering over time.
///
/// At a fixed interval it recomputes every waiting score (the wait factor
/// grows) and rebuilds the heap, so a patient who has waited long enough
/// eventually overtakes one with a marginally better condition. Between two
/// passes, scores may be up to one interval stale.
pub struct Rescorer {
    shutdown: Sender<()>,
    handle: JoinHandle<()>,
}

impl Rescorer {
    /// Spawns the rescoring thread ticking at `interval`.
    #[must_use]
    pub fn start(queue: Arc<SchedulingQueue>, interval: Duration) -> Self {
        let (shutdown, ticks) = mpsc::channel();
        let handle = std::thread::spawn(move || loop {
            match ticks.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => queue.rescore(),
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });
        Self { shutdown, handle }
    }

    /// Stops the next periodic trigger and joins the thread.
    pub fn stop(self) {
        // The thread may have exited already if the channel disconnected.
        let _ = self.shutdown.send(());
        if self.handle.join().is_err() {
            log::error!("rescorer thread panicked");
        }
    }
}
