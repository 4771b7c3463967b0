// SPDX-License-Identifier: GPL-3.0-only

//! Frame-producer thread handle shared by the stream backends

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

/// Handle to a frame-producer thread.
///
/// The thread observes the stop flag between frames; `stop` joins it, so a
/// closed stream holds no device resources once the call returns. Producers
/// must never block indefinitely (frame delivery uses `try_send`), which
/// keeps the join bounded.
pub(crate) struct StreamWorker {
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl StreamWorker {
    /// Spawn a producer thread. The closure receives the stop flag and must
    /// return promptly once it is set.
    pub(crate) fn spawn<F>(producer: F) -> Self
    where
        F: FnOnce(Arc<AtomicBool>) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let join = std::thread::spawn(move || producer(thread_stop));
        Self {
            stop,
            join: Some(join),
        }
    }

    /// Signal the producer to stop and wait for it to finish
    pub(crate) fn stop(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for StreamWorker {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_joins_producer() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = Arc::clone(&ran);
        let worker = StreamWorker::spawn(move |stop| {
            while !stop.load(Ordering::SeqCst) {
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
            ran_clone.store(true, Ordering::SeqCst);
        });
        worker.stop();
        assert!(ran.load(Ordering::SeqCst));
    }
}
