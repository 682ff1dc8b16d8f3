//! Spawned-loop ownership.
//!
//! A [`TaskHandle`] is the only way to reach a running loop. `shutdown`
//! signals cancellation and waits for the loop future to return, so once it
//! completes the loop body can never run again. Dropping the handle only
//! signals: the loop still reaches its own cancellation point, so work it
//! has started (a reversal, an eject window) runs to completion.

use std::future::Future;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

/// Cancellation flag observed by a loop between ticks.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested or the handle is gone.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[derive(Debug)]
pub struct TaskHandle {
    name: &'static str,
    cancel: watch::Sender<bool>,
    join: Option<JoinHandle<()>>,
}

impl TaskHandle {
    pub fn spawn<F, Fut>(name: &'static str, body: F) -> Self
    where
        F: FnOnce(CancelSignal) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (cancel, rx) = watch::channel(false);
        let join = tokio::spawn(body(CancelSignal { rx }));
        Self {
            name,
            cancel,
            join: Some(join),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Request cancellation and wait until the loop has exited.
    pub async fn shutdown(mut self) {
        self.cancel.send_replace(true);
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                if e.is_panic() {
                    warn!(task = self.name, "task panicked before shutdown");
                }
            }
        }
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        // Dropped without shutdown: detach, the loop exits at its next
        // cancellation point.
        if self.join.take().is_some() {
            self.cancel.send_replace(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn shutdown_waits_for_loop_exit() {
        let ticks = Arc::new(AtomicU32::new(0));
        let counter = ticks.clone();
        let handle = TaskHandle::spawn("counter", move |mut cancel| async move {
            loop {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(10)) => {}
                    _ = cancel.cancelled() => break,
                }
            }
        });

        tokio::time::sleep(Duration::from_millis(55)).await;
        handle.shutdown().await;
        let after_stop = ticks.load(Ordering::SeqCst);
        assert!(after_stop >= 5);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_finishes_current_work_then_stops() {
        let ticks = Arc::new(AtomicU32::new(0));
        let finished = Arc::new(AtomicU32::new(0));
        let (counter, done) = (ticks.clone(), finished.clone());
        let handle = TaskHandle::spawn("counter", move |mut cancel| async move {
            loop {
                counter.fetch_add(1, Ordering::SeqCst);
                // uninterruptible unit of work
                tokio::time::sleep(Duration::from_millis(30)).await;
                done.fetch_add(1, Ordering::SeqCst);
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(10)) => {}
                    _ = cancel.cancelled() => break,
                }
            }
        });
        tokio::time::sleep(Duration::from_millis(5)).await;
        drop(handle);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }
}
