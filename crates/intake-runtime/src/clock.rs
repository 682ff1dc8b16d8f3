use futures::future::BoxFuture;
use std::time::{Duration, Instant};

/// Time source for the control loops.
///
/// `sleep` is the only place a loop yields; everything between two sleeps
/// runs to completion.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

/// Clock backed by the tokio timer. Honours `tokio::time::pause`, so tests
/// running with `start_paused` see deterministic timestamps.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn paused_sleep_advances_now_exactly() {
        let clock = TokioClock;
        let t0 = clock.now();
        clock.sleep(Duration::from_millis(250)).await;
        assert_eq!(clock.now().duration_since(t0), Duration::from_millis(250));
    }
}
