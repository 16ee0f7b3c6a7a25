//! Periodic re-observation while disconnected.
//!
//! [`RetryScheduler`] owns at most one background task that calls a tick
//! callback every `interval`. The monitor uses the tick to take a fresh
//! path observation and feed it back through its command channel, so ticks
//! are serialized with organic path updates.

use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval_at};
use tracing::debug;

/// Recurring short-interval timer.
#[derive(Debug)]
pub struct RetryScheduler {
    interval: Duration,
    task: Option<JoinHandle<()>>,
}

impl RetryScheduler {
    /// Create a stopped scheduler.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            task: None,
        }
    }

    /// Tick interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns true while the timer task is alive.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Start ticking.
    ///
    /// The first tick fires one interval from now. Calling this while the
    /// timer is running is a no-op and returns `false`. The timer stops on
    /// its own when `on_tick` returns [`ControlFlow::Break`].
    pub fn start<F, Fut>(&mut self, mut on_tick: F) -> bool
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        if self.is_running() {
            return false;
        }

        let period = self.interval;
        debug!(?period, "retry scheduler started");
        self.task = Some(tokio::spawn(async move {
            let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if on_tick().await.is_break() {
                    debug!("retry scheduler stopped by tick");
                    break;
                }
            }
        }));
        true
    }

    /// Cancel the timer. Safe to call when already stopped.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take()
            && !task.is_finished()
        {
            task.abort();
            debug!("retry scheduler stopped");
        }
    }
}

impl Drop for RetryScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counting(counter: &Arc<AtomicU32>) -> impl FnMut() -> std::future::Ready<ControlFlow<()>> + Send + 'static {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(ControlFlow::Continue(()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_every_interval() {
        let ticks = Arc::new(AtomicU32::new(0));
        let mut retry = RetryScheduler::new(Duration::from_secs(5));
        assert!(retry.start(counting(&ticks)));
        assert!(retry.is_running());

        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);

        retry.stop();
        assert!(!retry.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_while_running_is_noop() {
        let ticks = Arc::new(AtomicU32::new(0));
        let mut retry = RetryScheduler::new(Duration::from_secs(5));
        assert!(retry.start(counting(&ticks)));
        assert!(!retry.start(counting(&ticks)));

        tokio::time::sleep(Duration::from_millis(5_100)).await;
        // A second timer would have doubled the count.
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let ticks = Arc::new(AtomicU32::new(0));
        let mut retry = RetryScheduler::new(Duration::from_secs(1));
        retry.stop();
        retry.start(counting(&ticks));
        retry.stop();
        retry.stop();
        assert!(!retry.is_running());

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);

        // Restart after stop works.
        assert!(retry.start(counting(&ticks)));
        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_break_stops_timer() {
        let mut retry = RetryScheduler::new(Duration::from_secs(1));
        retry.start(|| std::future::ready(ControlFlow::Break(())));
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        tokio::task::yield_now().await;
        assert!(!retry.is_running());
    }
}
