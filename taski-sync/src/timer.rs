//! Cancellable one-shot and periodic timers on the tokio clock.
//!
//! Both run as spawned tasks, so tests drive them with a paused runtime and
//! `tokio::time::advance`.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Owns a scheduled callback; cancelling or dropping it aborts the task.
#[derive(Debug)]
pub struct TimerHandle {
    task: JoinHandle<()>,
}

impl TimerHandle {
    pub fn cancel(self) {}

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Call `f` once after `delay`.
pub fn schedule_once<F>(delay: Duration, f: F) -> TimerHandle
where
    F: FnOnce() + Send + 'static,
{
    let deadline = Instant::now() + delay;
    let task = tokio::spawn(async move {
        tokio::time::sleep_until(deadline).await;
        f();
    });
    TimerHandle { task }
}

/// Call `f` every `period`, first after one full period. Stops when `f`
/// returns `false`. Missed ticks are skipped, not replayed.
pub fn schedule_every<F>(period: Duration, mut f: F) -> TimerHandle
where
    F: FnMut() -> bool + Send + 'static,
{
    let mut ticks = interval_at(Instant::now() + period, period);
    let task = tokio::spawn(async move {
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticks.tick().await;
            if !f() {
                break;
            }
        }
    });
    TimerHandle { task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::advance;

    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn once_fires_after_delay() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let _timer = schedule_once(Duration::from_secs(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        advance(Duration::from_secs(9)).await;
        settle().await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn cancelled_once_never_fires() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let timer = schedule_once(Duration::from_secs(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        timer.cancel();

        advance(Duration::from_secs(20)).await;
        settle().await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn every_skips_immediate_tick_and_repeats() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let timer = schedule_every(Duration::from_secs(30), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });
        settle().await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        for expected in 1..=3 {
            advance(Duration::from_secs(30)).await;
            settle().await;
            assert_eq!(hits.load(Ordering::SeqCst), expected);
        }

        drop(timer);
        advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn every_stops_when_callback_declines() {
        let timer = schedule_every(Duration::from_secs(1), || false);
        advance(Duration::from_secs(1)).await;
        settle().await;
        assert!(timer.is_finished());
    }
}
