//! Coalescer - collapse bursts of change events into one deferred call
//!
//! `schedule()` (re)arms a single timer; only the last payload of a burst
//! reaches the action, `delay` after the burst went quiet. At most one timer
//! is outstanding at any time.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

type Action<T> = Arc<dyn Fn(T) + Send + Sync>;

pub struct Coalescer<T> {
    delay: Duration,
    action: Action<T>,
    /// Bumped by every schedule/cancel; a timer only fires if it still
    /// holds the latest generation.
    generation: Arc<AtomicU64>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + 'static> Coalescer<T> {
    pub fn new<F>(delay: Duration, action: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self {
            delay,
            action: Arc::new(action),
            generation: Arc::new(AtomicU64::new(0)),
            timer: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Record `payload` and restart the timer. Never runs the action inline.
    ///
    /// Must be called within a tokio runtime.
    pub fn schedule(&self, payload: T) {
        let mut timer = self.timer.lock();
        if let Some(previous) = timer.take() {
            previous.abort();
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let delay = self.delay;
        let action = Arc::clone(&self.action);
        let current = Arc::clone(&self.generation);
        *timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if current.load(Ordering::SeqCst) == generation {
                action(payload);
            }
        }));
    }

    /// Disarm the pending timer, if any, without running the action.
    pub fn cancel(&self) {
        let mut timer = self.timer.lock();
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(previous) = timer.take() {
            previous.abort();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.timer
            .lock()
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }
}

impl<T> Drop for Coalescer<T> {
    fn drop(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(timer) = self.timer.get_mut().take() {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording(delay_ms: u64) -> (Coalescer<u32>, Arc<Mutex<Vec<u32>>>) {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&fired);
        let coalescer = Coalescer::new(Duration::from_millis(delay_ms), move |n| {
            sink.lock().push(n);
        });
        (coalescer, fired)
    }

    async fn wait(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_fires_once_with_last_payload() {
        let (coalescer, fired) = recording(300);

        for n in 1..=5 {
            coalescer.schedule(n);
            wait(100).await;
        }
        assert!(fired.lock().is_empty());

        wait(300).await;
        assert_eq!(*fired.lock(), vec![5]);
        assert!(!coalescer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_is_deferred() {
        let (coalescer, fired) = recording(300);

        coalescer.schedule(1);
        assert!(coalescer.is_armed());
        assert!(fired.lock().is_empty());

        wait(299).await;
        assert!(fired.lock().is_empty());
        wait(2).await;
        assert_eq!(*fired.lock(), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spaced_calls_fire_separately() {
        let (coalescer, fired) = recording(300);

        coalescer.schedule(1);
        wait(400).await;
        coalescer.schedule(2);
        wait(400).await;

        assert_eq!(*fired.lock(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_disarms() {
        let (coalescer, fired) = recording(300);

        coalescer.schedule(1);
        wait(100).await;
        coalescer.cancel();
        assert!(!coalescer.is_armed());

        wait(1000).await;
        assert!(fired.lock().is_empty());

        // Cancel with nothing armed is a no-op.
        coalescer.cancel();
        coalescer.schedule(2);
        wait(400).await;
        assert_eq!(*fired.lock(), vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let (coalescer, fired) = recording(300);

        coalescer.schedule(1);
        drop(coalescer);
        wait(1000).await;
        assert!(fired.lock().is_empty());
    }
}
