//! One-shot search deadline.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A cancelable one-shot timer. The task runs on a dedicated thread after
/// `delay` unless the timer is canceled first; it never runs twice.
pub struct SearchTimer {
    canceled: Arc<(Mutex<bool>, Condvar)>,
    thread: Option<JoinHandle<()>>,
}

impl SearchTimer {
    /// Schedule `task` to run once after `delay`.
    pub fn schedule<F>(delay: Duration, task: F) -> SearchTimer
    where
        F: FnOnce() + Send + 'static,
    {
        let canceled = Arc::new((Mutex::new(false), Condvar::new()));
        let flag = Arc::clone(&canceled);
        let thread = thread::Builder::new()
            .name("search-timer".into())
            .spawn(move || {
                let (lock, signal) = &*flag;
                let guard = lock.lock().expect("timer mutex poisoned");
                let (guard, result) = signal
                    .wait_timeout_while(guard, delay, |canceled| !*canceled)
                    .expect("timer mutex poisoned");
                let fire = result.timed_out() && !*guard;
                drop(guard);
                if fire {
                    task();
                }
            })
            .expect("failed to spawn timer thread");
        SearchTimer {
            canceled,
            thread: Some(thread),
        }
    }

    fn signal_cancel(&self) {
        let (lock, signal) = &*self.canceled;
        *lock.lock().expect("timer mutex poisoned") = true;
        signal.notify_all();
    }

    /// Cancel the deadline and wait for the timer thread to exit. Calling
    /// this after the deadline fired is harmless.
    pub fn cancel(mut self) {
        self.signal_cancel();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for SearchTimer {
    fn drop(&mut self) {
        // Wake the thread so it exits promptly; no join, dropping must
        // not block.
        self.signal_cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::SearchTimer;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn fires_once_after_the_delay() {
        let fired = Arc::new(AtomicU32::new(0));
        let fired_by_task = Arc::clone(&fired);
        let _timer = SearchTimer::schedule(Duration::from_millis(20), move || {
            fired_by_task.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        thread::sleep(Duration::from_millis(150));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancel_prevents_the_task() {
        let fired = Arc::new(AtomicU32::new(0));
        let fired_by_task = Arc::clone(&fired);
        let timer = SearchTimer::schedule(Duration::from_millis(100), move || {
            fired_by_task.fetch_add(1, Ordering::SeqCst);
        });
        timer.cancel();
        thread::sleep(Duration::from_millis(200));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancel_after_firing_is_harmless() {
        let fired = Arc::new(AtomicU32::new(0));
        let fired_by_task = Arc::clone(&fired);
        let timer = SearchTimer::schedule(Duration::from_millis(10), move || {
            fired_by_task.fetch_add(1, Ordering::SeqCst);
        });
        thread::sleep(Duration::from_millis(100));
        timer.cancel();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
