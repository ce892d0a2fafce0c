//! Debounce policies.
//!
//! Both wrappers own their timer state; two wrappers built from the same
//! callback never interfere with each other. Clones of one wrapper share
//! state, the same way clones of a JS closure would.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::trace;

type Callback<A> = Arc<dyn Fn(A) + Send + Sync>;

/// Runs the callback once `wait` has passed without another call, with the
/// arguments of the last call. Must be called from inside a tokio runtime.
pub struct TrailingDebouncer<A> {
    callback: Callback<A>,
    wait: Duration,
    pending: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl<A> Clone for TrailingDebouncer<A> {
    fn clone(&self) -> Self {
        Self {
            callback: Arc::clone(&self.callback),
            wait: self.wait,
            pending: Arc::clone(&self.pending),
        }
    }
}

impl<A> TrailingDebouncer<A>
where
    A: Send + 'static,
{
    pub fn new<F>(wait: Duration, callback: F) -> Self
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
            wait,
            pending: Arc::new(Mutex::new(None)),
        }
    }

    pub fn call(&self, args: A) {
        let callback = Arc::clone(&self.callback);
        // Anchor the deadline to the call, not to when the task first runs.
        let deadline = Instant::now() + self.wait;
        let mut pending = self.pending.lock();
        if let Some(previous) = pending.take() {
            previous.abort();
            trace!(target: "pagewatch.timing", "trailing debounce rescheduled");
        }
        *pending = Some(tokio::spawn(async move {
            sleep_until(deadline).await;
            callback(args);
        }));
    }

    /// Drop the scheduled run, if any. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        match self.pending.lock().take() {
            Some(handle) => {
                let was_pending = !handle.is_finished();
                handle.abort();
                was_pending
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

/// Runs the callback immediately on the first call of an idle period and
/// drops every call that arrives less than `cooldown` after the previous one.
/// Dropped calls push the quiet window out.
pub struct LeadingDebouncer<A> {
    callback: Callback<A>,
    cooldown: Duration,
    quiet_after: Arc<Mutex<Option<Instant>>>,
}

impl<A> Clone for LeadingDebouncer<A> {
    fn clone(&self) -> Self {
        Self {
            callback: Arc::clone(&self.callback),
            cooldown: self.cooldown,
            quiet_after: Arc::clone(&self.quiet_after),
        }
    }
}

impl<A> LeadingDebouncer<A> {
    pub fn new<F>(cooldown: Duration, callback: F) -> Self
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
            cooldown,
            quiet_after: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns whether this call ran the callback.
    pub fn call(&self, args: A) -> bool {
        let now = Instant::now();
        let leading = {
            let mut quiet_after = self.quiet_after.lock();
            let leading = quiet_after.map_or(true, |deadline| now >= deadline);
            *quiet_after = Some(now + self.cooldown);
            leading
        };
        if leading {
            (self.callback)(args);
        } else {
            trace!(target: "pagewatch.timing", "leading debounce suppressed call");
        }
        leading
    }

    /// Forget the cooldown so the next call is leading again.
    pub fn cancel(&self) {
        self.quiet_after.lock().take();
    }

    pub fn is_cooling_down(&self) -> bool {
        self.quiet_after
            .lock()
            .is_some_and(|deadline| Instant::now() < deadline)
    }
}

/// Trailing debounce as a plain callable.
pub fn debounce<A, F>(callback: F, wait: Duration) -> impl Fn(A) + Clone + Send + Sync
where
    A: Send + 'static,
    F: Fn(A) + Send + Sync + 'static,
{
    let debouncer = TrailingDebouncer::new(wait, callback);
    move |args| debouncer.call(args)
}

/// Leading-with-cooldown debounce as a plain callable.
pub fn debounce_leading<A, F>(callback: F, cooldown: Duration) -> impl Fn(A) + Clone + Send + Sync
where
    A: 'static,
    F: Fn(A) + Send + Sync + 'static,
{
    let debouncer = LeadingDebouncer::new(cooldown, callback);
    move |args| {
        debouncer.call(args);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    fn recorder<T: Send + 'static>() -> (Arc<Mutex<Vec<T>>>, impl Fn(T) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |value| sink.lock().push(value))
    }

    async fn settle() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn trailing_delivers_last_arguments_once() {
        let (seen, sink) = recorder::<u32>();
        let debouncer = TrailingDebouncer::new(Duration::from_millis(100), sink);

        for value in 1..=5 {
            debouncer.call(value);
            advance(Duration::from_millis(40)).await;
        }
        assert!(seen.lock().is_empty());
        assert!(debouncer.is_pending());

        // 100ms after the last call.
        advance(Duration::from_millis(59)).await;
        settle().await;
        assert!(seen.lock().is_empty());
        advance(Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(*seen.lock(), vec![5]);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn trailing_cancel_drops_pending_run() {
        let (seen, sink) = recorder::<&'static str>();
        let debouncer = TrailingDebouncer::new(Duration::from_millis(50), sink);
        debouncer.call("dropped");
        assert!(debouncer.cancel());
        advance(Duration::from_millis(200)).await;
        settle().await;
        assert!(seen.lock().is_empty());
        assert!(!debouncer.cancel());
    }

    #[tokio::test(start_paused = true)]
    async fn trailing_instances_do_not_share_timers() {
        let (seen, sink) = recorder::<u32>();
        let sink = Arc::new(sink);
        let a = {
            let sink = Arc::clone(&sink);
            TrailingDebouncer::new(Duration::from_millis(100), move |v| (*sink)(v))
        };
        let b = {
            let sink = Arc::clone(&sink);
            TrailingDebouncer::new(Duration::from_millis(100), move |v| (*sink)(v))
        };
        a.call(1);
        b.call(2);
        advance(Duration::from_millis(100)).await;
        settle().await;
        let mut values = seen.lock().clone();
        values.sort_unstable();
        assert_eq!(values, vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn leading_runs_first_call_and_suppresses_burst() {
        let (seen, sink) = recorder::<u32>();
        let debouncer = LeadingDebouncer::new(Duration::from_millis(100), sink);

        assert!(debouncer.call(1));
        assert_eq!(*seen.lock(), vec![1]);

        for value in 2..=4 {
            advance(Duration::from_millis(50)).await;
            assert!(!debouncer.call(value));
        }
        assert_eq!(*seen.lock(), vec![1]);
        assert!(debouncer.is_cooling_down());

        advance(Duration::from_millis(100)).await;
        assert!(debouncer.call(5));
        assert_eq!(*seen.lock(), vec![1, 5]);
    }

    #[tokio::test(start_paused = true)]
    async fn leading_cancel_rearms_immediately() {
        let (seen, sink) = recorder::<u32>();
        let debouncer = LeadingDebouncer::new(Duration::from_secs(1), sink);
        assert!(debouncer.call(1));
        debouncer.cancel();
        assert!(debouncer.call(2));
        assert_eq!(*seen.lock(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn closure_wrappers_keep_signature() {
        let (seen, sink) = recorder::<u32>();
        let leading = debounce_leading(sink, Duration::from_millis(100));
        leading(7);
        leading(8);
        assert_eq!(*seen.lock(), vec![7]);

        let (trailing_seen, trailing_sink) = recorder::<u32>();
        let trailing = debounce(trailing_sink, Duration::from_millis(100));
        trailing(1);
        trailing(2);
        advance(Duration::from_millis(100)).await;
        settle().await;
        assert_eq!(*trailing_seen.lock(), vec![2]);
    }
}
