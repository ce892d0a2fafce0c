use std::time::Duration;

use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::debug;

use pagewatch_core_types::NodeId;
use pagewatch_dom::{Document, Selector};

use crate::errors::TimingError;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug)]
pub struct WaitOptions {
    pub poll_interval: Duration,
    /// `None` polls until the predicate succeeds.
    pub timeout: Option<Duration>,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
        }
    }
}

/// Poll `predicate` every 100ms until it yields a value.
pub async fn wait_for<T, F>(predicate: F, timeout: Option<Duration>) -> Result<T, TimingError>
where
    F: FnMut() -> Option<T>,
{
    wait_for_with(
        predicate,
        WaitOptions {
            timeout,
            ..WaitOptions::default()
        },
    )
    .await
}

/// Poll `predicate` on `options.poll_interval`, the first poll one interval
/// after the call. The ticker lives inside the returned future, so settling
/// either way leaves no periodic work behind.
pub async fn wait_for_with<T, F>(mut predicate: F, options: WaitOptions) -> Result<T, TimingError>
where
    F: FnMut() -> Option<T>,
{
    let period = options.poll_interval.max(Duration::from_millis(1));
    let started = Instant::now();
    let poll = async move {
        let mut ticker = interval_at(started + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Some(value) = predicate() {
                return value;
            }
        }
    };

    match options.timeout {
        None => Ok(poll.await),
        Some(limit) => timeout(limit, poll).await.map_err(|_| {
            let waited_ms = started.elapsed().as_millis() as u64;
            debug!(target: "pagewatch.timing", waited_ms, "wait condition timed out");
            TimingError::Timeout { waited_ms }
        }),
    }
}

/// Resolve with the first element in `document` matching `selector`.
pub async fn wait_for_element(
    document: &Document,
    selector: &Selector,
    timeout: Option<Duration>,
) -> Result<NodeId, TimingError> {
    wait_for(|| document.query_first(selector), timeout).await
}
