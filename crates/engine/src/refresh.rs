//! Periodic re-fetching owned by whoever schedules it.

use std::{future::Future, time::Duration};

use tokio::{
    sync::oneshot,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tracing::debug;

/// Period of the dashboard auto-refresh.
pub const AUTO_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Keeps a scheduled job alive. Dropping it aborts the job's task.
#[derive(Debug)]
pub struct RefreshHandle {
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl RefreshHandle {
    /// Stops the schedule and waits for the task to finish. A run already in
    /// progress completes first.
    pub async fn cancel(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Runs `job` every `every` on a tokio task, first after one full period.
/// Ticks missed while a run is slow are delayed, not bunched up.
///
/// Must be called from within a tokio runtime.
pub fn schedule_refresh<F, Fut>(every: Duration, mut job: F) -> RefreshHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let every = every.max(MIN_PERIOD);
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = &mut stop_rx => break,
                _ = ticker.tick() => job().await,
            }
        }
        debug!("refresh schedule stopped");
    });

    RefreshHandle {
        stop: Some(stop_tx),
        task: Some(task),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use tokio::time::sleep;

    use super::*;

    fn counting(every: Duration) -> (Arc<AtomicUsize>, RefreshHandle) {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let handle = schedule_refresh(every, move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        (runs, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn first_run_waits_one_period() {
        let (runs, _handle) = counting(AUTO_REFRESH_INTERVAL);
        sleep(Duration::from_secs(29)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        sleep(Duration::from_secs(66)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_the_schedule() {
        let (runs, handle) = counting(Duration::from_secs(10));
        sleep(Duration::from_secs(15)).await;
        handle.cancel().await;
        let seen = runs.load(Ordering::SeqCst);
        assert_eq!(seen, 1);
        sleep(Duration::from_secs(100)).await;
        assert_eq!(runs.load(Ordering::SeqCst), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_aborts() {
        let (runs, handle) = counting(Duration::from_secs(10));
        drop(handle);
        sleep(Duration::from_secs(100)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
