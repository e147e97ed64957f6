//! Cancellable trailing-edge scheduling.

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Runs at most one piece of work after a quiet period.
///
/// Each [`schedule`](Self::schedule) replaces whatever was pending, so a burst
/// of calls yields one run carrying the last call's work. Once the quiet
/// period is over the work runs on its own task; later schedules cannot
/// abort it.
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Default)]
pub struct Debouncer {
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort the pending timer and start a new one for `work`.
    pub fn schedule<F>(&self, delay: Duration, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(work);
        });

        if let Some(previous) = self.lock().replace(timer) {
            previous.abort();
        }
    }

    /// Abort the pending timer, if any. Work that already fired is unaffected.
    pub fn cancel(&self) -> bool {
        match self.lock().take() {
            Some(handle) => {
                let was_pending = !handle.is_finished();
                handle.abort();
                was_pending
            }
            None => false,
        }
    }

    /// Whether a timer is still counting down.
    pub fn is_pending(&self) -> bool {
        self.lock().as_ref().is_some_and(|h| !h.is_finished())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        if let Some(handle) = self.lock().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const QUIET: Duration = Duration::from_millis(600);

    type Log = Arc<Mutex<Vec<&'static str>>>;

    fn push(log: &Log, label: &'static str) -> impl Future<Output = ()> + Send + 'static {
        let log = log.clone();
        async move { log.lock().unwrap().push(label) }
    }

    #[tokio::test(start_paused = true)]
    async fn burst_runs_only_the_last_work() {
        let debouncer = Debouncer::new();
        let log = Log::default();

        debouncer.schedule(QUIET, push(&log, "a"));
        tokio::time::sleep(Duration::from_millis(200)).await;
        debouncer.schedule(QUIET, push(&log, "ab"));
        tokio::time::sleep(Duration::from_millis(200)).await;
        debouncer.schedule(QUIET, push(&log, "abc"));
        assert!(debouncer.is_pending());

        tokio::time::sleep(Duration::from_millis(700)).await;
        assert_eq!(*log.lock().unwrap(), vec!["abc"]);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_runs_before_the_quiet_period() {
        let debouncer = Debouncer::new();
        let log = Log::default();

        debouncer.schedule(QUIET, push(&log, "x"));
        tokio::time::sleep(Duration::from_millis(599)).await;
        assert!(log.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_pending_work() {
        let debouncer = Debouncer::new();
        let log = Log::default();

        debouncer.schedule(QUIET, push(&log, "x"));
        assert!(debouncer.cancel());
        assert!(!debouncer.cancel());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn fired_work_survives_a_later_schedule() {
        let debouncer = Debouncer::new();
        let finished = Arc::new(AtomicUsize::new(0));

        let done = finished.clone();
        debouncer.schedule(QUIET, async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            done.fetch_add(1, Ordering::SeqCst);
        });

        // the first work is now in flight
        tokio::time::sleep(Duration::from_millis(700)).await;
        debouncer.schedule(QUIET, async {});
        debouncer.cancel();

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }
}
