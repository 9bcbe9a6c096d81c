use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;

/// Stop switch shared by every unit of a run.
///
/// Stopping ends admission of new iterations everywhere and wakes units that are pacing or
/// waiting for a ramp slot. What happens to actions already in flight is decided by the
/// scenario's cancel policy.
#[derive(Debug, Default)]
pub struct RunControl {
    stopping: AtomicBool,
    aborted: AtomicBool,
    notify: Notify,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Operator abort (Ctrl-C). Recorded in the report.
    pub fn abort(&self) {
        if !self.aborted.swap(true, Ordering::AcqRel) {
            tracing::warn!("run aborted by operator");
        }
        self.halt();
    }

    /// Internal stop after a harness defect.
    pub(crate) fn halt(&self) {
        self.stopping.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    /// Resolves once the run has been told to stop.
    pub async fn stopped(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_stopping() {
                return;
            }
            notified.await;
        }
    }

    /// Sleeps for `duration` unless the run stops first. Returns `false` when cut short.
    pub async fn sleep(&self, duration: Duration) -> bool {
        if self.is_stopping() {
            return false;
        }
        tokio::select! {
            () = tokio::time::sleep(duration) => true,
            () = self.stopped() => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    #[tokio::test]
    async fn abort_wakes_sleepers() {
        let control = Arc::new(RunControl::new());
        let sleeper = {
            let control = control.clone();
            tokio::spawn(async move { control.sleep(Duration::from_secs(30)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        let started = Instant::now();
        control.abort();

        let completed = sleeper.await.unwrap_or_else(|e| panic!("{e}"));
        assert!(!completed);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn stopped_resolves_immediately_after_abort() {
        let control = RunControl::new();
        control.abort();
        control.stopped().await;
        assert!(control.is_aborted());
        assert!(!control.sleep(Duration::from_secs(30)).await);
    }

    #[tokio::test]
    async fn halt_stops_without_marking_an_abort() {
        let control = RunControl::new();
        control.halt();
        assert!(control.is_stopping());
        assert!(!control.is_aborted());
    }

    #[tokio::test]
    async fn sleep_completes_without_stop() {
        let control = RunControl::new();
        assert!(control.sleep(Duration::from_millis(5)).await);
    }
}
