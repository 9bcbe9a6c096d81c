use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Admission gate shared by every unit of a fixed-iterations or constant-concurrency run.
///
/// Admits until the iteration budget is spent or the deadline passes, whichever comes
/// first. Without a budget only the deadline applies.
#[derive(Debug)]
pub struct IterationGate {
    claimed: AtomicU64,
    iterations: Option<u64>,
    duration: Option<Duration>,
    deadline: OnceLock<Instant>,
}

impl IterationGate {
    pub fn new(iterations: Option<u64>, duration: Option<Duration>) -> Self {
        Self {
            claimed: AtomicU64::new(0),
            iterations,
            duration,
            deadline: OnceLock::new(),
        }
    }

    pub fn start_at(&self, started: Instant) {
        if self.deadline.get().is_some() {
            return;
        }

        if let Some(duration) = self.duration {
            let _ = self.deadline.set(started + duration);
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline.get().copied()
    }

    /// Claims one iteration. Returns `false` once the run must stop admitting work.
    pub fn next(&self) -> bool {
        if self.duration.is_some() {
            let now = Instant::now();
            if self.deadline.get().is_none() {
                self.start_at(now);
            }

            if let Some(deadline) = self.deadline.get()
                && now >= *deadline
            {
                return false;
            }
        }

        match self.iterations {
            Some(total) => {
                // fetch_update keeps the counter at `total` instead of overshooting it, so
                // `claimed()` is exact after the run.
                self.claimed
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                        (n < total).then_some(n + 1)
                    })
                    .is_ok()
            }
            None => {
                self.claimed.fetch_add(1, Ordering::Relaxed);
                true
            }
        }
    }

    pub fn claimed(&self) -> u64 {
        self.claimed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn budget_is_never_exceeded_under_contention() {
        let gate = Arc::new(IterationGate::new(Some(500), None));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let gate = gate.clone();
                std::thread::spawn(move || {
                    let mut mine = 0u64;
                    while gate.next() {
                        mine += 1;
                    }
                    mine
                })
            })
            .collect();

        let total: u64 = threads
            .into_iter()
            .map(|t| t.join().unwrap_or_else(|_| panic!("gate thread panicked")))
            .sum();
        assert_eq!(total, 500);
        assert_eq!(gate.claimed(), 500);
    }

    #[test]
    fn deadline_closes_the_gate() {
        let gate = IterationGate::new(None, Some(Duration::from_millis(10)));
        gate.start_at(Instant::now() - Duration::from_millis(20));
        assert!(!gate.next());
    }

    #[test]
    fn deadline_is_set_once() {
        let gate = IterationGate::new(Some(3), Some(Duration::from_secs(60)));
        let t0 = Instant::now();
        gate.start_at(t0);
        gate.start_at(t0 + Duration::from_secs(30));
        assert_eq!(gate.deadline(), Some(t0 + Duration::from_secs(60)));
        assert!(gate.next());
        assert!(gate.next());
        assert!(gate.next());
        assert!(!gate.next());
    }
}
