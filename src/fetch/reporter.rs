//! Periodic throughput logging for a fetch run.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

/// Shared tallies, bumped by workers and read by the reporter.
#[derive(Debug, Default)]
pub struct FetchCounters {
    pub fetched: AtomicUsize,
    pub failed: AtomicUsize,
    /// Items another run already finished.
    pub skipped: AtomicUsize,
    pub events: AtomicUsize,
}

impl FetchCounters {
    pub fn done(&self) -> usize {
        self.fetched.load(Ordering::Relaxed)
            + self.failed.load(Ordering::Relaxed)
            + self.skipped.load(Ordering::Relaxed)
    }
}

/// Time left at the current average pace, once there is a pace to go by.
pub fn eta(done: usize, total: usize, elapsed: Duration) -> Option<Duration> {
    if done == 0 || done >= total {
        return None;
    }
    let per_item = elapsed.as_secs_f64() / done as f64;
    Some(Duration::from_secs_f64(per_item * (total - done) as f64))
}

fn format_eta(eta: Option<Duration>) -> String {
    match eta {
        Some(d) => {
            let secs = d.as_secs();
            format!("{}h{:02}m{:02}s", secs / 3600, (secs % 3600) / 60, secs % 60)
        }
        None => "-".to_string(),
    }
}

pub struct ProgressReporter {
    counters: Arc<FetchCounters>,
    total: usize,
    interval: Duration,
    started: Instant,
}

impl ProgressReporter {
    pub fn new(counters: Arc<FetchCounters>, total: usize, interval: Duration) -> Self {
        Self {
            counters,
            total,
            interval,
            started: Instant::now(),
        }
    }

    pub fn line(&self) -> String {
        let done = self.counters.done();
        let elapsed = self.started.elapsed();
        let rate = if elapsed.as_secs_f64() > 0.0 {
            done as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };
        format!(
            "{}/{} done ({:.2}/s), {} errors, {} events, ETA {}",
            done,
            self.total,
            rate,
            self.counters.failed.load(Ordering::Relaxed),
            self.counters.events.load(Ordering::Relaxed),
            format_eta(eta(done, self.total, elapsed)),
        )
    }

    /// Log a progress line every interval until `stop` flips.
    pub fn spawn(self, mut stop: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval.max(Duration::from_millis(10)));
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => info!("{}", self.line()),
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("{}", self.line());
        })
    }
}
