//! Event sources and the polling follower.
//!
//! There is no push path: the follower fetches everything past its cursor,
//! applies it, sleeps, and fetches again. Stopping is observed between polls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use shade_state::{EventLog, SequencedEvent};

use crate::error::MirrorError;
use crate::mirror::Mirror;

/// Default number of events fetched per poll.
pub const DEFAULT_BATCH: usize = 512;

/// Anything that can serve the ledger's log from a cursor.
pub trait EventSource {
    /// Up to `limit` events with `seq >= since`, in order.
    fn fetch_since(&self, since: u64, limit: usize) -> Result<Vec<SequencedEvent>, MirrorError>;
}

impl EventSource for EventLog {
    fn fetch_since(&self, since: u64, limit: usize) -> Result<Vec<SequencedEvent>, MirrorError> {
        Ok(self.since(since, limit).to_vec())
    }
}

impl<S: EventSource + ?Sized> EventSource for Arc<S> {
    fn fetch_since(&self, since: u64, limit: usize) -> Result<Vec<SequencedEvent>, MirrorError> {
        (**self).fetch_since(since, limit)
    }
}

/// Fetch and apply one batch; returns how many events were applied.
pub fn poll_once<S: EventSource + ?Sized>(
    mirror: &RwLock<Mirror>,
    source: &S,
    batch: usize,
) -> Result<usize, MirrorError> {
    let cursor = read(mirror)?.cursor();
    let events = source.fetch_since(cursor, batch)?;
    if events.is_empty() {
        return Ok(0);
    }
    let mut guard = mirror
        .write()
        .map_err(|_| MirrorError::Unavailable("mirror lock poisoned".into()))?;
    guard.apply_all(&events)
}

/// Poll until the source has nothing past the cursor.
pub fn catch_up<S: EventSource + ?Sized>(
    mirror: &RwLock<Mirror>,
    source: &S,
    batch: usize,
) -> Result<u64, MirrorError> {
    let mut total = 0u64;
    loop {
        let n = poll_once(mirror, source, batch)?;
        if n == 0 {
            return Ok(total);
        }
        total += n as u64;
    }
}

/// Block until the mirror's cursor reaches `target` or `timeout` elapses.
pub fn wait_for_cursor(mirror: &RwLock<Mirror>, target: u64, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if read(mirror).map(|m| m.cursor() >= target).unwrap_or(false) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
}

fn read(mirror: &RwLock<Mirror>) -> Result<std::sync::RwLockReadGuard<'_, Mirror>, MirrorError> {
    mirror
        .read()
        .map_err(|_| MirrorError::Unavailable("mirror lock poisoned".into()))
}

/// Follower settings.
#[derive(Clone, Copy, Debug)]
pub struct FollowerConfig {
    /// Sleep between polls that found nothing (or failed).
    pub interval: Duration,
    /// Events per fetch.
    pub batch: usize,
}

impl Default for FollowerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            batch: DEFAULT_BATCH,
        }
    }
}

/// Background thread keeping a mirror in step with a source.
pub struct Follower {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Follower {
    /// Start following `source` into `mirror`.
    pub fn spawn<S>(mirror: Arc<RwLock<Mirror>>, source: S, cfg: FollowerConfig) -> Self
    where
        S: EventSource + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::spawn(move || {
            info!(interval_ms = cfg.interval.as_millis() as u64, "mirror follower started");
            while !flag.load(Ordering::Relaxed) {
                match poll_once(&mirror, &source, cfg.batch) {
                    Ok(0) => thread::sleep(cfg.interval),
                    Ok(n) => debug!(applied = n, "mirror advanced"),
                    Err(e) if e.is_retryable() => {
                        warn!(error = %e, "event source unavailable, retrying");
                        thread::sleep(cfg.interval);
                    }
                    Err(e) => {
                        warn!(error = %e, "mirror follower stopped");
                        break;
                    }
                }
            }
            info!("mirror follower exited");
        });
        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Flag that stops the loop at its next polling boundary.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Stop and wait for the thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

impl Drop for Follower {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shade_core::Hash32;
    use shade_state::LedgerEvent;
    use std::sync::atomic::AtomicUsize;

    struct Flaky {
        log: EventLog,
        failures: AtomicUsize,
    }

    impl EventSource for Flaky {
        fn fetch_since(
            &self,
            since: u64,
            limit: usize,
        ) -> Result<Vec<SequencedEvent>, MirrorError> {
            if self.failures.load(Ordering::Relaxed) > 0 {
                self.failures.fetch_sub(1, Ordering::Relaxed);
                return Err(MirrorError::Unavailable("down".into()));
            }
            self.log.fetch_since(since, limit)
        }
    }

    fn log_with_utxos(n: u64) -> EventLog {
        let mut log = EventLog::new();
        for i in 0..n {
            log.append(vec![
                LedgerEvent::PrivateLeaf(Hash32([i as u8 + 1; 32])),
                LedgerEvent::PrivateLeafIndex(i),
            ]);
        }
        log
    }

    #[test]
    fn catch_up_in_small_batches() {
        let log = log_with_utxos(5);
        let mirror = RwLock::new(Mirror::new(8));
        assert_eq!(catch_up(&mirror, &log, 3).unwrap(), 10);
        assert_eq!(mirror.read().unwrap().next_utxo_index(), 5);
        assert_eq!(catch_up(&mirror, &log, 3).unwrap(), 0);
    }

    #[test]
    fn follower_retries_unavailable_source() {
        let source = Flaky {
            log: log_with_utxos(3),
            failures: AtomicUsize::new(2),
        };
        let mirror = Arc::new(RwLock::new(Mirror::new(8)));
        let follower = Follower::spawn(
            Arc::clone(&mirror),
            source,
            FollowerConfig {
                interval: Duration::from_millis(5),
                batch: 4,
            },
        );
        assert!(wait_for_cursor(&mirror, 6, Duration::from_secs(5)));
        follower.stop();
        assert_eq!(mirror.read().unwrap().next_utxo_index(), 3);
    }

    #[test]
    fn stop_flag_ends_loop() {
        let mirror = Arc::new(RwLock::new(Mirror::new(8)));
        let follower = Follower::spawn(
            Arc::clone(&mirror),
            EventLog::new(),
            FollowerConfig {
                interval: Duration::from_millis(5),
                batch: 4,
            },
        );
        follower.stop_flag().store(true, Ordering::Relaxed);
        follower.stop();
        assert_eq!(mirror.read().unwrap().cursor(), 0);
    }
}
