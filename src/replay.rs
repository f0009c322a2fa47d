//! Replay detection over recently admitted token ids.
//!
//! One [`ReplayGuard`] is shared by every request a filter instance
//! processes; it is the only shared mutable state in the crate. A single
//! exclusive lock gives the check-and-record operation at-most-one-winner
//! semantics per `jti`: two concurrent requests presenting the same token
//! cannot both be admitted.
//!
//! Memory stays bounded two ways. Entries whose recorded expiry has passed
//! are dropped lazily on every call (no background sweep), and at the
//! configured capacity the earliest-expiring entry is evicted to make room -
//! availability over strict replay-history completeness.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::AuthError;

/// Point-in-time counters for observability and tuning.
#[derive(Debug, Clone, Copy)]
pub struct ReplayStats {
    /// Token ids recorded (first-seen admissions).
    pub recorded: u64,
    /// Attempts rejected as replays.
    pub replays_rejected: u64,
    /// Entries evicted to stay within capacity.
    pub evictions: u64,
    /// Current number of remembered token ids.
    pub size: usize,
    /// Maximum number of remembered token ids.
    pub capacity: usize,
}

/// Bounded cache of recently admitted `jti` values.
pub struct ReplayGuard {
    window: Duration,
    capacity: usize,
    fail_open: bool,
    inner: Mutex<ReplayInner>,
    recorded: AtomicU64,
    replays_rejected: AtomicU64,
    evictions: AtomicU64,
}

#[derive(Default)]
struct ReplayInner {
    // jti -> recorded expiry (epoch seconds)
    by_jti: HashMap<String, i64>,
    // (expiry, jti), kept in step with by_jti; first element expires next
    by_expiry: BTreeSet<(i64, String)>,
}

impl ReplayGuard {
    /// Create a guard remembering at most `capacity` token ids, each for at
    /// most `window` (capped further by the token's own expiry).
    pub fn new(window: Duration, capacity: usize, fail_open: bool) -> Self {
        Self {
            window,
            capacity: capacity.max(1),
            fail_open,
            inner: Mutex::new(ReplayInner::default()),
            recorded: AtomicU64::new(0),
            replays_rejected: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Atomically check a token id and record it if unseen.
    ///
    /// Returns [`AuthError::ReplayDetected`] when `jti` is already recorded
    /// with an unexpired entry. Otherwise the id is recorded with expiry
    /// `min(token_exp, now + window)` and the call succeeds.
    pub fn check_and_record(
        &self,
        jti: &str,
        token_exp: i64,
        now: i64,
    ) -> Result<(), AuthError> {
        let mut inner = match self.inner.lock() {
            Ok(guard) => guard,
            Err(_) if self.fail_open => {
                warn!("replay cache lock poisoned, admitting per fail-open policy");
                return Ok(());
            }
            Err(_) => {
                warn!("replay cache lock poisoned, rejecting per fail-closed policy");
                return Err(AuthError::ReplayDetected);
            }
        };

        // Lazy eviction: anything whose recorded expiry has passed is dead
        // weight and must not count as a replay hit.
        while inner
            .by_expiry
            .first()
            .is_some_and(|(expiry, _)| *expiry <= now)
        {
            if let Some((_, expired_jti)) = inner.by_expiry.pop_first() {
                inner.by_jti.remove(&expired_jti);
            }
        }

        let recorded_expiry = inner.by_jti.get(jti).copied();
        if let Some(recorded_expiry) = recorded_expiry {
            if recorded_expiry > now {
                self.replays_rejected.fetch_add(1, Ordering::Relaxed);
                debug!(jti, "replay detected within validity window");
                return Err(AuthError::ReplayDetected);
            }
            // Stale leftover that the lazy sweep above did not reach (clock
            // went backwards between entries); overwrite below.
            inner.by_expiry.remove(&(recorded_expiry, jti.to_string()));
            inner.by_jti.remove(jti);
        }

        if inner.by_jti.len() >= self.capacity {
            if let Some((_, evicted)) = inner.by_expiry.pop_first() {
                inner.by_jti.remove(&evicted);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(
                    evicted = %evicted,
                    "replay cache at capacity, evicted earliest-expiring entry"
                );
            }
        }

        let expiry = token_exp.min(now + self.window.as_secs() as i64);
        inner.by_jti.insert(jti.to_string(), expiry);
        inner.by_expiry.insert((expiry, jti.to_string()));
        self.recorded.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Counter snapshot.
    pub fn stats(&self) -> ReplayStats {
        let size = self.inner.lock().map(|g| g.by_jti.len()).unwrap_or(0);
        ReplayStats {
            recorded: self.recorded.load(Ordering::Relaxed),
            replays_rejected: self.replays_rejected.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            size,
            capacity: self.capacity,
        }
    }
}
