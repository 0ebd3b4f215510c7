//! Last-emitted timestamps keyed by item identifier

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Process-wide record of when each item was last emitted
///
/// Every operation takes the same lock, so [`DedupCache::try_claim`] is an
/// atomic check-then-mark across workers. Entries older than twice the
/// freshness window can be dropped with [`DedupCache::sweep`]; eligibility
/// does not depend on sweeping.
#[derive(Debug)]
pub struct DedupCache {
    window: Duration,
    last_emitted: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl DedupCache {
    /// Creates an empty cache with the given freshness window
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_emitted: Mutex::new(HashMap::new()),
        }
    }

    /// The minimum age before an item may be emitted again
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Checks whether `item_id` may be emitted at `now`
    ///
    /// True if the item was never recorded, or its last emission is strictly
    /// older than the freshness window.
    pub fn is_eligible_at(&self, item_id: &str, now: DateTime<Utc>) -> bool {
        let entries = self.entries();
        Self::eligible(&entries, item_id, now, self.window)
    }

    pub fn is_eligible(&self, item_id: &str) -> bool {
        self.is_eligible_at(item_id, Utc::now())
    }

    /// Records (or overwrites) the emission time of `item_id`
    pub fn mark_emitted_at(&self, item_id: &str, at: DateTime<Utc>) {
        self.entries().insert(item_id.to_string(), at);
    }

    pub fn mark_emitted(&self, item_id: &str) {
        self.mark_emitted_at(item_id, Utc::now());
    }

    /// Atomically checks eligibility and, if eligible, marks the item emitted
    ///
    /// Returns true when the caller now owns the emission of this item.
    pub fn try_claim_at(&self, item_id: &str, now: DateTime<Utc>) -> bool {
        let mut entries = self.entries();
        if !Self::eligible(&entries, item_id, now, self.window) {
            return false;
        }
        entries.insert(item_id.to_string(), now);
        true
    }

    pub fn try_claim(&self, item_id: &str) -> bool {
        self.try_claim_at(item_id, Utc::now())
    }

    /// Drops entries last emitted more than twice the window before `now`
    ///
    /// Returns the number of entries removed.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let Some(horizon) = self.window.checked_add(&self.window) else {
            return 0;
        };
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, at| now - *at <= horizon);
        before - entries.len()
    }

    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    /// Number of tracked item identifiers
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn eligible(
        entries: &HashMap<String, DateTime<Utc>>,
        item_id: &str,
        now: DateTime<Utc>,
        window: Duration,
    ) -> bool {
        match entries.get(item_id) {
            Some(at) => now - *at > window,
            None => true,
        }
    }

    // A panic in another worker while holding the lock leaves the map intact.
    fn entries(&self) -> MutexGuard<'_, HashMap<String, DateTime<Utc>>> {
        self.last_emitted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new(Duration::hours(24))
    }
}
