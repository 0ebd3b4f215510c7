//! Freshness-windowed deduplication of emitted items
//!
//! A single [`DedupCache`] is shared by every category worker. It remembers
//! when each item identifier was last emitted and only lets an item through
//! again once the freshness window has elapsed.

mod cache;

pub use cache::DedupCache;
