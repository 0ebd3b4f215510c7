//! State module for tracking per-category crawl progress
//!
//! # Components
//!
//! - `WorkerPhase`: where a category worker is in its pagination cycle
//! - `CategoryState`: the pagination cursor a single worker owns

mod category_state;
mod worker_phase;

// Re-export main types
pub use category_state::{Advance, CategoryState};
pub use worker_phase::WorkerPhase;
