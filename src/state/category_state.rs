use crate::state::WorkerPhase;
use crate::CrawlerError;

/// Outcome of moving the cursor after a successfully fetched page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// More pages remain; the cursor now points at `next_index`
    NextPage { next_index: u64 },

    /// The cursor ran past the known total and was reset for the next pass
    Exhausted,
}

/// Pagination cursor for a single category
///
/// Owned exclusively by the category's worker. `total_products` is captured
/// from the first successful page of a pass and is not refreshed until the
/// pass ends, even if later pages report a different count.
#[derive(Debug, Clone)]
pub struct CategoryState {
    /// Category identifier, fixed for the worker's lifetime
    pub category_id: String,

    /// Offset of the next page to fetch
    pub start_index: u64,

    /// Result-set size captured for this pass (0 = unknown)
    pub total_products: u64,

    initial_offset: u64,
    page_size: u64,
    phase: WorkerPhase,
}

impl CategoryState {
    /// Creates the cursor for a fresh worker
    pub fn new(category_id: impl Into<String>, initial_offset: u64, page_size: u64) -> Self {
        Self {
            category_id: category_id.into(),
            start_index: initial_offset,
            total_products: 0,
            initial_offset,
            page_size,
            phase: WorkerPhase::Fetching,
        }
    }

    pub fn phase(&self) -> WorkerPhase {
        self.phase
    }

    /// Captures the category total if it is not yet known for this pass
    ///
    /// Returns true when the value was captured.
    pub fn record_total(&mut self, reported: u64) -> bool {
        if self.total_products != 0 {
            return false;
        }
        self.total_products = reported;
        true
    }

    /// Moves the cursor past the page that was just fetched
    ///
    /// The cursor is advanced by one page and then compared against the
    /// captured total. Once it reaches or passes the total the pass is over:
    /// the cursor returns to the initial offset, the total is forgotten and
    /// the state enters `ExhaustedCooldown`. A cursor that cannot move
    /// another page without overflowing is also exhausted.
    pub fn advance(&mut self) -> Result<Advance, CrawlerError> {
        match self.start_index.checked_add(self.page_size) {
            Some(next_index) if next_index < self.total_products => {
                self.transition(WorkerPhase::Paginating)?;
                self.start_index = next_index;
                Ok(Advance::NextPage { next_index })
            }
            _ => {
                self.transition(WorkerPhase::ExhaustedCooldown)?;
                self.start_index = self.initial_offset;
                self.total_products = 0;
                Ok(Advance::Exhausted)
            }
        }
    }

    /// Leaves the cooldown and begins a new pass
    pub fn begin_pass(&mut self) -> Result<(), CrawlerError> {
        self.transition(WorkerPhase::Fetching)
    }

    /// Marks the worker as cancelled
    pub fn stop(&mut self) {
        self.phase = WorkerPhase::Stopped;
    }

    fn transition(&mut self, to: WorkerPhase) -> Result<(), CrawlerError> {
        if !self.phase.can_transition_to(to) {
            return Err(CrawlerError::InvalidTransition {
                from: self.phase,
                to,
            });
        }
        self.phase = to;
        Ok(())
    }
}
