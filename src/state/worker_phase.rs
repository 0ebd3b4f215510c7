/// Worker phase definitions for the per-category pagination state machine
use std::fmt;

/// Represents the current phase of a category crawl worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerPhase {
    // ===== Active Phases =====
    /// Start of a pass: the category's total product count is not yet known
    Fetching,

    /// Total captured, walking the remaining pages of the pass
    Paginating,

    /// Cursor ran past the total; sleeping before the next pass
    ExhaustedCooldown,

    // ===== Terminal Phase =====
    /// Cancelled from outside; the worker never stops on its own
    Stopped,
}

impl WorkerPhase {
    /// Returns true if no further cycles will run
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Returns true if the next cycle issues a page fetch
    pub fn is_fetching(&self) -> bool {
        matches!(self, Self::Fetching | Self::Paginating)
    }

    /// Checks whether moving from this phase to `to` is a legal transition
    pub fn can_transition_to(&self, to: WorkerPhase) -> bool {
        use WorkerPhase::*;

        match (self, to) {
            (Stopped, _) => false,
            (_, Stopped) => true,
            (Fetching, Paginating) | (Fetching, ExhaustedCooldown) => true,
            (Paginating, Paginating) | (Paginating, ExhaustedCooldown) => true,
            (ExhaustedCooldown, Fetching) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetching => "fetching",
            Self::Paginating => "paginating",
            Self::ExhaustedCooldown => "exhausted_cooldown",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for WorkerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
