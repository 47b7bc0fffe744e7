use serde::{Deserialize, Serialize};

/// Interview session phase.
///
/// Transitions are one-directional:
/// `ThemeSelection → Warmup → Main → Analyzing → {Completed |
/// SplitDecision} → {Splitting → Completed}`, with `Cancelled`
/// reachable from any non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    ThemeSelection,
    Warmup,
    Main,
    Analyzing,
    SplitDecision,
    Splitting,
    Completed,
    Cancelled,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Cancelled)
    }

    /// True while the session clock should be advancing.
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// Whether a forward transition to `next` is legal. Cancellation
    /// is handled separately (legal from any non-terminal phase).
    pub fn can_advance_to(self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (ThemeSelection, Warmup)
                | (Warmup, Main)
                | (Main, Analyzing)
                | (Analyzing, Completed)
                | (Analyzing, SplitDecision)
                | (SplitDecision, Completed)
                | (SplitDecision, Splitting)
                | (Splitting, Completed)
        )
    }
}
