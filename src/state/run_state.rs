//! Run state definitions for batch runners

use std::fmt;

/// Lifecycle states of a batch runner
///
/// A runner moves `Idle -> Running`, may bounce between `Running` and
/// `Paused`, and ends in one of the terminal states before going back to
/// `Idle` for reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RunState {
    // ===== Resting State =====
    /// No batch is active
    #[default]
    Idle,

    // ===== Active States =====
    /// Items are being processed
    Running,

    /// Processing is suspended until resumed or cancelled
    Paused,

    // ===== Terminal States =====
    /// Every submitted item was processed
    Completed,

    /// The run stopped early on request
    Cancelled,

    /// The run was aborted by a non-continuable failure
    Errored,
}

impl RunState {
    /// Returns true while a batch owns the runner
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }

    /// Returns true for the states a run ends in
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Errored)
    }

    /// Checks whether moving to `next` is a legal transition
    pub fn can_transition_to(&self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (*self, next),
            (Idle, Running)
                | (Running, Paused)
                | (Paused, Running)
                | (Running, Completed)
                | (Running, Cancelled)
                | (Paused, Cancelled)
                | (Running, Errored)
                | (Paused, Errored)
                | (Completed, Idle)
                | (Cancelled, Idle)
                | (Errored, Idle)
        )
    }

    /// Converts the run state to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Errored => "errored",
        }
    }

    /// Parses a run state from a database string representation
    ///
    /// Returns None if the string doesn't match any known state.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "running" => Some(Self::Running),
            "paused" => Some(Self::Paused),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            "errored" => Some(Self::Errored),
            _ => None,
        }
    }

    /// Returns all possible run states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Idle,
            Self::Running,
            Self::Paused,
            Self::Completed,
            Self::Cancelled,
            Self::Errored,
        ]
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
