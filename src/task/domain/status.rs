//! Kanban status column and the legal transition table between columns.

use super::ParseTaskStatusError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kanban column a task currently sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task is captured but not yet scheduled.
    Backlog,
    /// Task is scheduled for upcoming work.
    Todo,
    /// Task is being implemented.
    Developing,
    /// Task is awaiting review.
    Review,
    /// Task has been completed.
    Complete,
}

impl TaskStatus {
    /// Every status in canonical pipeline order.
    pub const ALL: [Self; 5] = [
        Self::Backlog,
        Self::Todo,
        Self::Developing,
        Self::Review,
        Self::Complete,
    ];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Backlog => "backlog",
            Self::Todo => "todo",
            Self::Developing => "developing",
            Self::Review => "review",
            Self::Complete => "complete",
        }
    }

    /// Returns `true` when no transition may leave this status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Returns `true` when moving from `self` to `target` is a legal
    /// transition.
    ///
    /// Same-status requests are not transitions and return `false`; callers
    /// that accept repositioning within a column handle that case before
    /// consulting the table. `Complete` is only reachable from `Review`.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Backlog, Self::Todo)
                | (Self::Todo, Self::Developing)
                | (Self::Developing, Self::Review | Self::Backlog)
                | (Self::Review, Self::Complete)
        )
    }
}

/// Returns `true` when the transition `from -> to` is in the legal table.
#[must_use]
pub const fn is_valid_transition(from: TaskStatus, to: TaskStatus) -> bool {
    from.can_transition_to(to)
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = ParseTaskStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "backlog" => Ok(Self::Backlog),
            "todo" => Ok(Self::Todo),
            "developing" => Ok(Self::Developing),
            "review" => Ok(Self::Review),
            "complete" => Ok(Self::Complete),
            _ => Err(ParseTaskStatusError(value.to_owned())),
        }
    }
}
