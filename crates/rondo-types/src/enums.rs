//! Enumeration types for the round lifecycle.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// One of the two mutually exclusive vote options.
///
/// The winning category is drawn uniformly at random at the end of voting,
/// independent of how the votes split. The tally only determines who is
/// eligible to win, never which category wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum Category {
    /// The red option.
    Red,
    /// The black option.
    Black,
}

impl Category {
    /// Both categories, in declaration order.
    pub const ALL: [Self; 2] = [Self::Red, Self::Black];

    /// Return the opposite category.
    pub const fn other(self) -> Self {
        match self {
            Self::Red => Self::Black,
            Self::Black => Self::Red,
        }
    }
}

impl core::fmt::Display for Category {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Red => write!(f, "red"),
            Self::Black => write!(f, "black"),
        }
    }
}

/// Error produced when a string is not a valid category name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category: {input} (expected \"red\" or \"black\")")]
pub struct CategoryParseError {
    /// The rejected input string.
    pub input: String,
}

impl core::str::FromStr for Category {
    type Err = CategoryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "red" => Ok(Self::Red),
            "black" => Ok(Self::Black),
            other => Err(CategoryParseError {
                input: other.to_owned(),
            }),
        }
    }
}

/// A round's position in its lifecycle.
///
/// Exactly one round is in [`Phase::Voting`] or [`Phase::Revealing`] at any
/// time (the active round); every other round is [`Phase::Completed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum Phase {
    /// Votes are being accepted; the voting window countdown is running.
    Voting,
    /// The category has been chosen and the tally is frozen; the reveal
    /// window countdown is running.
    Revealing,
    /// The winner has been chosen; terminal for this round number.
    Completed,
}

impl Phase {
    /// Whether a round in this phase is the active round.
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Voting | Self::Revealing)
    }
}

impl core::fmt::Display for Phase {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Voting => write!(f, "voting"),
            Self::Revealing => write!(f, "revealing"),
            Self::Completed => write!(f, "completed"),
        }
    }
}
