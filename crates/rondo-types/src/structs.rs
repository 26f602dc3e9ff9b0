//! Core entity structs for rounds, votes, and game aggregates.
//!
//! These types cross every boundary in the workspace: the engine mutates
//! them, the repository persists them, and the snapshot projections flow to
//! TypeScript clients via `ts-rs`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{Category, Phase};
use crate::ids::{VoteId, VoterId};

/// Per-category count of accepted votes in a round.
///
/// Counts never decrease, and are frozen once the round leaves
/// [`Phase::Voting`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS,
)]
#[ts(export, export_to = "bindings/")]
pub struct Tally {
    /// Accepted votes for [`Category::Red`].
    pub red: u32,
    /// Accepted votes for [`Category::Black`].
    pub black: u32,
}

impl Tally {
    /// Create an empty tally.
    pub const fn new() -> Self {
        Self { red: 0, black: 0 }
    }

    /// Return the count for one category.
    pub const fn count(self, category: Category) -> u32 {
        match category {
            Category::Red => self.red,
            Category::Black => self.black,
        }
    }

    /// Return the total number of accepted votes.
    pub const fn total(self) -> u32 {
        self.red.saturating_add(self.black)
    }

    /// Increment the count for one category.
    ///
    /// Returns `None` if the counter would overflow `u32::MAX` (which would
    /// take four billion voters in a single round).
    pub fn record(&mut self, category: Category) -> Option<u32> {
        let slot = match category {
            Category::Red => &mut self.red,
            Category::Black => &mut self.black,
        };
        *slot = slot.checked_add(1)?;
        Some(*slot)
    }
}

/// One complete cycle of voting, category reveal, and winner selection.
///
/// Rounds are identified by a strictly increasing, contiguous `number`
/// starting at 1. A round is mutated only while it is the active round;
/// completed rounds persist unchanged as history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Round {
    /// Round number (1-based, unique, strictly increasing).
    pub number: u64,
    /// Current lifecycle phase.
    pub phase: Phase,
    /// Per-category vote counts. Always equals the category split of
    /// `voters`.
    pub tally: Tally,
    /// Every voter who has cast a vote this round, with their choice.
    /// Doubles as the dedup set and the prior-choice lookup for duplicate
    /// rejections.
    pub voters: BTreeMap<VoterId, Category>,
    /// The winning category. Set once at the Voting -> Revealing transition;
    /// immutable thereafter; `None` while voting is open.
    pub chosen_category: Option<Category>,
    /// The winning voter. Set once at the Revealing -> Completed transition;
    /// `None` on a completed round means nobody voted the chosen category.
    pub winner: Option<VoterId>,
    /// Prize for this round. Assigned by the admin collaborator; opaque to
    /// the lifecycle algorithm.
    #[ts(as = "String")]
    pub prize_amount: Decimal,
    /// Whether the prize has been marked as paid out.
    pub prize_paid: bool,
    /// When this round entered its voting phase.
    pub started_at: DateTime<Utc>,
    /// When the current phase began. Used on restart to reconcile the
    /// persisted phase against wall-clock elapsed time.
    pub phase_started_at: DateTime<Utc>,
    /// When this round completed, if it has.
    pub ended_at: Option<DateTime<Utc>>,
}

impl Round {
    /// Create a fresh round in [`Phase::Voting`] with an empty tally.
    pub const fn open(number: u64, prize_amount: Decimal, started_at: DateTime<Utc>) -> Self {
        Self {
            number,
            phase: Phase::Voting,
            tally: Tally::new(),
            voters: BTreeMap::new(),
            chosen_category: None,
            winner: None,
            prize_amount,
            prize_paid: false,
            started_at,
            phase_started_at: started_at,
            ended_at: None,
        }
    }

    /// Whether this round is the active round (voting or revealing).
    pub const fn is_active(&self) -> bool {
        self.phase.is_active()
    }

    /// Number of distinct voters this round (equals the tally total).
    pub fn voter_count(&self) -> u32 {
        u32::try_from(self.voters.len()).unwrap_or(u32::MAX)
    }
}

/// A single recorded vote.
///
/// Unique on `(voter_id, round_number)`; immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Vote {
    /// Unique identifier for this vote record.
    pub id: VoteId,
    /// Who cast the vote.
    pub voter_id: VoterId,
    /// The round the vote belongs to.
    pub round_number: u64,
    /// The category voted for.
    pub category: Category,
    /// When the vote was accepted.
    pub cast_at: DateTime<Utc>,
}

/// Process-wide game aggregate.
///
/// Updated only by the phase controller at round completion; read by the
/// broadcast synchronizer for every snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct GameState {
    /// Number of the round currently in play.
    pub current_round_number: u64,
    /// How many rounds have reached [`Phase::Completed`].
    pub total_rounds_completed: u64,
    /// Sum of prize amounts awarded to winners across all rounds.
    #[ts(as = "String")]
    pub total_prizes_given: Decimal,
    /// Winner of the most recently completed round, if any.
    pub last_winner: Option<VoterId>,
    /// Prize amount of the most recently completed round.
    #[ts(as = "String")]
    pub last_prize_amount: Decimal,
}

impl GameState {
    /// Create the aggregate for a fresh game starting at round 1.
    pub const fn new() -> Self {
        Self {
            current_round_number: 1,
            total_rounds_completed: 0,
            total_prizes_given: Decimal::ZERO,
            last_winner: None,
            last_prize_amount: Decimal::ZERO,
        }
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

/// Client-facing projection of the active round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RoundView {
    /// Round number.
    pub number: u64,
    /// Current phase.
    pub phase: Phase,
    /// Per-category vote counts.
    pub tally: Tally,
    /// Number of distinct voters.
    pub voter_count: u32,
    /// The chosen category, once revealed.
    pub chosen_category: Option<Category>,
    /// The winner, once selected.
    pub winner: Option<VoterId>,
    /// Prize for this round.
    #[ts(as = "String")]
    pub prize_amount: Decimal,
    /// Seconds left in the current phase's window (clamped at 0).
    pub remaining_secs: u64,
}

impl RoundView {
    /// Project a [`Round`] plus the countdown's remaining budget.
    pub fn project(round: &Round, remaining_secs: u64) -> Self {
        Self {
            number: round.number,
            phase: round.phase,
            tally: round.tally,
            voter_count: round.voter_count(),
            chosen_category: round.chosen_category,
            winner: round.winner.clone(),
            prize_amount: round.prize_amount,
            remaining_secs,
        }
    }
}

/// Client-facing view of the timing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ConfigView {
    /// Length of the voting window in seconds.
    pub voting_window_secs: u64,
    /// Length of the reveal window in seconds.
    pub reveal_window_secs: u64,
    /// Heartbeat snapshot cadence in countdown seconds.
    pub heartbeat_secs: u64,
}

/// The complete externally observable state at a point in time.
///
/// Pushed to the snapshot sink on every accepted vote, every phase
/// transition, and on the heartbeat cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct GameSnapshot {
    /// The process-wide game aggregate.
    pub game: GameState,
    /// The active round projection.
    pub round: RoundView,
    /// The timing configuration.
    pub config: ConfigView,
    /// When this snapshot was generated.
    pub generated_at: DateTime<Utc>,
}

/// Feedback returned to a voter whose vote was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct VoteReceipt {
    /// The round the vote was recorded in.
    pub round_number: u64,
    /// The category voted for.
    pub category: Category,
    /// The post-vote tally.
    pub tally: Tally,
    /// Seconds left in the voting window at acceptance time.
    pub remaining_secs: u64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn tally_records_per_category() {
        let mut tally = Tally::new();
        assert_eq!(tally.record(Category::Red), Some(1));
        assert_eq!(tally.record(Category::Red), Some(2));
        assert_eq!(tally.record(Category::Black), Some(1));
        assert_eq!(tally.count(Category::Red), 2);
        assert_eq!(tally.count(Category::Black), 1);
        assert_eq!(tally.total(), 3);
    }

    #[test]
    fn tally_refuses_overflow() {
        let mut tally = Tally {
            red: u32::MAX,
            black: 0,
        };
        assert_eq!(tally.record(Category::Red), None);
        assert_eq!(tally.count(Category::Red), u32::MAX);
    }

    #[test]
    fn open_round_starts_in_voting() {
        let round = Round::open(1, Decimal::ZERO, Utc::now());
        assert_eq!(round.number, 1);
        assert_eq!(round.phase, Phase::Voting);
        assert!(round.is_active());
        assert!(round.chosen_category.is_none());
        assert!(round.winner.is_none());
        assert_eq!(round.voter_count(), 0);
        assert!(round.ended_at.is_none());
    }

    #[test]
    fn round_view_projects_round_fields() {
        let mut round = Round::open(7, Decimal::new(250, 2), Utc::now());
        round.voters.insert(VoterId::from("x"), Category::Red);
        let _ = round.tally.record(Category::Red);

        let view = RoundView::project(&round, 12);
        assert_eq!(view.number, 7);
        assert_eq!(view.phase, Phase::Voting);
        assert_eq!(view.voter_count, 1);
        assert_eq!(view.tally.red, 1);
        assert_eq!(view.remaining_secs, 12);
    }

    #[test]
    fn game_state_starts_at_round_one() {
        let state = GameState::new();
        assert_eq!(state.current_round_number, 1);
        assert_eq!(state.total_rounds_completed, 0);
        assert_eq!(state.total_prizes_given, Decimal::ZERO);
        assert!(state.last_winner.is_none());
    }

    #[test]
    fn snapshot_serializes_decimal_as_string() {
        let round = Round::open(1, Decimal::new(150, 1), Utc::now());
        let snapshot = GameSnapshot {
            game: GameState::new(),
            round: RoundView::project(&round, 30),
            config: ConfigView {
                voting_window_secs: 30,
                reveal_window_secs: 10,
                heartbeat_secs: 5,
            },
            generated_at: Utc::now(),
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["round"]["prize_amount"], "15.0");
        assert_eq!(json["round"]["phase"], "voting");
        assert_eq!(json["config"]["voting_window_secs"], 30);
    }
}
