//! Vote ledger: admission checks and tally mutation for the active round.
//!
//! All vote writes flow through this module. Preconditions are checked in a
//! fixed order (first failure wins): the round must be accepting votes, then
//! the voter must not have voted already. Because the engine is single-writer,
//! the dedup check and the insert happen as one step on the round's voter
//! map; two racing casts for the same voter can never both succeed.

use rondo_types::{Category, Phase, Round, Tally, VoterId};

/// Errors reported to a voter whose cast was not accepted.
///
/// Only [`VoteError::Storage`] and [`VoteError::OracleUnavailable`] are
/// retryable; everything else is a final verdict for this round.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VoteError {
    /// The eligibility oracle rejected the voter.
    #[error("voter {voter} is not eligible to vote")]
    NotEligible {
        /// The rejected voter.
        voter: VoterId,
    },

    /// The round is not in its voting phase.
    #[error("round {round_number} is not accepting votes (phase: {phase})")]
    RoundClosed {
        /// The round that rejected the vote.
        round_number: u64,
        /// The phase the round is actually in.
        phase: Phase,
    },

    /// The voter already voted this round.
    #[error("already voted {previous} in round {round_number}")]
    DuplicateVote {
        /// The round the prior vote belongs to.
        round_number: u64,
        /// The category the voter previously chose.
        previous: Category,
    },

    /// The per-category counter would overflow.
    #[error("vote tally overflow in round {round_number}")]
    TallyOverflow {
        /// The round whose tally is saturated.
        round_number: u64,
    },

    /// The vote could not be persisted; the voter should retry.
    #[error("vote could not be persisted, retry: {message}")]
    Storage {
        /// Description of the transient failure.
        message: String,
    },

    /// The eligibility oracle could not be reached; the voter should retry.
    #[error("eligibility check unavailable: {message}")]
    OracleUnavailable {
        /// Description of the oracle failure.
        message: String,
    },

    /// No active round exists to vote in.
    #[error("no active round is accepting votes")]
    NoActiveRound,

    /// The engine task is not running.
    #[error("engine is not running")]
    EngineStopped,
}

/// Check the admission preconditions without mutating the round.
///
/// Used by the controller to validate a vote before persisting it; the
/// actual mutation happens in [`apply_vote`] once the vote is durable.
///
/// # Errors
///
/// Returns [`VoteError::RoundClosed`] if the round is not in
/// [`Phase::Voting`], or [`VoteError::DuplicateVote`] (with the voter's
/// prior choice) if the voter already voted.
pub fn check_vote(round: &Round, voter_id: &VoterId) -> Result<(), VoteError> {
    if round.phase != Phase::Voting {
        return Err(VoteError::RoundClosed {
            round_number: round.number,
            phase: round.phase,
        });
    }
    if let Some(previous) = round.voters.get(voter_id) {
        return Err(VoteError::DuplicateVote {
            round_number: round.number,
            previous: *previous,
        });
    }
    Ok(())
}

/// Record an accepted vote against the round.
///
/// Re-runs the admission checks, then inserts the voter and increments the
/// tally as a single step. Returns the post-vote tally.
///
/// # Errors
///
/// Returns the same errors as [`check_vote`], plus
/// [`VoteError::TallyOverflow`] if the category counter is saturated.
pub fn apply_vote(
    round: &mut Round,
    voter_id: VoterId,
    category: Category,
) -> Result<Tally, VoteError> {
    check_vote(round, &voter_id)?;

    if round.tally.record(category).is_none() {
        return Err(VoteError::TallyOverflow {
            round_number: round.number,
        });
    }
    round.voters.insert(voter_id, category);

    Ok(round.tally)
}
