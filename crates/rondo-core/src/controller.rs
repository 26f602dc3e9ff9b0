//! Phase controller: the state machine that owns the active round.
//!
//! The controller is the sole writer of a round's `phase`. It drives the
//! two timed transitions (Voting -> Revealing on voting-window expiry,
//! Revealing -> Completed on reveal-window expiry), applies votes through
//! the ledger, invokes the outcome selector at each transition, updates the
//! game aggregate at completion, and immediately opens the next round --
//! the system as a whole has no terminal state.
//!
//! All methods here are called from the single engine task, so no two
//! mutations ever race. Timer events carry the round/phase they expect;
//! a stale firing that no longer matches is logged and discarded.

use chrono::{DateTime, TimeDelta, Utc};
use rondo_types::{
    Category, ConfigView, GameSnapshot, GameState, Phase, Round, RoundView, Vote, VoteId,
    VoteReceipt, VoterId,
};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::config::RoundTimingConfig;
use crate::countdown::PhaseCountdown;
use crate::ledger::{self, VoteError};
use crate::selector::OutcomeSelector;
use crate::store::{Repository, StoreError};

/// Errors from controller operations other than vote casting.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// No active round exists and none could be created. Fatal to vote
    /// admission until a round is (re)created.
    #[error("no active round exists")]
    MissingActiveRound,

    /// The referenced round does not exist.
    #[error("round {number} not found")]
    RoundNotFound {
        /// The missing round number.
        number: u64,
    },

    /// The referenced round has not completed yet.
    #[error("round {number} is not completed")]
    RoundNotCompleted {
        /// The round still in play.
        number: u64,
    },

    /// Prize amounts must be non-negative.
    #[error("prize amount must not be negative")]
    NegativePrize,

    /// A repository call failed.
    #[error("storage error: {source}")]
    Store {
        /// The underlying storage error.
        #[from]
        source: StoreError,
    },
}

/// The round lifecycle state machine.
///
/// Generic over the repository and the outcome selector so tests can swap
/// in deterministic implementations.
#[derive(Debug)]
pub struct PhaseController<R, S> {
    repo: R,
    selector: S,
    timing: RoundTimingConfig,
    /// The active round, once [`start`](Self::start) has run.
    round: Option<Round>,
    /// Process-wide aggregate, written only at round completion.
    game: GameState,
    /// Countdown for the active phase.
    countdown: PhaseCountdown,
}

impl<R, S> PhaseController<R, S>
where
    R: Repository,
    S: OutcomeSelector,
{
    /// Create a controller with no active round. Call
    /// [`start`](Self::start) before anything else.
    pub const fn new(repo: R, selector: S, timing: RoundTimingConfig) -> Self {
        Self {
            repo,
            selector,
            timing,
            round: None,
            game: GameState::new(),
            countdown: PhaseCountdown::start(0),
        }
    }

    /// Start (or resume) the engine. Idempotent.
    ///
    /// With no persisted active round this creates round 1 in voting.
    /// With one, it reconciles the persisted phase against wall-clock
    /// elapsed time: a deadline that passed while the process was down is
    /// replayed immediately (Voting -> Revealing -> Completed in order)
    /// rather than resuming a stale phase indefinitely.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Store`] if the initial round cannot be
    /// loaded or created.
    pub async fn start(&mut self) -> Result<(), ControllerError> {
        if self.round.as_ref().is_some_and(Round::is_active) {
            debug!("start ignored: an active round already exists");
            return Ok(());
        }

        self.game = self.repo.load_game_state().await?.unwrap_or_default();

        match self.repo.load_active_round().await? {
            None => {
                // Fresh start, or a crash landed between completing one
                // round and opening the next; the aggregate names the round
                // that should be in play, but a crash after persisting a
                // completed round and before the aggregate leaves it one
                // round behind. Never reuse a completed round's number:
                // fold the orphaned completion into the aggregate and move
                // past it.
                let mut number = self.game.current_round_number.max(1);
                while let Some(done) = self.repo.load_round(number).await? {
                    if done.phase != Phase::Completed {
                        break;
                    }
                    warn!(
                        round = number,
                        winner = done.winner.as_ref().map(VoterId::as_str),
                        "aggregate lags a persisted completed round; folding it in"
                    );
                    self.game.total_rounds_completed =
                        self.game.total_rounds_completed.saturating_add(1);
                    self.game.last_winner = done.winner.clone();
                    self.game.last_prize_amount = done.prize_amount;
                    if done.winner.is_some() {
                        self.game.total_prizes_given = self
                            .game
                            .total_prizes_given
                            .checked_add(done.prize_amount)
                            .unwrap_or(self.game.total_prizes_given);
                    }
                    number = number.saturating_add(1);
                }
                self.game.current_round_number = number;
                self.open_round(number).await?;
                if let Err(err) = self.repo.save_game_state(&self.game).await {
                    warn!(%err, "failed to persist game state at startup");
                }
            }
            Some(round) => {
                info!(
                    round = round.number,
                    phase = %round.phase,
                    "resuming persisted active round"
                );
                self.game.current_round_number = round.number;
                self.round = Some(round);
                self.reconcile().await?;
            }
        }
        Ok(())
    }

    /// Advance the countdown by one simulated second.
    ///
    /// Returns the remaining budget, or `None` when no active round exists
    /// (nothing to count down).
    pub fn tick_countdown(&mut self) -> Option<u64> {
        if self.round.as_ref().is_some_and(Round::is_active) {
            Some(self.countdown.tick())
        } else {
            None
        }
    }

    /// The round/phase pair a timeout fired now would target.
    pub fn expected_timeout(&self) -> Option<(u64, Phase)> {
        self.round
            .as_ref()
            .filter(|r| r.is_active())
            .map(|r| (r.number, r.phase))
    }

    /// Handle a phase-deadline expiry.
    ///
    /// The event carries the round and phase the timer was armed for. If
    /// they no longer match the active round (a duplicate or late firing),
    /// the event is logged as anomalous and discarded; nothing changes.
    /// Returns whether a transition ran.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError`] if the transition itself fails.
    pub async fn advance_on_timeout(
        &mut self,
        round_number: u64,
        phase: Phase,
    ) -> Result<bool, ControllerError> {
        let current = self
            .round
            .as_ref()
            .is_some_and(|r| r.number == round_number && r.phase == phase);
        if !current {
            warn!(
                expected_round = round_number,
                expected_phase = %phase,
                actual_round = self.round.as_ref().map(|r| r.number),
                "anomalous timer: target round/phase no longer current; discarding"
            );
            return Ok(false);
        }

        let now = Utc::now();
        match phase {
            Phase::Voting => self.begin_reveal(now).await?,
            Phase::Revealing => self.complete_round(now).await?,
            Phase::Completed => return Ok(false),
        }
        Ok(true)
    }

    /// Administrative force-advance: end the current phase immediately.
    ///
    /// Runs the same transition the pending timeout would have run, through
    /// the same path, so no partial effects are observable in between.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::MissingActiveRound`] if there is nothing
    /// to advance.
    pub async fn force_advance(&mut self) -> Result<(), ControllerError> {
        let (number, phase) = self
            .expected_timeout()
            .ok_or(ControllerError::MissingActiveRound)?;
        info!(round = number, phase = %phase, "forced advance");
        let _ = self.advance_on_timeout(number, phase).await?;
        Ok(())
    }

    /// Cast a vote against the active round.
    ///
    /// Preconditions run in order, first failure wins: the round must be in
    /// voting, then the voter must not have voted already. The vote is made
    /// durable before the in-memory tally is touched; a persistence failure
    /// rejects the cast so a vote is never silently dropped.
    ///
    /// # Errors
    ///
    /// Returns [`VoteError`] describing the rejection; no state changes on
    /// any error path.
    pub async fn cast_vote(
        &mut self,
        voter_id: VoterId,
        category: Category,
    ) -> Result<VoteReceipt, VoteError> {
        let round = self.round.as_ref().ok_or(VoteError::NoActiveRound)?;
        ledger::check_vote(round, &voter_id)?;
        let number = round.number;

        let vote = Vote {
            id: VoteId::new(),
            voter_id: voter_id.clone(),
            round_number: number,
            category,
            cast_at: Utc::now(),
        };
        match self.repo.append_vote(&vote).await {
            Ok(()) => {}
            Err(StoreError::DuplicateVote { .. }) => {
                // The unique index holds a vote the in-memory map does not
                // (written by a previous process run). Recover the prior
                // choice from the vote log for the rejection message; a
                // failed lookup surfaces as a storage rejection rather than
                // a guessed category.
                let mut previous = None;
                for candidate in Category::ALL {
                    let votes = self
                        .repo
                        .find_votes_by_category(number, candidate)
                        .await
                        .map_err(|err| VoteError::Storage {
                            message: err.to_string(),
                        })?;
                    if votes.iter().any(|v| v.voter_id == voter_id) {
                        previous = Some(candidate);
                        break;
                    }
                }
                let previous = previous.ok_or_else(|| VoteError::Storage {
                    message: format!(
                        "duplicate index entry without a logged vote in round {number}"
                    ),
                })?;
                return Err(VoteError::DuplicateVote {
                    round_number: number,
                    previous,
                });
            }
            Err(StoreError::Transient { message }) => {
                return Err(VoteError::Storage { message });
            }
        }

        let round = self.round.as_mut().ok_or(VoteError::NoActiveRound)?;
        let tally = ledger::apply_vote(round, voter_id.clone(), category)?;
        let accepted = round.clone();
        let remaining_secs = self.countdown.remaining();
        self.persist_round_tolerant(&accepted).await;

        debug!(
            round = number,
            voter = voter_id.as_str(),
            %category,
            tally_red = tally.red,
            tally_black = tally.black,
            "vote accepted"
        );
        Ok(VoteReceipt {
            round_number: number,
            category,
            tally,
            remaining_secs,
        })
    }

    /// Set the active round's prize amount (admin mutation).
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::NegativePrize`] for a negative amount or
    /// [`ControllerError::MissingActiveRound`] if no round is in play.
    pub async fn set_prize_amount(&mut self, amount: Decimal) -> Result<(), ControllerError> {
        if amount.is_sign_negative() {
            return Err(ControllerError::NegativePrize);
        }
        let round = self
            .round
            .as_mut()
            .ok_or(ControllerError::MissingActiveRound)?;
        round.prize_amount = amount;
        let updated = round.clone();
        info!(round = updated.number, prize = %amount, "prize amount set");
        self.persist_round_tolerant(&updated).await;
        Ok(())
    }

    /// Mark a completed round's prize as paid out (admin mutation).
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::RoundNotFound`] for an unknown round or
    /// [`ControllerError::RoundNotCompleted`] if the round is still in play.
    pub async fn mark_prize_paid(&mut self, round_number: u64) -> Result<(), ControllerError> {
        if self
            .round
            .as_ref()
            .is_some_and(|r| r.number == round_number)
        {
            return Err(ControllerError::RoundNotCompleted {
                number: round_number,
            });
        }
        let mut round = self
            .repo
            .load_round(round_number)
            .await?
            .ok_or(ControllerError::RoundNotFound {
                number: round_number,
            })?;
        if round.phase != Phase::Completed {
            return Err(ControllerError::RoundNotCompleted {
                number: round_number,
            });
        }
        round.prize_paid = true;
        self.repo.save_round(&round).await?;
        info!(round = round_number, "prize marked paid");
        Ok(())
    }

    /// Build a complete, self-consistent snapshot of the observable state.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::MissingActiveRound`] before
    /// [`start`](Self::start) has created a round.
    pub fn snapshot(&self) -> Result<GameSnapshot, ControllerError> {
        let round = self
            .round
            .as_ref()
            .ok_or(ControllerError::MissingActiveRound)?;
        Ok(GameSnapshot {
            game: self.game.clone(),
            round: RoundView::project(round, self.countdown.remaining()),
            config: ConfigView {
                voting_window_secs: self.timing.voting_window_secs,
                reveal_window_secs: self.timing.reveal_window_secs,
                heartbeat_secs: self.timing.heartbeat_secs,
            },
            generated_at: Utc::now(),
        })
    }

    /// The game aggregate (read-only).
    pub const fn game(&self) -> &GameState {
        &self.game
    }

    /// The active round (read-only).
    pub const fn active_round(&self) -> Option<&Round> {
        self.round.as_ref()
    }

    /// Seconds left in the current phase.
    pub const fn remaining_secs(&self) -> u64 {
        self.countdown.remaining()
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Open a fresh round in voting and start its countdown.
    async fn open_round(&mut self, number: u64) -> Result<(), ControllerError> {
        let round = Round::open(number, self.timing.default_prize, Utc::now());
        self.repo.save_round(&round).await?;
        info!(
            round = number,
            window_secs = self.timing.voting_window_secs,
            "round opened; voting"
        );
        self.round = Some(round);
        self.countdown = PhaseCountdown::start(self.timing.voting_window_secs);
        Ok(())
    }

    /// Voting -> Revealing: choose the category and freeze the tally.
    ///
    /// The category draw is independent of the tally; votes only determine
    /// eligibility for the winner draw.
    async fn begin_reveal(&mut self, at: DateTime<Utc>) -> Result<(), ControllerError> {
        let category = self.selector.choose_category();
        let round = self
            .round
            .as_mut()
            .ok_or(ControllerError::MissingActiveRound)?;
        round.chosen_category = Some(category);
        round.phase = Phase::Revealing;
        round.phase_started_at = at;
        info!(
            round = round.number,
            %category,
            tally_red = round.tally.red,
            tally_black = round.tally.black,
            "voting closed; category revealed"
        );
        let revealing = round.clone();
        self.persist_round_tolerant(&revealing).await;
        self.countdown = PhaseCountdown::start(self.timing.reveal_window_secs);
        Ok(())
    }

    /// Revealing -> Completed: choose the winner, update the aggregate,
    /// and open the next round.
    async fn complete_round(&mut self, at: DateTime<Utc>) -> Result<(), ControllerError> {
        let (number, prize, chosen) = {
            let round = self
                .round
                .as_ref()
                .ok_or(ControllerError::MissingActiveRound)?;
            (round.number, round.prize_amount, round.chosen_category)
        };
        // Revealing implies a chosen category; the draw here is a guard
        // against a round document restored mid-transition.
        let category = chosen.unwrap_or_else(|| {
            warn!(round = number, "revealing round without a category; drawing now");
            self.selector.choose_category()
        });

        // The durable vote log is the authority on eligibility; fall back
        // to the in-memory voter map if storage is briefly unavailable.
        let eligible: Vec<VoterId> = match self.repo.find_votes_by_category(number, category).await
        {
            Ok(votes) => votes.into_iter().map(|v| v.voter_id).collect(),
            Err(err) => {
                warn!(
                    round = number,
                    %err,
                    "vote log unavailable; deriving eligible set from in-memory round"
                );
                self.round.as_ref().map_or_else(Vec::new, |r| {
                    r.voters
                        .iter()
                        .filter(|(_, c)| **c == category)
                        .map(|(v, _)| v.clone())
                        .collect()
                })
            }
        };
        let winner = self.selector.choose_winner(&eligible);

        let round = self
            .round
            .as_mut()
            .ok_or(ControllerError::MissingActiveRound)?;
        round.chosen_category = Some(category);
        round.winner = winner.clone();
        round.phase = Phase::Completed;
        round.phase_started_at = at;
        round.ended_at = Some(at);
        let completed = round.clone();

        // The aggregate is written only here, at round completion.
        let next_number = number.saturating_add(1);
        self.game.total_rounds_completed = self.game.total_rounds_completed.saturating_add(1);
        self.game.last_winner = winner.clone();
        self.game.last_prize_amount = prize;
        if winner.is_some() {
            self.game.total_prizes_given = self
                .game
                .total_prizes_given
                .checked_add(prize)
                .unwrap_or(self.game.total_prizes_given);
        }
        self.game.current_round_number = next_number;

        info!(
            round = number,
            %category,
            winner = winner.as_ref().map(VoterId::as_str),
            eligible = eligible.len(),
            next_round = next_number,
            "round completed"
        );

        self.persist_round_tolerant(&completed).await;
        if let Err(err) = self.repo.save_game_state(&self.game).await {
            warn!(%err, "failed to persist game state; continuing");
        }

        // The next round begins immediately in voting.
        let next = Round::open(next_number, self.timing.default_prize, Utc::now());
        self.persist_round_tolerant(&next).await;
        self.round = Some(next);
        self.countdown = PhaseCountdown::start(self.timing.voting_window_secs);
        Ok(())
    }

    /// Replay any transitions whose deadline passed while the process was
    /// down, then resume the countdown with the leftover budget.
    async fn reconcile(&mut self) -> Result<(), ControllerError> {
        loop {
            let Some(round) = self.round.as_ref() else {
                return Err(ControllerError::MissingActiveRound);
            };
            let window = match round.phase {
                Phase::Voting => self.timing.voting_window_secs,
                Phase::Revealing => self.timing.reveal_window_secs,
                Phase::Completed => break,
            };
            let elapsed = elapsed_secs(round.phase_started_at);
            if elapsed < window {
                self.countdown = PhaseCountdown::resume(window, window.saturating_sub(elapsed));
                info!(
                    round = round.number,
                    phase = %round.phase,
                    remaining_secs = self.countdown.remaining(),
                    "resumed phase countdown"
                );
                break;
            }

            // Replay the missed transition as of its scheduled deadline so
            // a doubly-stale round falls through both transitions in order.
            let phase = round.phase;
            let deadline = deadline_after(round.phase_started_at, window);
            warn!(
                round = round.number,
                %phase,
                elapsed_secs = elapsed,
                window_secs = window,
                "phase deadline passed while offline; replaying transition"
            );
            match phase {
                Phase::Voting => self.begin_reveal(deadline).await?,
                Phase::Revealing => self.complete_round(deadline).await?,
                Phase::Completed => break,
            }
        }
        Ok(())
    }

    /// Persist a round, tolerating transient failure: the in-memory state
    /// stays authoritative and the next save catches the store up.
    async fn persist_round_tolerant(&self, round: &Round) {
        if let Err(err) = self.repo.save_round(round).await {
            warn!(
                round = round.number,
                %err,
                "failed to persist round; continuing with in-memory state"
            );
        }
    }
}

/// Whole seconds elapsed since `since`, clamped at zero.
fn elapsed_secs(since: DateTime<Utc>) -> u64 {
    let delta = Utc::now().signed_duration_since(since);
    u64::try_from(delta.num_seconds()).unwrap_or(0)
}

/// The wall-clock deadline `window_secs` after `start`.
fn deadline_after(start: DateTime<Utc>, window_secs: u64) -> DateTime<Utc> {
    let secs = i64::try_from(window_secs).unwrap_or(i64::MAX);
    start
        .checked_add_signed(TimeDelta::seconds(secs))
        .unwrap_or_else(Utc::now)
}
