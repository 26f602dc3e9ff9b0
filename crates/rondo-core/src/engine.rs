//! The serialized engine task and its command handle.
//!
//! All state mutation flows through one command queue into one tokio task
//! that owns the [`PhaseController`]. Concurrent callers interleave at the
//! queue, never inside a step, so vote admission, phase transitions, and
//! admin mutations cannot race.
//!
//! The same task drives time: a tick interval decrements the phase
//! countdown (one tick is one simulated second), and an expiry enqueues a
//! timeout command onto the same queue. Timeout commands carry the round
//! and phase they were armed for; a firing that no longer matches is
//! discarded as anomalous.

use std::sync::Arc;

use rondo_types::{Category, GameSnapshot, VoteReceipt, VoterId};
use rust_decimal::Decimal;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::broadcast::SnapshotSink;
use crate::config::GameConfig;
use crate::controller::{ControllerError, PhaseController};
use crate::ledger::VoteError;
use crate::oracle::{EligibilityOracle, OracleError};
use crate::selector::OutcomeSelector;
use crate::store::Repository;

/// Errors from engine-level operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The underlying controller operation failed.
    #[error(transparent)]
    Controller(#[from] ControllerError),

    /// The engine task is no longer running.
    #[error("engine task has stopped")]
    Stopped,
}

/// Commands accepted by the engine task.
enum EngineCommand {
    CastVote {
        voter_id: VoterId,
        category: Category,
        reply: oneshot::Sender<Result<VoteReceipt, VoteError>>,
    },
    ForceAdvance {
        reply: oneshot::Sender<Result<(), ControllerError>>,
    },
    SetPrize {
        amount: Decimal,
        reply: oneshot::Sender<Result<(), ControllerError>>,
    },
    MarkPrizePaid {
        round_number: u64,
        reply: oneshot::Sender<Result<(), ControllerError>>,
    },
    GetSnapshot {
        reply: oneshot::Sender<Result<GameSnapshot, ControllerError>>,
    },
    /// Self-enqueued phase-deadline expiry, tagged with its target.
    AdvanceTimeout {
        round_number: u64,
        phase: rondo_types::Phase,
    },
    Shutdown,
}

/// Cloneable handle for submitting commands to a running engine.
///
/// Eligibility is checked here, outside the serialized task, so a slow
/// oracle never stalls the round lifecycle.
#[derive(Debug)]
pub struct EngineHandle<O> {
    tx: mpsc::Sender<EngineCommand>,
    oracle: Arc<O>,
}

impl<O> Clone for EngineHandle<O> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            oracle: Arc::clone(&self.oracle),
        }
    }
}

impl<O> EngineHandle<O>
where
    O: EligibilityOracle,
{
    /// Cast a vote for `voter_id` in the active round.
    ///
    /// # Errors
    ///
    /// Returns [`VoteError`] when eligibility, phase, or dedup checks
    /// reject the vote, or the engine has stopped.
    pub async fn cast_vote(
        &self,
        voter_id: VoterId,
        category: Category,
    ) -> Result<VoteReceipt, VoteError> {
        match self.oracle.is_eligible(&voter_id).await {
            Ok(true) => {}
            Ok(false) => return Err(VoteError::NotEligible { voter: voter_id }),
            Err(OracleError::Unavailable { message }) => {
                return Err(VoteError::OracleUnavailable { message });
            }
        }
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(EngineCommand::CastVote {
                voter_id,
                category,
                reply,
            })
            .await
            .map_err(|_err| VoteError::EngineStopped)?;
        rx.await.map_err(|_err| VoteError::EngineStopped)?
    }

    /// End the current phase immediately (admin).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if no round is active or the engine has
    /// stopped.
    pub async fn force_advance(&self) -> Result<(), EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(EngineCommand::ForceAdvance { reply })
            .await
            .map_err(|_err| EngineError::Stopped)?;
        rx.await.map_err(|_err| EngineError::Stopped)??;
        Ok(())
    }

    /// Set the active round's prize amount (admin).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] for a negative amount, a missing round, or
    /// a stopped engine.
    pub async fn set_prize_amount(&self, amount: Decimal) -> Result<(), EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(EngineCommand::SetPrize { amount, reply })
            .await
            .map_err(|_err| EngineError::Stopped)?;
        rx.await.map_err(|_err| EngineError::Stopped)??;
        Ok(())
    }

    /// Mark a completed round's prize as paid out (admin).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the round is unknown, not completed, or
    /// the engine has stopped.
    pub async fn mark_prize_paid(&self, round_number: u64) -> Result<(), EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(EngineCommand::MarkPrizePaid { round_number, reply })
            .await
            .map_err(|_err| EngineError::Stopped)?;
        rx.await.map_err(|_err| EngineError::Stopped)??;
        Ok(())
    }

    /// Fetch a consistent snapshot of the observable state.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the engine has stopped or has no round.
    pub async fn snapshot(&self) -> Result<GameSnapshot, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(EngineCommand::GetSnapshot { reply })
            .await
            .map_err(|_err| EngineError::Stopped)?;
        let result = rx.await.map_err(|_err| EngineError::Stopped)?;
        result.map_err(EngineError::from)
    }

    /// Ask the engine task to exit. Safe to call more than once.
    pub async fn shutdown(&self) {
        if self.tx.send(EngineCommand::Shutdown).await.is_err() {
            debug!("shutdown requested but engine already stopped");
        }
    }
}

/// Start the engine: recover or create the active round, then spawn the
/// serialized task.
///
/// Returns a handle for commands and the task's [`JoinHandle`] for
/// shutdown joins.
///
/// # Errors
///
/// Returns [`EngineError`] if startup recovery fails.
pub async fn spawn<R, S, K, O>(
    config: GameConfig,
    repo: R,
    selector: S,
    sink: K,
    oracle: O,
) -> Result<(EngineHandle<O>, JoinHandle<()>), EngineError>
where
    R: Repository,
    S: OutcomeSelector + Send + Sync + 'static,
    K: SnapshotSink,
    O: EligibilityOracle,
{
    let mut controller = PhaseController::new(repo, selector, config.round.clone());
    controller.start().await?;

    let (tx, rx) = mpsc::channel(config.engine.command_queue_depth);
    let engine = GameEngine {
        controller,
        sink,
        rx,
        self_tx: tx.downgrade(),
        heartbeat_secs: config.round.heartbeat_secs,
        tick_interval: Duration::from_millis(config.engine.tick_interval_ms),
        timeout_pending: false,
    };
    let task = tokio::spawn(engine.run());
    Ok((
        EngineHandle {
            tx,
            oracle: Arc::new(oracle),
        },
        task,
    ))
}

/// The engine task state. Owned entirely by one tokio task.
struct GameEngine<R, S, K> {
    controller: PhaseController<R, S>,
    sink: K,
    rx: mpsc::Receiver<EngineCommand>,
    /// Used to enqueue timeout commands behind in-flight votes. Weak so
    /// the queue closes (and the task exits) once every handle is gone.
    self_tx: mpsc::WeakSender<EngineCommand>,
    heartbeat_secs: u64,
    tick_interval: Duration,
    /// A timeout command is queued and not yet processed.
    timeout_pending: bool,
}

impl<R, S, K> GameEngine<R, S, K>
where
    R: Repository,
    S: OutcomeSelector + Send + Sync + 'static,
    K: SnapshotSink,
{
    async fn run(mut self) {
        // First tick lands one full interval from now, not immediately.
        let first_tick = tokio::time::Instant::now()
            .checked_add(self.tick_interval)
            .unwrap_or_else(tokio::time::Instant::now);
        let mut ticker = tokio::time::interval_at(first_tick, self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Listeners see the freshly opened (or recovered) round right away.
        self.emit_snapshot();
        info!("engine running");
        loop {
            tokio::select! {
                _ = ticker.tick() => self.on_tick(),
                cmd = self.rx.recv() => {
                    let Some(cmd) = cmd else { break };
                    if !self.handle_command(cmd).await {
                        break;
                    }
                }
            }
        }
        info!("engine stopped");
    }

    /// One simulated second elapses.
    fn on_tick(&mut self) {
        let Some(remaining) = self.controller.tick_countdown() else {
            return;
        };
        if remaining == 0 {
            if self.timeout_pending {
                return;
            }
            let Some((round_number, phase)) = self.controller.expected_timeout() else {
                return;
            };
            let Some(tx) = self.self_tx.upgrade() else {
                // Every handle is gone; recv() is about to return None.
                return;
            };
            self.timeout_pending = true;
            if let Err(err) = tx.try_send(EngineCommand::AdvanceTimeout {
                round_number,
                phase,
            }) {
                // Queue full; the next tick retries.
                self.timeout_pending = false;
                warn!(error = %err, "could not enqueue phase timeout");
            }
        } else if remaining.checked_rem(self.heartbeat_secs) == Some(0) {
            self.emit_snapshot();
        }
    }

    /// Returns `false` when the engine should exit.
    async fn handle_command(&mut self, cmd: EngineCommand) -> bool {
        match cmd {
            EngineCommand::CastVote {
                voter_id,
                category,
                reply,
            } => {
                let result = self.controller.cast_vote(voter_id, category).await;
                // Rejected votes leave no trace in the broadcast stream.
                // Emit before replying so the snapshot is visible by the
                // time the caller observes the receipt.
                if result.is_ok() {
                    self.emit_snapshot();
                }
                let _ = reply.send(result);
            }
            EngineCommand::AdvanceTimeout {
                round_number,
                phase,
            } => {
                self.timeout_pending = false;
                match self.controller.advance_on_timeout(round_number, phase).await {
                    Ok(true) => self.emit_snapshot(),
                    Ok(false) => {}
                    Err(err) => warn!(%err, "phase transition failed"),
                }
            }
            EngineCommand::ForceAdvance { reply } => {
                let result = self.controller.force_advance().await;
                if result.is_ok() {
                    // Any queued timeout now targets a phase that is gone.
                    self.timeout_pending = false;
                    self.emit_snapshot();
                }
                let _ = reply.send(result);
            }
            EngineCommand::SetPrize { amount, reply } => {
                let result = self.controller.set_prize_amount(amount).await;
                if result.is_ok() {
                    self.emit_snapshot();
                }
                let _ = reply.send(result);
            }
            EngineCommand::MarkPrizePaid {
                round_number,
                reply,
            } => {
                let result = self.controller.mark_prize_paid(round_number).await;
                if result.is_ok() {
                    self.emit_snapshot();
                }
                let _ = reply.send(result);
            }
            EngineCommand::GetSnapshot { reply } => {
                let _ = reply.send(self.controller.snapshot());
            }
            EngineCommand::Shutdown => return false,
        }
        true
    }

    fn emit_snapshot(&mut self) {
        match self.controller.snapshot() {
            Ok(snapshot) => self.sink.deliver(&snapshot),
            Err(err) => debug!(%err, "snapshot unavailable"),
        }
    }
}
