//! Round lifecycle engine for a recurring two-outcome voting game.
//!
//! Rounds cycle perpetually through three phases: an open voting window,
//! a short reveal window after a category is drawn, and completion, at
//! which point the next round opens immediately. Votes are deduplicated
//! per voter per round, the winning category is drawn uniformly
//! (independent of the tally), and the winner is drawn uniformly from the
//! voters who picked it.
//!
//! The crate is organized around one serialized engine task:
//!
//! - [`config`] -- YAML configuration with validated timing windows.
//! - [`countdown`] -- pure per-phase countdown arithmetic.
//! - [`ledger`] -- vote admission rules and tally bookkeeping.
//! - [`selector`] -- the randomness seam ([`OutcomeSelector`]).
//! - [`store`] -- the persistence seam ([`Repository`]) and an in-memory
//!   implementation.
//! - [`oracle`] -- the voter-eligibility seam ([`EligibilityOracle`]).
//! - [`broadcast`] -- the snapshot fan-out seam ([`SnapshotSink`]).
//! - [`controller`] -- the phase state machine.
//! - [`engine`] -- the tokio task, command queue, and public handle.

pub mod broadcast;
pub mod config;
pub mod controller;
pub mod countdown;
pub mod engine;
pub mod ledger;
pub mod oracle;
pub mod selector;
pub mod store;

pub use broadcast::{NoOpSink, SnapshotSink};
pub use config::{ConfigError, EngineConfig, GameConfig, LoggingConfig, RoundTimingConfig};
pub use controller::{ControllerError, PhaseController};
pub use countdown::PhaseCountdown;
pub use engine::{spawn, EngineError, EngineHandle};
pub use ledger::VoteError;
pub use oracle::{EligibilityOracle, OpenOracle, OracleError};
pub use selector::{OutcomeSelector, RandomSelector, StubSelector};
pub use store::{MemoryRepository, Repository, StoreError};
