//! Repository seam: durable storage for rounds, votes, and the game
//! aggregate.
//!
//! The engine reads and writes through the [`Repository`] trait and assumes
//! every call either succeeds or fails with a retryable transient error. No
//! multi-document atomicity is assumed: a crash between `append_vote` and
//! `save_round` leaves the vote durable and the round document stale, which
//! the controller tolerates (the vote log is authoritative).
//!
//! [`MemoryRepository`] is the in-process implementation used by the binary
//! and the tests; a database-backed implementation plugs in behind the same
//! trait. The unique `(voter, round)` index that backs exact vote dedup is
//! modeled here by the vote map key.

use std::collections::BTreeMap;
use std::sync::Arc;

use rondo_types::{Category, GameState, Round, Vote, VoterId};
use tokio::sync::Mutex;

/// Errors surfaced by repository calls.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// A transient failure; the caller may retry the operation.
    #[error("transient storage failure: {message}")]
    Transient {
        /// Description of the failure.
        message: String,
    },

    /// The unique `(voter, round)` index rejected a second vote.
    #[error("vote already recorded for voter {voter} in round {round_number}")]
    DuplicateVote {
        /// The voter with an existing vote.
        voter: VoterId,
        /// The round the existing vote belongs to.
        round_number: u64,
    },
}

/// Durable storage consumed by the phase controller.
///
/// All futures are `Send` because they execute inside the spawned engine
/// task.
pub trait Repository: Send + Sync + 'static {
    /// Load the unique round currently in voting or revealing, if any.
    fn load_active_round(&self)
    -> impl Future<Output = Result<Option<Round>, StoreError>> + Send;

    /// Load one round by number (active or historical).
    fn load_round(
        &self,
        number: u64,
    ) -> impl Future<Output = Result<Option<Round>, StoreError>> + Send;

    /// Upsert a round document.
    fn save_round(&self, round: &Round) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Load the process-wide game aggregate, if one has been saved.
    fn load_game_state(
        &self,
    ) -> impl Future<Output = Result<Option<GameState>, StoreError>> + Send;

    /// Upsert the game aggregate.
    fn save_game_state(
        &self,
        state: &GameState,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Insert a vote, enforcing the unique `(voter, round)` index.
    ///
    /// A second vote for the same pair fails with
    /// [`StoreError::DuplicateVote`]; the check and the insert are one
    /// atomic step.
    fn append_vote(&self, vote: &Vote) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Return all votes for one round and category, in cast order.
    fn find_votes_by_category(
        &self,
        round_number: u64,
        category: Category,
    ) -> impl Future<Output = Result<Vec<Vote>, StoreError>> + Send;
}

/// In-memory repository state.
#[derive(Debug, Default)]
struct Inner {
    /// Rounds keyed by number.
    rounds: BTreeMap<u64, Round>,
    /// The game aggregate, once saved.
    game_state: Option<GameState>,
    /// Votes keyed by the unique `(round, voter)` pair.
    votes: BTreeMap<(u64, VoterId), Vote>,
}

/// In-process [`Repository`] implementation.
///
/// Cheap to clone; all clones share the same state, so a test can keep a
/// handle and inspect what the engine persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a stored round by number (test/inspection helper).
    pub async fn round(&self, number: u64) -> Option<Round> {
        self.inner.lock().await.rounds.get(&number).cloned()
    }

    /// Return the number of stored votes (test/inspection helper).
    pub async fn vote_count(&self) -> usize {
        self.inner.lock().await.votes.len()
    }
}

impl Repository for MemoryRepository {
    fn load_active_round(
        &self,
    ) -> impl Future<Output = Result<Option<Round>, StoreError>> + Send {
        let inner = Arc::clone(&self.inner);
        async move {
            let guard = inner.lock().await;
            Ok(guard.rounds.values().find(|r| r.is_active()).cloned())
        }
    }

    fn load_round(
        &self,
        number: u64,
    ) -> impl Future<Output = Result<Option<Round>, StoreError>> + Send {
        let inner = Arc::clone(&self.inner);
        async move {
            let guard = inner.lock().await;
            Ok(guard.rounds.get(&number).cloned())
        }
    }

    fn save_round(&self, round: &Round) -> impl Future<Output = Result<(), StoreError>> + Send {
        let inner = Arc::clone(&self.inner);
        let round = round.clone();
        async move {
            let mut guard = inner.lock().await;
            guard.rounds.insert(round.number, round);
            Ok(())
        }
    }

    fn load_game_state(
        &self,
    ) -> impl Future<Output = Result<Option<GameState>, StoreError>> + Send {
        let inner = Arc::clone(&self.inner);
        async move {
            let guard = inner.lock().await;
            Ok(guard.game_state.clone())
        }
    }

    fn save_game_state(
        &self,
        state: &GameState,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        let inner = Arc::clone(&self.inner);
        let state = state.clone();
        async move {
            let mut guard = inner.lock().await;
            guard.game_state = Some(state);
            Ok(())
        }
    }

    fn append_vote(&self, vote: &Vote) -> impl Future<Output = Result<(), StoreError>> + Send {
        let inner = Arc::clone(&self.inner);
        let vote = vote.clone();
        async move {
            let mut guard = inner.lock().await;
            let key = (vote.round_number, vote.voter_id.clone());
            if guard.votes.contains_key(&key) {
                return Err(StoreError::DuplicateVote {
                    voter: vote.voter_id,
                    round_number: vote.round_number,
                });
            }
            guard.votes.insert(key, vote);
            Ok(())
        }
    }

    fn find_votes_by_category(
        &self,
        round_number: u64,
        category: Category,
    ) -> impl Future<Output = Result<Vec<Vote>, StoreError>> + Send {
        let inner = Arc::clone(&self.inner);
        async move {
            let guard = inner.lock().await;
            let mut votes: Vec<Vote> = guard
                .votes
                .values()
                .filter(|v| v.round_number == round_number && v.category == category)
                .cloned()
                .collect();
            votes.sort_by_key(|v| v.id);
            Ok(votes)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use rondo_types::{Phase, VoteId};
    use rust_decimal::Decimal;

    use super::*;

    fn vote(voter: &str, round_number: u64, category: Category) -> Vote {
        Vote {
            id: VoteId::new(),
            voter_id: VoterId::from(voter),
            round_number,
            category,
            cast_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn active_round_is_found_among_history() {
        let repo = MemoryRepository::new();
        let mut completed = Round::open(1, Decimal::ZERO, Utc::now());
        completed.phase = Phase::Completed;
        let active = Round::open(2, Decimal::ZERO, Utc::now());

        repo.save_round(&completed).await.unwrap();
        repo.save_round(&active).await.unwrap();

        let found = repo.load_active_round().await.unwrap().unwrap();
        assert_eq!(found.number, 2);
    }

    #[tokio::test]
    async fn no_active_round_when_all_completed() {
        let repo = MemoryRepository::new();
        let mut completed = Round::open(1, Decimal::ZERO, Utc::now());
        completed.phase = Phase::Completed;
        repo.save_round(&completed).await.unwrap();

        assert!(repo.load_active_round().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_vote_insert_is_rejected() {
        let repo = MemoryRepository::new();
        repo.append_vote(&vote("x", 1, Category::Red)).await.unwrap();

        let err = repo
            .append_vote(&vote("x", 1, Category::Black))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateVote { .. }));
        assert_eq!(repo.vote_count().await, 1);
    }

    #[tokio::test]
    async fn same_voter_may_vote_in_different_rounds() {
        let repo = MemoryRepository::new();
        repo.append_vote(&vote("x", 1, Category::Red)).await.unwrap();
        repo.append_vote(&vote("x", 2, Category::Red)).await.unwrap();
        assert_eq!(repo.vote_count().await, 2);
    }

    #[tokio::test]
    async fn find_votes_filters_by_round_and_category() {
        let repo = MemoryRepository::new();
        repo.append_vote(&vote("a", 1, Category::Red)).await.unwrap();
        repo.append_vote(&vote("b", 1, Category::Black))
            .await
            .unwrap();
        repo.append_vote(&vote("c", 1, Category::Red)).await.unwrap();
        repo.append_vote(&vote("d", 2, Category::Red)).await.unwrap();

        let red = repo.find_votes_by_category(1, Category::Red).await.unwrap();
        let voters: Vec<&str> = red.iter().map(|v| v.voter_id.as_str()).collect();
        assert_eq!(voters, vec!["a", "c"]);

        let black = repo
            .find_votes_by_category(1, Category::Black)
            .await
            .unwrap();
        assert_eq!(black.len(), 1);
    }

    #[tokio::test]
    async fn game_state_round_trips() {
        let repo = MemoryRepository::new();
        assert!(repo.load_game_state().await.unwrap().is_none());

        let mut state = GameState::new();
        state.total_rounds_completed = 3;
        repo.save_game_state(&state).await.unwrap();

        let loaded = repo.load_game_state().await.unwrap().unwrap();
        assert_eq!(loaded.total_rounds_completed, 3);
    }
}
