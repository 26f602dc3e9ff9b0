//! Outcome selection: the winning category and the winning voter.
//!
//! The [`OutcomeSelector`] trait abstracts the randomness source so the
//! controller can be exercised deterministically in tests. The production
//! implementation is [`RandomSelector`].
//!
//! Two rules are deliberate and must not be "improved":
//!
//! - The category draw is uniform (0.5/0.5) and independent of the tally.
//!   Votes decide who is eligible to win, never which category wins.
//! - The winner draw is uniform over the voters of the chosen category at
//!   call time; a voter from the losing category can never win.

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use rondo_types::{Category, VoterId};
use tracing::debug;

/// A source of category and winner choices.
///
/// [`choose_category`] is called exactly once per round, at the
/// Voting -> Revealing transition. [`choose_winner`] is called exactly once
/// per round, at the Revealing -> Completed transition.
///
/// [`choose_category`]: OutcomeSelector::choose_category
/// [`choose_winner`]: OutcomeSelector::choose_winner
pub trait OutcomeSelector {
    /// Draw the winning category, uniformly between the two options.
    fn choose_category(&mut self) -> Category;

    /// Draw one winner uniformly from the eligible voters, or `None` if
    /// nobody voted for the chosen category.
    fn choose_winner(&mut self, eligible: &[VoterId]) -> Option<VoterId>;
}

/// Production selector backed by a [`StdRng`].
///
/// A configured seed makes a run reproducible; without one the generator
/// is seeded from OS entropy.
#[derive(Debug)]
pub struct RandomSelector {
    rng: StdRng,
}

impl RandomSelector {
    /// Create a selector, seeded when `seed` is present.
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            rng: seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64),
        }
    }
}

impl OutcomeSelector for RandomSelector {
    fn choose_category(&mut self) -> Category {
        let category = if self.rng.random_bool(0.5) {
            Category::Red
        } else {
            Category::Black
        };
        debug!(%category, "category drawn");
        category
    }

    fn choose_winner(&mut self, eligible: &[VoterId]) -> Option<VoterId> {
        let winner = eligible.choose(&mut self.rng).cloned();
        debug!(
            eligible = eligible.len(),
            winner = winner.as_ref().map(VoterId::as_str),
            "winner drawn"
        );
        winner
    }
}

/// A scripted selector for tests: always picks the configured category and
/// the first eligible voter.
#[derive(Debug, Clone, Copy)]
pub struct StubSelector {
    /// The category every draw returns.
    pub category: Category,
}

impl StubSelector {
    /// Create a stub that always chooses `category`.
    pub const fn new(category: Category) -> Self {
        Self { category }
    }
}

impl OutcomeSelector for StubSelector {
    fn choose_category(&mut self) -> Category {
        self.category
    }

    fn choose_winner(&mut self, eligible: &[VoterId]) -> Option<VoterId> {
        eligible.first().cloned()
    }
}
