//! Eligibility oracle seam.
//!
//! Whether a voter may participate is decided by an external collaborator
//! (in production a balance lookup against the wallet service). The check is
//! idempotent and safe to repeat, and it runs *before* a vote enters the
//! serialized command stream, so a slow oracle delays only that one voter's
//! own cast.

use rondo_types::VoterId;

/// Errors from the eligibility check.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OracleError {
    /// The oracle could not be reached or answered malformed.
    #[error("eligibility oracle unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },
}

/// External eligibility check consulted before vote admission.
pub trait EligibilityOracle: Send + Sync + 'static {
    /// Whether the voter may cast a vote.
    fn is_eligible(&self, voter: &VoterId)
    -> impl Future<Output = Result<bool, OracleError>> + Send;
}

/// An oracle that admits everyone. Used by the binary when no wallet
/// collaborator is wired in, and by tests that are not about eligibility.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenOracle;

impl OpenOracle {
    /// Create an always-eligible oracle.
    pub const fn new() -> Self {
        Self
    }
}

impl EligibilityOracle for OpenOracle {
    fn is_eligible(
        &self,
        _voter: &VoterId,
    ) -> impl Future<Output = Result<bool, OracleError>> + Send {
        async { Ok(true) }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_oracle_admits_everyone() {
        let oracle = OpenOracle::new();
        assert!(oracle.is_eligible(&VoterId::from("anyone")).await.unwrap());
    }
}
