//! Shared type definitions for the Rondo round lifecycle engine.
//!
//! This crate is the single source of truth for all types used across the
//! Rondo workspace. Types defined here flow downstream to `TypeScript` via
//! `ts-rs` for the client dashboard.
//!
//! # Modules
//!
//! - [`ids`] -- Identifier types for voters and votes
//! - [`enums`] -- Categories and round phases
//! - [`structs`] -- Rounds, votes, game aggregates, and snapshot projections

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{Category, CategoryParseError, Phase};
pub use ids::{VoteId, VoterId};
pub use structs::{
    ConfigView, GameSnapshot, GameState, Round, RoundView, Tally, Vote, VoteReceipt,
};

#[cfg(test)]
mod tests {
    //! Integration tests for type exports and `TypeScript` binding generation.

    #[test]
    fn export_bindings() {
        // ts-rs generates TypeScript bindings when types with
        // #[ts(export)] are used. Importing them here triggers generation.
        // The actual files are written to the `bindings/` directory
        // relative to the crate root.
        use ts_rs::TS;

        let _ = crate::ids::VoterId::export_all();
        let _ = crate::ids::VoteId::export_all();

        let _ = crate::enums::Category::export_all();
        let _ = crate::enums::Phase::export_all();

        let _ = crate::structs::Tally::export_all();
        let _ = crate::structs::Round::export_all();
        let _ = crate::structs::Vote::export_all();
        let _ = crate::structs::GameState::export_all();
        let _ = crate::structs::RoundView::export_all();
        let _ = crate::structs::ConfigView::export_all();
        let _ = crate::structs::GameSnapshot::export_all();
        let _ = crate::structs::VoteReceipt::export_all();
    }
}
