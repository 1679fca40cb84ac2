use crate::attribution::FailureAttribution;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DealError {
    #[error("invalid profile: {0}")]
    ProfileStructural(String),

    #[error("infeasible profile: {0}")]
    ProfileInfeasible(String),

    #[error("sub-profile selection failed cross-seat feasibility after {retries} retries")]
    SelectionExhausted { retries: u32 },

    #[error("failed to generate board {board} after {} attempts", attribution.total_attempts)]
    BoardExhausted {
        board: u32,
        attribution: Box<FailureAttribution>,
    },

    #[error("internal invariant breached: {0}")]
    Internal(String),
}
