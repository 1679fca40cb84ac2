pub mod attribution;
pub mod builder;
pub mod config;
pub mod constants;
pub mod deal_generator;
pub mod error;
pub mod hand_evaluator;
pub mod matcher;
pub mod planner;
pub mod prealloc;
pub mod profile;
pub mod selector;
pub mod types;
pub mod validator;

// Re-export commonly used items
pub use attribution::{AttemptFailure, BuilderHooks, FailureAttribution};
pub use config::BuilderConfig;
pub use constants::{create_deck, next_seat, partner_seat};
pub use deal_generator::{generate_deals, generate_deals_with};
pub use error::DealError;
pub use hand_evaluator::{calculate_hcp, evaluate_hand, suit_counts};
pub use matcher::{match_hand, MatchContext, MatchFailure};
pub use profile::{
    ContingentSource, ContingentSuitConstraint, HandProfile, RandomSuitConstraint, RoleMode,
    RoleUsage, RsChoice, SeatProfile, ShapePattern, SpecialConstraint, StandardConstraints,
    SubProfile, SuitRange,
};
pub use types::{Card, Deal, DealSet, Hand, PairSide, Rank, Seat, Suit, Vulnerability};
pub use validator::{validate_profile, validate_profile_feasibility, FeasibilityReport};
