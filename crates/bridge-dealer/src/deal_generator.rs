//! Public entry point: validate once, then generate boards with board-level
//! retries and an adaptive entropy re-seed on slow boards.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::warn;

use crate::attribution::BuilderHooks;
use crate::builder::build_board;
use crate::config::BuilderConfig;
use crate::constants::next_seat;
use crate::error::DealError;
use crate::profile::HandProfile;
use crate::types::{Deal, DealSet, Vulnerability};
use crate::validator::validate_profile_feasibility;

/// Generate `n` boards satisfying `profile` with default configuration.
///
/// Deterministic for a fixed (seed, profile, n, rotate) until the wall-clock
/// re-seed threshold trips; disable re-seeding via `generate_deals_with` for
/// full reproducibility.
pub fn generate_deals(
    seed: u64,
    profile: &HandProfile,
    n: u32,
    rotate: bool,
) -> Result<DealSet, DealError> {
    generate_deals_with(
        seed,
        profile,
        n,
        rotate,
        &BuilderConfig::default(),
        &BuilderHooks::default(),
    )
}

/// As `generate_deals`, with explicit configuration and debug hooks.
pub fn generate_deals_with(
    seed: u64,
    profile: &HandProfile,
    n: u32,
    rotate: bool,
    cfg: &BuilderConfig,
    hooks: &BuilderHooks,
) -> Result<DealSet, DealError> {
    let report = validate_profile_feasibility(profile)?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut deals = Vec::with_capacity(n as usize);
    let mut reseed_count = 0u32;

    for board_number in 1..=n {
        let start = Instant::now();
        let mut reseeded_this_board = false;
        let mut attempts_spent = 0u32;
        let mut outcome = None;
        let mut last_err = None;

        for retry in 0..cfg.max_board_retries {
            match build_board(profile, &report, cfg, hooks, &mut rng, board_number) {
                Ok((hands, attempts)) => {
                    attempts_spent += attempts;
                    outcome = Some((hands, retry));
                }
                Err(
                    err @ (DealError::BoardExhausted { .. } | DealError::SelectionExhausted { .. }),
                ) => {
                    if let DealError::BoardExhausted { attribution, .. } = &err {
                        attempts_spent += attribution.total_attempts as u32;
                    }
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
            if cfg.reseed_enabled
                && !reseeded_this_board
                && start.elapsed() > cfg.reseed_threshold
            {
                warn!(board_number, "slow board: re-seeding RNG from entropy");
                rng = ChaCha8Rng::from_entropy();
                reseed_count += 1;
                reseeded_this_board = true;
            }
            if outcome.is_some() {
                break;
            }
        }

        let Some((mut hands, retries)) = outcome else {
            return Err(last_err.unwrap_or_else(|| {
                DealError::Internal("board retry loop produced no outcome".into())
            }));
        };
        for hand in hands.values_mut() {
            hand.sort();
        }
        deals.push(Deal {
            board_number,
            dealer: profile.dealer,
            vulnerability: Vulnerability::None,
            hands,
            elapsed: start.elapsed(),
            attempts: attempts_spent,
            retries,
        });
    }

    apply_vulnerability_and_rotation(&mut deals, rotate);
    Ok(DealSet { deals, reseed_count })
}

/// Set vulnerability from the standard 16-board cycle and, when `rotate` is
/// on, advance seat assignments clockwise per board to balance dealer
/// frequency.
fn apply_vulnerability_and_rotation(deals: &mut [Deal], rotate: bool) {
    for deal in deals.iter_mut() {
        deal.vulnerability = Vulnerability::from_board_number(deal.board_number);
        if !rotate {
            continue;
        }
        let steps = ((deal.board_number - 1) % 4) as usize;
        if steps == 0 {
            continue;
        }
        let mut rotated = BTreeMap::new();
        for (seat, hand) in std::mem::take(&mut deal.hands) {
            let mut target = seat;
            for _ in 0..steps {
                target = next_seat(target);
            }
            rotated.insert(target, hand);
        }
        deal.hands = rotated;
        for _ in 0..steps {
            deal.dealer = next_seat(deal.dealer);
        }
    }
}
