//! Per-board deal construction: the attempt loop with phased pre-allocation,
//! per-seat matching in dealing order, adaptive re-rolls, and failure
//! attribution.

use rand::Rng;
use std::collections::BTreeMap;
use tracing::{debug, trace};

use crate::attribution::{AttemptFailure, BuilderHooks, FailureAttribution};
use crate::config::BuilderConfig;
use crate::constants::{create_deck, partner_seat, seat_index};
use crate::error::DealError;
use crate::matcher::{match_hand, MatchContext, MatchFailure};
use crate::planner::plan_dealing_order;
use crate::prealloc::{
    deal_with_help, opponent_rs_of, preselect_rs_suits, AttemptReject, RsSelections,
};
use crate::profile::HandProfile;
use crate::selector::{select_subprofiles, Selection};
use crate::types::{Card, Hand, Seat};
use crate::validator::FeasibilityReport;

pub(crate) fn fisher_yates_shuffle<R: Rng>(cards: &mut [Card], rng: &mut R) {
    for i in (1..cards.len()).rev() {
        let j = rng.gen_range(0..=i);
        cards.swap(i, j);
    }
}

/// Outcome of one attempt before attribution bookkeeping.
enum AttemptOutcome {
    Success(BTreeMap<Seat, Hand>),
    Failure(AttemptFailure),
}

fn run_attempt<R: Rng>(
    profile: &HandProfile,
    selection: &Selection,
    order: &[Seat; 4],
    rs_state: &Result<RsSelections, Seat>,
    cfg: &BuilderConfig,
    attempt: u32,
    rng: &mut R,
) -> AttemptOutcome {
    let choices = match rs_state {
        // The residual allowed set was too small: the attempt fails on the
        // blocked seat until a re-roll changes the picture.
        Err(blocked) => {
            return AttemptOutcome::Failure(AttemptFailure {
                attempt,
                seat: *blocked,
                kind: MatchFailure::Shape,
                passed: vec![],
            })
        }
        Ok(choices) => choices,
    };

    let mut deck = create_deck();
    fisher_yates_shuffle(&mut deck, rng);

    let hands = match deal_with_help(profile, selection, order, choices, cfg, &deck, rng) {
        Ok(hands) => hands,
        Err(AttemptReject::HcpGate(seat)) => {
            return AttemptOutcome::Failure(AttemptFailure {
                attempt,
                seat,
                kind: MatchFailure::Hcp,
                passed: vec![],
            })
        }
        Err(AttemptReject::Fill(seat)) => {
            return AttemptOutcome::Failure(AttemptFailure {
                attempt,
                seat,
                kind: MatchFailure::Shape,
                passed: vec![],
            })
        }
    };

    let mut passed: Vec<Seat> = Vec::with_capacity(4);
    for &seat in order {
        let sub = profile.subprofile(seat, selection.index_for(seat));
        let exclusions = &profile.seat_profiles[&seat].exclusion_clauses;
        let ctx = MatchContext {
            own_rs: choices[seat_index(seat)].as_ref(),
            partner_rs: choices[seat_index(partner_seat(seat))].as_ref(),
            opponent_rs: opponent_rs_of(seat, choices),
        };
        match match_hand(&hands[&seat], sub, exclusions, &ctx) {
            Ok(_) => passed.push(seat),
            Err(kind) => {
                return AttemptOutcome::Failure(AttemptFailure { attempt, seat, kind, passed })
            }
        }
    }
    AttemptOutcome::Success(hands)
}

/// Build one board. Returns the hands plus the attempts consumed. On
/// exhaustion the final attribution snapshot rides the error.
pub(crate) fn build_board<R: Rng>(
    profile: &HandProfile,
    report: &FeasibilityReport,
    cfg: &BuilderConfig,
    hooks: &BuilderHooks,
    rng: &mut R,
    board_number: u32,
) -> Result<(BTreeMap<Seat, Hand>, u32), DealError> {
    let mut selection = select_subprofiles(profile, report, cfg, rng)?;
    let mut order = plan_dealing_order(profile, &selection, profile.dealer);
    let mut rs_state = preselect_rs_suits(profile, &selection, &order, rng);

    let mut attribution = FailureAttribution::default();
    let mut interval_sub = cfg.sub_reroll_initial.max(1);
    let mut interval_rs = (interval_sub as f64 * cfg.rs_reroll_ratio).round() as u32;
    let mut since_sub_reroll = 0u32;
    let mut since_rs_reroll = 0u32;

    for attempt in 1..=cfg.max_board_attempts {
        attribution.total_attempts += 1;
        match run_attempt(profile, &selection, &order, &rs_state, cfg, attempt, rng) {
            AttemptOutcome::Success(hands) => {
                trace!(board_number, attempt, "board matched");
                return Ok((hands, attempt));
            }
            AttemptOutcome::Failure(failure) => {
                attribution.record(&failure);
                hooks.fire_attempt(&failure);
            }
        }

        since_sub_reroll += 1;
        since_rs_reroll += 1;
        if since_sub_reroll >= interval_sub {
            interval_sub = cfg
                .sub_reroll_min
                .max((interval_sub as f64 * cfg.sub_reroll_decay).round() as u32)
                .max(1);
            interval_rs = (interval_sub as f64 * cfg.rs_reroll_ratio).round() as u32;
            debug!(board_number, attempt, interval_sub, "re-rolling sub-profiles");
            // A selection failure here keeps the previous picks; the next
            // boundary tries again.
            if let Ok(fresh) = select_subprofiles(profile, report, cfg, rng) {
                selection = fresh;
                order = plan_dealing_order(profile, &selection, profile.dealer);
            }
            rs_state = preselect_rs_suits(profile, &selection, &order, rng);
            since_sub_reroll = 0;
            since_rs_reroll = 0;
        } else if since_rs_reroll >= interval_rs {
            rs_state = preselect_rs_suits(profile, &selection, &order, rng);
            since_rs_reroll = 0;
        }
    }

    hooks.fire_exhausted(&attribution);
    Err(DealError::BoardExhausted {
        board: board_number,
        attribution: Box::new(attribution),
    })
}
