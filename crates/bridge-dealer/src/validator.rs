//! Profile validation: structural invariants, coupling feasibility, and
//! cross-seat feasibility with dead sub-profile detection.

use tracing::warn;

use crate::constants::{seat_index, HAND_HCP_MAX, SEATS, SUIT_HCP_MAX, SUIT_ORDER};
use crate::error::DealError;
use crate::profile::{
    HandProfile, RoleMode, RoleUsage, SpecialConstraint, SubProfile, SuitRange,
};
use crate::types::{PairSide, Seat};

/// Outcome of the full feasibility analysis. Dead sub-profiles are excluded
/// from runtime selection; each one carries a warning.
#[derive(Debug, Clone)]
pub struct FeasibilityReport {
    alive: [Vec<bool>; 4],
    pub warnings: Vec<String>,
}

impl FeasibilityReport {
    pub fn is_dead(&self, seat: Seat, idx: usize) -> bool {
        !self.alive[seat_index(seat)][idx]
    }

    pub fn live_indices(&self, seat: Seat) -> Vec<usize> {
        self.alive[seat_index(seat)]
            .iter()
            .enumerate()
            .filter_map(|(i, &a)| a.then_some(i))
            .collect()
    }

    pub fn dead_count(&self) -> usize {
        self.alive.iter().flatten().filter(|a| !**a).count()
    }
}

/// Structural pass only.
pub fn validate_profile(profile: &HandProfile) -> Result<(), DealError> {
    structural(profile)
}

/// All three passes. Dead sub-profiles emit warnings; a seat with every
/// sub-profile dead fails with `ProfileInfeasible`.
pub fn validate_profile_feasibility(profile: &HandProfile) -> Result<FeasibilityReport, DealError> {
    structural(profile)?;
    let ns_pairs = admissible_side_pairs(profile, PairSide::Ns);
    let ew_pairs = admissible_side_pairs(profile, PairSide::Ew);
    if ns_pairs.is_empty() {
        return Err(DealError::ProfileInfeasible(
            "no admissible N/S sub-profile pairing under the role mode".into(),
        ));
    }
    if ew_pairs.is_empty() {
        return Err(DealError::ProfileInfeasible(
            "no admissible E/W sub-profile pairing under the role mode".into(),
        ));
    }
    cross_seat(profile, &ns_pairs, &ew_pairs)
}

fn err(msg: String) -> DealError {
    DealError::ProfileStructural(msg)
}

fn check_range(range: &SuitRange, what: &str) -> Result<(), DealError> {
    if range.min_cards > range.max_cards || range.max_cards > 13 {
        return Err(err(format!(
            "{what}: card range {}..{} is invalid",
            range.min_cards, range.max_cards
        )));
    }
    if range.min_hcp > range.max_hcp || range.max_hcp > SUIT_HCP_MAX {
        return Err(err(format!(
            "{what}: hcp range {}..{} is invalid",
            range.min_hcp, range.max_hcp
        )));
    }
    Ok(())
}

fn check_subprofile(sub: &SubProfile, what: &str) -> Result<(), DealError> {
    let std = &sub.standard;
    let mut min_cards = 0u32;
    let mut max_cards = 0u32;
    let mut min_hcp = 0u32;
    let mut max_hcp = 0u32;
    for (i, suit) in SUIT_ORDER.iter().enumerate() {
        let range = std.by_index(i);
        check_range(range, &format!("{what} suit {suit}"))?;
        min_cards += range.min_cards as u32;
        max_cards += range.max_cards as u32;
        min_hcp += range.min_hcp as u32;
        max_hcp += range.max_hcp as u32;
    }
    if min_cards > 13 {
        return Err(err(format!("{what}: suit minimums sum to {min_cards} > 13")));
    }
    if max_cards < 13 {
        return Err(err(format!("{what}: suit maximums sum to {max_cards} < 13")));
    }
    if std.total_hcp_min > std.total_hcp_max || std.total_hcp_max > HAND_HCP_MAX {
        return Err(err(format!(
            "{what}: total hcp range {}..{} is invalid",
            std.total_hcp_min, std.total_hcp_max
        )));
    }
    if min_hcp > std.total_hcp_max as u32 {
        return Err(err(format!(
            "{what}: suit hcp minimums sum to {min_hcp} > total_hcp_max {}",
            std.total_hcp_max
        )));
    }
    if max_hcp < std.total_hcp_min as u32 {
        return Err(err(format!(
            "{what}: suit hcp maximums sum to {max_hcp} < total_hcp_min {}",
            std.total_hcp_min
        )));
    }

    if !sub.weight_percent.is_finite() || sub.weight_percent < 0.0 {
        return Err(err(format!(
            "{what}: weight {} must be finite and >= 0",
            sub.weight_percent
        )));
    }
    if sub.special_count() > 1 {
        return Err(err(format!(
            "{what}: at most one of RS/PC/OC constraints may be present"
        )));
    }

    match sub.special() {
        Some(SpecialConstraint::RandomSuit(rs)) => {
            if rs.allowed_suits.is_empty() {
                return Err(err(format!("{what}: RS allowed_suits is empty")));
            }
            let mut seen = rs.allowed_suits.clone();
            seen.sort();
            seen.dedup();
            if seen.len() != rs.allowed_suits.len() {
                return Err(err(format!("{what}: RS allowed_suits has duplicates")));
            }
            if rs.required_suits_count == 0
                || rs.required_suits_count as usize > rs.allowed_suits.len()
            {
                return Err(err(format!(
                    "{what}: RS required_suits_count {} outside 1..={}",
                    rs.required_suits_count,
                    rs.allowed_suits.len()
                )));
            }
            check_range(&rs.per_suit_range, &format!("{what} RS per_suit_range"))?;
            for (suit, range) in &rs.pair_overrides {
                if !rs.allowed_suits.contains(suit) {
                    return Err(err(format!(
                        "{what}: RS pair override for {suit} outside allowed_suits"
                    )));
                }
                check_range(range, &format!("{what} RS override {suit}"))?;
            }
        }
        Some(SpecialConstraint::PartnerContingent(pc)) => {
            if pc.target_source != crate::profile::ContingentSource::Partner {
                return Err(err(format!(
                    "{what}: partner_contingent_constraint must target the partner"
                )));
            }
            check_range(&pc.suit_range, &format!("{what} PC suit_range"))?;
        }
        Some(SpecialConstraint::OpponentContingent(oc)) => {
            if oc.target_source != crate::profile::ContingentSource::Opponents {
                return Err(err(format!(
                    "{what}: opponents_contingent_suit_constraint must target the opponents"
                )));
            }
            check_range(&oc.suit_range, &format!("{what} OC suit_range"))?;
        }
        None => {}
    }
    Ok(())
}

fn check_side(profile: &HandProfile, side: PairSide) -> Result<(), DealError> {
    let mode = profile.role_mode(side);
    let label = match side {
        PairSide::Ns => "N/S",
        PairSide::Ew => "E/W",
    };
    if !mode.applies_to(side) {
        return Err(err(format!("{label} role mode {mode:?} names the wrong pair")));
    }
    let [a, b] = side.seats();
    let count_a = profile.seat_profiles[&a].subprofiles.len();
    let count_b = profile.seat_profiles[&b].subprofiles.len();
    match profile.bespoke_map(side) {
        Some(map) => {
            if mode == RoleMode::NoDriverNoIndex {
                return Err(err(format!(
                    "{label} bespoke map is incompatible with no_driver_no_index"
                )));
            }
            let Some(driver) = mode.fixed_driver() else {
                return Err(err(format!(
                    "{label} bespoke map requires a fixed driver seat"
                )));
            };
            let (driver_count, follower_count) = if driver == a {
                (count_a, count_b)
            } else {
                (count_b, count_a)
            };
            for di in 0..driver_count {
                match map.get(&di) {
                    None => {
                        return Err(err(format!(
                            "{label} bespoke map has no image for driver index {di}"
                        )))
                    }
                    Some(&fi) if fi >= follower_count => {
                        return Err(err(format!(
                            "{label} bespoke map image {fi} outside follower range"
                        )))
                    }
                    Some(_) => {}
                }
            }
            if let Some(extra) = map.keys().find(|k| **k >= driver_count) {
                return Err(err(format!(
                    "{label} bespoke map key {extra} outside driver range"
                )));
            }
        }
        None => {
            if mode.is_coupled() && count_a != count_b {
                return Err(err(format!(
                    "{label} coupled mode without a bespoke map requires equal \
                     sub-profile counts ({count_a} vs {count_b})"
                )));
            }
        }
    }
    Ok(())
}

fn structural(profile: &HandProfile) -> Result<(), DealError> {
    for seat in SEATS {
        let seat_profile = profile
            .seat_profile(seat)
            .ok_or_else(|| err(format!("seat {seat} has no profile")))?;
        if seat_profile.subprofiles.is_empty() {
            return Err(err(format!("seat {seat} has no sub-profiles")));
        }
        for (i, sub) in seat_profile.subprofiles.iter().enumerate() {
            check_subprofile(sub, &format!("seat {seat} sub-profile {i}"))?;
        }
    }
    check_side(profile, PairSide::Ns)?;
    check_side(profile, PairSide::Ew)?;
    Ok(())
}

/// Admissible (first-seat index, second-seat index) pairs for a coupled
/// side, oriented to `side.seats()` order. With `no_driver_no_index` every
/// combination is admissible and role usage applies no filter.
pub(crate) fn admissible_side_pairs(profile: &HandProfile, side: PairSide) -> Vec<(usize, usize)> {
    let [a, b] = side.seats();
    let count_a = profile.seat_profiles[&a].subprofiles.len();
    let count_b = profile.seat_profiles[&b].subprofiles.len();
    let mode = profile.role_mode(side);

    if !mode.is_coupled() {
        let mut pairs = Vec::with_capacity(count_a * count_b);
        for ia in 0..count_a {
            for ib in 0..count_b {
                pairs.push((ia, ib));
            }
        }
        return pairs;
    }

    let drivers: Vec<Seat> = match mode.fixed_driver() {
        Some(d) => vec![d],
        None => side.seats().to_vec(),
    };
    let mut pairs = Vec::new();
    for driver in drivers {
        let follower = crate::constants::partner_seat(driver);
        let dsubs = &profile.seat_profiles[&driver].subprofiles;
        let fsubs = &profile.seat_profiles[&follower].subprofiles;
        for (di, dsub) in dsubs.iter().enumerate() {
            if dsub.role_usage(side) == RoleUsage::FollowerOnly {
                continue;
            }
            let fi = match profile.bespoke_map(side) {
                Some(map) => match map.get(&di) {
                    Some(&fi) => fi,
                    None => continue,
                },
                None => di,
            };
            if fi >= fsubs.len() || fsubs[fi].role_usage(side) == RoleUsage::DriverOnly {
                continue;
            }
            let pair = if driver == a { (di, fi) } else { (fi, di) };
            if !pairs.contains(&pair) {
                pairs.push(pair);
            }
        }
    }
    pairs
}

/// Cross-seat feasibility of one sub-profile 4-tuple, indexed by seat
/// (N, E, S, W). RS seats are widened to the union of standard and RS
/// bounds on allowed suits, since the choice is per-board.
pub(crate) fn tuple_is_feasible(profile: &HandProfile, idxs: &[usize; 4]) -> bool {
    let subs: Vec<&SubProfile> = SEATS
        .iter()
        .map(|&seat| profile.subprofile(seat, idxs[seat_index(seat)]))
        .collect();

    let min_total: u32 = subs.iter().map(|s| s.standard.total_hcp_min as u32).sum();
    let max_total: u32 = subs.iter().map(|s| s.standard.total_hcp_max as u32).sum();
    if min_total > 40 || max_total < 40 {
        return false;
    }

    for (suit_idx, &suit) in SUIT_ORDER.iter().enumerate() {
        let mut min_sum = 0u32;
        let mut max_sum = 0u32;
        for sub in &subs {
            let std = sub.standard.by_index(suit_idx);
            let mut min = std.min_cards;
            let mut max = std.max_cards;
            if let Some(SpecialConstraint::RandomSuit(rs)) = sub.special() {
                if rs.allowed_suits.contains(&suit) {
                    let range = rs.range_for(suit);
                    min = min.min(range.min_cards);
                    max = max.max(range.max_cards);
                }
            }
            min_sum += min as u32;
            max_sum += max as u32;
        }
        if min_sum > 13 || max_sum < 13 {
            return false;
        }
    }
    true
}

fn cross_seat(
    profile: &HandProfile,
    ns_pairs: &[(usize, usize)],
    ew_pairs: &[(usize, usize)],
) -> Result<FeasibilityReport, DealError> {
    let mut alive: [Vec<bool>; 4] = SEATS.map(|seat| {
        vec![false; profile.seat_profiles[&seat].subprofiles.len()]
    });
    let mut any = false;
    for &(ni, si) in ns_pairs {
        for &(ei, wi) in ew_pairs {
            if tuple_is_feasible(profile, &[ni, ei, si, wi]) {
                alive[0][ni] = true;
                alive[1][ei] = true;
                alive[2][si] = true;
                alive[3][wi] = true;
                any = true;
            }
        }
    }
    if !any {
        return Err(DealError::ProfileInfeasible(
            "no sub-profile combination is feasible across the four seats".into(),
        ));
    }

    let mut warnings = Vec::new();
    for seat in SEATS {
        for (i, live) in alive[seat_index(seat)].iter().enumerate() {
            if !live {
                let name = profile
                    .subprofile(seat, i)
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("#{i}"));
                let msg = format!(
                    "seat {seat} sub-profile {name} is dead: it joins no feasible combination"
                );
                warn!("{msg}");
                warnings.push(msg);
            }
        }
    }
    Ok(FeasibilityReport { alive, warnings })
}
