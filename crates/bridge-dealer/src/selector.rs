//! Per-board weighted sub-profile selection with role filtering, bespoke
//! index maps, and cross-seat feasibility retry.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::config::BuilderConfig;
use crate::constants::{partner_seat, seat_index};
use crate::error::DealError;
use crate::profile::{HandProfile, RoleUsage};
use crate::types::{PairSide, Seat};
use crate::validator::{tuple_is_feasible, FeasibilityReport};

/// One board's sub-profile choice: an index per seat (N, E, S, W) plus the
/// driver seats picked for random-driver sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub indices: [usize; 4],
    pub ns_driver: Option<Seat>,
    pub ew_driver: Option<Seat>,
}

impl Selection {
    pub fn index_for(&self, seat: Seat) -> usize {
        self.indices[seat_index(seat)]
    }
}

/// Weighted pick over `weights`; a zero or degenerate total falls back to
/// uniform.
fn weighted_pick<R: Rng>(rng: &mut R, weights: &[f64]) -> usize {
    match WeightedIndex::new(weights) {
        Ok(dist) => dist.sample(rng),
        Err(_) => rng.gen_range(0..weights.len()),
    }
}

/// Pick indices for one side. Returns (first-seat index, second-seat index,
/// driver) in `side.seats()` order, or None when no eligible choice exists.
fn pick_side<R: Rng>(
    profile: &HandProfile,
    report: &FeasibilityReport,
    side: PairSide,
    rng: &mut R,
) -> Option<(usize, usize, Option<Seat>)> {
    let [a, b] = side.seats();
    let mode = profile.role_mode(side);

    if !mode.is_coupled() {
        let ia = pick_independent(profile, report, a, rng)?;
        let ib = pick_independent(profile, report, b, rng)?;
        return Some((ia, ib, None));
    }

    let driver = match mode.fixed_driver() {
        Some(d) => d,
        None => side.seats()[rng.gen_range(0..2)],
    };
    let follower = partner_seat(driver);
    let dsubs = &profile.seat_profiles[&driver].subprofiles;
    let fsubs = &profile.seat_profiles[&follower].subprofiles;

    let mut candidates: Vec<(usize, usize)> = Vec::new();
    let mut weights: Vec<f64> = Vec::new();
    for (di, dsub) in dsubs.iter().enumerate() {
        if report.is_dead(driver, di) || dsub.role_usage(side) == RoleUsage::FollowerOnly {
            continue;
        }
        let fi = match profile.bespoke_map(side) {
            Some(map) => match map.get(&di) {
                Some(&fi) => fi,
                None => continue,
            },
            None => di,
        };
        if fi >= fsubs.len()
            || report.is_dead(follower, fi)
            || fsubs[fi].role_usage(side) == RoleUsage::DriverOnly
        {
            continue;
        }
        candidates.push((di, fi));
        weights.push(dsub.weight_percent);
    }
    if candidates.is_empty() {
        return None;
    }
    let (di, fi) = candidates[weighted_pick(rng, &weights)];
    let pair = if driver == a { (di, fi) } else { (fi, di) };
    Some((pair.0, pair.1, Some(driver)))
}

fn pick_independent<R: Rng>(
    profile: &HandProfile,
    report: &FeasibilityReport,
    seat: Seat,
    rng: &mut R,
) -> Option<usize> {
    let live = report.live_indices(seat);
    if live.is_empty() {
        return None;
    }
    let weights: Vec<f64> = live
        .iter()
        .map(|&i| profile.subprofile(seat, i).weight_percent)
        .collect();
    Some(live[weighted_pick(rng, &weights)])
}

/// Pick a sub-profile per seat, resampling until the 4-tuple passes
/// cross-seat feasibility or the retry budget runs out.
pub fn select_subprofiles<R: Rng>(
    profile: &HandProfile,
    report: &FeasibilityReport,
    cfg: &BuilderConfig,
    rng: &mut R,
) -> Result<Selection, DealError> {
    for _ in 0..cfg.max_selection_retries {
        let Some((ni, si, ns_driver)) = pick_side(profile, report, PairSide::Ns, rng) else {
            continue;
        };
        let Some((ei, wi, ew_driver)) = pick_side(profile, report, PairSide::Ew, rng) else {
            continue;
        };
        let indices = [ni, ei, si, wi];
        if tuple_is_feasible(profile, &indices) {
            return Ok(Selection { indices, ns_driver, ew_driver });
        }
    }
    Err(DealError::SelectionExhausted { retries: cfg.max_selection_retries })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{RoleMode, SeatProfile, StandardConstraints, SubProfile};
    use crate::validator::validate_profile_feasibility;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::BTreeMap;

    fn profile_of(subs: [Vec<SubProfile>; 4]) -> HandProfile {
        let [n, e, s, w] = subs;
        let mut seat_profiles = BTreeMap::new();
        for (seat, subprofiles) in [
            (Seat::North, n),
            (Seat::East, e),
            (Seat::South, s),
            (Seat::West, w),
        ] {
            seat_profiles.insert(seat, SeatProfile { subprofiles, exclusion_clauses: vec![] });
        }
        HandProfile {
            name: "test".into(),
            version: None,
            author: None,
            description: None,
            sort_order: None,
            dealer: Seat::North,
            ns_role_mode: RoleMode::NoDriverNoIndex,
            ew_role_mode: RoleMode::NoDriverNoIndex,
            ns_bespoke_map: None,
            ew_bespoke_map: None,
            seat_profiles,
        }
    }

    fn weighted_sub(weight: f64) -> SubProfile {
        SubProfile { weight_percent: weight, ..SubProfile::default() }
    }

    #[test]
    fn selects_feasible_tuple() {
        let p = profile_of([
            vec![weighted_sub(1.0), weighted_sub(3.0)],
            vec![weighted_sub(1.0)],
            vec![weighted_sub(1.0)],
            vec![weighted_sub(1.0)],
        ]);
        let report = validate_profile_feasibility(&p).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let sel = select_subprofiles(&p, &report, &BuilderConfig::default(), &mut rng).unwrap();
        assert!(sel.index_for(Seat::North) < 2);
        assert_eq!(sel.index_for(Seat::East), 0);
        assert_eq!(sel.ns_driver, None);
    }

    #[test]
    fn zero_weights_fall_back_to_uniform() {
        let p = profile_of([
            vec![weighted_sub(0.0), weighted_sub(0.0)],
            vec![weighted_sub(0.0)],
            vec![weighted_sub(0.0)],
            vec![weighted_sub(0.0)],
        ]);
        let report = validate_profile_feasibility(&p).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut seen = [false, false];
        for _ in 0..64 {
            let sel = select_subprofiles(&p, &report, &BuilderConfig::default(), &mut rng).unwrap();
            seen[sel.index_for(Seat::North)] = true;
        }
        assert!(seen[0] && seen[1]);
    }

    #[test]
    fn dead_subs_are_never_selected() {
        // North sub 1 demands 25+ HCP while the rest demand 6+: dead.
        let dead = SubProfile {
            standard: StandardConstraints {
                total_hcp_min: 25,
                ..StandardConstraints::default()
            },
            ..SubProfile::default()
        };
        let floor = SubProfile {
            standard: StandardConstraints {
                total_hcp_min: 6,
                ..StandardConstraints::default()
            },
            ..SubProfile::default()
        };
        let p = profile_of([
            vec![weighted_sub(1.0), dead],
            vec![floor.clone()],
            vec![floor.clone()],
            vec![floor],
        ]);
        let report = validate_profile_feasibility(&p).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..32 {
            let sel = select_subprofiles(&p, &report, &BuilderConfig::default(), &mut rng).unwrap();
            assert_eq!(sel.index_for(Seat::North), 0);
        }
    }

    #[test]
    fn coupled_follower_mirrors_driver_index() {
        let mut p = profile_of([
            vec![weighted_sub(1.0), weighted_sub(1.0)],
            vec![weighted_sub(1.0)],
            vec![weighted_sub(1.0), weighted_sub(1.0)],
            vec![weighted_sub(1.0)],
        ]);
        p.ns_role_mode = RoleMode::NorthDrives;
        let report = validate_profile_feasibility(&p).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..16 {
            let sel = select_subprofiles(&p, &report, &BuilderConfig::default(), &mut rng).unwrap();
            assert_eq!(sel.index_for(Seat::North), sel.index_for(Seat::South));
            assert_eq!(sel.ns_driver, Some(Seat::North));
        }
    }

    #[test]
    fn bespoke_map_routes_follower_index() {
        let mut p = profile_of([
            vec![weighted_sub(1.0), weighted_sub(1.0)],
            vec![weighted_sub(1.0)],
            vec![weighted_sub(1.0), weighted_sub(1.0)],
            vec![weighted_sub(1.0)],
        ]);
        p.ns_role_mode = RoleMode::NorthDrives;
        let mut map = BTreeMap::new();
        map.insert(0usize, 1usize);
        map.insert(1usize, 0usize);
        p.ns_bespoke_map = Some(map);
        let report = validate_profile_feasibility(&p).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        for _ in 0..16 {
            let sel = select_subprofiles(&p, &report, &BuilderConfig::default(), &mut rng).unwrap();
            assert_eq!(sel.index_for(Seat::South), 1 - sel.index_for(Seat::North));
        }
    }

    #[test]
    fn random_driver_picks_either_seat() {
        let mut p = profile_of([
            vec![weighted_sub(1.0)],
            vec![weighted_sub(1.0)],
            vec![weighted_sub(1.0)],
            vec![weighted_sub(1.0)],
        ]);
        p.ns_role_mode = RoleMode::NsRandomDriver;
        let report = validate_profile_feasibility(&p).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut saw = (false, false);
        for _ in 0..64 {
            let sel = select_subprofiles(&p, &report, &BuilderConfig::default(), &mut rng).unwrap();
            match sel.ns_driver {
                Some(Seat::North) => saw.0 = true,
                Some(Seat::South) => saw.1 = true,
                other => panic!("unexpected driver {other:?}"),
            }
        }
        assert!(saw.0 && saw.1);
    }

    #[test]
    fn zero_retry_budget_exhausts() {
        let p = profile_of([
            vec![weighted_sub(1.0)],
            vec![weighted_sub(1.0)],
            vec![weighted_sub(1.0)],
            vec![weighted_sub(1.0)],
        ]);
        let report = validate_profile_feasibility(&p).unwrap();
        let cfg = BuilderConfig { max_selection_retries: 0, ..BuilderConfig::default() };
        let mut rng = ChaCha8Rng::seed_from_u64(13);
        assert!(matches!(
            select_subprofiles(&p, &report, &cfg, &mut rng),
            Err(DealError::SelectionExhausted { retries: 0 })
        ));
    }
}
