//! Decides whether a dealt hand satisfies a sub-profile and classifies any
//! failure as shape- or HCP-driven. Pure with respect to its inputs; check
//! order is fixed so outcomes are testable.

use crate::constants::{suit_index, SUIT_ORDER};
use crate::hand_evaluator::{evaluate_hand, HandStats};
use crate::profile::{
    ContingentSource, ContingentSuitConstraint, RandomSuitConstraint, RsChoice, ShapePattern,
    SpecialConstraint, SubProfile,
};
use crate::types::{Hand, Suit};

/// First-violation classification. Count and pattern violations are shape
/// failures; any HCP interval violation is an HCP failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchFailure {
    Shape,
    Hcp,
}

/// Random-suit selections visible to the holder: its own pre-committed
/// choice plus the partner's and the relevant opponent's.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchContext<'a> {
    pub own_rs: Option<&'a RsChoice>,
    pub partner_rs: Option<&'a RsChoice>,
    pub opponent_rs: Option<&'a RsChoice>,
}

/// Match a hand against a sub-profile. Returns the RS suits the hand was
/// accepted under (pre-committed or enumerated), or `None` for non-RS subs.
///
/// Check order: total HCP, exclusion patterns, standard per-suit ranges in
/// SUIT_ORDER (RS-chosen suits skipped), RS chosen-suit ranges, contingent
/// target range.
pub fn match_hand(
    hand: &Hand,
    sub: &SubProfile,
    exclusions: &[ShapePattern],
    ctx: &MatchContext<'_>,
) -> Result<Option<Vec<Suit>>, MatchFailure> {
    let stats = evaluate_hand(hand);

    let std = &sub.standard;
    if stats.total_hcp < std.total_hcp_min || stats.total_hcp > std.total_hcp_max {
        return Err(MatchFailure::Hcp);
    }
    if exclusions.iter().any(|p| p.matches(&stats.counts)) {
        return Err(MatchFailure::Shape);
    }

    match sub.special() {
        None => {
            check_standard(&stats, sub, &[])?;
            Ok(None)
        }
        Some(SpecialConstraint::RandomSuit(rs)) => match ctx.own_rs {
            Some(choice) => {
                check_standard(&stats, sub, &choice.chosen)?;
                for &suit in &choice.chosen {
                    check_rs_suit(&stats, rs, suit)?;
                }
                Ok(Some(choice.chosen.clone()))
            }
            None => enumerate_rs(&stats, sub, rs).map(Some),
        },
        Some(SpecialConstraint::PartnerContingent(pc)) => {
            check_standard(&stats, sub, &[])?;
            check_contingent(&stats, pc, ctx)?;
            Ok(None)
        }
        Some(SpecialConstraint::OpponentContingent(oc)) => {
            check_standard(&stats, sub, &[])?;
            check_contingent(&stats, oc, ctx)?;
            Ok(None)
        }
    }
}

fn check_standard(
    stats: &HandStats,
    sub: &SubProfile,
    skip: &[Suit],
) -> Result<(), MatchFailure> {
    for (idx, &suit) in SUIT_ORDER.iter().enumerate() {
        if skip.contains(&suit) {
            continue;
        }
        let range = sub.standard.by_index(idx);
        if !range.contains_cards(stats.counts[idx]) {
            return Err(MatchFailure::Shape);
        }
        if !range.contains_hcp(stats.suit_hcp[idx]) {
            return Err(MatchFailure::Hcp);
        }
    }
    Ok(())
}

fn check_rs_suit(
    stats: &HandStats,
    rs: &RandomSuitConstraint,
    suit: Suit,
) -> Result<(), MatchFailure> {
    let idx = suit_index(suit);
    let range = rs.range_for(suit);
    if !range.contains_cards(stats.counts[idx]) {
        return Err(MatchFailure::Shape);
    }
    if !range.contains_hcp(stats.suit_hcp[idx]) {
        return Err(MatchFailure::Hcp);
    }
    Ok(())
}

/// No pre-committed choice: enumerate size-k subsets of the allowed set in a
/// deterministic easier-first order and accept the first that passes.
fn enumerate_rs(
    stats: &HandStats,
    sub: &SubProfile,
    rs: &RandomSuitConstraint,
) -> Result<Vec<Suit>, MatchFailure> {
    // Easier candidates first: actual count closest to the required window.
    let mut candidates: Vec<Suit> = rs.allowed_suits.clone();
    candidates.sort_by_key(|&s| {
        let count = stats.counts[suit_index(s)];
        let range = rs.range_for(s);
        let gap = if count < range.min_cards {
            (range.min_cards - count) as u32
        } else if count > range.max_cards {
            (count - range.max_cards) as u32
        } else {
            0
        };
        (gap, suit_index(s))
    });

    let k = rs.required_suits_count as usize;
    let mut saw_hcp_only_failure = false;
    let mut indices: Vec<usize> = (0..k).collect();
    loop {
        let chosen: Vec<Suit> = indices.iter().map(|&i| candidates[i]).collect();
        match try_rs_candidate(stats, sub, rs, &chosen) {
            Ok(()) => return Ok(chosen),
            Err(MatchFailure::Hcp) => saw_hcp_only_failure = true,
            Err(MatchFailure::Shape) => {}
        }
        if !next_combination(&mut indices, candidates.len()) {
            break;
        }
    }
    if saw_hcp_only_failure {
        Err(MatchFailure::Hcp)
    } else {
        Err(MatchFailure::Shape)
    }
}

fn try_rs_candidate(
    stats: &HandStats,
    sub: &SubProfile,
    rs: &RandomSuitConstraint,
    chosen: &[Suit],
) -> Result<(), MatchFailure> {
    check_standard(stats, sub, chosen)?;
    for &suit in chosen {
        check_rs_suit(stats, rs, suit)?;
    }
    Ok(())
}

/// Advance `indices` to the next lexicographic k-combination of 0..n.
fn next_combination(indices: &mut [usize], n: usize) -> bool {
    let k = indices.len();
    let mut i = k;
    while i > 0 {
        i -= 1;
        if indices[i] < n - (k - i) {
            indices[i] += 1;
            for j in i + 1..k {
                indices[j] = indices[j - 1] + 1;
            }
            return true;
        }
    }
    false
}

fn check_contingent(
    stats: &HandStats,
    constraint: &ContingentSuitConstraint,
    ctx: &MatchContext<'_>,
) -> Result<(), MatchFailure> {
    let counterparty = match constraint.target_source {
        ContingentSource::Partner => ctx.partner_rs,
        ContingentSource::Opponents => ctx.opponent_rs,
    };
    let target = counterparty.and_then(|choice| {
        if constraint.use_non_chosen_suit {
            choice.non_chosen_unique()
        } else {
            choice.chosen_unique()
        }
    });
    // Unresolvable targets cannot be satisfied on this board.
    let Some(suit) = target else {
        return Err(MatchFailure::Shape);
    };
    let idx = suit_index(suit);
    if !constraint.suit_range.contains_cards(stats.counts[idx]) {
        return Err(MatchFailure::Shape);
    }
    if !constraint.suit_range.contains_hcp(stats.suit_hcp[idx]) {
        return Err(MatchFailure::Hcp);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::SuitRange;
    use crate::types::{Card, Rank};
    use std::collections::BTreeMap;

    fn make_hand(specs: &[(Suit, Rank)]) -> Hand {
        Hand::new(specs.iter().map(|&(suit, rank)| Card { suit, rank }).collect())
    }

    /// 6 spades (AK6432 = 7 hcp), 3 hearts (QJ2 = 3), 2 diamonds (K2 = 3), 2 clubs (32 = 0).
    /// Total 13 HCP, shape 6-3-2-2.
    fn six_spades_hand() -> Hand {
        use Rank::*;
        use Suit::*;
        make_hand(&[
            (Spades, Ace), (Spades, King), (Spades, Six), (Spades, Four),
            (Spades, Three), (Spades, Two),
            (Hearts, Queen), (Hearts, Jack), (Hearts, Two),
            (Diamonds, King), (Diamonds, Two),
            (Clubs, Three), (Clubs, Two),
        ])
    }

    fn full_sub() -> SubProfile {
        SubProfile::default()
    }

    #[test]
    fn full_range_sub_matches_any_hand() {
        let hand = six_spades_hand();
        let result = match_hand(&hand, &full_sub(), &[], &MatchContext::default());
        assert_eq!(result, Ok(None));
    }

    #[test]
    fn matching_is_idempotent() {
        let hand = six_spades_hand();
        let mut sub = full_sub();
        sub.standard.total_hcp_min = 20;
        let ctx = MatchContext::default();
        let first = match_hand(&hand, &sub, &[], &ctx);
        let second = match_hand(&hand, &sub, &[], &ctx);
        assert_eq!(first, second);
        assert_eq!(first, Err(MatchFailure::Hcp));
    }

    #[test]
    fn total_hcp_window_violation_is_hcp_fail() {
        let hand = six_spades_hand();
        let mut sub = full_sub();
        sub.standard.total_hcp_min = 15;
        sub.standard.total_hcp_max = 17;
        assert_eq!(
            match_hand(&hand, &sub, &[], &MatchContext::default()),
            Err(MatchFailure::Hcp)
        );
    }

    #[test]
    fn suit_count_violation_is_shape_fail() {
        let hand = six_spades_hand();
        let mut sub = full_sub();
        sub.standard.spades.max_cards = 5;
        assert_eq!(
            match_hand(&hand, &sub, &[], &MatchContext::default()),
            Err(MatchFailure::Shape)
        );
    }

    #[test]
    fn suit_hcp_violation_is_hcp_fail() {
        let hand = six_spades_hand();
        let mut sub = full_sub();
        sub.standard.spades.max_hcp = 5;
        assert_eq!(
            match_hand(&hand, &sub, &[], &MatchContext::default()),
            Err(MatchFailure::Hcp)
        );
    }

    #[test]
    fn exclusion_pattern_is_shape_fail() {
        let hand = six_spades_hand();
        let pattern: ShapePattern = "63xx".parse().unwrap();
        assert_eq!(
            match_hand(&hand, &full_sub(), &[pattern], &MatchContext::default()),
            Err(MatchFailure::Shape)
        );
    }

    fn rs_sub(min_cards: u8, max_cards: u8) -> SubProfile {
        SubProfile {
            random_suit_constraint: Some(RandomSuitConstraint {
                allowed_suits: vec![Suit::Spades, Suit::Hearts],
                required_suits_count: 1,
                per_suit_range: SuitRange {
                    min_cards,
                    max_cards,
                    min_hcp: 0,
                    max_hcp: 10,
                },
                pair_overrides: BTreeMap::new(),
            }),
            ..SubProfile::default()
        }
    }

    #[test]
    fn rs_chosen_range_replaces_standard_range() {
        let hand = six_spades_hand();
        let mut sub = rs_sub(6, 7);
        // Standard spade max is tighter than the hand, but spades are the
        // chosen suit so the RS range applies instead.
        sub.standard.spades.max_cards = 4;
        let choice = RsChoice {
            allowed: vec![Suit::Spades, Suit::Hearts],
            chosen: vec![Suit::Spades],
        };
        let ctx = MatchContext { own_rs: Some(&choice), ..MatchContext::default() };
        assert_eq!(match_hand(&hand, &sub, &[], &ctx), Ok(Some(vec![Suit::Spades])));
    }

    #[test]
    fn rs_precommitted_wrong_suit_fails_shape() {
        let hand = six_spades_hand();
        let sub = rs_sub(6, 7);
        let choice = RsChoice {
            allowed: vec![Suit::Spades, Suit::Hearts],
            chosen: vec![Suit::Hearts],
        };
        let ctx = MatchContext { own_rs: Some(&choice), ..MatchContext::default() };
        assert_eq!(match_hand(&hand, &sub, &[], &ctx), Err(MatchFailure::Shape));
    }

    #[test]
    fn rs_enumeration_finds_the_satisfying_suit() {
        let hand = six_spades_hand();
        let sub = rs_sub(6, 7);
        let result = match_hand(&hand, &sub, &[], &MatchContext::default());
        assert_eq!(result, Ok(Some(vec![Suit::Spades])));
    }

    #[test]
    fn rs_enumeration_hcp_only_failure_classifies_hcp() {
        let hand = six_spades_hand();
        let mut sub = rs_sub(6, 7);
        // Spade count fits but the chosen-suit HCP window does not (7 hcp held).
        sub.random_suit_constraint.as_mut().unwrap().per_suit_range.min_hcp = 9;
        assert_eq!(
            match_hand(&hand, &sub, &[], &MatchContext::default()),
            Err(MatchFailure::Hcp)
        );
    }

    #[test]
    fn pc_on_non_chosen_suit() {
        let hand = six_spades_hand();
        let sub = SubProfile {
            partner_contingent_constraint: Some(ContingentSuitConstraint {
                target_source: ContingentSource::Partner,
                use_non_chosen_suit: true,
                suit_range: SuitRange { min_cards: 3, max_cards: 5, min_hcp: 0, max_hcp: 10 },
            }),
            ..SubProfile::default()
        };
        let partner = RsChoice {
            allowed: vec![Suit::Spades, Suit::Hearts],
            chosen: vec![Suit::Spades],
        };
        // Non-chosen suit is hearts; the hand holds 3.
        let ctx = MatchContext { partner_rs: Some(&partner), ..MatchContext::default() };
        assert_eq!(match_hand(&hand, &sub, &[], &ctx), Ok(None));

        let partner = RsChoice {
            allowed: vec![Suit::Spades, Suit::Hearts],
            chosen: vec![Suit::Hearts],
        };
        // Non-chosen suit becomes spades; 6 cards is outside 3..5.
        let ctx = MatchContext { partner_rs: Some(&partner), ..MatchContext::default() };
        assert_eq!(match_hand(&hand, &sub, &[], &ctx), Err(MatchFailure::Shape));
    }

    #[test]
    fn oc_without_counterparty_choice_fails_shape() {
        let hand = six_spades_hand();
        let sub = SubProfile {
            opponents_contingent_suit_constraint: Some(ContingentSuitConstraint {
                target_source: ContingentSource::Opponents,
                use_non_chosen_suit: false,
                suit_range: SuitRange::full(),
            }),
            ..SubProfile::default()
        };
        assert_eq!(
            match_hand(&hand, &sub, &[], &MatchContext::default()),
            Err(MatchFailure::Shape)
        );
    }

    #[test]
    fn next_combination_walks_lexicographically() {
        let mut idx = vec![0, 1];
        let mut seen = vec![idx.clone()];
        while next_combination(&mut idx, 4) {
            seen.push(idx.clone());
        }
        assert_eq!(
            seen,
            vec![
                vec![0, 1], vec![0, 2], vec![0, 3],
                vec![1, 2], vec![1, 3], vec![2, 3],
            ]
        );
    }
}
