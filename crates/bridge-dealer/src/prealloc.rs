//! Biased pre-allocation: RS suit pre-selection with cross-seat exclusion,
//! dispersion-based tightness, phased card reservation with HCP-targeted
//! rejection, the hypergeometric HCP feasibility gate, and constrained fill.

use rand::Rng;
use std::collections::BTreeMap;

use crate::config::BuilderConfig;
use crate::constants::{
    hcp_value, next_seat, partner_seat, seat_index, suit_index, DECK_HCP_SQ_SUM, DECK_HCP_SUM,
    P_GE_N, SEATS,
};
use crate::profile::{ContingentSource, HandProfile, RsChoice, SpecialConstraint};
use crate::selector::Selection;
use crate::types::{Card, Hand, Seat, Suit};

/// Reasons an attempt dies before the matcher runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptReject {
    /// The HCP feasibility gate rejected this seat's pre-allocation.
    HcpGate(Seat),
    /// Constrained fill could not bring this seat to 13 cards.
    Fill(Seat),
}

/// Per-seat RS selections for one attempt, indexed by seat (N, E, S, W).
pub type RsSelections = [Option<RsChoice>; 4];

/// The opponent RS selection visible to `seat`: the clockwise-first
/// opponent holding one.
pub(crate) fn opponent_rs_of(seat: Seat, rs: &RsSelections) -> Option<&RsChoice> {
    let first = next_seat(seat);
    let second = next_seat(partner_seat(seat));
    rs[seat_index(first)]
        .as_ref()
        .or_else(|| rs[seat_index(second)].as_ref())
}

/// Fix RS suits for every RS seat in dealing order, excluding suits already
/// fixed by earlier RS seats. Fails with the blocked seat when the residual
/// allowed set is smaller than `required_suits_count`.
pub fn preselect_rs_suits<R: Rng>(
    profile: &HandProfile,
    sel: &Selection,
    order: &[Seat; 4],
    rng: &mut R,
) -> Result<RsSelections, Seat> {
    let mut selections: RsSelections = [None, None, None, None];
    let mut fixed: Vec<Suit> = Vec::new();
    for &seat in order {
        let sub = profile.subprofile(seat, sel.index_for(seat));
        let Some(SpecialConstraint::RandomSuit(rs)) = sub.special() else {
            continue;
        };
        let mut avail: Vec<Suit> = rs
            .allowed_suits
            .iter()
            .copied()
            .filter(|s| !fixed.contains(s))
            .collect();
        avail.sort_by_key(|&s| suit_index(s));
        let k = rs.required_suits_count as usize;
        if avail.len() < k {
            return Err(seat);
        }
        for i in 0..k {
            let j = rng.gen_range(i..avail.len());
            avail.swap(i, j);
        }
        let mut chosen: Vec<Suit> = avail[..k].to_vec();
        chosen.sort_by_key(|&s| suit_index(s));
        fixed.extend(chosen.iter().copied());
        selections[seat_index(seat)] = Some(RsChoice {
            allowed: rs.allowed_suits.clone(),
            chosen,
        });
    }
    Ok(selections)
}

fn is_tight(min_cards: u8, threshold: f64) -> bool {
    min_cards > 0 && P_GE_N[min_cards as usize] < threshold
}

/// Shuffled-deck view with incremental HCP bookkeeping for the gate.
struct DeckState<'a> {
    cards: &'a [Card],
    taken: [bool; 52],
    by_suit: [Vec<usize>; 4],
    remaining: u32,
    hcp_sum: u32,
    hcp_sq_sum: u32,
}

impl<'a> DeckState<'a> {
    fn new(cards: &'a [Card]) -> Self {
        let mut by_suit: [Vec<usize>; 4] = Default::default();
        for (pos, card) in cards.iter().enumerate() {
            by_suit[suit_index(card.suit)].push(pos);
        }
        DeckState {
            cards,
            taken: [false; 52],
            by_suit,
            remaining: 52,
            hcp_sum: DECK_HCP_SUM as u32,
            hcp_sq_sum: DECK_HCP_SQ_SUM as u32,
        }
    }

    fn take_at(&mut self, pos: usize) -> Card {
        debug_assert!(!self.taken[pos]);
        self.taken[pos] = true;
        self.remaining -= 1;
        let card = self.cards[pos];
        let hcp = hcp_value(card.rank) as u32;
        self.hcp_sum -= hcp;
        self.hcp_sq_sum -= hcp * hcp;
        card
    }

    /// Reserve `want` cards of a suit, optionally resampling until the drawn
    /// HCP lands in `window`. Removes them from the suit pool. An
    /// out-of-window draw after the last retry is kept; the matcher decides.
    fn reserve_suit<R: Rng>(
        &mut self,
        suit_idx: usize,
        want: usize,
        window: Option<(u8, u8)>,
        retries: u32,
        rng: &mut R,
    ) -> Vec<Card> {
        let cards = self.cards;
        let take = want.min(self.by_suit[suit_idx].len());
        if take == 0 {
            return Vec::new();
        }
        if let Some((min_hcp, max_hcp)) = window {
            let pool = &mut self.by_suit[suit_idx];
            for _ in 0..=retries {
                for i in 0..take {
                    let j = rng.gen_range(i..pool.len());
                    pool.swap(i, j);
                }
                let drawn: u32 = pool[..take]
                    .iter()
                    .map(|&pos| hcp_value(cards[pos].rank) as u32)
                    .sum();
                if (min_hcp as u32..=max_hcp as u32).contains(&drawn) {
                    break;
                }
            }
        }
        let positions: Vec<usize> = self.by_suit[suit_idx].drain(..take).collect();
        positions.into_iter().map(|pos| self.take_at(pos)).collect()
    }
}

/// HCP feasibility window test: with `cards_needed` more cards drawn from a
/// deck of `deck_n` cards carrying `deck_hcp` points (`deck_hcp_sq` sum of
/// squares), is the target total-HCP window plausibly reachable from
/// `drawn_hcp`? Uses finite-population sampling mean and variance.
pub(crate) fn gate_rejects(
    drawn_hcp: u32,
    cards_needed: u32,
    deck_n: u32,
    deck_hcp: u32,
    deck_hcp_sq: u32,
    target_min: u8,
    target_max: u8,
    num_sd: f64,
) -> bool {
    if cards_needed == 0 {
        return drawn_hcp > target_max as u32 || drawn_hcp < target_min as u32;
    }
    if deck_n == 0 {
        return false;
    }
    let n = deck_n as f64;
    let r = cards_needed as f64;
    let mean = deck_hcp as f64 / n;
    let expected = r * mean;
    let var_per_card = (deck_hcp_sq as f64 / n - mean * mean).max(0.0);
    let variance = if deck_n > 1 {
        r * var_per_card * (n - r) / (n - 1.0)
    } else {
        0.0
    };
    let sigma = variance.sqrt();
    let low = drawn_hcp as f64 + expected - num_sd * sigma;
    let high = drawn_hcp as f64 + expected + num_sd * sigma;
    low > target_max as f64 || high < target_min as f64
}

/// Phased pre-allocation and constrained fill over an already-shuffled deck.
/// Returns complete 13-card hands for all four seats, or the phase that
/// rejected the attempt.
pub fn deal_with_help<R: Rng>(
    profile: &HandProfile,
    sel: &Selection,
    order: &[Seat; 4],
    rs: &RsSelections,
    cfg: &BuilderConfig,
    deck: &[Card],
    rng: &mut R,
) -> Result<BTreeMap<Seat, Hand>, AttemptReject> {
    let mut state = DeckState::new(deck);
    let mut allocated: [Vec<Card>; 4] = Default::default();

    // Phase 1a: standard constraints of tight seats, no HCP targeting.
    for &seat in order {
        let i = seat_index(seat);
        let sub = profile.subprofile(seat, sel.index_for(seat));
        let chosen_idx: Vec<usize> = rs[i]
            .as_ref()
            .map(|c| c.chosen.iter().map(|&s| suit_index(s)).collect())
            .unwrap_or_default();
        let std_tight = (0..4).any(|idx| {
            !chosen_idx.contains(&idx)
                && is_tight(sub.standard.by_index(idx).min_cards, cfg.dispersion_threshold)
        });
        if !std_tight {
            continue;
        }
        for idx in 0..4 {
            if chosen_idx.contains(&idx) {
                continue;
            }
            let min = sub.standard.by_index(idx).min_cards;
            if min == 0 {
                continue;
            }
            let want = (cfg.prealloc_std_fraction * min as f64).ceil() as usize;
            let room = 13 - allocated[i].len();
            let cards = state.reserve_suit(idx, want.min(room), None, 0, rng);
            allocated[i].extend(cards);
        }
    }

    // Phase 1b: RS-chosen suits, HCP-targeted.
    for &seat in order {
        let i = seat_index(seat);
        let sub = profile.subprofile(seat, sel.index_for(seat));
        let Some(choice) = rs[i].as_ref() else { continue };
        let Some(SpecialConstraint::RandomSuit(rs_constraint)) = sub.special() else {
            continue;
        };
        let rs_tight = choice
            .chosen
            .iter()
            .any(|&s| is_tight(rs_constraint.range_for(s).min_cards, cfg.dispersion_threshold));
        if !rs_tight {
            continue;
        }
        for &suit in &choice.chosen {
            let range = *rs_constraint.range_for(suit);
            if range.min_cards == 0 {
                continue;
            }
            let want = (cfg.rs_prealloc_fraction * range.min_cards as f64).round() as usize;
            let room = 13 - allocated[i].len();
            let cards = state.reserve_suit(
                suit_index(suit),
                want.min(room),
                Some((range.min_hcp, range.max_hcp)),
                cfg.rs_hcp_retries,
                rng,
            );
            allocated[i].extend(cards);
        }
    }

    // Phase 1c: contingent target suits, HCP-targeted.
    for &seat in order {
        let i = seat_index(seat);
        let sub = profile.subprofile(seat, sel.index_for(seat));
        let constraint = match sub.special() {
            Some(SpecialConstraint::PartnerContingent(c))
            | Some(SpecialConstraint::OpponentContingent(c)) => *c,
            _ => continue,
        };
        let counterparty = match constraint.target_source {
            ContingentSource::Partner => rs[seat_index(partner_seat(seat))].as_ref(),
            ContingentSource::Opponents => opponent_rs_of(seat, rs),
        };
        let target = counterparty.and_then(|c| {
            if constraint.use_non_chosen_suit {
                c.non_chosen_unique()
            } else {
                c.chosen_unique()
            }
        });
        let Some(suit) = target else { continue };
        let range = constraint.suit_range;
        if !is_tight(range.min_cards, cfg.dispersion_threshold) {
            continue;
        }
        let want = (cfg.rs_prealloc_fraction * range.min_cards as f64).round() as usize;
        let room = 13 - allocated[i].len();
        let cards = state.reserve_suit(
            suit_index(suit),
            want.min(room),
            Some((range.min_hcp, range.max_hcp)),
            cfg.rs_hcp_retries,
            rng,
        );
        allocated[i].extend(cards);
    }

    // Phase 2: HCP feasibility gate on every pre-allocated seat.
    for &seat in order {
        let i = seat_index(seat);
        if allocated[i].is_empty() {
            continue;
        }
        let sub = profile.subprofile(seat, sel.index_for(seat));
        let drawn_hcp: u32 = allocated[i].iter().map(|c| hcp_value(c.rank) as u32).sum();
        let needed = 13 - allocated[i].len() as u32;
        if gate_rejects(
            drawn_hcp,
            needed,
            state.remaining,
            state.hcp_sum,
            state.hcp_sq_sum,
            sub.standard.total_hcp_min,
            sub.standard.total_hcp_max,
            cfg.hcp_feasibility_num_sd,
        ) {
            return Err(AttemptReject::HcpGate(seat));
        }
    }

    // Phase 3: constrained fill for every seat but the last; skipped cards
    // stay in the deck for later seats.
    for &seat in &order[..3] {
        let i = seat_index(seat);
        let sub = profile.subprofile(seat, sel.index_for(seat));

        let mut eff_max = [0u8; 4];
        for (idx, slot) in eff_max.iter_mut().enumerate() {
            *slot = sub.standard.by_index(idx).max_cards;
        }
        let mut rs_hcp_cap: [Option<u8>; 4] = [None; 4];
        if let (Some(choice), Some(SpecialConstraint::RandomSuit(rs_constraint))) =
            (rs[i].as_ref(), sub.special())
        {
            for &suit in &choice.chosen {
                let range = rs_constraint.range_for(suit);
                eff_max[suit_index(suit)] = range.max_cards;
                rs_hcp_cap[suit_index(suit)] = Some(range.max_hcp);
            }
        }
        let total_cap = sub.standard.total_hcp_max;

        let mut hand = std::mem::take(&mut allocated[i]);
        let mut counts = [0u8; 4];
        let mut suit_hcp = [0u8; 4];
        let mut total_hcp = 0u8;
        for card in &hand {
            let idx = suit_index(card.suit);
            let hcp = hcp_value(card.rank);
            counts[idx] += 1;
            suit_hcp[idx] += hcp;
            total_hcp += hcp;
        }

        for pos in 0..52 {
            if hand.len() == 13 {
                break;
            }
            if state.taken[pos] {
                continue;
            }
            let card = state.cards[pos];
            let idx = suit_index(card.suit);
            if counts[idx] + 1 > eff_max[idx] {
                continue;
            }
            let hcp = hcp_value(card.rank);
            if hcp > 0 {
                if total_hcp + hcp > total_cap {
                    continue;
                }
                if let Some(cap) = rs_hcp_cap[idx] {
                    if suit_hcp[idx] + hcp > cap {
                        continue;
                    }
                }
            }
            state.take_at(pos);
            counts[idx] += 1;
            suit_hcp[idx] += hcp;
            total_hcp += hcp;
            hand.push(card);
        }
        if hand.len() < 13 {
            return Err(AttemptReject::Fill(seat));
        }
        allocated[i] = hand;
    }

    // Last seat takes everything left; only the matcher checks it.
    let last = seat_index(order[3]);
    for pos in 0..52 {
        if !state.taken[pos] {
            let card = state.take_at(pos);
            allocated[last].push(card);
        }
    }

    let mut hands = BTreeMap::new();
    for seat in SEATS {
        let cards = std::mem::take(&mut allocated[seat_index(seat)]);
        hands.insert(seat, Hand::new(cards));
    }
    Ok(hands)
}
