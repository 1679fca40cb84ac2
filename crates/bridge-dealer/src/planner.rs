//! Dealing-order planning: most constrained seats deal first, the least
//! constrained seat takes the deck remainder.

use crate::constants::{clockwise_distance, SEATS};
use crate::profile::{HandProfile, SpecialConstraint};
use crate::selector::Selection;
use crate::types::Seat;

/// Seats sorted by descending constraint risk: RS (1.0), then PC/OC (0.5),
/// then standard-only (0.0). Ties break toward the narrower total-HCP
/// window, then toward the seat closer (clockwise) to the dealer.
pub fn plan_dealing_order(profile: &HandProfile, sel: &Selection, dealer: Seat) -> [Seat; 4] {
    let mut order = SEATS;
    order.sort_by_key(|&seat| {
        let sub = profile.subprofile(seat, sel.index_for(seat));
        let risk: u8 = match sub.special() {
            Some(SpecialConstraint::RandomSuit(_)) => 0,
            Some(SpecialConstraint::PartnerContingent(_))
            | Some(SpecialConstraint::OpponentContingent(_)) => 1,
            None => 2,
        };
        let width = sub.standard.total_hcp_max - sub.standard.total_hcp_min;
        (risk, width, clockwise_distance(dealer, seat))
    });
    order
}
