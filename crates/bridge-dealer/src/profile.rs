//! Constraint data model: what a generated deal must satisfy, per seat.
//!
//! The serde layout of these types is the persisted JSON profile contract.
//! Unknown keys are ignored; missing optional keys take the documented
//! defaults. Profiles are immutable once validated.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::constants::SUIT_ORDER;
use crate::types::{PairSide, Seat, Suit, SuitLength};

fn full_max_cards() -> u8 {
    13
}

fn full_max_hcp() -> u8 {
    10
}

fn default_total_hcp_max() -> u8 {
    37
}

fn default_weight() -> f64 {
    1.0
}

/// Closed card-count and HCP intervals for one suit holding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuitRange {
    #[serde(default)]
    pub min_cards: u8,
    #[serde(default = "full_max_cards")]
    pub max_cards: u8,
    #[serde(default)]
    pub min_hcp: u8,
    #[serde(default = "full_max_hcp")]
    pub max_hcp: u8,
}

impl SuitRange {
    pub fn full() -> Self {
        SuitRange { min_cards: 0, max_cards: 13, min_hcp: 0, max_hcp: 10 }
    }

    pub fn contains_cards(&self, count: u8) -> bool {
        (self.min_cards..=self.max_cards).contains(&count)
    }

    pub fn contains_hcp(&self, hcp: u8) -> bool {
        (self.min_hcp..=self.max_hcp).contains(&hcp)
    }
}

impl Default for SuitRange {
    fn default() -> Self {
        SuitRange::full()
    }
}

/// Per-suit ranges plus the total-HCP window, independent of other seats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardConstraints {
    #[serde(rename = "S", default)]
    pub spades: SuitRange,
    #[serde(rename = "H", default)]
    pub hearts: SuitRange,
    #[serde(rename = "D", default)]
    pub diamonds: SuitRange,
    #[serde(rename = "C", default)]
    pub clubs: SuitRange,
    #[serde(default)]
    pub total_hcp_min: u8,
    #[serde(default = "default_total_hcp_max")]
    pub total_hcp_max: u8,
}

impl StandardConstraints {
    pub fn suit_range(&self, suit: Suit) -> &SuitRange {
        match suit {
            Suit::Spades => &self.spades,
            Suit::Hearts => &self.hearts,
            Suit::Diamonds => &self.diamonds,
            Suit::Clubs => &self.clubs,
        }
    }

    /// Suit range by SUIT_ORDER index.
    pub fn by_index(&self, idx: usize) -> &SuitRange {
        self.suit_range(SUIT_ORDER[idx])
    }
}

impl Default for StandardConstraints {
    fn default() -> Self {
        StandardConstraints {
            spades: SuitRange::full(),
            hearts: SuitRange::full(),
            diamonds: SuitRange::full(),
            clubs: SuitRange::full(),
            total_hcp_min: 0,
            total_hcp_max: 37,
        }
    }
}

/// Constraint over suits chosen per board from an allowed set. Chosen-suit
/// ranges replace the standard per-suit range for the same hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomSuitConstraint {
    pub allowed_suits: Vec<Suit>,
    pub required_suits_count: u8,
    #[serde(default)]
    pub per_suit_range: SuitRange,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pair_overrides: BTreeMap<Suit, SuitRange>,
}

impl RandomSuitConstraint {
    /// Range a chosen suit must satisfy, honoring pair overrides.
    pub fn range_for(&self, suit: Suit) -> &SuitRange {
        self.pair_overrides.get(&suit).unwrap_or(&self.per_suit_range)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContingentSource {
    Partner,
    Opponents,
}

/// Constraint on the holder's holding in a suit determined by the partner's
/// or an opponent's random-suit choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContingentSuitConstraint {
    pub target_source: ContingentSource,
    #[serde(default)]
    pub use_non_chosen_suit: bool,
    #[serde(default)]
    pub suit_range: SuitRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoleUsage {
    #[default]
    Any,
    DriverOnly,
    FollowerOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoleMode {
    #[default]
    NoDriverNoIndex,
    NorthDrives,
    SouthDrives,
    EastDrives,
    WestDrives,
    NsRandomDriver,
    EwRandomDriver,
}

impl RoleMode {
    pub fn applies_to(self, side: PairSide) -> bool {
        match self {
            RoleMode::NoDriverNoIndex => true,
            RoleMode::NorthDrives | RoleMode::SouthDrives | RoleMode::NsRandomDriver => {
                side == PairSide::Ns
            }
            RoleMode::EastDrives | RoleMode::WestDrives | RoleMode::EwRandomDriver => {
                side == PairSide::Ew
            }
        }
    }

    /// The fixed driver seat, if this mode names one.
    pub fn fixed_driver(self) -> Option<Seat> {
        match self {
            RoleMode::NorthDrives => Some(Seat::North),
            RoleMode::SouthDrives => Some(Seat::South),
            RoleMode::EastDrives => Some(Seat::East),
            RoleMode::WestDrives => Some(Seat::West),
            _ => None,
        }
    }

    pub fn is_random_driver(self) -> bool {
        matches!(self, RoleMode::NsRandomDriver | RoleMode::EwRandomDriver)
    }

    pub fn is_coupled(self) -> bool {
        !matches!(self, RoleMode::NoDriverNoIndex)
    }
}

/// Borrowed view of the at-most-one special constraint on a sub-profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpecialConstraint<'a> {
    RandomSuit(&'a RandomSuitConstraint),
    PartnerContingent(&'a ContingentSuitConstraint),
    OpponentContingent(&'a ContingentSuitConstraint),
}

/// One named bundle of constraints a seat may take on a given board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub standard: StandardConstraints,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub random_suit_constraint: Option<RandomSuitConstraint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner_contingent_constraint: Option<ContingentSuitConstraint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opponents_contingent_suit_constraint: Option<ContingentSuitConstraint>,
    #[serde(default = "default_weight")]
    pub weight_percent: f64,
    #[serde(default)]
    pub ns_role_usage: RoleUsage,
    #[serde(default)]
    pub ew_role_usage: RoleUsage,
}

impl Default for SubProfile {
    fn default() -> Self {
        SubProfile {
            name: None,
            standard: StandardConstraints::default(),
            random_suit_constraint: None,
            partner_contingent_constraint: None,
            opponents_contingent_suit_constraint: None,
            weight_percent: 1.0,
            ns_role_usage: RoleUsage::Any,
            ew_role_usage: RoleUsage::Any,
        }
    }
}

impl SubProfile {
    /// The special constraint, if any. Validation guarantees at most one of
    /// the three slots is populated.
    pub fn special(&self) -> Option<SpecialConstraint<'_>> {
        if let Some(rs) = &self.random_suit_constraint {
            return Some(SpecialConstraint::RandomSuit(rs));
        }
        if let Some(pc) = &self.partner_contingent_constraint {
            return Some(SpecialConstraint::PartnerContingent(pc));
        }
        if let Some(oc) = &self.opponents_contingent_suit_constraint {
            return Some(SpecialConstraint::OpponentContingent(oc));
        }
        None
    }

    pub fn special_count(&self) -> usize {
        self.random_suit_constraint.is_some() as usize
            + self.partner_contingent_constraint.is_some() as usize
            + self.opponents_contingent_suit_constraint.is_some() as usize
    }

    pub fn role_usage(&self, side: PairSide) -> RoleUsage {
        match side {
            PairSide::Ns => self.ns_role_usage,
            PairSide::Ew => self.ew_role_usage,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PatternDigit {
    Exact(u8),
    Any,
}

/// Forbidden shape pattern in SUIT_ORDER, e.g. "4432" or "44xx".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapePattern {
    digits: [PatternDigit; 4],
}

impl ShapePattern {
    pub fn matches(&self, counts: &SuitLength) -> bool {
        self.digits.iter().zip(counts.iter()).all(|(d, &c)| match d {
            PatternDigit::Exact(n) => *n == c,
            PatternDigit::Any => true,
        })
    }
}

impl FromStr for ShapePattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let chars: Vec<char> = s.chars().collect();
        if chars.len() != 4 {
            return Err(format!("shape pattern '{s}' must have exactly 4 digits"));
        }
        let mut digits = [PatternDigit::Any; 4];
        for (i, c) in chars.iter().enumerate() {
            digits[i] = match c {
                'x' | 'X' => PatternDigit::Any,
                '0'..='9' => PatternDigit::Exact(*c as u8 - b'0'),
                _ => return Err(format!("shape pattern '{s}' has invalid digit '{c}'")),
            };
        }
        Ok(ShapePattern { digits })
    }
}

impl fmt::Display for ShapePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for d in &self.digits {
            match d {
                PatternDigit::Exact(n) => write!(f, "{n}")?,
                PatternDigit::Any => write!(f, "x")?,
            }
        }
        Ok(())
    }
}

impl Serialize for ShapePattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ShapePattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

/// Ordered sub-profiles for one seat plus seat-level exclusion clauses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatProfile {
    pub subprofiles: Vec<SubProfile>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclusion_clauses: Vec<ShapePattern>,
}

/// The full deal specification: per-seat profiles, role coupling, metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandProfile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<String>,
    pub dealer: Seat,
    #[serde(default)]
    pub ns_role_mode: RoleMode,
    #[serde(default)]
    pub ew_role_mode: RoleMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ns_bespoke_map: Option<BTreeMap<usize, usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ew_bespoke_map: Option<BTreeMap<usize, usize>>,
    pub seat_profiles: BTreeMap<Seat, SeatProfile>,
}

impl HandProfile {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn seat_profile(&self, seat: Seat) -> Option<&SeatProfile> {
        self.seat_profiles.get(&seat)
    }

    /// Sub-profile at a validated (seat, index) pair.
    pub fn subprofile(&self, seat: Seat, idx: usize) -> &SubProfile {
        &self.seat_profiles[&seat].subprofiles[idx]
    }

    pub fn role_mode(&self, side: PairSide) -> RoleMode {
        match side {
            PairSide::Ns => self.ns_role_mode,
            PairSide::Ew => self.ew_role_mode,
        }
    }

    pub fn bespoke_map(&self, side: PairSide) -> Option<&BTreeMap<usize, usize>> {
        match side {
            PairSide::Ns => self.ns_bespoke_map.as_ref(),
            PairSide::Ew => self.ew_bespoke_map.as_ref(),
        }
    }
}

/// A fixed random-suit selection: the allowed set and the suits chosen from
/// it for one board. Target resolution for contingent constraints needs both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsChoice {
    pub allowed: Vec<Suit>,
    pub chosen: Vec<Suit>,
}

impl RsChoice {
    /// The chosen suit, when the choice picked exactly one.
    pub fn chosen_unique(&self) -> Option<Suit> {
        match self.chosen.as_slice() {
            [s] => Some(*s),
            _ => None,
        }
    }

    /// The one allowed suit left un-chosen, when exactly one remains.
    pub fn non_chosen_unique(&self) -> Option<Suit> {
        let mut left = self.allowed.iter().filter(|s| !self.chosen.contains(s));
        match (left.next(), left.next()) {
            (Some(s), None) => Some(*s),
            _ => None,
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Suit;

    #[test]
    fn suit_range_default_is_full_domain() {
        let r = SuitRange::default();
        assert!(r.contains_cards(0));
        assert!(r.contains_cards(13));
        assert!(r.contains_hcp(0));
        assert!(r.contains_hcp(10));
    }

    #[test]
    fn suit_range_deserializes_with_defaults() {
        let r: SuitRange = serde_json::from_str(r#"{"min_cards": 6, "max_cards": 6}"#).unwrap();
        assert_eq!(r.min_cards, 6);
        assert_eq!(r.max_cards, 6);
        assert_eq!(r.min_hcp, 0);
        assert_eq!(r.max_hcp, 10);
    }

    #[test]
    fn standard_constraints_use_suit_letter_keys() {
        let json = r#"{"S": {"min_cards": 5}, "total_hcp_min": 10, "total_hcp_max": 12}"#;
        let sc: StandardConstraints = serde_json::from_str(json).unwrap();
        assert_eq!(sc.spades.min_cards, 5);
        assert_eq!(sc.hearts, SuitRange::full());
        assert_eq!(sc.total_hcp_min, 10);
        assert_eq!(sc.total_hcp_max, 12);
    }

    #[test]
    fn rs_range_for_honors_pair_overrides() {
        let narrow = SuitRange { min_cards: 4, max_cards: 7, min_hcp: 0, max_hcp: 10 };
        let mut overrides = BTreeMap::new();
        overrides.insert(Suit::Hearts, narrow);
        let rs = RandomSuitConstraint {
            allowed_suits: vec![Suit::Spades, Suit::Hearts],
            required_suits_count: 1,
            per_suit_range: SuitRange { min_cards: 6, max_cards: 6, min_hcp: 0, max_hcp: 10 },
            pair_overrides: overrides,
        };
        assert_eq!(rs.range_for(Suit::Hearts), &narrow);
        assert_eq!(rs.range_for(Suit::Spades).min_cards, 6);
    }

    #[test]
    fn subprofile_special_accessor() {
        let mut sub = SubProfile::default();
        assert!(sub.special().is_none());
        sub.random_suit_constraint = Some(RandomSuitConstraint {
            allowed_suits: vec![Suit::Spades],
            required_suits_count: 1,
            per_suit_range: SuitRange::full(),
            pair_overrides: BTreeMap::new(),
        });
        assert!(matches!(sub.special(), Some(SpecialConstraint::RandomSuit(_))));
        assert_eq!(sub.special_count(), 1);
    }

    #[test]
    fn shape_pattern_parses_and_matches() {
        let p: ShapePattern = "44xx".parse().unwrap();
        assert!(p.matches(&[4, 4, 3, 2]));
        assert!(p.matches(&[4, 4, 0, 5]));
        assert!(!p.matches(&[4, 3, 3, 3]));
        assert_eq!(p.to_string(), "44xx");
    }

    #[test]
    fn shape_pattern_rejects_bad_input() {
        assert!("443".parse::<ShapePattern>().is_err());
        assert!("44a2".parse::<ShapePattern>().is_err());
        assert!("44321".parse::<ShapePattern>().is_err());
    }

    #[test]
    fn shape_pattern_roundtrips_as_json_string() {
        let p: ShapePattern = "5xx2".parse().unwrap();
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "\"5xx2\"");
        let back: ShapePattern = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn rs_choice_unique_accessors() {
        let choice = RsChoice {
            allowed: vec![Suit::Spades, Suit::Hearts],
            chosen: vec![Suit::Hearts],
        };
        assert_eq!(choice.chosen_unique(), Some(Suit::Hearts));
        assert_eq!(choice.non_chosen_unique(), Some(Suit::Spades));

        let wide = RsChoice {
            allowed: vec![Suit::Spades, Suit::Hearts, Suit::Diamonds],
            chosen: vec![Suit::Hearts],
        };
        assert_eq!(wide.chosen_unique(), Some(Suit::Hearts));
        assert_eq!(wide.non_chosen_unique(), None);
    }

    #[test]
    fn profile_json_ignores_unknown_keys() {
        let json = r#"{
            "name": "weak two spades",
            "dealer": "N",
            "future_field": true,
            "seat_profiles": {
                "N": {"subprofiles": [{"standard": {"total_hcp_min": 6, "total_hcp_max": 10}}]},
                "E": {"subprofiles": [{}]},
                "S": {"subprofiles": [{}]},
                "W": {"subprofiles": [{}]}
            }
        }"#;
        let profile = HandProfile::from_json(json).unwrap();
        assert_eq!(profile.name, "weak two spades");
        assert_eq!(profile.dealer, Seat::North);
        assert_eq!(profile.ns_role_mode, RoleMode::NoDriverNoIndex);
        let north = profile.seat_profile(Seat::North).unwrap();
        assert_eq!(north.subprofiles[0].standard.total_hcp_min, 6);
        assert_eq!(north.subprofiles[0].weight_percent, 1.0);
    }

    #[test]
    fn profile_json_roundtrip() {
        let json = r#"{
            "name": "rs demo",
            "dealer": "W",
            "ns_role_mode": "north_drives",
            "ns_bespoke_map": {"0": 1, "1": 0},
            "seat_profiles": {
                "N": {
                    "subprofiles": [
                        {"weight_percent": 60.0, "random_suit_constraint": {
                            "allowed_suits": ["S", "H"],
                            "required_suits_count": 1,
                            "per_suit_range": {"min_cards": 6, "max_cards": 7}
                        }},
                        {"weight_percent": 40.0}
                    ],
                    "exclusion_clauses": ["7xxx"]
                },
                "E": {"subprofiles": [{}]},
                "S": {"subprofiles": [{}, {}]},
                "W": {"subprofiles": [{}]}
            }
        }"#;
        let profile = HandProfile::from_json(json).unwrap();
        let back = HandProfile::from_json(&profile.to_json().unwrap()).unwrap();
        assert_eq!(profile, back);
        assert_eq!(profile.ns_bespoke_map.as_ref().unwrap()[&0], 1);
    }
}
