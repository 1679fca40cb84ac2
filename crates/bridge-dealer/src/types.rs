use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Suit {
    #[serde(rename = "C")]
    Clubs,
    #[serde(rename = "D")]
    Diamonds,
    #[serde(rename = "H")]
    Hearts,
    #[serde(rename = "S")]
    Spades,
}

impl Suit {
    pub fn to_char(self) -> char {
        match self {
            Suit::Clubs => 'C',
            Suit::Diamonds => 'D',
            Suit::Hearts => 'H',
            Suit::Spades => 'S',
        }
    }
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rank {
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "4")]
    Four,
    #[serde(rename = "5")]
    Five,
    #[serde(rename = "6")]
    Six,
    #[serde(rename = "7")]
    Seven,
    #[serde(rename = "8")]
    Eight,
    #[serde(rename = "9")]
    Nine,
    #[serde(rename = "T")]
    Ten,
    #[serde(rename = "J")]
    Jack,
    #[serde(rename = "Q")]
    Queen,
    #[serde(rename = "K")]
    King,
    #[serde(rename = "A")]
    Ace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Seat {
    #[serde(rename = "N")]
    North,
    #[serde(rename = "E")]
    East,
    #[serde(rename = "S")]
    South,
    #[serde(rename = "W")]
    West,
}

impl Seat {
    pub fn to_char(self) -> char {
        match self {
            Seat::North => 'N',
            Seat::East => 'E',
            Seat::South => 'S',
            Seat::West => 'W',
        }
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

/// Partnership side: North-South or East-West.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PairSide {
    #[serde(rename = "NS")]
    Ns,
    #[serde(rename = "EW")]
    Ew,
}

impl PairSide {
    pub fn seats(self) -> [Seat; 2] {
        match self {
            PairSide::Ns => [Seat::North, Seat::South],
            PairSide::Ew => [Seat::East, Seat::West],
        }
    }

    pub fn of_seat(seat: Seat) -> Self {
        match seat {
            Seat::North | Seat::South => PairSide::Ns,
            Seat::East | Seat::West => PairSide::Ew,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Vulnerability {
    #[serde(rename = "None")]
    None,
    #[serde(rename = "NS")]
    NorthSouth,
    #[serde(rename = "EW")]
    EastWest,
    #[serde(rename = "Both")]
    Both,
}

impl Vulnerability {
    /// Standard 16-board vulnerability cycle.
    pub fn from_board_number(board_number: u32) -> Self {
        match board_number % 16 {
            1 | 8 | 11 | 14 => Vulnerability::None,
            2 | 5 | 12 | 15 => Vulnerability::NorthSouth,
            3 | 6 | 9 | 0 => Vulnerability::EastWest,
            _ => Vulnerability::Both,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    pub suit: Suit,
    pub rank: Rank,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Hand {
    pub cards: Vec<Card>,
}

impl Hand {
    pub fn new(cards: Vec<Card>) -> Self {
        Hand { cards }
    }

    /// Sort for display: spades first, descending rank within each suit.
    pub fn sort(&mut self) {
        self.cards.sort_by(|a, b| {
            b.suit
                .cmp(&a.suit)
                .then_with(|| b.rank.cmp(&a.rank))
        });
    }
}

/// Suit lengths indexed by SUIT_ORDER: [Spades, Hearts, Diamonds, Clubs]
pub type SuitLength = [u8; 4];

/// One generated board. Hands are keyed by seat and kept sorted for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub board_number: u32,
    pub dealer: Seat,
    pub vulnerability: Vulnerability,
    pub hands: BTreeMap<Seat, Hand>,
    /// Wall-clock time spent generating this board.
    pub elapsed: Duration,
    /// Attempts consumed across all retries, the successful one included.
    pub attempts: u32,
    /// Board-level retries before the successful run.
    pub retries: u32,
}

impl Deal {
    pub fn hand(&self, seat: Seat) -> Option<&Hand> {
        self.hands.get(&seat)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealSet {
    pub deals: Vec<Deal>,
    /// Adaptive entropy re-seeds applied during generation.
    pub reseed_count: u32,
}
