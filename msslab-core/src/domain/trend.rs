//! Trend state and trade direction.

use serde::{Deserialize, Serialize};

/// Per-bar trend classification from the fast/slow EMA relationship.
///
/// `Flat` also covers the warm-up period before both EMAs are defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendState {
    Up,
    Down,
    Flat,
}

impl TrendState {
    /// Trade direction aligned with this trend, if any.
    pub fn direction(self) -> Option<Direction> {
        match self {
            TrendState::Up => Some(Direction::Long),
            TrendState::Down => Some(Direction::Short),
            TrendState::Flat => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1.0 for long, -1.0 for short.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Long => "LONG",
            Direction::Short => "SHORT",
        }
    }

    /// Parse `LONG`/`SHORT` (also accepts `buy`/`sell`), case-insensitive.
    pub fn parse(s: &str) -> Option<Direction> {
        match s.trim().to_ascii_lowercase().as_str() {
            "long" | "buy" => Some(Direction::Long),
            "short" | "sell" => Some(Direction::Short),
            _ => None,
        }
    }
}
