//! Fixed distribution bands for stop distance and risk/reward.
//!
//! Shared by the history evaluator (pattern signatures) and the report
//! builder (distribution tables), so both always agree on band edges.

use serde::{Deserialize, Serialize};

/// Stop-distance band in pips. Right-closed: 5.0 pips falls in `UpTo5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StopBucket {
    UpTo5,
    From6To10,
    From11To15,
    From16To20,
    Above20,
}

impl StopBucket {
    pub const ALL: [StopBucket; 5] = [
        StopBucket::UpTo5,
        StopBucket::From6To10,
        StopBucket::From11To15,
        StopBucket::From16To20,
        StopBucket::Above20,
    ];

    /// Pips are snapped to 1e-9 first so a price-derived 10.000000000001 lands with 10.
    pub fn from_pips(pips: f64) -> StopBucket {
        let pips = (pips * 1e9).round() / 1e9;
        if pips <= 5.0 {
            StopBucket::UpTo5
        } else if pips <= 10.0 {
            StopBucket::From6To10
        } else if pips <= 15.0 {
            StopBucket::From11To15
        } else if pips <= 20.0 {
            StopBucket::From16To20
        } else {
            StopBucket::Above20
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StopBucket::UpTo5 => "0-5 pips",
            StopBucket::From6To10 => "6-10 pips",
            StopBucket::From11To15 => "11-15 pips",
            StopBucket::From16To20 => "16-20 pips",
            StopBucket::Above20 => "20+ pips",
        }
    }
}

/// Risk/reward band. Left-closed: exactly 2.0 falls in `From2To2_5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RrBucket {
    Below0_5,
    From0_5To1,
    From1To1_5,
    From1_5To2,
    From2To2_5,
    From2_5To3,
    From3To5,
    Above5,
}

impl RrBucket {
    pub const ALL: [RrBucket; 8] = [
        RrBucket::Below0_5,
        RrBucket::From0_5To1,
        RrBucket::From1To1_5,
        RrBucket::From1_5To2,
        RrBucket::From2To2_5,
        RrBucket::From2_5To3,
        RrBucket::From3To5,
        RrBucket::Above5,
    ];

    /// Ratios are snapped to 1e-9 first so 1.9999999999 lands with 2.0.
    pub fn from_ratio(rr: f64) -> RrBucket {
        let rr = (rr * 1e9).round() / 1e9;
        if rr < 0.5 {
            RrBucket::Below0_5
        } else if rr < 1.0 {
            RrBucket::From0_5To1
        } else if rr < 1.5 {
            RrBucket::From1To1_5
        } else if rr < 2.0 {
            RrBucket::From1_5To2
        } else if rr < 2.5 {
            RrBucket::From2To2_5
        } else if rr < 3.0 {
            RrBucket::From2_5To3
        } else if rr < 5.0 {
            RrBucket::From3To5
        } else {
            RrBucket::Above5
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RrBucket::Below0_5 => "0-0.5",
            RrBucket::From0_5To1 => "0.5-1.0",
            RrBucket::From1To1_5 => "1.0-1.5",
            RrBucket::From1_5To2 => "1.5-2.0",
            RrBucket::From2To2_5 => "2.0-2.5",
            RrBucket::From2_5To3 => "2.5-3.0",
            RrBucket::From3To5 => "3.0-5.0",
            RrBucket::Above5 => ">5.0",
        }
    }
}
