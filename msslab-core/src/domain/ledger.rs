//! Append-only ledger of closed trades.

use serde::{Deserialize, Serialize};

use super::trade::ClosedTrade;

/// Closed trades in close order. There is no API to edit or remove an entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    trades: Vec<ClosedTrade>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, trade: ClosedTrade) {
        self.trades.push(trade);
    }

    pub fn trades(&self) -> &[ClosedTrade] {
        &self.trades
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ClosedTrade> {
        self.trades.iter()
    }

    pub fn total_pnl(&self) -> f64 {
        self.trades.iter().map(|t| t.pnl).sum()
    }

    pub fn into_trades(self) -> Vec<ClosedTrade> {
        self.trades
    }
}

impl<'a> IntoIterator for &'a Ledger {
    type Item = &'a ClosedTrade;
    type IntoIter = std::slice::Iter<'a, ClosedTrade>;

    fn into_iter(self) -> Self::IntoIter {
        self.trades.iter()
    }
}
