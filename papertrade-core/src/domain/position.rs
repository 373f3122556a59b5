//! Position: a held quantity of one asset with a weighted-average cost basis.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Remaining share counts at or below this are treated as a closed position.
pub const DUST_SHARES: f64 = 1e-4;

/// An open long position.
///
/// `avg_price` is the volume-weighted average cost of every buy folded into
/// the position. Sells reduce `shares` but never change `avg_price`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub shares: f64,
    pub avg_price: f64,
    pub last_updated: NaiveDateTime,
}

impl Position {
    /// Open a new position from a first buy.
    pub fn open(shares: f64, price: f64, at: NaiveDateTime) -> Self {
        Self {
            shares,
            avg_price: price,
            last_updated: at,
        }
    }

    /// Fold a buy of `shares` costing `amount` dollars into the position.
    ///
    /// `new_avg = (old_shares * old_avg + amount) / (old_shares + shares)`
    pub fn add(&mut self, shares: f64, amount: f64, at: NaiveDateTime) {
        let total_shares = self.shares + shares;
        self.avg_price = (self.cost_basis() + amount) / total_shares;
        self.shares = total_shares;
        self.last_updated = at;
    }

    /// Dollars paid for the shares still held.
    pub fn cost_basis(&self) -> f64 {
        self.shares * self.avg_price
    }

    pub fn market_value(&self, current_price: f64) -> f64 {
        self.shares * current_price
    }

    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        (current_price - self.avg_price) * self.shares
    }

    /// Unrealized return in percent of cost.
    pub fn unrealized_pnl_pct(&self, current_price: f64) -> f64 {
        if self.avg_price <= 0.0 {
            return 0.0;
        }
        (current_price - self.avg_price) / self.avg_price * 100.0
    }

    pub fn is_dust(&self) -> bool {
        self.shares <= DUST_SHARES
    }
}
