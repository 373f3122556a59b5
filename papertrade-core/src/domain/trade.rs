//! Trade: immutable record of one executed BUY or SELL.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeAction {
    Buy,
    Sell,
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::Buy => f.write_str("BUY"),
            TradeAction::Sell => f.write_str("SELL"),
        }
    }
}

impl FromStr for TradeAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(TradeAction::Buy),
            "SELL" => Ok(TradeAction::Sell),
            other => Err(format!("unknown trade action '{other}' (expected BUY or SELL)")),
        }
    }
}

/// An executed trade, appended to the portfolio's history.
///
/// `profit_loss` and `profit_loss_pct` are realized figures and are only
/// present on sells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub timestamp: NaiveDateTime,
    pub symbol: String,
    pub action: TradeAction,
    pub shares: f64,
    pub price: f64,
    pub amount: f64,
    pub cash_after: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profit_loss: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profit_loss_pct: Option<f64>,
}

impl Trade {
    /// Whether a sell closed at a profit. `None` for buys.
    pub fn is_winner(&self) -> Option<bool> {
        self.profit_loss.map(|pnl| pnl > 0.0)
    }

    pub fn executed_on(&self, date: NaiveDate) -> bool {
        self.timestamp.date() == date
    }
}
