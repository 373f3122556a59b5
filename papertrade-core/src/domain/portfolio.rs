//! Portfolio: cash, open positions, and the full trade history.
//!
//! This is the whole persisted state. The engine mutates it only through
//! `Portfolio::apply_trade`; everything here is read-only bookkeeping.

use super::position::Position;
use super::trade::{Trade, TradeAction};
use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Starting cash for a fresh portfolio.
pub const DEFAULT_INITIAL_CAPITAL: f64 = 10_000.0;

fn default_initial_capital() -> f64 {
    DEFAULT_INITIAL_CAPITAL
}

fn load_time() -> NaiveDateTime {
    Local::now().naive_local()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub cash: f64,
    /// Older files predate this key; they load with the default.
    #[serde(default = "default_initial_capital")]
    pub initial_capital: f64,
    #[serde(default)]
    pub positions: BTreeMap<String, Position>,
    #[serde(default)]
    pub trade_history: Vec<Trade>,
    /// Missing in hand-made files; those start at load time.
    #[serde(default = "load_time")]
    pub start_date: NaiveDateTime,
    #[serde(default)]
    pub last_updated: Option<NaiveDateTime>,
}

impl Portfolio {
    pub fn new(initial_capital: f64, now: NaiveDateTime) -> Self {
        Self {
            cash: initial_capital,
            initial_capital,
            positions: BTreeMap::new(),
            trade_history: Vec::new(),
            start_date: now,
            last_updated: None,
        }
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    /// Shares held of `symbol` (zero if none).
    pub fn shares_of(&self, symbol: &str) -> f64 {
        self.positions.get(symbol).map_or(0.0, |p| p.shares)
    }

    /// Sum of realized P&L across every sell in the history.
    pub fn realized_pnl(&self) -> f64 {
        self.trade_history
            .iter()
            .filter_map(|t| t.profit_loss)
            .sum()
    }

    /// Net dollars moved out of cash by trading: buys minus sell proceeds.
    ///
    /// For an intact history, `initial_capital - net_invested() == cash`.
    pub fn net_invested(&self) -> f64 {
        self.trade_history
            .iter()
            .map(|t| match t.action {
                TradeAction::Buy => t.amount,
                TradeAction::Sell => -t.amount,
            })
            .sum()
    }

    pub fn trades_on(&self, date: NaiveDate) -> impl Iterator<Item = &Trade> {
        self.trade_history
            .iter()
            .filter(move |t| t.executed_on(date))
    }

    /// The last `n` trades, oldest first.
    pub fn recent_trades(&self, n: usize) -> &[Trade] {
        let start = self.trade_history.len().saturating_sub(n);
        &self.trade_history[start..]
    }

    pub fn days_since_start(&self, now: NaiveDateTime) -> i64 {
        (now - self.start_date).num_days().max(0)
    }
}
