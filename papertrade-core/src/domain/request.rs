//! Trade requests as issued by the CLI or the decision loop.

use super::trade::TradeAction;

/// How much to trade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TradeSize {
    /// A share count.
    Shares(f64),
    /// A dollar amount, converted to shares at the execution price.
    Amount(f64),
    /// The whole position (sells only).
    All,
}

/// A request to buy or sell one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRequest {
    pub symbol: String,
    pub action: TradeAction,
    pub size: TradeSize,
}

impl TradeRequest {
    pub fn new(symbol: impl Into<String>, action: TradeAction, size: TradeSize) -> Self {
        Self {
            symbol: symbol.into(),
            action,
            size,
        }
    }

    pub fn buy_amount(symbol: impl Into<String>, amount: f64) -> Self {
        Self::new(symbol, TradeAction::Buy, TradeSize::Amount(amount))
    }

    pub fn buy_shares(symbol: impl Into<String>, shares: f64) -> Self {
        Self::new(symbol, TradeAction::Buy, TradeSize::Shares(shares))
    }

    pub fn sell_shares(symbol: impl Into<String>, shares: f64) -> Self {
        Self::new(symbol, TradeAction::Sell, TradeSize::Shares(shares))
    }

    pub fn sell_amount(symbol: impl Into<String>, amount: f64) -> Self {
        Self::new(symbol, TradeAction::Sell, TradeSize::Amount(amount))
    }

    pub fn sell_all(symbol: impl Into<String>) -> Self {
        Self::new(symbol, TradeAction::Sell, TradeSize::All)
    }
}
