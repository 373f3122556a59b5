//! Trade execution: the pure state transition for one BUY or SELL.
//!
//! Handles position creation, weighted-average cost on adds, realized P&L on
//! sells, and removal of dust positions. All validation happens before any
//! field is touched, so an `Err` leaves the portfolio exactly as it was.

use super::error::TradeError;
use crate::domain::{Portfolio, Position, Trade, TradeAction, TradeRequest, TradeSize};
use chrono::NaiveDateTime;

fn check_positive(label: &str, value: f64) -> Result<f64, TradeError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(TradeError::InvalidSize(format!(
            "{label} must be a positive number, got {value}"
        )))
    }
}

impl Portfolio {
    /// Apply `request` at `price`, appending the resulting trade to history.
    ///
    /// Cash changes by exactly the trade amount: a buy of amount `a` leaves
    /// `cash - a`, a sell of amount `a` leaves `cash + a`.
    pub fn apply_trade(
        &mut self,
        request: &TradeRequest,
        price: f64,
        at: NaiveDateTime,
    ) -> Result<Trade, TradeError> {
        if request.symbol.trim().is_empty() {
            return Err(TradeError::InvalidSymbol(request.symbol.clone()));
        }
        if !price.is_finite() || price <= 0.0 {
            return Err(TradeError::InvalidPrice {
                symbol: request.symbol.clone(),
                price,
            });
        }

        let trade = match request.action {
            TradeAction::Buy => self.apply_buy(&request.symbol, request.size, price, at)?,
            TradeAction::Sell => self.apply_sell(&request.symbol, request.size, price, at)?,
        };
        self.trade_history.push(trade.clone());
        Ok(trade)
    }

    fn apply_buy(
        &mut self,
        symbol: &str,
        size: TradeSize,
        price: f64,
        at: NaiveDateTime,
    ) -> Result<Trade, TradeError> {
        let (shares, amount) = match size {
            TradeSize::Amount(amount) => {
                let amount = check_positive("amount", amount)?;
                (amount / price, amount)
            }
            TradeSize::Shares(shares) => {
                let shares = check_positive("shares", shares)?;
                (shares, shares * price)
            }
            TradeSize::All => {
                return Err(TradeError::InvalidSize(
                    "a buy needs a share count or dollar amount".into(),
                ))
            }
        };

        if amount > self.cash {
            return Err(TradeError::InsufficientFunds {
                required: amount,
                available: self.cash,
            });
        }

        self.cash -= amount;
        match self.positions.get_mut(symbol) {
            Some(pos) => pos.add(shares, amount, at),
            None => {
                self.positions
                    .insert(symbol.to_string(), Position::open(shares, price, at));
            }
        }

        Ok(Trade {
            timestamp: at,
            symbol: symbol.to_string(),
            action: TradeAction::Buy,
            shares,
            price,
            amount,
            cash_after: self.cash,
            profit_loss: None,
            profit_loss_pct: None,
        })
    }

    fn apply_sell(
        &mut self,
        symbol: &str,
        size: TradeSize,
        price: f64,
        at: NaiveDateTime,
    ) -> Result<Trade, TradeError> {
        let Some(pos) = self.positions.get_mut(symbol) else {
            return Err(TradeError::NoPosition {
                symbol: symbol.to_string(),
            });
        };
        let held = pos.shares;

        let shares = match size {
            TradeSize::Shares(shares) => {
                let shares = check_positive("shares", shares)?;
                if shares > held {
                    return Err(TradeError::InsufficientShares {
                        symbol: symbol.to_string(),
                        requested: shares,
                        available: held,
                    });
                }
                shares
            }
            TradeSize::Amount(amount) => {
                let amount = check_positive("amount", amount)?;
                (amount / price).min(held)
            }
            TradeSize::All => held,
        };

        let amount = shares * price;
        let avg = pos.avg_price;
        let profit_loss = (price - avg) * shares;
        let profit_loss_pct = if avg > 0.0 {
            (price - avg) / avg * 100.0
        } else {
            0.0
        };

        pos.shares = held - shares;
        pos.last_updated = at;
        if pos.is_dust() {
            self.positions.remove(symbol);
        }
        self.cash += amount;

        Ok(Trade {
            timestamp: at,
            symbol: symbol.to_string(),
            action: TradeAction::Sell,
            shares,
            price,
            amount,
            cash_after: self.cash,
            profit_loss: Some(profit_loss),
            profit_loss_pct: Some(profit_loss_pct),
        })
    }
}
