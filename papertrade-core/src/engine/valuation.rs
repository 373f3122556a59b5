//! Mark-to-market valuation of a portfolio against a price source.

use crate::data::PriceSource;
use crate::domain::Portfolio;

/// Where a position's mark came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceBasis {
    /// Quoted by the price source.
    Live,
    /// The quote failed; valued at average cost instead.
    CostBasis,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionValuation {
    pub symbol: String,
    pub shares: f64,
    pub avg_price: f64,
    pub current_price: f64,
    pub basis: PriceBasis,
    pub market_value: f64,
    pub unrealized_pnl: f64,
    pub unrealized_pnl_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Valuation {
    pub cash: f64,
    pub positions: Vec<PositionValuation>,
    pub positions_value: f64,
    pub total_value: f64,
}

impl Valuation {
    /// Positions that could not be quoted live.
    pub fn degraded(&self) -> impl Iterator<Item = &PositionValuation> {
        self.positions
            .iter()
            .filter(|p| p.basis == PriceBasis::CostBasis)
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded().next().is_some()
    }

    /// Return on `initial_capital`, in percent.
    pub fn total_return_pct(&self, initial_capital: f64) -> f64 {
        if initial_capital <= 0.0 {
            return 0.0;
        }
        (self.total_value - initial_capital) / initial_capital * 100.0
    }
}

/// `cash + Σ shares × current price`.
///
/// A failed quote values that position at its average price; the position
/// is marked `PriceBasis::CostBasis` and a warning is logged.
pub fn value_portfolio(portfolio: &Portfolio, prices: &dyn PriceSource) -> Valuation {
    let mut positions = Vec::with_capacity(portfolio.positions.len());
    let mut positions_value = 0.0;

    for (symbol, pos) in &portfolio.positions {
        let (current_price, basis) = match prices.latest_price(symbol) {
            Ok(price) => (price, PriceBasis::Live),
            Err(e) => {
                log::warn!(
                    "no live price for {symbol} ({e}); valuing at average cost {:.4}",
                    pos.avg_price
                );
                (pos.avg_price, PriceBasis::CostBasis)
            }
        };
        let market_value = pos.market_value(current_price);
        positions_value += market_value;
        positions.push(PositionValuation {
            symbol: symbol.clone(),
            shares: pos.shares,
            avg_price: pos.avg_price,
            current_price,
            basis,
            market_value,
            unrealized_pnl: pos.unrealized_pnl(current_price),
            unrealized_pnl_pct: pos.unrealized_pnl_pct(current_price),
        });
    }

    Valuation {
        cash: portfolio.cash,
        positions,
        positions_value,
        total_value: portfolio.cash + positions_value,
    }
}
