//! Paper portfolio engine: trade execution, valuation, and the persistent
//! `PaperTrader` front end.

pub mod error;
pub mod execution;
pub mod trader;
pub mod valuation;

pub use error::TradeError;
pub use trader::{PaperTrader, PortfolioStatus};
pub use valuation::{value_portfolio, PositionValuation, PriceBasis, Valuation};
