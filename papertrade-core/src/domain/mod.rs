//! Domain types for the paper portfolio.

pub mod portfolio;
pub mod position;
pub mod request;
pub mod trade;

pub use portfolio::{Portfolio, DEFAULT_INITIAL_CAPITAL};
pub use position::{Position, DUST_SHARES};
pub use request::{TradeRequest, TradeSize};
pub use trade::{Trade, TradeAction};

/// Normalize a user-supplied ticker: trimmed and upper-cased.
pub fn normalize_symbol(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}
