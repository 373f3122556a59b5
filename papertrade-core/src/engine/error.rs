use crate::data::QuoteError;
use crate::store::StoreError;
use thiserror::Error;

/// Why a trade was rejected. A rejected trade never changes the portfolio.
#[derive(Debug, Error)]
pub enum TradeError {
    #[error("cannot get current price for {symbol}: {source}")]
    PriceUnavailable {
        symbol: String,
        #[source]
        source: QuoteError,
    },

    #[error("invalid price {price} for {symbol}")]
    InvalidPrice { symbol: String, price: f64 },

    #[error("invalid symbol '{0}'")]
    InvalidSymbol(String),

    #[error("invalid trade size: {0}")]
    InvalidSize(String),

    #[error("insufficient funds: ${required:.2} required, ${available:.2} available")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("no position in {symbol} to sell")]
    NoPosition { symbol: String },

    #[error("cannot sell {requested:.4} shares of {symbol}, only {available:.4} available")]
    InsufficientShares {
        symbol: String,
        requested: f64,
        available: f64,
    },

    #[error("portfolio store error: {0}")]
    Store(#[from] StoreError),
}
