//! Price sources: the live Yahoo quote client and an offline price table.

pub mod circuit_breaker;
pub mod provider;
pub mod yahoo;

pub use circuit_breaker::CircuitBreaker;
pub use provider::{PriceSource, PriceTable, QuoteError};
pub use yahoo::YahooQuotes;
