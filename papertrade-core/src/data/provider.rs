//! Price source trait and structured quote errors.
//!
//! `PriceSource` abstracts over where the latest price comes from (Yahoo
//! Finance, a fixed offline table) so the engine can be driven by either and
//! tests never touch the network.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Structured error types for price lookups.
#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("no recent price for {symbol}")]
    NoRecentPrice { symbol: String },

    #[error("hard stop: quote provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("price table error: {0}")]
    PriceTable(String),

    #[error("quote error: {0}")]
    Other(String),
}

/// Anything that can quote a latest price for a symbol.
pub trait PriceSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Most recent price for `symbol`. Always finite and positive on `Ok`.
    fn latest_price(&self, symbol: &str) -> Result<f64, QuoteError>;
}

/// A fixed symbol → price map.
///
/// Used for offline runs (`--prices table.json`) and throughout the tests.
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    prices: HashMap<String, f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PriceTableFile {
    Flat(HashMap<String, f64>),
    Wrapped { prices: HashMap<String, f64> },
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, symbol: &str, price: f64) -> Self {
        self.set(symbol, price);
        self
    }

    pub fn set(&mut self, symbol: &str, price: f64) {
        self.prices.insert(symbol.to_ascii_uppercase(), price);
    }

    pub fn remove(&mut self, symbol: &str) {
        self.prices.remove(&symbol.to_ascii_uppercase());
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Parse `{"AAPL": 190.1, ...}` or `{"prices": {"AAPL": 190.1, ...}}`.
    pub fn from_json(text: &str) -> Result<Self, QuoteError> {
        let parsed: PriceTableFile =
            serde_json::from_str(text).map_err(|e| QuoteError::PriceTable(e.to_string()))?;
        let raw = match parsed {
            PriceTableFile::Flat(map) => map,
            PriceTableFile::Wrapped { prices } => prices,
        };
        let mut table = Self::new();
        for (symbol, price) in raw {
            if !price.is_finite() || price <= 0.0 {
                return Err(QuoteError::PriceTable(format!(
                    "invalid price {price} for {symbol}"
                )));
            }
            table.set(&symbol, price);
        }
        Ok(table)
    }

    pub fn from_file(path: &Path) -> Result<Self, QuoteError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| QuoteError::PriceTable(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }
}

impl PriceSource for PriceTable {
    fn name(&self) -> &str {
        "price_table"
    }

    fn latest_price(&self, symbol: &str) -> Result<f64, QuoteError> {
        self.prices
            .get(&symbol.to_ascii_uppercase())
            .copied()
            .ok_or_else(|| QuoteError::SymbolNotFound {
                symbol: symbol.to_string(),
            })
    }
}
