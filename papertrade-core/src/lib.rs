//! papertrade core: paper portfolio engine and AI decision loop.
//!
//! - Domain types (portfolio, positions, trades, trade requests)
//! - Trade execution with weighted-average cost and realized P&L
//! - Whole-state JSON persistence with atomic replace and a lock file
//! - Price sources (Yahoo Finance, offline price table)
//! - Prediction sources (model output file, static set)
//! - Decision loop, polling scheduler, daily reports and alerts
//! - TOML configuration

pub mod config;
pub mod data;
pub mod decision;
pub mod domain;
pub mod engine;
pub mod predict;
pub mod report;
pub mod scheduler;
pub mod store;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: state and value types are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Portfolio>();
        require_sync::<domain::Portfolio>();
        require_send::<domain::Position>();
        require_sync::<domain::Position>();
        require_send::<domain::Trade>();
        require_sync::<domain::Trade>();
        require_send::<domain::TradeRequest>();
        require_sync::<domain::TradeRequest>();

        require_send::<engine::Valuation>();
        require_sync::<engine::Valuation>();
        require_send::<engine::TradeError>();
        require_sync::<engine::TradeError>();

        require_send::<store::PortfolioStore>();
        require_sync::<store::PortfolioStore>();

        require_send::<data::PriceTable>();
        require_sync::<data::PriceTable>();
        require_send::<data::CircuitBreaker>();
        require_sync::<data::CircuitBreaker>();
        require_send::<data::YahooQuotes>();
        require_sync::<data::YahooQuotes>();

        require_send::<predict::Prediction>();
        require_sync::<predict::Prediction>();
        require_send::<decision::CycleSummary>();
        require_sync::<decision::CycleSummary>();

        require_send::<config::TraderConfig>();
        require_sync::<config::TraderConfig>();
    }

    /// Trade application takes no price source or store: it is pure state.
    #[test]
    fn apply_trade_is_io_free() {
        fn _check(
            p: &mut domain::Portfolio,
            r: &domain::TradeRequest,
            at: chrono::NaiveDateTime,
        ) -> Result<domain::Trade, engine::TradeError> {
            p.apply_trade(r, 10.0, at)
        }
    }
}
