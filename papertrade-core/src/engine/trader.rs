//! `PaperTrader`: the portfolio engine bound to a store and a price source.
//!
//! Every trade is a locked transaction on the store: reload the latest file,
//! apply, save. The in-memory copy is refreshed from whatever was written.

use super::error::TradeError;
use super::valuation::{value_portfolio, Valuation};
use crate::data::PriceSource;
use crate::domain::{normalize_symbol, Portfolio, Trade, TradeRequest};
use crate::store::{LoadOrigin, PortfolioStore, StoreError};
use chrono::{Local, NaiveDateTime};

/// Snapshot for the status view.
#[derive(Debug, Clone)]
pub struct PortfolioStatus {
    pub valuation: Valuation,
    pub initial_capital: f64,
    pub total_return_pct: f64,
    pub realized_pnl: f64,
    pub start_date: NaiveDateTime,
    pub days_since_start: i64,
    pub recent_trades: Vec<Trade>,
}

pub struct PaperTrader<'a> {
    store: PortfolioStore,
    prices: &'a dyn PriceSource,
    initial_capital: f64,
    portfolio: Portfolio,
    origin: LoadOrigin,
}

impl<'a> PaperTrader<'a> {
    /// Load (or initialize) the portfolio behind `store`.
    pub fn open(
        store: PortfolioStore,
        prices: &'a dyn PriceSource,
        initial_capital: f64,
    ) -> Result<Self, StoreError> {
        let outcome = store.load(initial_capital)?;
        log::info!(
            "portfolio loaded from {} ({:?}): cash ${:.2}, {} positions, {} trades",
            store.path().display(),
            outcome.origin,
            outcome.portfolio.cash,
            outcome.portfolio.positions.len(),
            outcome.portfolio.trade_history.len()
        );
        Ok(Self {
            store,
            prices,
            initial_capital,
            portfolio: outcome.portfolio,
            origin: outcome.origin,
        })
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn origin(&self) -> &LoadOrigin {
        &self.origin
    }

    pub fn store(&self) -> &PortfolioStore {
        &self.store
    }

    pub fn prices(&self) -> &dyn PriceSource {
        self.prices
    }

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    pub fn current_price(&self, symbol: &str) -> Result<f64, TradeError> {
        self.prices
            .latest_price(symbol)
            .map_err(|source| TradeError::PriceUnavailable {
                symbol: symbol.to_string(),
                source,
            })
    }

    /// Quote, apply, and persist one trade.
    pub fn execute_trade(&mut self, request: &TradeRequest) -> Result<Trade, TradeError> {
        let symbol = normalize_symbol(&request.symbol);
        if symbol.is_empty() {
            return Err(TradeError::InvalidSymbol(request.symbol.clone()));
        }
        let request = TradeRequest {
            symbol,
            ..request.clone()
        };

        let price = self.current_price(&request.symbol)?;
        let at = Local::now().naive_local();
        let (portfolio, trade) = self
            .store
            .transact(self.initial_capital, |p| p.apply_trade(&request, price, at))?;
        self.portfolio = portfolio;

        match trade.profit_loss {
            Some(pnl) => log::info!(
                "{} {:.4} {} @ ${:.2} = ${:.2} (P&L ${:+.2})",
                trade.action,
                trade.shares,
                trade.symbol,
                trade.price,
                trade.amount,
                pnl
            ),
            None => log::info!(
                "{} {:.4} {} @ ${:.2} = ${:.2}",
                trade.action,
                trade.shares,
                trade.symbol,
                trade.price,
                trade.amount
            ),
        }
        Ok(trade)
    }

    pub fn portfolio_value(&self) -> Valuation {
        value_portfolio(&self.portfolio, self.prices)
    }

    /// Pick up changes written by other processes.
    pub fn reload(&mut self) -> Result<(), StoreError> {
        let outcome = self.store.load(self.initial_capital)?;
        self.portfolio = outcome.portfolio;
        self.origin = outcome.origin;
        Ok(())
    }

    pub fn reset(&mut self) -> Result<(), StoreError> {
        self.portfolio = self.store.reset(self.initial_capital)?;
        self.origin = LoadOrigin::Existing;
        Ok(())
    }

    pub fn status(&self, recent: usize) -> PortfolioStatus {
        let valuation = self.portfolio_value();
        let initial_capital = self.portfolio.initial_capital;
        PortfolioStatus {
            total_return_pct: valuation.total_return_pct(initial_capital),
            valuation,
            initial_capital,
            realized_pnl: self.portfolio.realized_pnl(),
            start_date: self.portfolio.start_date,
            days_since_start: self
                .portfolio
                .days_since_start(Local::now().naive_local()),
            recent_trades: self.portfolio.recent_trades(recent).to_vec(),
        }
    }
}
