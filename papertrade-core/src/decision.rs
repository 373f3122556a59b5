//! AI decision loop: turns high-confidence predictions into trades.
//!
//! For each asset, in the order the prediction source returns them:
//! - below `min_confidence` → skipped
//! - UP and not held, with cash above `min_cash` → buy
//!   `min(total_value × max_position_size, cash × cash_fraction)` dollars
//! - DOWN and held → sell `sell_fraction` of the held shares
//!
//! `total_value` is computed once at cycle start; cash is re-read after every
//! trade. Budget is not allocated across assets, so early buys can starve
//! later ones. A failure on one asset is recorded and the loop moves on.

use crate::domain::{normalize_symbol, Trade, TradeRequest};
use crate::engine::PaperTrader;
use crate::predict::{Direction, Prediction, PredictionError, PredictionSource};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    pub min_confidence: f64,
    /// Cap on a new position as a fraction of total portfolio value.
    pub max_position_size: f64,
    /// Cap on a new position as a fraction of available cash.
    pub cash_fraction: f64,
    /// Buys are skipped at or below this much cash.
    pub min_cash: f64,
    /// Fraction of a held position sold on a DOWN signal.
    pub sell_fraction: f64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.6,
            max_position_size: 0.2,
            cash_fraction: 0.5,
            min_cash: 100.0,
            sell_fraction: 0.5,
        }
    }
}

impl DecisionConfig {
    pub fn validate(&self) -> Result<(), String> {
        let unit = |name: &str, v: f64, allow_zero: bool| {
            let ok = v.is_finite() && v <= 1.0 && if allow_zero { v >= 0.0 } else { v > 0.0 };
            if ok {
                Ok(())
            } else {
                Err(format!("trading.{name} must be within (0, 1], got {v}"))
            }
        };
        unit("min_confidence", self.min_confidence, true)?;
        unit("max_position_size", self.max_position_size, false)?;
        unit("cash_fraction", self.cash_fraction, false)?;
        unit("sell_fraction", self.sell_fraction, false)?;
        if !self.min_cash.is_finite() || self.min_cash < 0.0 {
            return Err(format!("trading.min_cash must be >= 0, got {}", self.min_cash));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    BelowThreshold,
    AlreadyHeld,
    CashBelowMinimum,
    NotHeld,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::BelowThreshold => "confidence below threshold",
            SkipReason::AlreadyHeld => "already held",
            SkipReason::CashBelowMinimum => "cash below minimum",
            SkipReason::NotHeld => "nothing to sell",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Trade(TradeRequest),
    Skip(SkipReason),
}

/// What the loop would do for one asset given the current state.
///
/// `held_shares` is zero when there is no position.
pub fn decide(
    symbol: &str,
    prediction: &Prediction,
    held_shares: f64,
    cash: f64,
    total_value: f64,
    config: &DecisionConfig,
) -> Decision {
    if prediction.confidence < config.min_confidence {
        return Decision::Skip(SkipReason::BelowThreshold);
    }
    match prediction.direction {
        Direction::Up => {
            if held_shares > 0.0 {
                Decision::Skip(SkipReason::AlreadyHeld)
            } else if cash <= config.min_cash {
                Decision::Skip(SkipReason::CashBelowMinimum)
            } else {
                let amount =
                    (total_value * config.max_position_size).min(cash * config.cash_fraction);
                Decision::Trade(TradeRequest::buy_amount(symbol, amount))
            }
        }
        Direction::Down => {
            if held_shares > 0.0 {
                Decision::Trade(TradeRequest::sell_shares(
                    symbol,
                    held_shares * config.sell_fraction,
                ))
            } else {
                Decision::Skip(SkipReason::NotHeld)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecisionOutcome {
    Traded(Trade),
    Skipped(SkipReason),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssetDecision {
    pub symbol: String,
    pub prediction: Prediction,
    pub outcome: DecisionOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleSummary {
    pub decisions: Vec<AssetDecision>,
    pub value_before: f64,
    pub value_after: f64,
}

impl CycleSummary {
    pub fn evaluated(&self) -> usize {
        self.decisions.len()
    }

    pub fn below_threshold(&self) -> usize {
        self.decisions
            .iter()
            .filter(|d| d.outcome == DecisionOutcome::Skipped(SkipReason::BelowThreshold))
            .count()
    }

    pub fn trades(&self) -> impl Iterator<Item = &Trade> {
        self.decisions.iter().filter_map(|d| match &d.outcome {
            DecisionOutcome::Traded(t) => Some(t),
            _ => None,
        })
    }

    pub fn trade_count(&self) -> usize {
        self.trades().count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.decisions.iter().filter_map(|d| match &d.outcome {
            DecisionOutcome::Failed(msg) => Some((d.symbol.as_str(), msg.as_str())),
            _ => None,
        })
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    pub fn value_change(&self) -> f64 {
        self.value_after - self.value_before
    }
}

/// Run one decision cycle against `trader`.
///
/// Only a failure to read predictions aborts the cycle.
pub fn run_decision_cycle(
    trader: &mut PaperTrader<'_>,
    predictions: &dyn PredictionSource,
    config: &DecisionConfig,
) -> Result<CycleSummary, PredictionError> {
    let predictions = predictions.predict_all()?;
    let value_before = trader.portfolio_value().total_value;
    log::info!(
        "decision cycle: {} predictions, portfolio ${value_before:.2}",
        predictions.len()
    );

    let mut decisions = Vec::with_capacity(predictions.len());
    for (raw_symbol, prediction) in predictions {
        let symbol = normalize_symbol(&raw_symbol);
        let portfolio = trader.portfolio();
        let decision = decide(
            &symbol,
            &prediction,
            portfolio.shares_of(&symbol),
            portfolio.cash,
            value_before,
            config,
        );

        let outcome = match decision {
            Decision::Skip(reason) => {
                log::debug!(
                    "{symbol}: {} {:.1}% skipped ({reason})",
                    prediction.direction,
                    prediction.confidence * 100.0
                );
                DecisionOutcome::Skipped(reason)
            }
            Decision::Trade(request) => {
                log::info!(
                    "{symbol}: {} signal at {:.1}% confidence, placing {}",
                    prediction.direction,
                    prediction.confidence * 100.0,
                    request.action
                );
                match trader.execute_trade(&request) {
                    Ok(trade) => DecisionOutcome::Traded(trade),
                    Err(e) => {
                        log::warn!("{symbol}: trade failed: {e}");
                        DecisionOutcome::Failed(e.to_string())
                    }
                }
            }
        };

        decisions.push(AssetDecision {
            symbol,
            prediction,
            outcome,
        });
    }

    let value_after = trader.portfolio_value().total_value;
    let summary = CycleSummary {
        decisions,
        value_before,
        value_after,
    };
    log::info!(
        "cycle complete: {} evaluated, {} trades, {} failures, value ${:.2} -> ${:.2}",
        summary.evaluated(),
        summary.trade_count(),
        summary.failure_count(),
        summary.value_before,
        summary.value_after
    );
    Ok(summary)
}
