//! Shared command context: resolved config plus the chosen price source.

use anyhow::{Context, Result};
use chrono::Local;
use papertrade_core::config::TraderConfig;
use papertrade_core::data::{CircuitBreaker, PriceSource, PriceTable, YahooQuotes};
use papertrade_core::decision::{run_decision_cycle, CycleSummary};
use papertrade_core::engine::PaperTrader;
use papertrade_core::predict::PredictionFile;
use papertrade_core::report::{evaluate_alerts, Alert, DailyReport, ReportArchive};
use papertrade_core::scheduler::CycleHistory;
use papertrade_core::store::PortfolioStore;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub struct App {
    pub config: TraderConfig,
    prices: Box<dyn PriceSource>,
}

/// Everything one decision cycle produced.
pub struct CycleReport {
    pub summary: CycleSummary,
    pub alerts: Vec<Alert>,
}

impl App {
    /// Offline price table when `prices` is given, Yahoo otherwise.
    pub fn new(config: TraderConfig, prices: Option<&Path>) -> Result<Self> {
        let prices: Box<dyn PriceSource> = match prices {
            Some(path) => {
                let table = PriceTable::from_file(path)
                    .with_context(|| format!("loading price table {}", path.display()))?;
                log::info!("using offline price table ({} symbols)", table.len());
                Box::new(table)
            }
            None => {
                let q = &config.quotes;
                let breaker = Arc::new(CircuitBreaker::new(Duration::from_secs(q.cooldown_secs)));
                Box::new(YahooQuotes::new(
                    breaker,
                    Duration::from_secs(q.timeout_secs),
                    q.max_retries,
                )?)
            }
        };
        Ok(Self { config, prices })
    }

    pub fn prices(&self) -> &dyn PriceSource {
        &*self.prices
    }

    pub fn trader(&self) -> Result<PaperTrader<'_>> {
        let store = PortfolioStore::new(&self.config.portfolio.path);
        Ok(PaperTrader::open(
            store,
            self.prices(),
            self.config.portfolio.initial_capital,
        )?)
    }

    pub fn prediction_source(&self) -> PredictionFile {
        PredictionFile::new(&self.config.predictions.path)
    }

    pub fn history(&self) -> CycleHistory {
        CycleHistory::new(
            &self.config.schedule.history_path,
            self.config.schedule.retention_days,
        )
    }

    pub fn archive(&self) -> ReportArchive {
        ReportArchive::new(&self.config.reports.dir)
    }

    /// One decision cycle, followed by alert checks and today's report.
    pub fn run_cycle(&self) -> Result<CycleReport> {
        let mut trader = self.trader()?;
        let summary = run_decision_cycle(
            &mut trader,
            &self.prediction_source(),
            &self.config.trading,
        )
        .context("decision cycle")?;

        let alerts = evaluate_alerts(
            &self.config.alerts,
            trader.portfolio().initial_capital,
            summary.value_before,
            summary.value_after,
        );

        let valuation = trader.portfolio_value();
        let report = DailyReport::build(trader.portfolio(), &valuation, Local::now().naive_local());
        if let Err(e) = self.archive().save(&report) {
            log::warn!("failed to save daily report: {e}");
        }

        Ok(CycleReport { summary, alerts })
    }
}
