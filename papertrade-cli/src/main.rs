//! papertrade CLI: paper portfolio, manual trades, and the AI decision loop.
//!
//! Commands:
//! - `status`: portfolio value, positions, recent trades
//! - `buy` / `sell`: one manual trade at the current price
//! - `auto`: run one decision cycle over the latest predictions
//! - `run`: run decision cycles on a fixed interval
//! - `manual` / `menu`: interactive prompt and numbered menu
//! - `predictions`: high-confidence predictions, most confident first
//! - `history`: recorded scheduler cycles
//! - `report`: save today's report and show performance metrics
//! - `reset`: start over with fresh capital

mod app;
mod display;
mod menu;

use anyhow::{bail, Result};
use app::App;
use chrono::Local;
use clap::{Parser, Subcommand};
use papertrade_core::config::{ScheduleSettings, TraderConfig};
use papertrade_core::domain::TradeRequest;
use papertrade_core::predict::{top_predictions, PredictionSource};
use papertrade_core::report::{DailyReport, PerformanceMetrics};
use papertrade_core::scheduler::{run_schedule, CycleOutcome};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "papertrade",
    about = "papertrade: paper portfolio engine with an AI decision loop"
)]
struct Cli {
    /// TOML config file. Missing file means all defaults.
    #[arg(long, global = true, default_value = "papertrade.toml")]
    config: PathBuf,

    /// Portfolio JSON file (overrides config).
    #[arg(long, global = true)]
    portfolio: Option<PathBuf>,

    /// Offline price table JSON; no network access when set.
    #[arg(long, global = true)]
    prices: Option<PathBuf>,

    /// Prediction file, CSV or JSON (overrides config).
    #[arg(long, global = true)]
    predictions: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show cash, positions with unrealized P&L, and recent trades.
    Status {
        /// Number of recent trades to show.
        #[arg(long, default_value_t = 5)]
        trades: usize,
    },
    /// Buy a symbol by dollar amount or share count.
    Buy {
        symbol: String,

        /// Dollars to spend.
        #[arg(long, conflicts_with = "shares", required_unless_present = "shares")]
        amount: Option<f64>,

        /// Shares to buy.
        #[arg(long)]
        shares: Option<f64>,
    },
    /// Sell shares, a dollar amount, or (with neither) the whole position.
    Sell {
        symbol: String,

        /// Shares to sell.
        #[arg(long, conflicts_with = "amount")]
        shares: Option<f64>,

        /// Dollar amount to sell (capped at the position).
        #[arg(long)]
        amount: Option<f64>,
    },
    /// Run one AI decision cycle.
    Auto,
    /// Run AI decision cycles on a fixed interval until stopped.
    Run {
        /// Hours between cycles (overrides config).
        #[arg(long)]
        interval_hours: Option<f64>,

        /// Stop after this many cycles.
        #[arg(long)]
        max_cycles: Option<usize>,
    },
    /// Interactive manual trading prompt.
    Manual,
    /// Interactive numbered menu.
    Menu,
    /// Show predictions at or above the confidence threshold.
    Predictions {
        /// Minimum confidence (overrides config).
        #[arg(long)]
        min_confidence: Option<f64>,
    },
    /// Show recorded scheduler cycles.
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Save today's daily report and show performance metrics.
    Report {
        /// Only compute metrics over the last N days of reports.
        #[arg(long)]
        days: Option<i64>,
    },
    /// Replace the portfolio with fresh capital.
    Reset {
        /// Actually reset (without this flag, only shows what would happen).
        #[arg(long, default_value_t = false)]
        confirm: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut config = TraderConfig::load_or_default(&cli.config)?;
    if let Some(path) = cli.portfolio {
        config.portfolio.path = path;
    }
    if let Some(path) = cli.predictions {
        config.predictions.path = path;
    }
    let app = App::new(config, cli.prices.as_deref())?;

    match cli.command {
        Commands::Status { trades } => run_status(&app, trades),
        Commands::Buy {
            symbol,
            amount,
            shares,
        } => {
            let request = match (amount, shares) {
                (Some(a), None) => TradeRequest::buy_amount(symbol, a),
                (None, Some(s)) => TradeRequest::buy_shares(symbol, s),
                _ => bail!("specify exactly one of --amount or --shares"),
            };
            run_trade(&app, &request)
        }
        Commands::Sell {
            symbol,
            shares,
            amount,
        } => {
            let request = match (shares, amount) {
                (Some(s), None) => TradeRequest::sell_shares(symbol, s),
                (None, Some(a)) => TradeRequest::sell_amount(symbol, a),
                (None, None) => TradeRequest::sell_all(symbol),
                _ => bail!("--shares and --amount are mutually exclusive"),
            };
            run_trade(&app, &request)
        }
        Commands::Auto => run_auto(&app),
        Commands::Run {
            interval_hours,
            max_cycles,
        } => run_scheduler(app, interval_hours, max_cycles),
        Commands::Manual => menu::manual_session(&app, &mut std::io::stdin().lock()),
        Commands::Menu => menu::main_menu(&app, &mut std::io::stdin().lock()),
        Commands::Predictions { min_confidence } => run_predictions(&app, min_confidence),
        Commands::History { limit } => {
            display::print_history(&app.history().recent(limit)?);
            Ok(())
        }
        Commands::Report { days } => run_report(&app, days),
        Commands::Reset { confirm } => run_reset(&app, confirm),
    }
}

fn run_status(app: &App, trades: usize) -> Result<()> {
    let trader = app.trader()?;
    display::print_status(&trader.status(trades));
    Ok(())
}

fn run_trade(app: &App, request: &TradeRequest) -> Result<()> {
    let mut trader = app.trader()?;
    let trade = trader.execute_trade(request)?;
    display::print_trade(&trade);
    Ok(())
}

fn run_auto(app: &App) -> Result<()> {
    let cycle = app.run_cycle()?;
    display::print_cycle(&cycle.summary, &cycle.alerts);
    Ok(())
}

fn run_scheduler(mut app: App, interval_hours: Option<f64>, max_cycles: Option<usize>) -> Result<()> {
    if let Some(hours) = interval_hours {
        app.config.schedule.interval_hours = ScheduleSettings::check_interval_hours(hours)?;
    }
    let schedule = app.config.schedule.to_schedule(max_cycles)?;
    let history = app.history();

    // Ctrl-C lets the running cycle finish and release the portfolio lock.
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, stopping after the current cycle...");
        flag.store(true, Ordering::SeqCst);
    }) {
        log::warn!("could not install Ctrl-C handler: {e}");
    }

    let summary = run_schedule(&schedule, Some(&history), Some(&*cancel), |_| {
        let cycle = app.run_cycle().map_err(|e| format!("{e:#}"))?;
        display::print_cycle(&cycle.summary, &cycle.alerts);
        Ok(CycleOutcome {
            trades_executed: cycle.summary.trade_count(),
            portfolio_value: cycle.summary.value_after,
        })
    });

    if summary.cancelled {
        println!("Scheduler stopped by interrupt.");
    }
    println!(
        "Ran {} cycles ({} failed), {} trades",
        summary.cycles_run, summary.cycles_failed, summary.total_trades
    );
    Ok(())
}

fn run_predictions(app: &App, min_confidence: Option<f64>) -> Result<()> {
    let min = min_confidence.unwrap_or(app.config.trading.min_confidence);
    let all = app.prediction_source().predict_all()?;
    display::print_predictions(&top_predictions(&all, min), min);
    Ok(())
}

fn run_report(app: &App, days: Option<i64>) -> Result<()> {
    let trader = app.trader()?;
    let valuation = trader.portfolio_value();
    let now = Local::now().naive_local();
    let report = DailyReport::build(trader.portfolio(), &valuation, now);
    let archive = app.archive();
    archive.save(&report)?;
    let reports = match days {
        Some(days) if days < 0 => bail!("--days must not be negative, got {days}"),
        Some(days) => archive.load_recent(days, now.date())?,
        None => archive.load_all()?,
    };
    display::print_report(&report, PerformanceMetrics::from_reports(&reports).as_ref());
    Ok(())
}

fn run_reset(app: &App, confirm: bool) -> Result<()> {
    let capital = app.config.portfolio.initial_capital;
    if !confirm {
        println!(
            "Would reset {} to ${capital:.2} (all positions and history discarded). Re-run with --confirm.",
            app.config.portfolio.path.display()
        );
        return Ok(());
    }
    let mut trader = app.trader()?;
    trader.reset()?;
    println!("Portfolio reset to ${capital:.2}");
    Ok(())
}
