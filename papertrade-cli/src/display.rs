//! Terminal rendering for status, trades, cycles, and reports.

use colored::{ColoredString, Colorize};
use papertrade_core::decision::{CycleSummary, DecisionOutcome};
use papertrade_core::domain::{Trade, TradeAction};
use papertrade_core::engine::{PortfolioStatus, PriceBasis};
use papertrade_core::predict::{Direction, Prediction};
use papertrade_core::report::{Alert, DailyReport, PerformanceMetrics};
use papertrade_core::scheduler::CycleRecord;

fn signed(value: f64, text: String) -> ColoredString {
    if value > 0.0 {
        text.green()
    } else if value < 0.0 {
        text.red()
    } else {
        text.normal()
    }
}

fn money(value: f64) -> ColoredString {
    signed(value, format!("${value:+.2}"))
}

fn pct(value: f64) -> ColoredString {
    signed(value, format!("{value:+.2}%"))
}

pub fn print_status(status: &PortfolioStatus) {
    let v = &status.valuation;
    println!("{}", "PAPER TRADING PORTFOLIO".bold());
    println!("{}", "=".repeat(60));
    println!("Cash:            ${:.2}", v.cash);
    println!("Positions value: ${:.2}", v.positions_value);
    println!("Total value:     ${:.2}", v.total_value);
    println!(
        "Total return:    {} (from ${:.2})",
        pct(status.total_return_pct),
        status.initial_capital
    );
    println!("Realized P&L:    {}", money(status.realized_pnl));
    println!(
        "Started:         {} ({} days)",
        status.start_date.format("%Y-%m-%d"),
        status.days_since_start
    );

    println!();
    if v.positions.is_empty() {
        println!("No open positions.");
    } else {
        println!(
            "{:<10} {:>12} {:>10} {:>10} {:>12} {:>12} {:>9}",
            "Symbol", "Shares", "Avg", "Price", "Value", "P&L", "P&L %"
        );
        println!("{}", "-".repeat(81));
        for p in &v.positions {
            let marker = if p.basis == PriceBasis::CostBasis { "*" } else { "" };
            println!(
                "{:<10} {:>12.4} {:>10.2} {:>9.2}{:<1} {:>12.2} {:>12} {:>9}",
                p.symbol,
                p.shares,
                p.avg_price,
                p.current_price,
                marker,
                p.market_value,
                money(p.unrealized_pnl),
                pct(p.unrealized_pnl_pct)
            );
        }
        if v.is_degraded() {
            println!(
                "{}",
                "* no live quote; valued at average cost".yellow()
            );
        }
    }

    if !status.recent_trades.is_empty() {
        println!();
        println!("{}", "Recent trades".bold());
        for t in &status.recent_trades {
            print_trade(t);
        }
    }
}

pub fn print_trade(t: &Trade) {
    let action = match t.action {
        TradeAction::Buy => "BUY ".green(),
        TradeAction::Sell => "SELL".red(),
    };
    let pnl = t
        .profit_loss
        .map(|p| format!("  P&L {}", money(p)))
        .unwrap_or_default();
    println!(
        "{}  {} {:.4} {} @ ${:.2} = ${:.2}  cash ${:.2}{}",
        t.timestamp.format("%Y-%m-%d %H:%M"),
        action,
        t.shares,
        t.symbol,
        t.price,
        t.amount,
        t.cash_after,
        pnl
    );
}

fn direction(d: Direction) -> ColoredString {
    match d {
        Direction::Up => "UP".green(),
        Direction::Down => "DOWN".red(),
    }
}

pub fn print_predictions(preds: &[(String, Prediction)], min_confidence: f64) {
    if preds.is_empty() {
        println!(
            "No predictions at or above {:.0}% confidence.",
            min_confidence * 100.0
        );
        return;
    }
    println!("{:<10} {:<6} {:>10}", "Asset", "Dir", "Confidence");
    println!("{}", "-".repeat(28));
    for (symbol, p) in preds {
        println!(
            "{:<10} {:<6} {:>9.1}%",
            symbol,
            direction(p.direction),
            p.confidence * 100.0
        );
    }
}

pub fn print_cycle(summary: &CycleSummary, alerts: &[Alert]) {
    println!("{}", "AI TRADING CYCLE".bold());
    for d in &summary.decisions {
        let outcome = match &d.outcome {
            DecisionOutcome::Traded(t) => format!(
                "{} {:.4} @ ${:.2} = ${:.2}",
                t.action, t.shares, t.price, t.amount
            )
            .cyan(),
            DecisionOutcome::Skipped(reason) => format!("skipped: {reason}").dimmed(),
            DecisionOutcome::Failed(msg) => format!("failed: {msg}").red(),
        };
        println!(
            "  {:<10} {:<4} {:>5.1}%  {}",
            d.symbol,
            direction(d.prediction.direction),
            d.prediction.confidence * 100.0,
            outcome
        );
    }
    println!(
        "Evaluated {}, below threshold {}, traded {}, failed {}",
        summary.evaluated(),
        summary.below_threshold(),
        summary.trade_count(),
        summary.failure_count()
    );
    println!(
        "Portfolio ${:.2} -> ${:.2} ({})",
        summary.value_before,
        summary.value_after,
        money(summary.value_change())
    );
    for alert in alerts {
        println!("{} {alert}", "ALERT:".yellow().bold());
    }
}

pub fn print_history(records: &[CycleRecord]) {
    if records.is_empty() {
        println!("No cycles recorded yet.");
        return;
    }
    println!(
        "{:>6}  {:<19}  {:<6} {:>6} {:>12}",
        "Cycle", "Finished", "Status", "Trades", "Value"
    );
    println!("{}", "-".repeat(56));
    for r in records {
        let status = if r.success { "ok".green() } else { "failed".red() };
        let value = r
            .portfolio_value
            .map(|v| format!("${v:.2}"))
            .unwrap_or_else(|| "-".into());
        println!(
            "{:>6}  {:<19}  {:<6} {:>6} {:>12}",
            r.cycle,
            r.finished_at.format("%Y-%m-%d %H:%M:%S"),
            status,
            r.trades_executed,
            value
        );
        if let Some(err) = &r.error {
            println!("        {}", err.dimmed());
        }
    }
}

pub fn print_report(report: &DailyReport, metrics: Option<&PerformanceMetrics>) {
    println!("{} {}", "DAILY REPORT".bold(), report.date);
    println!("Portfolio value: ${:.2}", report.portfolio_value);
    println!("Cash:            ${:.2}", report.cash);
    println!("Positions:       {}", report.positions);
    println!(
        "Trades:          {} today, {} total",
        report.daily_trades, report.total_trades
    );
    println!("Total return:    {}", pct(report.total_return_pct));

    println!();
    match metrics {
        Some(m) => {
            println!("{} ({} days tracked)", "Performance".bold(), m.days_tracked);
            println!("Total return:     {}", pct(m.total_return * 100.0));
            println!("Avg daily return: {}", pct(m.avg_daily_return * 100.0));
            println!("Volatility:       {:.2}%", m.volatility * 100.0);
            println!("Sharpe ratio:     {:.2}", m.sharpe_ratio);
            println!("Win rate:         {:.1}%", m.win_rate * 100.0);
        }
        None => println!("Need at least 2 daily reports for performance metrics."),
    }
}
