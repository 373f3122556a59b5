//! Interactive numbered menu and the manual trading prompt.

use crate::app::App;
use crate::display;
use anyhow::Result;
use colored::Colorize;
use papertrade_core::domain::{normalize_symbol, TradeRequest};
use papertrade_core::predict::{top_predictions, PredictionSource};
use std::io::{self, BufRead, Write};

#[derive(Debug, Clone, PartialEq)]
pub enum ManualCommand {
    /// `buy <symbol> <dollars>`
    Buy { symbol: String, amount: f64 },
    /// `sell <symbol> <shares|all>`
    Sell { symbol: String, shares: Option<f64> },
    Status,
    Help,
    Quit,
}

const MANUAL_USAGE: &str =
    "commands: buy <symbol> <amount>, sell <symbol> <shares|all>, status, help, quit";

fn parse_number(raw: &str, what: &str) -> Result<f64, String> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
        .ok_or_else(|| format!("{what} must be a positive number, got '{raw}'"))
}

pub fn parse_manual_command(line: &str) -> Result<ManualCommand, String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some(head) = parts.first() else {
        return Err(MANUAL_USAGE.to_string());
    };
    match head.to_ascii_lowercase().as_str() {
        "quit" | "exit" | "q" => Ok(ManualCommand::Quit),
        "status" => Ok(ManualCommand::Status),
        "help" | "?" => Ok(ManualCommand::Help),
        "buy" => match parts.as_slice() {
            [_, symbol, amount] => Ok(ManualCommand::Buy {
                symbol: normalize_symbol(symbol),
                amount: parse_number(amount, "amount")?,
            }),
            _ => Err("usage: buy <symbol> <amount>".into()),
        },
        "sell" => match parts.as_slice() {
            [_, symbol] => Ok(ManualCommand::Sell {
                symbol: normalize_symbol(symbol),
                shares: None,
            }),
            [_, symbol, qty] if qty.eq_ignore_ascii_case("all") => Ok(ManualCommand::Sell {
                symbol: normalize_symbol(symbol),
                shares: None,
            }),
            [_, symbol, qty] => Ok(ManualCommand::Sell {
                symbol: normalize_symbol(symbol),
                shares: Some(parse_number(qty, "shares")?),
            }),
            _ => Err("usage: sell <symbol> <shares|all>".into()),
        },
        other => Err(format!("unknown command '{other}'; {MANUAL_USAGE}")),
    }
}

fn prompt(input: &mut impl BufRead, text: &str) -> Result<Option<String>> {
    print!("{text}");
    io::stdout().flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

pub fn manual_session(app: &App, input: &mut impl BufRead) -> Result<()> {
    let mut trader = app.trader()?;
    println!("{}", "Manual paper trading".bold());
    println!("{MANUAL_USAGE}");

    while let Some(line) = prompt(input, "\ntrade> ")? {
        if line.is_empty() {
            continue;
        }
        let command = match parse_manual_command(&line) {
            Ok(c) => c,
            Err(msg) => {
                println!("{}", msg.red());
                continue;
            }
        };
        match command {
            ManualCommand::Quit => break,
            ManualCommand::Help => println!("{MANUAL_USAGE}"),
            ManualCommand::Status => {
                trader.reload()?;
                display::print_status(&trader.status(5));
            }
            ManualCommand::Buy { symbol, amount } => {
                match trader.execute_trade(&TradeRequest::buy_amount(symbol, amount)) {
                    Ok(trade) => display::print_trade(&trade),
                    Err(e) => println!("{} {e}", "rejected:".red()),
                }
            }
            ManualCommand::Sell { symbol, shares } => {
                let request = match shares {
                    Some(n) => TradeRequest::sell_shares(symbol, n),
                    None => TradeRequest::sell_all(symbol),
                };
                match trader.execute_trade(&request) {
                    Ok(trade) => display::print_trade(&trade),
                    Err(e) => println!("{} {e}", "rejected:".red()),
                }
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Auto,
    Manual,
    Status,
    Predictions,
    Reset,
    Exit,
}

pub fn parse_menu_choice(line: &str) -> Option<MenuChoice> {
    match line.trim() {
        "1" => Some(MenuChoice::Auto),
        "2" => Some(MenuChoice::Manual),
        "3" => Some(MenuChoice::Status),
        "4" => Some(MenuChoice::Predictions),
        "5" => Some(MenuChoice::Reset),
        "0" | "q" | "quit" | "exit" => Some(MenuChoice::Exit),
        _ => None,
    }
}

fn print_menu() {
    println!();
    println!("{}", "AI Paper Trading".bold());
    println!("{}", "=".repeat(40));
    println!("1. Auto AI trading (one decision cycle)");
    println!("2. Manual trading");
    println!("3. Portfolio status");
    println!("4. Predictions");
    println!("5. Reset portfolio");
    println!("0. Exit");
}

/// Report a failed action without leaving the menu.
fn report(result: Result<()>) {
    if let Err(e) = result {
        println!("{} {e:#}", "error:".red());
    }
}

pub fn main_menu(app: &App, input: &mut impl BufRead) -> Result<()> {
    report(app.trader().map(|t| display::print_status(&t.status(5))));

    loop {
        print_menu();
        let Some(line) = prompt(input, "\nEnter choice: ")? else {
            break;
        };
        match parse_menu_choice(&line) {
            Some(MenuChoice::Exit) => break,
            Some(MenuChoice::Auto) => report(app.run_cycle().map(|c| {
                display::print_cycle(&c.summary, &c.alerts);
            })),
            Some(MenuChoice::Manual) => report(manual_session(app, input)),
            Some(MenuChoice::Status) => {
                report(app.trader().map(|t| display::print_status(&t.status(5))))
            }
            Some(MenuChoice::Predictions) => report(
                app.prediction_source()
                    .predict_all()
                    .map(|all| {
                        let min = app.config.trading.min_confidence;
                        display::print_predictions(&top_predictions(&all, min), min);
                    })
                    .map_err(Into::into),
            ),
            Some(MenuChoice::Reset) => {
                let answer = prompt(input, "Reset portfolio? Type 'yes' to confirm: ")?;
                if answer.as_deref() == Some("yes") {
                    report(app.trader().and_then(|mut t| {
                        t.reset()?;
                        println!(
                            "Portfolio reset to ${:.2}",
                            app.config.portfolio.initial_capital
                        );
                        Ok(())
                    }));
                } else {
                    println!("Reset cancelled.");
                }
            }
            None => println!("{}", "Invalid choice".red()),
        }
    }
    println!("Goodbye.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_buy_and_sell() {
        assert_eq!(
            parse_manual_command("buy aapl 1000"),
            Ok(ManualCommand::Buy {
                symbol: "AAPL".into(),
                amount: 1000.0
            })
        );
        assert_eq!(
            parse_manual_command("SELL btc-usd 0.5"),
            Ok(ManualCommand::Sell {
                symbol: "BTC-USD".into(),
                shares: Some(0.5)
            })
        );
        assert_eq!(
            parse_manual_command("sell spy all"),
            Ok(ManualCommand::Sell {
                symbol: "SPY".into(),
                shares: None
            })
        );
    }

    #[test]
    fn parses_keywords() {
        assert_eq!(parse_manual_command("status"), Ok(ManualCommand::Status));
        assert_eq!(parse_manual_command("  quit "), Ok(ManualCommand::Quit));
        assert_eq!(parse_manual_command("exit"), Ok(ManualCommand::Quit));
        assert_eq!(parse_manual_command("help"), Ok(ManualCommand::Help));
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse_manual_command("").is_err());
        assert!(parse_manual_command("buy AAPL").is_err());
        assert!(parse_manual_command("buy AAPL lots").is_err());
        assert!(parse_manual_command("buy AAPL -5").is_err());
        assert!(parse_manual_command("sell AAPL 0").is_err());
        assert!(parse_manual_command("hold AAPL").is_err());
    }

    #[test]
    fn menu_choices() {
        assert_eq!(parse_menu_choice("1"), Some(MenuChoice::Auto));
        assert_eq!(parse_menu_choice(" 2 "), Some(MenuChoice::Manual));
        assert_eq!(parse_menu_choice("5"), Some(MenuChoice::Reset));
        assert_eq!(parse_menu_choice("0"), Some(MenuChoice::Exit));
        assert_eq!(parse_menu_choice("9"), None);
    }
}
