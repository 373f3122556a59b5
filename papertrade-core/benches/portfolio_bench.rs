//! Criterion benchmarks for portfolio hot paths.
//!
//! Benchmarks:
//! 1. Trade application (buy/sell cycles on the pure state transition)
//! 2. Whole-state save and load with a long trade history
//! 3. Valuation against an offline price table

use chrono::{NaiveDate, NaiveDateTime};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use papertrade_core::data::PriceTable;
use papertrade_core::domain::{Portfolio, TradeRequest};
use papertrade_core::engine::value_portfolio;
use papertrade_core::store::PortfolioStore;

// ── Helpers ──────────────────────────────────────────────────────────

fn ts() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap()
}

fn symbol(i: usize) -> String {
    format!("SYM{:02}", i % 20)
}

fn portfolio_with_history(n: usize) -> Portfolio {
    let mut p = Portfolio::new(1e9, ts());
    for i in 0..n {
        let price = 100.0 + (i as f64 * 0.1).sin() * 10.0;
        let request = if i % 3 == 2 {
            TradeRequest::sell_amount(symbol(i), 50.0)
        } else {
            TradeRequest::buy_amount(symbol(i), 100.0)
        };
        let _ = p.apply_trade(&request, price, ts());
    }
    p
}

// ── Benchmarks ───────────────────────────────────────────────────────

fn bench_apply_trade(c: &mut Criterion) {
    c.bench_function("apply_trade_buy_sell", |b| {
        b.iter(|| {
            let mut p = Portfolio::new(1e6, ts());
            for i in 0..100 {
                let _ = p.apply_trade(&TradeRequest::buy_amount(symbol(i), 1_000.0), 50.0, ts());
                let _ = p.apply_trade(&TradeRequest::sell_shares(symbol(i), 5.0), 51.0, ts());
            }
            black_box(p.cash)
        })
    });
}

fn bench_save_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("save_load");
    for n in [100usize, 1_000, 10_000] {
        let dir = tempfile::tempdir().unwrap();
        let store = PortfolioStore::new(dir.path().join("p.json"));
        let mut p = portfolio_with_history(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                store.save(&mut p).unwrap();
                black_box(store.load(1e9).unwrap().portfolio.trade_history.len())
            })
        });
    }
    group.finish();
}

fn bench_valuation(c: &mut Criterion) {
    let p = portfolio_with_history(1_000);
    let mut prices = PriceTable::new();
    for i in 0..20 {
        prices.set(&symbol(i), 101.0);
    }
    c.bench_function("value_portfolio_20_positions", |b| {
        b.iter(|| black_box(value_portfolio(&p, &prices).total_value))
    });
}

criterion_group!(benches, bench_apply_trade, bench_save_load, bench_valuation);
criterion_main!(benches);
