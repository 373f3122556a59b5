//! Persistence: round trip, corrupt-file recovery, and the lock file.

use chrono::NaiveDate;
use papertrade_core::domain::{Portfolio, TradeRequest};
use papertrade_core::store::{LoadOrigin, PortfolioStore, StoreError};
use std::fs;
use std::time::Duration;

fn sample() -> Portfolio {
    let at = NaiveDate::from_ymd_opt(2024, 4, 2)
        .unwrap()
        .and_hms_milli_opt(10, 15, 30, 123)
        .unwrap();
    let mut p = Portfolio::new(10_000.0, at);
    p.apply_trade(&TradeRequest::buy_amount("AAPL", 1_234.56), 171.23, at)
        .unwrap();
    p.apply_trade(&TradeRequest::buy_amount("BTC-USD", 999.99), 63_512.7, at)
        .unwrap();
    p.apply_trade(&TradeRequest::sell_shares("AAPL", 1.5), 173.01, at)
        .unwrap();
    p
}

#[test]
fn save_then_load_is_identical() {
    let dir = tempfile::tempdir().unwrap();
    let store = PortfolioStore::new(dir.path().join("outputs").join("p.json"));
    let mut portfolio = sample();
    store.save(&mut portfolio).unwrap();

    let loaded = store.load(10_000.0).unwrap();
    assert_eq!(loaded.origin, LoadOrigin::Existing);
    assert_eq!(loaded.portfolio, portfolio);
}

#[test]
fn saved_file_uses_expected_keys() {
    let dir = tempfile::tempdir().unwrap();
    let store = PortfolioStore::new(dir.path().join("p.json"));
    let mut portfolio = sample();
    store.save(&mut portfolio).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
    for key in ["cash", "positions", "trade_history", "start_date", "last_updated"] {
        assert!(json.get(key).is_some(), "missing key {key}");
    }
    assert_eq!(json["trade_history"][0]["action"], "BUY");
    assert!(json["trade_history"][0].get("profit_loss").is_none());
    assert!(json["trade_history"][2].get("profit_loss").is_some());
}

#[test]
fn missing_file_loads_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let store = PortfolioStore::new(dir.path().join("p.json"));
    let loaded = store.load(7_500.0).unwrap();
    assert_eq!(loaded.origin, LoadOrigin::Fresh);
    assert_eq!(loaded.portfolio.cash, 7_500.0);
    assert!(!store.path().exists());
}

#[test]
fn file_without_start_date_is_not_quarantined() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("p.json");
    fs::write(
        &path,
        r#"{"cash": 4200.0, "positions": {}, "trade_history": []}"#,
    )
    .unwrap();

    let loaded = PortfolioStore::new(&path).load(10_000.0).unwrap();
    assert_eq!(loaded.origin, LoadOrigin::Existing);
    assert_eq!(loaded.portfolio.cash, 4_200.0);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn corrupt_file_is_quarantined() {
    let dir = tempfile::tempdir().unwrap();
    let store = PortfolioStore::new(dir.path().join("p.json"));
    fs::write(store.path(), "{ \"cash\": 12").unwrap();

    let loaded = store.load(10_000.0).unwrap();
    let LoadOrigin::Recovered(moved) = loaded.origin else {
        panic!("expected recovery, got {:?}", loaded.origin);
    };
    assert!(!store.path().exists());
    assert_eq!(fs::read_to_string(&moved).unwrap(), "{ \"cash\": 12");
    let name = moved.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("p.json.corrupt-"), "{name}");
    assert_eq!(loaded.portfolio.cash, 10_000.0);
}

#[test]
fn repeated_corruption_keeps_every_copy() {
    let dir = tempfile::tempdir().unwrap();
    let store = PortfolioStore::new(dir.path().join("p.json"));
    fs::write(store.path(), "first").unwrap();
    store.load(10_000.0).unwrap();
    fs::write(store.path(), "second").unwrap();
    store.load(10_000.0).unwrap();

    let quarantined = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().contains(".corrupt-"))
        .count();
    assert_eq!(quarantined, 2);
}

#[test]
fn held_lock_blocks_second_writer() {
    let dir = tempfile::tempdir().unwrap();
    let store = PortfolioStore::new(dir.path().join("p.json")).with_lock_policy(
        2,
        Duration::from_millis(5),
        Duration::from_secs(60),
    );
    let _held = store.lock().unwrap();

    let result = store.transact(10_000.0, |p| -> Result<(), StoreError> {
        p.cash = 0.0;
        Ok(())
    });
    assert!(matches!(result, Err(StoreError::Locked { .. })));
    assert!(!store.path().exists());
}

#[test]
fn stale_lock_is_broken() {
    let dir = tempfile::tempdir().unwrap();
    let store = PortfolioStore::new(dir.path().join("p.json")).with_lock_policy(
        0,
        Duration::from_millis(1),
        Duration::ZERO,
    );
    fs::write(store.lock_path(), "99999\n").unwrap();

    let (portfolio, ()) = store
        .transact(10_000.0, |p| -> Result<(), StoreError> {
            p.cash = 9_000.0;
            Ok(())
        })
        .unwrap();
    assert_eq!(portfolio.cash, 9_000.0);
    assert!(!store.lock_path().exists());
}

#[test]
fn failed_transaction_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = PortfolioStore::new(dir.path().join("p.json"));
    let mut initial = Portfolio::new(
        1_000.0,
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap(),
    );
    store.save(&mut initial).unwrap();
    let before = fs::read_to_string(store.path()).unwrap();

    #[derive(Debug)]
    struct Nope;
    impl From<StoreError> for Nope {
        fn from(_: StoreError) -> Self {
            Nope
        }
    }
    let result = store.transact(1_000.0, |p| -> Result<(), Nope> {
        p.cash = 0.0;
        Err(Nope)
    });
    assert!(result.is_err());
    assert_eq!(fs::read_to_string(store.path()).unwrap(), before);
    assert!(!store.lock_path().exists());
}
