//! 설정 파일 로드 통합 테스트.

use std::path::PathBuf;

use serial_test::serial;
use trader_core::{AppConfig, ExchangeMode, TraderError};

fn write_config(name: &str, content: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("trader-core-{}-{}.toml", name, std::process::id()));
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
#[serial]
fn test_load_overrides_from_file() {
    let path = write_config(
        "overrides",
        r#"
[server]
port = 8080

[trading]
reconcile_timeout_secs = 30

[retry]
max_attempts = 3
base_delay_ms = 250

[exchange]
mode = "binance"
testnet = false
"#,
    );

    let config = AppConfig::load(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.trading.reconcile_timeout_secs, 30);
    assert_eq!(config.trading.quote_asset, "USDT");
    assert_eq!(config.retry.max_attempts, 3);
    assert_eq!(config.retry.base_delay_ms, 250);
    assert_eq!(config.exchange.mode, ExchangeMode::Binance);
    assert!(!config.exchange.testnet);
    assert_eq!(config.exchange.recv_window, 5000);
}

#[test]
#[serial]
fn test_missing_file_uses_defaults() {
    let path = std::env::temp_dir().join("trader-core-does-not-exist.toml");

    let config = AppConfig::load(&path).unwrap();

    assert_eq!(config.retry.max_attempts, 5);
    assert_eq!(config.exchange.mode, ExchangeMode::Simulated);
    assert_eq!(config.socket_addr().unwrap().port(), 3000);
}

#[test]
#[serial]
fn test_invalid_leverage_is_rejected() {
    let path = write_config("invalid", "[trading]\nleverage = 0\n");

    let result = AppConfig::load(&path);
    std::fs::remove_file(&path).ok();

    assert!(matches!(result, Err(TraderError::Config(_))));
}

#[test]
#[serial]
fn test_legacy_leverage_env_overrides_file() {
    let path = write_config("legacy-leverage", "[trading]\nleverage = 3\n");

    std::env::set_var("LEVERAGE", "7");
    let result = AppConfig::load(&path);
    std::env::remove_var("LEVERAGE");
    std::fs::remove_file(&path).ok();

    assert_eq!(result.unwrap().trading.leverage, 7);
}

#[test]
#[serial]
fn test_legacy_leverage_env_is_validated() {
    std::env::set_var("LEVERAGE", "500");
    let result = AppConfig::load(std::env::temp_dir().join("trader-core-does-not-exist.toml"));
    std::env::remove_var("LEVERAGE");

    assert!(matches!(result, Err(TraderError::Config(_))));
}
