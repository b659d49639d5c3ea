//! 설정 관리.
//!
//! 기본값 → 설정 파일(선택) → 환경 변수(`TRADER__SECTION__KEY`) 순서로 병합합니다.
//! 레거시 `LEVERAGE` 환경 변수는 `trading.leverage`를 덮어씁니다.

use crate::error::{TraderError, TraderResult};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// 기본 설정 파일 경로.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// 거래소가 허용하는 최대 레버리지.
pub const MAX_LEVERAGE: u32 = 125;

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// 서버 설정
    #[serde(default)]
    pub server: ServerConfig,
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 포지션 조정 설정
    #[serde(default)]
    pub trading: TradingConfig,
    /// 재시도 설정
    #[serde(default)]
    pub retry: RetryConfig,
    /// 거래소 설정
    #[serde(default)]
    pub exchange: ExchangeConfig,
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// 포지션 조정 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TradingConfig {
    /// 목표 레버리지
    pub leverage: u32,
    /// 조정 1회 전체 제한 시간 (초)
    pub reconcile_timeout_secs: u64,
    /// 증거금 자산
    pub quote_asset: String,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            leverage: 3,
            reconcile_timeout_secs: 120,
            quote_asset: "USDT".to_string(),
        }
    }
}

/// 거래소 호출 재시도 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// 최대 시도 횟수 (첫 시도 포함)
    pub max_attempts: u32,
    /// 기본 대기 시간 (밀리초). k번째 실패 후 `base * 2^k` 대기
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1000,
        }
    }
}

/// 거래소 연결 모드.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeMode {
    /// 메모리 내 모의 계좌
    #[default]
    Simulated,
    /// Binance USDT-M 선물
    Binance,
}

/// 거래소 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExchangeConfig {
    /// 연결 모드
    pub mode: ExchangeMode,
    /// 테스트넷 사용
    pub testnet: bool,
    /// HTTP 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// 서명 요청의 recvWindow (밀리초)
    pub recv_window: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            mode: ExchangeMode::Simulated,
            testnet: true,
            timeout_secs: 30,
            recv_window: 5000,
        }
    }
}

impl AppConfig {
    /// 기본값이 채워진 빌더.
    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        config::Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .set_default("trading.leverage", 3)?
            .set_default("trading.reconcile_timeout_secs", 120)?
            .set_default("trading.quote_asset", "USDT")?
            .set_default("retry.max_attempts", 5)?
            .set_default("retry.base_delay_ms", 1000)?
            .set_default("exchange.mode", "simulated")?
            .set_default("exchange.testnet", true)?
            .set_default("exchange.timeout_secs", 30)?
            .set_default("exchange.recv_window", 5000)
    }

    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일이 없으면 기본값과 환경 변수만 사용합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> TraderResult<Self> {
        let config = Self::builder()?
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix("TRADER")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("trading.leverage", std::env::var("LEVERAGE").ok())?
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> TraderResult<Self> {
        Self::load(DEFAULT_CONFIG_PATH)
    }

    /// 설정 값의 범위를 검증합니다.
    pub fn validate(&self) -> TraderResult<()> {
        if !(1..=MAX_LEVERAGE).contains(&self.trading.leverage) {
            return Err(TraderError::Config(format!(
                "trading.leverage must be between 1 and {}, got {}",
                MAX_LEVERAGE, self.trading.leverage
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(TraderError::Config("retry.max_attempts must be at least 1".to_string()));
        }
        if self.trading.reconcile_timeout_secs == 0 {
            return Err(TraderError::Config(
                "trading.reconcile_timeout_secs must be positive".to_string(),
            ));
        }
        if self.trading.quote_asset.trim().is_empty() {
            return Err(TraderError::Config("trading.quote_asset is empty".to_string()));
        }
        Ok(())
    }

    /// 서버 바인딩 주소.
    pub fn socket_addr(&self) -> TraderResult<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| TraderError::Config(format!("invalid server address: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(content: &str) -> AppConfig {
        AppConfig::builder()
            .unwrap()
            .add_source(config::File::from_str(content, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = from_toml("");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.trading.leverage, 3);
        assert_eq!(config.trading.quote_asset, "USDT");
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 1000);
        assert_eq!(config.exchange.mode, ExchangeMode::Simulated);
        assert!(config.exchange.testnet);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_file_overrides() {
        let config = from_toml(
            r#"
            [trading]
            leverage = 10

            [exchange]
            mode = "binance"
            testnet = false
            "#,
        );
        assert_eq!(config.trading.leverage, 10);
        assert_eq!(config.trading.reconcile_timeout_secs, 120);
        assert_eq!(config.exchange.mode, ExchangeMode::Binance);
        assert!(!config.exchange.testnet);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.trading.leverage = 0;
        assert!(matches!(config.validate(), Err(TraderError::Config(_))));

        let mut config = AppConfig::default();
        config.trading.leverage = 200;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_socket_addr() {
        let config = AppConfig::default();
        assert_eq!(config.socket_addr().unwrap().port(), 3000);

        let mut config = AppConfig::default();
        config.server.host = "not a host".to_string();
        assert!(config.socket_addr().is_err());
    }
}
