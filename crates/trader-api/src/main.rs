//! 시그널 기반 포지션 조정 서버.
//!
//! 설정을 로드하고, 거래소 클라이언트를 한 번 생성하여 조정기에 주입한 뒤
//! Axum 서버를 시작합니다.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{http::StatusCode, middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use rust_decimal::Decimal;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use trader_api::metrics::setup_metrics_recorder;
use trader_api::middleware::metrics_layer;
use trader_api::routes::create_api_router;
use trader_api::state::AppState;
use trader_core::logging::{init_logging, LogConfig};
use trader_core::{AppConfig, ExchangeMode};
use trader_exchange::simulated::{SimulatedConfig, SimulatedFuturesExchange};
use trader_exchange::traits::FuturesExchange;
use trader_exchange::{BinanceFuturesClient, BinanceFuturesConfig, ExchangeGateway, RetryPolicy};
use trader_execution::PositionReconciler;

/// 거래소 클라이언트 생성.
///
/// `binance` 모드는 환경 변수의 API 키가 필요합니다:
/// - 테스트넷: `BINANCE_TESTNET_API_KEY`, `BINANCE_TESTNET_API_SECRET`
/// - 실계좌: `BINANCE_API_KEY`, `BINANCE_API_SECRET`
fn create_exchange(config: &AppConfig) -> anyhow::Result<Arc<dyn FuturesExchange>> {
    match config.exchange.mode {
        ExchangeMode::Binance => {
            let testnet = config.exchange.testnet;
            let binance_config = BinanceFuturesConfig::from_env(testnet)
                .with_context(|| {
                    if testnet {
                        "BINANCE_TESTNET_API_KEY / BINANCE_TESTNET_API_SECRET not set"
                    } else {
                        "BINANCE_API_KEY / BINANCE_API_SECRET not set"
                    }
                })?
                .with_settings(&config.exchange);

            info!(
                testnet,
                base_url = binance_config.rest_base_url(),
                "Using Binance USDT-M futures"
            );
            Ok(Arc::new(BinanceFuturesClient::new(binance_config)?))
        }
        ExchangeMode::Simulated => {
            warn!("Using simulated futures exchange (paper account, no real orders)");
            Ok(Arc::new(SimulatedFuturesExchange::new(paper_account(&config.trading.quote_asset))))
        }
    }
}

/// 시뮬레이션 모드의 모의 계좌.
fn paper_account(quote_asset: &str) -> SimulatedConfig {
    SimulatedConfig::default()
        .with_quote_asset(quote_asset)
        .with_balance(quote_asset, Decimal::from(10_000))
        .with_symbol("BTCUSDT", Decimal::from(60_000), 3)
        .with_symbol("ETHUSDT", Decimal::from(3_000), 3)
        .with_symbol("SOLUSDT", Decimal::from(150), 0)
        .with_symbol("BNBUSDT", Decimal::from(600), 2)
}

/// CORS 레이어 생성.
///
/// - `CORS_ORIGINS`: 쉼표로 구분된 허용 origin 목록
fn cors_layer() -> CorsLayer {
    let allow_origin = match std::env::var("CORS_ORIGINS") {
        Ok(origins) if !origins.is_empty() => {
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();

            if origins.is_empty() {
                warn!("CORS_ORIGINS is set but contains no valid origins, allowing any");
                AllowOrigin::any()
            } else {
                info!("CORS configured with {} allowed origins", origins.len());
                AllowOrigin::list(origins)
            }
        }
        _ => AllowOrigin::any(),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE, axum::http::header::ACCEPT])
        .max_age(Duration::from_secs(3600))
}

/// /metrics 엔드포인트 핸들러.
async fn metrics_handler(axum::extract::State(handle): axum::extract::State<PrometheusHandle>) -> String {
    handle.render()
}

/// 전체 라우터 생성.
fn create_router(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    // 요청 타임아웃은 조정 타임아웃보다 길어야 조정기가 504를 먼저 반환합니다
    let request_timeout = state.reconcile_timeout + Duration::from_secs(10);

    let metrics_router = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics_handle);

    Router::new()
        .merge(metrics_router)
        .merge(create_api_router().with_state(state))
        .layer(middleware::from_fn(metrics_layer))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, request_timeout))
        .layer(cors_layer())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    let config = AppConfig::load_default().context("failed to load configuration")?;

    init_logging(LogConfig::from(&config.logging).with_env_overrides())
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    info!("Starting Trader API server...");

    let metrics_handle = setup_metrics_recorder().context("failed to install metrics recorder")?;

    let exchange = create_exchange(&config)?;
    let retry = RetryPolicy::from(&config.retry);
    let gateway = ExchangeGateway::new(exchange, retry).with_quote_asset(config.trading.quote_asset.as_str());
    let reconciler = PositionReconciler::new(gateway, config.trading.leverage);
    let state = Arc::new(AppState::new(
        reconciler,
        Duration::from_secs(config.trading.reconcile_timeout_secs),
    ));

    info!(
        exchange = state.exchange_name(),
        leverage = config.trading.leverage,
        max_attempts = retry.max_attempts,
        base_delay_ms = config.retry.base_delay_ms,
        reconcile_timeout_secs = config.trading.reconcile_timeout_secs,
        quote_asset = %config.trading.quote_asset,
        "Reconciler configured"
    );

    let app = create_router(state, metrics_handle);
    let addr = config.socket_addr()?;

    info!(%addr, "API server listening");
    info!("Metrics available at http://{}/metrics", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped gracefully");
    Ok(())
}

/// Graceful shutdown 시그널 대기.
///
/// Ctrl+C 또는 SIGTERM 시그널을 수신하면 반환합니다.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
