//! Binance USDT-M 선물 커넥터.
//!
//! `/fapi` REST API 구현. 메인넷과 테스트넷 모두 지원.
//! 모든 응답은 필수 필드를 가진 타입으로 역직렬화되며, 숫자 문자열 파싱에
//! 실패하면 `ExchangeError::ParseError`로 즉시 실패합니다.

use crate::traits::{ExchangeResult, FuturesExchange};
use crate::ExchangeError;
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info};
use trader_core::{
    ExchangeConfig, FuturesPosition, MarketOrderRequest, OrderRef, OrderResult, OrderStatusType,
    Price, Side, SymbolPrecision,
};

type HmacSha256 = Hmac<Sha256>;

const MAINNET_URL: &str = "https://fapi.binance.com";
const TESTNET_URL: &str = "https://testnet.binancefuture.com";

// ============================================================================
// 설정
// ============================================================================

/// Binance 선물 클라이언트 설정.
///
/// # 보안
/// - `api_secret`은 `SecretString`으로 보관됩니다.
/// - `Debug` 구현은 `api_key`를 마스킹합니다.
#[derive(Clone)]
pub struct BinanceFuturesConfig {
    /// API 키
    pub api_key: String,
    /// API 시크릿
    pub api_secret: SecretString,
    /// 테스트넷 사용
    pub testnet: bool,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// 수신 윈도우 (밀리초)
    pub recv_window: u64,
    /// REST 기본 URL 재정의 (테스트용 목 서버 등)
    pub base_url: Option<String>,
}

impl fmt::Debug for BinanceFuturesConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let masked_key = if self.api_key.len() > 8 {
            format!(
                "{}...{}",
                &self.api_key[..4],
                &self.api_key[self.api_key.len() - 4..]
            )
        } else {
            "***REDACTED***".to_string()
        };

        f.debug_struct("BinanceFuturesConfig")
            .field("api_key", &masked_key)
            .field("api_secret", &"***REDACTED***")
            .field("testnet", &self.testnet)
            .field("timeout_secs", &self.timeout_secs)
            .field("recv_window", &self.recv_window)
            .field("base_url", &self.rest_base_url())
            .finish()
    }
}

impl BinanceFuturesConfig {
    /// 새 설정 생성.
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: SecretString::from(api_secret.into()),
            testnet: false,
            timeout_secs: 30,
            recv_window: 5000,
            base_url: None,
        }
    }

    /// 테스트넷 사용.
    pub fn with_testnet(mut self, testnet: bool) -> Self {
        self.testnet = testnet;
        self
    }

    /// REST 기본 URL 재정의.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// 타임아웃/수신 윈도우/테스트넷 여부를 설정 파일 값으로 적용.
    pub fn with_settings(mut self, settings: &ExchangeConfig) -> Self {
        self.testnet = settings.testnet;
        self.timeout_secs = settings.timeout_secs;
        self.recv_window = settings.recv_window;
        self
    }

    /// 환경 변수에서 생성.
    ///
    /// 테스트넷이면 `BINANCE_TESTNET_API_KEY`/`BINANCE_TESTNET_API_SECRET`,
    /// 아니면 `BINANCE_API_KEY`/`BINANCE_API_SECRET`를 사용합니다.
    pub fn from_env(testnet: bool) -> Option<Self> {
        let (key_var, secret_var) = if testnet {
            ("BINANCE_TESTNET_API_KEY", "BINANCE_TESTNET_API_SECRET")
        } else {
            ("BINANCE_API_KEY", "BINANCE_API_SECRET")
        };

        let api_key = std::env::var(key_var).ok().filter(|v| !v.is_empty())?;
        let api_secret = std::env::var(secret_var).ok().filter(|v| !v.is_empty())?;

        Some(Self::new(api_key, api_secret).with_testnet(testnet))
    }

    /// REST API 기본 URL 반환.
    pub fn rest_base_url(&self) -> &str {
        match &self.base_url {
            Some(url) => url,
            None if self.testnet => TESTNET_URL,
            None => MAINNET_URL,
        }
    }
}

// ============================================================================
// API 응답 타입
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionRiskEntry {
    symbol: String,
    position_amt: String,
    entry_price: String,
    leverage: String,
    #[serde(default)]
    position_side: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceEntry {
    asset: String,
    available_balance: String,
}

#[derive(Debug, Deserialize)]
struct TickerPrice {
    price: String,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    symbol: String,
    quantity_precision: u32,
}

#[derive(Debug, Deserialize)]
struct LeverageResponse {
    leverage: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    symbol: String,
    order_id: i64,
    client_order_id: String,
    price: String,
    #[serde(default)]
    avg_price: Option<String>,
    executed_qty: String,
    status: String,
    side: String,
}

#[derive(Debug, Deserialize)]
struct BinanceError {
    code: i32,
    msg: String,
}

fn parse_decimal(field: &str, value: &str) -> ExchangeResult<Decimal> {
    Decimal::from_str(value)
        .map_err(|e| ExchangeError::ParseError(format!("{} = {:?}: {}", field, value, e)))
}

fn parse_u32(field: &str, value: &str) -> ExchangeResult<u32> {
    value
        .parse()
        .map_err(|e| ExchangeError::ParseError(format!("{} = {:?}: {}", field, value, e)))
}

impl PositionRiskEntry {
    fn is_net_position(&self) -> bool {
        self.position_side
            .as_deref()
            .map_or(true, |side| side.eq_ignore_ascii_case("BOTH"))
    }

    fn into_position(self) -> ExchangeResult<FuturesPosition> {
        let amount = parse_decimal("positionAmt", &self.position_amt)?;
        let leverage = parse_u32("leverage", &self.leverage)?;
        let entry_price = parse_decimal("entryPrice", &self.entry_price)?;
        Ok(FuturesPosition::new(self.symbol, amount, leverage).with_entry_price(entry_price))
    }
}

impl OrderResponse {
    fn into_result(self) -> ExchangeResult<OrderResult> {
        let side = Side::from_str(&self.side)
            .map_err(|_| ExchangeError::ParseError(format!("side = {:?}", self.side)))?;
        let status = OrderStatusType::from_exchange_str(&self.status)
            .ok_or_else(|| ExchangeError::ParseError(format!("status = {:?}", self.status)))?;
        let average_price = match &self.avg_price {
            Some(avg) => parse_decimal("avgPrice", avg)?,
            None => parse_decimal("price", &self.price)?,
        };

        Ok(OrderResult {
            order_id: self.order_id.to_string(),
            client_order_id: Some(self.client_order_id),
            symbol: self.symbol,
            side,
            status,
            executed_quantity: parse_decimal("executedQty", &self.executed_qty)?,
            average_price,
            leverage: None,
        })
    }
}

// ============================================================================
// Binance 선물 클라이언트
// ============================================================================

/// Binance USDT-M 선물 클라이언트.
pub struct BinanceFuturesClient {
    config: BinanceFuturesConfig,
    client: Client,
}

impl BinanceFuturesClient {
    /// 새 클라이언트 생성.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 `ExchangeError::NetworkError`를 반환합니다.
    pub fn new(config: BinanceFuturesConfig) -> Result<Self, ExchangeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExchangeError::NetworkError(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        info!(
            base_url = config.rest_base_url(),
            testnet = config.testnet,
            "Binance futures client created"
        );

        Ok(Self { config, client })
    }

    /// 현재 타임스탬프(밀리초) 반환.
    fn timestamp_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default()
    }

    /// HMAC-SHA256으로 쿼리 문자열 서명.
    fn sign(&self, query: &str) -> ExchangeResult<String> {
        let mut mac = HmacSha256::new_from_slice(self.config.api_secret.expose_secret().as_bytes())
            .map_err(|e| ExchangeError::Unauthorized(format!("invalid API secret: {}", e)))?;
        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// 파라미터에서 쿼리 문자열 생성.
    fn build_query(params: &[(&str, String)]) -> String {
        params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// timestamp/recvWindow를 붙여 서명된 쿼리 생성.
    fn signed_query(&self, params: &[(&str, String)]) -> ExchangeResult<String> {
        let mut all_params = params.to_vec();
        all_params.push(("timestamp", Self::timestamp_ms().to_string()));
        all_params.push(("recvWindow", self.config.recv_window.to_string()));

        let query = Self::build_query(&all_params);
        let signature = self.sign(&query)?;
        Ok(format!("{}&signature={}", query, signature))
    }

    /// 공개 API 요청 (인증 불필요).
    async fn public_get<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> ExchangeResult<T> {
        let url = format!("{}{}", self.config.rest_base_url(), endpoint);
        let query = Self::build_query(params);
        let full_url = if query.is_empty() {
            url
        } else {
            format!("{}?{}", url, query)
        };

        debug!("GET {}", full_url);

        let response = self.client.get(&full_url).send().await?;
        Self::handle_response(response).await
    }

    /// 서명된 GET 요청.
    async fn signed_get<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> ExchangeResult<T> {
        let full_url = format!(
            "{}{}?{}",
            self.config.rest_base_url(),
            endpoint,
            self.signed_query(params)?
        );

        debug!("GET (signed) {}", endpoint);

        let response = self
            .client
            .get(&full_url)
            .header("X-MBX-APIKEY", &self.config.api_key)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// 서명된 POST 요청 (form body).
    async fn signed_post<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> ExchangeResult<T> {
        let url = format!("{}{}", self.config.rest_base_url(), endpoint);
        let body = self.signed_query(params)?;

        debug!("POST (signed) {}", endpoint);

        let response = self
            .client
            .post(&url)
            .header("X-MBX-APIKEY", &self.config.api_key)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// API 응답 처리.
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> ExchangeResult<T> {
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return serde_json::from_str(&body).map_err(|e| {
                error!("Failed to parse response: {} - Body: {}", e, body);
                ExchangeError::ParseError(e.to_string())
            });
        }

        if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 418 {
            return Err(ExchangeError::RateLimited);
        }

        match serde_json::from_str::<BinanceError>(&body) {
            // 5xx에서 업무 코드로 분류되지 않는 에러는 서버 측 장애로 취급
            Ok(error) => match Self::map_error_code(error.code, &error.msg) {
                ExchangeError::Unknown(message) | ExchangeError::ApiError { message, .. }
                    if status.is_server_error() =>
                {
                    Err(ExchangeError::ServerError {
                        status: status.as_u16(),
                        message,
                    })
                }
                mapped => Err(mapped),
            },
            Err(_) if status.is_server_error() => Err(ExchangeError::ServerError {
                status: status.as_u16(),
                message: body,
            }),
            Err(_) => Err(ExchangeError::ApiError {
                code: status.as_u16() as i32,
                message: body,
            }),
        }
    }

    /// Binance 에러 코드를 ExchangeError로 매핑.
    fn map_error_code(code: i32, msg: &str) -> ExchangeError {
        let msg = msg.to_string();
        match code {
            -1000 => ExchangeError::Unknown(msg),
            -1001 => ExchangeError::Disconnected(msg),
            -1003 | -1015 => ExchangeError::RateLimited,
            -1007 => ExchangeError::Timeout(msg),
            -1021 => ExchangeError::TimestampError(msg),
            -1002 | -1022 | -2014 | -2015 => ExchangeError::Unauthorized(msg),
            -1013 | -1111 | -4003 | -4164 => ExchangeError::InvalidQuantity(msg),
            -1121 => ExchangeError::SymbolNotFound(msg),
            -2019 => ExchangeError::InsufficientBalance(msg),
            -2011 | -2013 => ExchangeError::OrderNotFound(msg),
            -2021 | -2022 => ExchangeError::OrderRejected(msg),
            -4116 => ExchangeError::DuplicateClientOrderId(msg),
            _ => ExchangeError::ApiError { code, message: msg },
        }
    }
}

#[async_trait]
impl FuturesExchange for BinanceFuturesClient {
    fn name(&self) -> &str {
        if self.config.testnet {
            "binance-futures-testnet"
        } else {
            "binance-futures"
        }
    }

    async fn position_information(&self, symbol: &str) -> ExchangeResult<Option<FuturesPosition>> {
        let entries: Vec<PositionRiskEntry> = self
            .signed_get("/fapi/v2/positionRisk", &[("symbol", symbol.to_string())])
            .await?;

        entries
            .into_iter()
            .filter(|e| e.symbol == symbol)
            .find(PositionRiskEntry::is_net_position)
            .map(PositionRiskEntry::into_position)
            .transpose()
    }

    async fn available_balance(&self, asset: &str) -> ExchangeResult<Decimal> {
        let balances: Vec<BalanceEntry> = self.signed_get("/fapi/v2/balance", &[]).await?;

        match balances.into_iter().find(|b| b.asset.eq_ignore_ascii_case(asset)) {
            Some(balance) => parse_decimal("availableBalance", &balance.available_balance),
            None => Ok(Decimal::ZERO),
        }
    }

    async fn ticker_price(&self, symbol: &str) -> ExchangeResult<Price> {
        let ticker: TickerPrice = self
            .public_get("/fapi/v1/ticker/price", &[("symbol", symbol.to_string())])
            .await?;
        parse_decimal("price", &ticker.price)
    }

    async fn exchange_symbols(&self) -> ExchangeResult<Vec<SymbolPrecision>> {
        let info: ExchangeInfo = self.public_get("/fapi/v1/exchangeInfo", &[]).await?;

        Ok(info
            .symbols
            .into_iter()
            .map(|s| SymbolPrecision::new(s.symbol, s.quantity_precision))
            .collect())
    }

    async fn change_leverage(&self, symbol: &str, leverage: u32) -> ExchangeResult<u32> {
        let params = [
            ("symbol", symbol.to_string()),
            ("leverage", leverage.to_string()),
        ];
        let resp: LeverageResponse = self.signed_post("/fapi/v1/leverage", &params).await?;

        info!(symbol, leverage = resp.leverage, "Leverage changed");
        Ok(resp.leverage)
    }

    async fn place_market_order(&self, request: &MarketOrderRequest) -> ExchangeResult<String> {
        let mut params = vec![
            ("symbol", request.symbol.clone()),
            ("side", request.side.to_string()),
            ("type", "MARKET".to_string()),
            ("quantity", request.quantity.normalize().to_string()),
        ];

        if request.reduce_only {
            params.push(("reduceOnly", "true".to_string()));
        }

        if let Some(ref client_id) = request.client_order_id {
            params.push(("newClientOrderId", client_id.clone()));
        }

        info!(
            symbol = %request.symbol,
            side = %request.side,
            quantity = %request.quantity,
            reduce_only = request.reduce_only,
            "Placing market order"
        );

        let resp: OrderResponse = self.signed_post("/fapi/v1/order", &params).await?;

        info!(order_id = resp.order_id, "Order placed successfully");
        Ok(resp.order_id.to_string())
    }

    async fn get_order(&self, symbol: &str, order: &OrderRef) -> ExchangeResult<OrderResult> {
        let key = match order {
            OrderRef::Id(id) => ("orderId", id.clone()),
            OrderRef::ClientId(id) => ("origClientOrderId", id.clone()),
        };
        let params = [("symbol", symbol.to_string()), key];

        let resp: OrderResponse = self.signed_get("/fapi/v1/order", &params).await?;
        resp.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server, ServerGuard};
    use rust_decimal_macros::dec;

    fn client_for(server: &ServerGuard) -> BinanceFuturesClient {
        let config = BinanceFuturesConfig::new("test-api-key-1234", "test-secret").with_base_url(server.url());
        BinanceFuturesClient::new(config).unwrap()
    }

    #[test]
    fn test_sign() {
        let config = BinanceFuturesConfig::new(
            "vmPUZE6mv9SD5VNHk4HlWFsOr6aKE2zvsw0MuIgwCIPy6utIco14y7Ju91duEh8A",
            "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j",
        );
        let client = BinanceFuturesClient::new(config).unwrap();

        let query = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";
        assert_eq!(
            client.sign(query).unwrap(),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn test_debug_masks_credentials() {
        let config = BinanceFuturesConfig::new("ABCDEFGHIJKLMNOP", "super-secret-value");
        let debug = format!("{:?}", config);
        assert!(debug.contains("ABCD...MNOP"));
        assert!(!debug.contains("super-secret-value"));
    }

    #[test]
    fn test_base_url_selection() {
        let config = BinanceFuturesConfig::new("k", "s");
        assert_eq!(config.rest_base_url(), MAINNET_URL);
        assert_eq!(config.clone().with_testnet(true).rest_base_url(), TESTNET_URL);
        assert_eq!(
            config.with_base_url("http://127.0.0.1:1").rest_base_url(),
            "http://127.0.0.1:1"
        );
    }

    #[test]
    fn test_error_code_mapping() {
        use ExchangeError::*;
        assert!(matches!(BinanceFuturesClient::map_error_code(-1001, "x"), Disconnected(_)));
        assert_eq!(BinanceFuturesClient::map_error_code(-1003, "x"), RateLimited);
        assert!(matches!(BinanceFuturesClient::map_error_code(-1111, "x"), InvalidQuantity(_)));
        assert!(matches!(BinanceFuturesClient::map_error_code(-2019, "x"), InsufficientBalance(_)));
        assert!(matches!(BinanceFuturesClient::map_error_code(-1121, "x"), SymbolNotFound(_)));
        assert!(matches!(
            BinanceFuturesClient::map_error_code(-4116, "x"),
            DuplicateClientOrderId(_)
        ));
        assert!(matches!(
            BinanceFuturesClient::map_error_code(-4028, "x"),
            ApiError { code: -4028, .. }
        ));
    }

    #[tokio::test]
    async fn test_position_information_picks_net_position() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/fapi/v2/positionRisk")
            .match_query(Matcher::UrlEncoded("symbol".into(), "BTCUSDT".into()))
            .match_header("X-MBX-APIKEY", "test-api-key-1234")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[{"symbol":"BTCUSDT","positionAmt":"-0.250","entryPrice":"30000.5","leverage":"5","positionSide":"BOTH","marginType":"cross"}]"#,
            )
            .create_async()
            .await;

        let position = client_for(&server)
            .position_information("BTCUSDT")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(position.amount, dec!(-0.250));
        assert_eq!(position.leverage, 5);
        assert_eq!(position.entry_price, dec!(30000.5));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_position_information_empty_is_none() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/fapi/v2/positionRisk")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let position = client_for(&server).position_information("ETHUSDT").await.unwrap();
        assert!(position.is_none());
    }

    #[tokio::test]
    async fn test_malformed_amount_fails_fast() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/fapi/v2/positionRisk")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"[{"symbol":"BTCUSDT","positionAmt":"abc","entryPrice":"0","leverage":"5"}]"#)
            .create_async()
            .await;

        let err = client_for(&server).position_information("BTCUSDT").await.unwrap_err();
        assert!(matches!(err, ExchangeError::ParseError(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_available_balance_missing_asset_is_zero() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/fapi/v2/balance")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"[{"asset":"BNB","availableBalance":"1.5"},{"asset":"USDT","availableBalance":"1234.56"}]"#)
            .expect(2)
            .create_async()
            .await;

        let client = client_for(&server);
        assert_eq!(client.available_balance("USDT").await.unwrap(), dec!(1234.56));
        assert_eq!(client.available_balance("BUSD").await.unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_exchange_symbols() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/fapi/v1/exchangeInfo")
            .with_status(200)
            .with_body(
                r#"{"timezone":"UTC","symbols":[{"symbol":"BTCUSDT","quantityPrecision":3,"pricePrecision":2},{"symbol":"DOGEUSDT","quantityPrecision":0}]}"#,
            )
            .create_async()
            .await;

        let symbols = client_for(&server).exchange_symbols().await.unwrap();
        assert_eq!(
            symbols,
            vec![
                SymbolPrecision::new("BTCUSDT", 3),
                SymbolPrecision::new("DOGEUSDT", 0)
            ]
        );
    }

    #[tokio::test]
    async fn test_http_errors_are_classified() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/fapi/v1/ticker/price")
            .match_query(Matcher::UrlEncoded("symbol".into(), "BTCUSDT".into()))
            .with_status(503)
            .with_body("Service Unavailable")
            .create_async()
            .await;
        server
            .mock("GET", "/fapi/v1/ticker/price")
            .match_query(Matcher::UrlEncoded("symbol".into(), "ETHUSDT".into()))
            .with_status(429)
            .with_body(r#"{"code":-1003,"msg":"Too many requests"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/fapi/v1/ticker/price")
            .match_query(Matcher::UrlEncoded("symbol".into(), "FOOUSDT".into()))
            .with_status(400)
            .with_body(r#"{"code":-1121,"msg":"Invalid symbol."}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.ticker_price("BTCUSDT").await.unwrap_err();
        assert!(matches!(err, ExchangeError::ServerError { status: 503, .. }));
        assert!(err.is_retryable());

        assert_eq!(client.ticker_price("ETHUSDT").await.unwrap_err(), ExchangeError::RateLimited);

        let err = client.ticker_price("FOOUSDT").await.unwrap_err();
        assert!(matches!(err, ExchangeError::SymbolNotFound(_)));
    }

    #[tokio::test]
    async fn test_server_error_with_json_body_is_retryable() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/fapi/v1/ticker/price")
            .match_query(Matcher::UrlEncoded("symbol".into(), "BTCUSDT".into()))
            .with_status(503)
            .with_body(r#"{"code":-1000,"msg":"An unknown error occured while processing the request."}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/fapi/v1/ticker/price")
            .match_query(Matcher::UrlEncoded("symbol".into(), "ETHUSDT".into()))
            .with_status(502)
            .with_body(r#"{"code":-9999,"msg":"bad gateway"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/fapi/v1/ticker/price")
            .match_query(Matcher::UrlEncoded("symbol".into(), "FOOUSDT".into()))
            .with_status(500)
            .with_body(r#"{"code":-1121,"msg":"Invalid symbol."}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.ticker_price("BTCUSDT").await.unwrap_err();
        assert!(matches!(err, ExchangeError::ServerError { status: 503, .. }));
        assert!(err.is_retryable());

        let err = client.ticker_price("ETHUSDT").await.unwrap_err();
        assert!(matches!(err, ExchangeError::ServerError { status: 502, .. }));
        assert!(err.is_retryable());

        // 업무 코드는 상태 코드와 무관하게 그대로 분류
        let err = client.ticker_price("FOOUSDT").await.unwrap_err();
        assert!(matches!(err, ExchangeError::SymbolNotFound(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_place_close_order_sends_reduce_only_and_client_id() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/fapi/v1/order")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("symbol".into(), "BTCUSDT".into()),
                Matcher::UrlEncoded("side".into(), "SELL".into()),
                Matcher::UrlEncoded("type".into(), "MARKET".into()),
                Matcher::UrlEncoded("quantity".into(), "0.5".into()),
                Matcher::UrlEncoded("reduceOnly".into(), "true".into()),
                Matcher::UrlEncoded("newClientOrderId".into(), "c-abc".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"symbol":"BTCUSDT","orderId":987,"clientOrderId":"c-abc","price":"0","avgPrice":"0.00","origQty":"0.5","executedQty":"0","status":"NEW","side":"SELL","type":"MARKET"}"#,
            )
            .create_async()
            .await;

        let request = MarketOrderRequest::close("BTCUSDT", Side::Sell, dec!(0.500)).with_client_id("c-abc");
        let order_id = client_for(&server).place_market_order(&request).await.unwrap();

        assert_eq!(order_id, "987");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_order_by_client_id() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/fapi/v1/order")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("symbol".into(), "ETHUSDT".into()),
                Matcher::UrlEncoded("origClientOrderId".into(), "o-1".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"symbol":"ETHUSDT","orderId":55,"clientOrderId":"o-1","price":"1800.10","executedQty":"2.000","status":"FILLED","side":"BUY"}"#,
            )
            .create_async()
            .await;

        let order = client_for(&server)
            .get_order("ETHUSDT", &OrderRef::ClientId("o-1".to_string()))
            .await
            .unwrap();

        assert_eq!(order.order_id, "55");
        assert_eq!(order.side, Side::Buy);
        assert_eq!(order.status, OrderStatusType::Filled);
        assert_eq!(order.executed_quantity, dec!(2.000));
        // avgPrice 없으면 price 사용
        assert_eq!(order.average_price, dec!(1800.10));
        assert_eq!(order.leverage, None);
    }

    #[tokio::test]
    async fn test_change_leverage() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/fapi/v1/leverage")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("symbol".into(), "BTCUSDT".into()),
                Matcher::UrlEncoded("leverage".into(), "3".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"leverage":3,"maxNotionalValue":"1000000","symbol":"BTCUSDT"}"#)
            .create_async()
            .await;

        let applied = client_for(&server).change_leverage("BTCUSDT", 3).await.unwrap();
        assert_eq!(applied, 3);
    }
}
