#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/intrinsic/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Yahoo Finance data provider.
//!
//! This crate provides a Yahoo Finance data provider that implements the
//! [`PriceDataProvider`], [`FundamentalDataProvider`] and
//! [`ReferenceDataProvider`] traits from `intrinsic-core`.
//!
//! # Example
//!
//! ```no_run
//! use intrinsic_yahoo::YahooProvider;
//! use intrinsic_core::{FundamentalDataProvider, PeriodType, StatementKind, Symbol};
//!
//! # async fn example() -> intrinsic_core::Result<()> {
//! let provider = YahooProvider::new().with_exchange_suffix("JK");
//! let statement = provider
//!     .fetch_statement(&Symbol::new("BBCA"), StatementKind::Income, PeriodType::Annual)
//!     .await?;
//! println!("{} annual periods", statement.len());
//! # Ok(())
//! # }
//! ```

mod timeseries;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use intrinsic_core::{
    DataError, DataProvider, DividendSeries, EntityProfile, FundamentalDataProvider, PeriodType,
    PriceDataProvider, PriceHistory, RawStatement, ReferenceDataProvider, Result, StatementKind,
    Symbol,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::time::sleep;
use tracing::{debug, instrument};

/// Yahoo Finance chart API base URL.
const CHART_API_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Yahoo Finance quote summary API base URL.
const QUOTE_SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";

/// Yahoo Finance fundamentals time series base URL.
const TIMESERIES_URL: &str =
    "https://query2.finance.yahoo.com/ws/fundamentals-timeseries/v1/finance/timeseries";

/// Default rate limit delay in milliseconds.
const DEFAULT_RATE_LIMIT_MS: u64 = 1000;

/// Years of statement history requested from the time series endpoint.
const STATEMENT_HISTORY_YEARS: i64 = 10;

/// User agent for HTTP requests.
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

const PROVIDER_NAME: &str = "Yahoo Finance";

/// Yahoo Finance data provider.
#[derive(Debug)]
pub struct YahooProvider {
    client: reqwest::Client,
    rate_limit_ms: u64,
    last_request_time: AtomicU64,
    exchange_suffix: Option<String>,
}

impl YahooProvider {
    /// Create a new Yahoo Finance provider with default settings.
    ///
    /// Uses built-in rate limiting of 1 request per second.
    #[must_use]
    pub fn new() -> Self {
        Self::with_rate_limit(Duration::from_millis(DEFAULT_RATE_LIMIT_MS))
    }

    /// Create a new Yahoo Finance provider with a custom HTTP client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            rate_limit_ms: DEFAULT_RATE_LIMIT_MS,
            last_request_time: AtomicU64::new(0),
            exchange_suffix: None,
        }
    }

    /// Create a new Yahoo Finance provider with custom rate limiting.
    #[must_use]
    pub fn with_rate_limit(rate_limit: Duration) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            rate_limit_ms: rate_limit.as_millis() as u64,
            last_request_time: AtomicU64::new(0),
            exchange_suffix: None,
        }
    }

    /// Appends an exchange suffix (`JK` for IDX) to symbols that carry none.
    #[must_use]
    pub fn with_exchange_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.exchange_suffix = Some(suffix.into());
        self
    }

    fn listing(&self, symbol: &Symbol) -> Symbol {
        match &self.exchange_suffix {
            Some(suffix) => symbol.with_exchange_suffix(suffix),
            None => symbol.clone(),
        }
    }

    async fn apply_rate_limit(&self) {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        let last = self.last_request_time.load(Ordering::Relaxed);
        let elapsed = now.saturating_sub(last);

        if elapsed < self.rate_limit_ms {
            let wait_time = self.rate_limit_ms - elapsed;
            debug!("Rate limiting: waiting {}ms", wait_time);
            sleep(Duration::from_millis(wait_time)).await;
        }

        self.last_request_time.store(
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
            Ordering::Relaxed,
        );
    }

    /// Rate-limited GET decoding a JSON body, with Yahoo's status codes mapped.
    async fn get_json<T: DeserializeOwned>(&self, url: &str, symbol: &Symbol) -> Result<T> {
        self.apply_rate_limit().await;
        debug!("Fetching {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DataError::Network(e.to_string()))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(DataError::RateLimited {
                provider: PROVIDER_NAME.to_string(),
                retry_after: Some(Duration::from_secs(60)),
            });
        }

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(DataError::SymbolNotFound(symbol.to_string()));
        }

        if !response.status().is_success() {
            return Err(DataError::Network(format!(
                "HTTP {} for {}",
                response.status(),
                symbol
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| DataError::Parse(e.to_string()))
    }

    fn build_chart_url(symbol: &Symbol, start: NaiveDate, end: NaiveDate, events: bool) -> String {
        let mut url = format!(
            "{}/{}?period1={}&period2={}&interval=1d",
            CHART_API_URL,
            symbol.as_str(),
            start_of_day(start),
            end_of_day(end),
        );
        if events {
            url.push_str("&events=div");
        }
        url
    }

    fn build_timeseries_url(
        symbol: &Symbol,
        kind: StatementKind,
        period_type: PeriodType,
        until: NaiveDate,
    ) -> String {
        let from = until - chrono::Duration::days(365 * STATEMENT_HISTORY_YEARS);
        format!(
            "{}/{sym}?symbol={sym}&type={}&period1={}&period2={}",
            TIMESERIES_URL,
            timeseries::type_param(kind, period_type),
            start_of_day(from),
            end_of_day(until),
            sym = symbol.as_str(),
        )
    }

    async fn fetch_chart(&self, symbol: &Symbol, url: &str) -> Result<ChartData> {
        let response: ChartResponse = self.get_json(url, symbol).await?;
        chart_data(symbol, response)
    }
}

impl Default for YahooProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn start_of_day(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| Utc.from_utc_datetime(&dt).timestamp())
        .unwrap_or(0)
}

fn end_of_day(date: NaiveDate) -> i64 {
    date.and_hms_opt(23, 59, 59)
        .map(|dt| Utc.from_utc_datetime(&dt).timestamp())
        .unwrap_or(0)
}

fn timestamp_to_date(ts: i64) -> Option<NaiveDate> {
    Utc.timestamp_opt(ts, 0).single().map(|dt| dt.date_naive())
}

/// Unwraps the single chart result, mapping API-level errors.
fn chart_data(symbol: &Symbol, response: ChartResponse) -> Result<ChartData> {
    if let Some(error) = response.chart.error {
        if error.code == "Not Found" {
            return Err(DataError::SymbolNotFound(symbol.to_string()));
        }
        return Err(DataError::Other(format!(
            "{}: {}",
            error.code, error.description
        )));
    }
    response
        .chart
        .result
        .into_iter()
        .flatten()
        .next()
        .ok_or_else(|| DataError::SymbolNotFound(symbol.to_string()))
}

fn parse_closes(data: &ChartData) -> PriceHistory {
    let closes = data
        .indicators
        .quote
        .first()
        .map(|q| q.close.as_slice())
        .unwrap_or_default();
    let timestamps = data.timestamp.as_deref().unwrap_or_default();
    PriceHistory::new(
        timestamps
            .iter()
            .zip(closes)
            .filter_map(|(&ts, close)| Some((timestamp_to_date(ts)?, (*close)?))),
    )
}

fn parse_dividends(data: &ChartData) -> DividendSeries {
    let dividends = data
        .events
        .as_ref()
        .and_then(|e| e.dividends.as_ref())
        .map(|d| {
            d.values()
                .filter_map(|div| Some((timestamp_to_date(div.date)?, div.amount)))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    DividendSeries::new(dividends)
}

/// The live rate of a currency-pair chart: the market price, else the last close.
fn parse_rate(data: &ChartData) -> Option<f64> {
    data.meta
        .as_ref()
        .and_then(|m| m.regular_market_price)
        .filter(|r| *r > 0.0)
        .or_else(|| parse_closes(data).latest())
}

fn parse_profile(symbol: &Symbol, response: QuoteSummaryResponse) -> Result<EntityProfile> {
    let result = response
        .quote_summary
        .result
        .into_iter()
        .flatten()
        .next()
        .ok_or_else(|| DataError::SymbolNotFound(symbol.to_string()))?;

    let price = result.price.unwrap_or_default();
    let asset = result.asset_profile.unwrap_or_default();
    let currency = price
        .currency
        .ok_or_else(|| DataError::DataNotAvailable {
            symbol: symbol.to_string(),
            what: "trading currency".to_string(),
        })?;
    let name = price
        .long_name
        .or(price.short_name)
        .unwrap_or_else(|| symbol.to_string());

    let mut profile = EntityProfile::new(symbol.clone(), name, currency).with_quote(
        price.regular_market_price.and_then(|v| v.raw),
        price.regular_market_previous_close.and_then(|v| v.raw),
    );
    profile.sector = asset.sector;
    profile.industry = asset.industry;
    profile.shares_outstanding = result
        .default_key_statistics
        .and_then(|s| s.shares_outstanding)
        .and_then(|v| v.raw);
    if let Some(financial) = result.financial_data.and_then(|f| f.financial_currency) {
        profile = profile.with_financial_currency(financial);
    }
    Ok(profile)
}

impl DataProvider for YahooProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn description(&self) -> &str {
        "Yahoo Finance provider for statements, daily prices, dividends and quotes"
    }
}

#[async_trait]
impl PriceDataProvider for YahooProvider {
    #[instrument(skip(self), fields(provider = PROVIDER_NAME, symbol = %symbol))]
    async fn fetch_closes(
        &self,
        symbol: &Symbol,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceHistory> {
        if start > end {
            return Err(DataError::InvalidParameter(format!(
                "Start date {} is after end date {}",
                start, end
            )));
        }
        let listing = self.listing(symbol);
        let url = Self::build_chart_url(&listing, start, end, false);
        let data = self.fetch_chart(&listing, &url).await?;
        let closes = parse_closes(&data);
        if closes.is_empty() {
            // periods fall back to the current price downstream
            debug!("No closes for {} between {} and {}", listing, start, end);
        }
        Ok(closes)
    }

    #[instrument(skip(self), fields(provider = PROVIDER_NAME, symbol = %symbol))]
    async fn fetch_dividends(
        &self,
        symbol: &Symbol,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<DividendSeries> {
        let listing = self.listing(symbol);
        let url = Self::build_chart_url(&listing, start, end, true);
        let data = self.fetch_chart(&listing, &url).await?;
        Ok(parse_dividends(&data))
    }

    #[instrument(skip(self), fields(provider = PROVIDER_NAME))]
    async fn fetch_exchange_rate(&self, from: &str, to: &str) -> Result<f64> {
        let pair = Symbol::new(format!("{from}{to}=X"));
        let end = Utc::now().date_naive();
        let url = Self::build_chart_url(&pair, end - chrono::Duration::days(7), end, false);
        let data = self.fetch_chart(&pair, &url).await?;
        parse_rate(&data).ok_or_else(|| DataError::DataNotAvailable {
            symbol: pair.to_string(),
            what: "exchange rate".to_string(),
        })
    }
}

#[async_trait]
impl FundamentalDataProvider for YahooProvider {
    #[instrument(skip(self), fields(provider = PROVIDER_NAME, symbol = %symbol))]
    async fn fetch_statement(
        &self,
        symbol: &Symbol,
        kind: StatementKind,
        period_type: PeriodType,
    ) -> Result<RawStatement> {
        let listing = self.listing(symbol);
        let url =
            Self::build_timeseries_url(&listing, kind, period_type, Utc::now().date_naive());
        let body: serde_json::Value = self.get_json(&url, &listing).await?;
        timeseries::parse_statement(&body, kind, period_type)
    }
}

#[async_trait]
impl ReferenceDataProvider for YahooProvider {
    #[instrument(skip(self), fields(provider = PROVIDER_NAME, symbol = %symbol))]
    async fn profile(&self, symbol: &Symbol) -> Result<EntityProfile> {
        let listing = self.listing(symbol);
        let url = format!(
            "{}/{}?modules=price,assetProfile,defaultKeyStatistics,financialData",
            QUOTE_SUMMARY_URL,
            listing.as_str()
        );
        let response: QuoteSummaryResponse = self.get_json(&url, &listing).await?;
        parse_profile(&listing, response)
    }

    async fn supports_symbol(&self, symbol: &Symbol) -> Result<bool> {
        // A few days of closes is the cheapest way to validate a symbol.
        let end = Utc::now().date_naive();
        let start = end - chrono::Duration::days(5);

        match self.fetch_closes(symbol, start, end).await {
            Ok(_) => Ok(true),
            Err(DataError::SymbolNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

// ============================================================================
// Yahoo Finance API Response Types
// ============================================================================

/// Chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
    events: Option<ChartEvents>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct ChartEvents {
    dividends: Option<HashMap<String, DividendEvent>>,
}

#[derive(Debug, Deserialize)]
struct DividendEvent {
    amount: f64,
    date: i64,
}

/// Quote Summary API response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResponse {
    quote_summary: QuoteSummaryResult,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryResult {
    result: Option<Vec<QuoteSummaryData>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryData {
    price: Option<PriceModule>,
    asset_profile: Option<AssetProfile>,
    default_key_statistics: Option<KeyStatistics>,
    financial_data: Option<FinancialData>,
}

/// A `{ "raw": 1.0, "fmt": "1.00" }` value.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
struct RawValue {
    raw: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceModule {
    long_name: Option<String>,
    short_name: Option<String>,
    currency: Option<String>,
    regular_market_price: Option<RawValue>,
    regular_market_previous_close: Option<RawValue>,
}

#[derive(Debug, Default, Deserialize)]
struct AssetProfile {
    sector: Option<String>,
    industry: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyStatistics {
    shares_outstanding: Option<RawValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinancialData {
    financial_currency: Option<String>,
}
