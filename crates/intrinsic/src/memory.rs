//! In-memory provider for tests and offline analysis.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use intrinsic_core::{
    DataError, DataProvider, DividendSeries, EntityProfile, FundamentalDataProvider, PeriodType,
    PriceDataProvider, PriceHistory, RawStatement, ReferenceDataProvider, Result, StatementKind,
    Symbol,
};
use intrinsic_engine::StatementSet;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Everything a provider knows about one entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityData {
    /// Metadata and quote.
    pub profile: EntityProfile,
    /// Raw statements.
    pub statements: StatementSet,
    /// Daily closes.
    pub prices: PriceHistory,
    /// Dividend actions.
    pub dividends: DividendSeries,
}

impl EntityData {
    /// Creates entity data with empty statements and history.
    #[must_use]
    pub fn new(profile: EntityProfile) -> Self {
        Self {
            profile,
            ..Default::default()
        }
    }

    /// Sets a statement, replacing the one with the same kind and cadence.
    #[must_use]
    pub fn with_statement(mut self, statement: RawStatement) -> Self {
        self.statements.insert(statement);
        self
    }

    /// Sets the daily closes.
    #[must_use]
    pub fn with_prices(mut self, prices: PriceHistory) -> Self {
        self.prices = prices;
        self
    }

    /// Sets the dividend actions.
    #[must_use]
    pub fn with_dividends(mut self, dividends: DividendSeries) -> Self {
        self.dividends = dividends;
        self
    }
}

/// Provider serving fixed data from memory.
///
/// Entities are stored in a `RwLock`-protected `HashMap` and cloned on every
/// fetch. A failure or latency can be injected to exercise fallback and
/// timeout handling.
#[derive(Debug, Default)]
pub struct InMemoryProvider {
    name: String,
    entities: RwLock<HashMap<Symbol, EntityData>>,
    rates: RwLock<HashMap<(String, String), f64>>,
    failure: Option<DataError>,
    latency: Option<Duration>,
}

impl InMemoryProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Adds an entity keyed by its profile symbol.
    #[must_use]
    pub fn with_entity(mut self, data: EntityData) -> Self {
        self.entities
            .get_mut()
            .insert(data.profile.symbol.clone(), data);
        self
    }

    /// Adds a live exchange rate converting one `from` into `to`.
    #[must_use]
    pub fn with_rate(mut self, from: &str, to: &str, rate: f64) -> Self {
        self.rates
            .get_mut()
            .insert((from.to_uppercase(), to.to_uppercase()), rate);
        self
    }

    /// Makes every fetch fail with `error`.
    #[must_use]
    pub fn with_failure(mut self, error: DataError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Delays every fetch by `latency`.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Adds or replaces an entity on a shared provider.
    pub async fn insert(&self, data: EntityData) {
        let mut entities = self.entities.write().await;
        entities.insert(data.profile.symbol.clone(), data);
    }

    /// Removes every entity and rate.
    pub async fn clear(&self) {
        self.entities.write().await.clear();
        self.rates.write().await.clear();
    }

    async fn prepare(&self) -> Result<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    async fn entity<T>(&self, symbol: &Symbol, read: impl FnOnce(&EntityData) -> T) -> Result<T> {
        self.prepare().await?;
        let entities = self.entities.read().await;
        match entities.get(symbol) {
            Some(data) => {
                debug!("Entity hit");
                Ok(read(data))
            }
            None => Err(DataError::SymbolNotFound(symbol.to_string())),
        }
    }
}

fn check_range(start: NaiveDate, end: NaiveDate) -> Result<()> {
    if start > end {
        return Err(DataError::InvalidParameter(format!(
            "start {start} is after end {end}"
        )));
    }
    Ok(())
}

impl DataProvider for InMemoryProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Fixed entity data held in memory"
    }
}

#[async_trait]
impl PriceDataProvider for InMemoryProvider {
    #[instrument(skip(self), fields(provider = %self.name, symbol = %symbol))]
    async fn fetch_closes(
        &self,
        symbol: &Symbol,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceHistory> {
        check_range(start, end)?;
        self.entity(symbol, |data| {
            PriceHistory::new(
                data.prices
                    .iter()
                    .filter(|(date, _)| *date >= start && *date <= end),
            )
        })
        .await
    }

    #[instrument(skip(self), fields(provider = %self.name, symbol = %symbol))]
    async fn fetch_dividends(
        &self,
        symbol: &Symbol,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<DividendSeries> {
        check_range(start, end)?;
        self.entity(symbol, |data| {
            DividendSeries::new(
                data.dividends
                    .iter()
                    .filter(|(date, _)| *date >= start && *date <= end),
            )
        })
        .await
    }

    #[instrument(skip(self), fields(provider = %self.name))]
    async fn fetch_exchange_rate(&self, from: &str, to: &str) -> Result<f64> {
        self.prepare().await?;
        if from.eq_ignore_ascii_case(to) {
            return Ok(1.0);
        }
        let rates = self.rates.read().await;
        rates
            .get(&(from.to_uppercase(), to.to_uppercase()))
            .copied()
            .ok_or_else(|| DataError::DataNotAvailable {
                symbol: format!("{from}/{to}"),
                what: "exchange rate".to_string(),
            })
    }
}

#[async_trait]
impl FundamentalDataProvider for InMemoryProvider {
    #[instrument(skip(self), fields(provider = %self.name, symbol = %symbol))]
    async fn fetch_statement(
        &self,
        symbol: &Symbol,
        kind: StatementKind,
        period_type: PeriodType,
    ) -> Result<RawStatement> {
        self.entity(symbol, |data| data.statements.get(kind, period_type).clone())
            .await
    }
}

#[async_trait]
impl ReferenceDataProvider for InMemoryProvider {
    #[instrument(skip(self), fields(provider = %self.name, symbol = %symbol))]
    async fn profile(&self, symbol: &Symbol) -> Result<EntityProfile> {
        self.entity(symbol, |data| data.profile.clone()).await
    }

    async fn supports_symbol(&self, symbol: &Symbol) -> Result<bool> {
        Ok(self.entities.read().await.contains_key(symbol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn provider() -> InMemoryProvider {
        let profile = EntityProfile::new(Symbol::new("TLKM"), "Telkom", "IDR");
        let data = EntityData::new(profile)
            .with_statement(
                RawStatement::new(StatementKind::Income, PeriodType::Annual)
                    .with_period(date(2023, 12, 31), [("Net Income", Some(24.0))]),
            )
            .with_prices(PriceHistory::new([
                (date(2022, 12, 30), 3_750.0),
                (date(2023, 12, 29), 3_950.0),
            ]))
            .with_dividends(DividendSeries::new([(date(2023, 5, 30), 167.6)]));
        InMemoryProvider::new("memory")
            .with_entity(data)
            .with_rate("usd", "idr", 15_500.0)
    }

    #[tokio::test]
    async fn test_serves_entity() {
        let provider = provider();
        let symbol = Symbol::new("TLKM");

        let income = provider
            .fetch_statement(&symbol, StatementKind::Income, PeriodType::Annual)
            .await
            .unwrap();
        assert_eq!(income.value("Net Income", 0), Some(24.0));

        let balance = provider
            .fetch_statement(&symbol, StatementKind::BalanceSheet, PeriodType::Annual)
            .await
            .unwrap();
        assert!(balance.is_empty());

        let closes = provider
            .fetch_closes(&symbol, date(2023, 1, 1), date(2023, 12, 31))
            .await
            .unwrap();
        assert_eq!(closes.len(), 1);
        assert_eq!(closes.latest(), Some(3_950.0));

        let dividends = provider
            .fetch_dividends(&symbol, date(2023, 1, 1), date(2023, 12, 31))
            .await
            .unwrap();
        assert_eq!(dividends.total_for_year(2023), 167.6);
    }

    #[tokio::test]
    async fn test_unknown_symbol() {
        let provider = provider();
        assert!(!provider.supports_symbol(&Symbol::new("BBRI")).await.unwrap());
        assert!(matches!(
            provider.profile(&Symbol::new("BBRI")).await,
            Err(DataError::SymbolNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rates() {
        let provider = provider();
        assert_eq!(provider.fetch_exchange_rate("USD", "IDR").await.unwrap(), 15_500.0);
        assert_eq!(provider.fetch_exchange_rate("IDR", "idr").await.unwrap(), 1.0);
        assert!(matches!(
            provider.fetch_exchange_rate("EUR", "IDR").await,
            Err(DataError::DataNotAvailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let provider = provider().with_failure(DataError::Network("down".to_string()));
        assert!(matches!(
            provider.profile(&Symbol::new("TLKM")).await,
            Err(DataError::Network(_))
        ));
    }

    #[tokio::test]
    async fn test_insert_and_clear() {
        let provider = InMemoryProvider::new("memory");
        let symbol = Symbol::new("ASII");
        provider
            .insert(EntityData::new(EntityProfile::new(symbol.clone(), "Astra", "IDR")))
            .await;
        assert!(provider.supports_symbol(&symbol).await.unwrap());
        provider.clear().await;
        assert!(!provider.supports_symbol(&symbol).await.unwrap());
    }
}
