//! Provider registry with ordered fallback.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, warn};

use intrinsic_core::{
    DataError, DividendSeries, EntityProfile, FundamentalDataProvider, PeriodType,
    PriceDataProvider, PriceHistory, RawStatement, ReferenceDataProvider, Result, StatementKind,
    Symbol,
};

/// Registry for managing multiple data providers with automatic fallback.
///
/// Providers are registered per concern (prices, statements, reference data)
/// and tried in registration order until one succeeds. An
/// [`DataError::InvalidParameter`] is returned immediately since another
/// provider would reject the same request.
///
/// # Example
///
/// ```rust,ignore
/// use intrinsic::{ProviderRegistry, Symbol};
///
/// let registry = ProviderRegistry::new().with_yahoo();
/// let profile = registry.profile(&Symbol::new("AAPL")).await?;
/// ```
#[derive(Default)]
pub struct ProviderRegistry {
    price_providers: Vec<Arc<dyn PriceDataProvider>>,
    fundamental_providers: Vec<Arc<dyn FundamentalDataProvider>>,
    reference_providers: Vec<Arc<dyn ReferenceDataProvider>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field(
                "price_providers",
                &self
                    .price_providers
                    .iter()
                    .map(|p| p.name())
                    .collect::<Vec<_>>(),
            )
            .field(
                "fundamental_providers",
                &self
                    .fundamental_providers
                    .iter()
                    .map(|p| p.name())
                    .collect::<Vec<_>>(),
            )
            .field(
                "reference_providers",
                &self
                    .reference_providers
                    .iter()
                    .map(|p| p.name())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

fn exhausted(last_error: Option<DataError>) -> DataError {
    last_error.unwrap_or_else(|| DataError::Other("All providers failed with no error".to_string()))
}

impl ProviderRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a price data provider.
    pub fn register_price(&mut self, provider: Arc<dyn PriceDataProvider>) {
        debug!(provider = provider.name(), "Registering price provider");
        self.price_providers.push(provider);
    }

    /// Register a fundamental data provider.
    pub fn register_fundamental(&mut self, provider: Arc<dyn FundamentalDataProvider>) {
        debug!(
            provider = provider.name(),
            "Registering fundamental provider"
        );
        self.fundamental_providers.push(provider);
    }

    /// Register a reference data provider.
    pub fn register_reference(&mut self, provider: Arc<dyn ReferenceDataProvider>) {
        debug!(provider = provider.name(), "Registering reference provider");
        self.reference_providers.push(provider);
    }

    /// Register one provider for every concern it serves.
    #[must_use]
    pub fn with_provider<P>(mut self, provider: Arc<P>) -> Self
    where
        P: PriceDataProvider + FundamentalDataProvider + ReferenceDataProvider + 'static,
    {
        self.register_price(provider.clone());
        self.register_fundamental(provider.clone());
        self.register_reference(provider);
        self
    }

    /// Fetch daily closes, trying providers in order until one succeeds.
    pub async fn fetch_closes(
        &self,
        symbol: &Symbol,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceHistory> {
        if self.price_providers.is_empty() {
            return Err(DataError::ProviderNotConfigured(
                "No price providers registered".to_string(),
            ));
        }

        let mut last_error = None;
        for provider in &self.price_providers {
            debug!(provider = provider.name(), symbol = %symbol, "Fetching closes");

            match provider.fetch_closes(symbol, start, end).await {
                Ok(data) => return Ok(data),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    warn!(
                        provider = provider.name(),
                        error = %e,
                        "Provider failed, trying next"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(exhausted(last_error))
    }

    /// Fetch dividend actions, trying providers in order until one succeeds.
    pub async fn fetch_dividends(
        &self,
        symbol: &Symbol,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<DividendSeries> {
        if self.price_providers.is_empty() {
            return Err(DataError::ProviderNotConfigured(
                "No price providers registered".to_string(),
            ));
        }

        let mut last_error = None;
        for provider in &self.price_providers {
            debug!(provider = provider.name(), symbol = %symbol, "Fetching dividends");

            match provider.fetch_dividends(symbol, start, end).await {
                Ok(data) => return Ok(data),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    warn!(
                        provider = provider.name(),
                        error = %e,
                        "Provider failed, trying next"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(exhausted(last_error))
    }

    /// Fetch a live exchange rate, trying providers in order until one succeeds.
    pub async fn fetch_exchange_rate(&self, from: &str, to: &str) -> Result<f64> {
        if self.price_providers.is_empty() {
            return Err(DataError::ProviderNotConfigured(
                "No price providers registered".to_string(),
            ));
        }

        let mut last_error = None;
        for provider in &self.price_providers {
            debug!(provider = provider.name(), from, to, "Fetching exchange rate");

            match provider.fetch_exchange_rate(from, to).await {
                Ok(rate) => return Ok(rate),
                Err(e) => {
                    warn!(
                        provider = provider.name(),
                        error = %e,
                        "Provider failed, trying next"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(exhausted(last_error))
    }

    /// Fetch a raw statement, trying providers in order until one succeeds.
    pub async fn fetch_statement(
        &self,
        symbol: &Symbol,
        kind: StatementKind,
        period_type: PeriodType,
    ) -> Result<RawStatement> {
        if self.fundamental_providers.is_empty() {
            return Err(DataError::ProviderNotConfigured(
                "No fundamental providers registered".to_string(),
            ));
        }

        let mut last_error = None;
        for provider in &self.fundamental_providers {
            debug!(
                provider = provider.name(),
                symbol = %symbol,
                statement = %kind,
                ?period_type,
                "Fetching statement"
            );

            match provider.fetch_statement(symbol, kind, period_type).await {
                Ok(data) => return Ok(data),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    warn!(
                        provider = provider.name(),
                        error = %e,
                        "Provider failed, trying next"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(exhausted(last_error))
    }

    /// Fetch the entity profile, trying providers in order until one succeeds.
    pub async fn profile(&self, symbol: &Symbol) -> Result<EntityProfile> {
        if self.reference_providers.is_empty() {
            return Err(DataError::ProviderNotConfigured(
                "No reference providers registered".to_string(),
            ));
        }

        let mut last_error = None;
        for provider in &self.reference_providers {
            debug!(provider = provider.name(), symbol = %symbol, "Fetching profile");

            match provider.profile(symbol).await {
                Ok(data) => return Ok(data),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    warn!(
                        provider = provider.name(),
                        error = %e,
                        "Provider failed, trying next"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(exhausted(last_error))
    }

    /// Add the Yahoo Finance provider.
    #[cfg(feature = "yahoo")]
    #[must_use]
    pub fn with_yahoo(self) -> Self {
        self.with_provider(Arc::new(intrinsic_yahoo::YahooProvider::new()))
    }

    /// Add the Yahoo Finance provider with an exchange suffix (`JK` for IDX).
    #[cfg(feature = "yahoo")]
    #[must_use]
    pub fn with_yahoo_suffix(self, suffix: &str) -> Self {
        self.with_provider(Arc::new(
            intrinsic_yahoo::YahooProvider::new().with_exchange_suffix(suffix),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{EntityData, InMemoryProvider};

    fn symbol() -> Symbol {
        Symbol::new("BBCA.JK")
    }

    fn provider(name: &str, price: f64) -> Arc<InMemoryProvider> {
        let profile = EntityProfile::new(symbol(), name, "IDR").with_quote(Some(price), None);
        Arc::new(InMemoryProvider::new(name).with_entity(EntityData::new(profile)))
    }

    #[tokio::test]
    async fn test_empty_registry() {
        let registry = ProviderRegistry::new();
        assert!(matches!(
            registry.profile(&symbol()).await,
            Err(DataError::ProviderNotConfigured(_))
        ));
        assert!(matches!(
            registry.fetch_exchange_rate("USD", "IDR").await,
            Err(DataError::ProviderNotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn test_first_provider_wins() {
        let registry = ProviderRegistry::new()
            .with_provider(provider("primary", 100.0))
            .with_provider(provider("secondary", 200.0));
        let profile = registry.profile(&symbol()).await.unwrap();
        assert_eq!(profile.current_price, Some(100.0));
    }

    #[tokio::test]
    async fn test_falls_back_on_failure() {
        let failing = Arc::new(
            InMemoryProvider::new("flaky").with_failure(DataError::Network("reset".to_string())),
        );
        let registry = ProviderRegistry::new()
            .with_provider(failing)
            .with_provider(provider("backup", 200.0));
        let profile = registry.profile(&symbol()).await.unwrap();
        assert_eq!(profile.current_price, Some(200.0));
    }

    #[tokio::test]
    async fn test_last_error_is_returned() {
        let registry = ProviderRegistry::new()
            .with_provider(Arc::new(InMemoryProvider::new("empty")));
        assert!(matches!(
            registry
                .fetch_statement(&symbol(), StatementKind::Income, PeriodType::Annual)
                .await,
            Err(DataError::SymbolNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_parameter_is_not_retried() {
        let registry = ProviderRegistry::new()
            .with_provider(provider("primary", 100.0))
            .with_provider(provider("secondary", 200.0));
        let start = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(matches!(
            registry.fetch_closes(&symbol(), start, end).await,
            Err(DataError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_debug_lists_providers() {
        let registry = ProviderRegistry::new().with_provider(provider("primary", 1.0));
        assert!(format!("{registry:?}").contains("primary"));
    }
}
