//! Boundary fetch and engine run for one or many entities.

use std::future::Future;
use std::sync::Arc;

use chrono::{Months, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use tracing::{debug, instrument, warn};

use intrinsic_core::{
    DataError, EntityProfile, PeriodType, PriceHistory, Result, StatementKind, Symbol,
};
use intrinsic_engine::{
    AnalysisInputs, CurrencyNormalizer, Diagnostic, Diagnostics, PeerComparison, Report,
    StatementSet, ValuationAssumptions, pipeline,
};

use crate::config::AnalyzerConfig;
use crate::registry::ProviderRegistry;

/// Fetches an entity's inputs through a [`ProviderRegistry`] and runs the engine.
///
/// Every provider call is bounded by the configured timeout. Any failed or
/// timed out fetch fails the whole analysis; inside the engine, missing data
/// only makes individual metrics unavailable.
#[derive(Debug, Clone)]
pub struct Analyzer {
    registry: Arc<ProviderRegistry>,
    config: AnalyzerConfig,
}

impl Analyzer {
    /// Creates an analyzer over `registry`.
    #[must_use]
    pub const fn new(registry: Arc<ProviderRegistry>, config: AnalyzerConfig) -> Self {
        Self { registry, config }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Runs a full analysis of `symbol`.
    #[instrument(skip(self, assumptions), fields(symbol = %symbol))]
    pub async fn analyze(
        &self,
        symbol: &Symbol,
        assumptions: &ValuationAssumptions,
    ) -> Result<Report> {
        assumptions.validate()?;
        let (inputs, diagnostics) = self.fetch_inputs(symbol).await?;
        pipeline::run(
            &inputs,
            assumptions,
            &self.config.engine_settings(),
            diagnostics,
        )
    }

    /// Analyzes several symbols concurrently.
    ///
    /// At most `max_concurrency` analyses run at once. Results come back in
    /// the order of `symbols`, each with its own outcome.
    #[instrument(skip_all, fields(count = symbols.len()))]
    pub async fn analyze_many(
        &self,
        symbols: &[Symbol],
        assumptions: &ValuationAssumptions,
    ) -> Vec<(Symbol, Result<Report>)> {
        let limit = self.config.max_concurrency.max(1);
        let mut results: Vec<_> = stream::iter(symbols.iter().enumerate())
            .map(|(index, symbol)| async move {
                let result = self.analyze(symbol, assumptions).await;
                if let Err(e) = &result {
                    warn!(symbol = %symbol, error = %e, "Analysis failed");
                }
                (index, symbol.clone(), result)
            })
            .buffer_unordered(limit)
            .collect()
            .await;
        results.sort_by_key(|(index, _, _)| *index);
        results
            .into_iter()
            .map(|(_, symbol, result)| (symbol, result))
            .collect()
    }

    /// Builds the peer matrix for `symbols`.
    ///
    /// Symbols whose analysis fails or that have no annual periods are left
    /// out; rows keep the order of `symbols`.
    pub async fn compare(
        &self,
        symbols: &[Symbol],
        assumptions: &ValuationAssumptions,
    ) -> PeerComparison {
        let reports: Vec<Report> = self
            .analyze_many(symbols, assumptions)
            .await
            .into_iter()
            .filter_map(|(_, result)| result.ok())
            .collect();
        let peers = PeerComparison::from_reports(&reports);
        debug!(requested = symbols.len(), rows = peers.len(), "Built peer comparison");
        peers
    }

    /// Fetches everything the engine needs for `symbol`.
    ///
    /// The returned diagnostics hold anything degraded at the boundary: a
    /// fallback exchange rate or a missing live quote.
    #[instrument(skip(self), fields(symbol = %symbol))]
    pub async fn fetch_inputs(&self, symbol: &Symbol) -> Result<(AnalysisInputs, Diagnostics)> {
        let registry = &self.registry;
        let end = Utc::now().date_naive();
        let start = history_start(end, self.config.history_years);

        let profile = self.bounded("profile", registry.profile(symbol)).await?;

        let (annual_income, annual_balance, quarterly_income, quarterly_balance, prices, dividends) =
            tokio::try_join!(
                self.bounded(
                    "annual income statement",
                    registry.fetch_statement(symbol, StatementKind::Income, PeriodType::Annual),
                ),
                self.bounded(
                    "annual balance sheet",
                    registry.fetch_statement(symbol, StatementKind::BalanceSheet, PeriodType::Annual),
                ),
                self.bounded(
                    "quarterly income statement",
                    registry.fetch_statement(symbol, StatementKind::Income, PeriodType::Quarterly),
                ),
                self.bounded(
                    "quarterly balance sheet",
                    registry.fetch_statement(
                        symbol,
                        StatementKind::BalanceSheet,
                        PeriodType::Quarterly,
                    ),
                ),
                self.bounded("closes", registry.fetch_closes(symbol, start, end)),
                self.bounded("dividends", registry.fetch_dividends(symbol, start, end)),
            )?;
        debug!(
            annual = annual_income.len(),
            quarterly = quarterly_income.len(),
            closes = prices.len(),
            "Fetched statements and history"
        );

        let mut diagnostics = Diagnostics::new();
        let current_price = current_price(&profile, &prices, &mut diagnostics)?;
        let currency = self.currency(&profile, &mut diagnostics).await?;

        let mut statements = StatementSet::default();
        for statement in [annual_income, annual_balance, quarterly_income, quarterly_balance] {
            statements.insert(statement);
        }

        Ok((
            AnalysisInputs {
                profile,
                statements,
                prices,
                dividends,
                currency,
                current_price,
            },
            diagnostics,
        ))
    }

    async fn currency(
        &self,
        profile: &EntityProfile,
        diagnostics: &mut Diagnostics,
    ) -> Result<CurrencyNormalizer> {
        let source = profile.reporting_currency();
        let target = profile.currency.as_str();
        if source.eq_ignore_ascii_case(target) {
            return Ok(CurrencyNormalizer::identity(target));
        }
        let live = self
            .bounded("exchange rate", self.registry.fetch_exchange_rate(source, target))
            .await;
        CurrencyNormalizer::resolve(
            source,
            target,
            live,
            self.config.fallback_rate(source, target),
            diagnostics,
        )
    }

    async fn bounded<T>(&self, what: &str, fetch: impl Future<Output = Result<T>>) -> Result<T> {
        let after = self.config.fetch_timeout();
        match tokio::time::timeout(after, fetch).await {
            Ok(result) => result,
            Err(_) => {
                warn!(what, ?after, "Fetch timed out");
                Err(DataError::Timeout {
                    provider: "provider registry".to_string(),
                    what: what.to_string(),
                    after,
                })
            }
        }
    }
}

fn history_start(end: NaiveDate, years: u32) -> NaiveDate {
    end.checked_sub_months(Months::new(years.saturating_mul(12)))
        .unwrap_or(NaiveDate::MIN)
}

/// The live quote, else the previous close, else the latest fetched close.
fn current_price(
    profile: &EntityProfile,
    prices: &PriceHistory,
    diagnostics: &mut Diagnostics,
) -> Result<f64> {
    if let Some(price) = profile.current_price.filter(|p| *p > 0.0) {
        return Ok(price);
    }
    if let Some(price) = profile.previous_close.filter(|p| *p > 0.0) {
        diagnostics.flag(Diagnostic::QuoteFallback {
            source: "previous close",
        });
        return Ok(price);
    }
    if let Some(price) = prices.latest().filter(|p| *p > 0.0) {
        diagnostics.flag(Diagnostic::QuoteFallback {
            source: "latest close",
        });
        return Ok(price);
    }
    Err(DataError::DataNotAvailable {
        symbol: profile.symbol.to_string(),
        what: "current price".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{EntityData, InMemoryProvider};
    use intrinsic_engine::RateSource;
    use std::time::Duration;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn analyzer(provider: InMemoryProvider, config: AnalyzerConfig) -> Analyzer {
        let registry = ProviderRegistry::new().with_provider(Arc::new(provider));
        Analyzer::new(Arc::new(registry), config)
    }

    fn entity(profile: EntityProfile) -> EntityData {
        EntityData::new(profile)
    }

    #[test]
    fn test_history_start() {
        assert_eq!(history_start(date(2024, 2, 29), 5), date(2019, 2, 28));
    }

    #[test]
    fn test_current_price_fallbacks() {
        let symbol = Symbol::new("X");
        let prices = PriceHistory::new([(date(2024, 1, 2), 90.0)]);

        let mut diags = Diagnostics::new();
        let live = EntityProfile::new(symbol.clone(), "X", "IDR").with_quote(Some(100.0), Some(95.0));
        assert_eq!(current_price(&live, &prices, &mut diags).unwrap(), 100.0);
        assert!(diags.is_empty());

        let prev = EntityProfile::new(symbol.clone(), "X", "IDR").with_quote(None, Some(95.0));
        assert_eq!(current_price(&prev, &prices, &mut diags).unwrap(), 95.0);

        let bare = EntityProfile::new(symbol, "X", "IDR");
        assert_eq!(current_price(&bare, &prices, &mut diags).unwrap(), 90.0);
        assert_eq!(diags.entries().len(), 2);

        assert!(matches!(
            current_price(&bare, &PriceHistory::default(), &mut diags),
            Err(DataError::DataNotAvailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_live_rate_is_preferred() {
        let profile = EntityProfile::new(Symbol::new("ADRO"), "Adaro", "IDR")
            .with_quote(Some(2_500.0), None)
            .with_financial_currency("USD");
        let provider = InMemoryProvider::new("memory")
            .with_entity(entity(profile))
            .with_rate("USD", "IDR", 15_900.0);
        let (inputs, diags) = analyzer(provider, AnalyzerConfig::default())
            .fetch_inputs(&Symbol::new("ADRO"))
            .await
            .unwrap();
        assert_eq!(inputs.currency.rate(), 15_900.0);
        assert_eq!(inputs.currency.rate_source(), RateSource::Live);
        assert!(diags.is_empty());
    }

    #[tokio::test]
    async fn test_missing_fallback_rate_fails() {
        let profile = EntityProfile::new(Symbol::new("X"), "X", "IDR")
            .with_quote(Some(100.0), None)
            .with_financial_currency("EUR");
        let provider = InMemoryProvider::new("memory").with_entity(entity(profile));
        let result = analyzer(provider, AnalyzerConfig::default())
            .fetch_inputs(&Symbol::new("X"))
            .await;
        assert!(matches!(result, Err(DataError::DataNotAvailable { .. })));
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let profile = EntityProfile::new(Symbol::new("X"), "X", "IDR").with_quote(Some(100.0), None);
        let provider = InMemoryProvider::new("memory")
            .with_entity(entity(profile))
            .with_latency(Duration::from_millis(200));
        let config = AnalyzerConfig::default().with_fetch_timeout(Duration::from_millis(20));
        let result = analyzer(provider, config)
            .analyze(&Symbol::new("X"), &ValuationAssumptions::default())
            .await;
        assert!(matches!(result, Err(DataError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_invalid_assumptions_fail_before_fetching() {
        let provider = InMemoryProvider::new("memory")
            .with_failure(DataError::Network("unreachable".to_string()));
        let assumptions = ValuationAssumptions::default().with_terminal_growth_pct(9.0);
        let result = analyzer(provider, AnalyzerConfig::default())
            .analyze(&Symbol::new("X"), &assumptions)
            .await;
        assert!(matches!(result, Err(DataError::InvalidParameter(_))));
    }
}
