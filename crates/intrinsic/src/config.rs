//! Analyzer configuration.

use std::collections::HashMap;
use std::time::Duration;

use intrinsic_core::{DataError, Result};
use intrinsic_engine::EngineSettings;
use serde::{Deserialize, Serialize};

/// Settings for an [`Analyzer`](crate::Analyzer).
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// use intrinsic::AnalyzerConfig;
///
/// let config = AnalyzerConfig::from_json(r#"{ "fetch_timeout_ms": 10000 }"#).unwrap();
/// assert_eq!(config.history_years, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Upper bound on each provider call, in milliseconds.
    pub fetch_timeout_ms: u64,
    /// Years of daily closes and dividends fetched.
    pub history_years: u32,
    /// Most recent annual periods kept in the table.
    pub max_periods: usize,
    /// Rates used when no live rate is available, keyed `"FROM/TO"`.
    pub fallback_rates: HashMap<String, f64>,
    /// DCF growth when revenue history gives none, percent.
    pub default_growth_pct: f64,
    /// Analyses run at once by [`Analyzer::analyze_many`](crate::Analyzer::analyze_many).
    pub max_concurrency: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: 30_000,
            history_years: 5,
            max_periods: 4,
            fallback_rates: HashMap::from([("USD/IDR".to_string(), 16_600.0)]),
            default_growth_pct: 7.0,
            max_concurrency: 4,
        }
    }
}

impl AnalyzerConfig {
    /// Parses a JSON document, filling absent fields with defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| DataError::Parse(e.to_string()))
    }

    /// Sets the fetch timeout, saturating at `u64::MAX` milliseconds.
    #[must_use]
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets a fallback exchange rate for `from` into `to`.
    #[must_use]
    pub fn with_fallback_rate(mut self, from: &str, to: &str, rate: f64) -> Self {
        self.fallback_rates.insert(pair_key(from, to), rate);
        self
    }

    /// Sets how many periods the table keeps.
    #[must_use]
    pub const fn with_max_periods(mut self, max_periods: usize) -> Self {
        self.max_periods = max_periods;
        self
    }

    /// Returns the fetch timeout.
    #[must_use]
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Returns the configured fallback rate for `from` into `to`.
    #[must_use]
    pub fn fallback_rate(&self, from: &str, to: &str) -> Option<f64> {
        self.fallback_rates.get(&pair_key(from, to)).copied()
    }

    /// Returns the engine settings derived from this config.
    #[must_use]
    pub const fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            max_periods: self.max_periods,
            default_growth_pct: self.default_growth_pct,
        }
    }
}

fn pair_key(from: &str, to: &str) -> String {
    format!("{}/{}", from.trim().to_uppercase(), to.trim().to_uppercase())
}
