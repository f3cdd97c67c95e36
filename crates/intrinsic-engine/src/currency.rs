//! Reporting-to-trading currency conversion.
//!
//! Statements are often reported in a different currency than the equity
//! trades in (a coal miner listed in IDR reporting in USD). Every monetary
//! statement figure passes through a [`CurrencyNormalizer`] before it is
//! compared with a price. Conversion is a plain multiplication; rounding is
//! left to presentation.

use intrinsic_core::{DataError, Result};
use serde::Serialize;

use crate::diagnostics::{Diagnostic, Diagnostics};

/// Where the exchange rate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RateSource {
    /// Source and target currencies are the same.
    Identity,
    /// A live rate from the price provider.
    Live,
    /// A configured constant used because no live rate was available.
    Fallback,
}

/// Converts values reported in one currency into another.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrencyNormalizer {
    source: String,
    target: String,
    rate: f64,
    rate_source: RateSource,
}

impl CurrencyNormalizer {
    /// A normalizer for figures already in `currency`.
    #[must_use]
    pub fn identity(currency: impl Into<String>) -> Self {
        let currency = currency.into();
        Self {
            source: currency.clone(),
            target: currency,
            rate: 1.0,
            rate_source: RateSource::Identity,
        }
    }

    /// A normalizer applying `rate` to convert `source` into `target`.
    ///
    /// Returns [`DataError::InvalidParameter`] for a non-finite or non-positive rate.
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        rate: f64,
        rate_source: RateSource,
    ) -> Result<Self> {
        let source = source.into();
        let target = target.into();
        if same_currency(&source, &target) {
            return Ok(Self::identity(target));
        }
        if !rate.is_finite() || rate <= 0.0 {
            return Err(DataError::InvalidParameter(format!(
                "exchange rate {source}/{target} must be positive, got {rate}"
            )));
        }
        Ok(Self {
            source,
            target,
            rate,
            rate_source,
        })
    }

    /// Picks the live rate when it is usable, else the caller's fallback.
    ///
    /// Using the fallback is a degraded-precision condition and is flagged.
    /// Without a usable live rate or fallback the conversion cannot proceed.
    pub fn resolve(
        source: &str,
        target: &str,
        live: Result<f64>,
        fallback: Option<f64>,
        diagnostics: &mut Diagnostics,
    ) -> Result<Self> {
        if same_currency(source, target) {
            return Ok(Self::identity(target));
        }

        let reason = match live {
            Ok(rate) if rate.is_finite() && rate > 0.0 => {
                return Self::new(source, target, rate, RateSource::Live);
            }
            Ok(rate) => format!("provider returned {rate}"),
            Err(e) => e.to_string(),
        };

        let rate = fallback.ok_or_else(|| DataError::DataNotAvailable {
            symbol: format!("{source}{target}"),
            what: format!("exchange rate ({reason}) and no fallback configured"),
        })?;
        let normalizer = Self::new(source, target, rate, RateSource::Fallback)?;
        diagnostics.flag(Diagnostic::FallbackExchangeRate {
            from: source.to_string(),
            to: target.to_string(),
            rate,
            reason,
        });
        Ok(normalizer)
    }

    /// Converts a value.
    #[must_use]
    pub fn normalize(&self, value: f64) -> f64 {
        normalize(value, &self.source, &self.target, self.rate)
    }

    /// Converts a value that may be absent.
    #[must_use]
    pub fn normalize_opt(&self, value: Option<f64>) -> Option<f64> {
        value.map(|v| self.normalize(v))
    }

    /// Returns the reporting currency.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the trading currency.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns the applied rate.
    #[must_use]
    pub const fn rate(&self) -> f64 {
        self.rate
    }

    /// Returns where the rate came from.
    #[must_use]
    pub const fn rate_source(&self) -> RateSource {
        self.rate_source
    }

    /// Returns true if a fallback constant is in use.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.rate_source == RateSource::Fallback
    }
}

/// Converts `value` from `source` to `target` at `rate`; identity when the currencies match.
#[must_use]
pub fn normalize(value: f64, source: &str, target: &str, rate: f64) -> f64 {
    if same_currency(source, target) {
        value
    } else {
        value * rate
    }
}

fn same_currency(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}
