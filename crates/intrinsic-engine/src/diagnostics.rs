//! Flagged diagnostics and unavailable-metric reasons.
//!
//! The engine never fails a run because of bad statement data. A metric that
//! cannot be computed carries an [`Unavailable`] reason, and every substitution
//! the engine makes (a fallback price, a defaulted share count, a clamped
//! growth figure) is recorded as a [`Diagnostic`].

use chrono::NaiveDate;
use intrinsic_core::{PeriodType, StatementKind};
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::warn;

/// Why a derived value is undefined.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Unavailable {
    /// A required statement row or value could not be resolved.
    #[error("missing data: {0}")]
    MissingData(&'static str),

    /// The DCF horizon is outside the supported range.
    #[error("DCF horizon of {0} years is out of range")]
    HorizonOutOfRange(u32),

    /// Earnings per share is zero or negative.
    #[error("earnings per share is not positive")]
    NonPositiveEarnings,

    /// Book value per share is zero or negative.
    #[error("book value per share is not positive")]
    NonPositiveBookValue,

    /// The terminal growth rate is not below the discount rate.
    #[error("terminal growth must be below the discount rate")]
    TerminalGrowthNotBelowDiscount,

    /// No historical observation was available.
    #[error("no history for {0}")]
    NoHistory(&'static str),
}

/// A non-fatal data anomaly or substitution made during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Diagnostic {
    /// No candidate label for a concept was present in a statement.
    MissingRow {
        /// The semantic concept.
        concept: &'static str,
        /// Statement that was searched.
        statement: StatementKind,
        /// Annual or quarterly.
        period_type: PeriodType,
    },
    /// A resolved row had no value for a period.
    MissingValue {
        /// The semantic concept.
        concept: &'static str,
        /// Period end date.
        period: NaiveDate,
    },
    /// A balance-sheet period could not be matched to an income-statement period.
    UnmatchedBalancePeriod {
        /// Income-statement period end date.
        period: NaiveDate,
    },
    /// Liabilities were reported on a different period grid; DER defaulted to 0.
    UnmatchedLiabilitiesPeriod {
        /// Income-statement period end date.
        period: NaiveDate,
    },
    /// A derived share count was negative and its sign was inverted.
    SignInverted {
        /// Period end date.
        period: NaiveDate,
        /// The negative count before inversion.
        raw_shares: f64,
    },
    /// The reported shares outstanding were missing or unusable.
    SharesOutstandingDefaulted {
        /// What the provider reported.
        reported: Option<f64>,
        /// The count used instead.
        used: f64,
    },
    /// No close existed at or before a period end; the current price was used.
    PriceFallback {
        /// Period end date.
        period: NaiveDate,
    },
    /// The live quote was missing and another price was used.
    QuoteFallback {
        /// Which price was used.
        source: &'static str,
    },
    /// A live exchange rate could not be obtained; a fallback constant was used.
    FallbackExchangeRate {
        /// Reporting currency.
        from: String,
        /// Trading currency.
        to: String,
        /// The fallback rate applied.
        rate: f64,
        /// Why the live rate was not used.
        reason: String,
    },
    /// A percentage change beyond the sanity bound was suppressed to 0.
    AnomalousGrowth {
        /// What was being compared.
        metric: String,
        /// The suppressed change, in percent.
        change_pct: f64,
    },
    /// A quarterly observation was missing from the TTM window.
    MissingQuarter {
        /// Position in the window, 0 = most recent.
        index: usize,
    },
    /// The reconstructed TTM total was negative; per-share figures use its magnitude.
    NegativeTtm {
        /// The signed total.
        total: f64,
    },
    /// TTM ROE was unavailable; the latest annual ROE was used.
    TtmRoeFallback,
    /// A DSIV assumption could not be derived and a default was used.
    DsivDefaulted {
        /// Which assumption.
        assumption: &'static str,
        /// The default applied.
        value: f64,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRow {
                concept,
                statement,
                period_type,
            } => write!(f, "no {concept} row in {period_type:?} {statement}"),
            Self::MissingValue { concept, period } => {
                write!(f, "{concept} missing for {period}")
            }
            Self::UnmatchedBalancePeriod { period } => {
                write!(f, "no balance-sheet period matches {period}")
            }
            Self::UnmatchedLiabilitiesPeriod { period } => {
                write!(f, "liabilities not reported for {period}, DER set to 0")
            }
            Self::SignInverted { period, raw_shares } => {
                write!(f, "negative share count {raw_shares} inverted for {period}")
            }
            Self::SharesOutstandingDefaulted { reported, used } => {
                write!(f, "shares outstanding {reported:?} unusable, using {used}")
            }
            Self::PriceFallback { period } => {
                write!(f, "no close on or before {period}, using current price")
            }
            Self::QuoteFallback { source } => write!(f, "no live price, using {source}"),
            Self::FallbackExchangeRate {
                from,
                to,
                rate,
                reason,
            } => write!(f, "{from}/{to} live rate unavailable ({reason}), using {rate}"),
            Self::AnomalousGrowth { metric, change_pct } => {
                write!(f, "{metric} change of {change_pct:.1}% suppressed")
            }
            Self::MissingQuarter { index } => write!(f, "quarter {index} missing from TTM"),
            Self::NegativeTtm { total } => write!(f, "negative TTM total {total}"),
            Self::TtmRoeFallback => write!(f, "TTM ROE unavailable, using latest annual ROE"),
            Self::DsivDefaulted { assumption, value } => {
                write!(f, "DSIV {assumption} defaulted to {value}")
            }
        }
    }
}

/// Collects the diagnostics of one run, logging each as it is flagged.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Creates an empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Records a diagnostic.
    pub fn flag(&mut self, diagnostic: Diagnostic) {
        warn!(diagnostic = %diagnostic, "Data anomaly");
        self.entries.push(diagnostic);
    }

    /// Returns the recorded diagnostics in order.
    #[must_use]
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Returns true if any diagnostic matches `pred`.
    pub fn any(&self, pred: impl Fn(&Diagnostic) -> bool) -> bool {
        self.entries.iter().any(pred)
    }

    /// Returns true if nothing was flagged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consumes the collection.
    #[must_use]
    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_and_query() {
        let mut diags = Diagnostics::new();
        assert!(diags.is_empty());
        diags.flag(Diagnostic::TtmRoeFallback);
        diags.flag(Diagnostic::MissingQuarter { index: 2 });
        assert_eq!(diags.entries().len(), 2);
        assert!(diags.any(|d| matches!(d, Diagnostic::MissingQuarter { index: 2 })));
        assert!(!diags.any(|d| matches!(d, Diagnostic::NegativeTtm { .. })));
    }

    #[test]
    fn test_display() {
        let d = Diagnostic::AnomalousGrowth {
            metric: "EPS".to_string(),
            change_pct: 1520.0,
        };
        assert_eq!(d.to_string(), "EPS change of 1520.0% suppressed");
        assert_eq!(
            Unavailable::HorizonOutOfRange(40).to_string(),
            "DCF horizon of 40 years is out of range"
        );
    }
}
