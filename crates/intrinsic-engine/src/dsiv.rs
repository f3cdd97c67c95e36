//! Two-tier floor/target projection and calibration state.
//!
//! The projection scales book value per share by a blended price-to-book
//! "quality factor": the floor is what the book is worth at that multiple,
//! the target adds one year of return on equity on top.
//!
//! Assumptions start out auto-derived from the table. A caller may submit an
//! override triple, which then survives reruns for the same entity until the
//! entity changes. See [`DsivCalibration`].

use intrinsic_core::{DataError, Result, Symbol};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::stats;
use crate::table::{FundamentalsTable, Metric};
use crate::valuation::upside_pct;

/// ROE assumption when no ROE history exists, percent.
pub const DEFAULT_ROE_PCT: f64 = 10.0;

/// Quality factor when no PBV history exists.
pub const DEFAULT_QUALITY_FACTOR: f64 = 1.0;

const HISTORICAL_PBV_WEIGHT: f64 = 0.7;
const CURRENT_PBV_WEIGHT: f64 = 0.3;

/// The three projection inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DsivAssumptions {
    /// Book value per share in the trading currency.
    pub bvps: f64,
    /// Expected return on equity, percent.
    pub roe_pct: f64,
    /// Blended price-to-book multiple.
    pub quality_factor: f64,
}

impl DsivAssumptions {
    /// Creates a triple.
    #[must_use]
    pub const fn new(bvps: f64, roe_pct: f64, quality_factor: f64) -> Self {
        Self {
            bvps,
            roe_pct,
            quality_factor,
        }
    }

    /// Rejects non-finite values and a non-positive quality factor.
    pub fn validate(&self) -> Result<()> {
        if !(self.bvps.is_finite() && self.roe_pct.is_finite() && self.quality_factor.is_finite()) {
            return Err(DataError::InvalidParameter(
                "DSIV assumptions must be finite".to_string(),
            ));
        }
        if self.quality_factor <= 0.0 {
            return Err(DataError::InvalidParameter(format!(
                "quality factor must be positive, got {}",
                self.quality_factor
            )));
        }
        Ok(())
    }

    /// `bvps × quality_factor`.
    #[must_use]
    pub fn floor(&self) -> f64 {
        self.bvps * self.quality_factor
    }

    /// `bvps × (1 + roe) × quality_factor`.
    #[must_use]
    pub fn target(&self) -> f64 {
        self.bvps * (1.0 + self.roe_pct / 100.0) * self.quality_factor
    }
}

/// How the automatic assumptions were derived.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct DsivAudit {
    /// Trailing-twelve-month ROE, percent.
    pub ttm_roe_pct: Option<f64>,
    /// Median of historical annual ROE, percent.
    pub historical_roe_pct: Option<f64>,
    /// The blended ROE that was used, percent.
    pub blended_roe_pct: f64,
    /// Latest annual equity.
    pub raw_equity: Option<f64>,
    /// Latest reconciled shares.
    pub raw_shares: Option<f64>,
    /// Latest equity / latest shares.
    pub bvps: f64,
    /// Mean historical PBV.
    pub mean_pbv: Option<f64>,
    /// Latest PBV.
    pub latest_pbv: Option<f64>,
}

/// Derives the automatic assumptions from the table and TTM ROE.
///
/// Undefined inputs fall back to [`DEFAULT_ROE_PCT`] and
/// [`DEFAULT_QUALITY_FACTOR`], flagged.
pub fn derive_assumptions(
    table: &FundamentalsTable,
    ttm_roe_pct: Option<f64>,
    diagnostics: &mut Diagnostics,
) -> (DsivAssumptions, DsivAudit) {
    let latest = table.latest();
    let raw_equity = latest.and_then(|p| p.equity);
    let raw_shares = latest.map(|p| p.shares);

    let bvps = match raw_equity.zip(raw_shares.filter(|s| *s > 0.0)) {
        Some((equity, shares)) => equity / shares,
        None => {
            diagnostics.flag(Diagnostic::DsivDefaulted {
                assumption: "book value per share",
                value: 0.0,
            });
            0.0
        }
    };

    let historical_roe_pct = stats::median(table.series(Metric::RoePct));
    let blended_roe_pct = match stats::mean([ttm_roe_pct, historical_roe_pct]) {
        Some(roe) => roe,
        None => {
            diagnostics.flag(Diagnostic::DsivDefaulted {
                assumption: "ROE",
                value: DEFAULT_ROE_PCT,
            });
            DEFAULT_ROE_PCT
        }
    };

    let mean_pbv = table.average(Metric::Pbv);
    let latest_pbv = latest.and_then(|p| p.pbv);
    let quality_factor = match (mean_pbv, latest_pbv) {
        (Some(mean), Some(current)) => HISTORICAL_PBV_WEIGHT * mean + CURRENT_PBV_WEIGHT * current,
        (Some(mean), None) => {
            diagnostics.flag(Diagnostic::DsivDefaulted {
                assumption: "quality factor",
                value: mean,
            });
            mean
        }
        _ => {
            diagnostics.flag(Diagnostic::DsivDefaulted {
                assumption: "quality factor",
                value: DEFAULT_QUALITY_FACTOR,
            });
            DEFAULT_QUALITY_FACTOR
        }
    };

    let audit = DsivAudit {
        ttm_roe_pct,
        historical_roe_pct,
        blended_roe_pct,
        raw_equity,
        raw_shares,
        bvps,
        mean_pbv,
        latest_pbv,
    };
    (DsivAssumptions::new(bvps, blended_roe_pct, quality_factor), audit)
}

/// Where the current price sits against the two tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Signal {
    /// Below the floor.
    Accumulate,
    /// At or above the floor and below the target.
    Hold,
    /// At or above the target.
    TakeProfit,
}

impl Signal {
    /// Classifies `price`; ties resolve toward [`Signal::Hold`] at the floor.
    #[must_use]
    pub fn classify(price: f64, floor: f64, target: f64) -> Self {
        if price < floor {
            Self::Accumulate
        } else if price < target {
            Self::Hold
        } else {
            Self::TakeProfit
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Accumulate => "accumulate",
            Self::Hold => "hold",
            Self::TakeProfit => "take-profit",
        })
    }
}

/// Whether the assumptions in use are derived or user-submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum CalibrationState {
    /// Freshly derived from the table.
    #[default]
    Auto,
    /// Submitted by the caller.
    Overridden,
}

/// The floor/target projection for one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DsivProjection {
    /// The assumptions in effect.
    pub assumptions: DsivAssumptions,
    /// Whether they were derived or submitted.
    pub state: CalibrationState,
    /// BVPS × quality factor.
    pub floor: f64,
    /// BVPS × (1 + ROE) × quality factor.
    pub target: f64,
    /// Current price against the tiers.
    pub signal: Signal,
    /// Upside from the current price to the floor, percent.
    pub floor_upside_pct: Option<f64>,
    /// Upside from the current price to the target, percent.
    pub target_upside_pct: Option<f64>,
    /// Internal growth implied by the ROE assumption, percent.
    pub implied_growth_pct: f64,
    /// How the automatic assumptions were derived.
    pub audit: DsivAudit,
}

impl DsivProjection {
    /// Projects `assumptions` against `current_price`.
    #[must_use]
    pub fn project(
        assumptions: DsivAssumptions,
        state: CalibrationState,
        current_price: f64,
        audit: DsivAudit,
    ) -> Self {
        let floor = assumptions.floor();
        let target = assumptions.target();
        Self {
            assumptions,
            state,
            floor,
            target,
            signal: Signal::classify(current_price, floor, target),
            floor_upside_pct: upside_pct(floor, current_price),
            target_upside_pct: upside_pct(target, current_price),
            implied_growth_pct: assumptions.roe_pct,
            audit,
        }
    }
}

/// Per-entity calibration state machine.
///
/// `Auto` follows every fresh derivation. A submission moves to `Overridden`,
/// which keeps the submitted triple across reruns. Observing a different
/// entity always returns to `Auto`.
#[derive(Debug, Clone, Default)]
pub struct DsivCalibration {
    symbol: Option<Symbol>,
    state: CalibrationState,
    current: Option<DsivAssumptions>,
}

impl DsivCalibration {
    /// Creates an empty calibration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a fresh derivation for `symbol` and returns the assumptions to use.
    pub fn observe(
        &mut self,
        symbol: &Symbol,
        auto: DsivAssumptions,
    ) -> (DsivAssumptions, CalibrationState) {
        if self.symbol.as_ref() != Some(symbol) {
            debug!(symbol = %symbol, "Entity changed, DSIV calibration reset");
            self.symbol = Some(symbol.clone());
            self.state = CalibrationState::Auto;
        }
        match (self.state, self.current) {
            (CalibrationState::Overridden, Some(overridden)) => {
                (overridden, CalibrationState::Overridden)
            }
            _ => {
                self.state = CalibrationState::Auto;
                self.current = Some(auto);
                (auto, CalibrationState::Auto)
            }
        }
    }

    /// Submits an override triple for `symbol`.
    ///
    /// Submitting for a different entity than the current one switches to it.
    pub fn submit(&mut self, symbol: &Symbol, assumptions: DsivAssumptions) -> Result<()> {
        assumptions.validate()?;
        debug!(symbol = %symbol, ?assumptions, "DSIV override submitted");
        self.symbol = Some(symbol.clone());
        self.state = CalibrationState::Overridden;
        self.current = Some(assumptions);
        Ok(())
    }

    /// Drops any override; the next observation is used as-is.
    pub fn reset(&mut self) {
        self.state = CalibrationState::Auto;
    }

    /// Returns the entity being calibrated.
    #[must_use]
    pub const fn symbol(&self) -> Option<&Symbol> {
        self.symbol.as_ref()
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> CalibrationState {
        self.state
    }

    /// Returns the assumptions last in effect.
    #[must_use]
    pub const fn current(&self) -> Option<DsivAssumptions> {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shares::SharesSource;
    use crate::table::NormalizedPeriod;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn period(year: i32, roe: f64, pbv: f64) -> NormalizedPeriod {
        NormalizedPeriod {
            end: NaiveDate::from_ymd_opt(year, 12, 31).unwrap(),
            equity: Some(10_000.0),
            net_income: Some(roe * 100.0),
            revenue: None,
            eps: roe,
            shares: 100.0,
            shares_source: SharesSource::ReportedEps,
            price: pbv * 100.0,
            price_aligned: true,
            roe_pct: Some(roe),
            per: None,
            pbv: Some(pbv),
            der: None,
            dividends: 0.0,
            revenue_growth_pct: None,
        }
    }

    fn table() -> FundamentalsTable {
        FundamentalsTable::from_periods(vec![
            period(2023, 20.0, 2.0),
            period(2022, 12.0, 1.0),
            period(2021, 10.0, 1.5),
        ])
    }

    #[test]
    fn test_derive_assumptions() {
        let mut diags = Diagnostics::new();
        let (assumptions, audit) = derive_assumptions(&table(), Some(16.0), &mut diags);
        assert_relative_eq!(assumptions.bvps, 100.0);
        assert_relative_eq!(audit.historical_roe_pct.unwrap(), 12.0);
        assert_relative_eq!(assumptions.roe_pct, 14.0);
        assert_relative_eq!(assumptions.quality_factor, 0.7 * 1.5 + 0.3 * 2.0, epsilon = 1e-12);
        assert_eq!(audit.raw_shares, Some(100.0));
        assert!(diags.is_empty());
    }

    #[test]
    fn test_defaults_are_flagged() {
        let mut diags = Diagnostics::new();
        let (assumptions, _) = derive_assumptions(&FundamentalsTable::default(), None, &mut diags);
        assert_eq!(assumptions.roe_pct, DEFAULT_ROE_PCT);
        assert_eq!(assumptions.quality_factor, DEFAULT_QUALITY_FACTOR);
        assert_eq!(
            diags
                .entries()
                .iter()
                .filter(|d| matches!(d, Diagnostic::DsivDefaulted { .. }))
                .count(),
            3
        );
    }

    #[test]
    fn test_quality_factor_without_latest_pbv_is_flagged() {
        let mut latest = period(2023, 20.0, 2.0);
        latest.pbv = None;
        let table = FundamentalsTable::from_periods(vec![latest, period(2022, 12.0, 1.0)]);
        let mut diags = Diagnostics::new();
        let (assumptions, audit) = derive_assumptions(&table, Some(16.0), &mut diags);
        assert_relative_eq!(assumptions.quality_factor, 1.0);
        assert_eq!(audit.latest_pbv, None);
        assert_eq!(
            diags.entries(),
            &[Diagnostic::DsivDefaulted {
                assumption: "quality factor",
                value: 1.0,
            }]
        );
    }

    #[test]
    fn test_floor_and_target() {
        let assumptions = DsivAssumptions::new(1_000.0, 15.0, 1.2);
        assert_relative_eq!(assumptions.floor(), 1_200.0);
        assert_relative_eq!(assumptions.target(), 1_380.0, epsilon = 1e-9);

        let projection =
            DsivProjection::project(assumptions, CalibrationState::Auto, 1_000.0, DsivAudit::default());
        assert_eq!(projection.signal, Signal::Accumulate);
        assert_relative_eq!(projection.floor_upside_pct.unwrap(), 20.0, epsilon = 1e-9);
        assert_relative_eq!(projection.implied_growth_pct, 15.0);
    }

    #[test]
    fn test_classification_regions() {
        assert_eq!(Signal::classify(99.0, 100.0, 120.0), Signal::Accumulate);
        assert_eq!(Signal::classify(100.0, 100.0, 120.0), Signal::Hold);
        assert_eq!(Signal::classify(119.99, 100.0, 120.0), Signal::Hold);
        assert_eq!(Signal::classify(120.0, 100.0, 120.0), Signal::TakeProfit);
    }

    #[test]
    fn test_floor_not_above_target_for_non_negative_roe() {
        for roe in [0.0, 1.0, 25.0, 300.0] {
            let a = DsivAssumptions::new(500.0, roe, 0.8);
            assert!(a.floor() <= a.target());
        }
    }

    #[test]
    fn test_calibration_state_machine() {
        let bbca = Symbol::new("BBCA.JK");
        let tlkm = Symbol::new("TLKM.JK");
        let auto = DsivAssumptions::new(100.0, 14.0, 1.3);
        let refreshed = DsivAssumptions::new(101.0, 14.5, 1.3);
        let manual = DsivAssumptions::new(90.0, 10.0, 1.0);

        let mut calibration = DsivCalibration::new();
        assert_eq!(calibration.observe(&bbca, auto), (auto, CalibrationState::Auto));
        assert_eq!(calibration.observe(&bbca, refreshed), (refreshed, CalibrationState::Auto));

        calibration.submit(&bbca, manual).unwrap();
        assert_eq!(calibration.observe(&bbca, auto), (manual, CalibrationState::Overridden));
        assert_eq!(calibration.observe(&bbca, refreshed), (manual, CalibrationState::Overridden));

        assert_eq!(calibration.observe(&tlkm, auto), (auto, CalibrationState::Auto));
        assert_eq!(calibration.observe(&bbca, refreshed), (refreshed, CalibrationState::Auto));
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let mut calibration = DsivCalibration::new();
        let symbol = Symbol::new("BBCA.JK");
        assert!(calibration.submit(&symbol, DsivAssumptions::new(f64::NAN, 10.0, 1.0)).is_err());
        assert!(calibration.submit(&symbol, DsivAssumptions::new(100.0, 10.0, 0.0)).is_err());
        assert_eq!(calibration.state(), CalibrationState::Auto);
    }
}
