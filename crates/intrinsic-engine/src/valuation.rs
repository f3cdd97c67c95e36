//! Ratio-based and discounted-cash-flow valuation.
//!
//! Every estimate is gated independently. An estimate whose preconditions fail
//! has no value and no upside, and carries the [`Unavailable`] reason instead.

use intrinsic_core::{DataError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::diagnostics::Unavailable;
use crate::stats;
use crate::table::{FundamentalsTable, Metric};

/// Graham's constant: a P/E of 15 times a P/B of 1.5.
const GRAHAM_MULTIPLIER: f64 = 22.5;

/// Bounds on the auto-derived DCF growth rate, percent.
const AUTO_GROWTH_BOUNDS: (f64, f64) = (0.0, 20.0);

/// Longest explicit DCF projection, years.
pub const MAX_HORIZON_YEARS: u32 = 30;

/// A valuation method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ValuationMethod {
    /// √(22.5 × EPS × BVPS).
    Graham,
    /// Latest EPS × mean historical PER.
    PerReversion,
    /// Latest BVPS × mean historical PBV.
    PbvReversion,
    /// Discounted cash flow on EPS.
    Dcf,
}

impl fmt::Display for ValuationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Graham => "Graham Number",
            Self::PerReversion => "PER Mean Reversion",
            Self::PbvReversion => "PBV Mean Reversion",
            Self::Dcf => "Discounted Cash Flow",
        };
        f.write_str(name)
    }
}

/// An intrinsic value estimate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuationEstimate {
    /// The method.
    pub method: ValuationMethod,
    /// Intrinsic value per share; `None` when preconditions fail.
    pub value: Option<f64>,
    /// `(value / price - 1) × 100`; `None` whenever `value` is.
    pub upside_pct: Option<f64>,
    /// Why `value` is undefined.
    pub unavailable: Option<Unavailable>,
}

impl ValuationEstimate {
    fn from_outcome(
        method: ValuationMethod,
        outcome: std::result::Result<f64, Unavailable>,
        price: f64,
    ) -> Self {
        match outcome {
            Ok(value) => Self {
                method,
                value: Some(value),
                upside_pct: upside_pct(value, price),
                unavailable: None,
            },
            Err(reason) => Self {
                method,
                value: None,
                upside_pct: None,
                unavailable: Some(reason),
            },
        }
    }

    /// Returns true if the estimate has a value.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.value.is_some()
    }
}

/// User-tunable DCF assumptions, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValuationAssumptions {
    /// Discount rate, [8, 20].
    pub discount_rate_pct: f64,
    /// Growth for years 1 to the horizon, [0, 25]; `None` derives it from revenue history.
    pub growth_rate_pct: Option<f64>,
    /// Terminal growth, [1, 5].
    pub terminal_growth_pct: f64,
    /// Explicit projection years, [1, 30].
    pub horizon_years: u32,
}

impl Default for ValuationAssumptions {
    fn default() -> Self {
        Self {
            discount_rate_pct: 12.0,
            growth_rate_pct: None,
            terminal_growth_pct: 3.0,
            horizon_years: 5,
        }
    }
}

impl ValuationAssumptions {
    /// Sets the discount rate.
    #[must_use]
    pub const fn with_discount_rate_pct(mut self, pct: f64) -> Self {
        self.discount_rate_pct = pct;
        self
    }

    /// Overrides the growth rate.
    #[must_use]
    pub const fn with_growth_rate_pct(mut self, pct: f64) -> Self {
        self.growth_rate_pct = Some(pct);
        self
    }

    /// Sets the terminal growth rate.
    #[must_use]
    pub const fn with_terminal_growth_pct(mut self, pct: f64) -> Self {
        self.terminal_growth_pct = pct;
        self
    }

    /// Sets the number of explicit projection years.
    #[must_use]
    pub const fn with_horizon_years(mut self, years: u32) -> Self {
        self.horizon_years = years;
        self
    }

    /// Checks every assumption against its bounds.
    pub fn validate(&self) -> Result<()> {
        check_bounds("discount rate", self.discount_rate_pct, 8.0, 20.0)?;
        if let Some(growth) = self.growth_rate_pct {
            check_bounds("growth rate", growth, 0.0, 25.0)?;
        }
        check_bounds("terminal growth", self.terminal_growth_pct, 1.0, 5.0)?;
        if !(1..=MAX_HORIZON_YEARS).contains(&self.horizon_years) {
            return Err(DataError::InvalidParameter(format!(
                "horizon of {} years outside [1, {MAX_HORIZON_YEARS}]",
                self.horizon_years
            )));
        }
        Ok(())
    }
}

fn check_bounds(name: &str, value: f64, min: f64, max: f64) -> Result<()> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(DataError::InvalidParameter(format!(
            "{name} {value}% outside [{min}, {max}]"
        )))
    }
}

/// One projected year of a DCF.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DcfYear {
    /// Year index, starting at 1.
    pub year: u32,
    /// Projected EPS.
    pub eps: f64,
    /// EPS discounted to today.
    pub present_value: f64,
}

/// A completed discounted-cash-flow valuation. Rates are fractions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DcfValuation {
    /// Latest normalized EPS.
    pub base_eps: f64,
    /// Discount rate.
    pub discount_rate: f64,
    /// Growth rate for the explicit years.
    pub growth_rate: f64,
    /// True if the growth rate was derived from revenue history.
    pub growth_is_auto: bool,
    /// Terminal growth rate.
    pub terminal_growth: f64,
    /// Projected years.
    pub years: Vec<DcfYear>,
    /// Terminal value at the end of the horizon.
    pub terminal_value: f64,
    /// Terminal value discounted to today.
    pub terminal_pv: f64,
    /// Sum of the discounted years and the discounted terminal value.
    pub intrinsic_value: f64,
}

impl DcfValuation {
    /// Sum of the discounted explicit years.
    #[must_use]
    pub fn explicit_pv(&self) -> f64 {
        self.years.iter().map(|y| y.present_value).sum()
    }
}

/// `√(22.5 × EPS × BVPS)`, defined only when both are positive.
pub fn graham_number(eps: f64, bvps: f64) -> std::result::Result<f64, Unavailable> {
    if eps <= 0.0 {
        return Err(Unavailable::NonPositiveEarnings);
    }
    if bvps <= 0.0 {
        return Err(Unavailable::NonPositiveBookValue);
    }
    Ok((GRAHAM_MULTIPLIER * eps * bvps).sqrt())
}

/// Upside of `value` over `price` in percent; undefined for a non-positive price.
#[must_use]
pub fn upside_pct(value: f64, price: f64) -> Option<f64> {
    stats::positive_ratio(Some(value), Some(price)).map(|r| (r - 1.0) * 100.0)
}

/// Discounts `horizon` years of compounding EPS plus a Gordon terminal value.
///
/// Rates are fractions (0.12 for 12%). `horizon` must lie in
/// `1..=MAX_HORIZON_YEARS`.
pub fn discounted_cash_flow(
    base_eps: f64,
    discount_rate: f64,
    growth_rate: f64,
    terminal_growth: f64,
    horizon: u32,
) -> std::result::Result<DcfValuation, Unavailable> {
    if base_eps.is_nan() || base_eps <= 0.0 {
        return Err(Unavailable::NonPositiveEarnings);
    }
    if terminal_growth >= discount_rate {
        return Err(Unavailable::TerminalGrowthNotBelowDiscount);
    }
    if !(1..=MAX_HORIZON_YEARS).contains(&horizon) {
        return Err(Unavailable::HorizonOutOfRange(horizon));
    }

    let years: Vec<DcfYear> = (1..=horizon)
        .map(|year| {
            let n = year as i32;
            let eps = base_eps * (1.0 + growth_rate).powi(n);
            DcfYear {
                year,
                eps,
                present_value: eps / (1.0 + discount_rate).powi(n),
            }
        })
        .collect();

    let final_eps = years.last().map_or(base_eps, |y| y.eps);
    let terminal_value = final_eps * (1.0 + terminal_growth) / (discount_rate - terminal_growth);
    let terminal_pv = terminal_value / (1.0 + discount_rate).powi(horizon as i32);
    let intrinsic_value = years.iter().map(|y| y.present_value).sum::<f64>() + terminal_pv;

    Ok(DcfValuation {
        base_eps,
        discount_rate,
        growth_rate,
        growth_is_auto: false,
        terminal_growth,
        years,
        terminal_value,
        terminal_pv,
        intrinsic_value,
    })
}

/// Mean year-over-year revenue growth in percent, clamped to [0, 20].
///
/// `revenues` is newest first. Pairs with a missing value or a non-positive
/// base are skipped; with no usable pair `fallback_pct` is returned unclamped.
#[must_use]
pub fn default_growth_pct(revenues: &[Option<f64>], fallback_pct: f64) -> f64 {
    let changes = revenues.windows(2).map(|pair| match (pair[1], pair[0]) {
        (Some(older), Some(newer)) if older > 0.0 => Some((newer - older) / older * 100.0),
        _ => None,
    });
    stats::mean(changes).map_or(fallback_pct, |g| {
        g.clamp(AUTO_GROWTH_BOUNDS.0, AUTO_GROWTH_BOUNDS.1)
    })
}

/// Computes estimates from a [`FundamentalsTable`] against the current price.
#[derive(Debug, Clone, Copy)]
pub struct ValuationEngine<'a> {
    table: &'a FundamentalsTable,
    current_price: f64,
    fallback_growth_pct: f64,
    revenue_history: Option<&'a [Option<f64>]>,
}

impl<'a> ValuationEngine<'a> {
    /// Creates an engine. The fallback DCF growth is 7%.
    #[must_use]
    pub const fn new(table: &'a FundamentalsTable, current_price: f64) -> Self {
        Self {
            table,
            current_price,
            fallback_growth_pct: 7.0,
            revenue_history: None,
        }
    }

    /// Sets the DCF growth used when revenue history gives none.
    #[must_use]
    pub const fn with_fallback_growth_pct(mut self, pct: f64) -> Self {
        self.fallback_growth_pct = pct;
        self
    }

    /// Derives the DCF growth from `revenues` (newest first) instead of the
    /// table's windowed revenue row.
    #[must_use]
    pub const fn with_revenue_history(mut self, revenues: &'a [Option<f64>]) -> Self {
        self.revenue_history = Some(revenues);
        self
    }

    fn latest_eps(&self) -> std::result::Result<f64, Unavailable> {
        self.table
            .latest()
            .map(|p| p.eps)
            .ok_or(Unavailable::MissingData("annual statements"))
    }

    fn latest_bvps(&self) -> std::result::Result<f64, Unavailable> {
        let latest = self
            .table
            .latest()
            .ok_or(Unavailable::MissingData("annual statements"))?;
        latest.bvps().ok_or(Unavailable::NonPositiveBookValue)
    }

    /// Graham number on the latest period.
    #[must_use]
    pub fn graham(&self) -> ValuationEstimate {
        let outcome = self
            .latest_eps()
            .and_then(|eps| self.latest_bvps().and_then(|bvps| graham_number(eps, bvps)));
        ValuationEstimate::from_outcome(ValuationMethod::Graham, outcome, self.current_price)
    }

    /// Latest EPS × mean historical PER.
    #[must_use]
    pub fn per_reversion(&self) -> ValuationEstimate {
        let outcome = self.latest_eps().and_then(|eps| {
            if eps <= 0.0 {
                return Err(Unavailable::NonPositiveEarnings);
            }
            let mean_per = self
                .table
                .average(Metric::Per)
                .ok_or(Unavailable::NoHistory("PER"))?;
            Ok(eps * mean_per)
        });
        ValuationEstimate::from_outcome(ValuationMethod::PerReversion, outcome, self.current_price)
    }

    /// Latest BVPS × mean historical PBV.
    #[must_use]
    pub fn pbv_reversion(&self) -> ValuationEstimate {
        let outcome = self.latest_bvps().and_then(|bvps| {
            let mean_pbv = self
                .table
                .average(Metric::Pbv)
                .ok_or(Unavailable::NoHistory("PBV"))?;
            Ok(bvps * mean_pbv)
        });
        ValuationEstimate::from_outcome(ValuationMethod::PbvReversion, outcome, self.current_price)
    }

    /// The growth rate a DCF would use, and whether it was derived.
    #[must_use]
    pub fn growth_rate_pct(&self, assumptions: &ValuationAssumptions) -> (f64, bool) {
        match assumptions.growth_rate_pct {
            Some(pct) => (pct, false),
            None => {
                let pct = match self.revenue_history {
                    Some(revenues) => default_growth_pct(revenues, self.fallback_growth_pct),
                    None => default_growth_pct(
                        &self.table.series(Metric::Revenue),
                        self.fallback_growth_pct,
                    ),
                };
                (pct, true)
            }
        }
    }

    /// Full DCF on the latest EPS.
    pub fn dcf(
        &self,
        assumptions: &ValuationAssumptions,
    ) -> std::result::Result<DcfValuation, Unavailable> {
        let eps = self.latest_eps()?;
        let (growth_pct, growth_is_auto) = self.growth_rate_pct(assumptions);
        let mut dcf = discounted_cash_flow(
            eps,
            assumptions.discount_rate_pct / 100.0,
            growth_pct / 100.0,
            assumptions.terminal_growth_pct / 100.0,
            assumptions.horizon_years,
        )?;
        dcf.growth_is_auto = growth_is_auto;
        Ok(dcf)
    }

    /// The DCF as an estimate.
    #[must_use]
    pub fn dcf_estimate(&self, assumptions: &ValuationAssumptions) -> ValuationEstimate {
        let outcome = self.dcf(assumptions).map(|d| d.intrinsic_value);
        ValuationEstimate::from_outcome(ValuationMethod::Dcf, outcome, self.current_price)
    }

    /// The three ratio-based estimates followed by the DCF.
    #[must_use]
    pub fn estimates(&self, assumptions: &ValuationAssumptions) -> Vec<ValuationEstimate> {
        vec![
            self.graham(),
            self.per_reversion(),
            self.pbv_reversion(),
            self.dcf_estimate(assumptions),
        ]
    }
}
