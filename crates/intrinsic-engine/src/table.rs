//! The normalized per-period fundamentals table.
//!
//! One [`NormalizedPeriod`] is built per annual income-statement period, newest
//! first, by resolving rows, converting currency, reconciling shares and
//! aligning each period end to the last close at or before it. The table also
//! answers the two synthetic aggregates: AVERAGE (mean over periods) and
//! ANNUAL GROWTH (compound rate between the oldest and newest period).

use chrono::{Datelike, NaiveDate};
use intrinsic_core::{DataError, DividendSeries, PriceHistory, RawStatement, Result, StatementPeriod};
use polars::prelude::*;
use serde::Serialize;
use std::fmt;

use crate::currency::CurrencyNormalizer;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::rows::Concept;
use crate::shares::{SharesReconciler, SharesSource};
use crate::stats;

/// A column of the fundamentals table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Metric {
    /// Shareholders' equity.
    Equity,
    /// Net income.
    NetIncome,
    /// Revenue.
    Revenue,
    /// Reconciled shares outstanding.
    Shares,
    /// Reconciled earnings per share.
    Eps,
    /// Return on equity, percent.
    RoePct,
    /// Close aligned to the period end.
    Price,
    /// Price to book value.
    Pbv,
    /// Price to earnings.
    Per,
    /// Total liabilities to equity.
    Der,
    /// Dividends per share paid in the period's calendar year.
    Dividends,
}

impl Metric {
    /// All metrics in display order.
    pub const ALL: [Self; 11] = [
        Self::Equity,
        Self::NetIncome,
        Self::Revenue,
        Self::Shares,
        Self::Eps,
        Self::RoePct,
        Self::Price,
        Self::Pbv,
        Self::Per,
        Self::Der,
        Self::Dividends,
    ];

    /// Column label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Equity => "Equity",
            Self::NetIncome => "Net Income",
            Self::Revenue => "Revenue",
            Self::Shares => "Shares",
            Self::Eps => "EPS",
            Self::RoePct => "ROE %",
            Self::Price => "Price",
            Self::Pbv => "PBV",
            Self::Per => "PER",
            Self::Der => "DER",
            Self::Dividends => "Dividends",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One reporting period's reconciled figures, in the trading currency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedPeriod {
    /// Period end date.
    pub end: NaiveDate,
    /// Shareholders' equity.
    pub equity: Option<f64>,
    /// Net income.
    pub net_income: Option<f64>,
    /// Revenue.
    pub revenue: Option<f64>,
    /// Earnings per share, consistent with `shares`.
    pub eps: f64,
    /// Shares outstanding, non-negative.
    pub shares: f64,
    /// How `shares` was obtained.
    pub shares_source: SharesSource,
    /// Close at or before `end`, else the current price.
    pub price: f64,
    /// False if `price` is the current price rather than a historical close.
    pub price_aligned: bool,
    /// Net income / equity in percent; undefined when equity is not positive.
    pub roe_pct: Option<f64>,
    /// Price / EPS; undefined when EPS is not positive.
    pub per: Option<f64>,
    /// Price / BVPS; undefined when BVPS is not positive.
    pub pbv: Option<f64>,
    /// Liabilities / equity; 0 when liabilities are not on this period.
    pub der: Option<f64>,
    /// Dividends per share for the calendar year of `end`.
    pub dividends: f64,
    /// Revenue change vs the previous period in percent.
    pub revenue_growth_pct: Option<f64>,
}

impl NormalizedPeriod {
    /// Book value per share; undefined unless equity and shares are positive.
    #[must_use]
    pub fn bvps(&self) -> Option<f64> {
        stats::positive_ratio(self.equity, Some(self.shares))
    }

    /// Returns the value of `metric`.
    #[must_use]
    pub fn get(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Equity => self.equity,
            Metric::NetIncome => self.net_income,
            Metric::Revenue => self.revenue,
            Metric::Shares => Some(self.shares),
            Metric::Eps => Some(self.eps),
            Metric::RoePct => self.roe_pct,
            Metric::Price => Some(self.price),
            Metric::Pbv => self.pbv,
            Metric::Per => self.per,
            Metric::Der => self.der,
            Metric::Dividends => Some(self.dividends),
        }
    }
}

/// Everything the table is built from.
#[derive(Debug, Clone, Copy)]
pub struct TableSources<'a> {
    /// Annual income statement.
    pub income: &'a RawStatement,
    /// Annual balance sheet.
    pub balance: &'a RawStatement,
    /// Daily closes in the trading currency.
    pub prices: &'a PriceHistory,
    /// Dividend actions in the trading currency.
    pub dividends: &'a DividendSeries,
    /// Reporting-to-trading conversion for statement figures.
    pub currency: &'a CurrencyNormalizer,
    /// Share count reconciliation.
    pub shares: &'a SharesReconciler,
    /// Price used when no historical close is available.
    pub current_price: f64,
    /// Number of most recent periods kept.
    pub max_periods: usize,
}

/// Normalized periods, newest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FundamentalsTable {
    periods: Vec<NormalizedPeriod>,
}

impl FundamentalsTable {
    /// Builds the table, recording every substitution in `diagnostics`.
    pub fn build(sources: TableSources<'_>, diagnostics: &mut Diagnostics) -> Self {
        let income = sources.income.truncated(sources.max_periods);
        let balance = sources.balance;

        let net_income_label = Concept::NetIncome.label_set().resolve_flagged(&income, diagnostics);
        let revenue_label = Concept::Revenue.label_set().resolve_flagged(&income, diagnostics);
        let eps_label = Concept::Eps.label_set().resolve_flagged(&income, diagnostics);
        let equity_label = Concept::Equity.label_set().resolve_flagged(balance, diagnostics);
        let liabilities_label =
            Concept::TotalLiabilities.label_set().resolve_flagged(balance, diagnostics);

        let mut periods: Vec<NormalizedPeriod> = Vec::with_capacity(income.len());
        for period in income.periods() {
            let end = period.end;
            let value = |label: Option<&str>| label.and_then(|l| period.get(l));

            let net_income = sources.currency.normalize_opt(value(net_income_label));
            if net_income_label.is_some() && net_income.is_none() {
                diagnostics.flag(Diagnostic::MissingValue {
                    concept: "net income",
                    period: end,
                });
            }
            let revenue = sources.currency.normalize_opt(value(revenue_label));
            let reported_eps = sources.currency.normalize_opt(value(eps_label));

            let balance_period = match_balance_period(balance, end);
            if balance_period.is_none() && !balance.is_empty() {
                diagnostics.flag(Diagnostic::UnmatchedBalancePeriod { period: end });
            }
            let equity = sources.currency.normalize_opt(
                equity_label.and_then(|l| balance_period.and_then(|p| p.get(l))),
            );
            if equity_label.is_some() && balance_period.is_some() && equity.is_none() {
                diagnostics.flag(Diagnostic::MissingValue {
                    concept: "equity",
                    period: end,
                });
            }

            let reconciled = sources.shares.reconcile(net_income, reported_eps);
            if reconciled.sign_inverted {
                diagnostics.flag(Diagnostic::SignInverted {
                    period: end,
                    raw_shares: reconciled.raw_shares(),
                });
            }

            let (price, price_aligned) = match sources.prices.close_at_or_before(end) {
                Some(close) => (close, true),
                None => {
                    diagnostics.flag(Diagnostic::PriceFallback { period: end });
                    (sources.current_price, false)
                }
            };

            let der = match liabilities_label {
                None => Some(0.0),
                Some(label) => {
                    let liabilities = balance_period.and_then(|p| p.get(label));
                    match liabilities {
                        Some(l) => stats::positive_ratio(
                            Some(sources.currency.normalize(l)),
                            equity,
                        ),
                        None => {
                            diagnostics
                                .flag(Diagnostic::UnmatchedLiabilitiesPeriod { period: end });
                            Some(0.0)
                        }
                    }
                }
            };

            let bvps = stats::positive_ratio(equity, Some(reconciled.shares));
            periods.push(NormalizedPeriod {
                end,
                equity,
                net_income,
                revenue,
                eps: reconciled.eps,
                shares: reconciled.shares,
                shares_source: reconciled.source,
                price,
                price_aligned,
                roe_pct: stats::positive_ratio(net_income, equity).map(|r| r * 100.0),
                per: stats::positive_ratio(Some(price), Some(reconciled.eps)),
                pbv: stats::positive_ratio(Some(price), bvps),
                der,
                dividends: sources.dividends.total_for_year(end.year()),
                revenue_growth_pct: None,
            });
        }

        for i in 0..periods.len().saturating_sub(1) {
            let growth = stats::bounded_change_pct(
                "revenue",
                periods[i + 1].revenue,
                periods[i].revenue,
                diagnostics,
            );
            periods[i].revenue_growth_pct = growth;
        }

        Self { periods }
    }

    /// Creates a table from already normalized periods, newest first.
    #[must_use]
    pub fn from_periods(mut periods: Vec<NormalizedPeriod>) -> Self {
        periods.sort_by(|a, b| b.end.cmp(&a.end));
        Self { periods }
    }

    /// Returns the periods, newest first.
    #[must_use]
    pub fn periods(&self) -> &[NormalizedPeriod] {
        &self.periods
    }

    /// Returns the most recent period.
    #[must_use]
    pub fn latest(&self) -> Option<&NormalizedPeriod> {
        self.periods.first()
    }

    /// Returns the oldest period.
    #[must_use]
    pub fn oldest(&self) -> Option<&NormalizedPeriod> {
        self.periods.last()
    }

    /// Returns the number of periods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.periods.len()
    }

    /// Returns true if no period could be built.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// The metric across periods, newest first.
    #[must_use]
    pub fn series(&self, metric: Metric) -> Vec<Option<f64>> {
        self.periods.iter().map(|p| p.get(metric)).collect()
    }

    /// The AVERAGE aggregate: mean of the defined values.
    #[must_use]
    pub fn average(&self, metric: Metric) -> Option<f64> {
        stats::mean(self.series(metric))
    }

    /// The ANNUAL GROWTH aggregate in percent.
    ///
    /// Compound rate over `len - 1` steps; 0 unless both endpoints are
    /// strictly positive.
    #[must_use]
    pub fn annual_growth_pct(&self, metric: Metric) -> f64 {
        stats::cagr_pct(
            self.oldest().and_then(|p| p.get(metric)),
            self.latest().and_then(|p| p.get(metric)),
            self.len().saturating_sub(1),
        )
    }

    /// Mean of the per-period revenue growth figures.
    #[must_use]
    pub fn average_revenue_growth_pct(&self) -> Option<f64> {
        stats::mean(self.periods.iter().map(|p| p.revenue_growth_pct))
    }

    /// Renders periods × metrics plus the AVERAGE and ANNUAL GROWTH rows.
    ///
    /// Undefined values are nulls.
    pub fn to_frame(&self) -> Result<DataFrame> {
        let mut labels: Vec<String> = self.periods.iter().map(|p| p.end.to_string()).collect();
        labels.push("AVERAGE".to_string());
        labels.push("ANNUAL GROWTH".to_string());

        let mut columns = Vec::with_capacity(Metric::ALL.len() + 2);
        columns.push(Column::new("Period".into(), labels));
        for metric in Metric::ALL {
            let mut values = self.series(metric);
            values.push(self.average(metric));
            values.push(Some(self.annual_growth_pct(metric)));
            columns.push(Column::new(metric.label().into(), values));
        }

        let mut growth: Vec<Option<f64>> =
            self.periods.iter().map(|p| p.revenue_growth_pct).collect();
        growth.push(self.average_revenue_growth_pct());
        growth.push(None);
        columns.push(Column::new("Revenue Growth %".into(), growth));

        DataFrame::new(columns).map_err(|e| DataError::Other(e.to_string()))
    }
}

/// The balance-sheet period for an income period: exact date, else the same fiscal year.
fn match_balance_period(balance: &RawStatement, end: NaiveDate) -> Option<&StatementPeriod> {
    let periods = balance.periods();
    periods
        .iter()
        .find(|p| p.end == end)
        .or_else(|| periods.iter().find(|p| p.end.year() == end.year()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use intrinsic_core::{PeriodType, StatementKind};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn income() -> RawStatement {
        let mut stmt = RawStatement::new(StatementKind::Income, PeriodType::Annual);
        for (year, ni, rev, eps) in [
            (2021, 800.0, 4_000.0, 8.0),
            (2022, 900.0, 4_400.0, 9.0),
            (2023, 1_000.0, 5_000.0, 10.0),
        ] {
            stmt.insert_period(
                date(year, 12, 31),
                [
                    ("Net Income", Some(ni)),
                    ("Total Revenue", Some(rev)),
                    ("Diluted EPS", Some(eps)),
                ],
            );
        }
        stmt
    }

    fn balance() -> RawStatement {
        let mut stmt = RawStatement::new(StatementKind::BalanceSheet, PeriodType::Annual);
        for (year, equity, liabilities) in [
            (2021, 8_000.0, Some(4_000.0)),
            (2022, 9_000.0, None),
            (2023, 10_000.0, Some(5_000.0)),
        ] {
            stmt.insert_period(
                date(year, 12, 31),
                [
                    ("Stockholders Equity", Some(equity)),
                    ("Total Liabilities Net Minority Interest", liabilities),
                ],
            );
        }
        stmt
    }

    fn build(prices: &PriceHistory, diags: &mut Diagnostics) -> FundamentalsTable {
        let income = income();
        let balance = balance();
        let dividends = DividendSeries::new([(date(2023, 5, 10), 3.0), (date(2023, 11, 10), 2.0)]);
        let currency = CurrencyNormalizer::identity("IDR");
        let shares = SharesReconciler::from_outstanding(Some(100.0), diags);
        FundamentalsTable::build(
            TableSources {
                income: &income,
                balance: &balance,
                prices,
                dividends: &dividends,
                currency: &currency,
                shares: &shares,
                current_price: 999.0,
                max_periods: 4,
            },
            diags,
        )
    }

    fn prices() -> PriceHistory {
        PriceHistory::new([
            (date(2021, 12, 30), 80.0),
            (date(2022, 12, 30), 135.0),
            (date(2023, 12, 29), 150.0),
        ])
    }

    #[test]
    fn test_build_ratios() {
        let mut diags = Diagnostics::new();
        let table = build(&prices(), &mut diags);
        assert_eq!(table.len(), 3);

        let latest = table.latest().unwrap();
        assert_eq!(latest.end, date(2023, 12, 31));
        assert_relative_eq!(latest.shares, 100.0);
        assert_relative_eq!(latest.price, 150.0);
        assert_relative_eq!(latest.roe_pct.unwrap(), 10.0);
        assert_relative_eq!(latest.per.unwrap(), 15.0);
        assert_relative_eq!(latest.pbv.unwrap(), 1.5);
        assert_relative_eq!(latest.der.unwrap(), 0.5);
        assert_relative_eq!(latest.bvps().unwrap(), 100.0);
        assert_relative_eq!(latest.dividends, 5.0);
        assert_relative_eq!(latest.revenue_growth_pct.unwrap(), 600.0 / 44.0, epsilon = 1e-9);
        assert_eq!(table.oldest().unwrap().revenue_growth_pct, None);
    }

    #[test]
    fn test_unmatched_liabilities_default_to_zero() {
        let mut diags = Diagnostics::new();
        let table = build(&prices(), &mut diags);
        assert_eq!(table.periods()[1].der, Some(0.0));
        assert!(diags.any(|d| matches!(d, Diagnostic::UnmatchedLiabilitiesPeriod { .. })));
    }

    #[test]
    fn test_price_falls_back_to_current() {
        let mut diags = Diagnostics::new();
        let table = build(&PriceHistory::default(), &mut diags);
        let latest = table.latest().unwrap();
        assert_relative_eq!(latest.price, 999.0);
        assert!(!latest.price_aligned);
        assert!(diags.any(|d| matches!(d, Diagnostic::PriceFallback { .. })));
    }

    #[test]
    fn test_aggregates() {
        let mut diags = Diagnostics::new();
        let table = build(&prices(), &mut diags);
        assert_relative_eq!(table.average(Metric::RoePct).unwrap(), 10.0);
        assert_relative_eq!(table.average(Metric::Price).unwrap(), (80.0 + 135.0 + 150.0) / 3.0);
        assert_relative_eq!(
            table.annual_growth_pct(Metric::NetIncome),
            ((1_000.0f64 / 800.0).sqrt() - 1.0) * 100.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_non_positive_equity_leaves_ratios_undefined() {
        let income = income();
        let balance = RawStatement::new(StatementKind::BalanceSheet, PeriodType::Annual)
            .with_period(date(2023, 12, 31), [("Stockholders Equity", Some(-50.0))]);
        let mut diags = Diagnostics::new();
        let shares = SharesReconciler::from_outstanding(Some(100.0), &mut diags);
        let table = FundamentalsTable::build(
            TableSources {
                income: &income,
                balance: &balance,
                prices: &prices(),
                dividends: &DividendSeries::default(),
                currency: &CurrencyNormalizer::identity("IDR"),
                shares: &shares,
                current_price: 150.0,
                max_periods: 1,
            },
            &mut diags,
        );
        let latest = table.latest().unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(latest.roe_pct, None);
        assert_eq!(latest.pbv, None);
        assert!(latest.per.is_some());
    }

    #[test]
    fn test_currency_is_applied_before_reconciliation() {
        let income = income();
        let balance = balance();
        let mut diags = Diagnostics::new();
        let shares = SharesReconciler::from_outstanding(Some(100.0), &mut diags);
        let currency =
            CurrencyNormalizer::new("USD", "IDR", 10.0, crate::currency::RateSource::Live).unwrap();
        let table = FundamentalsTable::build(
            TableSources {
                income: &income,
                balance: &balance,
                prices: &prices(),
                dividends: &DividendSeries::default(),
                currency: &currency,
                shares: &shares,
                current_price: 150.0,
                max_periods: 4,
            },
            &mut diags,
        );
        let latest = table.latest().unwrap();
        assert_relative_eq!(latest.shares, 100.0);
        assert_relative_eq!(latest.eps, 100.0);
        assert_relative_eq!(latest.per.unwrap(), 1.5);
    }

    #[test]
    fn test_to_frame_shape() {
        let mut diags = Diagnostics::new();
        let table = build(&prices(), &mut diags);
        let df = table.to_frame().unwrap();
        assert_eq!(df.height(), 5);
        assert_eq!(df.width(), Metric::ALL.len() + 2);
        let roe = df.column("ROE %").unwrap().f64().unwrap();
        assert_relative_eq!(roe.get(3).unwrap(), 10.0);
    }
}
