//! Latest annual vs trailing-twelve-month comparison.

use intrinsic_core::RawStatement;
use serde::Serialize;

use crate::currency::CurrencyNormalizer;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::rows::Concept;
use crate::stats;
use crate::table::FundamentalsTable;
use crate::ttm::TtmWindow;

/// A row of the comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ComparisonMetric {
    /// Price.
    Price,
    /// Earnings per share.
    Eps,
    /// Price to earnings.
    Per,
    /// Price to book value.
    Pbv,
}

impl ComparisonMetric {
    /// Row label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Price => "Price",
            Self::Eps => "EPS",
            Self::Per => "PER",
            Self::Pbv => "PBV",
        }
    }
}

/// One metric's annual and TTM values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComparisonRow {
    /// Which metric.
    pub metric: ComparisonMetric,
    /// Latest annual period value.
    pub annual: Option<f64>,
    /// Trailing-twelve-month value.
    pub ttm: Option<f64>,
    /// Percent change from annual to TTM.
    pub change_pct: Option<f64>,
}

/// Inputs for [`TtmComparison::build`].
#[derive(Debug, Clone, Copy)]
pub struct ComparisonSources<'a> {
    /// The annual table.
    pub table: &'a FundamentalsTable,
    /// Quarterly income statement.
    pub quarterly_income: &'a RawStatement,
    /// Quarterly balance sheet.
    pub quarterly_balance: &'a RawStatement,
    /// Reporting-to-trading conversion.
    pub currency: &'a CurrencyNormalizer,
    /// The entity's current share count.
    pub shares_outstanding: f64,
    /// Current price.
    pub current_price: f64,
}

/// TTM figures and the comparison rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TtmComparison {
    /// The reconstructed net income window, if any quarter was usable.
    pub window: Option<TtmWindow>,
    /// TTM EPS from the non-negative TTM net income.
    pub eps_ttm: Option<f64>,
    /// Book value per share from the latest quarterly equity.
    pub bvps_ttm: Option<f64>,
    /// Signed TTM net income / latest quarterly equity, percent.
    pub roe_ttm_pct: Option<f64>,
    /// Latest quarterly liabilities / latest quarterly equity, else the annual DER.
    pub der_ttm: Option<f64>,
    /// Price, EPS, PER and PBV rows.
    pub rows: Vec<ComparisonRow>,
}

impl TtmComparison {
    /// Builds the comparison.
    pub fn build(sources: ComparisonSources<'_>, diagnostics: &mut Diagnostics) -> Self {
        let currency = sources.currency;
        let shares = Some(sources.shares_outstanding);
        let latest = sources.table.latest();

        let window = Concept::NetIncome
            .label_set()
            .resolve_flagged(sources.quarterly_income, diagnostics)
            .and_then(|label| {
                TtmWindow::from_row(&sources.quarterly_income.row(label), diagnostics)
            });

        let latest_quarterly = |concept: Concept| {
            concept
                .resolve(sources.quarterly_balance)
                .and_then(|label| {
                    sources
                        .quarterly_balance
                        .row(label)
                        .into_iter()
                        .flatten()
                        .next()
                })
                .map(|v| currency.normalize(v))
        };
        let quarterly_equity = latest_quarterly(Concept::Equity);
        let quarterly_liabilities = latest_quarterly(Concept::TotalLiabilities);

        let ttm_net_income = window.as_ref().map(|w| currency.normalize(w.total()));
        let eps_ttm = window.as_ref().and_then(|w| {
            let magnitude = currency.normalize(w.magnitude_flagged(diagnostics));
            stats::positive_ratio(Some(magnitude), shares)
        });

        let book = quarterly_equity.or_else(|| latest.and_then(|p| p.equity));
        let bvps_ttm = stats::positive_ratio(book.map(f64::abs), shares);

        let roe_ttm_pct = match stats::positive_ratio(ttm_net_income, quarterly_equity) {
            Some(roe) => Some(roe * 100.0),
            None => {
                let annual = latest.and_then(|p| p.roe_pct);
                if annual.is_some() {
                    diagnostics.flag(Diagnostic::TtmRoeFallback);
                }
                annual
            }
        };

        // unreported quarterly liabilities count as none
        let der_ttm = match quarterly_equity.filter(|e| *e > 0.0) {
            Some(equity) => Some(quarterly_liabilities.unwrap_or(0.0) / equity),
            None => latest.and_then(|p| p.der),
        };

        let price = sources.current_price;
        let signed_positive = ttm_net_income.is_some_and(|ni| ni > 0.0);
        let per_ttm = if signed_positive {
            stats::positive_ratio(Some(price), eps_ttm)
        } else {
            None
        };
        let pbv_ttm = stats::positive_ratio(Some(price), bvps_ttm);

        let values = [
            (ComparisonMetric::Price, latest.map(|p| p.price), Some(price)),
            (ComparisonMetric::Eps, latest.map(|p| p.eps), eps_ttm),
            (ComparisonMetric::Per, latest.and_then(|p| p.per), per_ttm),
            (ComparisonMetric::Pbv, latest.and_then(|p| p.pbv), pbv_ttm),
        ];
        let rows = values
            .into_iter()
            .map(|(metric, annual, ttm)| ComparisonRow {
                metric,
                annual,
                ttm,
                change_pct: stats::bounded_change_pct(metric.label(), annual, ttm, diagnostics),
            })
            .collect();

        Self {
            window,
            eps_ttm,
            bvps_ttm,
            roe_ttm_pct,
            der_ttm,
            rows,
        }
    }

    /// Returns the row for `metric`.
    #[must_use]
    pub fn row(&self, metric: ComparisonMetric) -> Option<&ComparisonRow> {
        self.rows.iter().find(|r| r.metric == metric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shares::SharesSource;
    use crate::table::NormalizedPeriod;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use intrinsic_core::{PeriodType, StatementKind};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn table() -> FundamentalsTable {
        FundamentalsTable::from_periods(vec![NormalizedPeriod {
            end: date(2023, 12, 31),
            equity: Some(10_000.0),
            net_income: Some(1_000.0),
            revenue: Some(5_000.0),
            eps: 10.0,
            shares: 100.0,
            shares_source: SharesSource::ReportedEps,
            price: 150.0,
            price_aligned: true,
            roe_pct: Some(10.0),
            per: Some(15.0),
            pbv: Some(1.5),
            der: Some(0.5),
            dividends: 0.0,
            revenue_growth_pct: None,
        }])
    }

    fn quarterly(values: [f64; 4]) -> (RawStatement, RawStatement) {
        let ends = [
            date(2024, 9, 30),
            date(2024, 6, 30),
            date(2024, 3, 31),
            date(2023, 12, 31),
        ];
        let mut income = RawStatement::new(StatementKind::Income, PeriodType::Quarterly);
        for (end, v) in ends.iter().zip(values) {
            income.insert_period(*end, [("Net Income", Some(v))]);
        }
        let balance = RawStatement::new(StatementKind::BalanceSheet, PeriodType::Quarterly)
            .with_period(ends[0], [("Stockholders Equity", Some(12_000.0))]);
        (income, balance)
    }

    fn build(values: [f64; 4], price: f64, diags: &mut Diagnostics) -> TtmComparison {
        let table = table();
        let (income, balance) = quarterly(values);
        TtmComparison::build(
            ComparisonSources {
                table: &table,
                quarterly_income: &income,
                quarterly_balance: &balance,
                currency: &CurrencyNormalizer::identity("IDR"),
                shares_outstanding: 100.0,
                current_price: price,
            },
            diags,
        )
    }

    #[test]
    fn test_ttm_figures() {
        let mut diags = Diagnostics::new();
        let cmp = build([300.0, 300.0, 300.0, 300.0], 180.0, &mut diags);
        assert_relative_eq!(cmp.eps_ttm.unwrap(), 12.0);
        assert_relative_eq!(cmp.bvps_ttm.unwrap(), 120.0);
        assert_relative_eq!(cmp.roe_ttm_pct.unwrap(), 10.0);

        let per = cmp.row(ComparisonMetric::Per).unwrap();
        assert_relative_eq!(per.ttm.unwrap(), 15.0);
        assert_relative_eq!(per.change_pct.unwrap(), 0.0);

        let price = cmp.row(ComparisonMetric::Price).unwrap();
        assert_relative_eq!(price.change_pct.unwrap(), 20.0);
    }

    #[test]
    fn test_der_ttm() {
        let mut diags = Diagnostics::new();
        let cmp = build([300.0, 300.0, 300.0, 300.0], 180.0, &mut diags);
        // no quarterly liabilities row
        assert_relative_eq!(cmp.der_ttm.unwrap(), 0.0);

        let table = table();
        let (income, _) = quarterly([300.0, 300.0, 300.0, 300.0]);
        let balance = RawStatement::new(StatementKind::BalanceSheet, PeriodType::Quarterly)
            .with_period(
                date(2024, 9, 30),
                [
                    ("Stockholders Equity", Some(12_000.0)),
                    ("Total Liabilities Net Minority Interest", Some(3_000.0)),
                ],
            );
        let sources = ComparisonSources {
            table: &table,
            quarterly_income: &income,
            quarterly_balance: &balance,
            currency: &CurrencyNormalizer::identity("IDR"),
            shares_outstanding: 100.0,
            current_price: 180.0,
        };
        let cmp = TtmComparison::build(sources, &mut diags);
        assert_relative_eq!(cmp.der_ttm.unwrap(), 0.25);

        // no quarterly equity falls back to the annual DER
        let empty = RawStatement::new(StatementKind::BalanceSheet, PeriodType::Quarterly);
        let cmp = TtmComparison::build(
            ComparisonSources {
                quarterly_balance: &empty,
                ..sources
            },
            &mut diags,
        );
        assert_relative_eq!(cmp.der_ttm.unwrap(), 0.5);
    }

    #[test]
    fn test_negative_ttm_gates_per() {
        let mut diags = Diagnostics::new();
        let cmp = build([-300.0, -300.0, -300.0, -300.0], 180.0, &mut diags);
        assert_relative_eq!(cmp.eps_ttm.unwrap(), 12.0);
        assert_eq!(cmp.row(ComparisonMetric::Per).unwrap().ttm, None);
        assert!(diags.any(|d| matches!(d, Diagnostic::NegativeTtm { .. })));
        assert_relative_eq!(cmp.roe_ttm_pct.unwrap(), -10.0);
    }

    #[test]
    fn test_roe_falls_back_to_annual_without_quarterly_equity() {
        let table = table();
        let (income, _) = quarterly([300.0, 300.0, 300.0, 300.0]);
        let balance = RawStatement::new(StatementKind::BalanceSheet, PeriodType::Quarterly);
        let mut diags = Diagnostics::new();
        let cmp = TtmComparison::build(
            ComparisonSources {
                table: &table,
                quarterly_income: &income,
                quarterly_balance: &balance,
                currency: &CurrencyNormalizer::identity("IDR"),
                shares_outstanding: 100.0,
                current_price: 150.0,
            },
            &mut diags,
        );
        assert_relative_eq!(cmp.roe_ttm_pct.unwrap(), 10.0);
        assert_relative_eq!(cmp.bvps_ttm.unwrap(), 100.0);
        assert!(diags.any(|d| matches!(d, Diagnostic::TtmRoeFallback)));
    }

    #[test]
    fn test_anomalous_change_is_suppressed() {
        let mut diags = Diagnostics::new();
        let cmp = build([300.0, 300.0, 300.0, 300.0], 1_800_000.0, &mut diags);
        assert_eq!(cmp.row(ComparisonMetric::Price).unwrap().change_pct, Some(0.0));
        assert!(diags.any(|d| matches!(d, Diagnostic::AnomalousGrowth { .. })));
    }
}
