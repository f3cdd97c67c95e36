//! One full normalization and valuation pass.
//!
//! [`run`] is a pure function of its inputs: running it twice on the same
//! [`AnalysisInputs`] yields equal [`Report`]s.

use intrinsic_core::{
    DividendSeries, EntityProfile, PeriodType, PriceHistory, RawStatement, Result, StatementKind,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::comparison::{ComparisonSources, TtmComparison};
use crate::currency::CurrencyNormalizer;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::dsiv::{self, CalibrationState, DsivAssumptions, DsivAudit, DsivProjection};
use crate::rows::Concept;
use crate::shares::SharesReconciler;
use crate::table::{FundamentalsTable, TableSources};
use crate::valuation::{DcfValuation, ValuationAssumptions, ValuationEngine, ValuationEstimate};

/// The four raw statements of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementSet {
    /// Annual income statement.
    pub annual_income: RawStatement,
    /// Annual balance sheet.
    pub annual_balance: RawStatement,
    /// Quarterly income statement.
    pub quarterly_income: RawStatement,
    /// Quarterly balance sheet.
    pub quarterly_balance: RawStatement,
}

impl Default for StatementSet {
    fn default() -> Self {
        Self {
            annual_income: RawStatement::new(StatementKind::Income, PeriodType::Annual),
            annual_balance: RawStatement::new(StatementKind::BalanceSheet, PeriodType::Annual),
            quarterly_income: RawStatement::new(StatementKind::Income, PeriodType::Quarterly),
            quarterly_balance: RawStatement::new(StatementKind::BalanceSheet, PeriodType::Quarterly),
        }
    }
}

impl StatementSet {
    /// Returns the statement for `kind` and `period_type`.
    #[must_use]
    pub const fn get(&self, kind: StatementKind, period_type: PeriodType) -> &RawStatement {
        match (kind, period_type) {
            (StatementKind::Income, PeriodType::Annual) => &self.annual_income,
            (StatementKind::BalanceSheet, PeriodType::Annual) => &self.annual_balance,
            (StatementKind::Income, PeriodType::Quarterly) => &self.quarterly_income,
            (StatementKind::BalanceSheet, PeriodType::Quarterly) => &self.quarterly_balance,
        }
    }

    /// Replaces the statement matching `statement`'s kind and cadence.
    pub fn insert(&mut self, statement: RawStatement) {
        let slot = match (statement.kind(), statement.period_type()) {
            (StatementKind::Income, PeriodType::Annual) => &mut self.annual_income,
            (StatementKind::BalanceSheet, PeriodType::Annual) => &mut self.annual_balance,
            (StatementKind::Income, PeriodType::Quarterly) => &mut self.quarterly_income,
            (StatementKind::BalanceSheet, PeriodType::Quarterly) => &mut self.quarterly_balance,
        };
        *slot = statement;
    }
}

/// Engine knobs that are not valuation assumptions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Most recent annual periods kept in the table.
    pub max_periods: usize,
    /// DCF growth when revenue history gives none, percent.
    pub default_growth_pct: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_periods: 4,
            default_growth_pct: 7.0,
        }
    }
}

/// Everything fetched for one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisInputs {
    /// Entity metadata and quote.
    pub profile: EntityProfile,
    /// Raw statements.
    pub statements: StatementSet,
    /// Daily closes.
    pub prices: PriceHistory,
    /// Dividend actions.
    pub dividends: DividendSeries,
    /// Reporting-to-trading conversion.
    pub currency: CurrencyNormalizer,
    /// Price valued against.
    pub current_price: f64,
}

/// Everything produced for one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    /// Entity metadata and quote.
    pub profile: EntityProfile,
    /// Price valued against.
    pub current_price: f64,
    /// Day change of the quote, percent.
    pub day_change_pct: Option<f64>,
    /// Most recent dividend action per share.
    pub last_dividend: Option<f64>,
    /// Conversion applied to statement figures.
    pub currency: CurrencyNormalizer,
    /// The normalized table.
    pub table: FundamentalsTable,
    /// Latest annual vs TTM.
    pub comparison: TtmComparison,
    /// Graham, PER reversion, PBV reversion and DCF, in that order.
    pub estimates: Vec<ValuationEstimate>,
    /// The full DCF when it could be computed.
    pub dcf: Option<DcfValuation>,
    /// The automatically derived DSIV assumptions.
    pub auto_dsiv: DsivAssumptions,
    /// The DSIV projection in effect.
    pub dsiv: DsivProjection,
    /// Everything flagged during the run.
    pub diagnostics: Vec<Diagnostic>,
}

impl Report {
    /// Re-projects DSIV with calibrated assumptions.
    pub fn apply_calibration(&mut self, assumptions: DsivAssumptions, state: CalibrationState) {
        self.dsiv = DsivProjection::project(
            assumptions,
            state,
            self.current_price,
            self.dsiv.audit,
        );
    }

    /// Returns the audit trail of the automatic DSIV derivation.
    #[must_use]
    pub const fn dsiv_audit(&self) -> &DsivAudit {
        &self.dsiv.audit
    }
}

/// Runs the engine over fetched inputs.
///
/// `diagnostics` carries anything already flagged at the boundary (such as a
/// fallback exchange rate). Fails only on out-of-bounds `assumptions`.
pub fn run(
    inputs: &AnalysisInputs,
    assumptions: &ValuationAssumptions,
    settings: &EngineSettings,
    mut diagnostics: Diagnostics,
) -> Result<Report> {
    assumptions.validate()?;
    let symbol = &inputs.profile.symbol;
    debug!(symbol = %symbol, rate = inputs.currency.rate(), "Running engine");

    let shares = SharesReconciler::from_outstanding(inputs.profile.shares_outstanding, &mut diagnostics);
    let statements = &inputs.statements;

    let table = FundamentalsTable::build(
        TableSources {
            income: &statements.annual_income,
            balance: &statements.annual_balance,
            prices: &inputs.prices,
            dividends: &inputs.dividends,
            currency: &inputs.currency,
            shares: &shares,
            current_price: inputs.current_price,
            max_periods: settings.max_periods,
        },
        &mut diagnostics,
    );

    let comparison = TtmComparison::build(
        ComparisonSources {
            table: &table,
            quarterly_income: &statements.quarterly_income,
            quarterly_balance: &statements.quarterly_balance,
            currency: &inputs.currency,
            shares_outstanding: shares.fallback_shares(),
            current_price: inputs.current_price,
        },
        &mut diagnostics,
    );

    // DCF growth reads the full annual history, not the table window
    let revenue_history: Vec<Option<f64>> = Concept::Revenue
        .resolve(&statements.annual_income)
        .map(|label| {
            statements
                .annual_income
                .row(label)
                .into_iter()
                .map(|v| inputs.currency.normalize_opt(v))
                .collect()
        })
        .unwrap_or_default();
    let engine = ValuationEngine::new(&table, inputs.current_price)
        .with_fallback_growth_pct(settings.default_growth_pct)
        .with_revenue_history(&revenue_history);
    let estimates = engine.estimates(assumptions);
    let dcf = engine.dcf(assumptions).ok();

    let (auto_dsiv, audit) =
        dsiv::derive_assumptions(&table, comparison.roe_ttm_pct, &mut diagnostics);
    let projection =
        DsivProjection::project(auto_dsiv, CalibrationState::Auto, inputs.current_price, audit);

    debug!(
        symbol = %symbol,
        periods = table.len(),
        diagnostics = diagnostics.entries().len(),
        "Engine finished"
    );

    Ok(Report {
        profile: inputs.profile.clone(),
        current_price: inputs.current_price,
        day_change_pct: inputs.profile.day_change_pct(),
        last_dividend: inputs.dividends.latest(),
        currency: inputs.currency.clone(),
        table,
        comparison,
        estimates,
        dcf,
        auto_dsiv,
        dsiv: projection,
        diagnostics: diagnostics.into_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsiv::Signal;
    use crate::valuation::ValuationMethod;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use intrinsic_core::Symbol;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn inputs() -> AnalysisInputs {
        let mut statements = StatementSet::default();
        let mut income = RawStatement::new(StatementKind::Income, PeriodType::Annual);
        let mut balance = RawStatement::new(StatementKind::BalanceSheet, PeriodType::Annual);
        for (year, ni, equity) in [(2022, 900.0, 9_000.0), (2023, 1_000.0, 10_000.0)] {
            income.insert_period(
                date(year, 12, 31),
                [
                    ("Net Income", Some(ni)),
                    ("Total Revenue", Some(ni * 5.0)),
                    ("Diluted EPS", Some(ni / 100.0)),
                ],
            );
            balance.insert_period(
                date(year, 12, 31),
                [
                    ("Stockholders Equity", Some(equity)),
                    ("Total Liabilities Net Minority Interest", Some(equity / 2.0)),
                ],
            );
        }
        statements.insert(income);
        statements.insert(balance);
        statements.insert(
            RawStatement::new(StatementKind::Income, PeriodType::Quarterly)
                .with_period(date(2024, 6, 30), [("Net Income", Some(600.0))])
                .with_period(date(2024, 3, 31), [("Net Income", Some(300.0))]),
        );

        AnalysisInputs {
            profile: EntityProfile::new(Symbol::new("TEST"), "Test Corp", "IDR")
                .with_quote(Some(150.0), Some(148.0))
                .with_shares_outstanding(100.0),
            statements,
            prices: PriceHistory::new([(date(2022, 12, 30), 120.0), (date(2023, 12, 29), 140.0)]),
            dividends: DividendSeries::default(),
            currency: CurrencyNormalizer::identity("IDR"),
            current_price: 150.0,
        }
    }

    #[test]
    fn test_run_produces_all_sections() {
        let report = run(
            &inputs(),
            &ValuationAssumptions::default(),
            &EngineSettings::default(),
            Diagnostics::new(),
        )
        .unwrap();

        assert_eq!(report.table.len(), 2);
        assert_eq!(report.estimates.len(), 4);
        assert_eq!(report.estimates[3].method, ValuationMethod::Dcf);
        assert!(report.dcf.is_some());
        assert_relative_eq!(report.comparison.window.as_ref().unwrap().total(), 600.0);
        assert_eq!(report.dsiv.state, CalibrationState::Auto);
        assert_relative_eq!(report.dsiv.audit.bvps, 100.0);
    }

    #[test]
    fn test_run_is_idempotent() {
        let inputs = inputs();
        let assumptions = ValuationAssumptions::default();
        let settings = EngineSettings::default();
        let a = run(&inputs, &assumptions, &settings, Diagnostics::new()).unwrap();
        let b = run(&inputs, &assumptions, &settings, Diagnostics::new()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_dcf_growth_reads_beyond_the_table_window() {
        let mut inputs = inputs();
        let mut income = RawStatement::new(StatementKind::Income, PeriodType::Annual);
        let mut balance = RawStatement::new(StatementKind::BalanceSheet, PeriodType::Annual);
        let revenues = [
            (2019, 100.0),
            (2020, 200.0),
            (2021, 200.0),
            (2022, 200.0),
            (2023, 200.0),
        ];
        for (year, revenue) in revenues {
            income.insert_period(
                date(year, 12, 31),
                [
                    ("Net Income", Some(1_000.0)),
                    ("Total Revenue", Some(revenue)),
                    ("Diluted EPS", Some(10.0)),
                ],
            );
            balance.insert_period(date(year, 12, 31), [("Stockholders Equity", Some(10_000.0))]);
        }
        inputs.statements.insert(income);
        inputs.statements.insert(balance);

        let report = run(
            &inputs,
            &ValuationAssumptions::default(),
            &EngineSettings::default(),
            Diagnostics::new(),
        )
        .unwrap();
        assert_eq!(report.table.len(), 4);
        let dcf = report.dcf.unwrap();
        assert!(dcf.growth_is_auto);
        assert_relative_eq!(dcf.growth_rate, 0.2);
    }

    #[test]
    fn test_last_dividend() {
        let mut inputs = inputs();
        let assumptions = ValuationAssumptions::default();
        let settings = EngineSettings::default();
        let report = run(&inputs, &assumptions, &settings, Diagnostics::new()).unwrap();
        assert_eq!(report.last_dividend, None);

        inputs.dividends = DividendSeries::new([(date(2023, 5, 2), 4.0), (date(2023, 11, 8), 6.0)]);
        let report = run(&inputs, &assumptions, &settings, Diagnostics::new()).unwrap();
        assert_eq!(report.last_dividend, Some(6.0));
    }

    #[test]
    fn test_rejects_out_of_bounds_assumptions() {
        let assumptions = ValuationAssumptions::default().with_discount_rate_pct(30.0);
        assert!(run(&inputs(), &assumptions, &EngineSettings::default(), Diagnostics::new()).is_err());
    }

    #[test]
    fn test_apply_calibration() {
        let mut report = run(
            &inputs(),
            &ValuationAssumptions::default(),
            &EngineSettings::default(),
            Diagnostics::new(),
        )
        .unwrap();
        report.apply_calibration(DsivAssumptions::new(200.0, 10.0, 1.0), CalibrationState::Overridden);
        assert_eq!(report.dsiv.state, CalibrationState::Overridden);
        assert_relative_eq!(report.dsiv.floor, 200.0);
        assert_eq!(report.dsiv.signal, Signal::Accumulate);
        assert_relative_eq!(report.dsiv.audit.bvps, 100.0);
    }
}
