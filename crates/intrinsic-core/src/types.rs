//! Core data types for statement and market data.
//!
//! This module defines the data structures the engine consumes:
//!
//! - [`Symbol`] - Trading symbol/ticker
//! - [`RawStatement`] - A provider statement with provider-specific row labels
//! - [`PriceHistory`] - Daily closing prices
//! - [`DividendSeries`] - Per-share dividend actions
//! - [`EntityProfile`] - Quote, share count, currencies and classification

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::period::{PeriodType, StatementKind};

/// A trading symbol/ticker.
///
/// Symbols are automatically uppercased on creation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol(String);

impl Symbol {
    /// Creates a new symbol from a string, converting to uppercase.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into().trim().to_uppercase())
    }

    /// Returns the symbol as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the symbol with an exchange suffix appended (e.g. `BBCA` -> `BBCA.JK`).
    ///
    /// Symbols that already carry a suffix are returned unchanged.
    #[must_use]
    pub fn with_exchange_suffix(&self, suffix: &str) -> Self {
        if self.0.contains('.') || suffix.is_empty() {
            self.clone()
        } else {
            Self(format!("{}.{}", self.0, suffix.trim_start_matches('.').to_uppercase()))
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Symbol {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// One reporting period of a [`RawStatement`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatementPeriod {
    /// End date of the reporting period.
    pub end: NaiveDate,
    values: HashMap<String, f64>,
}

impl StatementPeriod {
    /// Returns the value reported under `label`, if any.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<f64> {
        self.values.get(label).copied()
    }
}

/// A financial statement as delivered by a provider.
///
/// Periods are kept most-recent first. Row labels are the provider's own
/// strings and are kept in first-seen order; a label present in the row index
/// may still have no value for a given period.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawStatement {
    kind: StatementKind,
    period_type: PeriodType,
    periods: Vec<StatementPeriod>,
    rows: Vec<String>,
}

impl RawStatement {
    /// Creates an empty statement.
    #[must_use]
    pub const fn new(kind: StatementKind, period_type: PeriodType) -> Self {
        Self {
            kind,
            period_type,
            periods: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Adds a period with its `(label, value)` pairs.
    ///
    /// `None` and non-finite values are recorded in the row index but not as values.
    /// Adding a period end that already exists merges the values into it.
    #[must_use]
    pub fn with_period<L, I>(mut self, end: NaiveDate, values: I) -> Self
    where
        L: Into<String>,
        I: IntoIterator<Item = (L, Option<f64>)>,
    {
        self.insert_period(end, values);
        self
    }

    /// Adds a period in place. See [`RawStatement::with_period`].
    pub fn insert_period<L, I>(&mut self, end: NaiveDate, values: I)
    where
        L: Into<String>,
        I: IntoIterator<Item = (L, Option<f64>)>,
    {
        let idx = match self.periods.iter().position(|p| p.end == end) {
            Some(idx) => idx,
            None => {
                let idx = self.periods.partition_point(|p| p.end > end);
                self.periods.insert(
                    idx,
                    StatementPeriod {
                        end,
                        values: HashMap::new(),
                    },
                );
                idx
            }
        };

        for (label, value) in values {
            let label = label.into();
            if !self.rows.contains(&label) {
                self.rows.push(label.clone());
            }
            if let Some(v) = value.filter(|v| v.is_finite()) {
                self.periods[idx].values.insert(label, v);
            }
        }
    }

    /// Returns which statement this is.
    #[must_use]
    pub const fn kind(&self) -> StatementKind {
        self.kind
    }

    /// Returns the reporting cadence.
    #[must_use]
    pub const fn period_type(&self) -> PeriodType {
        self.period_type
    }

    /// Returns the periods, most recent first.
    #[must_use]
    pub fn periods(&self) -> &[StatementPeriod] {
        &self.periods
    }

    /// Returns the row index in first-seen order.
    #[must_use]
    pub fn row_labels(&self) -> &[String] {
        &self.rows
    }

    /// Returns true if `label` is in the row index (exact, case-sensitive).
    #[must_use]
    pub fn has_row(&self, label: &str) -> bool {
        self.rows.iter().any(|r| r == label)
    }

    /// Returns the number of periods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.periods.len()
    }

    /// Returns true if the statement has no periods.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// Returns the value of `label` in the `idx`-th most recent period.
    #[must_use]
    pub fn value(&self, label: &str, idx: usize) -> Option<f64> {
        self.periods.get(idx).and_then(|p| p.get(label))
    }

    /// Returns the row for `label` across all periods, most recent first.
    #[must_use]
    pub fn row(&self, label: &str) -> Vec<Option<f64>> {
        self.periods.iter().map(|p| p.get(label)).collect()
    }

    /// Returns a copy keeping only the `n` most recent periods.
    #[must_use]
    pub fn truncated(&self, n: usize) -> Self {
        Self {
            kind: self.kind,
            period_type: self.period_type,
            periods: self.periods.iter().take(n).cloned().collect(),
            rows: self.rows.clone(),
        }
    }
}

/// Daily closing prices, oldest first.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    closes: Vec<(NaiveDate, f64)>,
}

impl PriceHistory {
    /// Creates a history from `(date, close)` observations in any order.
    ///
    /// Non-finite closes are dropped; duplicate dates keep the last observation.
    #[must_use]
    pub fn new(closes: impl IntoIterator<Item = (NaiveDate, f64)>) -> Self {
        let mut closes: Vec<(NaiveDate, f64)> =
            closes.into_iter().filter(|(_, c)| c.is_finite()).collect();
        closes.sort_by_key(|(d, _)| *d);
        closes.reverse();
        closes.dedup_by_key(|(d, _)| *d);
        closes.reverse();
        Self { closes }
    }

    /// Returns the last close at or before `date`.
    #[must_use]
    pub fn close_at_or_before(&self, date: NaiveDate) -> Option<f64> {
        let idx = self.closes.partition_point(|(d, _)| *d <= date);
        idx.checked_sub(1).map(|i| self.closes[i].1)
    }

    /// Returns the most recent close.
    #[must_use]
    pub fn latest(&self) -> Option<f64> {
        self.closes.last().map(|(_, c)| *c)
    }

    /// Iterates `(date, close)` oldest first.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.closes.iter().copied()
    }

    /// Returns the number of observations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.closes.len()
    }

    /// Returns true if there are no observations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }
}

/// Per-share dividend actions.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DividendSeries {
    actions: Vec<(NaiveDate, f64)>,
}

impl DividendSeries {
    /// Creates a series from `(ex-date, amount)` actions.
    ///
    /// Non-finite and non-positive amounts are dropped.
    #[must_use]
    pub fn new(actions: impl IntoIterator<Item = (NaiveDate, f64)>) -> Self {
        let mut actions: Vec<(NaiveDate, f64)> = actions
            .into_iter()
            .filter(|(_, a)| a.is_finite() && *a > 0.0)
            .collect();
        actions.sort_by_key(|(d, _)| *d);
        Self { actions }
    }

    /// Returns the sum of all actions in calendar `year`.
    #[must_use]
    pub fn total_for_year(&self, year: i32) -> f64 {
        self.actions
            .iter()
            .filter(|(d, _)| d.year() == year)
            .map(|(_, a)| a)
            .sum()
    }

    /// Returns the most recent action amount.
    #[must_use]
    pub fn latest(&self) -> Option<f64> {
        self.actions.last().map(|(_, a)| *a)
    }

    /// Iterates `(ex-date, amount)` oldest first.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.actions.iter().copied()
    }

    /// Returns true if there are no actions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Entity metadata and live quote.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityProfile {
    /// Stock symbol.
    pub symbol: Symbol,
    /// Long company name.
    pub name: String,
    /// Business sector.
    pub sector: Option<String>,
    /// Industry within the sector.
    pub industry: Option<String>,
    /// Current (live) price in the trading currency.
    pub current_price: Option<f64>,
    /// Previous session close in the trading currency.
    pub previous_close: Option<f64>,
    /// Currently reported shares outstanding.
    pub shares_outstanding: Option<f64>,
    /// Currency the equity trades in.
    pub currency: String,
    /// Currency the statements are reported in, when it differs from the trading currency.
    pub financial_currency: Option<String>,
}

impl EntityProfile {
    /// Creates a profile with the required fields.
    #[must_use]
    pub fn new(symbol: Symbol, name: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            symbol,
            name: name.into(),
            currency: currency.into(),
            ..Default::default()
        }
    }

    /// Sets the live price and previous close.
    #[must_use]
    pub const fn with_quote(mut self, current_price: Option<f64>, previous_close: Option<f64>) -> Self {
        self.current_price = current_price;
        self.previous_close = previous_close;
        self
    }

    /// Sets the reported shares outstanding.
    #[must_use]
    pub const fn with_shares_outstanding(mut self, shares: f64) -> Self {
        self.shares_outstanding = Some(shares);
        self
    }

    /// Sets the currency the statements are reported in.
    #[must_use]
    pub fn with_financial_currency(mut self, currency: impl Into<String>) -> Self {
        self.financial_currency = Some(currency.into());
        self
    }

    /// Sets the sector and industry.
    #[must_use]
    pub fn with_classification(
        mut self,
        sector: impl Into<String>,
        industry: impl Into<String>,
    ) -> Self {
        self.sector = Some(sector.into());
        self.industry = Some(industry.into());
        self
    }

    /// Returns the price to value against: the live price, else the previous close.
    #[must_use]
    pub fn quote_price(&self) -> Option<f64> {
        self.current_price
            .filter(|p| *p > 0.0)
            .or(self.previous_close.filter(|p| *p > 0.0))
    }

    /// Returns the currency statement figures are reported in.
    #[must_use]
    pub fn reporting_currency(&self) -> &str {
        self.financial_currency.as_deref().unwrap_or(&self.currency)
    }

    /// Returns the day change in percent, undefined without a positive previous close.
    #[must_use]
    pub fn day_change_pct(&self) -> Option<f64> {
        let prev = self.previous_close.filter(|p| *p > 0.0)?;
        let price = self.quote_price()?;
        Some((price - prev) / prev * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_symbol_suffix() {
        let symbol = Symbol::new(" bbca ");
        assert_eq!(symbol.as_str(), "BBCA");
        assert_eq!(symbol.with_exchange_suffix("jk").as_str(), "BBCA.JK");
        assert_eq!(
            Symbol::new("BBCA.JK").with_exchange_suffix("JK").as_str(),
            "BBCA.JK"
        );
    }

    #[test]
    fn test_statement_orders_periods_newest_first() {
        let stmt = RawStatement::new(StatementKind::Income, PeriodType::Annual)
            .with_period(date(2022, 12, 31), [("Net Income", Some(10.0))])
            .with_period(date(2024, 12, 31), [("Net Income", Some(30.0))])
            .with_period(date(2023, 12, 31), [("Net Income", None), ("Revenue", Some(5.0))]);

        let ends: Vec<_> = stmt.periods().iter().map(|p| p.end).collect();
        assert_eq!(ends, vec![date(2024, 12, 31), date(2023, 12, 31), date(2022, 12, 31)]);
        assert_eq!(stmt.row("Net Income"), vec![Some(30.0), None, Some(10.0)]);
        assert_eq!(stmt.row_labels(), &["Net Income".to_string(), "Revenue".to_string()]);
        assert!(stmt.has_row("Revenue"));
        assert!(!stmt.has_row("revenue"));
    }

    #[test]
    fn test_statement_drops_non_finite_values() {
        let stmt = RawStatement::new(StatementKind::BalanceSheet, PeriodType::Quarterly)
            .with_period(date(2024, 3, 31), [("Total Equity", Some(f64::NAN))]);
        assert!(stmt.has_row("Total Equity"));
        assert_eq!(stmt.value("Total Equity", 0), None);
    }

    #[test]
    fn test_truncated() {
        let stmt = RawStatement::new(StatementKind::Income, PeriodType::Annual)
            .with_period(date(2021, 12, 31), [("Revenue", Some(1.0))])
            .with_period(date(2022, 12, 31), [("Revenue", Some(2.0))])
            .with_period(date(2023, 12, 31), [("Revenue", Some(3.0))]);
        let cut = stmt.truncated(2);
        assert_eq!(cut.len(), 2);
        assert_eq!(cut.value("Revenue", 1), Some(2.0));
    }

    #[test]
    fn test_close_at_or_before() {
        let history = PriceHistory::new([
            (date(2024, 1, 3), 102.0),
            (date(2024, 1, 2), 101.0),
            (date(2024, 1, 5), 105.0),
        ]);
        assert_eq!(history.close_at_or_before(date(2024, 1, 4)), Some(102.0));
        assert_eq!(history.close_at_or_before(date(2024, 1, 5)), Some(105.0));
        assert_eq!(history.close_at_or_before(date(2023, 12, 31)), None);
        assert_eq!(history.latest(), Some(105.0));
    }

    #[test]
    fn test_dividends_per_year() {
        let divs = DividendSeries::new([
            (date(2023, 5, 1), 100.0),
            (date(2023, 11, 1), 50.0),
            (date(2024, 5, 1), 120.0),
            (date(2024, 6, 1), 0.0),
        ]);
        assert_eq!(divs.total_for_year(2023), 150.0);
        assert_eq!(divs.total_for_year(2022), 0.0);
        assert_eq!(divs.latest(), Some(120.0));
    }

    #[test]
    fn test_profile_quote_fallback() {
        let profile = EntityProfile::new(Symbol::new("ADRO.JK"), "Adaro", "IDR")
            .with_quote(None, Some(2500.0))
            .with_financial_currency("USD");
        assert_eq!(profile.quote_price(), Some(2500.0));
        assert_eq!(profile.reporting_currency(), "USD");
        assert_eq!(profile.day_change_pct(), Some(0.0));
    }

    #[test]
    fn test_statement_serde() {
        let stmt = RawStatement::new(StatementKind::Income, PeriodType::Annual)
            .with_period(date(2024, 12, 31), [("Revenue", Some(3.0))]);
        let json = serde_json::to_string(&stmt).unwrap();
        let back: RawStatement = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stmt);
    }
}
