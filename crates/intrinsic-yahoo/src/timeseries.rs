//! Fundamentals time series parsing.
//!
//! The time series endpoint answers one result per requested key
//! (`annualNetIncome`, `quarterlyStockholdersEquity`, ...), each holding a list
//! of dated reported values. The key type is dynamic, so results are walked as
//! JSON values rather than deserialized into fixed structs.

use chrono::NaiveDate;
use intrinsic_core::{DataError, PeriodType, RawStatement, Result, StatementKind};
use serde_json::Value;
use tracing::debug;

const INCOME_KEYS: &[&str] = &[
    "TotalRevenue",
    "OperatingRevenue",
    "NetIncome",
    "NetIncomeCommonStockholders",
    "DilutedEPS",
    "BasicEPS",
];

const BALANCE_KEYS: &[&str] = &[
    "StockholdersEquity",
    "CommonStockEquity",
    "TotalEquityGrossMinorityInterest",
    "TotalLiabilitiesNetMinorityInterest",
];

/// Time series keys requested for a statement.
pub(crate) fn keys(kind: StatementKind) -> &'static [&'static str] {
    match kind {
        StatementKind::Income => INCOME_KEYS,
        StatementKind::BalanceSheet => BALANCE_KEYS,
    }
}

/// The `type` query parameter for a statement, e.g. `annualNetIncome,annualBasicEPS`.
pub(crate) fn type_param(kind: StatementKind, period_type: PeriodType) -> String {
    keys(kind)
        .iter()
        .map(|k| format!("{}{k}", period_type.prefix()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Renders a time series key as a statement label: `DilutedEPS` -> `Diluted EPS`.
///
/// A space goes before an uppercase letter that follows a lowercase one, and
/// before the last letter of an acronym that starts a new word.
pub(crate) fn camel_to_title(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let mut out = String::with_capacity(key.len() + 8);
    for (i, &c) in chars.iter().enumerate() {
        if i > 0 && c.is_uppercase() {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower) {
                out.push(' ');
            }
        }
        out.push(c);
    }
    out
}

/// Builds a statement from a time series response body.
pub(crate) fn parse_statement(
    body: &Value,
    kind: StatementKind,
    period_type: PeriodType,
) -> Result<RawStatement> {
    let timeseries = body
        .get("timeseries")
        .ok_or_else(|| DataError::Parse("missing timeseries".to_string()))?;
    if let Some(error) = timeseries.get("error").filter(|e| !e.is_null()) {
        return Err(DataError::Other(error.to_string()));
    }
    let results = timeseries
        .get("result")
        .and_then(Value::as_array)
        .ok_or_else(|| DataError::Parse("missing timeseries result".to_string()))?;

    let prefix = period_type.prefix();
    let mut statement = RawStatement::new(kind, period_type);
    for result in results {
        let Some(type_key) = result
            .pointer("/meta/type/0")
            .and_then(Value::as_str)
        else {
            continue;
        };
        let Some(field) = type_key.strip_prefix(prefix) else {
            continue;
        };
        let label = camel_to_title(field);

        let observations = result.get(type_key).and_then(Value::as_array);
        let mut seen = 0usize;
        for observation in observations.into_iter().flatten() {
            let Some(end) = observation
                .get("asOfDate")
                .and_then(Value::as_str)
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            else {
                continue;
            };
            let value = observation
                .pointer("/reportedValue/raw")
                .and_then(Value::as_f64);
            statement.insert_period(end, [(label.as_str(), value)]);
            seen += 1;
        }
        debug!(key = type_key, observations = seen, "Parsed time series");
    }
    Ok(statement)
}
