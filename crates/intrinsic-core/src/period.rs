//! Statement period and kind definitions.
//!
//! This module defines [`PeriodType`] for the reporting cadence of a statement
//! and [`StatementKind`] for which statement a set of rows comes from.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Period type for fundamental financial data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeriodType {
    /// Annual reporting period.
    #[default]
    Annual,
    /// Quarterly reporting period.
    Quarterly,
}

impl PeriodType {
    /// Returns the prefix the period type carries in provider keys.
    #[must_use]
    pub const fn prefix(&self) -> &'static str {
        match self {
            Self::Annual => "annual",
            Self::Quarterly => "quarterly",
        }
    }
}

/// The statement a set of rows was taken from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatementKind {
    /// Income statement (flows over the period).
    #[default]
    Income,
    /// Balance sheet (stocks at period end).
    BalanceSheet,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Income => write!(f, "income statement"),
            Self::BalanceSheet => write!(f, "balance sheet"),
        }
    }
}
