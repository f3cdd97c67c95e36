//! Provider traits for fetching market data.
//!
//! This module defines the core provider traits:
//!
//! - [`DataProvider`] - Base trait for all data providers
//! - [`PriceDataProvider`] - Closing prices, dividend actions and exchange rates
//! - [`FundamentalDataProvider`] - Raw annual and quarterly statements
//! - [`ReferenceDataProvider`] - Entity metadata and the live quote

use async_trait::async_trait;
use chrono::NaiveDate;
use std::fmt::Debug;

use crate::{
    error::Result,
    period::{PeriodType, StatementKind},
    types::{DividendSeries, EntityProfile, PriceHistory, RawStatement, Symbol},
};

/// Base trait for all data providers.
///
/// All data providers must implement this trait to provide basic metadata
/// about the provider.
pub trait DataProvider: Send + Sync + Debug {
    /// Returns the name of this provider (e.g., "Yahoo Finance").
    fn name(&self) -> &str;

    /// Returns a description of this provider.
    fn description(&self) -> &str;
}

/// Provider for daily price data.
#[async_trait]
pub trait PriceDataProvider: DataProvider {
    /// Fetches daily closing prices between `start` and `end` inclusive.
    ///
    /// A known symbol with no trading in the range yields an empty history.
    async fn fetch_closes(
        &self,
        symbol: &Symbol,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceHistory>;

    /// Fetches per-share dividend actions between `start` and `end` inclusive.
    async fn fetch_dividends(
        &self,
        symbol: &Symbol,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<DividendSeries>;

    /// Fetches the live rate converting one unit of `from` into `to`.
    async fn fetch_exchange_rate(&self, from: &str, to: &str) -> Result<f64>;
}

/// Provider for fundamental financial data.
///
/// Implement this trait to provide raw statements as the provider labels them.
#[async_trait]
pub trait FundamentalDataProvider: DataProvider {
    /// Fetches a statement for a symbol.
    ///
    /// # Arguments
    ///
    /// * `symbol` - The stock symbol
    /// * `kind` - Income statement or balance sheet
    /// * `period_type` - Annual or Quarterly
    async fn fetch_statement(
        &self,
        symbol: &Symbol,
        kind: StatementKind,
        period_type: PeriodType,
    ) -> Result<RawStatement>;
}

/// Provider for reference/metadata.
#[async_trait]
pub trait ReferenceDataProvider: DataProvider {
    /// Fetches the entity profile and live quote for a symbol.
    async fn profile(&self, symbol: &Symbol) -> Result<EntityProfile>;

    /// Checks if a symbol is supported by this provider.
    async fn supports_symbol(&self, symbol: &Symbol) -> Result<bool>;
}
