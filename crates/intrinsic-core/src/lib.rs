#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/intrinsic/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core traits and types for fundamentals normalization and valuation.
//!
//! This crate provides the foundational abstractions shared by the engine and the providers:
//!
//! - [`DataProvider`](provider::DataProvider) - Base trait for all providers
//! - [`PriceDataProvider`](provider::PriceDataProvider) - Closing prices, dividends and FX rates
//! - [`FundamentalDataProvider`](provider::FundamentalDataProvider) - Raw financial statements
//! - [`ReferenceDataProvider`](provider::ReferenceDataProvider) - Entity metadata and quote

/// Error types for data operations.
pub mod error;
/// Statement period and kind definitions.
pub mod period;
/// Provider traits for fetching market data.
pub mod provider;
/// Core data types (Symbol, RawStatement, PriceHistory, etc.).
pub mod types;

// Re-export commonly used items at crate root
pub use error::{DataError, Result};
pub use period::{PeriodType, StatementKind};
pub use provider::{
    DataProvider, FundamentalDataProvider, PriceDataProvider, ReferenceDataProvider,
};
pub use types::{
    DividendSeries, EntityProfile, PriceHistory, RawStatement, StatementPeriod, Symbol,
};
