#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/intrinsic/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Statement normalization and valuation engine.
//!
//! Data flows strictly downward: [`rows`] and [`currency`] feed [`shares`] and
//! [`ttm`], which feed the [`table`], which feeds [`valuation`] and [`dsiv`].
//! [`pipeline::run`] composes them for one entity, and [`peers`] lines up
//! finished reports side by side.

/// Latest annual vs trailing-twelve-month comparison.
pub mod comparison;
/// Reporting-to-trading currency conversion.
pub mod currency;
/// Flagged diagnostics and unavailable-metric reasons.
pub mod diagnostics;
/// Two-tier floor/target projection and calibration state.
pub mod dsiv;
/// One row per entity for side-by-side comparison.
pub mod peers;
/// One full normalization and valuation pass.
pub mod pipeline;
/// Semantic concept to provider row label resolution.
pub mod rows;
/// Shares outstanding and EPS reconciliation.
pub mod shares;
mod stats;
/// The normalized per-period fundamentals table.
pub mod table;
/// Trailing-twelve-month reconstruction from quarterly flows.
pub mod ttm;
/// Ratio-based and discounted-cash-flow valuation.
pub mod valuation;

pub use comparison::{ComparisonMetric, ComparisonRow, ComparisonSources, TtmComparison};
pub use currency::{CurrencyNormalizer, RateSource};
pub use diagnostics::{Diagnostic, Diagnostics, Unavailable};
pub use dsiv::{
    CalibrationState, DsivAssumptions, DsivAudit, DsivCalibration, DsivProjection, Signal,
};
pub use peers::{PeerComparison, PeerMetric, PeerRow};
pub use pipeline::{AnalysisInputs, EngineSettings, Report, StatementSet};
pub use rows::{Concept, LabelSet};
pub use shares::{ReconciledShares, SharesReconciler, SharesSource};
pub use table::{FundamentalsTable, Metric, NormalizedPeriod, TableSources};
pub use ttm::{ReportingConvention, TtmWindow};
pub use valuation::{
    DcfValuation, DcfYear, MAX_HORIZON_YEARS, ValuationAssumptions, ValuationEngine,
    ValuationEstimate, ValuationMethod,
};
