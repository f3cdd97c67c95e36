//! Trailing-twelve-month reconstruction from quarterly flows.
//!
//! Providers report quarterly flows either as discrete quarters or as
//! year-to-date cumulative figures, sometimes switching mid-history. The
//! convention is inferred per adjacent pair: when a quarter is larger than
//! the one before it, the newer figure is taken to be cumulative and the
//! difference is its discrete contribution.
//!
//! This is a magnitude heuristic. A genuinely shrinking series of discrete
//! quarters is indistinguishable from a cumulative one and will be
//! misclassified.

use serde::Serialize;

use crate::diagnostics::{Diagnostic, Diagnostics};

/// Quarters in a trailing-twelve-month window.
pub const TTM_QUARTERS: usize = 4;

/// How one quarter's contribution was inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReportingConvention {
    /// The figure includes prior quarters; the difference was taken.
    Cumulative,
    /// The figure is already a single quarter.
    Discrete,
}

/// Up to four quarterly observations and their discrete contributions, newest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TtmWindow {
    observations: Vec<f64>,
    contributions: Vec<f64>,
    conventions: Vec<ReportingConvention>,
}

impl TtmWindow {
    /// Reconstructs a window from quarterly observations, newest first.
    ///
    /// Only the four most recent observations are used. Returns `None` for an
    /// empty input.
    #[must_use]
    pub fn reconstruct(observations: &[f64]) -> Option<Self> {
        let observations: Vec<f64> = observations.iter().copied().take(TTM_QUARTERS).collect();
        if observations.is_empty() {
            return None;
        }

        let mut contributions = Vec::with_capacity(observations.len());
        let mut conventions = Vec::with_capacity(observations.len());
        for (i, &current) in observations.iter().enumerate() {
            match observations.get(i + 1) {
                Some(&prior) if current > prior => {
                    contributions.push(current - prior);
                    conventions.push(ReportingConvention::Cumulative);
                }
                _ => {
                    contributions.push(current);
                    conventions.push(ReportingConvention::Discrete);
                }
            }
        }

        Some(Self {
            observations,
            contributions,
            conventions,
        })
    }

    /// Builds a window from a statement row, skipping missing quarters.
    ///
    /// Each skipped position among the most recent four is flagged.
    pub fn from_row(row: &[Option<f64>], diagnostics: &mut Diagnostics) -> Option<Self> {
        let mut present = Vec::with_capacity(TTM_QUARTERS);
        for (index, value) in row.iter().take(TTM_QUARTERS).enumerate() {
            match value.filter(|v| v.is_finite()) {
                Some(v) => present.push(v),
                None => diagnostics.flag(Diagnostic::MissingQuarter { index }),
            }
        }
        Self::reconstruct(&present)
    }

    /// Returns the raw observations used.
    #[must_use]
    pub fn observations(&self) -> &[f64] {
        &self.observations
    }

    /// Returns the discrete contribution of each quarter.
    #[must_use]
    pub fn contributions(&self) -> &[f64] {
        &self.contributions
    }

    /// Returns the inferred convention of each quarter.
    #[must_use]
    pub fn conventions(&self) -> &[ReportingConvention] {
        &self.conventions
    }

    /// Returns true if fewer than four quarters were available.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.observations.len() < TTM_QUARTERS
    }

    /// Signed sum of the discrete contributions.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.contributions.iter().sum()
    }

    /// The total forced non-negative, for per-share figures.
    ///
    /// Ratios built on this must still gate on a strictly positive denominator.
    #[must_use]
    pub fn magnitude(&self) -> f64 {
        self.total().abs()
    }

    /// Returns true if the signed total is negative.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.total() < 0.0
    }

    /// Like [`TtmWindow::magnitude`], flagging a negative total.
    pub fn magnitude_flagged(&self, diagnostics: &mut Diagnostics) -> f64 {
        if self.is_negative() {
            diagnostics.flag(Diagnostic::NegativeTtm {
                total: self.total(),
            });
        }
        self.magnitude()
    }
}
