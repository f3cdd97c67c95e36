//! Shares outstanding and EPS reconciliation.
//!
//! Reported EPS is the better source for a period's share count: the count
//! it implies (`net income / EPS`) moves with buybacks and issuance. When EPS
//! is missing or zero the entity's currently reported count stands in for
//! every period, so the fallback series is deliberately constant.

use serde::Serialize;

use crate::diagnostics::{Diagnostic, Diagnostics};

/// How a period's share count was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SharesSource {
    /// Derived as net income / reported EPS.
    ReportedEps,
    /// The entity's current shares outstanding.
    OutstandingFallback,
}

/// A period's reconciled share count and EPS.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReconciledShares {
    /// Share count, always non-negative.
    pub shares: f64,
    /// Earnings per share consistent with `shares`.
    pub eps: f64,
    /// Which path produced the figures.
    pub source: SharesSource,
    /// True if the derived count was negative and was inverted.
    pub sign_inverted: bool,
}

impl ReconciledShares {
    /// Returns the raw (pre-inversion) share count when an inversion happened.
    #[must_use]
    pub fn raw_shares(&self) -> f64 {
        if self.sign_inverted {
            -self.shares
        } else {
            self.shares
        }
    }
}

/// Derives per-period shares and EPS with a fallback share count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SharesReconciler {
    fallback_shares: f64,
}

impl SharesReconciler {
    /// Creates a reconciler from the entity's reported shares outstanding.
    ///
    /// A missing, zero or non-finite count defaults to 1 and is flagged; a
    /// negative count is used by magnitude.
    pub fn from_outstanding(reported: Option<f64>, diagnostics: &mut Diagnostics) -> Self {
        match reported.filter(|s| s.is_finite() && *s != 0.0) {
            Some(shares) => Self {
                fallback_shares: shares.abs(),
            },
            None => {
                diagnostics.flag(Diagnostic::SharesOutstandingDefaulted { reported, used: 1.0 });
                Self {
                    fallback_shares: 1.0,
                }
            }
        }
    }

    /// Returns the fallback share count.
    #[must_use]
    pub const fn fallback_shares(&self) -> f64 {
        self.fallback_shares
    }

    /// Reconciles one period from currency-normalized net income and EPS.
    ///
    /// The EPS path needs both a usable EPS and a usable net income. A
    /// negative implied count is inverted and EPS re-derived from the inverted
    /// count, so `net_income == eps * shares` holds on that path.
    #[must_use]
    pub fn reconcile(&self, net_income: Option<f64>, eps: Option<f64>) -> ReconciledShares {
        let net_income = usable(net_income);
        match (net_income, usable(eps)) {
            (Some(ni), Some(eps)) => {
                let raw = ni / eps;
                if raw < 0.0 {
                    let shares = -raw;
                    ReconciledShares {
                        shares,
                        eps: ni / shares,
                        source: SharesSource::ReportedEps,
                        sign_inverted: true,
                    }
                } else {
                    ReconciledShares {
                        shares: raw,
                        eps,
                        source: SharesSource::ReportedEps,
                        sign_inverted: false,
                    }
                }
            }
            _ => ReconciledShares {
                shares: self.fallback_shares,
                eps: net_income.map_or(0.0, |ni| ni / self.fallback_shares),
                source: SharesSource::OutstandingFallback,
                sign_inverted: false,
            },
        }
    }
}

fn usable(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v != 0.0)
}
