//! Semantic concept to provider row label resolution.
//!
//! Providers label the same line item differently ("Total Revenue" vs
//! "Revenue"). Each [`Concept`] carries an ordered list of the exact labels
//! known to mean it; resolution picks the first candidate present in a
//! statement's row index. Matching is exact and case-sensitive.

use intrinsic_core::RawStatement;

use crate::diagnostics::{Diagnostic, Diagnostics};

/// An ordered set of acceptable labels for one concept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelSet {
    concept: &'static str,
    labels: &'static [&'static str],
}

impl LabelSet {
    /// Creates a label set.
    #[must_use]
    pub const fn new(concept: &'static str, labels: &'static [&'static str]) -> Self {
        Self { concept, labels }
    }

    /// Returns the concept name.
    #[must_use]
    pub const fn concept(&self) -> &'static str {
        self.concept
    }

    /// Returns the candidate labels in priority order.
    #[must_use]
    pub const fn labels(&self) -> &'static [&'static str] {
        self.labels
    }

    /// Returns the first candidate present in `statement`, or `None`.
    #[must_use]
    pub fn resolve(&self, statement: &RawStatement) -> Option<&'static str> {
        self.labels
            .iter()
            .copied()
            .find(|label| statement.has_row(label))
    }

    /// Resolves like [`LabelSet::resolve`], flagging a [`Diagnostic::MissingRow`] on failure.
    pub fn resolve_flagged(
        &self,
        statement: &RawStatement,
        diagnostics: &mut Diagnostics,
    ) -> Option<&'static str> {
        let resolved = self.resolve(statement);
        if resolved.is_none() {
            diagnostics.flag(Diagnostic::MissingRow {
                concept: self.concept,
                statement: statement.kind(),
                period_type: statement.period_type(),
            });
        }
        resolved
    }
}

/// The statement concepts the engine reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Concept {
    /// Top-line revenue.
    Revenue,
    /// Net income attributable to the company.
    NetIncome,
    /// Shareholders' equity.
    Equity,
    /// Earnings per share.
    Eps,
    /// Total liabilities.
    TotalLiabilities,
}

impl Concept {
    /// Returns the candidate labels for this concept.
    #[must_use]
    pub const fn label_set(self) -> LabelSet {
        match self {
            Self::Revenue => LabelSet::new("revenue", &["Total Revenue", "Revenue"]),
            Self::NetIncome => LabelSet::new(
                "net income",
                &["Net Income", "Net Income Common Stockholders"],
            ),
            Self::Equity => LabelSet::new(
                "equity",
                &[
                    "Stockholders Equity",
                    "Total Equity",
                    "Total Equity Gross Minority Interest",
                ],
            ),
            Self::Eps => LabelSet::new("eps", &["Diluted EPS", "Basic EPS"]),
            Self::TotalLiabilities => LabelSet::new(
                "total liabilities",
                &["Total Liabilities Net Minority Interest", "Total Liabilities"],
            ),
        }
    }

    /// Resolves this concept against `statement`.
    #[must_use]
    pub fn resolve(self, statement: &RawStatement) -> Option<&'static str> {
        self.label_set().resolve(statement)
    }
}
