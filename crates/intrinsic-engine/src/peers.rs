//! One row per entity for side-by-side comparison.

use intrinsic_core::{DataError, Result, Symbol};
use polars::prelude::*;
use serde::Serialize;

use crate::comparison::ComparisonMetric;
use crate::pipeline::Report;
use crate::stats;
use crate::table::Metric;

/// A column of the peer matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PeerMetric {
    /// Price valued against.
    Price,
    /// Price / latest annual book value per share.
    Pbv,
    /// Price / TTM EPS.
    PerTtm,
    /// Compound EPS growth across the table, percent.
    EpsGrowth,
    /// Latest annual EPS.
    EpsAnnual,
    /// TTM EPS.
    EpsTtm,
    /// Most recent dividend per share.
    LastDividend,
    /// Latest annual debt to equity.
    DerAnnual,
    /// Latest quarterly debt to equity.
    DerTtm,
    /// Latest annual return on equity, percent.
    Roe,
}

impl PeerMetric {
    /// Every column in display order.
    pub const ALL: [Self; 10] = [
        Self::Price,
        Self::Pbv,
        Self::PerTtm,
        Self::EpsGrowth,
        Self::EpsAnnual,
        Self::EpsTtm,
        Self::LastDividend,
        Self::DerAnnual,
        Self::DerTtm,
        Self::Roe,
    ];

    /// Column label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Price => "Price",
            Self::Pbv => "PBV (x)",
            Self::PerTtm => "PER (x)",
            Self::EpsGrowth => "EPS Growth %",
            Self::EpsAnnual => "EPS Annual",
            Self::EpsTtm => "EPS TTM",
            Self::LastDividend => "Last Div",
            Self::DerAnnual => "DER Annual",
            Self::DerTtm => "DER TTM",
            Self::Roe => "ROE %",
        }
    }

    /// Whether a higher value ranks better; `None` for unranked columns.
    #[must_use]
    pub const fn higher_is_better(self) -> Option<bool> {
        match self {
            Self::EpsGrowth | Self::Roe => Some(true),
            Self::Pbv | Self::PerTtm | Self::DerTtm => Some(false),
            _ => None,
        }
    }
}

/// One entity's line in the peer matrix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeerRow {
    /// The entity.
    pub symbol: Symbol,
    /// Price valued against.
    pub price: f64,
    /// Price / latest annual BVPS.
    pub pbv: Option<f64>,
    /// Price / TTM EPS, undefined on a TTM loss.
    pub per_ttm: Option<f64>,
    /// Compound EPS growth from the oldest to the latest period, percent.
    pub eps_growth_pct: f64,
    /// Latest annual EPS.
    pub eps_annual: Option<f64>,
    /// TTM EPS.
    pub eps_ttm: Option<f64>,
    /// Most recent dividend per share.
    pub last_dividend: Option<f64>,
    /// Latest annual DER.
    pub der_annual: Option<f64>,
    /// Latest quarterly DER, else the annual DER.
    pub der_ttm: Option<f64>,
    /// Latest annual ROE, percent.
    pub roe_pct: Option<f64>,
}

impl PeerRow {
    /// Builds the row from a finished report; `None` without annual periods.
    #[must_use]
    pub fn from_report(report: &Report) -> Option<Self> {
        let latest = report.table.latest()?;
        let price = report.current_price;
        Some(Self {
            symbol: report.profile.symbol.clone(),
            price,
            pbv: stats::positive_ratio(Some(price), latest.bvps()),
            per_ttm: report
                .comparison
                .row(ComparisonMetric::Per)
                .and_then(|r| r.ttm),
            eps_growth_pct: report.table.annual_growth_pct(Metric::Eps),
            eps_annual: Some(latest.eps),
            eps_ttm: report.comparison.eps_ttm,
            last_dividend: report.last_dividend,
            der_annual: latest.der,
            der_ttm: report.comparison.der_ttm,
            roe_pct: latest.roe_pct,
        })
    }

    /// Returns the value in `metric`'s column.
    #[must_use]
    pub const fn get(&self, metric: PeerMetric) -> Option<f64> {
        match metric {
            PeerMetric::Price => Some(self.price),
            PeerMetric::Pbv => self.pbv,
            PeerMetric::PerTtm => self.per_ttm,
            PeerMetric::EpsGrowth => Some(self.eps_growth_pct),
            PeerMetric::EpsAnnual => self.eps_annual,
            PeerMetric::EpsTtm => self.eps_ttm,
            PeerMetric::LastDividend => self.last_dividend,
            PeerMetric::DerAnnual => self.der_annual,
            PeerMetric::DerTtm => self.der_ttm,
            PeerMetric::Roe => self.roe_pct,
        }
    }
}

/// Peer rows in the order they were added.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PeerComparison {
    rows: Vec<PeerRow>,
}

impl PeerComparison {
    /// Builds rows from reports, skipping any without annual periods.
    #[must_use]
    pub fn from_reports<'a>(reports: impl IntoIterator<Item = &'a Report>) -> Self {
        Self {
            rows: reports.into_iter().filter_map(PeerRow::from_report).collect(),
        }
    }

    /// Returns the rows.
    #[must_use]
    pub fn rows(&self) -> &[PeerRow] {
        &self.rows
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The entity ranking best on a ranked column. Ties keep the earlier row.
    #[must_use]
    pub fn leader(&self, metric: PeerMetric) -> Option<&Symbol> {
        let higher = metric.higher_is_better()?;
        let mut best: Option<(&PeerRow, f64)> = None;
        for row in &self.rows {
            let Some(value) = row.get(metric).filter(|v| v.is_finite()) else {
                continue;
            };
            let better = match best {
                None => true,
                Some((_, current)) if higher => value > current,
                Some((_, current)) => value < current,
            };
            if better {
                best = Some((row, value));
            }
        }
        best.map(|(row, _)| &row.symbol)
    }

    /// Renders one line per entity with a `Symbol` column and one column per
    /// [`PeerMetric`]. Undefined values are nulls.
    pub fn to_frame(&self) -> Result<DataFrame> {
        let mut columns = Vec::with_capacity(PeerMetric::ALL.len() + 1);
        let symbols: Vec<&str> = self.rows.iter().map(|r| r.symbol.as_str()).collect();
        columns.push(Column::new("Symbol".into(), symbols));
        for metric in PeerMetric::ALL {
            let values: Vec<Option<f64>> = self.rows.iter().map(|r| r.get(metric)).collect();
            columns.push(Column::new(metric.label().into(), values));
        }
        DataFrame::new(columns).map_err(|e| DataError::Other(e.to_string()))
    }
}
