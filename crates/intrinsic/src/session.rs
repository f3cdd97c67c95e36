//! Per-entity analysis session with DSIV calibration.

use intrinsic_core::{DataError, Result, Symbol};
use intrinsic_engine::{
    CalibrationState, DsivAssumptions, DsivCalibration, Report, ValuationAssumptions,
};
use tracing::{debug, instrument};

use crate::analyzer::Analyzer;

/// Holds the latest report and the DSIV calibration for the entity in view.
///
/// A submitted DSIV override survives reruns of the same entity. Analyzing a
/// different entity drops it and returns to the automatic derivation.
#[derive(Debug)]
pub struct Session {
    analyzer: Analyzer,
    assumptions: ValuationAssumptions,
    calibration: DsivCalibration,
    report: Option<Report>,
}

impl Session {
    /// Creates a session with default valuation assumptions.
    #[must_use]
    pub fn new(analyzer: Analyzer) -> Self {
        Self {
            analyzer,
            assumptions: ValuationAssumptions::default(),
            calibration: DsivCalibration::new(),
            report: None,
        }
    }

    /// Analyzes `symbol`, keeping any override if it is the entity already in view.
    ///
    /// On failure the previous report is kept.
    #[instrument(skip(self), fields(symbol = %symbol))]
    pub async fn analyze(&mut self, symbol: &Symbol) -> Result<&Report> {
        let mut report = self.analyzer.analyze(symbol, &self.assumptions).await?;
        let (assumptions, state) = self.calibration.observe(symbol, report.auto_dsiv);
        if state == CalibrationState::Overridden {
            debug!(?assumptions, "Keeping DSIV override");
            report.apply_calibration(assumptions, state);
        }
        Ok(self.report.insert(report))
    }

    /// Reruns the analysis of the entity in view.
    pub async fn refresh(&mut self) -> Result<&Report> {
        let symbol = self.current_symbol()?;
        self.analyze(&symbol).await
    }

    /// Replaces the valuation assumptions used by later runs.
    pub fn set_assumptions(&mut self, assumptions: ValuationAssumptions) -> Result<()> {
        assumptions.validate()?;
        self.assumptions = assumptions;
        Ok(())
    }

    /// Submits a DSIV override for the entity in view and re-projects.
    pub fn calibrate(&mut self, assumptions: DsivAssumptions) -> Result<&Report> {
        let symbol = self.current_symbol()?;
        self.calibration.submit(&symbol, assumptions)?;
        let Some(report) = self.report.as_mut() else {
            return Err(no_entity());
        };
        report.apply_calibration(assumptions, CalibrationState::Overridden);
        Ok(report)
    }

    /// Drops any override and re-projects with the automatic assumptions.
    pub fn reset_calibration(&mut self) -> Option<&Report> {
        self.calibration.reset();
        let report = self.report.as_mut()?;
        let (assumptions, state) = self
            .calibration
            .observe(&report.profile.symbol, report.auto_dsiv);
        report.apply_calibration(assumptions, state);
        Some(report)
    }

    /// Returns the latest report.
    #[must_use]
    pub const fn report(&self) -> Option<&Report> {
        self.report.as_ref()
    }

    /// Returns the valuation assumptions in use.
    #[must_use]
    pub const fn assumptions(&self) -> &ValuationAssumptions {
        &self.assumptions
    }

    /// Returns the calibration state.
    #[must_use]
    pub const fn calibration_state(&self) -> CalibrationState {
        self.calibration.state()
    }

    fn current_symbol(&self) -> Result<Symbol> {
        self.report
            .as_ref()
            .map(|r| r.profile.symbol.clone())
            .ok_or_else(no_entity)
    }
}

fn no_entity() -> DataError {
    DataError::InvalidParameter("no entity has been analyzed".to_string())
}
