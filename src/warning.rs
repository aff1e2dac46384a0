//! Non-fatal conditions recorded during a reporting run.
//!
//! These are logged as they happen and also collected so that callers (and tests) can query them
//! once the run is complete.
use derive_more::Display;
use log::{debug, warn};
use std::cell::RefCell;
use strum::IntoStaticStr;

/// A recoverable problem encountered while producing a report
#[derive(Debug, Clone, PartialEq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ReportWarning {
    /// No factor is registered for a requested unit conversion, so values were left unconverted
    #[display("No conversion factor from {from} to {to} for {item}; values left unconverted")]
    MissingUnitConversion {
        /// The item being converted
        item: String,
        /// The source unit
        from: String,
        /// The requested unit
        to: String,
    },
    /// A single-unit table carried several units and was re-aggregated under a default unit
    #[display("{item} has multiple units ({units}); treating all values as {assumed}")]
    MixedUnits {
        /// The item retrieved
        item: String,
        /// The units found, separated by commas
        units: String,
        /// The unit the values were forced to
        assumed: String,
    },
    /// A residual could not be allocated because all components were zero
    #[display(
        "Residual of {residual} for {species} in {region}/{year} not allocated: all components are zero"
    )]
    ResidualDropped {
        /// The reconciled species
        species: String,
        /// Region of the cell
        region: String,
        /// Year of the cell
        year: u32,
        /// The unallocated residual
        residual: f64,
    },
}

impl ReportWarning {
    /// A short name for the kind of warning
    pub fn kind(&self) -> &'static str {
        self.into()
    }
}

/// Append-only collection of [`ReportWarning`]s for one reporting run
#[derive(Debug, Default)]
pub struct WarningLog(RefCell<Vec<ReportWarning>>);

impl WarningLog {
    /// Create a new, empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning, also passing it to the program logger
    pub fn push(&self, warning: ReportWarning) {
        match warning {
            // Dropped residuals are expected in degenerate cells, so don't make a fuss about them
            ReportWarning::ResidualDropped { .. } => debug!("{warning}"),
            _ => warn!("{warning}"),
        }

        self.0.borrow_mut().push(warning);
    }

    /// A snapshot of the warnings recorded so far
    pub fn to_vec(&self) -> Vec<ReportWarning> {
        self.0.borrow().clone()
    }

    /// The number of warnings recorded so far
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Whether no warnings have been recorded
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Consume the log, returning the recorded warnings
    pub fn into_inner(self) -> Vec<ReportWarning> {
        self.0.into_inner()
    }
}
