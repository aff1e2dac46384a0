//! The module responsible for assembling the IAMC table and writing output data to disk.
use crate::aggregate::gen_glb;
use crate::context::ReportingContext;
use crate::formula::OutputVariable;
use crate::region::RegionID;
use crate::units::Unit;
use crate::warning::ReportWarning;
use anyhow::{Context, Result, bail, ensure};
use itertools::Itertools;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub mod metadata;

/// The default root folder in which scenario-specific output folders will be created
pub const OUTPUT_DIRECTORY_ROOT: &str = "message_report_results";

/// The output file name for the IAMC table
const IAMC_FILE_NAME: &str = "iamc.csv";

/// The output file name for report warnings
const WARNINGS_FILE_NAME: &str = "warnings.csv";

/// The index columns of the IAMC table, before the year columns
const INDEX_COLUMNS: [&str; 5] = ["Model", "Scenario", "Region", "Variable", "Unit"];

/// Get the output folder for the scenario in the specified directory, under `output_root`
pub fn get_output_dir(scenario_dir: &Path, output_root: &Path) -> Result<PathBuf> {
    // Get the scenario name from the dir path, checking for all possible errors
    let scenario_dir = scenario_dir
        .canonicalize() // canonicalise in case the user has specified "."
        .context("Could not resolve path to scenario")?;

    let scenario_name = scenario_dir
        .file_name()
        .context("Scenario cannot be in root folder")?
        .to_str()
        .context("Invalid chars in scenario dir name")?;

    Ok(output_root.join(scenario_name))
}

/// Create a new output directory, with parents.
///
/// A non-empty existing directory is only reused if `allow_overwrite` is set.
///
/// # Returns
///
/// Whether an existing directory with contents will be overwritten.
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    if output_dir.is_dir() {
        let is_empty = fs::read_dir(output_dir)?.next().is_none();
        if is_empty {
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. Rerun with --overwrite to overwrite it."
        );
        return Ok(true);
    }

    fs::create_dir_all(output_dir)?;

    Ok(false)
}

/// A row of the IAMC table
#[derive(Debug, Clone, PartialEq)]
pub struct IamcRow {
    /// The model name
    pub model: String,
    /// The scenario name
    pub scenario: String,
    /// The region, including the global region
    pub region: RegionID,
    /// The IAMC variable name
    pub variable: String,
    /// The unit of the values
    pub unit: Unit,
    /// One value per year of the table
    pub values: Vec<f64>,
}

impl IamcRow {
    fn index(&self) -> (&str, &str, &str, &str, &str) {
        (
            &self.model,
            &self.scenario,
            self.region.as_str(),
            &self.variable,
            self.unit.as_str(),
        )
    }
}

/// A table of IAMC timeseries: one row per (Model, Scenario, Region, Variable, Unit), one column per
/// year
#[derive(Debug, Clone, PartialEq)]
pub struct IamcTable {
    years: Vec<u32>,
    rows: Vec<IamcRow>,
}

impl IamcTable {
    /// The year columns
    pub fn years(&self) -> &[u32] {
        &self.years
    }

    /// The rows, sorted by index
    pub fn rows(&self) -> &[IamcRow] {
        &self.rows
    }

    /// The number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Look up the value for a region and variable in a given year
    pub fn get(&self, region: &str, variable: &str, year: u32) -> Option<f64> {
        let column = self.years.iter().position(|y| *y == year)?;
        self.rows
            .iter()
            .find(|row| row.region.as_str() == region && row.variable == variable)
            .map(|row| row.values[column])
    }

    /// Write the table to a CSV file
    pub fn write_csv(&self, file_path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(file_path)?;
        writer.write_record(
            INDEX_COLUMNS
                .iter()
                .map(ToString::to_string)
                .chain(self.years.iter().map(ToString::to_string)),
        )?;
        for row in &self.rows {
            let (model, scenario, region, variable, unit) = row.index();
            writer.write_record(
                [model, scenario, region, variable, unit]
                    .into_iter()
                    .map(ToString::to_string)
                    .chain(row.values.iter().map(ToString::to_string)),
            )?;
        }
        writer.flush()?;

        Ok(())
    }
}

/// Assemble the IAMC table from named output variables.
///
/// The global value of each variable is computed according to its reduction before rows are
/// labelled with the model and scenario names. Two variables with the same name are an error.
pub fn make_outputdf<'a, I>(ctx: &ReportingContext, variables: I) -> Result<IamcTable>
where
    I: IntoIterator<Item = (&'a str, &'a OutputVariable)>,
{
    let years: Vec<u32> = ctx.years().iter().collect();
    let mut rows = Vec::new();
    let mut seen = HashSet::new();
    for (variable, output) in variables {
        let quantity = gen_glb(ctx, &output.quantity, &output.reduction).sum_by_region();
        for (key, values) in quantity.iter() {
            let row = IamcRow {
                model: ctx.model().to_string(),
                scenario: ctx.scenario().to_string(),
                region: key.region.clone(),
                variable: variable.to_string(),
                unit: quantity.unit().clone(),
                values: years
                    .iter()
                    .map(|year| values.get(year).copied().unwrap_or(0.0))
                    .collect(),
            };
            if !seen.insert((row.region.clone(), row.variable.clone(), row.unit.clone())) {
                bail!(
                    "Duplicate output row for variable {variable} in region {} ({})",
                    row.region,
                    row.unit
                );
            }
            rows.push(row);
        }
    }

    rows.sort_by(|a, b| a.index().cmp(&b.index()));

    Ok(IamcTable { years, rows })
}

/// Represents a row in the warnings CSV file
#[derive(Serialize, Debug, PartialEq)]
struct WarningRow<'a> {
    kind: &'a str,
    message: String,
}

/// Write report warnings to a CSV file.
///
/// The header is written even if there are no warnings.
pub fn write_warnings(file_path: &Path, warnings: &[ReportWarning]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(file_path)?;
    writer.write_record(["kind", "message"])?;
    for warning in warnings {
        writer.serialize(WarningRow {
            kind: warning.kind(),
            message: warning.to_string(),
        })?;
    }
    writer.flush()?;

    Ok(())
}

/// Write the IAMC table and warnings of a report to the output folder
pub fn write_report(
    output_path: &Path,
    table: &IamcTable,
    warnings: &[ReportWarning],
) -> Result<()> {
    table.write_csv(&output_path.join(IAMC_FILE_NAME))?;
    write_warnings(&output_path.join(WARNINGS_FILE_NAME), warnings)?;

    Ok(())
}

/// The IAMC variables in a table, in order
pub fn variables(table: &IamcTable) -> Vec<&str> {
    table
        .rows
        .iter()
        .map(|row| row.variable.as_str())
        .unique()
        .collect()
}
