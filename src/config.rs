//! Defines the `ReportConfig` struct, which represents the contents of `report.toml`.
use crate::input::{input_err_msg, is_sorted_and_unique, read_toml};
use crate::region::DEFAULT_GLOBAL_REGION;
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const REPORT_CONFIG_FILE_NAME: &str = "report.toml";

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_param_default!(default_global_region, String, DEFAULT_GLOBAL_REGION.to_string());
define_param_default!(default_years, String, "all".to_string());
define_param_default!(default_fil_dir, PathBuf, PathBuf::from("fil_files"));

/// Represents the contents of the report configuration file.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    /// The model name written to the IAMC table
    pub model: String,
    /// The scenario name written to the IAMC table
    pub scenario: String,
    /// The regions to report, in order.
    ///
    /// Defaults to the scenario's `node` set, excluding the global region.
    #[serde(default)]
    pub regions: Option<Vec<String>>,
    /// The name of the global aggregate region
    #[serde(default = "default_global_region")]
    pub global_region: String,
    /// The years to report: "all" or a semicolon-separated list of years in the scenario
    #[serde(default = "default_years")]
    pub years: String,
    /// The first year of the optimisation horizon. Defaults to the first reported year.
    #[serde(default)]
    pub first_model_year: Option<u32>,
    /// Overrides for the unit arguments of reporting tables
    #[serde(default)]
    pub units: IndexMap<String, String>,
    /// Folder containing fil files, relative to the scenario directory
    #[serde(default = "default_fil_dir")]
    pub fil_dir: PathBuf,
}

/// Check that the `regions` parameter is valid, if provided
fn check_regions(regions: Option<&[String]>, global_region: &str) -> Result<()> {
    let Some(regions) = regions else {
        return Ok(());
    };

    ensure!(!regions.is_empty(), "`regions` is empty");
    ensure!(
        !regions.iter().any(|r| r == global_region),
        "`regions` cannot include the global region ({global_region})"
    );

    let mut sorted = regions.to_vec();
    sorted.sort();
    ensure!(
        is_sorted_and_unique(&sorted),
        "`regions` must be composed of unique values"
    );

    Ok(())
}

/// Check that the model and scenario names are valid
fn check_names(model: &str, scenario: &str) -> Result<()> {
    ensure!(!model.trim().is_empty(), "`model` cannot be empty");
    ensure!(!scenario.trim().is_empty(), "`scenario` cannot be empty");

    Ok(())
}

impl ReportConfig {
    /// Read a report configuration file from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `scenario_dir` - Folder containing the scenario files
    ///
    /// # Returns
    ///
    /// The file contents as a [`ReportConfig`] struct or an error if the file is invalid
    pub fn from_path<P: AsRef<Path>>(scenario_dir: P) -> Result<ReportConfig> {
        let file_path = scenario_dir.as_ref().join(REPORT_CONFIG_FILE_NAME);
        let config: ReportConfig = read_toml(&file_path)?;

        config
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(config)
    }

    /// Validate parameters after reading in file
    fn validate(&self) -> Result<()> {
        check_names(&self.model, &self.scenario)?;
        check_regions(self.regions.as_deref(), &self.global_region)?;

        Ok(())
    }
}
