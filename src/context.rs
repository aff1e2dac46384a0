//! The reporting context: everything a reporting run needs to know about the current scenario.
//!
//! A context is constructed once per scenario, is read-only afterwards (apart from its append-only
//! warning log) and is discarded when the scenario has been reported.
use crate::config::ReportConfig;
use crate::input::input_err_msg;
use crate::region::{RegionID, RegionSet};
use crate::store::ScenarioStore;
use crate::units::UnitConversionTable;
use crate::warning::{ReportWarning, WarningLog};
use crate::year::{YearSet, parse_year_str};
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use itertools::Itertools;
use log::info;
use std::path::{Path, PathBuf};

/// The state shared by every formula and utility during one reporting run
#[derive(Debug)]
pub struct ReportingContext {
    model: String,
    scenario: String,
    regions: RegionSet,
    years: YearSet,
    units: UnitConversionTable,
    unit_args: IndexMap<String, String>,
    fil_dir: PathBuf,
    warnings: WarningLog,
}

impl ReportingContext {
    /// Create a new context
    pub fn new(
        model: &str,
        scenario: &str,
        regions: RegionSet,
        years: YearSet,
        units: UnitConversionTable,
    ) -> Self {
        Self {
            model: model.to_string(),
            scenario: scenario.to_string(),
            regions,
            years,
            units,
            unit_args: IndexMap::new(),
            fil_dir: PathBuf::from("fil_files"),
            warnings: WarningLog::new(),
        }
    }

    /// Set the folder from which fil files are read
    pub fn with_fil_dir(mut self, fil_dir: PathBuf) -> Self {
        self.fil_dir = fil_dir;
        self
    }

    /// Set overrides for the unit arguments of reporting tables
    pub fn with_unit_args(mut self, unit_args: IndexMap<String, String>) -> Self {
        self.unit_args = unit_args;
        self
    }

    /// Load the context for the scenario in `scenario_dir`.
    ///
    /// Regions default to the scenario's `node` set and years are taken from its `year` set.
    pub fn load(scenario_dir: &Path, store: &dyn ScenarioStore) -> Result<Self> {
        let config = ReportConfig::from_path(scenario_dir)?;
        let units = UnitConversionTable::from_path(scenario_dir)?;

        let regions = build_region_set(&config, store)
            .with_context(|| input_err_msg(scenario_dir.join("report.toml")))?;
        let years = build_year_set(&config, store)
            .with_context(|| input_err_msg(scenario_dir.join("report.toml")))?;

        info!(
            "Reporting {}/{}: {} regions, years {}",
            config.model,
            config.scenario,
            regions.len(),
            years.iter().join(", ")
        );

        Ok(Self::new(&config.model, &config.scenario, regions, years, units)
            .with_fil_dir(scenario_dir.join(&config.fil_dir))
            .with_unit_args(config.units))
    }

    /// The model name
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The scenario name
    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    /// The region set
    pub fn regions(&self) -> &RegionSet {
        &self.regions
    }

    /// The global region
    pub fn global_region(&self) -> &RegionID {
        self.regions.global()
    }

    /// The year set
    pub fn years(&self) -> &YearSet {
        &self.years
    }

    /// The unit conversion table
    pub fn units(&self) -> &UnitConversionTable {
        &self.units
    }

    /// The configured override for a unit argument, if any
    pub fn unit_arg(&self, name: &str) -> Option<&str> {
        self.unit_args.get(name).map(String::as_str)
    }

    /// The names of the unit arguments with configured overrides
    pub fn unit_arg_names(&self) -> impl Iterator<Item = &str> {
        self.unit_args.keys().map(String::as_str)
    }

    /// The folder from which fil files are read
    pub fn fil_dir(&self) -> &Path {
        &self.fil_dir
    }

    /// Record a warning
    pub fn warn(&self, warning: ReportWarning) {
        self.warnings.push(warning);
    }

    /// The warnings recorded so far
    pub fn warnings(&self) -> Vec<ReportWarning> {
        self.warnings.to_vec()
    }

    /// Discard the context, returning the warnings recorded during the run
    pub fn into_warnings(self) -> Vec<ReportWarning> {
        self.warnings.into_inner()
    }
}

fn build_region_set(config: &ReportConfig, store: &dyn ScenarioStore) -> Result<RegionSet> {
    let global: RegionID = config.global_region.as_str().into();
    let regions: Vec<RegionID> = match &config.regions {
        Some(regions) => regions.iter().map(|r| r.as_str().into()).collect(),
        None => store
            .set("node")?
            .iter()
            .filter(|node| **node != config.global_region)
            .map(|node| node.as_str().into())
            .collect(),
    };

    RegionSet::new(regions, global)
}

fn build_year_set(config: &ReportConfig, store: &dyn ScenarioStore) -> Result<YearSet> {
    let mut scenario_years: Vec<u32> = store
        .set("year")?
        .iter()
        .map(|y| y.parse().with_context(|| format!("Invalid year in set: {y}")))
        .try_collect()?;
    scenario_years.sort_unstable();
    scenario_years.dedup();
    ensure!(!scenario_years.is_empty(), "Scenario has no years");

    let years = parse_year_str(&config.years, scenario_years.iter().copied())?;
    YearSet::new(years, config.first_model_year)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use crate::store::ScenarioData;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_files(dir: &Path, config: &str) {
        let mut file = File::create(dir.join("report.toml")).unwrap();
        writeln!(file, "{config}").unwrap();
        let mut file = File::create(dir.join("unit_conversion.csv")).unwrap();
        writeln!(file, "from,to,factor\nGWa,EJ/yr,0.03154").unwrap();
    }

    fn store() -> ScenarioData {
        let mut store = ScenarioData::new();
        store.add_set("node", ["World", "R12_AFR", "R12_WEU"]);
        store.add_set("year", ["2030", "2010", "2020"]);
        store
    }

    #[test]
    fn test_load() {
        let dir = tempdir().unwrap();
        write_files(
            dir.path(),
            "model = \"m\"\nscenario = \"s\"\nyears = \"2020;2030\"\nfirst_model_year = 2020",
        );

        let ctx = ReportingContext::load(dir.path(), &store()).unwrap();
        assert_eq!(ctx.model(), "m");
        assert_eq!(ctx.scenario(), "s");
        assert_eq!(
            ctx.regions().iter().map(RegionID::as_str).collect_vec(),
            ["R12_AFR", "R12_WEU"]
        );
        assert_eq!(ctx.global_region().as_str(), "World");
        assert_eq!(ctx.years().as_slice(), [2020, 2030]);
        assert_eq!(ctx.units().get("GWa", "EJ/yr"), Some(0.03154));
        assert_eq!(ctx.fil_dir(), dir.path().join("fil_files"));
    }

    #[test]
    fn test_load_all_years() {
        let dir = tempdir().unwrap();
        write_files(dir.path(), "model = \"m\"\nscenario = \"s\"\nregions = [\"R12_WEU\"]");

        let ctx = ReportingContext::load(dir.path(), &store()).unwrap();
        assert_eq!(ctx.years().as_slice(), [2010, 2020, 2030]);
        assert_eq!(ctx.years().first_model_year(), 2010);
        assert_eq!(ctx.regions().len(), 1);
    }

    #[test]
    fn test_load_no_years() {
        let dir = tempdir().unwrap();
        write_files(dir.path(), "model = \"m\"\nscenario = \"s\"");

        let mut store = ScenarioData::new();
        store.add_set("node", ["R12_AFR"]);
        let result = ReportingContext::load(dir.path(), &store);
        assert_eq!(
            result.unwrap_err().chain().nth(1).unwrap().to_string(),
            "Scenario has no years"
        );
    }

    #[test]
    fn test_load_no_regions() {
        let dir = tempdir().unwrap();
        write_files(dir.path(), "model = \"m\"\nscenario = \"s\"");
        let mut store = ScenarioData::new();
        store.add_set("node", ["World"]);
        store.add_set("year", ["2020"]);
        let config = ReportConfig::from_path(dir.path()).unwrap();
        assert_error!(build_region_set(&config, &store), "No regions provided");
    }
}
