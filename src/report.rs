//! The reporting pipeline: retrieve, derive, aggregate and assemble the IAMC table for one scenario.
use crate::context::ReportingContext;
use crate::formula::FormulaRegistry;
use crate::output::{IamcTable, make_outputdf};
use crate::retrieve::Retriever;
use crate::store::{ScenarioData, ScenarioStore};
use crate::warning::ReportWarning;
use anyhow::{Context, Result, ensure};
use itertools::Itertools;
use log::{info, warn};
use std::path::Path;

/// The result of reporting a scenario
#[derive(Debug)]
pub struct ReportOutput {
    /// The model name
    pub model: String,
    /// The scenario name
    pub scenario: String,
    /// The assembled IAMC table
    pub table: IamcTable,
    /// The warnings recorded while reporting
    pub warnings: Vec<ReportWarning>,
}

/// Load the scenario data and reporting context from a scenario directory
pub fn load_scenario(scenario_dir: &Path) -> Result<(ScenarioData, ReportingContext)> {
    ensure!(
        scenario_dir.is_dir(),
        "{} is not a directory",
        scenario_dir.display()
    );

    let store = ScenarioData::from_path(scenario_dir)?;
    let ctx = ReportingContext::load(scenario_dir, &store)?;

    Ok((store, ctx))
}

/// Check that a registry can be run against a context.
///
/// Every formula dependency must be registered, there must be no dependency cycles and every unit
/// argument overridden in the configuration must be declared by some formula.
pub fn check_registry(ctx: &ReportingContext, registry: &FormulaRegistry) -> Result<()> {
    registry.execution_order()?;

    let declared = registry
        .iter()
        .flat_map(|formula| formula.units.keys().map(String::as_str))
        .collect_vec();
    for name in ctx.unit_arg_names() {
        ensure!(
            declared.contains(&name),
            "Unknown unit argument in report configuration: {name}"
        );
    }

    Ok(())
}

/// Produce the IAMC table for a scenario.
///
/// The context is consumed: its warnings are returned alongside the table. Any error aborts the
/// whole report.
pub fn run_report(
    ctx: ReportingContext,
    store: &dyn ScenarioStore,
    registry: &FormulaRegistry,
) -> Result<ReportOutput> {
    check_registry(&ctx, registry)?;

    let retriever = Retriever::new(&ctx, store);
    let results = registry.run(&retriever)?;
    let table = make_outputdf(
        &ctx,
        results.values().flat_map(|outputs| {
            outputs
                .iter()
                .map(|(variable, output)| (variable.as_str(), output))
        }),
    )
    .context("Failed to assemble IAMC table")?;
    info!(
        "Assembled IAMC table with {} rows for {}/{}",
        table.len(),
        ctx.model(),
        ctx.scenario()
    );

    let model = ctx.model().to_string();
    let scenario = ctx.scenario().to_string();
    let warnings = ctx.into_warnings();
    if !warnings.is_empty() {
        warn!("{} warnings recorded while reporting", warnings.len());
    }

    Ok(ReportOutput {
        model,
        scenario,
        table,
        warnings,
    })
}
