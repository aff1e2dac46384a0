//! CO2 and HFC emissions.
use super::energy::{INDUSTRY, RES_COM, TRANSPORT};
use crate::formula::{FormulaDescriptor, FormulaEnv, FormulaOutputs, OutputVariable};
use crate::quantity::{Grouping, Quantity};
use crate::reconcile::Reconciliation;
use anyhow::Result;
use indexmap::{IndexMap, indexmap};
use log::debug;

/// The relation holding total CO2 emissions from the energy system
const CO2_RELATION: &str = "CO2_Emission";

/// Power plants emitting CO2, including those with capture
const POWER: [&str; 10] = [
    "coal_ppl",
    "coal_adv",
    "coal_adv_ccs",
    "igcc",
    "igcc_ccs",
    "gas_cc",
    "gas_cc_ccs",
    "gas_ct",
    "foil_ppl",
    "bio_istig_ccs",
];

/// Technologies whose emission factors include captured carbon
const CCS: [&str; 4] = ["coal_adv_ccs", "igcc_ccs", "gas_cc_ccs", "bio_istig_ccs"];

/// International shipping and aviation fuels, reported but not reconciled
const BUNKERS: [&str; 3] = ["foil_bunker", "loil_bunker", "LNG_bunker"];

/// CO2 emissions by sector, reconciled with the CO2 accounting relation
pub fn co2() -> FormulaDescriptor {
    FormulaDescriptor::new("co2", retr_co2)
        .unit("units_emissions", "Mt CO2/yr")
        .outputs(&[
            "Emissions|CO2",
            "Emissions|CO2|Energy",
            "Emissions|CO2|Energy|Supply|Electricity",
            "Emissions|CO2|Energy|Demand|Industry",
            "Emissions|CO2|Energy|Demand|Residential and Commercial",
            "Emissions|CO2|Energy|Demand|Transportation",
            "Emissions|CO2|Energy|Demand|Bunkers",
            "Carbon Sequestration|CCS",
        ])
}

fn retr_co2(env: &FormulaEnv) -> Result<FormulaOutputs> {
    let units = env.unit("units_emissions")?;
    let pp = env.pp();
    let emissions = |technologies: &[&str]| pp.emi(technologies, "CO2", units, Grouping::Region);

    let top_down = pp.rel(&[], CO2_RELATION, units, Grouping::Region)?;
    let power = emissions(&POWER)?;
    let industry = emissions(&INDUSTRY)?;
    let res_com = emissions(&RES_COM)?;
    let transport = emissions(&TRANSPORT)?;
    let bunkers = emissions(&BUNKERS)?;
    let historical = pp.hist_emission("CO2", "all", units)?;

    // Captured carbon appears as negative emission factors, masked per technology
    let sequestration = pp
        .emi(&CCS, "CO2", units, Grouping::Technology)?
        .keep_negative()
        .abs()
        .sum_by_region();

    let reconciled = Reconciliation::new("CO2", top_down)
        .with_component("Emissions|CO2|Energy|Supply|Electricity", power)
        .with_component("Emissions|CO2|Energy|Demand|Industry", industry)
        .with_component(
            "Emissions|CO2|Energy|Demand|Residential and Commercial",
            res_com,
        )
        .with_component("Emissions|CO2|Energy|Demand|Transportation", transport)
        .with_excluded("Emissions|CO2|Energy|Demand|Bunkers", bunkers)
        .with_historical_adjustment(historical)
        .allocate(env.ctx())?;
    debug!(
        "CO2 reconciliation dropped residuals in {} cells",
        reconciled.dropped_cells.len()
    );

    let energy = Quantity::sum(units, reconciled.components.values());
    let total = Quantity::sum(
        units,
        [&energy].into_iter().chain(reconciled.excluded.values()),
    );

    let mut outputs: FormulaOutputs = IndexMap::new();
    outputs.insert("Emissions|CO2".into(), OutputVariable::sum(total));
    outputs.insert("Emissions|CO2|Energy".into(), OutputVariable::sum(energy));
    for (name, quantity) in reconciled
        .components
        .into_iter()
        .chain(reconciled.excluded)
    {
        outputs.insert(name, OutputVariable::sum(quantity));
    }
    outputs.insert(
        "Carbon Sequestration|CCS".into(),
        OutputVariable::sum(sequestration),
    );

    Ok(outputs)
}

/// HFC emission sources: the useful energy demand driving them and the fil factor scaling it
const HFC_SOURCES: [(&str, &str, &str); 2] = [
    ("Emissions|HFC|Refrigeration", "rc_spec", "HFC_rc"),
    ("Emissions|HFC|Foam", "i_spec", "HFC_foam"),
];

/// HFC emissions, scaled from specific electricity demand by regional fil factors
pub fn hfc() -> FormulaDescriptor {
    FormulaDescriptor::new("hfc", retr_hfc)
        .unit("units_hfc", "kt HFC134a-equiv/yr")
        .outputs(&[
            "Emissions|HFC",
            "Emissions|HFC|Refrigeration",
            "Emissions|HFC|Foam",
        ])
}

fn retr_hfc(env: &FormulaEnv) -> Result<FormulaOutputs> {
    let units = env.unit("units_hfc")?;
    let pp = env.pp();

    let mut sources = IndexMap::new();
    for (variable, commodity, factor) in HFC_SOURCES {
        let demand = pp.demand(&[commodity], "useful", "GWa")?;
        let emissions = pp.fil_factor(factor)?.mul(&demand).with_unit(units);
        sources.insert(variable.to_string(), emissions);
    }

    let total = Quantity::sum(units, sources.values());
    let mut outputs = indexmap! {"Emissions|HFC".to_string() => OutputVariable::sum(total)};
    outputs.extend(
        sources
            .into_iter()
            .map(|(name, quantity)| (name, OutputVariable::sum(quantity))),
    );

    Ok(outputs)
}
