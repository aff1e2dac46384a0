//! Installed electricity generation capacity and capacity additions.
use super::energy::{BIO_PPL, COAL_PPL, GAS_PPL, NUC_PPL, SOLAR_PPL, WIND_PPL};
use crate::formula::{FormulaDescriptor, FormulaEnv, FormulaOutputs, OutputVariable};
use crate::quantity::Grouping;
use anyhow::Result;
use indexmap::IndexMap;

const FUELS: [(&str, &[&str]); 6] = [
    ("Coal", &COAL_PPL),
    ("Gas", &GAS_PPL),
    ("Biomass", &BIO_PPL),
    ("Nuclear", &NUC_PPL),
    ("Solar", &SOLAR_PPL),
    ("Wind", &WIND_PPL),
];

/// Installed capacity and new capacity of power plants by fuel
pub fn capacity() -> FormulaDescriptor {
    let outputs: Vec<String> = FUELS
        .iter()
        .flat_map(|(fuel, _)| {
            [
                format!("Capacity|Electricity|{fuel}"),
                format!("Capacity Additions|Electricity|{fuel}"),
            ]
        })
        .collect();
    let outputs: Vec<&str> = outputs.iter().map(String::as_str).collect();

    FormulaDescriptor::new("capacity", retr_capacity)
        .unit("units_capacity", "GW")
        .outputs(&outputs)
}

fn retr_capacity(env: &FormulaEnv) -> Result<FormulaOutputs> {
    let units = env.unit("units_capacity")?;
    let pp = env.pp();

    let mut outputs = IndexMap::new();
    for (fuel, technologies) in FUELS {
        let installed = pp.cap(technologies, units, Grouping::Region)?;
        let additions = pp.cap_new(technologies, units, Grouping::Region)?;
        outputs.insert(
            format!("Capacity|Electricity|{fuel}"),
            OutputVariable::sum(installed),
        );
        outputs.insert(
            format!("Capacity Additions|Electricity|{fuel}"),
            OutputVariable::sum(additions),
        );
    }

    Ok(outputs)
}
