//! Carbon and energy prices.
use crate::aggregate::Reduction;
use crate::formula::{FormulaDescriptor, FormulaEnv, FormulaOutputs, OutputVariable};
use anyhow::Result;
use indexmap::indexmap;

/// Prices of carbon, electricity and oil.
///
/// The global carbon price is the highest regional price. The global electricity price is the
/// average of regional prices weighted by electricity generation.
pub fn prices() -> FormulaDescriptor {
    FormulaDescriptor::new("prices", retr_prices)
        .unit("units_price_carbon", "US$2010/t CO2")
        .unit("units_price_energy", "US$2010/GJ")
        .outputs(&[
            "Price|Carbon",
            "Price|Secondary Energy|Electricity",
            "Price|Primary Energy|Oil",
        ])
        .depends_on(&["se_elec"])
}

fn retr_prices(env: &FormulaEnv) -> Result<FormulaOutputs> {
    let units_carbon = env.unit("units_price_carbon")?;
    let units_energy = env.unit("units_price_energy")?;
    let pp = env.pp();

    let carbon = pp.carbon_price(units_carbon)?;
    let electricity = pp.price_commodity(&["electr"], "secondary", units_energy)?;
    let oil = pp.price_commodity(&["crude"], "primary", units_energy)?;
    let generation = env.output("se_elec", "Secondary Energy|Electricity")?;

    Ok(indexmap! {
        "Price|Carbon".into() => OutputVariable::new(carbon, Reduction::Max),
        "Price|Secondary Energy|Electricity".into() => OutputVariable::new(
            electricity.sum_by_region(),
            Reduction::WeightedAvg(generation.clone()),
        ),
        "Price|Primary Energy|Oil".into() => OutputVariable::new(
            oil.sum_by_region(),
            Reduction::Mean,
        ),
    })
}
