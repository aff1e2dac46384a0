//! The default reporting tables.
//!
//! Each table is a formula producing a group of related IAMC variables.
use crate::context::ReportingContext;
use crate::formula::{FormulaRegistry, OutputVariable};
use crate::quantity::Quantity;
use crate::warning::ReportWarning;
use anyhow::Result;
use indexmap::IndexSet;
use itertools::Itertools;

pub mod capacity;
pub mod emissions;
pub mod energy;
pub mod prices;

/// Build the registry of default tables
pub fn default_registry() -> Result<FormulaRegistry> {
    let mut registry = FormulaRegistry::new();
    for formula in [
        energy::pe(),
        energy::se_elec(),
        energy::fe(),
        capacity::capacity(),
        prices::prices(),
        emissions::co2(),
        emissions::hfc(),
    ] {
        registry.register(formula)?;
    }

    Ok(registry)
}

/// The sum of named quantities, as an output variable aggregated by sum.
///
/// Parts not in `unit` (because a conversion was missing) are still summed, but the total is
/// flagged with a [`ReportWarning::MixedUnits`].
fn total<'a, I>(ctx: &ReportingContext, variable: &str, unit: &str, parts: I) -> OutputVariable
where
    I: IntoIterator<Item = &'a Quantity>,
{
    let parts = parts.into_iter().collect_vec();
    let units: IndexSet<&str> = parts.iter().map(|q| q.unit().as_str()).collect();
    if units.iter().any(|u| *u != unit) {
        ctx.warn(ReportWarning::MixedUnits {
            item: variable.to_string(),
            units: units.iter().join(", "),
            assumed: unit.to_string(),
        });
    }

    OutputVariable::sum(Quantity::sum(unit, parts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{context, key};
    use rstest::rstest;

    #[rstest]
    fn test_total_same_unit(context: ReportingContext) {
        let a = Quantity::from_cells("EJ/yr", [(key("R12_AFR"), 2020, 1.0)]);
        let b = Quantity::from_cells("EJ/yr", [(key("R12_AFR"), 2020, 2.0)]);
        let out = total(&context, "Final Energy", "EJ/yr", [&a, &b]);
        assert_eq!(out.quantity.get(&key("R12_AFR"), 2020), Some(3.0));
        assert!(context.warnings().is_empty());
    }

    #[rstest]
    fn test_total_mixed_units(context: ReportingContext) {
        let a = Quantity::from_cells("EJ/yr", [(key("R12_AFR"), 2020, 1.0)]);
        let b = Quantity::from_cells("TWh/yr", [(key("R12_AFR"), 2020, 2.0)]);
        let out = total(&context, "Final Energy", "EJ/yr", [&a, &b]);
        assert_eq!(out.quantity.unit().as_str(), "EJ/yr");
        assert_eq!(
            context.warnings(),
            [ReportWarning::MixedUnits {
                item: "Final Energy".into(),
                units: "EJ/yr, TWh/yr".into(),
                assumed: "EJ/yr".into(),
            }]
        );
    }

    #[test]
    fn test_default_registry() {
        let registry = default_registry().unwrap();
        assert_eq!(registry.len(), 7);

        // Tables reading other tables' outputs run after them
        let order: Vec<_> = registry
            .execution_order()
            .unwrap()
            .into_iter()
            .map(|f| f.name.as_str())
            .collect();
        let position = |name: &str| order.iter().position(|n| *n == name).unwrap();
        assert!(position("se_elec") < position("prices"));
        assert_eq!(position("pe"), 0);
    }
}
