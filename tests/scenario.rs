//! Integration tests reporting the demo scenario through the library interface.
use float_cmp::assert_approx_eq;
use itertools::Itertools;
use message_report::output::IamcTable;
use message_report::report::{load_scenario, run_report};
use message_report::tables::default_registry;
use std::path::Path;

/// Report the demo scenario
fn report() -> IamcTable {
    let (store, ctx) = load_scenario(Path::new("demos/two_region")).unwrap();
    let output = run_report(ctx, &store, &default_registry().unwrap()).unwrap();
    assert!(
        output.warnings.is_empty(),
        "Unexpected warnings: {:?}",
        output.warnings
    );

    output.table
}

#[test]
fn test_table_shape() {
    let table = report();
    assert_eq!(table.years(), [2020, 2030]);

    // Every variable is reported for the region and the global region
    let regions = table
        .rows()
        .iter()
        .map(|row| row.region.as_str())
        .unique()
        .collect_vec();
    assert_eq!(regions, ["A", "World"]);

    // No duplicate rows
    assert!(
        table
            .rows()
            .iter()
            .map(|row| (&row.model, &row.scenario, &row.region, &row.variable, &row.unit))
            .all_unique()
    );
}

#[test]
fn test_primary_energy_coal() {
    let table = report();
    for region in ["A", "World"] {
        assert_approx_eq!(
            f64,
            table.get(region, "Primary Energy|Coal", 2020).unwrap(),
            3.154,
            epsilon = 1e-9
        );

        // No source data for 2030
        assert_eq!(table.get(region, "Primary Energy|Coal", 2030), Some(0.0));
    }
}

#[test]
fn test_carbon_price_replicated() {
    let table = report();
    for region in ["A", "World"] {
        assert_eq!(table.get(region, "Price|Carbon", 2020), Some(50.0));
        assert_eq!(table.get(region, "Price|Carbon", 2030), Some(80.0));
    }
}

#[test]
fn test_emissions() {
    let table = report();
    let co2 = 50.0 * 44.0 / 12.0;
    for variable in [
        "Emissions|CO2",
        "Emissions|CO2|Energy",
        "Emissions|CO2|Energy|Supply|Electricity",
    ] {
        assert_approx_eq!(
            f64,
            table.get("World", variable, 2020).unwrap(),
            co2,
            epsilon = 1e-9
        );
    }
    assert_eq!(
        table.get("A", "Emissions|CO2|Energy|Demand|Industry", 2020),
        Some(0.0)
    );

    assert_eq!(
        table.get("A", "Emissions|HFC|Refrigeration", 2020),
        Some(5.0)
    );
    assert_eq!(table.get("A", "Emissions|HFC", 2030), Some(0.0));
}
