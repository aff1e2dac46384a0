//! Fixtures for tests

use crate::context::ReportingContext;
use crate::quantity::QuantityKey;
use crate::region::RegionSet;
use crate::store::{Dimension, ScenarioData};
use crate::units::UnitConversionTable;
use crate::year::YearSet;
use rstest::fixture;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// A region-only key
pub fn key(region: &str) -> QuantityKey {
    QuantityKey::region(region.into())
}

/// A key with a technology label
pub fn tec_key(region: &str, tec: &str) -> QuantityKey {
    key(region).with_technology(tec.into())
}

#[fixture]
pub fn region_set() -> RegionSet {
    RegionSet::new(["R12_AFR".into(), "R12_WEU".into()], "World".into()).unwrap()
}

#[fixture]
pub fn year_set() -> YearSet {
    YearSet::new(vec![2020, 2030, 2040], Some(2020)).unwrap()
}

#[fixture]
pub fn unit_table() -> UnitConversionTable {
    UnitConversionTable::new()
        .with("GWa", "EJ/yr", 0.03154)
        .and_then(|t| t.with("EJ/yr", "GWa", 1.0 / 0.03154))
        .and_then(|t| t.with("Mt C", "Mt CO2/yr", 44.0 / 12.0))
        .and_then(|t| t.with("Mt C/yr", "Mt CO2/yr", 44.0 / 12.0))
        .and_then(|t| t.with("US$2005/tC", "US$2010/t CO2", 1.10774 * 12.0 / 44.0))
        .and_then(|t| t.with("US$2005/kWa", "US$2010/GJ", 1.10774 / 31.536))
        .unwrap()
}

/// A context with the fixture regions and units but custom years
pub fn context_with_years(years: Vec<u32>, first_model_year: u32) -> ReportingContext {
    ReportingContext::new(
        "MESSAGEix-GLOBIOM",
        "baseline",
        region_set(),
        YearSet::new(years, Some(first_model_year)).unwrap(),
        unit_table(),
    )
}

#[fixture]
pub fn context(
    region_set: RegionSet,
    year_set: YearSet,
    unit_table: UnitConversionTable,
) -> ReportingContext {
    ReportingContext::new(
        "MESSAGEix-GLOBIOM",
        "baseline",
        region_set,
        year_set,
        unit_table,
    )
}

/// Add an activity row (mode M1, whole year) to a store
pub fn add_act(data: &mut ScenarioData, region: &str, tec: &str, year: &str, value: f64) {
    data.add_var_row(
        "ACT",
        &[
            (Dimension::NodeLoc, region),
            (Dimension::Technology, tec),
            (Dimension::YearVtg, year),
            (Dimension::YearAct, year),
            (Dimension::Mode, "M1"),
            (Dimension::Time, "year"),
        ],
        value,
        0.0,
    )
    .unwrap();
}

/// Add a per-activity coefficient row (output, input or emission factor) to a store.
///
/// `extra` holds the item's dimensions after the mode, in order.
#[allow(clippy::too_many_arguments)]
pub fn add_coefficient(
    data: &mut ScenarioData,
    item: &str,
    region: &str,
    tec: &str,
    year: &str,
    extra: &[(Dimension, &str)],
    value: f64,
    unit: &str,
) {
    let mut keys = vec![
        (Dimension::NodeLoc, region),
        (Dimension::Technology, tec),
        (Dimension::YearVtg, year),
        (Dimension::YearAct, year),
        (Dimension::Mode, "M1"),
    ];
    keys.extend_from_slice(extra);
    data.add_par_row(item, &keys, value, unit).unwrap();
}
