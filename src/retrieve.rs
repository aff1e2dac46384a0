//! Retrieval adapters: fetch named parameters and variables from the scenario store as normalised
//! [`Quantity`]s.
//!
//! Every adapter returns a quantity with a row for each configured region and a value for each
//! configured year, in the requested unit. If the store holds no matching data, the result is all
//! zeros. Filters which cannot apply to the queried item are reported as errors.
use crate::context::ReportingContext;
use crate::fil::read_fil_factor;
use crate::normalise::{RegionFill, YearFill, normalise};
use crate::quantity::{Grouping, Quantity, QuantityKey, TechnologyID};
use crate::store::{Dimension, QueryFilter, ScenarioStore, StoreRow, VarField};
use crate::units::Unit;
use crate::warning::ReportWarning;
use anyhow::{Context, Result, bail};
use indexmap::IndexSet;
use itertools::Itertools;
use log::debug;
use std::collections::HashMap;

/// The unit of technology activity
pub const ACTIVITY_UNIT: &str = "GWa";
/// The unit of installed capacity
pub const CAPACITY_UNIT: &str = "GW";
/// The unit of commodity prices
pub const COMMODITY_PRICE_UNIT: &str = "US$2005/kWa";
/// The unit of emission prices
pub const EMISSION_PRICE_UNIT: &str = "US$2005/tC";

/// Emission types which may carry the carbon price, in order of preference
pub const CARBON_PRICE_EMISSION_TYPES: [&str; 3] = ["TCE", "TCE_CO2", "CO2"];

/// The dimensions on which a per-activity coefficient is joined to activity.
///
/// Only those dimensions the coefficient actually has are used, so a coefficient with no `time`
/// index applies to activity summed over time slices.
const ACTIVITY_JOIN_DIMS: [Dimension; 6] = [
    Dimension::NodeLoc,
    Dimension::Technology,
    Dimension::YearVtg,
    Dimension::YearAct,
    Dimension::Mode,
    Dimension::Time,
];

/// Relation coefficients are not vintage-specific
const RELATION_JOIN_DIMS: [Dimension; 5] = [
    Dimension::NodeLoc,
    Dimension::Technology,
    Dimension::YearAct,
    Dimension::Mode,
    Dimension::Time,
];

/// Additional constraints on a retrieval.
///
/// Only the fields meaningful for the queried item may be set. Anything else is rejected by the
/// store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    /// Modes of operation
    pub mode: Vec<String>,
    /// Commodities
    pub commodity: Vec<String>,
    /// Commodity levels
    pub level: Vec<String>,
    /// Emission species
    pub emission: Vec<String>,
}

impl Selection {
    /// A selection which constrains nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to a commodity/level combination
    pub fn commodity(commodity: &[&str], level: &[&str]) -> Self {
        Self {
            commodity: to_strings(commodity),
            level: to_strings(level),
            ..Self::default()
        }
    }

    /// Restrict to modes of operation
    pub fn with_mode(mut self, mode: &[&str]) -> Self {
        self.mode = to_strings(mode);
        self
    }

    /// Restrict to emission species
    pub fn with_emission(mut self, emission: &[&str]) -> Self {
        self.emission = to_strings(emission);
        self
    }

    fn to_query(&self) -> QueryFilter {
        let mut filter = QueryFilter::new();
        for (dim, values) in [
            (Dimension::Mode, &self.mode),
            (Dimension::Commodity, &self.commodity),
            (Dimension::Level, &self.level),
            (Dimension::Emission, &self.emission),
        ] {
            if !values.is_empty() {
                filter = filter.with(dim, values.iter().cloned());
            }
        }

        filter
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}

/// Where to find each key column of a quantity in a store row
struct KeyLayout {
    region: [Dimension; 2],
    label: Option<Dimension>,
    year: Dimension,
    vintage: Option<Dimension>,
}

impl KeyLayout {
    fn technology(year: Dimension) -> Self {
        Self {
            region: [Dimension::NodeLoc, Dimension::Node],
            label: Some(Dimension::Technology),
            year,
            vintage: Some(Dimension::YearVtg),
        }
    }

    /// Relation totals are booked to the relation's node and year
    fn relation() -> Self {
        Self {
            region: [Dimension::NodeRel, Dimension::NodeLoc],
            label: Some(Dimension::Technology),
            year: Dimension::YearRel,
            vintage: None,
        }
    }

    fn commodity() -> Self {
        Self {
            region: [Dimension::Node, Dimension::NodeLoc],
            label: Some(Dimension::Commodity),
            year: Dimension::Year,
            vintage: None,
        }
    }

    /// The quantity key and year of a store row
    fn key(&self, row: &StoreRow) -> Result<(QuantityKey, u32)> {
        let region = self
            .region
            .iter()
            .find_map(|dim| row.get(*dim))
            .context("Row has no region")?;
        let mut key = QuantityKey::region(region.into());
        key.technology = self.label.and_then(|dim| row.get(dim)).map(TechnologyID::from);
        key.mode = row.get(Dimension::Mode).map(Into::into);
        key.grade = row.get(Dimension::Grade).map(Into::into);
        if let Some(dim) = self.vintage {
            key.vintage = row.year(dim)?;
        }
        let year = row
            .year(self.year)?
            .with_context(|| format!("Row has no {}", self.year))?;

        Ok((key, year))
    }
}

/// The unit of the product of a per-activity coefficient and activity.
///
/// A coefficient in `X/GWa` gives `X`; a dimensionless coefficient gives activity units.
fn product_unit(coefficient_unit: &str) -> String {
    match coefficient_unit.trim() {
        "" | "-" | "???" => ACTIVITY_UNIT.to_string(),
        unit => match unit.rsplit_once('/') {
            Some((numerator, _)) => numerator.trim().to_string(),
            None => unit.to_string(),
        },
    }
}

/// Fetches quantities for the scenario being reported
pub struct Retriever<'a> {
    ctx: &'a ReportingContext,
    store: &'a dyn ScenarioStore,
}

impl<'a> Retriever<'a> {
    /// Create a new retriever
    pub fn new(ctx: &'a ReportingContext, store: &'a dyn ScenarioStore) -> Self {
        Self { ctx, store }
    }

    /// The reporting context
    pub fn context(&self) -> &'a ReportingContext {
        self.ctx
    }

    /// Activity of technologies
    pub fn act(
        &self,
        technologies: &[&str],
        selection: &Selection,
        unit: &str,
        grouping: Grouping,
    ) -> Result<Quantity> {
        let filter = selection
            .to_query()
            .with(Dimension::Technology, technologies.iter().copied());
        let rows = self.store.var("ACT", &filter, VarField::Level)?;
        let quantity = self.collect(
            "ACT",
            &rows,
            &KeyLayout::technology(Dimension::YearAct),
            ACTIVITY_UNIT,
        )?;

        Ok(self.finish(quantity, technologies, unit, "ACT", grouping))
    }

    /// Total installed capacity of technologies, by year of operation
    pub fn cap(&self, technologies: &[&str], unit: &str, grouping: Grouping) -> Result<Quantity> {
        let filter = QueryFilter::new().with(Dimension::Technology, technologies.iter().copied());
        let rows = self.store.var("CAP", &filter, VarField::Level)?;
        let quantity = self.collect(
            "CAP",
            &rows,
            &KeyLayout::technology(Dimension::YearAct),
            CAPACITY_UNIT,
        )?;

        Ok(self.finish(quantity, technologies, unit, "CAP", grouping))
    }

    /// New capacity of technologies, by year of construction
    pub fn cap_new(
        &self,
        technologies: &[&str],
        unit: &str,
        grouping: Grouping,
    ) -> Result<Quantity> {
        let filter = QueryFilter::new().with(Dimension::Technology, technologies.iter().copied());
        let rows = self.store.var("CAP_NEW", &filter, VarField::Level)?;
        let layout = KeyLayout {
            vintage: None,
            ..KeyLayout::technology(Dimension::YearVtg)
        };
        let quantity = self.collect("CAP_NEW", &rows, &layout, CAPACITY_UNIT)?;

        Ok(self.finish(quantity, technologies, unit, "CAP_NEW", grouping))
    }

    /// Output of commodities by technologies (output coefficient multiplied by activity)
    pub fn out(
        &self,
        technologies: &[&str],
        selection: &Selection,
        unit: &str,
        grouping: Grouping,
    ) -> Result<Quantity> {
        self.activity_product("output", technologies, selection, unit, grouping)
    }

    /// Input of commodities to technologies (input coefficient multiplied by activity)
    pub fn inp(
        &self,
        technologies: &[&str],
        selection: &Selection,
        unit: &str,
        grouping: Grouping,
    ) -> Result<Quantity> {
        self.activity_product("input", technologies, selection, unit, grouping)
    }

    /// Emissions of technologies (emission factor multiplied by activity)
    pub fn emi(
        &self,
        technologies: &[&str],
        emission: &str,
        unit: &str,
        grouping: Grouping,
    ) -> Result<Quantity> {
        let selection = Selection::new().with_emission(&[emission]);
        self.activity_product("emission_factor", technologies, &selection, unit, grouping)
    }

    /// Contribution of technologies to a relation (relation coefficient multiplied by activity)
    pub fn rel(
        &self,
        technologies: &[&str],
        relation: &str,
        unit: &str,
        grouping: Grouping,
    ) -> Result<Quantity> {
        let mut filter = QueryFilter::new().with(Dimension::Relation, [relation]);
        if !technologies.is_empty() {
            filter = filter.with(Dimension::Technology, technologies.iter().copied());
        }
        let coefficients = self.store.par("relation_activity", &filter)?;
        let quantity = self.multiply_by_activity(
            "relation_activity",
            &coefficients,
            &RELATION_JOIN_DIMS,
            &KeyLayout::relation(),
            &Selection::new(),
        )?;

        Ok(self.finish(quantity, technologies, unit, "relation_activity", grouping))
    }

    /// Resource extraction, by commodity
    pub fn extraction(
        &self,
        commodities: &[&str],
        unit: &str,
        grouping: Grouping,
    ) -> Result<Quantity> {
        let filter = QueryFilter::new().with(Dimension::Commodity, commodities.iter().copied());
        let rows = self.store.var("EXT", &filter, VarField::Level)?;
        let quantity = self.collect("EXT", &rows, &KeyLayout::commodity(), ACTIVITY_UNIT)?;

        Ok(self.finish(quantity, commodities, unit, "EXT", grouping))
    }

    /// Exogenous demand, by commodity
    pub fn demand(&self, commodities: &[&str], level: &str, unit: &str) -> Result<Quantity> {
        let filter = QueryFilter::new()
            .with(Dimension::Commodity, commodities.iter().copied())
            .with(Dimension::Level, [level]);
        let rows = self.store.par("demand", &filter)?;
        let quantity = self.collect("demand", &rows, &KeyLayout::commodity(), ACTIVITY_UNIT)?;

        Ok(self.finish(quantity, commodities, unit, "demand", Grouping::Region))
    }

    /// Commodity prices, by commodity
    pub fn price_commodity(
        &self,
        commodities: &[&str],
        level: &str,
        unit: &str,
    ) -> Result<Quantity> {
        let filter = QueryFilter::new()
            .with(Dimension::Commodity, commodities.iter().copied())
            .with(Dimension::Level, [level]);
        let rows = self.store.var("PRICE_COMMODITY", &filter, VarField::Level)?;
        let quantity = self.collect(
            "PRICE_COMMODITY",
            &rows,
            &KeyLayout::commodity(),
            COMMODITY_PRICE_UNIT,
        )?;

        Ok(self.finish(
            quantity,
            commodities,
            unit,
            "PRICE_COMMODITY",
            Grouping::Technology,
        ))
    }

    /// The carbon price.
    ///
    /// The first emission type in [`CARBON_PRICE_EMISSION_TYPES`] with any data is used, and it
    /// must be priced for exactly one technology type; anything else is ambiguous and an error.
    /// If the price is only given for the global region, it is copied into every region.
    pub fn carbon_price(&self, unit: &str) -> Result<Quantity> {
        let rows = self
            .store
            .var("PRICE_EMISSION", &QueryFilter::new(), VarField::Level)?;

        let mut selected = Vec::new();
        for type_emission in CARBON_PRICE_EMISSION_TYPES {
            let matching: Vec<_> = rows
                .iter()
                .filter(|row| row.get(Dimension::TypeEmission) == Some(type_emission))
                .collect();
            if matching.is_empty() {
                continue;
            }

            let type_tecs: IndexSet<_> = matching
                .iter()
                .filter_map(|row| row.get(Dimension::TypeTec))
                .collect();
            if type_tecs.len() > 1 {
                bail!(
                    "Ambiguous carbon price for {type_emission}: priced for {}",
                    type_tecs.iter().join(", ")
                );
            }

            debug!("Using carbon price for emission type {type_emission}");
            selected = matching.into_iter().cloned().collect();
            break;
        }

        let layout = KeyLayout {
            region: [Dimension::Node, Dimension::NodeLoc],
            label: None,
            year: Dimension::Year,
            vintage: None,
        };
        let quantity = self.collect("PRICE_EMISSION", &selected, &layout, EMISSION_PRICE_UNIT)?;

        Ok(normalise(
            self.ctx,
            quantity,
            unit,
            "PRICE_EMISSION",
            RegionFill::ReplicateGlobal,
            YearFill::Zero,
        ))
    }

    /// Historical emissions, used to adjust pre-horizon years in emissions reconciliation
    pub fn hist_emission(&self, emission: &str, type_tec: &str, unit: &str) -> Result<Quantity> {
        let filter = QueryFilter::new()
            .with(Dimension::Emission, [emission])
            .with(Dimension::TypeTec, [type_tec]);
        let rows = self.store.par("historical_emission", &filter)?;
        let layout = KeyLayout {
            label: None,
            ..KeyLayout::commodity()
        };
        let quantity = self.collect("historical_emission", &rows, &layout, unit)?;

        Ok(self.finish(quantity, &[], unit, "historical_emission", Grouping::Region))
    }

    /// A regional scaling factor read from fil files
    pub fn fil_factor(&self, factor: &str) -> Result<Quantity> {
        let quantity = read_fil_factor(self.ctx, factor)?;
        Ok(normalise(
            self.ctx,
            quantity,
            "-",
            factor,
            RegionFill::Zero,
            YearFill::ForwardFill,
        ))
    }

    /// Multiply a per-activity parameter by activity
    fn activity_product(
        &self,
        item: &str,
        technologies: &[&str],
        selection: &Selection,
        unit: &str,
        grouping: Grouping,
    ) -> Result<Quantity> {
        let activity_selection = Selection::new().with_mode(
            &selection.mode.iter().map(String::as_str).collect_vec(),
        );
        let filter = selection
            .to_query()
            .with(Dimension::Technology, technologies.iter().copied());
        let coefficients = self.store.par(item, &filter)?;
        let quantity = self.multiply_by_activity(
            item,
            &coefficients,
            &ACTIVITY_JOIN_DIMS,
            &KeyLayout::technology(Dimension::YearAct),
            &activity_selection,
        )?;

        Ok(self.finish(quantity, technologies, unit, item, grouping))
    }

    /// Join coefficient rows to activity on those `join_dims` the coefficient has, and multiply.
    ///
    /// Activity is summed over any of its dimensions not joined on. Products are keyed with
    /// `layout`.
    fn multiply_by_activity(
        &self,
        item: &str,
        coefficients: &[StoreRow],
        join_dims: &[Dimension],
        layout: &KeyLayout,
        selection: &Selection,
    ) -> Result<Quantity> {
        let unit = self.row_unit(item, coefficients, "-");
        let unit = product_unit(&unit);

        let technologies: IndexSet<&str> = coefficients
            .iter()
            .filter_map(|row| row.get(Dimension::Technology))
            .collect();
        if technologies.is_empty() {
            return Ok(Quantity::new(&unit));
        }
        let filter = selection
            .to_query()
            .with(Dimension::Technology, technologies.iter().copied());
        let activity_rows = self.store.var("ACT", &filter, VarField::Level)?;

        let join_dims: Vec<Dimension> = join_dims
            .iter()
            .copied()
            .filter(|dim| coefficients.iter().all(|row| row.get(*dim).is_some()))
            .collect();
        let join_key = |row: &StoreRow| -> Vec<String> {
            join_dims
                .iter()
                .map(|dim| row.get(*dim).unwrap_or_default().to_string())
                .collect()
        };
        let mut activity: HashMap<Vec<String>, f64> = HashMap::new();
        for row in &activity_rows {
            *activity.entry(join_key(row)).or_insert(0.0) += row.value;
        }

        let mut quantity = Quantity::new(&unit);
        for row in coefficients {
            let Some(act) = activity.get(&join_key(row)) else {
                continue;
            };
            let (key, year) = layout.key(row).with_context(|| format!("Invalid row in {item}"))?;
            quantity.add_to(key, year, row.value * act);
        }

        Ok(quantity)
    }

    /// Convert store rows into a quantity, summing rows which map to the same key
    fn collect(
        &self,
        item: &str,
        rows: &[StoreRow],
        layout: &KeyLayout,
        default_unit: &str,
    ) -> Result<Quantity> {
        let unit = self.row_unit(item, rows, default_unit);
        let mut quantity = Quantity::new(&unit);
        for row in rows {
            let (key, year) = layout.key(row).with_context(|| format!("Invalid row in {item}"))?;
            quantity.add_to(key, year, row.value);
        }

        Ok(quantity)
    }

    /// The single unit of a set of rows.
    ///
    /// If the rows carry more than one unit, a warning is recorded and `default_unit` is used.
    fn row_unit(&self, item: &str, rows: &[StoreRow], default_unit: &str) -> String {
        let units: IndexSet<&str> = rows
            .iter()
            .filter_map(|row| row.unit.as_ref().map(Unit::as_str))
            .collect();

        match units.len() {
            0 => default_unit.to_string(),
            1 => units[0].to_string(),
            _ => {
                self.ctx.warn(ReportWarning::MixedUnits {
                    item: item.to_string(),
                    units: units.iter().join(", "),
                    assumed: default_unit.to_string(),
                });
                default_unit.to_string()
            }
        }
    }

    /// Group, seed rows for requested labels with no data, and normalise
    fn finish(
        &self,
        quantity: Quantity,
        labels: &[&str],
        unit: &str,
        item: &str,
        grouping: Grouping,
    ) -> Quantity {
        let mut quantity = quantity.group_by(grouping);
        if grouping != Grouping::Region {
            seed_labels(self.ctx, &mut quantity, labels);
        }

        normalise(
            self.ctx,
            quantity,
            unit,
            item,
            RegionFill::Zero,
            YearFill::Zero,
        )
    }
}

/// Add zero rows in every region for labels which have no data at all
fn seed_labels(ctx: &ReportingContext, quantity: &mut Quantity, labels: &[&str]) {
    let present: IndexSet<&str> = quantity
        .keys()
        .filter_map(|key| key.technology.as_ref().map(TechnologyID::as_str))
        .collect();
    let missing: Vec<TechnologyID> = labels
        .iter()
        .filter(|label| !present.contains(**label))
        .map(|label| TechnologyID::new(label))
        .collect();

    for region in ctx.regions().iter() {
        for label in &missing {
            let key = QuantityKey::region(region.clone()).with_technology(label.clone());
            let row = quantity.row_mut(key);
            for year in ctx.years().iter() {
                row.insert(year, 0.0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, context, key, tec_key};
    use crate::normalise::missing_cells;
    use crate::store::ScenarioData;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    fn act_row(data: &mut ScenarioData, region: &str, tec: &str, vtg: &str, year: &str, value: f64) {
        data.add_var_row(
            "ACT",
            &[
                (Dimension::NodeLoc, region),
                (Dimension::Technology, tec),
                (Dimension::YearVtg, vtg),
                (Dimension::YearAct, year),
                (Dimension::Mode, "M1"),
                (Dimension::Time, "year"),
            ],
            value,
            0.0,
        )
        .unwrap();
    }

    fn output_row(data: &mut ScenarioData, tec: &str, vtg: &str, year: &str, value: f64, unit: &str) {
        data.add_par_row(
            "output",
            &[
                (Dimension::NodeLoc, "R12_AFR"),
                (Dimension::Technology, tec),
                (Dimension::YearVtg, vtg),
                (Dimension::YearAct, year),
                (Dimension::Mode, "M1"),
                (Dimension::NodeDest, "R12_AFR"),
                (Dimension::Commodity, "electr"),
                (Dimension::Level, "secondary"),
                (Dimension::Time, "year"),
                (Dimension::TimeDest, "year"),
            ],
            value,
            unit,
        )
        .unwrap();
    }

    #[test]
    fn test_product_unit() {
        assert_eq!(product_unit("Mt C/GWa"), "Mt C");
        assert_eq!(product_unit("-"), "GWa");
        assert_eq!(product_unit("GWa"), "GWa");
    }

    #[rstest]
    fn test_act(context: ReportingContext) {
        let mut data = ScenarioData::new();
        act_row(&mut data, "R12_AFR", "coal_ppl", "2010", "2020", 60.0);
        act_row(&mut data, "R12_AFR", "coal_ppl", "2020", "2020", 40.0);
        act_row(&mut data, "R12_AFR", "gas_cc", "2020", "2020", 5.0);
        let retriever = Retriever::new(&context, &data);

        let q = retriever
            .act(&["coal_ppl"], &Selection::new(), "EJ/yr", Grouping::Region)
            .unwrap();
        assert_approx_eq!(
            f64,
            q.get(&key("R12_AFR"), 2020).unwrap(),
            3.154,
            epsilon = 1e-9
        );
        assert_eq!(q.get(&key("R12_AFR"), 2030), Some(0.0));
        assert_eq!(q.get(&key("R12_WEU"), 2020), Some(0.0));
        assert!(missing_cells(&context, &q, false).is_empty());

        let q = retriever
            .act(&["coal_ppl"], &Selection::new(), "GWa", Grouping::TechnologyVintage)
            .unwrap();
        assert_eq!(
            q.get(&tec_key("R12_AFR", "coal_ppl").with_vintage(2010), 2020),
            Some(60.0)
        );
    }

    #[rstest]
    fn test_act_no_data(context: ReportingContext) {
        let data = ScenarioData::new();
        let retriever = Retriever::new(&context, &data);

        let q = retriever
            .act(&["coal_ppl", "gas_cc"], &Selection::new(), "GWa", Grouping::Technology)
            .unwrap();
        assert_eq!(q.len(), 4);
        assert!(q.iter().all(|(_, values)| values.values().all(|v| v.abs() < f64::EPSILON)));
        assert!(missing_cells(&context, &q, false).is_empty());
    }

    #[rstest]
    fn test_out(context: ReportingContext) {
        let mut data = ScenarioData::new();
        act_row(&mut data, "R12_AFR", "coal_ppl", "2020", "2020", 10.0);
        act_row(&mut data, "R12_AFR", "gas_cc", "2020", "2020", 10.0);
        output_row(&mut data, "coal_ppl", "2020", "2020", 1.0, "-");
        output_row(&mut data, "gas_cc", "2020", "2020", 0.5, "-");
        let retriever = Retriever::new(&context, &data);

        let q = retriever
            .out(
                &["coal_ppl", "gas_cc"],
                &Selection::commodity(&["electr"], &["secondary"]),
                "GWa",
                Grouping::Technology,
            )
            .unwrap();
        assert_eq!(q.get(&tec_key("R12_AFR", "coal_ppl"), 2020), Some(10.0));
        assert_eq!(q.get(&tec_key("R12_AFR", "gas_cc"), 2020), Some(5.0));
        assert!(context.warnings().is_empty());
    }

    #[rstest]
    fn test_out_mixed_units(context: ReportingContext) {
        let mut data = ScenarioData::new();
        act_row(&mut data, "R12_AFR", "coal_ppl", "2020", "2020", 10.0);
        act_row(&mut data, "R12_AFR", "gas_cc", "2020", "2020", 10.0);
        output_row(&mut data, "coal_ppl", "2020", "2020", 1.0, "-");
        output_row(&mut data, "gas_cc", "2020", "2020", 1.0, "GWa");
        let retriever = Retriever::new(&context, &data);

        let q = retriever
            .out(
                &["coal_ppl", "gas_cc"],
                &Selection::new(),
                "GWa",
                Grouping::Region,
            )
            .unwrap();
        assert_eq!(q.get(&key("R12_AFR"), 2020), Some(20.0));
        assert!(matches!(
            context.warnings()[..],
            [ReportWarning::MixedUnits { .. }]
        ));
    }

    #[rstest]
    fn test_malformed_selection(context: ReportingContext) {
        let data = ScenarioData::new();
        let retriever = Retriever::new(&context, &data);

        // ACT has no commodity dimension
        assert_error!(
            retriever.act(
                &["coal_ppl"],
                &Selection::commodity(&["electr"], &[]),
                "GWa",
                Grouping::Region
            ),
            "Filter dimension commodity is not an index of ACT"
        );
    }

    #[rstest]
    fn test_carbon_price_global_only(context: ReportingContext) {
        let mut data = ScenarioData::new();
        data.add_var_row(
            "PRICE_EMISSION",
            &[
                (Dimension::Node, "World"),
                (Dimension::TypeEmission, "TCE"),
                (Dimension::TypeTec, "all"),
                (Dimension::Year, "2020"),
            ],
            50.0,
            0.0,
        )
        .unwrap();
        let retriever = Retriever::new(&context, &data);

        let q = retriever.carbon_price(EMISSION_PRICE_UNIT).unwrap();
        assert_eq!(q.get(&key("R12_AFR"), 2020), Some(50.0));
        assert_eq!(q.get(&key("R12_WEU"), 2020), Some(50.0));
        assert_eq!(q.get(&key("R12_AFR"), 2030), Some(0.0));
    }

    #[rstest]
    fn test_carbon_price_ambiguous(context: ReportingContext) {
        let mut data = ScenarioData::new();
        for type_tec in ["all", "energy"] {
            data.add_var_row(
                "PRICE_EMISSION",
                &[
                    (Dimension::Node, "World"),
                    (Dimension::TypeEmission, "TCE"),
                    (Dimension::TypeTec, type_tec),
                    (Dimension::Year, "2020"),
                ],
                50.0,
                0.0,
            )
            .unwrap();
        }
        let retriever = Retriever::new(&context, &data);

        assert_error!(
            retriever.carbon_price(EMISSION_PRICE_UNIT),
            "Ambiguous carbon price for TCE: priced for all, energy"
        );
    }

    #[rstest]
    fn test_rel(context: ReportingContext) {
        let mut data = ScenarioData::new();
        act_row(&mut data, "R12_AFR", "coal_ppl", "2010", "2020", 6.0);
        act_row(&mut data, "R12_AFR", "coal_ppl", "2020", "2020", 4.0);
        data.add_par_row(
            "relation_activity",
            &[
                (Dimension::Relation, "CO2_Emission"),
                (Dimension::NodeRel, "R12_AFR"),
                (Dimension::YearRel, "2020"),
                (Dimension::NodeLoc, "R12_AFR"),
                (Dimension::Technology, "coal_ppl"),
                (Dimension::YearAct, "2020"),
                (Dimension::Mode, "M1"),
            ],
            0.8,
            "Mt C/GWa",
        )
        .unwrap();
        let retriever = Retriever::new(&context, &data);

        let q = retriever
            .rel(&[], "CO2_Emission", "Mt C", Grouping::Region)
            .unwrap();
        assert_eq!(q.unit().as_str(), "Mt C");
        assert_approx_eq!(f64, q.get(&key("R12_AFR"), 2020).unwrap(), 8.0);
    }

    #[rstest]
    fn test_rel_booked_to_relation_node(context: ReportingContext) {
        let mut data = ScenarioData::new();
        act_row(&mut data, "R12_AFR", "elec_exp", "2020", "2020", 10.0);
        data.add_par_row(
            "relation_activity",
            &[
                (Dimension::Relation, "CO2_Emission"),
                (Dimension::NodeRel, "R12_WEU"),
                (Dimension::YearRel, "2020"),
                (Dimension::NodeLoc, "R12_AFR"),
                (Dimension::Technology, "elec_exp"),
                (Dimension::YearAct, "2020"),
                (Dimension::Mode, "M1"),
            ],
            0.5,
            "Mt C/GWa",
        )
        .unwrap();
        let retriever = Retriever::new(&context, &data);

        let q = retriever
            .rel(&[], "CO2_Emission", "Mt C", Grouping::Region)
            .unwrap();
        assert_eq!(q.get(&key("R12_WEU"), 2020), Some(5.0));
        assert_eq!(q.get(&key("R12_AFR"), 2020), Some(0.0));
    }

    fn sliced_act_row(data: &mut ScenarioData, time: &str, value: f64) {
        data.add_var_row(
            "ACT",
            &[
                (Dimension::NodeLoc, "R12_AFR"),
                (Dimension::Technology, "coal_ppl"),
                (Dimension::YearVtg, "2020"),
                (Dimension::YearAct, "2020"),
                (Dimension::Mode, "M1"),
                (Dimension::Time, time),
            ],
            value,
            0.0,
        )
        .unwrap();
    }

    #[rstest]
    fn test_out_time_slices(context: ReportingContext) {
        let mut data = ScenarioData::new();
        sliced_act_row(&mut data, "summer", 10.0);
        sliced_act_row(&mut data, "winter", 30.0);
        for (time, value) in [("summer", 1.0), ("winter", 0.5)] {
            data.add_par_row(
                "output",
                &[
                    (Dimension::NodeLoc, "R12_AFR"),
                    (Dimension::Technology, "coal_ppl"),
                    (Dimension::YearVtg, "2020"),
                    (Dimension::YearAct, "2020"),
                    (Dimension::Mode, "M1"),
                    (Dimension::NodeDest, "R12_AFR"),
                    (Dimension::Commodity, "electr"),
                    (Dimension::Level, "secondary"),
                    (Dimension::Time, time),
                    (Dimension::TimeDest, time),
                ],
                value,
                "-",
            )
            .unwrap();
        }
        let retriever = Retriever::new(&context, &data);

        let q = retriever
            .out(&["coal_ppl"], &Selection::new(), "GWa", Grouping::Region)
            .unwrap();
        assert_eq!(q.get(&key("R12_AFR"), 2020), Some(25.0));
    }

    #[rstest]
    fn test_emi_time_slices(context: ReportingContext) {
        let mut data = ScenarioData::new();
        sliced_act_row(&mut data, "summer", 10.0);
        sliced_act_row(&mut data, "winter", 30.0);
        data.add_par_row(
            "emission_factor",
            &[
                (Dimension::NodeLoc, "R12_AFR"),
                (Dimension::Technology, "coal_ppl"),
                (Dimension::YearVtg, "2020"),
                (Dimension::YearAct, "2020"),
                (Dimension::Mode, "M1"),
                (Dimension::Emission, "CO2"),
            ],
            0.5,
            "Mt C/GWa",
        )
        .unwrap();
        let retriever = Retriever::new(&context, &data);

        // No time index on the emission factor: it applies to activity over all time slices
        let q = retriever
            .emi(&["coal_ppl"], "CO2", "Mt C", Grouping::Region)
            .unwrap();
        assert_eq!(q.get(&key("R12_AFR"), 2020), Some(20.0));
    }
}
