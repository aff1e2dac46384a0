//! Reconciliation of top-down and bottom-up emissions accounting.
//!
//! The top-down total (from an accounting relation) is authoritative. The gap between it and the
//! sum of the bottom-up components is distributed over the components in proportion to their
//! absolute size, separately in each region and year.
use crate::context::ReportingContext;
use crate::quantity::{Quantity, QuantityKey, safe_ratio};
use crate::region::RegionID;
use crate::warning::ReportWarning;
use anyhow::{Result, ensure};
use indexmap::IndexMap;

/// The inputs to reconciling one emission species
#[derive(Debug, Clone)]
pub struct Reconciliation {
    /// The emission species, e.g. "CO2"
    pub species: String,
    /// The authoritative total
    pub top_down: Quantity,
    /// Bottom-up components which receive a share of the residual
    pub components: IndexMap<String, Quantity>,
    /// Terms reported alongside the components but never reconciled (e.g. bunkers)
    pub excluded: IndexMap<String, Quantity>,
    /// Subtracted from the residual in years before the model horizon
    pub historical_adjustment: Option<Quantity>,
}

/// The outputs of a [`Reconciliation`]
#[derive(Debug, Clone)]
pub struct ReconciledEmissions {
    /// Components with their share of the residual added
    pub components: IndexMap<String, Quantity>,
    /// Unreconciled terms, unchanged
    pub excluded: IndexMap<String, Quantity>,
    /// Top-down minus bottom-up, after any historical adjustment
    pub residual: Quantity,
    /// Cells with a non-zero residual but no components to carry it, with the residual lost
    pub dropped_cells: Vec<(RegionID, u32, f64)>,
}

impl Reconciliation {
    /// Create a reconciliation with no excluded terms or historical adjustment
    pub fn new(species: &str, top_down: Quantity) -> Self {
        Self {
            species: species.to_string(),
            top_down,
            components: IndexMap::new(),
            excluded: IndexMap::new(),
            historical_adjustment: None,
        }
    }

    /// Add a component which receives a share of the residual
    pub fn with_component(mut self, name: &str, quantity: Quantity) -> Self {
        self.components.insert(name.to_string(), quantity);
        self
    }

    /// Add a term which is reported but not reconciled
    pub fn with_excluded(mut self, name: &str, quantity: Quantity) -> Self {
        self.excluded.insert(name.to_string(), quantity);
        self
    }

    /// Set the adjustment for years before the model horizon
    pub fn with_historical_adjustment(mut self, quantity: Quantity) -> Self {
        self.historical_adjustment = Some(quantity);
        self
    }

    fn check_units(&self) -> Result<()> {
        let unit = self.top_down.unit();
        let terms = self
            .components
            .iter()
            .chain(&self.excluded)
            .map(|(name, q)| (name.as_str(), q))
            .chain(self.historical_adjustment.iter().map(|q| ("historical", q)));
        for (name, quantity) in terms {
            ensure!(
                quantity.unit() == unit,
                "{name} emissions of {} are in {}, expected {unit}",
                self.species,
                quantity.unit()
            );
        }

        Ok(())
    }

    /// Distribute the residual over the components.
    ///
    /// Reconciliation is done at regional level: the inputs are summed within each region and
    /// global rows are ignored. Where the components sum to zero in absolute terms but the
    /// residual is non-zero, the residual for that cell is dropped and a
    /// [`ReportWarning::ResidualDropped`] is recorded.
    pub fn allocate(self, ctx: &ReportingContext) -> Result<ReconciledEmissions> {
        ensure!(
            !self.components.is_empty(),
            "No components to reconcile {} emissions",
            self.species
        );
        self.check_units()?;

        let unit = self.top_down.unit().as_str().to_string();
        let components: IndexMap<String, Quantity> = self
            .components
            .into_iter()
            .map(|(name, q)| (name, q.sum_by_region()))
            .collect();
        let top_down = self.top_down.sum_by_region();
        let adjustment = self
            .historical_adjustment
            .as_ref()
            .map(Quantity::sum_by_region);

        let mut residual = Quantity::new(&unit);
        let mut out: IndexMap<String, Quantity> = components
            .keys()
            .map(|name| (name.clone(), Quantity::new(&unit)))
            .collect();
        let mut dropped_cells = Vec::new();
        for region in ctx.regions().iter() {
            let key = QuantityKey::region(region.clone());
            for year in ctx.years().iter() {
                let value_of = |q: &Quantity| q.get(&key, year).unwrap_or(0.0);

                let bottom_up: f64 = components.values().map(value_of).sum();
                let mut difference = value_of(&top_down) - bottom_up;
                if ctx.years().is_historical(year) {
                    difference -= adjustment.as_ref().map_or(0.0, value_of);
                }
                residual.set(key.clone(), year, difference);

                let denominator: f64 = components.values().map(|q| value_of(q).abs()).sum();
                if denominator == 0.0 && difference != 0.0 {
                    ctx.warn(ReportWarning::ResidualDropped {
                        species: self.species.clone(),
                        region: region.to_string(),
                        year,
                        residual: difference,
                    });
                    dropped_cells.push((region.clone(), year, difference));
                }

                for (name, component) in &components {
                    let value = value_of(component);
                    let share = safe_ratio(value.abs(), denominator);
                    out[name].set(key.clone(), year, value + difference * share);
                }
            }
        }

        Ok(ReconciledEmissions {
            components: out,
            excluded: self.excluded,
            residual,
            dropped_cells,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, context, context_with_years, key, tec_key};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    fn reconciliation() -> Reconciliation {
        let top_down = Quantity::from_cells(
            "Mt CO2/yr",
            [(key("R12_AFR"), 2020, 110.0), (key("R12_WEU"), 2020, 50.0)],
        );
        let power = Quantity::from_cells(
            "Mt CO2/yr",
            [
                (tec_key("R12_AFR", "coal_ppl"), 2020, 60.0),
                (tec_key("R12_AFR", "gas_cc"), 2020, 20.0),
            ],
        );
        let industry = Quantity::from_cells("Mt CO2/yr", [(key("R12_AFR"), 2020, -20.0)]);
        let bunkers = Quantity::from_cells("Mt CO2/yr", [(key("R12_AFR"), 2020, 7.0)]);

        Reconciliation::new("CO2", top_down)
            .with_component("Energy|Supply|Electricity", power)
            .with_component("Energy|Demand|Industry", industry)
            .with_excluded("Energy|Demand|Bunkers", bunkers)
    }

    #[rstest]
    fn test_allocate(context: ReportingContext) {
        let out = reconciliation().allocate(&context).unwrap();

        // Residual of 50 split 80:20 by absolute magnitude
        let power = &out.components["Energy|Supply|Electricity"];
        let industry = &out.components["Energy|Demand|Industry"];
        assert_approx_eq!(f64, power.get(&key("R12_AFR"), 2020).unwrap(), 120.0);
        assert_approx_eq!(f64, industry.get(&key("R12_AFR"), 2020).unwrap(), -10.0);
        assert_approx_eq!(f64, out.residual.get(&key("R12_AFR"), 2020).unwrap(), 50.0);

        // Excluded terms untouched
        assert_eq!(
            out.excluded["Energy|Demand|Bunkers"].get(&key("R12_AFR"), 2020),
            Some(7.0)
        );
    }

    #[rstest]
    fn test_allocate_conserves_total(context: ReportingContext) {
        let out = reconciliation().allocate(&context).unwrap();
        for year in [2020, 2030, 2040] {
            let allocated: f64 = out
                .components
                .values()
                .map(|q| q.get(&key("R12_AFR"), year).unwrap())
                .sum();
            assert_approx_eq!(
                f64,
                allocated,
                if year == 2020 { 110.0 } else { 0.0 },
                epsilon = 1e-9
            );
        }
    }

    #[rstest]
    fn test_allocate_zero_denominator(context: ReportingContext) {
        let out = reconciliation().allocate(&context).unwrap();

        // No components in R12_WEU: residual of 50 lost
        assert_eq!(out.dropped_cells, [(RegionID::new("R12_WEU"), 2020, 50.0)]);
        for quantity in out.components.values() {
            assert_eq!(quantity.get(&key("R12_WEU"), 2020), Some(0.0));
        }
        assert!(matches!(
            context.warnings()[..],
            [ReportWarning::ResidualDropped { year: 2020, .. }]
        ));
    }

    #[test]
    fn test_allocate_historical_adjustment() {
        let ctx = context_with_years(vec![2010, 2020], 2020);
        let top_down = Quantity::from_cells(
            "Mt CO2/yr",
            [(key("R12_AFR"), 2010, 100.0), (key("R12_AFR"), 2020, 100.0)],
        );
        let component = Quantity::from_cells(
            "Mt CO2/yr",
            [(key("R12_AFR"), 2010, 80.0), (key("R12_AFR"), 2020, 80.0)],
        );
        let adjustment = Quantity::from_cells(
            "Mt CO2/yr",
            [(key("R12_AFR"), 2010, 5.0), (key("R12_AFR"), 2020, 5.0)],
        );

        let out = Reconciliation::new("CO2", top_down)
            .with_component("Energy", component)
            .with_historical_adjustment(adjustment)
            .allocate(&ctx)
            .unwrap();
        assert_eq!(out.residual.get(&key("R12_AFR"), 2010), Some(15.0));
        assert_eq!(out.residual.get(&key("R12_AFR"), 2020), Some(20.0));
        assert_eq!(out.components["Energy"].get(&key("R12_AFR"), 2010), Some(95.0));
    }

    #[rstest]
    fn test_allocate_invalid(context: ReportingContext) {
        let top_down = Quantity::new("Mt CO2/yr");
        assert_error!(
            Reconciliation::new("CO2", top_down.clone()).allocate(&context),
            "No components to reconcile CO2 emissions"
        );
        assert_error!(
            Reconciliation::new("CO2", top_down)
                .with_component("Energy", Quantity::new("Mt C/yr"))
                .allocate(&context),
            "Energy emissions of CO2 are in Mt C/yr, expected Mt CO2/yr"
        );
    }
}
