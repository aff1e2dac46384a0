//! Normalisation of retrieved quantities.
//!
//! Every quantity leaving the retrieval adapters has passed through these functions, so that it
//! has a row for every configured region and a value for every configured year, in the requested
//! unit. Missing data is the normal case here and is filled rather than treated as an error.
use crate::context::ReportingContext;
use crate::quantity::{Quantity, QuantityKey, YearValues};
use crate::region::RegionID;
use crate::warning::ReportWarning;
use indexmap::IndexSet;
use log::debug;
use std::cmp::Ordering;

/// How to fill regions absent from a quantity
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegionFill {
    /// Insert zero-valued rows
    Zero,
    /// If the only data is for the global region, copy it into every region. Otherwise as for
    /// [`RegionFill::Zero`].
    ReplicateGlobal,
}

/// How to fill years absent from a quantity
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum YearFill {
    /// Fill with zero
    Zero,
    /// Carry the most recent known value forward, with zero for leading years
    ForwardFill,
}

/// Restrict `quantity` to the configured regions plus the global region, then insert rows for
/// regions absent from it.
///
/// Rows for any other region are dropped. For each missing region, a row is added for every combination of technology, mode, grade and
/// vintage already present in `quantity` (or a region-only row if it is empty), with zero in every
/// configured year.
pub fn clean_up_regions(
    ctx: &ReportingContext,
    mut quantity: Quantity,
    fill: RegionFill,
) -> Quantity {
    let global = ctx.global_region();
    quantity.retain(|key| {
        let known = key.region == *global || ctx.regions().contains(key.region.as_str());
        if !known {
            debug!("Dropping row for unreported region {}", key.region);
        }
        known
    });
    let present: IndexSet<RegionID> = quantity.regions().into_iter().collect();

    if fill == RegionFill::ReplicateGlobal && present.len() == 1 && present.contains(global) {
        return replicate_global(ctx, quantity);
    }

    // The non-region key columns which exist anywhere in the quantity
    let mut templates: IndexSet<QuantityKey> = quantity
        .keys()
        .map(|key| key.in_region(global))
        .collect();
    if templates.is_empty() {
        templates.insert(QuantityKey::region(global.clone()));
    }

    let mut out = quantity;
    for region in ctx.regions().iter().filter(|r| !present.contains(*r)) {
        for template in &templates {
            let row = out.row_mut(template.in_region(region));
            for year in ctx.years().iter() {
                row.entry(year).or_insert(0.0);
            }
        }
    }

    out
}

/// Copy the rows of the global region into every regional member
fn replicate_global(ctx: &ReportingContext, quantity: Quantity) -> Quantity {
    let global_rows: Vec<_> = quantity
        .iter()
        .map(|(key, values)| (key.clone(), values.clone()))
        .collect();

    let mut out = quantity;
    for region in ctx.regions().iter() {
        for (key, values) in &global_rows {
            out.row_mut(key.in_region(region)).clone_from(values);
        }
    }

    out
}

/// Ensure every row has a value for exactly the configured years, in order.
///
/// Years outside the configured set are dropped.
pub fn clean_up_years(ctx: &ReportingContext, quantity: Quantity, fill: YearFill) -> Quantity {
    let mut out = quantity;
    for (_, values) in out.iter_mut() {
        let mut last = None;
        let filled: YearValues = ctx
            .years()
            .iter()
            .map(|year| {
                let value = match values.get(&year) {
                    Some(value) => {
                        last = Some(*value);
                        *value
                    }
                    None => match fill {
                        YearFill::Zero => 0.0,
                        YearFill::ForwardFill => last.unwrap_or(0.0),
                    },
                };
                (year, value)
            })
            .collect();
        *values = filled;
    }

    out
}

/// Convert `quantity` into `unit_out`.
///
/// If there is no registered factor, a [`ReportWarning::MissingUnitConversion`] is recorded and the
/// quantity is returned unchanged, still labelled with its original unit. A quantity with no
/// non-zero values is relabelled without a factor.
pub fn convert_units(
    ctx: &ReportingContext,
    quantity: Quantity,
    unit_out: &str,
    item: &str,
) -> Quantity {
    let unit_in = quantity.unit().clone();
    match ctx.units().get(unit_in.as_str(), unit_out) {
        Some(factor) => quantity.scale(factor).with_unit(unit_out),
        None if is_all_zero(&quantity) => quantity.with_unit(unit_out),
        None => {
            ctx.warn(ReportWarning::MissingUnitConversion {
                item: item.to_string(),
                from: unit_in.to_string(),
                to: unit_out.to_string(),
            });
            quantity
        }
    }
}

fn is_all_zero(quantity: &Quantity) -> bool {
    quantity
        .iter()
        .all(|(_, values)| values.values().all(|value| *value == 0.0))
}

/// Put the rows of `quantity` into canonical order.
///
/// Rows are ordered by region (configured order, global region last, unknown regions after that by
/// name), then by the technology-like key columns, then by vintage.
pub fn clean_up_formatting(ctx: &ReportingContext, quantity: Quantity) -> Quantity {
    let regions = ctx.regions();
    let region_order = |region: &RegionID| {
        (
            regions.position(region).unwrap_or(usize::MAX),
            region.clone(),
        )
    };

    let mut out = quantity;
    out.sort_keys_by(|k1, k2| {
        match region_order(&k1.region).cmp(&region_order(&k2.region)) {
            Ordering::Equal => k1.cmp(k2),
            ordering => ordering,
        }
    });

    out
}

/// Apply the full normalisation pipeline to a freshly retrieved quantity
pub fn normalise(
    ctx: &ReportingContext,
    quantity: Quantity,
    unit_out: &str,
    item: &str,
    region_fill: RegionFill,
    year_fill: YearFill,
) -> Quantity {
    let quantity = clean_up_regions(ctx, quantity, region_fill);
    let quantity = clean_up_years(ctx, quantity, year_fill);
    let quantity = convert_units(ctx, quantity, unit_out, item);
    clean_up_formatting(ctx, quantity)
}

/// The `(region, year)` cells of the configured grid for which `quantity` has no value.
///
/// The global region is included only if `with_global` is true.
pub fn missing_cells(
    ctx: &ReportingContext,
    quantity: &Quantity,
    with_global: bool,
) -> Vec<(RegionID, u32)> {
    let regions: Vec<&RegionID> = if with_global {
        ctx.regions().iter_with_global().collect()
    } else {
        ctx.regions().iter().collect()
    };

    let mut missing = Vec::new();
    for region in regions {
        for year in ctx.years().iter() {
            let present = quantity
                .iter()
                .any(|(key, values)| key.region == *region && values.contains_key(&year));
            if !present {
                missing.push((region.clone(), year));
            }
        }
    }

    missing
}
