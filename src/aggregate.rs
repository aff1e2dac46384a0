//! Computing and overriding values for the global region.
use crate::context::ReportingContext;
use crate::normalise::clean_up_formatting;
use crate::quantity::{Quantity, QuantityKey, YearValues, safe_ratio};
use indexmap::IndexMap;

/// How the global value of an output variable is computed from its regional values
#[derive(Clone, Debug, PartialEq)]
pub enum Reduction {
    /// No global value is computed
    None,
    /// The sum of regional values
    Sum,
    /// The maximum regional value in each year
    Max,
    /// The arithmetic mean of regional values in each year
    Mean,
    /// The mean of regional values weighted by another quantity.
    ///
    /// Weights may be keyed on region alone, in which case they apply to every row in a region.
    WeightedAvg(Quantity),
}

/// Regional rows grouped by their non-region key columns, with the key in the global region
fn group_regional_rows<'a>(
    ctx: &ReportingContext,
    quantity: &'a Quantity,
) -> IndexMap<QuantityKey, Vec<(&'a QuantityKey, &'a YearValues)>> {
    let global = ctx.global_region();
    let mut groups: IndexMap<_, Vec<_>> = IndexMap::new();
    for (key, values) in quantity.iter().filter(|(key, _)| key.region != *global) {
        groups
            .entry(key.in_region(global))
            .or_default()
            .push((key, values));
    }

    groups
}

/// Reduce the values of `rows` in each year
fn reduce<F>(ctx: &ReportingContext, rows: &[(&QuantityKey, &YearValues)], f: F) -> YearValues
where
    F: Fn(&[(&QuantityKey, f64)]) -> f64,
{
    ctx.years()
        .iter()
        .map(|year| {
            let values: Vec<_> = rows
                .iter()
                .map(|(key, values)| (*key, values.get(&year).copied().unwrap_or(0.0)))
                .collect();
            (year, f(&values))
        })
        .collect()
}

/// The weight for a row, falling back to the weight for its region
fn weight(weights: &Quantity, key: &QuantityKey, year: u32) -> f64 {
    weights
        .get(key, year)
        .or_else(|| weights.get(&QuantityKey::region(key.region.clone()), year))
        .unwrap_or(0.0)
}

/// Compute global rows for `quantity` from its regional rows.
///
/// Any existing global rows are replaced. With [`Reduction::None`] the quantity is returned as is.
pub fn gen_glb(ctx: &ReportingContext, quantity: &Quantity, reduction: &Reduction) -> Quantity {
    if *reduction == Reduction::None {
        return quantity.clone();
    }

    let global_rows: Vec<(QuantityKey, YearValues)> = group_regional_rows(ctx, quantity)
        .into_iter()
        .map(|(global_key, rows)| {
            let values = match reduction {
                Reduction::None | Reduction::Sum => {
                    reduce(ctx, &rows, |v| v.iter().map(|(_, v)| v).sum())
                }
                Reduction::Max => reduce(ctx, &rows, |v| {
                    v.iter().map(|(_, v)| *v).fold(f64::NEG_INFINITY, f64::max)
                }),
                Reduction::Mean => reduce(ctx, &rows, |v| {
                    safe_ratio(v.iter().map(|(_, v)| v).sum(), v.len() as f64)
                }),
                Reduction::WeightedAvg(weights) => ctx
                    .years()
                    .iter()
                    .map(|year| {
                        let mut numerator = 0.0;
                        let mut denominator = 0.0;
                        for (key, values) in &rows {
                            let w = weight(weights, key, year);
                            numerator += values.get(&year).copied().unwrap_or(0.0) * w;
                            denominator += w;
                        }
                        (year, safe_ratio(numerator, denominator))
                    })
                    .collect(),
            };
            (global_key, values)
        })
        .collect();

    let mut out = rem_glb(ctx, quantity);
    for (key, values) in global_rows {
        *out.row_mut(key) = values;
    }

    clean_up_formatting(ctx, out)
}

/// Replace the value of every regional row with the value of the matching global row.
///
/// Regional rows with no matching global row are set to zero.
pub fn aggr_glb(ctx: &ReportingContext, quantity: &Quantity) -> Quantity {
    let global = ctx.global_region();
    let mut out = quantity.clone();
    for (key, values) in out.iter_mut() {
        if key.region == *global {
            continue;
        }
        let global_values = quantity.row(&key.in_region(global));
        for (year, value) in values.iter_mut() {
            *value = global_values
                .and_then(|row| row.get(year))
                .copied()
                .unwrap_or(0.0);
        }
    }

    out
}

/// Replace the value of every regional row with the sum over all regions.
///
/// Global rows are left as they are.
pub fn aggr_reg(ctx: &ReportingContext, quantity: &Quantity) -> Quantity {
    let totals = gen_glb(ctx, &rem_glb(ctx, quantity), &Reduction::Sum);
    let mut out = quantity.clone();
    let global = ctx.global_region();
    for (key, values) in out.iter_mut() {
        if key.region == *global {
            continue;
        }
        let total = totals.row(&key.in_region(global));
        for (year, value) in values.iter_mut() {
            *value = total.and_then(|row| row.get(year)).copied().unwrap_or(0.0);
        }
    }

    out
}

/// Remove global rows
pub fn rem_glb(ctx: &ReportingContext, quantity: &Quantity) -> Quantity {
    let mut out = quantity.clone();
    out.retain(|key| key.region != *ctx.global_region());
    out
}

/// Remove regional rows, keeping only global rows
pub fn rem_reg(ctx: &ReportingContext, quantity: &Quantity) -> Quantity {
    let mut out = quantity.clone();
    out.retain(|key| key.region == *ctx.global_region());
    out
}
