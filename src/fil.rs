//! Code for reading regional scaling factors from fil files.
//!
//! A fil file is a CSV file named `{region}-{factor}.fil` with `year` and `value` columns.
use crate::context::ReportingContext;
use crate::input::{deserialise_finite, input_err_msg, is_sorted_and_unique, read_csv};
use crate::quantity::{Quantity, QuantityKey};
use anyhow::{Context, Result, ensure};
use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// The unit of fil factors
pub const FIL_UNIT: &str = "-";

#[derive(Debug, Deserialize, PartialEq)]
struct FilRecord {
    year: u32,
    #[serde(deserialize_with = "deserialise_finite")]
    value: f64,
}

/// The path of the fil file for a region and factor
pub fn fil_path(fil_dir: &Path, region: &str, factor: &str) -> PathBuf {
    fil_dir.join(format!("{region}-{factor}.fil"))
}

/// Read the values of a fil file, checking that years are in order and unique
fn read_fil_file(file_path: &Path) -> Result<Vec<(u32, f64)>> {
    let points: Vec<(u32, f64)> = read_csv::<FilRecord>(file_path)?
        .map(|record| (record.year, record.value))
        .collect();
    ensure!(
        is_sorted_and_unique(points.iter().map(|(year, _)| *year)),
        "Years in {} must be in order and unique",
        file_path.display()
    );

    Ok(points)
}

/// Linearly interpolate between `points` at `year`, holding the end values constant outside them.
///
/// `points` must be non-empty and sorted by year.
pub fn interpolate(points: &[(u32, f64)], year: u32) -> f64 {
    let Some(next) = points.iter().position(|(y, _)| *y >= year) else {
        return points.last().map_or(0.0, |(_, value)| *value);
    };
    let (y1, v1) = points[next];
    if next == 0 || y1 == year {
        return v1;
    }

    let (y0, v0) = points[next - 1];
    let fraction = f64::from(year - y0) / f64::from(y1 - y0);
    v0 + (v1 - v0) * fraction
}

/// Read a factor for every region in the context, interpolated onto the context's years.
///
/// Regions without a fil file for the factor are absent from the result.
pub fn read_fil_factor(ctx: &ReportingContext, factor: &str) -> Result<Quantity> {
    let mut quantity = Quantity::new(FIL_UNIT);
    for region in ctx.regions().iter() {
        let file_path = fil_path(ctx.fil_dir(), region.as_str(), factor);
        if !file_path.is_file() {
            debug!("No fil file for {factor} in {region}");
            continue;
        }

        let points = read_fil_file(&file_path).with_context(|| input_err_msg(&file_path))?;
        for year in ctx.years().iter() {
            quantity.set(
                QuantityKey::region(region.clone()),
                year,
                interpolate(&points, year),
            );
        }
    }

    Ok(quantity)
}
