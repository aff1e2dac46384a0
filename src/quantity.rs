//! Quantities are the tables on which all reporting arithmetic operates.
//!
//! A [`Quantity`] maps a composite key (region plus optional technology, mode, grade and vintage)
//! to one value per model year, and carries a single unit. Arithmetic between quantities is
//! aligned on the key and the year, with absent cells treated as zero.
use crate::id::define_id_type;
use crate::region::RegionID;
use crate::units::Unit;
use indexmap::IndexMap;
use log::debug;

define_id_type! {TechnologyID}
define_id_type! {ModeID}
define_id_type! {GradeID}

/// Values for each year
pub type YearValues = IndexMap<u32, f64>;

/// The composite index of a row in a [`Quantity`].
///
/// The derived ordering gives the canonical order of the key columns: region, then the
/// technology-like keys, then vintage.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QuantityKey {
    /// The region
    pub region: RegionID,
    /// Technology or commodity label
    pub technology: Option<TechnologyID>,
    /// Mode of operation
    pub mode: Option<ModeID>,
    /// Resource grade
    pub grade: Option<GradeID>,
    /// Vintage year
    pub vintage: Option<u32>,
}

impl QuantityKey {
    /// A key for a region with no further index columns
    pub fn region(region: RegionID) -> Self {
        Self {
            region,
            technology: None,
            mode: None,
            grade: None,
            vintage: None,
        }
    }

    /// Set the technology label
    pub fn with_technology(mut self, technology: TechnologyID) -> Self {
        self.technology = Some(technology);
        self
    }

    /// Set the vintage
    pub fn with_vintage(mut self, vintage: u32) -> Self {
        self.vintage = Some(vintage);
        self
    }

    /// Whether the key has only a region
    pub fn is_region_only(&self) -> bool {
        self.technology.is_none()
            && self.mode.is_none()
            && self.grade.is_none()
            && self.vintage.is_none()
    }

    /// Copy of this key with the region replaced
    pub fn in_region(&self, region: &RegionID) -> Self {
        Self {
            region: region.clone(),
            ..self.clone()
        }
    }

    /// Reduce the key to the columns retained by `grouping`
    pub fn grouped(&self, grouping: Grouping) -> Self {
        let mut key = Self::region(self.region.clone());
        match grouping {
            Grouping::Region => {}
            Grouping::Technology => key.technology.clone_from(&self.technology),
            Grouping::TechnologyMode => {
                key.technology.clone_from(&self.technology);
                key.mode.clone_from(&self.mode);
            }
            Grouping::TechnologyVintage => {
                key.technology.clone_from(&self.technology);
                key.vintage = self.vintage;
            }
            Grouping::Full => key = self.clone(),
        }

        key
    }
}

/// Which key columns survive a group-by
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Grouping {
    /// Sum everything within each region
    Region,
    /// Keep the technology label
    Technology,
    /// Keep the technology label and mode
    TechnologyMode,
    /// Keep the technology label and vintage
    TechnologyVintage,
    /// Keep all key columns
    Full,
}

/// Divide `numerator` by `denominator`, mapping NaN and infinite results to zero.
///
/// Every ratio in the reporting tables goes through this function so that a zero denominator
/// never propagates NaN into downstream variables.
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    let ratio = numerator / denominator;
    if ratio.is_finite() { ratio } else { 0.0 }
}

/// A table of values indexed by [`QuantityKey`] and year, with a unit
#[derive(Clone, Debug, PartialEq)]
pub struct Quantity {
    unit: Unit,
    data: IndexMap<QuantityKey, YearValues>,
}

impl Quantity {
    /// Create a new, empty quantity
    pub fn new(unit: &str) -> Self {
        Self {
            unit: unit.into(),
            data: IndexMap::new(),
        }
    }

    /// Create a quantity from `(key, year, value)` cells, summing duplicate cells
    pub fn from_cells<I>(unit: &str, cells: I) -> Self
    where
        I: IntoIterator<Item = (QuantityKey, u32, f64)>,
    {
        let mut quantity = Self::new(unit);
        for (key, year, value) in cells {
            quantity.add_to(key, year, value);
        }

        quantity
    }

    /// The unit of the values
    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    /// Replace the unit label without touching the values
    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = unit.into();
        self
    }

    /// Whether the quantity has no rows
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The number of rows
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Iterate over the rows
    pub fn iter(&self) -> impl Iterator<Item = (&QuantityKey, &YearValues)> {
        self.data.iter()
    }

    /// Iterate mutably over the rows
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&QuantityKey, &mut YearValues)> {
        self.data.iter_mut()
    }

    /// Iterate over the row keys
    pub fn keys(&self) -> impl Iterator<Item = &QuantityKey> {
        self.data.keys()
    }

    /// The row for a key, if present
    pub fn row(&self, key: &QuantityKey) -> Option<&YearValues> {
        self.data.get(key)
    }

    /// Get or insert the row for a key
    pub fn row_mut(&mut self, key: QuantityKey) -> &mut YearValues {
        self.data.entry(key).or_default()
    }

    /// Remove rows for which `f` returns false
    pub fn retain<F>(&mut self, mut f: F)
    where
        F: FnMut(&QuantityKey) -> bool,
    {
        self.data.retain(|key, _| f(key));
    }

    /// Sort the rows with the given comparator
    pub fn sort_keys_by<F>(&mut self, f: F)
    where
        F: FnMut(&QuantityKey, &QuantityKey) -> std::cmp::Ordering,
    {
        let mut f = f;
        self.data.sort_by(|k1, _, k2, _| f(k1, k2));
    }

    /// Set the value for a cell, replacing any existing value
    pub fn set(&mut self, key: QuantityKey, year: u32, value: f64) {
        self.row_mut(key).insert(year, value);
    }

    /// Add `value` to a cell, inserting it if absent
    pub fn add_to(&mut self, key: QuantityKey, year: u32, value: f64) {
        *self.row_mut(key).entry(year).or_insert(0.0) += value;
    }

    /// The value of a cell, if present
    pub fn get(&self, key: &QuantityKey, year: u32) -> Option<f64> {
        self.data.get(key)?.get(&year).copied()
    }

    /// The total over all rows for a region in a year (zero if there are none)
    pub fn region_total(&self, region: &RegionID, year: u32) -> f64 {
        self.data
            .iter()
            .filter(|(key, _)| key.region == *region)
            .filter_map(|(_, values)| values.get(&year))
            .sum()
    }

    /// The distinct regions present, in order of first appearance
    pub fn regions(&self) -> Vec<RegionID> {
        let mut regions: Vec<RegionID> = Vec::new();
        for key in self.data.keys() {
            if !regions.contains(&key.region) {
                regions.push(key.region.clone());
            }
        }

        regions
    }

    /// The distinct years present, in order of first appearance
    pub fn years(&self) -> Vec<u32> {
        let mut years: Vec<u32> = Vec::new();
        for year in self.data.values().flat_map(IndexMap::keys) {
            if !years.contains(year) {
                years.push(*year);
            }
        }

        years
    }

    /// Whether every row is keyed on region alone
    pub fn is_region_only(&self) -> bool {
        self.data.keys().all(QuantityKey::is_region_only)
    }

    /// Apply `f` to every value
    pub fn map_values<F>(&self, f: F) -> Self
    where
        F: Fn(f64) -> f64,
    {
        let data = self
            .data
            .iter()
            .map(|(key, values)| {
                let values = values.iter().map(|(year, value)| (*year, f(*value)));
                (key.clone(), values.collect())
            })
            .collect();

        Self {
            unit: self.unit.clone(),
            data,
        }
    }

    /// Multiply every value by `factor`
    pub fn scale(&self, factor: f64) -> Self {
        self.map_values(|value| value * factor)
    }

    /// The absolute value of every cell
    pub fn abs(&self) -> Self {
        self.map_values(f64::abs)
    }

    /// Keep positive values, setting negative values to zero
    pub fn keep_positive(&self) -> Self {
        self.map_values(|value| value.max(0.0))
    }

    /// Keep negative values, setting positive values to zero
    pub fn keep_negative(&self) -> Self {
        self.map_values(|value| value.min(0.0))
    }

    /// A quantity of the same shape with every value set to zero
    pub fn zeros_like(&self) -> Self {
        self.map_values(|_| 0.0)
    }

    /// Sum rows into the key columns retained by `grouping`
    pub fn group_by(&self, grouping: Grouping) -> Self {
        let mut out = Self::new(&self.unit.0);
        for (key, values) in &self.data {
            let row = out.row_mut(key.grouped(grouping));
            for (year, value) in values {
                *row.entry(*year).or_insert(0.0) += value;
            }
        }

        out
    }

    /// Sum all rows within each region
    pub fn sum_by_region(&self) -> Self {
        self.group_by(Grouping::Region)
    }

    /// Keep only rows whose technology label is in `technologies`
    pub fn filter_technologies(&self, technologies: &[&str]) -> Self {
        let mut out = self.clone();
        out.retain(|key| {
            key.technology
                .as_ref()
                .is_some_and(|tec| technologies.contains(&tec.as_str()))
        });

        out
    }

    /// Index-aligned sum over the union of keys. The result has the unit of `self`.
    pub fn add(&self, other: &Quantity) -> Self {
        self.check_unit(other, "Adding");
        self.combine(other, false, |a, b| a + b)
    }

    /// Index-aligned difference over the union of keys. The result has the unit of `self`.
    pub fn sub(&self, other: &Quantity) -> Self {
        self.check_unit(other, "Subtracting");
        self.combine(other, false, |a, b| a - b)
    }

    /// Index-aligned product.
    ///
    /// If `other` is keyed on region alone, its values are broadcast across every row of `self`
    /// in the same region. The result has the unit of `self`.
    pub fn mul(&self, other: &Quantity) -> Self {
        let broadcast = other.is_region_only() && !self.is_region_only();
        self.combine(other, broadcast, |a, b| a * b)
    }

    /// Index-aligned division, with zero wherever the result is NaN or infinite.
    ///
    /// Broadcasting follows [`Quantity::mul`]. The result has the unit of `self`.
    pub fn safe_div(&self, other: &Quantity) -> Self {
        let broadcast = other.is_region_only() && !self.is_region_only();
        self.combine(other, broadcast, safe_ratio)
    }

    /// Sum a number of quantities, with the result in `unit`
    pub fn sum<'a, I>(unit: &str, quantities: I) -> Self
    where
        I: IntoIterator<Item = &'a Quantity>,
    {
        quantities
            .into_iter()
            .fold(Self::new(unit), |acc, q| acc.add(q))
    }

    /// Log if `other` is in a different unit to `self`
    fn check_unit(&self, other: &Quantity, operation: &str) {
        if other.unit != self.unit && !other.is_empty() {
            debug!(
                "{operation} quantities in different units: {} and {}",
                self.unit, other.unit
            );
        }
    }

    /// Combine two quantities cell by cell over the union of their keys and years.
    ///
    /// Absent cells are zero. With `broadcast`, `other` is keyed on region alone and its values
    /// are applied to every row of `self` in the same region.
    fn combine<F>(&self, other: &Quantity, broadcast: bool, op: F) -> Self
    where
        F: Fn(f64, f64) -> f64,
    {
        let lookup = |key: &QuantityKey, year: u32| {
            let value = if broadcast {
                other.get(&QuantityKey::region(key.region.clone()), year)
            } else {
                other.get(key, year)
            };
            value.unwrap_or(0.0)
        };

        let mut out = Self::new(&self.unit.0);
        for (key, values) in &self.data {
            let row = out.row_mut(key.clone());
            for (year, value) in values {
                row.insert(*year, op(*value, lookup(key, *year)));
            }
            if let Some(other_values) = (!broadcast).then(|| other.row(key)).flatten() {
                for (year, value) in other_values {
                    row.entry(*year).or_insert_with(|| op(0.0, *value));
                }
            }
        }

        if !broadcast {
            for (key, values) in &other.data {
                if self.data.contains_key(key) {
                    continue;
                }
                let row = out.row_mut(key.clone());
                for (year, value) in values {
                    row.insert(*year, op(0.0, *value));
                }
            }
        }

        out
    }
}
