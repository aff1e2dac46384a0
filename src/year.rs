//! Code for working with years.
use crate::input::is_sorted_and_unique;
use anyhow::{Context, Result, ensure};
use itertools::Itertools;

/// The ordered set of model period years for a reporting run.
#[derive(Debug, Clone, PartialEq)]
pub struct YearSet {
    years: Vec<u32>,
    first_model_year: u32,
}

impl YearSet {
    /// Create a new [`YearSet`].
    ///
    /// # Arguments
    ///
    /// * `years` - Model period years, which must be sorted and unique
    /// * `first_model_year` - The first year of the optimisation horizon. Years before this are
    ///   historical periods. Defaults to the first year in `years`.
    pub fn new(years: Vec<u32>, first_model_year: Option<u32>) -> Result<Self> {
        ensure!(!years.is_empty(), "No years provided");
        ensure!(
            is_sorted_and_unique(&years),
            "Years must be in order and unique"
        );

        let first_model_year = first_model_year.unwrap_or(years[0]);
        Ok(Self {
            years,
            first_model_year,
        })
    }

    /// Iterate over the years in order
    pub fn iter(&self) -> impl Iterator<Item = u32> + Clone + '_ {
        self.years.iter().copied()
    }

    /// The years as a slice
    pub fn as_slice(&self) -> &[u32] {
        &self.years
    }

    /// The number of years
    pub fn len(&self) -> usize {
        self.years.len()
    }

    /// Whether there are no years (never true for a validated set)
    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    /// Whether the set contains `year`
    pub fn contains(&self, year: u32) -> bool {
        self.years.binary_search(&year).is_ok()
    }

    /// The first year of the optimisation horizon
    pub fn first_model_year(&self) -> u32 {
        self.first_model_year
    }

    /// Whether `year` lies before the optimisation horizon
    pub fn is_historical(&self, year: u32) -> bool {
        year < self.first_model_year
    }
}

/// Parse a string of years separated by semicolons into a vector of u32 years.
///
/// The string can be either "all" (case-insensitive), a single year, or a semicolon-separated list
/// of years (e.g. "2020;2030;2040" or "2020; 2030; 2040")
///
/// # Arguments
///
/// - `s` - Input string to parse
/// - `valid_years` - The possible years which can be referenced in `s`
///
/// # Returns
///
/// A [`Vec`] of years or an error.
pub fn parse_year_str<I, J>(s: &str, valid_years: I) -> Result<Vec<u32>>
where
    I: IntoIterator<Item = u32, IntoIter = J> + Clone,
    J: Iterator<Item = u32> + Clone,
{
    let s = s.trim();
    ensure!(!s.is_empty(), "No years provided");
    let valid_years = valid_years.into_iter();

    if s.eq_ignore_ascii_case("all") {
        return Ok(Vec::from_iter(valid_years));
    }

    let parse_and_validate_year = |s: &str| {
        let year = s.trim().parse::<u32>().ok()?;
        valid_years.clone().contains(&year).then_some(year)
    };
    let years: Vec<_> = s
        .split(';')
        .map(|y| parse_and_validate_year(y).with_context(|| format!("Invalid year: {y}")))
        .try_collect()?;

    ensure!(
        is_sorted_and_unique(&years),
        "Years must be in order and unique"
    );

    Ok(years)
}
