//! The unit-conversion table used to bring retrieved quantities into reporting units.
use crate::id::define_id_type;
use crate::input::{deserialise_finite, input_err_msg, read_csv};
use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::Path;

define_id_type! {Unit}

const UNIT_CONVERSION_FILE_NAME: &str = "unit_conversion.csv";

/// A row of the unit conversion CSV file
#[derive(Debug, Deserialize, PartialEq)]
struct UnitConversionRaw {
    from: String,
    to: String,
    #[serde(deserialize_with = "deserialise_finite")]
    factor: f64,
}

/// Multiplicative factors for converting between pairs of units
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitConversionTable(HashMap<(Unit, Unit), f64>);

impl UnitConversionTable {
    /// Create a new, empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the factor for converting `from` into `to`.
    ///
    /// Registering the same pair twice is an error.
    pub fn insert(&mut self, from: &str, to: &str, factor: f64) -> Result<()> {
        ensure!(
            factor.is_finite(),
            "Conversion factor from {from} to {to} must be finite"
        );

        match self.0.entry((from.into(), to.into())) {
            Entry::Vacant(entry) => {
                entry.insert(factor);
                Ok(())
            }
            Entry::Occupied(_) => {
                anyhow::bail!("Conversion from {from} to {to} is defined more than once")
            }
        }
    }

    /// Add a conversion, returning the updated table (for building tables in code)
    pub fn with(mut self, from: &str, to: &str, factor: f64) -> Result<Self> {
        self.insert(from, to, factor)?;
        Ok(self)
    }

    /// Look up the factor for converting `from` into `to`.
    ///
    /// Converting a unit into itself always succeeds with a factor of one. Returns `None` if no
    /// factor is registered.
    pub fn get(&self, from: &str, to: &str) -> Option<f64> {
        if from == to {
            return Some(1.0);
        }

        self.0.get(&(from.into(), to.into())).copied()
    }

    /// The number of registered conversions
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no conversions are registered
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Read the unit conversion table from the scenario directory.
    ///
    /// # Arguments
    ///
    /// * `scenario_dir` - Folder containing the scenario files
    pub fn from_path(scenario_dir: &Path) -> Result<Self> {
        let file_path = scenario_dir.join(UNIT_CONVERSION_FILE_NAME);
        let rows = read_csv::<UnitConversionRaw>(&file_path)?;
        Self::from_rows(rows).with_context(|| input_err_msg(&file_path))
    }

    fn from_rows<I>(rows: I) -> Result<Self>
    where
        I: Iterator<Item = UnitConversionRaw>,
    {
        let mut table = Self::new();
        for row in rows {
            table.insert(&row.from, &row.to, row.factor)?;
        }

        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use float_cmp::assert_approx_eq;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_get() {
        let table = UnitConversionTable::new().with("GWa", "EJ/yr", 0.03154).unwrap();
        assert_eq!(table.get("GWa", "EJ/yr"), Some(0.03154));
        assert_eq!(table.get("GWa", "GWa"), Some(1.0));
        assert_eq!(table.get("EJ/yr", "GWa"), None);
    }

    #[test]
    fn test_insert_invalid() {
        let mut table = UnitConversionTable::new();
        table.insert("GWa", "EJ/yr", 0.03154).unwrap();
        assert_error!(
            table.insert("GWa", "EJ/yr", 0.03154),
            "Conversion from GWa to EJ/yr is defined more than once"
        );
        assert_error!(
            table.insert("GWa", "TWh", f64::NAN),
            "Conversion factor from GWa to TWh must be finite"
        );
    }

    #[test]
    fn test_from_path() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(UNIT_CONVERSION_FILE_NAME)).unwrap();
            writeln!(file, "from,to,factor\nGWa,EJ/yr,0.03154\nEJ/yr,GWa,31.7058").unwrap();
        }

        let table = UnitConversionTable::from_path(dir.path()).unwrap();
        assert_eq!(table.len(), 2);
        assert_approx_eq!(f64, table.get("EJ/yr", "GWa").unwrap(), 31.7058);
    }

    #[test]
    fn test_from_path_non_finite() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(UNIT_CONVERSION_FILE_NAME)).unwrap();
            writeln!(file, "from,to,factor\nGWa,EJ/yr,inf").unwrap();
        }

        assert!(UnitConversionTable::from_path(dir.path()).is_err());
    }
}
