//! The query interface to a scenario's sets, parameters and solution variables.
//!
//! The reporting engine only depends on the [`ScenarioStore`] trait. [`ScenarioData`] is an
//! in-memory implementation which can be loaded from a directory of CSV files.
use crate::input::input_err_msg;
use crate::units::Unit;
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use log::debug;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use strum::{Display, EnumString, IntoStaticStr};

/// An index dimension of a scenario item.
///
/// Variants are named after the index sets of the optimisation model.
#[allow(missing_docs)]
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum Dimension {
    Node,
    NodeLoc,
    NodeRel,
    NodeDest,
    NodeOrigin,
    Technology,
    Commodity,
    Level,
    Relation,
    Mode,
    Emission,
    TypeEmission,
    TypeTec,
    Grade,
    Year,
    YearAct,
    YearVtg,
    YearRel,
    Time,
    TimeDest,
    TimeOrigin,
}

/// Which field of a solution variable to retrieve
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VarField {
    /// The primal value
    Level,
    /// The dual value
    Marginal,
}

/// The dimensions of the standard scenario items used by the reporting tables
pub fn standard_dimensions(item: &str) -> Option<&'static [Dimension]> {
    use Dimension::{
        Commodity, Emission, Grade, Level, Mode, Node, NodeDest, NodeLoc, NodeOrigin, NodeRel,
        Relation, Technology, Time, TimeDest, TimeOrigin, TypeEmission, TypeTec, Year, YearAct,
        YearRel, YearVtg,
    };

    let dims: &'static [Dimension] = match item {
        "ACT" => &[NodeLoc, Technology, YearVtg, YearAct, Mode, Time],
        "CAP" => &[NodeLoc, Technology, YearVtg, YearAct],
        "CAP_NEW" => &[NodeLoc, Technology, YearVtg],
        "EXT" => &[Node, Commodity, Grade, Year],
        "EMISS" => &[Node, Emission, TypeTec, Year],
        "PRICE_COMMODITY" => &[Node, Commodity, Level, Year, Time],
        "PRICE_EMISSION" => &[Node, TypeEmission, TypeTec, Year],
        "output" => &[
            NodeLoc, Technology, YearVtg, YearAct, Mode, NodeDest, Commodity, Level, Time,
            TimeDest,
        ],
        "input" => &[
            NodeLoc, Technology, YearVtg, YearAct, Mode, NodeOrigin, Commodity, Level, Time,
            TimeOrigin,
        ],
        "emission_factor" => &[NodeLoc, Technology, YearVtg, YearAct, Mode, Emission],
        "relation_activity" => &[Relation, NodeRel, YearRel, NodeLoc, Technology, YearAct, Mode],
        "demand" => &[Node, Commodity, Level, Year, Time],
        "historical_emission" => &[Node, Emission, TypeTec, Year],
        "gdp_calibrate" => &[Node, Year],
        _ => return None,
    };

    Some(dims)
}

/// A typed filter on the index dimensions of a scenario item.
///
/// A row matches if, for every dimension in the filter, its key is one of the allowed values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryFilter(IndexMap<Dimension, Vec<String>>);

impl QueryFilter {
    /// Create a filter which matches every row
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict `dim` to the given values
    pub fn with<I, S>(mut self, dim: Dimension, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0
            .entry(dim)
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Build a filter from dimension names and values.
    ///
    /// Unknown dimension names are an error.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a [&'a str])>,
    {
        let mut filter = Self::new();
        for (name, values) in pairs {
            let dim = Dimension::from_str(name)
                .ok()
                .with_context(|| format!("Unknown filter dimension: {name}"))?;
            filter = filter.with(dim, values.iter().copied());
        }

        Ok(filter)
    }

    /// The dimensions constrained by this filter
    pub fn dimensions(&self) -> impl Iterator<Item = Dimension> + '_ {
        self.0.keys().copied()
    }

    /// Whether the filter constrains nothing
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether a row satisfies the filter
    pub fn matches(&self, row: &StoreRow) -> bool {
        self.0.iter().all(|(dim, values)| {
            row.get(*dim)
                .is_some_and(|key| values.iter().any(|v| v == key))
        })
    }
}

/// A row returned by a [`ScenarioStore`] query
#[derive(Debug, Clone, PartialEq)]
pub struct StoreRow {
    /// The index keys of the row
    pub keys: IndexMap<Dimension, String>,
    /// The requested value
    pub value: f64,
    /// The unit of the value, where the item carries one
    pub unit: Option<Unit>,
}

impl StoreRow {
    /// The key for a dimension
    pub fn get(&self, dim: Dimension) -> Option<&str> {
        self.keys.get(&dim).map(String::as_str)
    }

    /// The key for a dimension, parsed as a year
    pub fn year(&self, dim: Dimension) -> Result<Option<u32>> {
        self.get(dim)
            .map(|s| {
                s.parse()
                    .with_context(|| format!("Invalid year for {dim}: {s}"))
            })
            .transpose()
    }
}

/// Read-only access to the data of a single scenario
pub trait ScenarioStore {
    /// The members of a set
    fn set(&self, name: &str) -> Result<Vec<String>>;

    /// Rows of a parameter
    fn par(&self, name: &str, filter: &QueryFilter) -> Result<Vec<StoreRow>>;

    /// Rows of a solution variable
    fn var(&self, name: &str, filter: &QueryFilter, field: VarField) -> Result<Vec<StoreRow>>;
}

/// Check that every dimension in `filter` is an index of the item
fn check_filter(name: &str, dims: &[Dimension], filter: &QueryFilter) -> Result<()> {
    for dim in filter.dimensions() {
        ensure!(
            dims.contains(&dim),
            "Filter dimension {dim} is not an index of {name}"
        );
    }

    Ok(())
}

/// A stored row, holding both fields of a variable
#[derive(Debug, Clone, PartialEq)]
struct ItemRow {
    keys: IndexMap<Dimension, String>,
    level: f64,
    marginal: f64,
    unit: Option<Unit>,
}

/// The rows of a single parameter or variable
#[derive(Debug, Clone, PartialEq)]
struct ItemTable {
    dims: Vec<Dimension>,
    rows: Vec<ItemRow>,
}

impl ItemTable {
    fn query(&self, name: &str, filter: &QueryFilter, field: VarField) -> Result<Vec<StoreRow>> {
        check_filter(name, &self.dims, filter)?;

        let rows = self
            .rows
            .iter()
            .map(|row| StoreRow {
                keys: row.keys.clone(),
                value: match field {
                    VarField::Level => row.level,
                    VarField::Marginal => row.marginal,
                },
                unit: row.unit.clone(),
            })
            .filter(|row| filter.matches(row))
            .collect();

        Ok(rows)
    }

    fn push(&mut self, name: &str, row: ItemRow) -> Result<()> {
        ensure!(
            row.keys.keys().copied().eq(self.dims.iter().copied()),
            "Row for {name} has dimensions {:?}, expected {:?}",
            row.keys.keys().collect::<Vec<_>>(),
            self.dims
        );
        self.rows.push(row);

        Ok(())
    }
}

/// An in-memory [`ScenarioStore`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScenarioData {
    sets: IndexMap<String, Vec<String>>,
    pars: IndexMap<String, ItemTable>,
    vars: IndexMap<String, ItemTable>,
}

impl ScenarioData {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add members to a set
    pub fn add_set<I, S>(&mut self, name: &str, members: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sets
            .entry(name.to_string())
            .or_default()
            .extend(members.into_iter().map(Into::into));
    }

    /// Add a row to a parameter. All rows of a parameter must have the same dimensions.
    pub fn add_par_row(
        &mut self,
        name: &str,
        keys: &[(Dimension, &str)],
        value: f64,
        unit: &str,
    ) -> Result<()> {
        let row = ItemRow {
            keys: to_keys(keys),
            level: value,
            marginal: 0.0,
            unit: Some(unit.into()),
        };
        add_row(&mut self.pars, name, row)
    }

    /// Add a row to a variable. All rows of a variable must have the same dimensions.
    pub fn add_var_row(
        &mut self,
        name: &str,
        keys: &[(Dimension, &str)],
        level: f64,
        marginal: f64,
    ) -> Result<()> {
        let row = ItemRow {
            keys: to_keys(keys),
            level,
            marginal,
            unit: None,
        };
        add_row(&mut self.vars, name, row)
    }

    /// Load a scenario from CSV files.
    ///
    /// The directory may contain `set/`, `par/` and `var/` subfolders, each holding one CSV file
    /// per item named after the item. Set files have a single column. Parameter files have one
    /// column per dimension plus `value` and `unit`. Variable files have one column per dimension
    /// plus `lvl` and `mrg`.
    pub fn from_path(scenario_dir: &Path) -> Result<Self> {
        let mut data = Self::new();

        for (name, file_path) in list_csv_files(&scenario_dir.join("set"))? {
            let mut reader = csv::Reader::from_path(&file_path)
                .with_context(|| input_err_msg(&file_path))?;
            let members: Vec<String> = reader
                .records()
                .map(|record| {
                    let record = record?;
                    Ok(record.get(0).unwrap_or_default().trim().to_string())
                })
                .collect::<Result<_, csv::Error>>()
                .with_context(|| input_err_msg(&file_path))?;
            data.add_set(&name, members);
        }

        for (name, file_path) in list_csv_files(&scenario_dir.join("par"))? {
            let table = read_item_table(&file_path, ItemKind::Parameter)
                .with_context(|| input_err_msg(&file_path))?;
            data.pars.insert(name, table);
        }

        for (name, file_path) in list_csv_files(&scenario_dir.join("var"))? {
            let table = read_item_table(&file_path, ItemKind::Variable)
                .with_context(|| input_err_msg(&file_path))?;
            data.vars.insert(name, table);
        }

        Ok(data)
    }

    fn query(
        tables: &IndexMap<String, ItemTable>,
        name: &str,
        filter: &QueryFilter,
        field: VarField,
    ) -> Result<Vec<StoreRow>> {
        if let Some(table) = tables.get(name) {
            return table.query(name, filter, field);
        }

        // No data for this item: still catch filters which could never match
        if let Some(dims) = standard_dimensions(name) {
            check_filter(name, dims, filter)?;
        }
        debug!("No data found for {name}");

        Ok(Vec::new())
    }
}

impl ScenarioStore for ScenarioData {
    fn set(&self, name: &str) -> Result<Vec<String>> {
        Ok(self.sets.get(name).cloned().unwrap_or_default())
    }

    fn par(&self, name: &str, filter: &QueryFilter) -> Result<Vec<StoreRow>> {
        Self::query(&self.pars, name, filter, VarField::Level)
    }

    fn var(&self, name: &str, filter: &QueryFilter, field: VarField) -> Result<Vec<StoreRow>> {
        Self::query(&self.vars, name, filter, field)
    }
}

fn to_keys(keys: &[(Dimension, &str)]) -> IndexMap<Dimension, String> {
    keys.iter()
        .map(|(dim, key)| (*dim, (*key).to_string()))
        .collect()
}

fn add_row(tables: &mut IndexMap<String, ItemTable>, name: &str, row: ItemRow) -> Result<()> {
    let table = tables.entry(name.to_string()).or_insert_with(|| ItemTable {
        dims: row.keys.keys().copied().collect(),
        rows: Vec::new(),
    });
    table.push(name, row)
}

/// Find the CSV files in a folder, returning the item name (file stem) and path for each
fn list_csv_files(dir_path: &Path) -> Result<Vec<(String, std::path::PathBuf)>> {
    if !dir_path.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir_path).with_context(|| input_err_msg(dir_path))? {
        let path = entry?.path();
        if !path.extension().is_some_and(|ext| ext == "csv") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(std::ffi::OsStr::to_str) {
            files.push((stem.to_string(), path.clone()));
        }
    }
    files.sort();

    Ok(files)
}

#[derive(Clone, Copy, PartialEq)]
enum ItemKind {
    Parameter,
    Variable,
}

/// The role of a column in an item CSV file
enum Column {
    Key(Dimension),
    Value,
    Unit,
    Level,
    Marginal,
}

fn read_item_table(file_path: &Path, kind: ItemKind) -> Result<ItemTable> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(file_path)?;

    let columns: Vec<Column> = reader
        .headers()?
        .iter()
        .map(|header| match (header, kind) {
            ("value", ItemKind::Parameter) => Ok(Column::Value),
            ("unit", ItemKind::Parameter) => Ok(Column::Unit),
            ("lvl", ItemKind::Variable) => Ok(Column::Level),
            ("mrg", ItemKind::Variable) => Ok(Column::Marginal),
            _ => Dimension::from_str(header)
                .map(Column::Key)
                .ok()
                .with_context(|| format!("Unknown column: {header}")),
        })
        .collect::<Result<_>>()?;

    let dims: Vec<Dimension> = columns
        .iter()
        .filter_map(|column| match column {
            Column::Key(dim) => Some(*dim),
            _ => None,
        })
        .collect();
    match kind {
        ItemKind::Parameter => ensure!(
            columns.iter().any(|c| matches!(c, Column::Value)),
            "Missing value column"
        ),
        ItemKind::Variable => ensure!(
            columns.iter().any(|c| matches!(c, Column::Level)),
            "Missing lvl column"
        ),
    }

    let mut table = ItemTable {
        dims,
        rows: Vec::new(),
    };
    for record in reader.records() {
        let record = record?;
        let mut row = ItemRow {
            keys: IndexMap::new(),
            level: 0.0,
            marginal: 0.0,
            unit: None,
        };
        for (column, field) in columns.iter().zip(record.iter()) {
            let parse_value = || {
                field
                    .parse::<f64>()
                    .with_context(|| format!("Invalid value: {field}"))
            };
            match column {
                Column::Key(dim) => {
                    row.keys.insert(*dim, field.to_string());
                }
                Column::Value | Column::Level => row.level = parse_value()?,
                Column::Marginal => row.marginal = parse_value()?,
                Column::Unit => row.unit = Some(field.into()),
            }
        }
        table.rows.push(row);
    }

    Ok(table)
}
