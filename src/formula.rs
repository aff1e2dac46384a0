//! The registry of formulas which derive reported variables.
//!
//! Each formula computes one or more named output variables from retrieved quantities and from
//! the outputs of formulas it depends on. Formulas are run in dependency order, with independent
//! formulas run in the order in which they were registered.
use crate::aggregate::Reduction;
use crate::context::ReportingContext;
use crate::quantity::Quantity;
use crate::retrieve::Retriever;
use anyhow::{Context, Result, anyhow, bail, ensure};
use indexmap::IndexMap;
use itertools::Itertools;
use log::{debug, info};
use petgraph::Directed;
use petgraph::algo::toposort;
use petgraph::graph::{Graph, NodeIndex};
use petgraph::visit::DfsPostOrder;
use std::fmt;

/// The outputs of a formula, keyed by variable name
pub type FormulaOutputs = IndexMap<String, OutputVariable>;

/// The function which computes a formula's outputs
pub type FormulaFn = fn(&FormulaEnv) -> Result<FormulaOutputs>;

/// A variable computed by a formula, with the rule for computing its global value
#[derive(Debug, Clone, PartialEq)]
pub struct OutputVariable {
    /// The regional values
    pub quantity: Quantity,
    /// How the global value is computed
    pub reduction: Reduction,
}

impl OutputVariable {
    /// A variable whose global value is the sum of regional values
    pub fn sum(quantity: Quantity) -> Self {
        Self::new(quantity, Reduction::Sum)
    }

    /// Create a new output variable
    pub fn new(quantity: Quantity, reduction: Reduction) -> Self {
        Self {
            quantity,
            reduction,
        }
    }
}

/// A registered formula
#[derive(Clone)]
pub struct FormulaDescriptor {
    /// Unique name of the formula
    pub name: String,
    /// Computes the outputs
    pub func: FormulaFn,
    /// Unit arguments and their defaults
    pub units: IndexMap<String, String>,
    /// Names of the output variables the formula produces
    pub outputs: Vec<String>,
    /// Names of formulas whose outputs this formula reads
    pub depends_on: Vec<String>,
}

impl fmt::Debug for FormulaDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormulaDescriptor")
            .field("name", &self.name)
            .field("units", &self.units)
            .field("outputs", &self.outputs)
            .field("depends_on", &self.depends_on)
            .finish_non_exhaustive()
    }
}

impl FormulaDescriptor {
    /// Create a new descriptor with no unit arguments, outputs or dependencies
    pub fn new(name: &str, func: FormulaFn) -> Self {
        Self {
            name: name.to_string(),
            func,
            units: IndexMap::new(),
            outputs: Vec::new(),
            depends_on: Vec::new(),
        }
    }

    /// Declare a unit argument with its default
    pub fn unit(mut self, name: &str, default: &str) -> Self {
        self.units.insert(name.to_string(), default.to_string());
        self
    }

    /// Declare output variables
    pub fn outputs(mut self, outputs: &[&str]) -> Self {
        self.outputs.extend(outputs.iter().map(|o| (*o).to_string()));
        self
    }

    /// Declare dependencies on other formulas
    pub fn depends_on(mut self, formulas: &[&str]) -> Self {
        self.depends_on
            .extend(formulas.iter().map(|f| (*f).to_string()));
        self
    }
}

/// Everything a formula can read while it runs
pub struct FormulaEnv<'a> {
    formula: &'a FormulaDescriptor,
    retriever: &'a Retriever<'a>,
    units: IndexMap<String, String>,
    results: &'a IndexMap<String, FormulaOutputs>,
}

impl<'a> FormulaEnv<'a> {
    /// The reporting context
    pub fn ctx(&self) -> &'a ReportingContext {
        self.retriever.context()
    }

    /// The retrieval adapters
    pub fn pp(&self) -> &'a Retriever<'a> {
        self.retriever
    }

    /// The resolved value of a unit argument
    pub fn unit(&self, name: &str) -> Result<&str> {
        self.units
            .get(name)
            .map(String::as_str)
            .with_context(|| format!("Formula {} has no unit argument {name}", self.formula.name))
    }

    /// An output of a formula this formula depends on
    pub fn output(&self, formula: &str, variable: &str) -> Result<&'a Quantity> {
        ensure!(
            self.formula.depends_on.iter().any(|f| f == formula),
            "Formula {} reads {formula} without declaring a dependency on it",
            self.formula.name
        );
        let outputs = self
            .results
            .get(formula)
            .with_context(|| format!("Formula {formula} has not been run"))?;

        outputs
            .get(variable)
            .map(|output| &output.quantity)
            .with_context(|| format!("Formula {formula} has no output {variable}"))
    }
}

/// An ordered collection of formulas
#[derive(Debug, Default)]
pub struct FormulaRegistry {
    formulas: IndexMap<String, FormulaDescriptor>,
}

impl FormulaRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a formula. Names must be unique.
    pub fn register(&mut self, formula: FormulaDescriptor) -> Result<()> {
        ensure!(
            !self.formulas.contains_key(&formula.name),
            "Formula {} is registered more than once",
            formula.name
        );
        ensure!(
            formula.outputs.iter().all_unique(),
            "Formula {} declares duplicate outputs",
            formula.name
        );
        self.formulas.insert(formula.name.clone(), formula);

        Ok(())
    }

    /// The formula with the given name
    pub fn get(&self, name: &str) -> Option<&FormulaDescriptor> {
        self.formulas.get(name)
    }

    /// Iterate over formulas in registration order
    pub fn iter(&self) -> impl Iterator<Item = &FormulaDescriptor> {
        self.formulas.values()
    }

    /// The number of registered formulas
    pub fn len(&self) -> usize {
        self.formulas.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.formulas.is_empty()
    }

    /// The order in which to run the formulas.
    ///
    /// Every formula comes after the formulas it depends on. Otherwise registration order is kept.
    /// Unknown dependencies and dependency cycles are errors.
    pub fn execution_order(&self) -> Result<Vec<&FormulaDescriptor>> {
        // Edges point from a formula to its dependencies
        let mut graph: Graph<&str, (), Directed> = Graph::new();
        let nodes: IndexMap<&str, NodeIndex> = self
            .formulas
            .keys()
            .map(|name| (name.as_str(), graph.add_node(name.as_str())))
            .collect();
        for formula in self.formulas.values() {
            for dependency in &formula.depends_on {
                let Some(to) = nodes.get(dependency.as_str()) else {
                    bail!(
                        "Formula {} depends on unknown formula {dependency}",
                        formula.name
                    );
                };
                graph.add_edge(nodes[formula.name.as_str()], *to, ());
            }
        }

        toposort(&graph, None).map_err(|cycle| {
            anyhow!(
                "Dependency cycle detected involving formula {}",
                graph[cycle.node_id()]
            )
        })?;

        let mut order = Vec::with_capacity(self.formulas.len());
        let mut dfs = DfsPostOrder::empty(&graph);
        for node in nodes.values() {
            dfs.move_to(*node);
            while let Some(visited) = dfs.next(&graph) {
                order.push(&self.formulas[graph[visited]]);
            }
        }

        Ok(order)
    }

    /// Run every formula, returning the outputs of each keyed by formula name.
    ///
    /// Every formula must produce exactly the outputs it declares, and no output variable may be
    /// produced by more than one formula.
    pub fn run(&self, retriever: &Retriever) -> Result<IndexMap<String, FormulaOutputs>> {
        let ctx = retriever.context();
        let mut results: IndexMap<String, FormulaOutputs> = IndexMap::new();
        for formula in self.execution_order()? {
            debug!("Running formula {}", formula.name);
            let units = formula
                .units
                .iter()
                .map(|(name, default)| {
                    let unit = ctx.unit_arg(name).unwrap_or(default);
                    (name.clone(), unit.to_string())
                })
                .collect();
            let env = FormulaEnv {
                formula,
                retriever,
                units,
                results: &results,
            };
            let outputs = (formula.func)(&env)
                .with_context(|| format!("Formula {} failed", formula.name))?;

            check_outputs(formula, &outputs, &results)?;
            results.insert(formula.name.clone(), outputs);
        }
        info!("Ran {} formulas", results.len());

        Ok(results)
    }
}

/// Check that a formula produced what it declared, with no clashes with earlier formulas
fn check_outputs(
    formula: &FormulaDescriptor,
    outputs: &FormulaOutputs,
    results: &IndexMap<String, FormulaOutputs>,
) -> Result<()> {
    let produced = outputs.keys().sorted().collect_vec();
    let declared = formula.outputs.iter().sorted().collect_vec();
    ensure!(
        produced == declared,
        "Formula {} produced outputs [{}] but declares [{}]",
        formula.name,
        produced.iter().join(", "),
        declared.iter().join(", ")
    );

    for (other, other_outputs) in results {
        if let Some(variable) = outputs.keys().find(|v| other_outputs.contains_key(*v)) {
            bail!(
                "Variable {variable} is produced by both {other} and {}",
                formula.name
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, context, key};
    use crate::store::ScenarioData;
    use indexmap::indexmap;
    use rstest::rstest;

    fn constant(env: &FormulaEnv) -> Result<FormulaOutputs> {
        let unit = env.unit("units_energy")?;
        let quantity = Quantity::from_cells(unit, [(key("R12_AFR"), 2020, 2.0)]);
        Ok(indexmap! {"Base".to_string() => OutputVariable::sum(quantity)})
    }

    fn doubled(env: &FormulaEnv) -> Result<FormulaOutputs> {
        let base = env.output("base", "Base")?;
        Ok(indexmap! {"Doubled".to_string() => OutputVariable::sum(base.scale(2.0))})
    }

    fn undeclared_read(env: &FormulaEnv) -> Result<FormulaOutputs> {
        env.output("base", "Base")?;
        Ok(FormulaOutputs::new())
    }

    fn nothing(_env: &FormulaEnv) -> Result<FormulaOutputs> {
        Ok(FormulaOutputs::new())
    }

    fn names(order: &[&FormulaDescriptor]) -> Vec<String> {
        order.iter().map(|f| f.name.clone()).collect()
    }

    #[test]
    fn test_register_duplicate() {
        let mut registry = FormulaRegistry::new();
        registry
            .register(FormulaDescriptor::new("pe", nothing))
            .unwrap();
        assert_error!(
            registry.register(FormulaDescriptor::new("pe", nothing)),
            "Formula pe is registered more than once"
        );
    }

    #[test]
    fn test_execution_order() {
        let mut registry = FormulaRegistry::new();
        for formula in [
            FormulaDescriptor::new("c", nothing).depends_on(&["b"]),
            FormulaDescriptor::new("a", nothing),
            FormulaDescriptor::new("b", nothing).depends_on(&["a"]),
            FormulaDescriptor::new("d", nothing),
        ] {
            registry.register(formula).unwrap();
        }

        let order = registry.execution_order().unwrap();
        assert_eq!(names(&order), ["a", "b", "c", "d"]);
    }

    #[test]
    fn test_execution_order_unknown_dependency() {
        let mut registry = FormulaRegistry::new();
        registry
            .register(FormulaDescriptor::new("a", nothing).depends_on(&["missing"]))
            .unwrap();
        assert_error!(
            registry.execution_order(),
            "Formula a depends on unknown formula missing"
        );
    }

    #[test]
    fn test_execution_order_cycle() {
        let mut registry = FormulaRegistry::new();
        registry
            .register(FormulaDescriptor::new("a", nothing).depends_on(&["b"]))
            .unwrap();
        registry
            .register(FormulaDescriptor::new("b", nothing).depends_on(&["a"]))
            .unwrap();
        assert!(registry.execution_order().is_err());
    }

    #[rstest]
    fn test_run(context: ReportingContext) {
        let ctx = context.with_unit_args(indexmap! {"units_energy".into() => "GWa".into()});
        let data = ScenarioData::new();
        let retriever = Retriever::new(&ctx, &data);

        let mut registry = FormulaRegistry::new();
        registry
            .register(
                FormulaDescriptor::new("doubled", doubled)
                    .outputs(&["Doubled"])
                    .depends_on(&["base"]),
            )
            .unwrap();
        registry
            .register(
                FormulaDescriptor::new("base", constant)
                    .unit("units_energy", "EJ/yr")
                    .outputs(&["Base"]),
            )
            .unwrap();

        let results = registry.run(&retriever).unwrap();
        assert_eq!(results.keys().collect_vec(), ["base", "doubled"]);
        let doubled = &results["doubled"]["Doubled"].quantity;
        assert_eq!(doubled.get(&key("R12_AFR"), 2020), Some(4.0));

        // Unit argument overridden by the context
        assert_eq!(doubled.unit().as_str(), "GWa");
    }

    #[rstest]
    fn test_run_contract_violations(context: ReportingContext) {
        let data = ScenarioData::new();
        let retriever = Retriever::new(&context, &data);

        // Declared output not produced
        let mut registry = FormulaRegistry::new();
        registry
            .register(FormulaDescriptor::new("a", nothing).outputs(&["A"]))
            .unwrap();
        assert_error!(
            registry.run(&retriever),
            "Formula a produced outputs [] but declares [A]"
        );

        // Output read without declaring the dependency
        let mut registry = FormulaRegistry::new();
        registry
            .register(
                FormulaDescriptor::new("base", constant)
                    .unit("units_energy", "EJ/yr")
                    .outputs(&["Base"]),
            )
            .unwrap();
        registry
            .register(FormulaDescriptor::new("reader", undeclared_read))
            .unwrap();
        let err = registry.run(&retriever).unwrap_err();
        assert_eq!(
            err.chain().nth(1).unwrap().to_string(),
            "Formula reader reads base without declaring a dependency on it"
        );

        // Same variable from two formulas
        let mut registry = FormulaRegistry::new();
        for name in ["base", "again"] {
            registry
                .register(
                    FormulaDescriptor::new(name, constant)
                        .unit("units_energy", "EJ/yr")
                        .outputs(&["Base"]),
                )
                .unwrap();
        }
        assert_error!(
            registry.run(&retriever),
            "Variable Base is produced by both base and again"
        );
    }
}
