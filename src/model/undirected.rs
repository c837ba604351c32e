//! Defines an `UndirectedModel` which is a Markovian model that represents the factorization of a
//! probability distribution P

use super::{product_at, GraphicalModel, NodeId, NodeSet};
use crate::factor::{Factor, TableCombination};
use crate::init::Initialization;
use crate::instantiation::Instantiation;
use crate::util::{BayesError, Result};
use crate::variable::Variable;

use bidir_map::BidirMap;
use indexmap::IndexMap;
use tracing::debug;

use std::iter;

/// Represents a Markovian Network - an Undirected Probabilistic Graphical Model.
///
/// # Representation
/// The network is a collection of `Factor`s. Two nodes are adjacent when they appear together in
/// the scope of some `Factor`.
pub struct UndirectedModel {

    /// The `Variable` of each node
    variables: IndexMap<NodeId, Variable>,

    /// The name <-> node mapping
    names: BidirMap<NodeId, String>,

    /// The `Factor`s that comprise the `UndirectedModel`
    factors: Vec<Factor>,

    /// Nodes sharing a factor with each node
    adjacency: IndexMap<NodeId, NodeSet>,

    /// The partition function of the Gibbs Distribution.
    partition: f64

}


impl UndirectedModel {

    /// Get the partition function of the model.
    pub fn partition(&self) -> f64 {
        self.partition
    }

    fn check(&self, node: NodeId) -> Result<()> {
        if self.exists(node) {
            Ok(())
        } else {
            Err(BayesError::undefined_node(node))
        }
    }
}


impl GraphicalModel for UndirectedModel {

    fn size(&self) -> usize {
        self.variables.len()
    }

    fn nodes(&self) -> NodeSet {
        self.variables.keys().cloned().collect()
    }

    fn exists(&self, node: NodeId) -> bool {
        self.variables.contains_key(&node)
    }

    fn variable(&self, node: NodeId) -> Result<&Variable> {
        self.variables.get(&node).ok_or_else(|| BayesError::undefined_node(node))
    }

    fn node_id(&self, var: &Variable) -> Result<NodeId> {
        self.variables
            .iter()
            .find(|(_, v)| *v == var)
            .map(|(&id, _)| id)
            .ok_or_else(|| BayesError::NotFound(format!("variable {:?} in the model", var)))
    }

    fn id_from_name(&self, name: &str) -> Result<NodeId> {
        self.names
            .get_by_second(&String::from(name))
            .cloned()
            .ok_or_else(|| BayesError::NotFound(format!("variable named {}", name)))
    }

    fn name(&self, node: NodeId) -> Result<&str> {
        self.names
            .get_by_first(&node)
            .map(|n| n.as_str())
            .ok_or_else(|| BayesError::undefined_node(node))
    }

    fn parents(&self, node: NodeId) -> Result<NodeSet> {
        self.check(node).map(|_| NodeSet::new())
    }

    fn children(&self, node: NodeId) -> Result<NodeSet> {
        self.check(node).map(|_| NodeSet::new())
    }

    fn neighbours(&self, node: NodeId) -> Result<NodeSet> {
        self.adjacency.get(&node).cloned().ok_or_else(|| BayesError::undefined_node(node))
    }

    fn is_directed(&self) -> bool {
        false
    }

    fn topological_order(&self) -> Vec<NodeId> {
        self.variables.keys().cloned().collect()
    }

    fn factors(&self) -> Vec<&Factor> {
        self.factors.iter().collect()
    }

    /// Determine the probability of a full `Instantiation`: the product of the potentials
    /// normalized by the partition function
    fn probability(&self, assignment: &Instantiation) -> Result<f64> {
        // a model without factors still constrains its assignments to be complete
        for v in self.variables.values() {
            assignment.val(v)?;
        }
        product_at(&self.factors(), assignment).map(|v| v / self.partition)
    }

    /// Graph separation: the conditioning nodes reachable from `target` without crossing another
    /// conditioning node.
    fn minimal_conditioning_set(&self, target: NodeId, conditioning: &NodeSet) -> Result<NodeSet> {
        self.check(target)?;
        if let Some(&n) = conditioning.iter().find(|&&n| !self.exists(n)) {
            return Err(BayesError::undefined_node(n));
        }

        if conditioning.contains(&target) {
            return Ok(iter::once(target).collect());
        }

        let mut result = NodeSet::new();
        let mut visited: NodeSet = iter::once(target).collect();
        let mut stack = vec![target];
        while let Some(node) = stack.pop() {
            for &n in self.adjacency[&node].iter() {
                if !visited.insert(n) {
                    continue;
                }
                if conditioning.contains(&n) {
                    result.insert(n);
                } else {
                    stack.push(n);
                }
            }
        }
        Ok(result)
    }

}


/// Compute the partition function of a set of `Factor`s: the sum of the product of the `Factor`s
/// over every assignment.
fn compute_partition(factors: &[Factor]) -> Result<f64> {
    match factors.len() {
        0 => Ok(1.0),
        1 => Ok(factors[0].sum()),
        _ => {
            let refs: Vec<&Factor> = factors.iter().collect();
            TableCombination::product().combine(&refs).map(|joint| joint.sum())
        }
    }
}


/// An implementation of the [builder pattern] for creating a `UndirectedModel`.
///
/// [builder pattern]: https://en.wikipedia.org/wiki/Builder_pattern
pub struct UndirectedModelBuilder {

    variables: IndexMap<NodeId, Variable>,

    /// The `Factor`s added to the `UndirectedModel`
    factors: Vec<Factor>,

    /// The name <-> node mapping
    names: BidirMap<NodeId, String>,

    /// The error state of the builder, if any
    err: Option<BayesError>

}

impl UndirectedModelBuilder {

    /// Construct a new `UndirectedModelBuilder`
    pub fn new() -> UndirectedModelBuilder {
        UndirectedModelBuilder {
            variables: IndexMap::new(),
            factors: Vec::new(),
            names: BidirMap::new(),
            err: None
        }
    }

    /// Declare a `Variable` of this `UndirectedModel`.
    ///
    /// This is optional; `Variable`s first seen in `with_factor` are declared on the fly, in the
    /// order of the `Factor`'s scope.
    pub fn with_variable(mut self, var: &Variable) -> Self {
        if self.err.is_none() {
            if let Err(e) = self.declare(var, true) {
                self.err = Some(e);
            }
        }
        self
    }

    /// Add a `Factor` to the `UndirectedModel`.
    ///
    /// # Arguments
    /// * `scope`: the `Variable`s in the scope of the `Factor`
    /// * `init`: the desired method of initializing the `Factor`
    pub fn with_factor(mut self, scope: &[Variable], init: Initialization) -> Self {
        if self.err.is_some() {
            return self;
        }

        let added = init.build_factor(scope).and_then(|f| {
            for v in scope.iter() {
                self.declare(v, false)?;
            }
            self.factors.push(f);
            Ok(())
        });
        if let Err(e) = added {
            self.err = Some(e);
        }

        self
    }

    /// Build the `UndirectedModel`, ensuring consistency of the `Factor`s and `Variable`s
    ///
    /// # Errors
    /// * `BayesError::InvalidArgument` if a declared `Variable` is in no `Factor`, or if the
    ///   partition function is not positive
    pub fn build(self) -> Result<UndirectedModel> {
        if let Some(e) = self.err {
            return Err(e);
        }

        // make sure there are no variables declared but not used in a factor
        if let Some(v) = self.variables.values().find(|v| !self.factors.iter().any(|f| f.contains(v))) {
            return Err(BayesError::InvalidArgument(format!("variable {} is in no factor", v)));
        }

        let mut adjacency: IndexMap<NodeId, NodeSet> =
            self.variables.keys().map(|&id| (id, NodeSet::new())).collect();
        for f in self.factors.iter() {
            let ids: Vec<NodeId> = f.variables()
                                    .iter()
                                    .filter_map(|v| self.variables.iter().find(|(_, w)| *w == v))
                                    .map(|(&id, _)| id)
                                    .collect();
            for &a in ids.iter() {
                if let Some(adj) = adjacency.get_mut(&a) {
                    adj.extend(ids.iter().filter(|&&b| b != a));
                }
            }
        }

        let partition = compute_partition(&self.factors)?;
        if !(partition > 0.0) {
            return Err(BayesError::InvalidArgument(
                String::from("the partition function of the model is not positive")
            ));
        }
        debug!(nodes = self.variables.len(), factors = self.factors.len(), partition, "built undirected model");

        Ok(UndirectedModel {
            variables: self.variables,
            names: self.names,
            factors: self.factors,
            adjacency,
            partition
        })
    }

    /// Register `var`, either explicitly (an error if known) or on the fly (a no-op if known)
    fn declare(&mut self, var: &Variable, explicit: bool) -> Result<()> {
        match self.names.get_by_second(&String::from(var.name())) {
            Some(id) if self.variables[id] == *var && !explicit => Ok(()),
            Some(_) => Err(BayesError::DuplicateElement(format!("variable {} in the model", var))),
            None => {
                let id = self.variables.len();
                self.variables.insert(id, var.clone());
                self.names.insert(id, String::from(var.name()));
                Ok(())
            }
        }
    }

}

impl Default for UndirectedModelBuilder {
    fn default() -> Self {
        UndirectedModelBuilder::new()
    }
}
