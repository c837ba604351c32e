//! Defines a `DirectedModel`, which is a Bayesian model that represents the factorization of
//! a probability distribution P

use super::{product_at, GraphicalModel, NodeId, NodeSet};
use crate::factor::Factor;
use crate::init::Initialization;
use crate::instantiation::Instantiation;
use crate::util::{BayesError, Result};
use crate::variable::Variable;

use bidir_map::BidirMap;
use indexmap::IndexMap;
use tracing::trace;

use std::iter;

/// A node of the DAG and its CPD
struct Node {
    variable: Variable,

    /// ```P(variable | parents)```, over the parents' variables followed by `variable`
    cpd: Factor,

    parents: NodeSet,

    children: NodeSet,
}

/// Represents a Bayesian Network - a Directed Probabilistic Graphical Model.
///
/// # Representation
/// The nodes are held in their topological order along with their Conditional Probability
/// Distribution (CPD). The factor associated with a node ```X``` has scope ```Pa(X) U X```, and
/// the arcs of the DAG are ```P -> X forall P in Pa(X)```.
pub struct DirectedModel {

    graph: IndexMap<NodeId, Node>,

    /// The names of each node. This is a two way lookup ```(NodeId->Name)``` and
    /// ```(Name->NodeId)```
    names: BidirMap<NodeId, String>

}

/// Direction the ball travels when it reaches a node in a Bayes-ball traversal
#[derive(Clone, Copy)]
enum Pass {
    /// reached from a child
    Up,
    /// reached from a parent
    Down,
}

impl DirectedModel {

    /// Get the CPD of a node in this model.
    pub fn cpd(&self, node: NodeId) -> Result<&Factor> {
        self.node(node).map(|n| &n.cpd)
    }

    fn node(&self, node: NodeId) -> Result<&Node> {
        self.graph.get(&node).ok_or_else(|| BayesError::undefined_node(node))
    }

    /// Check if the arc ```from -> to``` is in the DAG
    pub fn has_arc(&self, from: NodeId, to: NodeId) -> bool {
        self.graph.get(&to).map_or(false, |n| n.parents.contains(&from))
    }

    /// All the arcs of the DAG, as ```(tail, head)``` pairs
    pub fn arcs(&self) -> Vec<(NodeId, NodeId)> {
        self.graph
            .iter()
            .flat_map(|(&id, n)| n.parents.iter().map(move |&p| (p, id)))
            .collect()
    }

}

impl GraphicalModel for DirectedModel {

    fn size(&self) -> usize {
        self.graph.len()
    }

    fn nodes(&self) -> NodeSet {
        self.graph.keys().cloned().collect()
    }

    fn exists(&self, node: NodeId) -> bool {
        self.graph.contains_key(&node)
    }

    fn variable(&self, node: NodeId) -> Result<&Variable> {
        self.node(node).map(|n| &n.variable)
    }

    fn node_id(&self, var: &Variable) -> Result<NodeId> {
        let id = self.id_from_name(var.name())?;
        if self.node(id)?.variable == *var {
            Ok(id)
        } else {
            Err(BayesError::NotFound(format!("variable {:?} in the model", var)))
        }
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
        self.node(node).map(|n| n.parents.clone())
    }

    fn children(&self, node: NodeId) -> Result<NodeSet> {
        self.node(node).map(|n| n.children.clone())
    }

    fn neighbours(&self, node: NodeId) -> Result<NodeSet> {
        let n = self.node(node)?;
        Ok(n.parents.union(&n.children).cloned().collect())
    }

    fn is_directed(&self) -> bool {
        true
    }

    fn topological_order(&self) -> Vec<NodeId> {
        self.graph.keys().cloned().collect()
    }

    fn factors(&self) -> Vec<&Factor> {
        self.graph.values().map(|n| &n.cpd).collect()
    }

    /// Determine the probability of a full `Instantiation`, by the chain rule.
    fn probability(&self, assignment: &Instantiation) -> Result<f64> {
        product_at(&self.factors(), assignment)
    }

    /// Bayes-ball traversal from `target` (Koller & Friedman, Algorithm 3.1).
    ///
    /// A conditioning node reached by the ball is kept and blocks it, except that a ball coming
    /// from a parent bounces back up to the parents of the observed node (v-structures).
    fn minimal_conditioning_set(&self, target: NodeId, conditioning: &NodeSet) -> Result<NodeSet> {
        let start = self.node(target)?;
        if let Some(&n) = conditioning.iter().find(|&&n| !self.exists(n)) {
            return Err(BayesError::undefined_node(n));
        }

        if conditioning.contains(&target) {
            return Ok(iter::once(target).collect());
        }

        let mut result = NodeSet::new();
        let mut visited_up: NodeSet = iter::once(target).collect();
        let mut visited_down: NodeSet = iter::once(target).collect();

        let mut stack: Vec<(NodeId, Pass)> =
            start.parents.iter().map(|&p| (p, Pass::Up))
                 .chain(start.children.iter().map(|&c| (c, Pass::Down)))
                 .collect();

        while let Some((id, pass)) = stack.pop() {
            let node = self.node(id)?;
            let observed = conditioning.contains(&id);
            match pass {
                Pass::Up => {
                    if !visited_up.insert(id) {
                        continue;
                    }
                    if observed {
                        result.insert(id);
                    } else {
                        stack.extend(node.parents.iter().map(|&p| (p, Pass::Up)));
                        stack.extend(node.children.iter().map(|&c| (c, Pass::Down)));
                    }
                },
                Pass::Down => {
                    if !visited_down.insert(id) {
                        continue;
                    }
                    if observed {
                        result.insert(id);
                        stack.extend(node.parents.iter().map(|&p| (p, Pass::Up)));
                    } else {
                        stack.extend(node.children.iter().map(|&c| (c, Pass::Down)));
                    }
                }
            }
        }

        trace!(target, ?conditioning, ?result, "minimal conditioning set");
        Ok(result)
    }
}


/// An implementation of the [builder pattern] for creating a `DirectedModel`.
///
/// Models must be assembled in topological order: the parents of a `Variable` are added before
/// it.
///
/// [builder pattern]: https://en.wikipedia.org/wiki/Builder_pattern
pub struct DirectedModelBuilder {

    /// The nodes added so far, with their CPDs
    nodes: IndexMap<NodeId, Node>,

    /// The names of each node
    names: BidirMap<NodeId, String>,

    /// The error state of the builder
    err: Option<BayesError>

}


impl DirectedModelBuilder {

    /// Construct a new `DirectedModelBuilder` representing an empty `DirectedModel`
    pub fn new() -> Self {
        DirectedModelBuilder {
            nodes: IndexMap::new(),
            names: BidirMap::new(),
            err: None
        }
    }

    /// Add a `Variable` to the `DirectedModel`. The node is named after the `Variable`.
    ///
    /// # Args
    /// * `var`: the variable to add to the model
    /// * `parents`: the parent variables. The parents must already be in the model.
    /// * `init`: the initialization mechanism for the CPD of `var` in the model.
    pub fn with_variable(
        mut self,
        var: &Variable,
        parents: &[Variable],
        init: Initialization,
    ) -> Self {
        // if we are in an error state, do nothing
        if self.err.is_none() {
            if let Err(e) = self.add_variable(var, parents, init) {
                self.err = Some(e);
            }
        }
        self
    }

    /// Complete building the model.
    ///
    /// # Returns
    /// the `DirectedModel`, or the first error generated during the building process
    pub fn build(self) -> Result<DirectedModel> {
        match self.err {
            Some(e) => Err(e),
            None => Ok(DirectedModel { graph: self.nodes, names: self.names })
        }
    }

    fn add_variable(&mut self, var: &Variable, parents: &[Variable], init: Initialization) -> Result<()> {
        if self.names.contains_second_key(&String::from(var.name())) {
            return Err(BayesError::DuplicateElement(format!("variable {} in the model", var)));
        }

        let mut parent_ids = NodeSet::new();
        for p in parents.iter() {
            let id = self.names
                         .get_by_second(&String::from(p.name()))
                         .cloned()
                         .filter(|id| self.nodes[id].variable == *p)
                         .ok_or_else(|| BayesError::UndefinedElement(
                             format!("parent {} of {} is not in the model", p, var)
                         ))?;
            parent_ids.insert(id);
        }

        let cpd = init.build_cpd(var, parents)?;

        let id = self.nodes.len();
        for p in parent_ids.iter() {
            if let Some(n) = self.nodes.get_mut(p) {
                n.children.insert(id);
            }
        }
        self.nodes.insert(id, Node {
            variable: var.clone(),
            cpd,
            parents: parent_ids,
            children: NodeSet::new(),
        });
        self.names.insert(id, String::from(var.name()));
        Ok(())
    }
}

impl Default for DirectedModelBuilder {
    fn default() -> Self {
        DirectedModelBuilder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::testing::student;

    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn build_empty() {
        let model = DirectedModelBuilder::new().build().unwrap();
        assert_eq!(model.size(), 0);
        assert!(model.nodes().is_empty());
    }

    #[test]
    /// Tests building a model with a single binary variable
    fn build_simple() {
        let v = Variable::binary("foo");
        let model = DirectedModelBuilder::new()
                        .with_variable(&v, &[], Initialization::Uniform)
                        .build()
                        .unwrap();

        assert_eq!(1, model.size());
        let id = model.id_from_name("foo").unwrap();
        assert_eq!("foo", model.name(id).unwrap());
        assert_eq!(&v, model.variable(id).unwrap());
        assert_eq!(id, model.node_id(&v).unwrap());
        assert!(model.node_id(&Variable::binary("foo")).is_err());

        let f = model.cpd(id).unwrap();
        assert_eq!(&[v], f.variables());
        assert_eq!(&[0.5, 0.5], f.values());
    }

    #[test]
    fn builder_errors() {
        let a = Variable::binary("A");
        let b = Variable::binary("B");

        // parents must come first
        let model = DirectedModelBuilder::new()
                        .with_variable(&b, &[a.clone()], Initialization::Uniform)
                        .with_variable(&a, &[], Initialization::Uniform)
                        .build();
        match model {
            Err(BayesError::UndefinedElement(_)) => (),
            _ => panic!("wrong error type")
        };

        let model = DirectedModelBuilder::new()
                        .with_variable(&a, &[], Initialization::Uniform)
                        .with_variable(&Variable::binary("A"), &[], Initialization::Uniform)
                        .build();
        match model {
            Err(BayesError::DuplicateElement(_)) => (),
            _ => panic!("wrong error type")
        };

        let model = DirectedModelBuilder::new()
                        .with_variable(&a, &[], Initialization::Binomial(0.3))
                        .with_variable(&b, &[a.clone()], Initialization::Binomial(0.3))
                        .build();
        assert!(model.is_err());
    }

    #[test]
    /// Example taken from Koller & Friedman Section 3.1.2
    fn intelligence() {
        let intelligence = Variable::binary("I");
        let sat = Variable::binary("S");

        let sfactor = Factor::from_array(
            vec![intelligence.clone(), sat.clone()],
            array![[0.95, 0.05], [0.2, 0.8]].into_dyn()
        ).unwrap();

        let model = DirectedModelBuilder::new()
                        .with_variable(&intelligence, &[], Initialization::Multinomial(&[0.7, 0.3]))
                        .with_variable(&sat, &[intelligence.clone()], Initialization::Table(sfactor))
                        .build()
                        .unwrap();

        assert_eq!(2, model.size());
        assert!(model.has_arc(0, 1));
        assert!(!model.has_arc(1, 0));
        assert_eq!(vec![(0, 1)], model.arcs());

        let mut a = Instantiation::from_vars(&[intelligence.clone(), sat.clone()]).unwrap();
        let expected = [0.7 * 0.95, 0.3 * 0.2, 0.7 * 0.05, 0.3 * 0.8];
        a.set_first();
        for &p in expected.iter() {
            assert_abs_diff_eq!(p, model.probability(&a).unwrap());
            a.inc();
        }

        // partial assignment
        let a = Instantiation::from_vars(&[intelligence]).unwrap();
        assert!(model.probability(&a).is_err());
    }

    #[test]
    fn structure() {
        let model = student();
        let id = |n: &str| model.id_from_name(n).unwrap();
        let set = |ns: &[&str]| ns.iter().map(|n| id(n)).collect::<NodeSet>();

        assert_eq!(set(&["I", "D"]), model.parents(id("G")).unwrap());
        assert_eq!(set(&["G", "S"]), model.children(id("I")).unwrap());
        assert_eq!(set(&["I", "D", "L"]), model.neighbours(id("G")).unwrap());
        assert!(model.parents(42).is_err());

        let order = model.topological_order();
        for (tail, head) in model.arcs() {
            let t = order.iter().position(|&n| n == tail).unwrap();
            let h = order.iter().position(|&n| n == head).unwrap();
            assert!(t < h);
        }
    }

    #[test]
    fn minimal_conditioning_set() {
        let model = student();
        let id = |n: &str| model.id_from_name(n).unwrap();
        let set = |ns: &[&str]| ns.iter().map(|n| id(n)).collect::<NodeSet>();

        assert_eq!(set(&["S", "L"]), model.minimal_conditioning_set(id("I"), &set(&["S", "L"])).unwrap());
        assert_eq!(set(&["G"]), model.minimal_conditioning_set(id("L"), &set(&["G", "I", "D"])).unwrap());
        assert_eq!(set(&["G"]), model.minimal_conditioning_set(id("D"), &set(&["G"])).unwrap());

        // the observed grade opens the v-structure D -> G <- I
        assert_eq!(set(&["L", "S"]), model.minimal_conditioning_set(id("D"), &set(&["L", "S"])).unwrap());
        assert!(model.minimal_conditioning_set(id("D"), &set(&["S"])).unwrap().is_empty());

        assert_eq!(set(&["D"]), model.minimal_conditioning_set(id("D"), &set(&["D", "S"])).unwrap());
        assert!(model.minimal_conditioning_set(id("D"), &iter::once(99).collect::<NodeSet>()).is_err());
    }
}
