//! Defines a `GraphicalModel`, which is a Bayesian (directed) or Markovian (undirected) graphical
//! model representing the factorization of a probability distribution P.
//!
//! Nodes of a model are identified by a `NodeId`, dense from zero in the order in which the
//! builder received them. Inference engines only talk to a model through this trait.

use crate::factor::Factor;
use crate::instantiation::Instantiation;
use crate::util::Result;
use crate::variable::Variable;

use std::collections::BTreeSet;

/// Identifier of a node in a `GraphicalModel`
pub type NodeId = usize;

/// An ordered set of nodes
pub type NodeSet = BTreeSet<NodeId>;

/// The `GraphicalModel` trait represents a Probabilistic Graphical Model.
pub trait GraphicalModel {

    /// Get the number of nodes in the model
    fn size(&self) -> usize;

    /// Get all the nodes of the model
    fn nodes(&self) -> NodeSet;

    /// Check if `node` is a node of the model
    fn exists(&self, node: NodeId) -> bool;

    /// Get the `Variable` of a node
    ///
    /// # Errors
    /// * `BayesError::UndefinedElement` if the node does not exist
    fn variable(&self, node: NodeId) -> Result<&Variable>;

    /// Get the node of a `Variable`
    fn node_id(&self, var: &Variable) -> Result<NodeId>;

    /// Lookup a node based on the name of its `Variable`
    fn id_from_name(&self, name: &str) -> Result<NodeId>;

    /// Get the name of the `Variable` of a node
    fn name(&self, node: NodeId) -> Result<&str>;

    /// Parents of a node. Always empty in an undirected model.
    fn parents(&self, node: NodeId) -> Result<NodeSet>;

    /// Children of a node. Always empty in an undirected model.
    fn children(&self, node: NodeId) -> Result<NodeSet>;

    /// Nodes adjacent to `node`, regardless of the direction of the edges
    fn neighbours(&self, node: NodeId) -> Result<NodeSet>;

    fn is_directed(&self) -> bool;

    /// Order of the nodes in which every node comes after its parents
    fn topological_order(&self) -> Vec<NodeId>;

    /// The `Factor`s whose product is the (unnormalized) joint distribution: the CPDs of a
    /// Bayesian network, the potentials of a Markov network.
    fn factors(&self) -> Vec<&Factor>;

    /// Determine the probability of a full `Instantiation` of the `Variable`s in the model.
    ///
    /// # Errors
    /// * `BayesError::NotFound` if `assignment` misses a `Variable` of the model
    fn probability(&self, assignment: &Instantiation) -> Result<f64>;

    /// The smallest subset of `conditioning` that separates `target` from the rest of
    /// `conditioning`: ```P(target | conditioning) = P(target | result)```.
    ///
    /// If `target` is itself in `conditioning`, the result is ```{target}```.
    fn minimal_conditioning_set(&self, target: NodeId, conditioning: &NodeSet) -> Result<NodeSet>;

}

/// Product of the values of `factors` at the restriction of `assignment`
pub(crate) fn product_at(factors: &[&Factor], assignment: &Instantiation) -> Result<f64> {
    factors.iter()
           .map(|f| f.get_restricted(assignment))
           .fold(Ok(1.0), |acc, val| acc.and_then(|p| val.map(|v| p * v)))
}

pub mod directed;
pub mod undirected;

pub use self::directed::{DirectedModel, DirectedModelBuilder};
pub use self::undirected::{UndirectedModel, UndirectedModelBuilder};

/// Textbook models shared by the unit tests
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::init::Initialization;

    use ndarray::array;

    /// The student network, Koller & Friedman Figure 3.4
    pub fn student() -> DirectedModel {
        let d = Variable::binary("D");
        let i = Variable::binary("I");
        let g = Variable::binary("G");
        let s = Variable::binary("S");
        let l = Variable::binary("L");

        let g_cpd = Factor::from_array(
            vec![i.clone(), d.clone(), g.clone()],
            array![[[0.3, 0.7], [0.05, 0.95]], [[0.9, 0.1], [0.5, 0.5]]].into_dyn()
        ).unwrap();
        let s_cpd = Factor::from_array(
            vec![i.clone(), s.clone()],
            array![[0.95, 0.05], [0.2, 0.8]].into_dyn()
        ).unwrap();
        let l_cpd = Factor::from_array(
            vec![g.clone(), l.clone()],
            array![[0.9, 0.1], [0.4, 0.6]].into_dyn()
        ).unwrap();

        DirectedModelBuilder::new()
            .with_variable(&d, &[], Initialization::Binomial(0.6))
            .with_variable(&i, &[], Initialization::Binomial(0.7))
            .with_variable(&g, &[i.clone(), d.clone()], Initialization::Table(g_cpd))
            .with_variable(&s, &[i.clone()], Initialization::Table(s_cpd))
            .with_variable(&l, &[g.clone()], Initialization::Table(l_cpd))
            .build()
            .unwrap()
    }

    /// The misconception network, Koller & Friedman Section 4.1
    pub fn misconception() -> UndirectedModel {
        let a = Variable::binary("A");
        let b = Variable::binary("B");
        let c = Variable::binary("C");
        let d = Variable::binary("D");

        let table = |x: &Variable, y: &Variable, t: [[f64; 2]; 2]| {
            let f = Factor::from_values(
                vec![x.clone(), y.clone()],
                vec![t[0][0], t[1][0], t[0][1], t[1][1]]
            ).unwrap();
            Initialization::Table(f)
        };

        UndirectedModelBuilder::new()
            .with_variable(&a)
            .with_variable(&b)
            .with_variable(&c)
            .with_variable(&d)
            .with_factor(&[a.clone(), b.clone()], table(&a, &b, [[30.0, 5.0], [1.0, 10.0]]))
            .with_factor(&[b.clone(), c.clone()], table(&b, &c, [[100.0, 1.0], [1.0, 100.0]]))
            .with_factor(&[c.clone(), d.clone()], table(&c, &d, [[1.0, 100.0], [100.0, 1.0]]))
            .with_factor(&[d.clone(), a.clone()], table(&d, &a, [[100.0, 1.0], [1.0, 100.0]]))
            .build()
            .unwrap()
    }
}
