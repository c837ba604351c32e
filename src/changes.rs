//! Enumerates the graph changes a local search over Bayesian network structures can apply.
//!
//! The enumeration over node pairs is split round-robin across a rayon pool: worker `t` visits
//! the pairs whose index is `t` modulo the number of workers and fills its own set. The sets are
//! merged once every worker is done.

use crate::config::EngineConfig;
use crate::model::{GraphicalModel, NodeId, NodeSet};
use crate::util::{BayesError, Result};

use itertools::Itertools;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::{debug, trace};

use std::collections::{BTreeMap, HashSet};

/// The parents of every node of a directed graph
pub type ParentSets = BTreeMap<NodeId, NodeSet>;

/// An elementary modification of a directed graph. Arcs are given as ```(tail, head)```.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GraphChange {
    ArcAddition(NodeId, NodeId),
    ArcDeletion(NodeId, NodeId),
    ArcReversal(NodeId, NodeId),
}

impl GraphChange {

    pub fn tail(&self) -> NodeId {
        match *self {
            GraphChange::ArcAddition(x, _) | GraphChange::ArcDeletion(x, _) | GraphChange::ArcReversal(x, _) => x
        }
    }

    pub fn head(&self) -> NodeId {
        match *self {
            GraphChange::ArcAddition(_, y) | GraphChange::ArcDeletion(_, y) | GraphChange::ArcReversal(_, y) => y
        }
    }

    /// Apply the change to `parents`
    ///
    /// # Errors
    /// * `BayesError::UndefinedElement` if a node of the change is not in `parents`
    pub fn apply(&self, parents: &mut ParentSets) -> Result<()> {
        let (x, y) = (self.tail(), self.head());
        for n in [x, y].iter() {
            if !parents.contains_key(n) {
                return Err(BayesError::undefined_node(*n));
            }
        }

        match *self {
            GraphChange::ArcAddition(..) => { parents_mut(parents, y)?.insert(x); },
            GraphChange::ArcDeletion(..) => { parents_mut(parents, y)?.remove(&x); },
            GraphChange::ArcReversal(..) => {
                parents_mut(parents, y)?.remove(&x);
                parents_mut(parents, x)?.insert(y);
            }
        }
        Ok(())
    }

}

fn parents_mut(parents: &mut ParentSets, node: NodeId) -> Result<&mut NodeSet> {
    parents.get_mut(&node).ok_or_else(|| BayesError::undefined_node(node))
}

/// A property every graph reached by the search must keep
pub trait StructuralConstraint {

    /// Check that `change` may be applied to `parents`
    fn check(&self, parents: &ParentSets, change: &GraphChange) -> bool;

}

/// Keep the graph acyclic, optionally bounding the number of parents of every node
#[derive(Clone, Debug, Default)]
pub struct DagConstraint {
    max_parents: Option<usize>,
}

impl DagConstraint {

    pub fn new() -> Self {
        DagConstraint { max_parents: None }
    }

    pub fn with_max_parents(max_parents: usize) -> Self {
        DagConstraint { max_parents: Some(max_parents) }
    }

    fn room_for_parent(&self, parents: &ParentSets, node: NodeId) -> bool {
        match (self.max_parents, parents.get(&node)) {
            (Some(max), Some(p)) => p.len() < max,
            _ => true
        }
    }

}

/// Check if there is a directed path from `from` to `to`, ignoring the arc `skip`
fn has_path(parents: &ParentSets, from: NodeId, to: NodeId, skip: Option<(NodeId, NodeId)>) -> bool {
    // walk up from `to`, looking for `from` among its ancestors
    let mut stack = vec![to];
    let mut seen = NodeSet::new();
    while let Some(node) = stack.pop() {
        if !seen.insert(node) {
            continue;
        }
        for &p in parents.get(&node).into_iter().flatten() {
            if skip == Some((p, node)) {
                continue;
            }
            if p == from {
                return true;
            }
            stack.push(p);
        }
    }
    false
}

impl StructuralConstraint for DagConstraint {

    fn check(&self, parents: &ParentSets, change: &GraphChange) -> bool {
        let (x, y) = (change.tail(), change.head());
        if x == y || !parents.contains_key(&x) || !parents.contains_key(&y) {
            return false;
        }
        let has_arc = parents.get(&y).map_or(false, |p| p.contains(&x));

        match *change {
            GraphChange::ArcAddition(..) => {
                !has_arc && self.room_for_parent(parents, y) && !has_path(parents, y, x, None)
            },
            GraphChange::ArcDeletion(..) => has_arc,
            GraphChange::ArcReversal(..) => {
                has_arc && self.room_for_parent(parents, x) && !has_path(parents, x, y, Some((x, y)))
            }
        }
    }

}

/// Generate the changes allowed by a `StructuralConstraint`
pub struct ChangeGenerator<C> {
    config: EngineConfig,
    constraint: C,
}

impl<C: StructuralConstraint + Sync> ChangeGenerator<C> {

    pub fn new(config: EngineConfig, constraint: C) -> Self {
        ChangeGenerator { config, constraint }
    }

    pub fn constraint(&self) -> &C {
        &self.constraint
    }

    /// Candidate changes on the pair ```{x, y}```: deletion and reversal of an existing arc,
    /// additions in both directions otherwise
    fn candidates(parents: &ParentSets, x: NodeId, y: NodeId) -> [GraphChange; 2] {
        let arc = |a: NodeId, b: NodeId| parents.get(&b).map_or(false, |p| p.contains(&a));
        if arc(x, y) {
            [GraphChange::ArcDeletion(x, y), GraphChange::ArcReversal(x, y)]
        } else if arc(y, x) {
            [GraphChange::ArcDeletion(y, x), GraphChange::ArcReversal(y, x)]
        } else {
            [GraphChange::ArcAddition(x, y), GraphChange::ArcAddition(y, x)]
        }
    }

    /// Every change on `parents` that satisfies the constraint
    ///
    /// # Errors
    /// * `BayesError::ThreadPool` if the worker pool cannot be built
    pub fn generate(&self, parents: &ParentSets) -> Result<HashSet<GraphChange>> {
        let pairs: Vec<(NodeId, NodeId)> = parents.keys().cloned().tuple_combinations().collect();

        let pool = ThreadPoolBuilder::new()
                       .num_threads(self.config.threads)
                       .build()
                       .map_err(|e| BayesError::ThreadPool(e.to_string()))?;
        let workers = pool.current_num_threads();
        debug!(pairs = pairs.len(), workers, "generating graph changes");

        let partial: Vec<HashSet<GraphChange>> = pool.install(|| {
            (0..workers).into_par_iter()
                        .map(|t| {
                            let mut local = HashSet::new();
                            for (_, &(x, y)) in pairs.iter().enumerate().filter(|&(i, _)| i % workers == t) {
                                for change in Self::candidates(parents, x, y).iter() {
                                    if self.constraint.check(parents, change) {
                                        local.insert(*change);
                                    }
                                }
                            }
                            trace!(worker = t, changes = local.len(), "worker done");
                            local
                        })
                        .collect()
        });

        Ok(partial.into_iter().fold(HashSet::new(), |mut all, local| {
            all.extend(local);
            all
        }))
    }

    /// Every change on the graph of `model` that satisfies the constraint
    pub fn generate_for<M: GraphicalModel>(&self, model: &M) -> Result<HashSet<GraphChange>> {
        let parents = model.nodes()
                           .into_iter()
                           .map(|n| model.parents(n).map(|p| (n, p)))
                           .collect::<Result<ParentSets>>()?;
        self.generate(&parents)
    }

}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::testing::student;

    use super::GraphChange::*;

    fn graph(nodes: usize, arcs: &[(NodeId, NodeId)]) -> ParentSets {
        let mut parents: ParentSets = (0..nodes).map(|n| (n, NodeSet::new())).collect();
        for &(x, y) in arcs.iter() {
            parents.get_mut(&y).unwrap().insert(x);
        }
        parents
    }

    fn changes(list: &[GraphChange]) -> HashSet<GraphChange> {
        list.iter().cloned().collect()
    }

    #[test]
    fn empty_graph() {
        let generator = ChangeGenerator::new(EngineConfig::default(), DagConstraint::new());
        let all = generator.generate(&graph(3, &[])).unwrap();
        assert_eq!(changes(&[
            ArcAddition(0, 1), ArcAddition(1, 0),
            ArcAddition(0, 2), ArcAddition(2, 0),
            ArcAddition(1, 2), ArcAddition(2, 1),
        ]), all);
    }

    #[test]
    fn chain() {
        let parents = graph(3, &[(0, 1), (1, 2)]);

        let generator = ChangeGenerator::new(EngineConfig::default(), DagConstraint::new());
        assert_eq!(changes(&[
            ArcDeletion(0, 1), ArcReversal(0, 1),
            ArcDeletion(1, 2), ArcReversal(1, 2),
            ArcAddition(0, 2),
        ]), generator.generate(&parents).unwrap());

        // reversing 1 -> 2 would give 1 a second parent
        let generator = ChangeGenerator::new(EngineConfig::default(), DagConstraint::with_max_parents(1));
        assert_eq!(changes(&[
            ArcDeletion(0, 1), ArcReversal(0, 1),
            ArcDeletion(1, 2),
        ]), generator.generate(&parents).unwrap());
    }

    #[test]
    fn reversal_closing_a_cycle() {
        let parents = graph(3, &[(0, 1), (1, 2), (0, 2)]);
        let dag = DagConstraint::new();

        assert!(!dag.check(&parents, &ArcReversal(0, 2)));
        assert!(dag.check(&parents, &ArcReversal(0, 1)));
        assert!(dag.check(&parents, &ArcReversal(1, 2)));
        assert!(dag.check(&parents, &ArcDeletion(0, 2)));
        assert!(!dag.check(&parents, &ArcDeletion(2, 0)));
        assert!(!dag.check(&parents, &ArcAddition(0, 0)));
        assert!(!dag.check(&parents, &ArcAddition(0, 7)));
    }

    #[test]
    fn thread_count_does_not_matter() {
        let parents = graph(8, &[(0, 1), (1, 2), (2, 3), (0, 4), (4, 5), (3, 6), (5, 6), (6, 7)]);
        let sequential = ChangeGenerator::new(EngineConfig::default(), DagConstraint::new())
                             .generate(&parents)
                             .unwrap();

        for &threads in [0, 2, 3, 8].iter() {
            let generator = ChangeGenerator::new(EngineConfig::default().with_threads(threads), DagConstraint::new());
            assert_eq!(sequential, generator.generate(&parents).unwrap());
        }
    }

    #[test]
    fn applied_changes_keep_a_dag() {
        let parents = graph(5, &[(0, 2), (1, 2), (2, 3), (2, 4)]);
        let generator = ChangeGenerator::new(EngineConfig::default().with_threads(2), DagConstraint::new());

        for change in generator.generate(&parents).unwrap() {
            let mut next = parents.clone();
            change.apply(&mut next).unwrap();
            for (&node, p) in next.iter() {
                assert!(!p.contains(&node));
                for &q in p.iter() {
                    assert!(!has_path(&next, node, q, None), "{:?} closes a cycle", change);
                }
            }
        }
    }

    #[test]
    fn apply() {
        let mut parents = graph(2, &[]);
        ArcAddition(0, 1).apply(&mut parents).unwrap();
        assert_eq!(graph(2, &[(0, 1)]), parents);
        ArcReversal(0, 1).apply(&mut parents).unwrap();
        assert_eq!(graph(2, &[(1, 0)]), parents);
        ArcDeletion(1, 0).apply(&mut parents).unwrap();
        assert_eq!(graph(2, &[]), parents);

        match ArcAddition(0, 5).apply(&mut parents) {
            Err(BayesError::UndefinedElement(_)) => (),
            _ => panic!("wrong error type")
        };
    }

    #[test]
    fn student_network() {
        // D -> G <- I -> S, G -> L
        let generator = ChangeGenerator::new(EngineConfig::default(), DagConstraint::new());
        let all = generator.generate_for(&student()).unwrap();

        assert!(all.contains(&ArcDeletion(1, 2)));
        assert!(all.contains(&ArcAddition(3, 4)));
        assert!(!all.contains(&ArcAddition(4, 0)));
        assert!(!all.contains(&ArcAddition(1, 2)));
    }
}
