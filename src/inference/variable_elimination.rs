//! Defines `VariableElimination`, an `InferenceAlgorithm` answering every query by exact
//! variable elimination.
//!
//! Implementation of Koller & Friedman Algorithm 9.1 - Sum-Product-VE. The factors of the model
//! are reduced by the hard evidence, multiplied by the soft evidence, and every variable outside
//! of the query is summed out in the order chosen by the configured heuristic.

use super::targets::{JointTargets, MarginalTargets, TargetObserver};
use super::{InferenceAlgorithm, InferenceContext};
use crate::config::{EliminationHeuristic, EngineConfig};
use crate::factor::{Factor, TableCombination};
use crate::instantiation::Instantiation;
use crate::model::{GraphicalModel, NodeId, NodeSet};
use crate::util::{BayesError, Result};
use crate::variable::Variable;

use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use tracing::{debug, trace};

use std::collections::{HashMap, HashSet};
use std::iter;

type Graph = IndexMap<Variable, IndexSet<Variable>>;

pub struct VariableElimination {

    config: EngineConfig,

    /// posteriors of the marginal targets, as of the last inference
    marginals: HashMap<NodeId, Factor>,

    /// posteriors of the joint targets, as of the last inference
    joints: HashMap<NodeSet, Factor>,

    /// number of completed inferences
    passes: usize,

}

impl VariableElimination {

    pub fn new() -> Self {
        VariableElimination::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        VariableElimination {
            config,
            marginals: HashMap::new(),
            joints: HashMap::new(),
            passes: 0
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of inferences run so far
    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Probability of the current evidence. For an undirected model, this is the sum of the
    /// evidence-weighted potentials over the partition function.
    pub fn evidence_probability<M: GraphicalModel>(&self, context: &InferenceContext<M>) -> Result<f64> {
        let pe = self.eliminate(context, &NodeSet::new(), true)?.sum();
        if context.model()?.is_directed() {
            return Ok(pe);
        }

        let z = self.eliminate(context, &NodeSet::new(), false)?.sum();
        Ok(pe / z)
    }

    /// Compute the unnormalized ```P(query, e)```, over the variables of `query` in node order.
    fn eliminate<M: GraphicalModel>(
        &self,
        context: &InferenceContext<M>,
        query: &NodeSet,
        with_evidence: bool,
    ) -> Result<Factor> {
        let model = context.model()?;
        let var_of = |n: NodeId| model.variable(n).map(|v| v.clone());
        let observed = if with_evidence { context.evidence_nodes() } else { NodeSet::new() };

        // the descendants of neither the query nor the evidence sum to one
        let relevant = if self.config.prune_barren_nodes && model.is_directed() {
            ancestors(model, query.iter().chain(observed.iter()).cloned())?
        } else {
            model.nodes()
        };
        let relevant: HashSet<Variable> = relevant.into_iter().map(var_of).collect::<Result<_>>()?;

        // hard evidence outside of the query is absorbed in the factors
        let mut absorbed = Instantiation::new();
        let mut evidence_tables = Vec::new();
        for &n in observed.iter() {
            match context.hard_value(n) {
                Some(val) if !query.contains(&n) => {
                    let var = var_of(n)?;
                    absorbed.add(&var)?;
                    absorbed.set(&var, val)?;
                },
                _ => evidence_tables.push(context.evidence(n)?.clone())
            }
        }

        let mut factors: Vec<Factor> = model.factors()
                                            .into_iter()
                                            .filter(|f| f.variables().iter().all(|v| relevant.contains(v)))
                                            .map(|f| f.reduce(&absorbed))
                                            .collect();
        factors.extend(evidence_tables);

        let keep: IndexSet<Variable> = query.iter().map(|&n| var_of(n)).collect::<Result<_>>()?;
        let order = elimination_order(&factors, &keep, self.config.elimination);
        trace!(?query, factors = factors.len(), ?order, "eliminating");

        let product = TableCombination::product();
        for var in order.iter() {
            let (with_var, without): (Vec<Factor>, Vec<Factor>) = factors.into_iter()
                                                                         .partition(|f| f.contains(var));
            factors = without;
            if with_var.is_empty() {
                continue;
            }

            let psi = combine_all(&product, &with_var)?;
            factors.push(psi.sum_out(&[var.clone()])?);
        }

        let phi = combine_all(&product, &factors)?;
        phi.reorder(&keep.into_iter().collect::<Vec<_>>())
    }

    fn normalized<M: GraphicalModel>(&self, context: &InferenceContext<M>, query: &NodeSet) -> Result<Factor> {
        let mut phi = self.eliminate(context, query, true)?;
        phi.normalize()?;
        Ok(phi)
    }

}

impl Default for VariableElimination {
    fn default() -> Self {
        VariableElimination::new()
    }
}

/// The nodes of `from` and all their ancestors
fn ancestors<M, I>(model: &M, from: I) -> Result<NodeSet>
    where M: GraphicalModel + ?Sized, I: IntoIterator<Item = NodeId>
{
    let mut stack: Vec<NodeId> = from.into_iter().collect();
    let mut seen = NodeSet::new();
    while let Some(node) = stack.pop() {
        if seen.insert(node) {
            stack.extend(model.parents(node)?);
        }
    }
    Ok(seen)
}

/// Product of `tables`, the unit table if there are none
fn combine_all(product: &TableCombination<fn(f64, f64) -> f64>, tables: &[Factor]) -> Result<Factor> {
    match tables.len() {
        0 => Ok(Factor::scalar(1.0)),
        1 => Ok(tables[0].clone()),
        _ => product.combine(&tables.iter().collect::<Vec<_>>())
    }
}

/// Interaction graph of a bag of factors: two variables are adjacent when a factor depends on both
fn interaction_graph(factors: &[Factor]) -> Graph {
    let mut graph = Graph::new();
    for f in factors.iter() {
        for v in f.variables() {
            graph.entry(v.clone()).or_insert_with(IndexSet::new);
        }

        for (a, b) in f.variables().iter().tuple_combinations() {
            if let Some(nbrs) = graph.get_mut(a) {
                nbrs.insert(b.clone());
            }
            if let Some(nbrs) = graph.get_mut(b) {
                nbrs.insert(a.clone());
            }
        }
    }
    graph
}

/// The order in which to sum out the variables of `factors` that are not in `keep`
fn elimination_order(factors: &[Factor], keep: &IndexSet<Variable>, heuristic: EliminationHeuristic) -> Vec<Variable> {
    let graph = interaction_graph(factors);
    match heuristic {
        EliminationHeuristic::MaxCardinality => {
            max_cardinality_order(&graph).into_iter()
                                         .filter(|v| !keep.contains(v))
                                         .collect()
        },
        EliminationHeuristic::MinFill => min_fill_order(graph, keep)
    }
}

/// Compute the preferred elimination order by the max-cardinality heuristic, Koller & Friedman
/// Algorithm 9.3.
fn max_cardinality_order(graph: &Graph) -> Vec<Variable> {
    let mut marked: IndexSet<&Variable> = IndexSet::new();

    while marked.len() < graph.len() {
        // the unmarked variable with the most marked neighbours, the first one on ties
        let next = graph.iter()
                        .filter(|&(v, _)| !marked.contains(v))
                        .map(|(v, nbrs)| (v, nbrs.iter().filter(|n| marked.contains(n)).count()))
                        .fold(None, |best, (v, ct)| match best {
                            Some((_, max)) if max >= ct => best,
                            _ => Some((v, ct))
                        });

        match next {
            Some((v, _)) => { marked.insert(v); },
            None => break
        }
    }

    // the marking order is the reverse of the elimination order
    marked.into_iter().rev().cloned().collect()
}

/// Number of edges the elimination of `var` adds between its neighbours
fn fill_in(graph: &Graph, var: &Variable) -> usize {
    graph.get(var)
         .map(|nbrs| {
             nbrs.iter()
                 .tuple_combinations()
                 .filter(|&(a, b)| !graph.get(a).map_or(false, |n| n.contains(b)))
                 .count()
         })
         .unwrap_or(0)
}

/// Greedily eliminate the variable adding the fewest fill edges, the first one on ties
fn min_fill_order(mut graph: Graph, keep: &IndexSet<Variable>) -> Vec<Variable> {
    let mut remaining: Vec<Variable> = graph.keys().filter(|v| !keep.contains(*v)).cloned().collect();
    let mut order = Vec::with_capacity(remaining.len());

    loop {
        let best = remaining.iter()
                            .enumerate()
                            .map(|(i, v)| (i, fill_in(&graph, v)))
                            .min_by_key(|&(_, fill)| fill);
        let var = match best {
            Some((idx, _)) => remaining.remove(idx),
            None => break
        };
        let nbrs = graph.shift_remove(&var).unwrap_or_default();

        for n in nbrs.iter() {
            if let Some(adj) = graph.get_mut(n) {
                adj.shift_remove(&var);
            }
        }
        for (a, b) in nbrs.iter().tuple_combinations() {
            if let Some(adj) = graph.get_mut(a) {
                adj.insert(b.clone());
            }
            if let Some(adj) = graph.get_mut(b) {
                adj.insert(a.clone());
            }
        }

        order.push(var);
    }
    order
}

impl TargetObserver for VariableElimination {

    fn on_marginal_target_erased(&mut self, node: NodeId) {
        self.marginals.remove(&node);
    }

    fn on_all_marginal_targets_erased(&mut self) {
        self.marginals.clear();
    }

    fn on_joint_target_erased(&mut self, set: &NodeSet) {
        self.joints.remove(set);
    }

    fn on_all_joint_targets_erased(&mut self) {
        self.joints.clear();
    }

}

impl<M: GraphicalModel> InferenceAlgorithm<M> for VariableElimination {

    fn on_model_changed(&mut self, _model: &M) {
        self.marginals.clear();
        self.joints.clear();
    }

    /// Compute the posterior of every target.
    ///
    /// # Errors
    /// * `BayesError::UnsupportedEvidence` if the evidence has a null probability
    fn make_inference(
        &mut self,
        context: &InferenceContext<M>,
        marginals: &MarginalTargets,
        joints: &JointTargets,
    ) -> Result<()> {
        if context.nbr_evidence() > 0 {
            let pe = self.eliminate(context, &NodeSet::new(), true)?.sum();
            if !(pe > 0.0) {
                return Err(BayesError::UnsupportedEvidence(
                    format!("the evidence on {:?} is impossible", context.evidence_nodes())
                ));
            }
        }

        self.marginals.clear();
        self.joints.clear();

        for &node in marginals.targets().iter() {
            // observed nodes are answered from their evidence
            if context.has_hard_evidence(node) {
                continue;
            }
            let posterior = self.normalized(context, &iter::once(node).collect())?;
            self.marginals.insert(node, posterior);
        }

        for set in joints.targets().iter() {
            let posterior = self.normalized(context, set)?;
            self.joints.insert(set.clone(), posterior);
        }

        self.passes += 1;
        debug!(pass = self.passes, marginals = self.marginals.len(), joints = self.joints.len(),
               "variable elimination done");
        Ok(())
    }

    fn posterior(&mut self, _context: &InferenceContext<M>, node: NodeId) -> Result<Factor> {
        self.marginals
            .get(&node)
            .cloned()
            .ok_or_else(|| BayesError::UndefinedElement(format!("no posterior computed for node {}", node)))
    }

    fn joint_posterior(&mut self, _context: &InferenceContext<M>, set: &NodeSet) -> Result<Factor> {
        self.joints
            .get(set)
            .cloned()
            .ok_or_else(|| BayesError::UndefinedElement(format!("no posterior computed for {:?}", set)))
    }

    fn joint_posterior_from(
        &mut self,
        context: &InferenceContext<M>,
        wanted: &NodeSet,
        declared: &NodeSet,
    ) -> Result<Factor> {
        let joint = self.joints
                        .get(declared)
                        .ok_or_else(|| BayesError::UndefinedElement(
                            format!("no posterior computed for {:?}", declared)
                        ))?;

        let model = context.model()?;
        let removed = declared.difference(wanted)
                              .map(|&n| model.variable(n).map(|v| v.clone()))
                              .collect::<Result<Vec<_>>>()?;
        joint.sum_out(&removed)
    }

    fn unnormalized_joint_posterior(&mut self, context: &InferenceContext<M>, set: &NodeSet) -> Result<Factor> {
        self.eliminate(context, set, true)
    }

}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::{Evidence, InferenceState, TargetedInference};
    use crate::init::Initialization;
    use crate::model::testing::{misconception, student};
    use crate::model::{DirectedModel, DirectedModelBuilder, UndirectedModel};

    use approx::assert_abs_diff_eq;

    use std::rc::Rc;

    fn set(nodes: &[NodeId]) -> NodeSet {
        nodes.iter().cloned().collect()
    }

    fn configs() -> Vec<EngineConfig> {
        vec![
            EngineConfig::default(),
            EngineConfig::default().with_elimination(EliminationHeuristic::MinFill),
            EngineConfig::default().with_barren_pruning(false),
        ]
    }

    #[test]
    /// Koller & Friedman Figure 3.4, with ```d0, l1, s0``` observed
    fn student_network() {
        for config in configs() {
            let mut engine = TargetedInference::with_model(
                Rc::new(student()),
                VariableElimination::with_config(config)
            );
            engine.add_target(1).unwrap();
            engine.add_evidence(0, 0).unwrap();
            engine.add_evidence(4, 1).unwrap();
            engine.add_evidence(3, 0).unwrap();

            // the result should be the same on subsequent queries
            for _ in 0..10 {
                let p = engine.posterior(1).unwrap();
                assert_abs_diff_eq!(0.02919708, p.values()[1], epsilon = 1e-8);
            }
            assert_eq!(1, engine.algorithm().passes());
        }
    }

    #[test]
    fn unnormalized_posterior_and_evidence_probability() {
        let mut ctx = InferenceContext::with_model(Rc::new(student()));
        ctx.add_evidence(0, Evidence::Hard(0)).unwrap();
        ctx.add_evidence(4, Evidence::Hard(1)).unwrap();
        ctx.add_evidence(3, Evidence::Hard(0)).unwrap();

        let mut ve = VariableElimination::new();
        let p = ve.unnormalized_joint_posterior(&ctx, &set(&[1])).unwrap();
        // P(d0) P(i) P(s0 | i) sum_g P(g | i, d0) P(l1 | g)
        assert_abs_diff_eq!(0.6 * 0.7 * 0.95 * 0.45, p.values()[0], epsilon = 1e-12);
        assert_abs_diff_eq!(0.6 * 0.3 * 0.2 * 0.15, p.values()[1], epsilon = 1e-12);
        assert_abs_diff_eq!(0.18495, ve.evidence_probability(&ctx).unwrap(), epsilon = 1e-12);
    }

    #[test]
    fn joint_targets() {
        let mut engine = TargetedInference::with_model(Rc::new(student()), VariableElimination::new());
        engine.add_joint_target(&set(&[2, 4])).unwrap();

        let joint = engine.joint_posterior(&set(&[2, 4])).unwrap();
        assert_abs_diff_eq!(1.0, joint.sum(), epsilon = 1e-12);

        // P(g0) = 0.7 * 0.6 * 0.3 + 0.7 * 0.4 * 0.05 + 0.3 * 0.6 * 0.9 + 0.3 * 0.4 * 0.5
        let g = engine.joint_posterior(&set(&[2])).unwrap();
        assert_abs_diff_eq!(0.362, g.values()[0], epsilon = 1e-12);
        assert_abs_diff_eq!(0.362, engine.posterior(2).unwrap().values()[0], epsilon = 1e-12);

        // P(l1) = 0.362 * 0.1 + 0.638 * 0.6
        let l = engine.posterior(4).unwrap();
        assert_abs_diff_eq!(0.4190, l.values()[1], epsilon = 1e-12);
    }

    #[test]
    fn impossible_evidence() {
        let a = Variable::binary("A");
        let b = Variable::binary("B");
        let model = DirectedModelBuilder::new()
                        .with_variable(&a, &[], Initialization::Binomial(1.0))
                        .with_variable(&b, &[a.clone()], Initialization::Uniform)
                        .build()
                        .unwrap();
        let mut engine: TargetedInference<DirectedModel, VariableElimination> =
            TargetedInference::with_model(Rc::new(model), VariableElimination::new());

        engine.add_evidence(0, 1).unwrap();
        match engine.posterior(1) {
            Err(BayesError::UnsupportedEvidence(_)) => (),
            _ => panic!("wrong error type")
        };
        assert_eq!(InferenceState::UnsupportedEvidence, engine.state());

        engine.chg_evidence(0, 0).unwrap();
        assert_abs_diff_eq!(0.5, engine.posterior(1).unwrap().values()[0], epsilon = 1e-12);
    }

    #[test]
    /// Posteriors of the misconception network against a brute force enumeration
    fn undirected_soft_evidence() {
        let model = misconception();
        let likelihood = [0.2, 0.8];

        let vars: Vec<Variable> = (0..4).map(|n| model.variable(n).unwrap().clone()).collect();
        let mut inst = Instantiation::from_vars(&vars).unwrap();
        let (mut b1, mut total) = (0.0, 0.0);
        inst.set_first();
        while !inst.end() {
            let w = model.probability(&inst).unwrap() * likelihood[inst.val(&vars[0]).unwrap()];
            total += w;
            if inst.val(&vars[1]).unwrap() == 1 {
                b1 += w;
            }
            inst.inc();
        }

        for config in configs() {
            let mut engine: TargetedInference<UndirectedModel, VariableElimination> =
                TargetedInference::with_model(Rc::new(misconception()), VariableElimination::with_config(config));
            engine.add_soft_evidence(0, likelihood.to_vec()).unwrap();

            assert_abs_diff_eq!(b1 / total, engine.posterior(1).unwrap().values()[1], epsilon = 1e-9);
            assert_abs_diff_eq!(
                total,
                engine.algorithm().evidence_probability(engine.context()).unwrap(),
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn erased_targets_leave_the_cache() {
        let mut engine = TargetedInference::with_model(Rc::new(student()), VariableElimination::new());
        engine.add_target(1).unwrap();
        engine.add_target(2).unwrap();
        engine.add_joint_target(&set(&[0, 1])).unwrap();
        engine.make_inference().unwrap();
        assert_eq!(2, engine.algorithm().marginals.len());

        engine.erase_target(2).unwrap();
        assert!(!engine.algorithm().marginals.contains_key(&2));
        engine.erase_all_joint_targets().unwrap();
        assert!(engine.algorithm().joints.is_empty());
    }

    #[test]
    fn elimination_orders() {
        let model = student();
        let factors: Vec<Factor> = model.factors().into_iter().cloned().collect();
        let keep: IndexSet<Variable> = iter::once(model.variable(1).unwrap().clone()).collect();

        for &heuristic in [EliminationHeuristic::MaxCardinality, EliminationHeuristic::MinFill].iter() {
            let order = elimination_order(&factors, &keep, heuristic);
            assert_eq!(4, order.len());
            assert!(!order.contains(&keep[0]));
            assert_eq!(4, order.iter().collect::<HashSet<_>>().len());
        }
    }

    #[test]
    fn min_fill_avoids_the_hub() {
        // a star around H: eliminating H first would connect every leaf
        let h = Variable::binary("H");
        let leaves: Vec<Variable> = (0..4).map(|i| Variable::binary(&format!("X{}", i))).collect();
        let factors: Vec<Factor> = leaves.iter()
                                         .map(|x| Factor::new(vec![h.clone(), x.clone()]).unwrap())
                                         .collect();

        let order = min_fill_order(interaction_graph(&factors), &IndexSet::new());
        assert_eq!(5, order.len());
        assert_ne!(h, order[0]);
    }
}
