//! Defines the interface to inference engines
//!
//! An exact inference engine is split in two: a `TargetedInference` front-end owning the
//! `InferenceContext` (model, evidence and state) and the target registries, and an
//! `InferenceAlgorithm` doing the actual computations. The front-end decides when the algorithm
//! must run again; the algorithm answers the posterior queries from what it computed.

use crate::factor::Factor;
use crate::model::{GraphicalModel, NodeId, NodeSet};
use crate::util::{BayesError, Result};

use tracing::debug;

use std::collections::BTreeMap;
use std::rc::Rc;

pub mod engine;
pub mod targets;
pub mod variable_elimination;

pub use self::engine::TargetedInference;
pub use self::targets::{JointTargets, MarginalTargets, TargetObserver};
pub use self::variable_elimination::VariableElimination;

/// Where an engine stands with respect to its current targets and evidence
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InferenceState {
    /// The set of targets or of observed nodes changed since the last inference
    OutdatedStructure,

    /// Only the values of the evidence changed since the last inference
    OutdatedPotentials,

    /// The cached posteriors are up to date
    Done,

    /// The last inference could not handle the evidence. Only an evidence change leaves it.
    UnsupportedEvidence,
}

/// Evidence received on a node
#[derive(Clone, Debug, PartialEq)]
pub enum Evidence {
    /// The node is observed with the given value
    Hard(usize),

    /// A likelihood over the values of the node
    Soft(Vec<f64>),
}

/// The state shared by the parts of an inference engine: the model, the evidence and the
/// inference state.
pub struct InferenceContext<M> {
    model: Option<Rc<M>>,

    state: InferenceState,

    /// received evidence, with its table over the node's variable
    evidence: BTreeMap<NodeId, (Evidence, Factor)>,
}

impl<M: GraphicalModel> InferenceContext<M> {

    /// A context without model
    pub fn new() -> Self {
        InferenceContext { model: None, state: InferenceState::OutdatedStructure, evidence: BTreeMap::new() }
    }

    pub fn with_model(model: Rc<M>) -> Self {
        InferenceContext { model: Some(model), ..InferenceContext::new() }
    }

    /// Attach another model, dropping the evidence
    pub(crate) fn set_model(&mut self, model: Rc<M>) {
        self.model = Some(model);
        self.evidence.clear();
        self.state = InferenceState::OutdatedStructure;
    }

    /// # Errors
    /// * `BayesError::NullElement` if no model is attached
    pub fn model(&self) -> Result<&M> {
        self.model.as_ref().map(|m| m.as_ref()).ok_or(BayesError::NullElement)
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    pub fn state(&self) -> InferenceState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == InferenceState::Done
    }

    pub(crate) fn set_state(&mut self, state: InferenceState) {
        if state != self.state {
            debug!(from = ?self.state, to = ?state, "inference state");
        }
        self.state = state;
    }

    /// The targets changed. An unsupported evidence stays so.
    pub(crate) fn outdate_targets(&mut self) {
        if self.state != InferenceState::UnsupportedEvidence {
            self.set_state(InferenceState::OutdatedStructure);
        }
    }

    fn outdate_potentials(&mut self) {
        match self.state {
            InferenceState::Done | InferenceState::UnsupportedEvidence => {
                self.set_state(InferenceState::OutdatedPotentials)
            },
            _ => ()
        }
    }

    ///////////////////////////////////////////////////////////////////////////////////////////
    // Evidence

    /// Build the table of an evidence on `node`, validating it
    fn evidence_table(&self, node: NodeId, evidence: &Evidence) -> Result<Factor> {
        let var = self.model()?.variable(node)?;
        match *evidence {
            Evidence::Hard(val) => {
                if val >= var.cardinality() {
                    return Err(BayesError::InvalidArgument(
                        format!("value {} out of the domain of {}", val, var)
                    ));
                }
                Factor::indicator(var, val)
            },
            Evidence::Soft(ref likelihood) => {
                if likelihood.len() != var.cardinality() {
                    return Err(BayesError::InvalidArgument(
                        format!("likelihood of size {} for {}", likelihood.len(), var)
                    ));
                }
                if likelihood.iter().any(|&p| p < 0.0 || !p.is_finite()) {
                    return Err(BayesError::InvalidArgument(
                        format!("likelihood of {} has invalid values", var)
                    ));
                }
                if likelihood.iter().all(|&p| p == 0.0) {
                    return Err(BayesError::InvalidArgument(
                        format!("likelihood of {} is null everywhere", var)
                    ));
                }
                Factor::from_values(vec![var.clone()], likelihood.clone())
            }
        }
    }

    /// Add an evidence on a node without one.
    ///
    /// # Errors
    /// * `BayesError::NullElement` if no model is attached
    /// * `BayesError::UndefinedElement` if `node` is not in the model
    /// * `BayesError::InvalidArgument` if `node` already has an evidence or the evidence is
    ///   invalid: value out of domain, likelihood of the wrong size, negative or null everywhere
    pub fn add_evidence(&mut self, node: NodeId, evidence: Evidence) -> Result<()> {
        let table = self.evidence_table(node, &evidence)?;
        if self.evidence.contains_key(&node) {
            return Err(BayesError::InvalidArgument(
                format!("node {} already has an evidence, change it instead", node)
            ));
        }

        debug!(node, ?evidence, "evidence added");
        self.evidence.insert(node, (evidence, table));
        self.set_state(InferenceState::OutdatedStructure);
        Ok(())
    }

    /// Change the evidence of a node. Switching between hard and soft evidence changes the set of
    /// observed nodes; changing a value or a likelihood only changes potentials.
    ///
    /// # Errors
    /// as `add_evidence`, and `BayesError::InvalidArgument` if `node` has no evidence
    pub fn chg_evidence(&mut self, node: NodeId, evidence: Evidence) -> Result<()> {
        let table = self.evidence_table(node, &evidence)?;
        let kind_changed = match self.evidence.get(&node) {
            None => {
                return Err(BayesError::InvalidArgument(format!("node {} has no evidence", node)));
            },
            Some(&(ref old, _)) if *old == evidence => return Ok(()),
            Some(&(Evidence::Hard(_), _)) => matches!(evidence, Evidence::Soft(_)),
            Some(&(Evidence::Soft(_), _)) => matches!(evidence, Evidence::Hard(_)),
        };

        debug!(node, ?evidence, "evidence changed");
        self.evidence.insert(node, (evidence, table));
        if kind_changed {
            self.set_state(InferenceState::OutdatedStructure);
        } else {
            self.outdate_potentials();
        }
        Ok(())
    }

    /// Erase the evidence of a node. A node without evidence is left alone.
    ///
    /// # Errors
    /// * `BayesError::UndefinedElement` if `node` is not in the model
    pub fn erase_evidence(&mut self, node: NodeId) -> Result<()> {
        self.model()?.variable(node)?;
        if self.evidence.remove(&node).is_some() {
            debug!(node, "evidence erased");
            self.set_state(InferenceState::OutdatedStructure);
        }
        Ok(())
    }

    pub fn erase_all_evidence(&mut self) {
        if !self.evidence.is_empty() {
            self.evidence.clear();
            self.set_state(InferenceState::OutdatedStructure);
        }
    }

    pub fn has_evidence(&self, node: NodeId) -> bool {
        self.evidence.contains_key(&node)
    }

    pub fn has_hard_evidence(&self, node: NodeId) -> bool {
        self.hard_value(node).is_some()
    }

    /// The observed value of a node with hard evidence
    pub fn hard_value(&self, node: NodeId) -> Option<usize> {
        match self.evidence.get(&node) {
            Some(&(Evidence::Hard(v), _)) => Some(v),
            _ => None
        }
    }

    /// The evidence of a node as a table over its variable: an indicator for hard evidence, the
    /// likelihood for soft evidence
    ///
    /// # Errors
    /// * `BayesError::NotFound` if `node` has no evidence
    pub fn evidence(&self, node: NodeId) -> Result<&Factor> {
        self.evidence
            .get(&node)
            .map(|e| &e.1)
            .ok_or_else(|| BayesError::NotFound(format!("evidence on node {}", node)))
    }

    pub fn nbr_evidence(&self) -> usize {
        self.evidence.len()
    }

    /// Nodes with evidence, hard or soft
    pub fn evidence_nodes(&self) -> NodeSet {
        self.evidence.keys().cloned().collect()
    }

    pub fn hard_evidence_nodes(&self) -> NodeSet {
        self.evidence.iter()
                     .filter(|(_, e)| matches!(e.0, Evidence::Hard(_)))
                     .map(|(&n, _)| n)
                     .collect()
    }

    pub fn soft_evidence_nodes(&self) -> NodeSet {
        self.evidence.iter()
                     .filter(|(_, e)| matches!(e.0, Evidence::Soft(_)))
                     .map(|(&n, _)| n)
                     .collect()
    }

}

impl<M: GraphicalModel> Default for InferenceContext<M> {
    fn default() -> Self {
        InferenceContext::new()
    }
}


/// The computations behind a `TargetedInference`.
///
/// The front-end calls `make_inference` whenever its state is not `Done` before asking for a
/// posterior, and keeps the algorithm informed of the target changes through the
/// `TargetObserver` hooks.
pub trait InferenceAlgorithm<M: GraphicalModel>: TargetObserver {

    /// A new model was attached
    fn on_model_changed(&mut self, _model: &M) {}

    /// Bring the posteriors of the targets up to date with the context.
    ///
    /// # Errors
    /// * `BayesError::UnsupportedEvidence` if the algorithm cannot handle the evidence
    fn make_inference(
        &mut self,
        context: &InferenceContext<M>,
        marginals: &MarginalTargets,
        joints: &JointTargets,
    ) -> Result<()>;

    /// Normalized posterior of a marginal target
    fn posterior(&mut self, context: &InferenceContext<M>, node: NodeId) -> Result<Factor>;

    /// Normalized posterior of a registered joint target
    fn joint_posterior(&mut self, context: &InferenceContext<M>, set: &NodeSet) -> Result<Factor>;

    /// Normalized posterior of `wanted`, extracted from the registered joint target `declared`
    /// including it
    fn joint_posterior_from(
        &mut self,
        context: &InferenceContext<M>,
        wanted: &NodeSet,
        declared: &NodeSet,
    ) -> Result<Factor>;

    /// ```P(set, evidence)``` for any set of nodes, without caching it
    fn unnormalized_joint_posterior(&mut self, context: &InferenceContext<M>, set: &NodeSet) -> Result<Factor>;

}
