//! Front-end of an exact inference engine.
//!
//! `TargetedInference` composes an `InferenceContext`, the two target registries and an
//! `InferenceAlgorithm`. Every target or evidence change outdates the state; asking for a
//! posterior while the state is not `Done` runs the algorithm first, synchronously, exactly once.

use super::targets::{JointTargets, MarginalTargets};
use super::{Evidence, InferenceAlgorithm, InferenceContext, InferenceState};
use crate::factor::{Factor, Reduction};
use crate::factor::projection;
use crate::instantiation::Instantiation;
use crate::model::{GraphicalModel, NodeId, NodeSet};
use crate::util::{BayesError, Result};
use crate::variable::Variable;

use tracing::{debug, trace};

use std::iter;
use std::rc::Rc;

/// An inference engine answering posterior queries on a set of targets
pub struct TargetedInference<M: GraphicalModel, A: InferenceAlgorithm<M>> {
    context: InferenceContext<M>,
    marginals: MarginalTargets,
    joints: JointTargets,
    algorithm: A,
}

impl<M: GraphicalModel, A: InferenceAlgorithm<M>> TargetedInference<M, A> {

    /// An engine without model. Every query fails with `BayesError::NullElement` until
    /// `set_model` is called.
    pub fn new(algorithm: A) -> Self {
        TargetedInference {
            context: InferenceContext::new(),
            marginals: MarginalTargets::new(),
            joints: JointTargets::new(),
            algorithm,
        }
    }

    /// An engine on `model`, where every node is a marginal target
    pub fn with_model(model: Rc<M>, algorithm: A) -> Self {
        let mut engine = TargetedInference::new(algorithm);
        engine.set_model(model);
        engine
    }

    /// Attach a model: the evidence is dropped, every node becomes a marginal target and the joint
    /// targets are erased
    pub fn set_model(&mut self, model: Rc<M>) {
        self.joints.erase_all(&mut self.algorithm);
        self.marginals.reset(model.as_ref(), &mut self.algorithm);
        self.algorithm.on_model_changed(model.as_ref());
        self.context.set_model(model);
        debug!(nodes = self.marginals.nbr_targets(), "model attached");
    }

    pub fn model(&self) -> Result<&M> {
        self.context.model()
    }

    pub fn context(&self) -> &InferenceContext<M> {
        &self.context
    }

    pub fn algorithm(&self) -> &A {
        &self.algorithm
    }

    pub fn state(&self) -> InferenceState {
        self.context.state()
    }

    pub fn is_done(&self) -> bool {
        self.context.is_done()
    }

    fn check_node(&self, node: NodeId) -> Result<()> {
        self.context.model()?.variable(node).map(|_| ())
    }

    ///////////////////////////////////////////////////////////////////////////////////////////
    // Marginal targets

    /// Add a marginal target, leaving default mode
    ///
    /// # Errors
    /// * `BayesError::NullElement` if no model is attached
    /// * `BayesError::UndefinedElement` if `node` is not in the model
    pub fn add_target(&mut self, node: NodeId) -> Result<()> {
        let model = self.context.model()?;
        if self.marginals.add(model, node, &mut self.algorithm)? {
            self.context.outdate_targets();
        }
        Ok(())
    }

    /// Make every node of the model a marginal target
    pub fn add_all_targets(&mut self) -> Result<()> {
        let model = self.context.model()?;
        if self.marginals.add_all(model, &mut self.algorithm) {
            self.context.outdate_targets();
        }
        Ok(())
    }

    /// Erase a marginal target. Erasing a node that is not a target is a no-op.
    pub fn erase_target(&mut self, node: NodeId) -> Result<()> {
        let model = self.context.model()?;
        if self.marginals.erase(model, node, &mut self.algorithm)? {
            self.context.outdate_targets();
        }
        Ok(())
    }

    pub fn erase_all_marginal_targets(&mut self) -> Result<()> {
        self.context.model()?;
        self.marginals.erase_all(&mut self.algorithm);
        self.context.outdate_targets();
        Ok(())
    }

    pub fn is_target(&self, node: NodeId) -> Result<bool> {
        self.marginals.is_target(self.context.model()?, node)
    }

    pub fn targets(&self) -> &NodeSet {
        self.marginals.targets()
    }

    pub fn nbr_targets(&self) -> usize {
        self.marginals.nbr_targets()
    }

    pub fn is_targeted_mode(&self) -> bool {
        self.marginals.is_targeted_mode()
    }

    ///////////////////////////////////////////////////////////////////////////////////////////
    // Joint targets

    /// Add a joint target. A set included in a registered target is ignored, and a set including
    /// registered targets replaces them.
    ///
    /// # Errors
    /// * `BayesError::NullElement` if no model is attached
    /// * `BayesError::UndefinedElement` if a node of `set` is not in the model
    /// * `BayesError::InvalidArgument` if `set` is empty
    pub fn add_joint_target(&mut self, set: &NodeSet) -> Result<()> {
        let model = self.context.model()?;
        if self.joints.add(model, set, &mut self.algorithm)? {
            self.context.outdate_targets();
        }
        Ok(())
    }

    /// Erase a joint target. Erasing a set that is not registered is a no-op.
    pub fn erase_joint_target(&mut self, set: &NodeSet) -> Result<()> {
        let model = self.context.model()?;
        if self.joints.erase(model, set, &mut self.algorithm)? {
            self.context.outdate_targets();
        }
        Ok(())
    }

    pub fn erase_all_joint_targets(&mut self) -> Result<()> {
        self.context.model()?;
        if self.joints.erase_all(&mut self.algorithm) {
            self.context.outdate_targets();
        }
        Ok(())
    }

    /// Erase the marginal and the joint targets
    pub fn erase_all_targets(&mut self) -> Result<()> {
        self.erase_all_marginal_targets()?;
        self.erase_all_joint_targets()
    }

    pub fn is_joint_target(&self, set: &NodeSet) -> Result<bool> {
        self.joints.is_target(self.context.model()?, set)
    }

    pub fn joint_targets(&self) -> &[NodeSet] {
        self.joints.targets()
    }

    pub fn nbr_joint_targets(&self) -> usize {
        self.joints.nbr_targets()
    }

    ///////////////////////////////////////////////////////////////////////////////////////////
    // Evidence

    /// Observe `node` with the value `val`
    pub fn add_evidence(&mut self, node: NodeId, val: usize) -> Result<()> {
        self.context.add_evidence(node, Evidence::Hard(val))
    }

    /// Observe `node` with the value labelled `label`
    pub fn add_evidence_label(&mut self, node: NodeId, label: &str) -> Result<()> {
        let val = self.context.model()?.variable(node)?.index_of(label)?;
        self.add_evidence(node, val)
    }

    /// Add a likelihood on the values of `node`
    pub fn add_soft_evidence(&mut self, node: NodeId, likelihood: Vec<f64>) -> Result<()> {
        self.context.add_evidence(node, Evidence::Soft(likelihood))
    }

    pub fn chg_evidence(&mut self, node: NodeId, val: usize) -> Result<()> {
        self.context.chg_evidence(node, Evidence::Hard(val))
    }

    pub fn chg_soft_evidence(&mut self, node: NodeId, likelihood: Vec<f64>) -> Result<()> {
        self.context.chg_evidence(node, Evidence::Soft(likelihood))
    }

    pub fn erase_evidence(&mut self, node: NodeId) -> Result<()> {
        self.context.erase_evidence(node)
    }

    pub fn erase_all_evidence(&mut self) {
        self.context.erase_all_evidence()
    }

    pub fn has_evidence(&self, node: NodeId) -> bool {
        self.context.has_evidence(node)
    }

    pub fn hard_evidence_nodes(&self) -> NodeSet {
        self.context.hard_evidence_nodes()
    }

    pub fn soft_evidence_nodes(&self) -> NodeSet {
        self.context.soft_evidence_nodes()
    }

    ///////////////////////////////////////////////////////////////////////////////////////////
    // Queries

    /// Run the algorithm if the state is not `Done`.
    ///
    /// # Errors
    /// * `BayesError::NullElement` if no model is attached
    /// * `BayesError::UnsupportedEvidence` if the algorithm cannot handle the evidence. The state
    ///   is then `UnsupportedEvidence` until the evidence changes, and this call fails again
    ///   without running the algorithm.
    pub fn make_inference(&mut self) -> Result<()> {
        self.context.model()?;
        match self.context.state() {
            InferenceState::Done => return Ok(()),
            InferenceState::UnsupportedEvidence => {
                return Err(BayesError::UnsupportedEvidence(
                    String::from("the current evidence is not supported")
                ));
            },
            _ => ()
        }

        trace!(state = ?self.context.state(), targets = self.marginals.nbr_targets(),
               joints = self.joints.nbr_targets(), "running inference");
        match self.algorithm.make_inference(&self.context, &self.marginals, &self.joints) {
            Ok(()) => {
                self.context.set_state(InferenceState::Done);
                Ok(())
            },
            Err(e @ BayesError::UnsupportedEvidence(_)) => {
                self.context.set_state(InferenceState::UnsupportedEvidence);
                Err(e)
            },
            Err(e) => Err(e)
        }
    }

    /// The posterior of a node.
    ///
    /// A node with hard evidence gets its evidence back. A node that is not a marginal target but
    /// belongs to a joint target is answered from that joint target.
    ///
    /// # Errors
    /// * `BayesError::NullElement` if no model is attached
    /// * `BayesError::UndefinedElement` if `node` is not in the model or in no target
    /// * `BayesError::UnsupportedEvidence` if the evidence cannot be handled
    pub fn posterior(&mut self, node: NodeId) -> Result<Factor> {
        self.check_node(node)?;

        if self.context.has_hard_evidence(node) {
            return self.context.evidence(node).map(|e| e.clone());
        }

        if !self.marginals.targets().contains(&node) {
            let single: NodeSet = iter::once(node).collect();
            if self.joints.covering(&single).is_some() {
                return self.joint_posterior(&single);
            }
            return Err(BayesError::UndefinedElement(format!("node {} is not a target", node)));
        }

        self.make_inference()?;
        self.algorithm.posterior(&self.context, node)
    }

    /// The posterior of a set of nodes, from the registered joint target equal to `set` or,
    /// failing that, from the first one including it.
    ///
    /// # Errors
    /// * `BayesError::NullElement` if no model is attached
    /// * `BayesError::UndefinedElement` if no registered joint target includes `set`
    pub fn joint_posterior(&mut self, set: &NodeSet) -> Result<Factor> {
        self.context.model()?;
        let declared = self.joints
                           .covering(set)
                           .cloned()
                           .ok_or_else(|| BayesError::UndefinedElement(
                               format!("no joint target includes {:?}", set)
                           ))?;

        self.make_inference()?;
        if declared == *set {
            self.algorithm.joint_posterior(&self.context, set)
        } else {
            self.algorithm.joint_posterior_from(&self.context, set, &declared)
        }
    }

    ///////////////////////////////////////////////////////////////////////////////////////////
    // Information theory

    /// Entropy, in bits, of the posterior of a node
    pub fn entropy(&mut self, node: NodeId) -> Result<f64> {
        self.posterior(node).map(|p| p.entropy())
    }

    /// Mutual information, in bits, of two nodes under the current evidence.
    ///
    /// The joint posterior is computed without going through the algorithm's caches, so `x` and
    /// `y` need not be targets. ```I(X, X) = H(X)```.
    ///
    /// # Errors
    /// * `BayesError::OperationNotAllowed` if a joint configuration has a positive probability
    ///   while one of its marginals is zero
    pub fn mutual_information(&mut self, x: NodeId, y: NodeId) -> Result<f64> {
        self.check_node(x)?;
        self.check_node(y)?;
        self.make_inference()?;

        let set: NodeSet = [x, y].iter().cloned().collect();
        let mut pxy = self.algorithm.unnormalized_joint_posterior(&self.context, &set)?;
        pxy.normalize()?;

        if x == y {
            return Ok(pxy.entropy());
        }

        let model = self.context.model()?;
        let vx = model.variable(x)?.clone();
        let vy = model.variable(y)?.clone();
        let px = pxy.sum_out(&[vy])?;
        let py = pxy.sum_out(&[vx])?;

        let mut inst = Instantiation::from_vars(pxy.variables())?;
        let mut info = 0.0;
        inst.set_first();
        while !inst.end() {
            let p = pxy.get(&inst)?;
            if p > 0.0 {
                let (p_x, p_y) = (px.get_restricted(&inst)?, py.get_restricted(&inst)?);
                if p_x == 0.0 || p_y == 0.0 {
                    return Err(BayesError::OperationNotAllowed(
                        format!("mutual information of {} and {}: null marginal with a positive joint", x, y)
                    ));
                }
                info += p * (p.log2() - p_x.log2() - p_y.log2());
            }
            inst.inc();
        }
        Ok(info)
    }

    /// Variation of information: ```H(X) + H(Y) - 2 I(X, Y)```
    pub fn variation_of_information(&mut self, x: NodeId, y: NodeId) -> Result<f64> {
        let set: NodeSet = [x, y].iter().cloned().collect();
        self.check_node(x)?;
        self.check_node(y)?;
        self.make_inference()?;

        let mut pxy = self.algorithm.unnormalized_joint_posterior(&self.context, &set)?;
        pxy.normalize()?;
        let h = |keep: NodeId, model: &M, p: &Factor| -> Result<f64> {
            let var = model.variable(keep)?.clone();
            projection::project_onto(p, &[var], Reduction::Sum).map(|m| m.entropy())
        };
        let model = self.context.model()?;
        let (hx, hy) = (h(x, model, &pxy)?, h(y, model, &pxy)?);

        Ok(hx + hy - 2.0 * self.mutual_information(x, y)?)
    }

    /// The posterior of `target` for every assignment of the nodes of `evidence` that are not
    /// separated from it.
    ///
    /// The result is a table over `target` followed by the variables of the minimal conditioning
    /// set. It is filled by observing each assignment of the conditioning set in turn, so the
    /// engine is left with `target` as its only marginal target, no joint target and the last
    /// assignment as evidence.
    ///
    /// # Errors
    /// * `BayesError::InvalidArgument` if `target` is in `evidence`
    pub fn evidence_impact(&mut self, target: NodeId, evidence: &NodeSet) -> Result<Factor> {
        self.check_node(target)?;
        for &n in evidence.iter() {
            self.check_node(n)?;
        }
        if evidence.contains(&target) {
            return Err(BayesError::InvalidArgument(
                format!("target {} can not be in its conditioning set {:?}", target, evidence)
            ));
        }

        let model = self.context.model()?;
        let conditioning = model.minimal_conditioning_set(target, evidence)?;
        let target_var = model.variable(target)?.clone();
        let mut scope = vec![target_var.clone()];
        let mut conditioning_vars: Vec<(NodeId, Variable)> = Vec::with_capacity(conditioning.len());
        for &n in conditioning.iter() {
            let v = model.variable(n)?.clone();
            scope.push(v.clone());
            conditioning_vars.push((n, v));
        }
        debug!(target, ?conditioning, "evidence impact");

        self.erase_all_targets()?;
        self.erase_all_evidence();
        self.add_target(target)?;
        for &(n, _) in conditioning_vars.iter() {
            self.add_evidence(n, 0)?;
        }

        let mut res = Factor::new(scope)?;
        let only_target = Instantiation::from_vars(&[target_var])?;
        let mut inst = res.instantiation();
        inst.set_first_out(&only_target);
        while !inst.end() {
            for (n, v) in conditioning_vars.iter() {
                self.chg_evidence(*n, inst.val(v)?)?;
            }

            let post = self.posterior(target)?;
            inst.set_first_in(&only_target);
            while !inst.end() {
                res.set(&inst, post.get_restricted(&inst)?)?;
                inst.inc_in(&only_target);
            }

            // clears the overflow of the inner loop
            inst.set_first_in(&only_target);
            inst.inc_out(&only_target);
        }

        Ok(res)
    }

}
