//! Bookkeeping of the posteriors a client wants: marginal targets (single nodes) and joint
//! targets (sets of nodes).
//!
//! The registries validate every request against the model before touching their content, and
//! report each effective change to a `TargetObserver`, the inference algorithm whose caches depend
//! on the targets. They do not know about the inference state: the mutating methods return
//! whether something changed so their owner can outdate it.

use crate::model::{GraphicalModel, NodeId, NodeSet};
use crate::util::{BayesError, Result};

use tracing::trace;

/// Hooks fired by the target registries. All default to doing nothing.
pub trait TargetObserver {

    fn on_marginal_target_added(&mut self, _node: NodeId) {}

    fn on_marginal_target_erased(&mut self, _node: NodeId) {}

    /// Every node of the model became a marginal target at once
    fn on_all_marginal_targets_added(&mut self) {}

    /// Fired before the marginal targets are cleared
    fn on_all_marginal_targets_erased(&mut self) {}

    fn on_joint_target_added(&mut self, _set: &NodeSet) {}

    fn on_joint_target_erased(&mut self, _set: &NodeSet) {}

    /// Fired before the joint targets are cleared
    fn on_all_joint_targets_erased(&mut self) {}

}

fn check_node<M: GraphicalModel + ?Sized>(model: &M, node: NodeId) -> Result<()> {
    if model.exists(node) {
        Ok(())
    } else {
        Err(BayesError::undefined_node(node))
    }
}

/// The set of single nodes whose posterior is wanted.
///
/// Until the first explicit change, the registry is in default mode and every node of the model
/// is a target. Adding or erasing a target switches it to targeted mode, where only the nodes
/// explicitly added are.
#[derive(Clone, Debug, Default)]
pub struct MarginalTargets {
    targets: NodeSet,
    targeted_mode: bool,
}

impl MarginalTargets {

    /// A registry in default mode, without model
    pub fn new() -> Self {
        MarginalTargets { targets: NodeSet::new(), targeted_mode: false }
    }

    /// Revert to default mode: every node of `model` is a target
    pub fn reset<M, O>(&mut self, model: &M, observer: &mut O)
        where M: GraphicalModel + ?Sized, O: TargetObserver + ?Sized
    {
        self.targeted_mode = false;
        observer.on_all_marginal_targets_added();
        self.targets = model.nodes();
    }

    pub fn is_targeted_mode(&self) -> bool {
        self.targeted_mode
    }

    /// The current targets
    pub fn targets(&self) -> &NodeSet {
        &self.targets
    }

    pub fn nbr_targets(&self) -> usize {
        self.targets.len()
    }

    /// # Errors
    /// * `BayesError::UndefinedElement` if `node` is not in `model`
    pub fn is_target<M: GraphicalModel + ?Sized>(&self, model: &M, node: NodeId) -> Result<bool> {
        check_node(model, node)?;
        Ok(self.targets.contains(&node))
    }

    /// Leave default mode, forgetting the implicit targets
    fn set_targeted_mode(&mut self) {
        if !self.targeted_mode {
            self.targets.clear();
            self.targeted_mode = true;
        }
    }

    /// Add a marginal target.
    ///
    /// # Returns
    /// `true` if `node` was not already a target
    ///
    /// # Errors
    /// * `BayesError::UndefinedElement` if `node` is not in `model`
    pub fn add<M, O>(&mut self, model: &M, node: NodeId, observer: &mut O) -> Result<bool>
        where M: GraphicalModel + ?Sized, O: TargetObserver + ?Sized
    {
        check_node(model, node)?;
        self.set_targeted_mode();

        if !self.targets.insert(node) {
            return Ok(false);
        }
        trace!(node, "marginal target added");
        observer.on_marginal_target_added(node);
        Ok(true)
    }

    /// Add every node of `model` as a target, notifying each insertion.
    ///
    /// # Returns
    /// `true` if at least one node was added
    pub fn add_all<M, O>(&mut self, model: &M, observer: &mut O) -> bool
        where M: GraphicalModel + ?Sized, O: TargetObserver + ?Sized
    {
        self.set_targeted_mode();

        let mut changed = false;
        for node in model.nodes() {
            if self.targets.insert(node) {
                observer.on_marginal_target_added(node);
                changed = true;
            }
        }
        changed
    }

    /// Erase a marginal target. Erasing a node that is not a target is a no-op.
    ///
    /// # Returns
    /// `true` if `node` was a target
    ///
    /// # Errors
    /// * `BayesError::UndefinedElement` if `node` is not in `model`
    pub fn erase<M, O>(&mut self, model: &M, node: NodeId, observer: &mut O) -> Result<bool>
        where M: GraphicalModel + ?Sized, O: TargetObserver + ?Sized
    {
        check_node(model, node)?;
        if !self.targets.contains(&node) {
            return Ok(false);
        }

        // the remaining implicit targets become explicit
        self.targeted_mode = true;
        observer.on_marginal_target_erased(node);
        self.targets.remove(&node);
        trace!(node, "marginal target erased");
        Ok(true)
    }

    /// Erase every marginal target and stay in targeted mode
    pub fn erase_all<O: TargetObserver + ?Sized>(&mut self, observer: &mut O) {
        observer.on_all_marginal_targets_erased();
        self.targets.clear();
        self.targeted_mode = true;
    }

}


/// The sets of nodes whose joint posterior is wanted.
///
/// No registered set is ever a subset of another one: a set included in a registered one is not
/// added, and a set including registered ones replaces them.
#[derive(Clone, Debug, Default)]
pub struct JointTargets {
    targets: Vec<NodeSet>,
}

impl JointTargets {

    pub fn new() -> Self {
        JointTargets { targets: Vec::new() }
    }

    fn check<M: GraphicalModel + ?Sized>(model: &M, set: &NodeSet) -> Result<()> {
        if set.is_empty() {
            return Err(BayesError::InvalidArgument(String::from("empty joint target")));
        }
        for &node in set.iter() {
            check_node(model, node)?;
        }
        Ok(())
    }

    /// The registered targets, in insertion order
    pub fn targets(&self) -> &[NodeSet] {
        &self.targets
    }

    pub fn nbr_targets(&self) -> usize {
        self.targets.len()
    }

    /// Check if exactly `set` is registered
    ///
    /// # Errors
    /// * `BayesError::InvalidArgument` if `set` is empty
    /// * `BayesError::UndefinedElement` if a node of `set` is not in `model`
    pub fn is_target<M: GraphicalModel + ?Sized>(&self, model: &M, set: &NodeSet) -> Result<bool> {
        JointTargets::check(model, set)?;
        Ok(self.targets.contains(set))
    }

    /// The registered target to answer a query on `set` with: `set` itself if registered, else
    /// the first registered target including it.
    pub fn covering(&self, set: &NodeSet) -> Option<&NodeSet> {
        self.targets.iter()
                    .find(|&t| t == set)
                    .or_else(|| self.targets.iter().find(|t| t.is_superset(set)))
    }

    /// Add a joint target.
    ///
    /// # Returns
    /// `true` if `set` was added, `false` if a registered target already includes it
    ///
    /// # Errors
    /// * `BayesError::InvalidArgument` if `set` is empty
    /// * `BayesError::UndefinedElement` if a node of `set` is not in `model`
    pub fn add<M, O>(&mut self, model: &M, set: &NodeSet, observer: &mut O) -> Result<bool>
        where M: GraphicalModel + ?Sized, O: TargetObserver + ?Sized
    {
        JointTargets::check(model, set)?;

        if self.targets.iter().any(|t| t.is_superset(set)) {
            return Ok(false);
        }

        let subsumed: Vec<NodeSet> = self.targets.iter().filter(|t| t.is_subset(set)).cloned().collect();
        for t in subsumed.iter() {
            observer.on_joint_target_erased(t);
            self.targets.retain(|u| u != t);
        }

        self.targets.push(set.clone());
        trace!(?set, replaced = subsumed.len(), "joint target added");
        observer.on_joint_target_added(set);
        Ok(true)
    }

    /// Erase a joint target. Erasing a set that is not registered is a no-op.
    ///
    /// # Returns
    /// `true` if `set` was registered
    pub fn erase<M, O>(&mut self, model: &M, set: &NodeSet, observer: &mut O) -> Result<bool>
        where M: GraphicalModel + ?Sized, O: TargetObserver + ?Sized
    {
        JointTargets::check(model, set)?;
        match self.targets.iter().position(|t| t == set) {
            Some(p) => {
                observer.on_joint_target_erased(set);
                self.targets.remove(p);
                Ok(true)
            },
            None => Ok(false)
        }
    }

    /// Erase every joint target.
    ///
    /// # Returns
    /// `true` if there was at least one
    pub fn erase_all<O: TargetObserver + ?Sized>(&mut self, observer: &mut O) -> bool {
        if self.targets.is_empty() {
            return false;
        }
        observer.on_all_joint_targets_erased();
        self.targets.clear();
        true
    }

}
