//! Definition of the instantiation module
//!
//! An `Instantiation` is a cursor over the joint values of an ordered set of `Variable`s. It is
//! used to address cells of a `Factor` and to walk Cartesian products without materializing
//! them. The storage convention shared with `Factor` is "first variable varies fastest": for
//! variables `v_0..v_{k-1}` the stride of `v_i` is the product of the domain sizes of
//! `v_0..v_{i-1}` and the offset of an assignment is `sum(value(v_i) * stride(v_i))`.
//!
//! An `Instantiation` may act as the *slave* of a `Factor`. A slave keeps the factor's variable
//! set in sync (changes are delivered through a channel the factor only references weakly) and
//! caches its linear offset into the factor, which makes `Factor::get`/`Factor::set` O(1).

use crate::util::{BayesError, Result};
use crate::variable::Variable;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Change of the variable sequence of a master `Factor`, as seen by its slaves
#[derive(Clone, Debug)]
pub(crate) enum MasterChange {
    Added(Variable),
    Erased(Variable),
}

/// Channel between a `Factor` and one of its slave `Instantiation`s.
///
/// The slave owns the channel; the factor holds a `Weak` reference, so a dropped slave simply
/// disappears from the factor's observer list, and a dropped factor marks the channel dead.
#[derive(Debug)]
pub(crate) struct SlaveChannel {
    /// uid of the master factor
    pub(crate) master: u64,

    /// the variable sequence of the master, as of the last change
    pub(crate) layout: Vec<Variable>,

    /// changes not yet applied by the slave
    pub(crate) pending: Vec<MasterChange>,

    /// `false` once the master has been dropped
    pub(crate) alive: bool,
}

pub(crate) type SlaveLink = Rc<RefCell<SlaveChannel>>;

/// Binding of a slave `Instantiation` to its master
struct MasterBinding {
    link: SlaveLink,

    /// stride in the master of each variable of the instantiation, by position
    strides: Vec<usize>,

    /// cached offset of the current values into the master
    offset: usize,
}

/// Compute the strides of `vars` inside a table whose variable sequence is `layout`
fn strides_in(layout: &[Variable], vars: &[Variable]) -> Vec<usize> {
    let mut table_strides = Vec::with_capacity(layout.len());
    let mut acc = 1;
    for v in layout.iter() {
        table_strides.push(acc);
        acc *= v.cardinality();
    }

    vars.iter()
        .map(|v| layout.iter().position(|l| l == v).map(|p| table_strides[p]).unwrap_or(0))
        .collect()
}


/// A joint assignment to an ordered set of `Variable`s with odometer-style traversal.
pub struct Instantiation {
    /// the variables, in cursor order. The first variable is incremented first.
    vars: Vec<Variable>,

    /// the current value of each variable, by position
    vals: Vec<usize>,

    /// set when a traversal wrapped around
    overflow: bool,

    /// the master `Factor`, if acting as a slave
    master: Option<MasterBinding>,
}

impl Instantiation {

    /// Create an empty `Instantiation`
    pub fn new() -> Self {
        Instantiation { vars: Vec::new(), vals: Vec::new(), overflow: false, master: None }
    }

    /// Create an `Instantiation` over the given `Variable`s, all set to their first value
    ///
    /// # Errors
    /// * `BayesError::DuplicateElement` if a variable appears twice
    pub fn from_vars(vars: &[Variable]) -> Result<Self> {
        let mut inst = Instantiation::new();
        for v in vars.iter() {
            inst.add(v)?;
        }
        Ok(inst)
    }

    /// Create an `Instantiation` that is a slave of a table whose variables are described by the
    /// given channel.
    pub(crate) fn with_master(link: SlaveLink) -> Self {
        let layout = link.borrow().layout.clone();
        let strides = strides_in(&layout, &layout);
        let vals = vec![0; layout.len()];

        Instantiation {
            vars: layout,
            vals,
            overflow: false,
            master: Some(MasterBinding { link, strides, offset: 0 }),
        }
    }

    ///////////////////////////////////////////////////////////////////////////////////////////
    // Variable set

    /// Get the number of variables
    pub fn nbr_dim(&self) -> usize {
        self.vars.len()
    }

    /// Get the variables, in cursor order
    pub fn variables(&self) -> &[Variable] {
        &self.vars
    }

    /// Check if the `Instantiation` contains a `Variable`
    pub fn contains(&self, var: &Variable) -> bool {
        self.vars.contains(var)
    }

    /// Get the position of a `Variable`
    ///
    /// # Errors
    /// * `BayesError::NotFound` if `var` is not in the `Instantiation`
    pub fn pos(&self, var: &Variable) -> Result<usize> {
        self.vars
            .iter()
            .position(|v| v == var)
            .ok_or_else(|| BayesError::NotFound(format!("{} in instantiation", var)))
    }

    /// Get the number of joint values, i.e. the product of the domain sizes
    pub fn domain_size(&self) -> usize {
        self.vars.iter().map(|v| v.cardinality()).product()
    }

    /// Add a `Variable`, set to its first value
    ///
    /// # Errors
    /// * `BayesError::OperationNotAllowed` if the `Instantiation` is the slave of a `Factor`. Its
    ///   variables are those of its master.
    /// * `BayesError::DuplicateElement` if `var` is already present
    pub fn add(&mut self, var: &Variable) -> Result<()> {
        if self.master.is_some() {
            return Err(BayesError::OperationNotAllowed(
                String::from("the variables of a slave instantiation follow its master")
            ));
        }

        if self.contains(var) {
            return Err(BayesError::DuplicateElement(format!("{} in instantiation", var)));
        }

        self.vars.push(var.clone());
        self.vals.push(0);
        Ok(())
    }

    /// Remove a `Variable`
    ///
    /// # Errors
    /// * `BayesError::OperationNotAllowed` if the `Instantiation` is a slave
    /// * `BayesError::NotFound` if `var` is not present
    pub fn erase(&mut self, var: &Variable) -> Result<()> {
        if self.master.is_some() {
            return Err(BayesError::OperationNotAllowed(
                String::from("the variables of a slave instantiation follow its master")
            ));
        }

        let p = self.pos(var)?;
        self.vars.remove(p);
        self.vals.remove(p);
        Ok(())
    }

    /// Move the given variables to the front of the cursor order, in the given order. Variables
    /// not listed keep their relative order after them. The strides into a master are re-derived.
    ///
    /// # Errors
    /// * `BayesError::NotFound` if a listed variable is not in the `Instantiation`
    pub fn reorder(&mut self, order: &[Variable]) -> Result<()> {
        let mut positions = Vec::with_capacity(self.vars.len());
        for v in order.iter() {
            let p = self.pos(v)?;
            if !positions.contains(&p) {
                positions.push(p);
            }
        }
        for p in 0..self.vars.len() {
            if !positions.contains(&p) {
                positions.push(p);
            }
        }

        self.vars = positions.iter().map(|&p| self.vars[p].clone()).collect();
        self.vals = positions.iter().map(|&p| self.vals[p]).collect();
        self.rebind();
        Ok(())
    }

    ///////////////////////////////////////////////////////////////////////////////////////////
    // Master / slave

    /// Check if the `Instantiation` is currently the slave of a `Factor`
    pub fn is_slave(&self) -> bool {
        self.master.is_some()
    }

    /// Check if the cached offset of this `Instantiation` is valid for the table with uid `uid`
    pub(crate) fn cached_offset_for(&self, uid: u64) -> Option<usize> {
        self.master.as_ref().and_then(|b| {
            let channel = b.link.borrow();
            if channel.alive && channel.master == uid && channel.pending.is_empty() {
                Some(b.offset)
            } else {
                None
            }
        })
    }

    /// Apply the pending changes of the master `Factor`.
    ///
    /// Added variables are set to their first value, erased variables are dropped. If the master
    /// has been dropped, the `Instantiation` forgets it and becomes a free instantiation over its
    /// current variables.
    ///
    /// # Returns
    /// `true` if the `Instantiation` is still a slave after synchronization
    pub fn sync(&mut self) -> bool {
        let (changes, layout, alive) = match self.master {
            None => return false,
            Some(ref b) => {
                let mut channel = b.link.borrow_mut();
                let changes: Vec<MasterChange> = channel.pending.drain(..).collect();
                (changes, channel.layout.clone(), channel.alive)
            }
        };

        for change in changes.into_iter() {
            match change {
                MasterChange::Added(v) => {
                    if !self.vars.contains(&v) {
                        self.vars.push(v);
                        self.vals.push(0);
                    }
                },
                MasterChange::Erased(v) => {
                    if let Some(p) = self.vars.iter().position(|x| *x == v) {
                        self.vars.remove(p);
                        self.vals.remove(p);
                    }
                }
            }
        }

        if !alive {
            self.master = None;
            return false;
        }

        if let Some(ref mut b) = self.master {
            b.strides = strides_in(&layout, &self.vars);
        }
        self.refresh_offset();
        true
    }

    /// Stop acting as a slave. The variables and values are kept.
    pub fn forget_master(&mut self) {
        self.master = None;
    }

    /// Apply pending master changes, if any, before a cursor operation
    fn sync_if_needed(&mut self) {
        let stale = match self.master {
            Some(ref b) => {
                let channel = b.link.borrow();
                !channel.pending.is_empty() || !channel.alive
            },
            None => false
        };
        if stale {
            self.sync();
        }
    }

    /// Re-derive the strides into the master after the cursor order changed
    fn rebind(&mut self) {
        if let Some(ref mut b) = self.master {
            let layout = b.link.borrow().layout.clone();
            b.strides = strides_in(&layout, &self.vars);
        }
        self.refresh_offset();
    }

    fn refresh_offset(&mut self) {
        if let Some(ref mut b) = self.master {
            b.offset = self.vals.iter().zip(b.strides.iter()).map(|(v, s)| v * s).sum();
        }
    }

    /// Change the value at position `i`, keeping the cached offset current
    fn put(&mut self, i: usize, val: usize) {
        let old = self.vals[i];
        self.vals[i] = val;
        if let Some(ref mut b) = self.master {
            let s = b.strides[i];
            if val >= old {
                b.offset += (val - old) * s;
            } else {
                b.offset -= (old - val) * s;
            }
        }
    }

    ///////////////////////////////////////////////////////////////////////////////////////////
    // Values

    /// Get the value of a `Variable`
    ///
    /// # Errors
    /// * `BayesError::NotFound` if `var` is not in the `Instantiation`
    pub fn val(&self, var: &Variable) -> Result<usize> {
        self.pos(var).map(|p| self.vals[p])
    }

    /// Get the values, by position
    pub fn values(&self) -> &[usize] {
        &self.vals
    }

    /// Set the value of a `Variable`
    ///
    /// # Errors
    /// * `BayesError::NotFound` if `var` is not in the `Instantiation`
    /// * `BayesError::InvalidArgument` if `val` is outside of the domain of `var`
    pub fn set(&mut self, var: &Variable, val: usize) -> Result<()> {
        self.sync_if_needed();
        let p = self.pos(var)?;
        if val >= var.cardinality() {
            return Err(BayesError::InvalidArgument(
                format!("value {} out of the domain of {}", val, var)
            ));
        }
        self.put(p, val);
        Ok(())
    }

    /// Copy the values of the variables shared with `other`. Other variables are unchanged.
    pub fn chg_values_from(&mut self, other: &Instantiation) {
        self.sync_if_needed();
        for i in 0..self.vars.len() {
            if let Ok(val) = other.val(&self.vars[i]) {
                self.put(i, val);
            }
        }
    }

    /// `true` once a traversal has wrapped around
    pub fn end(&self) -> bool {
        self.overflow
    }

    /// Clear the overflow flag without changing the values
    pub fn unset_overflow(&mut self) {
        self.overflow = false;
    }

    ///////////////////////////////////////////////////////////////////////////////////////////
    // Full traversal

    /// Set every variable to its first value
    pub fn set_first(&mut self) {
        self.sync_if_needed();
        self.overflow = false;
        for v in self.vals.iter_mut() {
            *v = 0;
        }
        self.refresh_offset();
    }

    /// Set every variable to its last value
    pub fn set_last(&mut self) {
        self.sync_if_needed();
        self.overflow = false;
        for (v, var) in self.vals.iter_mut().zip(self.vars.iter()) {
            *v = var.cardinality() - 1;
        }
        self.refresh_offset();
    }

    /// Move to the next joint value, in offset order. Sets the overflow flag after the last one.
    pub fn inc(&mut self) {
        self.inc_filtered(|_| true);
    }

    /// Move to the previous joint value. Sets the overflow flag before the first one.
    pub fn dec(&mut self) {
        self.sync_if_needed();
        for i in 0..self.vars.len() {
            if self.vals[i] > 0 {
                let val = self.vals[i] - 1;
                self.put(i, val);
                return;
            }
            let last = self.vars[i].cardinality() - 1;
            self.put(i, last);
        }
        self.overflow = true;
    }

    /// Odometer increment over the positions accepted by `keep`: the first accepted position is
    /// incremented and on wrap-around it is reset and the carry moves to the next one.
    fn inc_filtered<F: Fn(&Variable) -> bool>(&mut self, keep: F) {
        self.sync_if_needed();
        for i in 0..self.vars.len() {
            if !keep(&self.vars[i]) {
                continue;
            }

            let val = self.vals[i] + 1;
            if val < self.vars[i].cardinality() {
                self.put(i, val);
                return;
            }
            self.put(i, 0);
        }
        self.overflow = true;
    }

    fn set_first_filtered<F: Fn(&Variable) -> bool>(&mut self, keep: F) {
        self.sync_if_needed();
        self.overflow = false;
        for i in 0..self.vars.len() {
            if keep(&self.vars[i]) {
                self.put(i, 0);
            }
        }
    }

    ///////////////////////////////////////////////////////////////////////////////////////////
    // Partial traversals

    /// Set `var` to its first value, leaving the others unchanged
    ///
    /// # Errors
    /// * `BayesError::NotFound` if `var` is not in the `Instantiation`
    pub fn set_first_var(&mut self, var: &Variable) -> Result<()> {
        self.sync_if_needed();
        let p = self.pos(var)?;
        self.overflow = false;
        self.put(p, 0);
        Ok(())
    }

    /// Increment `var` only. Wrapping around sets the overflow flag.
    ///
    /// # Errors
    /// * `BayesError::NotFound` if `var` is not in the `Instantiation`
    pub fn inc_var(&mut self, var: &Variable) -> Result<()> {
        self.sync_if_needed();
        let p = self.pos(var)?;
        let val = self.vals[p] + 1;
        if val < var.cardinality() {
            self.put(p, val);
        } else {
            self.put(p, 0);
            self.overflow = true;
        }
        Ok(())
    }

    /// Set every variable but `var` to its first value
    pub fn set_first_not_var(&mut self, var: &Variable) {
        self.set_first_filtered(|v| v != var);
    }

    /// Odometer increment over every variable but `var`
    pub fn inc_not_var(&mut self, var: &Variable) {
        self.inc_filtered(|v| v != var);
    }

    /// Set the variables that also belong to `other` to their first value
    pub fn set_first_in(&mut self, other: &Instantiation) {
        self.set_first_filtered(|v| other.contains(v));
    }

    /// Odometer increment over the variables that also belong to `other`
    pub fn inc_in(&mut self, other: &Instantiation) {
        self.inc_filtered(|v| other.contains(v));
    }

    /// Set the variables that do not belong to `other` to their first value
    pub fn set_first_out(&mut self, other: &Instantiation) {
        self.set_first_filtered(|v| !other.contains(v));
    }

    /// Odometer increment over the variables that do not belong to `other`
    pub fn inc_out(&mut self, other: &Instantiation) {
        self.inc_filtered(|v| !other.contains(v));
    }

}

impl Default for Instantiation {
    fn default() -> Self {
        Instantiation::new()
    }
}

/// Copies are free instantiations: they never inherit the master of the original.
impl Clone for Instantiation {
    fn clone(&self) -> Self {
        Instantiation {
            vars: self.vars.clone(),
            vals: self.vals.clone(),
            overflow: self.overflow,
            master: None,
        }
    }
}

impl fmt::Debug for Instantiation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<")?;
        for (i, (var, val)) in self.vars.iter().zip(self.vals.iter()).enumerate() {
            if i > 0 {
                write!(f, "|")?;
            }
            write!(f, "{}:{}", var.name(), val)?;
        }
        write!(f, ">")
    }
}


/// Multi-buffer odometer used by the table operations.
///
/// It walks the Cartesian product of a list of dimensions, first dimension fastest, while
/// maintaining one linear offset per tracked buffer. Each dimension carries a per-buffer stride
/// (zero when the buffer does not depend on it) and a "remaining before carry" counter, so a step
/// costs O(1) amortized: the counter of the first dimension is decremented, and only when it
/// reaches zero is the dimension rewound and the carry propagated.
pub(crate) struct OffsetOdometer {
    dims: Vec<usize>,

    /// `strides[b][i]`: stride of dimension `i` in buffer `b`
    strides: Vec<Vec<usize>>,

    remaining: Vec<usize>,

    offsets: Vec<usize>,
}

impl OffsetOdometer {

    /// Start an odometer at offset 0 in every buffer
    pub(crate) fn new(dims: Vec<usize>, strides: Vec<Vec<usize>>) -> Self {
        let remaining = dims.clone();
        let offsets = vec![0; strides.len()];
        OffsetOdometer { dims, strides, remaining, offsets }
    }

    /// Current offset into buffer `b`
    #[inline]
    pub(crate) fn offset(&self, b: usize) -> usize {
        self.offsets[b]
    }

    /// Advance to the next position.
    ///
    /// # Returns
    /// `false` when the whole product has been visited; the offsets are then back at their start
    pub(crate) fn advance(&mut self) -> bool {
        for i in 0..self.dims.len() {
            if self.remaining[i] > 1 {
                self.remaining[i] -= 1;
                for (o, s) in self.offsets.iter_mut().zip(self.strides.iter()) {
                    *o += s[i];
                }
                return true;
            }

            // rewind dimension i and carry into the next one
            self.remaining[i] = self.dims[i];
            let span = self.dims[i] - 1;
            for (o, s) in self.offsets.iter_mut().zip(self.strides.iter()) {
                *o -= s[i] * span;
            }
        }
        false
    }

}
