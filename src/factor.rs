//! Definition of the factor module
//!
//! A `Factor` (a.k.a. table, potential or tensor) represents a function from the joint values of
//! an ordered set of `Variable`s to scalars. Values are stored in a flat buffer where the first
//! variable varies fastest, see `instantiation` for the offset convention.
//!
//! Table operations producing new factors (combination, marginalization) live in the
//! `combination` and `projection` submodules. They never mutate their operands.

use crate::instantiation::{Instantiation, MasterChange, OffsetOdometer, SlaveChannel, SlaveLink};
use crate::util::{BayesError, Result};
use crate::variable::Variable;

use ndarray::{ArrayD, ArrayViewD, IxDyn, ShapeBuilder};

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

pub mod combination;
pub mod projection;

pub use self::combination::TableCombination;
pub use self::projection::Reduction;

/// Alias f64 ndarray::ArrayD as Table
pub type Table = ArrayD<f64>;

/// Source of the identities of `Factor`s, used to match slaves with their master
static NEXT_UID: AtomicU64 = AtomicU64::new(0);

fn next_uid() -> u64 {
    NEXT_UID.fetch_add(1, Ordering::Relaxed)
}


/// A multidimensional table of `f64` over an ordered sequence of discrete `Variable`s.
///
/// # Invariant
/// the length of the buffer is the product of the domain sizes of the variables, and no variable
/// appears twice (by identity or by name).
pub struct Factor {
    /// identity of this table, matched against the channels of its slaves
    uid: u64,

    /// The scope of the `Factor`, in storage order
    variables: Vec<Variable>,

    /// The values of the `Factor` table, first variable fastest
    values: Vec<f64>,

    /// slave instantiations, referenced weakly
    slaves: Vec<Weak<RefCell<SlaveChannel>>>,
}


impl Factor {

    /// Create a new `Factor` over `variables`, filled with zeros.
    ///
    /// # Errors
    /// * `BayesError::DuplicateElement` if two variables are the same or share a name
    pub fn new(variables: Vec<Variable>) -> Result<Self> {
        check_distinct(&variables)?;
        let size = variables.iter().map(|v| v.cardinality()).product();
        Ok(Factor { uid: next_uid(), variables, values: vec![0.0; size], slaves: Vec::new() })
    }

    /// Create the 0-dimensional `Factor` holding a single value
    pub fn scalar(value: f64) -> Self {
        Factor { uid: next_uid(), variables: Vec::new(), values: vec![value], slaves: Vec::new() }
    }

    /// Create a `Factor` from a flat buffer in storage order (first variable fastest)
    ///
    /// # Errors
    /// * `BayesError::DuplicateElement` if two variables are the same or share a name
    /// * `BayesError::InvalidArgument` if the number of values does not match the domain size
    pub fn from_values(variables: Vec<Variable>, values: Vec<f64>) -> Result<Self> {
        check_distinct(&variables)?;
        let size: usize = variables.iter().map(|v| v.cardinality()).product();
        if size != values.len() {
            return Err(BayesError::InvalidArgument(
                format!("expected {} values, got {}", size, values.len())
            ));
        }

        Ok(Factor { uid: next_uid(), variables, values, slaves: Vec::new() })
    }

    /// Create a `Factor` from an `ndarray` table whose axis `i` is indexed by `variables[i]`.
    ///
    /// # Errors
    /// * `BayesError::InvalidArgument` if the shape of the table does not match the domains
    /// * `BayesError::DuplicateElement` if two variables are the same or share a name
    pub fn from_array(variables: Vec<Variable>, table: Table) -> Result<Self> {
        if variables.len() != table.ndim() {
            return Err(BayesError::InvalidArgument(
                String::from("Cardinality of scope must match number of table dimensions")
            ));
        }

        for (v, t) in variables.iter().map(|v| v.cardinality()).zip(table.shape().iter()) {
            if v != *t {
                return Err(BayesError::InvalidArgument(String::from("Dimensions do not match")));
            }
        }

        // iterating the transposed view in logical order visits the first axis fastest
        let values = table.t().iter().cloned().collect();
        Factor::from_values(variables, values)
    }

    /// Create the indicator `Factor` of `var == value`
    ///
    /// # Errors
    /// * `BayesError::InvalidArgument` if `value` is outside of the domain of `var`
    pub fn indicator(var: &Variable, value: usize) -> Result<Self> {
        if value >= var.cardinality() {
            return Err(BayesError::InvalidArgument(
                format!("value {} out of the domain of {}", value, var)
            ));
        }

        let mut values = vec![0.0; var.cardinality()];
        values[value] = 1.0;
        Factor::from_values(vec![var.clone()], values)
    }

    ///////////////////////////////////////////////////////////////////////////////////////////
    // Structure

    /// Retrieve the scope of the `Factor`, in storage order
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// Get the number of variables
    pub fn nbr_dim(&self) -> usize {
        self.variables.len()
    }

    /// Get the number of cells of the table
    pub fn domain_size(&self) -> usize {
        self.values.len()
    }

    /// Check if the `Factor` depends on `var`
    pub fn contains(&self, var: &Variable) -> bool {
        self.variables.contains(var)
    }

    /// Get the position of `var` in the variable sequence
    ///
    /// # Errors
    /// * `BayesError::NotFound` if `var` is not in the scope
    pub fn pos(&self, var: &Variable) -> Result<usize> {
        self.variables
            .iter()
            .position(|v| v == var)
            .ok_or_else(|| BayesError::NotFound(format!("{} in factor", var)))
    }

    /// Get the stride of each variable, in storage order
    pub fn strides(&self) -> Vec<usize> {
        let mut strides = Vec::with_capacity(self.variables.len());
        let mut acc = 1;
        for v in self.variables.iter() {
            strides.push(acc);
            acc *= v.cardinality();
        }
        strides
    }

    /// Append a variable to the scope.
    ///
    /// The new variable becomes the slowest varying one and the existing content is replicated
    /// for each of its values. Slave instantiations are notified.
    ///
    /// # Errors
    /// * `BayesError::DuplicateElement` if `var`, or a variable with the same name, is present
    pub fn add(&mut self, var: &Variable) -> Result<()> {
        if let Some(v) = self.variables.iter().find(|v| *v == var || v.name() == var.name()) {
            return Err(BayesError::DuplicateElement(format!("{} in factor", v)));
        }

        let old = self.values.len();
        let mut values = Vec::with_capacity(old * var.cardinality());
        for _ in 0..var.cardinality() {
            values.extend_from_slice(&self.values);
        }

        self.values = values;
        self.variables.push(var.clone());
        self.notify(MasterChange::Added(var.clone()));
        Ok(())
    }

    /// Remove a variable from the scope, keeping the slice where it takes its first value.
    /// Slave instantiations are notified.
    ///
    /// # Errors
    /// * `BayesError::NotFound` if `var` is not in the scope
    pub fn erase(&mut self, var: &Variable) -> Result<()> {
        let p = self.pos(var)?;

        let kept: Vec<Variable> = self.variables.iter().filter(|v| *v != var).cloned().collect();
        let strides = self.strides();
        let dims = kept.iter().map(|v| v.cardinality()).collect();
        let src: Vec<usize> = strides.iter()
                                     .enumerate()
                                     .filter(|&(i, _)| i != p)
                                     .map(|(_, &s)| s)
                                     .collect();

        let mut values = Vec::with_capacity(self.values.len() / var.cardinality());
        let mut odo = OffsetOdometer::new(dims, vec![src]);
        loop {
            values.push(self.values[odo.offset(0)]);
            if !odo.advance() {
                break;
            }
        }

        self.values = values;
        self.variables = kept;
        self.notify(MasterChange::Erased(var.clone()));
        Ok(())
    }

    /// Create a slave `Instantiation` over this `Factor`. The instantiation follows later
    /// changes of the variable sequence and caches its offset into the table.
    pub fn instantiation(&mut self) -> Instantiation {
        let link: SlaveLink = Rc::new(RefCell::new(SlaveChannel {
            master: self.uid,
            layout: self.variables.clone(),
            pending: Vec::new(),
            alive: true,
        }));
        self.slaves.retain(|w| w.upgrade().is_some());
        self.slaves.push(Rc::downgrade(&link));
        Instantiation::with_master(link)
    }

    /// Get the number of live slave instantiations
    pub fn nbr_slaves(&self) -> usize {
        self.slaves.iter().filter(|w| w.upgrade().is_some()).count()
    }

    fn notify(&mut self, change: MasterChange) {
        self.slaves.retain(|w| w.upgrade().is_some());
        for w in self.slaves.iter() {
            if let Some(link) = w.upgrade() {
                let mut channel = link.borrow_mut();
                channel.pending.push(change.clone());
                channel.layout = self.variables.clone();
            }
        }
    }

    ///////////////////////////////////////////////////////////////////////////////////////////
    // Access

    /// Compute the offset of an `Instantiation` over exactly the scope of this `Factor`
    fn offset_of(&self, inst: &Instantiation) -> Result<usize> {
        if let Some(offset) = inst.cached_offset_for(self.uid) {
            return Ok(offset);
        }

        if inst.nbr_dim() != self.variables.len() {
            return Err(BayesError::OperationNotAllowed(
                format!("instantiation {:?} does not match the factor's variables", inst)
            ));
        }

        self.restricted_offset(inst).map_err(|_| {
            BayesError::OperationNotAllowed(
                format!("instantiation {:?} does not match the factor's variables", inst)
            )
        })
    }

    /// Offset of the restriction of `inst` to the scope of this `Factor`
    fn restricted_offset(&self, inst: &Instantiation) -> Result<usize> {
        let mut offset = 0;
        let mut stride = 1;
        for v in self.variables.iter() {
            offset += inst.val(v)? * stride;
            stride *= v.cardinality();
        }
        Ok(offset)
    }

    /// Retrieve the value for a complete assignment over the scope of this `Factor`. The
    /// instantiation may order the variables differently.
    ///
    /// # Errors
    /// * `BayesError::OperationNotAllowed` if the variables of `inst` are not exactly those of
    ///   the `Factor`
    pub fn get(&self, inst: &Instantiation) -> Result<f64> {
        self.offset_of(inst).map(|o| self.values[o])
    }

    /// Set the value for a complete assignment over the scope of this `Factor`
    ///
    /// # Errors
    /// * `BayesError::OperationNotAllowed` if the variables of `inst` are not exactly those of
    ///   the `Factor`
    pub fn set(&mut self, inst: &Instantiation, value: f64) -> Result<()> {
        let o = self.offset_of(inst)?;
        self.values[o] = value;
        Ok(())
    }

    /// Retrieve the value at the restriction of `inst` to the scope of this `Factor`. `inst`
    /// may contain variables the `Factor` does not depend on.
    ///
    /// # Errors
    /// * `BayesError::NotFound` if `inst` misses a variable of the `Factor`
    pub fn get_restricted(&self, inst: &Instantiation) -> Result<f64> {
        self.restricted_offset(inst).map(|o| self.values[o])
    }

    /// Get the buffer, first variable fastest
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Get a logical `ndarray` view of the table, axis `i` indexed by the `i`-th variable
    pub fn as_array(&self) -> Result<ArrayViewD<f64>> {
        let shape: Vec<usize> = self.variables.iter().map(|v| v.cardinality()).collect();
        ArrayViewD::from_shape(IxDyn(&shape).f(), &self.values)
            .map_err(|e| BayesError::InvalidArgument(e.to_string()))
    }

    /// Set every cell to `value`
    pub fn fill(&mut self, value: f64) {
        for v in self.values.iter_mut() {
            *v = value;
        }
    }

    /// Replace the buffer.
    ///
    /// # Errors
    /// * `BayesError::InvalidArgument` if the length does not match the domain size
    pub fn fill_with(&mut self, values: &[f64]) -> Result<()> {
        if values.len() != self.values.len() {
            return Err(BayesError::InvalidArgument(
                format!("expected {} values, got {}", self.values.len(), values.len())
            ));
        }
        self.values.copy_from_slice(values);
        Ok(())
    }

    /// Apply `f` to every cell
    pub fn apply<F: Fn(f64) -> f64>(&mut self, f: F) {
        for v in self.values.iter_mut() {
            *v = f(*v);
        }
    }

    ///////////////////////////////////////////////////////////////////////////////////////////
    // Reductions

    /// Sum of all cells
    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Largest cell
    pub fn max(&self) -> f64 {
        self.values.iter().cloned().fold(std::f64::NEG_INFINITY, f64::max)
    }

    /// Smallest cell
    pub fn min(&self) -> f64 {
        self.values.iter().cloned().fold(std::f64::INFINITY, f64::min)
    }

    /// Divide every cell by the sum of the table
    ///
    /// # Errors
    /// * `BayesError::InvalidArgument` if the table sums to zero
    pub fn normalize(&mut self) -> Result<()> {
        let z = self.sum();
        if z == 0.0 {
            return Err(BayesError::InvalidArgument(
                String::from("cannot normalize a factor summing to zero")
            ));
        }
        self.apply(|v| v / z);
        Ok(())
    }

    /// Shannon entropy in bits, treating the table as a distribution
    pub fn entropy(&self) -> f64 {
        -self.values.iter().filter(|&&p| p > 0.0).map(|&p| p * p.log2()).sum::<f64>()
    }

    ///////////////////////////////////////////////////////////////////////////////////////////
    // Derived tables

    /// Reduce the `Factor` over the given partial assignment
    ///
    /// Defined in Koller & Friedman 4.2.3
    ///
    /// # Args
    /// assignment: an `Instantiation` fixing some of the variables. Variables outside of the
    ///             scope of the `Factor` are ignored.
    ///
    /// # Returns
    /// A new `Factor` over the unassigned variables
    pub fn reduce(&self, assignment: &Instantiation) -> Factor {
        let strides = self.strides();
        let mut base = 0;
        let mut kept = Vec::new();
        let mut src = Vec::new();

        for (v, &s) in self.variables.iter().zip(strides.iter()) {
            match assignment.val(v) {
                Ok(val) => base += val * s,
                Err(_) => {
                    kept.push(v.clone());
                    src.push(s);
                }
            }
        }

        let dims = kept.iter().map(|v| v.cardinality()).collect();
        let mut values = Vec::new();
        let mut odo = OffsetOdometer::new(dims, vec![src]);
        loop {
            values.push(self.values[base + odo.offset(0)]);
            if !odo.advance() {
                break;
            }
        }

        Factor { uid: next_uid(), variables: kept, values, slaves: Vec::new() }
    }

    /// Copy the `Factor` with its variables in the given order.
    ///
    /// # Errors
    /// * `BayesError::OperationNotAllowed` if `order` is not a permutation of the scope
    pub fn reorder(&self, order: &[Variable]) -> Result<Factor> {
        if order.len() != self.variables.len() || order.iter().any(|v| !self.contains(v)) {
            return Err(BayesError::OperationNotAllowed(
                String::from("reordering requires a permutation of the factor's variables")
            ));
        }
        check_distinct(order)?;

        let strides = self.strides();
        let mut src = Vec::with_capacity(order.len());
        for v in order.iter() {
            src.push(strides[self.pos(v)?]);
        }

        let dims = order.iter().map(|v| v.cardinality()).collect();
        let mut values = Vec::with_capacity(self.values.len());
        let mut odo = OffsetOdometer::new(dims, vec![src]);
        loop {
            values.push(self.values[odo.offset(0)]);
            if !odo.advance() {
                break;
            }
        }

        Ok(Factor { uid: next_uid(), variables: order.to_vec(), values, slaves: Vec::new() })
    }

    /// Product of this `Factor` and another one, over the union of their scopes
    pub fn product(&self, other: &Factor) -> Result<Factor> {
        TableCombination::product().combine_pair(self, other)
    }

    /// Sum out the given variables
    pub fn sum_out(&self, vars: &[Variable]) -> Result<Factor> {
        projection::marginalize_out(self, vars, Reduction::Sum)
    }

    /// Max out the given variables
    pub fn max_out(&self, vars: &[Variable]) -> Result<Factor> {
        projection::marginalize_out(self, vars, Reduction::Max)
    }

}

/// Check that no variable appears twice, by identity or by name
fn check_distinct(variables: &[Variable]) -> Result<()> {
    for (i, v) in variables.iter().enumerate() {
        if variables[..i].iter().any(|w| w == v || w.name() == v.name()) {
            return Err(BayesError::DuplicateElement(format!("{} in factor", v)));
        }
    }
    Ok(())
}

/// Copies share no slaves with the original.
impl Clone for Factor {
    fn clone(&self) -> Self {
        Factor {
            uid: next_uid(),
            variables: self.variables.clone(),
            values: self.values.clone(),
            slaves: Vec::new(),
        }
    }
}

/// The slaves forget their master when it goes away.
impl Drop for Factor {
    fn drop(&mut self) {
        for w in self.slaves.iter() {
            if let Some(link) = w.upgrade() {
                link.borrow_mut().alive = false;
            }
        }
    }
}

impl fmt::Debug for Factor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Factor")
         .field("variables", &self.variables)
         .field("values", &self.values)
         .finish()
    }
}


// Unit tests
#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;

    #[test]
    fn table_factor() {
        let vars = vec![ Variable::binary("A"), Variable::discrete("B", 5), Variable::discrete("C", 3) ];
        let mut table = Table::ones(vec![2, 5, 3]);
        table[[1, 1, 1].as_ref()] = 5.;

        let f = Factor::from_array(vars.clone(), table).unwrap();
        assert_eq!(30, f.domain_size());

        let mut inst = Instantiation::from_vars(&vars).unwrap();
        inst.set_first();
        while !inst.end() {
            let val = f.get(&inst).unwrap();
            if inst.values() == [1, 1, 1] {
                assert_eq!(5., val);
            } else {
                assert_eq!(1., val);
            }
            inst.inc();
        }
    }

    #[test]
    fn storage_is_first_variable_fastest() {
        let a = Variable::binary("A");
        let b = Variable::discrete("B", 3);
        let f = Factor::from_array(
            vec![a.clone(), b.clone()],
            ndarray::array![[1., 2., 3.], [4., 5., 6.]].into_dyn()
        ).unwrap();

        assert_eq!(&[1., 4., 2., 5., 3., 6.], f.values());
        assert_eq!(vec![1, 2], f.strides());
        assert_eq!(f.as_array().unwrap()[[1, 2].as_ref()], 6.);
    }

    #[test]
    fn table_factor_errs() {
        let a = Variable::binary("A");

        // mismatched number of dimensions
        let f = Factor::from_array(vec![a.clone()], Table::ones(vec![2, 2]));
        match f {
            Err(BayesError::InvalidArgument(_)) => (),
            _ => panic!("wrong error type")
        };

        // wrong cardinality
        let f = Factor::from_array(vec![a.clone()], Table::ones(vec![3]));
        assert!(f.is_err());

        // wrong buffer length
        assert!(Factor::from_values(vec![a.clone()], vec![1.0]).is_err());

        // duplicates, by identity and by name
        match Factor::new(vec![a.clone(), a.clone()]) {
            Err(BayesError::DuplicateElement(_)) => (),
            _ => panic!("wrong error type")
        };
        assert!(Factor::new(vec![a.clone(), Variable::binary("A")]).is_err());
    }

    #[test]
    fn add_and_erase() {
        let a = Variable::binary("A");
        let b = Variable::discrete("B", 3);
        let mut f = Factor::from_values(vec![a.clone()], vec![0.25, 0.75]).unwrap();

        f.add(&b).unwrap();
        assert_eq!(6, f.domain_size());
        assert_eq!(1, f.pos(&b).unwrap());
        assert_eq!(&[0.25, 0.75, 0.25, 0.75, 0.25, 0.75], f.values());

        match f.add(&Variable::binary("B")) {
            Err(BayesError::DuplicateElement(_)) => (),
            _ => panic!("wrong error type")
        };

        f.erase(&a).unwrap();
        assert_eq!(&[b.clone()], f.variables());
        assert_eq!(&[0.25, 0.25, 0.25], f.values());

        match f.erase(&a) {
            Err(BayesError::NotFound(_)) => (),
            _ => panic!("wrong error type")
        };
    }

    #[test]
    fn slaves_follow_their_master() {
        let a = Variable::binary("A");
        let b = Variable::discrete("B", 3);
        let mut f = Factor::from_values(vec![a.clone()], vec![1., 2.]).unwrap();

        let mut inst = f.instantiation();
        assert!(inst.is_slave());
        assert_eq!(1, f.nbr_slaves());

        f.add(&b).unwrap();
        inst.sync();
        assert_eq!(&[a.clone(), b.clone()], inst.variables());

        let mut seen = Vec::new();
        inst.set_first();
        while !inst.end() {
            seen.push(f.get(&inst).unwrap());
            inst.inc();
        }
        assert_eq!(vec![1., 2., 1., 2., 1., 2.], seen);

        // a slave cannot change its own variable set
        assert!(inst.add(&Variable::binary("Z")).is_err());

        drop(inst);
        assert_eq!(0, f.nbr_slaves());
    }

    #[test]
    fn slave_outlives_master() {
        let a = Variable::binary("A");
        let mut f = Factor::from_values(vec![a.clone()], vec![1., 2.]).unwrap();
        let mut inst = f.instantiation();
        drop(f);

        assert!(!inst.sync());
        assert!(!inst.is_slave());
        inst.set(&a, 1).unwrap();
        assert_eq!(1, inst.val(&a).unwrap());
    }

    #[test]
    fn mismatched_instantiation() {
        let a = Variable::binary("A");
        let b = Variable::binary("B");
        let f = Factor::from_values(vec![a.clone(), b.clone()], vec![1., 2., 3., 4.]).unwrap();

        let inst = Instantiation::from_vars(&[a.clone()]).unwrap();
        match f.get(&inst) {
            Err(BayesError::OperationNotAllowed(_)) => (),
            _ => panic!("wrong error type")
        };
        match f.get_restricted(&inst) {
            Err(BayesError::NotFound(_)) => (),
            _ => panic!("wrong error type")
        };

        // reordered instantiations are accepted
        let mut inst = Instantiation::from_vars(&[b.clone(), a.clone()]).unwrap();
        inst.set(&a, 1).unwrap();
        inst.set(&b, 1).unwrap();
        assert_eq!(4., f.get(&inst).unwrap());

        // larger instantiations through the restricted accessor
        let mut big = Instantiation::from_vars(&[b.clone(), Variable::binary("C"), a.clone()]).unwrap();
        big.set(&b, 1).unwrap();
        assert_eq!(3., f.get_restricted(&big).unwrap());
    }

    #[test]
    /// Example take from Koller & Friedman Figure 4.5
    fn reduce_simple() {
        let a = Variable::discrete("A", 3);
        let b = Variable::binary("B");
        let c = Variable::binary("C");

        let table = Table::from_shape_vec(
            vec![3, 2, 2],
            vec![ 0.25, 0.35, 0.08, 0.16, 0.05, 0.07, 0., 0., 0.15, 0.21, 0.09, 0.18 ]
        ).unwrap();
        let phi = Factor::from_array(vec![a.clone(), b.clone(), c.clone()], table).unwrap();

        let mut assn = Instantiation::from_vars(&[c.clone()]).unwrap();
        assn.set(&c, 0).unwrap();

        let reduced = phi.reduce(&assn);
        assert_eq!(&[a.clone(), b.clone()], reduced.variables());

        let expected = ndarray::array![[0.25, 0.08], [0.05, 0.], [0.15, 0.09]];
        let view = reduced.as_array().unwrap();
        for x in 0..3 {
            for y in 0..2 {
                assert_eq!(expected[[x, y]], view[[x, y].as_ref()]);
            }
        }
    }

    #[test]
    fn reduce_full() {
        let a = Variable::binary("A");
        let phi = Factor::from_values(vec![a.clone()], vec![0.3, 0.7]).unwrap();

        let mut assn = Instantiation::from_vars(&[a.clone(), Variable::binary("Z")]).unwrap();
        assn.set(&a, 1).unwrap();

        let reduced = phi.reduce(&assn);
        assert_eq!(0, reduced.nbr_dim());
        assert_eq!(&[0.7], reduced.values());
    }

    #[test]
    fn reorder() {
        let a = Variable::binary("A");
        let b = Variable::discrete("B", 3);
        let f = Factor::from_values(vec![a.clone(), b.clone()], vec![1., 2., 3., 4., 5., 6.]).unwrap();

        let g = f.reorder(&[b.clone(), a.clone()]).unwrap();
        assert_eq!(&[1., 3., 5., 2., 4., 6.], g.values());

        let mut inst = Instantiation::from_vars(&[a.clone(), b.clone()]).unwrap();
        inst.set_first();
        while !inst.end() {
            assert_eq!(f.get(&inst).unwrap(), g.get(&inst).unwrap());
            inst.inc();
        }

        assert!(f.reorder(&[a.clone()]).is_err());
    }

    #[test]
    fn normalize_and_entropy() {
        let a = Variable::discrete("A", 4);
        let mut f = Factor::from_values(vec![a.clone()], vec![1., 1., 1., 1.]).unwrap();
        f.normalize().unwrap();
        assert_abs_diff_eq!(0.25, f.values()[2], epsilon = 1e-12);
        assert_abs_diff_eq!(2.0, f.entropy(), epsilon = 1e-12);

        let mut z = Factor::new(vec![a]).unwrap();
        assert!(z.normalize().is_err());
        assert_eq!(0.0, z.entropy());
    }

    #[test]
    fn indicator() {
        let a = Variable::discrete("A", 3);
        let f = Factor::indicator(&a, 2).unwrap();
        assert_eq!(&[0., 0., 1.], f.values());
        assert!(Factor::indicator(&a, 3).is_err());
    }

}
