//! Module containing initialization routines for the parameters of a model.

use crate::factor::{projection, Factor, Reduction, Table};
use crate::util::{BayesError, Result};
use crate::variable::Variable;

use ndarray::{Array, ArrayD, Axis, IxDyn};
use ndarray_rand::RandomExt;
use rand::distributions::Uniform;

/// Tolerance on the normalization of user supplied CPDs
const CPD_TOLERANCE: f64 = 1e-6;

/// Defines possible ways to initialize a `Variable`s CPD.
pub enum Initialization<'a> {
    /// A uniform distribution over all possibilities
    Uniform,

    /// Randomly initialize the weights of the CPD.
    Random,

    /// Initialize the CPD as a Binomial distribution with parameter ```p```, the probability of
    /// the first value. Valid only for a binary `Variable` with no parents.
    Binomial(f64),

    /// Initialize the CPD as a Multinomial distribution with parameters ```p_0, p_1...```.
    /// Valid only for a `Variable` with no parents.
    Multinomial(&'a [f64]),

    /// User defined table. For a CPD its variables are the parents followed by the child.
    Table(Factor)
}


impl<'a> Initialization<'a> {

    /// Construct the CPD ```P(var | parents)```, initialized based on ```self```
    ///
    /// # Returns
    /// a `Factor` over ```parents ++ [var]``` whose values sum to one for every assignment of
    /// the parents
    ///
    /// # Errors
    /// * `BayesError::InvalidInitialization` for a Binomial or Multinomial that does not fit
    ///   `var`, or for a `var` with parents
    /// * `BayesError::InvalidArgument` if a user table is not over ```parents ++ [var]```
    /// * `BayesError::NotACPD` if a user table is not normalized for some parent assignment
    pub fn build_cpd(self, var: &Variable, parents: &[Variable]) -> Result<Factor> {
        let mut scope: Vec<Variable> = parents.to_vec();
        scope.push(var.clone());

        // a user defined factor just needs to be verified
        if let Initialization::Table(f) = self {
            check_scope(&f, &scope)?;

            let sums = projection::marginalize_out(&f, &[var.clone()], Reduction::Sum)?;
            if sums.values().iter().any(|z| (z - 1.0).abs() > CPD_TOLERANCE) {
                return Err(BayesError::NotACPD);
            }
            return Ok(f);
        }

        if !parents.is_empty() {
            if let Initialization::Binomial(_) | Initialization::Multinomial(_) = self {
                return Err(BayesError::InvalidInitialization);
            }
        }

        let shape: Vec<usize> = scope.iter().map(|v| v.cardinality()).collect();
        let tbl: Table = match self {
            Initialization::Uniform => {
                let val = 1. / (var.cardinality() as f64);
                ArrayD::from_elem(IxDyn(&shape), val)
            },
            Initialization::Random => {
                let ax = Axis(shape.len() - 1);
                let tbl = ArrayD::random(IxDyn(&shape), Uniform::new(1.0, 100.0));
                let z = tbl.sum_axis(ax).insert_axis(ax);
                &tbl / &z
            },
            other => unit_table(other, var)?,
        };

        Factor::from_array(scope, tbl)
    }

    /// Construct a factor, initialized based on ```self```
    ///
    /// # Args
    /// * `scope`: the `Variable`s of the `Factor`, in order
    ///
    /// # Returns
    /// a `Factor` initialized according to ```self```. Uniform and random factors are
    /// normalized over the whole scope.
    pub fn build_factor(self, scope: &[Variable]) -> Result<Factor> {
        if scope.is_empty() {
            return Err(BayesError::InvalidArgument(String::from("empty factor scope")));
        }

        if let Initialization::Table(f) = self {
            check_scope(&f, scope)?;
            return Ok(f);
        }

        if scope.len() > 1 {
            if let Initialization::Binomial(_) | Initialization::Multinomial(_) = self {
                return Err(BayesError::InvalidInitialization);
            }
        }

        let shape: Vec<usize> = scope.iter().map(|v| v.cardinality()).collect();
        let tbl: Table = match self {
            Initialization::Uniform => {
                let z: usize = shape.iter().product();
                ArrayD::from_elem(IxDyn(&shape), 1. / (z as f64))
            },
            Initialization::Random => {
                let mut tbl = ArrayD::random(IxDyn(&shape), Uniform::new(1.0, 100.0));
                let z = tbl.sum();
                tbl.mapv_inplace(|e| e / z);
                tbl
            },
            other => unit_table(other, &scope[0])?,
        };

        Factor::from_array(scope.to_vec(), tbl)
    }
}

/// Table of a Binomial or Multinomial over a single variable
fn unit_table(init: Initialization, var: &Variable) -> Result<Table> {
    match init {
        Initialization::Binomial(p) if var.cardinality() == 2 && (0.0..=1.0).contains(&p) => {
            Ok(Array::from(vec![p, 1.0 - p]).into_dyn())
        },
        Initialization::Multinomial(ps) if ps.len() == var.cardinality() => {
            Ok(Array::from(ps.to_vec()).into_dyn())
        },
        _ => Err(BayesError::InvalidInitialization)
    }
}

/// Check that a user table is over exactly the given variables, in that order
fn check_scope(f: &Factor, scope: &[Variable]) -> Result<()> {
    if f.variables() != scope {
        return Err(BayesError::InvalidArgument(
            format!("table over {:?} where {:?} was expected", f.variables(), scope)
        ));
    }
    Ok(())
}
