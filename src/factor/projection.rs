//! Projection of `Factor`s: removing variables from a table by reducing over their values.

use super::Factor;
use crate::instantiation::OffsetOdometer;
use crate::util::{BayesError, Result};
use crate::variable::Variable;

use itertools::Itertools;

/// The operator folded over the removed dimensions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reduction {
    Sum,
    Max,
    Min,
    Product,
}

impl Reduction {

    /// Value the fold starts from
    pub fn neutral(&self) -> f64 {
        match *self {
            Reduction::Sum => 0.0,
            Reduction::Max => std::f64::NEG_INFINITY,
            Reduction::Min => std::f64::INFINITY,
            Reduction::Product => 1.0,
        }
    }

    #[inline]
    pub fn apply(&self, acc: f64, value: f64) -> f64 {
        match *self {
            Reduction::Sum => acc + value,
            Reduction::Max => acc.max(value),
            Reduction::Min => acc.min(value),
            Reduction::Product => acc * value,
        }
    }

}

/// Remove `vars` from `table`, folding `op` over their values.
///
/// The kept variables stay in the order they have in `table`. Removing no variable returns a
/// copy, and removing them all returns a table without variables holding the fold of every cell.
///
/// # Errors
/// * `BayesError::NotFound` if one of `vars` is not a variable of `table`
pub fn marginalize_out(table: &Factor, vars: &[Variable], op: Reduction) -> Result<Factor> {
    if let Some(v) = vars.iter().find(|v| !table.contains(v)) {
        return Err(BayesError::NotFound(format!("variable {} in projected table", v)));
    }

    let removed: Vec<&Variable> = vars.iter().unique().collect();
    if removed.is_empty() {
        return Ok(table.clone());
    }

    let scope = table.variables();
    let kept: Vec<Variable> = scope.iter().filter(|v| !removed.contains(v)).cloned().collect();
    let size: usize = kept.iter().map(|v| v.cardinality()).product();
    let mut values = vec![op.neutral(); size];
    let input = table.values();

    let r = removed.len();
    if scope[..r].iter().all(|v| removed.contains(&v)) {
        // removed variables lead the table: each kept cell folds one contiguous block
        let block = input.len() / size;
        for (cell, chunk) in values.iter_mut().zip(input.chunks(block)) {
            *cell = chunk.iter().fold(op.neutral(), |acc, &x| op.apply(acc, x));
        }
    } else {
        let mut strides = Vec::with_capacity(scope.len());
        let mut acc = 1;
        for v in scope.iter() {
            if removed.contains(&v) {
                strides.push(0);
            } else {
                strides.push(acc);
                acc *= v.cardinality();
            }
        }

        let dims = scope.iter().map(|v| v.cardinality()).collect();
        let mut odo = OffsetOdometer::new(dims, vec![strides]);
        for &x in input.iter() {
            let cell = &mut values[odo.offset(0)];
            *cell = op.apply(*cell, x);
            odo.advance();
        }
    }

    Factor::from_values(kept, values)
}

/// Keep only `keep` in `table`, folding `op` over the other variables.
///
/// # Errors
/// * `BayesError::NotFound` if one of `keep` is not a variable of `table`
pub fn project_onto(table: &Factor, keep: &[Variable], op: Reduction) -> Result<Factor> {
    if let Some(v) = keep.iter().find(|v| !table.contains(v)) {
        return Err(BayesError::NotFound(format!("variable {} in projected table", v)));
    }

    let removed: Vec<Variable> = table.variables()
                                      .iter()
                                      .filter(|v| !keep.contains(v))
                                      .cloned()
                                      .collect();
    marginalize_out(table, &removed, op)
}
