//! Combination of `Factor`s.
//!
//! A `TableCombination` applies an associative and commutative binary operator (the product by
//! default) cell-wise over the union of the scopes of several tables. With more than two tables
//! the order of the pairwise combinations is chosen greedily: at each step the two remaining
//! tables whose union is smallest are combined first, which bounds the size of the
//! intermediate tables.

use super::Factor;
use crate::instantiation::OffsetOdometer;
use crate::util::{BayesError, Result};
use crate::variable::Variable;

use itertools::Itertools;
use tracing::{debug, trace};

use std::borrow::Cow;

fn multiply(a: f64, b: f64) -> f64 { a * b }
fn add(a: f64, b: f64) -> f64 { a + b }
fn maximum(a: f64, b: f64) -> f64 { a.max(b) }
fn minimum(a: f64, b: f64) -> f64 { a.min(b) }

/// Combines tables with the binary operator `F`
pub struct TableCombination<F> {
    op: F,
}

impl TableCombination<fn(f64, f64) -> f64> {

    /// Cell-wise product, the usual combination of potentials
    pub fn product() -> Self {
        TableCombination { op: multiply }
    }

    /// Cell-wise sum
    pub fn sum() -> Self {
        TableCombination { op: add }
    }

    /// Cell-wise maximum
    pub fn max() -> Self {
        TableCombination { op: maximum }
    }

    /// Cell-wise minimum
    pub fn min() -> Self {
        TableCombination { op: minimum }
    }

}

impl<F: Fn(f64, f64) -> f64> TableCombination<F> {

    /// Create a combination with a user supplied operator. The operator must be associative and
    /// commutative: the order in which tables are combined is not specified.
    pub fn new(op: F) -> Self {
        TableCombination { op }
    }

    /// Combine a collection of tables into a new one over the union of their scopes.
    ///
    /// # Args
    /// tables: at least two `Factor`s. None of them is modified.
    ///
    /// # Returns
    /// a new `Factor` whose value at any joint assignment is the operator folded over the values
    /// of the inputs at the restriction of that assignment to their own scopes
    ///
    /// # Errors
    /// * `BayesError::InvalidArgumentsNumber` if fewer than two tables are given
    /// * `BayesError::InvalidArgument` if two distinct variables of the inputs share a name
    pub fn combine(&self, tables: &[&Factor]) -> Result<Factor> {
        if tables.len() < 2 {
            return Err(BayesError::InvalidArgumentsNumber { expected: 2, got: tables.len() });
        }
        check_domains(tables)?;

        let mut pool: Vec<Cow<Factor>> = tables.iter().map(|&t| Cow::Borrowed(t)).collect();
        while pool.len() > 1 {
            let scopes: Vec<&[Variable]> = pool.iter().map(|t| t.variables()).collect();
            let (i, j, cost) = cheapest_pair(&scopes);
            trace!(i, j, cost, remaining = pool.len(), "combining cheapest pair");

            let t = self.combine_two(&pool[i], &pool[j])?;

            // j > i, so removing j first leaves i in place
            pool.remove(j);
            pool.remove(i);
            pool.push(Cow::Owned(t));
        }

        let result = pool.pop()
                         .map(|t| t.into_owned())
                         .ok_or(BayesError::InvalidArgumentsNumber { expected: 2, got: 0 })?;
        debug!(inputs = tables.len(), cells = result.domain_size(), "combined tables");
        Ok(result)
    }

    /// Combine exactly two tables. The variables of the result are those of `t1` followed by
    /// the variables only `t2` depends on.
    ///
    /// # Errors
    /// * `BayesError::InvalidArgument` if two distinct variables of the inputs share a name
    pub fn combine_pair(&self, t1: &Factor, t2: &Factor) -> Result<Factor> {
        check_domains(&[t1, t2])?;
        self.combine_two(t1, t2)
    }

    /// Number of elementary operations the greedy plan performs on `tables`
    pub fn cost(&self, tables: &[&Factor]) -> Result<f64> {
        if tables.len() < 2 {
            return Err(BayesError::InvalidArgumentsNumber { expected: 2, got: tables.len() });
        }

        let mut scopes: Vec<Vec<Variable>> = tables.iter().map(|t| t.variables().to_vec()).collect();
        let mut total = 0.0;
        while scopes.len() > 1 {
            let (i, j, cost) = {
                let views: Vec<&[Variable]> = scopes.iter().map(|s| s.as_slice()).collect();
                cheapest_pair(&views)
            };
            total += cost as f64;

            let merged = union(&scopes[i], &scopes[j]);
            scopes.remove(j);
            scopes.remove(i);
            scopes.push(merged);
        }
        Ok(total)
    }

    /// Memory needed by the greedy plan, in number of cells.
    ///
    /// # Returns
    /// `(peak, result)`: the largest number of intermediate cells alive at once, and the size of
    /// the final table
    pub fn memory_usage(&self, tables: &[&Factor]) -> Result<(usize, usize)> {
        if tables.len() < 2 {
            return Err(BayesError::InvalidArgumentsNumber { expected: 2, got: tables.len() });
        }

        // (scope, cells owned by the plan: zero for the inputs)
        let mut scopes: Vec<(Vec<Variable>, usize)> =
            tables.iter().map(|t| (t.variables().to_vec(), 0)).collect();
        let mut alive = 0;
        let mut peak = 0;
        let mut last = 0;
        while scopes.len() > 1 {
            let (i, j, cost) = {
                let views: Vec<&[Variable]> = scopes.iter().map(|s| s.0.as_slice()).collect();
                cheapest_pair(&views)
            };

            // both operands are still alive while the result is filled
            alive += cost;
            peak = peak.max(alive);
            last = cost;

            let merged = union(&scopes[i].0, &scopes[j].0);
            let (_, freed_j) = scopes.remove(j);
            let (_, freed_i) = scopes.remove(i);
            alive -= freed_i + freed_j;
            scopes.push((merged, cost));
        }

        Ok((peak, last))
    }

    /// Cell-wise combination of two tables.
    ///
    /// The result variables split in three groups: the ones both tables share, the ones only
    /// `t2` has and the ones only `t1` has. The fill loop nests them as outer `t1`-alone,
    /// middle `t2`-alone and inner shared, so the inner loop moves the three offsets together.
    /// When the shared variables are the leading variables of both tables, in the same order,
    /// the inner loop covers contiguous blocks of all three buffers.
    fn combine_two(&self, t1: &Factor, t2: &Factor) -> Result<Factor> {
        let v1 = t1.variables();
        let v2 = t2.variables();

        let shared: Vec<Variable> = v1.iter().filter(|v| t2.contains(v)).cloned().collect();
        let t2_alone: Vec<Variable> = v2.iter().filter(|v| !t1.contains(v)).cloned().collect();
        let t1_alone: Vec<Variable> = v1.iter().filter(|v| !t2.contains(v)).cloned().collect();

        let result_vars: Vec<Variable> = v1.iter().chain(t2_alone.iter()).cloned().collect();
        let s1 = t1.strides();
        let s2 = t2.strides();
        let sr = strides_of(&result_vars);

        let stride_vector = |nest: &[Variable]| -> Vec<Vec<usize>> {
            vec![
                nest.iter().map(|v| stride_in(v1, &s1, v)).collect(),
                nest.iter().map(|v| stride_in(v2, &s2, v)).collect(),
                nest.iter().map(|v| stride_in(&result_vars, &sr, v)).collect(),
            ]
        };

        let size: usize = size_of(&result_vars);
        let mut values = vec![0.0; size];
        let a = t1.values();
        let b = t2.values();

        let k = shared.len();
        let contiguous = k > 0 && v1[..k] == shared[..] && v2[..k] == shared[..];

        if contiguous {
            let block = size_of(&shared);
            let outer: Vec<Variable> = t2_alone.iter().chain(t1_alone.iter()).cloned().collect();
            let dims = outer.iter().map(|v| v.cardinality()).collect();
            let mut odo = OffsetOdometer::new(dims, stride_vector(&outer));
            loop {
                let (o1, o2, or) = (odo.offset(0), odo.offset(1), odo.offset(2));
                let cells = a[o1..o1 + block].iter().zip(b[o2..o2 + block].iter());
                for (r, (&x, &y)) in values[or..or + block].iter_mut().zip(cells) {
                    *r = (self.op)(x, y);
                }
                if !odo.advance() {
                    break;
                }
            }
        } else {
            let nest: Vec<Variable> = shared.iter()
                                            .chain(t2_alone.iter())
                                            .chain(t1_alone.iter())
                                            .cloned()
                                            .collect();
            let dims = nest.iter().map(|v| v.cardinality()).collect();
            let mut odo = OffsetOdometer::new(dims, stride_vector(&nest));
            loop {
                values[odo.offset(2)] = (self.op)(a[odo.offset(0)], b[odo.offset(1)]);
                if !odo.advance() {
                    break;
                }
            }
        }

        Factor::from_values(result_vars, values)
    }

}

/// Check that the tables agree on their variables: distinct variables may not share a name, in
/// particular a shared name may not carry two domain sizes.
fn check_domains(tables: &[&Factor]) -> Result<()> {
    let all: Vec<&Variable> = tables.iter().flat_map(|t| t.variables().iter()).unique().collect();
    for (i, v) in all.iter().enumerate() {
        if let Some(w) = all[..i].iter().find(|w| w.name() == v.name()) {
            let msg = if w.cardinality() != v.cardinality() {
                format!("variable {} is shared with domain sizes {} and {}",
                        v, w.cardinality(), v.cardinality())
            } else {
                format!("two distinct variables are named {}", v)
            };
            return Err(BayesError::InvalidArgument(msg));
        }
    }
    Ok(())
}

/// Find the pair of scopes with the smallest union, first encountered on ties
fn cheapest_pair(scopes: &[&[Variable]]) -> (usize, usize, usize) {
    let mut best = (0, 1, usize::max_value());
    for (i, j) in (0..scopes.len()).tuple_combinations() {
        let cost = size_of(&union(scopes[i], scopes[j]));
        if cost < best.2 {
            best = (i, j, cost);
        }
    }
    best
}

fn union(a: &[Variable], b: &[Variable]) -> Vec<Variable> {
    a.iter().chain(b.iter()).unique().cloned().collect()
}

fn size_of(vars: &[Variable]) -> usize {
    vars.iter().map(|v| v.cardinality()).product()
}

fn strides_of(vars: &[Variable]) -> Vec<usize> {
    let mut strides = Vec::with_capacity(vars.len());
    let mut acc = 1;
    for v in vars.iter() {
        strides.push(acc);
        acc *= v.cardinality();
    }
    strides
}

fn stride_in(vars: &[Variable], strides: &[usize], v: &Variable) -> usize {
    vars.iter().position(|w| w == v).map(|p| strides[p]).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instantiation::Instantiation;
    use crate::factor::Table;

    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use proptest::prelude::*;

    /// Koller & Friedman, Figure 4.3
    fn kf_tables() -> (Variable, Variable, Variable, Factor, Factor) {
        let a = Variable::discrete("A", 3);
        let b = Variable::binary("B");
        let c = Variable::binary("C");

        let ab = Factor::from_array(
            vec![a.clone(), b.clone()],
            array![[0.5, 0.8], [0.1, 0.], [0.3, 0.9]].into_dyn()
        ).unwrap();
        let bc = Factor::from_array(
            vec![b.clone(), c.clone()],
            array![[0.5, 0.7], [0.1, 0.2]].into_dyn()
        ).unwrap();

        (a, b, c, ab, bc)
    }

    #[test]
    fn product_kf() {
        let (a, b, c, ab, bc) = kf_tables();
        let expected = array![
            [[0.25, 0.35], [0.08, 0.16]],
            [[0.05, 0.07], [0.,   0.  ]],
            [[0.15, 0.21], [0.09, 0.18]]
        ];

        let phi = TableCombination::product().combine(&[&ab, &bc]).unwrap();
        assert_eq!(&[a, b, c], phi.variables());
        for (&x, &y) in phi.as_array().unwrap().iter().zip(expected.iter()) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-12);
        }
    }

    #[test]
    fn pair_is_commutative() {
        let (a, b, c, ab, bc) = kf_tables();
        let prod = TableCombination::product();
        let left = prod.combine_pair(&ab, &bc).unwrap();
        let right = prod.combine_pair(&bc, &ab).unwrap();

        assert_eq!(&[b.clone(), c.clone(), a.clone()], right.variables());

        let mut inst = Instantiation::from_vars(&[a, b, c]).unwrap();
        inst.set_first();
        while !inst.end() {
            assert_abs_diff_eq!(left.get(&inst).unwrap(), right.get(&inst).unwrap());
            inst.inc();
        }
    }

    #[test]
    fn leading_shared_variables() {
        // B leads both tables, the fill works on contiguous blocks
        let a = Variable::discrete("A", 3);
        let b = Variable::binary("B");
        let c = Variable::discrete("C", 4);

        let ba = Factor::from_values(vec![b.clone(), a.clone()], (1..7).map(f64::from).collect())
            .unwrap();
        let bc = Factor::from_values(vec![b.clone(), c.clone()], (1..9).map(f64::from).collect())
            .unwrap();

        let phi = TableCombination::product().combine_pair(&ba, &bc).unwrap();
        assert_eq!(&[b.clone(), a.clone(), c.clone()], phi.variables());

        let mut inst = Instantiation::from_vars(&[a, b, c]).unwrap();
        inst.set_first();
        while !inst.end() {
            let expected = ba.get_restricted(&inst).unwrap() * bc.get_restricted(&inst).unwrap();
            assert_abs_diff_eq!(expected, phi.get(&inst).unwrap());
            inst.inc();
        }
    }

    #[test]
    fn disjoint_scopes() {
        let a = Variable::binary("A");
        let b = Variable::binary("B");
        let fa = Factor::from_values(vec![a.clone()], vec![1., 2.]).unwrap();
        let fb = Factor::from_values(vec![b.clone()], vec![10., 20.]).unwrap();

        let phi = TableCombination::sum().combine_pair(&fa, &fb).unwrap();
        assert_eq!(&[11., 12., 21., 22.], phi.values());

        let custom = TableCombination::new(|x: f64, y: f64| x + y).combine_pair(&fa, &fb).unwrap();
        assert_eq!(phi.values(), custom.values());
    }

    #[test]
    fn max_and_min() {
        let a = Variable::binary("A");
        let f = Factor::from_values(vec![a.clone()], vec![1., 5.]).unwrap();
        let g = Factor::from_values(vec![a.clone()], vec![3., 2.]).unwrap();

        assert_eq!(&[3., 5.], TableCombination::max().combine_pair(&f, &g).unwrap().values());
        assert_eq!(&[1., 2.], TableCombination::min().combine_pair(&f, &g).unwrap().values());
    }

    #[test]
    fn scalar_tables() {
        let a = Variable::binary("A");
        let f = Factor::from_values(vec![a.clone()], vec![1., 2.]).unwrap();
        let phi = TableCombination::product().combine(&[&f, &Factor::scalar(3.)]).unwrap();
        assert_eq!(&[3., 6.], phi.values());
    }

    #[test]
    fn too_few_tables() {
        let f = Factor::scalar(1.);
        match TableCombination::product().combine(&[&f]) {
            Err(BayesError::InvalidArgumentsNumber { expected: 2, got: 1 }) => (),
            _ => panic!("wrong error type")
        };
        assert!(TableCombination::product().combine(&[]).is_err());
        assert!(TableCombination::product().cost(&[&f]).is_err());
    }

    #[test]
    fn mismatched_domains() {
        let f = Factor::new(vec![Variable::binary("A")]).unwrap();
        let g = Factor::new(vec![Variable::discrete("A", 3)]).unwrap();
        match TableCombination::product().combine(&[&f, &g]) {
            Err(BayesError::InvalidArgument(_)) => (),
            _ => panic!("wrong error type")
        };
    }

    #[test]
    fn greedy_plan() {
        let a = Variable::binary("A");
        let b = Variable::discrete("B", 3);
        let c = Variable::discrete("C", 4);

        let fa = Factor::new(vec![a.clone()]).unwrap();
        let fc = Factor::new(vec![c.clone()]).unwrap();
        let fab = Factor::new(vec![a.clone(), b.clone()]).unwrap();
        let tables = [&fa, &fc, &fab];

        // {A} with {A, B} first (6 cells), then with {C} (24 cells)
        let comb = TableCombination::product();
        assert_abs_diff_eq!(30., comb.cost(&tables).unwrap());
        assert_eq!((30, 24), comb.memory_usage(&tables).unwrap());
        assert_eq!(24, comb.combine(&tables).unwrap().domain_size());
    }

    proptest! {
        #[test]
        fn combine_matches_pointwise_product(
            x in prop::collection::vec(0.0f64..1.0, 6),
            y in prop::collection::vec(0.0f64..1.0, 12),
            z in prop::collection::vec(0.0f64..1.0, 8),
        ) {
            let a = Variable::binary("A");
            let b = Variable::discrete("B", 3);
            let c = Variable::discrete("C", 4);

            let ab = Factor::from_values(vec![a.clone(), b.clone()], x).unwrap();
            let cb = Factor::from_values(vec![c.clone(), b.clone()], y).unwrap();
            let ca = Factor::from_values(vec![c.clone(), a.clone()], z).unwrap();

            let prod = TableCombination::product();
            let phi = prod.combine(&[&ab, &cb, &ca]).unwrap();
            let psi = prod.combine(&[&ca, &ab, &cb]).unwrap();

            let mut inst = Instantiation::from_vars(&[a, b, c]).unwrap();
            inst.set_first();
            while !inst.end() {
                let expected = ab.get_restricted(&inst).unwrap()
                             * cb.get_restricted(&inst).unwrap()
                             * ca.get_restricted(&inst).unwrap();
                prop_assert!((phi.get(&inst).unwrap() - expected).abs() < 1e-12);
                prop_assert!((psi.get(&inst).unwrap() - expected).abs() < 1e-12);
                inst.inc();
            }
        }
    }

    #[test]
    fn array_layout() {
        let (_, _, _, ab, bc) = kf_tables();
        let phi = ab.product(&bc).unwrap();
        let t: Table = phi.as_array().unwrap().to_owned();
        assert_eq!(&[3, 2, 2], t.shape());
    }

}
