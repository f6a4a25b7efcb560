#![allow(unused)]

use std::ops::RangeInclusive;

use ndarray::prelude::*;
use num_complex::Complex64;
use num_traits::{One, Zero};
use proptest::prelude::*;
use proptest_derive::Arbitrary;

use krylov_eigensolve::{field::inner, norm::Norm, operator::LinearOperator, Scalar};

const FLOAT_RANGE: RangeInclusive<f64> = -1.0..=1.0;
const DIM_RANGE: RangeInclusive<usize> = 1..=8;
const BATCH_RANGE: RangeInclusive<usize> = 1..=6;

#[derive(Debug, Arbitrary)]
struct Layout {
    invert_rows: bool,
    invert_cols: bool,
    transpose: bool,
}

impl Layout {
    fn apply(&self, mut arr: Array2<f64>) -> Array2<f64> {
        if self.invert_rows {
            arr.invert_axis(Axis(0));
        }
        if self.invert_cols {
            arr.invert_axis(Axis(1));
        }
        if self.transpose {
            arr.reversed_axes()
        } else {
            arr
        }
    }
}

/// Strictly diagonally dominant, hence invertible with a modest condition number
fn dominate(arr: &mut Array2<f64>) {
    let n = arr.nrows() as f64;
    for (i, mut row) in arr.rows_mut().into_iter().enumerate() {
        let d = row[i];
        row[i] = d + if d < 0. { -n } else { n };
    }
}

prop_compose! {
    pub fn well_conditioned_arr(dim: usize)
        (data in prop::collection::vec(FLOAT_RANGE, dim*dim), layout in any::<Layout>()) -> Array2<f64> {
        let mut arr = Array2::from_shape_vec((dim, dim), data).unwrap();
        dominate(&mut arr);
        layout.apply(arr)
    }
}

prop_compose! {
    /// A batch of well conditioned square matrices, `(batch, n, n)`
    pub fn batch_arr()(dim in DIM_RANGE, batch in BATCH_RANGE)
        (mats in prop::collection::vec(well_conditioned_arr(dim), batch), dim in Just(dim)) -> Array3<f64> {
        let mut out = Array3::zeros((mats.len(), dim, dim));
        for (mut slot, m) in out.outer_iter_mut().zip(&mats) {
            slot.assign(m);
        }
        out
    }
}

/// Largest deviation of the Gram matrix of `vectors` from the identity
pub fn orthonormality_defect<S: Scalar>(vectors: &[Array1<S>]) -> f64 {
    let mut defect = 0.0f64;
    for (i, a) in vectors.iter().enumerate() {
        for (j, b) in vectors.iter().enumerate() {
            let g: S = inner(a, b);
            let target = if i == j { S::one() } else { S::zero() };
            let d: f64 = num_traits::NumCast::from((g - target).modulus()).unwrap();
            defect = defect.max(d);
        }
    }
    defect
}

/// `|A v - lambda v|` for a unit vector `v`
pub fn residual<O: LinearOperator<f64>>(op: &O, v: &Array1<f64>, lambda: Complex64) -> f64 {
    let mut av = Array1::zeros(v.len());
    op.apply(av.view_mut(), v.view()).unwrap();
    av.scaled_add(-lambda.re, v);
    av.norm_l2()
}

/// Symmetric tridiagonal `[-1, 2, -1]`
pub fn laplacian(n: usize) -> Array2<f64> {
    Array2::from_shape_fn((n, n), |(i, j)| match i.abs_diff(j) {
        0 => 2.,
        1 => -1.,
        _ => 0.,
    })
}

prop_compose! {
    /// Diagonal and off-diagonal of a symmetric tridiagonal matrix
    pub fn tridiag()(dim in DIM_RANGE)
        (diag in prop::collection::vec(FLOAT_RANGE, dim), off in prop::collection::vec(FLOAT_RANGE, dim - 1))
        -> (Array1<f64>, Array1<f64>) {
        (Array1::from(diag), Array1::from(off))
    }
}

prop_compose! {
    /// Upper Hessenberg matrix with entries in `[-1, 1]`
    pub fn hessenberg_arr()(dim in DIM_RANGE)
        (data in prop::collection::vec(FLOAT_RANGE, dim*dim), dim in Just(dim)) -> Array2<f64> {
        let mut arr = Array2::from_shape_vec((dim, dim), data).unwrap();
        for ((i, j), x) in arr.indexed_iter_mut() {
            if i > j + 1 {
                *x = 0.;
            }
        }
        arr
    }
}
