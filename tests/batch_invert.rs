use approx::assert_abs_diff_eq;
use ndarray::prelude::*;
use ndarray_rand::{rand_distr::Uniform, RandomExt};
use num_complex::Complex64;
use proptest::prelude::*;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

use krylov_eigensolve::{
    blas_lapack::{BlasConfig, BlasLapack},
    norm::Norm,
    EigError, Location, Precision,
};

mod common;

fn context(native: bool) -> BlasLapack {
    let mut blas = BlasLapack::new(BlasConfig { native, threads: 2 });
    blas.init().unwrap();
    blas
}

fn invert(blas: &BlasLapack, input: &Array3<f64>) -> Array3<f64> {
    let (batch, n, _) = input.dim();
    let mut out = Array3::zeros(input.raw_dim());
    blas.batch_invert_matrix(out.view_mut(), input.view(), n, batch, Precision::Double, Location::Host)
        .unwrap();
    out
}

fn run_round_trip(input: Array3<f64>, native: bool) {
    let blas = context(native);
    let out = invert(&blas, &input);
    let n = input.dim().1;
    for (a, inv) in input.outer_iter().zip(out.outer_iter()) {
        assert_abs_diff_eq!(a.dot(&inv), Array2::eye(n), epsilon = 1e-9);
        assert_abs_diff_eq!(inv.dot(&a), Array2::eye(n), epsilon = 1e-9);
    }
}

proptest! {
    #[test]
    fn native_round_trip(input in common::batch_arr()) {
        run_round_trip(input, true);
    }

    #[test]
    fn generic_round_trip(input in common::batch_arr()) {
        run_round_trip(input, false);
    }

    #[test]
    fn engines_agree(input in common::batch_arr()) {
        let native = invert(&context(true), &input);
        let generic = invert(&context(false), &input);
        assert_abs_diff_eq!(native, generic, epsilon = 1e-12);
    }
}

#[test]
fn random_8x8_generic() {
    let mut rng = Xoshiro256Plus::seed_from_u64(42);
    let input = Array3::random_using((100, 8, 8), Uniform::new(-1., 1.), &mut rng);
    let out = invert(&context(false), &input);

    let worst = input
        .outer_iter()
        .zip(out.outer_iter())
        .map(|(a, inv)| (a.dot(&inv) - Array2::<f64>::eye(8)).norm_max())
        .fold(0., f64::max);
    assert!(worst < 1e-9, "max |A A^-1 - I| = {:e}", worst);
}

#[test]
fn complex_batch() {
    let input = array![[
        [Complex64::new(1., 1.), Complex64::new(0., 2.)],
        [Complex64::new(3., 0.), Complex64::new(1., -1.)]
    ]];
    for native in [true, false] {
        let blas = context(native);
        let mut out = Array3::zeros((1, 2, 2));
        let flops = blas
            .batch_invert_matrix(out.view_mut(), input.view(), 2, 1, Precision::ComplexDouble, Location::Host)
            .unwrap();
        assert!(flops > 0);
        let prod = input.index_axis(Axis(0), 0).dot(&out.index_axis(Axis(0), 0));
        assert_abs_diff_eq!(prod, Array2::eye(2), epsilon = 1e-12);
    }
}

#[test]
fn singular_member() {
    let mut input = Array3::<f64>::zeros((3, 3, 3));
    for b in [0, 2] {
        input.index_axis_mut(Axis(0), b).assign(&Array2::eye(3));
    }
    for native in [true, false] {
        let blas = context(native);
        let mut out = Array3::zeros((3, 3, 3));
        let err = blas
            .batch_invert_matrix(out.view_mut(), input.view(), 3, 3, Precision::Double, Location::Host)
            .unwrap_err();
        assert!(matches!(err, EigError::Singular { batch: 1, pivot: 0 }));
    }
}

#[test]
fn flops_scale_with_batch() {
    let blas = context(true);
    let one = Array3::from_shape_fn((1, 4, 4), |(_, i, j)| if i == j { 2. } else { 0. });
    let four = Array3::from_shape_fn((4, 4, 4), |(_, i, j)| if i == j { 2. } else { 0. });
    let mut out1 = Array3::zeros((1, 4, 4));
    let mut out4 = Array3::zeros((4, 4, 4));
    let f1 = blas
        .batch_invert_matrix(out1.view_mut(), one.view(), 4, 1, Precision::Double, Location::Host)
        .unwrap();
    let f4 = blas
        .batch_invert_matrix(out4.view_mut(), four.view(), 4, 4, Precision::Double, Location::Host)
        .unwrap();
    // Per-matrix counts are fractional, the total is rounded once
    assert!((f4 as i64 - 4 * f1 as i64).abs() <= 2);
}
