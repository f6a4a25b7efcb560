use approx::assert_abs_diff_eq;
use ndarray::prelude::*;
use num_complex::Complex64;

use krylov_eigensolve::{
    eigensolver::{self, EigenSolver, Solver},
    norm::Norm,
    operator::LinearOperator,
    EigParam, SolverKind, Spectrum,
};

mod common;

/// Upper bidiagonal with `diag[i]` on the diagonal and a constant coupling above it
fn bidiagonal<S: Copy + num_traits::Zero>(diag: &[S], coupling: S) -> Array2<S> {
    let n = diag.len();
    Array2::from_shape_fn((n, n), |(i, j)| {
        if i == j {
            diag[i]
        } else if j == i + 1 {
            coupling
        } else {
            S::zero()
        }
    })
}

#[test]
fn non_normal_bidiagonal() {
    let diag: Vec<f64> = (1..=40).map(|i| i as f64).collect();
    let a = bidiagonal(&diag, 0.5);
    let param = EigParam::new(3, 8, 20)
        .solver(SolverKind::Iram)
        .tol(1e-10)
        .spectrum(Spectrum::LargestReal);
    let mut solver = eigensolver::create(&param, &a).unwrap();
    assert!(matches!(solver, Solver::Iram(_)));

    let mut kspace = vec![Array1::zeros(40); 20];
    let mut evals = Vec::new();
    let report = solver.solve(&mut kspace, &mut evals).unwrap();
    assert!(report.status.is_converged());

    for (k, (l, expected)) in evals.iter().zip([40., 39., 38.]).enumerate() {
        assert_abs_diff_eq!(l.re, expected, epsilon = 1e-8);
        assert!(common::residual(&a, &kspace[k], *l) < 1e-8 * expected);
        assert_abs_diff_eq!(kspace[k].norm_l2(), 1., epsilon = 1e-12);
    }
}

#[test]
fn complex_non_normal() {
    let diag: Vec<Complex64> = (1..=30)
        .map(|i| Complex64::new(i as f64, 0.5 * i as f64))
        .collect();
    let a = bidiagonal(&diag, Complex64::new(0.25, -0.25));
    let param = EigParam::new(2, 6, 16)
        .solver(SolverKind::Iram)
        .tol(1e-10)
        .spectrum(Spectrum::LargestMagnitude);
    let mut solver = eigensolver::create(&param, &a).unwrap();
    let mut kspace = vec![Array1::zeros(30); 16];
    let mut evals = Vec::new();
    let report = solver.solve(&mut kspace, &mut evals).unwrap();
    assert!(report.status.is_converged());

    for (k, expected) in [diag[29], diag[28]].iter().enumerate() {
        assert_abs_diff_eq!((evals[k] - expected).norm(), 0., epsilon = 1e-8);
        let mut av = Array1::zeros(30);
        a.apply(av.view_mut(), kspace[k].view()).unwrap();
        av.scaled_add(-evals[k], &kspace[k]);
        assert!(av.norm_l2() < 1e-8 * expected.norm());
    }
    assert_eq!(report.residuals.len(), 2);
}
