use approx::assert_abs_diff_eq;
use ndarray::prelude::*;
use proptest::prelude::*;

use krylov_eigensolve::{
    eigh::tridiagonal_eigh,
    qr::{hessenberg_defect, shifted_qr_sweep},
};

mod common;

fn dense(diag: &Array1<f64>, off: &Array1<f64>) -> Array2<f64> {
    let n = diag.len();
    let mut arr = Array2::from_diag(diag);
    for i in 0..n - 1 {
        arr[(i, i + 1)] = off[i];
        arr[(i + 1, i)] = off[i];
    }
    arr
}

fn run_eigh_test(diag: Array1<f64>, off: Array1<f64>) {
    let n = diag.len();
    let arr = dense(&diag, &off);
    let (vals, vecs) = tridiagonal_eigh(diag.view(), off.view()).unwrap();
    // Ascending
    for w in vals.windows(2) {
        assert!(w[0] <= w[1]);
    }
    // Eigenvecs should be orthogonal
    let s = vecs.t().dot(&vecs);
    assert_abs_diff_eq!(s, Array2::eye(n), epsilon = 1e-10);
    // Original array multiplied with eigenvec should equal eigenval times eigenvec
    for (i, v) in vecs.axis_iter(Axis(1)).enumerate() {
        let av = arr.dot(&v);
        let ev = v.mapv(|x| vals[i] * x);
        assert_abs_diff_eq!(av, ev, epsilon = 1e-10);
    }
}

proptest! {
    #[test]
    fn eigh_test((diag, off) in common::tridiag()) {
        run_eigh_test(diag, off);
    }

    #[test]
    fn qr_sweep_is_similarity(h in common::hessenberg_arr(), mu in -1.0f64..1.0) {
        let n = h.nrows();
        let mut t = h.clone();
        let mut q = Array2::eye(n);
        shifted_qr_sweep(&mut t, &mut q, mu).unwrap();

        assert_eq!(hessenberg_defect(&t), 0.);
        assert_abs_diff_eq!(q.t().dot(&q), Array2::eye(n), epsilon = 1e-12);
        assert_abs_diff_eq!(q.t().dot(&h).dot(&q), t, epsilon = 1e-10);
    }
}
