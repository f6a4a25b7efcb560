//! Eigendecomposition of symmetric tridiagonal matrices by implicit QR with Wilkinson shifts

use ndarray::{Array1, Array2, ArrayView1};

use crate::{givens::GivensRotation, EigError, RealScalar, Result};

/// Iterations allowed per eigenvalue before giving up
const MAX_SWEEPS_PER_VALUE: usize = 30;

/// Computes all eigenpairs of the symmetric tridiagonal matrix with diagonal `diag` and
/// off-diagonal `off_diag`.
///
/// Eigenvalues are returned in ascending order, eigenvectors as the matching columns of an
/// orthogonal matrix.
pub fn tridiagonal_eigh<A: RealScalar>(
    diag: ArrayView1<A>,
    off_diag: ArrayView1<A>,
) -> Result<(Array1<A>, Array2<A>)> {
    let dim = diag.len();
    if off_diag.len() != dim.saturating_sub(1) {
        return Err(EigError::DimensionMismatch {
            expected: dim.saturating_sub(1),
            actual: off_diag.len(),
        });
    }
    if dim == 0 {
        return Ok((Array1::zeros(0), Array2::zeros((0, 0))));
    }

    let mut diag = diag.to_owned();
    let mut off_diag = off_diag.to_owned();
    let mut q = Array2::<A>::eye(dim);
    let eps = A::epsilon();
    let max_iter = MAX_SWEEPS_PER_VALUE * dim;
    let mut niter = 0;

    let (mut start, mut end) = delimit_subproblem(&diag, &mut off_diag, dim - 1, eps);

    while end != start {
        let subdim = end - start + 1;

        if subdim > 2 {
            let m = end - 1;
            let n = end;

            let mut x = diag[start] - wilkinson_shift(diag[m], diag[n], off_diag[m]);
            let mut y = off_diag[start];

            for i in start..n {
                let j = i + 1;

                let (rot, norm) = match GivensRotation::cancel_y(x, y) {
                    Some(r) => r,
                    None => break,
                };
                if i > start {
                    // The bulge is chased into the previous coupling
                    off_diag[i - 1] = norm;
                }

                let (c, s) = (rot.c(), rot.s());
                let mii = diag[i];
                let mjj = diag[j];
                let mij = off_diag[i];
                let cc = c * c;
                let ss = s * s;
                let cs = c * s;
                let b = cs * mij * A::from(2.0).unwrap();

                diag[i] = cc * mii + ss * mjj + b;
                diag[j] = ss * mii + cc * mjj - b;
                off_diag[i] = cs * (mjj - mii) + mij * (cc - ss);

                if j < n {
                    x = off_diag[i];
                    y = s * off_diag[j];
                    off_diag[j] *= c;
                }

                rot.rotate_cols(&mut q, i, j);
            }
        } else {
            // Close a 2x2 block directly
            let (a, b, e) = (diag[start], diag[end], off_diag[start]);
            let half = (a - b) * A::from(0.5).unwrap();
            let root = (half * half + e * e).sqrt();
            let sign = if half < A::zero() { -A::one() } else { A::one() };
            let l1 = b + half + sign * root;
            let l2 = a + b - l1;
            // The rows of `rot` are the eigenvectors of the block
            if let Some((rot, _)) = GivensRotation::cancel_y(l1 - b, e) {
                rot.rotate_cols(&mut q, start, end);
            }
            diag[start] = l1;
            diag[end] = l2;
            off_diag[start] = A::zero();
        }

        let sub = delimit_subproblem(&diag, &mut off_diag, end, eps);
        start = sub.0;
        end = sub.1;

        niter += 1;
        if niter > max_iter {
            return Err(EigError::QrNotConverged { iterations: niter });
        }
    }

    Ok(sorted(diag, q))
}

/// Sort eigenpairs by ascending eigenvalue and fix the sign of each eigenvector so that its
/// largest component is positive
fn sorted<A: RealScalar>(vals: Array1<A>, vecs: Array2<A>) -> (Array1<A>, Array2<A>) {
    let mut order: Vec<usize> = (0..vals.len()).collect();
    order.sort_by(|&a, &b| vals[a].partial_cmp(&vals[b]).unwrap_or(std::cmp::Ordering::Equal));

    let sorted_vals = order.iter().map(|&i| vals[i]).collect();
    let mut sorted_vecs = Array2::zeros(vecs.dim());
    for (dst, &src) in order.iter().enumerate() {
        let col = vecs.column(src);
        let pivot = col
            .iter()
            .copied()
            .fold(A::zero(), |best, x| if x.abs() > best.abs() { x } else { best });
        let sign = if pivot < A::zero() { -A::one() } else { A::one() };
        sorted_vecs.column_mut(dst).assign(&col.mapv(|x| x * sign));
    }
    (sorted_vals, sorted_vecs)
}

/// Find the trailing unreduced block `[start, end]` of the tridiagonal, zeroing negligible
/// couplings on the way
fn delimit_subproblem<A: RealScalar>(
    diag: &Array1<A>,
    off_diag: &mut Array1<A>,
    end: usize,
    eps: A,
) -> (usize, usize) {
    let mut n = end;

    while n > 0 {
        let m = n - 1;
        if off_diag[m].abs() > eps * (diag[n].abs() + diag[m].abs()) {
            break;
        }
        off_diag[m] = A::zero();
        n -= 1;
    }

    if n == 0 {
        return (0, 0);
    }

    let mut new_start = n - 1;
    while new_start > 0 {
        let m = new_start - 1;
        if off_diag[m].is_zero()
            || off_diag[m].abs() <= eps * (diag[new_start].abs() + diag[m].abs())
        {
            off_diag[m] = A::zero();
            break;
        }
        new_start -= 1;
    }

    (new_start, n)
}

/// Computes the wilkinson shift, i.e., the 2x2 symmetric matrix eigenvalue to its tailing
/// component `tnn`.
///
/// The inputs are interpreted as the 2x2 matrix:
///     tmm  tmn
///     tmn  tnn
pub(crate) fn wilkinson_shift<A: RealScalar>(tmm: A, tnn: A, tmn: A) -> A {
    let tmn_sq = tmn * tmn;
    if !tmn_sq.is_zero() {
        let d = (tmm - tnn) * A::from(0.5).unwrap();
        tnn - tmn_sq / (d + d.signum() * (d * d + tmn_sq).sqrt())
    } else {
        tnn
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    use super::*;

    fn reconstruct(vals: &Array1<f64>, vecs: &Array2<f64>) -> Array2<f64> {
        vecs.dot(&Array2::from_diag(vals)).dot(&vecs.t())
    }

    fn dense(diag: &Array1<f64>, off: &Array1<f64>) -> Array2<f64> {
        let mut t = Array2::from_diag(diag);
        for (i, &b) in off.iter().enumerate() {
            t[(i, i + 1)] = b;
            t[(i + 1, i)] = b;
        }
        t
    }

    #[test]
    fn wilkinson() {
        // Eigenvalues of [[2, 1], [1, 2]] are 1 and 3, both at distance 1 from tnn
        let mu = wilkinson_shift(2.0f64, 2., 1.);
        assert!((mu - 1.).abs() < 1e-12 || (mu - 3.).abs() < 1e-12);
        assert_abs_diff_eq!(wilkinson_shift(1.0f64, 5., 0.), 5.);
        assert_abs_diff_eq!(wilkinson_shift(4.0f64, 1., 2.), 0., epsilon = 1e-12);
    }

    #[test]
    fn two_by_two() {
        let diag = array![2.0f64, 2.];
        let off = array![1.0f64];
        let (vals, vecs) = tridiagonal_eigh(diag.view(), off.view()).unwrap();
        assert_abs_diff_eq!(vals, array![1., 3.], epsilon = 1e-12);
        assert_abs_diff_eq!(reconstruct(&vals, &vecs), dense(&diag, &off), epsilon = 1e-12);
    }

    #[test]
    fn laplacian() {
        // 1D Laplacian has eigenvalues 2 - 2 cos(k pi / (n + 1))
        let n = 12;
        let diag = Array1::from_elem(n, 2.0f64);
        let off = Array1::from_elem(n - 1, -1.0f64);
        let (vals, vecs) = tridiagonal_eigh(diag.view(), off.view()).unwrap();
        for (k, &v) in vals.iter().enumerate() {
            let exact = 2. - 2. * ((k + 1) as f64 * std::f64::consts::PI / (n + 1) as f64).cos();
            assert_abs_diff_eq!(v, exact, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(vecs.t().dot(&vecs), Array2::eye(n), epsilon = 1e-12);
        assert_abs_diff_eq!(reconstruct(&vals, &vecs), dense(&diag, &off), epsilon = 1e-11);
    }

    #[test]
    fn decoupled() {
        let diag = array![3.0f64, -1., 7., 0.5];
        let off = array![0., 2., 0.];
        let (vals, vecs) = tridiagonal_eigh(diag.view(), off.view()).unwrap();
        assert_abs_diff_eq!(reconstruct(&vals, &vecs), dense(&diag, &off), epsilon = 1e-12);
        assert!(vals.windows(2).into_iter().all(|w| w[0] <= w[1]));
    }

    #[test]
    fn corner_cases() {
        let (vals, vecs) =
            tridiagonal_eigh(Array1::<f64>::zeros(0).view(), Array1::zeros(0).view()).unwrap();
        assert!(vals.is_empty());
        assert_eq!(vecs.dim(), (0, 0));

        let (vals, vecs) =
            tridiagonal_eigh(array![-4.0f64].view(), Array1::zeros(0).view()).unwrap();
        assert_eq!(vals, array![-4.]);
        assert_eq!(vecs, array![[1.]]);

        assert!(matches!(
            tridiagonal_eigh(array![1.0f64, 2.].view(), array![1., 1.].view()),
            Err(EigError::DimensionMismatch {
                expected: 1,
                actual: 2
            })
        ));
    }
}
