//! Eigenpairs of small dense upper Hessenberg matrices
//!
//! The Arnoldi projection is reduced to complex Schur form `H = Z T Z^H` by single-shift QR
//! iterations. Eigenvectors of `T` follow from back substitution and are mapped back with `Z`.
//! The element type must be complex for matrices with complex eigenvalues; a real Hessenberg
//! matrix is first lifted with [`Scalar::to_complex`].

use ndarray::{s, Array1, Array2, ArrayBase, Data, Ix2};
use num_traits::{Float, NumCast, Zero};

use crate::{check_square, givens::GivensRotation, norm::Norm, EigError, Result, Scalar};

/// Iterations allowed per eigenvalue before giving up
const MAX_SWEEPS_PER_VALUE: usize = 30;
/// An exceptional shift replaces the Wilkinson shift every this many stalled iterations
const EXCEPTIONAL_PERIOD: usize = 10;

/// Schur decomposition of an upper Hessenberg matrix
#[derive(Debug, Clone)]
pub struct Schur<A> {
    /// Upper triangular factor, eigenvalues on its diagonal
    pub t: Array2<A>,
    /// Unitary factor
    pub z: Array2<A>,
}

impl<A: Scalar> Schur<A> {
    pub fn eigenvalues(&self) -> Array1<A> {
        self.t.diag().to_owned()
    }

    /// Unit-norm eigenvectors of the original matrix, one per column, in diagonal order
    pub fn eigenvectors(&self) -> Array2<A> {
        let n = self.t.nrows();
        let small = A::Real::epsilon() * self.t.norm_max().max(A::Real::min_positive_value());
        let mut x = Array2::<A>::zeros((n, n));

        for k in 0..n {
            let lambda = self.t[(k, k)];
            x[(k, k)] = A::one();
            for i in (0..k).rev() {
                let mut acc = A::zero();
                for j in i + 1..=k {
                    acc += self.t[(i, j)] * x[(j, k)];
                }
                let mut denom = self.t[(i, i)] - lambda;
                if denom.modulus() < small {
                    denom = A::from_real(small);
                }
                x[(i, k)] = -acc / denom;
            }
        }

        let mut v = self.z.dot(&x);
        for mut col in v.columns_mut() {
            let norm = col.norm_l2();
            if norm > A::Real::zero() {
                col.mapv_inplace(|c| c / A::from_real(norm));
            }
        }
        v
    }
}

/// Reduces the upper Hessenberg matrix `h` to Schur form
pub fn schur<A, D>(h: &ArrayBase<D, Ix2>) -> Result<Schur<A>>
where
    A: Scalar,
    D: Data<Elem = A>,
{
    let n = check_square(h)?;
    let mut t = h.to_owned();
    let mut z = Array2::<A>::eye(n);
    if let Some(index) = t.iter().position(|x| !x.finite()) {
        return Err(EigError::NonFinite { index: index / n.max(1) });
    }

    let eps = A::Real::epsilon();
    let scale = t.norm_max();
    let max_iter = MAX_SWEEPS_PER_VALUE * n.max(1);
    let mut total = 0;
    let mut stalled = 0;
    let mut hi = n;

    while hi > 1 {
        // Locate the unreduced block [lo, hi)
        let mut lo = hi - 1;
        while lo > 0 {
            let mut s = l1(t[(lo - 1, lo - 1)]) + l1(t[(lo, lo)]);
            if s.is_zero() {
                s = scale;
            }
            if l1(t[(lo, lo - 1)]) <= eps * s {
                t[(lo, lo - 1)] = A::zero();
                break;
            }
            lo -= 1;
        }

        if lo == hi - 1 {
            hi -= 1;
            stalled = 0;
            continue;
        }

        total += 1;
        stalled += 1;
        if total > max_iter {
            return Err(EigError::QrNotConverged { iterations: total });
        }

        let mu = if stalled % EXCEPTIONAL_PERIOD == 0 {
            let kick: A::Real = NumCast::from(0.75).unwrap();
            t[(hi - 1, hi - 1)] + A::from_real(kick * t[(hi - 1, hi - 2)].modulus())
        } else {
            trailing_shift(
                t[(hi - 2, hi - 2)],
                t[(hi - 2, hi - 1)],
                t[(hi - 1, hi - 2)],
                t[(hi - 1, hi - 1)],
            )
        };

        qr_step(&mut t, &mut z, lo, hi, mu);
    }

    // Clear roundoff below the diagonal
    for i in 1..n {
        for j in 0..i {
            t[(i, j)] = A::zero();
        }
    }

    Ok(Schur { t, z })
}

/// Eigenvalues and unit eigenvectors of an upper Hessenberg matrix
pub fn hessenberg_eig<A, D>(h: &ArrayBase<D, Ix2>) -> Result<(Array1<A>, Array2<A>)>
where
    A: Scalar,
    D: Data<Elem = A>,
{
    let schur = schur(h)?;
    Ok((schur.eigenvalues(), schur.eigenvectors()))
}

/// One shifted QR step on the active window `[lo, hi)`, applied as a unitary similarity to the
/// whole of `t` and accumulated into `z`
fn qr_step<A: Scalar>(t: &mut Array2<A>, z: &mut Array2<A>, lo: usize, hi: usize, mu: A) {
    for i in lo..hi {
        t[(i, i)] -= mu;
    }

    let mut rotations = Vec::with_capacity(hi - lo - 1);
    for k in lo..hi - 1 {
        let rot = GivensRotation::cancel_y(t[(k, k)], t[(k + 1, k)]).map(|(rot, _)| rot);
        if let Some(rot) = &rot {
            rot.rotate_rows(&mut t.slice_mut(s![.., k..]), k, k + 1);
        }
        t[(k + 1, k)] = A::zero();
        rotations.push((k, rot));
    }

    for (k, rot) in rotations {
        if let Some(rot) = rot {
            rot.rotate_cols(&mut t.slice_mut(s![..(k + 2).min(hi), ..]), k, k + 1);
            rot.rotate_cols(z, k, k + 1);
        }
    }

    for i in lo..hi {
        t[(i, i)] += mu;
    }
}

fn l1<A: Scalar>(z: A) -> A::Real {
    z.real().abs() + z.imag().abs()
}

/// Eigenvalue of the trailing 2x2 block `[[a, b], [c, d]]` closest to `d`
///
/// For real element types only the real part of the eigenvalue survives.
fn trailing_shift<A: Scalar>(a: A, b: A, c: A, d: A) -> A {
    let (a, b, c, d) = (a.to_complex(), b.to_complex(), c.to_complex(), d.to_complex());
    let half: A::Real = NumCast::from(0.5).unwrap();
    let half_diff = (a - d) * half;
    let disc = (half_diff * half_diff + b * c).sqrt();
    let mean = (a + d) * half;
    let l1 = mean + disc;
    let l2 = mean - disc;
    let closest = if (l1 - d).norm() <= (l2 - d).norm() {
        l1
    } else {
        l2
    };
    A::from_complex(closest)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use num_complex::Complex64;

    use super::*;
    use crate::triangular::Triangular;

    fn lift(h: &Array2<f64>) -> Array2<Complex64> {
        h.mapv(|x| Complex64::new(x, 0.))
    }

    #[test]
    fn real_spectrum() {
        let h = array![[2.0f64, 1., 0.5], [1., 3., 1.], [0., 1., 4.]];
        let schur = schur(&lift(&h)).unwrap();
        assert!(schur.t.is_upper_triangular());

        let back = schur.z.dot(&schur.t).dot(&schur.z.t().mapv(|z| z.conj()));
        for (a, b) in back.iter().zip(h.iter()) {
            assert_abs_diff_eq!(a.re, *b, epsilon = 1e-10);
            assert_abs_diff_eq!(a.im, 0., epsilon = 1e-10);
        }

        let trace: f64 = schur.eigenvalues().iter().map(|z| z.re).sum();
        assert_abs_diff_eq!(trace, 9., epsilon = 1e-10);
    }

    #[test]
    fn rotation_has_complex_pair() {
        // Rotation by 90 degrees: eigenvalues +-i
        let h = lift(&array![[0.0f64, -1.], [1., 0.]]);
        let (vals, vecs) = hessenberg_eig(&h).unwrap();
        let mut im: Vec<f64> = vals.iter().map(|z| z.im).collect();
        im.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_abs_diff_eq!(im[0], -1., epsilon = 1e-12);
        assert_abs_diff_eq!(im[1], 1., epsilon = 1e-12);

        for (k, lambda) in vals.iter().enumerate() {
            let v = vecs.column(k);
            let r = h.dot(&v) - v.mapv(|x| x * lambda);
            assert_abs_diff_eq!(r.norm_l2(), 0., epsilon = 1e-12);
        }
    }

    #[test]
    fn eigenvectors_of_non_normal() {
        let h = lift(&array![
            [1.0f64, 2., 0., 3.],
            [0.5, 2., 1., -1.],
            [0., 1., 3., 2.],
            [0., 0., 0.25, 4.]
        ]);
        let (vals, vecs) = hessenberg_eig(&h).unwrap();
        for (k, lambda) in vals.iter().enumerate() {
            let v = vecs.column(k);
            assert_abs_diff_eq!(v.norm_l2(), 1., epsilon = 1e-12);
            let r = h.dot(&v) - v.mapv(|x| x * lambda);
            assert_abs_diff_eq!(r.norm_l2(), 0., epsilon = 1e-9);
        }
    }

    #[test]
    fn triangular_input() {
        let h = array![[1.0f64, 5., 2.], [0., -2., 7.], [0., 0., 3.]];
        let (vals, _) = hessenberg_eig(&h).unwrap();
        let mut vals = vals.to_vec();
        vals.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(vals, vec![-2., 1., 3.]);
    }

    #[test]
    fn non_finite() {
        let h = array![[1.0f64, f64::NAN], [1., 2.]];
        assert!(matches!(schur(&h), Err(EigError::NonFinite { index: 0 })));
    }
}
