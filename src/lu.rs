//! LU factorisation with partial pivoting and the two inversion kernels built on it
//!
//! `getrf` factors in place (`P A = L U`, `L` unit lower triangular, both packed into `A`).
//! `getri` then inverts in place from the packed factors, while `lu_inverse` solves against the
//! identity instead.

use ndarray::{Array2, ArrayBase, DataMut, Ix2};
use num_traits::{Float, NumCast, Zero};

use crate::{
    check_square,
    norm::Norm,
    triangular::{solve_triangular_system, UPLO},
    EigError, Result, Scalar,
};

/// Packed LU factors and the row interchanges applied during factorisation
#[derive(Debug, Clone)]
pub struct LuDecomp<A> {
    lu: Array2<A>,
    piv: Vec<usize>,
}

impl<A: Scalar> LuDecomp<A> {
    pub fn dim(&self) -> usize {
        self.piv.len()
    }

    /// `piv[k]` is the row swapped with row `k` at step `k`
    pub fn pivots(&self) -> &[usize] {
        &self.piv
    }

    pub fn packed(&self) -> &Array2<A> {
        &self.lu
    }

    /// Inverse by forward and back substitution against the permuted identity
    pub fn inverse(&self) -> Result<Array2<A>> {
        let n = self.dim();
        let mut x = Array2::<A>::eye(n);
        for (k, &p) in self.piv.iter().enumerate() {
            if p != k {
                swap_rows(&mut x, k, p);
            }
        }
        solve_triangular_system(&self.lu, &mut x, UPLO::Lower, |_| A::one())?;
        solve_triangular_system(&self.lu, &mut x, UPLO::Upper, |i| self.lu[(i, i)])?;
        Ok(x)
    }

    /// Inverse computed in place over the packed factors
    pub fn into_inverse(mut self) -> Array2<A> {
        getri(&mut self.lu, &self.piv);
        self.lu
    }
}

/// Factorises `a`. The matrix is singular when a pivot falls to `eps * n * max|a|` or below; the
/// error names the elimination step.
pub fn lu<A: Scalar>(mut a: Array2<A>) -> Result<LuDecomp<A>> {
    let n = check_square(&a)?;
    let mut piv = vec![0; n];
    getrf(&mut a, &mut piv)?;
    Ok(LuDecomp { lu: a, piv })
}

/// Inverse through `lu` followed by triangular solves
pub fn lu_inverse<A: Scalar>(a: Array2<A>) -> Result<Array2<A>> {
    lu(a)?.inverse()
}

/// In-place partial pivoting LU of a square matrix
pub fn getrf<A, S>(a: &mut ArrayBase<S, Ix2>, piv: &mut [usize]) -> Result<()>
where
    A: Scalar,
    S: DataMut<Elem = A>,
{
    let n = check_square(a)?;
    if piv.len() != n {
        return Err(EigError::DimensionMismatch {
            expected: n,
            actual: piv.len(),
        });
    }
    let n_real: A::Real = NumCast::from(n.max(1)).unwrap();
    let threshold = A::Real::epsilon() * n_real * a.norm_max();

    for k in 0..n {
        let (p, pivot) = (k..n)
            .map(|i| (i, a[(i, k)].modulus()))
            .fold((k, A::Real::zero()), |best, cand| if cand.1 > best.1 { cand } else { best });
        piv[k] = p;
        if pivot <= threshold {
            return Err(EigError::Singular { batch: 0, pivot: k });
        }
        if p != k {
            swap_rows(a, k, p);
        }

        let inv = A::one() / a[(k, k)];
        for i in k + 1..n {
            let l = a[(i, k)] * inv;
            a[(i, k)] = l;
            for j in k + 1..n {
                let u = a[(k, j)];
                a[(i, j)] -= l * u;
            }
        }
    }
    Ok(())
}

/// In-place inverse from packed LU factors: invert `U`, solve `X L = U^-1`, then undo the row
/// interchanges as column interchanges
pub fn getri<A, S>(a: &mut ArrayBase<S, Ix2>, piv: &[usize])
where
    A: Scalar,
    S: DataMut<Elem = A>,
{
    let n = a.nrows();

    // U^-1, column by column
    for j in 0..n {
        a[(j, j)] = A::one() / a[(j, j)];
        let ajj = -a[(j, j)];
        let col: Vec<A> = (0..j)
            .map(|i| (i..j).map(|k| a[(i, k)] * a[(k, j)]).sum::<A>())
            .collect();
        for (i, v) in col.into_iter().enumerate() {
            a[(i, j)] = v * ajj;
        }
    }

    // X L = U^-1, sweeping columns right to left
    let mut work = vec![A::zero(); n];
    for j in (0..n).rev() {
        for i in j + 1..n {
            work[i] = a[(i, j)];
            a[(i, j)] = A::zero();
        }
        if j + 1 < n {
            for r in 0..n {
                let mut acc = a[(r, j)];
                for k in j + 1..n {
                    acc -= a[(r, k)] * work[k];
                }
                a[(r, j)] = acc;
            }
        }
    }

    for j in (0..n).rev() {
        let p = piv[j];
        if p != j {
            for r in 0..n {
                let tmp = a[(r, j)];
                a[(r, j)] = a[(r, p)];
                a[(r, p)] = tmp;
            }
        }
    }
}

fn swap_rows<A: Copy, S: DataMut<Elem = A>>(a: &mut ArrayBase<S, Ix2>, i: usize, j: usize) {
    for c in 0..a.ncols() {
        let tmp = a[(i, c)];
        a[(i, c)] = a[(j, c)];
        a[(j, c)] = tmp;
    }
}

fn fmuls_getrf(m: f64, n: f64) -> f64 {
    if m < n {
        0.5 * m * (m * (n - m / 3. - 1.) + n) + 2. / 3. * m
    } else {
        0.5 * n * (n * (m - n / 3. - 1.) + m) + 2. / 3. * n
    }
}

fn fadds_getrf(m: f64, n: f64) -> f64 {
    if m < n {
        0.5 * m * (m * (n - m / 3.) - n) + m / 6.
    } else {
        0.5 * n * (n * (m - n / 3.) - m) + n / 6.
    }
}

fn fmuls_getri(n: f64) -> f64 {
    n * (5. / 6. + n * (2. / 3. * n + 0.5))
}

fn fadds_getri(n: f64) -> f64 {
    n * (5. / 6. + n * (2. / 3. * n - 1.5))
}

/// Floating point operations of one `getrf` + `getri` inversion of an `n x n` matrix
///
/// Complex arithmetic counts 6 real flops per multiply and 2 per add.
pub fn inversion_flops(n: usize, complex: bool) -> f64 {
    let n = n as f64;
    let muls = fmuls_getrf(n, n) + fmuls_getri(n);
    let adds = fadds_getrf(n, n) + fadds_getri(n);
    if complex {
        6. * muls + 2. * adds
    } else {
        muls + adds
    }
}
