//! Substitution kernel behind the LU solves, plus triangular checks for tests

use crate::{check_square, EigError, Result, Scalar};

use ndarray::{ArrayBase, Data, DataMut, Ix2};
#[cfg(test)]
use num_traits::Zero;

/// Which triangle of a square matrix is referenced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UPLO {
    Upper,
    Lower,
}

/// Transform square matrix into triangular matrix
#[cfg(test)]
pub(crate) trait IntoTriangular {
    /// Transform square matrix into a strict triangular matrix in place, zeroing out the other
    /// elements.
    fn triangular_inplace(&mut self, uplo: UPLO) -> Result<&mut Self>;

    /// Transform square matrix into a strict triangular matrix, zeroing out the other elements.
    fn into_triangular(self, uplo: UPLO) -> Result<Self>
    where
        Self: Sized;
}

#[cfg(test)]
impl<A, S> IntoTriangular for ArrayBase<S, Ix2>
where
    A: Zero + Clone,
    S: DataMut<Elem = A>,
{
    fn into_triangular(mut self, uplo: UPLO) -> Result<Self> {
        self.triangular_inplace(uplo)?;
        Ok(self)
    }

    fn triangular_inplace(&mut self, uplo: UPLO) -> Result<&mut Self> {
        let n = check_square(self)?;
        for i in 0..n {
            let cleared = match uplo {
                UPLO::Upper => 0..i,
                UPLO::Lower => i + 1..n,
            };
            for j in cleared {
                self[(i, j)] = A::zero();
            }
        }
        Ok(self)
    }
}

/// Operations on triagular matrices
#[cfg(test)]
pub(crate) trait Triangular {
    /// Check if matrix is upper-triagular
    fn is_upper_triangular(&self) -> bool;
    /// Check if matrix is lower-triagular
    fn is_lower_triangular(&self) -> bool;
}

#[cfg(test)]
impl<A, S> Triangular for ArrayBase<S, Ix2>
where
    A: Zero,
    S: Data<Elem = A>,
{
    fn is_upper_triangular(&self) -> bool {
        check_square(self).is_ok()
            && self
                .indexed_iter()
                .all(|((i, j), x)| i <= j || x.is_zero())
    }

    fn is_lower_triangular(&self) -> bool {
        check_square(self).is_ok()
            && self
                .indexed_iter()
                .all(|((i, j), x)| i >= j || x.is_zero())
    }
}

/// Forward or back substitution for every column of `b`, in place
///
/// Only the `uplo` triangle of `a` is read. The diagonal is taken from `diag` so that unit
/// triangular factors stored in a packed LU can be solved without unpacking.
pub(crate) fn solve_triangular_system<A, Sa, Sb, F>(
    a: &ArrayBase<Sa, Ix2>,
    b: &mut ArrayBase<Sb, Ix2>,
    uplo: UPLO,
    diag: F,
) -> Result<()>
where
    A: Scalar,
    Sa: Data<Elem = A>,
    Sb: DataMut<Elem = A>,
    F: Fn(usize) -> A,
{
    let n = check_square(a)?;
    if b.nrows() != n {
        return Err(EigError::DimensionMismatch {
            expected: n,
            actual: b.nrows(),
        });
    }

    for k in 0..b.ncols() {
        match uplo {
            UPLO::Lower => {
                for i in 0..n {
                    let mut acc = b[(i, k)];
                    for j in 0..i {
                        acc -= a[(i, j)] * b[(j, k)];
                    }
                    b[(i, k)] = acc / diag(i);
                }
            }
            UPLO::Upper => {
                for i in (0..n).rev() {
                    let mut acc = b[(i, k)];
                    for j in i + 1..n {
                        acc -= a[(i, j)] * b[(j, k)];
                    }
                    b[(i, k)] = acc / diag(i);
                }
            }
        }
    }
    Ok(())
}
