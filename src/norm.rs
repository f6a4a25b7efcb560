//! Norm of vectors

use ndarray::{prelude::*, Data};
use num_traits::{Float, Zero};

use crate::Scalar;

/// Define norm as a metric linear space, treating the whole matrix as one big vector.
///
/// Complex entries contribute their modulus, so the output is always real.
pub trait Norm {
    type Output;

    /// L-1 norm
    fn norm_l1(&self) -> Self::Output;
    /// L-2 norm
    fn norm_l2(&self) -> Self::Output;
    /// Maximum norm (L-infinite)
    fn norm_max(&self) -> Self::Output;
}

impl<A, S, D> Norm for ArrayBase<S, D>
where
    A: Scalar,
    S: Data<Elem = A>,
    D: Dimension,
{
    type Output = A::Real;

    fn norm_l1(&self) -> Self::Output {
        self.iter().map(|x| x.modulus()).sum()
    }

    fn norm_l2(&self) -> Self::Output {
        self.iter().map(|&x| x.norm_sqr()).sum::<A::Real>().sqrt()
    }

    fn norm_max(&self) -> Self::Output {
        self.iter()
            .fold(A::Real::zero(), |f, &val| val.modulus().max(f))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use num_complex::Complex64;

    use super::*;

    #[test]
    fn norms() {
        let a = array![[1.0f64, -3.], [2., -8.]];
        assert_abs_diff_eq!(a.norm_l1(), 14.);
        assert_abs_diff_eq!(a.norm_l2(), 78.0f64.sqrt());
        assert_abs_diff_eq!(a.norm_max(), 8.);
    }

    #[test]
    fn complex_norms() {
        let v = array![Complex64::new(3., 4.), Complex64::new(0., -1.)];
        assert_abs_diff_eq!(v.norm_l1(), 6.);
        assert_abs_diff_eq!(v.norm_l2(), 26.0f64.sqrt());
        assert_abs_diff_eq!(v.norm_max(), 5.);
    }
}
