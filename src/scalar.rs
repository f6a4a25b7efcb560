//! Scalar types the solvers operate on: real and complex, single and double precision.

use std::fmt::{Debug, Display};
use std::iter::Sum;
use std::ops::{AddAssign, DivAssign, MulAssign, Neg, SubAssign};

use ndarray::{LinalgScalar, NdFloat, ScalarOperand};
use num_complex::Complex;

/// Storage precision of field and matrix data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Precision {
    Single,
    Double,
    ComplexSingle,
    ComplexDouble,
}

impl Precision {
    pub fn is_complex(self) -> bool {
        matches!(self, Precision::ComplexSingle | Precision::ComplexDouble)
    }
}

/// Element of a vector field or of a small dense matrix
///
/// Method names deliberately avoid the ones of [`num_traits::Float`] so that both traits can be
/// in scope for real types without ambiguity.
pub trait Scalar:
    LinalgScalar
    + ScalarOperand
    + Neg<Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign
    + DivAssign
    + Sum
    + PartialEq
    + Send
    + Sync
    + Debug
    + Display
{
    type Real: RealScalar;

    const PRECISION: Precision;

    fn conj(self) -> Self;
    fn real(self) -> Self::Real;
    fn imag(self) -> Self::Real;
    /// `|x|^2`
    fn norm_sqr(self) -> Self::Real;
    fn modulus(self) -> Self::Real;
    fn from_real(re: Self::Real) -> Self;
    /// Real scalars keep only the real part.
    fn from_complex(z: Complex<Self::Real>) -> Self;
    fn to_complex(self) -> Complex<Self::Real>;
    fn finite(self) -> bool;
}

/// Real floating point scalar, its own real type
pub trait RealScalar: Scalar<Real = Self> + NdFloat + Sum + Default {
    /// Complex scalar over this real type
    type Complex: Scalar<Real = Self>;

    /// Multiple of the machine epsilon below which a singular value is treated as zero,
    /// relative to the largest one.
    fn magnitude_correction() -> Self;
}

macro_rules! impl_real_scalar {
    ($ty:ty, $prec:expr, $correction:expr) => {
        impl Scalar for $ty {
            type Real = $ty;

            const PRECISION: Precision = $prec;

            #[inline]
            fn conj(self) -> Self {
                self
            }
            #[inline]
            fn real(self) -> Self {
                self
            }
            #[inline]
            fn imag(self) -> Self {
                0.
            }
            #[inline]
            fn norm_sqr(self) -> Self {
                self * self
            }
            #[inline]
            fn modulus(self) -> Self {
                <$ty>::abs(self)
            }
            #[inline]
            fn from_real(re: Self) -> Self {
                re
            }
            #[inline]
            fn from_complex(z: Complex<Self>) -> Self {
                z.re
            }
            #[inline]
            fn to_complex(self) -> Complex<Self> {
                Complex::new(self, 0.)
            }
            #[inline]
            fn finite(self) -> bool {
                <$ty>::is_finite(self)
            }
        }

        impl RealScalar for $ty {
            type Complex = Complex<$ty>;

            fn magnitude_correction() -> Self {
                $correction
            }
        }
    };
}

macro_rules! impl_complex_scalar {
    ($real:ty, $prec:expr) => {
        impl Scalar for Complex<$real> {
            type Real = $real;

            const PRECISION: Precision = $prec;

            #[inline]
            fn conj(self) -> Self {
                Complex::new(self.re, -self.im)
            }
            #[inline]
            fn real(self) -> $real {
                self.re
            }
            #[inline]
            fn imag(self) -> $real {
                self.im
            }
            #[inline]
            fn norm_sqr(self) -> $real {
                self.re * self.re + self.im * self.im
            }
            #[inline]
            fn modulus(self) -> $real {
                self.re.hypot(self.im)
            }
            #[inline]
            fn from_real(re: $real) -> Self {
                Complex::new(re, 0.)
            }
            #[inline]
            fn from_complex(z: Complex<$real>) -> Self {
                z
            }
            #[inline]
            fn to_complex(self) -> Complex<$real> {
                self
            }
            #[inline]
            fn finite(self) -> bool {
                self.re.is_finite() && self.im.is_finite()
            }
        }
    };
}

impl_real_scalar!(f32, Precision::Single, 1.0e3);
impl_real_scalar!(f64, Precision::Double, 1.0e6);
impl_complex_scalar!(f32, Precision::ComplexSingle);
impl_complex_scalar!(f64, Precision::ComplexDouble);

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use num_complex::Complex64;

    use super::*;

    #[test]
    fn complex_ops() {
        let z = Complex64::new(3., -4.);
        assert_abs_diff_eq!(Scalar::modulus(z), 5.);
        assert_abs_diff_eq!(Scalar::norm_sqr(z), 25.);
        assert_eq!(Scalar::conj(z), Complex64::new(3., 4.));
        assert_eq!(<Complex64 as Scalar>::PRECISION, Precision::ComplexDouble);
        assert!(Scalar::finite(z));
        assert!(!Scalar::finite(Complex64::new(f64::NAN, 0.)));
    }

    #[test]
    fn real_ops() {
        assert_abs_diff_eq!(Scalar::modulus(-2.5f64), 2.5);
        assert_eq!(<f32 as Scalar>::from_complex(Complex::new(1.5, 7.)), 1.5);
        assert_eq!(Scalar::imag(1.0f32), 0.);
        assert!(!Precision::Double.is_complex());
        assert!(Precision::ComplexSingle.is_complex());
    }
}
