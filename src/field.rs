//! Vector field helpers: inner products and seeded random fields.

use ndarray::{Array1, ArrayBase, Data, Ix1};
use num_complex::Complex;
use num_traits::{NumCast, Zero};
use rand::Rng;

use crate::Scalar;

/// Hermitian inner product `<a, b> = sum conj(a_i) b_i`
pub fn inner<S, D1, D2>(a: &ArrayBase<D1, Ix1>, b: &ArrayBase<D2, Ix1>) -> S
where
    S: Scalar,
    D1: Data<Elem = S>,
    D2: Data<Elem = S>,
{
    a.iter()
        .zip(b.iter())
        .fold(S::zero(), |acc, (&x, &y)| acc + x.conj() * y)
}

/// Generate a random field with entries uniform in `[-0.5, 0.5)` (real and imaginary parts)
pub fn random_vector<S: Scalar, R: Rng>(len: usize, rng: &mut R) -> Array1<S> {
    Array1::from_shape_fn(len, |_| {
        let re: S::Real = NumCast::from(rng.gen::<f64>() - 0.5).unwrap();
        let im: S::Real = NumCast::from(rng.gen::<f64>() - 0.5).unwrap();
        S::from_complex(Complex::new(re, im))
    })
}

/// Scale `v` in place so that its largest component is real and positive
///
/// Fixes the arbitrary phase (or sign) of eigen- and singular vectors.
pub fn normalize_phase<S: Scalar>(v: &mut Array1<S>) {
    let pivot = v
        .iter()
        .copied()
        .fold((S::Real::zero(), S::zero()), |(best, val), x| {
            let m = x.modulus();
            if m > best {
                (m, x)
            } else {
                (best, val)
            }
        });
    if pivot.0 > S::Real::zero() {
        let phase = pivot.1.conj() / S::from_real(pivot.0);
        v.mapv_inplace(|x| x * phase);
    }
}
