use ndarray::{ArrayBase, DataMut, Ix2};
use num_traits::{Float, Zero};

use crate::Scalar;

/// A Givens Rotation, `G = [[conj(c), conj(s)], [-s, c]]`
///
/// `G` is unitary for `|c|^2 + |s|^2 = 1`. For real scalars this is the usual plane rotation.
#[derive(Debug, Clone, Copy)]
pub struct GivensRotation<A> {
    c: A,
    s: A,
}

impl<A: Scalar> GivensRotation<A> {
    /// Computes rotation `G` such that the `y` component of `G * [x, y].t` is 0
    ///
    /// Returns `None` if `y` is 0 (no rotation needed), otherwise return the rotation and the norm
    /// of vector `[x, y]`.
    pub fn cancel_y(x: A, y: A) -> Option<(Self, A::Real)> {
        if y.modulus().is_zero() {
            return None;
        }
        let r = (x.norm_sqr() + y.norm_sqr()).sqrt();
        let r_s = A::from_real(r);
        Some((Self { c: x / r_s, s: y / r_s }, r))
    }

    pub fn c(&self) -> A {
        self.c
    }
    pub fn s(&self) -> A {
        self.s
    }

    /// The inverse (adjoint) Givens rotation
    pub fn inverse(self) -> Self {
        Self {
            c: self.c.conj(),
            s: -self.s,
        }
    }

    /// Performs `lhs = G * lhs` restricted to rows `i` and `k` of `lhs`.
    pub fn rotate_rows<S: DataMut<Elem = A>>(&self, lhs: &mut ArrayBase<S, Ix2>, i: usize, k: usize) {
        let (cc, sc) = (self.c.conj(), self.s.conj());
        for j in 0..lhs.ncols() {
            let a = lhs[(i, j)];
            let b = lhs[(k, j)];
            lhs[(i, j)] = cc * a + sc * b;
            lhs[(k, j)] = -self.s * a + self.c * b;
        }
    }

    /// Performs `rhs = rhs * G^H` restricted to columns `i` and `k` of `rhs`.
    pub fn rotate_cols<S: DataMut<Elem = A>>(&self, rhs: &mut ArrayBase<S, Ix2>, i: usize, k: usize) {
        let sc = self.s.conj();
        let cc = self.c.conj();
        for j in 0..rhs.nrows() {
            let p = rhs[(j, i)];
            let q = rhs[(j, k)];
            rhs[(j, i)] = p * self.c + q * self.s;
            rhs[(j, k)] = -p * sc + q * cc;
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};
    use num_complex::Complex64;

    use super::*;

    #[test]
    fn cancel_y() {
        let (rot, r) = GivensRotation::cancel_y(1.0f64, 2.0).unwrap();
        assert_abs_diff_eq!(r, 5.0_f64.sqrt());
        assert_abs_diff_eq!(rot.c, 0.4472136, epsilon = 1e-5);
        assert_abs_diff_eq!(rot.s, 0.8944272, epsilon = 1e-5);
        let mut v = array![[1.], [2.]];
        rot.rotate_rows(&mut v, 0, 1);
        assert_abs_diff_eq!(v, array![[r], [0.]], epsilon = 1e-12);

        assert!(GivensRotation::cancel_y(3.0f64, 0.).is_none());
    }

    #[test]
    fn cancel_y_complex() {
        let x = Complex64::new(1., 1.);
        let y = Complex64::new(0., -2.);
        let (rot, r) = GivensRotation::cancel_y(x, y).unwrap();
        assert_abs_diff_eq!(r, 6.0f64.sqrt(), epsilon = 1e-12);
        let mut v = array![[x], [y]];
        rot.rotate_rows(&mut v, 0, 1);
        assert_abs_diff_eq!(v[(0, 0)].re, r, epsilon = 1e-12);
        assert_abs_diff_eq!(v[(0, 0)].im, 0., epsilon = 1e-12);
        assert_abs_diff_eq!(v[(1, 0)].norm(), 0., epsilon = 1e-12);
    }

    #[test]
    fn similarity() {
        // G * I * G^H = I
        let (rot, _) = GivensRotation::cancel_y(Complex64::new(0.3, -0.2), Complex64::new(1., 0.5))
            .unwrap();
        let mut eye = Array2::<Complex64>::eye(3);
        rot.rotate_rows(&mut eye, 0, 2);
        rot.rotate_cols(&mut eye, 0, 2);
        for ((i, j), z) in eye.indexed_iter() {
            let expected = if i == j { 1. } else { 0. };
            assert_abs_diff_eq!(z.re, expected, epsilon = 1e-12);
            assert_abs_diff_eq!(z.im, 0., epsilon = 1e-12);
        }
    }

    #[test]
    fn inverse() {
        let (rot, _) = GivensRotation::cancel_y(2.0f64, -1.0).unwrap();
        let rows = array![[2., 3.], [4., 5.]];
        let mut out = rows.clone();
        rot.rotate_rows(&mut out, 0, 1);
        rot.inverse().rotate_rows(&mut out, 0, 1);
        assert_abs_diff_eq!(out, rows, epsilon = 1e-12);
    }
}
