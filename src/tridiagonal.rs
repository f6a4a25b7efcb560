//! Symmetric tridiagonal projection built by the Lanczos recurrence

use ndarray::{s, Array1, Array2, ArrayBase, Data, Ix2};

use crate::{eigh::tridiagonal_eigh, RealScalar, Result, Scalar};

/// Projection `T = V^H A V` of a Hermitian operator onto a Lanczos basis
///
/// `alpha` holds the diagonal and `beta` the off-diagonal; a projection of dimension `d` always
/// has `d - 1` couplings.
#[derive(Debug, Clone, PartialEq)]
pub struct Tridiagonal<A> {
    alpha: Vec<A>,
    beta: Vec<A>,
}

impl<A: RealScalar> Tridiagonal<A> {
    /// Empty projection with storage for `capacity` rows
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            alpha: Vec::with_capacity(capacity),
            beta: Vec::with_capacity(capacity.saturating_sub(1)),
        }
    }

    pub fn dim(&self) -> usize {
        self.alpha.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alpha.is_empty()
    }

    pub fn alpha(&self) -> &[A] {
        &self.alpha
    }

    pub fn beta(&self) -> &[A] {
        &self.beta
    }

    /// Append one row. `coupling` is the off-diagonal entry linking it to the previous row and
    /// must be given exactly when the projection is not empty.
    pub fn extend(&mut self, coupling: Option<A>, alpha: A) {
        debug_assert_eq!(coupling.is_some(), !self.is_empty());
        if let Some(b) = coupling {
            self.beta.push(b);
        }
        self.alpha.push(alpha);
        self.check();
    }

    /// Keep the leading `dim x dim` block
    pub fn truncate(&mut self, dim: usize) {
        self.alpha.truncate(dim);
        self.beta.truncate(dim.saturating_sub(1));
        self.check();
    }

    pub fn clear(&mut self) {
        self.truncate(0);
    }

    /// Replace the projection by the leading `dim x dim` block of a dense Hermitian matrix
    pub fn load_dense<S, D>(&mut self, dense: &ArrayBase<D, Ix2>, dim: usize)
    where
        S: Scalar<Real = A>,
        D: Data<Elem = S>,
    {
        self.alpha.clear();
        self.beta.clear();
        for i in 0..dim {
            if i > 0 {
                self.beta.push(dense[(i, i - 1)].real());
            }
            self.alpha.push(dense[(i, i)].real());
        }
        self.check();
    }

    pub fn to_dense(&self) -> Array2<A> {
        let n = self.dim();
        let mut t = Array2::zeros((n, n));
        for (i, &a) in self.alpha.iter().enumerate() {
            t[(i, i)] = a;
        }
        for (i, &b) in self.beta.iter().enumerate() {
            t[(i + 1, i)] = b;
            t[(i, i + 1)] = b;
        }
        t
    }

    /// Infinity norm, used as the scale of breakdown and convergence tests
    pub fn norm(&self) -> A {
        let n = self.dim();
        (0..n).fold(A::zero(), |acc, i| {
            let mut row = self.alpha[i].abs();
            if i > 0 {
                row += self.beta[i - 1].abs();
            }
            if i + 1 < n {
                row += self.beta[i].abs();
            }
            acc.max(row)
        })
    }

    /// Eigenvalues in ascending order and the matching orthonormal eigenvectors (columns)
    pub fn eigh(&self) -> Result<(Array1<A>, Array2<A>)> {
        tridiagonal_eigh(
            Array1::from(self.alpha.clone()).view(),
            Array1::from(self.beta.clone()).view(),
        )
    }

    /// Trailing row of the eigenvector matrix, as used by the Ritz residual estimate
    pub fn last_components(vectors: &Array2<A>) -> Array1<A> {
        let m = vectors.nrows();
        if m == 0 {
            return Array1::zeros(0);
        }
        vectors.slice(s![m - 1, ..]).to_owned()
    }

    fn check(&self) {
        debug_assert_eq!(
            self.beta.len(),
            self.alpha.len().saturating_sub(1),
            "tridiagonal has {} diagonal and {} off-diagonal entries",
            self.alpha.len(),
            self.beta.len()
        );
    }
}
