//! Eigensolver parameters

use std::cmp::Ordering;

use num_complex::Complex;
use num_traits::NumCast;

use crate::{operator::MatVecKind, EigError, RealScalar, Result};

/// Algorithm behind [`create`](crate::eigensolver::create)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SolverKind {
    /// Implicitly restarted Lanczos, Hermitian operators
    #[default]
    Irlm,
    /// Implicitly restarted Arnoldi, general operators
    Iram,
    /// Caller supplied eigenvalue package
    External,
}

/// Part of the spectrum the solver converges to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Spectrum {
    LargestMagnitude,
    #[default]
    SmallestMagnitude,
    LargestReal,
    SmallestReal,
    LargestImaginary,
    SmallestImaginary,
}

impl Spectrum {
    /// Orders `a` before `b` when `a` is more wanted
    pub fn cmp_wanted<R: RealScalar>(self, a: &Complex<R>, b: &Complex<R>) -> Ordering {
        let key = |z: &Complex<R>| match self {
            Spectrum::LargestMagnitude => -z.norm(),
            Spectrum::SmallestMagnitude => z.norm(),
            Spectrum::LargestReal => -z.re,
            Spectrum::SmallestReal => z.re,
            Spectrum::LargestImaginary => -z.im,
            Spectrum::SmallestImaginary => z.im,
        };
        key(a).partial_cmp(&key(b)).unwrap_or(Ordering::Equal)
    }

    /// Indices of `values`, most wanted first. Ties keep their original order.
    pub fn wanted_order<R: RealScalar>(self, values: &[Complex<R>]) -> Vec<usize> {
        let mut order: Vec<usize> = (0..values.len()).collect();
        order.sort_by(|&a, &b| self.cmp_wanted(&values[a], &values[b]));
        order
    }
}

/// Chebyshev polynomial filter damping the interval `[a_min, a_max]`
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PolyParam<R> {
    pub degree: usize,
    pub a_min: R,
    pub a_max: R,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// Parameters of one eigensolve
///
/// Uses the builder pattern for everything except the subspace sizes.
///
/// # Example
///
/// ```rust
/// use krylov_eigensolve::{EigParam, Spectrum};
///
/// let param = EigParam::<f64>::new(4, 8, 20)
///     .tol(1e-10)
///     .spectrum(Spectrum::LargestReal)
///     .max_restarts(50);
///
/// assert!(param.validate((100, 100)).is_ok());
/// assert!(param.validate((16, 16)).is_err());
/// ```
pub struct EigParam<R = f64> {
    pub solver: SolverKind,
    /// Number of eigenpairs requested
    pub n_conv: usize,
    /// Subspace size kept across restarts
    pub n_ev: usize,
    /// Maximum subspace size
    pub n_kr: usize,
    /// Relative residual at which a Ritz pair counts as converged
    pub tol: R,
    pub max_restarts: usize,
    pub spectrum: Spectrum,
    pub mat_vec: MatVecKind,
    pub poly: Option<PolyParam<R>>,
    /// Recover singular triplets from eigenpairs of a normal product
    pub compute_svd: bool,
    /// Reorthogonalise Lanczos vectors through the Gram matrix rather than by Gram-Schmidt
    pub block_ortho: bool,
    /// Engine of the batched dense backend
    pub native_blas: bool,
    /// Worker threads of the native engine, 0 picks the rayon default
    pub blas_threads: usize,
    /// Seed of the random starting vector
    pub seed: u64,
}

impl<R: RealScalar> Default for EigParam<R> {
    fn default() -> Self {
        Self::new(4, 16, 32)
    }
}

impl<R: RealScalar> EigParam<R> {
    /// Request `n_conv` eigenpairs with a search space of dimension between `n_ev` and `n_kr`
    pub fn new(n_conv: usize, n_ev: usize, n_kr: usize) -> Self {
        EigParam {
            solver: SolverKind::default(),
            n_conv,
            n_ev,
            n_kr,
            tol: NumCast::from(1e-6).unwrap(),
            max_restarts: 100,
            spectrum: Spectrum::default(),
            mat_vec: MatVecKind::default(),
            poly: None,
            compute_svd: false,
            block_ortho: false,
            native_blas: true,
            blas_threads: 0,
            seed: 1234,
        }
    }

    pub fn solver(mut self, solver: SolverKind) -> Self {
        self.solver = solver;

        self
    }

    /// Set the convergence tolerance
    ///
    /// A Ritz pair `(theta, y)` is accepted once its residual estimate falls below
    /// `tol * |theta|`.
    pub fn tol(mut self, tol: R) -> Self {
        self.tol = tol;

        self
    }

    /// Set the maximal number of restarts
    ///
    /// When exhausted the solve returns whatever converged so far with an
    /// [`Exhausted`](crate::eigensolver::SolveStatus::Exhausted) status.
    pub fn max_restarts(mut self, max_restarts: usize) -> Self {
        self.max_restarts = max_restarts;

        self
    }

    pub fn spectrum(mut self, spectrum: Spectrum) -> Self {
        self.spectrum = spectrum;

        self
    }

    pub fn mat_vec(mut self, mat_vec: MatVecKind) -> Self {
        self.mat_vec = mat_vec;

        self
    }

    /// Accelerate with a Chebyshev filter of `degree` suppressing `[a_min, a_max]`
    ///
    /// The filter maps the unwanted interval to `[-1, 1]` so the eigenvalues outside of it
    /// dominate. Ritz values are then selected by largest magnitude of the filtered operator.
    pub fn poly(mut self, degree: usize, a_min: R, a_max: R) -> Self {
        self.poly = Some(PolyParam {
            degree,
            a_min,
            a_max,
        });

        self
    }

    pub fn compute_svd(mut self, compute_svd: bool) -> Self {
        self.compute_svd = compute_svd;

        self
    }

    pub fn block_ortho(mut self, block_ortho: bool) -> Self {
        self.block_ortho = block_ortho;

        self
    }

    /// Select the engine of the batched backend and its thread count
    pub fn native_blas(mut self, native: bool, threads: usize) -> Self {
        self.native_blas = native;
        self.blas_threads = threads;

        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;

        self
    }

    /// Check the parameters against an operator of `shape`, returning the length of the vectors
    /// the solver iterates on
    pub fn validate(&self, shape: (usize, usize)) -> Result<usize> {
        if !(self.tol > R::zero() && self.tol.is_finite()) {
            return Err(EigError::InvalidTolerance);
        }
        if self.n_conv > self.n_ev || self.n_ev >= self.n_kr {
            return Err(EigError::SubspaceBounds {
                n_conv: self.n_conv,
                n_ev: self.n_ev,
                n_kr: self.n_kr,
            });
        }

        let dim = self.mat_vec.domain_dim(shape);
        if dim != self.mat_vec.range_dim(shape) {
            return Err(EigError::NotSquare {
                rows: shape.0,
                cols: shape.1,
            });
        }
        if self.n_kr > dim {
            return Err(EigError::SubspaceTooLarge { n_kr: self.n_kr, dim });
        }

        if let Some(poly) = &self.poly {
            if poly.degree == 0
                || !(poly.a_min < poly.a_max)
                || !poly.a_min.is_finite()
                || !poly.a_max.is_finite()
            {
                return Err(EigError::InvalidPolynomial {
                    degree: poly.degree,
                });
            }
        }

        if self.compute_svd {
            if !self.mat_vec.is_normal() {
                return Err(EigError::SvdRequiresNormalOperator(self.mat_vec));
            }
            if shape.0 != shape.1 {
                return Err(EigError::NotSquare {
                    rows: shape.0,
                    cols: shape.1,
                });
            }
            if self.n_kr < 2 * self.n_conv {
                return Err(EigError::KrylovSpaceTooSmall {
                    expected: 2 * self.n_conv,
                    actual: self.n_kr,
                });
            }
        }

        Ok(dim)
    }

    /// Spectrum used to pick Ritz values while iterating: the Chebyshev filter makes the wanted
    /// part the largest in magnitude
    pub(crate) fn selection_spectrum(&self) -> Spectrum {
        if self.poly.is_some() {
            Spectrum::LargestMagnitude
        } else {
            self.spectrum
        }
    }
}
