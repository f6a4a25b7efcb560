//! Matrix-free eigensolvers for large implicitly defined operators.
//!
//! The crate computes a handful of extremal eigenpairs (and singular triplets) of an operator
//! that is only available through its action on vectors. The main algorithm is the Implicitly
//! Restarted Lanczos Method ([`eigensolver::Irlm`]) with optional Chebyshev acceleration and
//! locking. Small dense linear algebra on the projected problem goes through a batched
//! inversion layer ([`blas_lapack`]) with a parallel and a sequential engine.
//!
//! ```rust
//! use ndarray::Array1;
//! use num_complex::Complex64;
//! use krylov_eigensolve::eigensolver::{self, EigenSolver};
//! use krylov_eigensolve::{operator::DiagonalOperator, params::EigParam, Spectrum};
//!
//! let op = DiagonalOperator::new(Array1::linspace(1., 50., 50));
//! let param = EigParam::new(4, 8, 20).tol(1e-10).spectrum(Spectrum::LargestReal);
//!
//! let mut solver = eigensolver::create(&param, &op).unwrap();
//! let mut kspace = vec![Array1::<f64>::zeros(50); 20];
//! let mut evals: Vec<Complex64> = Vec::new();
//!
//! let report = solver.solve(&mut kspace, &mut evals).unwrap();
//! assert!(report.status.is_converged());
//! assert!((evals[0].re - 50.).abs() < 1e-8);
//! ```

pub mod blas_lapack;
pub mod eigensolver;
pub mod eigh;
pub mod field;
pub mod givens;
pub mod hessenberg;
pub mod logging;
pub mod lu;
pub mod norm;
pub mod operator;
pub mod params;
pub mod qr;
pub mod scalar;
pub mod triangular;
pub mod tridiagonal;

use ndarray::{ArrayBase, Data, Ix2};
use thiserror::Error;

pub use blas_lapack::{Location, Precision};
pub use operator::MatVecKind;
pub use params::{EigParam, SolverKind, Spectrum};
pub use scalar::{RealScalar, Scalar};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EigError {
    #[error("Requested {n_conv} eigenpairs with subspace bounds [{n_ev}, {n_kr}]; need n_conv <= n_ev < n_kr")]
    SubspaceBounds {
        n_conv: usize,
        n_ev: usize,
        n_kr: usize,
    },
    #[error("Maximum subspace size {n_kr} exceeds the operator dimension {dim}")]
    SubspaceTooLarge { n_kr: usize, dim: usize },
    #[error("Krylov space holds {actual} vectors, at least {expected} are required")]
    KrylovSpaceTooSmall { expected: usize, actual: usize },
    #[error("Expected vector of length {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Matrix with {rows} rows and {cols} cols is not square")]
    NotSquare { rows: usize, cols: usize },
    #[error("Tolerance must be positive and finite")]
    InvalidTolerance,
    #[error("Invalid Chebyshev polynomial: degree {degree}, spectral bounds must satisfy a_min < a_max")]
    InvalidPolynomial { degree: usize },
    #[error("Singular value recovery requires a normal operator, got {0:?}")]
    SvdRequiresNormalOperator(MatVecKind),
    #[error("Data is {actual:?} but {expected:?} was declared")]
    UnsupportedPrecision {
        expected: Precision,
        actual: Precision,
    },
    #[error("The {backend} backend cannot operate on {location:?} memory")]
    UnsupportedLocation {
        backend: &'static str,
        location: Location,
    },
    #[error("Batch has shape {actual:?}, expected {expected:?}")]
    WrongShape {
        expected: (usize, usize, usize),
        actual: (usize, usize, usize),
    },
    #[error("The external solver was selected but no eigenvalue package was supplied")]
    MissingPackage,
    #[error("Matrix {batch} of the batch is singular (pivot {pivot})")]
    Singular { batch: usize, pivot: usize },
    #[error("Non-finite value encountered for Ritz pair {index}")]
    NonFinite { index: usize },
    #[error("Cannot deflate with zero eigenvalue at index {index}")]
    ZeroEigenvalue { index: usize },
    #[error("Shifted QR iteration did not converge after {iterations} iterations")]
    QrNotConverged { iterations: usize },
    #[error("Eigenpair {index} is complex and cannot be stored in a real field")]
    ComplexSpectrum { index: usize },
    #[error("Backend context initialisation failed: {0}")]
    BackendInit(String),
    #[error("Backend context used before init()")]
    BackendNotInitialized,
    #[error("Operator application failed: {0}")]
    Operator(String),
    #[error("Eigenvalue package {name} failed: {message}")]
    Package { name: String, message: String },
}

impl EigError {
    /// Invalid parameters or data layout, rejected before any numerical work.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            EigError::SubspaceBounds { .. }
                | EigError::SubspaceTooLarge { .. }
                | EigError::KrylovSpaceTooSmall { .. }
                | EigError::DimensionMismatch { .. }
                | EigError::NotSquare { .. }
                | EigError::InvalidTolerance
                | EigError::InvalidPolynomial { .. }
                | EigError::SvdRequiresNormalOperator(_)
                | EigError::UnsupportedPrecision { .. }
                | EigError::UnsupportedLocation { .. }
                | EigError::WrongShape { .. }
                | EigError::MissingPackage
        )
    }

    /// Numerical breakdown the caller may recover from (skip, perturb or abort).
    pub fn is_numerical(&self) -> bool {
        matches!(
            self,
            EigError::Singular { .. }
                | EigError::NonFinite { .. }
                | EigError::ZeroEigenvalue { .. }
                | EigError::QrNotConverged { .. }
                | EigError::ComplexSpectrum { .. }
        )
    }

    /// Engine context failures, fatal to the solve.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            EigError::BackendInit(_) | EigError::BackendNotInitialized
        )
    }
}

pub type Result<T> = std::result::Result<T, EigError>;

pub(crate) fn check_square<S: Data>(arr: &ArrayBase<S, Ix2>) -> Result<usize> {
    let (rows, cols) = arr.dim();
    if rows != cols {
        Err(EigError::NotSquare { rows, cols })
    } else {
        Ok(rows)
    }
}
