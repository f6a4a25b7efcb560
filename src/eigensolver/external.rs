//! Bridge to a caller supplied eigenvalue package

use ndarray::{Array1, ArrayView1, ArrayViewMut1};
use num_complex::Complex;
use num_traits::{Float, Zero};

use super::{
    check_kspace, mat_vec, permute_leading, rayleigh_ritz, EigenSolver, SolveReport, SolveStatus,
};
use crate::{
    logging, norm::Norm, operator::LinearOperator, EigError, EigParam, Result, Scalar, Spectrum,
};

/// Problem description handed to an [`EigenPackage`]
#[derive(Debug, Clone, PartialEq)]
pub struct PackageRequest<R> {
    /// Length of the vectors the operator acts on
    pub dim: usize,
    pub n_conv: usize,
    /// Largest subspace the package may build
    pub n_kr: usize,
    pub tol: R,
    pub max_iterations: usize,
    pub spectrum: Spectrum,
    pub seed: u64,
}

/// Eigenpairs returned by a package, in any order
#[derive(Debug, Clone)]
pub struct PackageOutput<S: Scalar> {
    pub values: Vec<Complex<S::Real>>,
    pub vectors: Vec<Array1<S>>,
    pub iterations: usize,
}

/// An eigenvalue package driven through operator applications
///
/// `apply(x, y)` writes the selected operator product of `x` into `y`.
pub trait EigenPackage<S: Scalar> {
    fn name(&self) -> &str;

    fn solve(
        &mut self,
        request: &PackageRequest<S::Real>,
        apply: &mut dyn FnMut(ArrayView1<S>, ArrayViewMut1<S>) -> Result<()>,
    ) -> Result<PackageOutput<S>>;
}

/// Runs an [`EigenPackage`] behind the [`EigenSolver`] contract
///
/// The returned pairs are normalised, checked against explicit residuals of the operator and
/// sorted by the configured spectrum before they are copied to the Krylov space.
pub struct ExternalBridge<'a, S: Scalar> {
    op: &'a dyn LinearOperator<S>,
    param: EigParam<S::Real>,
    package: Box<dyn EigenPackage<S> + 'a>,
    dim: usize,
}

impl<'a, S: Scalar> ExternalBridge<'a, S> {
    pub(crate) fn new(
        param: EigParam<S::Real>,
        op: &'a dyn LinearOperator<S>,
        package: Box<dyn EigenPackage<S> + 'a>,
    ) -> Result<Self> {
        let dim = param.validate(op.shape())?;
        Ok(ExternalBridge {
            op,
            param,
            package,
            dim,
        })
    }

    fn package_error(&self, message: impl Into<String>) -> EigError {
        EigError::Package {
            name: self.package.name().to_string(),
            message: message.into(),
        }
    }
}

impl<'a, S: Scalar> EigenSolver<S> for ExternalBridge<'a, S> {
    fn solve(
        &mut self,
        kspace: &mut [Array1<S>],
        evals: &mut Vec<Complex<S::Real>>,
    ) -> Result<SolveReport<S::Real>> {
        check_kspace(kspace, self.param.n_kr, self.dim)?;
        evals.clear();

        let request = PackageRequest {
            dim: self.dim,
            n_conv: self.param.n_conv,
            n_kr: self.param.n_kr,
            tol: self.param.tol,
            max_iterations: self.param.max_restarts,
            spectrum: self.param.spectrum,
            seed: self.param.seed,
        };

        let op = self.op;
        let kind = self.param.mat_vec;
        let mut matvecs = 0;
        let mut apply = |x: ArrayView1<S>, y: ArrayViewMut1<S>| {
            matvecs += 1;
            mat_vec(op, y, x, kind)
        };
        log::debug!("{}handing the problem to {}", logging::prefix(), self.package.name());
        let output = self.package.solve(&request, &mut apply)?;

        if output.values.len() != output.vectors.len() {
            return Err(self.package_error(format!(
                "returned {} eigenvalues but {} eigenvectors",
                output.values.len(),
                output.vectors.len()
            )));
        }
        if output.vectors.len() > self.param.n_kr {
            return Err(self.package_error(format!(
                "returned {} eigenpairs, the Krylov space holds {}",
                output.vectors.len(),
                self.param.n_kr
            )));
        }
        for (slot, v) in kspace.iter_mut().zip(&output.vectors) {
            if v.len() != self.dim {
                return Err(self.package_error(format!(
                    "returned a vector of length {}, expected {}",
                    v.len(),
                    self.dim
                )));
            }
            let norm = v.norm_l2();
            if !(norm > S::Real::zero()) || !norm.is_finite() {
                return Err(self.package_error("returned a zero or non-finite eigenvector"));
            }
            slot.assign(&v.mapv(|x| x / S::from_real(norm)));
        }

        let count = output.vectors.len();
        let (values, mut residuals) = rayleigh_ritz(self.op, &kspace[..count], kind)?;
        matvecs += count;
        evals.extend(values);
        let order = self.param.spectrum.wanted_order(evals);
        permute_leading(kspace, evals, &mut residuals, &order);

        let kept = count.min(self.param.n_conv);
        evals.truncate(kept);
        residuals.truncate(kept);

        let eps = S::Real::epsilon();
        let converged = evals
            .iter()
            .zip(&residuals)
            .filter(|&(l, &r)| r < self.param.tol * l.norm().max(eps))
            .count();
        let status = if converged == self.param.n_conv {
            log::info!(
                "{}{}: {} eigenpairs converged after {} iterations",
                logging::prefix(),
                self.package.name(),
                converged,
                output.iterations
            );
            SolveStatus::Converged
        } else {
            log::warn!(
                "{}{}: {} of {} eigenpairs pass the residual check",
                logging::prefix(),
                self.package.name(),
                converged,
                self.param.n_conv
            );
            SolveStatus::Exhausted { converged }
        };

        Ok(SolveReport {
            status,
            restarts: output.iterations,
            matvecs,
            residuals,
        })
    }

    fn param(&self) -> &EigParam<S::Real> {
        &self.param
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;

    use super::*;
    use crate::{eigh::tridiagonal_eigh, SolverKind};

    /// Assembles the operator column by column and diagonalises its tridiagonal part
    struct DensePackage;

    impl EigenPackage<f64> for DensePackage {
        fn name(&self) -> &str {
            "dense"
        }

        fn solve(
            &mut self,
            request: &PackageRequest<f64>,
            apply: &mut dyn FnMut(ArrayView1<f64>, ArrayViewMut1<f64>) -> Result<()>,
        ) -> Result<PackageOutput<f64>> {
            let n = request.dim;
            let mut a = Array2::zeros((n, n));
            for j in 0..n {
                let mut e = Array1::zeros(n);
                e[j] = 1.;
                apply(e.view(), a.column_mut(j))?;
            }
            let off: Array1<f64> = (0..n - 1).map(|i| a[(i + 1, i)]).collect();
            let (values, vectors) = tridiagonal_eigh(a.diag(), off.view())?;
            Ok(PackageOutput {
                values: values.iter().map(|&x| Complex::new(x, 0.)).collect(),
                vectors: vectors
                    .columns()
                    .into_iter()
                    .take(request.n_kr)
                    .map(|c| c.to_owned())
                    .collect(),
                iterations: 1,
            })
        }
    }

    struct Truncating;

    impl EigenPackage<f64> for Truncating {
        fn name(&self) -> &str {
            "truncating"
        }

        fn solve(
            &mut self,
            request: &PackageRequest<f64>,
            _: &mut dyn FnMut(ArrayView1<f64>, ArrayViewMut1<f64>) -> Result<()>,
        ) -> Result<PackageOutput<f64>> {
            Ok(PackageOutput {
                values: vec![Complex::new(1., 0.)],
                vectors: vec![Array1::ones(request.dim - 1)],
                iterations: 0,
            })
        }
    }

    fn laplacian(n: usize) -> Array2<f64> {
        Array2::from_shape_fn((n, n), |(i, j)| match i.abs_diff(j) {
            0 => 2.,
            1 => -1.,
            _ => 0.,
        })
    }

    #[test]
    fn mock_package_on_laplacian() {
        let n = 12;
        let a = laplacian(n);
        let param = EigParam::new(2, 4, 12)
            .solver(SolverKind::External)
            .tol(1e-10)
            .spectrum(Spectrum::SmallestReal);
        let mut bridge = ExternalBridge::new(param, &a, Box::new(DensePackage)).unwrap();
        let mut kspace = vec![Array1::zeros(n); 12];
        let mut evals = Vec::new();
        let report = bridge.solve(&mut kspace, &mut evals).unwrap();

        assert!(report.status.is_converged());
        assert_eq!(evals.len(), 2);
        for (k, l) in evals.iter().enumerate() {
            let exact = 2. - 2. * ((k + 1) as f64 * std::f64::consts::PI / (n + 1) as f64).cos();
            assert_abs_diff_eq!(l.re, exact, epsilon = 1e-12);
        }
        assert_eq!(report.matvecs, n + n);
    }

    #[test]
    fn bad_output_is_a_package_error() {
        let a = laplacian(6);
        let param = EigParam::new(1, 2, 4).solver(SolverKind::External);
        let mut bridge = ExternalBridge::new(param, &a, Box::new(Truncating)).unwrap();
        let mut kspace = vec![Array1::zeros(6); 4];
        let mut evals = Vec::new();
        let err = bridge.solve(&mut kspace, &mut evals).unwrap_err();
        assert!(matches!(err, EigError::Package { ref name, .. } if name == "truncating"));
    }
}
