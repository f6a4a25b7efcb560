use ndarray::Array1;
use num_complex::Complex;

use super::{EigenSolver, SolveReport, Solver};
use crate::{logging, operator::LinearOperator, EigParam, Result, Scalar};

/// Runs an inner solver with its diagnostics tagged by a label
///
/// Results are exactly those of the inner solver. The label is the output prefix for the
/// duration of [`solve`](EigenSolver::solve) and the previous prefix is restored afterwards,
/// whether the inner solve succeeds or not.
pub struct DeflationSolver<'a, S: Scalar> {
    inner: Box<Solver<'a, S>>,
    op: &'a dyn LinearOperator<S>,
    label: String,
}

impl<'a, S: Scalar> DeflationSolver<'a, S> {
    pub(crate) fn new<O>(inner: Box<Solver<'a, S>>, op: &'a O, prefix: impl Into<String>) -> Self
    where
        O: LinearOperator<S> + 'a,
    {
        DeflationSolver {
            inner,
            op,
            label: prefix.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Operator the deflation space is computed for
    pub fn op(&self) -> &'a dyn LinearOperator<S> {
        self.op
    }

    pub fn into_inner(self) -> Solver<'a, S> {
        *self.inner
    }
}

impl<'a, S: Scalar> EigenSolver<S> for DeflationSolver<'a, S> {
    fn solve(
        &mut self,
        kspace: &mut [Array1<S>],
        evals: &mut Vec<Complex<S::Real>>,
    ) -> Result<SolveReport<S::Real>> {
        let _guard = logging::push_prefix(self.label.clone());
        let (rows, cols) = self.op.shape();
        log::debug!(
            "{}computing deflation space of {} eigenpairs for a {}x{} operator",
            logging::prefix(),
            self.inner.param().n_conv,
            rows,
            cols
        );
        self.inner.solve(kspace, evals)
    }

    fn param(&self) -> &EigParam<S::Real> {
        self.inner.param()
    }
}
