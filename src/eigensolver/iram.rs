//! Implicitly Restarted Arnoldi Method for operators that are not Hermitian
//!
//! Same restart scheme as the Lanczos solver, but the projection is a full upper Hessenberg
//! matrix and Ritz values may be complex. There is no locking: the iteration stops once all
//! wanted Ritz pairs pass the convergence test together.

use ndarray::{s, Array1, Array2};
use num_complex::Complex;
use num_traits::{Float, Zero};
use rand::{rngs::StdRng, Rng, SeedableRng};

use super::{
    cheby_op, check_kspace, compress_basis, mat_vec, next_residual, permute_leading, project_out,
    rayleigh_ritz, start_vector, EigenSolver, SolveReport, SolveStatus,
};
use crate::{
    field::normalize_phase, hessenberg::hessenberg_eig, logging, norm::Norm,
    operator::LinearOperator, qr::shifted_qr_sweep, EigError, EigParam, RealScalar, Result,
    Scalar,
};

pub struct Iram<'a, S: Scalar> {
    op: &'a dyn LinearOperator<S>,
    param: EigParam<S::Real>,
    dim: usize,
    /// Upper Hessenberg projection, `n_kr x n_kr`
    h: Array2<S>,
    residual: Array1<S>,
    residual_norm: S::Real,
    matvecs: usize,
}

impl<'a, S: Scalar> Iram<'a, S> {
    pub(crate) fn new(param: EigParam<S::Real>, op: &'a dyn LinearOperator<S>) -> Result<Self> {
        let dim = param.validate(op.shape())?;
        Ok(Iram {
            op,
            dim,
            h: Array2::zeros((param.n_kr, param.n_kr)),
            residual: Array1::zeros(dim),
            residual_norm: S::Real::zero(),
            matvecs: 0,
            param,
        })
    }

    /// Leading `m x m` block of the projection
    pub fn hessenberg(&self, m: usize) -> Array2<S> {
        self.h.slice(s![..m, ..m]).to_owned()
    }

    fn apply(&mut self, out: &mut Array1<S>, input: &Array1<S>) -> Result<()> {
        match &self.param.poly {
            Some(poly) => {
                self.matvecs += poly.degree;
                cheby_op(self.op, out.view_mut(), input.view(), self.param.mat_vec, poly)
            }
            None => {
                self.matvecs += 1;
                mat_vec(self.op, out.view_mut(), input.view(), self.param.mat_vec)
            }
        }
    }

    /// Arnoldi step `j`: column `j` of the projection and the next residual
    fn arnoldi_step<R: Rng>(
        &mut self,
        kspace: &mut [Array1<S>],
        j: usize,
        rng: &mut R,
    ) -> Result<()> {
        if j > 0 {
            kspace[j].assign(&self.residual);
            self.h[(j, j - 1)] = S::from_real(self.residual_norm);
        }

        let mut w = Array1::zeros(self.dim);
        self.apply(&mut w, &kspace[j])?;
        let coeffs = project_out(&kspace[..=j], &mut w);
        self.h.slice_mut(s![..=j, j]).assign(&coeffs);

        let beta = w.norm_l2();
        if !beta.is_finite() || coeffs.iter().any(|c| !c.finite()) {
            return Err(EigError::NonFinite { index: j });
        }
        let scale = self.h.slice(s![..=j, ..=j]).norm_max();
        let (residual, norm) = next_residual(&kspace[..=j], w, beta, scale, rng);
        self.residual = residual;
        self.residual_norm = norm;
        Ok(())
    }

    /// Ritz values and unit Ritz vectors (in the basis) of the leading `m x m` projection
    #[allow(clippy::type_complexity)]
    fn ritz_pairs(
        &self,
        m: usize,
    ) -> Result<(Vec<Complex<S::Real>>, Array2<<S::Real as RealScalar>::Complex>)> {
        let hc = self
            .h
            .slice(s![..m, ..m])
            .mapv(|x| <S::Real as RealScalar>::Complex::from_complex(x.to_complex()));
        let (values, vectors) = hessenberg_eig(&hc)?;
        Ok((values.iter().map(|z| z.to_complex()).collect(), vectors))
    }
}

impl<'a, S: Scalar> EigenSolver<S> for Iram<'a, S> {
    fn solve(
        &mut self,
        kspace: &mut [Array1<S>],
        evals: &mut Vec<Complex<S::Real>>,
    ) -> Result<SolveReport<S::Real>> {
        let EigParam {
            n_conv, n_ev, n_kr, ..
        } = self.param;
        check_kspace(kspace, n_kr, self.dim)?;
        evals.clear();
        self.h.fill(S::zero());
        self.matvecs = 0;

        if n_conv == 0 {
            return Ok(SolveReport {
                status: SolveStatus::Converged,
                restarts: 0,
                matvecs: 0,
                residuals: Vec::new(),
            });
        }

        let mut rng = StdRng::seed_from_u64(self.param.seed);
        start_vector(&mut kspace[0], &mut rng);

        let eps = S::Real::epsilon();
        let tol = self.param.tol;
        let selection = self.param.selection_spectrum();

        let mut m = 0;
        let mut restarts = 0;
        let (status, converged, ritz, y) = loop {
            while m < n_kr {
                self.arnoldi_step(kspace, m, &mut rng)?;
                m += 1;
            }

            let (ritz, y) = self.ritz_pairs(m)?;
            let order = selection.wanted_order(&ritz);
            let converged: Vec<usize> = order[..n_conv]
                .iter()
                .copied()
                .filter(|&i| {
                    self.residual_norm * y[(m - 1, i)].modulus() < tol * ritz[i].norm().max(eps)
                })
                .collect();
            log::debug!(
                "{}iram restart {}: {} of {} wanted Ritz pairs converged, residual {:e}",
                logging::prefix(),
                restarts,
                converged.len(),
                n_conv,
                self.residual_norm
            );

            if converged.len() == n_conv {
                break (SolveStatus::Converged, converged, ritz, y);
            }
            if restarts >= self.param.max_restarts {
                let count = converged.len();
                break (SolveStatus::Exhausted { converged: count }, converged, ritz, y);
            }

            let mut hm = self.hessenberg(m);
            let mut q = Array2::<S>::eye(m);
            for &i in &order[n_ev..] {
                shifted_qr_sweep(&mut hm, &mut q, S::from_complex(ritz[i]))?;
            }
            let f = compress_basis(
                &mut kspace[..m],
                &self.residual,
                self.residual_norm,
                &hm,
                &q,
                n_ev,
            );

            self.h.fill(S::zero());
            self.h
                .slice_mut(s![..n_ev, ..n_ev])
                .assign(&hm.slice(s![..n_ev, ..n_ev]));
            let beta = f.norm_l2();
            let scale = hm.norm_max();
            let (residual, norm) = next_residual(&kspace[..n_ev], f, beta, scale, &mut rng);
            self.residual = residual;
            self.residual_norm = norm;
            m = n_ev;
            restarts += 1;
        };

        // Ritz vectors of the converged pairs, brought to the field type
        let real_field = !S::PRECISION.is_complex();
        let mut vectors = Vec::with_capacity(converged.len());
        for (index, &i) in converged.iter().enumerate() {
            if real_field && ritz[i].im.abs() > eps.sqrt() * ritz[i].norm().max(eps) {
                return Err(EigError::ComplexSpectrum { index });
            }
            let mut yi: Array1<_> = y.column(i).to_owned();
            normalize_phase(&mut yi);
            let mut x = Array1::<S>::zeros(self.dim);
            for (c, v) in yi.iter().zip(kspace.iter()) {
                x.scaled_add(S::from_complex(c.to_complex()), v);
            }
            let norm = x.norm_l2();
            x.mapv_inplace(|c| c / S::from_real(norm));
            vectors.push(x);
        }
        for (slot, x) in kspace.iter_mut().zip(&vectors) {
            slot.assign(x);
        }

        let count = vectors.len();
        let (values, mut residuals) = rayleigh_ritz(self.op, &kspace[..count], self.param.mat_vec)?;
        self.matvecs += count;
        evals.extend(values);
        let order = self.param.spectrum.wanted_order(evals);
        permute_leading(kspace, evals, &mut residuals, &order);

        match status {
            SolveStatus::Converged => log::info!(
                "{}iram: {} eigenpairs converged after {} restarts and {} matvecs",
                logging::prefix(),
                count,
                restarts,
                self.matvecs
            ),
            SolveStatus::Exhausted { converged } => log::warn!(
                "{}iram: restart budget of {} spent with {} of {} eigenpairs converged",
                logging::prefix(),
                self.param.max_restarts,
                converged,
                n_conv
            ),
        }

        Ok(SolveReport {
            status,
            restarts,
            matvecs: self.matvecs,
            residuals,
        })
    }

    fn param(&self) -> &EigParam<S::Real> {
        &self.param
    }
}
